// src/models/operations.rs

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::fleet::validate_not_negative;

// --- Enums ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "operation_status", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum OperationStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl OperationStatus {
    /// scheduled -> in-progress -> completed; scheduled | in-progress -> cancelled
    pub fn can_transition_to(self, next: OperationStatus) -> bool {
        use OperationStatus::*;
        matches!(
            (self, next),
            (Scheduled, InProgress) | (InProgress, Completed) | (Scheduled, Cancelled) | (InProgress, Cancelled)
        )
    }

    /// Operação ainda "viva": prende motorista, veículo e cadastros.
    pub fn is_open(self) -> bool {
        matches!(self, OperationStatus::Scheduled | OperationStatus::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationStatus::Scheduled => "scheduled",
            OperationStatus::InProgress => "in-progress",
            OperationStatus::Completed => "completed",
            OperationStatus::Cancelled => "cancelled",
        }
    }
}

// --- Operação (o "frete") ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: Uuid,
    pub operator_id: Uuid,
    #[schema(example = "OP-001")]
    pub operation_number: String,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub client_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub route_id: Option<Uuid>,
    #[schema(example = "Transporte de carga")]
    pub operation_type: String,
    pub origin: String,
    pub destination: String,
    pub status: OperationStatus,
    pub scheduled_start_date: DateTime<Utc>,
    pub scheduled_end_date: Option<DateTime<Utc>>,
    pub actual_start_date: Option<DateTime<Utc>>,
    pub actual_end_date: Option<DateTime<Utc>>,
    pub distance: Option<Decimal>,
    pub cargo_description: Option<String>,
    pub cargo_weight: Option<Decimal>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOperation {
    pub operator_id: Uuid,
    pub operation_number: String,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub client_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub route_id: Option<Uuid>,
    pub operation_type: String,
    pub origin: String,
    pub destination: String,
    pub scheduled_start_date: DateTime<Utc>,
    pub scheduled_end_date: Option<DateTime<Utc>>,
    pub distance: Option<Decimal>,
    pub cargo_description: Option<String>,
    pub cargo_weight: Option<Decimal>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOperationPayload {
    #[validate(length(min = 1, max = 50, message = "O número da operação é obrigatório."))]
    #[schema(example = "OP-001")]
    pub operation_number: String,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub client_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub route_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100, message = "O tipo da operação é obrigatório."))]
    pub operation_type: String,
    #[validate(length(min = 1, max = 200, message = "A origem é obrigatória."))]
    pub origin: String,
    #[validate(length(min = 1, max = 200, message = "O destino é obrigatório."))]
    pub destination: String,
    pub scheduled_start_date: DateTime<Utc>,
    pub scheduled_end_date: Option<DateTime<Utc>>,
    #[validate(custom(function = "validate_not_negative"))]
    pub distance: Option<Decimal>,
    pub cargo_description: Option<String>,
    #[validate(custom(function = "validate_not_negative"))]
    pub cargo_weight: Option<Decimal>,
    pub notes: Option<String>,
    pub operator_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOperationPayload {
    #[validate(length(min = 1, max = 50, message = "O número da operação é obrigatório."))]
    pub operation_number: Option<String>,
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    #[serde(default, deserialize_with = "crate::models::double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub client_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "crate::models::double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub provider_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "crate::models::double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub route_id: Option<Option<Uuid>>,
    pub operation_type: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub scheduled_start_date: Option<DateTime<Utc>>,
    pub scheduled_end_date: Option<DateTime<Utc>>,
    #[validate(custom(function = "validate_not_negative"))]
    pub distance: Option<Decimal>,
    pub cargo_description: Option<String>,
    #[validate(custom(function = "validate_not_negative"))]
    pub cargo_weight: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusPayload {
    pub status: OperationStatus,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct OperationFilter {
    pub status: Option<OperationStatus>,
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    /// Início agendado a partir de
    pub from: Option<DateTime<Utc>>,
    /// Início agendado até
    pub to: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

impl OperationFilter {
    pub fn matches(&self, op: &Operation) -> bool {
        self.status.is_none_or(|s| s == op.status)
            && self.driver_id.is_none_or(|d| d == op.driver_id)
            && self.vehicle_id.is_none_or(|v| v == op.vehicle_id)
            && self.client_id.is_none_or(|c| Some(c) == op.client_id)
            && self.from.is_none_or(|from| op.scheduled_start_date >= from)
            && self.to.is_none_or(|to| op.scheduled_start_date <= to)
            && self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .is_none_or(|needle| {
                    let needle = needle.to_lowercase();
                    op.operation_number.to_lowercase().contains(&needle)
                        || op.origin.to_lowercase().contains(&needle)
                        || op.destination.to_lowercase().contains(&needle)
                })
    }
}

/// Cadastro que uma operação pode referenciar (para as regras de exclusão).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationRef {
    Driver(Uuid),
    Vehicle(Uuid),
    Client(Uuid),
    Provider(Uuid),
    Route(Uuid),
}

impl OperationRef {
    pub fn column(&self) -> &'static str {
        match self {
            OperationRef::Driver(_) => "driver_id",
            OperationRef::Vehicle(_) => "vehicle_id",
            OperationRef::Client(_) => "client_id",
            OperationRef::Provider(_) => "provider_id",
            OperationRef::Route(_) => "route_id",
        }
    }

    pub fn id(&self) -> Uuid {
        match *self {
            OperationRef::Driver(id)
            | OperationRef::Vehicle(id)
            | OperationRef::Client(id)
            | OperationRef::Provider(id)
            | OperationRef::Route(id) => id,
        }
    }

    pub fn matches(&self, op: &Operation) -> bool {
        match *self {
            OperationRef::Driver(id) => op.driver_id == id,
            OperationRef::Vehicle(id) => op.vehicle_id == id,
            OperationRef::Client(id) => op.client_id == Some(id),
            OperationRef::Provider(id) => op.provider_id == Some(id),
            OperationRef::Route(id) => op.route_id == Some(id),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceCount {
    /// scheduled ou in-progress
    pub open: i64,
    pub total: i64,
}

// --- Atribuição motorista/veículo ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DriverVehicle {
    pub id: Uuid,
    pub operator_id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub operation_id: Option<Uuid>,
    pub is_active: bool,
    pub assigned_at: DateTime<Utc>,
    pub unassigned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub operator_id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub operation_id: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignDriverPayload {
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AssignmentFilter {
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    /// Só atribuições ativas (padrão: true)
    pub active_only: Option<bool>,
}

impl AssignmentFilter {
    pub fn matches(&self, a: &DriverVehicle) -> bool {
        self.driver_id.is_none_or(|d| d == a.driver_id)
            && self.vehicle_id.is_none_or(|v| v == a.vehicle_id)
            && (!self.active_only.unwrap_or(true) || a.is_active)
    }
}

// =============================================================================
//  IMPORTAÇÃO EM LOTE
// =============================================================================

/// Linha como digitada na planilha (ou enviada em JSON), ainda sem tipos.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RawOperationRow {
    /// Número da linha na planilha; no JSON assume a posição (1-based)
    pub row: Option<usize>,
    pub operation_number: Option<String>,
    pub scheduled_start_date: Option<String>,
    pub scheduled_end_date: Option<String>,
    pub client_name: Option<String>,
    pub provider_name: Option<String>,
    pub route_name: Option<String>,
    pub driver_rut: Option<String>,
    pub vehicle_plate_number: Option<String>,
    pub operation_type: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub distance: Option<String>,
    pub cargo_description: Option<String>,
    pub cargo_weight: Option<String>,
    pub notes: Option<String>,
}

/// Linha já validada superficialmente, pronta para a reconciliação.
#[derive(Debug, Clone)]
pub struct OperationImportRow {
    pub row: usize,
    pub operation_number: String,
    pub driver_rut: String,
    pub vehicle_plate_number: String,
    pub operation_type: String,
    pub origin: String,
    pub destination: String,
    pub scheduled_start_date: NaiveDateTime,
    pub scheduled_end_date: Option<NaiveDateTime>,
    pub client_name: Option<String>,
    pub provider_name: Option<String>,
    pub route_name: Option<String>,
    pub distance: Option<Decimal>,
    pub cargo_description: Option<String>,
    pub cargo_weight: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportRowError {
    pub row: usize,
    #[schema(example = "driverRut")]
    pub field: String,
    pub message: String,
    pub value: Option<String>,
}

impl ImportRowError {
    pub fn new(row: usize, field: &str, message: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            row,
            field: field.to_string(),
            message: message.into(),
            value: value.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchImportResult {
    pub success: bool,
    pub total_rows: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub errors: Vec<ImportRowError>,
    pub duplicates: Vec<String>,
    pub created_operations: Vec<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchImportPayload {
    pub operator_id: Option<Uuid>,
    pub rows: Vec<RawOperationRow>,
}

// Dados de apoio do relatório PDF
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperationDetail {
    #[serde(flatten)]
    pub operation: Operation,
    pub operator_name: String,
    pub driver_name: String,
    pub driver_rut: String,
    pub vehicle_plate_number: String,
    pub client_name: Option<String>,
    pub provider_name: Option<String>,
    pub route_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use OperationStatus::*;

    #[test]
    fn status_transitions() {
        assert!(Scheduled.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(Scheduled.can_transition_to(Cancelled));
        assert!(InProgress.can_transition_to(Cancelled));

        assert!(!Scheduled.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Scheduled));
        assert!(!InProgress.can_transition_to(Scheduled));
    }

    #[test]
    fn status_serializes_kebab_case() {
        assert_eq!(serde_json::to_string(&InProgress).unwrap(), "\"in-progress\"");
        let parsed: OperationStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(parsed, Cancelled);
        assert_eq!(InProgress.as_str(), "in-progress");
    }
}
