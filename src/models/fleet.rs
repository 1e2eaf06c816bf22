// src/models/fleet.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub(crate) fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

// =============================================================================
//  MOTORISTAS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: Uuid,
    pub operator_id: Uuid,
    #[schema(example = "Pedro Soto")]
    pub full_name: String,
    #[schema(example = "12.345.678-9")]
    pub rut: String,
    pub license_number: Option<String>,
    pub license_expiration: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDriverPayload {
    #[validate(length(min = 1, max = 150, message = "O nome é obrigatório."))]
    pub full_name: String,
    #[validate(length(min = 3, max = 20, message = "RUT inválido."))]
    pub rut: String,
    pub license_number: Option<String>,
    pub license_expiration: Option<NaiveDate>,
    pub phone: Option<String>,
    #[validate(email(message = "E-mail inválido."))]
    pub email: Option<String>,
    pub operator_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDriverPayload {
    #[validate(length(min = 1, max = 150, message = "O nome é obrigatório."))]
    pub full_name: Option<String>,
    #[validate(length(min = 3, max = 20, message = "RUT inválido."))]
    pub rut: Option<String>,
    pub license_number: Option<String>,
    pub license_expiration: Option<NaiveDate>,
    pub phone: Option<String>,
    #[validate(email(message = "E-mail inválido."))]
    pub email: Option<String>,
    pub status: Option<bool>,
}

// =============================================================================
//  VEÍCULOS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: Uuid,
    pub operator_id: Uuid,
    #[schema(example = "ABCD-12")]
    pub plate_number: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    #[schema(example = "Camión")]
    pub vehicle_type: Option<String>,
    #[schema(example = "28000.00")]
    pub capacity: Option<Decimal>,
    pub status: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateVehiclePayload {
    #[validate(length(min = 4, max = 12, message = "Patente inválida."))]
    pub plate_number: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    #[validate(range(min = 1950, max = 2100, message = "Ano inválido."))]
    pub year: Option<i32>,
    pub vehicle_type: Option<String>,
    #[validate(custom(function = "validate_not_negative"))]
    pub capacity: Option<Decimal>,
    pub operator_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVehiclePayload {
    #[validate(length(min = 4, max = 12, message = "Patente inválida."))]
    pub plate_number: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    #[validate(range(min = 1950, max = 2100, message = "Ano inválido."))]
    pub year: Option<i32>,
    pub vehicle_type: Option<String>,
    #[validate(custom(function = "validate_not_negative"))]
    pub capacity: Option<Decimal>,
    pub status: Option<bool>,
}

// =============================================================================
//  CLIENTES E FORNECEDORES
// =============================================================================

// Clientes e fornecedores têm o mesmo formato; muda só a tabela.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PartnerKind {
    Client,
    Provider,
}

impl PartnerKind {
    pub fn table(self) -> &'static str {
        match self {
            PartnerKind::Client => "clients",
            PartnerKind::Provider => "providers",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PartnerKind::Client => "Cliente",
            PartnerKind::Provider => "Fornecedor",
        }
    }

    /// Recurso usado nas permissões e na auditoria.
    pub fn resource(self) -> &'static str {
        self.table()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub id: Uuid,
    pub operator_id: Uuid,
    #[schema(example = "Agrícola Los Andes Ltda")]
    pub business_name: String,
    #[schema(example = "77.888.999-0")]
    pub tax_id: String,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub status: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePartnerPayload {
    #[validate(length(min = 1, max = 200, message = "A razão social é obrigatória."))]
    pub business_name: String,
    #[validate(length(min = 3, max = 20, message = "RUT inválido."))]
    pub tax_id: String,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    #[validate(email(message = "E-mail inválido."))]
    pub email: Option<String>,
    pub address: Option<String>,
    pub operator_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePartnerPayload {
    #[validate(length(min = 1, max = 200, message = "A razão social é obrigatória."))]
    pub business_name: Option<String>,
    #[validate(length(min = 3, max = 20, message = "RUT inválido."))]
    pub tax_id: Option<String>,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    #[validate(email(message = "E-mail inválido."))]
    pub email: Option<String>,
    pub address: Option<String>,
    pub status: Option<bool>,
}

// =============================================================================
//  ROTAS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: Uuid,
    pub operator_id: Uuid,
    #[schema(example = "Santiago - Valparaíso")]
    pub name: String,
    #[schema(example = "STG-VAP")]
    pub code: String,
    pub origin: String,
    pub destination: String,
    pub distance: Option<Decimal>,
    // Minutos
    pub estimated_duration: Option<i32>,
    pub status: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoutePayload {
    #[validate(length(min = 1, max = 150, message = "O nome da rota é obrigatório."))]
    pub name: String,
    #[validate(length(min = 1, max = 30, message = "O código da rota é obrigatório."))]
    pub code: String,
    #[validate(length(min = 1, message = "A origem é obrigatória."))]
    pub origin: String,
    #[validate(length(min = 1, message = "O destino é obrigatório."))]
    pub destination: String,
    #[validate(custom(function = "validate_not_negative"))]
    pub distance: Option<Decimal>,
    #[validate(range(min = 0, message = "A duração não pode ser negativa."))]
    pub estimated_duration: Option<i32>,
    pub operator_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoutePayload {
    #[validate(length(min = 1, max = 150, message = "O nome da rota é obrigatório."))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 30, message = "O código da rota é obrigatório."))]
    pub code: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    #[validate(custom(function = "validate_not_negative"))]
    pub distance: Option<Decimal>,
    #[validate(range(min = 0, message = "A duração não pode ser negativa."))]
    pub estimated_duration: Option<i32>,
    pub status: Option<bool>,
}

// Filtro comum às listagens de cadastro
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CatalogFilter {
    /// Busca parcial por nome, RUT, patente ou código
    pub search: Option<String>,
    pub status: Option<bool>,
}

impl CatalogFilter {
    /// Casamento usado pelo store em memória; o Postgres usa ILIKE.
    pub fn matches_text(&self, fields: &[&str]) -> bool {
        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                fields.iter().any(|f| f.to_lowercase().contains(&needle))
            }
        }
    }

    pub fn matches_status(&self, status: bool) -> bool {
        self.status.is_none_or(|wanted| wanted == status)
    }

    pub fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{s}%"))
    }
}

/// Resultado de uma exclusão de cadastro: física ou lógica (status = false).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum DeleteOutcome {
    Deleted,
    Deactivated,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub outcome: DeleteOutcome,
}
