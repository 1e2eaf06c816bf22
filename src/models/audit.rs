// src/models/audit.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::models::auth::Principal;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: Uuid,
    pub operator_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    #[schema(example = "create")]
    pub action: String,
    #[schema(example = "drivers")]
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub details: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub operator_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub details: Option<Value>,
}

impl NewAuditLog {
    /// Evento sobre uma entidade de `operator_id`, feito por `actor` (None = sistema).
    pub fn new(
        actor: Option<&Principal>,
        operator_id: Uuid,
        action: &str,
        entity_type: &str,
        entity_id: Option<Uuid>,
    ) -> Self {
        Self {
            operator_id: Some(operator_id),
            user_id: actor.map(|p| p.user_id),
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AuditFilter {
    pub entity_type: Option<String>,
    pub action: Option<String>,
    pub user_id: Option<Uuid>,
    pub entity_id: Option<Uuid>,
}

impl AuditFilter {
    pub fn matches(&self, log: &AuditLog) -> bool {
        self.entity_type.as_deref().is_none_or(|e| e == log.entity_type)
            && self.action.as_deref().is_none_or(|a| a == log.action)
            && self.user_id.is_none_or(|u| Some(u) == log.user_id)
            && self.entity_id.is_none_or(|e| Some(e) == log.entity_id)
    }
}
