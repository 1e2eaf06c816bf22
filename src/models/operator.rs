// src/models/operator.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// O "Operador" é o tenant: toda entidade de frota pertence a exatamente um.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Operator {
    pub id: Uuid,
    #[schema(example = "Transportes del Sur SpA")]
    pub name: String,
    #[schema(example = "76.123.456-7")]
    pub tax_id: String,
    // Operador da plataforma: enxerga todos os tenants
    #[serde(rename = "super")]
    pub is_super: bool,
    pub status: bool,
    pub expiration: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Operator {
    /// Ativo e dentro da validade.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status && self.expiration.is_none_or(|expires| expires > now)
    }
}

#[derive(Debug, Clone)]
pub struct NewOperator {
    pub name: String,
    pub tax_id: String,
    pub is_super: bool,
    pub expiration: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOperatorPayload {
    #[validate(length(min = 1, max = 150, message = "O nome do operador é obrigatório."))]
    pub name: String,

    #[validate(length(min = 3, max = 20, message = "O RUT/identificador fiscal é inválido."))]
    pub tax_id: String,

    #[serde(default, rename = "super")]
    pub is_super: bool,

    pub expiration: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOperatorPayload {
    #[validate(length(min = 1, max = 150, message = "O nome do operador é obrigatório."))]
    pub name: Option<String>,

    #[validate(length(min = 3, max = 20, message = "O RUT/identificador fiscal é inválido."))]
    pub tax_id: Option<String>,

    #[serde(rename = "super")]
    pub is_super: Option<bool>,

    pub status: Option<bool>,

    // `Some(None)` limpa a validade
    #[serde(default, deserialize_with = "crate::models::double_option")]
    #[schema(value_type = Option<DateTime<Utc>>)]
    pub expiration: Option<Option<DateTime<Utc>>>,
}
