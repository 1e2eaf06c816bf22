// src/middleware/tenancy.rs

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    common::{
        error::{ApiError, AppError},
        scope::TenantScope,
    },
    middleware::{auth::AuthenticatedUser, i18n::Locale},
};

// Cabeçalho com o operador que o usuário quer acessar
const OPERATOR_ID_HEADER: &str = "x-operator-id";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperatorQuery {
    operator_id: Option<Uuid>,
}

/// Escopo de tenant da requisição, derivado do usuário autenticado e do
/// `x-operator-id` (ou `?operatorId=`) opcional.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext(pub TenantScope);

fn requested_operator(parts: &Parts) -> Result<Option<Uuid>, AppError> {
    if let Some(value) = parts.headers.get(OPERATOR_ID_HEADER) {
        let value_str = value
            .to_str()
            .map_err(|_| AppError::bad_request("Cabeçalho x-operator-id contém caracteres inválidos."))?;
        let operator_id = Uuid::parse_str(value_str.trim())
            .map_err(|_| AppError::bad_request("Cabeçalho x-operator-id inválido (não é um UUID)."))?;
        return Ok(Some(operator_id));
    }

    let query = Query::<OperatorQuery>::try_from_uri(&parts.uri)
        .map_err(|_| AppError::bad_request("Parâmetro operatorId inválido (não é um UUID)."))?;
    Ok(query.0.operator_id)
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let locale = Locale::from_request_parts(parts, state).await.unwrap_or_default();
        let AuthenticatedUser(principal) = AuthenticatedUser::from_request_parts(parts, state).await?;

        requested_operator(parts)
            .and_then(|requested| TenantScope::for_principal(&principal, requested))
            .map(TenantContext)
            .map_err(|e| {
                if matches!(e, AppError::Forbidden(_)) {
                    tracing::warn!("Usuário {} tentou acessar outro operador", principal.user_id);
                }
                e.to_api_error(&locale)
            })
    }
}
