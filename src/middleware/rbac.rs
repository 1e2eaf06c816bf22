// src/middleware/rbac.rs

use std::marker::PhantomData;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use crate::{
    common::{
        error::{ApiError, AppError},
        permissions as perm,
    },
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
};

/// 1. O Trait que define o que é uma Permissão: um par (recurso, ação)
pub trait PermissionDef: Send + Sync + 'static {
    fn resource() -> &'static str;
    fn action() -> &'static str;
}

/// 2. O Extractor (Guardião)
pub struct RequirePermission<T>(pub PhantomData<T>);

// 3. Implementação do FromRequestParts
impl<T, S> FromRequestParts<S> for RequirePermission<T>
where
    T: PermissionDef,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let locale = Locale::from_request_parts(parts, state).await.unwrap_or_default();

        // A. Extrai Usuário
        let AuthenticatedUser(principal) = AuthenticatedUser::from_request_parts(parts, state).await?;

        // B. Consulta o avaliador (com cache)
        let (resource, action) = (T::resource(), T::action());
        let allowed = app_state
            .rbac_service
            .can_access(&principal, resource, action)
            .await
            .map_err(|e| e.to_api_error(&locale))?;

        if !allowed {
            tracing::warn!(
                "Acesso negado: usuário {} sem a permissão '{}.{}'",
                principal.user_id,
                resource,
                action
            );
            return Err(AppError::forbidden(format!(
                "Você precisa da permissão '{resource}.{action}' para realizar esta ação."
            ))
            .to_api_error(&locale));
        }

        Ok(RequirePermission(PhantomData))
    }
}

// ---
// DEFINIÇÃO DAS PERMISSÕES (TIPOS)
// ---

macro_rules! permissions {
    ($($name:ident => ($resource:expr, $action:expr)),* $(,)?) => {
        $(
            pub struct $name;
            impl PermissionDef for $name {
                fn resource() -> &'static str { $resource }
                fn action() -> &'static str { $action }
            }
        )*
    };
}

permissions! {
    PermOperatorsCreate => (perm::OPERATORS, perm::CREATE),
    PermOperatorsRead => (perm::OPERATORS, perm::READ),
    PermOperatorsUpdate => (perm::OPERATORS, perm::UPDATE),
    PermOperatorsDelete => (perm::OPERATORS, perm::DELETE),

    PermUsersCreate => (perm::USERS, perm::CREATE),
    PermUsersRead => (perm::USERS, perm::READ),
    PermUsersUpdate => (perm::USERS, perm::UPDATE),
    PermUsersDelete => (perm::USERS, perm::DELETE),

    PermRolesCreate => (perm::ROLES, perm::CREATE),
    PermRolesRead => (perm::ROLES, perm::READ),
    PermRolesUpdate => (perm::ROLES, perm::UPDATE),
    PermRolesDelete => (perm::ROLES, perm::DELETE),

    PermAuditRead => (perm::AUDIT, perm::READ),

    PermDriversCreate => (perm::DRIVERS, perm::CREATE),
    PermDriversRead => (perm::DRIVERS, perm::READ),
    PermDriversUpdate => (perm::DRIVERS, perm::UPDATE),
    PermDriversDelete => (perm::DRIVERS, perm::DELETE),

    PermVehiclesCreate => (perm::VEHICLES, perm::CREATE),
    PermVehiclesRead => (perm::VEHICLES, perm::READ),
    PermVehiclesUpdate => (perm::VEHICLES, perm::UPDATE),
    PermVehiclesDelete => (perm::VEHICLES, perm::DELETE),

    PermClientsCreate => (perm::CLIENTS, perm::CREATE),
    PermClientsRead => (perm::CLIENTS, perm::READ),
    PermClientsUpdate => (perm::CLIENTS, perm::UPDATE),
    PermClientsDelete => (perm::CLIENTS, perm::DELETE),

    PermProvidersCreate => (perm::PROVIDERS, perm::CREATE),
    PermProvidersRead => (perm::PROVIDERS, perm::READ),
    PermProvidersUpdate => (perm::PROVIDERS, perm::UPDATE),
    PermProvidersDelete => (perm::PROVIDERS, perm::DELETE),

    PermRoutesCreate => (perm::ROUTES, perm::CREATE),
    PermRoutesRead => (perm::ROUTES, perm::READ),
    PermRoutesUpdate => (perm::ROUTES, perm::UPDATE),
    PermRoutesDelete => (perm::ROUTES, perm::DELETE),

    PermOperationsCreate => (perm::OPERATIONS, perm::CREATE),
    PermOperationsRead => (perm::OPERATIONS, perm::READ),
    PermOperationsUpdate => (perm::OPERATIONS, perm::UPDATE),
    PermOperationsDelete => (perm::OPERATIONS, perm::DELETE),
    PermOperationsImport => (perm::OPERATIONS, perm::IMPORT),
    PermOperationsAssign => (perm::OPERATIONS, perm::ASSIGN),
}
