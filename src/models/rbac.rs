// src/models/rbac.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// Unidade atômica de permissão: (recurso, ação)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    pub id: Uuid,
    #[schema(example = "drivers")]
    pub resource: String,
    #[schema(example = "read")]
    pub action: String,
    pub created_at: DateTime<Utc>,
}

impl Grant {
    pub fn permission(&self) -> String {
        format!("{}.{}", self.resource, self.action)
    }
}

/// Permissão no formato `"<recurso>.<ação>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermissionKey {
    pub resource: String,
    pub action: String,
}

impl PermissionKey {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }

    /// Valida todas as strings antes de qualquer escrita; a primeira inválida aborta.
    pub fn parse_all(permissions: &[String]) -> Result<Vec<PermissionKey>, InvalidPermission> {
        let mut keys: Vec<PermissionKey> = permissions
            .iter()
            .map(|p| p.parse())
            .collect::<Result<_, _>>()?;
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Permissão inválida '{0}': use o formato recurso.acao")]
pub struct InvalidPermission(pub String);

impl FromStr for PermissionKey {
    type Err = InvalidPermission;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidPermission(raw.to_string());

        let (resource, action) = raw.split_once('.').ok_or_else(invalid)?;
        let well_formed = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        };

        if !well_formed(resource) || !well_formed(action) {
            return Err(invalid());
        }

        Ok(PermissionKey::new(resource, action))
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.action)
    }
}

// O que sai do banco (Tabela roles)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: Uuid,
    pub operator_id: Uuid,
    #[schema(example = "Despachador")]
    pub name: String,
    // Cargos criados pelo sistema ("Admin", "SuperAdmin"): não podem ser renomeados nem removidos
    pub is_system_role: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct RoleGrant {
    pub role_id: Uuid,
    pub grant_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewRole {
    pub operator_id: Uuid,
    pub name: String,
    pub is_system_role: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleUserStats {
    pub total: i64,
    pub active: i64,
}

impl RoleUserStats {
    /// Um cargo só é "inativo" quando todos os seus usuários estão inativos.
    pub fn role_status(&self) -> bool {
        self.total == 0 || self.active > 0
    }
}

// O Payload para criar um cargo
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRolePayload {
    #[validate(length(min = 1, max = 100, message = "O nome do cargo é obrigatório."))]
    #[schema(example = "Despachador")]
    pub name: String,

    // Só usuários super escolhem o operador
    pub operator_id: Option<Uuid>,

    #[serde(default)]
    #[schema(example = json!(["operations.read", "operations.create", "drivers.read"]))]
    pub permissions: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRolePayload {
    #[validate(length(min = 1, max = 100, message = "O nome do cargo é obrigatório."))]
    pub name: Option<String>,

    // Substitui o conjunto inteiro de permissões
    #[schema(example = json!(["operations.read"]))]
    pub permissions: Option<Vec<String>>,
}

// Resposta completa (Cargo + Permissões + uso)
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleSummary {
    #[serde(flatten)]
    pub role: Role,

    #[schema(example = json!(["operations.read", "drivers.read"]))]
    pub permissions: Vec<String>,

    pub status: bool,
    pub user_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_resource_and_action() {
        let key: PermissionKey = "operations.import".parse().unwrap();
        assert_eq!(key.resource, "operations");
        assert_eq!(key.action, "import");
        assert_eq!(key.to_string(), "operations.import");
    }

    #[test]
    fn rejects_malformed_strings() {
        for raw in ["drivers", ".read", "drivers.", "", ".", "a.b.c", "dri vers.read", "drivers:read"] {
            assert!(raw.parse::<PermissionKey>().is_err(), "{raw} deveria ser inválida");
        }
    }

    #[test]
    fn parse_all_fails_on_first_invalid_and_dedups_valid() {
        let ok = PermissionKey::parse_all(&["b.read".into(), "a.read".into(), "b.read".into()]).unwrap();
        assert_eq!(ok, vec![PermissionKey::new("a", "read"), PermissionKey::new("b", "read")]);

        let err = PermissionKey::parse_all(&["a.read".into(), "broken".into()]).unwrap_err();
        assert_eq!(err, InvalidPermission("broken".into()));
    }

    #[test]
    fn role_status_is_true_without_users() {
        assert!(RoleUserStats { total: 0, active: 0 }.role_status());
        assert!(RoleUserStats { total: 3, active: 1 }.role_status());
        assert!(!RoleUserStats { total: 2, active: 0 }.role_status());
    }
}
