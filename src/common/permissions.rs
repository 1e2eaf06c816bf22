// src/common/permissions.rs

// Catálogo de permissões conhecidas pelo sistema ("recurso.ação").
// É o conjunto dado ao cargo "Admin" de cada operador novo; outras
// permissões podem surgir sob demanda ao criar cargos.

pub const OPERATORS: &str = "operators";
pub const USERS: &str = "users";
pub const ROLES: &str = "roles";
pub const AUDIT: &str = "audit";
pub const DRIVERS: &str = "drivers";
pub const VEHICLES: &str = "vehicles";
pub const CLIENTS: &str = "clients";
pub const PROVIDERS: &str = "providers";
pub const ROUTES: &str = "routes";
pub const OPERATIONS: &str = "operations";

pub const CREATE: &str = "create";
pub const READ: &str = "read";
pub const UPDATE: &str = "update";
pub const DELETE: &str = "delete";
pub const IMPORT: &str = "import";
pub const ASSIGN: &str = "assign";

const CRUD: &[&str] = &[CREATE, READ, UPDATE, DELETE];

pub const ADMIN_ROLE: &str = "Admin";
pub const SUPER_ADMIN_ROLE: &str = "SuperAdmin";

/// Todas as permissões do catálogo, na ordem (recurso, ação).
pub fn catalog() -> Vec<(&'static str, &'static str)> {
    let mut entries = Vec::new();
    for resource in [OPERATORS, USERS, ROLES, DRIVERS, VEHICLES, CLIENTS, PROVIDERS, ROUTES, OPERATIONS] {
        for action in CRUD {
            entries.push((resource, *action));
        }
    }
    entries.push((OPERATIONS, IMPORT));
    entries.push((OPERATIONS, ASSIGN));
    entries.push((AUDIT, READ));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_has_no_duplicates() {
        let all = catalog();
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(all.len(), unique.len());
        assert!(all.contains(&(OPERATIONS, IMPORT)));
        assert!(all.contains(&(AUDIT, READ)));
    }
}
