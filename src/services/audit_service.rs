// src/services/audit_service.rs

use std::sync::Arc;

use crate::{
    common::{
        error::AppResult,
        pagination::{PageQuery, Paginated},
        scope::TenantScope,
    },
    db::AuditRepository,
    models::audit::{AuditFilter, AuditLog, NewAuditLog},
};

#[derive(Clone)]
pub struct AuditService {
    repo: Arc<dyn AuditRepository>,
}

impl AuditService {
    pub fn new(repo: Arc<dyn AuditRepository>) -> Self {
        Self { repo }
    }

    /// Grava o evento. Falhas de auditoria nunca derrubam a operação principal.
    pub async fn record(&self, entry: NewAuditLog) {
        let (action, entity_type) = (entry.action.clone(), entry.entity_type.clone());
        if let Err(e) = self.repo.insert(entry).await {
            tracing::warn!("Falha ao gravar auditoria ({} {}): {:?}", action, entity_type, e);
        }
    }

    pub async fn list(
        &self,
        scope: &TenantScope,
        filter: &AuditFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<AuditLog>> {
        self.repo.list(scope, filter, page).await
    }
}
