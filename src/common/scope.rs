// src/common/scope.rs

use uuid::Uuid;

use crate::common::error::AppError;
use crate::models::auth::Principal;

/// Predicado de tenant obrigatório em toda leitura/escrita dos repositórios.
///
/// É sempre derivado de quem chama: usuários de operadores `super` recebem
/// `All` (ou um operador específico, se pedirem), os demais ficam presos ao
/// próprio operador. Os repositórios não têm métodos sem escopo para dados
/// de tenant, então um endpoint novo não consegue "esquecer" o filtro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantScope {
    All,
    Operator(Uuid),
}

impl TenantScope {
    /// Escopo da requisição. `requested` vem do header `x-operator-id`
    /// ou do campo `operatorId` do payload.
    pub fn for_principal(principal: &Principal, requested: Option<Uuid>) -> Result<Self, AppError> {
        match (principal.is_super, requested) {
            (true, None) => Ok(TenantScope::All),
            (true, Some(operator_id)) => Ok(TenantScope::Operator(operator_id)),
            (false, None) => Ok(TenantScope::Operator(principal.operator_id)),
            (false, Some(operator_id)) if operator_id == principal.operator_id => {
                Ok(TenantScope::Operator(operator_id))
            }
            (false, Some(_)) => Err(AppError::forbidden(
                "Não é permitido acessar dados de outro operador.",
            )),
        }
    }

    /// `None` significa "sem filtro" (vale para `All`).
    pub fn operator_filter(&self) -> Option<Uuid> {
        match self {
            TenantScope::All => None,
            TenantScope::Operator(id) => Some(*id),
        }
    }

    pub fn permits(&self, operator_id: Uuid) -> bool {
        match self {
            TenantScope::All => true,
            TenantScope::Operator(id) => *id == operator_id,
        }
    }

    pub fn ensure(&self, operator_id: Uuid) -> Result<(), AppError> {
        if self.permits(operator_id) {
            Ok(())
        } else {
            Err(AppError::forbidden("Não é permitido acessar dados de outro operador."))
        }
    }

    /// Operador dono de um registro novo.
    pub fn target_operator(&self, requested: Option<Uuid>) -> Result<Uuid, AppError> {
        match (self, requested) {
            (TenantScope::Operator(id), None) => Ok(*id),
            (TenantScope::Operator(id), Some(req)) if *id == req => Ok(req),
            (TenantScope::Operator(_), Some(_)) => Err(AppError::forbidden(
                "Não é permitido criar registros em outro operador.",
            )),
            (TenantScope::All, Some(req)) => Ok(req),
            (TenantScope::All, None) => Err(AppError::bad_request(
                "Informe o operatorId do registro.",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(is_super: bool) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            username: "u".into(),
            email: "u@x.cl".into(),
            operator_id: Uuid::new_v4(),
            role_id: Uuid::new_v4(),
            is_super,
        }
    }

    #[test]
    fn regular_user_is_pinned_to_own_operator() {
        let p = principal(false);
        assert_eq!(TenantScope::for_principal(&p, None).unwrap(), TenantScope::Operator(p.operator_id));
        assert_eq!(
            TenantScope::for_principal(&p, Some(p.operator_id)).unwrap(),
            TenantScope::Operator(p.operator_id)
        );
        let err = TenantScope::for_principal(&p, Some(Uuid::new_v4())).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn super_user_sees_all_or_narrows() {
        let p = principal(true);
        let other = Uuid::new_v4();
        assert_eq!(TenantScope::for_principal(&p, None).unwrap(), TenantScope::All);
        assert_eq!(TenantScope::for_principal(&p, Some(other)).unwrap(), TenantScope::Operator(other));
    }

    #[test]
    fn target_operator_rules() {
        let own = Uuid::new_v4();
        let scoped = TenantScope::Operator(own);
        assert_eq!(scoped.target_operator(None).unwrap(), own);
        assert!(scoped.target_operator(Some(Uuid::new_v4())).is_err());
        assert!(TenantScope::All.target_operator(None).is_err());
        assert!(TenantScope::All.permits(Uuid::new_v4()));
        assert!(!scoped.permits(Uuid::new_v4()));
    }
}
