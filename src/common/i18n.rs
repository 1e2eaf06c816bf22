// src/common/i18n.rs

// Títulos de erro por idioma. A mensagem detalhada vem do serviço;
// aqui só traduzimos a categoria.

pub const SUPPORTED: &[&str] = &["es", "pt", "en"];

pub fn translate(lang: &str, code: &str) -> &'static str {
    match (lang, code) {
        ("es", "bad_request") => "Uno o más campos son inválidos.",
        ("es", "not_found") => "Recurso no encontrado.",
        ("es", "conflict") => "Conflicto",
        ("es", "forbidden") => "No tiene permisos para realizar esta acción.",
        ("es", "unauthorized") => "Token de autenticación inválido o ausente.",
        ("es", _) => "Ocurrió un error inesperado.",

        ("pt", "bad_request") => "Um ou mais campos são inválidos.",
        ("pt", "not_found") => "Recurso não encontrado.",
        ("pt", "conflict") => "Conflito",
        ("pt", "forbidden") => "Você não tem permissão para realizar esta ação.",
        ("pt", "unauthorized") => "Token de autenticação inválido ou ausente.",
        ("pt", _) => "Ocorreu um erro inesperado.",

        (_, "bad_request") => "One or more fields are invalid.",
        (_, "not_found") => "Resource not found.",
        (_, "conflict") => "Conflict",
        (_, "forbidden") => "You are not allowed to perform this action.",
        (_, "unauthorized") => "Missing or invalid authentication token.",
        _ => "An unexpected error occurred.",
    }
}
