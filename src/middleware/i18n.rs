// src/middleware/i18n.rs

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use crate::common::i18n::SUPPORTED;

const DEFAULT_LANG: &str = "es";

// Idioma preferido do cliente ("es", "pt" ou "en")
#[derive(Debug, Clone)]
pub struct Locale(pub String);

impl Default for Locale {
    fn default() -> Self {
        Locale(DEFAULT_LANG.to_string())
    }
}

impl Locale {
    pub fn from_header(value: Option<&str>) -> Self {
        // "pt-BR" -> "pt"; o primeiro idioma suportado vence
        value
            .map(accept_language::parse)
            .and_then(|tags| {
                tags.iter()
                    .map(|tag| tag.split('-').next().unwrap_or(tag).to_lowercase())
                    .find(|lang| SUPPORTED.contains(&lang.as_str()))
            })
            .map(Locale)
            .unwrap_or_default()
    }
}

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok());

        Ok(Locale::from_header(header_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_supported_language() {
        assert_eq!(Locale::from_header(Some("pt-BR,pt;q=0.9,en;q=0.8")).0, "pt");
        assert_eq!(Locale::from_header(Some("es-CL")).0, "es");
        assert_eq!(Locale::from_header(Some("fr-FR,en;q=0.5")).0, "en");
    }

    #[test]
    fn falls_back_to_spanish() {
        assert_eq!(Locale::from_header(None).0, "es");
        assert_eq!(Locale::from_header(Some("de")).0, "es");
    }
}
