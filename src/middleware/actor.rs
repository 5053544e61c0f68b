//! Extracción de la identidad del actor
//!
//! El gateway upstream autentica al usuario y reenvía su identidad en las
//! cabeceras `X-Actor-Role` y `X-Actor-Id`. Aquí sólo se leen y validan.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

use crate::models::{Actor, ActorRole};
use crate::utils::errors::AppError;

pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, AppError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", name)))
}

/// Lee el actor de las cabeceras
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, AppError> {
    let role: ActorRole = header(headers, ACTOR_ROLE_HEADER)?
        .parse()
        .map_err(AppError::Unauthorized)?;
    let id: i64 = header(headers, ACTOR_ID_HEADER)?
        .parse()
        .map_err(|_| AppError::Unauthorized("actor id must be an integer".to_string()))?;
    if id <= 0 {
        return Err(AppError::Unauthorized("actor id must be positive".to_string()));
    }
    Ok(Actor::new(role, id))
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = actor_from_headers(&parts.headers)?;
        tracing::debug!("👤 Actor {}", actor);
        Ok(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(role: Option<&'static str>, id: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(role) = role {
            headers.insert(ACTOR_ROLE_HEADER, HeaderValue::from_static(role));
        }
        if let Some(id) = id {
            headers.insert(ACTOR_ID_HEADER, HeaderValue::from_static(id));
        }
        headers
    }

    #[test]
    fn test_valid_actor() {
        let actor = actor_from_headers(&headers(Some("driver"), Some("17"))).unwrap();
        assert_eq!(actor, Actor::new(ActorRole::Driver, 17));
    }

    #[test]
    fn test_missing_or_malformed_headers_are_unauthorized() {
        for (role, id) in [
            (None, Some("1")),
            (Some("ADMIN"), None),
            (Some("JANITOR"), Some("1")),
            (Some("ADMIN"), Some("abc")),
            (Some("ADMIN"), Some("-4")),
        ] {
            let result = actor_from_headers(&headers(role, id));
            assert!(matches!(result, Err(AppError::Unauthorized(_))), "{:?} {:?}", role, id);
        }
    }
}
