//! Extractor turning request credentials into a [`Caller`].

use axum::{
    extract::{FromRequestParts, Query},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    identity::Caller,
    state::{SharedState, room::RoomClaim},
};

/// Admin code of the room being addressed.
pub const ADMIN_CODE_HEADER: &str = "x-admin-code";
/// Recovery pin of the room being addressed.
pub const RECOVERY_PIN_HEADER: &str = "x-recovery-pin";
/// Comma-separated room ids the client device recorded as its own.
pub const OWNED_ROOMS_HEADER: &str = "x-owned-rooms";

/// `EventSource` cannot set headers, so SSE clients pass the token in the query.
#[derive(Deserialize)]
struct TokenQuery {
    access_token: Option<String>,
}

impl FromRequestParts<SharedState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).or_else(|| {
            Query::<TokenQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(query)| query.access_token)
        });

        let identity = match token {
            Some(token) => Some(
                state
                    .identities()
                    .resolve(&token)
                    .await
                    .ok_or_else(|| AppError::Unauthorized("unknown or expired token".into()))?,
            ),
            None => None,
        };

        Ok(Caller {
            identity,
            room_claim: room_claim(&parts.headers),
        })
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = header_value(headers, AUTHORIZATION.as_str())?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
}

fn room_claim(headers: &HeaderMap) -> RoomClaim {
    let owned_rooms = header_value(headers, OWNED_ROOMS_HEADER)
        .map(|list| {
            list.split(',')
                .filter_map(|id| Uuid::parse_str(id.trim()).ok())
                .collect()
        })
        .unwrap_or_default();

    RoomClaim {
        admin_code: header_value(headers, ADMIN_CODE_HEADER),
        recovery_pin: header_value(headers, RECOVERY_PIN_HEADER),
        owned_rooms,
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn parses_claim_headers() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_CODE_HEADER, HeaderValue::from_static("adm456"));
        headers.insert(
            OWNED_ROOMS_HEADER,
            HeaderValue::from_str(&format!("{id}, not-a-uuid")).unwrap(),
        );

        let claim = room_claim(&headers);
        assert_eq!(claim.admin_code.as_deref(), Some("adm456"));
        assert_eq!(claim.recovery_pin, None);
        assert_eq!(claim.owned_rooms, vec![id]);
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }
}
