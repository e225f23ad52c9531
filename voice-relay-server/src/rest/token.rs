use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};
use voice_relay::token::{TokenClaims, TokenIssuer};

use crate::error::TokenError;

#[derive(Clone, Debug)]
pub struct TokenController {
    issuer: Option<TokenIssuer>,
}

impl TokenController {
    pub fn new(issuer: Option<TokenIssuer>) -> Self {
        if issuer.is_none() {
            tracing::warn!("LIVEKIT_API_KEY or LIVEKIT_API_SECRET not set, token requests will fail");
        }
        Self { issuer }
    }

    /// Validate the request and sign a participant token.
    pub fn issue(&self, request: TokenRequest) -> Result<TokenResponse, TokenError> {
        let identity = request.identity.filter(|s| !s.is_empty());
        let room = request.room.filter(|s| !s.is_empty());
        let (Some(identity), Some(room)) = (identity, room) else {
            return Err(TokenError::MissingParameters);
        };
        let name = request.name.filter(|s| !s.is_empty()).unwrap_or_else(|| identity.clone());

        let issuer = self.issuer.as_ref().ok_or(TokenError::MissingCredentials)?;
        let claims = TokenClaims::participant(&identity, &room).with_name(&name);
        let token = issuer.mint(&claims)?;
        tracing::info!(identity = %identity, room = %room, "Issued access token");
        Ok(TokenResponse { token, identity, room, name })
    }
}

/// Body of `POST /api/token`, or the query of `GET /api/token`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub token: String,
    pub identity: String,
    pub room: String,
    pub name: String,
}

pub async fn token_from_query(
    State(controller): State<TokenController>,
    Query(request): Query<TokenRequest>,
) -> Result<Json<TokenResponse>, TokenError> {
    controller.issue(request).map(Json)
}

pub async fn token_from_body(
    State(controller): State<TokenController>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, TokenError> {
    let Json(request) = payload.map_err(|e| TokenError::InvalidBody(e.body_text()))?;
    controller.issue(request).map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(identity: &str, room: &str, name: Option<&str>) -> TokenRequest {
        TokenRequest {
            identity: Some(identity.to_string()),
            room: Some(room.to_string()),
            name: name.map(str::to_string),
        }
    }

    fn controller() -> TokenController {
        TokenController::new(TokenIssuer::new("devkey", "secret").ok())
    }

    #[test]
    fn name_defaults_to_identity() {
        let response = controller().issue(request("alice", "lobby", None)).unwrap();
        assert_eq!(response.name, "alice");
        assert_eq!(response.token.split('.').count(), 3);

        let response = controller().issue(request("alice", "lobby", Some(""))).unwrap();
        assert_eq!(response.name, "alice");
    }

    #[test]
    fn empty_identity_or_room_is_missing() {
        let err = controller().issue(request("", "lobby", None)).unwrap_err();
        assert!(matches!(err, TokenError::MissingParameters));
        let err = controller().issue(TokenRequest::default()).unwrap_err();
        assert!(matches!(err, TokenError::MissingParameters));
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(32))]

        #[test]
        fn response_echoes_request(identity in "[a-z0-9_-]{1,16}", room in "[a-z0-9-]{1,16}") {
            let response = controller().issue(request(&identity, &room, None)).unwrap();
            proptest::prop_assert_eq!(&response.identity, &identity);
            proptest::prop_assert_eq!(&response.room, &room);
            proptest::prop_assert_eq!(&response.name, &identity);
        }
    }

    #[test]
    fn parameters_checked_before_credentials() {
        let bare = TokenController::new(None);
        assert!(matches!(bare.issue(TokenRequest::default()), Err(TokenError::MissingParameters)));
        assert!(matches!(
            bare.issue(request("alice", "lobby", None)),
            Err(TokenError::MissingCredentials)
        ));
    }
}
