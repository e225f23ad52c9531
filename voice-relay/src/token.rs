//! LiveKit access-token minting.

use std::time::Duration;

use livekit_api::access_token::{AccessToken, VideoGrants};

use crate::error::{RelayError, Result};

/// Participant attribute that carries the agent marker.
pub const ROLE_ATTRIBUTE: &str = "role";

/// Who a token is for and what it allows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub identity: String,
    pub name: String,
    pub room: String,
    /// Marks the participant as an agent through the `role` attribute.
    pub agent: bool,
    pub ttl: Option<Duration>,
}

impl TokenClaims {
    /// A regular participant that can join `room`, publish and subscribe.
    /// The display name defaults to the identity.
    pub fn participant(identity: impl Into<String>, room: impl Into<String>) -> Self {
        let identity = identity.into();
        Self { name: identity.clone(), identity, room: room.into(), agent: false, ttl: None }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn as_agent(mut self) -> Self {
        self.agent = true;
        self
    }
}

/// Signs access tokens with a LiveKit API key pair.
#[derive(Clone)]
pub struct TokenIssuer {
    api_key: String,
    api_secret: String,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").field("api_key", &self.api_key).finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Create an issuer. Both credentials must be non-empty.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        let api_secret = api_secret.into();
        if api_key.trim().is_empty() || api_secret.trim().is_empty() {
            return Err(RelayError::config("LiveKit API key and secret are required"));
        }
        Ok(Self { api_key, api_secret })
    }

    /// Read `LIVEKIT_API_KEY` and `LIVEKIT_API_SECRET`.
    pub fn from_env() -> Result<Self> {
        let key = std::env::var("LIVEKIT_API_KEY").unwrap_or_default();
        let secret = std::env::var("LIVEKIT_API_SECRET").unwrap_or_default();
        Self::new(key, secret)
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Sign a JWT for `claims`.
    pub fn mint(&self, claims: &TokenClaims) -> Result<String> {
        if claims.identity.is_empty() || claims.room.is_empty() {
            return Err(RelayError::config("identity and room are required"));
        }
        let grants = VideoGrants {
            room_join: true,
            room: claims.room.clone(),
            can_publish: true,
            can_subscribe: true,
            can_publish_data: true,
            ..Default::default()
        };
        let mut token = AccessToken::with_api_key(&self.api_key, &self.api_secret)
            .with_identity(&claims.identity)
            .with_name(&claims.name)
            .with_grants(grants);
        if claims.agent {
            token = token.with_attributes([(ROLE_ATTRIBUTE, "agent")]);
        }
        if let Some(ttl) = claims.ttl {
            token = token.with_ttl(ttl);
        }
        let jwt = token
            .to_jwt()
            .map_err(|e| RelayError::session(format!("Failed to sign access token: {e}")))?;
        tracing::debug!(identity = %claims.identity, room = %claims.room, "Minted access token");
        Ok(jwt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    fn payload(jwt: &str) -> serde_json::Value {
        let part = jwt.split('.').nth(1).unwrap();
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(part).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn empty_credentials_rejected() {
        assert!(matches!(TokenIssuer::new("", "secret"), Err(RelayError::Config(_))));
        assert!(matches!(TokenIssuer::new("key", "  "), Err(RelayError::Config(_))));
    }

    #[test]
    fn minted_token_carries_claims() {
        let issuer = TokenIssuer::new("devkey", "secret-secret-secret-secret-1234").unwrap();
        let claims = TokenClaims::participant("alice", "demo").with_name("Alice").as_agent();
        let jwt = issuer.mint(&claims).unwrap();

        let body = payload(&jwt);
        assert_eq!(body["sub"], "alice");
        assert_eq!(body["name"], "Alice");
        assert_eq!(body["iss"], "devkey");
        assert_eq!(body["video"]["room"], "demo");
        assert_eq!(body["video"]["roomJoin"], true);
        assert_eq!(body["attributes"]["role"], "agent");
    }

    #[test]
    fn participant_token_has_no_role() {
        let issuer = TokenIssuer::new("devkey", "secret").unwrap();
        let body = payload(&issuer.mint(&TokenClaims::participant("bob", "demo")).unwrap());
        assert!(body["attributes"].get("role").is_none());
        assert_eq!(body["video"]["canPublishData"], true);
    }

    #[test]
    fn name_defaults_to_identity() {
        let claims = TokenClaims::participant("bob", "demo");
        assert_eq!(claims.name, "bob");
        assert!(!claims.agent);
    }

    #[test]
    fn missing_room_rejected() {
        let issuer = TokenIssuer::new("devkey", "secret").unwrap();
        assert!(issuer.mint(&TokenClaims::participant("bob", "")).is_err());
    }
}
