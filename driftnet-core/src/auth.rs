//! Bearer-token authentication against the external identity provider.
//!
//! Sessions authenticate exactly once, before any streaming happens. The
//! identity provider is an OIDC userinfo endpoint; validated users are
//! cached by token for the remainder of its TTL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::TtlCache;
use crate::config::AuthConfig;

/// An authenticated user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub email: String,
}

/// Authentication failures, all terminal for the requesting session.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No usable credential was supplied.
    #[error("missing bearer credentials")]
    MissingCredentials,

    /// Credential rejected by the identity provider.
    #[error("invalid bearer token")]
    InvalidToken,

    /// The identity provider could not be reached.
    #[error("identity provider unreachable: {reason}")]
    Unreachable {
        /// Transport failure detail
        reason: String,
    },
}

/// Validates bearer credentials into users.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Validates `bearer` and resolves the user it belongs to.
    ///
    /// # Errors
    /// - `AuthError::MissingCredentials` - Empty or non-bearer credential
    /// - `AuthError::InvalidToken` - Provider rejected the token
    /// - `AuthError::Unreachable` - Provider could not be reached
    async fn authenticate(&self, bearer: &str) -> Result<User, AuthError>;
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: String,
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
}

/// Authenticator backed by an OIDC userinfo endpoint.
pub struct OidcAuthenticator {
    http: reqwest::Client,
    userinfo_url: String,
    users: Arc<TtlCache<String, User>>,
}

impl OidcAuthenticator {
    /// Creates an authenticator for the configured userinfo endpoint.
    pub fn new(http: reqwest::Client, config: &AuthConfig) -> Self {
        Self {
            http,
            userinfo_url: config.userinfo_url.clone(),
            users: Arc::new(TtlCache::new(64, Duration::from_secs(3600))),
        }
    }
}

#[async_trait]
impl Authenticator for OidcAuthenticator {
    async fn authenticate(&self, bearer: &str) -> Result<User, AuthError> {
        let token = bearer
            .strip_prefix("Bearer ")
            .unwrap_or(bearer)
            .trim()
            .to_string();
        if token.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        if let Some(user) = self.users.get(&token) {
            return Ok(user);
        }

        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| AuthError::Unreachable {
                reason: e.to_string(),
            })?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(AuthError::InvalidToken);
        }
        if !response.status().is_success() {
            return Err(AuthError::Unreachable {
                reason: format!("userinfo endpoint returned {}", response.status()),
            });
        }

        let info: UserInfo = response.json().await.map_err(|_| AuthError::InvalidToken)?;
        let user = User {
            username: info
                .nickname
                .or(info.preferred_username)
                .unwrap_or_else(|| info.email.clone()),
            email: info.email,
        };
        self.users.insert(token, user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn authenticator(server: &MockServer) -> OidcAuthenticator {
        OidcAuthenticator::new(
            reqwest::Client::new(),
            &AuthConfig {
                userinfo_url: format!("{}/userinfo", server.uri()),
            },
        )
    }

    #[tokio::test]
    async fn test_valid_token_resolves_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "email": "viewer@example.com",
                "nickname": "viewer",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = authenticator(&server);
        let user = auth.authenticate("Bearer good").await.unwrap();
        assert_eq!(user.username, "viewer");

        // Cached: the expect(1) above fails the test if a second call goes out.
        auth.authenticate("Bearer good").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let auth = authenticator(&server);
        assert!(matches!(
            auth.authenticate("Bearer bad").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_empty_credential() {
        let server = MockServer::start().await;
        let auth = authenticator(&server);
        assert!(matches!(
            auth.authenticate("").await,
            Err(AuthError::MissingCredentials)
        ));
    }
}
