//! Secrets service client.
//!
//! Three calls are exercised by the scenario:
//! - AppRole login, yielding a client token
//! - transit encrypt of a base64 plaintext
//! - transit decrypt of a ciphertext envelope
//!
//! Every call is a single HTTP exchange with no retries. Only a 200 response
//! whose body has the expected shape counts as success.

mod types;

pub use types::*;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::codec;
use crate::config::VaultConfig;
use crate::error::{Error, Failure, Result};

/// Header carrying the client token.
pub const TOKEN_HEADER: &str = "X-Vault-Token";

/// Header carrying the namespace.
pub const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Login path.
pub const LOGIN_PATH: &str = "/v1/auth/approle/login";

/// Operations the scenario drives against the secrets service.
#[async_trait]
pub trait SecretsService: Send + Sync {
    /// Exchange AppRole credentials for a client token.
    async fn login(&self, role_id: &str, secret_id: &str) -> Result<String>;

    /// Encrypt plaintext with the transit key, returning the ciphertext envelope.
    async fn encrypt(&self, token: &str, plaintext: &[u8]) -> Result<String>;

    /// Decrypt a ciphertext envelope with the transit key.
    async fn decrypt(&self, token: &str, ciphertext: &str) -> Result<Vec<u8>>;
}

/// HTTP client for the AppRole and transit endpoints.
#[derive(Debug, Clone)]
pub struct TransitClient {
    http: reqwest::Client,
    base_url: String,
    transit_key: String,
    namespace: Option<String>,
}

impl TransitClient {
    /// Create a client from connection settings.
    pub fn new(config: &VaultConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("vaultload/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_http(http, config))
    }

    /// Create a client around an existing `reqwest::Client`.
    ///
    /// Clones of a `reqwest::Client` share one connection pool, so virtual
    /// users built from the same client reuse connections.
    pub fn with_http(http: reqwest::Client, config: &VaultConfig) -> Self {
        Self {
            http,
            base_url: config.addr.trim_end_matches('/').to_string(),
            transit_key: config.transit_key.clone(),
            namespace: config.namespace.clone().filter(|ns| !ns.is_empty()),
        }
    }

    /// Base address requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Transit key name.
    pub fn transit_key(&self) -> &str {
        &self.transit_key
    }

    /// Namespace header value, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Full URL of the encrypt endpoint.
    pub fn encrypt_url(&self) -> String {
        format!("{}/v1/transit/encrypt/{}", self.base_url, self.transit_key)
    }

    /// Full URL of the decrypt endpoint.
    pub fn decrypt_url(&self) -> String {
        format!("{}/v1/transit/decrypt/{}", self.base_url, self.transit_key)
    }

    /// Full URL of the login endpoint.
    pub fn login_url(&self) -> String {
        format!("{}{LOGIN_PATH}", self.base_url)
    }

    async fn post<B, R>(&self, url: String, token: Option<&str>, body: &B) -> std::result::Result<R, Failure>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        trace!("POST {}", url);

        // `json` sets Content-Type: application/json
        let mut request = self.http.post(url).json(body);
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token);
        }
        if let Some(ref namespace) = self.namespace {
            request = request.header(NAMESPACE_HEADER, namespace);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Failure::Transport(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Failure::Transport(e.to_string()))?;

        if status != StatusCode::OK {
            return Err(status_failure(status, &bytes));
        }

        serde_json::from_slice(&bytes).map_err(|e| Failure::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl SecretsService for TransitClient {
    async fn login(&self, role_id: &str, secret_id: &str) -> Result<String> {
        let body = LoginRequest { role_id, secret_id };
        let response: LoginResponse = self
            .post(self.login_url(), None, &body)
            .await
            .map_err(Error::Auth)?;

        if response.auth.client_token.is_empty() {
            return Err(Error::Auth(Failure::MalformedResponse(
                "empty client_token".into(),
            )));
        }

        Ok(response.auth.client_token)
    }

    async fn encrypt(&self, token: &str, plaintext: &[u8]) -> Result<String> {
        let encoded = codec::encode(plaintext);
        let body = EncryptRequest {
            plaintext: &encoded,
        };
        let response: EncryptResponse = self
            .post(self.encrypt_url(), Some(token), &body)
            .await
            .map_err(Error::Encrypt)?;

        Ok(response.data.ciphertext)
    }

    async fn decrypt(&self, token: &str, ciphertext: &str) -> Result<Vec<u8>> {
        let body = DecryptRequest { ciphertext };
        let response: DecryptResponse = self
            .post(self.decrypt_url(), Some(token), &body)
            .await
            .map_err(Error::Decrypt)?;

        codec::decode(&response.data.plaintext).map_err(|e| {
            Error::Decrypt(Failure::MalformedResponse(format!(
                "plaintext is not base64: {e}"
            )))
        })
    }
}

/// Build a status failure, folding in the service's error messages if the
/// body carries them.
fn status_failure(status: StatusCode, body: &[u8]) -> Failure {
    let mut reason = status.canonical_reason().unwrap_or_default().to_string();

    if let Ok(err) = serde_json::from_slice::<ErrorResponse>(body) {
        if !err.errors.is_empty() {
            if !reason.is_empty() {
                reason.push_str(": ");
            }
            reason.push_str(&err.errors.join("; "));
        }
    }

    Failure::Status {
        code: status.as_u16(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(addr: &str, namespace: Option<&str>) -> VaultConfig {
        VaultConfig {
            addr: addr.into(),
            namespace: namespace.map(Into::into),
            transit_key: "bench".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_urls() {
        let client = TransitClient::new(&config("http://127.0.0.1:8200/", None)).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:8200");
        assert_eq!(
            client.login_url(),
            "http://127.0.0.1:8200/v1/auth/approle/login"
        );
        assert_eq!(
            client.encrypt_url(),
            "http://127.0.0.1:8200/v1/transit/encrypt/bench"
        );
        assert_eq!(
            client.decrypt_url(),
            "http://127.0.0.1:8200/v1/transit/decrypt/bench"
        );
    }

    #[test]
    fn test_empty_namespace_dropped() {
        let client = TransitClient::new(&config("http://vault:8200", Some(""))).unwrap();
        assert!(client.namespace().is_none());

        let client = TransitClient::new(&config("http://vault:8200", Some("ns1"))).unwrap();
        assert_eq!(client.namespace(), Some("ns1"));
    }

    #[test]
    fn test_status_failure_reason() {
        let f = status_failure(StatusCode::FORBIDDEN, br#"{"errors":["permission denied"]}"#);
        assert_eq!(
            f,
            Failure::Status {
                code: 403,
                reason: "Forbidden: permission denied".into()
            }
        );

        let f = status_failure(StatusCode::INTERNAL_SERVER_ERROR, b"<html>oops</html>");
        assert_eq!(
            f,
            Failure::Status {
                code: 500,
                reason: "Internal Server Error".into()
            }
        );
    }
}
