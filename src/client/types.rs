//! Request and response bodies for the secrets service HTTP API.

use serde::{Deserialize, Serialize};

/// `POST /v1/auth/approle/login` request.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub role_id: &'a str,
    pub secret_id: &'a str,
}

/// `POST /v1/auth/approle/login` response.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub auth: AuthInfo,
}

/// Token issued by a login.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthInfo {
    pub client_token: String,
    #[serde(default)]
    pub accessor: Option<String>,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default)]
    pub policies: Vec<String>,
}

/// `POST /v1/transit/encrypt/{key}` request.
#[derive(Debug, Clone, Serialize)]
pub struct EncryptRequest<'a> {
    /// Base64 of the plaintext.
    pub plaintext: &'a str,
}

/// `POST /v1/transit/encrypt/{key}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct EncryptResponse {
    pub data: EncryptData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncryptData {
    pub ciphertext: String,
    #[serde(default)]
    pub key_version: Option<u64>,
}

/// `POST /v1/transit/decrypt/{key}` request.
#[derive(Debug, Clone, Serialize)]
pub struct DecryptRequest<'a> {
    pub ciphertext: &'a str,
}

/// `POST /v1/transit/decrypt/{key}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct DecryptResponse {
    pub data: DecryptData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecryptData {
    /// Base64 of the plaintext.
    pub plaintext: String,
}

/// Error body returned with non-200 responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub errors: Vec<String>,
}
