//! Token endpoint payloads.

use serde::Deserialize;

use crate::error::AuthError;

/// Token response from the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, deserialize_with = "deserialize_expires_in")]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default, rename = "userName")]
    pub user_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Deserializes `expires_in` which can be either a number or a string.
fn deserialize_expires_in<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(u64),
    }

    match Option::<StringOrNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StringOrNumber::Number(n)) => Ok(Some(n)),
        Some(StringOrNumber::String(s)) => s
            .parse::<u64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid expires_in value: {}", s))),
    }
}

/// OAuth error response.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

impl ErrorResponse {
    pub(crate) fn unknown() -> Self {
        Self {
            error: "unknown".to_string(),
            error_description: None,
        }
    }
}

/// Maps OAuth error codes to AuthError variants.
pub(crate) fn map_error_response(error: ErrorResponse) -> AuthError {
    let description = error
        .error_description
        .unwrap_or_else(|| error.error.clone());

    match error.error.as_str() {
        "invalid_grant" | "invalid_client" | "unauthorized_client" => {
            AuthError::InvalidCredentials
        }
        _ => AuthError::Parse(description),
    }
}
