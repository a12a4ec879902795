//! Password and refresh-token grants.

use super::TokenResponse;
use super::common::ErrorResponse;
use super::common::map_error_response;
use crate::error::AuthError;

/// Internal helper for token endpoint calls.
pub(crate) struct TokenExchange<'a> {
    pub http_client: &'a reqwest::Client,
    pub token_url: &'a str,
    pub refresh_token_url: &'a str,
}

impl TokenExchange<'_> {
    /// Exchange a username and password for a token.
    pub async fn password(&self, username: &str, password: &str) -> Result<TokenResponse, AuthError> {
        let params = [
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
        ];

        let response = self
            .http_client
            .post(self.token_url)
            .form(&params)
            .send()
            .await?;

        self.handle_token_response(response).await
    }

    /// Refresh an access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let response = self
            .http_client
            .post(self.refresh_token_url)
            .form(&params)
            .send()
            .await?;

        self.handle_token_response(response)
            .await
            .map_err(|e| match e {
                AuthError::RefreshFailed { .. } => e,
                other => AuthError::RefreshFailed {
                    message: other.to_string(),
                },
            })
    }

    async fn handle_token_response(
        &self,
        response: reqwest::Response,
    ) -> Result<TokenResponse, AuthError> {
        if response.status().is_success() {
            let body = response.text().await?;
            serde_json::from_str(&body).map_err(|e| AuthError::Parse(e.to_string()))
        } else {
            let error_response: ErrorResponse = response
                .json()
                .await
                .unwrap_or_else(|_| ErrorResponse::unknown());
            Err(map_error_response(error_response))
        }
    }
}
