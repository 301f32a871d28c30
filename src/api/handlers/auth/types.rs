//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    /// Username or email.
    pub username: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    /// Ready-to-use header value: `Bearer <token>`.
    pub authorization_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AccountResponse {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub roles: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn register_request_round_trips() -> Result<()> {
        let request = RegisterRequest {
            email: "alice@example.com".to_string(),
            username: "alice".to_string(),
            password: "correct horse".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Doe".to_string(),
            phone: "+1 555 0100".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let email = value
            .get("email")
            .and_then(serde_json::Value::as_str)
            .context("missing email")?;
        assert_eq!(email, "alice@example.com");
        let decoded: RegisterRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.username, "alice");
        Ok(())
    }

    #[test]
    fn login_response_uses_authorization_token_key() -> Result<()> {
        let response = LoginResponse {
            authorization_token: "Bearer abc".to_string(),
        };
        let value = serde_json::to_value(&response)?;
        assert_eq!(
            value
                .get("authorization_token")
                .and_then(serde_json::Value::as_str),
            Some("Bearer abc")
        );
        Ok(())
    }
}
