use serde::{Deserialize, Serialize};

use crate::auth::jwt::TokenPair;
use crate::users::dto::PublicUser;
use crate::users::repo_types::User;

/// Request body for OTP verification.
#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Returned after successful registration, login or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

impl AuthResponse {
    pub fn new(tokens: TokenPair, user: User) -> Self {
        Self {
            access_token: tokens.access,
            refresh_token: tokens.refresh,
            user: user.into(),
        }
    }
}

/// Returned when a registration attempt is parked behind an OTP.
#[derive(Debug, Serialize)]
pub struct OtpSentResponse {
    pub message: &'static str,
}
