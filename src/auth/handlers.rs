use axum::{
    extract::{DefaultBodyLimit, FromRef, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::auth::dto::{AuthResponse, LoginRequest, OtpSentResponse, RefreshRequest, VerifyOtpRequest};
use crate::auth::extractors::CurrentUser;
use crate::auth::jwt::JwtKeys;
use crate::auth::otp::OtpRegistry;
use crate::auth::password::{hash_password, verify_password};
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::store_profile_pic;
use crate::users::dto::PublicUser;
use crate::users::forms::collect_user_form;
use crate::users::repo_types::{NewUser, Role, User};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/verify-otp", post(verify_otp))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/me", get(get_me))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
}

/// Public registration. Always takes the OTP path; admin no-OTP creation
/// lives behind the admin gate instead.
#[instrument(skip(state, multipart))]
async fn register(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<OtpSentResponse>, ApiError> {
    let (fields, file) = collect_user_form(&mut multipart).await?;
    let form = fields.into_register_form()?;

    if User::find_by_email(&state.db, &form.email).await?.is_some() {
        warn!(email = %form.email, "registration for taken email");
        return Err(ApiError::Validation("email already registered".into()));
    }

    let profile_pic = match &file {
        Some(file) => Some(store_profile_pic(&state, file).await?),
        None => None,
    };

    let code = OtpRegistry::generate();
    let email = form.email.clone();
    state.otps.put(&email, code.clone(), form, profile_pic);

    // Fire-and-forget delivery: a failure is logged, never surfaced, and
    // does not roll back the pending registration.
    let mailer = state.mailer.clone();
    let to = email.clone();
    tokio::spawn(async move {
        if let Err(e) = mailer.send_otp(&to, &code).await {
            warn!(error = %e, email = %to, "otp email delivery failed");
        }
    });

    info!(email = %email, "otp issued for registration");
    Ok(Json(OtpSentResponse {
        message: "OTP sent to email",
    }))
}

/// Turn a pending registration into an active account. The role is always
/// `user`: elevation is never grantable through the OTP path.
#[instrument(skip(state, payload))]
async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    let pending = state.otps.verify(&email, &payload.otp)?;

    let password_hash = hash_password(&pending.form.password)?;
    let user = User::create(
        &state.db,
        &NewUser {
            first_name: pending.form.first_name,
            last_name: pending.form.last_name,
            email,
            password_hash,
            mobile_number: pending.form.mobile_number,
            role: Role::User,
            profile_pic: pending.profile_pic,
        },
    )
    .await?;

    let tokens = JwtKeys::from_ref(&state).issue_pair(&user)?;
    info!(user_id = %user.id, email = %user.email, "registration verified");
    Ok(Json(AuthResponse::new(tokens, user)))
}

const INVALID_CREDENTIALS: &str = "invalid credentials";

/// Unknown email and wrong password answer identically so the endpoint
/// cannot be used to enumerate accounts.
fn authenticate(email: &str, user: Option<User>, password: &str) -> Result<User, ApiError> {
    let Some(user) = user else {
        warn!(email = %email, "login for unknown email");
        return Err(ApiError::Unauthenticated(INVALID_CREDENTIALS.into()));
    };
    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with invalid password");
        return Err(ApiError::Unauthenticated(INVALID_CREDENTIALS.into()));
    }
    Ok(user)
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let found = User::find_by_email(&state.db, &payload.email).await?;
    let user = authenticate(&payload.email, found, &payload.password)?;

    let tokens = JwtKeys::from_ref(&state).issue_pair(&user)?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse::new(tokens, user)))
}

/// Mint a fresh pair from an unexpired refresh token. Tokens are stateless:
/// the presented token stays valid until its own expiry, replaying it is
/// expected behavior.
#[instrument(skip(state, payload))]
async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|_| ApiError::Unauthenticated("invalid refresh token".into()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    let tokens = keys.issue_pair(&user)?;
    Ok(Json(AuthResponse::new(tokens, user)))
}

#[instrument(skip_all)]
async fn get_me(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn make_user(password: &str) -> User {
        User {
            id: Uuid::new_v4(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            password_hash: hash_password(password).expect("hash"),
            mobile_number: None,
            role: Role::User,
            profile_pic: None,
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn login_failure_never_reveals_which_part_was_wrong() {
        let user = make_user("correct-horse");

        let unknown_email = authenticate("ghost@example.com", None, "whatever").unwrap_err();
        let wrong_password =
            authenticate("ada@example.com", Some(user.clone()), "wrong-horse").unwrap_err();

        assert_eq!(unknown_email.code(), "unauthenticated");
        assert_eq!(wrong_password.code(), "unauthenticated");
        assert_eq!(unknown_email.to_string(), wrong_password.to_string());
    }

    #[test]
    fn login_succeeds_with_the_right_password() {
        let user = make_user("correct-horse");
        let authed = authenticate("ada@example.com", Some(user.clone()), "correct-horse")
            .expect("should authenticate");
        assert_eq!(authed.id, user.id);
    }
}
