use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::auth::jwt::JwtKeys;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::repo_types::User;

/// First gate of the guard chain: proves the caller is authenticated and
/// attaches the resolved account. A missing/malformed header, a bad or
/// expired token, and a token whose subject no longer exists all reject the
/// same way.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthenticated("missing authorization header".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthenticated("invalid authorization header".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify_access(token).map_err(|_| {
            warn!("invalid or expired access token");
            ApiError::Unauthenticated("invalid or expired token".into())
        })?;

        // Stale token: the account behind it has been deleted.
        let user = User::find_by_id(&state.db, claims.sub)
            .await?
            .ok_or_else(|| ApiError::Unauthenticated("account no longer exists".into()))?;

        Ok(CurrentUser(user))
    }
}

/// Second gate: authenticated *and* holding an admin tier.
pub struct RequireAdmin(pub User);

#[async_trait]
impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.role.can_manage_users() {
            warn!(user_id = %user.id, role = %user.role, "admin gate rejected");
            return Err(ApiError::Forbidden);
        }
        Ok(RequireAdmin(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use crate::users::repo_types::Role;

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/auth/me");
        if let Some(value) = value {
            builder = builder.header(axum::http::header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn make_user() -> User {
        User {
            id: Uuid::new_v4(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            password_hash: "hash".into(),
            mobile_number: None,
            role: Role::User,
            profile_pic: None,
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn missing_header_is_unauthenticated() {
        let state = AppState::fake();
        let mut parts = parts_with_auth(None);
        let err = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("gate should reject");
        assert_eq!(err.code(), "unauthenticated");
        assert!(err.to_string().contains("missing"));
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_unauthenticated() {
        let state = AppState::fake();
        let mut parts = parts_with_auth(Some("Basic dXNlcjpwdw=="));
        let err = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("gate should reject");
        assert_eq!(err.code(), "unauthenticated");
    }

    #[tokio::test]
    async fn garbage_token_is_unauthenticated() {
        let state = AppState::fake();
        let mut parts = parts_with_auth(Some("Bearer not.a.token"));
        let err = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("gate should reject");
        assert_eq!(err.code(), "unauthenticated");
    }

    #[tokio::test]
    async fn expired_token_is_unauthenticated() {
        let state = AppState::fake();
        // Signed with the fake state's secret but already past its expiry,
        // so the gate rejects before ever touching the database.
        let keys = JwtKeys::new("test-secret", -5, 60);
        let token = keys.sign_access(&make_user()).expect("sign");
        let mut parts = parts_with_auth(Some(&format!("Bearer {token}")));
        let err = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("gate should reject");
        assert_eq!(err.code(), "unauthenticated");
    }
}
