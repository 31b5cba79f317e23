use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::extractors::RequireAdmin;
use crate::auth::password::hash_password;
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::store_profile_pic;
use crate::users::dto::PublicUser;
use crate::users::forms::collect_user_form;
use crate::users::repo_types::{NewUser, User, UserUpdate};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
}

#[instrument(skip_all)]
async fn list_users(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    let users = User::list_all(&state.db).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

/// Admin-created accounts skip OTP entirely and may carry an elevated role
/// straight from the payload.
#[instrument(skip_all, fields(admin_id = %admin.id))]
async fn create_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    let (fields, file) = collect_user_form(&mut multipart).await?;
    let form = fields.into_register_form()?;

    if User::find_by_email(&state.db, &form.email).await?.is_some() {
        warn!(email = %form.email, "admin create for taken email");
        return Err(ApiError::Validation("email already registered".into()));
    }

    let profile_pic = match &file {
        Some(file) => Some(store_profile_pic(&state, file).await?),
        None => None,
    };

    let password_hash = hash_password(&form.password)?;
    let user = User::create(
        &state.db,
        &NewUser {
            first_name: form.first_name,
            last_name: form.last_name,
            email: form.email,
            password_hash,
            mobile_number: form.mobile_number,
            role: form.role,
            profile_pic,
        },
    )
    .await?;

    info!(user_id = %user.id, role = %user.role, "user created by admin");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip_all, fields(user_id = %id))]
async fn get_user(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    Ok(Json(user.into()))
}

/// Partial update: only provided fields change. The password is re-hashed
/// only when a new one is sent; the picture is replaced only when a new
/// file is attached.
#[instrument(skip_all, fields(admin_id = %admin.id, user_id = %id))]
async fn update_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<PublicUser>, ApiError> {
    let existing = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    let (fields, file) = collect_user_form(&mut multipart).await?;

    let password_hash = match fields.password.as_deref() {
        Some(plain) if !plain.is_empty() => Some(hash_password(plain)?),
        _ => None,
    };
    let profile_pic = match &file {
        Some(file) => Some(store_profile_pic(&state, file).await?),
        None => None,
    };

    let update = UserUpdate {
        first_name: fields.first_name,
        last_name: fields.last_name,
        mobile_number: fields.mobile_number,
        role: fields.role,
        password_hash,
        profile_pic,
    };

    let user = User::update(&state.db, id, &update)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    // The replaced picture is cleaned up best-effort; the update itself
    // already committed.
    if update.profile_pic.is_some() {
        if let Some(old) = existing.profile_pic {
            if let Err(e) = state.storage.delete(&old).await {
                warn!(error = %e, path = %old, "failed to remove replaced profile picture");
            }
        }
    }

    info!(user_id = %user.id, "user updated by admin");
    Ok(Json(user.into()))
}

#[instrument(skip_all, fields(admin_id = %admin.id, user_id = %id))]
async fn delete_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !User::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("user not found".into()));
    }
    info!(user_id = %id, "user deleted by admin");
    Ok(Json(serde_json::json!({ "message": "user deleted" })))
}
