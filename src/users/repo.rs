use sqlx::PgPool;
use uuid::Uuid;

use crate::users::repo_types::{NewUser, User, UserUpdate};

const USER_COLUMNS: &str = "id, first_name, last_name, email, password_hash, \
                            mobile_number, role, profile_pic, is_active, created_at";

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn list_all(db: &PgPool) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at"
        ))
        .fetch_all(db)
        .await
    }

    /// Insert a new user. The unique index on `email` arbitrates concurrent
    /// inserts for the same address; callers map the unique violation to an
    /// email-taken validation error.
    pub async fn create(db: &PgPool, new: &NewUser) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (first_name, last_name, email, password_hash, \
                                mobile_number, role, profile_pic) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.mobile_number)
        .bind(new.role)
        .bind(&new.profile_pic)
        .fetch_one(db)
        .await
    }

    /// Apply a partial update; absent fields keep their current value.
    pub async fn update(
        db: &PgPool,
        id: Uuid,
        update: &UserUpdate,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET \
                first_name    = COALESCE($2, first_name), \
                last_name     = COALESCE($3, last_name), \
                mobile_number = COALESCE($4, mobile_number), \
                role          = COALESCE($5, role), \
                password_hash = COALESCE($6, password_hash), \
                profile_pic   = COALESCE($7, profile_pic) \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.mobile_number)
        .bind(update.role)
        .bind(&update.password_hash)
        .bind(&update.profile_pic)
        .fetch_optional(db)
        .await
    }

    /// Hard delete. Returns whether a row was removed.
    pub async fn delete(db: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
