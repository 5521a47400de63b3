use bcrypt::{hash, verify, DEFAULT_COST};

use crate::config::AppConfig;
use crate::db::Store;
use crate::models::user::{Role, User, UserLoginRequest, UserLoginResponse, UserRegistrationRequest};
use crate::utils::error::{AppError, AppResult};
use crate::utils::jwt;

#[derive(Debug, Clone)]
pub struct UserService {
    store: Store,
    jwt_secret: String,
}

impl UserService {
    pub fn new(store: Store, config: &AppConfig) -> Self {
        UserService {
            store,
            jwt_secret: config.jwt_secret.clone(),
        }
    }

    /// Register a new customer account.
    pub async fn register_user(&self, request: UserRegistrationRequest) -> AppResult<i64> {
        let existing = sqlx::query("SELECT id FROM users WHERE email = ?")
            .bind(&request.email)
            .fetch_optional(self.store.pool())
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict("email already registered".into()));
        }

        let hashed_password = hash(request.password.as_bytes(), DEFAULT_COST)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let result = sqlx::query(
            "INSERT INTO users (email, password, full_name, role) VALUES (?, ?, ?, ?)",
        )
        .bind(&request.email)
        .bind(&hashed_password)
        .bind(&request.full_name)
        .bind(Role::Customer)
        .execute(self.store.pool())
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn login_user(&self, request: UserLoginRequest) -> AppResult<UserLoginResponse> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(&request.email)
            .fetch_optional(self.store.pool())
            .await?
            .ok_or_else(|| AppError::AuthError("invalid credentials".into()))?;

        let password_matches = verify(request.password.as_bytes(), &user.password)
            .map_err(|e| AppError::AuthError(e.to_string()))?;
        if !password_matches {
            return Err(AppError::AuthError("invalid credentials".into()));
        }

        let token = jwt::generate_token(user.id, user.role, &self.jwt_secret)
            .map_err(|e| AppError::AuthError(e.to_string()))?;

        Ok(UserLoginResponse {
            token,
            user_id: user.id,
            role: user.role,
        })
    }
}
