use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use validator::Validate;

use crate::models::user::{
    RegisterResponse, UserLoginRequest, UserLoginResponse, UserRegistrationRequest,
};
use crate::services::user_service::UserService;
use crate::utils::error::AppError;

/// Register a new customer account.
#[openapi(tag = "Users")]
#[post("/users/register", format = "json", data = "<request>")]
pub async fn register(
    request: Json<UserRegistrationRequest>,
    user_service: &State<UserService>,
) -> Result<Json<RegisterResponse>, AppError> {
    let request = request.into_inner();
    request
        .validate()
        .map_err(|e| AppError::InvalidArgument(e.to_string()))?;
    let user_id = user_service.register_user(request).await?;
    Ok(Json(RegisterResponse {
        user_id,
        status: "success".to_string(),
    }))
}

/// Login and receive a bearer token.
#[openapi(tag = "Users")]
#[post("/users/login", format = "json", data = "<request>")]
pub async fn login(
    request: Json<UserLoginRequest>,
    user_service: &State<UserService>,
) -> Result<Json<UserLoginResponse>, AppError> {
    let response = user_service.login_user(request.into_inner()).await?;
    Ok(Json(response))
}
