use crate::database::RedisService;
use crate::middleware::auth::AuthenticatedUser;
use crate::user::model::{
    LoginRequest, RequestVerificationCodeRequest, ResetPasswordRequest, SignUpRequest, UserProfile,
    VerificationPurpose,
};
use crate::user::service::UserService;
use crate::utils::error::CustomError;
use crate::utils::uploads::{FileValidator, UploadService, collect_multipart};
use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use chrono::Utc;
use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;

fn username_regex() -> &'static Regex {
    static USERNAME_REGEX: OnceLock<Regex> = OnceLock::new();
    USERNAME_REGEX.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_]{1,20}$").expect("valid regex"))
}

fn validate_username(username: &str) -> Result<(), CustomError> {
    if !username_regex().is_match(username) {
        return Err(CustomError::ValidationError(
            "Username may only contain letters, numbers and underscores (max 20 characters)"
                .to_string(),
        ));
    }
    Ok(())
}

async fn check_rate_limit(
    redis_service: &Option<web::Data<RedisService>>,
    key: &str,
    max_requests: u64,
    window_seconds: u64,
    message: &str,
) -> Result<(), CustomError> {
    if let Some(redis) = redis_service {
        if redis
            .is_rate_limited(key, max_requests, window_seconds)
            .await
            .unwrap_or(false)
        {
            return Err(CustomError::TooManyRequestsError(message.to_string()));
        }
    }
    Ok(())
}

/// Request an email-verification code (pre-signup)
/// POST /users/verification-code
pub async fn request_email_verification_code(
    user_service: web::Data<UserService>,
    redis_service: Option<web::Data<RedisService>>,
    body: web::Json<RequestVerificationCodeRequest>,
) -> Result<HttpResponse, CustomError> {
    check_rate_limit(
        &redis_service,
        &format!("verification-code:{}", body.email),
        3,
        600,
        "Too many verification code requests. Try again later",
    )
    .await?;

    user_service
        .request_verification_code(&body.email, VerificationPurpose::EmailVerification)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Verification code sent",
        "httpStatusCode": 200
    })))
}

/// Request a password-reset code
/// POST /users/reset-password-code
pub async fn request_password_reset_code(
    user_service: web::Data<UserService>,
    redis_service: Option<web::Data<RedisService>>,
    body: web::Json<RequestVerificationCodeRequest>,
) -> Result<HttpResponse, CustomError> {
    check_rate_limit(
        &redis_service,
        &format!("reset-code:{}", body.email),
        3,
        600,
        "Too many reset code requests. Try again later",
    )
    .await?;

    user_service
        .request_verification_code(&body.email, VerificationPurpose::PasswordReset)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Password reset code sent",
        "httpStatusCode": 200
    })))
}

/// Create an account with a previously emailed verification code
/// POST /users/signup
pub async fn sign_up(
    user_service: web::Data<UserService>,
    redis_service: Option<web::Data<RedisService>>,
    body: web::Json<SignUpRequest>,
) -> Result<HttpResponse, CustomError> {
    let body = body.into_inner();

    validate_username(&body.username)?;

    let user = user_service
        .sign_up(body.username, body.email, body.password, body.verification_code)
        .await?;

    let token = user_service
        .issue_token(&user, redis_service.as_ref().map(|data| data.get_ref()))
        .await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "User created successfully",
        "httpStatusCode": 201,
        "token": token,
        "user": UserProfile::from_user(&user, true)
    })))
}

/// POST /users/login
pub async fn login_user(
    user_service: web::Data<UserService>,
    redis_service: Option<web::Data<RedisService>>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, CustomError> {
    check_rate_limit(
        &redis_service,
        &format!("login:{}", body.username),
        8,
        300,
        "Too many login attempts. Try again later",
    )
    .await?;

    let (token, user) = user_service
        .login_fn(&body.username, &body.password, redis_service.as_ref().map(|data| data.get_ref()))
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Login successful",
        "httpStatusCode": 200,
        "token": token,
        "user": UserProfile::from_user(&user, true)
    })))
}

/// POST /users/logout
pub async fn logout_user(
    user: AuthenticatedUser,
    redis_service: Option<web::Data<RedisService>>,
) -> Result<HttpResponse, CustomError> {
    if let Some(redis) = redis_service {
        redis
            .invalidate_session(&user.user_id.to_hex())
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to invalidate session: {}", e))
            })?;
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Logged out",
        "httpStatusCode": 200
    })))
}

/// GET /users/me
pub async fn get_authenticated_user(
    user: AuthenticatedUser,
    user_service: web::Data<UserService>,
) -> Result<HttpResponse, CustomError> {
    let found = user_service
        .get_user_by_id(&user.user_id)
        .await?
        .ok_or_else(|| CustomError::NotFoundError("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(UserProfile::from_user(&found, true)))
}

/// Update the authenticated user's profile. Multipart form with optional
/// `username`, `displayName`, `about` and `profilePic` fields.
/// PATCH /users/me
pub async fn update_authenticated_user(
    user: AuthenticatedUser,
    user_service: web::Data<UserService>,
    payload: Multipart,
) -> Result<HttpResponse, CustomError> {
    let (fields, mut files) = collect_multipart(payload).await?;

    let username = fields.get("username").cloned();
    let display_name = fields.get("displayName").cloned();
    let about = fields.get("about").cloned();

    if let Some(username) = &username {
        validate_username(username)?;
    }
    if let Some(display_name) = &display_name {
        if display_name.chars().count() > 20 {
            return Err(CustomError::ValidationError(
                "Display name must be at most 20 characters".to_string(),
            ));
        }
    }
    if let Some(about) = &about {
        if about.chars().count() > 160 {
            return Err(CustomError::ValidationError(
                "About must be at most 160 characters".to_string(),
            ));
        }
    }

    let profile_pic_url = match files.remove("profilePic") {
        Some(file) => {
            FileValidator::images()
                .validate(&file)
                .map_err(CustomError::ValidationError)?;

            let uploader = UploadService::new().map_err(CustomError::InternalServerError)?;
            let uploaded = uploader
                .upload_image(file.data, &format!("profile-pics/{}", user.user_id.to_hex()))
                .await
                .map_err(CustomError::InternalServerError)?;

            // Same public id on every change; the query string busts caches
            Some(format!(
                "{}?lastupdated={}",
                uploaded.secure_url,
                Utc::now().timestamp_millis()
            ))
        }
        None => None,
    };

    let updated = user_service
        .update_profile(&user.user_id, username, display_name, about, profile_pic_url)
        .await?;

    Ok(HttpResponse::Ok().json(UserProfile::from_user(&updated, true)))
}

/// GET /users/profile/{username}
pub async fn get_user_by_username(
    user_service: web::Data<UserService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let username = path.into_inner();

    let found = user_service
        .get_user_by_username(&username)
        .await?
        .ok_or_else(|| CustomError::NotFoundError("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(UserProfile::from_user(&found, false)))
}

/// POST /users/reset-password
pub async fn reset_password(
    user_service: web::Data<UserService>,
    redis_service: Option<web::Data<RedisService>>,
    body: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse, CustomError> {
    let (token, user) = user_service
        .reset_password(
            &body.email,
            &body.password,
            &body.verification_code,
            redis_service.as_ref().map(|data| data.get_ref()),
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Password reset successfully",
        "httpStatusCode": 200,
        "token": token,
        "user": UserProfile::from_user(&user, true)
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_shape_is_enforced() {
        assert!(validate_username("maria_92").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("way-too-long-username-here").is_err());
        assert!(validate_username("bad space").is_err());
        assert!(validate_username("bad!char").is_err());
    }
}
