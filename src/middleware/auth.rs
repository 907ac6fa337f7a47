use std::env;

use crate::database::RedisService;
use crate::utils::error::CustomError;
use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest, web};
use actix_web::http::header::Header;
use actix_web_httpauth::headers::authorization::{Authorization, Bearer};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{DecodingKey, EncodingKey, Validation, decode, encode};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Session lifetime: 24 hours
const TOKEN_TTL_SECONDS: u64 = 86400;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub id: String,
    pub exp: usize,
}

fn jwt_secret() -> String {
    env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string())
}

pub fn encode_token(user_id: &str, secret: &str) -> Result<String, CustomError> {
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::seconds(TOKEN_TTL_SECONDS as i64))
        .ok_or_else(|| CustomError::InternalServerError("Invalid expiry timestamp".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        id: user_id.to_owned(),
        exp: expiration,
    };

    encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| CustomError::InternalServerError("Token generation failed".to_string()))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, CustomError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| CustomError::UnauthenticatedError("Invalid token".to_string()))
}

/// Create a JWT and record the session in Redis
pub async fn create_token_with_session(
    user_id: &str,
    redis_service: &RedisService,
) -> Result<String, CustomError> {
    let token = encode_token(user_id, &jwt_secret())?;

    redis_service
        .store_session(user_id, &token, TOKEN_TTL_SECONDS)
        .await
        .map_err(|e| CustomError::InternalServerError(format!("Failed to store session: {}", e)))?;

    Ok(token)
}

/// Create a JWT without a Redis session record (degraded mode)
pub fn create_token(user_id: &str) -> Result<String, CustomError> {
    encode_token(user_id, &jwt_secret())
}

/// The authenticated principal for a request, resolved from the bearer token
/// and the Redis session record. Handlers take this as a parameter and pass
/// the id into service calls; there is no ambient current-user state.
///
/// When Redis is not registered (or unreachable) validation degrades to
/// JWT-only, matching the connection fallback at startup.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: ObjectId,
}

impl FromRequest for AuthenticatedUser {
    type Error = CustomError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let auth = Authorization::<Bearer>::parse(&req).map_err(|_| {
                CustomError::UnauthenticatedError("Missing bearer token".to_string())
            })?;
            let bearer = auth.into_scheme();
            let token = bearer.token().to_string();

            let claims = decode_token(&token, &jwt_secret())?;

            if let Some(redis_service) = req.app_data::<web::Data<RedisService>>() {
                match redis_service.validate_session(&token).await {
                    Ok(Some(stored_user_id)) if stored_user_id == claims.id => {}
                    Ok(_) => {
                        return Err(CustomError::UnauthenticatedError(
                            "Session expired or invalid".to_string(),
                        ));
                    }
                    // Redis error: fall back to JWT-only validation
                    Err(_) => {}
                }
            }

            let user_id = ObjectId::parse_str(&claims.id).map_err(|_| {
                CustomError::UnauthenticatedError("Invalid user id in token".to_string())
            })?;

            Ok(AuthenticatedUser { user_id })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_preserves_user_id() {
        let user_id = ObjectId::new().to_hex();
        let token = encode_token(&user_id, "test-secret").unwrap();
        let claims = decode_token(&token, "test-secret").unwrap();
        assert_eq!(claims.id, user_id);
    }

    #[test]
    fn decode_rejects_wrong_secret() {
        let token = encode_token("someone", "secret-a").unwrap();
        assert!(decode_token(&token, "secret-b").is_err());
    }
}
