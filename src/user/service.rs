use crate::database::{DATABASE_NAME, RedisService};
use crate::middleware::auth::{create_token, create_token_with_session};
use crate::user::model::{User, VerificationCode, VerificationPurpose};
use crate::utils::email::EmailService;
use crate::utils::error::CustomError;
use crate::utils::helpers::{VERIFICATION_CODE_EXPIRATION_MINUTES, generate_verification_code};
use crate::utils::{hashing, password_validation};
use chrono::{Duration, Utc};
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::{Collation, CollationStrength};
use mongodb::{Client, Collection};

pub struct UserService {
    collection: Collection<User>,
    code_collection: Collection<VerificationCode>,
}

impl UserService {
    pub fn new(client: &Client) -> Self {
        let db = client.database(DATABASE_NAME);
        let collection = db.collection::<User>("users");
        let code_collection = db.collection::<VerificationCode>("verification_codes");

        UserService {
            collection,
            code_collection,
        }
    }

    /// Issue a verification code for the given email, invalidating any code
    /// previously issued for the same purpose, and send it out.
    pub async fn request_verification_code(
        &self,
        email: &str,
        purpose: VerificationPurpose,
    ) -> Result<(), CustomError> {
        match purpose {
            VerificationPurpose::EmailVerification => {
                if self.email_exists(email).await? {
                    return Err(CustomError::ConflictError(
                        "A user with this email address already exists".to_string(),
                    ));
                }
            }
            VerificationPurpose::PasswordReset => {
                if !self.email_exists(email).await? {
                    return Err(CustomError::NotFoundError(
                        "No user found for this email address".to_string(),
                    ));
                }
            }
        }

        let code = self.create_code(email, purpose).await?;

        let email_service = EmailService::new()
            .map_err(|e| CustomError::InternalServerError(format!("Email service error: {}", e)))?;

        let send_result = match purpose {
            VerificationPurpose::EmailVerification => {
                email_service.send_verification_email(email, &code).await
            }
            VerificationPurpose::PasswordReset => {
                email_service.send_password_reset_email(email, &code).await
            }
        };
        send_result
            .map_err(|e| CustomError::InternalServerError(format!("Failed to send email: {}", e)))?;

        Ok(())
    }

    async fn create_code(
        &self,
        email: &str,
        purpose: VerificationPurpose,
    ) -> Result<String, CustomError> {
        let code = generate_verification_code();

        // Supersede any unused codes for the same email and purpose
        let _ = self
            .code_collection
            .update_many(
                doc! { "email": email, "purpose": purpose.as_str(), "isUsed": false },
                doc! { "$set": { "isUsed": true } },
            )
            .await;

        let record = VerificationCode {
            id: ObjectId::new(),
            email: email.to_string(),
            code: code.clone(),
            purpose,
            expires_at: Utc::now() + Duration::minutes(VERIFICATION_CODE_EXPIRATION_MINUTES),
            is_used: false,
            created_at: Utc::now(),
        };

        self.code_collection
            .insert_one(record)
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;

        Ok(code)
    }

    /// Check a code and consume it. Single use.
    async fn verify_code(
        &self,
        email: &str,
        code: &str,
        purpose: VerificationPurpose,
    ) -> Result<(), CustomError> {
        let record = self
            .code_collection
            .find_one(doc! {
                "email": email,
                "code": code,
                "purpose": purpose.as_str(),
                "isUsed": false
            })
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?
            .ok_or_else(|| {
                CustomError::BadRequestError("Invalid verification code".to_string())
            })?;

        if record.expires_at < Utc::now() {
            return Err(CustomError::BadRequestError(
                "Verification code has expired".to_string(),
            ));
        }

        self.code_collection
            .update_one(
                doc! { "_id": record.id },
                doc! { "$set": { "isUsed": true } },
            )
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;

        Ok(())
    }

    pub async fn sign_up(
        &self,
        username: String,
        email: String,
        password: String,
        verification_code: String,
    ) -> Result<User, CustomError> {
        if self.username_exists(&username).await? {
            return Err(CustomError::ConflictError(
                "Username already taken".to_string(),
            ));
        }

        if self.email_exists(&email).await? {
            return Err(CustomError::ConflictError(
                "Email already exists".to_string(),
            ));
        }

        password_validation::validate_password(&password)?;

        self.verify_code(&email, &verification_code, VerificationPurpose::EmailVerification)
            .await?;

        let hashed_password = hashing::hash_password(&password)
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;

        let new_user = User {
            id: ObjectId::new(),
            display_name: Some(username.clone()),
            username,
            email,
            password: hashed_password,
            about: None,
            profile_pic_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        self.collection
            .insert_one(&new_user)
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;

        Ok(new_user)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, CustomError> {
        let count = self
            .collection
            .count_documents(doc! { "email": email })
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;
        Ok(count > 0)
    }

    async fn username_exists(&self, username: &str) -> Result<bool, CustomError> {
        // Case-insensitive match so "Maria" cannot shadow "maria"
        let collation = Collation::builder()
            .locale("en")
            .strength(CollationStrength::Secondary)
            .build();
        let count = self
            .collection
            .count_documents(doc! { "username": username })
            .collation(collation)
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;
        Ok(count > 0)
    }

    pub async fn authenticate_user(
        &self,
        username: &str,
        password: &str,
    ) -> Result<User, CustomError> {
        let user = self
            .collection
            .find_one(doc! { "username": username })
            .await
            .map_err(|_| CustomError::InternalServerError("Database error".to_string()))?
            .ok_or_else(|| CustomError::UnauthorizedError("Invalid credentials".to_string()))?;

        if !hashing::verify_password(password, &user.password)
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?
        {
            return Err(CustomError::UnauthorizedError(
                "Invalid credentials".to_string(),
            ));
        }

        Ok(user)
    }

    pub async fn login_fn(
        &self,
        username: &str,
        password: &str,
        redis_service: Option<&RedisService>,
    ) -> Result<(String, User), CustomError> {
        let user = self.authenticate_user(username, password).await?;

        let token = self.issue_token(&user, redis_service).await?;

        Ok((token, user))
    }

    pub async fn issue_token(
        &self,
        user: &User,
        redis_service: Option<&RedisService>,
    ) -> Result<String, CustomError> {
        match redis_service {
            Some(redis) => create_token_with_session(&user.id.to_hex(), redis).await,
            None => create_token(&user.id.to_hex()),
        }
    }

    pub async fn get_user_by_id(&self, user_id: &ObjectId) -> Result<Option<User>, CustomError> {
        self.collection
            .find_one(doc! { "_id": user_id })
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))
    }

    pub async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, CustomError> {
        self.collection
            .find_one(doc! { "username": username })
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))
    }

    /// Apply a partial profile update; `None` fields are left untouched.
    pub async fn update_profile(
        &self,
        user_id: &ObjectId,
        username: Option<String>,
        display_name: Option<String>,
        about: Option<String>,
        profile_pic_url: Option<String>,
    ) -> Result<User, CustomError> {
        let current = self
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| CustomError::NotFoundError("User not found".to_string()))?;

        if let Some(new_username) = &username {
            if *new_username != current.username && self.username_exists(new_username).await? {
                return Err(CustomError::ConflictError(
                    "Username already taken".to_string(),
                ));
            }
        }

        let mut set_doc = doc! { "updatedAt": Utc::now().to_rfc3339() };
        if let Some(username) = username {
            set_doc.insert("username", username);
        }
        if let Some(display_name) = display_name {
            set_doc.insert("displayName", display_name);
        }
        if let Some(about) = about {
            set_doc.insert("about", about);
        }
        if let Some(profile_pic_url) = profile_pic_url {
            set_doc.insert("profilePicUrl", profile_pic_url);
        }

        self.collection
            .find_one_and_update(doc! { "_id": user_id }, doc! { "$set": set_doc })
            .return_document(mongodb::options::ReturnDocument::After)
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?
            .ok_or_else(|| CustomError::NotFoundError("User not found".to_string()))
    }

    /// Set a new password after a reset code check, then revoke every live
    /// session and hand back a fresh one.
    pub async fn reset_password(
        &self,
        email: &str,
        password: &str,
        verification_code: &str,
        redis_service: Option<&RedisService>,
    ) -> Result<(String, User), CustomError> {
        let user = self
            .collection
            .find_one(doc! { "email": email })
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?
            .ok_or_else(|| {
                CustomError::NotFoundError("No user found for this email address".to_string())
            })?;

        self.verify_code(email, verification_code, VerificationPurpose::PasswordReset)
            .await?;

        password_validation::validate_password(password)?;

        let hashed_password = hashing::hash_password(password)
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;

        let updated = self
            .collection
            .find_one_and_update(
                doc! { "_id": user.id },
                doc! { "$set": {
                    "password": hashed_password,
                    "updatedAt": Utc::now().to_rfc3339()
                } },
            )
            .return_document(mongodb::options::ReturnDocument::After)
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?
            .ok_or_else(|| CustomError::NotFoundError("User not found".to_string()))?;

        if let Some(redis) = redis_service {
            redis.invalidate_all_sessions(&updated.id.to_hex()).await.map_err(|e| {
                CustomError::InternalServerError(format!("Failed to revoke sessions: {}", e))
            })?;
        }

        let token = self.issue_token(&updated, redis_service).await?;

        Ok((token, updated))
    }
}
