use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_pic_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a verification code unlocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VerificationPurpose {
    EmailVerification,
    PasswordReset,
}

impl VerificationPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationPurpose::EmailVerification => "emailVerification",
            VerificationPurpose::PasswordReset => "passwordReset",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationCode {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub email: String,
    pub code: String,
    pub purpose: VerificationPurpose,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user, embedded in responses and author joins. The email
/// is only present on the owner's own profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_pic_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn from_user(user: &User, include_email: bool) -> Self {
        UserProfile {
            id: user.id.to_hex(),
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            about: user.about.clone(),
            profile_pic_url: user.profile_pic_url.clone(),
            email: include_email.then(|| user.email.clone()),
            created_at: user.created_at,
        }
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub verification_code: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestVerificationCodeRequest {
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub password: String,
    pub verification_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_hides_email_unless_requested() {
        let user = User {
            id: ObjectId::new(),
            username: "maria".to_string(),
            email: "maria@example.com".to_string(),
            password: "hash".to_string(),
            display_name: Some("Maria".to_string()),
            about: None,
            profile_pic_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let public = serde_json::to_value(UserProfile::from_user(&user, false)).unwrap();
        assert!(public.get("email").is_none());
        assert!(public.get("password").is_none());
        assert_eq!(public["_id"], user.id.to_hex());
        assert_eq!(public["displayName"], "Maria");

        let own = serde_json::to_value(UserProfile::from_user(&user, true)).unwrap();
        assert_eq!(own["email"], "maria@example.com");
    }

    #[test]
    fn verification_purpose_matches_stored_representation() {
        let json = serde_json::to_value(VerificationPurpose::PasswordReset).unwrap();
        assert_eq!(json, VerificationPurpose::PasswordReset.as_str());
    }
}
