use actix_multipart::Multipart;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::env;
use std::path::Path;

use crate::utils::error::CustomError;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

fn required_env(name: &str) -> Result<String, String> {
    env::var(name).map_err(|_| format!("{} is not set", name))
}

/// Cloudinary credentials loaded from environment variables
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl CloudinaryConfig {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            cloud_name: required_env("CLOUDINARY_CLOUD_NAME")?,
            api_key: required_env("CLOUDINARY_API_KEY")?,
            api_secret: required_env("CLOUDINARY_API_SECRET")?,
        })
    }

    pub fn upload_url(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.cloud_name
        )
    }

    pub fn destroy_url(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/destroy",
            self.cloud_name
        )
    }

    /// Sign a request the way Cloudinary expects: the parameter string in
    /// alphabetical key order, followed by the API secret, SHA-1 hashed.
    fn sign(&self, public_id: &str, timestamp: i64) -> String {
        let to_sign = format!(
            "public_id={}&timestamp={}{}",
            public_id, timestamp, self.api_secret
        );
        let mut hasher = Sha1::new();
        hasher.update(to_sign.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// The subset of the Cloudinary upload response the app reads
#[derive(Debug, Deserialize)]
pub struct CloudinaryUploadResponse {
    pub public_id: String,
    pub secure_url: String,
}

#[derive(Debug, Deserialize)]
struct CloudinaryError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct CloudinaryErrorResponse {
    error: CloudinaryError,
}

/// Image hosting behind the Cloudinary upload API. Public ids are passed in
/// by the caller so a re-upload replaces the previous asset and deletion
/// needs no stored bookkeeping.
pub struct UploadService {
    config: CloudinaryConfig,
    client: reqwest::Client,
}

impl UploadService {
    pub fn new() -> Result<Self, String> {
        Ok(Self::with_config(CloudinaryConfig::from_env()?))
    }

    pub fn with_config(config: CloudinaryConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// The signed fields shared by every authenticated Cloudinary call
    fn signed_form(&self, public_id: &str) -> Form {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = self.config.sign(public_id, timestamp);

        Form::new()
            .text("public_id", public_id.to_owned())
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp.to_string())
            .text("signature", signature)
    }

    /// Upload an image under the given public id (may include a folder path,
    /// e.g. "featured-images/<id>"). Replaces any existing asset with that id.
    pub async fn upload_image(
        &self,
        file_data: Vec<u8>,
        public_id: &str,
    ) -> Result<CloudinaryUploadResponse, String> {
        let file_part = Part::bytes(file_data)
            .file_name(public_id.to_owned())
            .mime_str("application/octet-stream")
            .map_err(|e| format!("Invalid upload part: {}", e))?;

        let form = self.signed_form(public_id).part("file", file_part);

        let response = self
            .client
            .post(self.config.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("Upload request failed: {}", e))?;

        if !response.status().is_success() {
            let failure: CloudinaryErrorResponse = response
                .json()
                .await
                .map_err(|e| format!("Unreadable Cloudinary error: {}", e))?;
            return Err(format!(
                "Cloudinary rejected the upload: {}",
                failure.error.message
            ));
        }

        response
            .json()
            .await
            .map_err(|e| format!("Unreadable Cloudinary response: {}", e))
    }

    /// Delete an image by public id
    pub async fn delete_image(&self, public_id: &str) -> Result<(), String> {
        let response = self
            .client
            .post(self.config.destroy_url())
            .multipart(self.signed_form(public_id))
            .send()
            .await
            .map_err(|e| format!("Destroy request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!(
                "Cloudinary destroy failed with status {}",
                response.status()
            ));
        }

        Ok(())
    }
}

/// A file received through a multipart form
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

impl FileUpload {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }
}

/// Extension and size bounds for an uploaded file
#[derive(Debug, Clone)]
pub struct FileValidator {
    allowed_extensions: &'static [&'static str],
    max_file_size: usize,
}

impl FileValidator {
    /// Validator for uploaded images, max 10MB
    pub fn images() -> Self {
        Self {
            allowed_extensions: IMAGE_EXTENSIONS,
            max_file_size: MAX_IMAGE_BYTES,
        }
    }

    pub fn validate(&self, file: &FileUpload) -> Result<(), String> {
        let extension = file
            .extension()
            .ok_or_else(|| "File has no extension".to_string())?;

        if !self.allowed_extensions.contains(&extension.as_str()) {
            return Err(format!(
                "Unsupported file type '{}'; allowed: {}",
                extension,
                self.allowed_extensions.join(", ")
            ));
        }

        if let Some(content_type) = &file.content_type {
            if !content_type.starts_with("image/") {
                return Err(format!("Unexpected content type '{}'", content_type));
            }
        }

        if file.data.is_empty() {
            return Err("File is empty".to_string());
        }

        if file.size() > self.max_file_size {
            return Err(format!(
                "File exceeds the {} byte limit ({} bytes)",
                self.max_file_size,
                file.size()
            ));
        }

        Ok(())
    }
}

/// Drain a multipart payload into its text fields and file fields, keyed by
/// field name. Fields without a content disposition are skipped.
pub async fn collect_multipart(
    mut payload: Multipart,
) -> Result<(HashMap<String, String>, HashMap<String, FileUpload>), CustomError> {
    let mut fields = HashMap::new();
    let mut files = HashMap::new();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| {
            CustomError::BadRequestError(format!("Error reading multipart field: {}", e))
        })?;

        let content_disposition = match field.content_disposition() {
            Some(cd) => cd,
            None => continue,
        };

        let field_name = match content_disposition.get_name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        let file_name = content_disposition
            .get_filename()
            .map(|f| f.to_string());
        let content_type = field.content_type().map(|ct| ct.to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| {
                CustomError::BadRequestError(format!("Error reading multipart chunk: {}", e))
            })?;
            data.extend_from_slice(&chunk);
        }

        match file_name {
            Some(file_name) => {
                files.insert(
                    field_name,
                    FileUpload {
                        file_name,
                        data,
                        content_type,
                    },
                );
            }
            None => {
                let value = String::from_utf8(data).map_err(|_| {
                    CustomError::BadRequestError(format!(
                        "Field '{}' is not valid UTF-8",
                        field_name
                    ))
                })?;
                fields.insert(field_name, value);
            }
        }
    }

    Ok((fields, files))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: &str, len: usize) -> FileUpload {
        FileUpload {
            file_name: name.to_string(),
            data: vec![0u8; len],
            content_type: None,
        }
    }

    #[test]
    fn extension_is_taken_from_the_file_name() {
        assert_eq!(image("photo.PNG", 1).extension().as_deref(), Some("png"));
        assert!(image("noextension", 1).extension().is_none());
    }

    #[test]
    fn accepts_known_image_extensions() {
        let validator = FileValidator::images();
        assert!(validator.validate(&image("photo.png", 1024)).is_ok());
        assert!(validator.validate(&image("photo.JPG", 1024)).is_ok());
    }

    #[test]
    fn rejects_mismatched_content_type() {
        let mut file = image("photo.png", 1024);
        file.content_type = Some("text/plain".to_string());
        assert!(FileValidator::images().validate(&file).is_err());
    }

    #[test]
    fn rejects_wrong_type_oversize_and_empty() {
        let validator = FileValidator::images();
        assert!(validator.validate(&image("payload.exe", 1024)).is_err());
        assert!(
            validator
                .validate(&image("big.png", 10 * 1024 * 1024 + 1))
                .is_err()
        );
        assert!(validator.validate(&image("empty.png", 0)).is_err());
    }

    #[test]
    fn signature_is_hex_sha1() {
        let config = CloudinaryConfig {
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: "shh".to_string(),
        };
        let signature = config.sign("featured-images/abc", 1700000000);
        assert_eq!(signature.len(), 40);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
