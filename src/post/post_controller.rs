use crate::middleware::auth::AuthenticatedUser;
use crate::post::post_model::{GetBlogPostsQuery, Post, PostInput};
use crate::post::post_service::PostService;
use crate::utils::error::CustomError;
use crate::utils::uploads::{FileValidator, UploadService, collect_multipart};
use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn slug_regex() -> &'static Regex {
    static SLUG_REGEX: OnceLock<Regex> = OnceLock::new();
    SLUG_REGEX.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]{1,100}$").expect("valid regex"))
}

fn post_input_from_fields(fields: &HashMap<String, String>) -> Result<PostInput, CustomError> {
    let field = |name: &str| -> Result<String, CustomError> {
        fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| CustomError::BadRequestError(format!("Missing field '{}'", name)))
    };

    let input = PostInput {
        slug: field("slug")?,
        title: field("title")?,
        summary: field("summary")?,
        body: field("body")?,
    };

    if !slug_regex().is_match(&input.slug) {
        return Err(CustomError::ValidationError(
            "Slug may only contain letters, numbers, dashes and underscores (max 100 characters)"
                .to_string(),
        ));
    }
    if input.title.chars().count() > 100 {
        return Err(CustomError::ValidationError(
            "Title must be at most 100 characters".to_string(),
        ));
    }
    if input.summary.chars().count() > 300 {
        return Err(CustomError::ValidationError(
            "Summary must be at most 300 characters".to_string(),
        ));
    }

    Ok(input)
}

/// GET /posts?authorId=&page=
pub async fn get_blog_posts(
    post_service: web::Data<PostService>,
    query: web::Query<GetBlogPostsQuery>,
) -> Result<HttpResponse, CustomError> {
    let author = match &query.author_id {
        Some(author_id) => Some(
            ObjectId::parse_str(author_id)
                .map_err(|_| CustomError::BadRequestError("Invalid author ID".to_string()))?,
        ),
        None => None,
    };

    let page = post_service
        .get_blog_posts(author, query.page.unwrap_or(1))
        .await?;

    Ok(HttpResponse::Ok().json(page))
}

/// GET /posts/slugs
pub async fn get_all_blog_post_slugs(
    post_service: web::Data<PostService>,
) -> Result<HttpResponse, CustomError> {
    let slugs = post_service.get_all_slugs().await?;
    Ok(HttpResponse::Ok().json(slugs))
}

/// GET /posts/post/{slug}
pub async fn get_blog_post_by_slug(
    post_service: web::Data<PostService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let post = post_service.get_post_by_slug(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(post))
}

/// Create a post from a multipart form carrying the text fields and the
/// featured image.
/// POST /posts
pub async fn create_blog_post(
    user: AuthenticatedUser,
    post_service: web::Data<PostService>,
    payload: Multipart,
) -> Result<HttpResponse, CustomError> {
    let (fields, mut files) = collect_multipart(payload).await?;
    let input = post_input_from_fields(&fields)?;

    let featured_image = files.remove("featuredImage").ok_or_else(|| {
        CustomError::BadRequestError("A featured image is required".to_string())
    })?;
    FileValidator::images()
        .validate(&featured_image)
        .map_err(CustomError::ValidationError)?;

    // Check the slug before paying for the upload
    post_service.ensure_slug_available(&input.slug, None).await?;

    let blog_post_id = ObjectId::new();

    let uploader = UploadService::new().map_err(CustomError::InternalServerError)?;
    let uploaded = uploader
        .upload_image(
            featured_image.data,
            &format!("featured-images/{}", blog_post_id.to_hex()),
        )
        .await
        .map_err(CustomError::InternalServerError)?;

    let post = Post {
        id: blog_post_id,
        slug: input.slug,
        title: input.title,
        summary: input.summary,
        body: input.body,
        featured_image_url: uploaded.secure_url,
        author: user.user_id,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let created = post_service.create_post(post).await?;

    Ok(HttpResponse::Created().json(created))
}

/// PATCH /posts/{blog_post_id}
pub async fn update_blog_post(
    user: AuthenticatedUser,
    post_service: web::Data<PostService>,
    path: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse, CustomError> {
    let blog_post_id = ObjectId::parse_str(path.into_inner())
        .map_err(|_| CustomError::BadRequestError("Invalid post ID".to_string()))?;

    let (fields, mut files) = collect_multipart(payload).await?;
    let input = post_input_from_fields(&fields)?;

    let featured_image_url = match files.remove("featuredImage") {
        Some(file) => {
            FileValidator::images()
                .validate(&file)
                .map_err(CustomError::ValidationError)?;

            let uploader = UploadService::new().map_err(CustomError::InternalServerError)?;
            let uploaded = uploader
                .upload_image(
                    file.data,
                    &format!("featured-images/{}", blog_post_id.to_hex()),
                )
                .await
                .map_err(CustomError::InternalServerError)?;

            // Replaced in place; the query string busts caches
            Some(format!(
                "{}?lastupdated={}",
                uploaded.secure_url,
                Utc::now().timestamp_millis()
            ))
        }
        None => None,
    };

    let updated = post_service
        .update_post(&blog_post_id, &user.user_id, input, featured_image_url)
        .await?;

    Ok(HttpResponse::Ok().json(updated))
}

/// DELETE /posts/{blog_post_id}
pub async fn delete_blog_post(
    user: AuthenticatedUser,
    post_service: web::Data<PostService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let blog_post_id = ObjectId::parse_str(path.into_inner())
        .map_err(|_| CustomError::BadRequestError("Invalid post ID".to_string()))?;

    let deleted = post_service
        .delete_post(&blog_post_id, &user.user_id)
        .await?;

    // Best-effort cleanup of the hosted image; the post itself is gone
    if let Ok(uploader) = UploadService::new() {
        if let Err(e) = uploader
            .delete_image(&format!("featured-images/{}", deleted.id.to_hex()))
            .await
        {
            log::warn!("Failed to delete featured image for {}: {}", deleted.id, e);
        }
    }

    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn accepts_complete_input() {
        let input = post_input_from_fields(&fields(&[
            ("slug", "my-first-post"),
            ("title", "My first post"),
            ("summary", "A short summary"),
            ("body", "Hello world"),
        ]))
        .unwrap();
        assert_eq!(input.slug, "my-first-post");
    }

    #[test]
    fn rejects_missing_or_blank_fields() {
        assert!(
            post_input_from_fields(&fields(&[
                ("slug", "my-first-post"),
                ("title", "My first post"),
                ("summary", "A short summary"),
            ]))
            .is_err()
        );
        assert!(
            post_input_from_fields(&fields(&[
                ("slug", "my-first-post"),
                ("title", "   "),
                ("summary", "A short summary"),
                ("body", "Hello world"),
            ]))
            .is_err()
        );
    }

    #[test]
    fn rejects_malformed_slug() {
        assert!(
            post_input_from_fields(&fields(&[
                ("slug", "not a slug!"),
                ("title", "t"),
                ("summary", "s"),
                ("body", "b"),
            ]))
            .is_err()
        );
    }
}
