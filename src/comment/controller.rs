use crate::comment::model::{CreateCommentRequest, GetCommentsQuery, UpdateCommentRequest};
use crate::comment::service::CommentService;
use crate::middleware::auth::AuthenticatedUser;
use crate::utils::error::CustomError;
use actix_web::{HttpResponse, web};
use mongodb::bson::oid::ObjectId;

const COMMENT_MAX_LENGTH: usize = 600;

fn parse_object_id(value: &str, label: &str) -> Result<ObjectId, CustomError> {
    ObjectId::parse_str(value)
        .map_err(|_| CustomError::BadRequestError(format!("Invalid {}", label)))
}

fn parse_cursor(query: &GetCommentsQuery) -> Result<Option<ObjectId>, CustomError> {
    query
        .continue_after_id
        .as_deref()
        .map(|id| parse_object_id(id, "continueAfterId"))
        .transpose()
}

fn validate_comment_text(text: &str) -> Result<(), CustomError> {
    if text.trim().is_empty() {
        return Err(CustomError::BadRequestError(
            "Comment text cannot be empty".to_string(),
        ));
    }
    if text.chars().count() > COMMENT_MAX_LENGTH {
        return Err(CustomError::ValidationError(format!(
            "Comment text must be at most {} characters",
            COMMENT_MAX_LENGTH
        )));
    }
    Ok(())
}

/// List a post's top-level comments
/// GET /posts/{blog_post_id}/comments?continueAfterId=
pub async fn get_comments_for_blog_post(
    comment_service: web::Data<CommentService>,
    path: web::Path<String>,
    query: web::Query<GetCommentsQuery>,
) -> Result<HttpResponse, CustomError> {
    let blog_post_id = parse_object_id(&path.into_inner(), "blog post ID")?;
    let continue_after_id = parse_cursor(&query)?;

    let page = comment_service
        .get_comments_for_blog_post(blog_post_id, continue_after_id)
        .await?;

    Ok(HttpResponse::Ok().json(page))
}

/// List a comment's replies
/// GET /comments/{comment_id}/replies?continueAfterId=
pub async fn get_comment_replies(
    comment_service: web::Data<CommentService>,
    path: web::Path<String>,
    query: web::Query<GetCommentsQuery>,
) -> Result<HttpResponse, CustomError> {
    let parent_comment_id = parse_object_id(&path.into_inner(), "comment ID")?;
    let continue_after_id = parse_cursor(&query)?;

    let page = comment_service
        .get_comment_replies(parent_comment_id, continue_after_id)
        .await?;

    Ok(HttpResponse::Ok().json(page))
}

/// Create a comment or a reply on a post
/// POST /posts/{blog_post_id}/comments
pub async fn create_comment(
    user: AuthenticatedUser,
    comment_service: web::Data<CommentService>,
    path: web::Path<String>,
    body: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse, CustomError> {
    let blog_post_id = parse_object_id(&path.into_inner(), "blog post ID")?;

    validate_comment_text(&body.text)?;

    let parent_comment_id = body
        .parent_comment_id
        .as_deref()
        .map(|id| parse_object_id(id, "parent comment ID"))
        .transpose()?;

    let comment = comment_service
        .create_comment(
            blog_post_id,
            parent_comment_id,
            body.text.clone(),
            user.user_id,
        )
        .await?;

    Ok(HttpResponse::Created().json(comment))
}

/// Edit a comment's text
/// PATCH /comments/{comment_id}
pub async fn update_comment(
    user: AuthenticatedUser,
    comment_service: web::Data<CommentService>,
    path: web::Path<String>,
    body: web::Json<UpdateCommentRequest>,
) -> Result<HttpResponse, CustomError> {
    let comment_id = parse_object_id(&path.into_inner(), "comment ID")?;

    validate_comment_text(&body.new_text)?;

    let comment = comment_service
        .update_comment(&comment_id, body.new_text.clone(), user.user_id)
        .await?;

    Ok(HttpResponse::Ok().json(comment))
}

/// Delete a comment along with its replies
/// DELETE /comments/{comment_id}
pub async fn delete_comment(
    user: AuthenticatedUser,
    comment_service: web::Data<CommentService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let comment_id = parse_object_id(&path.into_inner(), "comment ID")?;

    comment_service
        .delete_comment(&comment_id, user.user_id)
        .await?;

    Ok(HttpResponse::Ok().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_text_bounds() {
        assert!(validate_comment_text("hi").is_ok());
        assert!(validate_comment_text("   ").is_err());
        assert!(validate_comment_text(&"x".repeat(600)).is_ok());
        assert!(validate_comment_text(&"x".repeat(601)).is_err());
    }

    #[test]
    fn cursor_parsing() {
        let valid = GetCommentsQuery {
            continue_after_id: Some(ObjectId::new().to_hex()),
        };
        assert!(parse_cursor(&valid).unwrap().is_some());

        let absent = GetCommentsQuery {
            continue_after_id: None,
        };
        assert!(parse_cursor(&absent).unwrap().is_none());

        let malformed = GetCommentsQuery {
            continue_after_id: Some("not-an-id".to_string()),
        };
        assert!(parse_cursor(&malformed).is_err());
    }
}
