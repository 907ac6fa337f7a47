use crate::user::model::UserProfile;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A stored comment. `parent_comment_id` is absent for top-level comments
/// and always references a top-level comment for replies (nesting depth is
/// capped at one level; `create_comment` enforces it).
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub blog_post_id: ObjectId,
    pub author: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_comment_id: Option<ObjectId>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Wire shape of a comment: author joined in, ids as hex strings, and — for
/// top-level listings only — the number of replies under it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub blog_post_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_comment_id: Option<String>,
    pub text: String,
    pub author: Option<UserProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replies_count: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommentResponse {
    pub fn from_comment(
        comment: Comment,
        author: Option<UserProfile>,
        replies_count: Option<u64>,
    ) -> Self {
        CommentResponse {
            id: comment.id.to_hex(),
            blog_post_id: comment.blog_post_id.to_hex(),
            parent_comment_id: comment.parent_comment_id.map(|id| id.to_hex()),
            text: comment.text,
            author,
            replies_count,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

/// One page of a thread plus the end-of-pagination flag derived from the
/// lookahead fetch.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPage {
    pub comments: Vec<CommentResponse>,
    pub end_of_pagination_reached: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub text: String,
    pub parent_comment_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCommentRequest {
    pub new_text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCommentsQuery {
    pub continue_after_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(parent: Option<ObjectId>) -> Comment {
        Comment {
            id: ObjectId::new(),
            blog_post_id: ObjectId::new(),
            author: ObjectId::new(),
            parent_comment_id: parent,
            text: "hello".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn stored_top_level_comment_omits_parent_field() {
        let json = serde_json::to_value(comment(None)).unwrap();
        assert!(json.get("parentCommentId").is_none());
        assert!(json.get("blogPostId").is_some());
    }

    #[test]
    fn stored_comment_round_trips_without_parent_field() {
        let json = serde_json::to_string(&comment(None)).unwrap();
        let parsed: Comment = serde_json::from_str(&json).unwrap();
        assert!(parsed.parent_comment_id.is_none());
    }

    #[test]
    fn top_level_response_carries_replies_count() {
        let response =
            serde_json::to_value(CommentResponse::from_comment(comment(None), None, Some(4)))
                .unwrap();
        assert_eq!(response["repliesCount"], 4);
        assert!(response.get("parentCommentId").is_none());
    }

    #[test]
    fn reply_response_carries_parent_but_no_count() {
        let parent_id = ObjectId::new();
        let response = serde_json::to_value(CommentResponse::from_comment(
            comment(Some(parent_id)),
            None,
            None,
        ))
        .unwrap();
        assert_eq!(response["parentCommentId"], parent_id.to_hex());
        assert!(response.get("repliesCount").is_none());
    }

    #[test]
    fn page_uses_contract_field_names() {
        let page = serde_json::to_value(CommentPage {
            comments: vec![],
            end_of_pagination_reached: true,
        })
        .unwrap();
        assert_eq!(page["endOfPaginationReached"], true);
        assert!(page["comments"].as_array().is_some());
    }

    #[test]
    fn create_request_accepts_optional_parent() {
        let with_parent: CreateCommentRequest =
            serde_json::from_str(r#"{"text":"hi","parentCommentId":"abc"}"#).unwrap();
        assert_eq!(with_parent.parent_comment_id.as_deref(), Some("abc"));

        let top_level: CreateCommentRequest = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert!(top_level.parent_comment_id.is_none());
    }
}
