use crate::user::model::UserProfile;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub slug: String,
    pub title: String,
    pub summary: String,
    pub body: String,
    pub featured_image_url: String,
    pub author: ObjectId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Wire shape of a post, author joined in
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub slug: String,
    pub title: String,
    pub summary: String,
    pub body: String,
    pub featured_image_url: String,
    pub author: Option<UserProfile>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PostResponse {
    pub fn from_post(post: Post, author: Option<UserProfile>) -> Self {
        PostResponse {
            id: post.id.to_hex(),
            slug: post.slug,
            title: post.title,
            summary: post.summary,
            body: post.body,
            featured_image_url: post.featured_image_url,
            author,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    pub blog_posts: Vec<PostResponse>,
    pub page: u64,
    pub total_pages: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetBlogPostsQuery {
    pub author_id: Option<String>,
    pub page: Option<u64>,
}

/// Fields accepted when creating or fully updating a post (the featured
/// image travels alongside these in the multipart form)
#[derive(Debug)]
pub struct PostInput {
    pub slug: String,
    pub title: String,
    pub summary: String,
    pub body: String,
}
