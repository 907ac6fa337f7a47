use crate::database::DATABASE_NAME;
use crate::post::post_model::{Post, PostInput, PostPage, PostResponse};
use crate::user::model::{User, UserProfile};
use crate::utils::error::CustomError;
use chrono::Utc;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection};
use serde::Deserialize;
use std::collections::HashMap;

pub const POSTS_PAGE_SIZE: u64 = 6;

#[derive(Deserialize)]
struct SlugProjection {
    slug: String,
}

pub struct PostService {
    collection: Collection<Post>,
    users: Collection<User>,
}

impl PostService {
    pub fn new(client: &Client) -> Self {
        let db = client.database(DATABASE_NAME);
        PostService {
            collection: db.collection::<Post>("posts"),
            users: db.collection::<User>("users"),
        }
    }

    /// Reject a slug that is already taken by a different post
    pub async fn ensure_slug_available(
        &self,
        slug: &str,
        exclude_post_id: Option<&ObjectId>,
    ) -> Result<(), CustomError> {
        let existing = self
            .collection
            .find_one(doc! { "slug": slug })
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;

        if let Some(existing) = existing {
            if exclude_post_id != Some(&existing.id) {
                return Err(CustomError::ConflictError(
                    "Slug already taken. Please choose a different one".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub async fn create_post(&self, post: Post) -> Result<PostResponse, CustomError> {
        self.ensure_slug_available(&post.slug, None).await?;

        self.collection
            .insert_one(&post)
            .await
            .map_err(|e| CustomError::InternalServerError(format!("Failed to create post: {}", e)))?;

        let author = self.load_author(&post.author).await?;
        Ok(PostResponse::from_post(post, author))
    }

    /// Page through posts, newest first, optionally filtered by author.
    /// Classic page/total-pages pagination; the comment threads under each
    /// post use cursors instead.
    pub async fn get_blog_posts(
        &self,
        author: Option<ObjectId>,
        page: u64,
    ) -> Result<PostPage, CustomError> {
        let page = page.max(1);
        let filter = match author {
            Some(author) => doc! { "author": author },
            None => doc! {},
        };

        let posts: Vec<Post> = self
            .collection
            .find(filter.clone())
            .sort(doc! { "_id": -1 })
            .skip((page - 1) * POSTS_PAGE_SIZE)
            .limit(POSTS_PAGE_SIZE as i64)
            .await
            .map_err(|e| CustomError::InternalServerError(format!("Failed to fetch posts: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to collect posts: {}", e))
            })?;

        let total_results = self
            .collection
            .count_documents(filter)
            .await
            .map_err(|e| CustomError::InternalServerError(format!("Failed to count posts: {}", e)))?;

        let authors = self.load_authors(posts.iter().map(|p| p.author)).await?;
        let blog_posts = posts
            .into_iter()
            .map(|post| {
                let author = authors.get(&post.author).cloned();
                PostResponse::from_post(post, author)
            })
            .collect();

        Ok(PostPage {
            blog_posts,
            page,
            total_pages: total_page_count(total_results, POSTS_PAGE_SIZE),
        })
    }

    pub async fn get_all_slugs(&self) -> Result<Vec<String>, CustomError> {
        let slugs: Vec<SlugProjection> = self
            .collection
            .clone_with_type::<SlugProjection>()
            .find(doc! {})
            .projection(doc! { "slug": 1 })
            .await
            .map_err(|e| CustomError::InternalServerError(format!("Failed to fetch slugs: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to collect slugs: {}", e))
            })?;

        Ok(slugs.into_iter().map(|s| s.slug).collect())
    }

    pub async fn get_post_by_slug(&self, slug: &str) -> Result<PostResponse, CustomError> {
        let post = self
            .collection
            .find_one(doc! { "slug": slug })
            .await
            .map_err(|e| CustomError::InternalServerError(format!("Failed to fetch post: {}", e)))?
            .ok_or_else(|| {
                CustomError::NotFoundError(format!("No blog post found for slug {}", slug))
            })?;

        let author = self.load_author(&post.author).await?;
        Ok(PostResponse::from_post(post, author))
    }

    pub async fn get_post(&self, post_id: &ObjectId) -> Result<Option<Post>, CustomError> {
        self.collection
            .find_one(doc! { "_id": post_id })
            .await
            .map_err(|e| CustomError::InternalServerError(format!("Failed to fetch post: {}", e)))
    }

    /// Replace a post's content. Author-only; the featured image URL is only
    /// touched when a replacement was uploaded.
    pub async fn update_post(
        &self,
        post_id: &ObjectId,
        acting_user: &ObjectId,
        input: PostInput,
        featured_image_url: Option<String>,
    ) -> Result<PostResponse, CustomError> {
        let post = self
            .get_post(post_id)
            .await?
            .ok_or_else(|| CustomError::NotFoundError("No blog post found for that ID".to_string()))?;

        if post.author != *acting_user {
            return Err(CustomError::UnauthorizedError(
                "You can only edit your own posts".to_string(),
            ));
        }

        self.ensure_slug_available(&input.slug, Some(post_id)).await?;

        let mut set_doc = doc! {
            "slug": input.slug,
            "title": input.title,
            "summary": input.summary,
            "body": input.body,
            "updatedAt": Utc::now().to_rfc3339(),
        };
        if let Some(url) = featured_image_url {
            set_doc.insert("featuredImageUrl", url);
        }

        let updated = self
            .collection
            .find_one_and_update(doc! { "_id": post_id }, doc! { "$set": set_doc })
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| CustomError::InternalServerError(format!("Failed to update post: {}", e)))?
            .ok_or_else(|| CustomError::NotFoundError("No blog post found for that ID".to_string()))?;

        let author = self.load_author(&updated.author).await?;
        Ok(PostResponse::from_post(updated, author))
    }

    /// Delete a post. Author-only. Returns the deleted document so the
    /// caller can clean up the hosted featured image.
    pub async fn delete_post(
        &self,
        post_id: &ObjectId,
        acting_user: &ObjectId,
    ) -> Result<Post, CustomError> {
        let post = self
            .get_post(post_id)
            .await?
            .ok_or_else(|| CustomError::NotFoundError("No blog post found for that ID".to_string()))?;

        if post.author != *acting_user {
            return Err(CustomError::UnauthorizedError(
                "You can only delete your own posts".to_string(),
            ));
        }

        self.collection
            .delete_one(doc! { "_id": post_id })
            .await
            .map_err(|e| CustomError::InternalServerError(format!("Failed to delete post: {}", e)))?;

        Ok(post)
    }

    async fn load_author(&self, author_id: &ObjectId) -> Result<Option<UserProfile>, CustomError> {
        let user = self
            .users
            .find_one(doc! { "_id": author_id })
            .await
            .map_err(|e| CustomError::InternalServerError(format!("Failed to fetch author: {}", e)))?;

        Ok(user.map(|u| UserProfile::from_user(&u, false)))
    }

    /// One `$in` lookup for a whole page of posts
    async fn load_authors(
        &self,
        author_ids: impl Iterator<Item = ObjectId>,
    ) -> Result<HashMap<ObjectId, UserProfile>, CustomError> {
        let ids: Vec<ObjectId> = author_ids.collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let users: Vec<User> = self
            .users
            .find(doc! { "_id": { "$in": ids } })
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to fetch authors: {}", e))
            })?
            .try_collect()
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to collect authors: {}", e))
            })?;

        Ok(users
            .into_iter()
            .map(|u| (u.id, UserProfile::from_user(&u, false)))
            .collect())
    }
}

pub(crate) fn total_page_count(total_results: u64, page_size: u64) -> u64 {
    total_results.div_ceil(page_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_page_count(0, 6), 0);
        assert_eq!(total_page_count(1, 6), 1);
        assert_eq!(total_page_count(6, 6), 1);
        assert_eq!(total_page_count(7, 6), 2);
        assert_eq!(total_page_count(13, 6), 3);
    }
}
