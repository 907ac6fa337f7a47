use crate::comment::model::{Comment, CommentPage, CommentResponse};
use crate::database::DATABASE_NAME;
use crate::user::model::{User, UserProfile};
use crate::utils::error::CustomError;
use chrono::Utc;
use futures_util::TryStreamExt;
use futures_util::future;
use mongodb::bson::{Bson, doc, oid::ObjectId};
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection};
use std::collections::{HashMap, HashSet};

/// Top-level comments per page, newest first
pub const TOP_LEVEL_PAGE_SIZE: usize = 3;
/// Replies per page, oldest first
pub const REPLIES_PAGE_SIZE: usize = 2;

/// The comment thread service. Owns every lifecycle operation on comments:
/// nothing else writes to the collection.
///
/// Pagination works on the `_id` as cursor: ids are assigned monotonically
/// at creation, so sorting by id gives a stable total order and an exclusive
/// id comparison ("everything strictly past this boundary") yields
/// duplicate-free pages even while newer comments keep arriving — new ids
/// sort before any already-handed-out cursor window.
pub struct CommentService {
    client: Client,
    collection: Collection<Comment>,
    users: Collection<User>,
}

impl CommentService {
    pub fn new(client: &Client) -> Self {
        let db = client.database(DATABASE_NAME);
        CommentService {
            client: client.clone(),
            collection: db.collection::<Comment>("comments"),
            users: db.collection::<User>("users"),
        }
    }

    /// One page of a post's top-level comments, newest first. The page is
    /// fetched with one row of lookahead: getting fewer than
    /// `TOP_LEVEL_PAGE_SIZE + 1` rows back means there is no next page,
    /// without a separate count query. Each comment carries its exact reply
    /// count and its author.
    pub async fn get_comments_for_blog_post(
        &self,
        blog_post_id: ObjectId,
        continue_after_id: Option<ObjectId>,
    ) -> Result<CommentPage, CustomError> {
        let mut filter = doc! {
            "blogPostId": blog_post_id,
            "parentCommentId": Bson::Null,
        };
        if let Some(cursor) = continue_after_id {
            // Exclusive boundary: strictly older than the last item seen
            filter.insert("_id", doc! { "$lt": cursor });
        }

        let rows: Vec<Comment> = self
            .collection
            .find(filter)
            .sort(doc! { "_id": -1 })
            .limit((TOP_LEVEL_PAGE_SIZE + 1) as i64)
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to fetch comments: {}", e))
            })?
            .try_collect()
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to collect comments: {}", e))
            })?;

        let (page, end_of_pagination_reached) = clip_page(rows, TOP_LEVEL_PAGE_SIZE);

        // Exact count per comment; the lookups touch disjoint rows, so they
        // are issued concurrently.
        let counts = future::try_join_all(page.iter().map(|c| self.count_replies(c.id))).await?;

        let authors = self.load_authors(&page).await?;

        let comments = page
            .into_iter()
            .zip(counts)
            .map(|(comment, replies_count)| {
                let author = authors.get(&comment.author).cloned();
                CommentResponse::from_comment(comment, author, Some(replies_count))
            })
            .collect();

        Ok(CommentPage {
            comments,
            end_of_pagination_reached,
        })
    }

    /// One page of a comment's replies, oldest first (conversational order,
    /// the opposite of the top level). Same exclusive cursor and lookahead
    /// scheme, mirrored: `_id` ascending, cursor `$gt`. Replies have no
    /// sub-replies, so no counts are computed.
    pub async fn get_comment_replies(
        &self,
        parent_comment_id: ObjectId,
        continue_after_id: Option<ObjectId>,
    ) -> Result<CommentPage, CustomError> {
        let mut filter = doc! { "parentCommentId": parent_comment_id };
        if let Some(cursor) = continue_after_id {
            filter.insert("_id", doc! { "$gt": cursor });
        }

        let rows: Vec<Comment> = self
            .collection
            .find(filter)
            .sort(doc! { "_id": 1 })
            .limit((REPLIES_PAGE_SIZE + 1) as i64)
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to fetch replies: {}", e))
            })?
            .try_collect()
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to collect replies: {}", e))
            })?;

        let (page, end_of_pagination_reached) = clip_page(rows, REPLIES_PAGE_SIZE);

        let authors = self.load_authors(&page).await?;

        let comments = page
            .into_iter()
            .map(|comment| {
                let author = authors.get(&comment.author).cloned();
                CommentResponse::from_comment(comment, author, None)
            })
            .collect();

        Ok(CommentPage {
            comments,
            end_of_pagination_reached,
        })
    }

    /// Create a top-level comment or a reply. A reply's parent must exist,
    /// must itself be top-level, and must sit under the same post; anything
    /// else is rejected rather than trusted from the client.
    pub async fn create_comment(
        &self,
        blog_post_id: ObjectId,
        parent_comment_id: Option<ObjectId>,
        text: String,
        acting_user: ObjectId,
    ) -> Result<CommentResponse, CustomError> {
        if let Some(parent_id) = parent_comment_id {
            let parent = self
                .get_comment(&parent_id)
                .await?
                .ok_or_else(|| {
                    CustomError::ValidationError("Parent comment does not exist".to_string())
                })?;

            if parent.parent_comment_id.is_some() {
                return Err(CustomError::ValidationError(
                    "Replies cannot be nested deeper than one level".to_string(),
                ));
            }
            if parent.blog_post_id != blog_post_id {
                return Err(CustomError::ValidationError(
                    "Parent comment belongs to a different blog post".to_string(),
                ));
            }
        }

        let comment = Comment {
            id: ObjectId::new(),
            blog_post_id,
            author: acting_user,
            parent_comment_id,
            text,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        self.collection
            .insert_one(&comment)
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to add comment: {}", e))
            })?;

        let author = self.load_author(&comment.author).await?;
        Ok(CommentResponse::from_comment(comment, author, None))
    }

    pub async fn get_comment(
        &self,
        comment_id: &ObjectId,
    ) -> Result<Option<Comment>, CustomError> {
        self.collection
            .find_one(doc! { "_id": comment_id })
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to fetch comment: {}", e))
            })
    }

    /// Replace a comment's text. Author-only; only `text` and `updatedAt`
    /// ever change after creation.
    pub async fn update_comment(
        &self,
        comment_id: &ObjectId,
        new_text: String,
        acting_user: ObjectId,
    ) -> Result<CommentResponse, CustomError> {
        let comment = self
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| CustomError::NotFoundError("Comment not found".to_string()))?;

        if comment.author != acting_user {
            return Err(CustomError::UnauthorizedError(
                "You can only edit your own comments".to_string(),
            ));
        }

        let updated = self
            .collection
            .find_one_and_update(
                doc! { "_id": comment_id },
                doc! { "$set": {
                    "text": new_text,
                    "updatedAt": Utc::now().to_rfc3339()
                } },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to update comment: {}", e))
            })?
            .ok_or_else(|| CustomError::NotFoundError("Comment not found".to_string()))?;

        let author = self.load_author(&updated.author).await?;
        Ok(CommentResponse::from_comment(updated, author, None))
    }

    /// Delete a comment and, with it, every reply hanging off it. Replies
    /// are structurally dependent on their parent, so they go regardless of
    /// who authored them. Both deletions run in one transaction so a failure
    /// cannot leave orphaned replies behind.
    pub async fn delete_comment(
        &self,
        comment_id: &ObjectId,
        acting_user: ObjectId,
    ) -> Result<(), CustomError> {
        let comment = self
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| CustomError::NotFoundError("Comment not found".to_string()))?;

        if comment.author != acting_user {
            return Err(CustomError::UnauthorizedError(
                "You can only delete your own comments".to_string(),
            ));
        }

        let mut session = self.client.start_session().await.map_err(|e| {
            CustomError::InternalServerError(format!("Failed to start session: {}", e))
        })?;
        session.start_transaction().await.map_err(|e| {
            CustomError::InternalServerError(format!("Failed to start transaction: {}", e))
        })?;

        let cascade: Result<(), mongodb::error::Error> = async {
            self.collection
                .delete_one(doc! { "_id": comment.id })
                .session(&mut session)
                .await?;
            self.collection
                .delete_many(doc! { "parentCommentId": comment.id })
                .session(&mut session)
                .await?;
            Ok(())
        }
        .await;

        match cascade {
            Ok(()) => session.commit_transaction().await.map_err(|e| {
                CustomError::InternalServerError(format!("Failed to delete comment: {}", e))
            }),
            Err(e) => {
                let _ = session.abort_transaction().await;
                Err(CustomError::InternalServerError(format!(
                    "Failed to delete comment: {}",
                    e
                )))
            }
        }
    }

    async fn count_replies(&self, parent_comment_id: ObjectId) -> Result<u64, CustomError> {
        self.collection
            .count_documents(doc! { "parentCommentId": parent_comment_id })
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to count replies: {}", e))
            })
    }

    async fn load_author(&self, author_id: &ObjectId) -> Result<Option<UserProfile>, CustomError> {
        let user = self
            .users
            .find_one(doc! { "_id": author_id })
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to fetch author: {}", e))
            })?;

        Ok(user.map(|u| UserProfile::from_user(&u, false)))
    }

    /// One `$in` lookup for all authors on a page
    async fn load_authors(
        &self,
        comments: &[Comment],
    ) -> Result<HashMap<ObjectId, UserProfile>, CustomError> {
        let ids: Vec<ObjectId> = comments
            .iter()
            .map(|c| c.author)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
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

/// Split a lookahead fetch into the page itself and the end-of-pagination
/// flag: a missing lookahead row means the store had nothing past this page.
fn clip_page<T>(mut rows: Vec<T>, page_size: usize) -> (Vec<T>, bool) {
    let end_of_pagination_reached = rows.len() <= page_size;
    rows.truncate(page_size);
    (rows, end_of_pagination_reached)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_page_keeps_full_page_and_detects_lookahead_row() {
        let (page, end) = clip_page(vec![4, 3, 2, 1], 3);
        assert_eq!(page, vec![4, 3, 2]);
        assert!(!end);
    }

    #[test]
    fn clip_page_flags_final_page() {
        let (page, end) = clip_page(vec![2, 1], 3);
        assert_eq!(page, vec![2, 1]);
        assert!(end);

        let (page, end) = clip_page(vec![3, 2, 1], 3);
        assert_eq!(page, vec![3, 2, 1]);
        assert!(end);
    }

    #[test]
    fn clip_page_handles_empty_fetch() {
        let (page, end) = clip_page(Vec::<i64>::new(), 2);
        assert!(page.is_empty());
        assert!(end);
    }

    // The store-side query the listings rely on: equality filter handled by
    // the caller, exclusive id cursor, fixed sort, limited fetch.
    fn fetch(ids: &[i64], cursor: Option<i64>, limit: usize, descending: bool) -> Vec<i64> {
        let mut rows: Vec<i64> = ids
            .iter()
            .copied()
            .filter(|id| match cursor {
                Some(c) => {
                    if descending {
                        *id < c
                    } else {
                        *id > c
                    }
                }
                None => true,
            })
            .collect();
        rows.sort();
        if descending {
            rows.reverse();
        }
        rows.truncate(limit);
        rows
    }

    fn walk(ids: &[i64], page_size: usize, descending: bool) -> Vec<Vec<i64>> {
        let mut pages = Vec::new();
        let mut cursor = None;
        loop {
            let rows = fetch(ids, cursor, page_size + 1, descending);
            let (page, end) = clip_page(rows, page_size);
            cursor = page.last().copied();
            pages.push(page);
            if end {
                return pages;
            }
        }
    }

    #[test]
    fn descending_walk_is_exhaustive_duplicate_free_and_ordered() {
        let ids = [1, 2, 5, 7, 9, 12, 13, 20];
        let pages = walk(&ids, 3, true);

        let flat: Vec<i64> = pages.iter().flatten().copied().collect();
        assert_eq!(flat, vec![20, 13, 12, 9, 7, 5, 2, 1]);

        for window in flat.windows(2) {
            assert!(window[0] > window[1], "strictly descending");
        }
    }

    #[test]
    fn ascending_walk_mirrors_reply_ordering() {
        let ids = [10, 11, 12, 13, 14];
        let pages = walk(&ids, 2, false);

        let flat: Vec<i64> = pages.iter().flatten().copied().collect();
        assert_eq!(flat, vec![10, 11, 12, 13, 14]);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[2], vec![14]);
    }

    #[test]
    fn top_level_scenario_from_three_comments() {
        // c1(id=1), c2(id=2), c3(id=3); page size 2
        let ids = [1, 2, 3];

        let rows = fetch(&ids, None, 3, true);
        let (page, end) = clip_page(rows, 2);
        assert_eq!(page, vec![3, 2]);
        assert!(!end);

        let rows = fetch(&ids, Some(2), 3, true);
        let (page, end) = clip_page(rows, 2);
        assert_eq!(page, vec![1]);
        assert!(end);
    }

    #[test]
    fn reply_scenario_exactly_filling_one_page() {
        // r1(id=10), r2(id=11); page size 2
        let rows = fetch(&[10, 11], None, 3, false);
        let (page, end) = clip_page(rows, 2);
        assert_eq!(page, vec![10, 11]);
        assert!(end);
    }

    #[test]
    fn late_insertions_do_not_shift_older_pages() {
        let mut ids = vec![1, 2, 5, 7];

        let rows = fetch(&ids, None, 3, true);
        let (first_page, _) = clip_page(rows, 2);
        assert_eq!(first_page, vec![7, 5]);

        // A comment created after the first page was served gets a larger
        // id and sorts before the cursor window, not into it.
        ids.push(9);

        let rows = fetch(&ids, Some(5), 3, true);
        let (second_page, end) = clip_page(rows, 2);
        assert_eq!(second_page, vec![2, 1]);
        assert!(end);
    }
}
