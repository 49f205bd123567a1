//! # Repository Traits
//!
//! Abstract review store interface. Implementations can be swapped for
//! different backends (ScyllaDB, in-memory).

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use review_domain::{MediaType, Review};

/// Repository for Review entity operations
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Get every review of one piece of content, oldest first
    async fn find_by_content_and_type(
        &self,
        media_type: MediaType,
        content_id: &str,
    ) -> Result<Vec<Review>>;

    /// Persist a new review
    async fn insert(&self, review: &Review) -> Result<()>;

    /// Delete one review by `user_id` on `content_id`.
    ///
    /// Returns whether a review was removed.
    async fn delete_one(&self, content_id: &str, user_id: &str) -> Result<bool>;
}

pub type SharedReviewRepository = Arc<dyn ReviewRepository>;
