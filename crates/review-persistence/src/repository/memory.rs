//! In-memory review repository.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::traits::ReviewRepository;
use crate::error::Result;
use review_domain::{MediaType, Review};

/// Review store backed by a `Vec`, in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryReviewRepository {
    reviews: RwLock<Vec<Review>>,
}

impl InMemoryReviewRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.reviews.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reviews.read().await.is_empty()
    }
}

#[async_trait]
impl ReviewRepository for InMemoryReviewRepository {
    async fn find_by_content_and_type(
        &self,
        media_type: MediaType,
        content_id: &str,
    ) -> Result<Vec<Review>> {
        let reviews = self.reviews.read().await;
        Ok(reviews
            .iter()
            .filter(|r| r.media_type == media_type && r.content_id == content_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, review: &Review) -> Result<()> {
        self.reviews.write().await.push(review.clone());
        Ok(())
    }

    async fn delete_one(&self, content_id: &str, user_id: &str) -> Result<bool> {
        let mut reviews = self.reviews.write().await;
        let position = reviews
            .iter()
            .position(|r| r.content_id == content_id && r.user_id == user_id);

        Ok(position.map(|index| reviews.remove(index)).is_some())
    }
}
