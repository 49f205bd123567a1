//! # Review Service - Domain Model
//!
//! Core domain entities and value objects for user-submitted content
//! reviews. These types are shared by the persistence layer and the HTTP
//! API, and their serde form is exactly what clients see on the wire.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// ENUMS
// =============================================================================

/// Kind of content a review is attached to.
///
/// The set is closed: cache invalidation enumerates every variant to find
/// the read keys that may exist for a content id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    /// Every media type, in a stable order.
    pub const ALL: [Self; 2] = [Self::Movie, Self::Tv];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(Self::Movie),
            "tv" => Ok(Self::Tv),
            other => Err(DomainError::UnknownMediaType(other.to_string())),
        }
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// A persisted review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub user_id: String,
    pub content_id: String,
    pub username: String,
    pub review: String,
    pub spoiler_contains: bool,
    pub media_type: MediaType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for `POST /add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub user_id: String,
    pub content_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub review: String,
    #[serde(default)]
    pub spoiler_contains: bool,
    pub media_type: MediaType,
}

impl NewReview {
    /// Check the identifiers a review is keyed and invalidated by.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::MissingField`] when `userId` or `contentId`
    /// is blank.
    pub fn validate(&self) -> Result<(), DomainError> {
        require_non_blank("contentId", &self.content_id)?;
        require_non_blank("userId", &self.user_id)
    }

    /// Turn the request into a review stamped with a fresh id and `now`.
    #[must_use]
    pub fn into_review(self, now: DateTime<Utc>) -> Review {
        Review {
            id: Uuid::now_v7(),
            user_id: self.user_id,
            content_id: self.content_id,
            username: self.username,
            review: self.review,
            spoiler_contains: self.spoiler_contains,
            media_type: self.media_type,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request body for `POST /delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReview {
    pub content_id: String,
    pub user_id: String,
}

impl DeleteReview {
    /// # Errors
    ///
    /// Returns [`DomainError::MissingField`] when either id is blank.
    pub fn validate(&self) -> Result<(), DomainError> {
        require_non_blank("contentId", &self.content_id)?;
        require_non_blank("userId", &self.user_id)
    }
}

fn require_non_blank(field: &'static str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        Err(DomainError::MissingField(field))
    } else {
        Ok(())
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Domain-level errors
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Unknown media type: {0}")]
    UnknownMediaType(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}
