//! ScyllaDB repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::{Session, SessionBuilder};
use std::sync::Arc;
use uuid::Uuid;

use super::traits::ReviewRepository;
use crate::error::{PersistenceError, Result};
use review_domain::{MediaType, Review};

// =============================================================================
// SCYLLA CONFIGURATION
// =============================================================================

/// ScyllaDB connection configuration.
#[derive(Debug, Clone)]
pub struct ScyllaConfig {
    pub hosts: Vec<String>,
    pub keyspace: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for ScyllaConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["localhost:9042".to_string()],
            keyspace: "review_service".to_string(),
            username: None,
            password: None,
        }
    }
}

// =============================================================================
// SCYLLA CLIENT
// =============================================================================

/// ScyllaDB client wrapper.
pub struct ScyllaClient {
    session: Arc<Session>,
    pub config: ScyllaConfig,
}

impl ScyllaClient {
    /// Connect, create the keyspace if needed and switch to it.
    pub async fn new(config: ScyllaConfig) -> Result<Self> {
        validate_identifier(&config.keyspace)?;

        let mut builder = SessionBuilder::new().known_nodes(&config.hosts);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.user(user, pass);
        }

        let session = builder.build().await?;

        session
            .query_unpaged(
                format!(
                    "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = \
                     {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                    config.keyspace
                ),
                (),
            )
            .await?;

        // Use keyspace
        session
            .query_unpaged(format!("USE {}", config.keyspace), ())
            .await?;

        Ok(Self {
            session: Arc::new(session),
            config,
        })
    }
}

/// Keyspace names are interpolated into CQL, so only plain identifiers pass.
fn validate_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 48
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());

    if valid {
        Ok(())
    } else {
        Err(PersistenceError::InvalidQuery(format!(
            "invalid keyspace name: {name:?}"
        )))
    }
}

// =============================================================================
// REVIEW REPOSITORY
// =============================================================================

const CREATE_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS reviews (
        content_id text,
        media_type text,
        id uuid,
        user_id text,
        username text,
        review text,
        spoiler_contains boolean,
        created_at bigint,
        updated_at bigint,
        PRIMARY KEY ((content_id), media_type, id)
    )
";

const SELECT_BY_CONTENT: &str = r"
    SELECT content_id, media_type, id, user_id, username, review,
           spoiler_contains, created_at, updated_at
    FROM reviews
    WHERE content_id = ? AND media_type = ?
";

const INSERT_REVIEW: &str = r"
    INSERT INTO reviews (content_id, media_type, id, user_id, username, review,
                         spoiler_contains, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const SELECT_ONE_BY_USER: &str = r"
    SELECT media_type, id
    FROM reviews
    WHERE content_id = ? AND user_id = ?
    LIMIT 1
    ALLOW FILTERING
";

const DELETE_REVIEW: &str = r"
    DELETE FROM reviews
    WHERE content_id = ? AND media_type = ? AND id = ?
";

/// (content_id, media_type, id, user_id, username, review, spoiler_contains, created_at, updated_at)
type ReviewRow = (
    String,
    String,
    Uuid,
    String,
    Option<String>,
    Option<String>,
    Option<bool>,
    i64,
    i64,
);

/// Reviews stored in one partition per content id, clustered by media type
/// and time-ordered id.
pub struct ScyllaReviewRepository {
    client: Arc<ScyllaClient>,
}

impl ScyllaReviewRepository {
    pub const fn new(client: Arc<ScyllaClient>) -> Self {
        Self { client }
    }

    /// Create the `reviews` table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.client.session.query_unpaged(CREATE_TABLE, ()).await?;
        tracing::info!(keyspace = %self.client.config.keyspace, "Review schema ready");
        Ok(())
    }
}

#[async_trait]
impl ReviewRepository for ScyllaReviewRepository {
    async fn find_by_content_and_type(
        &self,
        media_type: MediaType,
        content_id: &str,
    ) -> Result<Vec<Review>> {
        let result = self
            .client
            .session
            .query_unpaged(SELECT_BY_CONTENT, (content_id, media_type.as_str()))
            .await?
            .into_rows_result()
            .map_err(scylla_error)?;

        let mut reviews = Vec::new();
        for row in result.rows::<ReviewRow>().map_err(scylla_error)? {
            reviews.push(review_from_row(row.map_err(scylla_error)?)?);
        }
        Ok(reviews)
    }

    async fn insert(&self, review: &Review) -> Result<()> {
        self.client
            .session
            .query_unpaged(
                INSERT_REVIEW,
                (
                    review.content_id.as_str(),
                    review.media_type.as_str(),
                    review.id,
                    review.user_id.as_str(),
                    review.username.as_str(),
                    review.review.as_str(),
                    review.spoiler_contains,
                    review.created_at.timestamp_millis(),
                    review.updated_at.timestamp_millis(),
                ),
            )
            .await?;
        Ok(())
    }

    async fn delete_one(&self, content_id: &str, user_id: &str) -> Result<bool> {
        let found = self
            .client
            .session
            .query_unpaged(SELECT_ONE_BY_USER, (content_id, user_id))
            .await?
            .into_rows_result()
            .map_err(scylla_error)?;

        let first = found
            .rows::<(String, Uuid)>()
            .map_err(scylla_error)?
            .next()
            .transpose()
            .map_err(scylla_error)?;

        let Some((media_type, id)) = first else {
            return Ok(false);
        };

        self.client
            .session
            .query_unpaged(DELETE_REVIEW, (content_id, media_type.as_str(), id))
            .await?;
        Ok(true)
    }
}

fn review_from_row(row: ReviewRow) -> Result<Review> {
    let (content_id, media_type, id, user_id, username, review, spoiler, created, updated) = row;

    Ok(Review {
        id,
        user_id,
        content_id,
        username: username.unwrap_or_default(),
        review: review.unwrap_or_default(),
        spoiler_contains: spoiler.unwrap_or(false),
        media_type: media_type.parse()?,
        created_at: timestamp(created)?,
        updated_at: timestamp(updated)?,
    })
}

fn timestamp(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        PersistenceError::Serialization(format!("timestamp out of range: {millis}"))
    })
}

fn scylla_error(err: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Scylla(err.to_string())
}
