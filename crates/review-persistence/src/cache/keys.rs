//! Cache key derivation.
//!
//! Read keys have the shape `{namespace}:reviews:{mediaType}:{contentId}`.
//! Media type spellings never contain `:` and the content id is the last
//! component, so distinct `(mediaType, contentId)` pairs never share a key.

use std::collections::BTreeSet;

use review_domain::MediaType;

const READ_SEGMENT: &str = "reviews";

/// Derives every key the review cache reads or invalidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCodec {
    namespace: String,
}

impl KeyCodec {
    /// A trailing `:` on `namespace` is dropped, so `"review-service:"` and
    /// `"review-service"` scope the same keys.
    pub fn new(namespace: impl Into<String>) -> Self {
        let mut namespace = namespace.into();
        while namespace.ends_with(':') {
            namespace.pop();
        }
        Self { namespace }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Key for the cached review list of one piece of content.
    pub fn read_key(&self, media_type: MediaType, content_id: &str) -> String {
        if self.namespace.is_empty() {
            format!("{READ_SEGMENT}:{media_type}:{content_id}")
        } else {
            format!("{}:{READ_SEGMENT}:{media_type}:{content_id}", self.namespace)
        }
    }

    /// Every read key that can exist for `content_id`.
    pub fn content_invalidation_keys(&self, content_id: &str) -> BTreeSet<String> {
        MediaType::ALL
            .iter()
            .map(|media| self.read_key(*media, content_id))
            .collect()
    }

    /// Keys of entries scoped to a single user's view.
    ///
    /// No user-scoped read is cached, so this is always empty.
    pub fn user_invalidation_keys(&self, _user_id: &str) -> BTreeSet<String> {
        BTreeSet::new()
    }
}
