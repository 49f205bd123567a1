//! # Repository Module
//!
//! Review store implementations behind the [`ReviewRepository`] trait.

pub mod memory;
#[cfg(feature = "scylla")]
pub mod scylla_impl;
pub mod traits;

pub use memory::InMemoryReviewRepository;
#[cfg(feature = "scylla")]
pub use scylla_impl::{ScyllaClient, ScyllaConfig, ScyllaReviewRepository};
pub use traits::{ReviewRepository, SharedReviewRepository};
