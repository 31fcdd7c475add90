//! Domain building blocks for the Natours tour-booking service.
//!
//! Nothing in this crate performs I/O. Storage backends and HTTP handlers
//! depend on it for the shared vocabulary: errors, documents, query shaping,
//! update expressions and the small amount of tour-specific math.

pub mod document;
pub mod error;
pub mod geo;
pub mod query;
pub mod roles;
pub mod slug;
pub mod stats;
pub mod types;
pub mod update;
