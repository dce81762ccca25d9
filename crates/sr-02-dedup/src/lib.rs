//! # Deduplication (sr-02)
//!
//! At-most-once delivery of equal messages within a configurable window.
//!
//! ## Flow
//!
//! ```text
//! message ──▶ fingerprint(unique props | whole message)
//!                 │
//!                 ▼
//!     messages[fp] present? ──yes──▶ duplicate, skip
//!                 │ no
//!                 ▼
//!     insert messages[fp] (+ expiry[ts#fp] when a window is set)
//! ```

pub mod fingerprint;
pub mod store;

pub use fingerprint::{dedup_key, message_fingerprint};
pub use store::{expiry_for, DeduplicationStore};
