//! # Scan Relay Test Suite
//!
//! Cross-subsystem flows, run against every storage backend where the
//! behavior must not depend on it.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── mod.rs           # backend fixtures
//!     ├── backends.rs      # provider contract on memory, RocksDB, SQLite
//!     ├── dispatch_flows.rs # router → dedup → aggregation → outputs
//!     └── retention.rs     # reaper against live dispatch state
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p sr-tests
//! cargo test -p sr-tests integration::backends::
//! ```

#![allow(dead_code)]

pub mod integration;
