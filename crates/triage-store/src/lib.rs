//! # triage-store
//!
//! In-memory implementations of the engine's persistence seams.
//!
//! - `InMemorySessionStore` keeps one JSON document per session, keyed by id,
//!   with an optimistic version check on every update.
//! - `InMemoryRecordSource` serves a user's earlier scans, sessions and
//!   tracking points.
//!
//! Both are for development, tests and the demo. Data is lost when the
//! process exits.

pub mod records;
pub mod sessions;

pub use records::InMemoryRecordSource;
pub use sessions::InMemorySessionStore;
