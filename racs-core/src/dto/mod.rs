//! DTOs crossing the API boundary
//!
//! Snapshot objects sent to clients and over the event stream, plus the
//! request bodies accepted by the HTTP surface.

pub mod credential;
pub mod project;
pub mod registry;
pub mod task;
