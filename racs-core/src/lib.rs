//! RACS Core
//!
//! Core types shared between the pipeline engine and the HTTP surface.
//!
//! This crate contains:
//! - Domain types: Core business entities (Project, Registry, Task, etc.)
//! - DTOs: Snapshot and request objects crossing the API boundary
//! - Events: The tagged event schema streamed to subscribers

pub mod domain;
pub mod dto;
pub mod event;
