//! RACS Server
//!
//! The orchestrator binary: owns a collection of projects, each bound to
//! a remote repository and a container build/package recipe, and drives
//! a fixed pipeline (clean, clone, prepare, pull, build, prepackage,
//! package, push, tag) for each of them by invoking podman and git.
//!
//! Architecture:
//! - Configuration: clap flags with environment fallbacks
//! - Persistence: single-writer SQLite store with repositories per entity
//! - Engine: one serial worker per project, an event broker, the task
//!   executor, change detector, credential binder and registry sessions
//! - Runtime: start-up reconstruction, worker spawning, image pruning
//! - API: axum HTTP surface with an SSE event stream

pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod layout;
pub mod repository;
pub mod runtime;
pub mod state;
