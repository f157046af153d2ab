//! epicsync - a local mirror of an Azure DevOps Epic tree
//!
//! This crate keeps a SQLite mirror of one or more Epic hierarchies and
//! their comments in step with the remote tracker, and answers structured
//! and free-text queries over it.
//!
//! # Architecture
//!
//! - [`remote`] - Remote source adapter (Azure DevOps REST)
//! - [`sync`] - Reconciliation engine and comment sync
//! - [`storage`] - SQLite mirror store
//! - [`query`] - Read-only query service
//! - [`search`] - Smart search interpreter (list or narrative)
//! - [`narrative`] - Narrative generation collaborator
//! - [`api`] - HTTP API (axum)
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - Layered settings
//! - [`model`] - Data types (WorkItem, SyncConfig, SyncResult, filters)
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod narrative;
pub mod query;
pub mod remote;
pub mod search;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
