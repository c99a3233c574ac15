//! mailward: a safe, read-oriented CLI for remote (JMAP) email.
//!
//! This crate provides the core library for resolving triage targets,
//! composing reply/forward drafts, and executing batched mutations that
//! are structurally incapable of sending or permanently deleting mail.

pub mod client;
pub mod compose;
pub mod config;
pub mod error;
pub mod executor;
pub mod filter;
pub mod model;
pub mod safety;
pub mod target;
