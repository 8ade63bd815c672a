//! latestvids library
//!
//! A single-entry TTL cache in front of the YouTube search API, with the
//! configuration, context and CLI pieces the binary is built from. Exposed as
//! a library for integration tests.

pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod data;
