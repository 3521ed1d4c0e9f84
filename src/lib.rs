//! Pensieve: a semantic memory store served over the Model Context Protocol.
//!
//! A model writes short memories tagged with free-form topics, then finds them
//! again by title similarity or by topic timeline. Topics are matched by
//! embedding similarity rather than exact spelling. The whole store is kept in
//! memory and snapshotted to a JSON file periodically.
//!
//! # Modules
//!
//! - [`store`]: memory records, the topic index, and retrieval
//! - [`embedding`]: embedding providers (fastembed models or offline hashing)
//! - [`persistence`]: snapshot file and the periodic crystallizer
//! - [`tools`]: the tool implementations
//! - [`mcp`]: MCP server handler, tool registry and inspection client
//! - [`config`]: layered configuration and CLI

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::unused_async)]

pub mod config;
pub mod domain;
pub mod embedding;
pub mod error;
pub mod mcp;
pub mod persistence;
pub mod server;
pub mod store;
pub mod telemetry;
pub mod tools;
