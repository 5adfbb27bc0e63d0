//! # Learnova API Server Library
//!
//! The REST backend of the Learnova learning management system.
//!
//! ## Modules
//!
//! - `app`: application state and router builder
//! - `config`: configuration from the environment
//! - `error`: the JSON error envelope
//! - `extract`: request extractors (body, path, query, caller, paging)
//! - `middleware`: bearer token authentication
//! - `routes`: handlers per resource

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
