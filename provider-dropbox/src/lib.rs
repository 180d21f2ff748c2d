//! # Dropbox Business Provider
//!
//! Implements the `TeamProvider` trait for Dropbox API v2 using a team
//! token.
//!
//! ## Overview
//!
//! This crate provides:
//! - Team roster enumeration (`team/members/list_v2`)
//! - Per-member recursive change feeds with opaque cursors
//!   (`files/list_folder`), acting as each member via
//!   `Dropbox-API-Select-User`
//! - Streaming revision-pinned downloads from the content endpoint
//! - Retry with exponential backoff, honouring `Retry-After`
//! - A reqwest-backed [`HttpClient`](remote_traits::HttpClient)
//!   implementation for production use

pub mod connector;
pub mod error;
pub mod http;
pub mod types;

pub use connector::DropboxTeamConnector;
pub use error::{DropboxError, Result};
pub use http::ReqwestHttpClient;
