//! # Remote Provider Traits
//!
//! Contracts between the backup engine and cloud storage backends.
//!
//! ## Overview
//!
//! This crate defines the neutral model the engine operates on — team
//! members, change pages, opaque cursors — plus the seams a backend must
//! implement:
//!
//! - [`TeamProvider`](provider::TeamProvider) - roster listing, cursor-paged
//!   change feeds, streaming content downloads
//! - [`HttpClient`](http::HttpClient) - single-exchange HTTP with streaming
//!   bodies, so connectors stay testable without a network
//!
//! ## Error Handling
//!
//! All remote failures are folded into [`RemoteError`](error::RemoteError).
//! The engine only ever branches on that taxonomy; backend connectors are
//! responsible for mapping their status codes and error payloads into it.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync` bounds to support concurrent per-member
//! sync tasks.

pub mod error;
pub mod http;
pub mod provider;

pub use error::{RemoteError, Result};

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use provider::{
    ChangeEntry, ChangeKind, ChangePage, Member, MemberId, MemberStatus, TeamProvider,
};
