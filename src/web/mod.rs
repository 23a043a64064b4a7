//! Web API module for CHS Archive.
//!
//! This module provides the HTTP surface: upload, info page, JSON metadata,
//! downloads and a health probe, behind security headers, CORS and per-IP
//! rate limiting.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;
pub mod view;

pub use error::ApiError;
pub use router::create_router;
pub use server::{ArchiveServer, RunningServer};
