//! REST client plumbing for the eVaka citizen API.
//!
//! This module provides the `Transport` for talking to a municipality's
//! portal and the `ApiError` taxonomy shared by the whole crate.
//!
//! eVaka authenticates citizens with a session cookie obtained from the
//! weak-login endpoint.

pub mod error;
pub mod transport;

pub use error::ApiError;
pub use transport::{ApiPath, ApiResponse, Transport};
