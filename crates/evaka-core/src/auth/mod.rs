//! Authentication: credentials, sessions and the weak-login handshake.
//!
//! This module provides:
//! - `Credentials`: immutable login details of one configured account
//! - `Session`: cookie material proving a successful weak login
//! - `Authenticator`: one login attempt, mapped to a session or an error kind
//! - `SessionGuard`: owns the account's session and re-authenticates lazily

pub mod authenticator;
pub mod credentials;
pub mod guard;
pub mod session;

pub use authenticator::Authenticator;
pub use credentials::Credentials;
pub use guard::SessionGuard;
pub use session::{Session, SessionCookie};
