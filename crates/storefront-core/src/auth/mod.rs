//! Session management for the storefront client.
//!
//! This module provides:
//! - `SessionService`: the server-side `refresh`/`logout` operations
//! - `SessionMarker`: the local "is anyone logged in?" check
//! - `RemoteSession` / `CookieSessionMarker`: HTTP and cookie-jar backed implementations
//! - `SessionEvent`: notifications emitted when a session is refreshed or terminated
//!
//! Credentials travel as cookies in a jar shared with the API client.

pub mod events;
pub mod session;

pub use events::{SessionEvent, TerminationReason};
pub use session::{CookieSessionMarker, RemoteSession, SessionMarker, SessionService};
