//! REST API client module for the storefront backend.
//!
//! This module provides the `AuthenticatedClient`, which attaches the
//! session cookie to every call and renews an expired session at most once
//! for all concurrent callers, plus `StorefrontApi`, the typed catalog, cart
//! and order endpoints built on top of it.

pub mod client;
pub mod error;
mod refresh;
pub mod request;
pub mod storefront;

pub use client::{AuthenticatedClient, ClientBuilder};
pub use error::ApiError;
pub use refresh::RefreshState;
pub use request::RequestConfig;
pub use storefront::{ProductQuery, StorefrontApi};
