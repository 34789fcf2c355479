//! Core library for the storefront client.
//!
//! - `api`: the session-aware `AuthenticatedClient` and typed storefront endpoints
//! - `auth`: session service, session marker and session events
//! - `config`: on-disk and environment configuration
//! - `models`: catalog, cart, order and account types

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiError, AuthenticatedClient, RequestConfig, StorefrontApi};
pub use auth::{SessionEvent, TerminationReason};
pub use config::Config;
