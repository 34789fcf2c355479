//! Local credential storage for the terminal client.
//!
//! The session itself lives in the core client's cookie jar; this module
//! only remembers the password between runs so `storefront` can log in
//! without prompting every time.

pub mod credentials;

pub use credentials::CredentialStore;
