//! OAuth2 client registration store.
//!
//! Persists client registrations and per-client permission lists in a
//! key-value backend, resolving stored records into their credential shape
//! by grant type.

pub mod config;
pub mod errors;
pub mod oauth;
pub mod storage;
