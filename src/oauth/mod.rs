//! OAuth2 client and permission records.

pub mod types;

pub use types::{Client, ClientInfo, ClientPermission, GrantType, PasswordClient};
