//! OAuth2 client registration and permission records.
//!
//! `ClientInfo` is the in-memory view handed to consumers. `StoredClient` is
//! the flattened JSON shape kept in the key-value backend, with the
//! `grantType` discriminator deciding which `ClientInfo` variant it decodes to.

use crate::errors::StorageError;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// OAuth2 grant types, used as the client record discriminator.
///
/// Unrecognised values are kept verbatim so records written by other tools
/// round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GrantType {
    AuthorizationCode,
    PasswordCredentials,
    ClientCredentials,
    RefreshToken,
    Implicit,
    Other(String),
}

impl GrantType {
    pub fn as_str(&self) -> &str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::PasswordCredentials => "password",
            GrantType::ClientCredentials => "client_credentials",
            GrantType::RefreshToken => "refresh_token",
            GrantType::Implicit => "__implicit",
            GrantType::Other(value) => value,
        }
    }
}

impl Default for GrantType {
    fn default() -> Self {
        GrantType::Other(String::new())
    }
}

impl From<String> for GrantType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "authorization_code" => GrantType::AuthorizationCode,
            "password" => GrantType::PasswordCredentials,
            "client_credentials" => GrantType::ClientCredentials,
            "refresh_token" => GrantType::RefreshToken,
            "__implicit" => GrantType::Implicit,
            _ => GrantType::Other(value),
        }
    }
}

impl From<&str> for GrantType {
    fn from(value: &str) -> Self {
        GrantType::from(value.to_string())
    }
}

impl From<GrantType> for String {
    fn from(value: GrantType) -> Self {
        match value {
            GrantType::Other(value) => value,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered client using any grant type other than password credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Client {
    pub id: String,
    pub secret: String,
    /// Redirect/callback domain
    pub domain: String,
    pub public: bool,
    pub user_id: String,
    pub grant_type: GrantType,
}

/// A registered client using the resource owner password credentials grant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswordClient {
    pub id: String,
    pub secret: String,
    pub domain: String,
    pub public: bool,
    pub user_id: String,
    pub password: String,
    pub account: String,
}

/// Client registration, resolved to its credential shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientInfo {
    Generic(Client),
    Password(PasswordClient),
}

impl ClientInfo {
    pub fn id(&self) -> &str {
        match self {
            ClientInfo::Generic(client) => &client.id,
            ClientInfo::Password(client) => &client.id,
        }
    }

    pub fn secret(&self) -> &str {
        match self {
            ClientInfo::Generic(client) => &client.secret,
            ClientInfo::Password(client) => &client.secret,
        }
    }

    pub fn domain(&self) -> &str {
        match self {
            ClientInfo::Generic(client) => &client.domain,
            ClientInfo::Password(client) => &client.domain,
        }
    }

    pub fn is_public(&self) -> bool {
        match self {
            ClientInfo::Generic(client) => client.public,
            ClientInfo::Password(client) => client.public,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            ClientInfo::Generic(client) => &client.user_id,
            ClientInfo::Password(client) => &client.user_id,
        }
    }

    pub fn grant_type(&self) -> GrantType {
        match self {
            ClientInfo::Generic(client) => client.grant_type.clone(),
            ClientInfo::Password(_) => GrantType::PasswordCredentials,
        }
    }

    /// `(account, password)` for password-credentials clients.
    pub fn password_credentials(&self) -> Option<(&str, &str)> {
        match self {
            ClientInfo::Generic(_) => None,
            ClientInfo::Password(client) => Some((&client.account, &client.password)),
        }
    }
}

impl From<Client> for ClientInfo {
    fn from(client: Client) -> Self {
        ClientInfo::Generic(client)
    }
}

impl From<PasswordClient> for ClientInfo {
    fn from(client: PasswordClient) -> Self {
        ClientInfo::Password(client)
    }
}

/// Flattened client record as persisted in the key-value backend.
///
/// The password-credential extras are read as raw JSON so that whatever a
/// non-password record carries in those slots never affects its decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredClient {
    pub id: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub public: bool,
    #[serde(rename = "userID", default)]
    pub user_id: String,
    #[serde(rename = "grantType", default)]
    pub grant_type: GrantType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<serde_json::Value>,
}

impl From<&ClientInfo> for StoredClient {
    fn from(info: &ClientInfo) -> Self {
        match info {
            ClientInfo::Generic(client) => StoredClient {
                id: client.id.clone(),
                secret: client.secret.clone(),
                domain: client.domain.clone(),
                public: client.public,
                user_id: client.user_id.clone(),
                grant_type: client.grant_type.clone(),
                password: None,
                account: None,
            },
            ClientInfo::Password(client) => StoredClient {
                id: client.id.clone(),
                secret: client.secret.clone(),
                domain: client.domain.clone(),
                public: client.public,
                user_id: client.user_id.clone(),
                grant_type: GrantType::PasswordCredentials,
                password: Some(serde_json::Value::String(client.password.clone())),
                account: Some(serde_json::Value::String(client.account.clone())),
            },
        }
    }
}

impl TryFrom<StoredClient> for ClientInfo {
    type Error = StorageError;

    fn try_from(stored: StoredClient) -> Result<Self, Self::Error> {
        match stored.grant_type {
            GrantType::PasswordCredentials => Ok(ClientInfo::Password(PasswordClient {
                password: credential_field("password", stored.password)?,
                account: credential_field("account", stored.account)?,
                id: stored.id,
                secret: stored.secret,
                domain: stored.domain,
                public: stored.public,
                user_id: stored.user_id,
            })),
            grant_type => Ok(ClientInfo::Generic(Client {
                id: stored.id,
                secret: stored.secret,
                domain: stored.domain,
                public: stored.public,
                user_id: stored.user_id,
                grant_type,
            })),
        }
    }
}

fn credential_field(name: &str, value: Option<serde_json::Value>) -> Result<String, StorageError> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(String::new()),
        Some(serde_json::Value::String(value)) => Ok(value),
        Some(other) => Err(StorageError::DeserializationFailed(format!(
            "{} must be a string, found {}",
            name, other
        ))),
    }
}

/// One permission granted to a client.
///
/// The record is an opaque JSON object: any fields written by other tools
/// round-trip unchanged. `resource` and `actions` are the conventional
/// fields this crate writes, read back leniently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientPermission(serde_json::Map<String, serde_json::Value>);

impl ClientPermission {
    pub fn new(resource: impl Into<String>, actions: Vec<String>) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert(
            "resource".to_string(),
            serde_json::Value::String(resource.into()),
        );
        fields.insert("actions".to_string(), actions.into());
        Self(fields)
    }

    /// `resource` field, if present and a string
    pub fn resource(&self) -> Option<&str> {
        self.0.get("resource").and_then(serde_json::Value::as_str)
    }

    /// String entries of the `actions` field; other entries are skipped
    pub fn actions(&self) -> Vec<&str> {
        self.0
            .get("actions")
            .and_then(serde_json::Value::as_array)
            .map(|actions| actions.iter().filter_map(serde_json::Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.0
    }
}

/// Generate a client ID
pub fn generate_client_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a secure random client secret
pub fn generate_client_secret() -> String {
    use rand::Rng;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    base64::prelude::BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: &str) -> ClientInfo {
        let stored: StoredClient = serde_json::from_str(json).unwrap();
        ClientInfo::try_from(stored).unwrap()
    }

    #[test]
    fn test_grant_type_wire_values() {
        assert_eq!(GrantType::from("password"), GrantType::PasswordCredentials);
        assert_eq!(GrantType::from("__implicit"), GrantType::Implicit);
        assert_eq!(
            GrantType::from("urn:ietf:params:oauth:grant-type:device_code"),
            GrantType::Other("urn:ietf:params:oauth:grant-type:device_code".to_string())
        );
        assert_eq!(
            serde_json::to_string(&GrantType::ClientCredentials).unwrap(),
            "\"client_credentials\""
        );
        assert_eq!(String::from(GrantType::Other("custom".into())), "custom");
    }

    #[test]
    fn test_password_discriminator_selects_password_variant() {
        let info = decode(
            r#"{"id":"app","secret":"s","domain":"https://app.example.com","public":false,
                "userID":"u1","grantType":"password","password":"hunter2","account":"alice"}"#,
        );

        let ClientInfo::Password(client) = &info else {
            panic!("expected password variant, got {:?}", info);
        };
        assert_eq!(client.id, "app");
        assert_eq!(client.user_id, "u1");
        assert_eq!(client.password, "hunter2");
        assert_eq!(client.account, "alice");
        assert_eq!(info.grant_type(), GrantType::PasswordCredentials);
        assert_eq!(info.password_credentials(), Some(("alice", "hunter2")));
    }

    #[test]
    fn test_other_discriminators_drop_credential_garbage() {
        let info = decode(
            r#"{"id":"app","grantType":"client_credentials","password":{"nested":[1,2]},"account":42}"#,
        );

        assert_eq!(
            info,
            ClientInfo::Generic(Client {
                id: "app".to_string(),
                grant_type: GrantType::ClientCredentials,
                ..Default::default()
            })
        );
        assert_eq!(info.password_credentials(), None);
    }

    #[test]
    fn test_missing_discriminator_is_generic() {
        let info = decode(r#"{"id":"app","secret":"s","password":"p","account":"a"}"#);
        assert!(matches!(info, ClientInfo::Generic(_)));
        assert_eq!(info.grant_type(), GrantType::Other(String::new()));
    }

    #[test]
    fn test_password_variant_rejects_non_string_credentials() {
        let stored: StoredClient =
            serde_json::from_str(r#"{"id":"app","grantType":"password","password":7}"#).unwrap();
        let err = ClientInfo::try_from(stored).unwrap_err();
        assert!(err.is_encoding());
    }

    #[test]
    fn test_generic_record_omits_credential_fields() {
        let info = ClientInfo::Generic(Client {
            id: "app".to_string(),
            user_id: "u1".to_string(),
            grant_type: GrantType::AuthorizationCode,
            ..Default::default()
        });

        let value = serde_json::to_value(StoredClient::from(&info)).unwrap();
        assert_eq!(value["userID"], "u1");
        assert_eq!(value["grantType"], "authorization_code");
        assert!(value.get("password").is_none());
        assert!(value.get("account").is_none());
    }

    #[test]
    fn test_permission_keeps_unknown_fields() {
        let json = r#"{"resource":"orders","actions":["read"],"effect":"allow"}"#;
        let permission: ClientPermission = serde_json::from_str(json).unwrap();
        assert_eq!(permission.resource(), Some("orders"));
        assert_eq!(permission.actions(), vec!["read"]);
        assert_eq!(permission.get("effect").and_then(|v| v.as_str()), Some("allow"));

        let value = serde_json::to_value(&permission).unwrap();
        assert_eq!(value["effect"], "allow");
        assert_eq!(value["actions"][0], "read");
    }

    #[test]
    fn test_permission_without_conventional_fields() {
        let json = r#"{"scope":"orders:read","allow":true,"actions":"read"}"#;
        let permission: ClientPermission = serde_json::from_str(json).unwrap();
        assert_eq!(permission.resource(), None);
        assert!(permission.actions().is_empty());
        assert_eq!(permission.get("scope").and_then(|v| v.as_str()), Some("orders:read"));
        assert_eq!(permission.fields().len(), 3);

        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(serde_json::to_value(&permission).unwrap(), value);
    }

    #[test]
    fn test_permission_must_be_an_object() {
        assert!(serde_json::from_str::<ClientPermission>(r#""orders""#).is_err());
    }

    #[test]
    fn test_generated_credentials() {
        assert_ne!(generate_client_id(), generate_client_id());
        let secret = generate_client_secret();
        assert_eq!(secret.len(), 43);
        assert!(!secret.contains('='));
    }
}
