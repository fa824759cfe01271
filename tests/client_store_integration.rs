//! Client Store Integration Tests
//!
//! These tests drive the public `ClientStore` interface over the in-memory
//! backend: round trips, not-found handling, idempotent deletes, the empty-id
//! quirk, permission replacement, namespace isolation and grant-type
//! resolution.

use client_store::errors::StorageError;
use client_store::oauth::types::{Client, ClientInfo, ClientPermission, GrantType, PasswordClient};
use client_store::storage::{
    ClientStore, KvClientStore, MemoryKvBackend, RequestContext, StorageBackend, StoreOptions,
    create_client_store,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn ctx() -> RequestContext {
    RequestContext::background()
}

fn password_client(id: &str) -> ClientInfo {
    ClientInfo::Password(PasswordClient {
        id: id.to_string(),
        secret: "s3cret".to_string(),
        domain: "https://app.example.com".to_string(),
        public: false,
        user_id: "user123".to_string(),
        password: "hunter2".to_string(),
        account: "alice".to_string(),
    })
}

fn generic_client(id: &str, grant_type: GrantType) -> ClientInfo {
    ClientInfo::Generic(Client {
        id: id.to_string(),
        secret: "s3cret".to_string(),
        domain: "https://app.example.com".to_string(),
        public: false,
        user_id: "user123".to_string(),
        grant_type,
    })
}

fn permission(resource: &str, actions: &[&str]) -> ClientPermission {
    ClientPermission::new(resource, actions.iter().map(|a| a.to_string()).collect())
}

#[tokio::test]
async fn test_round_trip_for_every_grant_type() {
    let store = KvClientStore::new(MemoryKvBackend::new());

    let clients = vec![
        password_client("password-app"),
        generic_client("code-app", GrantType::AuthorizationCode),
        generic_client("service-app", GrantType::ClientCredentials),
        generic_client("refresh-app", GrantType::RefreshToken),
        generic_client("implicit-app", GrantType::Implicit),
        generic_client("device-app", GrantType::Other("device_code".to_string())),
    ];

    for client in &clients {
        store.create_client(&ctx(), client).await.unwrap();
    }

    for client in &clients {
        let stored = store.get_by_id(&ctx(), client.id()).await.unwrap().unwrap();
        assert_eq!(stored.id(), client.id());
        assert_eq!(stored.secret(), client.secret());
        assert_eq!(stored.domain(), client.domain());
        assert_eq!(stored.is_public(), client.is_public());
        assert_eq!(stored.user_id(), client.user_id());
        assert_eq!(stored.grant_type(), client.grant_type());
        assert_eq!(stored.password_credentials(), client.password_credentials());
    }
}

#[tokio::test]
async fn test_not_found_is_distinct_from_backend_failure() {
    let backend = Arc::new(MemoryKvBackend::new());
    let store = KvClientStore::new(backend.clone());

    // Never created
    assert_eq!(store.get_by_id(&ctx(), "ghost").await.unwrap(), None);

    // Broken connection
    backend.set_unavailable(true);
    let err = store.get_by_id(&ctx(), "ghost").await.unwrap_err();
    assert!(err.is_backend());
    assert!(!err.is_encoding());

    let err = store.get_permission_by_id(&ctx(), "ghost").await.unwrap_err();
    assert!(err.is_backend());
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let store = KvClientStore::new(MemoryKvBackend::new());

    store.remove_client_info_by_id(&ctx(), "never-created").await.unwrap();

    store
        .create_client(&ctx(), &generic_client("app", GrantType::AuthorizationCode))
        .await
        .unwrap();
    store.remove_client_info_by_id(&ctx(), "app").await.unwrap();
    store.remove_client_info_by_id(&ctx(), "app").await.unwrap();

    assert_eq!(store.get_by_id(&ctx(), "app").await.unwrap(), None);
}

#[tokio::test]
async fn test_remove_client_keeps_permissions() {
    let store = KvClientStore::new(MemoryKvBackend::new());

    store.create_client(&ctx(), &password_client("app")).await.unwrap();
    store
        .create_client_permission(&ctx(), "app", &[permission("orders", &["read"])])
        .await
        .unwrap();
    store.remove_client_info_by_id(&ctx(), "app").await.unwrap();

    assert_eq!(store.get_by_id(&ctx(), "app").await.unwrap(), None);
    assert_eq!(
        store.get_permission_by_id(&ctx(), "app").await.unwrap(),
        vec![permission("orders", &["read"])]
    );
}

#[tokio::test]
async fn test_empty_id_is_silent_no_op() {
    let backend = Arc::new(MemoryKvBackend::new());
    let store = KvClientStore::new(backend.clone());

    store.create_client(&ctx(), &password_client("")).await.unwrap();
    store
        .create_client_permission(&ctx(), "", &[permission("orders", &["read"])])
        .await
        .unwrap();

    assert_eq!(store.get_by_id(&ctx(), "").await.unwrap(), None);
    assert!(store.get_permission_by_id(&ctx(), "").await.unwrap().is_empty());
    assert!(backend.keys().await.is_empty());
}

#[tokio::test]
async fn test_permissions_are_replaced_not_merged() {
    let store = KvClientStore::new(MemoryKvBackend::new());

    let p1 = permission("orders", &["read"]);
    let p2 = permission("invoices", &["read", "write"]);
    let p3 = permission("profile", &["read"]);

    store
        .create_client_permission(&ctx(), "app", &[p1.clone(), p2.clone()])
        .await
        .unwrap();
    assert_eq!(
        store.get_permission_by_id(&ctx(), "app").await.unwrap(),
        vec![p1, p2]
    );

    store
        .create_client_permission(&ctx(), "app", &[p3.clone()])
        .await
        .unwrap();
    assert_eq!(
        store.get_permission_by_id(&ctx(), "app").await.unwrap(),
        vec![p3]
    );
}

#[tokio::test]
async fn test_foreign_permission_records_are_opaque() {
    let backend = Arc::new(MemoryKvBackend::new());
    let store = KvClientStore::new(backend.clone());

    backend
        .insert_raw(
            "oauth2:client-permissions:app",
            br#"[{"scope":"orders:read","allow":true},{"resource":"invoices"}]"#.to_vec(),
        )
        .await;

    let permissions = store.get_permission_by_id(&ctx(), "app").await.unwrap();
    assert_eq!(permissions.len(), 2);
    assert_eq!(permissions[0].resource(), None);
    assert_eq!(permissions[0].get("scope").and_then(|v| v.as_str()), Some("orders:read"));
    assert_eq!(permissions[0].get("allow").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(permissions[1].resource(), Some("invoices"));
    assert!(permissions[1].actions().is_empty());

    // Written back unchanged
    store
        .create_client_permission(&ctx(), "copy", &permissions)
        .await
        .unwrap();
    assert_eq!(
        store.get_permission_by_id(&ctx(), "copy").await.unwrap(),
        permissions
    );
}

#[tokio::test]
async fn test_namespaces_are_isolated() {
    let backend = Arc::new(MemoryKvBackend::new());
    let store_a = KvClientStore::with_namespace(backend.clone(), "a:");
    let store_b = KvClientStore::with_namespace(backend.clone(), "b:");

    store_a.create_client(&ctx(), &password_client("app")).await.unwrap();
    store_a
        .create_client_permission(&ctx(), "app", &[permission("orders", &["read"])])
        .await
        .unwrap();

    assert_eq!(store_b.get_by_id(&ctx(), "app").await.unwrap(), None);
    assert!(store_b.get_permission_by_id(&ctx(), "app").await.unwrap().is_empty());

    store_b
        .create_client(&ctx(), &generic_client("app", GrantType::ClientCredentials))
        .await
        .unwrap();
    store_b.remove_client_info_by_id(&ctx(), "app").await.unwrap();

    let from_a = store_a.get_by_id(&ctx(), "app").await.unwrap().unwrap();
    assert_eq!(from_a, password_client("app"));
}

#[tokio::test]
async fn test_discriminator_decides_variant() {
    let backend = Arc::new(MemoryKvBackend::new());
    let store = KvClientStore::new(backend.clone());

    backend
        .insert_raw(
            "oauth2:client:legacy",
            br#"{"id":"legacy","secret":"s","domain":"d","public":true,"userID":"u",
                 "grantType":"client_credentials","password":"leaked","account":"root"}"#
                .to_vec(),
        )
        .await;
    backend
        .insert_raw(
            "oauth2:client:pw",
            br#"{"id":"pw","secret":"s","domain":"d","public":false,"userID":"u",
                 "grantType":"password","password":"hunter2","account":"alice"}"#
                .to_vec(),
        )
        .await;

    let legacy = store.get_by_id(&ctx(), "legacy").await.unwrap().unwrap();
    assert_eq!(legacy.grant_type(), GrantType::ClientCredentials);
    assert_eq!(legacy.password_credentials(), None);
    assert!(legacy.is_public());

    let pw = store.get_by_id(&ctx(), "pw").await.unwrap().unwrap();
    assert_eq!(pw.password_credentials(), Some(("alice", "hunter2")));
}

#[tokio::test]
async fn test_password_discriminator_without_extras() {
    let store = KvClientStore::new(MemoryKvBackend::new());

    // A generic client tagged with the password grant is resolved by its tag
    store
        .create_client(&ctx(), &generic_client("app", GrantType::PasswordCredentials))
        .await
        .unwrap();

    let stored = store.get_by_id(&ctx(), "app").await.unwrap().unwrap();
    assert!(matches!(stored, ClientInfo::Password(_)));
    assert_eq!(stored.password_credentials(), Some(("", "")));
}

#[tokio::test]
async fn test_cancellation_is_reported_as_backend_error() {
    let store = KvClientStore::new(MemoryKvBackend::new());
    let token = CancellationToken::new();
    let cancelled = RequestContext::with_cancellation(token.clone());
    token.cancel();

    let err = store
        .create_client(&cancelled, &password_client("app"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Cancelled));

    // Nothing was written
    assert_eq!(store.get_by_id(&ctx(), "app").await.unwrap(), None);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_store() {
    let store: Arc<dyn ClientStore> = create_client_store(
        StorageBackend::Memory,
        StoreOptions {
            namespace: "shared:".to_string(),
            operation_timeout: None,
        },
    )
    .await
    .unwrap();

    let writes = (0..32).map(|i| {
        let store = store.clone();
        async move {
            let id = format!("app-{}", i);
            store.create_client(&ctx(), &password_client(&id)).await?;
            store
                .create_client_permission(&ctx(), &id, &[permission("orders", &["read"])])
                .await
        }
    });
    for result in futures::future::join_all(writes).await {
        result.unwrap();
    }

    for i in 0..32 {
        let id = format!("app-{}", i);
        assert_eq!(
            store.get_by_id(&ctx(), &id).await.unwrap(),
            Some(password_client(&id))
        );
        assert_eq!(store.get_permission_by_id(&ctx(), &id).await.unwrap().len(), 1);
    }

    store.close().await.unwrap();
}
