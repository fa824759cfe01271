//! OAuth2 client store management CLI.
//!
//! Creates, reads and removes client registrations and permission lists in
//! the configured key-value backend.
//!
//! ## Usage Examples
//!
//! ```bash
//! # Register a password-credentials client with a generated id and secret
//! STORAGE_BACKEND=redis REDIS_URL=redis://127.0.0.1:6379 KEY_NAMESPACE=prod: \
//!   client-store create --domain https://app.example.com \
//!   --grant-type password --account alice --password hunter2
//!
//! # Replace the permission list of a client
//! client-store grant --client-id app \
//!   --permissions '[{"resource":"orders","actions":["read","write"]}]'
//!
//! client-store get --client-id app
//! client-store permissions --client-id app
//! client-store remove --client-id app
//! ```
//!
//! ## Environment Variables
//!
//! - `STORAGE_BACKEND`: `redis` or `redis-cluster`; defaults to `redis` when
//!   `REDIS_URL` is set. `memory` is refused, since nothing would survive the
//!   process
//! - `REDIS_URL`: Redis connection URL, or a comma-separated list of node URLs
//!   for `redis-cluster`
//! - `KEY_NAMESPACE`: prefix for every key written by this store
//! - `OPERATION_TIMEOUT`: per-operation backend timeout, e.g. `5s`; `0` disables
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error (configuration, input parsing)
//! - 2: Client or permission list not found
//! - 3: Storage error

use clap::{Args, Parser, Subcommand};
use client_store::{
    config::Config,
    errors::StorageError,
    oauth::types::{
        Client, ClientInfo, ClientPermission, GrantType, PasswordClient, generate_client_id,
        generate_client_secret,
    },
    storage::{ClientStore, RequestContext, StorageBackend, create_client_store},
};
use serde_json::{Value, json};
use std::process;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;

/// Main CLI application structure
#[derive(Parser)]
#[command(
    name = "client-store",
    about = "OAuth2 client registration store management",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Store a client registration
    Create(CreateArgs),
    /// Show a client registration
    Get(ClientIdArgs),
    /// Remove a client registration
    Remove(ClientIdArgs),
    /// Replace the permission list of a client
    Grant(GrantArgs),
    /// Show the permission list of a client
    Permissions(ClientIdArgs),
}

/// Arguments for client creation
#[derive(Args)]
struct CreateArgs {
    /// Client ID, generated when omitted
    #[arg(long)]
    id: Option<String>,

    /// Client secret, generated for confidential clients when omitted
    #[arg(long)]
    secret: Option<String>,

    /// Redirect/callback domain
    #[arg(long, default_value = "")]
    domain: String,

    /// Register a public client
    #[arg(long)]
    public: bool,

    /// Owning user
    #[arg(long, default_value = "")]
    user_id: String,

    /// Grant type, e.g. authorization_code, client_credentials, password
    #[arg(long, default_value = "authorization_code")]
    grant_type: String,

    /// Resource owner account (password grant only)
    #[arg(long, default_value = "")]
    account: String,

    /// Resource owner password (password grant only)
    #[arg(long, default_value = "", env = "CLIENT_STORE_ACCOUNT_PASSWORD")]
    password: String,
}

/// Arguments identifying a single client
#[derive(Args)]
struct ClientIdArgs {
    #[arg(long)]
    client_id: String,
}

/// Arguments for permission replacement
#[derive(Args)]
struct GrantArgs {
    #[arg(long)]
    client_id: String,

    /// JSON array of permissions, e.g. '[{"resource":"orders","actions":["read"]}]'
    #[arg(long)]
    permissions: String,
}

/// Application errors
#[derive(Debug)]
enum AppError {
    /// Configuration or input errors
    General(String),
    /// Requested record does not exist
    NotFound(String),
    /// Backend or encoding errors
    Storage(StorageError),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::General(err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::General(msg) => write!(f, "Error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Storage(err) => write!(f, "Storage error: {}", err),
        }
    }
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::General(_) => 1,
            AppError::NotFound(_) => 2,
            AppError::Storage(_) => 3,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "client_store=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(&cli).await {
        eprintln!("{}", err);
        process::exit(err.exit_code());
    }
}

async fn run(cli: &Cli) -> Result<(), AppError> {
    let config = Config::new()?;
    tracing::debug!(version = %config.version, backend = %config.storage_backend, "starting");

    let backend = config.backend()?;
    require_persistent_backend(&backend)?;
    let store = create_client_store(backend, config.store_options()).await?;

    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling pending operation");
                token.cancel();
            }
        });
    }
    let ctx = RequestContext::with_cancellation(token);

    let result = execute(cli, &ctx, store.clone()).await;

    if let Err(err) = store.close().await {
        tracing::warn!(error = ?err, "failed to close store");
    }

    let output = result?;
    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&output)
    } else {
        serde_json::to_string(&output)
    }
    .map_err(|e| AppError::General(e.to_string()))?;
    println!("{}", rendered);
    Ok(())
}

async fn execute(
    cli: &Cli,
    ctx: &RequestContext,
    store: Arc<dyn ClientStore>,
) -> Result<Value, AppError> {
    match &cli.command {
        Commands::Create(args) => {
            let client = build_client(args)?;
            store.create_client(ctx, &client).await?;
            Ok(client_json(&client))
        }
        Commands::Get(args) => match store.get_by_id(ctx, &args.client_id).await? {
            Some(client) => Ok(client_json(&client)),
            None => Err(AppError::NotFound(format!("client '{}'", args.client_id))),
        },
        Commands::Remove(args) => {
            store.remove_client_info_by_id(ctx, &args.client_id).await?;
            Ok(json!({ "removed": args.client_id }))
        }
        Commands::Grant(args) => {
            let permissions: Vec<ClientPermission> = serde_json::from_str(&args.permissions)
                .map_err(|e| AppError::General(format!("Invalid permissions JSON: {}", e)))?;
            store
                .create_client_permission(ctx, &args.client_id, &permissions)
                .await?;
            Ok(json!({ "client_id": args.client_id, "permissions": permissions }))
        }
        Commands::Permissions(args) => {
            let permissions = store.get_permission_by_id(ctx, &args.client_id).await?;
            if permissions.is_empty() {
                return Err(AppError::NotFound(format!(
                    "permissions for client '{}'",
                    args.client_id
                )));
            }
            Ok(json!({ "client_id": args.client_id, "permissions": permissions }))
        }
    }
}

/// Each invocation is its own process, so the memory backend would drop every
/// write on exit
fn require_persistent_backend(backend: &StorageBackend) -> Result<(), AppError> {
    if *backend == StorageBackend::Memory {
        tracing::warn!("memory backend keeps nothing between invocations");
        return Err(AppError::General(
            "memory backend is not persistent; set REDIS_URL or STORAGE_BACKEND=redis".to_string(),
        ));
    }
    Ok(())
}

fn build_client(args: &CreateArgs) -> Result<ClientInfo, AppError> {
    let id = args.id.clone().unwrap_or_else(generate_client_id);
    if id.is_empty() {
        return Err(AppError::General("client id must not be empty".to_string()));
    }

    let secret = match &args.secret {
        Some(secret) => secret.clone(),
        None if args.public => String::new(),
        None => generate_client_secret(),
    };

    let client = match GrantType::from(args.grant_type.as_str()) {
        GrantType::PasswordCredentials => ClientInfo::Password(PasswordClient {
            id,
            secret,
            domain: args.domain.clone(),
            public: args.public,
            user_id: args.user_id.clone(),
            password: args.password.clone(),
            account: args.account.clone(),
        }),
        grant_type => ClientInfo::Generic(Client {
            id,
            secret,
            domain: args.domain.clone(),
            public: args.public,
            user_id: args.user_id.clone(),
            grant_type,
        }),
    };
    Ok(client)
}

fn client_json(client: &ClientInfo) -> Value {
    let mut value = json!({
        "id": client.id(),
        "secret": client.secret(),
        "domain": client.domain(),
        "public": client.is_public(),
        "userID": client.user_id(),
        "grantType": client.grant_type(),
    });
    if let Some((account, _)) = client.password_credentials() {
        value["account"] = json!(account);
    }
    value
}
