//! CLI command definitions and dispatch.

pub mod deleted;
pub mod session;
pub mod users;

use anyhow::Context;
use clap::{Parser, Subcommand};

use warden_client::{Client, ClientConfig};
use warden_observability::LogFormat;

use crate::output::OutputFormat;

/// warden: sessions, role gates and user administration against a remote authority
#[derive(Debug, Parser)]
#[command(name = "warden", version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the remote authority (overrides WARDEN_API_URL)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Log format on stderr (pretty or json); RUST_LOG sets the level
    #[arg(long, default_value = "pretty")]
    pub log_format: LogFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sign in and persist the session token
    Login(session::LoginArgs),
    /// Create a standard account
    Register(session::RegisterArgs),
    /// Sign out and forget the session token
    Logout,
    /// Show the signed-in identity
    Whoami,
    /// Resolve a view path through the routing guards
    Open {
        /// View path, e.g. /admin/users
        path: String,
    },
    /// List the views reachable from the current session
    Menu,
    /// Keep the session open and report if the account is deleted
    Watch,
    /// User administration (owner only)
    Users(users::UsersArgs),
    /// Deleted-user administration (owner only)
    Deleted(deleted::DeletedArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> anyhow::Result<()> {
        let client = self.connect().await?;
        match &self.command {
            Commands::Login(args) => session::login(&client, args, self.format).await,
            Commands::Register(args) => session::register(&client, args).await,
            Commands::Logout => session::logout(&client).await,
            Commands::Whoami => session::whoami(&client, self.format),
            Commands::Open { path } => session::open(&client, path, self.format),
            Commands::Menu => session::menu(&client, self.format),
            Commands::Watch => session::watch(&client).await,
            Commands::Users(args) => users::execute(&client, args, self.format).await,
            Commands::Deleted(args) => deleted::execute(&client, args, self.format).await,
        }
    }

    /// Build the client from the environment and restore any persisted session.
    async fn connect(&self) -> anyhow::Result<Client> {
        let mut config = ClientConfig::from_env().context("invalid client configuration")?;
        if let Some(url) = &self.api_url {
            config = config.with_api_url(url.clone())?;
        }
        let client = Client::from_config(config).context("failed to initialize client")?;
        client.start().await;
        Ok(client)
    }
}

/// Helper: fail early when no session is held
pub fn require_session(client: &Client) -> anyhow::Result<()> {
    if client.session().is_authenticated() {
        Ok(())
    } else {
        anyhow::bail!("not signed in; run `warden login` first")
    }
}
