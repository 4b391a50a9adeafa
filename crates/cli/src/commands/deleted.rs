//! Deleted-user administration commands.

use anyhow::Context;
use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;
use tabled::Tabled;

use warden_auth::{DeletedOrder, DeletionRecord};
use warden_client::{Client, ClientError, PurgeConfirmation};
use warden_core::UserId;

use crate::output::{self, OutputFormat};

/// Arguments for deleted-user commands
#[derive(Debug, Args)]
pub struct DeletedArgs {
    /// Deleted-user subcommand
    #[command(subcommand)]
    pub command: DeletedCommand,
}

/// Listing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrderArg {
    /// Most recently deleted first
    Newest,
    /// Earliest deleted first
    Oldest,
    /// Alphabetical by username
    Username,
}

impl From<OrderArg> for DeletedOrder {
    fn from(value: OrderArg) -> Self {
        match value {
            OrderArg::Newest => DeletedOrder::NewestFirst,
            OrderArg::Oldest => DeletedOrder::OldestFirst,
            OrderArg::Username => DeletedOrder::Username,
        }
    }
}

/// Deleted-user subcommands
#[derive(Debug, Subcommand)]
pub enum DeletedCommand {
    /// List soft-deleted users
    List {
        /// Sort order
        #[arg(short, long, value_enum, default_value = "newest")]
        order: OrderArg,
    },
    /// Restore a soft-deleted user
    Restore {
        /// User ID
        id: UserId,
    },
    /// Permanently delete a soft-deleted user (irreversible)
    Purge {
        /// User ID
        id: UserId,
    },
}

/// Deleted user display row for table output
#[derive(Debug, Serialize, Tabled)]
struct DeletedRow {
    /// User ID
    id: i64,
    /// Username
    username: String,
    /// Email
    email: String,
    /// Deleted at
    deleted_at: String,
    /// Deleted by
    deleted_by: String,
}

impl From<&DeletionRecord> for DeletedRow {
    fn from(r: &DeletionRecord) -> Self {
        let deleted_by = match (&r.deleted_by_username, r.deleted_by) {
            (Some(name), _) => name.clone(),
            (None, Some(id)) => format!("#{id}"),
            (None, None) => "-".to_string(),
        };
        Self {
            id: r.id().get(),
            username: r.identity.username.clone(),
            email: r.identity.email.clone(),
            deleted_at: r.deleted_at.format("%Y-%m-%d %H:%M").to_string(),
            deleted_by,
        }
    }
}

/// Execute deleted-user commands
pub async fn execute(
    client: &Client,
    args: &DeletedArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    super::require_session(client)?;
    let deleted = client.deleted();

    match &args.command {
        DeletedCommand::List { order } => {
            let records = deleted.list_deleted_by((*order).into()).await?;
            let rows: Vec<DeletedRow> = records.iter().map(DeletedRow::from).collect();
            output::print_list(&rows, format);
        }
        DeletedCommand::Restore { id } => match deleted.restore(*id).await {
            Ok(ack) => output::print_success(&ack.message),
            Err(ClientError::NotFound(detail)) => {
                output::print_warning(&format!(
                    "{detail}: user {id} was already restored or purged; the list was refreshed"
                ));
            }
            Err(e) => return Err(e.into()),
        },
        DeletedCommand::Purge { id } => {
            let records = deleted.list_deleted().await?;
            let record = records
                .iter()
                .find(|r| r.id() == *id)
                .with_context(|| format!("user {id} is not in the deleted list"))?;

            output::print_warning(&format!(
                "This permanently deletes '{}' and cannot be undone.",
                record.identity.username
            ));
            let typed: String = dialoguer::Input::new()
                .with_prompt(format!(
                    "Type the username '{}' to confirm",
                    record.identity.username
                ))
                .allow_empty(true)
                .interact_text()
                .context("input error")?;

            match deleted
                .permanent_delete(*id, &PurgeConfirmation::new(*id, typed))
                .await
            {
                Ok(ack) => output::print_success(&ack.message),
                Err(ClientError::Refused(reason)) => {
                    println!("Cancelled: {reason}.");
                }
                Err(ClientError::NotFound(detail)) => {
                    output::print_warning(&format!(
                        "{detail}: user {id} was already restored or purged; the list was refreshed"
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}
