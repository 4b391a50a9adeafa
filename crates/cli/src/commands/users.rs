//! User administration commands.

use anyhow::Context;
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use warden_auth::Identity;
use warden_client::{Client, SoftDeleteConfirmation};
use warden_core::UserId;

use crate::output::{self, OutputFormat};

/// Arguments for user commands
#[derive(Debug, Args)]
pub struct UsersArgs {
    /// User subcommand
    #[command(subcommand)]
    pub command: UsersCommand,
}

/// User subcommands
#[derive(Debug, Subcommand)]
pub enum UsersCommand {
    /// List all users
    List {
        /// Include soft-deleted users
        #[arg(long)]
        include_deleted: bool,
    },
    /// Soft-delete a user (restorable)
    Delete {
        /// User ID
        id: UserId,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// User display row for table output
#[derive(Debug, Serialize, Tabled)]
struct UserRow {
    /// User ID
    id: i64,
    /// Username
    username: String,
    /// Email
    email: String,
    /// Role
    role: String,
    /// Active
    active: bool,
    /// Created at
    created_at: String,
}

impl From<&Identity> for UserRow {
    fn from(u: &Identity) -> Self {
        Self {
            id: u.id.get(),
            username: u.username.clone(),
            email: u.email.clone(),
            role: u.role.to_string(),
            active: u.active,
            created_at: u.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// Execute user commands
pub async fn execute(client: &Client, args: &UsersArgs, format: OutputFormat) -> anyhow::Result<()> {
    super::require_session(client)?;
    let directory = client.directory();

    match &args.command {
        UsersCommand::List { include_deleted } => {
            let users = directory.list_users_with(*include_deleted).await?;
            let rows: Vec<UserRow> = users.iter().map(UserRow::from).collect();
            output::print_list(&rows, format);
        }
        UsersCommand::Delete { id, yes } => {
            let users = directory.list_users().await?;
            let target = users
                .iter()
                .find(|u| u.id == *id)
                .with_context(|| format!("user {id} not found"))?;

            let confirmed = *yes
                || dialoguer::Confirm::new()
                    .with_prompt(format!(
                        "Delete user '{}'? They can be restored from the deleted list.",
                        target.username
                    ))
                    .default(false)
                    .interact()
                    .context("input error")?;

            if !confirmed {
                println!("Cancelled.");
                return Ok(());
            }

            let ack = directory
                .delete_user(*id, &SoftDeleteConfirmation::granted(*id))
                .await?;
            output::print_success(&ack.message);
        }
    }

    Ok(())
}
