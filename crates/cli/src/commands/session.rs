//! Session commands: login, register, logout, whoami, open, menu, watch.

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use warden_auth::{RegistrationForm, Screen, View};
use warden_client::Client;

use crate::output::{self, OutputFormat};

/// Arguments for `login`
#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Username (prompted when omitted)
    #[arg(short, long)]
    pub username: Option<String>,
}

/// Arguments for `register`
#[derive(Debug, Args)]
pub struct RegisterArgs {
    /// Username (prompted when omitted)
    #[arg(short, long)]
    pub username: Option<String>,
    /// Email (prompted when omitted)
    #[arg(short, long)]
    pub email: Option<String>,
}

/// Menu display row for table output
#[derive(Debug, Serialize, Tabled)]
struct MenuRow {
    /// Title
    title: String,
    /// Path
    path: String,
}

fn prompt_text(prompt: &str, given: &Option<String>) -> anyhow::Result<String> {
    match given {
        Some(value) => Ok(value.clone()),
        None => dialoguer::Input::new()
            .with_prompt(prompt)
            .interact_text()
            .context("input error"),
    }
}

fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    dialoguer::Password::new()
        .with_prompt(prompt)
        .interact()
        .context("input error")
}

pub async fn login(client: &Client, args: &LoginArgs, format: OutputFormat) -> anyhow::Result<()> {
    let username = prompt_text("Username", &args.username)?;
    let password = prompt_password("Password")?;

    let session = client.login(&username, &password).await?;
    if let Some(identity) = session.identity() {
        output::print_success(&format!("Signed in as '{}' ({})", identity.username, identity.role));
        if format == OutputFormat::Json {
            output::print_item(identity, format);
        }
    }
    Ok(())
}

pub async fn register(client: &Client, args: &RegisterArgs) -> anyhow::Result<()> {
    let form = RegistrationForm {
        username: prompt_text("Username", &args.username)?,
        email: prompt_text("Email", &args.email)?,
        password: prompt_password("Password")?,
        confirm_password: prompt_password("Confirm password")?,
    };

    let ack = client.register(form).await?;
    let message = if ack.message.is_empty() {
        "Registration successful"
    } else {
        ack.message.as_str()
    };
    output::print_success(&format!("{message}; you can now run `warden login`"));
    Ok(())
}

pub async fn logout(client: &Client) -> anyhow::Result<()> {
    let was_signed_in = client.session().is_authenticated();
    client.logout().await;
    if was_signed_in {
        output::print_success("Signed out");
    } else {
        println!("Not signed in.");
    }
    Ok(())
}

pub fn whoami(client: &Client, format: OutputFormat) -> anyhow::Result<()> {
    let session = client.session();
    match session.identity().filter(|_| session.is_authenticated()) {
        Some(identity) => output::print_item(identity, format),
        None => println!("Not signed in."),
    }
    Ok(())
}

pub fn open(client: &Client, path: &str, format: OutputFormat) -> anyhow::Result<()> {
    let target = View::from_path(path);
    let why = client.navigator().explain(target);
    let screen = client.navigator().navigate(target);
    match format {
        OutputFormat::Json => output::print_item(
            &serde_json::json!({ "screen": screen, "reason": why.reason }),
            format,
        ),
        OutputFormat::Table => {
            match screen {
                Screen::Render(view) => println!("{} ({})", view.title(), view.path()),
                Screen::Login => println!("Sign in required; run `warden login`."),
                Screen::Redirect(view) => {
                    println!("Redirected to {} ({})", view.title(), view.path())
                }
            }
            println!("  {}", why.reason);
        }
    }
    Ok(())
}

pub fn menu(client: &Client, format: OutputFormat) -> anyhow::Result<()> {
    let rows: Vec<MenuRow> = client
        .navigator()
        .menu()
        .into_iter()
        .map(|v| MenuRow {
            title: v.title().to_string(),
            path: v.path().to_string(),
        })
        .collect();
    output::print_list(&rows, format);
    Ok(())
}

/// Hold the session open until Ctrl-C or until the account is deleted.
pub async fn watch(client: &Client) -> anyhow::Result<()> {
    super::require_session(client)?;
    let session = client.session();
    let username = session
        .identity()
        .map(|i| i.username.clone())
        .unwrap_or_default();
    println!(
        "Watching session for '{username}' (checked every {:?}); Ctrl-C to stop.",
        client.reconciler().interval()
    );

    let mut view = client.navigator().subscribe();
    let mut session_rx = client.store().subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                if *view.borrow_and_update() == View::AccountRemoved {
                    output::print_warning("Your account has been deleted. Contact an administrator.");
                    client.navigator().acknowledge_removed();
                    break;
                }
            }
            changed = session_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = session_rx.borrow_and_update().clone();
                if !current.is_authenticated() && !current.is_removed() {
                    output::print_warning("Session ended; sign in again.");
                    break;
                }
            }
        }
    }
    Ok(())
}
