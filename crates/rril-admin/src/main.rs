//! rril-admin - command line admin shell for the RRIL website.
//!
//! Signs an admin in against the backend, shows and clears the stored
//! session, and submits the public contact form.

mod app;

use std::io;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rril_core::api::ContactForm;
use rril_core::Config;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;

#[derive(Parser, Debug)]
#[command(name = "rril-admin", version, about = "RRIL website admin shell")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: Option<String>,
        /// Display name to use when the backend does not send one
        #[arg(long)]
        name: Option<String>,
    },
    /// Clear the stored session
    Logout,
    /// Show the stored session
    Status {
        /// Print the session as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch the signed-in profile from the backend
    Whoami,
    /// Submit the website contact form
    Contact {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        message: String,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_tracing();

    let config = Config::load().context("Failed to load config")?;
    let mut app = App::new(config)?;

    match cli.command {
        Command::Login { email, name } => {
            let session = app.login(email, name).await?;
            info!("Login command finished");
            println!(
                "Signed in as {}",
                session.display_name().unwrap_or("unknown")
            );
        }
        Command::Logout => {
            let route = app.logout()?;
            println!("Signed out. Continue at {}", route);
        }
        Command::Status { json } => {
            if json {
                println!("{}", app.session_json()?);
            } else {
                for line in app.status_lines()? {
                    println!("{}", line);
                }
            }
        }
        Command::Whoami => {
            let profile = app.whoami().await?;
            println!("{}", profile.name.as_deref().unwrap_or(&profile.email));
            println!("Email: {}", profile.email);
            if let Some(role) = profile.role {
                println!("Role: {}", role);
            }
        }
        Command::Contact {
            name,
            email,
            phone,
            subject,
            message,
        } => {
            let form = ContactForm {
                name,
                email,
                phone,
                subject,
                message,
            };
            app.send_contact(&form).await?;
            println!("Thanks! Your message has been sent.");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_login() {
        let cli = Cli::try_parse_from(["rril-admin", "login", "--email", "admin@rril.com"]).unwrap();
        match cli.command {
            Command::Login { email, name } => {
                assert_eq!(email.as_deref(), Some("admin@rril.com"));
                assert_eq!(name, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_contact_requires_message() {
        assert!(Cli::try_parse_from([
            "rril-admin", "contact", "--name", "Jane", "--email", "jane@example.com",
        ])
        .is_err());
    }

    #[test]
    fn test_parse_status_json() {
        let cli = Cli::try_parse_from(["rril-admin", "status", "--json"]).unwrap();
        assert!(matches!(cli.command, Command::Status { json: true }));
    }
}
