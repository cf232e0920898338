//! keyrelay CLI - Command-line client for the keyrelay resource API

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tabled::{Table, Tabled};

const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";

#[derive(Parser, Debug)]
#[command(name = "keyrelay")]
#[command(about = "keyrelay CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API server URL
    #[arg(long, env = "KEYRELAY_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage user records
    #[command(subcommand)]
    Users(UsersCommand),

    /// Show daemon health and job counts
    Status,
}

#[derive(Subcommand, Debug)]
enum UsersCommand {
    /// Register a user; the account key is fetched in the background
    Create(CreateUser),

    /// List users, most recent first
    List(ListUsers),
}

#[derive(Args, Debug, Serialize)]
struct CreateUser {
    #[arg(long)]
    email: String,

    #[arg(long)]
    phone_number: String,

    #[arg(long)]
    password: String,

    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    full_name: Option<String>,

    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<String>,
}

#[derive(Args, Debug)]
struct ListUsers {
    /// Exact email match
    #[arg(long)]
    email: Option<String>,

    /// Exact full name match
    #[arg(long)]
    full_name: Option<String>,

    /// Case-insensitive substring of metadata
    #[arg(long)]
    metadata: Option<String>,
}

impl ListUsers {
    fn query(&self) -> Vec<(&'static str, &str)> {
        [
            ("email", self.email.as_deref()),
            ("full_name", self.full_name.as_deref()),
            ("metadata", self.metadata.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect()
    }
}

#[derive(Deserialize, Tabled)]
struct UserRow {
    email: String,
    phone_number: String,
    #[tabled(display_with = "display_option")]
    full_name: Option<String>,
    #[tabled(display_with = "display_account_key")]
    account_key: Option<String>,
    #[tabled(display_with = "display_option")]
    metadata: Option<String>,
}

#[derive(Deserialize)]
struct JobCounts {
    queued: i64,
    running: i64,
    done: i64,
    failed: i64,
}

#[derive(Deserialize)]
struct Health {
    status: String,
    version: String,
    jobs: JobCounts,
}

#[derive(Deserialize)]
struct ErrorBody {
    errors: Vec<String>,
}

fn display_option(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn display_account_key(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "(pending)".to_string())
}

/// Decode a JSON body, turning `{"errors": [...]}` responses into an error
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await.context("Failed to read response")?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.errors.join("; "))
            .unwrap_or(body);
        anyhow::bail!("API error ({}): {}", status.as_u16(), message);
    }

    serde_json::from_str(&body).context("Failed to parse response")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let base = cli.api_url.trim_end_matches('/');
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Users(UsersCommand::Create(user)) => {
            let response = client
                .post(format!("{}/api/users", base))
                .json(&serde_json::json!({ "user": user }))
                .send()
                .await
                .context("Failed to connect to daemon")?;
            let created: UserRow = decode(response).await?;

            println!("{}", "✓ User created".green().bold());
            println!("  Account key will be fetched in the background.");
            println!();
            println!("{}", Table::new(vec![created]));
        }

        Commands::Users(UsersCommand::List(filter)) => {
            let response = client
                .get(format!("{}/api/users", base))
                .query(&filter.query())
                .send()
                .await
                .context("Failed to connect to daemon")?;
            let users: Vec<UserRow> = decode(response).await?;

            if users.is_empty() {
                println!("{}", "No users found".yellow());
            } else {
                println!("{}", Table::new(users));
            }
        }

        Commands::Status => {
            println!("{}", "System Status".cyan().bold());
            println!();

            let health = match client.get(format!("{}/health", base)).send().await {
                Ok(response) => decode::<Health>(response).await,
                Err(e) => Err(anyhow::Error::new(e).context("Failed to connect to daemon")),
            };

            match health {
                Ok(health) => {
                    println!("  {} {}", "API URL:".bold(), base);
                    println!("  {} {}", "Status:".bold(), health.status.to_uppercase().green());
                    println!("  {} {}", "Version:".bold(), health.version);
                    println!();
                    println!("  {} {}", "Queued:".bold(), health.jobs.queued);
                    println!("  {} {}", "Running:".bold(), health.jobs.running);
                    println!("  {} {}", "Done:".bold(), health.jobs.done);
                    println!("  {} {}", "Failed:".bold(), health.jobs.failed);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {:#}", "Error:".bold(), e);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_users_create() {
        let cli = Cli::try_parse_from([
            "keyrelay",
            "--api-url",
            "http://localhost:9000",
            "users",
            "create",
            "--email",
            "a@example.com",
            "--phone-number",
            "555-0100",
            "--password",
            "secret",
        ])
        .unwrap();

        assert_eq!(cli.api_url, "http://localhost:9000");
        let Commands::Users(UsersCommand::Create(user)) = cli.command else {
            panic!("expected users create");
        };
        let body = serde_json::to_value(&user).unwrap();
        assert_eq!(body["email"], "a@example.com");
        assert_eq!(body["phone_number"], "555-0100");
        assert!(body.get("full_name").is_none());
    }

    #[test]
    fn test_list_query_skips_unset_filters() {
        let filter = ListUsers {
            email: None,
            full_name: Some("Ann Lee".to_string()),
            metadata: Some("age".to_string()),
        };

        assert_eq!(filter.query(), vec![("full_name", "Ann Lee"), ("metadata", "age")]);
    }

    #[test]
    fn test_pending_account_key_display() {
        assert_eq!(display_account_key(&None), "(pending)");
        assert_eq!(display_account_key(&Some("tok-123".to_string())), "tok-123");
    }
}
