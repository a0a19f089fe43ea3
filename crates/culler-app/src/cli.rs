//! Operator command line for inspecting and pruning inventory queues.
//!
//! The daemon side of the engine is embedded into a host process through
//! [`crate::CullerService`]; this binary covers the operations that only
//! need the inventory services: queue and blacklist inspection, manual
//! deletes, and the rule catalog.

use std::path::Path;

use clap::{Parser, Subcommand};
use culler_arr::InventoryClient;
use culler_config::{JsonDocumentStore, PolicySettings};
use culler_core::InventoryKind;
use culler_policy::rule_catalog;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::{SETTINGS_FILE, config_dir};

/// Command-line interface definition.
#[derive(Debug, Parser)]
#[command(name = "culler", version, about = "Retention-policy engine companion tools")]
pub struct Cli {
    /// Base URL of the server hosting the inventory services; overrides the
    /// configured value.
    #[arg(long, env = "CULLER_SERVER_URL")]
    server_url: Option<String>,
    /// API key for the selected service; overrides the configured value.
    #[arg(long, env = "CULLER_API_KEY")]
    api_key: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print an inventory service's download queue as JSON.
    Queue {
        /// Service to query: sonarr, radarr, or lidarr.
        service: String,
    },
    /// Print an inventory service's blacklist as JSON.
    Blacklist {
        /// Service to query: sonarr, radarr, or lidarr.
        service: String,
    },
    /// Delete a queue entry, blacklisting the release by default.
    Delete {
        /// Service holding the entry: sonarr, radarr, or lidarr.
        service: String,
        /// Remote queue-entry id.
        id: i64,
        /// Skip blacklisting the release upstream.
        #[arg(long)]
        no_blacklist: bool,
    },
    /// Delete a blacklist entry.
    DeleteBlacklist {
        /// Service holding the entry: sonarr, radarr, or lidarr.
        service: String,
        /// Remote blacklist-entry id.
        id: i64,
    },
    /// Print the metric rule catalog as JSON.
    Catalog,
}

/// Parse arguments, execute the requested command, and return the process
/// exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", render_error(&err));
            exit_code(&err)
        }
    }
}

async fn dispatch(cli: Cli) -> AppResult<()> {
    let Cli {
        server_url,
        api_key,
        command,
    } = cli;
    let config_dir = config_dir();

    match command {
        Command::Catalog => {
            print_json(&rule_catalog())?;
            Ok(())
        }
        Command::Queue { service } => {
            let client = build_client(&config_dir, server_url, api_key, &service)?;
            let queue = client
                .get_queue()
                .await
                .map_err(|err| AppError::inventory("get_queue", err))?;
            print_json(&queue)
        }
        Command::Blacklist { service } => {
            let client = build_client(&config_dir, server_url, api_key, &service)?;
            let blacklist = client
                .get_blacklist()
                .await
                .map_err(|err| AppError::inventory("get_blacklist", err))?;
            print_json(&blacklist)
        }
        Command::Delete {
            service,
            id,
            no_blacklist,
        } => {
            let client = build_client(&config_dir, server_url, api_key, &service)?;
            let outcome = client
                .delete_queue_item(id, !no_blacklist)
                .await
                .map_err(|err| AppError::inventory("delete_queue_item", err))?;
            match outcome {
                culler_core::DeleteOutcome::Deleted(body) => print_json(&body),
                culler_core::DeleteOutcome::Failed { status } => {
                    print_json(&json!({"deleted": false, "status": status}))
                }
            }
        }
        Command::DeleteBlacklist { service, id } => {
            let client = build_client(&config_dir, server_url, api_key, &service)?;
            let body = client
                .delete_blacklist_item(id)
                .await
                .map_err(|err| AppError::inventory("delete_blacklist_item", err))?;
            print_json(&body)
        }
    }
}

/// Build an inventory client from flags, falling back to the stored
/// settings document for anything not supplied.
fn build_client(
    config_dir: &Path,
    server_url: Option<String>,
    api_key: Option<String>,
    service: &str,
) -> AppResult<InventoryClient> {
    let kind: InventoryKind = service.parse().map_err(|_| AppError::InvalidArgument {
        name: "service",
        value: service.to_string(),
    })?;

    let settings: PolicySettings = JsonDocumentStore::new(config_dir.join(SETTINGS_FILE))
        .load_or_default()
        .unwrap_or_default();

    let server_url = server_url
        .or_else(|| settings.server_url.clone())
        .ok_or(AppError::MissingSetting { name: "server_url" })?;
    let api_key = api_key
        .or_else(|| settings.api_key(kind).map(ToString::to_string))
        .ok_or(AppError::MissingSetting { name: "api_key" })?;

    InventoryClient::new(&server_url, &api_key, kind)
        .map_err(|err| AppError::inventory("client.new", err))
}

fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => {
            println!("{rendered}");
            Ok(())
        }
        Err(err) => Err(AppError::InvalidArgument {
            name: "output",
            value: err.to_string(),
        }),
    }
}

fn render_error(err: &AppError) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

const fn exit_code(err: &AppError) -> i32 {
    match err {
        AppError::MissingSetting { .. } | AppError::InvalidArgument { .. } => 2,
        _ => 3,
    }
}
