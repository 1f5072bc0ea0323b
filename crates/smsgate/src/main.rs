// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! smsgate - a lease-based outbound SMS dispatch queue.
//!
//! This is the binary entry point: the HTTP server plus the operator
//! commands that provision API keys, templates and the agent registration
//! secret.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod admin;
mod serve;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use smsgate_config::model::SmsGateConfig;

/// smsgate - a lease-based outbound SMS dispatch queue.
#[derive(Parser, Debug)]
#[command(name = "smsgate", version, about, long_about = None)]
struct Cli {
    /// Load this config file instead of the standard search path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API until SIGINT/SIGTERM.
    Serve,
    /// Manage client API keys.
    ApiKey {
        #[command(subcommand)]
        action: ApiKeyCommands,
    },
    /// Manage message templates.
    Template {
        #[command(subcommand)]
        action: TemplateCommands,
    },
    /// Manage the shared secret agents present when registering.
    RegistrationSecret {
        #[command(subcommand)]
        action: SecretCommands,
    },
    /// Show job counts per status.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ApiKeyCommands {
    /// Issue a new key. The plaintext is printed once.
    Create {
        /// Name of the client system.
        #[arg(long)]
        client: String,
        /// Granted scope; repeatable. Defaults to sms:send and sms:read.
        #[arg(long = "scope")]
        scopes: Vec<String>,
        /// Daily message quota (defaults to intake.default_rate_limit_per_day).
        #[arg(long)]
        rate_limit_per_day: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
enum TemplateCommands {
    /// Store a template; it cannot be used until approved.
    Create {
        #[arg(long)]
        name: String,
        /// Content with `{NAME}` placeholders.
        #[arg(long)]
        content: String,
    },
    /// Approve a template for use in requests.
    Approve { id: String },
}

#[derive(Subcommand, Debug)]
enum SecretCommands {
    /// Store a secret that overrides agent.registration_secret. An empty
    /// value disables the check.
    Set { secret: String },
}

fn load_config(path: Option<&PathBuf>) -> SmsGateConfig {
    let loaded = match path {
        Some(path) => smsgate_config::load_and_validate_path(path),
        None => smsgate_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            smsgate_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::ApiKey {
            action:
                ApiKeyCommands::Create {
                    client,
                    scopes,
                    rate_limit_per_day,
                },
        }) => admin::create_api_key(&config, &client, scopes, rate_limit_per_day).await,
        Some(Commands::Template {
            action: TemplateCommands::Create { name, content },
        }) => admin::create_template(&config, &name, &content).await,
        Some(Commands::Template {
            action: TemplateCommands::Approve { id },
        }) => admin::approve_template(&config, &id).await,
        Some(Commands::RegistrationSecret {
            action: SecretCommands::Set { secret },
        }) => admin::set_registration_secret(&config, &secret).await,
        Some(Commands::Status { json }) => status::run_status(&config, json).await,
        None => {
            println!("smsgate: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
