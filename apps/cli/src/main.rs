//! Campus CLI - sign in to Campus and inspect the stored session.

mod commands;
mod output;

use auth_session::{ProfilePatch, Role};
use clap::{Parser, Subcommand};
use client_config_and_utils::{init_logging, Config, Paths};
use tracing::debug;

/// Campus CLI - Manage the signed-in account and guest usage on this device.
#[derive(Parser)]
#[command(name = "campus")]
#[command(about = "Campus CLI for authentication and guest session management")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true, env = "CAMPUS_LOG_LEVEL")]
    log_level: String,

    /// API base URL, overriding the configured one
    #[arg(long, global = true)]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with email or phone and password
    Login {
        /// Email address or phone number
        identifier: Option<String>,
    },

    /// Create an account and sign in
    Register {
        /// Account role (student, teacher, parent)
        #[arg(short, long, default_value = "student")]
        role: Role,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },

    /// Logout and clear session
    Logout,

    /// Check authentication status
    Status,

    /// Manage the signed-in profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Anonymous usage tracking
    Guest {
        #[command(subcommand)]
        command: GuestCommands,
    },

    /// Check whether a sign-in prompt would be shown
    Escalate {
        /// Trigger (usage_limit, restricted_content, manual)
        #[arg(default_value = "manual")]
        trigger: String,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Update profile fields
    Update {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
}

#[derive(Subcommand)]
enum GuestCommands {
    /// Report a content view
    Track {
        /// Content type (lesson, quiz, ...)
        content_type: String,
        /// Content ID
        content_id: String,
    },
    /// Show the guest session on the server
    Status,
    /// Print this device's fingerprint
    Fingerprint,
}

fn profile_patch(
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
) -> ProfilePatch {
    let mut patch = ProfilePatch::new();
    if let Some(value) = first_name {
        patch = patch.first_name(value);
    }
    if let Some(value) = last_name {
        patch = patch.last_name(value);
    }
    if let Some(value) = email {
        patch = patch.email(value);
    }
    if let Some(value) = phone {
        patch = patch.phone(value);
    }
    patch
}

async fn run(cli: Cli, paths: Paths) -> anyhow::Result<()> {
    let mut config = Config::load(&paths)?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
        config.validate()?;
    }
    debug!(api = %config.api_base_url, mode = ?config.token_expiry_mode, "Loaded config");

    let format = &cli.format;
    match cli.command {
        Commands::Login { identifier } => commands::login(&paths, &config, identifier, format).await,
        Commands::Register {
            role,
            email,
            phone,
            first_name,
            last_name,
        } => {
            let args = commands::RegisterArgs {
                role,
                email,
                phone,
                first_name,
                last_name,
            };
            commands::register(&paths, &config, args, format).await
        }
        Commands::Logout => commands::logout(&paths, &config, format).await,
        Commands::Status => commands::status(&paths, &config, format).await,
        Commands::Profile { command } => match command {
            ProfileCommands::Update {
                first_name,
                last_name,
                email,
                phone,
            } => {
                let patch = profile_patch(first_name, last_name, email, phone);
                commands::profile_update(&paths, &config, patch, format).await
            }
        },
        Commands::Guest { command } => match command {
            GuestCommands::Track {
                content_type,
                content_id,
            } => commands::guest_track(&paths, &config, &content_type, &content_id, format).await,
            GuestCommands::Status => commands::guest_status(&paths, &config, format).await,
            GuestCommands::Fingerprint => commands::guest_fingerprint(&paths, &config, format).await,
        },
        Commands::Escalate { trigger } => commands::escalate(&paths, &config, &trigger, format).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let paths = match Paths::new() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging("campus-cli", &cli.log_level, paths.log_file());

    if let Err(e) = run(cli, paths).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
