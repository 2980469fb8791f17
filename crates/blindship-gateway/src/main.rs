//! Blindship - blind-shipping capability broker.
//!
//! `blindship serve` runs the HTTP broker. The other commands operate on the
//! configured store directly and only make sense with persistent storage.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use blindship_capabilities::{PermissionBuilder, ShippingScope};
use blindship_config::{BrokerConfig, StorageBackend};
use blindship_core::{CarrierId, OwnerId, PermissionId, PhysicalAddress};
use blindship_gateway::{AppState, config_bridge};
use clap::{Parser, Subcommand};

/// Blindship - ship to an address without revealing it
#[derive(Parser)]
#[command(name = "blindship")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, env = "BLINDSHIP_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP broker
    Serve {
        /// Override `server.bind`
        #[arg(long)]
        bind: Option<String>,
    },

    /// Load and validate the configuration, then exit
    CheckConfig,

    /// Issue a shipping token
    Issue {
        /// Owner id (UUID)
        #[arg(long)]
        owner: String,

        /// Carriers allowed to redeem the token
        #[arg(long = "carrier", required = true, value_delimiter = ',')]
        carriers: Vec<String>,

        /// Services the token may book
        #[arg(long = "service", required = true, value_delimiter = ',')]
        services: Vec<String>,

        /// Require the owner to confirm delivery
        #[arg(long)]
        confirm: bool,

        /// Days until expiry (defaults to `tokens.default_expiry_days`)
        #[arg(long, conflicts_with = "never_expires")]
        expires_days: Option<u32>,

        /// The token never expires
        #[arg(long)]
        never_expires: bool,

        /// Maximum resolutions (defaults to `tokens.default_max_access_count`)
        #[arg(long, conflicts_with = "unlimited")]
        max_access: Option<u32>,

        /// No resolution limit
        #[arg(long)]
        unlimited: bool,

        /// Name of the app receiving the token
        #[arg(long)]
        label: Option<String>,
    },

    /// Revoke a shipping token
    Revoke {
        /// The `ship_…` token
        token: String,
    },

    /// Record an owner's current address
    Address {
        /// Owner id (UUID); a new one is generated when omitted
        #[arg(long)]
        owner: Option<String>,
        /// Street address
        #[arg(long)]
        street: String,
        /// City
        #[arg(long)]
        city: String,
        /// State or region
        #[arg(long)]
        state: String,
        /// Postal code
        #[arg(long)]
        postal_code: String,
        /// Country code
        #[arg(long, default_value = "US")]
        country: String,
    },

    /// Show the access log of a permission
    AccessLog {
        /// Permission id (UUID)
        permission: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = BrokerConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;

    let mut log_config = config_bridge::to_log_config(&config.logging);
    if cli.verbose {
        "debug".clone_into(&mut log_config.level);
    }
    if let Err(e) = blindship_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
                config.validate()?;
            }
            let state = AppState::from_config(&config)?;
            blindship_gateway::serve(state, &config).await?;
        },
        Commands::CheckConfig => {
            let carriers = config_bridge::to_registry(&config)?.ids();
            println!("Configuration OK");
            println!("  bind:      {}", config.server.bind);
            println!("  base path: {}", config.server.base_path);
            println!("  storage:   {:?}", config.storage.backend);
            println!(
                "  carriers:  {}",
                carriers
                    .iter()
                    .map(CarrierId::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            if config.cors.is_wildcard() {
                println!("  warning:   CORS allows any origin");
            }
        },
        Commands::Issue {
            owner,
            carriers,
            services,
            confirm,
            expires_days,
            never_expires,
            max_access,
            unlimited,
            label,
        } => {
            let state = persistent_state(&config)?;
            let owner: OwnerId = owner.parse().context("invalid owner id")?;
            let carriers = carriers
                .iter()
                .map(CarrierId::new)
                .collect::<Result<Vec<_>, _>>()?;
            let scope = ShippingScope::new(carriers, services, confirm)?;

            let mut builder = PermissionBuilder::new(owner, scope).defaults(state.issuance);
            if let Some(days) = expires_days {
                builder = builder.expires_in(chrono::Duration::days(i64::from(days)));
            }
            if never_expires {
                builder = builder.never_expires();
            }
            if let Some(max) = max_access {
                builder = builder.max_access_count(max);
            }
            if unlimited {
                builder = builder.unlimited();
            }
            if let Some(label) = label {
                builder = builder.label(label);
            }

            let permission = state.resolver.issue(builder).await?;
            println!("{}", permission.token.expose());
            eprintln!("permission: {}", permission.id);
            if let Some(expires_at) = permission.expires_at {
                eprintln!("expires:    {}", expires_at.to_rfc3339());
            }
        },
        Commands::Revoke { token } => {
            let state = persistent_state(&config)?;
            let permission = state.resolver.revoke(&token).await?;
            println!("Revoked {}", permission.id);
        },
        Commands::Address {
            owner,
            street,
            city,
            state: region,
            postal_code,
            country,
        } => {
            let state = persistent_state(&config)?;
            let owner = match owner {
                Some(raw) => raw.parse().context("invalid owner id")?,
                None => OwnerId::new(),
            };
            let address = PhysicalAddress::new(street, city, region, postal_code, country);
            state.address_book.record(&owner, &address).await?;
            println!("{owner}");
        },
        Commands::AccessLog { permission } => {
            let state = persistent_state(&config)?;
            let permission: PermissionId = permission.parse().context("invalid permission id")?;
            for entry in state.resolver.access_log(&permission).await? {
                println!("{}", serde_json::to_string(&entry)?);
            }
        },
    }

    Ok(())
}

/// Open the broker for an offline command.
fn persistent_state(config: &BrokerConfig) -> Result<AppState> {
    if config.storage.backend == StorageBackend::Memory {
        bail!("this command needs persistent storage; set storage.backend = \"surrealkv\"");
    }
    Ok(AppState::from_config(config)?)
}
