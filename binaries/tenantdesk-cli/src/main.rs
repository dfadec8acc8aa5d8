//! tenantdesk
//!
//! ```bash
//! tenantdesk serve                      # MongoDB from config/env
//! tenantdesk serve --in-memory          # throwaway store with local secrets
//! tenantdesk serve --bind 0.0.0.0:8080
//! tenantdesk seed --config prod.yaml
//! tenantdesk routes
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tenantdesk_config::Config;
use tenantdesk_mongodb::seed::TEMPLATE_NEW_DZITRA_USER;
use tenantdesk_mongodb::{DocumentStore, MemoryStore, MongoStore, SeedReport};
use tenantdesk_web::mail::{log_failure, Recipients, SmtpTransport};
use tenantdesk_web::{print_routes, serve, AppState};

#[derive(Parser)]
#[command(name = "tenantdesk")]
#[command(about = "Multi-tenant admin, CAP and site backend")]
#[command(version)]
struct Cli {
    /// Emit JSON log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the store and start the HTTP server
    Serve {
        /// YAML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override server.host:server.port
        #[arg(short, long)]
        bind: Option<String>,

        /// Keep everything in memory (local secrets unless --config is given)
        #[arg(long)]
        in_memory: bool,
    },

    /// Insert the superadmin and lookup tables when missing
    Seed {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the route table
    Routes,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tenantdesk=info,tenantdesk_web=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

fn load_config(path: Option<&PathBuf>, in_memory: bool) -> Result<Config> {
    let config = match path {
        None if in_memory => {
            let mut config = Config::local();
            config.apply_env(|key| std::env::var(key).ok())?;
            config
        }
        _ => Config::load(path.map(PathBuf::as_path))?,
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn open_store(config: &Config, in_memory: bool) -> Result<Arc<dyn DocumentStore>> {
    if in_memory {
        tracing::warn!("Using the in-memory store; data is lost on exit");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = MongoStore::connect(&config.database)
        .await
        .context("connecting to MongoDB")?;
    Ok(Arc::new(store))
}

/// Seed, then hand a generated superadmin password to its owner.
async fn run_seed(state: &AppState) -> Result<SeedReport> {
    let report = tenantdesk_mongodb::seed(state.store.as_ref(), &state.config).await?;
    for (collection, count) in &report.inserted {
        tracing::info!(%collection, count, "Seeded");
    }

    if let Some(admin) = &report.admin {
        if let Some(password) = &admin.generated_password {
            let outcome = state
                .mailer
                .send_template(
                    TEMPLATE_NEW_DZITRA_USER,
                    Recipients::Single(admin.email.clone()),
                    &[
                        ("name", admin.name.as_str()),
                        ("username", admin.email.as_str()),
                        ("pass", password.as_str()),
                    ],
                )
                .await;
            if !log_failure(outcome, "superadmin password") {
                // Without SMTP the operator has no other way to learn it.
                eprintln!("superadmin {} password: {}", admin.email, password);
            }
        }
    }
    Ok(report)
}

async fn build_state(config: Config, in_memory: bool) -> Result<AppState> {
    let store = open_store(&config, in_memory).await?;
    let transport = Arc::new(SmtpTransport::new(
        config.mail.smtp_host.clone(),
        config.mail.smtp_port,
    ));
    Ok(AppState::new(config, store, transport)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json);

    match cli.command {
        Commands::Serve {
            config,
            bind,
            in_memory,
        } => {
            let config = load_config(config.as_ref(), in_memory)?;
            let addr = bind.unwrap_or_else(|| config.bind_addr());
            let state = build_state(config, in_memory).await?;
            run_seed(&state).await?;

            tracing::info!(
                env = ?state.config.env,
                site = %state.config.site_url(),
                "Starting tenantdesk"
            );
            serve(Arc::new(state), &addr).await?;
        }

        Commands::Seed { config } => {
            let config = load_config(config.as_ref(), false)?;
            let state = build_state(config, false).await?;
            let report = run_seed(&state).await?;
            if report.inserted.is_empty() {
                println!("Nothing to seed");
            } else {
                for (collection, count) in &report.inserted {
                    println!("{:20} {}", collection, count);
                }
            }
        }

        Commands::Routes => print_routes(),
    }

    Ok(())
}
