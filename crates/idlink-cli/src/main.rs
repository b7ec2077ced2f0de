//! idlink CLI: administer cross-tenant account links
//!
//! Commands: init, link, unlink, check, list, stats, completions
//!
//! Identities are written `host:<user-uuid>` or `<tenant-uuid>:<user-uuid>`.
//! Every command prints JSON on stdout; logs go to stderr.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use idlink_core::config::{StoreConfig, CONFIG_FILE_NAME};
use idlink_core::{IdentityRef, LinkConfig, TenantContext};
use idlink_graph::{CancellationToken, LinkManager};
use idlink_store::{LinkStore, SqliteLinkStore};

#[derive(Parser)]
#[command(name = "idlink")]
#[command(version)]
#[command(about = "Link user accounts across tenants")]
struct Cli {
    /// Directory holding idlink.toml
    #[arg(long, global = true, default_value = ".")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Write a default idlink.toml and create the link database
    Init,
    /// Link two identities (no-op if already linked or identical)
    Link {
        source: IdentityRef,
        target: IdentityRef,
    },
    /// Remove the link between two identities (no-op if not linked)
    Unlink {
        source: IdentityRef,
        target: IdentityRef,
    },
    /// Report whether two identities are linked
    Check { a: IdentityRef, b: IdentityRef },
    /// List the links of an identity
    #[command(alias = "ls")]
    List {
        seed: IdentityRef,
        /// Follow links transitively
        #[arg(long)]
        indirect: bool,
    },
    /// Link database statistics
    Stats,
    /// Print shell completions
    Completions { shell: Shell },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!(
            "idlink v{}: cross-tenant account links",
            env!("CARGO_PKG_VERSION")
        );
        println!("Run `idlink --help` for usage.");
        return Ok(());
    };

    let config = LinkConfig::load_from_dir(&cli.dir)
        .with_context(|| format!("failed to load config from {}", cli.dir.display()))?;
    init_tracing(&config);
    // The CLI acts as the host operator.
    let ctx = TenantContext::host();

    let output = match command {
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "idlink", &mut io::stdout());
            return Ok(());
        }
        Commands::Init => return init(&cli.dir, &config),
        Commands::Link { source, target } => {
            let manager = open_manager(&config)?;
            manager.link(&ctx, &source, &target).await?;
            let linked = manager.is_linked(&ctx, &source, &target).await?;
            json!({ "source": source, "target": target, "linked": linked })
        }
        Commands::Unlink { source, target } => {
            let manager = open_manager(&config)?;
            manager.unlink(&ctx, &source, &target).await?;
            json!({ "source": source, "target": target, "linked": false })
        }
        Commands::Check { a, b } => {
            let manager = open_manager(&config)?;
            let cancel = CancellationToken::new();
            let linked = manager.is_linked(&ctx, &a, &b).await?;
            let indirect = manager.is_linked_indirectly(&ctx, &a, &b, &cancel).await?;
            json!({ "a": a, "b": b, "linked": linked, "indirect": indirect })
        }
        Commands::List { seed, indirect } => {
            let manager = open_manager(&config)?;
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });
            let links = manager
                .get_linked_identities(&ctx, &seed, indirect, &cancel)
                .await?;
            serde_json::to_value(links)?
        }
        Commands::Stats => {
            let store = open_store(&config)?;
            let links = store.count(&ctx.unfiltered()).await?;
            json!({ "links": links, "path": config.store.path })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn init_tracing(config: &LinkConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_manager(config: &LinkConfig) -> Result<LinkManager> {
    let store = open_store(config)?;
    Ok(LinkManager::new(Arc::new(store)))
}

fn open_store(config: &LinkConfig) -> Result<SqliteLinkStore> {
    if let Some(parent) = config.store.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    SqliteLinkStore::open(&config.store.path)
        .with_context(|| format!("failed to open {}", config.store.path.display()))
}

fn init(dir: &Path, config: &LinkConfig) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let config_path = dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        // Keep the store path relative so the directory can be moved.
        let written = LinkConfig {
            store: StoreConfig::default(),
            ..config.clone()
        };
        std::fs::write(&config_path, written.to_toml()?)
            .with_context(|| format!("failed to write {}", config_path.display()))?;
    }
    open_store(config)?;

    println!("Initialized idlink in {}", dir.display());
    Ok(())
}
