use anyhow::{Context as _, bail};
use aqueduct::config::Config;
use aqueduct::plugins::auth::TokenAuthPlugin;
use aqueduct::plugins::static_files::StaticFilesPlugin;
use aqueduct::plugins::uploads::UploadPlugin;
use aqueduct::server::Server;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "aqueduct", version, about = "A modular HTTP/1.1 application server")]
struct Cli {
    /// Path to the configuration file (default ./config.conf)
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let explicit = cli.config.is_some();
    let path = cli.config.unwrap_or_else(|| PathBuf::from("./config.conf"));

    let config = if path.exists() {
        info!(config = %path.display(), "loading configuration");
        Config::load(&path)?
    } else if explicit {
        bail!("config file `{}` not found", path.display());
    } else {
        info!("no config file found; using defaults");
        Config::new()
    };

    let mut server = Server::new(config);

    server
        .add_plugin(Box::new(TokenAuthPlugin::new()))
        .context("loading token-auth plugin")?;
    server
        .add_plugin(Box::new(UploadPlugin::new()))
        .context("loading uploads plugin")?;

    if server.config().doc_root().is_dir() {
        server
            .add_plugin(Box::new(StaticFilesPlugin::new("/")))
            .context("loading static-files plugin")?;
    } else {
        warn!(
            doc_root = %server.config().doc_root().display(),
            "document root missing; static serving disabled"
        );
    }

    let handle = server.handle();
    ctrlc::set_handler(move || {
        info!("shutdown signal received");
        handle.stop();
    })
    .context("installing signal handler")?;

    server.start()?;
    Ok(())
}
