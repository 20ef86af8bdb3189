//! GLyphIX CLI - operator tooling for presence-bound key vaults

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use glyphix_cli::context::{read_passphrase, resolve_config_path};
use glyphix_cli::{execute, Cli, Context};
use glyphix_core::GlyphixConfig;

fn main() -> Result<()> {
    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "glyphix=info,glyphix_cli=info,glyphix_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.clone());
    let config = GlyphixConfig::load_or_init(&config_path)?;
    debug!(path = %config_path.display(), "loaded configuration");

    let passphrase = read_passphrase(cli.passphrase_file.as_deref())?;
    let ctx = Context::open(config, &passphrase)?;

    let output = execute(&ctx, cli.command)?;
    println!("{}", output);
    Ok(())
}
