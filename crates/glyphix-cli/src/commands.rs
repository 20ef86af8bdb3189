//! CLI command implementations

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use glyphix_core::{
    AccessError, Component, ComponentStatus, EncryptedBlob, FactorType, GlyphBinding, KeyShard,
    KeyStore, PresenceRequirement, PresenceState,
};
use tracing::info;

use crate::context::{write_private, Context};

/// GLyphIX - presence-bound multi-factor key management
#[derive(Parser)]
#[command(name = "glyphix")]
#[command(about = "Presence-bound multi-factor key management")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file
    #[arg(long, global = true, env = "GLYPHIX_CONFIG")]
    pub config: Option<PathBuf>,

    /// File containing the vault passphrase (default: GLYPHIX_PASSPHRASE)
    #[arg(long, global = true)]
    pub passphrase_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Key management commands
    #[command(subcommand)]
    Keys(KeyCommands),

    /// Encrypt a file under a key
    Seal {
        /// Key alias
        #[arg(short, long)]
        alias: String,

        /// Plaintext file
        #[arg(short, long)]
        input: PathBuf,

        /// Output blob (JSON)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Decrypt a blob
    Open {
        /// Key alias
        #[arg(short, long)]
        alias: String,

        /// Blob file (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output plaintext file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Shard commands
    #[command(subcommand)]
    Shard(ShardCommands),

    /// Presence-gated access
    #[command(subcommand)]
    Gate(GateCommands),

    /// Glyph binding commands
    #[command(subcommand)]
    Glyph(GlyphCommands),

    /// Print component status as JSON
    Status,
}

#[derive(Subcommand)]
pub enum KeyCommands {
    /// List key aliases
    List,

    /// Generate a key (no-op if it exists)
    Generate {
        /// Key alias
        alias: String,
    },

    /// Delete a key
    Delete {
        /// Key alias
        alias: String,
    },
}

#[derive(Subcommand)]
pub enum ShardCommands {
    /// Split a secret into one shard file per factor
    Split {
        /// Secret file
        #[arg(short, long)]
        secret: PathBuf,

        /// Directory for `<factor>.shard` files
        #[arg(long)]
        out_dir: PathBuf,

        /// Shards required to reconstruct (default from config)
        #[arg(short = 'k', long)]
        threshold: Option<usize>,

        /// Factors, comma separated (default from config)
        #[arg(long, value_delimiter = ',')]
        factors: Option<Vec<FactorType>>,
    },

    /// Reconstruct a secret from shard files
    Combine {
        /// Shard files
        #[arg(required = true)]
        shards: Vec<PathBuf>,

        /// Output secret file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Import the reconstructed key into the vault under this alias
        #[arg(long)]
        import: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum GateCommands {
    /// Decrypt a blob if the given presence satisfies the requirement
    Open {
        /// Key alias
        #[arg(short, long)]
        alias: String,

        /// Blob file (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Current presence state (JSON)
        #[arg(long)]
        presence: PathBuf,

        /// Required presence (JSON); ungated if omitted
        #[arg(long)]
        require: Option<PathBuf>,

        /// Output plaintext file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum GlyphCommands {
    /// Bind a file's content to a resource
    Attach {
        /// Resource id
        #[arg(short, long)]
        resource: String,

        /// Plaintext file
        #[arg(short, long)]
        input: PathBuf,

        /// Output binding (JSON)
        #[arg(short, long)]
        binding: PathBuf,
    },

    /// Decrypt a binding's content
    Unlock {
        /// Resource id
        #[arg(short, long)]
        resource: String,

        /// Binding file (JSON)
        #[arg(short, long)]
        binding: PathBuf,

        /// Output plaintext file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Re-key a resource and rewrite its binding in place
    Rotate {
        /// Resource id
        #[arg(short, long)]
        resource: String,

        /// Binding file (JSON)
        #[arg(short, long)]
        binding: PathBuf,
    },

    /// Delete a resource's key, making its content unrecoverable
    Shred {
        /// Resource id
        #[arg(short, long)]
        resource: String,
    },
}

/// Run one command against an unlocked vault, returning its output text
pub fn execute(ctx: &Context, command: Commands) -> Result<String> {
    match command {
        Commands::Keys(cmd) => handle_keys_command(ctx, cmd),
        Commands::Seal {
            alias,
            input,
            output,
        } => {
            let plaintext = zeroize::Zeroizing::new(read(&input)?);
            let blob = ctx.engine.encrypt(&plaintext, &alias)?;
            write_json(&output, &blob)?;
            Ok(format!(
                "Sealed {} bytes under {} -> {}",
                plaintext.len(),
                alias,
                output.display()
            ))
        }
        Commands::Open {
            alias,
            input,
            output,
        } => {
            let blob: EncryptedBlob = read_json(&input)?;
            let plaintext = ctx.engine.decrypt(&blob, &alias)?;
            write_private(&output, &plaintext)?;
            Ok(format!("Opened {} bytes -> {}", plaintext.len(), output.display()))
        }
        Commands::Shard(cmd) => handle_shard_command(ctx, cmd),
        Commands::Gate(cmd) => handle_gate_command(ctx, cmd),
        Commands::Glyph(cmd) => handle_glyph_command(ctx, cmd),
        Commands::Status => {
            let statuses = component_statuses(ctx)?;
            Ok(serde_json::to_string_pretty(&statuses)?)
        }
    }
}

fn handle_keys_command(ctx: &Context, cmd: KeyCommands) -> Result<String> {
    match cmd {
        KeyCommands::List => {
            let keys = ctx.store.list_keys();
            if keys.is_empty() {
                return Ok("No keys".to_string());
            }
            Ok(keys.join("\n"))
        }
        KeyCommands::Generate { alias } => {
            let existed = ctx.store.key_exists(&alias);
            ctx.store.generate_key(&alias)?;
            if existed {
                Ok(format!("Key {} already exists", alias))
            } else {
                Ok(format!("Generated key {}", alias))
            }
        }
        KeyCommands::Delete { alias } => {
            ctx.store.delete_key(&alias)?;
            Ok(format!("Deleted key {}", alias))
        }
    }
}

fn handle_shard_command(ctx: &Context, cmd: ShardCommands) -> Result<String> {
    let manager = ctx.shard_manager()?;

    match cmd {
        ShardCommands::Split {
            secret,
            out_dir,
            threshold,
            factors,
        } => {
            let secret_bytes = zeroize::Zeroizing::new(read(&secret)?);
            let policy = manager.policy();
            let threshold = threshold.unwrap_or(policy.threshold);
            let factors = factors.unwrap_or_else(|| policy.factors.clone());

            let shards = manager.split_key(&secret_bytes, threshold, &factors)?;
            fs::create_dir_all(&out_dir)?;

            let mut lines = vec![format!(
                "Split into {} shards ({} required), set {}",
                shards.len(),
                threshold,
                shards[0].set_id
            )];
            for shard in &shards {
                let path = out_dir.join(format!("{}.shard", shard.factor));
                write_private(&path, shard.to_hex()?.as_bytes())?;
                lines.push(format!("  {} -> {}", shard.factor, path.display()));
            }
            Ok(lines.join("\n"))
        }
        ShardCommands::Combine {
            shards,
            output,
            import,
        } => {
            if output.is_none() && import.is_none() {
                bail!("nothing to do: pass --output and/or --import");
            }

            let shards = shards
                .iter()
                .map(|path| {
                    let text = fs::read_to_string(path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    KeyShard::from_hex(&text).with_context(|| format!("parsing {}", path.display()))
                })
                .collect::<Result<Vec<_>>>()?;

            let master = manager.reconstruct_key(&shards)?;
            let mut lines = vec![format!("Reconstructed {}-byte key", master.len())];

            if let Some(path) = output {
                write_private(&path, master.as_bytes())?;
                lines.push(format!("  written to {}", path.display()));
            }
            if let Some(alias) = import {
                ctx.store.import_key(&alias, master.as_bytes())?;
                info!(alias = %alias, "imported reconstructed key");
                lines.push(format!("  imported as {}", alias));
            }
            Ok(lines.join("\n"))
        }
    }
}

fn handle_gate_command(ctx: &Context, cmd: GateCommands) -> Result<String> {
    match cmd {
        GateCommands::Open {
            alias,
            input,
            presence,
            require,
            output,
        } => {
            let blob: EncryptedBlob = read_json(&input)?;
            let presence: PresenceState = read_json(&presence)?;
            let required: Option<PresenceRequirement> =
                require.as_deref().map(read_json::<PresenceRequirement>).transpose()?;

            let gate = ctx.gate(presence);
            let result = gate.decrypt_if_allowed(&blob, &alias, required.as_ref());
            let entry = serde_json::to_string(&gate.access_log(1))?;

            match result {
                Ok(plaintext) => {
                    let written = match output {
                        Some(path) => {
                            write_private(&path, &plaintext)?;
                            format!("Granted: {} bytes -> {}", plaintext.len(), path.display())
                        }
                        None => format!("Granted: {} bytes", plaintext.len()),
                    };
                    Ok(format!("{}\n{}", written, entry))
                }
                Err(AccessError::PresenceDenied(reason)) => {
                    bail!("access denied: {}\n{}", reason, entry)
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

fn handle_glyph_command(ctx: &Context, cmd: GlyphCommands) -> Result<String> {
    let lock = ctx.glyph_lock();

    match cmd {
        GlyphCommands::Attach {
            resource,
            input,
            binding,
        } => {
            let plaintext = zeroize::Zeroizing::new(read(&input)?);
            let bound = lock.attach(&resource, &plaintext)?;
            write_json(&binding, &bound)?;
            Ok(format!(
                "Attached {} bytes to {} -> {}",
                bound.content_size,
                resource,
                binding.display()
            ))
        }
        GlyphCommands::Unlock {
            resource,
            binding,
            output,
        } => {
            let bound: GlyphBinding = read_json(&binding)?;
            let plaintext = lock.unlock(&resource, &bound)?;
            write_private(&output, &plaintext)?;
            Ok(format!("Unlocked {} bytes -> {}", plaintext.len(), output.display()))
        }
        GlyphCommands::Rotate { resource, binding } => {
            let bound: GlyphBinding = read_json(&binding)?;
            let rotated = lock.rotate(&resource, &bound)?;
            write_json(&binding, &rotated)?;
            Ok(format!("Rotated key for {}", resource))
        }
        GlyphCommands::Shred { resource } => {
            if lock.delete(&resource)? {
                Ok(format!("Shredded {}", resource))
            } else {
                Ok(format!("No key for {}", resource))
            }
        }
    }
}

/// Status of every component over the vault
pub fn component_statuses(ctx: &Context) -> Result<Vec<ComponentStatus>> {
    let manager = ctx.shard_manager()?;
    let gate = ctx.gate(PresenceState::default());
    let lock = ctx.glyph_lock();

    Ok(vec![
        ctx.store.status(),
        ctx.engine.status(),
        manager.status(),
        gate.status(),
        lock.status(),
    ])
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).with_context(|| format!("writing {}", path.display()))
}
