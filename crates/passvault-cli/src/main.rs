//! CLI entry point for PassVault.
//!
//! This binary provides the `passvault` command. It is a thin collaborator
//! around `passvault-keychain`: it reads the secrets, loads the keychain file
//! from the data directory, performs one operation, and writes the new dump
//! back when the store changed.

mod config;
mod helpers;
mod storage;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::CliConfig;
use crate::helpers::{
    create_keychain, init_tracing, read_secrets, remove_entry, set_entry, unlock,
};
use crate::storage::KeychainFiles;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// PassVault — an encrypted password keychain.
#[derive(Parser)]
#[command(
    name = "passvault",
    version,
    about = "PassVault — encrypted password keychain",
    long_about = "Stores per-domain passwords encrypted under a single master password. \
                  The master password is read from PASSVAULT_PASSWORD or the first line of \
                  stdin; for `set`, the credential is read from PASSVAULT_CREDENTIAL or the \
                  next line of stdin."
)]
struct Cli {
    /// Path to the config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new, empty keychain.
    Init {
        /// Replace an existing keychain.
        #[arg(long)]
        force: bool,
    },

    /// Store or update the password for a domain.
    Set { domain: String },

    /// Print the password for a domain.
    Get { domain: String },

    /// Delete the password for a domain.
    Remove { domain: String },

    /// Unlock the keychain and report how many entries it holds.
    Verify,

    /// Show configuration and whether a keychain exists.
    Status,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = CliConfig::load(cli.config.as_deref())?;
    init_tracing(&config.log_level);

    let files = KeychainFiles::new(&config.data_dir);

    match cli.command {
        Commands::Init { force } => cmd_init(&files, force).await?,
        Commands::Set { domain } => cmd_set(&config, &files, &domain).await?,
        Commands::Get { domain } => return cmd_get(&config, &files, &domain).await,
        Commands::Remove { domain } => cmd_remove(&config, &files, &domain).await?,
        Commands::Verify => cmd_verify(&config, &files).await?,
        Commands::Status => cmd_status(&config, &files).await?,
    }
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

async fn cmd_init(files: &KeychainFiles, force: bool) -> Result<()> {
    if files.exists().await && !force {
        bail!(
            "a keychain already exists at {} (use --force to replace it)",
            files.repr_path().display()
        );
    }

    let secrets = read_secrets(false)?;
    let keychain = create_keychain(secrets.password).await?;
    helpers::save(&keychain, files).await?;

    info!(path = %files.repr_path().display(), "keychain initialized");
    println!("Keychain initialized.");
    Ok(())
}

async fn cmd_set(config: &CliConfig, files: &KeychainFiles, domain: &str) -> Result<()> {
    let secrets = read_secrets(true)?;
    let credential = secrets.credential.context("no credential provided")?;

    set_entry(files, secrets.password, config.verify_checksum, domain, &credential).await?;

    println!("Password saved.");
    Ok(())
}

async fn cmd_get(config: &CliConfig, files: &KeychainFiles, domain: &str) -> Result<ExitCode> {
    let secrets = read_secrets(false)?;
    let keychain = unlock(files, secrets.password, config.verify_checksum).await?;

    match keychain.get(domain)? {
        Some(credential) => {
            println!("{credential}");
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("not found: {domain}");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn cmd_remove(config: &CliConfig, files: &KeychainFiles, domain: &str) -> Result<()> {
    let secrets = read_secrets(false)?;
    let removed = remove_entry(files, secrets.password, config.verify_checksum, domain).await?;

    println!("{removed}");
    Ok(())
}

async fn cmd_verify(config: &CliConfig, files: &KeychainFiles) -> Result<()> {
    let secrets = read_secrets(false)?;
    let keychain = unlock(files, secrets.password, config.verify_checksum).await?;

    if keychain.is_empty() {
        println!("Keychain is empty; password cannot be verified without entries.");
    } else {
        println!("Keychain unlocked: {} entries.", keychain.len());
    }
    Ok(())
}

async fn cmd_status(config: &CliConfig, files: &KeychainFiles) -> Result<()> {
    println!();
    println!("  PassVault v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("  Data dir:        {}", config.data_dir.display());
    println!("  Verify checksum: {}", config.verify_checksum);
    println!(
        "  Keychain:        {}",
        if files.exists().await { "present" } else { "not initialized" }
    );
    println!();
    Ok(())
}
