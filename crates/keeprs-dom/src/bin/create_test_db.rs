//! Writes a small sample database as plain KeePass XML.

use anyhow::{Context, Result};
use clap::Parser;
use keeprs_dom::{
    Credentials, Database, DatabaseConfig, DomDatabase, Entry, Group, PrintVisitor,
};
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Create a sample database for manual testing
#[derive(Parser, Debug)]
#[command(name = "create_test_db")]
struct Args {
    /// Where to write the database
    #[arg(short, long, default_value = "test_db.xml")]
    output: PathBuf,

    /// Optional keeprs.toml with database settings
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("keeprs_dom=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => DatabaseConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => DatabaseConfig::default(),
    };

    let db = DomDatabase::with_config(config);
    if db.name().unwrap_or_default().is_empty() {
        db.set_name("Test DB");
    }
    if db.description().unwrap_or_default().is_empty() {
        db.set_description("A test database for Keeprs");
    }

    let group = db.new_group();
    group.set_name("Test Group");
    db.root_group().add_group(&group)?;

    let entry = db.new_entry();
    entry.set_title("Test Entry");
    entry.set_username("user");
    entry.set_password("pass");
    entry.set_url("http://example.com");
    group.add_entry(&entry)?;

    db.enable_recycle_bin(true);
    if let Some(bin) = db.recycle_bin() {
        tracing::info!("Recycle bin at {}", bin.path());
    }

    let mut visitor = PrintVisitor::new();
    db.visit(&mut visitor);
    tracing::info!("Database layout:\n{}", visitor.output());

    let mut file = File::create(&args.output)
        .with_context(|| format!("Failed to create database file: {}", args.output.display()))?;
    db.save(&Credentials::default(), &mut file)
        .context("Failed to save database")?;

    println!("Created {}", args.output.display());
    Ok(())
}
