//! `generate-token`: create a random gateway API token

use anyhow::Context;
use chrono::{DateTime, Local};
use clap::Args;
use rand::distr::Alphanumeric;
use rand::Rng;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::config::CliConfig;

#[derive(Debug, Args)]
pub struct GenerateTokenArgs {
    /// Name for the token (defaults to a timestamped name)
    #[arg(long)]
    pub name: Option<String>,

    /// Length of the token
    #[arg(long, default_value_t = 32, value_parser = clap::value_parser!(u16).range(16..=256))]
    pub length: u16,

    /// Show the token in output
    #[arg(long)]
    pub show: bool,
}

/// Random alphanumeric token
pub fn generate_token(length: usize) -> String {
    let mut rng = rand::rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric) as char)
        .take(length)
        .collect()
}

fn default_name(now: &DateTime<Local>) -> String {
    format!("paperless-api-token-{}", now.format("%Y-%m-%d-%H-%M-%S"))
}

fn backup_entry(token: &str, name: &str, now: &DateTime<Local>) -> String {
    format!(
        "Token: {}\nName: {}\nGenerated: {}\n\n",
        token,
        name,
        now.format("%Y-%m-%d %H:%M:%S")
    )
}

fn append_backup(path: &Path, entry: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(entry.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn run<W: Write>(args: &GenerateTokenArgs, config: &CliConfig, out: &mut W) -> anyhow::Result<()> {
    let now = Local::now();
    let name = args.name.clone().unwrap_or_else(|| default_name(&now));
    let length = usize::from(args.length);
    let token = generate_token(length);
    let shown = if args.show { token.clone() } else { "*".repeat(length) };

    writeln!(out, "API Token generated successfully!")?;
    writeln!(out)?;
    writeln!(out, "  Name:         {}", name)?;
    writeln!(out, "  Token:        {}", shown)?;
    writeln!(out, "  Length:       {}", length)?;
    writeln!(out, "  Generated At: {}", now.format("%Y-%m-%d %H:%M:%S"))?;
    if !args.show {
        writeln!(out, "Token is hidden. Use --show flag to display the token.")?;
    }

    writeln!(out)?;
    writeln!(out, "To use this token:")?;
    writeln!(out, "1. Add it to your environment:")?;
    writeln!(out, "   PAPERLESS_API_TOKENS={}", shown)?;
    writeln!(out, "2. Or add it to existing tokens (comma-separated):")?;
    writeln!(out, "   PAPERLESS_API_TOKENS=existing-token,{}", shown)?;
    writeln!(out, "3. Set authentication method to token:")?;
    writeln!(out, "   PAPERLESS_API_AUTH_METHOD=token")?;
    writeln!(out, "4. Use in API requests with header:")?;
    writeln!(out, "   X-Paperless-Token: {}", shown)?;

    let backup = &config.token_backup_path;
    append_backup(backup, &backup_entry(&token, &name, &now))?;
    tracing::info!(name = %name, backup = %backup.display(), "Generated API token");

    writeln!(out)?;
    writeln!(out, "Token backed up to: {}", backup.display())?;
    Ok(())
}
