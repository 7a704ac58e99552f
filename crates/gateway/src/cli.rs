//! Command-line interface: `serve` (default), `config validate|show`,
//! `version`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use agw_domain::config::{Config, ConfigSeverity};

#[derive(Parser)]
#[command(name = "authgate", about = "Authentication and authorization gateway")]
pub struct Cli {
    /// Config file path. Falls back to $AGW_CONFIG, then ./authgate.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the gateway (default).
    Serve,
    /// Configuration helpers.
    Config(ConfigCommand),
    /// Print the version and exit.
    Version,
}

#[derive(clap::Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the config and report issues.
    Validate,
    /// Print the effective config (secrets redacted).
    Show,
}

/// Load the config from the CLI flag, the environment, or the default
/// path, with `AGW_*` env overrides applied.
pub fn load_config(cli_path: Option<&PathBuf>) -> anyhow::Result<(Config, PathBuf)> {
    let path = cli_path
        .cloned()
        .or_else(|| std::env::var("AGW_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("authgate.toml"));
    let config = Config::load(Some(&path))
        .map_err(|e| anyhow::anyhow!("loading config: {e}"))?;
    Ok((config, path))
}

/// Print validation results; `true` when there are no errors.
pub fn validate(config: &Config, path: &std::path::Path) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!("{}: ok", path.display());
        return true;
    }
    for issue in &issues {
        println!("{issue}");
    }
    !issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error)
}

/// Print the effective config with secret material redacted.
pub fn show(config: &Config) {
    let mut redacted = config.clone();
    redacted.database.password = redact(&redacted.database.password);
    redacted.tokens.access_secrets = redacted.tokens.access_secrets.iter().map(|s| redact(s)).collect();
    redacted.tokens.refresh_secrets = redacted.tokens.refresh_secrets.iter().map(|s| redact(s)).collect();
    redacted.providers.mail.api_key = redact(&redacted.providers.mail.api_key);
    redacted.providers.sms.api_key = redact(&redacted.providers.sms.api_key);
    redacted.providers.geoip.api_key = redact(&redacted.providers.geoip.api_key);
    for idp in &mut redacted.providers.idps {
        idp.client_secret = redact(&idp.client_secret);
    }

    match toml::to_string_pretty(&redacted) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("could not render config: {e}"),
    }
}

fn redact(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "<redacted>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redaction_hides_non_empty_secrets() {
        assert_eq!(redact(""), "");
        assert_eq!(redact("hunter2"), "<redacted>");
    }

    #[test]
    fn validate_reports_ok_for_defaults() {
        // Defaults warn about missing secrets but carry no errors.
        let config = Config::default();
        assert!(validate(&config, std::path::Path::new("authgate.toml")));
    }
}
