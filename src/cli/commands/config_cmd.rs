//! config command - Get, set, or list configuration values

use anyhow::{bail, Context as _, Result};

use super::load_config;
use crate::core::config::{Config, GlobalConfig, LocalConfig, SecretsConfig};
use crate::engine::Context;

/// Keys accepted by `graft config`, with whether they may be set locally.
const KEYS: &[(&str, bool)] = &[
    ("default_server", false),
    ("max_depth", true),
    ("root_token", true),
    ("commit_message", true),
    ("source_application", false),
    ("secrets.provider", false),
];

/// Effective value of `key`, after precedence and defaults.
fn effective(config: &Config, key: &str) -> Result<Option<String>> {
    Ok(match key {
        "default_server" => config.default_server().map(String::from),
        "max_depth" => Some(config.max_depth().to_string()),
        "root_token" => config.root_token().map(String::from),
        "commit_message" => config.commit_message().map(String::from),
        "source_application" => Some(config.source_application().to_string()),
        "secrets.provider" => Some(config.secrets_provider().to_string()),
        _ => bail!("Unknown configuration key: {}", key),
    })
}

/// Get a configuration value.
pub fn get(ctx: &Context, key: &str) -> Result<()> {
    let config = load_config(ctx)?;
    if let Some(value) = effective(&config, key)? {
        println!("{}", value);
    }
    Ok(())
}

/// Set a configuration value.
pub fn set(ctx: &Context, key: &str, value: &str, local: bool) -> Result<()> {
    let settable_locally = KEYS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, l)| *l)
        .ok_or_else(|| anyhow::anyhow!("Unknown configuration key: {}", key))?;

    let config = load_config(ctx)?;

    let path = if local {
        if !settable_locally {
            bail!("'{}' can only be set in the global config", key);
        }
        let dir = ctx.work_dir()?;
        let mut local_config = config.local.unwrap_or_default();
        apply_local(&mut local_config, key, value)?;
        local_config.validate()?;
        Config::write_local(&dir, &local_config).context("Failed to write config")?
    } else {
        let mut global = config.global;
        apply_global(&mut global, key, value)?;
        global.validate()?;
        Config::write_global(&global).context("Failed to write config")?
    };

    if !ctx.quiet {
        println!("Set {} = {} ({})", key, value, path.display());
    }

    Ok(())
}

/// List all configuration values.
pub fn list(ctx: &Context) -> Result<()> {
    let config = load_config(ctx)?;

    println!("# Configuration");
    match config.global_config_loaded_from() {
        Some(path) => println!("# global: {}", path.display()),
        None => println!("# global: (none)"),
    }
    if let Some(path) = config.local_config_loaded_from() {
        println!("# local: {}", path.display());
    }

    for (key, _) in KEYS {
        match effective(&config, key)? {
            Some(value) => println!("{} = {}", key, value),
            None => println!("{} = (not set)", key),
        }
    }

    Ok(())
}

fn parse_depth(value: &str) -> Result<usize> {
    value
        .parse()
        .with_context(|| format!("max_depth must be a non-negative integer, got '{}'", value))
}

fn apply_global(config: &mut GlobalConfig, key: &str, value: &str) -> Result<()> {
    let value = value.to_string();
    match key {
        "default_server" => config.default_server = Some(value),
        "max_depth" => config.max_depth = Some(parse_depth(&value)?),
        "root_token" => config.root_token = Some(value),
        "commit_message" => config.commit_message = Some(value),
        "source_application" => config.source_application = Some(value),
        "secrets.provider" => {
            config.secrets = Some(SecretsConfig {
                provider: Some(value),
            })
        }
        _ => bail!("Unknown configuration key: {}", key),
    }
    Ok(())
}

fn apply_local(config: &mut LocalConfig, key: &str, value: &str) -> Result<()> {
    let value = value.to_string();
    match key {
        "max_depth" => config.max_depth = Some(parse_depth(&value)?),
        "root_token" => config.root_token = Some(value),
        "commit_message" => config.commit_message = Some(value),
        _ => bail!("'{}' can only be set in the global config", key),
    }
    Ok(())
}
