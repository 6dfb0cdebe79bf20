//! cli::commands::auth
//!
//! Authentication command for storing server tokens.
//!
//! # Design
//!
//! The auth command:
//! - Stores tokens via `SecretStore` under `token.<host>`
//! - Never prints tokens to stdout/stderr
//! - Supports both interactive and non-interactive modes
//!
//! # Example
//!
//! ```bash
//! # Interactive (prompts for token)
//! graft auth
//!
//! # Non-interactive
//! graft auth --host speckle.example.com --token <TOKEN>
//!
//! # Check status
//! graft auth --status
//!
//! # Remove stored token
//! graft auth --logout
//! ```

use super::load_config;
use crate::core::url::sanitize_server_url;
use crate::engine::Context;
use crate::secrets::{self, SecretStore};
use anyhow::{bail, Context as _, Result};
use std::io::{self, Write};

/// Server used when neither `--host` nor `default_server` is set.
pub const DEFAULT_HOST: &str = "app.speckle.systems";

/// Run the auth command.
pub fn auth(
    ctx: &Context,
    token: Option<&str>,
    host: Option<&str>,
    status: bool,
    logout: bool,
) -> Result<()> {
    let config = load_config(ctx)?;
    let host = sanitize_server_url(host.or(config.default_server()).unwrap_or(DEFAULT_HOST));
    if host.is_empty() {
        bail!("Host cannot be empty.");
    }

    let store = secrets::create_store(config.secrets_provider())
        .context("Failed to initialize secret store")?;

    if status {
        return show_status(store.as_ref(), &host, ctx.quiet);
    }

    if logout {
        return do_logout(store.as_ref(), &host, ctx.quiet);
    }

    let token_value = get_token(ctx, token, &host)?;
    validate_token(&token_value)?;

    store
        .set(&secrets::token_key(&host), &token_value)
        .context("Failed to store token")?;

    if !ctx.quiet {
        println!("Authentication configured for {}.", host);
    }

    Ok(())
}

fn show_status(store: &dyn SecretStore, host: &str, quiet: bool) -> Result<()> {
    let exists = store.exists(&secrets::token_key(host))?;

    if quiet {
        if exists {
            println!("authenticated");
        } else {
            println!("not_authenticated");
        }
    } else if exists {
        println!("Authenticated with {}.", host);
    } else {
        println!("Not authenticated with {}.", host);
        println!("Run 'graft auth --host {}' to authenticate.", host);
    }

    if std::env::var(secrets::TOKEN_ENV).is_ok_and(|t| !t.trim().is_empty()) && !quiet {
        println!("{} is set and takes precedence over the stored token.", secrets::TOKEN_ENV);
    }

    Ok(())
}

fn do_logout(store: &dyn SecretStore, host: &str, quiet: bool) -> Result<()> {
    store
        .delete(&secrets::token_key(host))
        .context("Failed to remove stored token")?;

    if !quiet {
        println!("Logged out from {}.", host);
    }

    Ok(())
}

/// Get token from argument or interactive prompt.
fn get_token(ctx: &Context, token_arg: Option<&str>, host: &str) -> Result<String> {
    if let Some(t) = token_arg {
        return Ok(t.trim().to_string());
    }

    if ctx.quiet || !ctx.interactive {
        bail!("Token required. Use --token <TOKEN> or run interactively.");
    }

    print!("Access token for {}: ", host);
    io::stdout().flush()?;

    let token = rpassword::read_password().context("Failed to read token")?;
    Ok(token.trim().to_string())
}

/// Basic format checks. The token is checked against the server on first use.
fn validate_token(token: &str) -> Result<()> {
    if token.is_empty() {
        bail!("Token cannot be empty.");
    }

    if token.len() < 10 {
        bail!("Token appears to be too short.");
    }

    if token.chars().any(char::is_whitespace) {
        bail!("Token should not contain whitespace.");
    }

    Ok(())
}
