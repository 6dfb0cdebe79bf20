//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls the engine to execute the command
//! 3. Formats and displays output
//!
//! # Async Commands
//!
//! `rewrite` talks to the object server, so it builds a tokio runtime and
//! blocks on the engine's async pipeline.

mod auth;
mod completion;
mod config_cmd;
mod rewrite;

pub use auth::{auth, DEFAULT_HOST};
pub use completion::completion;
pub use config_cmd::{get as config_get, list as config_list, set as config_set};
pub use rewrite::{parse_value, rewrite, RewriteArgs};

use anyhow::{Context as _, Result};

use super::args::{Command, ConfigAction};
use crate::core::config::Config;
use crate::engine::Context;
use crate::ui::output;

/// Dispatch a parsed command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Rewrite {
            url,
            field,
            value,
            json_value,
            max_depth,
            root_token,
            message,
            dry_run,
            skip_unchanged,
            token,
            open,
            json,
        } => rewrite::rewrite(
            ctx,
            RewriteArgs {
                url,
                field,
                value,
                json_value,
                max_depth,
                root_token,
                message,
                dry_run,
                skip_unchanged,
                token,
                open,
                json,
            },
        ),
        Command::Auth {
            token,
            host,
            status,
            logout,
        } => auth::auth(ctx, token.as_deref(), host.as_deref(), status, logout),
        Command::Config { action } => match action {
            ConfigAction::Get { key } => config_cmd::get(ctx, &key),
            ConfigAction::Set { key, value, local } => config_cmd::set(ctx, &key, &value, local),
            ConfigAction::List => config_cmd::list(ctx),
        },
        Command::Completion { shell } => completion::completion(shell),
    }
}

/// Load configuration for the working directory, reporting warnings.
pub(crate) fn load_config(ctx: &Context) -> Result<Config> {
    let dir = ctx.work_dir().context("Failed to determine working directory")?;
    let result = Config::load(Some(&dir)).context("Failed to load config")?;
    for warning in &result.warnings {
        output::warn(
            format!("{} ({})", warning.message, warning.path.display()),
            ctx.verbosity(),
        );
    }
    Ok(result.config)
}
