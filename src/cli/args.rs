//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--interactive` / `--no-interactive`: Control prompts
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;

/// Graft - rewrite a field across every object of a model version
#[derive(Parser, Debug)]
#[command(name = "graft")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if graft was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output; implies --no-interactive
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable interactive prompts
    #[arg(long = "interactive", global = true, conflicts_with = "no_interactive")]
    pub interactive_flag: bool,

    /// Disable interactive prompts
    #[arg(long, global = true)]
    pub no_interactive: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }

    /// Determine if interactive mode is enabled.
    ///
    /// Returns true if:
    /// - `--interactive` was explicitly set, OR
    /// - Neither `--no-interactive` nor `--quiet` was set AND stdin is a TTY
    pub fn interactive(&self) -> bool {
        if self.interactive_flag {
            true
        } else if self.no_interactive || self.quiet {
            false
        } else {
            std::io::stdin().is_terminal()
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rewrite a field on every object of a model version
    #[command(
        name = "rewrite",
        long_about = "Rewrite a field on every object of a model version.\n\n\
            Downloads the object graph behind a version, sets FIELD to VALUE on \
            every object that has it, and publishes the result as a new version \
            of the same model. Objects shared by several parents are processed \
            once; traversal stops at --max-depth.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Preview which objects would change
    graft rewrite https://app.speckle.systems/projects/p/models/m@v \\
        --field SF_GEN_Weight_t --value 200 --dry-run

    # Rewrite and publish a new version
    graft rewrite https://app.speckle.systems/projects/p/models/m@v \\
        --field SF_GEN_Weight_t --value 200

    # Set a number instead of a string
    graft rewrite <URL> --field load --value 12.5 --json-value

    # Only publish when something matched, then open the result
    graft rewrite <URL> --field tag --value new --skip-unchanged --open

AUTHENTICATION:
    The token is taken from --token, then SPECKLE_TOKEN, then the token
    stored for the server by 'graft auth'."
    )]
    Rewrite {
        /// Model version URL (https://<server>/projects/<p>/models/<m>@<v>)
        url: String,

        /// Field to rewrite
        #[arg(long)]
        field: String,

        /// Replacement value
        #[arg(long, allow_hyphen_values = true)]
        value: String,

        /// Parse the value as JSON (numbers, booleans, null, lists)
        #[arg(long)]
        json_value: bool,

        /// Traversal depth limit (default: config, else 10)
        #[arg(long)]
        max_depth: Option<usize>,

        /// Type token of the container object to leave out of the visited list
        #[arg(long)]
        root_token: Option<String>,

        /// Message for the new version
        #[arg(short, long)]
        message: Option<String>,

        /// Report what would change without uploading
        #[arg(long)]
        dry_run: bool,

        /// Do not create a version when nothing matched
        #[arg(long)]
        skip_unchanged: bool,

        /// Access token (overrides SPECKLE_TOKEN and the stored token)
        #[arg(long)]
        token: Option<String>,

        /// Open the new version in a browser
        #[arg(long)]
        open: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Store a server access token
    #[command(
        name = "auth",
        long_about = "Store an access token for a server.\n\n\
            Tokens are kept in ~/.graft/secrets.toml with owner-only permissions \
            and are never printed.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Store a token for the default server (prompts)
    graft auth

    # Store a token non-interactively
    graft auth --host speckle.example.com --token <TOKEN>

    # Check whether a token is stored
    graft auth --status

    # Remove the stored token
    graft auth --logout"
    )]
    Auth {
        /// Token to store (prompts when omitted)
        #[arg(long)]
        token: Option<String>,

        /// Server host (default: config default_server, else app.speckle.systems)
        #[arg(long)]
        host: Option<String>,

        /// Show current authentication status
        #[arg(long, conflicts_with = "logout")]
        status: bool,

        /// Remove stored authentication
        #[arg(long)]
        logout: bool,
    },

    /// Get, set, or list configuration values
    #[command(
        name = "config",
        long_about = "View or modify graft configuration.\n\n\
            Values are read from the global config (~/.graft/config.toml) and \
            the local .graft/config.toml of the working directory. 'set' writes \
            the global file unless --local is given.",
        after_help = "\
WORKFLOW EXAMPLES:
    # List all configuration values
    graft config list

    # Get a specific value
    graft config get max_depth

    # Set a value globally
    graft config set default_server speckle.example.com

    # Set a value for this directory only
    graft config set root_token Objects.Organization.Model --local"
    )]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        long_about = "Generate shell completion scripts for tab-completion.\n\n\
            Outputs a completion script for the specified shell.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    graft completion bash >> ~/.bashrc

    # Zsh (add to ~/.zshrc)
    graft completion zsh >> ~/.zshrc

    # Fish
    graft completion fish > ~/.config/fish/completions/graft.fish

    # PowerShell
    graft completion powershell >> $PROFILE"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Value to set
        value: String,
        /// Write the local config of the working directory
        #[arg(long)]
        local: bool,
    },
    /// List all configuration values
    List,
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn rewrite_parses_flags() {
        let cli = Cli::try_parse_from([
            "graft",
            "rewrite",
            "https://h/projects/p/models/m@v",
            "--field",
            "w",
            "--value",
            "200",
            "--max-depth",
            "4",
            "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Command::Rewrite {
                field,
                value,
                max_depth,
                dry_run,
                json_value,
                ..
            } => {
                assert_eq!(field, "w");
                assert_eq!(value, "200");
                assert_eq!(max_depth, Some(4));
                assert!(dry_run);
                assert!(!json_value);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn quiet_disables_interactive() {
        let cli = Cli::try_parse_from(["graft", "-q", "completion", "bash"]).unwrap();
        assert!(!cli.interactive());
    }

    #[test]
    fn rewrite_requires_field_and_value() {
        assert!(Cli::try_parse_from(["graft", "rewrite", "https://h/projects/p/models/m@v"]).is_err());
    }
}
