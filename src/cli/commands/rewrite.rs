//! cli::commands::rewrite
//!
//! Rewrite a field across a model version and publish the result.
//!
//! # Precedence
//!
//! Flags override the local config, which overrides the global config:
//! `--max-depth` / `max_depth`, `--root-token` / `root_token`,
//! `--message` / `commit_message`.

use anyhow::{anyhow, bail, Context as _, Result};

use super::load_config;
use crate::core::url::ModelUrl;
use crate::engine::ledger::display_entry;
use crate::engine::runner::{run_rewrite, RewriteReport, RewriteRequest, SkipReason};
use crate::engine::walk::MAX_DEPTH_LIMIT;
use crate::engine::Context;
use crate::remote;
use crate::secrets;
use crate::ui::output::{self, Verbosity};

/// Arguments of `graft rewrite`.
#[derive(Debug, Clone, Default)]
pub struct RewriteArgs {
    pub url: String,
    pub field: String,
    pub value: String,
    pub json_value: bool,
    pub max_depth: Option<usize>,
    pub root_token: Option<String>,
    pub message: Option<String>,
    pub dry_run: bool,
    pub skip_unchanged: bool,
    pub token: Option<String>,
    pub open: bool,
    pub json: bool,
}

/// Interpret the `--value` argument.
///
/// Without `--json-value` the value is always a string, so `200` stays
/// `"200"`.
pub fn parse_value(raw: &str, json: bool) -> Result<serde_json::Value> {
    if json {
        serde_json::from_str(raw).with_context(|| format!("--value is not valid JSON: {}", raw))
    } else {
        Ok(serde_json::Value::String(raw.to_string()))
    }
}

/// Run the rewrite command.
pub fn rewrite(ctx: &Context, args: RewriteArgs) -> Result<()> {
    let verbosity = ctx.verbosity();
    let config = load_config(ctx)?;

    let url = ModelUrl::parse(&args.url).context("Invalid model URL")?;
    let value = parse_value(&args.value, args.json_value)?;

    let max_depth = args.max_depth.unwrap_or_else(|| config.max_depth());
    if max_depth > MAX_DEPTH_LIMIT {
        bail!("--max-depth {} exceeds the limit of {}", max_depth, MAX_DEPTH_LIMIT);
    }

    let store = secrets::create_store(config.secrets_provider())
        .context("Failed to initialize secret store")?;
    let token = secrets::resolve_token(args.token.as_deref(), store.as_ref(), url.server())
        .context("Failed to read stored token")?;
    match &token {
        Some(found) => output::debug(format!("using token from {}", found.source), verbosity),
        None => output::debug(format!("no token found for {}", url.server()), verbosity),
    }
    let remote = remote::for_model_url(&url, token.map(|found| found.token));

    let mut request = RewriteRequest::new(url.clone(), args.field, value);
    request.max_depth = max_depth;
    request.root_token = args
        .root_token
        .or_else(|| config.root_token().map(String::from));
    request.message = args
        .message
        .or_else(|| config.commit_message().map(String::from));
    request.source_application = config.source_application().to_string();
    request.dry_run = args.dry_run;
    request.skip_unchanged = args.skip_unchanged;

    output::print(
        format!("Rewriting '{}' in {}", request.field, url),
        if args.json { Verbosity::Quiet } else { verbosity },
    );

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt
        .block_on(run_rewrite(&remote, &request, verbosity))
        .map_err(|e| match e.hint() {
            Some(hint) => anyhow!("{}\nhint: {}", e, hint),
            None => anyhow::Error::new(e),
        })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if verbosity == Verbosity::Quiet {
        if let Some(version) = &report.new_version {
            println!("{}", version);
        }
    } else {
        println!("{}", format_report(&report, &url, max_depth));
    }

    if args.open {
        match report.new_version_url(&url) {
            Some(new_url) => {
                open::that(new_url.to_string()).context("Failed to open browser")?;
            }
            None => output::warn("no new version to open", verbosity),
        }
    }

    Ok(())
}

/// Human-readable summary of a run.
pub(crate) fn format_report(report: &RewriteReport, url: &ModelUrl, max_depth: usize) -> String {
    let mut lines = vec![format!(
        "Processed {} objects from {} (max depth {})",
        report.nodes_processed, report.source_object, max_depth
    )];

    let changed: Vec<String> = report.ledger.mutated_ids().iter().map(display_entry).collect();
    let visited: Vec<String> = report.ledger.visited_ids().iter().map(display_entry).collect();

    if changed.is_empty() {
        lines.push("No objects changed.".to_string());
    } else {
        lines.push(format!("Changed object ids ({}):", changed.len()));
        lines.push(output::format_list(&changed, "  - "));
    }
    lines.push(format!("Visited object ids ({}):", visited.len()));
    if !visited.is_empty() {
        lines.push(output::format_list(&visited, "  - "));
    }

    if !report.failures.is_empty() {
        lines.push(format!(
            "{} member(s) could not be read; see warnings above.",
            report.failures.len()
        ));
    }

    match report.skipped {
        Some(SkipReason::DryRun) => lines.push("Dry run: nothing uploaded.".to_string()),
        Some(SkipReason::Unchanged) => {
            lines.push("Nothing matched: no version created.".to_string())
        }
        None => {
            if let Some(object) = &report.new_object {
                lines.push(format!("New object: {}", object));
            }
            if let Some(new_url) = report.new_version_url(url) {
                lines.push(format!("New version: {}", new_url));
            }
        }
    }

    lines.join("\n")
}
