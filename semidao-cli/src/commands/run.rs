//! Run command - one bill collection run against the portal

use std::env;
use std::time::Duration;

use anyhow::{bail, Result};
use colored::Colorize;
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use semidao_core::adapters::lock::RunLock;
use semidao_core::services::LogEvent;
use semidao_core::{Credentials, RunSummary, VENDOR};

use super::{get_context, get_data_dir, get_logger, log_event};
use crate::output;

const PASSWORD_ENV: &str = "SEMIDAO_PASSWORD";

/// Get email from flag/env or prompt
fn get_email_or_prompt(email_flag: Option<String>) -> Result<String> {
    if let Some(e) = email_flag {
        return Ok(e);
    }
    if atty::isnt(atty::Stream::Stdin) {
        bail!("No email given; pass --email or set SEMIDAO_EMAIL");
    }
    let e = Input::<String>::new().with_prompt("Portal email").interact_text()?;
    Ok(e)
}

/// Get password from env or prompt
fn get_password_or_prompt() -> Result<String> {
    if let Ok(p) = env::var(PASSWORD_ENV) {
        return Ok(p);
    }
    if atty::isnt(atty::Stream::Stdin) {
        bail!("No password given; set {}", PASSWORD_ENV);
    }
    let p = Password::new().with_prompt("Portal password").interact()?;
    Ok(p)
}

fn spinner(enabled: bool) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message("Collecting bills from the portal...");
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

pub fn run(email: Option<String>, dry_run: bool, json: bool) -> Result<()> {
    let data_dir = get_data_dir()?;
    let Some(_lock) = RunLock::try_acquire(&data_dir)? else {
        bail!("Another run is in progress for {}", data_dir.display());
    };

    let email = get_email_or_prompt(email)?;
    let password = get_password_or_prompt()?;
    let credentials = Credentials::new(email, password);

    let logger = get_logger();
    log_event(
        &logger,
        LogEvent::new("run_started").with_vendor(VENDOR).with_command("run"),
    );

    let ctx = get_context()?;
    let pb = spinner(!json && atty::is(atty::Stream::Stdout));

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(ctx.sync_service.sync(&credentials, dry_run));

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new("run_failed")
                    .with_vendor(VENDOR)
                    .with_command("run")
                    .with_error(e.code(), e.to_string()),
            );
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "error": { "code": e.code(), "message": e.to_string() } })
                );
            }
            return Err(e.into());
        }
    };

    log_event(
        &logger,
        LogEvent::new("run_completed")
            .with_vendor(VENDOR)
            .with_command("run")
            .with_error_details(format!(
                "fetched={} new={} duplicates={} linked={}",
                summary.fetched, summary.new_bills, summary.duplicates, summary.linked
            )),
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    if summary.dry_run {
        output::warning("DRY RUN - No changes applied");
        println!();
    }

    println!("{} {}", "Collected:".green(), summary.vendor);
    println!("  Bills on the portal: {}", summary.fetched);
    println!("  New: {}", summary.new_bills);
    println!("  Skipped: {} (already stored)", summary.duplicates);
    if summary.skipped_without_url > 0 {
        println!("  Without document: {}", summary.skipped_without_url);
    }
    if summary.rejected > 0 {
        println!("  Unreadable rows: {}", summary.rejected);
    }
    if !summary.dry_run {
        println!("  Linked to bank operations: {}", summary.linked);
        if summary.unlinked > 0 {
            println!("  Unlinked: {}", summary.unlinked);
        }
    }

    if !summary.warnings.is_empty() {
        println!();
        for warning in &summary.warnings {
            output::warning(&format!("  {}", warning));
        }
    }

    if summary.fetched == 0 {
        output::info("No new bills to import");
    }
}
