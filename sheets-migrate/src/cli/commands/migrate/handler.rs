//! Migrate command handler

use anyhow::{Context, Result};
use colored::*;
use std::time::Instant;

use super::MigrateCommands;
use crate::config::Config;
use crate::context::build_importer;
use crate::migration::{MigrationOptions, MigrationResult};

/// Run one migration; fails the process when the run reports errors
pub async fn handle_migrate_command(args: MigrateCommands, config: &Config) -> Result<()> {
    let importer = build_importer(config, None).await?;
    let options = MigrationOptions {
        dry_run: args.dry_run,
        skip_existing: args.skip_existing,
    };

    let start = Instant::now();
    let result = importer
        .run(&args.sheet_id, options)
        .await
        .context("Migration failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result, start.elapsed().as_secs_f64());
    }

    if !result.success {
        anyhow::bail!("{}", result.message);
    }
    Ok(())
}

fn print_result(result: &MigrationResult, seconds: f64) {
    let headline = if result.success {
        result.message.bright_green().bold()
    } else {
        result.message.bright_yellow().bold()
    };
    println!("{} {}", headline, format!("({:.1}s)", seconds).dimmed());

    let stats = &result.stats;
    println!("  Orders processed:    {}", stats.orders_processed.to_string().cyan());
    println!("  Customers processed: {}", stats.customers_processed.to_string().cyan());
    println!("  Items processed:     {}", stats.products_processed.to_string().cyan());
    println!("  Orders deleted:      {}", stats.orders_deleted.to_string().cyan());

    if !stats.errors.is_empty() {
        println!();
        println!("{}", format!("Errors ({}):", stats.errors.len()).red().bold());
        for error in &stats.errors {
            println!("  {} {}", "•".red(), error);
        }
    }
}
