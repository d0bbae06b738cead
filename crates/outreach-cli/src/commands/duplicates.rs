//! Duplicate queue commands

use outreach_audience::{BulkChoice, ContactRecord, DuplicateQueueSession, ResolutionChoice};
use colored::Colorize;
use tabled::Tabled;

use super::Context;
use crate::output;
use crate::DuplicateCommands;

#[derive(Tabled)]
struct PairRow {
    index: usize,
    pair: String,
    old: String,
    new: String,
}

fn describe(record: &ContactRecord, email_field: &str) -> String {
    match record.value(email_field) {
        Some(email) => format!("{} <{}>", record.id, email),
        None => record.id.to_string(),
    }
}

/// Load pages until `index` is inside the queue or nothing is left
fn remaining(total: Option<u64>) {
    match total {
        Some(n) => println!("{} pair(s) remaining", n),
        None => output::warn("the queue could not be reloaded; run `outreach duplicates list` before resolving more"),
    }
}

async fn reach(session: &mut DuplicateQueueSession, index: usize) -> Result<(), String> {
    session.refresh().await.map_err(|e| e.to_string())?;
    while index >= session.queue().len() && session.queue().has_more() {
        if session.load_more().await.map_err(|e| e.to_string())?.is_empty() {
            break;
        }
    }
    Ok(())
}

pub async fn handle(action: DuplicateCommands, ctx: &Context) -> Result<(), String> {
    let mut session = ctx.duplicates();
    let email_field = ctx.config.lifecycle.email_field.as_str();

    match action {
        DuplicateCommands::List { page } => {
            session.refresh().await.map_err(|e| e.to_string())?;
            let pairs = if page <= 1 {
                session.queue().items().to_vec()
            } else {
                session.load_page(page).await.map_err(|e| e.to_string())?
            };
            let offset = (page.max(1) as usize - 1) * ctx.config.queue.page_size as usize;
            let rows: Vec<PairRow> = pairs
                .iter()
                .enumerate()
                .map(|(i, p)| PairRow {
                    index: offset + i,
                    pair: p.id.to_string(),
                    old: describe(&p.old, email_field),
                    new: describe(&p.new, email_field),
                })
                .collect();
            ctx.format.print(&pairs, &rows);
            if ctx.format.is_table() {
                println!("{} pair(s) remaining", session.queue().total_remaining());
            }
        }
        DuplicateCommands::Resolve { index, keep } => {
            let choice: ResolutionChoice = keep.parse()?;
            reach(&mut session, index).await?;
            let summary = session.resolve_one(index, choice).await.map_err(|e| {
                if e.requires_resync() {
                    format!("{}; run `outreach duplicates list` and pick the pair again", e)
                } else {
                    e.to_string()
                }
            })?;
            output::success(format!(
                "Kept {}, merged {}",
                describe(&summary.kept, email_field),
                describe(&summary.discarded, email_field)
            ));
            remaining(summary.total_remaining);
        }
        DuplicateCommands::ResolveAll { keep, yes } => {
            let choice = BulkChoice::from(keep.parse::<ResolutionChoice>()?);
            session.refresh().await.map_err(|e| e.to_string())?;
            let plan = session.plan_resolve_all(choice);

            if plan.total_remaining == 0 {
                output::success("No duplicate pairs remaining");
                return Ok(());
            }
            if !yes {
                println!("{}", plan.describe().yellow().bold());
                println!("Re-run with --yes to confirm.");
                return Ok(());
            }

            let summary = session.execute_resolve_all(plan).await.map_err(|e| e.to_string())?;
            output::success(format!("Resolved {} pair(s)", summary.resolved));
            remaining(summary.total_remaining);
        }
    }
    Ok(())
}
