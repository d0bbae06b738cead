//! Audience commands

use outreach_audience::{AudienceUseCases, EntityId};
use tabled::Tabled;

use super::Context;
use crate::output;
use crate::AudienceCommands;

#[derive(Tabled)]
struct CountRow {
    segment: String,
    contacts: u64,
    invalid_email: u64,
    unsubscribed: u64,
}

pub async fn handle(action: AudienceCommands, ctx: &Context) -> Result<(), String> {
    match action {
        AudienceCommands::Count { segment_ids } => {
            let ids: Vec<EntityId> = segment_ids.iter().map(|id| EntityId::from_string(id.as_str())).collect();
            let report = ctx.audience().compute_audience(&ids).await.map_err(|e| e.to_string())?;

            let mut rows: Vec<CountRow> = report
                .counts
                .per_segment
                .iter()
                .map(|s| CountRow {
                    segment: s.segment_id.to_string(),
                    contacts: s.contact_count,
                    invalid_email: s.invalid_email_count,
                    unsubscribed: s.un_subscribed_count,
                })
                .collect();
            rows.push(CountRow {
                segment: "TOTAL (deduplicated)".into(),
                contacts: report.counts.total_number_of_contacts,
                invalid_email: report.counts.total_invalid_email_count,
                unsubscribed: report.counts.total_un_subscribed_count,
            });
            ctx.format.print(&report, &rows);

            for id in &report.stale_segment_ids {
                output::warn(format!("segment {} no longer exists and was left out", id));
            }
            if ctx.format.is_table() && report.overlap() > 0 {
                output::warn(format!(
                    "{} contact(s) belong to more than one segment; the total counts them once",
                    report.overlap()
                ));
            }
        }
    }
    Ok(())
}
