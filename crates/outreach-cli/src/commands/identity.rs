//! Identity key commands

use outreach_audience::application::dto::IdentityKeyView;
use outreach_audience::{AudienceError, FinalizeOutcome, IdentityKeyUseCases, KeySlot};
use tabled::Tabled;

use super::Context;
use crate::output;
use crate::IdentityCommands;

#[derive(Tabled)]
struct SlotRow {
    slot: String,
    state: String,
    field: String,
    revert_requested: String,
}

fn rows(view: &IdentityKeyView) -> Vec<SlotRow> {
    view.slots
        .iter()
        .map(|s| SlotRow {
            slot: s.slot.to_string(),
            state: format!("{:?}", s.state),
            field: match s.slot {
                KeySlot::Filters => format!("{} group(s)", s.filter_groups),
                _ => s.field_key.clone().unwrap_or_else(|| "-".into()),
            },
            revert_requested: s
                .revert_requested_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".into()),
        })
        .collect()
}

fn parse_slot(slot: &str) -> Result<KeySlot, String> {
    slot.parse::<KeySlot>()
}

fn explain(err: AudienceError) -> String {
    match err {
        AudienceError::KeyLocked { slot } => format!(
            "{} is locked; run `outreach identity revert {}` and wait for approval",
            slot,
            slot.as_str().to_lowercase()
        ),
        other => other.to_string(),
    }
}

pub async fn handle(action: IdentityCommands, ctx: &Context) -> Result<(), String> {
    let service = ctx.identity();

    match action {
        IdentityCommands::Show => {
            let view = service.get_config().await.map_err(explain)?;
            ctx.format.print(&view, &rows(&view));
        }
        IdentityCommands::SetPrimary { field } => {
            let state = service.set_primary_key(&field).await.map_err(explain)?;
            output::success(format!("Primary key set to '{}' ({:?})", field, state));
        }
        IdentityCommands::SetEmail { field } => {
            let state = service.set_email_key(&field).await.map_err(explain)?;
            output::success(format!("Email key set to '{}' ({:?})", field, state));
        }
        IdentityCommands::Finalize => match service.finalize().await.map_err(explain)? {
            FinalizeOutcome::Finalized { locked } => {
                let names: Vec<String> = locked.iter().map(ToString::to_string).collect();
                output::success(format!("Locked: {}", names.join(", ")));
            }
            FinalizeOutcome::AlreadyFinalized => {
                output::success("Identity keys were already finalized");
            }
        },
        IdentityCommands::Revert { slot } => {
            let request = service.request_revert(parse_slot(&slot)?).await.map_err(explain)?;
            output::success(format!(
                "Revert of {} requested at {}; awaiting approval",
                request.slot,
                request.requested_at.format("%Y-%m-%d %H:%M")
            ));
        }
        IdentityCommands::CancelRevert { slot } => {
            let slot = parse_slot(&slot)?;
            service.cancel_revert(slot).await.map_err(explain)?;
            output::success(format!("Revert request for {} withdrawn", slot));
        }
        IdentityCommands::Preview { slot, field } => {
            let preview = service
                .preview_key_change(parse_slot(&slot)?, &field)
                .await
                .map_err(explain)?;
            if !ctx.format.emit(&preview) {
                println!(
                    "This change affects {} contact(s): {} distinct value(s), {} shared by more than one contact",
                    preview.affected_contacts, preview.distinct_values, preview.duplicate_values
                );
            }
        }
    }
    Ok(())
}
