//! Segment commands

use outreach_audience::application::dto::CreateSegmentCommand;
use outreach_audience::{EntityId, Segment, SegmentUseCases, Suggestion};
use tabled::Tabled;

use super::{parse_selection, Context};
use crate::output;
use crate::SegmentCommands;

#[derive(Tabled)]
struct SegmentRow {
    id: String,
    name: String,
    filters: String,
    created: String,
}

impl From<&Segment> for SegmentRow {
    fn from(segment: &Segment) -> Self {
        Self {
            id: segment.id().to_string(),
            name: segment.name().to_string(),
            filters: describe_filters(segment),
            created: segment.created_at().format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

#[derive(Tabled)]
struct CountRow {
    contacts: u64,
    invalid_email: u64,
    unsubscribed: u64,
}

#[derive(Tabled)]
struct ValueRow {
    value: String,
}

fn describe_filters(segment: &Segment) -> String {
    segment
        .filters()
        .iter()
        .map(|g| {
            let values: Vec<String> = g.values.iter().map(ToString::to_string).collect();
            let mut text = format!("{} in [{}]", g.field_key, values.join(", "));
            if !g.conditions.is_empty() {
                text.push_str(&format!(" +{} condition(s)", g.conditions.len()));
            }
            text
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub async fn handle(action: SegmentCommands, ctx: &Context) -> Result<(), String> {
    let service = ctx.segments();

    match action {
        SegmentCommands::List => {
            let segments = service.list_segments().await.map_err(|e| e.to_string())?;
            let rows: Vec<SegmentRow> = segments.iter().map(SegmentRow::from).collect();
            ctx.format.print(&segments, &rows);
        }
        SegmentCommands::Get { id } => {
            let segment = service
                .get_segment(&EntityId::from_string(id.as_str()))
                .await
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("segment {} not found", id))?;
            ctx.format.print(&segment, &[SegmentRow::from(&segment)]);
        }
        SegmentCommands::Create { name, filters } => {
            let selection = parse_selection(&filters)?;
            let command = CreateSegmentCommand::from_selection(name, &selection).map_err(|e| e.to_string())?;
            let segment = service.create_segment(command).await.map_err(|e| e.to_string())?;
            output::success(format!("Created segment: {}", segment.id()));
        }
        SegmentCommands::Delete { id } => {
            service
                .delete_segment(&EntityId::from_string(id.as_str()))
                .await
                .map_err(|e| e.to_string())?;
            output::success(format!("Deleted segment: {}", id));
        }
        SegmentCommands::Preview { filters } => {
            let selection = parse_selection(&filters)?;
            let count = service.preview_count(&selection).await.map_err(|e| e.to_string())?;
            let row = CountRow {
                contacts: count.count,
                invalid_email: count.invalid_email_count,
                unsubscribed: count.un_subscribed_count,
            };
            ctx.format.print(&count, &[row]);
        }
        SegmentCommands::Values { field, query } => {
            match ctx.suggester().suggest(&field, &query).await.map_err(|e| e.to_string())? {
                Suggestion::Values(values) => {
                    let rows: Vec<ValueRow> = values.iter().map(|v| ValueRow { value: v.to_string() }).collect();
                    ctx.format.print(&values, &rows);
                }
                Suggestion::Superseded => {}
            }
        }
    }
    Ok(())
}
