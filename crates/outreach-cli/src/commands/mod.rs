//! CLI Commands

pub mod audience;
pub mod config;
pub mod duplicates;
pub mod identity;
pub mod segments;

use std::sync::Arc;

use outreach_audience::infrastructure::NoOpEventPublisher;
use outreach_audience::{
    AudienceConfig, AudienceService, CompanyId, DuplicateQueueSession, IdentityKeyService, RestClient,
    SegmentService, Selection, ValueSuggester,
};

use crate::output::OutputFormat;

/// Services wired against the REST API
pub struct Context {
    pub config: AudienceConfig,
    pub format: OutputFormat,
    client: Arc<RestClient>,
}

impl Context {
    pub fn new(config: AudienceConfig, format: OutputFormat) -> Result<Self, String> {
        let client = RestClient::new(&config.api).map_err(|e| e.to_string())?;
        Ok(Self {
            config,
            format,
            client: Arc::new(client),
        })
    }

    pub fn segments(&self) -> SegmentService {
        SegmentService::new(
            self.client.clone(),
            self.client.clone(),
            self.client.clone(),
            Arc::new(NoOpEventPublisher),
        )
    }

    pub fn audience(&self) -> AudienceService {
        AudienceService::new(self.client.clone(), self.client.clone())
    }

    pub fn identity(&self) -> IdentityKeyService {
        IdentityKeyService::new(
            CompanyId::new(self.config.company_id.clone()),
            self.client.clone(),
            self.client.clone(),
            Arc::new(NoOpEventPublisher),
        )
        .with_finalize_guard(self.config.lifecycle.block_finalize_on_duplicates)
    }

    pub fn duplicates(&self) -> DuplicateQueueSession {
        DuplicateQueueSession::new(
            self.client.clone(),
            Arc::new(NoOpEventPublisher),
            self.config.queue.page_size,
        )
    }

    pub fn suggester(&self) -> ValueSuggester {
        // One-shot lookups from a terminal do not need debouncing
        ValueSuggester::new(self.client.clone(), std::time::Duration::ZERO, self.config.suggest.limit)
    }
}

/// Parse repeated `field=value[,value...]` arguments into an editor selection
pub fn parse_selection(filters: &[String]) -> Result<Selection, String> {
    let mut selection = Selection::new();
    for filter in filters {
        let (field, values) = filter
            .split_once('=')
            .ok_or_else(|| format!("invalid filter '{}': expected field=value[,value...]", filter))?;
        let field = field.trim();
        if field.is_empty() {
            return Err(format!("invalid filter '{}': missing field", filter));
        }
        for value in values.split(',').map(str::trim).filter(|v| !v.is_empty()) {
            selection = selection.check(field, value);
        }
    }
    Ok(selection)
}
