//! REST adapter
//!
//! Implements every outbound port against the dashboard's JSON API. Only
//! idempotent GETs are retried; mutating calls are sent exactly once so a
//! timeout can never double-submit a resolution or a revert request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::config::ApiConfig;
use crate::domain::aggregates::{
    BulkChoice, DuplicatePage, FinalizeOutcome, IdentityKeyConfig, IdentityKeyError, KeyChangePreview, KeySlot,
    ResolutionChoice, Segment,
};
use crate::domain::audience::{AudiencePredicate, PredicateCount};
use crate::domain::filter::{FilterGroup, KnownField};
use crate::domain::value_objects::{CompanyId, EntityId, ScalarValue};
use crate::ports::outbound::{
    DuplicateStore, FieldValueSource, FinalizeReceipt, IdentityKeyStore, PredicateEvaluator, RepositoryError,
    SegmentRepository,
};

const USER_AGENT: &str = concat!("outreach-audience/", env!("CARGO_PKG_VERSION"));

type Result<T> = std::result::Result<T, RepositoryError>;

/// HTTP client for the contact/segment store
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    max_retries: u32,
    retry_delay: Duration,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    slot: Option<KeySlot>,
    #[serde(default)]
    pair_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SegmentBody<'a> {
    name: &'a str,
    filters: &'a [FilterGroup],
}

#[derive(Deserialize)]
struct ResolveAllResponse {
    resolved: u64,
}

impl RestClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| RepositoryError::Invalid(format!("base url '{}': {}", config.base_url, e)))?;

        let mut headers = header::HeaderMap::new();
        if !config.api_key.is_empty() {
            let bearer = header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|_| RepositoryError::Invalid("api key contains invalid characters".into()))?;
            headers.insert(header::AUTHORIZATION, bearer);
        }
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        headers.insert(header::USER_AGENT, header::HeaderValue::from_static(USER_AGENT));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(|e| RepositoryError::Connection(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RepositoryError::Invalid(format!("base url '{}' cannot have a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        self.request(Method::GET, url, None).await
    }

    async fn post<T: DeserializeOwned>(&self, url: Url, body: serde_json::Value) -> Result<T> {
        self.request(Method::POST, url, Some(body)).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let max_retries = if method == Method::GET { self.max_retries } else { 0 };
        let mut attempt = 0u32;

        loop {
            let mut request = self.http.request(method.clone(), url.clone());
            if let Some(ref body) = body {
                request = request.json(body);
            }

            debug!(method = %method, url = %url, attempt, "sending request");
            match self.execute(request).await {
                Err(err) if attempt < max_retries && is_retryable(&err) => {
                    warn!(method = %method, url = %url, attempt, error = %err, "request failed, retrying");
                    tokio::time::sleep(backoff(self.retry_delay, attempt)).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn execute<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| RepositoryError::Connection(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RepositoryError::Connection(e.to_string()))?;

        if status.is_success() {
            if status == StatusCode::NO_CONTENT || bytes.is_empty() {
                return serde_json::from_str("null").map_err(|e| RepositoryError::Serialization(e.to_string()));
            }

            #[derive(Deserialize)]
            struct ApiResponse<T> {
                data: Option<T>,
            }

            // Accept both `{"data": ...}` envelopes and bare bodies
            if let Ok(ApiResponse { data: Some(data) }) = serde_json::from_slice::<ApiResponse<T>>(&bytes) {
                return Ok(data);
            }
            return serde_json::from_slice(&bytes).map_err(|e| RepositoryError::Serialization(e.to_string()));
        }

        Err(map_error(status, &bytes))
    }
}

/// `base * 2^attempt`, saturating instead of overflowing
fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
}

fn is_retryable(err: &RepositoryError) -> bool {
    matches!(err, RepositoryError::Connection(_) | RepositoryError::Unavailable(_))
}

fn map_error(status: StatusCode, bytes: &[u8]) -> RepositoryError {
    let body = serde_json::from_slice::<ErrorResponse>(bytes).ok().map(|r| r.error);
    let message = body
        .as_ref()
        .map(|b| b.message.clone())
        .unwrap_or_else(|| String::from_utf8_lossy(bytes).into_owned());

    if let Some(body) = &body {
        let lifecycle = body.slot.and_then(|slot| match body.code.as_str() {
            "key_locked" => Some(IdentityKeyError::KeyLocked { slot }),
            "duplicate_revert_request" => Some(IdentityKeyError::DuplicateRevertRequest { slot }),
            "slot_not_locked" => Some(IdentityKeyError::SlotNotLocked { slot }),
            "no_pending_revert" => Some(IdentityKeyError::NoPendingRevert { slot }),
            "slot_not_configured" => Some(IdentityKeyError::SlotNotConfigured { slot }),
            _ => None,
        });
        if let Some(err) = lifecycle {
            return RepositoryError::Lifecycle(err);
        }
        if body.code == "stale_pair" {
            return RepositoryError::StalePair(EntityId::from_string(body.pair_id.clone().unwrap_or_default()));
        }
    }

    match status {
        StatusCode::NOT_FOUND => RepositoryError::NotFound(message),
        StatusCode::CONFLICT => RepositoryError::Conflict(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => RepositoryError::Invalid(message),
        s if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => {
            RepositoryError::Unavailable(format!("{}: {}", s, message))
        }
        s => RepositoryError::Invalid(format!("{}: {}", s, message)),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

#[async_trait]
impl PredicateEvaluator for RestClient {
    async fn evaluate(&self, predicate: &AudiencePredicate) -> Result<PredicateCount> {
        let encoded = serde_json::to_string(predicate).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let mut url = self.url(&["segments", "evaluate"])?;
        url.query_pairs_mut().append_pair("predicate", &encoded);
        self.get(url).await
    }
}

#[async_trait]
impl SegmentRepository for RestClient {
    async fn find_by_id(&self, id: &EntityId) -> Result<Option<Segment>> {
        match self.get(self.url(&["segments", id.as_str()])?).await {
            Ok(segment) => Ok(Some(segment)),
            Err(RepositoryError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list(&self) -> Result<Vec<Segment>> {
        self.get(self.url(&["segments"])?).await
    }

    async fn create(&self, segment: &Segment) -> Result<Segment> {
        let body = to_json(&SegmentBody {
            name: segment.name(),
            filters: segment.filters(),
        })?;
        self.post(self.url(&["segments"])?, body).await
    }

    async fn update(&self, segment: &Segment) -> Result<Segment> {
        let body = to_json(&SegmentBody {
            name: segment.name(),
            filters: segment.filters(),
        })?;
        self.request(Method::PATCH, self.url(&["segments", segment.id().as_str()])?, Some(body))
            .await
    }

    async fn delete(&self, id: &EntityId) -> Result<()> {
        self.request(Method::DELETE, self.url(&["segments", id.as_str()])?, None).await
    }
}

#[async_trait]
impl IdentityKeyStore for RestClient {
    async fn load(&self, company: &CompanyId) -> Result<IdentityKeyConfig> {
        self.get(self.url(&["companies", company.as_str(), "identity-keys"])?).await
    }

    async fn select_key(&self, company: &CompanyId, slot: KeySlot, field_key: &str) -> Result<IdentityKeyConfig> {
        let url = self.url(&["companies", company.as_str(), "identity-keys", slot.as_str()])?;
        self.request(Method::PUT, url, Some(json!({ "fieldKey": field_key }))).await
    }

    async fn set_filters(&self, company: &CompanyId, groups: &[FilterGroup]) -> Result<IdentityKeyConfig> {
        let url = self.url(&["companies", company.as_str(), "identity-keys", KeySlot::Filters.as_str()])?;
        self.request(Method::PUT, url, Some(json!({ "groups": to_json(&groups)? }))).await
    }

    /// A 409 answer means another session finalized first; it is confirmed
    /// by reloading the configuration.
    async fn finalize(&self, company: &CompanyId) -> Result<FinalizeReceipt> {
        let url = self.url(&["companies", company.as_str(), "identity-keys", "finalize"])?;
        match self.post::<IdentityKeyConfig>(url, json!({})).await {
            Ok(config) => {
                let locked = KeySlot::ALL.iter().copied().filter(|s| config.is_locked(*s)).collect();
                Ok(FinalizeReceipt {
                    config,
                    outcome: FinalizeOutcome::Finalized { locked },
                })
            }
            Err(RepositoryError::Conflict(message)) => {
                let config = self.load(company).await?;
                if !config.is_finalized() {
                    return Err(RepositoryError::Conflict(message));
                }
                debug!(company_id = %company, "finalize answered by an earlier session");
                Ok(FinalizeReceipt {
                    config,
                    outcome: FinalizeOutcome::AlreadyFinalized,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn request_revert(&self, company: &CompanyId, slot: KeySlot) -> Result<IdentityKeyConfig> {
        self.post(self.url(&["companies", company.as_str(), "revert-requests"])?, json!({ "type": slot }))
            .await
    }

    async fn cancel_revert(&self, company: &CompanyId, slot: KeySlot) -> Result<IdentityKeyConfig> {
        let url = self.url(&["companies", company.as_str(), "revert-requests", "cancel"])?;
        self.post(url, json!({ "type": slot })).await
    }

    async fn preview_key(&self, company: &CompanyId, slot: KeySlot, field_key: &str) -> Result<KeyChangePreview> {
        let mut url = self.url(&["companies", company.as_str(), "identity-keys", slot.as_str(), "preview"])?;
        url.query_pairs_mut().append_pair("fieldKey", field_key);
        self.get(url).await
    }
}

#[async_trait]
impl DuplicateStore for RestClient {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<DuplicatePage> {
        let mut url = self.url(&["duplicates"])?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("pageSize", &page_size.to_string());
        self.get(url).await
    }

    async fn resolve(&self, pair_id: &EntityId, choice: ResolutionChoice) -> Result<()> {
        let url = self.url(&["duplicates", pair_id.as_str(), "resolve"])?;
        match self.post::<()>(url, json!({ "choice": choice })).await {
            Err(RepositoryError::NotFound(_)) | Err(RepositoryError::Conflict(_)) | Err(RepositoryError::StalePair(_)) => {
                Err(RepositoryError::StalePair(pair_id.clone()))
            }
            other => other,
        }
    }

    async fn resolve_all(&self, choice: BulkChoice) -> Result<u64> {
        let response: ResolveAllResponse = self
            .post(self.url(&["duplicates", "resolve-all"])?, json!({ "choice": choice }))
            .await?;
        Ok(response.resolved)
    }
}

#[async_trait]
impl FieldValueSource for RestClient {
    async fn known_fields(&self) -> Result<Vec<KnownField>> {
        self.get(self.url(&["fields"])?).await
    }

    async fn search_values(&self, field_key: &str, query: &str, limit: usize) -> Result<Vec<ScalarValue>> {
        let mut url = self.url(&["fields", field_key, "values"])?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("limit", &limit.to_string());
        self.get(url).await
    }
}
