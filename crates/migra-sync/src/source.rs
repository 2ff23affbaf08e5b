//! # CRM Source Client
//!
//! Reads leads from the CRM REST API page by page.
//!
//! ## Wire Format
//! ```text
//! GET {base_url}/{module}?fields=First_Name,...&per_page=200&page=N
//! Authorization: Zoho-oauthtoken <token>
//!
//! 200 OK  { "data": [ {..}, {..} ], "info": { "more_records": true } }
//! 204     (no body)                 → no more records
//! 200 OK  { ... without "data" ... } → no more records
//! 401/403                           → SourceError::Unauthorized
//! ```
//!
//! ## Capped Extraction
//! ```text
//!   page = 1
//!   while fetched < cap:
//!       fetch_page(page) ──► append records
//!       page empty or !has_more ──► stop
//!       page += 1
//!   truncate to cap
//! ```

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::collaborators::{RecordSource, SourcePage};
use crate::config::{SourceSettings, MAX_PAGE_SIZE};
use crate::error::{SourceError, SyncError, SyncResult};
use migra_core::Record;

/// Longest slice of an error body kept in `SourceError::Http`.
const MAX_ERROR_BODY: usize = 500;

// =============================================================================
// CRM Client
// =============================================================================

/// HTTP client for one CRM module.
#[derive(Debug, Clone)]
pub struct CrmClient {
    client: reqwest::Client,
    module_url: Url,
    fields: String,
}

impl CrmClient {
    /// Builds a client from validated source settings.
    ///
    /// ## Errors
    /// - `MissingCredential` if no token is configured
    /// - `InvalidUrl` / `InvalidConfig` for a malformed URL or token
    pub fn new(settings: &SourceSettings) -> SyncResult<Self> {
        let token = settings
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| SyncError::MissingCredential("source.token".into()))?;

        let mut auth = HeaderValue::from_str(&format!("{} {}", settings.auth_scheme, token.trim()))
            .map_err(|e| SyncError::InvalidConfig(format!("token is not a valid header: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout())
            .build()
            .map_err(|e| SyncError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(CrmClient {
            client,
            module_url: settings.module_url()?,
            fields: settings.fields.join(","),
        })
    }

    /// Builds the URL for one page request.
    pub fn page_url(&self, fields: &str, page: u32, page_size: u32) -> Url {
        let mut url = self.module_url.clone();
        url.query_pairs_mut()
            .append_pair("fields", fields)
            .append_pair("per_page", &page_size.to_string())
            .append_pair("page", &page.to_string());
        url
    }

    async fn get_page(
        &self,
        fields: &str,
        page: u32,
        page_size: u32,
    ) -> Result<SourcePage, SourceError> {
        let url = self.page_url(fields, page, page_size);
        debug!(page = page, page_size = page_size, "Requesting source page");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        decode_page(status, &body)
    }
}

#[async_trait]
impl RecordSource for CrmClient {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<SourcePage, SourceError> {
        self.get_page(&self.fields, page, page_size).await
    }

    /// Pages through an id-only projection and counts the rows.
    async fn fetch_count(&self) -> Result<u64, SourceError> {
        let mut total = 0u64;
        let mut page = 1;

        loop {
            let result = self.get_page("id", page, MAX_PAGE_SIZE).await?;
            total += result.records.len() as u64;

            if !result.has_more || result.records.is_empty() {
                break;
            }
            page += 1;
        }

        debug!(total = total, pages = page, "Counted source records");
        Ok(total)
    }
}

// =============================================================================
// Response Decoding
// =============================================================================

#[derive(Debug, Deserialize)]
struct PageBody {
    #[serde(default)]
    data: Option<Vec<Value>>,

    #[serde(default)]
    info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    #[serde(default)]
    more_records: Option<bool>,
}

/// Turns an HTTP status and body into a page.
///
/// When `info.more_records` is absent, a non-empty page is assumed to have a
/// successor; the following empty page ends the walk.
pub fn decode_page(status: StatusCode, body: &str) -> Result<SourcePage, SourceError> {
    if status == StatusCode::NO_CONTENT {
        return Ok(SourcePage::empty());
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SourceError::Unauthorized(status.as_u16()));
    }

    if !status.is_success() {
        return Err(SourceError::Http {
            status: status.as_u16(),
            body: truncate(body, MAX_ERROR_BODY),
        });
    }

    if body.trim().is_empty() {
        return Ok(SourcePage::empty());
    }

    let parsed: PageBody = serde_json::from_str(body)?;

    let Some(data) = parsed.data else {
        return Ok(SourcePage::empty());
    };

    let records = data
        .into_iter()
        .map(|value| Record::from_value(value).map_err(|e| SourceError::Decode(e.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    let has_more = parsed
        .info
        .and_then(|info| info.more_records)
        .unwrap_or(!records.is_empty());

    Ok(SourcePage { records, has_more })
}

fn truncate(body: &str, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((idx, _)) => format!("{}... (truncated)", &body[..idx]),
        None => body.to_string(),
    }
}

// =============================================================================
// Capped Extraction
// =============================================================================

/// Fetches pages until the source runs dry or `cap` records are collected.
///
/// The result never exceeds `cap`. Any page error aborts the extraction.
pub async fn fetch_capped(
    source: &dyn RecordSource,
    page_size: u32,
    cap: usize,
) -> Result<Vec<Record>, SourceError> {
    let mut records = Vec::new();
    let mut page = 1;

    while records.len() < cap {
        let SourcePage {
            records: batch,
            has_more,
        } = source.fetch_page(page, page_size).await?;

        let exhausted = batch.is_empty() || !has_more;
        records.extend(batch);

        if exhausted {
            break;
        }
        page += 1;
    }

    records.truncate(cap);
    debug!(fetched = records.len(), pages = page, cap = cap, "Extraction finished");
    Ok(records)
}
