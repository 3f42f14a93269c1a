// # Cloudflare SRV Record Manager
//
// This crate provides a Cloudflare API v4 implementation of the SRV
// announcer's RecordManager trait.
//
// ## Behavior
//
// - Zone ID is resolved once, by name, when the manager is created
// - `add_record` lists the SRV record set and only creates the managed entry
//   when no matching entry exists
// - `remove_record` deletes every entry matching the managed tuple
// - Entries with a different priority/weight/port/target are never touched
// - NO retry logic, NO background tasks: failures go back to the engine
//
// ## Error Mapping
//
// - 401/403, unknown zones, and zones vanishing after startup → `Error::Config`
//   (the engine stops)
// - 429, 5xx, transport errors, malformed responses → `Error::Backend`
//   (the engine retries on the next matching health observation)
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
//
// ## API Reference
//
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=SRV&name=...&page=N`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use srv_announcer_core::config::SrvRecordSpec;
use srv_announcer_core::traits::{RecordChange, RecordManager};
use srv_announcer_core::{Error, Result};
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const MANAGER_NAME: &str = "cloudflare";

/// Page size for record listings
const PER_PAGE: &str = "100";

/// Connection settings for [`CloudflareSrvManager`]
#[derive(Clone)]
pub struct CloudflareConfig {
    /// API token with Zone:DNS:Edit permission
    /// ⚠️ NEVER log this value
    pub api_token: String,

    /// Zone name (e.g., "example.com")
    pub zone_name: String,

    /// Record set name (e.g., "_sip._tcp.example.com")
    pub record_name: String,

    /// API base URL, overridable for tests
    pub api_base: String,
}

impl CloudflareConfig {
    /// Create a configuration against the public Cloudflare API
    pub fn new(
        api_token: impl Into<String>,
        zone_name: impl Into<String>,
        record_name: impl Into<String>,
    ) -> Self {
        Self {
            api_token: api_token.into(),
            zone_name: zone_name.into(),
            record_name: record_name.into(),
            api_base: CLOUDFLARE_API_BASE.to_string(),
        }
    }

    /// Use a different API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let zone = self.zone_name.trim_end_matches('.');
        if zone.is_empty() {
            return Err(Error::config("Zone name cannot be empty"));
        }

        let record = self.record_name.trim_end_matches('.');
        if record.is_empty() {
            return Err(Error::config("SRV record name cannot be empty"));
        }

        let in_zone = record.eq_ignore_ascii_case(zone)
            || record
                .to_ascii_lowercase()
                .ends_with(&format!(".{}", zone.to_ascii_lowercase()));
        if !in_zone {
            return Err(Error::config(format!(
                "SRV record name {} is not inside zone {}",
                self.record_name, self.zone_name
            )));
        }

        Ok(())
    }
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareConfig")
            .field("api_token", &"<REDACTED>")
            .field("zone_name", &self.zone_name)
            .field("record_name", &self.record_name)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// SRV payload of a Cloudflare DNS record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SrvData {
    priority: u16,
    weight: u16,
    port: u16,
    target: String,
}

/// An SRV record as returned by the list endpoint
#[derive(Debug, Clone, Deserialize)]
struct DnsRecord {
    id: String,
    #[serde(default)]
    data: Option<SrvData>,
}

/// One page of the record listing
#[derive(Debug, Deserialize)]
struct RecordPage {
    #[serde(default)]
    result: Vec<DnsRecord>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

/// Pagination block of a listing
#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default = "first_page")]
    total_pages: u32,
}

fn first_page() -> u32 {
    1
}

/// Cloudflare SRV record manager
///
/// Bound to one zone and one record set. All coordination (retries,
/// scheduling) is owned by the reconciliation engine.
pub struct CloudflareSrvManager {
    config: CloudflareConfig,

    /// Zone ID resolved at construction
    zone_id: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareSrvManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareSrvManager")
            .field("config", &self.config)
            .field("zone_id", &self.zone_id)
            .finish()
    }
}

impl CloudflareSrvManager {
    /// Create a manager and resolve the zone ID
    ///
    /// # Returns
    ///
    /// - `Ok(Self)`: Zone found
    /// - `Err(Error::Config)`: Invalid configuration, zone not found, or token rejected
    /// - `Err(Error::Backend)`: The API could not be reached
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones?name=example.com
    /// Authorization: Bearer <token>
    /// ```
    pub async fn connect(config: CloudflareConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let zone_name = config.zone_name.trim_end_matches('.').to_string();
        tracing::debug!(zone = %zone_name, "Looking up zone ID");

        let response = client
            .get(format!("{}/zones", config.api_base))
            .query(&[("name", zone_name.as_str())])
            .bearer_auth(&config.api_token)
            .send()
            .await
            .map_err(|e| Error::backend(MANAGER_NAME, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::config(format!("Zone not found: {}", zone_name)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body, "Zone lookup failed"));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| Error::backend(MANAGER_NAME, format!("Failed to parse response: {}", e)))?;

        let zones = json["result"].as_array().ok_or_else(|| {
            Error::backend(MANAGER_NAME, "Invalid response format: result is not an array")
        })?;

        let zone = zones
            .first()
            .ok_or_else(|| Error::config(format!("Zone not found: {}", zone_name)))?;

        let zone_id = zone["id"]
            .as_str()
            .ok_or_else(|| {
                Error::backend(MANAGER_NAME, "Invalid response format: zone.id is not a string")
            })?
            .to_string();

        tracing::info!(zone = %zone_name, zone_id = %zone_id, "Resolved Cloudflare zone");

        Ok(Self {
            config,
            zone_id,
            client,
        })
    }

    /// The resolved zone ID
    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    fn record_name(&self) -> &str {
        self.config.record_name.trim_end_matches('.')
    }

    fn records_url(&self) -> String {
        format!("{}/zones/{}/dns_records", self.config.api_base, self.zone_id)
    }

    /// List the SRV entries of the managed record set matching `spec`
    ///
    /// Walks every page of the listing. A 404 means the zone disappeared
    /// after startup, which is reported as a configuration error.
    async fn matching_records(&self, spec: &SrvRecordSpec) -> Result<Vec<DnsRecord>> {
        let mut matching = Vec::new();
        let mut page: u32 = 1;

        loop {
            let page_param = page.to_string();
            let response = self
                .client
                .get(self.records_url())
                .query(&[
                    ("type", "SRV"),
                    ("name", self.record_name()),
                    ("per_page", PER_PAGE),
                    ("page", page_param.as_str()),
                ])
                .bearer_auth(&self.config.api_token)
                .send()
                .await
                .map_err(|e| Error::backend(MANAGER_NAME, format!("HTTP request failed: {}", e)))?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Err(Error::config(format!(
                    "Zone {} ({}) is no longer resolvable",
                    self.config.zone_name, self.zone_id
                )));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(status_error(status, &body, "Record lookup failed"));
            }

            let listing: RecordPage = response.json().await.map_err(|e| {
                Error::backend(MANAGER_NAME, format!("Failed to parse response: {}", e))
            })?;

            matching.extend(listing.result.into_iter().filter(|record| {
                record
                    .data
                    .as_ref()
                    .is_some_and(|d| spec.matches(d.priority, d.weight, d.port, &d.target))
            }));

            let total_pages = listing.result_info.map_or(1, |info| info.total_pages);
            if page >= total_pages {
                break;
            }
            page += 1;
        }

        Ok(matching)
    }
}

#[async_trait]
impl RecordManager for CloudflareSrvManager {
    /// Ensure the managed entry exists
    ///
    /// # API Calls
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?type=SRV&name=_sip._tcp.example.com
    ///
    /// # Only if no matching entry exists
    /// POST /zones/:zone_id/dns_records
    /// {
    ///   "type": "SRV",
    ///   "name": "_sip._tcp.example.com",
    ///   "ttl": 60,
    ///   "data": { "priority": 10, "weight": 10, "port": 5060, "target": "node1.example.com" }
    /// }
    /// ```
    async fn add_record(&self, spec: &SrvRecordSpec) -> Result<RecordChange> {
        if !self.matching_records(spec).await?.is_empty() {
            tracing::debug!(
                record_set = %self.record_name(),
                entry = %spec,
                "SRV entry already present"
            );
            return Ok(RecordChange::Unchanged);
        }

        let data = SrvData {
            priority: spec.priority,
            weight: spec.weight,
            port: spec.port,
            target: spec.target_host().to_string(),
        };
        let payload = serde_json::json!({
            "type": "SRV",
            "name": self.record_name(),
            "ttl": spec.ttl,
            "data": data,
        });

        let response = self
            .client
            .post(self.records_url())
            .bearer_auth(&self.config.api_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::backend(MANAGER_NAME, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body, "Failed to create record"));
        }

        tracing::info!(
            record_set = %self.record_name(),
            entry = %spec,
            "Created SRV entry"
        );
        Ok(RecordChange::Created)
    }

    /// Ensure the managed entry is absent
    ///
    /// # API Calls
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?type=SRV&name=_sip._tcp.example.com
    ///
    /// # For every matching entry
    /// DELETE /zones/:zone_id/dns_records/:record_id
    /// ```
    async fn remove_record(&self, spec: &SrvRecordSpec) -> Result<RecordChange> {
        let matching = self.matching_records(spec).await?;
        if matching.is_empty() {
            tracing::debug!(
                record_set = %self.record_name(),
                entry = %spec,
                "SRV entry already absent"
            );
            return Ok(RecordChange::Unchanged);
        }

        let mut deleted = 0usize;
        for record in &matching {
            let response = self
                .client
                .delete(format!("{}/{}", self.records_url(), record.id))
                .bearer_auth(&self.config.api_token)
                .send()
                .await
                .map_err(|e| {
                    Error::backend(MANAGER_NAME, format!("HTTP request failed: {}", e))
                })?;

            let status = response.status();
            // Someone else removed it between list and delete
            if status == StatusCode::NOT_FOUND {
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(status_error(status, &body, "Failed to delete record"));
            }
            deleted += 1;
        }

        if deleted == 0 {
            tracing::debug!(
                record_set = %self.record_name(),
                entry = %spec,
                "SRV entry removed concurrently"
            );
            return Ok(RecordChange::Unchanged);
        }

        tracing::info!(
            record_set = %self.record_name(),
            entry = %spec,
            "Removed SRV entry"
        );
        Ok(RecordChange::Removed)
    }

    fn manager_name(&self) -> &'static str {
        MANAGER_NAME
    }
}

/// Map a non-success HTTP status to an announcer error
fn status_error(status: StatusCode, body: &str, context: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::config(format!(
            "Authentication failed: Invalid API token or insufficient permissions. Status: {}",
            status
        )),
        429 => Error::backend(
            MANAGER_NAME,
            format!("Rate limit exceeded. Please retry later. Status: {}", status),
        ),
        500..=599 => Error::backend(
            MANAGER_NAME,
            format!("Cloudflare server error (transient): {} - {}", status, body),
        ),
        _ => Error::backend(MANAGER_NAME, format!("{}: {} - {}", context, status, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let config = CloudflareConfig::new("token", "example.com", "_sip._tcp.example.com.");
        assert!(config.validate().is_ok());

        let config = CloudflareConfig::new("", "example.com", "_sip._tcp.example.com");
        assert!(config.validate().is_err());

        let config = CloudflareConfig::new("token", "", "_sip._tcp.example.com");
        assert!(config.validate().is_err());

        let config = CloudflareConfig::new("token", "example.com", "_sip._tcp.example.org");
        assert!(config.validate().is_err());

        let config = CloudflareConfig::new("token", "example.com", "_sip._tcp.badexample.com");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_token_not_exposed_in_debug() {
        let config = CloudflareConfig::new(
            "secret_token_12345",
            "example.com",
            "_sip._tcp.example.com",
        );

        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("secret_token"));
        assert!(debug_str.contains("CloudflareConfig"));
    }

    #[test]
    fn test_status_mapping() {
        assert!(status_error(StatusCode::UNAUTHORIZED, "", "x").is_config());
        assert!(status_error(StatusCode::FORBIDDEN, "", "x").is_config());
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, "", "x").is_retryable());
        assert!(status_error(StatusCode::BAD_GATEWAY, "", "x").is_retryable());
        assert!(status_error(StatusCode::CONFLICT, "", "x").is_retryable());
    }

    #[test]
    fn test_srv_data_deserializes() {
        let record: DnsRecord = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "type": "SRV",
            "name": "_sip._tcp.example.com",
            "content": "10 5060 node1.example.com",
            "data": { "priority": 10, "weight": 10, "port": 5060, "target": "node1.example.com" }
        }))
        .unwrap();

        assert_eq!(record.id, "abc");
        assert_eq!(record.data.unwrap().port, 5060);
    }

    #[test]
    fn test_record_page_defaults_to_single_page() {
        let page: RecordPage = serde_json::from_value(serde_json::json!({
            "success": true,
            "result": []
        }))
        .unwrap();
        assert!(page.result.is_empty());
        assert!(page.result_info.is_none());

        let page: RecordPage = serde_json::from_value(serde_json::json!({
            "result": [],
            "result_info": { "page": 1, "per_page": 100, "total_pages": 3 }
        }))
        .unwrap();
        assert_eq!(page.result_info.unwrap().total_pages, 3);
    }
}
