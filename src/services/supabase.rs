use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;

use crate::models::{InvestorProfile, MatchRecord, StartupProfile};
use crate::services::store::{
    DirectoryError, InvestorDirectory, MatchStore, PersistenceError, StartupDirectory,
};

const STARTUP_COLUMNS: &str = "id,name,sectors,stage";
const INVESTOR_COLUMNS: &str = "id,name,firm,sectors,stage,check_size_min,check_size_max";
const MATCH_COLUMNS: &str = "startup_id,investor_id,match_score";

/// Table names in the Supabase project
#[derive(Debug, Clone)]
pub struct SupabaseTables {
    pub startups: String,
    pub investors: String,
    pub matches: String,
}

impl Default for SupabaseTables {
    fn default() -> Self {
        Self {
            startups: "startup_uploads".to_string(),
            investors: "investors".to_string(),
            matches: "startup_investor_matches".to_string(),
        }
    }
}

/// Supabase PostgREST client
///
/// Handles all communication with the hosted backend:
/// - Loading startup profiles
/// - Snapshotting the investor pool
/// - Replacing match rows with the two-call delete/insert protocol
pub struct SupabaseClient {
    base_url: String,
    service_key: String,
    client: Client,
    tables: SupabaseTables,
}

impl SupabaseClient {
    /// Create a new Supabase client
    pub fn new(
        base_url: String,
        service_key: String,
        timeout_secs: u64,
        tables: SupabaseTables,
    ) -> Result<Self, DirectoryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            base_url,
            service_key,
            client,
            tables,
        })
    }

    fn table_url(&self, table: &str, query: &str) -> String {
        format!(
            "{}/rest/v1/{}?{}",
            self.base_url.trim_end_matches('/'),
            table,
            query
        )
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
    }

    /// GET rows from a table and return the raw JSON array
    async fn select_rows(&self, table: &str, query: &str) -> Result<Vec<Value>, DirectoryError> {
        let url = self.table_url(table, query);
        tracing::debug!("Selecting rows from: {}", url);

        let response = self.authorized(self.client.get(&url)).send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(DirectoryError::Unauthorized)
            }
            status if !status.is_success() => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read body".to_string());
                tracing::error!("Select on {} failed: {} - {}", table, status, body);
                return Err(DirectoryError::ApiError(format!(
                    "Failed to select from {}: {}",
                    table, status
                )));
            }
            _ => {}
        }

        let json: Value = response.json().await?;
        match json {
            Value::Array(rows) => Ok(rows),
            _ => Err(DirectoryError::InvalidResponse(format!(
                "Expected an array of rows from {}",
                table
            ))),
        }
    }

    fn in_filter(ids: &[String]) -> String {
        let quoted = ids
            .iter()
            .map(|id| format!("\"{}\"", id.replace('"', "")))
            .collect::<Vec<_>>()
            .join(",");
        urlencoding::encode(&format!("in.({})", quoted)).into_owned()
    }
}

/// Parse rows, skipping the ones that fail validation
fn parse_rows<T: serde::de::DeserializeOwned>(rows: Vec<Value>, kind: &str) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<T>(row) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Skipping malformed {} row: {}", kind, e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl StartupDirectory for SupabaseClient {
    async fn fetch_startup_profile(
        &self,
        startup_id: &str,
    ) -> Result<Option<StartupProfile>, DirectoryError> {
        let query = format!(
            "select={}&id=eq.{}&limit=1",
            STARTUP_COLUMNS,
            urlencoding::encode(startup_id)
        );
        let rows = self.select_rows(&self.tables.startups, &query).await?;

        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        serde_json::from_value(row)
            .map(Some)
            .map_err(|e| DirectoryError::InvalidResponse(format!("Failed to parse startup: {}", e)))
    }
}

#[async_trait]
impl InvestorDirectory for SupabaseClient {
    async fn fetch_investor_pool(&self, limit: usize) -> Result<Vec<InvestorProfile>, DirectoryError> {
        let query = format!("select={}&order=id.asc&limit={}", INVESTOR_COLUMNS, limit);
        let rows = self.select_rows(&self.tables.investors, &query).await?;
        let total = rows.len();

        let investors: Vec<InvestorProfile> = parse_rows(rows, "investor");
        tracing::debug!("Fetched {} investors ({} rows)", investors.len(), total);

        Ok(investors)
    }

    async fn fetch_investors(&self, ids: &[String]) -> Result<Vec<InvestorProfile>, DirectoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!("select={}&id={}", INVESTOR_COLUMNS, Self::in_filter(ids));
        let rows = self.select_rows(&self.tables.investors, &query).await?;

        Ok(parse_rows(rows, "investor"))
    }
}

#[async_trait]
impl MatchStore for SupabaseClient {
    /// Two separate calls: a failure after the delete leaves the startup with
    /// no matches until the next successful run.
    async fn replace_matches(
        &self,
        startup_id: &str,
        matches: &[MatchRecord],
    ) -> Result<(), PersistenceError> {
        let filter = format!("startup_id=eq.{}", urlencoding::encode(startup_id));
        let delete_url = self.table_url(&self.tables.matches, &filter);

        let deleted = self
            .authorized(self.client.delete(&delete_url))
            .send()
            .await
            .and_then(|r| r.error_for_status());

        if let Err(e) = deleted {
            return Err(PersistenceError::DeleteFailed {
                startup_id: startup_id.to_string(),
                message: e.to_string(),
            });
        }

        if matches.is_empty() {
            return Ok(());
        }

        let insert_url = format!(
            "{}/rest/v1/{}",
            self.base_url.trim_end_matches('/'),
            self.tables.matches
        );

        let inserted = self
            .authorized(self.client.post(&insert_url))
            .header("Prefer", "return=minimal")
            .json(matches)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        if let Err(e) = inserted {
            return Err(PersistenceError::InsertFailed {
                startup_id: startup_id.to_string(),
                message: e.to_string(),
            });
        }

        tracing::debug!("Replaced matches for {} ({} rows)", startup_id, matches.len());
        Ok(())
    }

    async fn list_matches(
        &self,
        startup_id: &str,
        limit: usize,
    ) -> Result<Vec<MatchRecord>, PersistenceError> {
        let query = format!(
            "select={}&startup_id=eq.{}&order=match_score.desc&limit={}",
            MATCH_COLUMNS,
            urlencoding::encode(startup_id),
            limit
        );

        let rows = self
            .select_rows(&self.tables.matches, &query)
            .await
            .map_err(|e| PersistenceError::ReadFailed {
                startup_id: startup_id.to_string(),
                message: e.to_string(),
            })?;

        Ok(parse_rows(rows, "match"))
    }
}
