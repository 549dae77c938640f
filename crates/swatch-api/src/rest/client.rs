use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, RequestBuilder};
use url::Url;

use swatch_core::models::{AuditRecord, Snapshot, SnapshotKind};

use super::types::{NewAudit, NewSnapshot, PublishedRow, PublishedUpsert, SnapshotRow};
use crate::error::RemoteError;
use crate::traits::RemoteStore;

const API_PREFIX: &str = "rest/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgREST-style client for the `snapshots`, `published_state` and
/// `audits` tables.
pub struct RestStore {
    base: Url,
    api_key: String,
    http: Client,
}

impl RestStore {
    pub fn new(base: Url, api_key: impl Into<String>) -> Self {
        Self {
            base,
            api_key: api_key.into(),
            http: Client::new(),
        }
    }

    fn table_url(&self, table: &str) -> Result<Url, RemoteError> {
        let base = self.base.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/{API_PREFIX}/{table}"))
            .map_err(|e| RemoteError::Unavailable(format!("bad remote URL: {e}")))
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.timeout(REQUEST_TIMEOUT)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
    }

    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            Err(RemoteError::Api {
                status,
                message: body,
            })
        }
    }

    async fn select_snapshots(&self, query: &[(&str, String)]) -> Result<Vec<Snapshot>, RemoteError> {
        let resp = self
            .authed(self.http.get(self.table_url("snapshots")?))
            .query(&[("select", "id,kind,data,label,created_at")])
            .query(query)
            .send()
            .await?;

        let resp = Self::check_response(resp).await?;
        let rows: Vec<SnapshotRow> = resp
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;

        Ok(rows.into_iter().filter_map(SnapshotRow::into_snapshot).collect())
    }
}

impl RemoteStore for RestStore {
    type Error = RemoteError;

    async fn insert_snapshot(
        &self,
        kind: SnapshotKind,
        data: serde_json::Value,
        label: Option<String>,
    ) -> Result<Snapshot, RemoteError> {
        let body = NewSnapshot {
            kind: kind.as_db_str(),
            data: &data,
            label: label.as_deref(),
        };
        let resp = self
            .authed(self.http.post(self.table_url("snapshots")?))
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;

        let resp = Self::check_response(resp).await?;
        let rows: Vec<SnapshotRow> = resp
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;

        rows.into_iter()
            .next()
            .and_then(SnapshotRow::into_snapshot)
            .ok_or_else(|| RemoteError::Parse("insert returned no snapshot row".into()))
    }

    async fn get_snapshot(&self, id: &str) -> Result<Option<Snapshot>, RemoteError> {
        let rows = self
            .select_snapshots(&[("id", format!("eq.{id}")), ("limit", "1".into())])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn list_snapshots(
        &self,
        kind: SnapshotKind,
        limit: u32,
    ) -> Result<Vec<Snapshot>, RemoteError> {
        self.select_snapshots(&[
            ("kind", format!("eq.{}", kind.as_db_str())),
            ("order", "created_at.desc".into()),
            ("limit", limit.to_string()),
        ])
        .await
    }

    async fn latest_snapshot(&self, kind: SnapshotKind) -> Result<Option<Snapshot>, RemoteError> {
        Ok(self.list_snapshots(kind, 1).await?.into_iter().next())
    }

    async fn upsert_published(
        &self,
        kind: SnapshotKind,
        snapshot_id: &str,
    ) -> Result<(), RemoteError> {
        let body = PublishedUpsert {
            kind: kind.as_db_str(),
            snapshot_id,
            updated_at: Utc::now(),
        };
        let resp = self
            .authed(self.http.post(self.table_url("published_state")?))
            .query(&[("on_conflict", "kind")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body)
            .send()
            .await?;

        Self::check_response(resp).await?;
        Ok(())
    }

    async fn get_published(&self, kind: SnapshotKind) -> Result<Option<String>, RemoteError> {
        let resp = self
            .authed(self.http.get(self.table_url("published_state")?))
            .query(&[
                ("select", "snapshot_id".to_string()),
                ("kind", format!("eq.{}", kind.as_db_str())),
                ("limit", "1".to_string()),
            ])
            .send()
            .await?;

        let resp = Self::check_response(resp).await?;
        let rows: Vec<PublishedRow> = resp
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;

        Ok(rows.into_iter().next().and_then(PublishedRow::into_id))
    }

    async fn insert_audit(&self, record: AuditRecord) -> Result<(), RemoteError> {
        let resp = self
            .authed(self.http.post(self.table_url("audits")?))
            .header("Prefer", "return=minimal")
            .json(&NewAudit::from(&record))
            .send()
            .await?;

        Self::check_response(resp).await?;
        tracing::debug!(scope = %record.scope, "Audit recorded remotely");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url_joins_prefix() {
        let store = RestStore::new(Url::parse("https://db.example.com/").unwrap(), "key");
        assert_eq!(
            store.table_url("snapshots").unwrap().as_str(),
            "https://db.example.com/rest/v1/snapshots"
        );

        let store = RestStore::new(Url::parse("https://db.example.com/project").unwrap(), "key");
        assert_eq!(
            store.table_url("audits").unwrap().as_str(),
            "https://db.example.com/project/rest/v1/audits"
        );
    }

    #[tokio::test]
    async fn test_unreachable_store_errors() {
        // Port 9 (discard) on localhost is not expected to speak HTTP.
        let store = RestStore::new(Url::parse("http://127.0.0.1:9").unwrap(), "key");
        let result = store.get_published(SnapshotKind::Tokens).await;
        assert!(result.is_err());
    }
}
