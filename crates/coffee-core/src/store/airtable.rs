//! Hosted spreadsheet store client (Airtable REST API, blocking).
//!
//! - `select` follows `offset` pagination until the last page.
//! - Writes are capped at 10 records per request; callers chunk via
//!   [`super::create_all`] / [`super::update_all`].
//! - No retries: a non-2xx response surfaces as [`CoffeeError::StoreStatus`].

use super::{check_batch, Fields, Query, Record, RecordStore};
use crate::config::StoreConfig;
use crate::error::{CoffeeError, Result};
use reqwest::blocking::{Client, Response};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const PAGE_SIZE: &str = "100";

pub struct AirtableStore {
    client: Client,
    base_url: String,
    base_id: String,
    api_key: String,
    page_pause: Duration,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<Record>,
    offset: Option<String>,
}

#[derive(Deserialize)]
struct WriteResponse {
    #[serde(default)]
    records: Vec<Record>,
}

#[derive(Serialize)]
struct NewRecord<'a> {
    fields: &'a Fields,
}

#[derive(Serialize)]
struct Patch<'a> {
    id: &'a str,
    fields: &'a Fields,
}

#[derive(Serialize)]
struct WriteRequest<T: Serialize> {
    records: Vec<T>,
    typecast: bool,
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl AirtableStore {
    pub fn new(
        base_url: impl Into<String>,
        base_id: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            base_id: base_id.into(),
            api_key: api_key.into(),
            page_pause: Duration::ZERO,
        })
    }

    /// Build from config, reading the API key from the configured env var.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let api_key = crate::config::read_secret(&config.api_key_env)?;
        let mut store = Self::new(
            config.base_url.clone(),
            config.base_id.clone(),
            api_key,
            Duration::from_secs(config.timeout_secs),
        )?;
        store.page_pause = Duration::from_millis(config.batch_pause_ms);
        Ok(store)
    }

    fn table_url(&self, table: &str, id: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| CoffeeError::Config(format!("store base_url: {e}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| CoffeeError::Config("store base_url cannot be a base".into()))?;
            segments.pop_if_empty().push(&self.base_id).push(table);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    fn read<T: DeserializeOwned>(&self, table: &str, resp: Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(CoffeeError::StoreStatus {
                table: table.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json::<T>()?)
    }
}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

impl RecordStore for AirtableStore {
    fn select(&self, table: &str, query: &Query) -> Result<Vec<Record>> {
        let url = self.table_url(table, None)?;
        let mut base_params: Vec<(&str, String)> = vec![("pageSize", PAGE_SIZE.to_string())];
        if let Some(filter) = &query.filter {
            base_params.push(("filterByFormula", filter.to_formula()));
        }
        for field in &query.fields {
            base_params.push(("fields[]", field.clone()));
        }

        let mut out = Vec::new();
        let mut offset: Option<String> = None;
        loop {
            let mut params = base_params.clone();
            if let Some(o) = &offset {
                params.push(("offset", o.clone()));
                if !self.page_pause.is_zero() {
                    std::thread::sleep(self.page_pause);
                }
            }
            debug!(table, page = out.len() / 100, "select page");
            let resp = self
                .client
                .get(url.clone())
                .bearer_auth(&self.api_key)
                .query(&params)
                .send()?;
            let page: ListResponse = self.read(table, resp)?;
            out.extend(page.records);
            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        Ok(out)
    }

    fn create(&self, table: &str, rows: &[Fields]) -> Result<Vec<Record>> {
        check_batch(rows.len())?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let body = WriteRequest {
            records: rows.iter().map(|fields| NewRecord { fields }).collect(),
            typecast: true,
        };
        let resp = self
            .client
            .post(self.table_url(table, None)?)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;
        let written: WriteResponse = self.read(table, resp)?;
        Ok(written.records)
    }

    fn update(&self, table: &str, rows: &[(String, Fields)]) -> Result<()> {
        check_batch(rows.len())?;
        if rows.is_empty() {
            return Ok(());
        }
        let body = WriteRequest {
            records: rows
                .iter()
                .map(|(id, fields)| Patch { id, fields })
                .collect(),
            typecast: true,
        };
        let resp = self
            .client
            .patch(self.table_url(table, None)?)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;
        let _: WriteResponse = self.read(table, resp)?;
        Ok(())
    }

    fn find(&self, table: &str, id: &str) -> Result<Record> {
        let resp = self
            .client
            .get(self.table_url(table, Some(id))?)
            .bearer_auth(&self.api_key)
            .send()?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(CoffeeError::RecordNotFound {
                table: table.to_string(),
                id: id.to_string(),
            });
        }
        self.read(table, resp)
    }

    fn destroy(&self, table: &str, ids: &[String]) -> Result<()> {
        check_batch(ids.len())?;
        if ids.is_empty() {
            return Ok(());
        }
        let params: Vec<(&str, &str)> = ids.iter().map(|id| ("records[]", id.as_str())).collect();
        let resp = self
            .client
            .delete(self.table_url(table, None)?)
            .bearer_auth(&self.api_key)
            .query(&params)
            .send()?;
        let _: serde_json::Value = self.read(table, resp)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{fields, Filter};
    use mockito::Matcher;
    use serde_json::json;

    fn store(server: &mockito::Server) -> AirtableStore {
        AirtableStore::new(
            format!("{}/v0", server.url()),
            "appTest",
            "key123",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn select_follows_pagination() {
        let mut server = mockito::Server::new();
        // Offset-specific mock first so the second page request prefers it.
        let page2 = server
            .mock("GET", "/v0/appTest/Participants")
            .match_query(Matcher::UrlEncoded("offset".into(), "itr1".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"records":[{"id":"rec2","fields":{"Name":"Bo"}}]}"#)
            .expect(1)
            .create();
        let page1 = server
            .mock("GET", "/v0/appTest/Participants")
            .match_header("authorization", "Bearer key123")
            .match_query(Matcher::UrlEncoded(
                "filterByFormula".into(),
                "{Consent} = TRUE()".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"records":[{"id":"rec1","fields":{"Name":"Al"}}],"offset":"itr1"}"#)
            .expect(1)
            .create();

        let records = store(&server)
            .select("Participants", &Query::filter(Filter::is_true("Consent")))
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, "rec2");
        page1.assert();
        page2.assert();
    }

    #[test]
    fn create_posts_records_with_typecast() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/v0/appTest/Pairings")
            .match_body(Matcher::PartialJson(json!({
                "typecast": true,
                "records": [{"fields": {"Pool": "global"}}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"records":[{"id":"recP","fields":{"Pool":"global"}}]}"#)
            .create();

        let created = store(&server)
            .create("Pairings", &[fields([("Pool", json!("global"))])])
            .unwrap();
        assert_eq!(created[0].id, "recP");
        mock.assert();
    }

    #[test]
    fn non_success_status_is_an_error() {
        let mut server = mockito::Server::new();
        server
            .mock("PATCH", "/v0/appTest/Participants")
            .with_status(422)
            .with_body(r#"{"error":{"type":"INVALID_VALUE_FOR_COLUMN"}}"#)
            .create();

        let err = store(&server)
            .update(
                "Participants",
                &[("rec1".to_string(), fields([("Consent", json!(true))]))],
            )
            .unwrap_err();
        match err {
            CoffeeError::StoreStatus { status, body, .. } => {
                assert_eq!(status, 422);
                assert!(body.contains("INVALID_VALUE_FOR_COLUMN"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn find_maps_404_to_not_found() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/v0/appTest/Communities/recX")
            .with_status(404)
            .create();
        assert!(matches!(
            store(&server).find("Communities", "recX"),
            Err(CoffeeError::RecordNotFound { .. })
        ));
    }

    #[test]
    fn oversized_batch_never_hits_network() {
        let server = mockito::Server::new();
        let rows: Vec<Fields> = (0..11).map(|_| Fields::new()).collect();
        assert!(matches!(
            store(&server).create("Pairings", &rows),
            Err(CoffeeError::BatchTooLarge(11))
        ));
    }
}
