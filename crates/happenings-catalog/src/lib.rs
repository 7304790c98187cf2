// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod demo;

pub use demo::DemoCatalog;

use anyhow::{Context, Result, anyhow, bail};
use happenings_app::{CatalogSource, Category, Event, FetchOutcome, Filter, QueryFailure};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_TABLE: &str = "events";
const REST_PREFIX: &str = "/rest/v1";

/// The logical query for one filter: every row, optionally constrained by category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub category: Option<Category>,
}

impl CatalogQuery {
    pub const fn for_filter(filter: Filter) -> Self {
        Self {
            category: filter.category(),
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("select", "*".to_owned())];
        if let Some(category) = &self.category {
            pairs.push(("category", format!("eq.{}", category.as_str())));
        }
        pairs
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    rest_root: String,
    api_key: String,
    table: String,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, api_key: &str, table: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            bail!("catalog.base_url must not be empty");
        }
        let parsed = Url::parse(base_url)
            .with_context(|| format!("catalog.base_url {base_url:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "catalog.base_url {base_url:?} must use http or https, got {}://",
                parsed.scheme()
            );
        }
        if api_key.trim().is_empty() {
            bail!("catalog.api_key must not be empty; set it in [catalog] or HAPPENINGS_API_KEY");
        }
        let table = table.trim();
        if table.is_empty() || table.contains('/') {
            bail!("catalog.table {table:?} must be a bare table name");
        }

        let rest_root = if base_url.ends_with(REST_PREFIX) {
            base_url.to_owned()
        } else {
            format!("{base_url}{REST_PREFIX}")
        };

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            rest_root,
            api_key: api_key.trim().to_owned(),
            table: table.to_owned(),
            timeout,
            http,
        })
    }

    pub fn rest_root(&self) -> &str {
        &self.rest_root
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn request_url(&self, filter: Filter) -> Result<Url> {
        let raw = format!("{}/{}", self.rest_root, self.table);
        let mut url = Url::parse(&raw).with_context(|| format!("build catalog URL {raw:?}"))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in CatalogQuery::for_filter(filter).query_pairs() {
                pairs.append_pair(key, &value);
            }
        }
        Ok(url)
    }

    pub fn fetch_events(&self, filter: Filter) -> Result<Vec<Event>> {
        let url = self.request_url(filter)?;
        debug!(%url, filter = filter.label(), "querying catalog");

        let response = self
            .http
            .get(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|error| connection_error(&self.rest_root, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let events: Vec<Event> = response.json().context("decode catalog rows")?;
        debug!(count = events.len(), "catalog rows decoded");
        Ok(events)
    }

    /// Confirms the store is reachable and the table readable with the configured key.
    pub fn ping(&self) -> Result<()> {
        let raw = format!("{}/{}", self.rest_root, self.table);
        let mut url = Url::parse(&raw).with_context(|| format!("build catalog URL {raw:?}"))?;
        url.query_pairs_mut()
            .append_pair("select", "id")
            .append_pair("limit", "1");

        let response = self
            .http
            .get(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|error| connection_error(&self.rest_root, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(())
    }
}

impl CatalogSource for Client {
    fn fetch(&self, filter: Filter) -> FetchOutcome {
        self.fetch_events(filter)
            .map_err(|error| QueryFailure::new(format!("{error:#}")))
    }
}

fn connection_error(rest_root: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check [catalog].base_url and your network ({})",
        rest_root,
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<StoreErrorEnvelope>(body)
        && let Some(message) = parsed.message
        && !message.is_empty()
    {
        return match parsed.hint.filter(|hint| !hint.is_empty()) {
            Some(hint) => anyhow!(
                "store error ({}): {} -- {}",
                status.as_u16(),
                message,
                hint
            ),
            None => anyhow!("store error ({}): {}", status.as_u16(), message),
        };
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return anyhow!(
            "store rejected credentials ({}); check [catalog].api_key",
            status.as_u16()
        );
    }

    if body.len() < 100 && !body.contains('{') && !body.trim().is_empty() {
        return anyhow!("store error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("store returned {}", status.as_u16())
}

#[derive(Debug, Deserialize)]
struct StoreErrorEnvelope {
    message: Option<String>,
    hint: Option<String>,
}
