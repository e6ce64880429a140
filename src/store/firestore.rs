//! Cloud Firestore over its REST API.
//!
//! Products are read from the `products` collection, customers are added to
//! `users` and exchanges to `messages`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, warn};
use url::Url;

use super::{CustomerRecord, MessageRecord, PersistenceSink, Product, ProductCatalog, StoreError};

const PAGE_SIZE: &str = "300";

#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub base_url: String,
    pub database: String,
    pub access_token: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

pub struct FirestoreStore {
    config: FirestoreConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreStore {
    pub fn new(config: FirestoreConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| StoreError::Http {
                url: config.base_url.clone(),
                source,
            })?;

        Ok(Self { config, client })
    }

    fn collection_url(&self, collection: &str) -> Result<Url, StoreError> {
        let mut url = Url::parse(&format!(
            "{}/projects/{}/databases/{}/documents/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.project_id, self.config.database, collection
        ))?;
        if let Some(key) = &self.config.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    // reqwest errors carry the full request URL, `?key=` included, so the
    // source is stripped and only the redacted URL is kept.
    async fn send(&self, url: &Url, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|source| StoreError::Http {
                url: redact(url),
                source: source.without_url(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!("Firestore request failed with status {}: {}", status, body);
            return Err(StoreError::Status {
                url: redact(url),
                status,
                body,
            });
        }

        Ok(response)
    }

    async fn add_document(&self, collection: &str, fields: Value) -> Result<(), StoreError> {
        let url = self.collection_url(collection)?;
        let body = json!({ "fields": fields });
        debug!("Adding document to {}: {}", collection, body);

        let request = self.client.post(url.clone()).json(&body);
        self.send(&url, request).await?;
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for FirestoreStore {
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let mut products = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.collection_url("products")?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("pageSize", PAGE_SIZE);
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let request = self.client.get(url.clone());
            let response = self.send(&url, request).await?;
            let page: ListDocumentsResponse = response.json().await.map_err(|source| StoreError::Http {
                url: redact(&url),
                source: source.without_url(),
            })?;

            for document in &page.documents {
                match product_from_fields(&document.fields) {
                    Some(product) => products.push(product),
                    None => warn!("Skipping product document without a name: {}", document.name),
                }
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!("Loaded {} products from Firestore", products.len());
        Ok(products)
    }
}

#[async_trait]
impl PersistenceSink for FirestoreStore {
    async fn register_customer(&self, record: CustomerRecord) -> Result<(), StoreError> {
        let fields = json!({
            "customer_name": string_value(&record.customer_name),
            "created_at": timestamp_value(&record.created_at),
            "last_active": timestamp_value(&record.last_active),
        });
        self.add_document("users", fields).await
    }

    async fn log_message(&self, record: MessageRecord) -> Result<(), StoreError> {
        let fields = json!({
            "customer_name": string_value(&record.customer_name),
            "user_message": string_value(&record.user_message),
            "bot_response": string_value(&record.bot_response),
            "timestamp": timestamp_value(&record.timestamp),
        });
        self.add_document("messages", fields).await
    }
}

fn string_value(value: &str) -> Value {
    json!({ "stringValue": value })
}

fn timestamp_value(value: &DateTime<Utc>) -> Value {
    json!({ "timestampValue": value.to_rfc3339_opts(SecondsFormat::Micros, true) })
}

fn field_str<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key)?.get("stringValue")?.as_str()
}

/// Decodes a product document; `None` when the name is missing.
fn product_from_fields(fields: &Map<String, Value>) -> Option<Product> {
    let name = field_str(fields, "name")?;
    Some(Product {
        name: name.to_string(),
        description: field_str(fields, "description").unwrap_or_default().to_string(),
        image_url: field_str(fields, "image_url").map(str::to_string),
    })
}

// Keeps API keys out of logs and error messages.
fn redact(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}
