pub mod firestore;
pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::router::PersistenceRequest;

/// A sellable item the router can match by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Document written when a customer introduces themselves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRecord {
    pub customer_name: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

/// Document written for every other exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRecord {
    pub customer_name: String,
    pub user_message: String,
    pub bot_response: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },
    #[error("{url} returned {status}: {body}")]
    Status { url: String, status: u16, body: String },
    #[error("invalid store URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("I/O error on `{path}`: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("could not decode `{origin}`: {source}")]
    Decode { origin: String, source: serde_json::Error },
    #[error("could not encode record for `{origin}`: {source}")]
    Encode { origin: String, source: serde_json::Error },
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Full read of the current catalog, in store order.
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;
}

#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn register_customer(&self, record: CustomerRecord) -> Result<(), StoreError>;

    async fn log_message(&self, record: MessageRecord) -> Result<(), StoreError>;

    /// Stamps the request with the current time and writes it.
    async fn apply(&self, request: &PersistenceRequest) -> Result<(), StoreError> {
        let now = Utc::now();
        match request {
            PersistenceRequest::RegisterCustomer { name } => {
                self.register_customer(CustomerRecord {
                    customer_name: name.clone(),
                    created_at: now,
                    last_active: now,
                })
                .await
            }
            PersistenceRequest::LogMessage {
                customer_name,
                user_text,
                bot_text,
            } => {
                self.log_message(MessageRecord {
                    customer_name: customer_name.clone(),
                    user_message: user_text.clone(),
                    bot_response: bot_text.clone(),
                    timestamp: now,
                })
                .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        customers: Mutex<Vec<CustomerRecord>>,
        messages: Mutex<Vec<MessageRecord>>,
    }

    #[async_trait]
    impl PersistenceSink for RecordingSink {
        async fn register_customer(&self, record: CustomerRecord) -> Result<(), StoreError> {
            self.customers.lock().unwrap().push(record);
            Ok(())
        }

        async fn log_message(&self, record: MessageRecord) -> Result<(), StoreError> {
            self.messages.lock().unwrap().push(record);
            Ok(())
        }
    }

    #[tokio::test]
    async fn registration_gets_matching_timestamps() {
        let sink = RecordingSink::default();
        sink.apply(&PersistenceRequest::RegisterCustomer {
            name: "Alice".to_string(),
        })
        .await
        .unwrap();

        let customers = sink.customers.lock().unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].customer_name, "Alice");
        assert_eq!(customers[0].created_at, customers[0].last_active);
        assert!(sink.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn log_request_maps_to_message_record() {
        let sink = RecordingSink::default();
        sink.apply(&PersistenceRequest::LogMessage {
            customer_name: "Anonymous".to_string(),
            user_text: "hello".to_string(),
            bot_text: "hi there".to_string(),
        })
        .await
        .unwrap();

        let messages = sink.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].customer_name, "Anonymous");
        assert_eq!(messages[0].user_message, "hello");
        assert_eq!(messages[0].bot_response, "hi there");
        assert!(sink.customers.lock().unwrap().is_empty());
    }

    #[test]
    fn product_reads_snake_case_fields() {
        let product: Product = serde_json::from_str(
            r#"{"name": "Blue Shirt", "description": "Soft.", "image_url": "u1"}"#,
        )
        .unwrap();
        assert_eq!(product.image_url.as_deref(), Some("u1"));

        let bare: Product = serde_json::from_str(r#"{"name": "Hat"}"#).unwrap();
        assert_eq!(bare.description, "");
        assert_eq!(bare.image_url, None);
    }
}
