//! Decides how each customer message is answered.
//!
//! A message is either a name registration, a product question answered from
//! the catalog, or a general question forwarded to the language model. The
//! router only describes the write it wants; the caller performs it.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::conversation_state::{ConversationState, ImageRef};
use crate::gemini_client::Generate;
use crate::store::Product;

pub const FALLBACK_REPLY: &str = "Hmm, I couldn't find an exact answer for that, but I'm always here to help. What else can I assist you with? 😊";
pub const PRODUCT_SUFFIX: &str = "You can visit our website to view the full collection and prices.";
pub const ANONYMOUS: &str = "Anonymous";

/// A write the router wants performed against the customer store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceRequest {
    RegisterCustomer {
        name: String,
    },
    LogMessage {
        customer_name: String,
        user_text: String,
        bot_text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseDescriptor {
    pub reply_text: String,
    pub image_url: Option<String>,
    pub image_caption: Option<String>,
    pub persistence: PersistenceRequest,
}

/// How a message that names a catalog product is answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProductReplyMode {
    /// Reply with the product description and image.
    #[default]
    Catalog,
    /// Ask the model, but still show the product image.
    Model,
}

impl std::str::FromStr for ProductReplyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "catalog" => Ok(Self::Catalog),
            "model" => Ok(Self::Model),
            other => Err(format!("unknown product reply mode `{}` (expected `catalog` or `model`)", other)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Router {
    mode: ProductReplyMode,
}

impl Router {
    pub fn new(mode: ProductReplyMode) -> Self {
        Self { mode }
    }

    /// Routes one trimmed, non-empty utterance.
    ///
    /// Appends the user turn and the bot turn to `state` and may set the
    /// customer name. Generation failures are answered with
    /// [`FALLBACK_REPLY`] and never returned.
    pub async fn route(
        &self,
        utterance: &str,
        state: &mut ConversationState,
        catalog: &[Product],
        llm: &dyn Generate,
    ) -> ResponseDescriptor {
        state.add_user_message(utterance);

        let response = match extract_name(utterance) {
            Some(name) => {
                debug!("Registering customer name {:?}", name);
                state.set_customer_name(name.clone());
                ResponseDescriptor {
                    reply_text: format!(
                        "Hi {}, it's a pleasure to meet you! Is there anything I can help you with today? 😊",
                        name
                    ),
                    image_url: None,
                    image_caption: None,
                    persistence: PersistenceRequest::RegisterCustomer { name },
                }
            }
            None => {
                let (reply_text, image_url, image_caption) = match find_product(utterance, catalog) {
                    None => {
                        debug!("No product matched, asking the model");
                        (generate_or_fallback(llm, utterance).await, None, None)
                    }
                    Some(product) => {
                        debug!("Matched product {:?}", product.name);
                        let reply = match self.mode {
                            ProductReplyMode::Catalog => {
                                format!("{}\n\n{}", product.description, PRODUCT_SUFFIX)
                            }
                            ProductReplyMode::Model => generate_or_fallback(llm, utterance).await,
                        };
                        (reply, product.image_url.clone(), Some(product.name.clone()))
                    }
                };

                ResponseDescriptor {
                    persistence: PersistenceRequest::LogMessage {
                        customer_name: state
                            .customer_name()
                            .filter(|name| !name.is_empty())
                            .unwrap_or(ANONYMOUS)
                            .to_string(),
                        user_text: utterance.to_string(),
                        bot_text: reply_text.clone(),
                    },
                    reply_text,
                    image_url,
                    image_caption,
                }
            }
        };

        let image = match (&response.image_url, &response.image_caption) {
            (Some(url), caption) => Some(ImageRef {
                url: url.clone(),
                caption: caption.clone().unwrap_or_default(),
            }),
            (None, _) => None,
        };
        state.add_bot_message(&response.reply_text, image);

        response
    }
}

async fn generate_or_fallback(llm: &dyn Generate, utterance: &str) -> String {
    match llm.generate(utterance).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Generation failed, replying with fallback: {}", e);
            FALLBACK_REPLY.to_string()
        }
    }
}

// ASCII-only case folding, so look-alikes such as the long s do not match.
fn name_phrase() -> &'static Regex {
    static PHRASE: OnceLock<Regex> = OnceLock::new();
    PHRASE.get_or_init(|| Regex::new(r"(?i-u)my name is").expect("name phrase pattern is valid"))
}

/// Title-cased text after the first "my name is", if the phrase occurs.
fn extract_name(utterance: &str) -> Option<String> {
    let found = name_phrase().find(utterance)?;
    Some(title_case(utterance[found.end()..].trim()))
}

/// Upper-cases letters that follow a non-letter and lower-cases the rest.
fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut previous_is_letter = false;
    for c in text.chars() {
        if previous_is_letter {
            result.extend(c.to_lowercase());
        } else {
            result.extend(c.to_uppercase());
        }
        previous_is_letter = c.is_alphabetic();
    }
    result
}

/// First product, in catalog order, whose name occurs in the utterance.
fn find_product<'a>(utterance: &str, catalog: &'a [Product]) -> Option<&'a Product> {
    let haystack = utterance.to_lowercase();
    catalog
        .iter()
        .find(|product| haystack.contains(&product.name.to_lowercase()))
}
