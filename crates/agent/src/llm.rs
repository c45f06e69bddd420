use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fellah_core::config::{LlmConfig, LlmProvider};
use fellah_core::domain::inventory::InventoryEntry;
use fellah_core::language::Language;
use fellah_core::reference::ReferenceData;
use fellah_db::repositories::InventoryLedger;

use crate::messages;
use crate::session::{Speaker, Turn};

/// Everything a phraser may look at. `status` carries the decisions already made; the
/// phraser rewords it and must not contradict it.
#[derive(Clone, Debug)]
pub struct PhraseRequest {
    pub language: Language,
    pub transcript: Vec<Turn>,
    pub user_text: String,
    pub status: String,
}

#[derive(Debug, Error)]
pub enum PhraserError {
    #[error("phraser transport failure: {0}")]
    Transport(String),
    #[error("phraser endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("phraser response was malformed: {0}")]
    MalformedResponse(String),
    #[error("phraser is misconfigured: {0}")]
    Configuration(String),
}

#[async_trait]
pub trait Phraser: Send + Sync {
    async fn phrase(&self, request: &PhraseRequest) -> Result<String, PhraserError>;
}

/// Replies with the status text verbatim, or the opening prompt when there is none.
#[derive(Clone, Copy, Debug, Default)]
pub struct TemplatePhraser;

#[async_trait]
impl Phraser for TemplatePhraser {
    async fn phrase(&self, request: &PhraseRequest) -> Result<String, PhraserError> {
        if request.status.trim().is_empty() {
            return Ok(messages::default_prompt(request.language));
        }
        Ok(request.status.clone())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Any OpenAI-compatible `/v1/chat/completions` endpoint (OpenAI itself, Ollama).
pub struct ChatCompletionPhraser {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
    max_retries: u32,
    system_instruction: String,
}

impl ChatCompletionPhraser {
    pub fn new(config: &LlmConfig, system_instruction: String) -> Result<Self, PhraserError> {
        let base_url = config.effective_base_url().ok_or_else(|| {
            PhraserError::Configuration("template provider has no completion endpoint".to_string())
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PhraserError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/chat/completions", base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
            system_instruction,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn messages(&self, request: &PhraseRequest) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(request.transcript.len() + 2);
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: self.system_instruction.clone(),
        });
        messages.extend(request.transcript.iter().map(|turn| ChatMessage {
            role: match turn.speaker {
                Speaker::Client => "user",
                Speaker::Assistant => "assistant",
            }
            .to_string(),
            content: turn.text.clone(),
        }));
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user_content(request),
        });
        messages
    }

    async fn attempt(&self, body: &ChatRequest<'_>) -> Result<String, PhraserError> {
        let mut builder = self.client.post(&self.endpoint).json(body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response =
            builder.send().await.map_err(|e| PhraserError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PhraserError::Status { status, body });
        }

        let parsed: ChatResponse =
            response.json().await.map_err(|e| PhraserError::MalformedResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| PhraserError::MalformedResponse("no completion choices".to_string()))
    }
}

#[async_trait]
impl Phraser for ChatCompletionPhraser {
    async fn phrase(&self, request: &PhraseRequest) -> Result<String, PhraserError> {
        let body = ChatRequest { model: &self.model, messages: self.messages(request), temperature: 0.3 };

        let mut attempt = 0;
        loop {
            match self.attempt(&body).await {
                Ok(reply) => return Ok(reply),
                Err(error) if attempt < self.max_retries && is_retryable(&error) => {
                    attempt += 1;
                    tracing::debug!(
                        event_name = "agent.phraser.retry",
                        attempt,
                        error = %error,
                        "retrying completion request"
                    );
                    tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn is_retryable(error: &PhraserError) -> bool {
    match error {
        PhraserError::Transport(_) => true,
        PhraserError::Status { status, .. } => *status == 429 || *status >= 500,
        PhraserError::MalformedResponse(_) | PhraserError::Configuration(_) => false,
    }
}

fn user_content(request: &PhraseRequest) -> String {
    format!("{}\n\nCONTEXT: {}", request.user_text, request.status)
}

/// Grounding text for a generative phraser: reply language rule, the catalog in every
/// language, who sells what, and the order-taking steps.
pub fn system_instruction(reference: &ReferenceData, inventory: &[InventoryEntry]) -> String {
    let mut text = String::from(
        "You are the ordering assistant of a farm-to-consumer marketplace. Always answer in \
         the language the client writes in (French, Arabic or English). Never invent \
         products, prices, stock or farmers: the CONTEXT line holds the facts for this turn \
         and you must only rephrase it.\n\nProducts:\n",
    );

    for product in reference.catalog.products() {
        text.push_str(&format!(
            "- {} / {} / {}\n",
            product.name, product.french_name, product.arabic_name
        ));
    }

    text.push_str("\nFarmer inventory:\n");
    for entry in inventory {
        let farmer = reference
            .farmer(entry.farmer_id)
            .map(|farmer| farmer.name.as_str())
            .unwrap_or("Unknown farmer");
        let product = reference
            .catalog
            .find(entry.product_id)
            .map(|product| product.name.as_str())
            .unwrap_or("unknown product");
        text.push_str(&format!(
            "- {farmer} sells {product} with {} kg available at {} per kilo.\n",
            entry.stock, entry.price
        ));
    }

    text.push_str(
        "\nOrder flow:\n\
         1. Greet the client and ask what they want to order.\n\
         2. Identify the product.\n\
         3. Ask for the quantity in kilograms.\n\
         4. Confirm availability.\n\
         5. Ask whether they want another product.\n\
         6. Ask for the delivery time (today or tomorrow, morning or evening).\n\
         7. Let them choose a farmer from the numbered list.\n\
         8. Summarize the order and ask for confirmation.\n",
    );
    text
}

/// Builds the phraser the configuration asks for. Generative phrasers get a system
/// instruction over the current catalog and inventory.
pub async fn phraser_from_config(
    config: &LlmConfig,
    reference: &ReferenceData,
    ledger: &dyn InventoryLedger,
) -> Result<Arc<dyn Phraser>, PhraserError> {
    if config.provider == LlmProvider::Template {
        return Ok(Arc::new(TemplatePhraser));
    }

    let mut inventory = Vec::new();
    for product in reference.catalog.products() {
        let entries = ledger
            .entries_for_product(product.id)
            .await
            .map_err(|e| PhraserError::Configuration(format!("inventory snapshot: {e}")))?;
        inventory.extend(entries);
    }

    let phraser = ChatCompletionPhraser::new(config, system_instruction(reference, &inventory))?;
    tracing::info!(
        event_name = "agent.phraser.configured",
        provider = ?config.provider,
        model = %config.model,
        endpoint = phraser.endpoint(),
        "generative phraser configured"
    );
    Ok(Arc::new(phraser))
}

#[cfg(test)]
mod tests {
    use fellah_core::config::{AppConfig, LlmProvider};
    use fellah_core::language::Language;
    use fellah_core::reference::ReferenceData;
    use fellah_db::DemoDataset;

    use super::{
        is_retryable, phraser_from_config, system_instruction, user_content, ChatCompletionPhraser,
        ChatRequest, ChatResponse, PhraseRequest, Phraser, PhraserError, TemplatePhraser,
    };
    use crate::session::{Speaker, Turn};

    fn request(status: &str) -> PhraseRequest {
        PhraseRequest {
            language: Language::French,
            transcript: vec![Turn { speaker: Speaker::Client, text: "bonjour".to_string() }],
            user_text: "je veux des dattes".to_string(),
            status: status.to_string(),
        }
    }

    fn reference() -> ReferenceData {
        ReferenceData::new(DemoDataset::products(), DemoDataset::farmers(), DemoDataset::clients())
    }

    #[tokio::test]
    async fn template_phraser_echoes_status() {
        let reply = TemplatePhraser.phrase(&request("Quantité non disponible pour Dattes.")).await;
        assert_eq!(reply.ok().as_deref(), Some("Quantité non disponible pour Dattes."));
    }

    #[tokio::test]
    async fn template_phraser_falls_back_to_greeting() {
        let reply = TemplatePhraser.phrase(&request("  ")).await.expect("template reply");
        assert!(reply.starts_with("Bonjour!"));
    }

    #[test]
    fn user_message_carries_context_line() {
        assert_eq!(
            user_content(&request("Dattes: 3kg")),
            "je veux des dattes\n\nCONTEXT: Dattes: 3kg"
        );
    }

    #[test]
    fn instruction_lists_catalog_and_inventory() {
        let instruction = system_instruction(&reference(), &DemoDataset::inventory());
        assert!(instruction.contains("- Dates / Dattes / تمر"));
        assert!(instruction.contains("- Youssef sells Dates with 10 kg available at 30.00 per kilo."));
        assert!(instruction.contains("8. Summarize the order"));
    }

    #[test]
    fn only_transient_failures_are_retried() {
        assert!(is_retryable(&PhraserError::Transport("reset".to_string())));
        assert!(is_retryable(&PhraserError::Status { status: 503, body: String::new() }));
        assert!(is_retryable(&PhraserError::Status { status: 429, body: String::new() }));
        assert!(!is_retryable(&PhraserError::Status { status: 401, body: String::new() }));
        assert!(!is_retryable(&PhraserError::MalformedResponse("empty".to_string())));
    }

    #[test]
    fn ollama_endpoint_uses_local_default() {
        let mut config = AppConfig::default().llm;
        config.provider = LlmProvider::Ollama;

        let phraser = ChatCompletionPhraser::new(&config, String::new()).expect("phraser");
        assert_eq!(phraser.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn request_body_replays_transcript_between_system_and_context() {
        let mut config = AppConfig::default().llm;
        config.provider = LlmProvider::Ollama;
        let phraser = ChatCompletionPhraser::new(&config, "rules".to_string()).expect("phraser");

        let body = ChatRequest {
            model: "llama3",
            messages: phraser.messages(&request("Dattes: 3kg")),
            temperature: 0.3,
        };
        let json = serde_json::to_value(&body).expect("serializable body");

        let roles: Vec<&str> =
            json["messages"].as_array().map_or_else(Vec::new, |messages| {
                messages.iter().filter_map(|message| message["role"].as_str()).collect()
            });
        assert_eq!(roles, ["system", "user", "user"]);
        assert_eq!(json["messages"][0]["content"], "rules");
        assert_eq!(json["model"], "llama3");
    }

    #[test]
    fn completion_response_exposes_first_choice() {
        let raw = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Salam!"}}]}"#;

        let parsed: ChatResponse = serde_json::from_str(raw).expect("completion payload");
        assert_eq!(parsed.choices[0].message.content, "Salam!");
    }

    #[tokio::test]
    async fn template_provider_needs_no_inventory_snapshot() {
        let store = DemoDataset::in_memory();
        let config = AppConfig::default().llm;

        let phraser = phraser_from_config(&config, &reference(), &store).await.expect("phraser");
        let reply = phraser.phrase(&request("ok")).await.expect("reply");
        assert_eq!(reply, "ok");
    }
}
