use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Number of icons, and therefore object phrases, in every set.
pub const VARIATION_COUNT: usize = 4;

/// Upper bound on a single completion call.
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(10);

/// Turns a category prompt ("toys") into concrete object phrases.
#[async_trait]
pub trait VariationResolver: Send + Sync {
    async fn resolve(&self, category: &str) -> Result<Vec<String>, VariationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum VariationError {
    #[error("Completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Completion returned no content")]
    EmptyContent,

    #[error("Completion content is not a JSON string array: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Chat-completion client for OpenAI-compatible APIs.
pub struct OpenAiVariationClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl OpenAiVariationClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(COMPLETION_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl VariationResolver for OpenAiVariationClient {
    async fn resolve(&self, category: &str) -> Result<Vec<String>, VariationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You are a helpful assistant that returns only JSON arrays. \
                              Always return valid JSON with exactly 4 string elements."
                        .to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: variation_prompt(category),
                },
            ],
            temperature: 0.7,
            max_tokens: 200,
        };

        let response: ChatResponse = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(VariationError::EmptyContent)?;

        parse_variation_list(&content)
    }
}

fn variation_prompt(category: &str) -> String {
    format!(
        "Give me 4 different, specific real-world objects that are examples of \"{category}\". \
         Return only a JSON array of 4 strings, no other text. Each string should be a simple, clear object name.\n\n\
         Examples:\n\
         - If category is \"Toys\": [\"Bear Toy\", \"Car Toy\", \"Spinner Toy\", \"Swing Toy\"]\n\
         - If category is \"Vehicles\": [\"Car\", \"Bus\", \"Truck\", \"Bike\"]\n\
         - If category is \"Animals\": [\"Cat\", \"Dog\", \"Rabbit\", \"Bear\"]\n\
         - If category is \"Food\": [\"Cookie\", \"Cupcake\", \"Ice Cream\", \"Pizza Slice\"]\n\
         - If category is \"Tools\": [\"Hammer\", \"Wrench\", \"Screwdriver\", \"Pliers\"]"
    )
}

/// Parse a JSON string array, tolerating a surrounding Markdown code fence.
fn parse_variation_list(content: &str) -> Result<Vec<String>, VariationError> {
    let mut body = content.trim();
    if let Some(rest) = body.strip_prefix("```") {
        let rest = rest.strip_prefix("json").or_else(|| rest.strip_prefix("JSON")).unwrap_or(rest);
        body = rest.trim_end().strip_suffix("```").unwrap_or(rest).trim();
    }

    let items: Vec<String> = serde_json::from_str(body)?;
    Ok(items.into_iter().map(|s| s.trim().to_string()).collect())
}

/// Static category table used when no completion is available.
///
/// Lookup is case-insensitive and ignores surrounding whitespace.
pub fn lookup(category: &str) -> Option<[&'static str; VARIATION_COUNT]> {
    let key = category.trim().to_lowercase();
    let variations = match key.as_str() {
        "toys" => ["Bear Toy", "Car Toy", "Spinner Toy", "Swing Toy"],
        "vehicles" => ["Car", "Bus", "Truck", "Bike"],
        "animals" => ["Cat", "Dog", "Rabbit", "Bear"],
        "food" => ["Cookie", "Cupcake", "Ice Cream", "Pizza Slice"],
        "fruits" => ["Apple", "Banana", "Strawberry", "Orange"],
        "vegetables" => ["Carrot", "Tomato", "Broccoli", "Bell Pepper"],
        "tools" => ["Hammer", "Wrench", "Screwdriver", "Pliers"],
        "instruments" => ["Guitar", "Piano", "Drums", "Violin"],
        "sports" => ["Basketball", "Soccer Ball", "Tennis Racket", "Baseball"],
        "motorcycles" => ["Sport Motorcycle", "Cruiser Motorcycle", "Dirt Bike", "Scooter"],
        _ => return None,
    };
    Some(variations)
}

/// Exactly four non-empty phrases with no case-insensitive duplicates.
fn is_usable(phrases: &[String]) -> bool {
    if phrases.len() != VARIATION_COUNT || phrases.iter().any(|p| p.trim().is_empty()) {
        return false;
    }
    let distinct: HashSet<String> = phrases.iter().map(|p| p.trim().to_lowercase()).collect();
    distinct.len() == VARIATION_COUNT
}

/// Resolution chain: completion client, then the static table, then the
/// prompt itself repeated four times.
#[derive(Clone, Default)]
pub struct VariationChain {
    completion: Option<Arc<dyn VariationResolver>>,
}

impl VariationChain {
    pub fn new(completion: Option<Arc<dyn VariationResolver>>) -> Self {
        Self { completion }
    }

    pub async fn resolve(&self, prompt: &str) -> Vec<String> {
        if let Some(client) = &self.completion {
            match client.resolve(prompt).await {
                Ok(phrases) if is_usable(&phrases) => return phrases,
                Ok(phrases) => tracing::warn!(
                    prompt = %prompt,
                    count = phrases.len(),
                    "Completion variations unusable, falling back"
                ),
                Err(e) => tracing::warn!(prompt = %prompt, error = %e, "Completion variations failed, falling back"),
            }
        }

        if let Some(phrases) = lookup(prompt) {
            return phrases.iter().map(|p| p.to_string()).collect();
        }

        tracing::debug!(prompt = %prompt, "No variations found, repeating prompt");
        vec![prompt.to_string(); VARIATION_COUNT]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedResolver(Result<Vec<&'static str>, ()>);

    #[async_trait]
    impl VariationResolver for FixedResolver {
        async fn resolve(&self, _category: &str) -> Result<Vec<String>, VariationError> {
            match &self.0 {
                Ok(v) => Ok(v.iter().map(|s| s.to_string()).collect()),
                Err(()) => Err(VariationError::EmptyContent),
            }
        }
    }

    fn chain(result: Result<Vec<&'static str>, ()>) -> VariationChain {
        VariationChain::new(Some(Arc::new(FixedResolver(result))))
    }

    #[test]
    fn test_lookup_known_categories() {
        assert_eq!(lookup("Toys"), Some(["Bear Toy", "Car Toy", "Spinner Toy", "Swing Toy"]));
        assert_eq!(lookup(" vehicles "), Some(["Car", "Bus", "Truck", "Bike"]));
        assert_eq!(lookup("UnknownCategory"), None);
    }

    #[test]
    fn test_parse_plain_and_fenced() {
        let plain = parse_variation_list(r#"["Cat", "Dog", "Rabbit", "Bear"]"#).unwrap();
        assert_eq!(plain, vec!["Cat", "Dog", "Rabbit", "Bear"]);

        let fenced = parse_variation_list("```json\n[\" Cat \", \"Dog\", \"Rabbit\", \"Bear\"]\n```").unwrap();
        assert_eq!(fenced, plain);

        assert!(parse_variation_list("Sure! Here are four objects").is_err());
    }

    #[tokio::test]
    async fn test_completion_result_is_used() {
        let phrases = chain(Ok(vec!["Hammer", "Saw", "Drill", "Level"])).resolve("tools").await;
        assert_eq!(phrases, vec!["Hammer", "Saw", "Drill", "Level"]);
    }

    #[tokio::test]
    async fn test_short_completion_falls_back_to_table() {
        let phrases = chain(Ok(vec!["Hammer", "Saw"])).resolve("tools").await;
        assert_eq!(phrases, vec!["Hammer", "Wrench", "Screwdriver", "Pliers"]);
    }

    #[tokio::test]
    async fn test_duplicate_completion_falls_back() {
        let phrases = chain(Ok(vec!["Cat", "cat", "Dog", "Bear"])).resolve("animals").await;
        assert_eq!(phrases, vec!["Cat", "Dog", "Rabbit", "Bear"]);
    }

    #[tokio::test]
    async fn test_failed_completion_repeats_prompt() {
        let phrases = chain(Err(())).resolve("rocket ship").await;
        assert_eq!(phrases, vec!["rocket ship"; 4]);
    }

    #[tokio::test]
    async fn test_without_completion_client() {
        let chain = VariationChain::default();
        assert_eq!(chain.resolve("fruits").await.len(), VARIATION_COUNT);
        assert_eq!(chain.resolve("lighthouse").await, vec!["lighthouse"; 4]);
    }
}
