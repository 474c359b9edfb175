use crate::LlmProvider;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sidehustle_core::config::LlmConfig;
use sidehustle_core::{
    CategoryFlags, ConfigError, CoreError, LlmError, SentimentLabel, SentimentResult,
};
use std::time::Duration;
use tracing::{debug, error, warn};

const PROVIDER: &str = "openai";
const CATEGORIZE_TOOL: &str = "categorize_post";
const SENTIMENT_TOOL: &str = "classify_sentiment";
const CATEGORY_TEMPERATURE: f32 = 0.7;
const SENTIMENT_TEMPERATURE: f32 = 0.0;

const CATEGORIZE_SYSTEM_PROMPT: &str = "You are a Reddit post analyzer specializing in \
identifying side hustle and entrepreneurship opportunities. Analyze the post and \
categorize it based on its content.";

const SENTIMENT_SYSTEM_PROMPT: &str = "You are a Reddit post analyzer. Classify the overall \
sentiment the author expresses in the post as positive, neutral or negative, with your \
confidence between 0 and 1.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
    tools: Vec<Value>,
    tool_choice: Value,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct SentimentArguments {
    sentiment: SentimentLabel,
    confidence: f64,
}

/// Chat-completions client that forces a single tool call per request and
/// parses its arguments.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    http_client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String) -> Result<Self, CoreError> {
        Self::with_base_url(api_key, model, "https://api.openai.com/v1", Duration::from_secs(30))
    }

    pub fn with_base_url(
        api_key: String,
        model: String,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, CoreError> {
        let api_key = config.api_key.clone().ok_or_else(|| ConfigError::MissingField {
            field: "llm.api_key".to_string(),
        })?;
        Self::with_base_url(
            api_key,
            config.model.clone(),
            &config.base_url,
            Duration::from_secs(config.timeout_seconds),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn call_tool<T: DeserializeOwned>(
        &self,
        system_prompt: &str,
        user_prompt: String,
        tool: Value,
        tool_name: &str,
        temperature: f32,
    ) -> Result<T, CoreError> {
        let request = ChatRequest {
            model: &self.model,
            temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            tools: vec![tool],
            tool_choice: json!({"type": "function", "function": {"name": tool_name}}),
        };

        debug!("Calling {} tool {}", PROVIDER, tool_name);
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::Llm(LlmError::RequestTimeout {
                        provider: PROVIDER.to_string(),
                    })
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            error!("{} request failed with status {}", PROVIDER, status);
            return Err(CoreError::Llm(map_status(status, &response, &self.model)));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| invalid_format(format!("Malformed completion: {}", e)))?;

        extract_arguments(body, tool_name)
    }
}

fn map_status(status: StatusCode, response: &reqwest::Response, model: &str) -> LlmError {
    let provider = PROVIDER.to_string();
    match status {
        StatusCode::UNAUTHORIZED => LlmError::InvalidApiKey { provider },
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .unwrap_or(20);
            warn!("{} rate limited, retry after {}s", PROVIDER, retry_after);
            LlmError::RateLimitExceeded {
                provider,
                retry_after,
            }
        }
        StatusCode::NOT_FOUND => LlmError::ModelNotAvailable {
            model: model.to_string(),
        },
        s if s.is_server_error() => LlmError::ServiceUnavailable { provider },
        s => LlmError::InvalidResponseFormat {
            provider,
            details: format!("Unexpected status {}", s),
        },
    }
}

fn extract_arguments<T: DeserializeOwned>(
    response: ChatResponse,
    tool_name: &str,
) -> Result<T, CoreError> {
    let call = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.tool_calls.into_iter().next())
        .ok_or_else(|| invalid_format("No tool call received".to_string()))?;

    if call.function.name != tool_name {
        return Err(invalid_format(format!(
            "Expected tool {}, got {}",
            tool_name, call.function.name
        )));
    }

    serde_json::from_str(&call.function.arguments)
        .map_err(|e| invalid_format(format!("Unparsable {} arguments: {}", tool_name, e)))
}

fn invalid_format(details: String) -> CoreError {
    CoreError::Llm(LlmError::InvalidResponseFormat {
        provider: PROVIDER.to_string(),
        details,
    })
}

fn post_prompt(instruction: &str, title: &str, body: &str) -> String {
    let body = if body.trim().is_empty() {
        "[No content]"
    } else {
        body
    };
    format!(
        "{}\nTitle: {}\nContent: {}",
        instruction, title, body
    )
}

fn categorize_tool() -> Value {
    let flag = |description: &str| json!({"type": "boolean", "description": description});
    json!({
        "type": "function",
        "function": {
            "name": CATEGORIZE_TOOL,
            "description": "Categorize a Reddit post into predefined categories",
            "parameters": {
                "type": "object",
                "properties": {
                    "sideHustleOpportunities": flag("Posts where people are posting about their side hustle opportunities"),
                    "freelanceOpportunities": flag("Posts where people are posting about freelance opportunities"),
                    "passiveIncomeOpportunities": flag("Posts where people are posting about how they're able to make passive income"),
                    "moneyTalk": flag("Posts where people are talking about spending money"),
                    "sideHustleTips": flag("Posts where people are posting about tips when they first get into side hustles"),
                    "sideHustleResources": flag("Posts where people are posting about the new resources they're using")
                },
                "required": [
                    "sideHustleOpportunities",
                    "freelanceOpportunities",
                    "passiveIncomeOpportunities",
                    "moneyTalk",
                    "sideHustleTips",
                    "sideHustleResources"
                ]
            }
        }
    })
}

fn sentiment_tool() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": SENTIMENT_TOOL,
            "description": "Record the sentiment of a Reddit post",
            "parameters": {
                "type": "object",
                "properties": {
                    "sentiment": {
                        "type": "string",
                        "enum": ["positive", "neutral", "negative"]
                    },
                    "confidence": {
                        "type": "number",
                        "minimum": 0,
                        "maximum": 1
                    }
                },
                "required": ["sentiment", "confidence"]
            }
        }
    })
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    async fn classify_sentiment(
        &self,
        title: &str,
        body: &str,
    ) -> Result<SentimentResult, CoreError> {
        let arguments: SentimentArguments = self
            .call_tool(
                SENTIMENT_SYSTEM_PROMPT,
                post_prompt("Classify the sentiment of this Reddit post:", title, body),
                sentiment_tool(),
                SENTIMENT_TOOL,
                SENTIMENT_TEMPERATURE,
            )
            .await?;
        Ok(SentimentResult::new(arguments.sentiment, arguments.confidence))
    }

    async fn classify_categories(
        &self,
        title: &str,
        body: &str,
    ) -> Result<CategoryFlags, CoreError> {
        let flags: CategoryFlags = self
            .call_tool(
                CATEGORIZE_SYSTEM_PROMPT,
                post_prompt("Analyze this Reddit post and categorize it:", title, body),
                categorize_tool(),
                CATEGORIZE_TOOL,
                CATEGORY_TEMPERATURE,
            )
            .await?;
        Ok(flags.with_fallback())
    }
}
