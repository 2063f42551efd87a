use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};

use crate::completion::{CompletionError, CompletionModel, Message, MessageHistory, TokenUsage};
use crate::tools::{ToolCall, ToolSet};

/// Hosted chat-completions APIs speaking the OpenAI wire format
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Groq,
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "deepseek")]
    DeepSeek,
    Xai,
}

impl Provider {
    #[must_use]
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Self::Groq => "GROQ_API_KEY",
            Self::OpenAI => "OPENAI_API_KEY",
            Self::DeepSeek => "DEEPSEEK_API_KEY",
            Self::Xai => "XAI_API_KEY",
        }
    }

    #[must_use]
    pub fn url(&self) -> &'static str {
        match self {
            Self::Groq => "https://api.groq.com/openai/v1/chat/completions",
            Self::OpenAI => "https://api.openai.com/v1/chat/completions",
            Self::DeepSeek => "https://api.deepseek.com/chat/completions",
            Self::Xai => "https://api.x.ai/v1/chat/completions",
        }
    }

    #[must_use]
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Groq => "openai/gpt-oss-20b",
            Self::OpenAI => "gpt-4o-mini",
            Self::DeepSeek => "deepseek-chat",
            Self::Xai => "grok-2-latest",
        }
    }
}

pub struct OpenAICompatibleCompletionModel {
    api_key: String,
    api_url: String,
    client: reqwest::Client,
    model: String,
}

impl OpenAICompatibleCompletionModel {
    /// Creates a model for `provider`, reading the API key from the environment.
    ///
    /// `api_key_var`, `api_url` and `model` fall back to the provider's defaults.
    ///
    /// # Errors
    /// `CompletionError::ConfigError` if the API key variable isn't set
    #[instrument]
    pub fn new(
        provider: Provider,
        api_key_var: Option<&str>,
        api_url: Option<String>,
        model: Option<String>,
    ) -> Result<Self, CompletionError> {
        let api_key_var = api_key_var.unwrap_or(provider.api_key_var());
        let api_key = std::env::var(api_key_var).map_err(|e| {
            let e = format!("Failed to fetch env var `{api_key_var}`!, {e}");
            error!(e);
            CompletionError::ConfigError(e)
        })?;
        Ok(Self::with_api_key(
            api_key,
            api_url.unwrap_or_else(|| provider.url().to_string()),
            model.unwrap_or_else(|| provider.default_model().to_string()),
        ))
    }

    #[must_use]
    pub fn with_api_key(api_key: String, api_url: String, model: String) -> Self {
        Self {
            api_key,
            api_url,
            client: reqwest::Client::new(),
            model,
        }
    }
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
enum OpenAIMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<OpenAIToolCall>>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Serialize, Debug, PartialEq)]
struct OpenAIToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: OpenAIFunction,
}

#[derive(Serialize, Debug, PartialEq)]
struct OpenAIFunction {
    name: String,
    arguments: String,
}

impl From<ToolCall> for OpenAIToolCall {
    fn from(call: ToolCall) -> Self {
        Self {
            id: call.id,
            kind: "function",
            function: OpenAIFunction {
                name: call.name,
                arguments: call.arguments,
            },
        }
    }
}

/// One `Message` can expand to several wire messages, tool responses each get their own
fn to_openai_messages(message: Message) -> Vec<OpenAIMessage> {
    match message {
        Message::Preamble(content) => vec![OpenAIMessage::System { content }],
        Message::User {
            content,
            tool_responses,
        } => {
            let mut out: Vec<OpenAIMessage> = tool_responses
                .unwrap_or_default()
                .into_iter()
                .map(|r| OpenAIMessage::Tool {
                    content: r.text(),
                    tool_call_id: r.id,
                })
                .collect();
            if !content.is_empty() || out.is_empty() {
                out.push(OpenAIMessage::User { content });
            }
            out
        }
        Message::Assistant {
            content,
            tool_calls,
        } => {
            let tool_calls = tool_calls
                .filter(|calls| !calls.is_empty())
                .map(|calls| calls.into_iter().map(Into::into).collect::<Vec<_>>());
            let content = if content.is_empty() && tool_calls.is_some() {
                None
            } else {
                Some(content)
            };
            vec![OpenAIMessage::Assistant {
                content,
                tool_calls,
            }]
        }
    }
}

fn parse_tool_call(tc: &Value) -> Result<ToolCall, CompletionError> {
    let missing = |field: &str| CompletionError::ParseError(format!("Tool call without `{field}`"));
    let id = tc["id"].as_str().ok_or_else(|| missing("id"))?.to_string();
    let name = tc["function"]["name"]
        .as_str()
        .ok_or_else(|| missing("function.name"))?
        .to_string();
    // arguments normally arrive JSON encoded in a string, some providers send the object itself
    let arguments = match &tc["function"]["arguments"] {
        Value::String(s) => s.clone(),
        Value::Null => return Err(missing("function.arguments")),
        other => other.to_string(),
    };
    Ok(ToolCall {
        id,
        name,
        arguments,
    })
}

fn parse_response(response_json: &Value) -> Result<(Message, TokenUsage), CompletionError> {
    let message_json = &response_json["choices"][0]["message"];
    if message_json.is_null() {
        return Err(CompletionError::ParseError(
            "Response has no choices".to_string(),
        ));
    }

    let resp_msg_json = &message_json["content"];
    let mut response_message = String::new();
    if !resp_msg_json.is_null() {
        response_message = resp_msg_json
            .as_str()
            .ok_or(CompletionError::ParseError(
                "Invalid response body".to_string(),
            ))?
            .to_string();
    }

    let tool_calls = match message_json["tool_calls"].as_array() {
        Some(calls) if !calls.is_empty() => {
            let calls = calls
                .iter()
                .map(parse_tool_call)
                .collect::<Result<Vec<_>, _>>()?;
            info!(tool_call_count = calls.len(), "Parsed tool calls");
            Some(calls)
        }
        _ => None,
    };

    let usage_response = &response_json["usage"];
    let token_usage = TokenUsage {
        prompt_tokens: usage_response["prompt_tokens"].as_u64(),
        completion_tokens: usage_response["completion_tokens"].as_u64(),
        total_tokens: usage_response["total_tokens"].as_u64(),
    };

    Ok((
        Message::Assistant {
            content: response_message,
            tool_calls,
        },
        token_usage,
    ))
}

#[async_trait]
impl CompletionModel for OpenAICompatibleCompletionModel {
    #[instrument(
        skip(self, message, history, tools, temperature),
        fields(
            model = %self.model,
            history_len = history.len(),
            tools = tools.is_some()
        )
    )]
    async fn send(
        &mut self,
        message: Message,
        history: &MessageHistory,
        tools: Option<&ToolSet>,
        temperature: f64,
        max_tokens: usize,
    ) -> Result<(Message, TokenUsage), CompletionError> {
        let mut messages = history.clone();
        messages.push(message);
        let messages: Vec<OpenAIMessage> = messages
            .into_iter()
            .flat_map(to_openai_messages)
            .collect();

        let mut request_body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        if let Some(tools) = tools {
            let tools_serialized: Vec<Value> =
                tools.0.iter().map(|t| t.default_serializer()).collect();
            if let Some(obj) = request_body.as_object_mut() {
                info!(
                    tool_count = tools_serialized.len(),
                    "Including tools in request"
                );
                obj.insert("tools".to_string(), Value::Array(tools_serialized));
            }
        }

        debug!(request_body = ?request_body, "Sending chat completion request");

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "Request failed");
                CompletionError::RequestError(e.to_string())
            })?;

        let status = response.status();
        debug!(%status, "Received API response");

        if status.is_success() {
            let response_json: Value = response.json().await.map_err(|e| {
                error!(error = ?e, "Failed to parse response JSON");
                CompletionError::ParseError(e.to_string())
            })?;

            let (message, token_usage) = parse_response(&response_json)?;
            info!(
                prompt_tokens = token_usage.prompt_tokens,
                completion_tokens = token_usage.completion_tokens,
                total_tokens = token_usage.total_tokens,
                "Token usage recorded"
            );
            Ok((message, token_usage))
        } else {
            let error_msg = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error (failed to read response body)".to_string());

            error!(
                status = %status,
                error = %error_msg,
                "API returned error response"
            );

            Err(CompletionError::ProviderError(status.as_u16(), error_msg))
        }
    }
}
