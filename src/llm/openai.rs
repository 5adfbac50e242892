use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{FinishReason, LLMClient, LLMError, LLMInput, LLMOutput, Usage};
use crate::chat::{ToolCallRequest, TranscriptMessage};
use crate::tool::ToolDescriptor;

/// Chat-completions response body.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: UsageInfo,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageResponse,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    #[serde(default)]
    id: String,
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Default, Deserialize)]
struct UsageInfo {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// A client for OpenAI-compatible chat-completions endpoints.
///
/// The base URL selects the actual provider; the wire format is the same
/// for a hosted endpoint or a local one.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: Client,
    base_url: String,
}

impl OpenAIClient {
    /// Creates a new client.
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, LLMError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| LLMError::AuthError(e.to_string()))?,
        );
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let mut client_builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder
            .build()
            .map_err(LLMError::NetworkError)?;

        Ok(Self {
            client,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        })
    }

    /// Creates a request builder for chat completions.
    fn chat_completions_request(&self, input: &LLMInput) -> RequestBuilder {
        let tools = Self::build_tools(&input.tools);

        let body = ChatRequest {
            model: input.model.clone(),
            messages: Self::build_messages(input),
            tool_choice: tools.as_ref().map(|_| "auto"),
            tools,
            max_tokens: Some(input.max_tokens),
            temperature: input.temperature,
        };

        debug!(model = %input.model, "sending chat completion request");

        self.client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body)
    }

    /// Maps declared tools to the wire format. Returns `None` when no tools
    /// are registered so the request carries no tool block at all.
    fn build_tools(tools: &[ToolDescriptor]) -> Option<Vec<Value>> {
        if tools.is_empty() {
            return None;
        }
        Some(
            tools
                .iter()
                .map(|tool| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.input_schema,
                        }
                    })
                })
                .collect(),
        )
    }

    /// Builds wire messages for the API request.
    fn build_messages(input: &LLMInput) -> Vec<Value> {
        let mut messages = Vec::new();

        if !input.system_prompt.is_empty() {
            messages.push(serde_json::json!({
                "role": "system",
                "content": input.system_prompt
            }));
        }

        for msg in &input.messages {
            match msg {
                TranscriptMessage::Text { role, content } => {
                    messages.push(serde_json::json!({
                        "role": role.as_str(),
                        "content": content
                    }));
                }
                TranscriptMessage::ToolCalls { calls } => {
                    let tool_calls: Vec<Value> = calls
                        .iter()
                        .map(|call| {
                            serde_json::json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": call.arguments,
                                }
                            })
                        })
                        .collect();
                    messages.push(serde_json::json!({
                        "role": "assistant",
                        "content": null,
                        "tool_calls": tool_calls
                    }));
                }
                TranscriptMessage::ToolOutput {
                    tool_call_id,
                    name,
                    content,
                } => {
                    messages.push(serde_json::json!({
                        "role": "tool",
                        "tool_call_id": tool_call_id,
                        "name": name,
                        "content": content
                    }));
                }
            }
        }

        messages
    }

    fn parse_response(response: ChatCompletionResponse) -> Result<LLMOutput, LLMError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::InvalidResponse("No choices in response".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCallRequest {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        let text = choice.message.content.filter(|text| !text.is_empty());

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("stop") => FinishReason::Stop,
            Some("tool_calls") => FinishReason::ToolCalls,
            Some("length") => FinishReason::MaxTokens,
            _ => FinishReason::Error,
        };

        Ok(LLMOutput {
            text,
            tool_calls,
            finish_reason,
            usage: Usage {
                input_tokens: response.usage.prompt_tokens,
                output_tokens: response.usage.completion_tokens,
            },
        })
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn complete(&self, input: LLMInput) -> Result<LLMOutput, LLMError> {
        let request = self.chat_completions_request(&input);

        let response = request.send().await.map_err(LLMError::NetworkError)?;
        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| LLMError::InvalidResponse(e.to_string()))?;

        if !status.is_success() {
            return Err(LLMError::ApiError(format!("{}: {}", status, response_text)));
        }

        debug!(len = response_text.len(), "model response received");

        let response: ChatCompletionResponse = serde_json::from_str(&response_text)
            .map_err(|e| LLMError::InvalidResponse(format!("{}: {}", e, response_text)))?;

        Self::parse_response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Role;

    fn parse(body: &str) -> LLMOutput {
        let response: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        OpenAIClient::parse_response(response).unwrap()
    }

    #[test]
    fn parses_plain_text_response() {
        let output = parse(
            r#"{
                "choices": [{
                    "message": {"role": "assistant", "content": "hello"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 12, "completion_tokens": 3}
            }"#,
        );

        assert_eq!(output.text.as_deref(), Some("hello"));
        assert!(output.tool_calls.is_empty());
        assert!(matches!(output.finish_reason, FinishReason::Stop));
        assert_eq!(output.usage.input_tokens, 12);
    }

    #[test]
    fn parses_tool_calls_with_raw_argument_blobs() {
        let output = parse(
            r#"{
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "search", "arguments": "{\"q\":\"hi\"}"}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            }"#,
        );

        assert!(output.text.is_none());
        assert_eq!(output.tool_calls.len(), 1);
        assert_eq!(output.tool_calls[0].name, "search");
        // Arguments stay as the raw blob; the invoker parses them.
        assert_eq!(output.tool_calls[0].arguments, r#"{"q":"hi"}"#);
        assert!(matches!(output.finish_reason, FinishReason::ToolCalls));
    }

    #[test]
    fn empty_choices_is_invalid_response() {
        let response: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            OpenAIClient::parse_response(response),
            Err(LLMError::InvalidResponse(_))
        ));
    }

    #[test]
    fn no_tool_block_when_no_tools_registered() {
        let input = LLMInput {
            model: "deepseek-chat".to_string(),
            messages: vec![TranscriptMessage::text(Role::User, "hi")],
            system_prompt: "be helpful".to_string(),
            tools: Vec::new(),
            max_tokens: 64,
            temperature: Some(0.0),
        };

        assert!(OpenAIClient::build_tools(&input.tools).is_none());

        let messages = OpenAIClient::build_messages(&input);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
    }

    #[test]
    fn tool_round_maps_to_assistant_and_tool_messages() {
        let call = ToolCallRequest {
            id: "call_1".to_string(),
            name: "search".to_string(),
            arguments: r#"{"q":"hi"}"#.to_string(),
        };
        let input = LLMInput {
            model: "deepseek-chat".to_string(),
            messages: vec![
                TranscriptMessage::text(Role::User, "hi"),
                TranscriptMessage::ToolCalls {
                    calls: vec![call.clone()],
                },
                TranscriptMessage::ToolOutput {
                    tool_call_id: call.id.clone(),
                    name: call.name.clone(),
                    content: "result".to_string(),
                },
            ],
            system_prompt: String::new(),
            tools: Vec::new(),
            max_tokens: 64,
            temperature: None,
        };

        let messages = OpenAIClient::build_messages(&input);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["tool_calls"][0]["function"]["name"], "search");
        assert_eq!(messages[2]["role"], "tool");
        assert_eq!(messages[2]["tool_call_id"], "call_1");
        assert_eq!(messages[2]["content"], "result");
    }
}
