use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::chat::history::Conversation;
use crate::chat::message::{Role, ToolCallRequest, TranscriptMessage};
use crate::error::ChatError;
use crate::llm::{LLMClient, LLMInput};
use crate::tool::{ToolArguments, ToolInvoker};

/// System prompt used for the first completion of every turn.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. \
    Use tools to answer the question if needed. \
    Use the same language as the user.";

/// System prompt used for the synthesis completion after tool calls.
const SYNTHESIS_SYSTEM_PROMPT: &str = "You are a helpful assistant that answers \
    user questions using only the results from tools. \
    Use the same language as the user.";

/// Configuration for conversation turns.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// The model to use
    pub model: String,
    /// The system prompt
    pub system_prompt: String,
    /// Maximum model rounds in iterative mode
    pub max_steps: usize,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Optional temperature
    pub temperature: Option<f32>,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            model: "deepseek-chat".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_steps: 100,
            max_tokens: 4096,
            temperature: Some(0.0),
        }
    }
}

/// Intermediate events emitted while a turn is running.
///
/// Events are sent as they happen; ones already emitted stay visible even
/// when the turn aborts afterwards.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    /// A tool is about to be invoked
    ToolCall {
        /// The tool name
        name: String,
        /// Raw JSON-encoded arguments, as the model produced them
        arguments: String,
    },
    /// A tool call finished
    ToolResult {
        /// The tool name
        name: String,
        /// Text content extracted from the tool response
        text: String,
    },
}

/// Runs one conversation turn per incoming user message.
///
/// Each step runs to completion before the next begins; tool calls within a
/// turn are strictly sequential. There is no cancellation: a started turn
/// runs until it finishes or fails.
#[derive(Clone)]
pub struct TurnHandler {
    conversation: Arc<Mutex<Conversation>>,
    llm: Arc<dyn LLMClient>,
    invoker: ToolInvoker,
    config: TurnConfig,
}

impl TurnHandler {
    /// Creates a new turn handler.
    pub fn new(
        conversation: Conversation,
        llm: Arc<dyn LLMClient>,
        invoker: ToolInvoker,
        config: TurnConfig,
    ) -> Self {
        Self {
            conversation: Arc::new(Mutex::new(conversation)),
            llm,
            invoker,
            config,
        }
    }

    /// Creates a new turn handler with default configuration.
    pub fn with_defaults(
        conversation: Conversation,
        llm: Arc<dyn LLMClient>,
        invoker: ToolInvoker,
    ) -> Self {
        Self::new(conversation, llm, invoker, TurnConfig::default())
    }

    /// Handles one user message: single pass, then synthesis if tools ran.
    ///
    /// Returns the final answer. Any error while parsing tool arguments,
    /// resolving a tool, calling a service, or calling the model aborts the
    /// turn; events already sent to `events` remain delivered.
    pub async fn handle(
        &self,
        user_input: &str,
        events: &UnboundedSender<TurnEvent>,
    ) -> Result<String, ChatError> {
        let tool_defs = self.invoker.tool_definitions().await;
        debug!(count = tool_defs.len(), "tool definitions loaded");

        let transcript = {
            let mut conversation = self.conversation.lock().await;
            conversation.history.push(Role::User, user_input);
            conversation.history.to_transcript()
        };

        let response = self
            .llm
            .complete(LLMInput {
                model: self.config.model.clone(),
                messages: transcript,
                system_prompt: self.config.system_prompt.clone(),
                tools: tool_defs,
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            })
            .await?;

        let answer = if response.tool_calls.is_empty() {
            response.text.unwrap_or_default()
        } else {
            let outputs = self
                .run_tool_calls(&response.tool_calls, events)
                .await?;
            self.synthesize(user_input, &outputs).await?
        };

        let mut conversation = self.conversation.lock().await;
        conversation.history.push(Role::Assistant, answer.clone());

        Ok(answer)
    }

    /// Handles one user message in iterative mode: each tool round is fed
    /// back into the transcript and the model is queried again, until it
    /// answers without requesting tools or the step cap is hit.
    pub async fn handle_iterative(
        &self,
        user_input: &str,
        events: &UnboundedSender<TurnEvent>,
    ) -> Result<String, ChatError> {
        let mut transcript = {
            let mut conversation = self.conversation.lock().await;
            conversation.history.push(Role::User, user_input);
            conversation.history.to_transcript()
        };

        let mut step = 0;
        let answer = loop {
            step += 1;
            if step > self.config.max_steps {
                return Err(ChatError::MaxStepsExceeded);
            }

            let tool_defs = self.invoker.tool_definitions().await;
            debug!(step, count = tool_defs.len(), "iterative round");

            let response = self
                .llm
                .complete(LLMInput {
                    model: self.config.model.clone(),
                    messages: transcript.clone(),
                    system_prompt: self.config.system_prompt.clone(),
                    tools: tool_defs,
                    max_tokens: self.config.max_tokens,
                    temperature: self.config.temperature,
                })
                .await?;

            if response.tool_calls.is_empty() {
                break response.text.unwrap_or_default();
            }

            for call in &response.tool_calls {
                let text = self.invoke_one(call, events).await?;
                transcript.push(TranscriptMessage::ToolCalls {
                    calls: vec![call.clone()],
                });
                transcript.push(TranscriptMessage::ToolOutput {
                    tool_call_id: call.id.clone(),
                    name: call.name.clone(),
                    content: text,
                });
            }
        };

        let mut conversation = self.conversation.lock().await;
        conversation.history.push(Role::Assistant, answer.clone());

        Ok(answer)
    }

    /// Invokes each requested call sequentially, in model order.
    async fn run_tool_calls(
        &self,
        calls: &[ToolCallRequest],
        events: &UnboundedSender<TurnEvent>,
    ) -> Result<Vec<(String, String)>, ChatError> {
        let mut outputs = Vec::with_capacity(calls.len());
        for call in calls {
            let text = self.invoke_one(call, events).await?;
            outputs.push((call.name.clone(), text));
        }
        Ok(outputs)
    }

    async fn invoke_one(
        &self,
        call: &ToolCallRequest,
        events: &UnboundedSender<TurnEvent>,
    ) -> Result<String, ChatError> {
        let _ = events.send(TurnEvent::ToolCall {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        });

        let result = self
            .invoker
            .invoke(&call.name, ToolArguments::Text(call.arguments.clone()))
            .await?;
        let text = text_content(&result);

        let _ = events.send(TurnEvent::ToolResult {
            name: call.name.clone(),
            text: text.clone(),
        });

        Ok(text)
    }

    /// Issues the synthesis completion over the collected tool outputs.
    async fn synthesize(
        &self,
        question: &str,
        outputs: &[(String, String)],
    ) -> Result<String, ChatError> {
        let prompt = synthesis_prompt(question, outputs);

        let response = self
            .llm
            .complete(LLMInput {
                model: self.config.model.clone(),
                messages: vec![TranscriptMessage::text(Role::User, prompt)],
                system_prompt: SYNTHESIS_SYSTEM_PROMPT.to_string(),
                tools: Vec::new(),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            })
            .await?;

        Ok(response.text.unwrap_or_default())
    }

    /// Gets the conversation ID.
    pub async fn conversation_id(&self) -> String {
        self.conversation.lock().await.id.clone()
    }

    /// Gets a snapshot of the retained history.
    pub async fn history(&self) -> Vec<crate::chat::HistoryEntry> {
        self.conversation
            .lock()
            .await
            .history
            .entries()
            .cloned()
            .collect()
    }
}

/// Extracts text from a tool response.
///
/// Structured payloads of the form `{"content": [{"text": ...}, ...]}`
/// yield the first item's text; anything else is stringified as-is.
pub fn text_content(result: &Value) -> String {
    if let Some(items) = result.get("content").and_then(Value::as_array) {
        if let Some(text) = items
            .first()
            .and_then(|item| item.get("text"))
            .and_then(Value::as_str)
        {
            return text.to_string();
        }
    }
    result.to_string()
}

/// Builds the synthesis prompt: the original question followed by every
/// captured tool output and the answer instructions.
fn synthesis_prompt(question: &str, outputs: &[(String, String)]) -> String {
    let mut prompt = format!("User Question:\n{}\n\nTool Results:\n", question);

    for (name, result) in outputs {
        prompt.push_str(&format!("\nTool: {}\nResult:\n{}\n", name, result));
    }

    prompt.push_str(
        "\nInstructions:\n\
         1. Carefully read the tool outputs above.\n\
         2. Use ONLY the information in the tool results to answer the user's question.\n\
         3. Do NOT repeat tool results unless necessary; instead, directly answer the user.\n\
         4. Write the answer in the same language used in the user's question.\n\
         5. If the tool results are incomplete or unclear, politely indicate so.\n\n\
         Answer:\n",
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{FinishReason, LLMError, LLMOutput, Usage};
    use crate::tool::{ToolDescriptor, ToolError, ToolService};
    use async_trait::async_trait;
    use mockall::mock;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    mock! {
        pub Llm {}

        #[async_trait]
        impl LLMClient for Llm {
            async fn complete(&self, input: LLMInput) -> Result<LLMOutput, LLMError>;
        }
    }

    fn text_output(text: &str) -> LLMOutput {
        LLMOutput {
            text: Some(text.to_string()),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
            usage: Usage {
                input_tokens: 0,
                output_tokens: 0,
            },
        }
    }

    fn tool_call_output(name: &str, arguments: &str) -> LLMOutput {
        LLMOutput {
            text: None,
            tool_calls: vec![ToolCallRequest {
                id: "call_1".to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }],
            finish_reason: FinishReason::ToolCalls,
            usage: Usage {
                input_tokens: 0,
                output_tokens: 0,
            },
        }
    }

    struct StubService {
        tool: ToolDescriptor,
        response: Value,
        calls: AtomicUsize,
    }

    impl StubService {
        fn new(name: &str, response: Value) -> Arc<Self> {
            Arc::new(Self {
                tool: ToolDescriptor {
                    name: name.to_string(),
                    description: format!("{} tool", name),
                    input_schema: serde_json::json!({"type": "object"}),
                },
                response,
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ToolService for StubService {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
            Ok(vec![self.tool.clone()])
        }

        async fn call_tool(&self, _name: &str, _arguments: Value) -> Result<Value, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn handler(llm: MockLlm, invoker: ToolInvoker, history_cap: usize) -> TurnHandler {
        TurnHandler::new(
            Conversation::new(history_cap),
            Arc::new(llm),
            invoker,
            TurnConfig {
                max_steps: 4,
                ..TurnConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn turn_without_tool_calls_returns_content_verbatim() {
        let mut llm = MockLlm::new();
        llm.expect_complete()
            .times(1)
            .returning(|_| Ok(text_output("X")));

        let handler = handler(llm, ToolInvoker::new(), 6);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let answer = handler.handle("hello", &tx).await.unwrap();

        assert_eq!(answer, "X");
        assert!(rx.try_recv().is_err());

        let history = handler.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, "X");
    }

    #[tokio::test]
    async fn turn_with_tool_call_invokes_and_synthesizes() {
        let invoker = ToolInvoker::new();
        let service = StubService::new("search", serde_json::json!({"content": [{"text": "result"}]}));
        invoker.connect("svc", service.clone()).await.unwrap();

        let synthesis_prompt_seen = Arc::new(StdMutex::new(None::<String>));
        let seen = synthesis_prompt_seen.clone();

        let mut llm = MockLlm::new();
        llm.expect_complete()
            .times(1)
            .returning(|_| Ok(tool_call_output("search", r#"{"q":"hi"}"#)));
        llm.expect_complete().times(1).returning(move |input| {
            assert!(input.tools.is_empty());
            if let Some(TranscriptMessage::Text { content, .. }) = input.messages.first() {
                *seen.lock().unwrap() = Some(content.clone());
            }
            Ok(text_output("final answer"))
        });

        let handler = handler(llm, invoker, 6);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let answer = handler.handle("what is hi?", &tx).await.unwrap();

        assert_eq!(answer, "final answer");
        assert_eq!(service.call_count(), 1);

        // Intermediate events: the call, then its extracted text.
        assert!(matches!(
            rx.try_recv().unwrap(),
            TurnEvent::ToolCall { name, .. } if name == "search"
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            TurnEvent::ToolResult { name, text } if name == "search" && text == "result"
        ));

        let prompt = synthesis_prompt_seen.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("what is hi?"));
        assert!(prompt.contains("result"));

        let history = handler.history().await;
        assert_eq!(history[1].content, "final answer");
    }

    #[tokio::test]
    async fn malformed_tool_arguments_abort_the_turn() {
        let invoker = ToolInvoker::new();
        let service = StubService::new("search", Value::Null);
        invoker.connect("svc", service.clone()).await.unwrap();

        let mut llm = MockLlm::new();
        llm.expect_complete()
            .times(1)
            .returning(|_| Ok(tool_call_output("search", "not json")));

        let handler = handler(llm, invoker, 6);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let err = handler.handle("question", &tx).await.unwrap_err();

        assert!(matches!(
            err,
            ChatError::Tool(ToolError::InvalidArguments(_))
        ));
        assert_eq!(service.call_count(), 0);

        // The call announcement was already emitted and stays visible.
        assert!(matches!(rx.try_recv().unwrap(), TurnEvent::ToolCall { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn iterative_mode_feeds_tool_results_back() {
        let invoker = ToolInvoker::new();
        let service = StubService::new("search", serde_json::json!({"content": [{"text": "data"}]}));
        invoker.connect("svc", service.clone()).await.unwrap();

        let mut llm = MockLlm::new();
        llm.expect_complete()
            .times(1)
            .returning(|_| Ok(tool_call_output("search", r#"{"q":"x"}"#)));
        llm.expect_complete().times(1).returning(|input| {
            let has_calls = input
                .messages
                .iter()
                .any(|m| matches!(m, TranscriptMessage::ToolCalls { .. }));
            let has_output = input.messages.iter().any(|m| {
                matches!(m, TranscriptMessage::ToolOutput { content, .. } if content == "data")
            });
            assert!(has_calls && has_output);
            Ok(text_output("done"))
        });

        let handler = handler(llm, invoker, 6);
        let (tx, _rx) = mpsc::unbounded_channel();

        let answer = handler.handle_iterative("question", &tx).await.unwrap();

        assert_eq!(answer, "done");
        assert_eq!(service.call_count(), 1);
    }

    #[tokio::test]
    async fn iterative_mode_aborts_at_step_cap() {
        let invoker = ToolInvoker::new();
        let service = StubService::new("search", serde_json::json!({"content": [{"text": "data"}]}));
        invoker.connect("svc", service).await.unwrap();

        let mut llm = MockLlm::new();
        llm.expect_complete()
            .returning(|_| Ok(tool_call_output("search", "{}")));

        let handler = handler(llm, invoker, 6);
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = handler.handle_iterative("question", &tx).await.unwrap_err();
        assert!(matches!(err, ChatError::MaxStepsExceeded));
    }

    #[test]
    fn text_content_extracts_first_item() {
        let structured = serde_json::json!({"content": [{"text": "result"}, {"text": "more"}]});
        assert_eq!(text_content(&structured), "result");
    }

    #[test]
    fn text_content_stringifies_other_payloads() {
        let plain = serde_json::json!({"answer": 42});
        assert_eq!(text_content(&plain), r#"{"answer":42}"#);

        let empty = serde_json::json!({"content": []});
        assert_eq!(text_content(&empty), r#"{"content":[]}"#);
    }

    #[test]
    fn synthesis_prompt_lists_every_output() {
        let outputs = vec![
            ("flights".to_string(), "TPE to NRT".to_string()),
            ("hotels".to_string(), "two options".to_string()),
        ];
        let prompt = synthesis_prompt("book a trip", &outputs);

        assert!(prompt.contains("book a trip"));
        assert!(prompt.contains("Tool: flights"));
        assert!(prompt.contains("TPE to NRT"));
        assert!(prompt.contains("Tool: hotels"));
        assert!(prompt.contains("two options"));
    }
}
