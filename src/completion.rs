//! Completion capability seam
//!
//! The underlying language model is an opaque external collaborator: given
//! conversation context, agent instructions, declared tool signatures, and
//! the reachable hand-off targets, it returns exactly one of a user-facing
//! message, a tool-call batch, or a hand-off request. [`OpenAiModel`] is the
//! concrete adapter over the OpenAI chat-completions API; hand-off targets
//! are advertised to the model as pseudo-tools and intercepted here before
//! they ever reach the tool bridge.

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType,
        CreateChatCompletionRequestArgs, FunctionCall, FunctionObjectArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::Value;

use crate::agent::Agent;
use crate::error::BoxError;
use crate::graph::HandoffEdge;
use crate::items::{Message, Role, ToolCall};

/// Tool-name prefix under which hand-off targets are advertised.
const HANDOFF_TOOL_PREFIX: &str = "handoff_to_";

/// What an agent decided to do with its turn slice.
///
/// Tool-call and hand-off replies may carry accompanying assistant content;
/// the runtime captures it in the turn's message trace.
#[derive(Debug, Clone)]
pub enum AgentReply {
    /// A user-facing message; the turn terminates here.
    Message(String),
    /// One or more tool-call requests to dispatch through the bridge.
    ToolCalls {
        content: Option<String>,
        calls: Vec<ToolCall>,
    },
    /// A request to transfer control to another agent.
    Handoff {
        content: Option<String>,
        target: String,
        reason: Option<String>,
    },
}

/// Trait for completion backends.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Produce the next agent action for the given context.
    async fn complete(
        &self,
        agent: &Agent,
        history: &[Message],
        handoffs: &[&HandoffEdge],
    ) -> Result<AgentReply, BoxError>;
}

/// Classify a raw model response into an [`AgentReply`]. The first hand-off
/// pseudo-tool call wins over everything else in the batch.
pub(crate) fn classify_reply(content: Option<String>, calls: Vec<ToolCall>) -> AgentReply {
    let content = content.filter(|c| !c.is_empty());
    if let Some(handoff) = calls
        .iter()
        .find(|c| c.name.starts_with(HANDOFF_TOOL_PREFIX))
    {
        let target = handoff.name[HANDOFF_TOOL_PREFIX.len()..].to_string();
        let reason = handoff
            .arguments
            .get("reason")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        return AgentReply::Handoff {
            content,
            target,
            reason,
        };
    }
    if !calls.is_empty() {
        return AgentReply::ToolCalls { content, calls };
    }
    AgentReply::Message(content.unwrap_or_default())
}

/// OpenAI-backed completion model.
pub struct OpenAiModel {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiModel {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
            temperature: None,
        }
    }

    /// Create with a custom client, e.g. one pointed at a compatible
    /// self-hosted endpoint.
    pub fn with_client(client: Client<OpenAIConfig>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn convert_message(msg: &Message) -> Vec<ChatCompletionRequestMessage> {
        match msg.role {
            Role::System => vec![ChatCompletionRequestSystemMessageArgs::default()
                .content(msg.content.clone())
                .build()
                .expect("valid system message")
                .into()],
            Role::User => vec![ChatCompletionRequestUserMessageArgs::default()
                .content(msg.content.clone())
                .build()
                .expect("valid user message")
                .into()],
            Role::Assistant => {
                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                builder.content(msg.content.clone());
                if !msg.tool_calls.is_empty() {
                    let calls: Vec<ChatCompletionMessageToolCall> = msg
                        .tool_calls
                        .iter()
                        .map(|tc| ChatCompletionMessageToolCall {
                            id: tc.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: tc.name.clone(),
                                arguments: tc.arguments.to_string(),
                            },
                        })
                        .collect();
                    builder.tool_calls(calls);
                }
                vec![builder.build().expect("valid assistant message").into()]
            }
            // One wire message per recorded result.
            Role::Tool => msg
                .tool_results
                .iter()
                .map(|record| {
                    ChatCompletionRequestToolMessageArgs::default()
                        .content(msg.content.clone())
                        .tool_call_id(record.tool_call_id.clone())
                        .build()
                        .expect("valid tool message")
                        .into()
                })
                .collect(),
        }
    }

    fn advertised_tools(agent: &Agent, handoffs: &[&HandoffEdge]) -> Vec<ChatCompletionTool> {
        let mut tools: Vec<ChatCompletionTool> = agent
            .tools()
            .iter()
            .map(|tool| {
                ChatCompletionToolArgs::default()
                    .r#type(ChatCompletionToolType::Function)
                    .function(
                        FunctionObjectArgs::default()
                            .name(tool.name())
                            .description(tool.description())
                            .parameters(tool.parameters_schema())
                            .build()
                            .expect("valid function object"),
                    )
                    .build()
                    .expect("valid chat tool")
            })
            .collect();

        for edge in handoffs {
            tools.push(
                ChatCompletionToolArgs::default()
                    .r#type(ChatCompletionToolType::Function)
                    .function(
                        FunctionObjectArgs::default()
                            .name(format!("{}{}", HANDOFF_TOOL_PREFIX, edge.target))
                            .description(format!(
                                "Hand the conversation off to {}: {}",
                                edge.target, edge.label
                            ))
                            .parameters(serde_json::json!({
                                "type": "object",
                                "properties": {
                                    "reason": {
                                        "type": "string",
                                        "description": "Reason for the hand-off"
                                    }
                                }
                            }))
                            .build()
                            .expect("valid function object"),
                    )
                    .build()
                    .expect("valid chat tool"),
            );
        }

        tools
    }
}

#[async_trait]
impl CompletionModel for OpenAiModel {
    async fn complete(
        &self,
        agent: &Agent,
        history: &[Message],
        handoffs: &[&HandoffEdge],
    ) -> Result<AgentReply, BoxError> {
        let mut messages: Vec<ChatCompletionRequestMessage> =
            Self::convert_message(&Message::system(agent.system_prompt(handoffs)));
        for msg in history {
            messages.extend(Self::convert_message(msg));
        }

        let mut request = CreateChatCompletionRequestArgs::default();
        request.model(&self.model).messages(messages);

        let tools = Self::advertised_tools(agent, handoffs);
        if !tools.is_empty() {
            request.tools(tools);
        }
        if let Some(temperature) = self.temperature {
            request.temperature(temperature);
        }

        let response = self.client.chat().create(request.build()?).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or("no choices in completion response")?;

        let calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: serde_json::from_str(&tc.function.arguments).unwrap_or(Value::Null),
            })
            .collect();

        Ok(classify_reply(choice.message.content, calls))
    }
}

/// Scripted completion model for unit tests: pops queued replies in order
/// and records the agent each call was made against.
#[cfg(test)]
pub(crate) struct ScriptedModel {
    replies: std::sync::Mutex<std::collections::VecDeque<AgentReply>>,
    pub calls: std::sync::Mutex<Vec<(String, String)>>, // (agent, last message content)
}

#[cfg(test)]
impl ScriptedModel {
    pub fn new(replies: Vec<AgentReply>) -> Self {
        Self {
            replies: std::sync::Mutex::new(replies.into()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl CompletionModel for ScriptedModel {
    async fn complete(
        &self,
        agent: &Agent,
        history: &[Message],
        _handoffs: &[&HandoffEdge],
    ) -> Result<AgentReply, BoxError> {
        let last = history.last().map(|m| m.content.clone()).unwrap_or_default();
        self.calls
            .lock()
            .unwrap()
            .push((agent.name().to_string(), last));
        let mut replies = self.replies.lock().unwrap();
        Ok(replies
            .pop_front()
            .unwrap_or_else(|| AgentReply::Message("Default response".to_string())))
    }
}
