//! # Per-turn orchestration runtime
//!
//! Executes one conversational turn against a hand-off graph as an explicit
//! state machine: the turn starts `Active` at an entry agent, moves to
//! `AwaitingTool` while tool calls are dispatched through the bridge, and
//! `Terminated` once an agent emits a user-facing message without a further
//! hand-off. Hand-offs transfer the `Active` state along declared graph
//! edges; a bounded hand-off count keeps a mis-routing cycle from looping
//! forever.
//!
//! Observable guarantees:
//! - every assistant message emitted during the turn is captured in arrival
//!   order, not just the final one;
//! - `awaiting_user` is derived from the final captured message only;
//! - an invalid hand-off is rejected back to the issuing agent as an error
//!   result and is never surfaced to the user;
//! - exceeding the hand-off limit yields an apologetic terminal message,
//!   never an unbounded loop.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::completion::{AgentReply, CompletionModel};
use crate::error::{OrchestratorError, Result};
use crate::graph::HandoffGraph;
use crate::items::{Message, ToolCall, ToolRecord};
use crate::session::Session;
use crate::tool::ToolBridge;

/// Terminal message synthesized when the hand-off limit is exceeded.
const HANDOFF_LIMIT_APOLOGY: &str =
    "I'm sorry, I wasn't able to get your request to the right specialist. \
     Please try rephrasing your question.";

/// Limits for one turn's execution.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Maximum number of hand-offs executed within a single turn.
    pub max_handoffs: usize,
    /// Maximum number of completion calls within a single turn.
    pub max_steps: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_handoffs: 10,
            max_steps: 25,
        }
    }
}

/// The state of one turn's execution.
pub enum TurnState {
    /// An agent holds the conversation and the model is consulted next.
    Active { agent: Arc<crate::agent::Agent> },
    /// Tool calls are pending dispatch through the bridge.
    AwaitingTool {
        agent: Arc<crate::agent::Agent>,
        pending: Vec<ToolCall>,
    },
    /// The turn produced its final user-facing message.
    Terminated { final_message: String },
}

/// The result of one executed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The final user-facing message.
    pub text: String,
    /// All assistant messages captured during the turn, in arrival order.
    pub messages: Vec<String>,
    /// Whether the final message is phrased as a question.
    pub awaiting_user: bool,
    /// The agent that authored the last captured message.
    pub last_agent: Option<String>,
    /// Every message appended during the turn (user, assistant, tool), in
    /// order, ready to be committed to the session history.
    pub transcript: Vec<Message>,
}

/// Prefix a follow-up turn with a marker naming the agent it belongs to, so
/// a specialist keeps context without the entry agent re-routing it.
pub fn follow_up_text(agent: &str, user_text: &str) -> String {
    format!(
        "[This is a follow-up for {}. Continue handling the user's request.]\n{}",
        agent, user_text
    )
}

/// Executes turns against one immutable hand-off graph.
pub struct OrchestrationRuntime {
    graph: Arc<HandoffGraph>,
    model: Arc<dyn CompletionModel>,
    config: RuntimeConfig,
}

impl OrchestrationRuntime {
    pub fn new(graph: Arc<HandoffGraph>, model: Arc<dyn CompletionModel>) -> Self {
        Self {
            graph,
            model,
            config: RuntimeConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn graph(&self) -> &Arc<HandoffGraph> {
        &self.graph
    }

    /// Execute one turn starting at the entry agent — or, when the session's
    /// last active agent is a non-entry agent still in the graph, at that
    /// agent with the user text prefixed by a follow-up marker.
    pub async fn execute_turn(&self, session: &Session, user_text: &str) -> Result<TurnOutcome> {
        match session.last_active_agent.as_deref() {
            Some(last) if last != self.graph.entry_name() && self.graph.agent(last).is_some() => {
                debug!(agent = %last, "continuing turn with last active agent");
                let agent = self.graph.agent(last).cloned().expect("agent checked above");
                self.run(agent, session, &follow_up_text(last, user_text))
                    .await
            }
            _ => {
                let agent = self.graph.entry().clone();
                self.run(agent, session, user_text).await
            }
        }
    }

    /// Execute one turn starting at a named agent, applying the follow-up
    /// marker when that agent was also the session's last active agent.
    pub async fn execute_turn_from(
        &self,
        start: &str,
        session: &Session,
        user_text: &str,
    ) -> Result<TurnOutcome> {
        let agent = self
            .graph
            .agent(start)
            .cloned()
            .ok_or_else(|| OrchestratorError::BackendExecution {
                message: format!("unknown agent '{}'", start),
            })?;
        if session.last_active_agent.as_deref() == Some(start) {
            self.run(agent, session, &follow_up_text(start, user_text))
                .await
        } else {
            self.run(agent, session, user_text).await
        }
    }

    fn check_handoff(&self, from: &str, to: &str) -> Result<()> {
        if self.graph.is_reachable(from, to) && self.graph.agent(to).is_some() {
            Ok(())
        } else {
            Err(OrchestratorError::InvalidHandoff {
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }

    async fn run(
        &self,
        start: Arc<crate::agent::Agent>,
        session: &Session,
        user_text: &str,
    ) -> Result<TurnOutcome> {
        info!(agent = %start.name(), session = %session.id, "starting turn");

        let mut history = session.history.clone();
        let mut transcript: Vec<Message> = Vec::new();
        let user_msg = Message::user(user_text);
        history.push(user_msg.clone());
        transcript.push(user_msg);

        // (author, content) pairs in arrival order.
        let mut captured: Vec<(String, String)> = Vec::new();
        let mut handoff_count = 0usize;
        let mut steps = 0usize;
        let mut state = TurnState::Active { agent: start };

        let final_message = loop {
            state = match state {
                TurnState::Active { agent } => {
                    steps += 1;
                    if steps > self.config.max_steps {
                        return Err(OrchestratorError::StepLimitExceeded {
                            max_steps: self.config.max_steps,
                        });
                    }

                    let edges = self.graph.edges_from(agent.name());
                    let reply = self
                        .model
                        .complete(&agent, &history, &edges)
                        .await
                        .map_err(|e| OrchestratorError::Completion(e.to_string()))?;

                    match reply {
                        AgentReply::Message(text) => {
                            let msg = Message::assistant(agent.name(), text.as_str());
                            history.push(msg.clone());
                            transcript.push(msg);
                            captured.push((agent.name().to_string(), text.clone()));
                            TurnState::Terminated { final_message: text }
                        }
                        AgentReply::ToolCalls { content, calls } => {
                            let content = content.unwrap_or_default();
                            if !content.is_empty() {
                                captured.push((agent.name().to_string(), content.clone()));
                            }
                            let msg = Message::assistant_with_tool_calls(
                                agent.name(),
                                content,
                                calls.clone(),
                            );
                            history.push(msg.clone());
                            transcript.push(msg);
                            TurnState::AwaitingTool {
                                agent,
                                pending: calls,
                            }
                        }
                        AgentReply::Handoff {
                            content,
                            target,
                            reason,
                        } => {
                            if let Some(text) = content.filter(|t| !t.is_empty()) {
                                let msg = Message::assistant(agent.name(), text.as_str());
                                history.push(msg.clone());
                                transcript.push(msg);
                                captured.push((agent.name().to_string(), text));
                            }

                            match self.check_handoff(agent.name(), &target) {
                                Ok(()) => {
                                    handoff_count += 1;
                                    if handoff_count > self.config.max_handoffs {
                                        warn!(
                                            max_handoffs = self.config.max_handoffs,
                                            "hand-off limit exceeded, synthesizing apology"
                                        );
                                        let text = HANDOFF_LIMIT_APOLOGY.to_string();
                                        let msg = Message::assistant(agent.name(), text.as_str());
                                        history.push(msg.clone());
                                        transcript.push(msg);
                                        captured.push((agent.name().to_string(), text.clone()));
                                        TurnState::Terminated { final_message: text }
                                    } else {
                                        info!(
                                            from = %agent.name(),
                                            to = %target,
                                            reason = reason.as_deref().unwrap_or(""),
                                            "hand-off"
                                        );
                                        let next = self
                                            .graph
                                            .agent(&target)
                                            .cloned()
                                            .expect("target checked by check_handoff");
                                        TurnState::Active { agent: next }
                                    }
                                }
                                Err(err) => {
                                    // Reject back to the issuing agent as an
                                    // error tool result; the user never sees it.
                                    debug!(
                                        from = %agent.name(),
                                        to = %target,
                                        "rejecting hand-off without a declared edge"
                                    );
                                    let call_id = uuid::Uuid::new_v4().to_string();
                                    let call = ToolCall {
                                        id: call_id.clone(),
                                        name: format!("handoff_to_{}", target),
                                        arguments: serde_json::json!({ "reason": reason }),
                                    };
                                    let attempt = Message::assistant_with_tool_calls(
                                        agent.name(),
                                        "",
                                        vec![call],
                                    );
                                    history.push(attempt.clone());
                                    transcript.push(attempt);

                                    let rejection = Message::tool_result(ToolRecord {
                                        tool_call_id: call_id,
                                        name: format!("handoff_to_{}", target),
                                        output: serde_json::Value::Null,
                                        error: Some(format!(
                                            "{}; choose a declared hand-off target or reply to the user",
                                            err
                                        )),
                                    });
                                    history.push(rejection.clone());
                                    transcript.push(rejection);
                                    TurnState::Active { agent }
                                }
                            }
                        }
                    }
                }
                TurnState::AwaitingTool { agent, pending } => {
                    let bridge = ToolBridge::new(agent.tools());
                    // Strictly sequential: the agent's next action depends on
                    // the previous tool result.
                    for call in pending {
                        let result = bridge.invoke(&call.name, call.arguments.clone()).await;
                        let record = match result {
                            Ok(output) => ToolRecord {
                                tool_call_id: call.id,
                                name: call.name,
                                output,
                                error: None,
                            },
                            Err(err) => {
                                warn!(tool = %call.name, error = %err, "tool call failed");
                                ToolRecord {
                                    tool_call_id: call.id,
                                    name: call.name,
                                    output: serde_json::Value::Null,
                                    error: Some(err.to_string()),
                                }
                            }
                        };
                        let msg = Message::tool_result(record);
                        history.push(msg.clone());
                        transcript.push(msg);
                    }
                    TurnState::Active { agent }
                }
                TurnState::Terminated { final_message } => break final_message,
            };
        };

        let awaiting_user = final_message.trim().ends_with('?');
        let last_agent = captured.last().map(|(author, _)| author.clone());
        info!(
            session = %session.id,
            messages = captured.len(),
            handoffs = handoff_count,
            awaiting_user,
            "turn complete"
        );

        Ok(TurnOutcome {
            text: final_message,
            messages: captured.into_iter().map(|(_, text)| text).collect(),
            awaiting_user,
            last_agent,
            transcript,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::completion::ScriptedModel;
    use crate::graph::{HandoffGraph, RETURN_EDGE_LABEL};
    use crate::items::Role;
    use crate::tool::typed_tool;
    use pretty_assertions::assert_eq;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct LookupArgs {
        order_id: String,
    }

    fn support_graph() -> Arc<HandoffGraph> {
        let lookup = typed_tool(
            "check_order_status",
            "Look up an order by id",
            |args: LookupArgs| async move {
                Ok(serde_json::json!({
                    "message": format!("No order found for id {}", args.order_id)
                }))
            },
        );
        Arc::new(
            HandoffGraph::builder()
                .entry_agent(Agent::simple("TriageAgent", "Route requests."))
                .agent(Agent::simple("OrderStatusAgent", "Check orders.").with_tool(lookup))
                .edge("TriageAgent", "OrderStatusAgent", "Order status questions")
                .edge("OrderStatusAgent", "TriageAgent", RETURN_EDGE_LABEL)
                .build()
                .unwrap(),
        )
    }

    fn message(text: &str) -> AgentReply {
        AgentReply::Message(text.to_string())
    }

    fn handoff(target: &str) -> AgentReply {
        AgentReply::Handoff {
            content: None,
            target: target.to_string(),
            reason: None,
        }
    }

    #[tokio::test]
    async fn test_plain_message_terminates_turn() {
        let model = Arc::new(ScriptedModel::new(vec![message("How can I help?")]));
        let runtime = OrchestrationRuntime::new(support_graph(), model);

        let outcome = runtime
            .execute_turn(&Session::new("s1"), "hi")
            .await
            .unwrap();
        assert_eq!(outcome.text, "How can I help?");
        assert_eq!(outcome.messages, vec!["How can I help?".to_string()]);
        assert!(outcome.awaiting_user);
        assert_eq!(outcome.last_agent.as_deref(), Some("TriageAgent"));
        // user + assistant
        assert_eq!(outcome.transcript.len(), 2);
    }

    #[tokio::test]
    async fn test_handoff_then_tool_then_message() {
        let model = Arc::new(ScriptedModel::new(vec![
            handoff("OrderStatusAgent"),
            AgentReply::ToolCalls {
                content: None,
                calls: vec![ToolCall {
                    id: "call_1".to_string(),
                    name: "check_order_status".to_string(),
                    arguments: serde_json::json!({"order_id": "ORD-123"}),
                }],
            },
            message("I couldn't find that order."),
        ]));
        let runtime = OrchestrationRuntime::new(support_graph(), model.clone());

        let outcome = runtime
            .execute_turn(&Session::new("s1"), "What's the status of order ORD-123?")
            .await
            .unwrap();

        assert_eq!(outcome.text, "I couldn't find that order.");
        assert!(!outcome.awaiting_user);
        assert_eq!(outcome.last_agent.as_deref(), Some("OrderStatusAgent"));

        // The tool result landed in the transcript as a tool-role message.
        let tool_msgs: Vec<_> = outcome
            .transcript
            .iter()
            .filter(|m| m.role == Role::Tool)
            .collect();
        assert_eq!(tool_msgs.len(), 1);
        assert!(tool_msgs[0].content.contains("No order found"));

        // Second completion call went to the specialist.
        let calls = model.calls.lock().unwrap();
        assert_eq!(calls[1].0, "OrderStatusAgent");
    }

    #[tokio::test]
    async fn test_unknown_tool_continues_turn() {
        let model = Arc::new(ScriptedModel::new(vec![
            AgentReply::ToolCalls {
                content: None,
                calls: vec![ToolCall {
                    id: "call_1".to_string(),
                    name: "no_such_tool".to_string(),
                    arguments: serde_json::json!({}),
                }],
            },
            message("done"),
        ]));
        let runtime = OrchestrationRuntime::new(support_graph(), model);

        let outcome = runtime
            .execute_turn(&Session::new("s1"), "hi")
            .await
            .unwrap();
        assert_eq!(outcome.text, "done");
        let tool_msg = outcome
            .transcript
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        assert!(tool_msg.content.contains("unknown tool 'no_such_tool'"));
    }

    #[tokio::test]
    async fn test_invalid_handoff_rejected_back_to_agent() {
        // TriageAgent tries to reach an undeclared agent, then recovers.
        let model = Arc::new(ScriptedModel::new(vec![
            handoff("RefundAgent"),
            message("Let me handle that myself."),
        ]));
        let runtime = OrchestrationRuntime::new(support_graph(), model.clone());

        let outcome = runtime
            .execute_turn(&Session::new("s1"), "refund please")
            .await
            .unwrap();
        assert_eq!(outcome.text, "Let me handle that myself.");
        // The rejection is in the transcript but never in the captured trace.
        assert_eq!(outcome.messages.len(), 1);
        let rejection = outcome
            .transcript
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        assert!(rejection.content.contains("no hand-off edge"));

        // Both completion calls went to the same agent.
        let calls = model.calls.lock().unwrap();
        assert_eq!(calls[0].0, "TriageAgent");
        assert_eq!(calls[1].0, "TriageAgent");
    }

    #[tokio::test]
    async fn test_handoff_cycle_is_bounded() {
        // Two agents bounce control forever; the runtime must synthesize a
        // terminal apology instead of looping.
        let replies: Vec<AgentReply> = (0..64)
            .map(|i| {
                if i % 2 == 0 {
                    handoff("OrderStatusAgent")
                } else {
                    handoff("TriageAgent")
                }
            })
            .collect();
        let model = Arc::new(ScriptedModel::new(replies));
        let config = RuntimeConfig {
            max_handoffs: 4,
            max_steps: 50,
        };
        let runtime = OrchestrationRuntime::new(support_graph(), model.clone()).with_config(config);

        let outcome = runtime
            .execute_turn(&Session::new("s1"), "hi")
            .await
            .unwrap();
        assert_eq!(outcome.text, HANDOFF_LIMIT_APOLOGY);
        assert!(!outcome.awaiting_user);
        // max_handoffs executed, plus the attempt that tripped the limit.
        assert_eq!(model.calls.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_follow_up_routes_to_last_active_agent() {
        let model = Arc::new(ScriptedModel::new(vec![message("Anything else?")]));
        let runtime = OrchestrationRuntime::new(support_graph(), model.clone());

        let mut session = Session::new("s1");
        session.last_active_agent = Some("OrderStatusAgent".to_string());

        let outcome = runtime.execute_turn(&session, "yes, ORD-9").await.unwrap();
        assert_eq!(outcome.last_agent.as_deref(), Some("OrderStatusAgent"));

        let calls = model.calls.lock().unwrap();
        assert_eq!(calls[0].0, "OrderStatusAgent");
        assert!(calls[0].1.contains("follow-up for OrderStatusAgent"));
        assert!(calls[0].1.contains("yes, ORD-9"));
    }

    #[tokio::test]
    async fn test_entry_agent_gets_no_follow_up_marker() {
        let model = Arc::new(ScriptedModel::new(vec![message("Hello")]));
        let runtime = OrchestrationRuntime::new(support_graph(), model.clone());

        let mut session = Session::new("s1");
        session.last_active_agent = Some("TriageAgent".to_string());

        runtime.execute_turn(&session, "hi again").await.unwrap();
        let calls = model.calls.lock().unwrap();
        assert_eq!(calls[0].0, "TriageAgent");
        assert_eq!(calls[0].1, "hi again");
    }

    #[tokio::test]
    async fn test_handoff_with_content_is_captured_in_trace() {
        let model = Arc::new(ScriptedModel::new(vec![
            AgentReply::Handoff {
                content: Some("Routing you to order support.".to_string()),
                target: "OrderStatusAgent".to_string(),
                reason: Some("order question".to_string()),
            },
            message("Your order shipped yesterday."),
        ]));
        let runtime = OrchestrationRuntime::new(support_graph(), model);

        let outcome = runtime
            .execute_turn(&Session::new("s1"), "where is my order?")
            .await
            .unwrap();
        assert_eq!(
            outcome.messages,
            vec![
                "Routing you to order support.".to_string(),
                "Your order shipped yesterday.".to_string()
            ]
        );
        assert_eq!(outcome.text, "Your order shipped yesterday.");
        assert_eq!(outcome.last_agent.as_deref(), Some("OrderStatusAgent"));
    }

    #[tokio::test]
    async fn test_step_limit_errors_out() {
        // A model that never terminates the turn.
        let replies: Vec<AgentReply> = (0..64)
            .map(|_| AgentReply::ToolCalls {
                content: None,
                calls: vec![ToolCall {
                    id: "c".to_string(),
                    name: "no_such_tool".to_string(),
                    arguments: serde_json::json!({}),
                }],
            })
            .collect();
        let model = Arc::new(ScriptedModel::new(replies));
        let config = RuntimeConfig {
            max_handoffs: 10,
            max_steps: 3,
        };
        let runtime = OrchestrationRuntime::new(support_graph(), model).with_config(config);

        let err = runtime
            .execute_turn(&Session::new("s1"), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::StepLimitExceeded { .. }));
    }
}
