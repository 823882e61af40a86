//! # Backend selection (fallback chain)
//!
//! A backend is one complete orchestration strategy: a hand-off graph plus
//! its execution engine, or a simple keyword classifier over a flat agent
//! set. The selector tries configured backends strictly in priority order;
//! any error inside a backend is logged with the backend's identity and the
//! chain falls through. Exhausting the chain yields a static apology — the
//! selector never propagates an error to its caller.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::agent::AgentRef;
use crate::catalog::AgentCatalog;
use crate::completion::CompletionModel;
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};
use crate::graph::{resolve_graph, HandoffGraph, RemoteAgentSpec, SpecialistSpec};
use crate::items::{Message, Role};
use crate::runtime::{OrchestrationRuntime, RuntimeConfig, TurnOutcome};
use crate::session::Session;
use crate::tool::Tool;

/// Static reply used when every backend in the chain has failed.
pub const FALLBACK_TEXT: &str =
    "I'm sorry, I encountered an error trying to process your request.";

/// One complete orchestration strategy, tried in priority order.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Identity used in logs when this backend is skipped or fails.
    fn name(&self) -> &str;

    /// Whether this backend's required configuration is present. Unconfigured
    /// backends are skipped without being counted as failures.
    fn is_configured(&self) -> bool {
        true
    }

    /// Execute one turn. Any error is recoverable at the selector level.
    async fn execute(&self, session: &Session, user_text: &str) -> Result<TurnOutcome>;
}

/// A backend that executes turns against a hand-off graph — either a local,
/// hand-authored graph or one resolved from the remote agent catalog.
pub struct GraphBackend {
    name: String,
    runtime: OrchestrationRuntime,
}

impl std::fmt::Debug for GraphBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphBackend")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl GraphBackend {
    pub fn new(
        name: impl Into<String>,
        graph: Arc<HandoffGraph>,
        model: Arc<dyn CompletionModel>,
    ) -> Self {
        Self {
            name: name.into(),
            runtime: OrchestrationRuntime::new(graph, model),
        }
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime = self.runtime.with_config(config);
        self
    }

    /// Build a backend by resolving the configured remote agents against the
    /// catalog. Specialists without a configured id are omitted; a missing or
    /// unresolvable entry agent is fatal for this backend's build. Happens
    /// once per activation, before any turn is routed here.
    pub async fn from_remote_config(
        name: impl Into<String>,
        config: &OrchestratorConfig,
        catalog: &dyn AgentCatalog,
        model: Arc<dyn CompletionModel>,
        tools: RemoteToolset,
    ) -> Result<Self> {
        let entry_id = config.orchestrator_agent_id.as_ref().ok_or_else(|| {
            OrchestratorError::AgentResolution {
                message: "no orchestrator agent id configured".to_string(),
            }
        })?;

        let mut specialists = Vec::new();
        let declared = [
            (
                &config.product_agent_id,
                "ProductLookupAgent",
                "Product search, SKU, availability, price",
                tools.product,
            ),
            (
                &config.order_agent_id,
                "OrderStatusAgent",
                "Order status or tracking questions",
                tools.order,
            ),
            (
                &config.knowledge_agent_id,
                "KnowledgeAgent",
                "Returns, policies, support, reference info",
                tools.policy,
            ),
        ];
        for (id, agent_name, domain, agent_tools) in declared {
            match id {
                Some(id) => specialists.push(SpecialistSpec {
                    reference: AgentRef::by_id(id.clone(), agent_name),
                    domain: domain.to_string(),
                    tools: agent_tools,
                }),
                None => warn!(agent = agent_name, "no agent id configured, omitting"),
            }
        }

        let graph = resolve_graph(
            catalog,
            RemoteAgentSpec {
                reference: AgentRef::by_id(entry_id.clone(), "TriageAgent"),
                tools: vec![],
            },
            specialists,
        )
        .await?;

        Ok(Self::new(name, Arc::new(graph), model).with_config(config.runtime_config()))
    }
}

/// Tools to bind to each resolved remote specialist.
#[derive(Default)]
pub struct RemoteToolset {
    pub product: Vec<Arc<dyn Tool>>,
    pub order: Vec<Arc<dyn Tool>>,
    pub policy: Vec<Arc<dyn Tool>>,
}

#[async_trait]
impl Backend for GraphBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, session: &Session, user_text: &str) -> Result<TurnOutcome> {
        self.runtime.execute_turn(session, user_text).await
    }
}

/// Keyword lists used to score a message toward one specialist.
struct RouteSpec {
    agent: String,
    keywords: &'static [&'static str],
    /// Phrases that route here immediately, before any scoring.
    phrases: &'static [&'static str],
}

const PRODUCT_KEYWORDS: &[&str] = &[
    "paint", "color", "colour", "blue", "red", "green", "white", "black", "shade", "tone",
    "finish", "product", "item", "buy", "purchase", "price", "cost", "recommend", "suggest",
    "sample", "interior", "exterior", "primer", "coating", "sku",
];

const PRODUCT_PHRASES: &[&str] = &["what products", "what do you offer", "show me products"];

const POLICY_KEYWORDS: &[&str] = &[
    "return", "refund", "exchange", "policy", "warranty", "problem", "issue", "complaint",
    "damaged", "leaking", "ship", "delivery", "shipping", "help", "support", "contact",
    "guarantee", "coverage", "defect", "cancel",
];

const POLICY_PHRASES: &[&str] = &["return policy", "warranty", "refund", "damaged"];

const ORDER_KEYWORDS: &[&str] = &["order", "status", "tracking", "track", "ord-"];

const ORDER_PHRASES: &[&str] = &["order status", "my order", "status of order"];

/// A single-shot classifier backend: routes each message to one specialist
/// by keyword scoring and runs that agent alone, with its tools but without
/// hand-offs.
pub struct ClassifierBackend {
    name: String,
    runtime: OrchestrationRuntime,
    routes: Vec<RouteSpec>,
    default_agent: String,
}

impl ClassifierBackend {
    /// Build from a flat (edge-less) agent graph. `product`, `order`, and
    /// `policy` name the agents handling each intent; `default_agent`
    /// receives everything that scores nowhere.
    pub fn new(
        name: impl Into<String>,
        graph: Arc<HandoffGraph>,
        model: Arc<dyn CompletionModel>,
        product: impl Into<String>,
        order: impl Into<String>,
        policy: impl Into<String>,
    ) -> Self {
        let product = product.into();
        let routes = vec![
            RouteSpec {
                agent: order.into(),
                keywords: ORDER_KEYWORDS,
                phrases: ORDER_PHRASES,
            },
            RouteSpec {
                agent: policy.into(),
                keywords: POLICY_KEYWORDS,
                phrases: POLICY_PHRASES,
            },
            RouteSpec {
                agent: product.clone(),
                keywords: PRODUCT_KEYWORDS,
                phrases: PRODUCT_PHRASES,
            },
        ];
        Self {
            name: name.into(),
            runtime: OrchestrationRuntime::new(graph, model),
            routes,
            default_agent: product,
        }
    }

    /// Pick the target agent for a message. Phrase matches win outright, in
    /// route-priority order; otherwise the highest keyword score wins, and
    /// general queries default to product lookup.
    fn route(&self, user_text: &str) -> &str {
        let query = user_text.to_lowercase();

        for route in &self.routes {
            if route.phrases.iter().any(|p| query.contains(p)) {
                debug!(agent = %route.agent, "classifier phrase match");
                return &route.agent;
            }
        }

        let mut best: Option<(&str, usize)> = None;
        for route in &self.routes {
            let score = route
                .keywords
                .iter()
                .filter(|k| query.contains(*k))
                .count();
            if score > 0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((&route.agent, score));
            }
        }

        match best {
            Some((agent, score)) => {
                debug!(agent = %agent, score, "classifier keyword match");
                agent
            }
            None => {
                debug!(agent = %self.default_agent, "classifier default route");
                &self.default_agent
            }
        }
    }
}

#[async_trait]
impl Backend for ClassifierBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, session: &Session, user_text: &str) -> Result<TurnOutcome> {
        // Follow-ups stay with the specialist that asked; fresh intents are
        // re-routed by keyword.
        let start = match session.last_active_agent.as_deref() {
            Some(last) if self.runtime.graph().agent(last).is_some() => last.to_string(),
            _ => self.route(user_text).to_string(),
        };
        self.runtime
            .execute_turn_from(&start, session, user_text)
            .await
    }
}

/// Tries backends strictly in priority order and never fails.
pub struct BackendSelector {
    backends: Vec<Arc<dyn Backend>>,
}

impl BackendSelector {
    pub fn new(backends: Vec<Arc<dyn Backend>>) -> Self {
        Self { backends }
    }

    pub fn push(&mut self, backend: Arc<dyn Backend>) {
        self.backends.push(backend);
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Resolve one turn. Exactly one backend's result is used; a failing
    /// backend is logged and the next is tried; total exhaustion yields the
    /// static fallback reply.
    pub async fn resolve(&self, session: &Session, user_text: &str) -> TurnOutcome {
        for backend in &self.backends {
            if !backend.is_configured() {
                debug!(backend = backend.name(), "skipping unconfigured backend");
                continue;
            }
            match backend.execute(session, user_text).await {
                Ok(outcome) => {
                    info!(backend = backend.name(), "turn served");
                    return outcome;
                }
                Err(e) => {
                    warn!(
                        backend = backend.name(),
                        error = %e,
                        "backend failed, falling through"
                    );
                }
            }
        }

        warn!("all backends failed, returning static fallback");
        let text = FALLBACK_TEXT.to_string();
        let apology = Message {
            role: Role::Assistant,
            author: None,
            content: text.clone(),
            tool_calls: vec![],
            tool_results: vec![],
            created_at: chrono::Utc::now(),
        };
        TurnOutcome {
            text: text.clone(),
            messages: vec![text],
            awaiting_user: false,
            last_agent: None,
            transcript: vec![Message::user(user_text), apology],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::completion::{AgentReply, ScriptedModel};
    use crate::error::OrchestratorError;
    use pretty_assertions::assert_eq;

    fn flat_graph() -> Arc<HandoffGraph> {
        Arc::new(
            HandoffGraph::builder()
                .entry_agent(Agent::simple("ProductLookupAgent", "Find products."))
                .agent(Agent::simple("OrderStatusAgent", "Check orders."))
                .agent(Agent::simple("KnowledgeAgent", "Answer policy questions."))
                .build()
                .unwrap(),
        )
    }

    fn classifier(model: Arc<ScriptedModel>) -> ClassifierBackend {
        ClassifierBackend::new(
            "single-shot-classifier",
            flat_graph(),
            model,
            "ProductLookupAgent",
            "OrderStatusAgent",
            "KnowledgeAgent",
        )
    }

    #[test]
    fn test_classifier_routing() {
        let backend = classifier(Arc::new(ScriptedModel::new(vec![])));

        assert_eq!(backend.route("I need blue paint for my bedroom"), "ProductLookupAgent");
        assert_eq!(backend.route("What's your return policy?"), "KnowledgeAgent");
        assert_eq!(backend.route("status of order ORD-123"), "OrderStatusAgent");
        assert_eq!(backend.route("what do you offer today"), "ProductLookupAgent");
        // Nothing matches: default to product lookup.
        assert_eq!(backend.route("hello there"), "ProductLookupAgent");
    }

    #[tokio::test]
    async fn test_classifier_executes_routed_agent() {
        let model = Arc::new(ScriptedModel::new(vec![AgentReply::Message(
            "Our warranty covers two years.".to_string(),
        )]));
        let backend = classifier(model.clone());

        let outcome = backend
            .execute(&Session::new("s1"), "warranty question")
            .await
            .unwrap();
        assert_eq!(outcome.text, "Our warranty covers two years.");
        assert_eq!(model.calls.lock().unwrap()[0].0, "KnowledgeAgent");
    }

    #[tokio::test]
    async fn test_classifier_sticks_with_last_active_agent() {
        let model = Arc::new(ScriptedModel::new(vec![AgentReply::Message(
            "Still looking into it.".to_string(),
        )]));
        let backend = classifier(model.clone());

        let mut session = Session::new("s1");
        session.last_active_agent = Some("OrderStatusAgent".to_string());

        // "paint" would normally route to products; the follow-up stays put.
        backend.execute(&session, "the paint order").await.unwrap();
        assert_eq!(model.calls.lock().unwrap()[0].0, "OrderStatusAgent");
    }

    struct FailingBackend;

    #[async_trait]
    impl Backend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }
        async fn execute(&self, _: &Session, _: &str) -> Result<TurnOutcome> {
            Err(OrchestratorError::BackendExecution {
                message: "boom".to_string(),
            })
        }
    }

    struct UnconfiguredBackend;

    #[async_trait]
    impl Backend for UnconfiguredBackend {
        fn name(&self) -> &str {
            "unconfigured"
        }
        fn is_configured(&self) -> bool {
            false
        }
        async fn execute(&self, _: &Session, _: &str) -> Result<TurnOutcome> {
            panic!("must never run");
        }
    }

    struct OkBackend;

    #[async_trait]
    impl Backend for OkBackend {
        fn name(&self) -> &str {
            "ok"
        }
        async fn execute(&self, _: &Session, _: &str) -> Result<TurnOutcome> {
            Ok(TurnOutcome {
                text: "served".to_string(),
                messages: vec!["served".to_string()],
                awaiting_user: false,
                last_agent: Some("OkAgent".to_string()),
                transcript: vec![],
            })
        }
    }

    #[tokio::test]
    async fn test_selector_falls_through_to_working_backend() {
        let selector = BackendSelector::new(vec![
            Arc::new(UnconfiguredBackend),
            Arc::new(FailingBackend),
            Arc::new(OkBackend),
        ]);

        let outcome = selector.resolve(&Session::new("s1"), "hi").await;
        assert_eq!(outcome.text, "served");
        assert_eq!(outcome.last_agent.as_deref(), Some("OkAgent"));
    }

    #[tokio::test]
    async fn test_selector_exhaustion_returns_static_fallback() {
        let selector =
            BackendSelector::new(vec![Arc::new(FailingBackend), Arc::new(FailingBackend)]);

        let outcome = selector.resolve(&Session::new("s1"), "hi").await;
        assert_eq!(outcome.text, FALLBACK_TEXT);
        assert_eq!(outcome.messages, vec![FALLBACK_TEXT.to_string()]);
        assert!(!outcome.awaiting_user);
        assert!(outcome.last_agent.is_none());
    }

    #[tokio::test]
    async fn test_from_remote_config_gates_on_agent_ids() {
        use crate::catalog::{AgentDefinition, StaticCatalog};

        let catalog = StaticCatalog::new(vec![
            AgentDefinition {
                id: "asst_entry".to_string(),
                name: "TriageAgent".to_string(),
                instructions: "Route requests.".to_string(),
            },
            AgentDefinition {
                id: "asst_orders".to_string(),
                name: "OrderStatusAgent".to_string(),
                instructions: "Check orders.".to_string(),
            },
        ]);

        let mut config = OrchestratorConfig::default();
        config.orchestrator_agent_id = Some("asst_entry".to_string());
        config.order_agent_id = Some("asst_orders".to_string());
        // No product or knowledge ids: those specialists are omitted.

        let model: Arc<dyn CompletionModel> = Arc::new(ScriptedModel::new(vec![]));
        let backend = GraphBackend::from_remote_config(
            "remote-agent-platform",
            &config,
            &catalog,
            model.clone(),
            RemoteToolset::default(),
        )
        .await
        .unwrap();

        let graph = backend.runtime.graph();
        assert_eq!(graph.agent_names(), vec!["OrderStatusAgent", "TriageAgent"]);
        assert!(graph.is_reachable("TriageAgent", "OrderStatusAgent"));

        // Without an entry id the build is fatal.
        config.orchestrator_agent_id = None;
        let err = GraphBackend::from_remote_config(
            "remote-agent-platform",
            &config,
            &catalog,
            model,
            RemoteToolset::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OrchestratorError::AgentResolution { .. }));
    }

    #[tokio::test]
    async fn test_selector_uses_first_working_backend_only() {
        let model = Arc::new(ScriptedModel::new(vec![AgentReply::Message(
            "from graph".to_string(),
        )]));
        let graph_backend = GraphBackend::new("local-handoff-graph", flat_graph(), model);
        let selector = BackendSelector::new(vec![Arc::new(graph_backend), Arc::new(OkBackend)]);

        let outcome = selector.resolve(&Session::new("s1"), "hi").await;
        assert_eq!(outcome.text, "from graph");
    }
}
