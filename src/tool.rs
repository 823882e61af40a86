//! Tool system: the bridge between agents and domain plugins
//!
//! Tools are the only way an agent touches the outside world. The bridge
//! exposes one uniform contract — `invoke(name, args) -> JSON | ToolError` —
//! and every failure, including an unknown tool name, comes back as a
//! `ToolError` value that the calling agent sees as a normal result. A tool
//! failure never aborts the orchestration run.

use async_trait::async_trait;
use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Classification of tool failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorKind {
    /// The requested tool name is not bound to the invoking agent.
    NotFound,
    /// The arguments did not satisfy the tool's declared signature.
    InvalidArguments,
    /// The external collaborator behind the tool failed.
    Collaborator,
}

/// A recoverable tool failure, surfaced to the agent as a normal result.
#[derive(Debug, Clone)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn not_found(name: &str) -> Self {
        Self {
            kind: ToolErrorKind::NotFound,
            message: format!("unknown tool '{}'", name),
        }
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self {
            kind: ToolErrorKind::InvalidArguments,
            message: message.into(),
        }
    }

    pub fn collaborator(message: impl Into<String>) -> Self {
        Self {
            kind: ToolErrorKind::Collaborator,
            message: message.into(),
        }
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ToolError {}

/// Trait for all tools an agent can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the name of the tool
    fn name(&self) -> &str;

    /// Get the description of the tool
    fn description(&self) -> &str;

    /// Get the JSON schema for the tool's parameters
    fn parameters_schema(&self) -> Value;

    /// Invoke the tool with the given arguments
    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError>;
}

/// A tool built from a typed async handler.
///
/// The parameter schema is derived from the argument struct, so the
/// declared signature and the deserialization path cannot drift apart.
pub struct TypedTool {
    name: String,
    description: String,
    parameters_schema: Value,
    handler: Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync>,
}

impl fmt::Debug for TypedTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

#[async_trait]
impl Tool for TypedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.parameters_schema.clone()
    }

    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError> {
        (self.handler)(arguments).await
    }
}

/// Create a tool from a typed handler.
/// - `A` is the argument struct (`Deserialize` + `JsonSchema`)
/// - `R` is the output type (`Serialize`)
pub fn typed_tool<A, R, H, Fut>(
    name: impl Into<String>,
    description: impl Into<String>,
    handler: H,
) -> Arc<dyn Tool>
where
    A: DeserializeOwned + JsonSchema + Send + 'static,
    R: Serialize + Send + 'static,
    H: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<R, ToolError>> + Send + 'static,
{
    let schema = schemars::schema_for!(A);
    let parameters_schema =
        serde_json::to_value(schema.schema).expect("argument schema is serializable");
    let handler = Arc::new(handler);
    let erased: Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync> =
        Arc::new(move |raw: Value| {
            let handler = handler.clone();
            Box::pin(async move {
                let args: A = serde_json::from_value(raw)
                    .map_err(|e| ToolError::invalid_arguments(e.to_string()))?;
                let out = handler(args).await?;
                serde_json::to_value(out)
                    .map_err(|e| ToolError::collaborator(format!("unserializable output: {}", e)))
            })
        });
    Arc::new(TypedTool {
        name: name.into(),
        description: description.into(),
        parameters_schema,
        handler: erased,
    })
}

/// Dispatches tool calls by name across the tools bound to one agent.
///
/// The bridge is stateless and performs no caching; any state lives in the
/// external collaborator a tool wraps.
#[derive(Clone, Default)]
pub struct ToolBridge {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolBridge {
    pub fn new(tools: &[Arc<dyn Tool>]) -> Self {
        let tools = tools
            .iter()
            .map(|t| (t.name().to_string(), t.clone()))
            .collect();
        Self { tools }
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invoke a tool by name. Unknown names fail with
    /// [`ToolErrorKind::NotFound`]; collaborator failures come back as
    /// values, never as panics or fatal errors.
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        match self.tools.get(name) {
            Some(tool) => tool.invoke(arguments).await,
            None => Err(ToolError::not_found(name)),
        }
    }
}

impl fmt::Debug for ToolBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        f.debug_struct("ToolBridge").field("tools", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct EchoArgs {
        text: String,
    }

    fn echo_tool() -> Arc<dyn Tool> {
        typed_tool("echo", "Echoes the input text", |args: EchoArgs| async move {
            Ok(serde_json::json!({ "echo": args.text }))
        })
    }

    #[tokio::test]
    async fn test_typed_tool_invocation() {
        let tool = echo_tool();
        assert_eq!(tool.name(), "echo");
        assert_eq!(tool.description(), "Echoes the input text");

        let schema = tool.parameters_schema();
        assert!(schema["properties"]["text"].is_object());

        let out = tool
            .invoke(serde_json::json!({"text": "hello"}))
            .await
            .unwrap();
        assert_eq!(out, serde_json::json!({"echo": "hello"}));
    }

    #[tokio::test]
    async fn test_typed_tool_rejects_bad_arguments() {
        let tool = echo_tool();
        let err = tool
            .invoke(serde_json::json!({"wrong": 42}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::InvalidArguments);
    }

    #[tokio::test]
    async fn test_bridge_unknown_tool_is_not_found() {
        let bridge = ToolBridge::new(&[echo_tool()]);
        let err = bridge
            .invoke("no_such_tool", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::NotFound);
        assert!(err.message.contains("no_such_tool"));
    }

    #[tokio::test]
    async fn test_bridge_dispatches_by_name() {
        let bridge = ToolBridge::new(&[echo_tool()]);
        let out = bridge
            .invoke("echo", serde_json::json!({"text": "hi"}))
            .await
            .unwrap();
        assert_eq!(out["echo"], "hi");
    }

    #[tokio::test]
    async fn test_collaborator_failure_is_a_value() {
        let failing = typed_tool("flaky", "Always fails", |_: EchoArgs| async move {
            Err::<Value, _>(ToolError::collaborator("connection refused"))
        });
        let bridge = ToolBridge::new(&[failing]);
        let err = bridge
            .invoke("flaky", serde_json::json!({"text": "x"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::Collaborator);
        assert_eq!(err.message, "connection refused");
    }
}
