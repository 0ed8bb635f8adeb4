pub mod spending;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use crate::error::{SchemaError, ToolError};

/// What a tool hands back: the decoded API payload, or a human-readable
/// message. Failures at the invocation boundary are `Text` starting with
/// `Error:`.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutcome {
    Json(Value),
    Text(String),
}

impl ToolOutcome {
    pub(crate) fn error(err: impl std::fmt::Display) -> Self {
        Self::Text(format!("Error: {err}"))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Text(text) if text.starts_with("Error:"))
    }

    /// Pretty-printed JSON, or the message as-is.
    pub fn into_text(self) -> String {
        match self {
            Self::Json(value) => {
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
            }
            Self::Text(text) => text,
        }
    }
}

type DynDependency = Arc<dyn Any + Send + Sync>;
type ToolHandler = dyn Fn(Value, &DependencyMap) -> BoxFuture<'static, Result<ToolOutcome, ToolError>>
    + Send
    + Sync;

/// Type-keyed shared state handed to every tool handler.
#[derive(Clone, Default, Debug)]
pub struct DependencyMap {
    typed: Arc<RwLock<HashMap<TypeId, DynDependency>>>,
}

impl DependencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T>(&self, value: T)
    where
        T: Send + Sync + 'static,
    {
        let mut typed = self.typed.write().unwrap_or_else(PoisonError::into_inner);
        typed.insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let typed = self.typed.read().unwrap_or_else(PoisonError::into_inner);
        let value = typed.get(&TypeId::of::<T>())?.clone();
        Arc::downcast::<T>(value).ok()
    }
}

#[derive(Clone)]
pub struct ToolSpec {
    name: String,
    description: String,
    json_schema: Value,
    handler: Arc<ToolHandler>,
}

impl std::fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("json_schema", &self.json_schema)
            .finish()
    }
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        let unconfigured = name.clone();
        Self {
            name,
            description: description.into(),
            json_schema: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": [],
                "additionalProperties": true,
            }),
            handler: Arc::new(move |_args, _deps| {
                let name = unconfigured.clone();
                Box::pin(async move { Err(ToolError::Unconfigured(name)) })
            }),
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Result<Self, SchemaError> {
        validate_schema(&schema)?;
        self.json_schema = schema;
        Ok(self)
    }

    pub fn with_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Value, &DependencyMap) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutcome, ToolError>> + Send + 'static,
    {
        self.handler = Arc::new(move |args, deps| Box::pin(handler(args, deps)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn json_schema(&self) -> &Value {
        &self.json_schema
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.json_schema.clone(),
        }
    }

    pub async fn execute(
        &self,
        args: Value,
        dependencies: &DependencyMap,
    ) -> Result<ToolOutcome, ToolError> {
        validate_arguments(self.name(), &self.json_schema, &args)?;
        (self.handler)(args, dependencies).await
    }
}

/// Name, description and argument schema, as advertised to callers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A set of uniquely named tools sharing one dependency map.
#[derive(Clone, Debug)]
pub struct ToolRegistry {
    tools: Vec<ToolSpec>,
    tool_map: HashMap<String, usize>,
    dependencies: DependencyMap,
}

impl ToolRegistry {
    pub fn new(tools: Vec<ToolSpec>, dependencies: DependencyMap) -> Result<Self, ToolError> {
        let mut tool_map = HashMap::new();
        for (index, tool) in tools.iter().enumerate() {
            if tool_map.insert(tool.name().to_string(), index).is_some() {
                return Err(ToolError::Duplicate(tool.name().to_string()));
            }
        }

        Ok(Self {
            tools,
            tool_map,
            dependencies,
        })
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tool_map.get(name).map(|index| &self.tools[*index])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(ToolSpec::name)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(ToolSpec::definition).collect()
    }

    pub fn dependencies(&self) -> &DependencyMap {
        &self.dependencies
    }

    /// Runs `name` with `args`. Never fails: unknown tools, schema
    /// violations and handler errors all come back as `Error:` text.
    pub async fn call(&self, name: &str, args: Value) -> ToolOutcome {
        let Some(tool) = self.get(name) else {
            tracing::warn!(tool = name, "unknown tool requested");
            return ToolOutcome::error(ToolError::NotFound(name.to_string()));
        };

        tracing::info!(tool = name, "invoking tool");
        match tool.execute(args, &self.dependencies).await {
            Ok(outcome) => {
                if outcome.is_error() {
                    tracing::debug!(tool = name, "tool reported an error");
                }
                outcome
            }
            Err(err) => {
                tracing::warn!(tool = name, error = %err, "tool invocation failed");
                ToolOutcome::error(err)
            }
        }
    }
}

fn validate_schema(schema: &Value) -> Result<(), SchemaError> {
    let schema_obj = schema.as_object().ok_or(SchemaError::SchemaNotObject)?;

    let root_type = schema_obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or(SchemaError::RootTypeMustBeObject)?;

    if root_type != "object" {
        return Err(SchemaError::RootTypeMustBeObject);
    }

    if let Some(required) = schema_obj.get("required") {
        let required_arr = required.as_array().ok_or(SchemaError::InvalidRequired)?;
        for item in required_arr {
            if !item.is_string() {
                return Err(SchemaError::InvalidRequired);
            }
        }
    }

    Ok(())
}

fn validate_arguments(tool_name: &str, schema: &Value, args: &Value) -> Result<(), ToolError> {
    let args_obj = args
        .as_object()
        .ok_or_else(|| ToolError::InvalidArguments {
            tool: tool_name.to_string(),
            message: "arguments must be a JSON object".to_string(),
        })?;

    let schema_obj = schema
        .as_object()
        .ok_or_else(|| ToolError::InvalidArguments {
            tool: tool_name.to_string(),
            message: "tool schema must be a JSON object".to_string(),
        })?;

    if let Some(required) = schema_obj.get("required").and_then(Value::as_array) {
        for field in required {
            let Some(field_name) = field.as_str() else {
                continue;
            };
            if !args_obj.contains_key(field_name) {
                return Err(ToolError::InvalidArguments {
                    tool: tool_name.to_string(),
                    message: format!("missing required field: {field_name}"),
                });
            }
        }
    }

    let empty = serde_json::Map::new();
    let properties = schema_obj
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    if schema_obj
        .get("additionalProperties")
        .and_then(Value::as_bool)
        == Some(false)
    {
        for key in args_obj.keys() {
            if !properties.contains_key(key) {
                return Err(ToolError::InvalidArguments {
                    tool: tool_name.to_string(),
                    message: format!("unknown field: {key}"),
                });
            }
        }
    }

    for (key, value) in args_obj {
        let Some(declared) = properties.get(key).and_then(|field| field.get("type")) else {
            continue;
        };
        let allowed = declared_types(declared);
        if !allowed.is_empty() && !allowed.iter().any(|name| value_matches_type(value, name)) {
            return Err(ToolError::InvalidArguments {
                tool: tool_name.to_string(),
                message: format!("field '{key}' must be of type {}", allowed.join(" or ")),
            });
        }
    }

    Ok(())
}

/// `"type": "string"` or `"type": ["string", "integer"]`.
fn declared_types(declared: &Value) -> Vec<&str> {
    match declared {
        Value::String(name) => vec![name.as_str()],
        Value::Array(names) => names.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn value_matches_type(value: &Value, type_name: &str) -> bool {
    match type_name {
        "string" => value.is_string(),
        "integer" => value.as_i64().is_some() || value.as_u64().is_some(),
        "number" => value.as_f64().is_some(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn echo_tool(name: &str) -> ToolSpec {
        ToolSpec::new(name, "echo the value back")
            .with_schema(json!({
                "type": "object",
                "properties": {"value": {"type": ["string", "integer"]}},
                "required": ["value"],
                "additionalProperties": false
            }))
            .expect("schema valid")
            .with_handler(|args, _deps| async move { Ok(ToolOutcome::Json(args)) })
    }

    #[test]
    fn schema_validation_rejects_non_object_root() {
        let result = ToolSpec::new("bad", "bad").with_schema(json!({"type": "string"}));
        assert!(result.is_err());

        let result = ToolSpec::new("bad", "bad")
            .with_schema(json!({"type": "object", "required": [1]}));
        assert!(matches!(result, Err(SchemaError::InvalidRequired)));
    }

    #[tokio::test]
    async fn dependencies_are_visible_to_handlers() {
        let deps = DependencyMap::new();
        deps.insert::<u32>(9);

        let tool = ToolSpec::new("read", "read dep")
            .with_schema(json!({
                "type": "object",
                "properties": {},
                "required": [],
                "additionalProperties": false
            }))
            .expect("schema should be valid")
            .with_handler(|_args, deps| {
                let value = deps.get::<u32>().ok_or(ToolError::MissingDependency("u32"));
                async move { value.map(|value| ToolOutcome::Text(value.to_string())) }
            });

        let outcome = tool.execute(json!({}), &deps).await.expect("tool executes");
        assert_eq!(outcome, ToolOutcome::Text("9".to_string()));

        let err = tool
            .execute(json!({}), &DependencyMap::new())
            .await
            .expect_err("missing dependency");
        assert!(matches!(err, ToolError::MissingDependency("u32")));
    }

    #[tokio::test]
    async fn argument_validation_reports_missing_required() {
        let err = echo_tool("req")
            .execute(json!({}), &DependencyMap::new())
            .await
            .expect_err("should fail");

        let message = err.to_string();
        assert!(message.contains("missing required field"));
    }

    #[tokio::test]
    async fn type_lists_accept_any_listed_type() {
        let tool = echo_tool("multi");
        let deps = DependencyMap::new();

        assert!(tool.execute(json!({"value": "a"}), &deps).await.is_ok());
        assert!(tool.execute(json!({"value": 7}), &deps).await.is_ok());

        let err = tool
            .execute(json!({"value": true}), &deps)
            .await
            .expect_err("boolean not allowed");
        assert!(err.to_string().contains("string or integer"));
    }

    #[test]
    fn registry_rejects_duplicate_names() {
        let err = ToolRegistry::new(vec![echo_tool("a"), echo_tool("a")], DependencyMap::new())
            .expect_err("duplicate");
        assert!(matches!(err, ToolError::Duplicate(name) if name == "a"));
    }

    #[tokio::test]
    async fn registry_call_never_fails() {
        let registry = ToolRegistry::new(
            vec![echo_tool("echo"), ToolSpec::new("empty", "no handler")],
            DependencyMap::new(),
        )
        .expect("unique names");

        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["echo", "empty"]
        );
        assert_eq!(registry.definitions()[0].name, "echo");

        let outcome = registry.call("echo", json!({"value": "x"})).await;
        assert_eq!(outcome, ToolOutcome::Json(json!({"value": "x"})));

        let outcome = registry.call("missing", json!({})).await;
        assert_eq!(
            outcome,
            ToolOutcome::Text("Error: tool not found: missing".to_string())
        );

        let outcome = registry.call("echo", json!({"other": 1})).await;
        assert!(outcome.is_error());

        let outcome = registry.call("empty", json!({})).await;
        assert_eq!(
            outcome,
            ToolOutcome::Text("Error: tool handler not configured: empty".to_string())
        );
    }

    #[test]
    fn outcome_text_rendering() {
        assert_eq!(ToolOutcome::Text("hi".into()).into_text(), "hi");
        assert_eq!(
            ToolOutcome::Json(json!({"a": 1})).into_text(),
            "{\n  \"a\": 1\n}"
        );
        assert!(!ToolOutcome::Text("fine".into()).is_error());
    }
}
