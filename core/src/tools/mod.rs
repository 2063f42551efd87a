pub mod availability;

use async_trait::async_trait;
use schemars::{gen::SchemaSettings, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error};

use crate::{
    completion::{StateError, StateMap},
    slots::SlotError,
};

pub use availability::{
    availability_tools, AvailabilityByDoctorTool, AvailabilityBySpecializationTool,
    AvailabilityTool, DateArg,
};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn args(&self) -> &[ToolArg];

    /// Run the tool with the JSON encoded arguments the model produced
    async fn call(&self, args: &str, states: &StateMap) -> Result<Value, ToolError>;

    fn default_serializer(&self) -> Value {
        let parameters = build_parameters_schema(self.args());
        json!({
            "type": "function",
            "function": {
                "name": self.name(),
                "strict": true,
                "description": self.description(),
                "parameters": parameters
            }
        })
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid tool arguments: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error(transparent)]
    SlotError(#[from] SlotError),
    #[error("Tool state unavailable: {0}")]
    StateError(#[from] StateError),
}

pub enum ExecutionStrategy {
    FailEarly,
    BestEffort,
}

pub struct ToolSet(pub Vec<Box<dyn Tool>>, pub ExecutionStrategy);

#[derive(Debug, Error)]
pub enum ToolSetError {
    #[error("Failed to find tool `{0}`")]
    ToolNotFound(String),
    #[error("Client message history is empty")]
    EmptyMessageHistory,
    #[error("Last entry in client message history doesn't contain a ToolCall")]
    LastMessageNotAToolCall,
    #[error("Tool `{0}` failed: {1}")]
    ToolError(String, #[source] ToolError),
}

impl ToolSet {
    #[must_use]
    pub fn empty() -> Self {
        Self(vec![], ExecutionStrategy::FailEarly)
    }

    pub fn find_tool(&self, name: &str) -> Result<&dyn Tool, ToolSetError> {
        self.0
            .iter()
            .find(|t| t.name() == name)
            .map(|t| &**t)
            .ok_or_else(|| ToolSetError::ToolNotFound(name.to_string()))
    }

    pub fn add_tool(&mut self, tool: Box<dyn Tool>) {
        self.0.push(tool);
    }

    pub fn remove_tool(&mut self, name: &str) -> Result<(), ToolSetError> {
        let pos = self
            .0
            .iter()
            .position(|t| t.name() == name)
            .ok_or_else(|| ToolSetError::ToolNotFound(name.to_string()))?;
        self.0.remove(pos);
        Ok(())
    }

    #[must_use]
    pub fn list_tools(&self) -> Vec<&str> {
        self.0.iter().map(|t| t.name()).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub async fn call(
        &self,
        id: &str,
        name: &str,
        args: &str,
        states: &StateMap,
    ) -> Result<ToolResponse, ToolSetError> {
        let tool = self.find_tool(name)?;
        debug!(tool = name, args, "Calling tool");
        let v = tool.call(args, states).await.map_err(|e| {
            error!(tool = name, error = %e, "Tool call failed");
            ToolSetError::ToolError(name.to_string(), e)
        })?;
        Ok(ToolResponse {
            id: id.to_owned(),
            name: name.to_owned(),
            content: v,
        })
    }
}

pub struct ToolArg {
    name: String,
    schema: Value,
}

impl ToolArg {
    pub fn new<T: JsonSchema>(name: &str, description: &str) -> Self {
        let settings = SchemaSettings::default().with(|s| {
            s.inline_subschemas = true;
        });
        let generator = settings.into_generator();
        let schema = generator.into_root_schema_for::<T>();
        let mut schema_value = serde_json::to_value(&schema).unwrap_or_else(|_| json!({}));

        if let Some(obj) = schema_value.as_object_mut() {
            obj.remove("$schema");
            obj.remove("format");
            obj.remove("title");
            obj.insert("description".to_string(), json!(description));
        }
        process_json_value(&mut schema_value);

        ToolArg {
            name: name.to_string(),
            schema: schema_value,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn schema(&self) -> &Value {
        &self.schema
    }
}

fn process_json_value(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(obj) => {
            let fields_to_remove = ["$schema", "format", "title", "minimum"];
            fields_to_remove.iter().for_each(|&f| {
                if obj.get(f).is_some_and(|v| v.is_string() || v.is_number()) {
                    obj.remove(f);
                }
            });
            if let Some(v) = obj.get("oneOf").cloned() {
                obj.remove("oneOf");
                obj.insert("anyOf".to_string(), v);
            };

            if obj.contains_key("properties") {
                obj.insert("additionalProperties".to_string(), json!(false));
            }
            for (_, v) in obj.iter_mut() {
                process_json_value(v);
            }
        }
        serde_json::Value::Array(arr) => {
            for elem in arr.iter_mut() {
                process_json_value(elem);
            }
        }
        _ => {}
    }
}

/// Represents a tool call requested by the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Represents the output of a tool execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub id: String,
    pub name: String,
    pub content: serde_json::Value,
}

impl ToolResponse {
    /// The output as plain text, string outputs are returned without JSON quoting
    #[must_use]
    pub fn text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

pub fn build_parameters_schema(args: &[ToolArg]) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for arg in args {
        let mut schema = arg.schema.clone();
        if let Some(obj) = schema.as_object_mut() {
            obj.remove("minimum");
        }
        properties.insert(arg.name.clone(), schema);
        required.push(json!(arg.name));
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}
