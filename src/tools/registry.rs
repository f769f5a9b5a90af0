//! Static tool table
//!
//! Built once at startup and shared read-only by every session. Construction
//! fails fast on duplicate names or inconsistent schemas so a bad table never
//! serves traffic.

use async_trait::async_trait;
use rmcp::model::{Content, Tool};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ToolError;
use crate::tools::schema::{InputSchema, SchemaError, ValidatedArgs};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Tool registered twice: {0}")]
    DuplicateTool(String),

    #[error("Tool name must not be empty")]
    EmptyName,

    #[error("Invalid schema for tool {tool}: {source}")]
    InvalidSchema {
        tool: String,
        #[source]
        source: SchemaError,
    },
}

/// Capability behind a tool: validated arguments in, content or a domain
/// failure out.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: ValidatedArgs) -> Result<Vec<Content>, ToolError>;

    /// Verb phrase used to prefix failure messages ("fetching weather data").
    fn action(&self) -> &'static str {
        "running tool"
    }
}

#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: InputSchema,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDescriptor {
    pub fn new(
        name: &'static str,
        description: &'static str,
        schema: InputSchema,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name,
            description,
            schema,
            handler,
        }
    }

    /// Definition advertised by `tools/list`.
    pub fn info(&self) -> Tool {
        Tool {
            name: self.name.into(),
            description: Some(self.description.into()),
            input_schema: Arc::new(self.schema.to_json_schema()),
            annotations: None,
            title: None,
            icons: None,
            output_schema: None,
        }
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Read-only registry of tool descriptors, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    /// Build the registry, checking every schema once.
    pub fn new(tools: Vec<ToolDescriptor>) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(tools.len());
        for (position, tool) in tools.iter().enumerate() {
            if tool.name.is_empty() {
                return Err(RegistryError::EmptyName);
            }
            tool.schema
                .check()
                .map_err(|source| RegistryError::InvalidSchema {
                    tool: tool.name.to_string(),
                    source,
                })?;
            if index.insert(tool.name, position).is_some() {
                return Err(RegistryError::DuplicateTool(tool.name.to_string()));
            }
            tracing::debug!(tool = tool.name, "Registered tool");
        }

        Ok(Self { tools, index })
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn list(&self) -> Vec<Tool> {
        self.tools.iter().map(ToolDescriptor::info).collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tools.iter().map(|t| t.name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
