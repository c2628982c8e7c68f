//! Rule expression generation on top of the agentic loop.

use crate::agent::Agent;
use crate::model::Backend;
use crate::tools::ToolHost;
use crate::{Error, Result};

const SYSTEM_PROMPT: &str = "\
You are an expert in writing rule expressions for a request-filtering engine. \
Expressions combine fields with comparison operators (eq, ne, contains, \
matches, in, ==, !=, <, >) and logical operators (and, or, not), with \
parentheses for grouping. Use only the fields listed below. Respond with the \
expression only: no explanation, no markdown.";

/// Turns natural-language instructions into rule expressions.
pub struct ExpressionGenerator<B, H> {
    agent: Agent<B, H>,
}

impl<B: Backend, H: ToolHost> ExpressionGenerator<B, H> {
    pub fn new(backend: B, tools: H) -> Self {
        Self {
            agent: Agent::new(backend, tools),
        }
    }

    pub fn from_agent(agent: Agent<B, H>) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &Agent<B, H> {
        &self.agent
    }

    /// Write a new expression for `instruction` against the fields in `schema`.
    pub async fn generate_expression(&self, schema: &str, instruction: &str) -> Result<String> {
        let instruction = non_empty(instruction, "instruction")?;
        let system = system_prompt(schema);
        let user = format!("Write a rule expression that matches: {instruction}");
        self.agent.generate(&system, &user).await
    }

    /// Rewrite `current` according to `instruction`.
    pub async fn modify_expression(
        &self,
        schema: &str,
        current: &str,
        instruction: &str,
    ) -> Result<String> {
        let current = non_empty(current, "current expression")?;
        let instruction = non_empty(instruction, "instruction")?;
        self.agent
            .modify(&system_prompt(schema), current, instruction)
            .await
    }
}

fn system_prompt(schema: &str) -> String {
    let schema = schema.trim();
    if schema.is_empty() {
        SYSTEM_PROMPT.to_string()
    } else {
        format!("{SYSTEM_PROMPT}\n\nAvailable fields:\n{schema}")
    }
}

fn non_empty<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Config(format!("{what} must not be empty")));
    }
    Ok(value)
}
