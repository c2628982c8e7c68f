//! The agentic loop: alternate model turns and tool calls until the model
//! produces a final answer.

use tracing::{debug, warn};

use crate::clean::clean_output;
use crate::model::{Backend, Message, ModelRequest, ToolCall, ToolResult};
use crate::tools::ToolHost;
use crate::{Error, Result};

/// Maximum number of model requests for one generation.
pub const MAX_ITERATIONS: usize = 10;

/// Appended to the system prompt when tools are advertised.
pub const TOOL_USAGE_ADDENDUM: &str = "\
You have access to tools that can look up information about the target \
system, such as available fields, lists and existing rules. Call them when \
you need facts you do not have. Once you have what you need, reply with the \
final answer only.";

/// Drives a conversation against one backend and one tool host.
pub struct Agent<B, H> {
    backend: B,
    tools: H,
    max_iterations: usize,
}

impl<B: Backend, H: ToolHost> Agent<B, H> {
    pub fn new(backend: B, tools: H) -> Self {
        Self {
            backend,
            tools,
            max_iterations: MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn tools(&self) -> &H {
        &self.tools
    }

    /// Produce new text from a system and user prompt.
    pub async fn generate(&self, system: &str, user: &str) -> Result<String> {
        self.run(system, user).await
    }

    /// Rewrite `current` according to `instruction`.
    pub async fn modify(&self, system: &str, current: &str, instruction: &str) -> Result<String> {
        let user = format!(
            "Current expression:\n{current}\n\nModify it as follows: {instruction}\n\n\
             Respond with the complete updated expression only."
        );
        self.run(system, &user).await
    }

    async fn run(&self, system: &str, user: &str) -> Result<String> {
        let tools = self.tools.specs();
        let system = if tools.is_empty() {
            system.to_string()
        } else {
            format!("{system}\n\n{TOOL_USAGE_ADDENDUM}")
        };

        let mut messages = vec![Message::user(user)];

        for turn in 1..=self.max_iterations {
            let response = self
                .backend
                .call(ModelRequest {
                    system: Some(&system),
                    messages: &messages,
                    tools,
                })
                .await?;

            let calls = response.message.tool_calls();
            debug!(
                turn,
                tool_calls = calls.len(),
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                "model turn"
            );

            if calls.is_empty() {
                return Ok(clean_output(&response.message.text()));
            }

            messages.push(response.message);

            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                results.push(self.run_tool(call).await);
            }
            messages.push(Message::tool_results(results));
        }

        Err(Error::IterationLimit {
            max: self.max_iterations,
        })
    }

    /// Exactly one result per call, tagged with the call's id.
    async fn run_tool(&self, call: &ToolCall) -> ToolResult {
        match self.tools.execute(call).await {
            Ok(output) => {
                debug!(tool = %call.name, id = %call.id, "tool succeeded");
                ToolResult::success(&call.id, output)
            }
            Err(e) => {
                warn!(tool = %call.name, id = %call.id, error = %e, "tool failed");
                ToolResult::failure(&call.id, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelError, ModelResponse, Part, Role, ToolSpec, Usage};
    use crate::tools::{EmptyToolHost, ToolError};
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// A backend replaying canned replies and recording every request.
    #[derive(Default)]
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Message>>,
        requests: Mutex<Vec<(Option<String>, Vec<Message>, usize)>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Message>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::default(),
            }
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn request(&self, index: usize) -> (Option<String>, Vec<Message>, usize) {
            self.requests.lock().unwrap()[index].clone()
        }
    }

    impl Backend for ScriptedBackend {
        async fn call(&self, request: ModelRequest<'_>) -> std::result::Result<ModelResponse, ModelError> {
            self.requests.lock().unwrap().push((
                request.system.map(str::to_string),
                request.messages.to_vec(),
                request.tools.len(),
            ));
            let message = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ModelError::Api("script exhausted".into()))?;
            Ok(ModelResponse {
                message,
                usage: Usage::default(),
            })
        }
    }

    /// Tools answering from a fixed table; anything else fails.
    struct FakeTools {
        specs: Vec<ToolSpec>,
    }

    impl FakeTools {
        fn new(names: &[&str]) -> Self {
            Self {
                specs: names
                    .iter()
                    .map(|name| ToolSpec {
                        name: name.to_string(),
                        description: format!("{name} tool"),
                        input_schema: json!({"type": "object"}),
                    })
                    .collect(),
            }
        }
    }

    impl ToolHost for FakeTools {
        fn specs(&self) -> &[ToolSpec] {
            &self.specs
        }

        async fn execute(&self, call: &ToolCall) -> std::result::Result<String, ToolError> {
            match call.name.as_str() {
                "list_fields" => Ok("ip.src\nip.privacy.is_vpn".into()),
                "broken" => Err(ToolError::Execution("upstream down".into())),
                other => Err(ToolError::NotFound(other.into())),
            }
        }
    }

    fn tool_call(id: &str, name: &str) -> Message {
        Message {
            role: Role::Assistant,
            parts: vec![Part::ToolCall(ToolCall {
                id: id.into(),
                name: name.into(),
                input: Value::Null,
            })],
        }
    }

    #[tokio::test]
    async fn final_text_on_first_turn() {
        let backend = ScriptedBackend::new(vec![Message::assistant("ip.privacy.is_vpn == true")]);
        let agent = Agent::new(backend, EmptyToolHost);

        let out = agent.generate("system", "block VPNs").await.unwrap();

        assert_eq!(out, "ip.privacy.is_vpn == true");
        assert_eq!(agent.backend().calls(), 1);
    }

    #[tokio::test]
    async fn no_tools_means_no_addendum() {
        let backend = ScriptedBackend::new(vec![Message::assistant("```x```")]);
        let agent = Agent::new(backend, EmptyToolHost);

        assert_eq!(agent.generate("base prompt", "u").await.unwrap(), "x");

        let (system, messages, tool_count) = agent.backend().request(0);
        assert_eq!(system.as_deref(), Some("base prompt"));
        assert_eq!(tool_count, 0);
        assert_eq!(messages, vec![Message::user("u")]);
    }

    #[tokio::test]
    async fn tools_add_addendum_and_are_advertised() {
        let backend = ScriptedBackend::new(vec![Message::assistant("x")]);
        let agent = Agent::new(backend, FakeTools::new(&["list_fields"]));

        agent.generate("base prompt", "u").await.unwrap();

        let (system, _, tool_count) = agent.backend().request(0);
        let system = system.unwrap();
        assert!(system.starts_with("base prompt\n\n"));
        assert!(system.ends_with(TOOL_USAGE_ADDENDUM));
        assert_eq!(tool_count, 1);
    }

    #[tokio::test]
    async fn failed_tool_is_reported_and_loop_continues() {
        let backend = ScriptedBackend::new(vec![
            tool_call("c1", "broken"),
            Message::assistant("  ip.src eq 1.1.1.1  "),
        ]);
        let agent = Agent::new(backend, FakeTools::new(&["broken"]));

        let out = agent.generate("s", "u").await.unwrap();
        assert_eq!(out, "ip.src eq 1.1.1.1");
        assert_eq!(agent.backend().calls(), 2);

        let (_, messages, _) = agent.backend().request(1);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], tool_call("c1", "broken"));
        let results = messages[2].tool_result_parts();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].tool_call_id(), "c1");
        assert!(results[0].is_error());
        assert!(results[0].content().contains("upstream down"));
    }

    #[tokio::test]
    async fn every_call_gets_one_result() {
        let turn = Message {
            role: Role::Assistant,
            parts: vec![
                Part::Text("looking up".into()),
                Part::ToolCall(ToolCall {
                    id: "a".into(),
                    name: "list_fields".into(),
                    input: json!({}),
                }),
                Part::ToolCall(ToolCall {
                    id: "b".into(),
                    name: "missing".into(),
                    input: json!({}),
                }),
            ],
        };
        let backend = ScriptedBackend::new(vec![turn, Message::assistant("done")]);
        let agent = Agent::new(backend, FakeTools::new(&["list_fields"]));

        agent.generate("s", "u").await.unwrap();

        let (_, messages, _) = agent.backend().request(1);
        let results = messages[2].tool_result_parts();
        assert_eq!(
            results,
            vec![
                &ToolResult::success("a", "ip.src\nip.privacy.is_vpn"),
                &ToolResult::failure("b", "tool not found: missing"),
            ]
        );
    }

    #[tokio::test]
    async fn stops_at_iteration_limit() {
        let replies = (0..5).map(|i| tool_call(&format!("c{i}"), "list_fields")).collect();
        let backend = ScriptedBackend::new(replies);
        let agent = Agent::new(backend, FakeTools::new(&["list_fields"])).with_max_iterations(3);

        let err = agent.generate("s", "u").await.unwrap_err();

        assert!(matches!(err, Error::IterationLimit { max: 3 }));
        assert_eq!(agent.backend().calls(), 3);
    }

    #[tokio::test]
    async fn default_limit_is_ten() {
        let replies = (0..20).map(|i| tool_call(&format!("c{i}"), "list_fields")).collect();
        let agent = Agent::new(ScriptedBackend::new(replies), FakeTools::new(&["list_fields"]));

        assert!(matches!(
            agent.generate("s", "u").await,
            Err(Error::IterationLimit { max: MAX_ITERATIONS })
        ));
        assert_eq!(agent.backend().calls(), MAX_ITERATIONS);
    }

    #[tokio::test]
    async fn backend_error_aborts() {
        let agent = Agent::new(ScriptedBackend::new(Vec::new()), EmptyToolHost);
        let err = agent.generate("s", "u").await.unwrap_err();
        assert!(matches!(err, Error::Model(ModelError::Api(_))));
    }

    #[tokio::test]
    async fn modify_embeds_current_expression() {
        let backend = ScriptedBackend::new(vec![Message::assistant("ip.src eq 2.2.2.2")]);
        let agent = Agent::new(backend, EmptyToolHost);

        let out = agent
            .modify("s", "ip.src eq 1.1.1.1", "use 2.2.2.2 instead")
            .await
            .unwrap();
        assert_eq!(out, "ip.src eq 2.2.2.2");

        let (_, messages, _) = agent.backend().request(0);
        let prompt = messages[0].text();
        assert!(prompt.contains("ip.src eq 1.1.1.1"));
        assert!(prompt.contains("use 2.2.2.2 instead"));
    }
}
