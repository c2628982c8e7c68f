//! OpenAI chat completions backend.
//!
//! Tool calls arrive as discrete `tool_calls` entries on the assistant
//! message; results go back as one `tool` role message per call.

use crate::model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, Part, Role, ToolCall, ToolResult,
    ToolSpec, Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    /// Always a string; several OpenAI-compatible servers reject `null`.
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ApiToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: &'static str, content: String) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: ApiFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    /// JSON-encoded arguments.
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: ApiFunction,
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating an OpenAI backend.
#[derive(Debug, Clone)]
pub struct OpenAiBackendBuilder {
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
    client: Option<reqwest::Client>,
}

impl OpenAiBackendBuilder {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 1024,
            base_url: OPENAI_API_URL.to_string(),
            client: None,
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// API root, e.g. `https://api.openai.com/v1` or a compatible gateway.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> OpenAiBackend {
        OpenAiBackend {
            client: self.client.unwrap_or_default(),
            api_key: self.api_key,
            model: self.model,
            max_tokens: self.max_tokens,
            endpoint: format!("{}/chat/completions", self.base_url.trim_end_matches('/')),
        }
    }
}

/// OpenAI chat completions backend.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    endpoint: String,
}

impl OpenAiBackend {
    pub fn builder(api_key: impl Into<String>, model: impl Into<String>) -> OpenAiBackendBuilder {
        OpenAiBackendBuilder::new(api_key, model)
    }

    fn build_request(&self, request: &ModelRequest<'_>) -> ApiRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system {
            messages.push(ApiMessage::text("system", system.to_string()));
        }
        for msg in request.messages {
            messages.extend(Self::message_to_api(msg));
        }

        ApiRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages,
            tools: request.tools.iter().map(Self::tool_to_api).collect(),
        }
    }

    /// One conversation message can expand to several wire messages: tool
    /// results each get their own `tool` message.
    fn message_to_api(msg: &Message) -> Vec<ApiMessage> {
        let text = msg.text();

        match msg.role {
            Role::Assistant => {
                let tool_calls = msg
                    .tool_calls()
                    .into_iter()
                    .map(|call| ApiToolCall {
                        id: call.id,
                        call_type: function_type(),
                        function: ApiFunctionCall {
                            name: call.name,
                            arguments: encode_arguments(&call.input),
                        },
                    })
                    .collect();
                vec![ApiMessage {
                    role: "assistant",
                    content: text,
                    tool_calls,
                    tool_call_id: None,
                }]
            }
            Role::User => {
                let mut out: Vec<ApiMessage> = msg
                    .tool_result_parts()
                    .into_iter()
                    .map(|result| ApiMessage {
                        role: "tool",
                        content: tool_result_content(result),
                        tool_calls: Vec::new(),
                        tool_call_id: Some(result.tool_call_id().to_string()),
                    })
                    .collect();
                if out.is_empty() || !text.is_empty() {
                    out.push(ApiMessage::text("user", text));
                }
                out
            }
        }
    }

    fn tool_to_api(spec: &ToolSpec) -> ApiTool {
        ApiTool {
            tool_type: "function",
            function: ApiFunction {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.input_schema.clone(),
            },
        }
    }

    fn parse_response(response: ApiResponse) -> Result<ModelResponse, ModelError> {
        if let Some(error) = response.error {
            return Err(ModelError::Api(error.message));
        }

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("no choices in response".into()))?;

        let mut parts = Vec::new();
        if let Some(content) = choice.message.content.filter(|c| !c.is_empty()) {
            parts.push(Part::Text(content));
        }
        for (index, call) in choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .enumerate()
        {
            let id = if call.id.is_empty() {
                format!("call_{index}")
            } else {
                call.id
            };
            let input = decode_arguments(&call.function.name, &call.function.arguments);
            parts.push(Part::ToolCall(ToolCall {
                id,
                name: call.function.name,
                input,
            }));
        }

        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(ModelResponse {
            message: Message {
                role: Role::Assistant,
                parts,
            },
            usage,
        })
    }
}

/// Decode a function call's JSON arguments. Malformed or non-object
/// arguments degrade to an empty argument map.
fn decode_arguments(tool: &str, raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) | Err(_) => {
            warn!(tool, arguments = raw, "malformed tool arguments, calling without arguments");
            Value::Object(Map::new())
        }
    }
}

fn encode_arguments(input: &Value) -> String {
    match input {
        Value::Null => "{}".to_string(),
        other => other.to_string(),
    }
}

fn tool_result_content(result: &ToolResult) -> String {
    match result {
        ToolResult::Success { output, .. } => output.clone(),
        ToolResult::Failure { error, .. } => format!("Error: {error}"),
    }
}

impl std::fmt::Display for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "openai({})", self.model)
    }
}

impl Backend for OpenAiBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let api_request = self.build_request(&request);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status { status, body });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        Self::parse_response(api_response)
    }
}
