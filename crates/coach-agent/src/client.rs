use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::types::{ChatRequest, ChatResponse, FunctionRequest, FunctionResponse};
use crate::Result;

fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(concat!("coach/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// POST `body` as JSON and decode a JSON reply. Non-2xx responses become
/// [`AgentError::Status`] carrying the response text.
async fn post_json<B: Serialize, T: DeserializeOwned>(http: &Client, url: &str, body: &B) -> Result<T> {
    let resp = http.post(url).json(body).send().await?;
    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        warn!(%url, status = status.as_u16(), "agent endpoint returned an error");
        return Err(AgentError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body: text,
        });
    }
    serde_json::from_str(&text).map_err(|e| AgentError::Decode(format!("{e}: {text}")))
}

// ---------------------------------------------------------------------------
// WebhookClient
// ---------------------------------------------------------------------------

/// Client for the chat workflow webhook.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    http: Client,
    url: String,
    default_agent: String,
}

impl WebhookClient {
    pub fn new(url: impl Into<String>, default_agent: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            url: url.into(),
            default_agent: default_agent.into(),
        })
    }

    /// Send one chat message. Requests without an agent go to the default agent.
    pub async fn send(&self, mut request: ChatRequest) -> Result<ChatResponse> {
        if request.agent.is_none() {
            request.agent = Some(self.default_agent.clone());
        }
        debug!(user = %request.user_id, agent = ?request.agent, "sending chat message");
        let reply: ChatResponse = post_json(&self.http, &self.url, &request).await?;
        if reply.handoff_detected {
            debug!(from = ?request.agent, to = ?reply.agent, "agent handoff");
        }
        Ok(reply)
    }
}

// ---------------------------------------------------------------------------
// FunctionsClient
// ---------------------------------------------------------------------------

/// Client for the serverless function endpoint: `{action, data}` in,
/// `{success, data?, error?}` out.
#[derive(Debug, Clone)]
pub struct FunctionsClient {
    http: Client,
    url: String,
}

impl FunctionsClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            url: url.into(),
        })
    }

    /// Invoke one action. `success: false` becomes [`AgentError::Function`].
    pub async fn invoke(&self, action: &str, data: Value) -> Result<Value> {
        let request = FunctionRequest::new(action, data);
        let reply: FunctionResponse = post_json(&self.http, &self.url, &request).await?;
        if !reply.success {
            return Err(AgentError::Function {
                action: action.to_string(),
                message: reply.error.unwrap_or_else(|| "no error message".to_string()),
            });
        }
        Ok(reply.data.unwrap_or(Value::Null))
    }
}
