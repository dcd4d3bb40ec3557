//! HTTP implementation of the control-plane gateway.
//!
//! Speaks a small REST convention: every resource kind is a route segment,
//! one resource lives at `{base}/{kind}/{id}`, the collection at
//! `{base}/{kind}`. Transient conflicts surface as 409 and missing
//! resources as 404; both are classified for the engine. Listings carry a
//! `nextToken` field when truncated, which this client refuses rather than
//! paginates.

use anyhow::anyhow;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use ureq::Agent;

use crate::plane::{ControlPlaneClient, PlaneError, ResourceDescriptor};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const ERROR_SNIPPET_BYTES: usize = 200;

/// One-page listing envelope returned by the control plane.
#[derive(Deserialize)]
struct ListEnvelope {
    #[serde(default)]
    items: Vec<Value>,
    #[serde(default, rename = "nextToken")]
    next_token: Option<String>,
}

pub struct HttpControlPlane {
    agent: Agent,
    base: String,
    token: Option<String>,
}

impl HttpControlPlane {
    pub fn new(endpoint: &str, token: Option<String>) -> Self {
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .into();
        Self {
            agent,
            base: endpoint.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn collection_url(&self, kind: &str) -> String {
        format!("{}/{}", self.base, kind)
    }

    fn resource_url(&self, kind: &str, id: &str) -> String {
        format!("{}/{}/{}", self.base, kind, id)
    }

    fn read(&self, kind: &str, id: &str, url: &str) -> Result<Value, PlaneError> {
        let mut request = self.agent.get(url);
        if let Some(token) = &self.token {
            request = request.header("authorization", format!("Bearer {token}"));
        }
        let response = request
            .call()
            .map_err(|err| transport_error("GET", url, err))?;
        classify(&format!("{kind}/{id}"), response)
    }

    fn write(&self, kind: &str, id: &str, payload: &Value) -> Result<Value, PlaneError> {
        let url = self.resource_url(kind, id);
        let mut request = self.agent.put(&url);
        if let Some(token) = &self.token {
            request = request.header("authorization", format!("Bearer {token}"));
        }
        let response = request
            .send_json(payload)
            .map_err(|err| transport_error("PUT", &url, err))?;
        classify(&format!("{kind}/{id}"), response)
    }
}

impl ControlPlaneClient for HttpControlPlane {
    fn mutate(&self, kind: &str, name: &str, payload: &Value) -> Result<Value, PlaneError> {
        self.write(kind, name, payload)
    }

    fn describe(&self, kind: &str, id: &str) -> Result<ResourceDescriptor, PlaneError> {
        let url = self.resource_url(kind, id);
        let body = self.read(kind, id, &url)?;
        Ok(parse_descriptor(kind, id, body))
    }

    fn list(&self, kind: &str) -> Result<Vec<ResourceDescriptor>, PlaneError> {
        let url = self.collection_url(kind);
        let body = self.read(kind, "*", &url)?;
        let envelope: ListEnvelope = serde_json::from_value(body)
            .map_err(|err| anyhow!("listing of {kind} is not a collection envelope: {err}"))?;
        if envelope.next_token.is_some() {
            return Err(PlaneError::Truncated(kind.to_string()));
        }
        Ok(envelope
            .items
            .into_iter()
            .map(|item| {
                let id = item
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                parse_descriptor(kind, &id, item)
            })
            .collect())
    }

    fn delete(&self, kind: &str, id: &str) -> Result<(), PlaneError> {
        let url = self.resource_url(kind, id);
        let mut request = self.agent.delete(&url);
        if let Some(token) = &self.token {
            request = request.header("authorization", format!("Bearer {token}"));
        }
        let response = request
            .call()
            .map_err(|err| transport_error("DELETE", &url, err))?;
        classify(&format!("{kind}/{id}"), response).map(|_| ())
    }
}

/// Normalize a response body into the descriptor shape. The id falls back
/// to the one the caller addressed, for planes that omit it from bodies.
fn parse_descriptor(kind: &str, fallback_id: &str, body: Value) -> ResourceDescriptor {
    let field = |name: &str| {
        body.get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default()
    };
    let id = field("id");
    ResourceDescriptor {
        kind: kind.to_string(),
        id: if id.is_empty() {
            fallback_id.to_string()
        } else {
            id
        },
        name: field("name"),
        status: field("status"),
        body,
    }
}

fn classify(
    target: &str,
    mut response: ureq::http::Response<ureq::Body>,
) -> Result<Value, PlaneError> {
    let status = response.status().as_u16();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|err| anyhow!("read control-plane response for {target}: {err}"))?;
    match status {
        200..=299 => {
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&text).map_err(|err| {
                PlaneError::Other(anyhow!(
                    "control plane returned invalid JSON for {target}: {err}"
                ))
            })
        }
        409 => Err(PlaneError::Conflict(error_message(&text))),
        404 => Err(PlaneError::NotFound(format!(
            "{target}: {}",
            error_message(&text)
        ))),
        code => Err(PlaneError::Other(anyhow!(
            "control plane returned {code} for {target}: {}",
            error_message(&text)
        ))),
    }
}

fn transport_error(method: &str, url: &str, err: ureq::Error) -> PlaneError {
    PlaneError::Other(anyhow!("{method} {url}: {err}"))
}

/// Prefer the plane's own `message` field; fall back to a body snippet.
fn error_message(text: &str) -> String {
    if let Ok(body) = serde_json::from_str::<Value>(text) {
        if let Some(message) = body.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "(empty response body)".to_string();
    }
    let mut snippet = String::new();
    for ch in trimmed.chars() {
        if snippet.len() + ch.len_utf8() > ERROR_SNIPPET_BYTES {
            snippet.push_str("...");
            break;
        }
        snippet.push(ch);
    }
    snippet
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn urls_join_without_doubled_slashes() {
        let plane = HttpControlPlane::new("http://plane.local/", None);
        assert_eq!(
            plane.resource_url("data-sources", "ds-1"),
            "http://plane.local/data-sources/ds-1"
        );
        assert_eq!(plane.collection_url("bots"), "http://plane.local/bots");
    }

    #[test]
    fn descriptor_falls_back_to_requested_id() {
        let descriptor =
            parse_descriptor("bots", "qa-bot", json!({"status": "READY"}));
        assert_eq!(descriptor.id, "qa-bot");
        assert_eq!(descriptor.status, "READY");
        assert_eq!(descriptor.name, "");
    }

    #[test]
    fn descriptor_prefers_body_identity() {
        let body = json!({"id": "b-7", "name": "qa-bot", "status": "BUILDING"});
        let descriptor = parse_descriptor("bots", "qa-bot", body.clone());
        assert_eq!(descriptor.id, "b-7");
        assert_eq!(descriptor.name, "qa-bot");
        assert_eq!(descriptor.body, body);
    }

    #[test]
    fn error_message_prefers_structured_field() {
        assert_eq!(
            error_message(r#"{"message": "build in progress"}"#),
            "build in progress"
        );
        assert_eq!(error_message("<html>bad gateway</html>"), "<html>bad gateway</html>");
        assert_eq!(error_message("  "), "(empty response body)");
    }
}
