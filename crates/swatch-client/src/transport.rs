//! Request execution against the swatch server.

use serde::de::DeserializeOwned;
use serde::Serialize;
use swatch_core::wire::{Ack, ComponentList, ComponentResponse, VariationsResponse};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::view::{Request, Response};

/// Executes view requests; blocking, called from worker threads.
pub trait Transport: Send + Sync {
    /// Runs `request` against the endpoints of `component` and decodes the reply.
    fn execute(&self, component: &str, request: &Request) -> Result<Response, ClientError>;
}

/// [`Transport`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
    config: ClientConfig,
}

enum Method {
    Get,
    Post(String),
    Delete,
}

impl HttpTransport {
    /// Transport with an agent built from `config`.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(config.timeout))
            .build()
            .into();
        Self { agent, config }
    }

    /// Settings the transport was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// `GET /components`.
    pub fn components(&self) -> Result<ComponentList, ClientError> {
        let url = format!("{}/components", self.config.base_url);
        decode(&self.call(&url, Method::Get)?)
    }

    fn call(&self, url: &str, method: Method) -> Result<String, ClientError> {
        let result = match method {
            Method::Get => self.agent.get(url).call(),
            Method::Delete => self.agent.delete(url).call(),
            Method::Post(body) => self
                .agent
                .post(url)
                .header("Content-Type", "application/json")
                .send(body.as_str()),
        };
        let mut response = result.map_err(|err| ClientError::Transport(err.to_string().into()))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|err| ClientError::Transport(format!("{url}: {err}").into()))?;
        debug!("{url} -> {status}");
        if status >= 400 {
            let message = serde_json::from_str::<Ack>(&body)
                .ok()
                .and_then(|ack| ack.error)
                .unwrap_or(body);
            return Err(ClientError::Status {
                status,
                message: message.into(),
            });
        }
        Ok(body)
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ClientError> {
    serde_json::from_str(body).map_err(|err| ClientError::Protocol(err.to_string().into()))
}

fn encode<T: Serialize>(body: &T) -> Result<String, ClientError> {
    serde_json::to_string(body).map_err(|err| ClientError::Protocol(err.to_string().into()))
}

impl Transport for HttpTransport {
    fn execute(&self, component: &str, request: &Request) -> Result<Response, ClientError> {
        let components = self.config.component_url("components", component);
        let variations = self.config.component_url("variations", component);
        match request {
            Request::FetchMetadata => {
                let body = self.call(&components, Method::Get)?;
                decode::<ComponentResponse>(&body).map(Response::Component)
            }
            Request::FetchVariations => {
                let body = self.call(&variations, Method::Get)?;
                decode::<VariationsResponse>(&body).map(Response::Variations)
            }
            Request::SaveVariation(save) => {
                let body = self.call(&variations, Method::Post(encode(save)?))?;
                decode::<Ack>(&body).map(Response::Ack)
            }
            Request::DeleteVariation { slug } => {
                let url = format!("{variations}?variation={}", urlencoding::encode(slug));
                let body = self.call(&url, Method::Delete)?;
                decode::<Ack>(&body).map(Response::Ack)
            }
            Request::SaveMetadata(save) => {
                let body = self.call(&components, Method::Post(encode(save)?))?;
                decode::<Ack>(&body).map(Response::Ack)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_servers_are_transport_errors() {
        let mut config = ClientConfig::new("http://127.0.0.1:9").expect("config");
        config.timeout = std::time::Duration::from_secs(2);
        let transport = HttpTransport::new(config);
        let err = transport
            .execute("Button.jsx", &Request::FetchMetadata)
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)), "{err:?}");
    }
}
