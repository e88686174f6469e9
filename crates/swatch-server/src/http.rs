//! HTTP endpoints and the websocket push upgrade.

use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use serde::Serialize;
use smol_str::SmolStr;
use swatch_core::codec::decode_variation;
use swatch_core::preview::{PreviewDocument, UserFiles};
use swatch_core::wire::{
    Ack, ComponentList, ComponentResponse, PushEvent, PushEventKind, SaveMetadata, SaveVariation,
    VariationsResponse,
};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{debug, info, warn};
use tungstenite::handshake::derive_accept_key;
use tungstenite::protocol::Role;
use tungstenite::WebSocket;

use crate::config::{PreviewConfig, ServerConfig};
use crate::error::ServerError;
use crate::library::Library;
use crate::push::{run_subscriber, PushHub, PING_INTERVAL};
use crate::store::{VariationStore, WriteOutcome};
use crate::watch::{spawn_library_watcher, WatchHandle};

const MAX_BODY_BYTES: u64 = 4 * 1024 * 1024;

/// State shared by every request handler.
#[derive(Debug)]
pub struct AppState {
    /// Variation and metadata files.
    pub store: VariationStore,
    /// Push subscribers.
    pub hub: Arc<PushHub>,
    /// Preview document settings.
    pub preview: PreviewConfig,
    /// Announce writes directly; used when no watcher reports them.
    pub announce_writes: bool,
}

/// A running server; stops accepting when dropped.
pub struct SwatchServer {
    server: Arc<Server>,
    handle: Option<thread::JoinHandle<()>>,
    state: Arc<AppState>,
    addr: SocketAddr,
    _watch: Option<WatchHandle>,
}

impl SwatchServer {
    /// Binds `config.listen`, starts the watcher when enabled and serves
    /// requests on a background thread.
    pub fn start(config: &ServerConfig) -> Result<Self, ServerError> {
        let library = Arc::new(Library::new(config.library.clone()));
        let store = VariationStore::new(library);
        let hub = Arc::new(PushHub::new());
        let watch = if config.watch.enabled {
            Some(spawn_library_watcher(
                store.clone(),
                hub.clone(),
                config.watch.debounce,
            )?)
        } else {
            None
        };
        let state = Arc::new(AppState {
            store,
            hub,
            preview: config.preview.clone(),
            announce_writes: watch.is_none(),
        });
        Self::serve(config.listen.as_str(), state, watch)
    }

    fn serve(
        listen: &str,
        state: Arc<AppState>,
        watch: Option<WatchHandle>,
    ) -> Result<Self, ServerError> {
        let server = Server::http(listen)
            .map_err(|err| ServerError::Server(format!("bind {listen}: {err}").into()))?;
        let addr = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| {
                ServerError::Server(format!("bind {listen}: not an ip address").into())
            })?;
        let server = Arc::new(server);
        let accept = server.clone();
        let handler_state = state.clone();
        let handle = thread::spawn(move || {
            for request in accept.incoming_requests() {
                handle_request(&handler_state, request);
            }
            debug!("http accept loop finished");
        });
        info!("swatch listening on http://{addr}");
        Ok(Self {
            server,
            handle: Some(handle),
            state,
            addr,
            _watch: watch,
        })
    }

    /// Bound address; useful when listening on port 0.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `http://` base url of the server.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Push hub the server broadcasts on.
    #[must_use]
    pub fn hub(&self) -> &Arc<PushHub> {
        &self.state.hub
    }

    /// Blocks until the accept loop ends.
    pub fn wait(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SwatchServer {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

enum Reply {
    Json(u16, String),
    Html(String),
}

fn json<T: Serialize>(status: u16, body: &T) -> Reply {
    Reply::Json(status, serde_json::to_string(body).unwrap_or_default())
}

fn with_header<R: Read>(response: Response<R>, name: &str, value: &str) -> Response<R> {
    match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

fn handle_request(state: &AppState, mut request: Request) {
    let method = request.method().clone();
    let url = request.url().to_string();
    let (path, query) = url.split_once('?').unwrap_or((url.as_str(), ""));

    if method == Method::Get && path == "/ws" {
        upgrade_websocket(state, request);
        return;
    }

    let result = route(state, &method, path, query, &mut request);
    let reply = match result {
        Ok(reply) => reply,
        Err(err) => {
            let status = err.status_code();
            if status >= 500 {
                warn!("{method} {path}: {err}");
            } else {
                debug!("{method} {path}: {err}");
            }
            json(status, &Ack::error(err.to_string()))
        }
    };
    let response = match reply {
        Reply::Json(status, body) => with_header(
            Response::from_string(body).with_status_code(StatusCode(status)),
            "Content-Type",
            "application/json",
        ),
        Reply::Html(body) => with_header(
            Response::from_string(body),
            "Content-Type",
            "text/html; charset=utf-8",
        ),
    };
    let _ = request.respond(response);
}

fn route(
    state: &AppState,
    method: &Method,
    path: &str,
    query: &str,
    request: &mut Request,
) -> Result<Reply, ServerError> {
    if path == "/components" {
        return match method {
            Method::Get => list_components(state),
            _ => Err(ServerError::NoRoute(format!("{method} {path}").into())),
        };
    }
    if let Some(component) = path.strip_prefix("/components/") {
        let component = decode_segment(component)?;
        return match method {
            Method::Get => get_component(state, &component),
            Method::Post => save_metadata(state, &component, &read_body(request)?),
            _ => Err(ServerError::NoRoute(format!("{method} {path}").into())),
        };
    }
    if let Some(component) = path.strip_prefix("/variations/") {
        let component = decode_segment(component)?;
        return match method {
            Method::Get => get_variations(state, &component),
            Method::Post => save_variation(state, &component, &read_body(request)?),
            Method::Delete => {
                let slug = query_param(query, "variation")
                    .ok_or_else(|| ServerError::invalid("variation query parameter is required"))?;
                delete_variation(state, &component, &slug)
            }
            _ => Err(ServerError::NoRoute(format!("{method} {path}").into())),
        };
    }
    if let Some(component) = path.strip_prefix("/preview/") {
        if *method == Method::Get {
            let component = decode_segment(component)?;
            let slug = query_param(query, "variation");
            return render_preview(state, &component, slug.as_deref()).map(Reply::Html);
        }
    }
    Err(ServerError::NoRoute(format!("{method} {path}").into()))
}

fn decode_segment(raw: &str) -> Result<String, ServerError> {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ServerError::invalid("component path is not valid UTF-8"))
}

fn query_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key != name {
            return None;
        }
        let value = value.replace('+', " ");
        urlencoding::decode(&value).ok().map(|value| value.into_owned())
    })
}

fn read_body(request: &mut Request) -> Result<String, ServerError> {
    let mut body = String::new();
    request
        .as_reader()
        .take(MAX_BODY_BYTES)
        .read_to_string(&mut body)
        .map_err(|err| ServerError::invalid(format!("request body: {err}")))?;
    Ok(body)
}

fn parse_body<'a, T: serde::Deserialize<'a>>(body: &'a str) -> Result<T, ServerError> {
    serde_json::from_str(body).map_err(|err| ServerError::invalid(format!("request body: {err}")))
}

fn announce(state: &AppState, kind: PushEventKind, component: &SmolStr) {
    if state.announce_writes {
        state.hub.broadcast(&PushEvent::new(kind, component.clone()));
    }
}

fn list_components(state: &AppState) -> Result<Reply, ServerError> {
    let data = state.store.library().entries()?;
    Ok(json(200, &ComponentList { data }))
}

fn get_component(state: &AppState, path: &str) -> Result<Reply, ServerError> {
    let library = state.store.library();
    let component = library.resolve(path)?;
    let metadata = library.metadata(&component)?;
    let data = state.store.read_metadata(&component)?;
    Ok(json(
        200,
        &ComponentResponse {
            data,
            props: metadata.props,
            name: metadata.name,
            description: metadata.description,
        },
    ))
}

fn save_metadata(state: &AppState, path: &str, body: &str) -> Result<Reply, ServerError> {
    let component = state.store.library().resolve(path)?;
    let request: SaveMetadata = parse_body(body)?;
    state.store.write_metadata(&component, &request.code)?;
    announce(state, PushEventKind::ComponentMetadataChanged, &component.path);
    Ok(json(200, &Ack::ok()))
}

fn get_variations(state: &AppState, path: &str) -> Result<Reply, ServerError> {
    let component = state.store.library().resolve(path)?;
    let data = state.store.list_variations(&component)?;
    Ok(json(200, &VariationsResponse { data }))
}

fn save_variation(state: &AppState, path: &str, body: &str) -> Result<Reply, ServerError> {
    let component = state.store.library().resolve(path)?;
    let request: SaveVariation = parse_body(body)?;
    let outcome = state
        .store
        .write_variation(&component, &request.variation, &request.code)?;
    let kind = match outcome {
        WriteOutcome::Created => PushEventKind::ComponentVariationAdded,
        WriteOutcome::Updated => PushEventKind::ComponentVariationChanged,
    };
    announce(state, kind, &component.path);
    Ok(json(200, &Ack::ok()))
}

fn delete_variation(state: &AppState, path: &str, slug: &str) -> Result<Reply, ServerError> {
    let component = state.store.library().resolve(path)?;
    state.store.delete_variation(&component, slug)?;
    announce(state, PushEventKind::ComponentVariationRemoved, &component.path);
    Ok(json(200, &Ack::ok()))
}

fn read_user_files(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .filter_map(|path| match std::fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(err) => {
                warn!("preview asset {} unreadable: {err}", path.display());
                None
            }
        })
        .collect()
}

/// Sandbox document for a component, optionally seeded with a variation.
pub fn render_preview(
    state: &AppState,
    path: &str,
    slug: Option<&str>,
) -> Result<String, ServerError> {
    let component = state.store.library().resolve(path)?;
    let mut document = PreviewDocument::new(state.preview.plugin.as_str(), component.path.as_str())
        .inject_tags(state.preview.inject_tags.clone())
        .user_files(UserFiles {
            styles: read_user_files(&state.preview.styles),
            scripts: read_user_files(&state.preview.scripts),
        });
    if let Some(dir) = &state.preview.bundle_dir {
        document = document.bundle_dir(dir.as_str());
    }
    if let Some(slug) = slug {
        let source = state.store.read_variation(&component, slug)?;
        let variation = decode_variation(&source).map_err(|err| {
            ServerError::invalid(format!("variation '{slug}' does not decode: {err}"))
        })?;
        document = document.initial_data(serde_json::Value::Object(variation.props));
    }
    Ok(document.render())
}

fn upgrade_websocket(state: &AppState, request: Request) {
    let key = request
        .headers()
        .iter()
        .find(|header| header.field.equiv("Sec-WebSocket-Key"))
        .map(|header| header.value.as_str().to_string());
    let Some(key) = key else {
        let body = serde_json::to_string(&Ack::error("websocket upgrade required"))
            .unwrap_or_default();
        let response = with_header(
            Response::from_string(body).with_status_code(StatusCode(400)),
            "Content-Type",
            "application/json",
        );
        let _ = request.respond(response);
        return;
    };
    let response = Response::empty(StatusCode(101));
    let response = with_header(response, "Upgrade", "websocket");
    let response = with_header(response, "Connection", "Upgrade");
    let accept = derive_accept_key(key.as_bytes());
    let response = with_header(response, "Sec-WebSocket-Accept", &accept);

    // Subscribe before the handshake completes so nothing sent after the
    // client sees the upgrade is lost.
    let events = state.hub.subscribe();
    let stream = request.upgrade("websocket", response);
    let socket = WebSocket::from_raw_socket(stream, Role::Server, None);
    debug!("push subscriber connected");
    thread::spawn(move || run_subscriber(socket, &events, PING_INTERVAL));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_params_are_decoded() {
        assert_eq!(query_param("variation=big-one", "variation").as_deref(), Some("big-one"));
        assert_eq!(query_param("a=1&variation=x%2Dy", "variation").as_deref(), Some("x-y"));
        assert_eq!(query_param("a=1", "variation"), None);
        assert_eq!(query_param("", "variation"), None);
    }

    #[test]
    fn component_segments_may_be_percent_encoded() {
        assert_eq!(decode_segment("forms%2FInput.tsx").as_deref(), Ok("forms/Input.tsx"));
        assert_eq!(decode_segment("forms/Input.tsx").as_deref(), Ok("forms/Input.tsx"));
    }
}
