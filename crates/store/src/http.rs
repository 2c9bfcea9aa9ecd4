//! HTTP gateway backend.
//!
//! Speaks to a CAS HTTP gateway. Objects are fetched as streaming bodies
//! from `GET {endpoint}/v1/objects/{container}/{oid}`; searches post a JSON
//! filter list to `POST {endpoint}/v1/search/{container}` and receive a JSON
//! array of hex-encoded identifiers. Requests carry a bearer token derived
//! from the configured account.

use crate::{Filter, ObjectStore, SearchQuery, StoreConnect, StoreError, StoreResult};
use blockfetch_types::{Account, Oid};
use bytes::Bytes;
use futures_util::{stream::BoxStream, StreamExt, TryStreamExt};
use reqwest::StatusCode;
use serde::Serialize;
use std::{io, time::Duration};
use tokio_util::io::StreamReader;
use tracing::debug;
use url::Url;

/// Default budget for establishing the gateway connection.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(600);

/// Streaming reader over an object fetched from the gateway.
pub type HttpObject = StreamReader<BoxStream<'static, io::Result<Bytes>>, Bytes>;

#[derive(Serialize)]
struct SearchRequest<'a> {
    filters: &'a [Filter],
}

/// Connector for [`HttpStore`].
///
/// Holds the gateway endpoint, the target container, and the account whose
/// derived token authenticates requests.
pub struct HttpStoreConnector {
    endpoint: String,
    container_id: String,
    account: Account,
    dial_timeout: Duration,
}

impl std::fmt::Debug for HttpStoreConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStoreConnector")
            .field("endpoint", &self.endpoint)
            .field("container_id", &self.container_id)
            .finish_non_exhaustive()
    }
}

impl HttpStoreConnector {
    /// Create a connector for the given gateway endpoint and container.
    pub fn new(
        endpoint: impl Into<String>,
        container_id: impl Into<String>,
        account: Account,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            container_id: container_id.into(),
            account,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
        }
    }

    /// Override the connection budget.
    #[must_use]
    pub const fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }
}

impl StoreConnect for HttpStoreConnector {
    type Store = HttpStore;
    type Error = StoreError;

    async fn connect(&self) -> Result<HttpStore, StoreError> {
        let mut endpoint = Url::parse(&self.endpoint).map_err(|err| {
            StoreError::InvalidEndpoint { endpoint: self.endpoint.clone(), reason: err.to_string() }
        })?;
        // Joining relative paths below requires a trailing slash.
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        // Gateway endpoints are dialed directly; environment proxies don't
        // apply. An unreachable gateway surfaces on the first request.
        let http = reqwest::Client::builder()
            .no_proxy()
            .connect_timeout(self.dial_timeout)
            .build()
            .map_err(StoreError::backend)?;

        Ok(HttpStore {
            http,
            endpoint,
            container_id: self.container_id.clone(),
            token: self.account.access_token(),
        })
    }
}

/// Client for a CAS HTTP gateway.
///
/// Cheap to clone; all clones share the underlying connection pool.
#[derive(Clone)]
pub struct HttpStore {
    http: reqwest::Client,
    endpoint: Url,
    container_id: String,
    token: String,
}

impl std::fmt::Debug for HttpStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStore")
            .field("endpoint", &self.endpoint.as_str())
            .field("container_id", &self.container_id)
            .finish_non_exhaustive()
    }
}

impl HttpStore {
    fn route(&self, path: &str) -> StoreResult<Url> {
        self.endpoint.join(path).map_err(|err| StoreError::Malformed(err.to_string()))
    }
}

impl ObjectStore for HttpStore {
    type Object = HttpObject;

    async fn get(&self, id: Oid) -> StoreResult<HttpObject> {
        let url = self.route(&format!("v1/objects/{}/{id}", self.container_id))?;
        let resp =
            self.http.get(url).bearer_auth(&self.token).send().await.map_err(map_transport)?;
        match resp.status() {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(id)),
            status if !status.is_success() => {
                Err(StoreError::Malformed(format!("object fetch returned status {status}")))
            }
            _ => {
                let stream = resp
                    .bytes_stream()
                    .map_err(|err| io::Error::new(io::ErrorKind::Other, err))
                    .boxed();
                Ok(StreamReader::new(stream))
            }
        }
    }

    async fn search(&self, query: SearchQuery) -> StoreResult<Vec<Oid>> {
        let url = self.route(&format!("v1/search/{}", self.container_id))?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&SearchRequest { filters: query.filters() })
            .send()
            .await
            .map_err(map_transport)?;
        if !resp.status().is_success() {
            return Err(StoreError::Malformed(format!(
                "search returned status {}",
                resp.status()
            )));
        }
        let ids: Vec<String> = resp
            .json()
            .await
            .map_err(|err| StoreError::Malformed(format!("search response: {err}")))?;
        ids.iter()
            .map(|s| s.parse::<Oid>().map_err(|err| StoreError::Malformed(format!("{s:?}: {err}"))))
            .collect()
    }

    async fn close(&self) {
        debug!(endpoint = %self.endpoint, "closing object store client");
    }
}

fn map_transport(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::backend(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::{conformance, fixtures};
    use serde::Deserialize;
    use std::sync::Arc;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
    };

    #[test]
    fn connector_rejects_bad_endpoint() {
        let connector = HttpStoreConnector::new("not a url", "c1", Account::ephemeral());
        let err = futures_util::FutureExt::now_or_never(connector.connect())
            .expect("URL parsing fails before any I/O")
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidEndpoint { .. }));
    }

    // A minimal in-process gateway speaking the two wire routes, backing
    // the conformance run below.

    type Objects = Vec<(Oid, Vec<u8>, Vec<(String, String)>)>;

    #[derive(Deserialize)]
    struct SearchBody {
        filters: Vec<Filter>,
    }

    /// Bind a mock gateway serving the given objects under the `archive`
    /// container; returns its base URL.
    async fn spawn_gateway(objects: Objects) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let objects = Arc::new(objects);
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else { return };
                tokio::spawn(serve(socket, objects.clone()));
            }
        });
        endpoint
    }

    /// Serve one request, then close the connection.
    async fn serve(mut socket: TcpStream, objects: Arc<Objects>) -> std::io::Result<()> {
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        let header_end = loop {
            let n = socket.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            request.extend_from_slice(&buf[..n]);
            if let Some(pos) = request.windows(4).position(|window| window == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&request[..header_end]).into_owned();
        let mut lines = head.lines();
        let request_line = lines.next().unwrap_or_default().to_owned();
        let content_length = lines
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        let mut body = request[header_end..].to_vec();
        while body.len() < content_length {
            let n = socket.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&buf[..n]);
        }

        let mut parts = request_line.split(' ');
        let method = parts.next().unwrap_or_default();
        let path = parts.next().unwrap_or_default();
        let response = route_request(method, path, &body, &objects);
        socket.write_all(&response).await?;
        socket.shutdown().await
    }

    fn route_request(method: &str, path: &str, body: &[u8], objects: &Objects) -> Vec<u8> {
        match (method, path) {
            ("GET", path) if path.starts_with("/v1/objects/archive/") => {
                let id = path.trim_start_matches("/v1/objects/archive/");
                let hit = id
                    .parse::<Oid>()
                    .ok()
                    .and_then(|id| objects.iter().find(|(oid, _, _)| *oid == id));
                match hit {
                    Some((_, payload, _)) => {
                        respond("200 OK", "application/octet-stream", payload)
                    }
                    None => respond("404 Not Found", "text/plain", b"no such object"),
                }
            }
            ("POST", "/v1/search/archive") => {
                let Ok(search) = serde_json::from_slice::<SearchBody>(body) else {
                    return respond("400 Bad Request", "text/plain", b"bad filter list");
                };
                let sort_attribute = search.filters.first().map(|f| f.attribute().to_owned());
                let mut hits: Vec<(Option<u64>, String)> = objects
                    .iter()
                    .filter(|(_, _, attrs)| {
                        search.filters.iter().all(|filter| matches_filter(filter, attrs))
                    })
                    .map(|(id, _, attrs)| {
                        let key = sort_attribute
                            .as_deref()
                            .and_then(|name| attribute(attrs, name))
                            .and_then(|value| value.parse::<u64>().ok());
                        (key, id.to_string())
                    })
                    .collect();
                hits.sort_by(|a, b| a.0.cmp(&b.0));
                let ids: Vec<String> = hits.into_iter().map(|(_, id)| id).collect();
                respond("200 OK", "application/json", &serde_json::to_vec(&ids).unwrap())
            }
            _ => respond("404 Not Found", "text/plain", b"no such route"),
        }
    }

    fn attribute<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
        attrs.iter().find(|(n, _)| n == name).map(|(_, value)| value.as_str())
    }

    fn matches_filter(filter: &Filter, attrs: &[(String, String)]) -> bool {
        match filter {
            Filter::StringEqual { attribute: name, value } => {
                attribute(attrs, name) == Some(value.as_str())
            }
            Filter::NumGe { attribute: name, value } => attribute(attrs, name)
                .and_then(|v| v.parse::<u64>().ok())
                .is_some_and(|v| v >= *value),
            Filter::NumLe { attribute: name, value } => attribute(attrs, name)
                .and_then(|v| v.parse::<u64>().ok())
                .is_some_and(|v| v <= *value),
        }
    }

    fn respond(status: &str, content_type: &str, body: &[u8]) -> Vec<u8> {
        let mut response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(body);
        response
    }

    #[tokio::test]
    async fn http_store_conformance() {
        let endpoint = spawn_gateway(fixtures()).await;
        let connector = HttpStoreConnector::new(endpoint, "archive", Account::ephemeral());
        let store = connector.connect().await.unwrap();
        conformance(&store).await.unwrap();
        store.close().await;
    }

    #[tokio::test]
    async fn unknown_route_is_a_malformed_response() {
        let endpoint = spawn_gateway(Vec::new()).await;
        let connector = HttpStoreConnector::new(endpoint, "other-container", Account::ephemeral());
        let store = connector.connect().await.unwrap();

        // The gateway only serves the `archive` container, so this request
        // misses both routes.
        let err = store.search(SearchQuery::new().num_ge("height", 0)).await.unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }
}
