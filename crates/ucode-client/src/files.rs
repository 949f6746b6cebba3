//! Request/response side channel for workspace files.
//!
//! File content never travels over the persistent transport. It is read on
//! demand from the backend's HTTP API, keyed by the session correlation id
//! the backend announced in a `status` frame.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use ucode_core::{ClientError, FileTree, Result, SessionId};

/// Reads files and trees from the agent workspace.
#[async_trait]
pub trait FileService: Send + Sync + 'static {
    /// Full text of `path`. Fails with [`ClientError::NoSession`] without a session id.
    async fn read_file(&self, session_id: Option<&SessionId>, path: &str) -> Result<String>;

    /// The current workspace tree.
    async fn list_tree(&self, session_id: Option<&SessionId>) -> Result<FileTree>;
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP implementation
// ─────────────────────────────────────────────────────────────────────────────

/// [`FileService`] over the backend's `/api/files/*` endpoints.
#[derive(Clone, Debug)]
pub struct HttpFileService {
    client: reqwest::Client,
    base: Url,
}

#[derive(Deserialize)]
struct ReadResponse {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    tree: FileTree,
}

impl HttpFileService {
    /// Client for the API at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Request(e.to_string()))?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, route: &str) -> Result<Url> {
        let joined = format!("{}/{route}", self.base.as_str().trim_end_matches('/'));
        Url::parse(&joined).map_err(|e| ClientError::InvalidUrl {
            url: joined,
            reason: e.to_string(),
        })
    }

    async fn get(&self, route: &str, query: &[(&str, &str)]) -> Result<String> {
        let url = self.endpoint(route)?;
        debug!(%url, "side-channel request");
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| ClientError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                detail: error_detail(status, &body),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl FileService for HttpFileService {
    async fn read_file(&self, session_id: Option<&SessionId>, path: &str) -> Result<String> {
        let session_id = session_id.ok_or(ClientError::NoSession)?;
        let body = self
            .get(
                "api/files/read",
                &[("session_id", session_id.as_str()), ("path", path)],
            )
            .await?;
        let parsed: ReadResponse = serde_json::from_str(&body)?;
        Ok(parsed.content)
    }

    async fn list_tree(&self, session_id: Option<&SessionId>) -> Result<FileTree> {
        let session_id = session_id.ok_or(ClientError::NoSession)?;
        let body = self
            .get("api/files/list", &[("session_id", session_id.as_str())])
            .await?;
        let parsed: ListResponse = serde_json::from_str(&body)?;
        Ok(parsed.tree)
    }
}

/// Human-readable detail of an error response.
///
/// Prefers the JSON `detail` (a string, or an object with `message`), then
/// `error`/`message`, then the status reason.
fn error_detail(status: StatusCode, body: &str) -> String {
    let from_body = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        let detail = v.get("detail").or_else(|| v.get("error")).or_else(|| v.get("message"))?;
        match detail {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map.get("message").and_then(Value::as_str).map(str::to_owned),
            _ => None,
        }
    });
    from_body
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache
// ─────────────────────────────────────────────────────────────────────────────

/// Entries kept by [`FileCache::default`].
pub const DEFAULT_CACHE_ENTRIES: usize = 64;

/// Last known content per path, shown while a fresh read is in flight.
///
/// Bounded: inserting past capacity evicts the least recently stored path.
#[derive(Clone, Debug)]
pub struct FileCache {
    entries: HashMap<String, String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl Default for FileCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_ENTRIES)
    }
}

impl FileCache {
    /// Empty cache holding at most `capacity` paths.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Cached content of `path`.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    /// Remember the content of `path`.
    pub fn insert(&mut self, path: &str, content: String) {
        if self.entries.insert(path.to_string(), content).is_some() {
            self.order.retain(|p| p != path);
        }
        self.order.push_back(path.to_string());
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                let _ = self.entries.remove(&evicted);
            }
        }
    }

    /// Number of cached paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything (new backend session).
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// Inline placeholder shown in place of a file that failed to load.
pub fn error_placeholder(error: &ClientError) -> String {
    format!("// Error loading file: {}", error.user_message())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(server: &MockServer) -> HttpFileService {
        HttpFileService::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn read_file_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/files/read"))
            .and(query_param("session_id", "s1"))
            .and(query_param("path", "src/main.rs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": "fn main() {}" })))
            .expect(1)
            .mount(&server)
            .await;

        let content = service(&server)
            .read_file(Some(&SessionId::from("s1")), "src/main.rs")
            .await
            .unwrap();
        assert_eq!(content, "fn main() {}");
    }

    #[tokio::test]
    async fn read_file_surfaces_detail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/files/read"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "detail": "File not found: x.txt" })),
            )
            .mount(&server)
            .await;

        let err = service(&server)
            .read_file(Some(&SessionId::from("s1")), "x.txt")
            .await
            .unwrap_err();
        assert_matches!(&err, ClientError::Http { status: 404, detail } if detail == "File not found: x.txt");
        assert_eq!(error_placeholder(&err), "// Error loading file: File not found: x.txt");
    }

    #[tokio::test]
    async fn non_json_error_falls_back_to_reason() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = service(&server)
            .read_file(Some(&SessionId::from("s1")), "a.txt")
            .await
            .unwrap_err();
        assert_matches!(err, ClientError::Http { status: 500, detail } if detail == "Internal Server Error");
    }

    #[tokio::test]
    async fn missing_session_fails_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let svc = service(&server);
        assert_matches!(svc.read_file(None, "a.txt").await, Err(ClientError::NoSession));
        assert_matches!(svc.list_tree(None).await, Err(ClientError::NoSession));
    }

    #[tokio::test]
    async fn list_tree_parses_nodes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/files/list"))
            .and(query_param("session_id", "s1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tree": [
                    { "name": "src", "type": "folder", "path": "/workspace/src", "children": [
                        { "name": "lib.rs", "type": "file", "path": "/workspace/src/lib.rs" }
                    ]}
                ]
            })))
            .mount(&server)
            .await;

        let tree = service(&server)
            .list_tree(Some(&SessionId::from("s1")))
            .await
            .unwrap();
        assert_eq!(tree.item_count(), 2);
    }

    #[test]
    fn detail_object_message() {
        let detail = error_detail(StatusCode::BAD_REQUEST, r#"{"detail":{"message":"Path traversal not allowed."}}"#);
        assert_eq!(detail, "Path traversal not allowed.");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert_matches!(
            HttpFileService::new("::nope", Duration::from_secs(1)),
            Err(ClientError::InvalidUrl { .. })
        );
    }

    #[test]
    fn cache_round_trip() {
        let mut cache = FileCache::default();
        assert!(cache.get("a").is_none());
        cache.insert("a", "one".into());
        cache.insert("a", "two".into());
        assert_eq!(cache.get("a"), Some("two"));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_evicts_oldest_past_capacity() {
        let mut cache = FileCache::with_capacity(2);
        cache.insert("a", "1".into());
        cache.insert("b", "2".into());
        // refreshing a moves it behind b
        cache.insert("a", "3".into());
        cache.insert("c", "4".into());
        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert_eq!(cache.get("a"), Some("3"));
        assert_eq!(cache.get("c"), Some("4"));
    }
}
