//! Human-readable title lookup for tracks.
//!
//! Resolution never fails from the caller's point of view: any lookup error is
//! logged and replaced by a synthetic title derived from the track id.

use std::time::Duration;

use log::{debug, warn};

use crate::{config::LookupConfig, track_id::TrackId};

const FALLBACK_TITLE_PREFIX: &str = "Untitled (";
const FALLBACK_ID_PREFIX_LEN: usize = 5;
const LOOKUP_USER_AGENT: &str = concat!("tubelist/", env!("CARGO_PKG_VERSION"));

/// Synthetic title used when the lookup service cannot provide one.
pub fn fallback_title(id: &TrackId) -> String {
    format!(
        "{FALLBACK_TITLE_PREFIX}{}...)",
        id.prefix(FALLBACK_ID_PREFIX_LEN)
    )
}

/// Returns true if a stored title should be looked up again.
pub fn needs_resolution(title: &str) -> bool {
    let trimmed = title.trim();
    trimmed.is_empty() || trimmed.starts_with(FALLBACK_TITLE_PREFIX)
}

/// Source of track titles.
///
/// Implementations may block; the runtime calls them off the session thread.
pub trait TitleResolver: Send + Sync {
    fn resolve(&self, id: &TrackId) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LookupFailureKind {
    Status(u16),
    Transport,
    Body,
}

#[derive(serde::Deserialize)]
struct OEmbedResponse {
    title: String,
}

/// Resolves titles through an oEmbed-style JSON endpoint.
pub struct OEmbedTitleResolver {
    endpoint: String,
    watch_url_base: String,
    http_client: ureq::Agent,
}

impl OEmbedTitleResolver {
    pub fn new(config: &LookupConfig) -> Self {
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_millis(config.connect_timeout_ms))
            .timeout_read(Duration::from_millis(config.read_timeout_ms))
            .user_agent(LOOKUP_USER_AGENT)
            .build();
        Self {
            endpoint: config.endpoint.trim().to_string(),
            watch_url_base: config.watch_url_base.trim().to_string(),
            http_client,
        }
    }

    /// Builds the lookup request URL for one identifier.
    pub fn lookup_url(&self, id: &TrackId) -> String {
        let watch_url = format!("{}{}", self.watch_url_base, id.as_str());
        format!(
            "{}?url={}&format=json",
            self.endpoint,
            urlencoding::encode(&watch_url)
        )
    }

    fn classify_ureq_failure(error: &ureq::Error) -> LookupFailureKind {
        match error {
            ureq::Error::Status(code, _) => LookupFailureKind::Status(*code),
            ureq::Error::Transport(_) => LookupFailureKind::Transport,
        }
    }

    fn fetch_title(&self, id: &TrackId) -> Result<String, (LookupFailureKind, String)> {
        let url = self.lookup_url(id);
        debug!("OEmbedTitleResolver: GET {}", url);
        let response = self
            .http_client
            .get(&url)
            .set("Accept", "application/json")
            .call()
            .map_err(|error| (Self::classify_ureq_failure(&error), error.to_string()))?;
        let body: OEmbedResponse = response.into_json().map_err(|error| {
            (
                LookupFailureKind::Body,
                format!("Invalid JSON response: {error}"),
            )
        })?;
        if body.title.trim().is_empty() {
            return Err((LookupFailureKind::Body, "empty title".to_string()));
        }
        Ok(body.title)
    }
}

impl TitleResolver for OEmbedTitleResolver {
    fn resolve(&self, id: &TrackId) -> String {
        match self.fetch_title(id) {
            Ok(title) => title,
            Err((kind, message)) => {
                warn!(
                    "OEmbedTitleResolver: title lookup failed for {} ({:?}): {}",
                    id, kind, message
                );
                fallback_title(id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{fallback_title, needs_resolution, OEmbedTitleResolver, TitleResolver};
    use crate::{config::LookupConfig, track_id::TrackId};
    use std::{
        io::{Read, Write},
        net::TcpListener,
        thread::{self, JoinHandle},
    };

    /// Serves a single canned HTTP response on a loopback port. The join
    /// handle yields the request line that was received.
    fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind test listener");
        let port = listener.local_addr().expect("listener address").port();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("no lookup request arrived");
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            stream
                .write_all(response.as_bytes())
                .expect("failed to write response");
            String::from_utf8_lossy(&request)
                .lines()
                .next()
                .unwrap_or_default()
                .to_string()
        });
        (format!("http://127.0.0.1:{port}/oembed"), server)
    }

    fn resolve_against(status: &str, body: &str) -> (String, String) {
        let (endpoint, server) = serve_once(status, body);
        let title = resolver_with_endpoint(&endpoint).resolve(&TrackId::from("dQw4w9WgXcQ"));
        let request_line = server.join().expect("test server panicked");
        (title, request_line)
    }

    fn resolver_with_endpoint(endpoint: &str) -> OEmbedTitleResolver {
        OEmbedTitleResolver::new(&LookupConfig {
            endpoint: endpoint.to_string(),
            connect_timeout_ms: 500,
            read_timeout_ms: 500,
            ..LookupConfig::default()
        })
    }

    #[test]
    fn test_lookup_url_encodes_watch_url() {
        let resolver = resolver_with_endpoint("https://www.youtube.com/oembed");
        let url = resolver.lookup_url(&TrackId::from("dQw4w9WgXcQ"));
        assert_eq!(
            url,
            "https://www.youtube.com/oembed?url=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3DdQw4w9WgXcQ&format=json"
        );
    }

    #[test]
    fn test_fallback_title_uses_short_id_prefix() {
        let title = fallback_title(&TrackId::from("dQw4w9WgXcQ"));
        assert_eq!(title, "Untitled (dQw4w...)");
        assert!(needs_resolution(&title));
    }

    #[test]
    fn test_needs_resolution_only_for_blank_or_fallback_titles() {
        assert!(needs_resolution(""));
        assert!(needs_resolution("   "));
        assert!(!needs_resolution("Never Gonna Give You Up"));
    }

    #[test]
    fn test_title_from_successful_lookup_is_returned_verbatim() {
        let (title, request_line) = resolve_against(
            "200 OK",
            r#"{"title":"Never Gonna Give You Up","author_name":"Rick Astley"}"#,
        );
        assert_eq!(title, "Never Gonna Give You Up");
        assert!(request_line.starts_with("GET /oembed?url="));
        assert!(request_line.contains("format=json"));
    }

    #[test]
    fn test_not_found_falls_back() {
        let (title, _) = resolve_against("404 Not Found", r#"{"error":"not found"}"#);
        assert_eq!(title, fallback_title(&TrackId::from("dQw4w9WgXcQ")));
    }

    #[test]
    fn test_non_json_body_falls_back() {
        let (title, _) = resolve_against("200 OK", "<html>Not Found</html>");
        assert_eq!(title, fallback_title(&TrackId::from("dQw4w9WgXcQ")));
    }

    #[test]
    fn test_body_without_title_falls_back() {
        let (title, _) = resolve_against("200 OK", r#"{"author_name":"Rick Astley"}"#);
        assert_eq!(title, fallback_title(&TrackId::from("dQw4w9WgXcQ")));
    }

    #[test]
    fn test_blank_title_falls_back() {
        let (title, _) = resolve_against("200 OK", r#"{"title":"   "}"#);
        assert_eq!(title, fallback_title(&TrackId::from("dQw4w9WgXcQ")));
    }

    #[test]
    fn test_unreachable_endpoint_falls_back_instead_of_failing() {
        let resolver = resolver_with_endpoint("http://127.0.0.1:1/oembed");
        let id = TrackId::from("dQw4w9WgXcQ");
        assert_eq!(resolver.resolve(&id), fallback_title(&id));
    }
}
