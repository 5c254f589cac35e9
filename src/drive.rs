//! Google Drive link handling.
//!
//! Turns the many shapes of shareable links into a file ID, and negotiates
//! the direct-download endpoint. Files too large for Drive's virus scan are
//! answered with an HTML warning page first; the page (or a cookie) carries
//! a confirmation token that has to be echoed back on a second request.

use std::{
    io::{Cursor, Read},
    sync::LazyLock,
    time::Duration,
};

use percent_encoding::percent_decode_str;
use regex::Regex;
use tracing::debug;

use crate::error::{CacheError, CacheResult};

pub const DEFAULT_DRIVE_BASE_URL: &str = "https://drive.google.com";

/// Upper bound on how much of an HTML warning page is read while looking for
/// a confirmation token.
const CONFIRM_PAGE_LIMIT: u64 = 1024 * 1024;

static FILE_PATH_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/file/d/([A-Za-z0-9_-]+)").unwrap());
static OPEN_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/open\?(?:[^#]*&)?id=([A-Za-z0-9_-]+)").unwrap());
static UC_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/uc\?(?:[^#]*&)?id=([A-Za-z0-9_-]+)").unwrap());
static QUERY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]id=([A-Za-z0-9_-]+)").unwrap());

static CONFIRM_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"confirm=([0-9A-Za-z_-]+)").unwrap());
static CONFIRM_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name="confirm"\s+value="([0-9A-Za-z_-]+)""#).unwrap()
});
static UUID_INPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"name="uuid"\s+value="([0-9A-Za-z_-]+)""#).unwrap());
static FORM_ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<form[^>]*id="download-form"[^>]*action="([^"]+)""#).unwrap()
});

/// Extracts the Drive file ID from a shareable link.
///
/// Patterns are tried in order: `/file/d/{id}`, `/open?id={id}`,
/// `/uc?id={id}`, then any `id={id}` query parameter.
pub fn extract_file_id(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    [&*FILE_PATH_ID, &*OPEN_ID, &*UC_ID, &*QUERY_ID]
        .into_iter()
        .find_map(|pattern| pattern.captures(url))
        .map(|captures| captures[1].to_string())
}

/// Direct-download endpoint for a file.
pub fn download_url(base: &str, file_id: &str) -> String {
    format!(
        "{}/uc?export=download&id={}",
        base.trim_end_matches('/'),
        file_id
    )
}

/// Pulls the filename out of a `Content-Disposition` header value.
///
/// The RFC 5987 `filename*` form wins over the plain `filename` form. Only
/// the final path component is kept and leading dots are dropped, so the
/// result is always a plain, visible name inside the cache directory.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for part in split_parameters(value) {
        let Some((key, raw)) = part.trim().split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let raw = raw.trim();
        match key.as_str() {
            "filename*" => {
                // charset'language'percent-encoded-value
                let encoded = raw.splitn(3, '\'').nth(2).unwrap_or(raw);
                let decoded = percent_decode_str(encoded).decode_utf8_lossy();
                extended = Some(decoded.into_owned());
            }
            "filename" => {
                plain = Some(unquote(raw));
            }
            _ => {}
        }
    }

    extended
        .or(plain)
        .as_deref()
        .and_then(sanitize_filename)
}

/// Splits header parameters on `;`, ignoring separators inside quoted
/// strings.
fn split_parameters(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (idx, ch) in value.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                parts.push(&value[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

fn unquote(raw: &str) -> String {
    match raw.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) {
        Some(inner) => {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars().peekable();
            while let Some(ch) = chars.next() {
                // Only `\"` and `\\` are escapes; other backslashes stay.
                if ch == '\\' {
                    if let Some(&next @ ('"' | '\\')) = chars.peek() {
                        out.push(next);
                        chars.next();
                        continue;
                    }
                }
                out.push(ch);
            }
            out
        }
        None => raw.trim_matches('"').to_string(),
    }
}

fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let base = base.trim().trim_start_matches('.');
    if base.is_empty() {
        None
    } else {
        Some(base.to_string())
    }
}

/// One outgoing GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveRequest {
    pub url: String,
    /// Value for the `Cookie` header, if any.
    pub cookie: Option<String>,
}

/// The parts of a response the resolver cares about. The body is left
/// unread so it can be streamed straight to disk.
pub struct DriveResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub content_length: Option<u64>,
    /// Raw `Set-Cookie` header values.
    pub set_cookies: Vec<String>,
    pub body: Box<dyn Read + Send>,
}

impl DriveResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn is_textual(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|value| value.trim_start().to_ascii_lowercase().starts_with("text/"))
            .unwrap_or(false)
    }

    /// `name=value` pairs from `Set-Cookie`, joined for a `Cookie` header.
    fn cookie_header(&self) -> Option<String> {
        let pairs: Vec<&str> = self
            .set_cookies
            .iter()
            .filter_map(|cookie| cookie.split(';').next())
            .map(str::trim)
            .filter(|pair| pair.contains('='))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }
}

impl std::fmt::Debug for DriveResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_disposition", &self.content_disposition)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// HTTP seam between the resolver and the network.
///
/// Non-2xx statuses are returned as responses, not errors; only
/// connection-level failures become [`CacheError::Network`].
pub trait DriveFetcher: Send + Sync {
    fn fetch(&self, request: &DriveRequest) -> CacheResult<DriveResponse>;
}

/// Blocking [`DriveFetcher`] backed by a shared `ureq` agent.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .redirects(10)
            .user_agent(concat!("video-cache/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

impl DriveFetcher for HttpFetcher {
    fn fetch(&self, request: &DriveRequest) -> CacheResult<DriveResponse> {
        let mut call = self.agent.get(&request.url);
        if let Some(cookie) = &request.cookie {
            call = call.set("Cookie", cookie);
        }

        let response = match call.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(err)) => {
                return Err(CacheError::Network(err.to_string()));
            }
        };

        Ok(DriveResponse {
            status: response.status(),
            content_type: response.header("content-type").map(str::to_owned),
            content_disposition: response.header("content-disposition").map(str::to_owned),
            content_length: response
                .header("content-length")
                .and_then(|value| value.trim().parse().ok()),
            set_cookies: response
                .all("set-cookie")
                .into_iter()
                .map(str::to_owned)
                .collect(),
            body: Box::new(response.into_reader()),
        })
    }
}

/// Token (and optional session uuid) that unlocks a large-file download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub token: String,
    pub uuid: Option<String>,
    /// Target of the warning page's download form, when present.
    pub action: Option<String>,
}

/// Looks for a confirmation token in the `download_warning*` cookies first,
/// then in the warning page itself.
pub fn find_confirmation(set_cookies: &[String], page: &str) -> Option<Confirmation> {
    let from_cookie = set_cookies.iter().find_map(|cookie| {
        let pair = cookie.split(';').next()?.trim();
        let (name, value) = pair.split_once('=')?;
        (name.starts_with("download_warning") && !value.is_empty()).then(|| value.to_string())
    });

    let token = from_cookie
        .or_else(|| CONFIRM_INPUT.captures(page).map(|c| c[1].to_string()))
        .or_else(|| CONFIRM_LINK.captures(page).map(|c| c[1].to_string()))?;

    Some(Confirmation {
        token,
        uuid: UUID_INPUT.captures(page).map(|c| c[1].to_string()),
        action: FORM_ACTION
            .captures(page)
            .map(|c| c[1].replace("&amp;", "&")),
    })
}

fn confirmed_url(base: &str, file_id: &str, confirmation: &Confirmation) -> String {
    let endpoint = match &confirmation.action {
        Some(action) if action.starts_with("http") => action.trim_end_matches('?').to_string(),
        _ => format!("{}/uc", base.trim_end_matches('/')),
    };
    let mut url = format!(
        "{endpoint}?export=download&id={file_id}&confirm={}",
        confirmation.token
    );
    if let Some(uuid) = &confirmation.uuid {
        url.push_str("&uuid=");
        url.push_str(uuid);
    }
    url
}

/// Opens the content stream for `file_id`, passing through the large-file
/// warning page when Drive serves one.
///
/// The returned response may still carry a non-2xx status; the caller
/// decides how to report it.
pub fn open_download(
    fetcher: &dyn DriveFetcher,
    base: &str,
    file_id: &str,
) -> CacheResult<DriveResponse> {
    let first = fetcher.fetch(&DriveRequest {
        url: download_url(base, file_id),
        cookie: None,
    })?;

    if !first.is_success() || !first.is_textual() {
        return Ok(first);
    }

    let cookie = first.cookie_header();
    let DriveResponse {
        status,
        content_type,
        content_disposition,
        content_length,
        set_cookies,
        body,
    } = first;

    let mut page = Vec::new();
    let mut limited = body.take(CONFIRM_PAGE_LIMIT);
    limited
        .read_to_end(&mut page)
        .map_err(|err| CacheError::Network(format!("reading confirmation page: {err}")))?;
    let rest = limited.into_inner();

    let Some(confirmation) = find_confirmation(&set_cookies, &String::from_utf8_lossy(&page))
    else {
        // Not a warning page: hand back what we read so validation can
        // report the real content type.
        return Ok(DriveResponse {
            status,
            content_type,
            content_disposition,
            content_length,
            set_cookies,
            body: Box::new(Cursor::new(page).chain(rest)),
        });
    };

    debug!(file_id, "Drive asked for download confirmation; retrying with token");
    drop(rest);
    fetcher.fetch(&DriveRequest {
        url: confirmed_url(base, file_id, &confirmation),
        cookie,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io;

    fn read_body(response: &mut DriveResponse) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        response.body.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Replays canned responses and records every request it receives.
    pub(crate) struct ScriptedFetcher {
        pub responses: Mutex<Vec<CannedResponse>>,
        pub requests: Mutex<Vec<DriveRequest>>,
    }

    #[derive(Clone, Default)]
    pub(crate) struct CannedResponse {
        pub status: u16,
        pub content_type: Option<String>,
        pub content_disposition: Option<String>,
        pub content_length: Option<u64>,
        pub set_cookies: Vec<String>,
        pub body: Vec<u8>,
    }

    impl CannedResponse {
        pub fn video(content_type: &str, disposition: Option<&str>, body: &[u8]) -> Self {
            Self {
                status: 200,
                content_type: Some(content_type.into()),
                content_disposition: disposition.map(Into::into),
                content_length: Some(body.len() as u64),
                set_cookies: Vec::new(),
                body: body.to_vec(),
            }
        }

        pub fn status(status: u16) -> Self {
            Self {
                status,
                content_type: Some("text/html".into()),
                ..Self::default()
            }
        }
    }

    impl ScriptedFetcher {
        pub fn new(responses: Vec<CannedResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().len()
        }
    }

    impl DriveFetcher for ScriptedFetcher {
        fn fetch(&self, request: &DriveRequest) -> CacheResult<DriveResponse> {
            self.requests.lock().push(request.clone());
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                return Err(CacheError::Network("connection refused".into()));
            }
            let canned = responses.remove(0);
            Ok(DriveResponse {
                status: canned.status,
                content_type: canned.content_type,
                content_disposition: canned.content_disposition,
                content_length: canned.content_length,
                set_cookies: canned.set_cookies,
                body: Box::new(Cursor::new(canned.body)),
            })
        }
    }

    #[test]
    fn all_link_shapes_yield_the_same_id() {
        let id = "1AbC-d_EfGh23";
        let links = [
            format!("https://drive.google.com/file/d/{id}/view?usp=sharing"),
            format!("https://drive.google.com/file/d/{id}/view"),
            format!("https://drive.google.com/open?id={id}"),
            format!("https://drive.google.com/uc?id={id}&export=download"),
            format!("https://drive.google.com/uc?export=download&id={id}"),
            format!("https://docs.google.com/something?foo=bar&id={id}"),
        ];
        for link in links {
            assert_eq!(extract_file_id(&link).as_deref(), Some(id), "{link}");
        }
    }

    #[test]
    fn path_pattern_wins_over_query() {
        assert_eq!(
            extract_file_id("https://drive.google.com/file/d/pathid/view?id=queryid").as_deref(),
            Some("pathid")
        );
    }

    #[test]
    fn links_without_an_id_are_rejected() {
        for link in [
            "",
            "   ",
            "https://example.com/video.mp4",
            "https://drive.google.com/",
            "https://drive.google.com/open?usp=sharing",
        ] {
            assert_eq!(extract_file_id(link), None, "{link}");
        }
    }

    #[test]
    fn download_url_ignores_trailing_slash() {
        assert_eq!(
            download_url("https://drive.google.com/", "abc"),
            "https://drive.google.com/uc?export=download&id=abc"
        );
    }

    #[test]
    fn disposition_prefers_extended_filename() {
        let value = r#"attachment; filename="caf_.mp4"; filename*=UTF-8''caf%C3%A9.mp4"#;
        assert_eq!(filename_from_disposition(value).as_deref(), Some("café.mp4"));
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="My Clip.webm""#).as_deref(),
            Some("My Clip.webm")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=plain.mkv").as_deref(),
            Some("plain.mkv")
        );
        assert_eq!(filename_from_disposition("attachment"), None);
    }

    #[test]
    fn disposition_quoted_name_may_contain_separators() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="Part 1; Intro.mp4"; size=10"#)
                .as_deref(),
            Some("Part 1; Intro.mp4")
        );
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="say \"hi\"; now.webm""#)
                .as_deref(),
            Some(r#"say "hi"; now.webm"#)
        );
    }

    #[test]
    fn disposition_cannot_escape_or_hide() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="../../etc/passwd.mp4""#).as_deref(),
            Some("passwd.mp4")
        );
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="..\evil\.x.mp4""#).as_deref(),
            Some("x.mp4")
        );
        assert_eq!(filename_from_disposition(r#"attachment; filename="..""#), None);
    }

    #[test]
    fn confirmation_from_cookie() {
        let cookies = vec!["download_warning_1234_abc=TOKEN1; Path=/uc; Secure".to_string()];
        let found = find_confirmation(&cookies, "").unwrap();
        assert_eq!(found.token, "TOKEN1");
        assert_eq!(found.uuid, None);
    }

    #[test]
    fn confirmation_from_warning_form() {
        let page = r#"<form id="download-form" action="https://drive.usercontent.google.com/download" method="get">
            <input type="hidden" name="id" value="abc">
            <input type="hidden" name="confirm" value="t">
            <input type="hidden" name="uuid" value="1f2e-33">
        </form>"#;
        let found = find_confirmation(&[], page).unwrap();
        assert_eq!(found.token, "t");
        assert_eq!(found.uuid.as_deref(), Some("1f2e-33"));
        assert_eq!(
            confirmed_url(DEFAULT_DRIVE_BASE_URL, "abc", &found),
            "https://drive.usercontent.google.com/download?export=download&id=abc&confirm=t&uuid=1f2e-33"
        );
    }

    #[test]
    fn confirmation_from_legacy_link() {
        let page = r#"<a id="uc-download-link" href="/uc?export=download&amp;confirm=Xy_9&amp;id=abc">Download anyway</a>"#;
        let found = find_confirmation(&[], page).unwrap();
        assert_eq!(found.token, "Xy_9");
        assert_eq!(
            confirmed_url("https://drive.google.com", "abc", &found),
            "https://drive.google.com/uc?export=download&id=abc&confirm=Xy_9"
        );
    }

    #[test]
    fn plain_page_has_no_confirmation() {
        assert_eq!(find_confirmation(&[], "<html>Sign in</html>"), None);
    }

    #[test]
    fn warning_page_triggers_confirmed_retry_with_cookie() {
        let warning = CannedResponse {
            status: 200,
            content_type: Some("text/html; charset=utf-8".into()),
            set_cookies: vec![
                "download_warning_13058876669334088843_abc=tok; Path=/".into(),
                "NID=511=xyz; HttpOnly".into(),
            ],
            body: b"<html>Google Drive can't scan this file for viruses.</html>".to_vec(),
            ..CannedResponse::default()
        };
        let fetcher = ScriptedFetcher::new(vec![
            warning,
            CannedResponse::video("video/mp4", None, b"movie"),
        ]);

        let mut response = open_download(&fetcher, "https://drive.google.com", "abc").unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(read_body(&mut response).unwrap(), b"movie");

        let requests = fetcher.requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].cookie, None);
        assert_eq!(
            requests[1].url,
            "https://drive.google.com/uc?export=download&id=abc&confirm=tok"
        );
        assert_eq!(
            requests[1].cookie.as_deref(),
            Some("download_warning_13058876669334088843_abc=tok; NID=511=xyz")
        );
    }

    #[test]
    fn html_without_token_is_passed_through_intact() {
        let page = CannedResponse {
            status: 200,
            content_type: Some("text/html".into()),
            body: b"<html>not a video</html>".to_vec(),
            ..CannedResponse::default()
        };
        let fetcher = ScriptedFetcher::new(vec![page]);
        let mut response = open_download(&fetcher, "https://drive.google.com", "abc").unwrap();
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(response.content_type.as_deref(), Some("text/html"));
        assert_eq!(read_body(&mut response).unwrap(), b"<html>not a video</html>");
    }

    #[test]
    fn binary_response_is_not_retried() {
        let fetcher = ScriptedFetcher::new(vec![CannedResponse::video(
            "video/webm",
            None,
            b"webm",
        )]);
        let response = open_download(&fetcher, "https://drive.google.com", "abc").unwrap();
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(response.content_type.as_deref(), Some("video/webm"));
    }

    #[test]
    fn error_status_is_returned_without_retry() {
        let fetcher = ScriptedFetcher::new(vec![CannedResponse::status(403)]);
        let response = open_download(&fetcher, "https://drive.google.com", "abc").unwrap();
        assert_eq!(response.status, 403);
        assert_eq!(fetcher.calls(), 1);
    }

    mod http {
        use super::*;
        use axum::{
            Router,
            extract::Query,
            http::{HeaderMap, StatusCode, header},
            response::{IntoResponse, Response},
            routing::get,
        };
        use std::collections::HashMap;

        /// Minimal stand-in for Drive's `uc` endpoint: a warning page with a
        /// cookie first, the file once the token and cookie come back.
        async fn fake_uc(
            Query(params): Query<HashMap<String, String>>,
            headers: HeaderMap,
        ) -> Response {
            if params.get("id").map(String::as_str) == Some("private") {
                return (StatusCode::FORBIDDEN, "sign in").into_response();
            }
            if params.get("confirm").map(String::as_str) != Some("tok") {
                return (
                    [
                        (header::CONTENT_TYPE, "text/html; charset=utf-8"),
                        (header::SET_COOKIE, "download_warning_x=tok; Path=/"),
                    ],
                    "<html>Google Drive can't scan this file for viruses.</html>",
                )
                    .into_response();
            }
            let cookie = headers
                .get(header::COOKIE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default();
            if !cookie.contains("download_warning_x=tok") {
                return (StatusCode::FORBIDDEN, "missing session").into_response();
            }
            (
                [
                    (header::CONTENT_TYPE, "video/mp4"),
                    (header::CONTENT_DISPOSITION, "attachment; filename=\"big.mp4\""),
                ],
                "movie-bytes",
            )
                .into_response()
        }

        async fn spawn_fake_drive() -> String {
            let app = Router::new().route("/uc", get(fake_uc));
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
            format!("http://{addr}")
        }

        fn fetcher() -> HttpFetcher {
            HttpFetcher::new(Duration::from_secs(5), Duration::from_secs(5))
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn warning_page_round_trip_over_http() {
            let base = spawn_fake_drive().await;
            let (disposition, body) = tokio::task::spawn_blocking(move || {
                let mut response = open_download(&fetcher(), &base, "abc").unwrap();
                assert_eq!(response.status, 200);
                assert_eq!(response.content_type.as_deref(), Some("video/mp4"));
                (response.content_disposition.clone(), read_body(&mut response).unwrap())
            })
            .await
            .unwrap();
            assert_eq!(disposition.as_deref(), Some("attachment; filename=\"big.mp4\""));
            assert_eq!(body, b"movie-bytes");
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn error_status_is_a_response_not_an_error() {
            let base = spawn_fake_drive().await;
            let status = tokio::task::spawn_blocking(move || {
                open_download(&fetcher(), &base, "private").unwrap().status
            })
            .await
            .unwrap();
            assert_eq!(status, 403);
        }

        #[test]
        fn unreachable_host_is_a_network_error() {
            // Port 9 (discard) on localhost is closed on test machines.
            let result = fetcher().fetch(&DriveRequest {
                url: "http://127.0.0.1:9/uc?export=download&id=x".into(),
                cookie: None,
            });
            assert!(matches!(result, Err(CacheError::Network(_))));
        }
    }
}
