//! Development server. Builds the site against `http://localhost:{port}/`,
//! rebuilds it whenever a source file changes (see [`crate::watch`]), and
//! serves the output directory with `tiny_http`.
//!
//! Request resolution order:
//!
//! 1. Exact file match
//! 2. Directory with an `index.html`
//! 3. The site's `404.html`, with status 404
//! 4. A plain-text 404

use crate::build::{build_site, Error as BuildError};
use crate::config::{Config, Error as ConfigError, Overrides};
use crate::watch;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tiny_http::{Header, Request, Response, Server, StatusCode};
use tracing::{info, warn};
use url::Url;

/// The port used when none is given on the command line.
pub const DEFAULT_PORT: u16 = 8080;

/// Sent with every response so the browser always shows the latest build.
const NO_CACHE_HEADERS: &[(&str, &str)] = &[
    ("Cache-Control", "no-cache, no-store, must-revalidate"),
    ("Pragma", "no-cache"),
    ("Expires", "0"),
];

/// Builds the site found in `site_directory` (or an ancestor), then serves
/// it on `port` until the process is killed, rebuilding on changes. The
/// site URL in `overrides` is replaced with the local server's address.
pub fn serve(site_directory: &Path, mut overrides: Overrides, port: u16) -> Result<()> {
    overrides.base_url = Some(local_url(port)?);
    let config = Config::from_directory(site_directory, overrides.clone())?;
    build_site(&config)?;

    let server = Server::http(("127.0.0.1", port)).map_err(|e| Error::Bind {
        port,
        err: e.to_string(),
    })?;
    watch::spawn(&config, overrides)?;

    info!(url = %config.site.url, output = %config.output_directory.display(), "serving site");
    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &config.output_directory) {
            warn!(error = %e, "request failed");
        }
    }
    Ok(())
}

fn local_url(port: u16) -> Result<Url> {
    Ok(Url::parse(&format!("http://localhost:{}/", port))?)
}

/// Where a request path leads within the output directory.
#[derive(Debug, PartialEq)]
enum Resolved {
    Found(PathBuf),
    NotFoundPage(PathBuf),
    NotFound,
}

fn resolve(root: &Path, request_url: &str) -> Resolved {
    let path = request_url
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or_default();

    // A path that isn't valid percent-encoded UTF-8 (e.g. `/%FF`) names no
    // file.
    if let Ok(decoded) = urlencoding::decode(path) {
        if let Some(found) = lookup(root, Path::new(decoded.trim_start_matches('/'))) {
            return Resolved::Found(found);
        }
    }

    let not_found = root.join("404.html");
    match not_found.is_file() {
        true => Resolved::NotFoundPage(not_found),
        false => Resolved::NotFound,
    }
}

fn lookup(root: &Path, relative: &Path) -> Option<PathBuf> {
    // Only plain names may appear; `..`, roots and drive prefixes would
    // escape the output directory.
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }

    let local = root.join(relative);
    if local.is_file() {
        return Some(local);
    }
    let index = local.join("index.html");
    match local.is_dir() && index.is_file() {
        true => Some(index),
        false => None,
    }
}

fn handle_request(request: Request, root: &Path) -> Result<()> {
    let resolved = resolve(root, request.url());
    let (status, content_type, body) = match &resolved {
        Resolved::Found(path) => (200, content_type(path), fs::read(path)?),
        Resolved::NotFoundPage(path) => (404, content_type(path), fs::read(path)?),
        Resolved::NotFound => (404, "text/plain; charset=utf-8", b"404 Not Found".to_vec()),
    };

    let mut response = Response::from_data(body).with_status_code(StatusCode(status));
    for header in headers(content_type) {
        response = response.with_header(header);
    }
    request.respond(response)?;
    Ok(())
}

fn headers(content_type: &str) -> Vec<Header> {
    std::iter::once(("Content-Type", content_type))
        .chain(NO_CACHE_HEADERS.iter().copied())
        .filter_map(|(name, value)| Header::from_bytes(name.as_bytes(), value.as_bytes()).ok())
        .collect()
}

/// Guesses a MIME type from the file extension.
fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("atom") => "application/atom+xml; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// The result of a fallible server operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem starting or running the development server.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Returned when the initial build fails. Later build failures are
    /// logged and the previous output keeps being served.
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("listening on port {port}: {err}")]
    Bind { port: u16, err: String },

    #[error(transparent)]
    Watch(#[from] watch::Error),

    #[error(transparent)]
    UrlParse(#[from] url::ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod test {
    use super::*;

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("hello")).unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        fs::write(dir.path().join("index.html"), "home").unwrap();
        fs::write(dir.path().join("hello").join("index.html"), "hello").unwrap();
        fs::write(dir.path().join("hello world.txt"), "spaced").unwrap();
        dir
    }

    #[test]
    fn test_resolve_files_and_directories() {
        let dir = site();
        let root = dir.path();
        assert_eq!(Resolved::Found(root.join("index.html")), resolve(root, "/"));
        assert_eq!(
            Resolved::Found(root.join("hello").join("index.html")),
            resolve(root, "/hello/")
        );
        assert_eq!(
            Resolved::Found(root.join("hello").join("index.html")),
            resolve(root, "/hello?utm=1")
        );
        assert_eq!(
            Resolved::Found(root.join("hello world.txt")),
            resolve(root, "/hello%20world.txt")
        );
    }

    #[test]
    fn test_resolve_not_found() {
        let dir = site();
        let root = dir.path();
        assert_eq!(Resolved::NotFound, resolve(root, "/missing/"));
        assert_eq!(Resolved::NotFound, resolve(root, "/empty/"));

        fs::write(root.join("404.html"), "not found").unwrap();
        assert_eq!(
            Resolved::NotFoundPage(root.join("404.html")),
            resolve(root, "/missing/")
        );
    }

    #[test]
    fn test_resolve_rejects_parent_directories() {
        let dir = site();
        let root = dir.path().join("hello");
        assert_eq!(Resolved::NotFound, resolve(&root, "/../index.html"));
        assert_eq!(Resolved::NotFound, resolve(&root, "/%2e%2e/index.html"));
    }

    #[test]
    fn test_resolve_undecodable_path() {
        let dir = site();
        let root = dir.path();
        assert_eq!(Resolved::NotFound, resolve(root, "/%FF"));
        assert_eq!(Resolved::NotFound, resolve(root, "/hello/%C3%28"));

        fs::write(root.join("404.html"), "not found").unwrap();
        assert_eq!(Resolved::NotFoundPage(root.join("404.html")), resolve(root, "/%FF"));
    }

    #[test]
    fn test_headers() {
        let headers = headers("text/html; charset=utf-8");
        let find = |name: &'static str| {
            headers
                .iter()
                .find(|h| h.field.equiv(name))
                .map(|h| h.value.as_str().to_owned())
        };
        assert_eq!(Some("text/html; charset=utf-8".to_owned()), find("Content-Type"));
        assert_eq!(
            Some("no-cache, no-store, must-revalidate".to_owned()),
            find("Cache-Control")
        );
        assert_eq!(Some("no-cache".to_owned()), find("Pragma"));
        assert_eq!(Some("0".to_owned()), find("Expires"));
    }

    #[test]
    fn test_content_type() {
        assert_eq!("application/atom+xml; charset=utf-8", content_type(Path::new("feed.atom")));
        assert_eq!("text/css; charset=utf-8", content_type(Path::new("css/syntax.css")));
        assert_eq!("application/octet-stream", content_type(Path::new(".basalt")));
    }
}
