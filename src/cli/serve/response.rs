//! HTTP response handlers.

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use super::ServeContext;
use super::content::maybe_inject_livereload;
use crate::utils::mime::{self, types};

/// Page shown until the initial build finishes; reloads on the first result.
const LOADING_HTML: &str = "<!doctype html><html><head><meta charset=\"utf-8\"><title>kiln</title></head>\
<body><p>Building&hellip;</p></body></html>";

/// Respond with a static file, injecting live reload into HTML.
pub fn respond_file(request: Request, path: &Path, ctx: &ServeContext) -> Result<()> {
    let content_type = mime::from_path(path);

    if is_head_request(&request) {
        return send_head(request, 200, content_type, ctx);
    }

    let body = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let body = maybe_inject_livereload(body, content_type);
    send_body(request, 200, content_type, body, ctx)
}

/// Respond with 404 (serve root `404.html` if present).
pub fn respond_not_found(request: Request, ctx: &ServeContext) -> Result<()> {
    let custom = ctx.root.join("404.html");

    if is_head_request(&request) {
        let content_type = if custom.is_file() { types::HTML } else { types::PLAIN };
        return send_head(request, 404, content_type, ctx);
    }

    if let Ok(body) = fs::read(&custom) {
        let body = maybe_inject_livereload(body, types::HTML);
        return send_body(request, 404, types::HTML, body, ctx);
    }

    send_body(request, 404, types::PLAIN, b"404 Not Found".to_vec(), ctx)
}

/// Respond with the loading page (initial build still running).
pub fn respond_loading(request: Request, ctx: &ServeContext) -> Result<()> {
    let body = maybe_inject_livereload(LOADING_HTML.as_bytes().to_vec(), types::HTML);
    send_body(request, 503, types::HTML, body, ctx)
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request, ctx: &ServeContext) -> Result<()> {
    send_body(request, 503, types::PLAIN, b"503 Service Unavailable".to_vec(), ctx)
}

/// Respond with livereload.js from memory.
pub fn respond_livereload_js(request: Request, ctx: &ServeContext) -> Result<()> {
    use crate::embed::serve::{LIVERELOAD_JS, LivereloadVars};

    let body = LIVERELOAD_JS.render(&LivereloadVars {
        ws_port: ctx.ws_port,
    });
    send_body(request, 200, types::JAVASCRIPT, body.into_bytes(), ctx)
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &str, ctx: &ServeContext) -> Result<()> {
    let response = with_headers(Response::empty(StatusCode(status)), content_type, ctx);
    request.respond(response)?;
    Ok(())
}

fn send_body(
    request: Request,
    status: u16,
    content_type: &str,
    body: Vec<u8>,
    ctx: &ServeContext,
) -> Result<()> {
    let response = with_headers(
        Response::from_data(body).with_status_code(StatusCode(status)),
        content_type,
        ctx,
    );
    request.respond(response)?;
    Ok(())
}

/// Content type, no-cache and the configured CSP.
fn with_headers<R: Read>(
    mut response: Response<R>,
    content_type: &str,
    ctx: &ServeContext,
) -> Response<R> {
    let mut headers = vec![
        ("Content-Type", content_type),
        ("Cache-Control", "no-store"),
    ];
    if let Some(csp) = ctx.csp.as_deref() {
        headers.push(("Content-Security-Policy", csp));
    }

    for (key, value) in headers {
        match Header::from_bytes(key.as_bytes(), value.as_bytes()) {
            Ok(header) => response.add_header(header),
            Err(()) => crate::debug!("serve"; "invalid header value for {}", key),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header<R: Read>(response: &Response<R>, key: &str) -> Option<String> {
        response
            .headers()
            .iter()
            .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case(key))
            .map(|h| h.value.to_string())
    }

    #[test]
    fn test_headers_include_csp() {
        let ctx = ServeContext {
            root: "/site/app".into(),
            ws_port: 35729,
            csp: Some("default-src 'self'".to_string()),
        };
        let response = with_headers(Response::empty(StatusCode(200)), types::CSS, &ctx);
        assert_eq!(header(&response, "content-type").as_deref(), Some(types::CSS));
        assert_eq!(
            header(&response, "Content-Security-Policy").as_deref(),
            Some("default-src 'self'")
        );
    }

    #[test]
    fn test_headers_without_csp() {
        let ctx = ServeContext {
            root: "/site/app".into(),
            ws_port: 35729,
            csp: None,
        };
        let response = with_headers(Response::empty(StatusCode(404)), types::PLAIN, &ctx);
        assert!(header(&response, "Content-Security-Policy").is_none());
        assert_eq!(header(&response, "Cache-Control").as_deref(), Some("no-store"));
    }
}
