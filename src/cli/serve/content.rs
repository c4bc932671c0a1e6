//! Live-reload injection into served HTML.

use super::LIVERELOAD_PATH;

/// Inject the live-reload script if the content is HTML.
pub fn maybe_inject_livereload(body: Vec<u8>, content_type: &str) -> Vec<u8> {
    if crate::utils::mime::is_html(content_type) {
        inject_livereload_script(&body)
    } else {
        body
    }
}

/// Insert the script tag before the last `</body>`, or append it.
fn inject_livereload_script(content: &[u8]) -> Vec<u8> {
    let script = format!(r#"<script src="{LIVERELOAD_PATH}"></script>"#);
    let script = script.as_bytes();

    const PATTERN: &[u8] = b"</body>";
    let pos = content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
        .unwrap_or(content.len());

    let mut result = Vec::with_capacity(content.len() + script.len());
    result.extend_from_slice(&content[..pos]);
    result.extend_from_slice(script);
    result.extend_from_slice(&content[pos..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAG: &str = r#"<script src="/__kiln/livereload.js"></script>"#;

    #[test]
    fn test_inject_before_body_close() {
        let html = b"<html><body><p>hi</p></BODY></html>".to_vec();
        let out = String::from_utf8(maybe_inject_livereload(html, "text/html; charset=utf-8")).unwrap();
        assert_eq!(out, format!("<html><body><p>hi</p>{TAG}</BODY></html>"));
    }

    #[test]
    fn test_inject_appends_without_body() {
        let out = String::from_utf8(maybe_inject_livereload(b"<p>x</p>".to_vec(), "text/html")).unwrap();
        assert_eq!(out, format!("<p>x</p>{TAG}"));
    }

    #[test]
    fn test_non_html_untouched() {
        let css = b"body{}</body>".to_vec();
        assert_eq!(maybe_inject_livereload(css.clone(), "text/css"), css);
    }
}
