//! Documentation page fetching.
//!
//! Downloads one URL, decides the body format from the content type (with a
//! light sniff when the header is missing or generic), and hands HTML and PDF
//! bodies to [`crate::extract`]. Anything else is treated as plain text.

use std::time::Duration;

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use crate::extract;

/// Downloads a documentation page and returns its plain text.
///
/// Network errors and non-success statuses are build failures; the caller
/// records the message on the resource instead of aborting the process.
pub async fn fetch_documentation(url: &str, cfg: &FetchConfig) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .build()
        .map_err(|e| Error::BuildFailure(format!("HTTP client init failed: {e}")))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::BuildFailure(format!("fetching {url} failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::BuildFailure(format!(
            "fetching {url} returned HTTP {}",
            status.as_u16()
        )));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::BuildFailure(format!("reading body of {url} failed: {e}")))?;

    tracing::debug!(url, content_type, bytes = bytes.len(), "fetched documentation page");
    body_to_text(&content_type, &bytes, url)
}

/// Converts a fetched body to text based on content type and a byte sniff.
pub fn body_to_text(content_type: &str, bytes: &[u8], url: &str) -> Result<String> {
    if content_type.contains("application/pdf") || looks_like_pdf(bytes, url) {
        return extract::pdf_to_text(bytes);
    }
    if content_type.contains("text/html")
        || content_type.contains("xhtml")
        || looks_like_html(bytes)
    {
        let html = String::from_utf8_lossy(bytes);
        return extract::html_to_text(&html);
    }
    // Plain text and everything unrecognized; invalid UTF-8 is replaced.
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn looks_like_pdf(bytes: &[u8], url: &str) -> bool {
    bytes.starts_with(b"%PDF-") || url.to_ascii_lowercase().ends_with(".pdf")
}

fn looks_like_html(bytes: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]).to_ascii_lowercase();
    let head = head.trim_start();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_body_is_reduced_to_text() {
        let body = b"<html><body><p>install with cargo add</p></body></html>";
        let text = body_to_text("text/html; charset=utf-8", body, "https://docs.example/guide").unwrap();
        assert_eq!(text, "install with cargo add");
    }

    #[test]
    fn test_html_sniffed_without_content_type() {
        let body = b"<!DOCTYPE html><html><body>sniffed</body></html>";
        let text = body_to_text("", body, "https://docs.example/page").unwrap();
        assert!(text.contains("sniffed"));
    }

    #[test]
    fn test_plain_text_passes_through() {
        let body = b"just a changelog\nversion 2.0";
        let text = body_to_text("text/plain", body, "https://docs.example/CHANGELOG").unwrap();
        assert_eq!(text, "just a changelog\nversion 2.0");
    }

    #[test]
    fn test_pdf_url_with_garbage_body_is_build_failure() {
        let err = body_to_text("", b"garbage", "https://docs.example/manual.pdf").unwrap_err();
        assert!(matches!(err, Error::BuildFailure(_)));
    }

    #[test]
    fn test_invalid_utf8_is_replaced_not_fatal() {
        let body = [0x66, 0x6f, 0x6f, 0xff, 0x62, 0x61, 0x72];
        let text = body_to_text("text/plain", &body, "https://docs.example/raw").unwrap();
        assert!(text.starts_with("foo"));
        assert!(text.ends_with("bar"));
    }
}
