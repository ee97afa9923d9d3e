//! Text extraction for fetched documentation bodies.
//!
//! Fetching supplies bytes plus a content type; this module reduces HTML and
//! PDF payloads to plain UTF-8 text for chunking. Plain text passes through
//! untouched at the call site.

use crate::error::{Error, Result};

/// Elements whose text content never reaches the page.
fn is_invisible_element(name: &[u8]) -> bool {
    matches!(name, b"script" | b"style")
}

/// Reduces an HTML document to its visible text.
///
/// Script and style bodies are dropped, entities are unescaped, and text
/// events are joined with newlines so later chunking can cut between them.
/// Real-world HTML is rarely well-formed XML, so end-tag checking is off;
/// errors the reader cannot recover from surface as build failures.
pub fn html_to_text(html: &str) -> Result<String> {
    let mut reader = quick_xml::Reader::from_reader(html.as_bytes());
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;

    let mut out = String::new();
    let mut buf = Vec::new();
    let mut skip_depth = 0usize;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if is_invisible_element(e.local_name().as_ref()) {
                    skip_depth += 1;
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if is_invisible_element(e.local_name().as_ref()) {
                    skip_depth = skip_depth.saturating_sub(1);
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if skip_depth == 0 => {
                let text = te.unescape().unwrap_or_default();
                let text = text.trim();
                if !text.is_empty() {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(text);
                }
            }
            Ok(quick_xml::events::Event::CData(cd)) if skip_depth == 0 => {
                let text = String::from_utf8_lossy(cd.as_ref());
                let text = text.trim();
                if !text.is_empty() {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(text);
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => {
                return Err(Error::BuildFailure(format!("HTML extraction failed: {e}")));
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// Extracts plain text from PDF bytes. Malformed input is a build failure,
/// never a panic; the caller skips the resource and records the message.
pub fn pdf_to_text(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| Error::BuildFailure(format!("PDF extraction failed: {e}")))
}
