//! Opening handshake text: the upgrade request and the status line.
//!
//! Response headers are never interpreted; only the status code of the
//! first line decides whether the upgrade succeeded.

// ============================================================================
// Imports
// ============================================================================

use std::net::Ipv6Addr;

use base64::prelude::*;

use crate::entropy::KeySource;
use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// WebSocket protocol version sent in the request.
pub const WEBSOCKET_VERSION: &str = "13";

/// Status code that accepts the upgrade.
pub const SWITCHING_PROTOCOLS: &[u8] = b"101";

/// Raw length of the `Sec-WebSocket-Key` nonce.
pub const CLIENT_KEY_LEN: usize = 16;

/// Length of the base64 text of a [`CLIENT_KEY_LEN`]-byte nonce.
pub const ENCODED_KEY_LEN: usize = CLIENT_KEY_LEN.div_ceil(3) * 4;

/// Port that may be omitted from the `Host` header.
const DEFAULT_HTTP_PORT: u16 = 80;

// ============================================================================
// Request
// ============================================================================

/// Draws a fresh base64-encoded `Sec-WebSocket-Key`.
pub fn generate_key(source: &mut dyn KeySource) -> String {
    let mut nonce = [0u8; CLIENT_KEY_LEN];
    source.fill(&mut nonce);
    BASE64_STANDARD.encode(nonce)
}

/// Renders the HTTP upgrade request, blank line included.
///
/// IPv6 literals are bracketed in `Host` and `Origin`.
#[must_use]
pub fn render_request(uri: &str, host: &str, port: u16, key: &str) -> String {
    let uri = if uri.is_empty() { "/" } else { uri };
    let host = if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{host}]")
    } else {
        host.to_owned()
    };
    let authority = if port == DEFAULT_HTTP_PORT {
        host.clone()
    } else {
        format!("{host}:{port}")
    };

    format!(
        "GET {uri} HTTP/1.1\r\n\
         Host: {authority}\r\n\
         Connection: Upgrade\r\n\
         Upgrade: WebSocket\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Origin: ws://{host}\r\n\
         Sec-WebSocket-Version: {WEBSOCKET_VERSION}\r\n\
         \r\n"
    )
}

/// Byte length [`render_request`] will produce for this target.
///
/// Lets the caller wait for transmit space before drawing a key.
#[must_use]
pub fn request_len(uri: &str, host: &str, port: u16) -> usize {
    render_request(uri, host, port, &"=".repeat(ENCODED_KEY_LEN)).len()
}

// ============================================================================
// Response
// ============================================================================

/// Checks a status line (terminator included or not) for code `101`.
///
/// The version token up to the first space is skipped, and the next
/// token must be exactly `101`.
///
/// # Errors
///
/// Returns [`Error::HandshakeRejected`] carrying the status token found.
pub fn check_status_line(line: &[u8]) -> Result<()> {
    let line = trim_line_end(line);
    let rest = match line.iter().position(|&b| b == b' ') {
        Some(space) => &line[space + 1..],
        None => &[][..],
    };
    let code_end = rest.iter().position(|&b| b == b' ').unwrap_or(rest.len());
    let code = &rest[..code_end];

    if code == SWITCHING_PROTOCOLS {
        Ok(())
    } else {
        Err(Error::handshake_rejected(String::from_utf8_lossy(code)))
    }
}

/// Returns `true` for the empty line that ends the header block.
#[inline]
#[must_use]
pub fn is_header_terminator(line: &[u8]) -> bool {
    trim_line_end(line).is_empty()
}

/// Strips a trailing `\n` and an optional `\r` before it.
fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

// ============================================================================
// Tests
// ============================================================================
