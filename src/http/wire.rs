//! HTTP/1.1 request reading and response writing over a blocking stream.
//!
//! Requests are read incrementally until the blank line that ends the head,
//! then exactly `Content-Length` body bytes are read. Without a
//! `Content-Length` the body is whatever arrived together with the head.

use super::request::{Method, Request};
use super::response::{reason_phrase, Response};
use std::io::{self, Read, Write};
use std::time::SystemTime;
use thiserror::Error;

/// Size of each socket read.
pub const READ_CHUNK: usize = 8 * 1024;
pub const MAX_HEADER_BYTES: usize = 64 * 1024;
pub const MAX_HEADERS: usize = 64;

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

#[derive(Debug, Error)]
pub enum WireError {
    #[error("connection closed before a request was received")]
    Closed,
    #[error("malformed request: {0}")]
    Malformed(&'static str),
    #[error("request headers too large")]
    HeadersTooLarge,
    #[error("request body exceeds the {limit} byte limit")]
    BodyTooLarge { limit: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_body_size: usize,
    pub max_header_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_body_size: 10 * 1024 * 1024,
            max_header_bytes: MAX_HEADER_BYTES,
        }
    }
}

/// Reads one request from `stream`, using `buf` as scratch space.
pub fn read_request<R: Read>(
    stream: &mut R,
    buf: &mut Vec<u8>,
    limits: &Limits,
) -> Result<Request, WireError> {
    let mut chunk = [0u8; READ_CHUNK];
    let mut scanned = 0;

    let head_end = loop {
        if let Some(pos) = find(&buf[scanned..], HEAD_TERMINATOR) {
            break scanned + pos;
        }
        scanned = buf.len().saturating_sub(HEAD_TERMINATOR.len() - 1);
        if buf.len() > limits.max_header_bytes {
            return Err(WireError::HeadersTooLarge);
        }
        let n = read_some(stream, &mut chunk)?;
        if n == 0 {
            return Err(if buf.is_empty() {
                WireError::Closed
            } else {
                WireError::Malformed("connection closed inside request head")
            });
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = std::str::from_utf8(&buf[..head_end])
        .map_err(|_| WireError::Malformed("request head is not valid UTF-8"))?;
    let mut request = parse_head(head)?;

    let buffered = &buf[head_end + HEAD_TERMINATOR.len()..];
    request.body = match content_length(&request)? {
        Some(len) if len > limits.max_body_size => {
            return Err(WireError::BodyTooLarge {
                limit: limits.max_body_size,
            })
        }
        Some(len) if buffered.len() >= len => buffered[..len].to_vec(),
        Some(len) => {
            let mut body = Vec::with_capacity(len);
            body.extend_from_slice(buffered);
            let remaining = (len - body.len()) as u64;
            stream.by_ref().take(remaining).read_to_end(&mut body)?;
            if body.len() < len {
                return Err(WireError::Malformed("body shorter than Content-Length"));
            }
            body
        }
        None if buffered.len() > limits.max_body_size => {
            return Err(WireError::BodyTooLarge {
                limit: limits.max_body_size,
            })
        }
        None => buffered.to_vec(),
    };

    Ok(request)
}

fn read_some<R: Read>(stream: &mut R, chunk: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(chunk) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn parse_head(head: &str) -> Result<Request, WireError> {
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();

    let mut parts = request_line.split_whitespace();
    let (method, target, version) = match (parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(t), Some(v)) => (m, t, v),
        _ => return Err(WireError::Malformed("invalid request line")),
    };
    if !version.starts_with("HTTP/") {
        return Err(WireError::Malformed("invalid HTTP version"));
    }
    if !target.starts_with('/') {
        return Err(WireError::Malformed("invalid request target"));
    }
    let method = Method::from_string(method).ok_or(WireError::Malformed("unsupported method"))?;

    let mut request = Request::new(method, target);
    for line in lines {
        if let Some((key, value)) = line.split_once(':') {
            if request.headers.len() == MAX_HEADERS {
                return Err(WireError::HeadersTooLarge);
            }
            request
                .headers
                .push((key.trim().to_owned(), value.trim().to_owned()));
        }
    }
    Ok(request)
}

/// Every `Content-Length` header must be plain digits, and repeats must agree.
fn content_length(request: &Request) -> Result<Option<usize>, WireError> {
    let mut length = None;
    for (_, raw) in request
        .headers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case("content-length"))
    {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(WireError::Malformed("invalid Content-Length"));
        }
        let parsed = raw
            .parse::<usize>()
            .map_err(|_| WireError::Malformed("invalid Content-Length"))?;
        match length {
            Some(seen) if seen != parsed => {
                return Err(WireError::Malformed("conflicting Content-Length headers"))
            }
            _ => length = Some(parsed),
        }
    }
    Ok(length)
}

/// Serializes the status line, headers and (unless `head_only`) the body.
pub fn serialize_response(res: &Response, head_only: bool) -> Vec<u8> {
    let status = res.status_code();
    let mut head = format!("HTTP/1.1 {} {}\r\n", status, reason_phrase(status));

    for (name, value) in &res.headers {
        if name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    if res.get_header("Date").is_none() {
        head.push_str(&format!("Date: {}\r\n", httpdate::fmt_http_date(SystemTime::now())));
    }
    if res.get_header("Connection").is_none() {
        head.push_str("Connection: close\r\n");
    }
    head.push_str(&format!("Content-Length: {}\r\n\r\n", res.body().len()));

    let mut out = head.into_bytes();
    if !head_only {
        out.extend_from_slice(res.body());
    }
    out
}

pub fn write_response<W: Write>(out: &mut W, res: &Response, head_only: bool) -> io::Result<()> {
    out.write_all(&serialize_response(res, head_only))?;
    out.flush()
}
