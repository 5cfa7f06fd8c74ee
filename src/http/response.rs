use crate::error::ServerError;
use crate::json::Value;
use serde::Serialize;

/// An outbound response.
///
/// Body setters (`send`, `send_bytes`, `json`, `json_value`, `text`, `html`)
/// are terminal: the first one marks the response as sent and later ones are
/// ignored.
#[derive(Debug, Default)]
pub struct Response {
    status: Option<u16>,
    pub headers: Vec<(String, String)>,
    body: Vec<u8>,
    sent: bool,
}

impl Response {
    pub fn new() -> Response {
        Response::default()
    }

    pub fn with_status(status: u16) -> Response {
        Response {
            status: Some(status),
            ..Response::default()
        }
    }

    /// The status code, 200 when never set.
    pub fn status_code(&self) -> u16 {
        self.status.unwrap_or(200)
    }

    pub fn has_status(&self) -> bool {
        self.status.is_some()
    }

    // Chainable status setter
    pub fn status(&mut self, status: u16) -> &mut Self {
        self.status = Some(status);
        self
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// Appends a header; repeated names are kept.
    pub fn header<K: AsRef<str>, V: AsRef<str>>(&mut self, name: K, value: V) -> &mut Self {
        self.headers
            .push((name.as_ref().to_string(), value.as_ref().to_string()));
        self
    }

    /// Replaces every header named `name` (case-insensitively) with one value.
    pub fn set_header<K: AsRef<str>, V: AsRef<str>>(&mut self, name: K, value: V) -> &mut Self {
        self.remove_header(name.as_ref());
        self.header(name, value)
    }

    pub fn remove_header(&mut self, name: &str) -> &mut Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets the body, defaulting `Content-Type` to `text/plain`.
    pub fn send<T: AsRef<str>>(&mut self, body: T) -> &mut Self {
        self.send_bytes(body.as_ref().as_bytes().to_vec())
    }

    /// Sets a raw body, defaulting `Content-Type` to `text/plain`.
    pub fn send_bytes(&mut self, body: Vec<u8>) -> &mut Self {
        if self.sent {
            tracing::warn!("response already sent; ignoring body write");
            return self;
        }
        if self.get_header("Content-Type").is_none() {
            self.header("Content-Type", "text/plain");
        }
        self.body = body;
        self.sent = true;
        self
    }

    fn send_typed(&mut self, content_type: &str, body: Vec<u8>) -> &mut Self {
        if self.sent {
            tracing::warn!("response already sent; ignoring body write");
            return self;
        }
        self.set_header("Content-Type", content_type);
        self.send_bytes(body)
    }

    /// Serializes `value` with the embedded JSON engine.
    pub fn json_value(&mut self, value: &Value) -> &mut Self {
        self.send_typed("application/json", value.stringify().into_bytes())
    }

    /// Serializes any serde value as the JSON body.
    pub fn json<T: Serialize>(&mut self, value: &T) -> Result<&mut Self, ServerError> {
        let json_string = serde_json::to_string(value)
            .map_err(|e| ServerError::InternalError(format!("JSON serialization error: {}", e)))?;
        Ok(self.send_typed("application/json", json_string.into_bytes()))
    }

    /// Sends a pre-serialized JSON document.
    pub fn raw_json<T: AsRef<str>>(&mut self, json: T) -> &mut Self {
        self.send_typed("application/json", json.as_ref().as_bytes().to_vec())
    }

    pub fn text<T: AsRef<str>>(&mut self, content: T) -> &mut Self {
        self.send_typed("text/plain", content.as_ref().as_bytes().to_vec())
    }

    pub fn html<T: AsRef<str>>(&mut self, content: T) -> &mut Self {
        self.send_typed("text/html", content.as_ref().as_bytes().to_vec())
    }

    pub fn redirect(&mut self, location: &str) -> &mut Self {
        self.status(302).set_header("Location", location)
    }

    pub fn no_cache(&mut self) -> &mut Self {
        self.set_header("Cache-Control", "no-cache, no-store, must-revalidate")
            .set_header("Pragma", "no-cache")
            .set_header("Expires", "0")
    }

    /// JSON error body in the `{"error":{"message","status"}}` shape.
    pub fn error(err: &ServerError) -> Response {
        let status = err.status_code();
        let mut response = Response::with_status(status);
        response.json_value(
            &Value::object().with(
                "error",
                Value::object()
                    .with("message", err.to_string())
                    .with("status", status),
            ),
        );
        response
    }
}

/// Reason phrase for the status line.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        413 => "Payload Too Large",
        415 => "Unsupported Media Type",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}
