use crate::http::{Method, Request, Response};
use crate::json::Value;
use crate::middleware::{Flow, Middleware};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct SecurityConfig {
    pub hsts: bool,
    pub xss_protection: bool,
    pub content_type_options: bool,
    pub frame_options: Option<String>,
    pub content_security_policy: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            hsts: true,
            xss_protection: true,
            content_type_options: true,
            frame_options: Some("DENY".to_string()),
            content_security_policy: None,
        }
    }
}

/// Adds hardening headers to every response.
pub struct SecurityHeaders {
    config: SecurityConfig,
}

impl SecurityHeaders {
    pub fn new(config: SecurityConfig) -> Self {
        Self { config }
    }
}

impl Middleware for SecurityHeaders {
    fn handle(&self, _req: &mut Request, res: &mut Response) -> Flow {
        if self.config.hsts {
            res.set_header("Strict-Transport-Security", "max-age=31536000");
        }
        if self.config.xss_protection {
            res.set_header("X-XSS-Protection", "1; mode=block");
        }
        if self.config.content_type_options {
            res.set_header("X-Content-Type-Options", "nosniff");
        }
        if let Some(ref frame_options) = self.config.frame_options {
            res.set_header("X-Frame-Options", frame_options);
        }
        if let Some(ref policy) = self.config.content_security_policy {
            res.set_header("Content-Security-Policy", policy);
        }
        Flow::Continue
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_seconds: 60,
        }
    }
}

struct Window {
    started: Instant,
    count: u32,
}

// Stale windows are swept once the table grows past this.
const SWEEP_THRESHOLD: usize = 10_000;

/// Fixed-window request limiter keyed by client address.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.config.window_seconds)
    }

    /// Counts one request for `client` and returns how many remain, or
    /// `None` once the limit is exceeded.
    fn hit(&self, client: &str, now: Instant) -> Option<u32> {
        let window = self.window();
        let mut windows = self.windows.lock();
        if windows.len() > SWEEP_THRESHOLD {
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(client.to_owned()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= window {
            entry.started = now;
            entry.count = 0;
        }
        entry.count = entry.count.saturating_add(1);
        self.config.max_requests.checked_sub(entry.count)
    }

    fn client_key(req: &Request) -> String {
        if let Some(addr) = req.peer_addr {
            return addr.ip().to_string();
        }
        req.get_header("x-forwarded-for")
            .or_else(|| req.get_header("x-real-ip"))
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_owned())
            .unwrap_or_else(|| "unknown".to_owned())
    }
}

impl Middleware for RateLimiter {
    fn handle(&self, req: &mut Request, res: &mut Response) -> Flow {
        let client = Self::client_key(req);
        let limit = self.config.max_requests.to_string();
        match self.hit(&client, Instant::now()) {
            Some(remaining) => {
                res.set_header("X-RateLimit-Limit", &limit)
                    .set_header("X-RateLimit-Remaining", remaining.to_string());
                Flow::Continue
            }
            None => {
                tracing::warn!(client = %client, path = %req.path, "rate limit exceeded");
                let retry_after = self.config.window_seconds;
                res.status(429)
                    .set_header("X-RateLimit-Limit", &limit)
                    .set_header("X-RateLimit-Remaining", "0")
                    .set_header("Retry-After", retry_after.to_string())
                    .json_value(
                        &Value::object()
                            .with("error", "Rate limit exceeded")
                            .with("retry_after", retry_after),
                    );
                Flow::Halt
            }
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age: Option<u32>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: vec!["*".to_string()],
            allow_methods: ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allow_headers: ["Content-Type", "Authorization", "X-Requested-With"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            allow_credentials: true,
            max_age: Some(86400),
        }
    }
}

/// Adds CORS headers and answers preflight `OPTIONS` requests itself.
pub struct Cors {
    config: CorsConfig,
}

impl Cors {
    pub fn new(config: CorsConfig) -> Self {
        Self { config }
    }

    fn allowed_origin(&self, origin: Option<&str>) -> Option<String> {
        let any = self.config.allow_origins.iter().any(|o| o == "*");
        match origin {
            Some(origin) if any || self.config.allow_origins.iter().any(|o| o == origin) => {
                Some(origin.to_owned())
            }
            None if any => Some("*".to_owned()),
            _ => None,
        }
    }
}

impl Default for Cors {
    fn default() -> Self {
        Self::new(CorsConfig::default())
    }
}

impl Middleware for Cors {
    fn handle(&self, req: &mut Request, res: &mut Response) -> Flow {
        if let Some(origin) = self.allowed_origin(req.get_header("origin")) {
            res.set_header("Access-Control-Allow-Origin", origin);
        }
        res.set_header("Access-Control-Allow-Methods", self.config.allow_methods.join(", "))
            .set_header("Access-Control-Allow-Headers", self.config.allow_headers.join(", "));
        if self.config.allow_credentials {
            res.set_header("Access-Control-Allow-Credentials", "true");
        }

        if req.method == Method::OPTIONS {
            if let Some(max_age) = self.config.max_age {
                res.set_header("Access-Control-Max-Age", max_age.to_string());
            }
            res.status(200);
            return Flow::Halt;
        }
        Flow::Continue
    }
}

type TokenValidator = dyn Fn(&str) -> bool + Send + Sync;

/// Bearer-token gate. The `Bearer ` prefix is optional.
pub struct Auth {
    validator: Box<TokenValidator>,
}

impl Auth {
    pub fn new<F>(validator: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            validator: Box::new(validator),
        }
    }

    fn reject(res: &mut Response, message: &str) -> Flow {
        res.status(401)
            .set_header("WWW-Authenticate", "Bearer")
            .json_value(&Value::object().with("error", message));
        Flow::Halt
    }
}

impl Middleware for Auth {
    fn handle(&self, req: &mut Request, res: &mut Response) -> Flow {
        let Some(header) = req.get_header("authorization") else {
            return Self::reject(res, "Authorization header required");
        };
        let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
        if (self.validator)(token) {
            Flow::Continue
        } else {
            tracing::debug!(path = %req.path, "rejected invalid token");
            Self::reject(res, "Invalid token")
        }
    }
}
