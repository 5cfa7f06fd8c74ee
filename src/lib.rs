//! # Crest
//!
//! A small threaded HTTP API framework: a blocking acceptor, a fixed worker
//! pool, a path-pattern router, a middleware chain and an embedded JSON
//! engine.
//!
//! ## Features
//!
//! - Express-style routing with `:param` and `*` segments
//! - Middleware that can halt a request (CORS, logging, body parsing,
//!   static files, rate limiting, bearer auth, security headers)
//! - Structured JSON 404 responses listing the registered routes
//! - TOML or JSON configuration and `tracing` logs
//!
//! One connection carries one request; the response is written with
//! `Connection: close`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crest::{Application, Config, Request, Response};
//! use crest::json::Value;
//! use crest::middleware::{BodyParser, RequestLogger};
//!
//! let app = Application::with_config(Config::default());
//! crest::logging::init(&app.config().middleware);
//!
//! app.middleware(RequestLogger).middleware(BodyParser);
//! app.get("/health", |_: &Request, res: &mut Response| {
//!     res.json_value(&Value::object().with("status", "ok"));
//! });
//! app.get("/users/:id", |req: &Request, res: &mut Response| {
//!     res.json_value(&Value::object().with("id", req.param("id")));
//! });
//!
//! app.listen().unwrap();
//! ```
//!
//! ## Middleware Usage
//!
//! ```rust
//! use crest::middleware::{Flow, SecurityConfig, SecurityHeaders};
//! use crest::{Application, Request, Response};
//!
//! let app = Application::new();
//! app.middleware(SecurityHeaders::new(SecurityConfig::default()));
//! app.middleware(|req: &mut Request, res: &mut Response| {
//!     if req.get_header("x-api-key").is_none() {
//!         res.status(401).send("missing key");
//!         return Flow::Halt;
//!     }
//!     Flow::Continue
//! });
//! ```

pub mod app;
pub mod buffer;
pub mod cache;
pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod json;
pub mod logging;
pub mod middleware;
pub mod pool;
pub mod router;
pub mod server;

pub use app::Application;
pub use config::Config;
pub use error::{ConfigError, ServerError, ServerResult};
pub use http::{Method, Request, Response};
pub use router::Router;
pub use server::ServerHandle;
