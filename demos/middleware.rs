//! Middleware example for Crest
//!
//! This example demonstrates:
//! - Request logging and JSON body parsing
//! - Bearer-token authentication on a mounted sub-router
//! - CORS and per-client rate limiting
//!
//! Pass a config file as the first argument to override the defaults.

use crest::json::Value;
use crest::middleware::{
    Auth, BodyParser, Cors, CorsConfig, Flow, Middleware, RateLimiter, RequestLogger, SecurityConfig,
    SecurityHeaders, StaticFiles,
};
use crest::{Application, Config, Method, Request, Response, Router};
use std::time::Instant;

fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => match Config::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{path}: {e}");
                std::process::exit(2);
            }
        },
        None => Config::default(),
    };
    crest::logging::init(&config.middleware);

    let app = Application::with_config(config.clone());
    app.middleware(RequestLogger)
        .middleware(SecurityHeaders::new(SecurityConfig::default()))
        .middleware(RateLimiter::new(config.server.rate_limit.clone()))
        .middleware(BodyParser);
    if config.middleware.cors {
        app.middleware(Cors::new(CorsConfig::default()));
    }
    if let Some(dir) = &config.paths.static_dir {
        app.middleware(StaticFiles::new(dir).at("/static"));
    }

    let started = Instant::now();
    app.register(
        Method::GET,
        "/health",
        move |_: &Request, res: &mut Response| {
            res.json_value(
                &Value::object()
                    .with("status", "ok")
                    .with("uptime_seconds", started.elapsed().as_secs()),
            );
        },
        Some("Liveness probe"),
    );

    let auth = Auth::new(|token: &str| token == "letmein");
    let mut admin = Router::with_prefix("/admin");
    admin
        .middleware(move |req: &mut Request, res: &mut Response| {
            if !req.path.starts_with("/admin") {
                return Flow::Continue;
            }
            auth.handle(req, res)
        })
        .post("/notes", |req: &Request, res: &mut Response| {
            let note = req.json().cloned().unwrap_or_default();
            res.status(201).json_value(&Value::object().with("saved", note));
        });
    app.mount(admin);
    app.set_request_schema(Method::POST, "/admin/notes", r#"{"type":"object"}"#);

    if let Err(e) = app.listen() {
        eprintln!("server failed: {e}");
        std::process::exit(1);
    }
}
