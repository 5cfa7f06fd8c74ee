//! Application is the main entry point for the Crest framework.
//!
//! It owns the route table and the middleware chain, turns a parsed
//! [`Request`] into a [`Response`], and starts the server.
//!
//! # Examples
//!
//! ```rust,no_run
//! use crest::app::Application;
//! use crest::http::{Request, Response};
//! use crest::json::Value;
//!
//! let app = Application::new();
//! app.get("/health", |_: &Request, res: &mut Response| {
//!     res.json_value(&Value::object().with("status", "ok"));
//! });
//! app.listen().unwrap();
//! ```

use crate::config::Config;
use crate::error::{ConfigError, ServerError, ServerResult};
use crate::handler::Handler;
use crate::http::{Method, Request, Response};
use crate::json::Value;
use crate::middleware::{Flow, Middleware, MiddlewareChain};
use crate::pool::panic_message;
use crate::router::Router;
use crate::server::{Server, ServerHandle};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

type ErrorHandler = Arc<dyn Fn(&ServerError) -> Response + Send + Sync>;

/// Routes listed in a 404 body.
const MAX_LISTED_ROUTES: usize = 10;

/// Server name reported in generated payloads.
pub const SERVER_NAME: &str = concat!("Crest/", env!("CARGO_PKG_VERSION"));

/// The web application. Clones share the same routes and middleware, so
/// routes may still be added through a clone while the server runs.
#[derive(Clone)]
pub struct Application {
    inner: Arc<AppState>,
}

struct AppState {
    config: Config,
    router: Mutex<Router>,
    middlewares: Mutex<MiddlewareChain>,
    on_error: Mutex<Option<ErrorHandler>>,
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            inner: Arc::new(AppState {
                config,
                router: Mutex::new(Router::new()),
                middlewares: Mutex::new(MiddlewareChain::new()),
                on_error: Mutex::new(None),
            }),
        }
    }

    /// Builds an application from a TOML or JSON config file.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::with_config(Config::from_file(path)?))
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Registers a GET route handler
    ///
    /// # Arguments
    /// * `path` - The URL path to match; may hold `:name` and `*` segments
    /// * `handler` - The handler function
    pub fn get<H: Handler>(&self, path: &str, handler: H) -> &Self {
        self.register(Method::GET, path, handler, None)
    }

    /// Registers a POST route handler
    ///
    /// # Arguments
    /// * `path` - The URL path to match; may hold `:name` and `*` segments
    /// * `handler` - The handler function
    pub fn post<H: Handler>(&self, path: &str, handler: H) -> &Self {
        self.register(Method::POST, path, handler, None)
    }

    /// Registers a PUT route handler
    ///
    /// # Arguments
    /// * `path` - The URL path to match; may hold `:name` and `*` segments
    /// * `handler` - The handler function
    pub fn put<H: Handler>(&self, path: &str, handler: H) -> &Self {
        self.register(Method::PUT, path, handler, None)
    }

    /// Registers a DELETE route handler
    ///
    /// # Arguments
    /// * `path` - The URL path to match; may hold `:name` and `*` segments
    /// * `handler` - The handler function
    pub fn delete<H: Handler>(&self, path: &str, handler: H) -> &Self {
        self.register(Method::DELETE, path, handler, None)
    }

    /// Registers a PATCH route handler
    ///
    /// # Arguments
    /// * `path` - The URL path to match; may hold `:name` and `*` segments
    /// * `handler` - The handler function
    pub fn patch<H: Handler>(&self, path: &str, handler: H) -> &Self {
        self.register(Method::PATCH, path, handler, None)
    }

    /// Registers a HEAD route handler
    ///
    /// # Arguments
    /// * `path` - The URL path to match; may hold `:name` and `*` segments
    /// * `handler` - The handler function
    pub fn head<H: Handler>(&self, path: &str, handler: H) -> &Self {
        self.register(Method::HEAD, path, handler, None)
    }

    /// Registers an OPTIONS route handler
    ///
    /// # Arguments
    /// * `path` - The URL path to match; may hold `:name` and `*` segments
    /// * `handler` - The handler function
    pub fn options<H: Handler>(&self, path: &str, handler: H) -> &Self {
        self.register(Method::OPTIONS, path, handler, None)
    }

    /// Registers a route handler for any method
    ///
    /// # Arguments
    /// * `method` - The HTTP method to match
    /// * `path` - The URL path to match
    /// * `handler` - The handler function
    /// * `description` - Shown next to the route in 404 route listings
    pub fn register<H: Handler>(
        &self,
        method: Method,
        path: &str,
        handler: H,
        description: Option<&str>,
    ) -> &Self {
        self.inner
            .router
            .lock()
            .register(method, path, handler, description);
        self
    }

    /// Attaches a request body schema to a registered route
    ///
    /// Returns `false` when no route has this method and path.
    pub fn set_request_schema(&self, method: Method, path: &str, schema: &str) -> bool {
        self.inner.router.lock().set_request_schema(method, path, schema)
    }

    pub fn set_response_schema(&self, method: Method, path: &str, schema: &str) -> bool {
        self.inner.router.lock().set_response_schema(method, path, schema)
    }

    /// Adds a middleware to the application
    ///
    /// Middleware runs in registration order before routing.
    ///
    /// # Arguments
    /// * `middleware` - The middleware to add
    pub fn middleware<M: Middleware>(&self, middleware: M) -> &Self {
        self.inner.middlewares.lock().add(middleware);
        self
    }

    /// Mounts a router under its prefix
    ///
    /// The router's middleware is appended to the application chain.
    ///
    /// # Arguments
    /// * `router` - The router to mount, usually built with [`Router::with_prefix`]
    pub fn mount(&self, router: Router) -> &Self {
        let chain = self.inner.router.lock().merge(router);
        self.inner.middlewares.lock().append(chain);
        self
    }

    /// Replaces the default JSON body used for errors the framework answers
    /// itself (oversized requests, handler panics).
    ///
    /// # Arguments
    /// * `handler` - Builds the response for an error
    pub fn on_error<F>(&self, handler: F) -> &Self
    where
        F: Fn(&ServerError) -> Response + Send + Sync + 'static,
    {
        *self.inner.on_error.lock() = Some(Arc::new(handler));
        self
    }

    pub fn route_count(&self) -> usize {
        self.inner.router.lock().len()
    }

    pub fn middleware_count(&self) -> usize {
        self.inner.middlewares.lock().len()
    }

    /// Runs the middleware chain and the matching route for one request.
    ///
    /// A panic in a middleware or handler becomes a 500 response.
    pub fn dispatch(&self, mut req: Request) -> Response {
        let mut res = Response::new();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process(&mut req, &mut res)));
        match outcome {
            Ok(()) => res,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(method = %req.method, path = %req.path, panic = %message, "handler panicked");
                self.error_response(&ServerError::PanicError(message))
            }
        }
    }

    fn process(&self, req: &mut Request, res: &mut Response) {
        let chain = self.inner.middlewares.lock().clone();
        if chain.run(req, res) == Flow::Halt {
            return;
        }

        let route = self.inner.router.lock().find(req.method, &req.path).cloned();
        match route {
            Some(route) => {
                route.extract_params(req);
                route.handler().handle(req, res);
            }
            None => {
                tracing::debug!(method = %req.method, path = %req.path, "no route matched");
                res.status(404)
                    .json_value(&self.not_found_payload(req.method, &req.path));
            }
        }
    }

    /// The structured 404 body for an unmatched request.
    pub fn not_found_payload(&self, method: Method, path: &str) -> Value {
        let router = self.inner.router.lock();

        let available: Vec<Value> = router
            .routes()
            .iter()
            .take(MAX_LISTED_ROUTES)
            .map(|route| {
                let mut entry = Value::object()
                    .with("method", route.method.as_str())
                    .with("path", route.path.as_str());
                if let Some(description) = &route.description {
                    entry.set("description", description.as_str());
                }
                entry
            })
            .collect();

        let mut warnings = vec![
            "This endpoint does not exist in the application",
            "Consider checking the API documentation or dashboard",
        ];
        if router.is_empty() {
            warnings.push("No routes have been registered with the application");
        }

        Value::object()
            .with("error", "Not Found")
            .with("message", "Route not found")
            .with(
                "details",
                Value::object()
                    .with("requested_path", path)
                    .with("requested_method", method.as_str())
                    .with("timestamp", httpdate::fmt_http_date(SystemTime::now()))
                    .with("server", SERVER_NAME),
            )
            .with(
                "suggestions",
                vec![
                    "Check if the URL is correct and properly encoded",
                    "Ensure you're using the correct HTTP method (GET, POST, etc.)",
                    "Verify that the endpoint exists in your application",
                    "Check for trailing slashes or case sensitivity issues",
                ],
            )
            .with("available_routes", available)
            .with("warnings", warnings)
    }

    pub(crate) fn error_response(&self, error: &ServerError) -> Response {
        let handler = self.inner.on_error.lock().clone();
        match handler {
            Some(handler) => handler(error),
            None => Response::error(error),
        }
    }

    /// Starts the HTTP server
    ///
    /// Binds the configured address and serves until the process exits.
    ///
    /// # Errors
    /// Fails when the config is invalid, the address cannot be bound or a
    /// worker thread cannot be spawned.
    pub fn listen(&self) -> ServerResult<()> {
        Server::bind(self.clone())?.run()
    }

    /// Binds and serves on a background thread.
    pub fn spawn(&self) -> ServerResult<ServerHandle> {
        Server::bind(self.clone())?.spawn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn body(res: &Response) -> Value {
        json::parse_slice(res.body()).unwrap()
    }

    #[test]
    fn dispatches_to_matching_route() {
        let app = Application::new();
        app.get("/health", |_: &Request, res: &mut Response| {
            res.json_value(&Value::object().with("status", "ok"));
        })
        .get("/users/:id", |req: &Request, res: &mut Response| {
            res.send(req.param("id").unwrap_or_default());
        });

        let res = app.dispatch(Request::new(Method::GET, "/health"));
        assert_eq!(res.status_code(), 200);
        assert_eq!(res.body(), br#"{"status":"ok"}"#);

        let res = app.dispatch(Request::new(Method::GET, "/users/42"));
        assert_eq!(res.body(), b"42");
    }

    #[test]
    fn not_found_payload_shape() {
        let app = Application::new();
        app.register(Method::GET, "/health", |_: &Request, _: &mut Response| {}, Some("Liveness"))
            .post("/users", |_: &Request, _: &mut Response| {});

        let res = app.dispatch(Request::new(Method::DELETE, "/nope"));
        assert_eq!(res.status_code(), 404);
        assert_eq!(res.get_header("Content-Type"), Some("application/json"));

        let payload = body(&res);
        assert_eq!(payload["error"].as_str(), Some("Not Found"));
        assert_eq!(payload["message"].as_str(), Some("Route not found"));
        assert_eq!(payload["details"]["requested_path"].as_str(), Some("/nope"));
        assert_eq!(payload["details"]["requested_method"].as_str(), Some("DELETE"));
        assert_eq!(payload["details"]["server"].as_str(), Some(SERVER_NAME));
        assert!(payload["details"]["timestamp"].as_str().unwrap().ends_with("GMT"));
        assert_eq!(payload["suggestions"].len(), 4);
        assert_eq!(payload["available_routes"].len(), 2);
        assert_eq!(payload["available_routes"][0]["description"].as_str(), Some("Liveness"));
        assert!(payload["available_routes"][1].get("description").is_none());
        assert_eq!(payload["warnings"].len(), 2);
    }

    #[test]
    fn not_found_on_empty_app_lists_extra_warning() {
        let app = Application::new();
        let payload = body(&app.dispatch(Request::new(Method::GET, "/")));
        assert_eq!(payload["available_routes"].len(), 0);
        assert_eq!(payload["warnings"].len(), 3);
        assert_eq!(
            payload["warnings"][2].as_str(),
            Some("No routes have been registered with the application")
        );
    }

    #[test]
    fn lists_at_most_ten_routes() {
        let app = Application::new();
        for i in 0..15 {
            app.get(&format!("/r{i}"), |_: &Request, _: &mut Response| {});
        }
        let payload = app.not_found_payload(Method::GET, "/missing");
        assert_eq!(payload["available_routes"].len(), 10);
        assert_eq!(payload["available_routes"][9]["path"].as_str(), Some("/r9"));
    }

    #[test]
    fn halting_middleware_skips_handler() {
        let app = Application::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        app.get("/secret", move |_: &Request, res: &mut Response| {
            counter.fetch_add(1, Ordering::SeqCst);
            res.send("secret");
        })
        .middleware(|req: &mut Request, res: &mut Response| {
            if req.get_header("x-key") == Some("let-me-in") {
                return Flow::Continue;
            }
            res.status(403).send("forbidden");
            Flow::Halt
        });

        let res = app.dispatch(Request::new(Method::GET, "/secret"));
        assert_eq!(res.status_code(), 403);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let res = app.dispatch(Request::new(Method::GET, "/secret").with_header("X-Key", "let-me-in"));
        assert_eq!(res.body(), b"secret");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn middleware_sees_mutable_request() {
        let app = Application::new();
        app.middleware(|req: &mut Request, _: &mut Response| {
            req.headers.push(("X-User".into(), "ada".into()));
            Flow::Continue
        })
        .get("/me", |req: &Request, res: &mut Response| {
            res.send(req.get_header("x-user").unwrap_or("anonymous"));
        });
        assert_eq!(app.dispatch(Request::new(Method::GET, "/me")).body(), b"ada");
    }

    #[test]
    fn handler_panic_becomes_500() {
        let app = Application::new();
        app.get("/boom", |_: &Request, _: &mut Response| {
            panic!("kaboom");
        });
        let res = app.dispatch(Request::new(Method::GET, "/boom"));
        assert_eq!(res.status_code(), 500);
        let payload = body(&res);
        assert_eq!(payload["error"]["status"].as_number(), 500.0);
        assert!(payload["error"]["message"].as_str().unwrap().contains("kaboom"));
    }

    #[test]
    fn custom_error_handler() {
        let app = Application::new();
        app.on_error(|err: &ServerError| {
            let mut res = Response::with_status(err.status_code());
            res.text("custom");
            res
        })
        .get("/boom", |_: &Request, _: &mut Response| {
            panic!("kaboom");
        });
        let res = app.dispatch(Request::new(Method::GET, "/boom"));
        assert_eq!(res.status_code(), 500);
        assert_eq!(res.body(), b"custom");
    }

    #[test]
    fn mounted_router_routes_and_middleware() {
        let app = Application::new();
        let mut api = Router::with_prefix("/api/v1");
        api.get("/items/:id", |req: &Request, res: &mut Response| {
            res.send(format!("item {}", req.param("id").unwrap_or("?")));
        })
        .middleware(|_: &mut Request, res: &mut Response| {
            res.header("X-Api", "v1");
            Flow::Continue
        });
        app.mount(api);

        let res = app.dispatch(Request::new(Method::GET, "/api/v1/items/5"));
        assert_eq!(res.body(), b"item 5");
        assert_eq!(res.get_header("X-Api"), Some("v1"));
        assert_eq!(app.route_count(), 1);
        assert_eq!(app.middleware_count(), 1);
    }

    #[test]
    fn default_status_is_200() {
        let app = Application::new();
        app.post("/quiet", |_: &Request, _: &mut Response| {});
        let res = app.dispatch(Request::new(Method::POST, "/quiet"));
        assert_eq!(res.status_code(), 200);
        assert!(res.body().is_empty());
    }

    #[test]
    fn registering_through_a_clone_is_visible() {
        let app = Application::new();
        let handle = app.clone();
        handle.get("/late", |_: &Request, res: &mut Response| {
            res.send("late");
        });
        assert_eq!(app.dispatch(Request::new(Method::GET, "/late")).body(), b"late");
    }
}
