pub mod pattern;

use crate::handler::{BoxedHandler, Handler};
use crate::http::{Method, Request};
use crate::middleware::{Middleware, MiddlewareChain};
use std::sync::Arc;

/// Most routes one table holds.
pub const MAX_ROUTES: usize = 256;

#[derive(Clone)]
pub struct Route {
    pub method: Method,
    pub path: String,
    pub description: Option<String>,
    pub request_schema: Option<String>,
    pub response_schema: Option<String>,
    is_pattern: bool,
    handler: BoxedHandler,
}

impl Route {
    fn new(method: Method, path: String, handler: BoxedHandler, description: Option<String>) -> Self {
        Route {
            method,
            is_pattern: pattern::is_pattern(&path),
            path,
            description,
            request_schema: None,
            response_schema: None,
            handler,
        }
    }

    pub fn is_pattern(&self) -> bool {
        self.is_pattern
    }

    pub fn handler(&self) -> &BoxedHandler {
        &self.handler
    }

    pub fn matches(&self, method: Method, path: &str) -> bool {
        self.method == method
            && if self.is_pattern {
                pattern::matches(&self.path, path)
            } else {
                self.path == path
            }
    }

    /// Fills `req.params` from the request path. Exact routes leave them empty.
    pub fn extract_params(&self, req: &mut Request) {
        if !self.is_pattern {
            return;
        }
        if let Some(params) = pattern::extract(&self.path, &req.path) {
            req.params = params;
        }
    }
}

/// Ordered route table; the first matching route wins.
///
/// A router built with [`Router::with_prefix`] is a sub-router: its paths
/// are registered below the prefix and its middleware joins the
/// application chain when it is mounted.
#[derive(Clone, Default)]
pub struct Router {
    prefix: String,
    routes: Vec<Route>,
    middlewares: MiddlewareChain,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            prefix: join_paths("", prefix),
            ..Self::default()
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn get<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.register(Method::GET, path, handler, None)
    }

    pub fn post<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.register(Method::POST, path, handler, None)
    }

    pub fn put<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.register(Method::PUT, path, handler, None)
    }

    pub fn delete<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.register(Method::DELETE, path, handler, None)
    }

    pub fn patch<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.register(Method::PATCH, path, handler, None)
    }

    pub fn head<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.register(Method::HEAD, path, handler, None)
    }

    pub fn options<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.register(Method::OPTIONS, path, handler, None)
    }

    pub fn register<H: Handler>(
        &mut self,
        method: Method,
        path: &str,
        handler: H,
        description: Option<&str>,
    ) -> &mut Self {
        let path = join_paths(&self.prefix, path);
        self.insert(Route::new(
            method,
            path,
            Arc::new(handler),
            description.map(str::to_owned),
        ));
        self
    }

    /// Adds `route`, replacing an existing `(method, path)` entry in place.
    fn insert(&mut self, route: Route) -> bool {
        if let Some(existing) = self
            .routes
            .iter_mut()
            .find(|r| r.method == route.method && r.path == route.path)
        {
            tracing::warn!(method = %route.method, path = %route.path, "route already registered, replacing handler");
            existing.handler = route.handler;
            existing.description = route.description;
            existing.is_pattern = route.is_pattern;
            return true;
        }
        if self.routes.len() >= MAX_ROUTES {
            tracing::error!(method = %route.method, path = %route.path, "maximum route count ({}) reached", MAX_ROUTES);
            return false;
        }
        tracing::debug!(method = %route.method, path = %route.path, "registered route");
        self.routes.push(route);
        true
    }

    /// Middleware that runs for every request once this router is mounted.
    pub fn middleware<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.middlewares.add(middleware);
        self
    }

    /// Moves the routes of `other` into this table and hands back its middleware.
    pub(crate) fn merge(&mut self, other: Router) -> MiddlewareChain {
        for mut route in other.routes {
            route.path = join_paths(&self.prefix, &route.path);
            self.insert(route);
        }
        other.middlewares
    }

    pub fn set_request_schema(&mut self, method: Method, path: &str, schema: &str) -> bool {
        self.route_mut(method, path)
            .map(|route| route.request_schema = Some(schema.to_owned()))
            .is_some()
    }

    pub fn set_response_schema(&mut self, method: Method, path: &str, schema: &str) -> bool {
        self.route_mut(method, path)
            .map(|route| route.response_schema = Some(schema.to_owned()))
            .is_some()
    }

    fn route_mut(&mut self, method: Method, path: &str) -> Option<&mut Route> {
        let path = join_paths(&self.prefix, path);
        self.routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path)
    }

    /// First route matching `method` and `path`. No parameters are extracted.
    pub fn find(&self, method: Method, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(method, path))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Joins a mount prefix and a route path with exactly one `/` between them.
pub fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => format!("/{}", path),
        (false, true) if prefix.starts_with('/') => prefix.to_owned(),
        (false, true) => format!("/{}", prefix),
        (false, false) if prefix.starts_with('/') => format!("{}/{}", prefix, path),
        (false, false) => format!("/{}/{}", prefix, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;
    use rstest::rstest;

    fn reply(body: &'static str) -> impl Handler {
        move |_: &Request, res: &mut Response| {
            res.send(body);
        }
    }

    fn call(router: &Router, method: Method, path: &str) -> Option<(String, Vec<(String, String)>)> {
        let route = router.find(method, path)?;
        let mut req = Request::new(method, path);
        route.extract_params(&mut req);
        let mut res = Response::new();
        route.handler().handle(&req, &mut res);
        Some((String::from_utf8(res.body().to_vec()).unwrap(), req.params))
    }

    #[test]
    fn exact_and_param_routes() {
        let mut router = Router::new();
        router.get("/health", reply("ok")).get("/users/:id", reply("user"));

        assert_eq!(call(&router, Method::GET, "/health").unwrap().0, "ok");
        let (body, params) = call(&router, Method::GET, "/users/42").unwrap();
        assert_eq!(body, "user");
        assert_eq!(params, vec![("id".to_string(), "42".to_string())]);

        assert!(router.find(Method::GET, "/users/42/extra").is_none());
        assert!(router.find(Method::POST, "/health").is_none());
        assert!(router.find(Method::GET, "/health/").is_none());
    }

    #[test]
    fn wildcard_route() {
        let mut router = Router::new();
        router.get("/static/*", reply("file"));
        let (body, params) = call(&router, Method::GET, "/static/a/b/c.png").unwrap();
        assert_eq!(body, "file");
        assert!(params.is_empty());
    }

    #[test]
    fn first_registered_match_wins() {
        let mut router = Router::new();
        router.get("/users/:id", reply("by-id")).get("/users/new", reply("new"));
        assert_eq!(call(&router, Method::GET, "/users/new").unwrap().0, "by-id");

        let mut router = Router::new();
        router.get("/users/new", reply("new")).get("/users/:id", reply("by-id"));
        let (body, params) = call(&router, Method::GET, "/users/new").unwrap();
        assert_eq!(body, "new");
        assert!(params.is_empty());
    }

    #[test]
    fn duplicate_registration_replaces_in_place() {
        let mut router = Router::new();
        router
            .register(Method::GET, "/x", reply("first"), Some("old"))
            .get("/y", reply("y"))
            .register(Method::GET, "/x", reply("second"), Some("new"));

        assert_eq!(router.len(), 2);
        assert_eq!(router.routes()[0].path, "/x");
        assert_eq!(router.routes()[0].description.as_deref(), Some("new"));
        assert_eq!(call(&router, Method::GET, "/x").unwrap().0, "second");
    }

    #[test]
    fn capacity_is_bounded() {
        let mut router = Router::new();
        for i in 0..MAX_ROUTES + 5 {
            router.get(&format!("/r{i}"), reply("r"));
        }
        assert_eq!(router.len(), MAX_ROUTES);
        assert!(router.find(Method::GET, "/r256").is_none());
        // overwriting still works when full
        router.get("/r0", reply("again"));
        assert_eq!(call(&router, Method::GET, "/r0").unwrap().0, "again");
    }

    #[test]
    fn schemas_attach_to_existing_routes() {
        let mut router = Router::new();
        router.post("/users", reply("created"));
        assert!(router.set_request_schema(Method::POST, "/users", r#"{"type":"object"}"#));
        assert!(router.set_response_schema(Method::POST, "/users", r#"{"type":"string"}"#));
        assert!(!router.set_request_schema(Method::GET, "/users", "{}"));
        let route = &router.routes()[0];
        assert_eq!(route.request_schema.as_deref(), Some(r#"{"type":"object"}"#));
        assert_eq!(route.response_schema.as_deref(), Some(r#"{"type":"string"}"#));
    }

    #[test]
    fn sub_router_prefix_and_merge() {
        let mut api = Router::with_prefix("/api/");
        api.get("/", reply("root")).get("users/:id", reply("user"));
        api.middleware(|_: &mut Request, _: &mut Response| crate::middleware::Flow::Continue);
        assert_eq!(api.routes()[0].path, "/api");
        assert_eq!(api.routes()[1].path, "/api/users/:id");

        let mut app = Router::new();
        app.get("/", reply("home"));
        let chain = app.merge(api);
        assert_eq!(chain.len(), 1);
        assert_eq!(app.len(), 3);
        assert_eq!(call(&app, Method::GET, "/api").unwrap().0, "root");
        assert_eq!(call(&app, Method::GET, "/api/users/9").unwrap().1[0].1, "9");
    }

    #[rstest]
    #[case("", "/", "/")]
    #[case("", "users", "/users")]
    #[case("/api", "/users", "/api/users")]
    #[case("/api/", "/users", "/api/users")]
    #[case("/api//", "//users", "/api/users")]
    #[case("api", "users", "/api/users")]
    #[case("/api", "/", "/api")]
    #[case("/api", "", "/api")]
    fn joins_paths(#[case] prefix: &str, #[case] path: &str, #[case] expected: &str) {
        assert_eq!(join_paths(prefix, path), expected);
    }
}
