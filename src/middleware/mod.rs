mod body_parser;
mod logger;
mod security;
mod static_files;

pub use body_parser::BodyParser;
pub use logger::RequestLogger;
pub use security::{Auth, Cors, CorsConfig, RateLimitConfig, RateLimiter, SecurityConfig, SecurityHeaders};
pub use static_files::StaticFiles;

use crate::http::{Request, Response};
use std::sync::Arc;

/// Most middleware a chain accepts.
pub const MAX_MIDDLEWARE: usize = 32;

/// Outcome of one middleware step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Stop the chain and send the response as it stands.
    Halt,
}

impl From<bool> for Flow {
    fn from(proceed: bool) -> Self {
        if proceed {
            Flow::Continue
        } else {
            Flow::Halt
        }
    }
}

pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, req: &mut Request, res: &mut Response) -> Flow;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<F> Middleware for F
where
    F: Fn(&mut Request, &mut Response) -> Flow + Send + Sync + 'static,
{
    fn handle(&self, req: &mut Request, res: &mut Response) -> Flow {
        (self)(req, res)
    }
}

/// Ordered middleware list. Cloning is cheap: entries are shared.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step. Past [`MAX_MIDDLEWARE`] the step is dropped and `false` returned.
    pub fn add<M: Middleware>(&mut self, middleware: M) -> bool {
        self.add_shared(Arc::new(middleware))
    }

    pub fn add_shared(&mut self, middleware: Arc<dyn Middleware>) -> bool {
        if self.middlewares.len() >= MAX_MIDDLEWARE {
            tracing::error!(
                middleware = middleware.name(),
                "maximum middleware count ({}) reached",
                MAX_MIDDLEWARE
            );
            return false;
        }
        self.middlewares.push(middleware);
        true
    }

    pub fn append(&mut self, other: MiddlewareChain) {
        for middleware in other.middlewares {
            self.add_shared(middleware);
        }
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Runs each step in order until one halts.
    pub fn run(&self, req: &mut Request, res: &mut Response) -> Flow {
        for middleware in &self.middlewares {
            if middleware.handle(req, res) == Flow::Halt {
                tracing::debug!(middleware = middleware.name(), path = %req.path, "middleware halted request");
                return Flow::Halt;
            }
        }
        Flow::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_in_order_and_halts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut chain = MiddlewareChain::new();

        chain.add(|_: &mut Request, res: &mut Response| {
            res.header("X-Step", "1");
            Flow::Continue
        });
        chain.add(|req: &mut Request, res: &mut Response| {
            if req.get_header("authorization").is_none() {
                res.status(401).send("no");
                return Flow::Halt;
            }
            Flow::Continue
        });
        let counter = calls.clone();
        chain.add(move |_: &mut Request, _: &mut Response| {
            counter.fetch_add(1, Ordering::SeqCst);
            Flow::Continue
        });

        let mut req = Request::new(Method::GET, "/");
        let mut res = Response::new();
        assert_eq!(chain.run(&mut req, &mut res), Flow::Halt);
        assert_eq!(res.status_code(), 401);
        assert_eq!(res.get_header("x-step"), Some("1"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let mut req = Request::new(Method::GET, "/").with_header("Authorization", "t");
        let mut res = Response::new();
        assert_eq!(chain.run(&mut req, &mut res), Flow::Continue);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn capacity_is_bounded() {
        let mut chain = MiddlewareChain::new();
        for _ in 0..MAX_MIDDLEWARE {
            assert!(chain.add(|_: &mut Request, _: &mut Response| Flow::Continue));
        }
        assert!(!chain.add(|_: &mut Request, _: &mut Response| Flow::Continue));
        assert_eq!(chain.len(), MAX_MIDDLEWARE);
    }

    #[test]
    fn flow_from_bool() {
        assert_eq!(Flow::from(true), Flow::Continue);
        assert_eq!(Flow::from(false), Flow::Halt);
    }
}
