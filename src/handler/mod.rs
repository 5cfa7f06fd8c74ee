use crate::http::{Request, Response};
use std::sync::Arc;

/// Route handler: reads the request and fills in the response.
///
/// Any `Fn(&Request, &mut Response)` closure that is `Send + Sync` is a handler.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, req: &Request, res: &mut Response);
}

impl<F> Handler for F
where
    F: Fn(&Request, &mut Response) + Send + Sync + 'static,
{
    fn handle(&self, req: &Request, res: &mut Response) {
        (self)(req, res)
    }
}

/// Shared handle to a registered handler.
pub type BoxedHandler = Arc<dyn Handler>;
