use crate::http::{Request, Response};
use crate::middleware::{Flow, Middleware};

/// Logs every request line at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestLogger;

impl Middleware for RequestLogger {
    fn handle(&self, req: &mut Request, _res: &mut Response) -> Flow {
        match req.peer_addr {
            Some(peer) => tracing::info!(method = %req.method, path = %req.path, %peer, "request"),
            None => tracing::info!(method = %req.method, path = %req.path, "request"),
        }
        Flow::Continue
    }
}
