//! Blocking TCP acceptor. Each accepted connection is handled start to finish
//! by one pool worker: read one request, dispatch, write, close.

use crate::app::Application;
use crate::buffer::BufferPool;
use crate::error::{ServerError, ServerResult};
use crate::http::wire::{self, Limits, WireError};
use crate::http::{Method, Response};
use crate::pool::{panic_message, WorkerPool};
use std::io::{self, Read};
use std::net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

// Unread request bytes drained after an early error response.
const LINGER_BYTES: usize = 64 * 1024;
const LINGER_TIMEOUT: Duration = Duration::from_millis(100);

pub struct Server {
    app: Application,
    listener: TcpListener,
    pool: Option<WorkerPool>,
    connection: Arc<ConnectionSettings>,
    stopping: Arc<AtomicBool>,
}

struct ConnectionSettings {
    limits: Limits,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    buffers: BufferPool,
}

impl Server {
    /// Validates the application's config, binds its address and starts
    /// the pool.
    pub fn bind(app: Application) -> ServerResult<Server> {
        app.config().validate()?;
        let config = app.config().server.clone();
        let addr = SocketAddr::new(resolve_host(&config.host), config.port);
        let listener = TcpListener::bind(addr).map_err(|source| ServerError::Bind { addr, source })?;

        let pool = if config.single_threaded {
            None
        } else {
            Some(WorkerPool::new(config.thread_count)?)
        };

        let read_timeout = config
            .timeouts
            .read()
            .or_else(|| (config.timeout_seconds > 0).then(|| Duration::from_secs(config.timeout_seconds)));

        Ok(Server {
            app,
            listener,
            pool,
            connection: Arc::new(ConnectionSettings {
                limits: Limits {
                    max_body_size: config.max_body_size,
                    ..Limits::default()
                },
                read_timeout,
                write_timeout: config.timeouts.write(),
                buffers: BufferPool::default(),
            }),
            stopping: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until stopped by a [`ServerHandle`].
    pub fn run(self) -> ServerResult<()> {
        let addr = self.local_addr()?;
        tracing::info!(
            %addr,
            workers = self.pool.as_ref().map_or(0, WorkerPool::thread_count),
            routes = self.app.route_count(),
            middleware = self.app.middleware_count(),
            max_body_size = self.connection.limits.max_body_size,
            "{} listening on http://{}",
            self.app.config().app.title,
            addr
        );

        for stream in self.listener.incoming() {
            if self.stopping.load(Ordering::Acquire) {
                break;
            }
            match stream {
                Ok(stream) => self.accept(stream),
                Err(e) => tracing::warn!(error = %e, "accept failed"),
            }
        }

        if let Some(pool) = &self.pool {
            pool.shutdown();
        }
        tracing::info!(%addr, "server stopped");
        Ok(())
    }

    /// Runs the accept loop on its own thread.
    pub fn spawn(self) -> ServerResult<ServerHandle> {
        let addr = self.local_addr()?;
        let stopping = Arc::clone(&self.stopping);
        let thread = thread::Builder::new()
            .name("crest-acceptor".to_string())
            .spawn(move || self.run())
            .map_err(ServerError::ThreadSpawn)?;
        Ok(ServerHandle {
            addr,
            stopping,
            thread: Some(thread),
        })
    }

    fn accept(&self, stream: TcpStream) {
        let app = self.app.clone();
        let settings = Arc::clone(&self.connection);
        match &self.pool {
            Some(pool) => {
                if !pool.submit(move || handle_connection(&app, stream, &settings)) {
                    tracing::warn!("worker pool is shut down, dropping connection");
                }
            }
            None => handle_connection(&app, stream, &settings),
        }
    }
}

/// Handle to a server running on a background thread.
pub struct ServerHandle {
    addr: SocketAddr,
    stopping: Arc<AtomicBool>,
    thread: Option<JoinHandle<ServerResult<()>>>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops accepting, lets queued connections finish, and joins the
    /// acceptor thread.
    pub fn shutdown(mut self) -> ServerResult<()> {
        self.stop()
    }

    fn stop(&mut self) -> ServerResult<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        self.stopping.store(true, Ordering::Release);

        // Wake the blocking accept.
        let mut wake = self.addr;
        if wake.ip().is_unspecified() {
            wake.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
        }
        if let Err(e) = TcpStream::connect_timeout(&wake, Duration::from_secs(1)) {
            tracing::debug!(error = %e, "wake-up connection failed");
        }

        thread
            .join()
            .map_err(|payload| ServerError::PanicError(panic_message(payload.as_ref())))?
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::error!(error = %e, "server did not stop cleanly");
        }
    }
}

/// Parses `host` as an IP literal, falling back to all interfaces.
fn resolve_host(host: &str) -> IpAddr {
    host.parse().unwrap_or_else(|_| {
        tracing::warn!(host, "host is not an IP address, listening on 0.0.0.0");
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    })
}

fn handle_connection(app: &Application, mut stream: TcpStream, settings: &ConnectionSettings) {
    let peer = stream.peer_addr().ok();
    if let Err(e) = stream
        .set_read_timeout(settings.read_timeout)
        .and_then(|_| stream.set_write_timeout(settings.write_timeout))
    {
        tracing::debug!(error = %e, "failed to set socket timeouts");
    }

    let mut buf = settings.buffers.get();
    let parsed = wire::read_request(&mut stream, &mut buf, &settings.limits);
    settings.buffers.put(buf);

    let (response, head_only, drain) = match parsed {
        Ok(mut req) => {
            req.peer_addr = peer;
            let head_only = req.method == Method::HEAD;
            (app.dispatch(req), head_only, false)
        }
        Err(WireError::Closed) => return,
        Err(WireError::Malformed(reason)) => {
            tracing::debug!(?peer, reason, "malformed request, closing connection");
            return;
        }
        Err(WireError::Io(e)) => {
            tracing::debug!(?peer, error = %e, "failed to read request");
            return;
        }
        Err(WireError::HeadersTooLarge) => (rejection(app, ServerError::HeadersTooLarge), false, true),
        Err(WireError::BodyTooLarge { limit }) => {
            (rejection(app, ServerError::PayloadTooLarge { limit }), false, true)
        }
    };

    if let Err(e) = wire::write_response(&mut stream, &response, head_only) {
        tracing::debug!(?peer, error = %e, "failed to write response");
        return;
    }
    if drain {
        linger(&mut stream);
    }
}

fn rejection(app: &Application, error: ServerError) -> Response {
    tracing::warn!(error = %error, "rejecting request");
    app.error_response(&error)
}

/// Half-closes and discards what the client is still sending, so the close
/// does not reset the connection before the response is read.
fn linger(stream: &mut TcpStream) {
    if stream.shutdown(Shutdown::Write).is_err() || stream.set_read_timeout(Some(LINGER_TIMEOUT)).is_err() {
        return;
    }
    let mut sink = [0u8; 4096];
    let mut drained = 0;
    while drained < LINGER_BYTES {
        match stream.read(&mut sink) {
            Ok(0) | Err(_) => break,
            Ok(n) => drained += n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::ConfigError;

    #[test]
    fn bind_rejects_invalid_config() {
        let mut config = Config::default();
        config.server.port = 0;
        config.server.max_body_size = 0;
        let result = Server::bind(Application::with_config(config));
        assert!(matches!(result, Err(ServerError::Config(ConfigError::Invalid(_)))));
    }

    #[test]
    fn host_resolution() {
        assert_eq!(resolve_host("127.0.0.1"), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(resolve_host("localhost"), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(resolve_host("::1"), "::1".parse::<IpAddr>().unwrap());
    }
}
