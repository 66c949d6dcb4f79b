// server.rs — Activation service over TCP
//
// One request per connection: the client writes a JSON request and shuts
// down its write half, the server answers with one JSON response and closes.
// Each connection gets its own thread, up to a fixed number in flight; the
// admission engine is shared. A `Stopper` shuts the engine down and wakes the
// accept loop so `serve` returns without waiting for another client.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::coordinator::{Core, CoreState};
use crate::error::{ErrorKind, ServiceError};
use crate::service::messages::{ActivationRequestMsg, ActivationResponseMsg};

/// Requests carry a key and a quote; anything larger is refused unread.
pub const MAX_REQUEST_BYTES: u64 = 64 * 1024;

pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Connections handled at once; further clients are answered `Unavailable`.
pub const MAX_CONNECTIONS: usize = 256;

const TURN_AWAY_TIMEOUT: Duration = Duration::from_secs(1);

pub struct Server {
    listener: TcpListener,
    core: Arc<Core>,
    io_timeout: Duration,
    max_connections: usize,
    in_flight: Arc<AtomicUsize>,
}

/// Stops a running [`Server`] from another thread.
#[derive(Clone)]
pub struct Stopper {
    addr: SocketAddr,
    core: Arc<Core>,
}

impl Stopper {
    pub fn stop(&self) {
        self.core.shutdown();
        // Unblock accept(); the loop sees the shutdown and drops this stream.
        if let Err(e) = TcpStream::connect(self.addr) {
            debug!(error = %e, "wake-up connection failed");
        }
    }
}

/// Holds one in-flight slot until the connection is done.
struct Slot(Arc<AtomicUsize>);

impl Slot {
    fn acquire(counter: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
        counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
            .ok()
            .map(|_| Self(Arc::clone(counter)))
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Server {
    pub fn bind(addr: impl ToSocketAddrs, core: Arc<Core>) -> Result<Self, ServiceError> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            core,
            io_timeout: DEFAULT_IO_TIMEOUT,
            max_connections: MAX_CONNECTIONS,
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServiceError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn stopper(&self) -> Result<Stopper, ServiceError> {
        Ok(Stopper {
            addr: self.local_addr()?,
            core: Arc::clone(&self.core),
        })
    }

    /// Accept connections until the engine is shut down.
    pub fn serve(self) -> Result<(), ServiceError> {
        let addr = self.local_addr()?;
        info!(%addr, state = %self.core.state(), "activation service listening");

        for stream in self.listener.incoming() {
            if self.core.state() == CoreState::Shutdown {
                break;
            }
            match stream {
                Ok(stream) => self.dispatch(stream),
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
        info!("activation service stopped");
        Ok(())
    }

    fn dispatch(&self, stream: TcpStream) {
        let Some(slot) = Slot::acquire(&self.in_flight, self.max_connections) else {
            warn!(limit = self.max_connections, "too many connections");
            if let Err(e) = turn_away(stream, self.io_timeout) {
                debug!(error = %e, "refusal not delivered");
            }
            return;
        };
        let core = Arc::clone(&self.core);
        let timeout = self.io_timeout;
        thread::spawn(move || {
            let _slot = slot;
            if let Err(e) = handle_connection(stream, &core, timeout) {
                warn!(error = %e, "connection failed");
            }
        });
    }
}

/// Answer `Unavailable` without handing the request to the engine. The
/// request is drained first so closing does not reset the connection.
fn turn_away(mut stream: TcpStream, timeout: Duration) -> Result<(), ServiceError> {
    stream.set_read_timeout(Some(TURN_AWAY_TIMEOUT.min(timeout)))?;
    stream.set_write_timeout(Some(timeout))?;
    io::copy(&mut (&mut stream).take(MAX_REQUEST_BYTES + 1), &mut io::sink())?;
    let refusal = ActivationResponseMsg::refusal(ErrorKind::Unavailable);
    stream.write_all(&serde_json::to_vec(&refusal)?)?;
    stream.flush()?;
    Ok(())
}

fn handle_connection(
    stream: TcpStream,
    core: &Core,
    timeout: Duration,
) -> Result<(), ServiceError> {
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    let peer = stream.peer_addr()?;
    debug!(%peer, "connection accepted");
    exchange(stream, core)
}

/// Read one request, answer it.
pub(crate) fn exchange<S: Read + Write>(mut stream: S, core: &Core) -> Result<(), ServiceError> {
    let mut request = Vec::with_capacity(4096);
    (&mut stream)
        .take(MAX_REQUEST_BYTES + 1)
        .read_to_end(&mut request)?;

    let response = respond(&request, core);
    stream.write_all(&serde_json::to_vec(&response)?)?;
    stream.flush()?;
    Ok(())
}

fn respond(request: &[u8], core: &Core) -> ActivationResponseMsg {
    if request.len() as u64 > MAX_REQUEST_BYTES {
        warn!(limit = MAX_REQUEST_BYTES, "request too large");
        return ActivationResponseMsg::refusal(ErrorKind::BadRequest);
    }
    let parsed = serde_json::from_slice::<ActivationRequestMsg>(request)
        .map_err(ServiceError::from)
        .and_then(ActivationRequestMsg::into_request);
    match parsed {
        Ok(req) => ActivationResponseMsg::from_result(&core.activate(&req)),
        Err(e) => {
            warn!(error = %e, "request rejected");
            ActivationResponseMsg::refusal(ErrorKind::BadRequest)
        }
    }
}
