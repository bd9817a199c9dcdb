//! Connection supervisor
//!
//! Owns the listening socket and every worker thread. Runs through
//! `Listening -> Draining -> Stopped`:
//!
//! - **Listening**: accept, spawn a worker per connection, reap finished
//!   workers after each accept.
//! - **Draining**: entered once shutdown is requested; no more accepts,
//!   wait for every outstanding worker to report completion.
//! - **Stopped**: stop the timestamp producer, release the shared log.
//!
//! Workers report completion on a channel, so reaping never inspects
//! unsynchronized state.

use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use aesd_storage::{RingStore, SharedLog, StreamStore};
use tracing::{debug, error, info, warn};

use crate::config::{Backend, ServerConfig};
use crate::context::{ConnectionStats, ServerContext};
use crate::error::{ServerError, ServerResult};
use crate::producer::PeriodicProducer;
use crate::shutdown::ShutdownHandle;
use crate::worker::{ConnectionId, ConnectionWorker, WorkerOutcome};

/// Lifecycle of the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Listening,
    Draining,
    Stopped,
}

/// What a completed run did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Connections accepted and served
    pub connections: u64,
    /// Whether the timestamp producer ran
    pub timestamps_enabled: bool,
}

/// Tracking record of one outstanding worker
#[derive(Debug)]
struct ConnectionRecord {
    peer: SocketAddr,
    worker: JoinHandle<WorkerOutcome>,
    accepted_at: Instant,
}

/// Reports completion when the worker thread exits, panics included
struct CompletionGuard {
    id: ConnectionId,
    completions: Sender<ConnectionId>,
    stats: ConnectionStats,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.stats.connection_closed();
        // the supervisor outlives every worker; a closed channel means it is gone
        let _ = self.completions.send(self.id);
    }
}

/// Open the backing store named by the config
pub fn open_log(config: &ServerConfig) -> ServerResult<SharedLog> {
    let log = match config.backend {
        Backend::Ring => SharedLog::new(RingStore::with_capacity(config.ring_capacity)),
        Backend::File => SharedLog::new(StreamStore::create_file(&config.data_path)?),
        Backend::Device => SharedLog::new(StreamStore::open_device(&config.device_path)?),
    };
    Ok(log)
}

/// Accept loop plus worker bookkeeping
pub struct Supervisor {
    listener: TcpListener,
    context: Arc<ServerContext>,
    shutdown: ShutdownHandle,
    timestamp_interval: Option<Duration>,
    state: SupervisorState,
    connections: HashMap<ConnectionId, ConnectionRecord>,
    completions_tx: Sender<ConnectionId>,
    completions_rx: Receiver<ConnectionId>,
    next_id: ConnectionId,
}

impl Supervisor {
    /// Bind the listening socket, then open the configured backing store
    pub fn bind(config: &ServerConfig) -> ServerResult<Self> {
        config.validate()?;
        let listener = bind_listener(config.socket_addr())?;
        let log = open_log(config)?;
        Ok(Self::from_parts(config, listener, log))
    }

    /// Bind the listening socket and serve an already opened log
    pub fn with_log(config: &ServerConfig, log: SharedLog) -> ServerResult<Self> {
        config.validate()?;
        let listener = bind_listener(config.socket_addr())?;
        Ok(Self::from_parts(config, listener, log))
    }

    fn from_parts(config: &ServerConfig, listener: TcpListener, log: SharedLog) -> Self {
        let shutdown = ShutdownHandle::new();
        let context = Arc::new(ServerContext::new(config, log, shutdown.clone()));
        let (completions_tx, completions_rx) = mpsc::channel();
        Self {
            listener,
            context,
            shutdown,
            timestamp_interval: config.timestamp_interval(),
            state: SupervisorState::Listening,
            connections: HashMap::new(),
            completions_tx,
            completions_rx,
            next_id: 0,
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle that stops [`run`](Self::run) from any thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn stats(&self) -> ConnectionStats {
        self.context.stats().clone()
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Serve until shutdown is requested, then drain and release the log
    ///
    /// Errors, in order of precedence: a failed accept, a storage failure
    /// recorded by any thread, a failure releasing the log.
    pub fn run(mut self) -> ServerResult<RunSummary> {
        let kind = self.context.log().kind();
        let interval = self
            .timestamp_interval
            .filter(|_| kind.accepts_generated_records());
        let producer = match interval {
            Some(interval) => Some(
                PeriodicProducer::spawn(Arc::clone(&self.context), interval).map_err(|source| {
                    ServerError::Spawn {
                        what: "timestamp",
                        source,
                    }
                })?,
            ),
            None => None,
        };

        info!(addr = ?self.listener.local_addr().ok(), backend = %kind, "Listening");
        self.shutdown.arm(&self.listener);

        let accepted = self.accept_loop();
        self.state = SupervisorState::Draining;
        info!(outstanding = self.connections.len(), "Draining connections");
        self.drain();

        self.state = SupervisorState::Stopped;
        self.shutdown.disarm();
        if let Some(producer) = producer {
            producer.join();
        }

        let connections = self.context.stats().accepted();
        let Supervisor {
            listener, context, ..
        } = self;
        drop(listener);

        // taken first so a failure is reported even if the log cannot be released
        let fatal = context.take_fatal();
        let closed = match Arc::try_unwrap(context) {
            Ok(context) => context.into_log().close(),
            Err(_) => {
                warn!("Shared log still referenced at shutdown; leaving release to its last owner");
                Ok(())
            }
        };
        info!(connections, "Stopped");

        accepted?;
        if let Some(err) = fatal {
            return Err(err.into());
        }
        closed?;
        Ok(RunSummary {
            connections,
            timestamps_enabled: interval.is_some(),
        })
    }

    fn accept_loop(&mut self) -> ServerResult<()> {
        loop {
            if self.shutdown.is_requested() {
                return Ok(());
            }
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if self.shutdown.is_requested() {
                        debug!(%peer, "Dropping connection accepted during shutdown");
                        return Ok(());
                    }
                    self.spawn_worker(stream, peer)?;
                    self.reap_finished();
                }
                Err(e) if self.shutdown.is_requested() => {
                    debug!(error = %e, "Accept interrupted by shutdown");
                    return Ok(());
                }
                Err(e) => {
                    error!(error = %e, "Accept failed");
                    return Err(ServerError::Accept(e));
                }
            }
        }
    }

    fn spawn_worker(&mut self, stream: TcpStream, peer: SocketAddr) -> ServerResult<()> {
        let id = self.next_id;
        self.next_id += 1;

        let stats = self.context.stats().clone();
        stats.connection_opened();
        let guard = CompletionGuard {
            id,
            completions: self.completions_tx.clone(),
            stats,
        };
        let worker = ConnectionWorker::new(Arc::clone(&self.context), id, peer);

        let handle = thread::Builder::new()
            .name(format!("conn-{id}"))
            .spawn(move || {
                let _guard = guard;
                worker.run(stream)
            })
            .map_err(|source| ServerError::Spawn {
                what: "connection",
                source,
            })?;

        self.connections.insert(
            id,
            ConnectionRecord {
                peer,
                worker: handle,
                accepted_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Join every worker that has already reported completion
    fn reap_finished(&mut self) {
        while let Ok(id) = self.completions_rx.try_recv() {
            self.reap(id);
        }
    }

    /// Block until every outstanding worker has completed
    fn drain(&mut self) {
        self.reap_finished();
        while !self.connections.is_empty() {
            match self.completions_rx.recv() {
                Ok(id) => self.reap(id),
                Err(_) => break,
            }
        }
    }

    fn reap(&mut self, id: ConnectionId) {
        let Some(record) = self.connections.remove(&id) else {
            return;
        };
        match record.worker.join() {
            Ok(outcome) => debug!(
                id,
                peer = %record.peer,
                elapsed = ?record.accepted_at.elapsed(),
                ?outcome,
                "Reaped worker"
            ),
            Err(_) => warn!(id, peer = %record.peer, "Worker panicked"),
        }
    }
}

fn bind_listener(addr: SocketAddr) -> ServerResult<TcpListener> {
    TcpListener::bind(addr).map_err(|source| ServerError::Bind { addr, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::Ipv4Addr;

    fn local_config() -> ServerConfig {
        ServerConfig::default()
            .with_bind_address(Ipv4Addr::LOCALHOST.into())
            .with_port(0)
            .with_backend(Backend::Ring)
            .with_timestamp_interval_secs(0)
    }

    #[test]
    fn test_starts_listening() {
        let supervisor = Supervisor::bind(&local_config()).unwrap();
        assert_eq!(supervisor.state(), SupervisorState::Listening);
        assert_ne!(supervisor.local_addr().unwrap().port(), 0);
    }

    #[test]
    fn test_bind_conflict_reported() {
        let first = Supervisor::bind(&local_config()).unwrap();
        let port = first.local_addr().unwrap().port();
        let err = Supervisor::bind(&local_config().with_port(port)).err().unwrap();
        assert!(matches!(err, ServerError::Bind { .. }));
    }

    #[test]
    fn test_zero_ring_capacity_rejected() {
        let err = Supervisor::bind(&local_config().with_ring_capacity(0)).err().unwrap();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn test_zero_read_chunk_rejected() {
        let config = local_config().with_read_chunk_size(0);
        let err = Supervisor::bind(&config).err().unwrap();
        assert!(matches!(err, ServerError::Config(_)));

        let log = SharedLog::new(RingStore::with_capacity(4));
        let err = Supervisor::with_log(&config, log).err().unwrap();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn test_device_backend_opens_existing_node() {
        let dir = tempfile::TempDir::new().unwrap();
        let node = dir.path().join("aesdchar");
        std::fs::write(&node, b"").unwrap();

        let config = local_config()
            .with_backend(Backend::Device)
            .with_device_path(&node);
        let supervisor = Supervisor::bind(&config).unwrap();
        supervisor.shutdown_handle().trigger();
        let summary = supervisor.run().unwrap();
        assert!(!summary.timestamps_enabled);
        assert!(node.exists());

        let missing = local_config()
            .with_backend(Backend::Device)
            .with_device_path(dir.path().join("absent"));
        let err = Supervisor::bind(&missing).err().unwrap();
        assert!(matches!(err, ServerError::Storage(_)));
    }

    #[test]
    fn test_shutdown_before_run_returns_immediately() {
        let supervisor = Supervisor::bind(&local_config()).unwrap();
        supervisor.shutdown_handle().trigger();
        let summary = supervisor.run().unwrap();
        assert_eq!(summary.connections, 0);
        assert!(!summary.timestamps_enabled);
    }

    #[test]
    fn test_serves_and_reaps() {
        let supervisor = Supervisor::bind(&local_config()).unwrap();
        let addr = supervisor.local_addr().unwrap();
        let shutdown = supervisor.shutdown_handle();
        let server = thread::spawn(move || supervisor.run());

        for line in ["a\n", "b\n"] {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream.write_all(line.as_bytes()).unwrap();
            let mut reply = String::new();
            stream.read_to_string(&mut reply).unwrap();
            assert!(reply.ends_with(line));
        }

        shutdown.trigger();
        let summary = server.join().unwrap().unwrap();
        assert_eq!(summary.connections, 2);
    }
}
