//! Per-connection worker
//!
//! Reads one delimiter-terminated record from the peer, appends it to the
//! shared log, then answers with the entire log and closes. Bytes that follow
//! the delimiter in the same read are dropped.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;

use aesd_core::RecordFramer;
use tracing::{debug, info, info_span, warn};

use crate::context::ServerContext;
use crate::error::ConnectionError;

/// Sequence number of an accepted connection
pub type ConnectionId = u64;

/// How a worker finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// A record was appended and the log sent back
    Responded {
        record_size: usize,
        response_size: usize,
    },
    /// Peer closed before sending a delimiter; nothing was appended
    PeerClosed { discarded: usize },
    /// Transport or storage error; the connection was closed without reply
    Failed,
}

/// Serves a single accepted connection
#[derive(Debug)]
pub struct ConnectionWorker {
    context: Arc<ServerContext>,
    id: ConnectionId,
    peer: SocketAddr,
}

impl ConnectionWorker {
    pub fn new(context: Arc<ServerContext>, id: ConnectionId, peer: SocketAddr) -> Self {
        Self { context, id, peer }
    }

    /// Serve the connection to completion, then close it
    pub fn run(self, mut stream: TcpStream) -> WorkerOutcome {
        let span = info_span!("connection", id = self.id, peer = %self.peer);
        let _enter = span.enter();
        let ip = self.peer.ip();
        info!("Accepted connection from {ip}");

        let outcome = match self.serve(&mut stream) {
            Ok(outcome) => outcome,
            Err(ConnectionError::Storage(e)) => {
                self.context.record_fatal(e);
                WorkerOutcome::Failed
            }
            Err(e) => {
                warn!(error = %e, "Connection failed");
                WorkerOutcome::Failed
            }
        };

        // the peer may already be gone
        let _ = stream.shutdown(Shutdown::Both);
        info!("Closed connection from {ip}");
        outcome
    }

    /// The request/response exchange over any byte stream
    pub fn serve<S: Read + Write>(&self, stream: &mut S) -> Result<WorkerOutcome, ConnectionError> {
        let mut framer = RecordFramer::with_delimiter(self.context.delimiter());
        let mut chunk = vec![0u8; self.context.read_chunk_size()];

        let record = loop {
            let n = match stream.read(&mut chunk) {
                Ok(0) => {
                    let discarded = framer.pending_len();
                    if discarded > 0 {
                        debug!(discarded, "Peer closed mid-record");
                    }
                    return Ok(WorkerOutcome::PeerClosed { discarded });
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ConnectionError::Read(e)),
            };
            if let Some(record) = framer.feed(&chunk[..n]) {
                break record;
            }
        };

        let record_size = record.size();
        let log = self.context.log();
        log.append(record)?;
        debug!(size = record_size, "Record appended");

        let snapshot = log.snapshot()?;
        stream.write_all(&snapshot).map_err(ConnectionError::Write)?;
        stream.flush().map_err(ConnectionError::Write)?;

        Ok(WorkerOutcome::Responded {
            record_size,
            response_size: snapshot.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::shutdown::ShutdownHandle;
    use aesd_storage::{RingStore, SharedLog};
    use std::collections::VecDeque;

    /// Scripted peer: hands out one queued chunk per read, records writes
    struct FakePeer {
        reads: VecDeque<Vec<u8>>,
        written: Vec<u8>,
    }

    impl FakePeer {
        fn new(chunks: &[&[u8]]) -> Self {
            Self {
                reads: chunks.iter().map(|c| c.to_vec()).collect(),
                written: Vec::new(),
            }
        }
    }

    impl Read for FakePeer {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let Some(mut chunk) = self.reads.pop_front() else {
                return Ok(0);
            };
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.reads.push_front(chunk.split_off(n));
            }
            Ok(n)
        }
    }

    impl Write for FakePeer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn worker(config: &ServerConfig) -> ConnectionWorker {
        let ctx = ServerContext::new(
            config,
            SharedLog::new(RingStore::with_capacity(config.ring_capacity)),
            ShutdownHandle::new(),
        );
        ConnectionWorker::new(Arc::new(ctx), 1, "127.0.0.1:4000".parse().unwrap())
    }

    #[test]
    fn test_record_split_across_reads() {
        let w = worker(&ServerConfig::default());
        let mut peer = FakePeer::new(&[b"hel", b"lo\n"]);
        let outcome = w.serve(&mut peer).unwrap();
        assert_eq!(
            outcome,
            WorkerOutcome::Responded {
                record_size: 6,
                response_size: 6
            }
        );
        assert_eq!(peer.written, b"hello\n");
    }

    #[test]
    fn test_response_is_whole_log() {
        let w = worker(&ServerConfig::default());
        w.serve(&mut FakePeer::new(&[b"first\n"])).unwrap();
        let mut peer = FakePeer::new(&[b"second\n"]);
        w.serve(&mut peer).unwrap();
        assert_eq!(peer.written, b"first\nsecond\n");
    }

    #[test]
    fn test_bytes_after_delimiter_dropped() {
        let w = worker(&ServerConfig::default());
        let mut peer = FakePeer::new(&[b"one\ntwo\n"]);
        w.serve(&mut peer).unwrap();
        assert_eq!(peer.written, b"one\n");
    }

    #[test]
    fn test_partial_record_never_committed() {
        let w = worker(&ServerConfig::default());
        let outcome = w.serve(&mut FakePeer::new(&[b"no newline"])).unwrap();
        assert_eq!(outcome, WorkerOutcome::PeerClosed { discarded: 10 });
        assert_eq!(w.context.log().total_size().unwrap(), 0);
    }

    #[test]
    fn test_long_record_uses_many_reads() {
        let config = ServerConfig::default().with_read_chunk_size(7);
        let w = worker(&config);
        let mut line = vec![b'x'; 250];
        line.push(b'\n');
        let mut peer = FakePeer::new(&[line.as_slice()]);
        w.serve(&mut peer).unwrap();
        assert_eq!(peer.written, line);
    }

    #[test]
    fn test_read_error_is_contained() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::from(io::ErrorKind::ConnectionReset))
            }
        }
        impl Write for Broken {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let w = worker(&ServerConfig::default());
        let err = w.serve(&mut Broken).unwrap_err();
        assert!(matches!(err, ConnectionError::Read(_)));
        assert!(!w.context.shutdown().is_requested());
    }
}
