//! Periodic timestamp producer

use std::fmt::Display;
use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use aesd_core::LogEntry;
use chrono::{DateTime, Local, TimeZone};
use tracing::{debug, warn};

use crate::context::ServerContext;

/// RFC 2822 style local time, prefixed and newline terminated
const TIMESTAMP_FORMAT: &str = "timestamp:%a, %d %b %Y %H:%M:%S %z\n";

/// Format a timestamp record for `now`
pub fn timestamp_record<Tz>(now: &DateTime<Tz>) -> LogEntry
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    LogEntry::new(now.format(TIMESTAMP_FORMAT).to_string())
}

/// Thread appending a timestamp record every `interval`
///
/// Cancellation is checked only while waiting between ticks, never while
/// the log lock is held.
#[derive(Debug)]
pub struct PeriodicProducer {
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicProducer {
    pub fn spawn(context: Arc<ServerContext>, interval: Duration) -> io::Result<Self> {
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("timestamp".into())
            .spawn(move || {
                debug!(?interval, "Timestamp producer started");
                loop {
                    match cancel_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    if context.shutdown().is_requested() {
                        break;
                    }
                    let record = timestamp_record(&Local::now());
                    let size = record.size();
                    if let Err(e) = context.log().append(record) {
                        context.record_fatal(e);
                        break;
                    }
                    debug!(size, "Timestamp appended");
                }
                debug!("Timestamp producer stopped");
            })?;

        Ok(Self {
            cancel: Some(cancel_tx),
            handle: Some(handle),
        })
    }

    /// Ask the thread to stop; takes effect at the next wait
    pub fn cancel(&mut self) {
        self.cancel.take();
    }

    /// Cancel and wait for the thread to exit
    pub fn join(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Timestamp producer panicked");
            }
        }
    }
}

impl Drop for PeriodicProducer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::shutdown::ShutdownHandle;
    use aesd_storage::{RingStore, SharedLog};
    use chrono::FixedOffset;
    use std::time::Instant;

    fn context() -> Arc<ServerContext> {
        Arc::new(ServerContext::new(
            &ServerConfig::default(),
            SharedLog::new(RingStore::with_capacity(100)),
            ShutdownHandle::new(),
        ))
    }

    #[test]
    fn test_timestamp_format() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        let record = timestamp_record(&now);
        assert_eq!(record.data(), b"timestamp:Tue, 05 Mar 2024 07:08:09 +0200\n");
    }

    #[test]
    fn test_appends_on_each_tick() {
        let ctx = context();
        let producer = PeriodicProducer::spawn(Arc::clone(&ctx), Duration::from_millis(20)).unwrap();
        thread::sleep(Duration::from_millis(150));
        producer.join();

        let log = ctx.log().snapshot().unwrap();
        let text = String::from_utf8(log).unwrap();
        assert!(text.lines().count() >= 2, "got {text:?}");
        assert!(text.lines().all(|l| l.starts_with("timestamp:")));
    }

    #[test]
    fn test_cancel_is_prompt() {
        let ctx = context();
        let producer = PeriodicProducer::spawn(Arc::clone(&ctx), Duration::from_secs(3600)).unwrap();
        let started = Instant::now();
        producer.join();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(ctx.log().total_size().unwrap(), 0);
    }

    #[test]
    fn test_stops_on_shutdown_request() {
        let ctx = context();
        ctx.shutdown().trigger();
        let producer = PeriodicProducer::spawn(Arc::clone(&ctx), Duration::from_millis(10)).unwrap();
        thread::sleep(Duration::from_millis(60));
        producer.join();
        assert_eq!(ctx.log().total_size().unwrap(), 0);
    }
}
