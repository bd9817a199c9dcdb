//! Process-wide shutdown request

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

/// Listening socket to wake when shutdown is requested
#[derive(Debug, Clone, Copy)]
struct ListenerWaker {
    fd: RawFd,
    addr: SocketAddr,
}

#[derive(Debug, Default)]
struct Inner {
    requested: AtomicBool,
    listener: Mutex<Option<ListenerWaker>>,
}

/// Cloneable handle that requests an orderly shutdown
///
/// Triggering sets the shutdown flag and unblocks a pending `accept` on the
/// armed listener. Safe to call from any thread, any number of times.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    inner: Arc<Inner>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the listener whose `accept` must be interrupted
    ///
    /// Must be paired with [`disarm`](Self::disarm) before the listener is
    /// dropped, otherwise a late trigger could act on a reused descriptor.
    pub fn arm(&self, listener: &TcpListener) {
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                warn!(error = %e, "Listener has no local address; shutdown relies on the flag");
                return;
            }
        };
        *self.inner.listener.lock() = Some(ListenerWaker {
            fd: listener.as_raw_fd(),
            addr,
        });
        if self.is_requested() {
            self.wake_listener();
        }
    }

    /// Forget the armed listener
    pub fn disarm(&self) {
        self.inner.listener.lock().take();
    }

    /// Request shutdown
    pub fn trigger(&self) {
        if self.inner.requested.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Shutdown requested");
        self.wake_listener();
    }

    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    fn wake_listener(&self) {
        // held across the wake so disarm cannot close the fd underneath us
        let guard = self.inner.listener.lock();
        let Some(waker) = *guard else {
            return;
        };

        let rc = unsafe { libc::shutdown(waker.fd, libc::SHUT_RD) };
        if rc == 0 {
            return;
        }
        let err = std::io::Error::last_os_error();
        debug!(error = %err, "shutdown(SHUT_RD) refused on listener; connecting instead");

        let target = SocketAddr::new(loopback_for(waker.addr.ip()), waker.addr.port());
        if let Err(e) = TcpStream::connect_timeout(&target, Duration::from_secs(1)) {
            warn!(error = %e, %target, "Could not wake listener");
        }
    }
}

fn loopback_for(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(v4) if v4.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(v6) if v6.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        other => other,
    }
}
