//! Process-level plumbing: signal handling and daemonizing

use std::io;
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use crate::shutdown::ShutdownHandle;

fn shutdown_signals() -> libc::sigset_t {
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGINT);
        libc::sigaddset(&mut set, libc::SIGTERM);
        set
    }
}

/// Block SIGINT and SIGTERM in the calling thread
///
/// Threads spawned afterwards inherit the mask, so call this before
/// spawning anything and let [`spawn_signal_listener`] take delivery.
pub fn block_shutdown_signals() -> io::Result<()> {
    let set = shutdown_signals();
    let rc = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut()) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }
    Ok(())
}

/// Wait for SIGINT or SIGTERM on a dedicated thread, then request shutdown
pub fn spawn_signal_listener(shutdown: ShutdownHandle) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            let set = shutdown_signals();
            let mut signal: libc::c_int = 0;
            loop {
                let rc = unsafe { libc::sigwait(&set, &mut signal) };
                match rc {
                    0 => break,
                    libc::EINTR => continue,
                    rc => {
                        warn!(error = %io::Error::from_raw_os_error(rc), "sigwait failed");
                        return;
                    }
                }
            }
            info!(signal, "Caught signal, exiting");
            shutdown.trigger();
        })
}

/// Detach from the terminal
///
/// Changes directory to `/` and points stdio at `/dev/null`. Call after
/// binding and before any thread is spawned.
pub fn daemonize() -> io::Result<()> {
    let rc = unsafe { libc::daemon(0, 0) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
