//! Waiting on a mounted session.
//!
//! A mount ends in one of two ways: the user asks the process to stop
//! (Ctrl+C, SIGTERM, SIGHUP), or the mount goes away underneath it
//! (`fusermount -u`, `umount`), which ends fuser's session thread.

use std::io;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;

/// How often the session thread is checked while waiting for a signal.
pub const SESSION_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Why [`wait_for_shutdown`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// A termination signal arrived.
    Signal,
    /// The session thread finished, so the filesystem was unmounted externally.
    Unmounted,
    /// Every signal sender was dropped.
    ChannelClosed,
}

/// Block until a signal arrives on `signals` or `finished` reports true.
///
/// `finished` is checked once per `poll` interval. A signal that is already
/// queued wins over a finished session.
pub fn wait_for_shutdown(
    signals: &Receiver<()>,
    mut finished: impl FnMut() -> bool,
    poll: Duration,
) -> Shutdown {
    loop {
        match signals.recv_timeout(poll) {
            Ok(()) => return Shutdown::Signal,
            Err(RecvTimeoutError::Disconnected) => return Shutdown::ChannelClosed,
            Err(RecvTimeoutError::Timeout) => {
                if finished() {
                    return Shutdown::Unmounted;
                }
            }
        }
    }
}

/// Join a finished session thread and surface its result.
///
/// A panic on the session thread becomes an `io::Error`.
pub fn join_session(guard: JoinHandle<io::Result<()>>) -> io::Result<()> {
    guard
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("FUSE session thread panicked")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;

    const POLL: Duration = Duration::from_millis(5);

    #[test]
    fn test_signal_ends_wait() {
        let (tx, rx) = mpsc::channel();
        tx.send(()).unwrap();
        assert_eq!(wait_for_shutdown(&rx, || false, POLL), Shutdown::Signal);
    }

    #[test]
    fn test_queued_signal_wins_over_finished_session() {
        let (tx, rx) = mpsc::channel();
        tx.send(()).unwrap();
        assert_eq!(wait_for_shutdown(&rx, || true, POLL), Shutdown::Signal);
    }

    #[test]
    fn test_external_unmount_ends_wait() {
        // The sender stays alive, as the signal handler holds it for the
        // life of the process.
        let (_tx, rx) = mpsc::channel::<()>();
        let checks = AtomicUsize::new(0);
        let outcome = wait_for_shutdown(
            &rx,
            || checks.fetch_add(1, Ordering::SeqCst) >= 3,
            POLL,
        );
        assert_eq!(outcome, Shutdown::Unmounted);
        assert_eq!(checks.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_session_thread_finishing_ends_wait() {
        let (_tx, rx) = mpsc::channel::<()>();
        let release = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&release);
        let guard = thread::spawn(move || {
            while !flag.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
            Ok(())
        });

        release.store(true, Ordering::SeqCst);
        let outcome = wait_for_shutdown(&rx, || guard.is_finished(), POLL);
        assert_eq!(outcome, Shutdown::Unmounted);
        assert!(join_session(guard).is_ok());
    }

    #[test]
    fn test_dropped_sender_ends_wait() {
        let (tx, rx) = mpsc::channel::<()>();
        drop(tx);
        assert_eq!(
            wait_for_shutdown(&rx, || false, POLL),
            Shutdown::ChannelClosed
        );
    }

    #[test]
    fn test_join_session_propagates_error() {
        let guard = thread::spawn(|| Err(io::Error::from_raw_os_error(libc::ENODEV)));
        let err = join_session(guard).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENODEV));
    }

    #[test]
    fn test_join_session_maps_panic() {
        let guard = thread::spawn(|| -> io::Result<()> { panic!("session blew up") });
        let err = join_session(guard).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }
}
