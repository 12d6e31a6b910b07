//! Out-of-band cancellation for blocking sockets.
//!
//! A blocked `read` or `accept` never looks at a flag, so cancelling also
//! shuts down every registered stream and pokes the registered listener with a
//! throwaway connection. The loops then observe the flag at their next check.

use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpStream},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use tracing::debug;

use crate::error::TransferError;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    next_id: AtomicU64,
    streams: Mutex<Vec<(u64, TcpStream)>>,
    listeners: Mutex<Vec<SocketAddr>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    pub fn check(&self) -> Result<(), TransferError> {
        if self.is_cancelled() {
            Err(TransferError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Idempotent. Safe to call from a signal handler thread.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }

        for (id, stream) in lock(&self.inner.streams).drain(..) {
            debug!(id, "shutting down registered stream");
            let _ = stream.shutdown(Shutdown::Both);
        }

        for addr in lock(&self.inner.listeners).drain(..) {
            debug!(%addr, "waking listener");
            let _ = TcpStream::connect(connectable(addr));
        }
    }

    /// Keeps a handle to `stream` so [`cancel`](Self::cancel) can unblock it.
    /// The handle is released when the returned registration drops.
    pub fn register_stream(&self, stream: &TcpStream) -> std::io::Result<StreamRegistration> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = stream.try_clone()?;

        if self.is_cancelled() {
            let _ = handle.shutdown(Shutdown::Both);
        } else {
            lock(&self.inner.streams).push((id, handle));
        }

        Ok(StreamRegistration {
            token: self.clone(),
            id,
        })
    }

    pub fn register_listener(&self, addr: SocketAddr) -> ListenerRegistration {
        lock(&self.inner.listeners).push(addr);

        ListenerRegistration {
            token: self.clone(),
            addr,
        }
    }
}

/// A listener bound to the unspecified address is reached through loopback.
fn connectable(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => (Ipv4Addr::LOCALHOST, addr.port()).into(),
        IpAddr::V6(ip) if ip.is_unspecified() => (Ipv6Addr::LOCALHOST, addr.port()).into(),
        _ => addr,
    }
}

#[derive(Debug)]
pub struct StreamRegistration {
    token: CancelToken,
    id: u64,
}

impl Drop for StreamRegistration {
    fn drop(&mut self) {
        lock(&self.token.inner.streams).retain(|(id, _)| *id != self.id);
    }
}

#[derive(Debug)]
pub struct ListenerRegistration {
    token: CancelToken,
    addr: SocketAddr,
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        let mut listeners = lock(&self.token.inner.listeners);
        if let Some(index) = listeners.iter().position(|addr| *addr == self.addr) {
            listeners.swap_remove(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Read, net::TcpListener, thread};

    use super::*;

    #[test]
    fn check_fails_after_cancel() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());

        token.clone().cancel();

        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(TransferError::Cancelled)));
    }

    #[test]
    fn cancel_unblocks_a_blocked_read() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (_server, _) = listener.accept().unwrap();

        let token = CancelToken::new();
        let registration = token.register_stream(&client).unwrap();

        thread::scope(|s| {
            let reader = s.spawn(|| {
                let mut buf = [0u8; 1];
                (&client).read(&mut buf)
            });

            token.cancel();

            // Shutdown turns the pending read into end of stream.
            assert_eq!(reader.join().unwrap().unwrap(), 0);
        });

        drop(registration);
    }

    #[test]
    fn cancel_wakes_a_blocked_accept() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let token = CancelToken::new();
        let _registration = token.register_listener(listener.local_addr().unwrap());

        thread::scope(|s| {
            let acceptor = s.spawn(|| listener.accept().map(|_| ()));

            token.cancel();

            assert!(acceptor.join().unwrap().is_ok());
        });
    }

    #[test]
    fn unspecified_address_is_reached_through_loopback() {
        let addr: SocketAddr = "0.0.0.0:12345".parse().unwrap();
        assert_eq!(connectable(addr), "127.0.0.1:12345".parse::<SocketAddr>().unwrap());
    }
}
