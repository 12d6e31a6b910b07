use std::{
    io::{self, ErrorKind, Read, Write},
    net::{Shutdown, SocketAddr, TcpStream},
    time::Duration,
};

use tracing::{debug, info, trace};

use crate::{
    cancel::{CancelToken, StreamRegistration},
    error::TransferError,
};

/// First connect attempt is short; later ones back off up to the maximum so a
/// slow peer still gets through while a cancel is noticed within a second.
const CONNECT_SLICE_MIN: Duration = Duration::from_millis(100);
const CONNECT_SLICE_MAX: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connected,
    Exchanging,
    Closed,
}

/// Exclusive owner of one session's socket.
///
/// Dropping the connection shuts the socket down, whether the session ended
/// normally, failed, or was interrupted.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    state: SessionState,
    _registration: StreamRegistration,
}

impl Connection {
    pub fn open(stream: TcpStream, cancel: &CancelToken) -> io::Result<Self> {
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        let registration = cancel.register_stream(&stream)?;

        let mut connection = Self {
            stream,
            peer,
            state: SessionState::Idle,
            _registration: registration,
        };
        connection.set_state(SessionState::Connected);

        Ok(connection)
    }

    /// Connects in short attempts, checking `cancel` between them, and gives
    /// up once `timeout` has elapsed.
    pub fn connect(
        addr: SocketAddr,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<Self, TransferError> {
        let stream = connect_in_slices(addr, timeout, cancel, TcpStream::connect_timeout)?;
        Ok(Self::open(stream, cancel)?)
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!(peer = %self.peer, from = ?self.state, to = ?state, "session state");
            self.state = state;
        }
    }
}

fn connect_in_slices<F>(
    addr: SocketAddr,
    timeout: Duration,
    cancel: &CancelToken,
    mut attempt: F,
) -> Result<TcpStream, TransferError>
where
    F: FnMut(&SocketAddr, Duration) -> io::Result<TcpStream>,
{
    let clock = quanta::Clock::new();
    let deadline = clock.now() + timeout;
    let mut slice = CONNECT_SLICE_MIN;

    loop {
        cancel.check()?;

        let now = clock.now();
        if now >= deadline {
            return Err(io::Error::new(
                ErrorKind::TimedOut,
                format!("no connection to {addr} within {timeout:?}"),
            )
            .into());
        }

        match attempt(&addr, slice.min(deadline - now)) {
            Ok(stream) => return Ok(stream),
            Err(_) if cancel.is_cancelled() => return Err(TransferError::Cancelled),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                trace!(%addr, ?slice, "connect attempt timed out");
                slice = (slice * 2).min(CONNECT_SLICE_MAX);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let last = self.state();
        self.set_state(SessionState::Closed);
        let _ = self.stream.shutdown(Shutdown::Both);
        info!(peer = %self.peer, ?last, "connection closed");
    }
}

#[cfg(test)]
mod tests {
    use std::{net::TcpListener, thread, time::Instant};

    use super::*;

    fn documentation_addr() -> SocketAddr {
        "192.0.2.1:12345".parse().unwrap()
    }

    fn timed_out(_: &SocketAddr, slice: Duration) -> io::Result<TcpStream> {
        thread::sleep(slice);
        Err(ErrorKind::TimedOut.into())
    }

    #[test]
    fn open_starts_connected() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancelToken::new();

        let connection = Connection::connect(addr, Duration::from_secs(5), &cancel).unwrap();

        assert_eq!(connection.state(), SessionState::Connected);
        assert_eq!(connection.peer(), addr);
    }

    #[test]
    fn cancel_from_another_thread_stops_a_pending_connect() {
        let cancel = CancelToken::new();
        let started = Instant::now();

        let result = thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(150));
                cancel.cancel();
            });

            connect_in_slices(documentation_addr(), Duration::from_secs(60), &cancel, timed_out)
        });

        assert!(matches!(result, Err(TransferError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn failure_after_cancel_is_reported_as_cancelled() {
        let cancel = CancelToken::new();

        let result = connect_in_slices(documentation_addr(), Duration::from_secs(60), &cancel, |_, _| {
            cancel.cancel();
            Err(ErrorKind::ConnectionRefused.into())
        });

        assert!(matches!(result, Err(TransferError::Cancelled)));
    }

    #[test]
    fn connect_gives_up_at_the_deadline() {
        let cancel = CancelToken::new();

        let result = connect_in_slices(documentation_addr(), Duration::from_millis(300), &cancel, timed_out);

        match result {
            Err(TransferError::Io(e)) => assert_eq!(e.kind(), ErrorKind::TimedOut),
            other => panic!("expected a timeout, got {other:?}"),
        }
    }

    #[test]
    fn refused_connect_is_not_retried() {
        let cancel = CancelToken::new();
        let mut calls = 0;

        let result = connect_in_slices(documentation_addr(), Duration::from_secs(60), &cancel, |_, _| {
            calls += 1;
            Err(ErrorKind::ConnectionRefused.into())
        });

        assert!(matches!(result, Err(TransferError::Io(_))));
        assert_eq!(calls, 1);
    }
}
