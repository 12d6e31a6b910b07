use std::{
    io::{self, ErrorKind, Read, Write},
    net::{SocketAddr, TcpListener},
};

use tracing::{debug, info, trace, warn};

use crate::{
    cancel::CancelToken,
    clock::{SystemClock, WallClock},
    config::ReceiverConfig,
    connection::{Connection, SessionState},
    error::TransferError,
    frame::FrameCodec,
    payload::ArrayPayload,
    stats::Samples,
};

/// Most samples reserved up front for one session.
const PREALLOCATED_SAMPLES: usize = 4096;

/// Outcome of one accepted connection.
#[derive(Debug)]
pub struct SessionReport {
    pub peer: SocketAddr,
    /// Per-iteration service time, read start to reply written.
    pub samples: Samples,
    /// What ended the session early, if anything.
    pub error: Option<TransferError>,
}

impl SessionReport {
    pub fn completed(&self) -> usize {
        self.samples.len()
    }
}

#[derive(Debug)]
pub struct Receiver<W = SystemClock> {
    config: ReceiverConfig,
    codec: FrameCodec,
    monotonic: quanta::Clock,
    clock: W,
}

impl Receiver {
    pub fn new(config: ReceiverConfig) -> Self {
        Self {
            codec: FrameCodec::new(config.max_frame_len),
            config,
            monotonic: quanta::Clock::new(),
            clock: SystemClock,
        }
    }
}

impl<W: WallClock> Receiver<W> {
    pub fn with_clock<W2: WallClock>(self, clock: W2) -> Receiver<W2> {
        Receiver {
            config: self.config,
            codec: self.codec,
            monotonic: self.monotonic,
            clock,
        }
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    pub fn bind(&self) -> io::Result<TcpListener> {
        TcpListener::bind(self.config.bind_addr)
    }

    /// Accepts and serves one client at a time until cancelled or until
    /// `max_sessions` sessions have been served. A failing session is logged
    /// and closed; only a failing listener ends the loop with an error.
    pub fn serve(
        &self,
        listener: &TcpListener,
        cancel: &CancelToken,
    ) -> Result<Vec<SessionReport>, TransferError> {
        let local_addr = listener.local_addr()?;
        let _wake = cancel.register_listener(local_addr);
        let mut reports = Vec::new();

        info!(%local_addr, mode = %self.config.mode, "waiting for connection");

        loop {
            if self.config.max_sessions.is_some_and(|max| reports.len() >= max) {
                break;
            }

            if cancel.is_cancelled() {
                break;
            }

            let stream = match listener.accept() {
                Ok((stream, _)) => stream,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) if cancel.is_cancelled() => break,
                Err(e) => return Err(e.into()),
            };

            // The wake-up connection from `cancel` lands here.
            if cancel.is_cancelled() {
                break;
            }

            let mut connection = match Connection::open(stream, cancel) {
                Ok(connection) => connection,
                Err(e) => {
                    warn!("failed to set up accepted connection: {e}");
                    continue;
                }
            };
            info!(peer = %connection.peer(), "got connection");

            let report = self.run_session(&mut connection, cancel);
            drop(connection);

            let cancelled = matches!(report.error, Some(TransferError::Cancelled));
            reports.push(report);

            if cancelled {
                break;
            }

            debug!(sessions = reports.len(), "back to accept");
        }

        Ok(reports)
    }

    fn run_session(&self, connection: &mut Connection, cancel: &CancelToken) -> SessionReport {
        let peer = connection.peer();
        let mut samples = Samples::with_capacity(self.config.iterations.min(PREALLOCATED_SAMPLES));

        connection.set_state(SessionState::Exchanging);

        let error = match self.serve_session(connection, &mut samples, cancel) {
            Ok(()) => None,
            Err(_) if cancel.is_cancelled() => Some(TransferError::Cancelled),
            Err(e) => {
                if e.is_disconnect() {
                    info!(%peer, completed = samples.len(), "client disconnected: {e}");
                } else {
                    warn!(%peer, completed = samples.len(), "session aborted: {e}");
                }
                Some(e)
            }
        };

        if let Some(summary) = samples.summary(0) {
            info!(
                %peer,
                completed = summary.count,
                mean_ms = summary.mean * 1e3,
                "average service time"
            );
        }

        SessionReport {
            peer,
            samples,
            error,
        }
    }

    /// The per-connection loop: read a frame, validate it, answer it.
    pub fn serve_session(
        &self,
        stream: &mut (impl Read + Write),
        samples: &mut Samples,
        cancel: &CancelToken,
    ) -> Result<(), TransferError> {
        for iteration in 0..self.config.iterations {
            cancel.check()?;

            let start = self.monotonic.now();

            let payload = self.codec.read_frame(stream)?;
            debug!(iteration, len = payload.len(), "frame received");

            if self.config.validate_payload {
                let array = ArrayPayload::from_bytes(&payload)?;
                trace!(shape = ?array.shape(), "payload decoded");
            }

            self.config
                .mode
                .reply(stream, &self.codec, &payload, &self.clock)?;

            samples.push((self.monotonic.now() - start).as_secs_f64());
        }

        Ok(())
    }
}
