use std::io::{Read, Write};

use derivative::Derivative;
use tracing::{debug, info, trace};

use crate::{
    cancel::CancelToken,
    clock::{SystemClock, WallClock},
    config::SenderConfig,
    connection::{Connection, SessionState},
    error::TransferError,
    frame::FrameCodec,
    mode::{ExchangeMode, Reply, SendStart},
    payload::ArrayPayload,
    stats::{Samples, Summary},
    stream_io::write_all_or_broken,
};

/// One sender run over one connection. The frame is encoded once up front and
/// written unchanged every iteration.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct SenderSession<S, W = SystemClock> {
    #[derivative(Debug = "ignore")]
    stream: S,
    mode: ExchangeMode,
    codec: FrameCodec,
    #[derivative(Debug = "ignore")]
    payload: Vec<u8>,
    #[derivative(Debug = "ignore")]
    frame: Vec<u8>,
    validate_echo: bool,
    monotonic: quanta::Clock,
    #[derivative(Debug = "ignore")]
    wall: W,
    samples: Samples,
}

impl<S: Read + Write> SenderSession<S> {
    pub fn new(
        stream: S,
        mode: ExchangeMode,
        payload: Vec<u8>,
        codec: FrameCodec,
    ) -> Result<Self, TransferError> {
        let frame = codec.encode(&payload)?;

        Ok(Self {
            stream,
            mode,
            codec,
            payload,
            frame,
            validate_echo: false,
            monotonic: quanta::Clock::new(),
            wall: SystemClock,
            samples: Samples::new(),
        })
    }
}

impl<S: Read + Write, W: WallClock> SenderSession<S, W> {
    pub fn with_wall_clock<W2: WallClock>(self, wall: W2) -> SenderSession<S, W2> {
        SenderSession {
            stream: self.stream,
            mode: self.mode,
            codec: self.codec,
            payload: self.payload,
            frame: self.frame,
            validate_echo: self.validate_echo,
            monotonic: self.monotonic,
            wall,
            samples: self.samples,
        }
    }

    pub fn with_monotonic_clock(mut self, clock: quanta::Clock) -> Self {
        self.monotonic = clock;
        self
    }

    /// Decode every echo as an array before comparing it byte for byte.
    pub fn validate_echo(mut self, validate: bool) -> Self {
        self.validate_echo = validate;
        self
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_samples(self) -> Samples {
        self.samples
    }

    /// One iteration: send the frame, wait for the reply, and return the
    /// measured seconds. The sample is not recorded.
    pub fn exchange_once(&mut self) -> Result<f64, TransferError> {
        let start = SendStart {
            monotonic: self.monotonic.now(),
            wall_secs: self.wall.now_secs(),
        };

        write_all_or_broken(&mut self.stream, &self.frame)?;
        trace!(len = self.frame.len(), "frame sent");

        let reply = self.mode.await_reply(&mut self.stream, &self.codec)?;
        let now = self.monotonic.now();

        if let Reply::Echo(echo) = &reply {
            self.check_echo(echo)?;
        }

        Ok(reply.sample(&start, now))
    }

    fn check_echo(&self, echo: &[u8]) -> Result<(), TransferError> {
        if self.validate_echo {
            ArrayPayload::from_bytes(echo)?;
        }

        if echo != self.payload.as_slice() {
            return Err(TransferError::EchoMismatch {
                sent: self.payload.len(),
                received: echo.len(),
            });
        }

        Ok(())
    }

    /// Runs `iterations` exchanges, appending one sample each. The first
    /// failure ends the run; a failure caused by cancellation is reported as
    /// [`TransferError::Cancelled`] and the samples gathered so far are kept.
    pub fn run(&mut self, iterations: usize, cancel: &CancelToken) -> Result<&Samples, TransferError> {
        for iteration in 0..iterations {
            cancel.check()?;

            match self.exchange_once() {
                Ok(sample) => {
                    trace!(iteration, sample, "iteration complete");
                    self.samples.push(sample);
                }
                Err(_) if cancel.is_cancelled() => return Err(TransferError::Cancelled),
                Err(e) => return Err(e),
            }
        }

        Ok(&self.samples)
    }
}

#[derive(Debug)]
pub struct SenderReport {
    pub samples: Samples,
    pub summary: Option<Summary>,
    pub payload_len: usize,
    /// The run was interrupted before all iterations completed.
    pub cancelled: bool,
}

/// Connects once, runs the configured iterations and summarizes them.
pub fn send(
    config: &SenderConfig,
    payload: Vec<u8>,
    cancel: &CancelToken,
) -> Result<SenderReport, TransferError> {
    cancel.check()?;

    let payload_len = payload.len();
    let mut connection = Connection::connect(config.server_addr, config.connect_timeout, cancel)?;
    info!(
        peer = %connection.peer(),
        mode = %config.mode,
        payload_len,
        iterations = config.iterations,
        "connected"
    );
    connection.set_state(SessionState::Exchanging);

    let mut session = SenderSession::new(
        connection,
        config.mode,
        payload,
        FrameCodec::new(config.max_frame_len),
    )?
    .validate_echo(config.validate_payload);

    let cancelled = match session.run(config.iterations, cancel) {
        Ok(_) => false,
        Err(TransferError::Cancelled) => true,
        Err(e) => return Err(e),
    };

    let samples = session.into_samples();
    let summary = samples.summary(config.warmup);
    debug!(completed = samples.len(), cancelled, "run finished");

    Ok(SenderReport {
        samples,
        summary,
        payload_len,
        cancelled,
    })
}
