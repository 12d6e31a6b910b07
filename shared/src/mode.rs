use std::fmt::Display;
use std::io::{Read, Write};

use clap::ValueEnum;
use quanta::Instant;

use crate::{
    clock::WallClock,
    error::TransferError,
    frame::{read_timestamp, write_timestamp, FrameCodec},
};

/// How the receiver answers each frame. Fixed for the lifetime of a
/// connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ExchangeMode {
    /// Echo the identical frame back.
    #[default]
    RoundTrip,
    /// Reply with the receiver's wall-clock time as a bare big-endian `f64`.
    OneWay,
}

/// Both clocks are read when the send starts; the mode decides which one the
/// sample is measured against.
#[derive(Debug, Clone, Copy)]
pub struct SendStart {
    pub monotonic: Instant,
    pub wall_secs: f64,
}

/// What came back for one iteration.
#[derive(Debug)]
pub enum Reply {
    Echo(Vec<u8>),
    Timestamp(f64),
}

impl ExchangeMode {
    /// Receiver side: answer one received payload.
    pub fn reply(
        &self,
        stream: &mut impl Write,
        codec: &FrameCodec,
        payload: &[u8],
        clock: &impl WallClock,
    ) -> Result<(), TransferError> {
        match self {
            ExchangeMode::RoundTrip => codec.write_frame(stream, payload),
            ExchangeMode::OneWay => write_timestamp(stream, clock.now_secs()),
        }
    }

    /// Sender side: block until the reply for the frame just sent arrives.
    pub fn await_reply(
        &self,
        stream: &mut impl Read,
        codec: &FrameCodec,
    ) -> Result<Reply, TransferError> {
        match self {
            ExchangeMode::RoundTrip => codec.read_frame(stream).map(Reply::Echo),
            ExchangeMode::OneWay => read_timestamp(stream).map(Reply::Timestamp),
        }
    }
}

impl Reply {
    /// Seconds for this iteration: elapsed monotonic time for an echo, the
    /// receiver's stamp minus our send start for a timestamp.
    pub fn sample(&self, start: &SendStart, now: Instant) -> f64 {
        match self {
            Reply::Echo(_) => (now - start.monotonic).as_secs_f64(),
            Reply::Timestamp(remote_secs) => remote_secs - start.wall_secs,
        }
    }
}

impl Display for ExchangeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExchangeMode::RoundTrip => write!(f, "round-trip"),
            ExchangeMode::OneWay => write!(f, "one-way"),
        }
    }
}
