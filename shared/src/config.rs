use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use crate::{frame::DEFAULT_MAX_FRAME_LEN, mode::ExchangeMode, payload::DEFAULT_SHAPE};

pub const DEFAULT_PORT: u16 = 12345;
pub const DEFAULT_ITERATIONS: usize = 100;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub server_addr: SocketAddr,
    pub iterations: usize,
    pub mode: ExchangeMode,
    pub shape: Vec<usize>,
    /// Leading samples left out of the summary.
    pub warmup: usize,
    pub max_frame_len: usize,
    pub validate_payload: bool,
    pub connect_timeout: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::new(Ipv4Addr::LOCALHOST.into(), DEFAULT_PORT),
            iterations: DEFAULT_ITERATIONS,
            mode: ExchangeMode::default(),
            shape: DEFAULT_SHAPE.to_vec(),
            warmup: 0,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            validate_payload: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub bind_addr: SocketAddr,
    /// Frames served per connection before it is closed.
    pub iterations: usize,
    pub mode: ExchangeMode,
    pub max_frame_len: usize,
    pub validate_payload: bool,
    /// Stop accepting after this many sessions; `None` serves until cancelled.
    pub max_sessions: Option<usize>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            iterations: DEFAULT_ITERATIONS,
            mode: ExchangeMode::default(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            validate_payload: true,
            max_sessions: None,
        }
    }
}
