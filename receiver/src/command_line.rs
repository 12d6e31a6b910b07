use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::Parser;
use shared::{
    config::{ReceiverConfig, DEFAULT_ITERATIONS, DEFAULT_PORT},
    frame::DEFAULT_MAX_FRAME_LEN,
    ExchangeMode,
};

#[derive(Parser, Debug)]
#[command(version, about = "Serve array transfer benchmarks, one client at a time", long_about = None)]
pub struct GlobalArgs {
    #[arg(short, long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Frames served per connection.
    #[arg(short, long, default_value_t = DEFAULT_ITERATIONS)]
    pub iterations: usize,
    #[arg(short, long, value_enum, default_value_t = ExchangeMode::RoundTrip)]
    pub mode: ExchangeMode,
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_LEN)]
    pub max_frame_len: usize,
    /// Accept any payload bytes instead of decoding them as an array.
    #[arg(long)]
    pub no_validate: bool,
    /// Exit after serving this many connections.
    #[arg(long)]
    pub max_sessions: Option<usize>,
    #[arg(short, long)]
    pub verbose: bool,
}

impl GlobalArgs {
    pub fn to_config(&self) -> ReceiverConfig {
        ReceiverConfig {
            bind_addr: SocketAddr::new(self.bind, self.port),
            iterations: self.iterations,
            mode: self.mode,
            max_frame_len: self.max_frame_len,
            validate_payload: !self.no_validate,
            max_sessions: self.max_sessions,
        }
    }
}
