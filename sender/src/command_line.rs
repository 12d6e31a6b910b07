use std::{
    net::{SocketAddr, ToSocketAddrs},
    time::Duration,
};

use anyhow::{anyhow, Context};
use clap::Parser;
use shared::{
    config::{SenderConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_ITERATIONS, DEFAULT_PORT},
    frame::DEFAULT_MAX_FRAME_LEN,
    payload::DEFAULT_SHAPE,
    ExchangeMode,
};

#[derive(Parser, Debug)]
#[command(version, about = "Send a random array and time the replies", long_about = None)]
pub struct GlobalArgs {
    #[arg(short, long, default_value = "127.0.0.1")]
    pub server_addr: String,
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    #[arg(short, long, default_value_t = DEFAULT_ITERATIONS)]
    pub iterations: usize,
    #[arg(short, long, value_enum, default_value_t = ExchangeMode::RoundTrip)]
    pub mode: ExchangeMode,
    /// Array shape, comma separated.
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_SHAPE)]
    pub shape: Vec<usize>,
    /// Leading samples left out of the statistics.
    #[arg(short, long, default_value_t = 0)]
    pub warmup: usize,
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_LEN)]
    pub max_frame_len: usize,
    /// Treat echoed payloads as opaque bytes instead of decoding them.
    #[arg(long)]
    pub no_validate: bool,
    /// Seconds to keep trying to reach the receiver.
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT.as_secs())]
    pub connect_timeout: u64,
    /// Print a histogram of the samples.
    #[arg(long)]
    pub histogram: bool,
    #[arg(short, long)]
    pub verbose: bool,
}

impl GlobalArgs {
    pub fn to_config(&self) -> anyhow::Result<SenderConfig> {
        Ok(SenderConfig {
            server_addr: resolve(&self.server_addr, self.port)?,
            iterations: self.iterations,
            mode: self.mode,
            shape: self.shape.clone(),
            warmup: self.warmup,
            max_frame_len: self.max_frame_len,
            validate_payload: !self.no_validate,
            connect_timeout: Duration::from_secs(self.connect_timeout),
        })
    }
}

fn resolve(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("failed to resolve {host}"))?
        .next()
        .ok_or_else(|| anyhow!("{host} did not resolve to any address"))
}
