use clap::Parser;
use shared::{config::DEFAULT_ITERATIONS, payload::DEFAULT_SHAPE, ExchangeMode};

#[derive(Parser, Debug)]
#[command(version, about = "Run sender and receiver against each other over loopback", long_about = None)]
pub struct GlobalArgs {
    /// 0 picks a free port.
    #[arg(short, long, default_value_t = 0)]
    pub port: u16,
    #[arg(short, long, default_value_t = DEFAULT_ITERATIONS)]
    pub iterations: usize,
    #[arg(short, long, value_enum, default_value_t = ExchangeMode::RoundTrip)]
    pub mode: ExchangeMode,
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_SHAPE)]
    pub shape: Vec<usize>,
    #[arg(short, long, default_value_t = 0)]
    pub warmup: usize,
    #[arg(long)]
    pub histogram: bool,
    #[arg(short, long)]
    pub verbose: bool,
}
