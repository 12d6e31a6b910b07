use anyhow::Context;
use clap::Parser;
use shared::{logging, payload::ArrayPayload, sender, CancelToken, ExchangeMode, TransferError};
use tracing::info;

use crate::command_line::GlobalArgs;

mod command_line;

fn main() -> anyhow::Result<()> {
    let args = GlobalArgs::parse();
    logging::init(args.verbose);

    let config = args.to_config()?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel()).context("failed to install Ctrl-C handler")?;

    let array = ArrayPayload::random(&config.shape, &mut rand::thread_rng())
        .context("invalid array shape")?;
    let payload = array.to_bytes();

    info!(shape = ?array.shape(), len = payload.len(), "payload built");

    let report = match sender::send(&config, payload, &cancel) {
        Ok(report) => report,
        Err(TransferError::Cancelled) => {
            info!("interrupted before connecting");
            return Ok(());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("transfer to {} failed", config.server_addr))
        }
    };

    if report.cancelled {
        info!(completed = report.samples.len(), "interrupted");
    }

    let label = match config.mode {
        ExchangeMode::RoundTrip => "Round trip time",
        ExchangeMode::OneWay => "Transfer time",
    };

    println!("Data length: {} bytes", report.payload_len);

    match report.summary {
        Some(summary) => {
            println!("{label}: {summary}");

            if args.histogram {
                print!("{}", report.samples.histogram(config.warmup, 20, 50));
            }
        }
        None => println!("{label}: no samples after warm-up"),
    }

    Ok(())
}
