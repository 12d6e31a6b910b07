use anyhow::Context;
use clap::Parser;
use shared::{logging, receiver::Receiver, CancelToken};
use tracing::info;

use crate::command_line::GlobalArgs;

mod command_line;

fn main() -> anyhow::Result<()> {
    let args = GlobalArgs::parse();
    logging::init(args.verbose);

    let receiver = Receiver::new(args.to_config());

    let listener = receiver
        .bind()
        .with_context(|| format!("failed to bind {}", receiver.config().bind_addr))?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel()).context("failed to install Ctrl-C handler")?;

    let reports = receiver.serve(&listener, &cancel).context("listener failed")?;

    let completed: usize = reports.iter().map(|report| report.completed()).sum();
    info!(sessions = reports.len(), completed, "receiver stopped");

    Ok(())
}
