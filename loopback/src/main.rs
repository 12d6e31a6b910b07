use std::{
    net::{Ipv4Addr, SocketAddr},
    thread,
};

use anyhow::{anyhow, Context};
use clap::Parser;
use quanta::Clock;
use shared::{
    config::{ReceiverConfig, SenderConfig},
    logging,
    payload::ArrayPayload,
    receiver::Receiver,
    sender, CancelToken, ExchangeMode,
};
use tracing::{info, warn};

use crate::command_line::GlobalArgs;

mod command_line;

fn main() -> anyhow::Result<()> {
    let args = GlobalArgs::parse();
    logging::init(args.verbose);

    let receiver = Receiver::new(ReceiverConfig {
        bind_addr: SocketAddr::new(Ipv4Addr::LOCALHOST.into(), args.port),
        iterations: args.iterations,
        mode: args.mode,
        max_sessions: Some(1),
        ..Default::default()
    });

    let listener = receiver.bind().context("failed to bind loopback listener")?;

    let sender_config = SenderConfig {
        server_addr: listener.local_addr()?,
        iterations: args.iterations,
        mode: args.mode,
        shape: args.shape.clone(),
        warmup: args.warmup,
        ..Default::default()
    };

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel()).context("failed to install Ctrl-C handler")?;

    let payload = ArrayPayload::random(&sender_config.shape, &mut rand::thread_rng())
        .context("invalid array shape")?
        .to_bytes();

    let clock = Clock::new();
    let begin = clock.now();

    let (served, sent) = thread::scope(|s| {
        let server = s.spawn(|| receiver.serve(&listener, &cancel));

        let sent = sender::send(&sender_config, payload, &cancel);
        if sent.is_err() {
            // The receiver may still be parked in accept.
            cancel.cancel();
        }

        (server.join(), sent)
    });

    let elapsed = clock.now() - begin;

    let sessions = served
        .map_err(|_| anyhow!("receiver thread panicked"))?
        .context("receiver failed")?;
    let report = sent.context("sender failed")?;

    for session in &sessions {
        match &session.error {
            Some(error) => warn!(
                peer = %session.peer,
                completed = session.completed(),
                "receiver session ended early: {error}"
            ),
            None => info!(
                peer = %session.peer,
                completed = session.completed(),
                "receiver session finished"
            ),
        }
    }

    if report.cancelled {
        info!(completed = report.samples.len(), "interrupted");
    }

    let label = match args.mode {
        ExchangeMode::RoundTrip => "Round trip time",
        ExchangeMode::OneWay => "Transfer time",
    };

    match report.summary {
        Some(summary) => println!("{label}: {summary}"),
        None => println!("{label}: no samples after warm-up"),
    }

    if args.histogram {
        print!("{}", report.samples.histogram(args.warmup, 20, 50));
    }

    let directions = match args.mode {
        ExchangeMode::RoundTrip => 2,
        ExchangeMode::OneWay => 1,
    };
    let moved = report.payload_len * report.samples.len() * directions;

    println!(
        "Throughput: {} MB/s",
        moved as f64 / 1e6 / elapsed.as_secs_f64()
    );

    Ok(())
}
