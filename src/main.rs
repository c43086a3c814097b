//! Statement Mailer CLI
//!
//! Mails a monthly summary for each transaction file it processes.
//!
//! # Usage
//!
//! ```bash
//! # one file, then exit
//! cargo run -- transactions.csv [recipient@example.com]
//!
//! # watch WATCH_DIRECTORY until Ctrl-C
//! cargo run
//! ```
//!
//! # Environment Variables
//!
//! See [`statement_mailer::config`]. `RUST_LOG` overrides `LOG_LEVEL`.

use log::{info, warn};
use statement_mailer::{
    CancelToken, Config, CsvIngestor, EmailService, JsonFileStore, OutboxMailer, PollingWatcher,
    ProcessError, Processor, Result, SmtpMailer,
};
use std::env;
use std::path::PathBuf;
use std::process;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    let mut args = env::args().skip(1);
    let input = args.next().map(PathBuf::from);
    let recipient = args.next().unwrap_or_else(|| config.recipient.clone());

    let processor = build_processor(&config)?;

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            trigger.cancel();
        }
    });

    let outcome = match input {
        Some(path) => processor
            .process_one(&path, &recipient, &cancel)
            .map(|report| info!("Sent summary of {} transactions", report.accepted)),
        None => {
            let watcher = PollingWatcher::new(config.poll_interval);
            processor
                .watch_and_process(&watcher, &config.watch_directory, &recipient, &cancel)
                .await
        }
    };

    match outcome {
        Err(e) if e.is_cancelled() => {
            info!("Stopped gracefully");
            Ok(())
        }
        other => other,
    }
}

fn build_processor(config: &Config) -> Result<Processor> {
    let mailer: Box<dyn EmailService> = match &config.smtp {
        Some(smtp) => {
            let mailer = SmtpMailer::new(smtp, &config.mail_from).map_err(|source| {
                ProcessError::EmailDeliveryFailed {
                    recipient: config.recipient.clone(),
                    source,
                }
            })?;
            Box::new(mailer)
        }
        None => {
            info!(
                "SMTP_HOST not set, writing messages to {}",
                config.outbox_directory.display()
            );
            Box::new(OutboxMailer::new(
                &config.outbox_directory,
                config.mail_from.as_str(),
            ))
        }
    };
    let processor = Processor::new(CsvIngestor::new(), mailer);

    let Some(store_path) = &config.store_path else {
        info!("STORE_PATH not set, continuing without persistence");
        return Ok(processor);
    };

    Ok(match JsonFileStore::open(store_path) {
        Ok(store) => processor.with_store(Box::new(store)),
        Err(e) => {
            warn!(
                "Cannot open store {}, continuing without persistence: {}",
                store_path.display(),
                e
            );
            processor
        }
    })
}
