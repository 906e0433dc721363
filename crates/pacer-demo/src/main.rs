mod config;

use std::path::PathBuf;

use anyhow::bail;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pacer_core::Backoff;
use pacer_observe::init_logger;

use crate::config::{DemoConfig, ENV_FAILURES, ENV_LOG, failures_from};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // 1) config
    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let cfg = DemoConfig::load(path.as_deref())
        .await?
        .with_level_override(std::env::var(ENV_LOG).ok().as_deref())?;
    let failures = failures_from(std::env::var(ENV_FAILURES).ok().as_deref())?;

    // 2) logger
    init_logger(&cfg.logger)?;
    info!(backoff = %cfg.backoff, failures, "starting");

    // 3) ctrl-c cancels the wait in flight
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling");
                cancel.cancel();
            }
        }
    });

    // 4) retry loop
    let mut backoff = Backoff::from_config(cfg.backoff);
    let mut op = FlakyOperation::new(failures);
    while backoff.advance(&cancel).await {
        match op.call() {
            Ok(()) => {
                info!(attempt = backoff.attempt(), "operation succeeded");
                return Ok(());
            }
            Err(e) => {
                warn!(
                    attempt = backoff.attempt(),
                    next_delay = ?backoff.duration(),
                    error = %e,
                    "operation failed"
                );
            }
        }
    }

    if cancel.is_cancelled() {
        bail!("cancelled after {} attempts", backoff.attempt());
    }
    bail!("gave up after {} attempts", backoff.attempt())
}

/// Stand-in for a remote call that fails a fixed number of times.
struct FlakyOperation {
    remaining_failures: u32,
}

impl FlakyOperation {
    fn new(failures: u32) -> Self {
        Self {
            remaining_failures: failures,
        }
    }

    fn call(&mut self) -> anyhow::Result<()> {
        if self.remaining_failures > 0 {
            self.remaining_failures -= 1;
            bail!("simulated failure ({} left)", self.remaining_failures);
        }
        Ok(())
    }
}
