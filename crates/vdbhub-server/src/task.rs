//! Background rescans and inactive VDB rechecks.

use std::future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Interval;
use tracing::{info, warn};

use crate::deployer::Deployer;

/// Handle for the background scan task.
pub struct ScanTask {
    handle: JoinHandle<Deployer>,
    stop_flag: Arc<AtomicBool>,
}

impl ScanTask {
    /// Start rescanning every `scan_interval` and rechecking inactive VDBs
    /// every `recheck_interval`. A `None` interval disables that half.
    pub fn start(
        mut deployer: Deployer,
        scan_interval: Option<Duration>,
        recheck_interval: Option<Duration>,
    ) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_flag_clone = stop_flag.clone();
        let scan_interval = scan_interval.filter(|d| !d.is_zero());
        let recheck_interval = recheck_interval.filter(|d| !d.is_zero());

        let handle = tokio::spawn(async move {
            if scan_interval.is_none() && recheck_interval.is_none() {
                return deployer;
            }
            info!(
                scan_interval = ?scan_interval,
                recheck_interval = ?recheck_interval,
                "Background scan task started"
            );

            let mut scan_ticker = scan_interval.map(tokio::time::interval);
            let mut recheck_ticker = recheck_interval.map(tokio::time::interval);
            // Skip first immediate ticks
            for ticker in [&mut scan_ticker, &mut recheck_ticker].into_iter().flatten() {
                ticker.tick().await;
            }

            loop {
                tokio::select! {
                    _ = tick(&mut scan_ticker) => {
                        if stop_flag_clone.load(Ordering::SeqCst) {
                            break;
                        }
                        if let Err(e) = deployer.scan() {
                            warn!(dir = %deployer.dir().display(), error = %e, "Deployment scan failed");
                        }
                    }
                    _ = tick(&mut recheck_ticker) => {
                        if stop_flag_clone.load(Ordering::SeqCst) {
                            break;
                        }
                        for (key, status) in deployer.registry().recheck_inactive() {
                            if status.is_queryable() {
                                info!(vdb = %key, status = %status, "Inactive VDB recovered");
                            }
                        }
                    }
                }
            }

            info!("Background scan task stopping");
            deployer
        });

        Self { handle, stop_flag }
    }

    /// Signal the task to stop at its next tick.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    /// Stop the task and wait for it; returns the deployer unless the task panicked.
    pub async fn join(self) -> Option<Deployer> {
        self.stop();
        match self.handle.await {
            Ok(deployer) => Some(deployer),
            Err(e) => {
                warn!(error = %e, "Scan task panicked");
                None
            }
        }
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => future::pending::<()>().await,
    }
}
