use std::time::Duration;

use log::*;
use terminal_payment_engine::{PaymentDispatchApi, SqliteDatabase, SweepReport};
use tokio::task::JoinHandle;

use crate::integrations::stripe::StripeProcessor;

/// Starts the sweeper. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Each tick runs [`PaymentDispatchApi::sweep`]. Payment claims that have been stuck before dispatch for longer than
/// `stale_after` are released. Unpaid dispatched intents expire according to the dispatch policy.
pub fn start_sweeper(
    api: PaymentDispatchApi<SqliteDatabase, StripeProcessor>,
    interval: Duration,
    stale_after: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🧹️ Payment sweeper started. Running every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            trace!("🧹️ Running payment sweep");
            match api.sweep(stale_after).await {
                Ok(report) if report == SweepReport::default() => trace!("🧹️ Nothing to sweep"),
                Ok(report) => log_report(&report),
                Err(e) => error!("🧹️ Error running payment sweep: {e}"),
            }
        }
    })
}

fn log_report(report: &SweepReport) {
    info!(
        "🧹️ Sweep complete. {} orphaned intents canceled, {} expired, {} still orphaned, {} stale claims released",
        report.canceled.len(),
        report.expired.len(),
        report.still_orphaned.len(),
        report.abandoned.len()
    );
    if !report.still_orphaned.is_empty() {
        warn!("🧹️ Payment intents that could not be canceled: {}", report.still_orphaned.join(", "));
    }
    debug!(
        "🧹️ Canceled: [{}]. Expired: [{}]. Released attempts: {:?}",
        report.canceled.join(", "),
        report.expired.join(", "),
        report.abandoned
    );
}
