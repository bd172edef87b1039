use chrono::{DateTime, Local, TimeZone};
use std::sync::Arc;
use tokio::time::{Duration, sleep};
use tracing::{debug, info};

use crate::quota::QuotaLedger;

// Used when the next midnight can't be computed (DST gap, calendar overflow)
const FALLBACK_RECHECK: Duration = Duration::from_secs(60);

// First instant of the next calendar day in `now`'s timezone
pub fn next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tomorrow = now.date_naive().succ_opt()?;
    let midnight = tomorrow.and_hms_opt(0, 0, 0)?;
    now.timezone().from_local_datetime(&midnight).earliest()
}

pub fn until_next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    next_midnight(now)
        .and_then(|next| next.signed_duration_since(now.clone()).to_std().ok())
        .unwrap_or(FALLBACK_RECHECK)
}

// Clear every premium counter. Free usage is lifetime scoped and stays.
pub fn rollover(ledger: &QuotaLedger) -> usize {
    let cleared = ledger.reset_premium();
    info!(cleared, "premium daily usage has been reset");
    cleared
}

// One scheduler wake-up: clear premium usage only if the calendar day moved.
// The sleep timer is monotonic and can end early or late relative to wall clock.
pub fn rollover_if_due<Tz: TimeZone>(
    ledger: &QuotaLedger,
    started: &DateTime<Tz>,
    now: &DateTime<Tz>,
) -> Option<usize> {
    if now.date_naive() > started.date_naive() {
        Some(rollover(ledger))
    } else {
        debug!("woke before the date changed, premium usage kept");
        None
    }
}

// Daily reset task - sleeps until local midnight, then clears premium usage
pub async fn premium_reset_scheduler(ledger: Arc<QuotaLedger>) {
    info!("premium reset scheduler started");

    loop {
        let started = Local::now();
        let wait = until_next_midnight(&started);
        debug!(wait_secs = wait.as_secs(), "next premium reset scheduled");

        sleep(wait).await;
        rollover_if_due(&ledger, &started, &Local::now());
    }
}
