//! Throughput and ETA computation for in-flight transfers.
//!
//! Samples are throttled so the status display is only rewritten when the
//! elapsed time crosses a 10-second boundary or the transfer completes;
//! everything in between is suppressed, and each boundary is pushed at most
//! once however many chunks land inside its rounding window. Cancellation
//! is not handled here. It rides on the session's cancellation token, at
//! chunk granularity, independent of this UI throttle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::format::{format_bytes, format_hms};
use crate::transport::{MessageRef, TransferObserver, Transport};

/// Width of the rendered progress bar, in cells.
const BAR_CELLS: u64 = 20;

/// Seconds between visible progress updates.
const REPORT_INTERVAL_SECS: u64 = 10;

/// A non-suppressed progress computation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    /// Completion percentage, 0 to 100.
    pub percentage: f64,
    /// Bytes transferred so far.
    pub transferred: u64,
    /// Total bytes expected.
    pub total: u64,
    /// Observed speed in bytes per second.
    pub speed: u64,
    /// Estimated seconds until completion.
    pub eta_secs: u64,
    /// Elapsed seconds, rounded.
    pub elapsed_secs: u64,
    /// Estimated total transfer time in seconds (elapsed + ETA).
    pub total_estimate_secs: u64,
}

/// Derives a progress report from one byte-count sample, or suppresses it.
///
/// Reports are only emitted when `round(elapsed)` lands on a
/// 10-second boundary or `current == total`. A zero elapsed time (or a
/// sample with no bytes moved yet) is unmeasurable and suppressed.
///
/// # Errors
///
/// Returns [`Error::ZeroSizedTransfer`] when `total` is zero.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn sample(current: u64, total: u64, elapsed: Duration) -> Result<Option<ProgressReport>> {
    if total == 0 {
        return Err(Error::ZeroSizedTransfer);
    }

    let elapsed_secs = elapsed.as_secs_f64();
    if elapsed_secs == 0.0 {
        return Ok(None);
    }

    let rounded = elapsed_secs.round() as u64;
    if rounded % REPORT_INTERVAL_SECS != 0 && current != total {
        return Ok(None);
    }

    let speed = current as f64 / elapsed_secs;
    if speed == 0.0 {
        return Ok(None);
    }

    let percentage = current as f64 * 100.0 / total as f64;
    let eta_secs = (total.saturating_sub(current) as f64 / speed).round() as u64;

    Ok(Some(ProgressReport {
        percentage,
        transferred: current,
        total,
        speed: speed as u64,
        eta_secs,
        elapsed_secs: rounded,
        total_estimate_secs: rounded.saturating_add(eta_secs),
    }))
}

impl ProgressReport {
    /// Renders the report as the status-display text, under `headline`.
    #[must_use]
    pub fn render(&self, headline: &str) -> String {
        format!(
            "{headline}\n[{}]\nProgress: {:.2}%\nTotal size: {}\nCompleted: {}\nSpeed: {}/s\nETA: {}",
            self.bar(),
            self.percentage,
            format_bytes(self.total),
            format_bytes(self.transferred),
            format_bytes(self.speed),
            format_hms(self.eta_secs),
        )
    }

    /// The fixed-width bar: one cell per 5% completed.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn bar(&self) -> String {
        let filled = ((self.percentage / 5.0).floor() as u64).min(BAR_CELLS);
        let empty = BAR_CELLS - filled;
        format!(
            "{}{}",
            "█".repeat(filled as usize),
            "░".repeat(empty as usize)
        )
    }
}

/// Pushes rendered progress reports to a session's status display.
///
/// Owns the phase's start instant, so downloads and uploads each get an
/// independent throughput baseline. Each 10-second boundary is pushed at
/// most once, no matter how many chunk callbacks land inside its rounding
/// window. Display updates are fire-and-forget: a failed edit is logged
/// and dropped, never surfaced to the transfer.
pub struct StatusReporter {
    transport: Arc<dyn Transport>,
    status: MessageRef,
    headline: &'static str,
    started: Instant,
    last_bucket: AtomicU64,
}

impl StatusReporter {
    /// Creates a reporter for one transfer phase, starting its clock now.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, status: MessageRef, headline: &'static str) -> Self {
        Self {
            transport,
            status,
            headline,
            started: Instant::now(),
            // Past any reachable bucket, so the first admissible sample
            // reports.
            last_bucket: AtomicU64::new(u64::MAX),
        }
    }

    /// Applies the sample throttle, then collapses chunk-level repeats.
    ///
    /// Every chunk arriving inside a boundary's rounding window passes the
    /// 10-second predicate on its own, so the reporter also remembers the
    /// last boundary it pushed and forwards one report per window.
    /// Completion bypasses the latch.
    fn next_report(&self, transferred: u64, total: u64, elapsed: Duration) -> Option<ProgressReport> {
        let report = match sample(transferred, total, elapsed) {
            Ok(Some(report)) => report,
            Ok(None) => return None,
            Err(e) => {
                log::debug!("progress sample unusable: {e}");
                return None;
            }
        };

        if transferred != total {
            let bucket = report.elapsed_secs / REPORT_INTERVAL_SECS;
            if self.last_bucket.swap(bucket, Ordering::Relaxed) == bucket {
                return None;
            }
        }
        Some(report)
    }
}

impl TransferObserver for StatusReporter {
    fn on_chunk(&self, transferred: u64, total: u64) {
        let Some(report) = self.next_report(transferred, total, self.started.elapsed()) else {
            return;
        };
        let text = report.render(self.headline);
        let transport = Arc::clone(&self.transport);
        let status = self.status;
        tokio::spawn(async move {
            if let Err(e) = transport.edit_text(status, &text).await {
                log::debug!("progress update dropped: {e}");
            }
        });
    }
}
