use std::{
    fmt::Display,
    io::Write,
    time::{Duration, Instant},
};

const MB: f64 = 1024. * 1024.;

/// Progress state of one stream download.
///
/// A new tracker must be created right before each transfer begins.
#[derive(Debug, Clone, Copy)]
pub struct ProgressTracker {
    total: u64,
    start: Instant,
}

/// A point-in-time view of a download progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub percent: f64,
    pub downloaded: u64,
    pub total: u64,
    /// Average throughput since the start, in bytes per second
    pub speed: f64,
    /// Estimated remaining time, in seconds. Zero while the speed is unknown
    pub eta: f64,
}

impl ProgressTracker {
    pub fn start(total: u64) -> Self {
        Self::started_at(total, Instant::now())
    }

    pub fn started_at(total: u64, start: Instant) -> Self {
        Self { total, start }
    }

    /// Adopt the total reported by the transport when the size was not known beforehand
    pub fn set_total_if_unknown(&mut self, total: u64) {
        if self.total == 0 {
            self.total = total;
        }
    }

    pub fn snapshot(&self, downloaded: u64) -> Progress {
        self.snapshot_after(downloaded, self.start.elapsed())
    }

    pub fn snapshot_after(&self, downloaded: u64, elapsed: Duration) -> Progress {
        let elapsed = elapsed.as_secs_f64();
        let percent = if self.total > 0 {
            downloaded as f64 / self.total as f64 * 100.
        } else {
            0.
        };
        let speed = if elapsed > 0. {
            downloaded as f64 / elapsed
        } else {
            0.
        };
        let eta = if speed > 0. {
            self.total.saturating_sub(downloaded) as f64 / speed
        } else {
            0.
        };

        Progress {
            percent,
            downloaded,
            total: self.total,
            speed,
            eta,
        }
    }
}

impl Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.1}% | {:.2}MB of {:.2}MB | {:.2}MB/s | ETA: {:.1}s",
            self.percent,
            self.downloaded as f64 / MB,
            self.total as f64 / MB,
            self.speed / MB,
            self.eta
        )
    }
}

/// Overwrite the current console line with the given status
pub fn print_status_line<D: Display>(status: D) {
    let mut stdout = std::io::stdout().lock();
    // A broken console must not fail the download
    let _ = write!(stdout, "\r{status}");
    let _ = stdout.flush();
}

/// Terminate the status line so that the next output starts on a fresh line
pub fn end_status_line() {
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_percent_speed_and_eta() {
        let tracker = ProgressTracker::start(10 * 1024 * 1024);
        let progress = tracker.snapshot_after(4 * 1024 * 1024, Duration::from_secs(2));

        assert_eq!(progress.percent, 40.);
        assert_eq!(progress.speed, 2. * MB);
        assert_eq!(progress.eta, 3.);
        assert_eq!(
            progress.to_string(),
            "40.0% | 4.00MB of 10.00MB | 2.00MB/s | ETA: 3.0s"
        );
    }

    #[test]
    fn eta_is_zero_without_throughput() {
        let tracker = ProgressTracker::start(1000);

        let progress = tracker.snapshot_after(0, Duration::from_secs(5));
        assert_eq!(progress.speed, 0.);
        assert_eq!(progress.eta, 0.);

        let progress = tracker.snapshot_after(500, Duration::ZERO);
        assert_eq!(progress.speed, 0.);
        assert_eq!(progress.eta, 0.);
        assert_eq!(progress.percent, 50.);
    }

    #[test]
    fn unknown_total_is_taken_from_transport() {
        let mut tracker = ProgressTracker::start(0);
        assert_eq!(tracker.snapshot_after(10, Duration::from_secs(1)).percent, 0.);

        tracker.set_total_if_unknown(100);
        tracker.set_total_if_unknown(200);
        assert_eq!(tracker.total, 100);
        assert_eq!(tracker.snapshot_after(10, Duration::from_secs(1)).percent, 10.);
    }

    #[test]
    fn each_tracker_has_its_own_start() {
        let earlier = Instant::now() - Duration::from_secs(10);
        let old = ProgressTracker::started_at(100, earlier);
        let restarted = ProgressTracker::started_at(100, earlier + Duration::from_secs(8));

        assert!(old.snapshot(50).speed <= 5.);
        assert!(restarted.snapshot(50).speed > old.snapshot(50).speed);
    }
}
