//! Frame pacing for senders that emit packets at a fixed rate (e.g. one
//! packet per displayed frame).

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

use crate::error::ConfigError;

/// Suspends the caller until the next scheduled tick.
///
/// After each tick the next one is armed one period after the moment the
/// caller was released, so a slow consumer never triggers a burst of
/// catch-up ticks.
#[derive(Debug)]
pub struct FramePacer {
    period: Duration,
    next: Option<Instant>,
}

impl FramePacer {
    pub fn new(fps: u32) -> Result<Self, ConfigError> {
        if fps == 0 {
            return Err(ConfigError::ZeroFps);
        }
        Ok(FramePacer {
            period: Duration::from_secs(1) / fps,
            next: None,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Arm the first tick one period from now.
    pub fn start(&mut self) {
        self.next = Some(Instant::now() + self.period);
    }

    /// Wait for the next tick. Returns immediately if it has already passed
    /// (or the pacer was never started).
    pub async fn next_frame(&mut self) {
        if let Some(deadline) = self.next {
            if Instant::now() < deadline {
                sleep_until(deadline).await;
            }
        }
        self.next = Some(Instant::now() + self.period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_fps() {
        assert!(matches!(FramePacer::new(0), Err(ConfigError::ZeroFps)));
        let pacer = FramePacer::new(50).unwrap();
        assert_eq!(pacer.period(), Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_one_period_after_start() {
        let mut pacer = FramePacer::new(10).unwrap();
        pacer.start();
        let t0 = Instant::now();
        pacer.next_frame().await;
        assert_eq!(t0.elapsed(), Duration::from_millis(100));
        pacer.next_frame().await;
        assert_eq!(t0.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn late_caller_is_released_immediately() {
        let mut pacer = FramePacer::new(10).unwrap();
        pacer.start();
        tokio::time::advance(Duration::from_millis(250)).await;

        let t0 = Instant::now();
        pacer.next_frame().await;
        assert_eq!(t0.elapsed(), Duration::ZERO);
        // re-armed from release time, not from the missed tick
        pacer.next_frame().await;
        assert_eq!(t0.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn unstarted_pacer_does_not_wait() {
        let mut pacer = FramePacer::new(1).unwrap();
        let t0 = Instant::now();
        pacer.next_frame().await;
        assert_eq!(t0.elapsed(), Duration::ZERO);
    }
}
