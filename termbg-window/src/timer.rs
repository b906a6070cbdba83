use std::pin::Pin;
use std::time::Duration;
use tokio::time::{Instant, Sleep};

/// Recurring repaint timer. Dropping it disarms it.
#[derive(Debug)]
pub struct RepaintTimer {
    sleep: Pin<Box<Sleep>>,
    period: Duration,
}

impl RepaintTimer {
    /// Armed to first fire one period from now.
    pub fn start(period: Duration) -> Self {
        Self {
            sleep: Box::pin(tokio::time::sleep(period)),
            period,
        }
    }

    /// When the next tick fires.
    pub fn deadline(&self) -> Instant {
        self.sleep.deadline()
    }

    /// Waits for the next tick. Cancel-safe.
    pub async fn tick(&mut self) {
        self.sleep.as_mut().await;
        let next = self.sleep.deadline() + self.period;
        self.sleep.as_mut().reset(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_fixed_period() {
        let start = Instant::now();
        let mut timer = RepaintTimer::start(Duration::from_secs(10));
        assert_eq!(timer.deadline(), start + Duration::from_secs(10));

        timer.tick().await;
        assert_eq!(Instant::now(), start + Duration::from_secs(10));
        assert_eq!(timer.deadline(), start + Duration::from_secs(20));

        timer.tick().await;
        assert_eq!(Instant::now(), start + Duration::from_secs(20));
    }
}
