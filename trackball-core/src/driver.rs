//! Fixed-rate frame loop

use std::time::{Duration, Instant};

/// Render ticks per second
pub const DEFAULT_TICK_RATE: u32 = 100;

/// Calls a frame callback at a fixed rate until stopped.
///
/// Ticks are fire-and-forget: a frame that overruns its interval is not made
/// up for, the next one simply starts late.
#[derive(Debug, Clone)]
pub struct FrameDriver {
    interval: Duration,
    running: bool,
    ticks: u64,
}

impl FrameDriver {
    /// A rate of zero is treated as one tick per second.
    pub fn new(rate_hz: u32) -> Self {
        Self {
            interval: Duration::from_secs(1) / rate_hz.max(1),
            running: false,
            ticks: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stop after the current frame. Safe to call from inside the callback.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Run `frame` every interval until `stop` is called or it returns an
    /// error, which is passed through.
    pub fn run<E>(&mut self, mut frame: impl FnMut(&mut Self) -> Result<(), E>) -> Result<(), E> {
        self.running = true;
        while self.running {
            let frame_start = Instant::now();
            self.ticks += 1;
            if let Err(e) = frame(self) {
                self.running = false;
                return Err(e);
            }

            let elapsed = frame_start.elapsed();
            if self.running && elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }
        Ok(())
    }
}

impl Default for FrameDriver {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_RATE)
    }
}
