//! Tick pacing and pause-aware game time

use std::thread;
use std::time::{Duration, Instant};

use crate::consts::MAX_TICK_RATE;

/// Paces the loop at `MAX_TICK_RATE` and measures what rate it actually
/// achieves over one-second windows; `dt` comes from the measured rate,
/// so a loop that cannot keep up simulates bigger steps instead of
/// slowing the game down.
pub struct TickClock {
    window_start: Instant,
    last_tick: Instant,
    ticks_in_window: u32,
    rate: u32,
}

impl TickClock {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            window_start: now,
            last_tick: now,
            ticks_in_window: 0,
            rate: MAX_TICK_RATE,
        }
    }

    /// Forget the measurement window, e.g. after a pause.
    pub fn restart(&mut self) {
        *self = Self::start();
    }

    /// Paces one tick and returns its `dt` in seconds.
    pub fn pace(&mut self) -> f64 {
        let budget = Duration::from_secs(1) / MAX_TICK_RATE;
        let since_last = self.last_tick.elapsed();
        if since_last < budget {
            thread::sleep(budget - since_last);
        }

        self.ticks_in_window += 1;
        let now = Instant::now();
        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            self.rate = self.ticks_in_window.max(1);
            self.ticks_in_window = 0;
            self.window_start = now;
        }
        self.last_tick = now;
        1.0 / self.rate as f64
    }
}

/// Wall-clock time spent unpaused since level start.
pub struct GameTimer {
    elapsed: Duration,
    anchor: Instant,
}

impl GameTimer {
    pub fn start() -> Self {
        Self {
            elapsed: Duration::ZERO,
            anchor: Instant::now(),
        }
    }

    /// Accumulates the span since the last update or resume.
    pub fn update(&mut self) {
        let now = Instant::now();
        self.elapsed += now.duration_since(self.anchor);
        self.anchor = now;
    }

    /// Re-anchors after a pause so the paused span is not counted.
    pub fn resume(&mut self) {
        self.anchor = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pace_never_exceeds_cap() {
        let mut clock = TickClock::start();
        let begin = Instant::now();
        for _ in 0..10 {
            clock.pace();
        }
        // 10 ticks at 65 Hz need at least ~138ms minus the free first tick
        assert!(begin.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_dt_reflects_measured_rate() {
        let mut clock = TickClock::start();
        let dt = clock.pace();
        // before the first window closes, dt assumes the cap
        assert!((dt - 1.0 / MAX_TICK_RATE as f64).abs() < 1e-12);
    }

    #[test]
    fn test_timer_excludes_paused_span() {
        let mut timer = GameTimer::start();
        std::thread::sleep(Duration::from_millis(20));
        timer.update();
        let before_pause = timer.elapsed();
        assert!(before_pause >= Duration::from_millis(20));

        // paused: no update calls while time passes
        std::thread::sleep(Duration::from_millis(50));
        timer.resume();
        timer.update();
        assert!(timer.elapsed() < before_pause + Duration::from_millis(40));
    }
}
