//! Scheduled-callback bookkeeping for the driver
//!
//! The host scheduler (Bevy's frame loop, a browser's animation frame, a test
//! loop) owns the actual callbacks. The driver only hands out a [`RunToken`]
//! per run and checks it on every invocation: once cancelled, an already
//! queued callback carrying the old token is a no-op.

use crate::constants::ELAPSED_DISPLAY_INTERVAL;

/// Identifies one scheduled run; stale once the run is cancelled or replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunToken(u64);

impl RunToken {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

/// Repeating elapsed-time readout, polled independently of physics ticks
#[derive(Debug, Clone, Copy)]
struct ElapsedTicker {
    started_at: f64,
    interval: f64,
    next_due: f64,
}

impl ElapsedTicker {
    fn new(started_at: f64, interval: f64) -> Self {
        Self {
            started_at,
            interval,
            next_due: started_at,
        }
    }

    fn poll(&mut self, now: f64) -> Option<f64> {
        if now + 1e-12 < self.next_due {
            return None;
        }
        // Skip missed intervals instead of replaying them
        while self.next_due <= now + 1e-12 {
            self.next_due += self.interval;
        }
        Some((now - self.started_at).max(0.0))
    }
}

/// The frame tick and the elapsed ticker of the current run, cancelled together
#[derive(Debug)]
pub struct FrameLoop {
    generation: u64,
    frame: Option<RunToken>,
    ticker: Option<ElapsedTicker>,
    display_interval: f64,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new(ELAPSED_DISPLAY_INTERVAL)
    }
}

impl FrameLoop {
    pub fn new(display_interval: f64) -> Self {
        Self {
            generation: 0,
            frame: None,
            ticker: None,
            display_interval: if display_interval > 0.0 {
                display_interval
            } else {
                ELAPSED_DISPLAY_INTERVAL
            },
        }
    }

    /// Schedule a new run, cancelling anything still scheduled
    pub fn schedule(&mut self, now: f64) -> RunToken {
        self.cancel();
        self.generation += 1;
        let token = RunToken(self.generation);
        self.frame = Some(token);
        self.ticker = Some(ElapsedTicker::new(now, self.display_interval));
        token
    }

    /// The single cancellation path. Returns whether anything was scheduled.
    pub fn cancel(&mut self) -> bool {
        let was_live = self.frame.is_some() || self.ticker.is_some();
        self.frame = None;
        self.ticker = None;
        was_live
    }

    pub fn is_live(&self, token: RunToken) -> bool {
        self.frame == Some(token)
    }

    pub fn has_scheduled(&self) -> bool {
        self.frame.is_some() || self.ticker.is_some()
    }

    /// Elapsed seconds when the readout is due, None otherwise or when stale
    pub fn poll_display(&mut self, token: RunToken, now: f64) -> Option<f64> {
        if !self.is_live(token) {
            return None;
        }
        self.ticker.as_mut().and_then(|ticker| ticker.poll(now))
    }
}
