use std::time::{Duration, Instant};

/// Wall-clock time since the render loop started.
#[derive(Clone, Copy, Debug)]
pub struct FrameTimer {
    start: Instant,
    last: Instant,
    frames: u64,
}

impl FrameTimer {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            frames: 0,
        }
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }

    /// Marks a finished frame and returns the time since the previous one.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now.duration_since(self.last);
        self.last = now;
        self.frames += 1;
        delta
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::start()
    }
}
