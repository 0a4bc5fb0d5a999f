use std::time::Instant;

pub const MIN_TIME_MULTIPLIER: f32 = 0.01;
pub const MAX_TIME_MULTIPLIER: f32 = 30.0;

/// Fixed step consumed by a queued single-step while paused.
const STEP_SECONDS: f32 = 1.0 / 60.0;

/// Wall-clock driven simulation clock with editor pause, queued single-step
/// and a clamped speed multiplier.
pub struct SimulationClock {
    start: Instant,
    last: Instant,
    raw_delta: f32,
    paused: bool,
    multiplier: f32,
    step_queued: bool,
}

impl SimulationClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self { start: now, last: now, raw_delta: 0.0, paused: false, multiplier: 1.0, step_queued: false }
    }

    /// Measures the elapsed wall time and returns the simulation delta for
    /// this tick. Returns zero outside play mode, and while paused unless a
    /// single step was queued.
    pub fn advance(&mut self, playing: bool) -> f32 {
        let now = Instant::now();
        self.raw_delta = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        self.scaled_step(self.raw_delta, playing)
    }

    fn scaled_step(&mut self, raw_delta: f32, playing: bool) -> f32 {
        if !playing {
            self.step_queued = false;
            return 0.0;
        }
        if self.paused {
            if self.step_queued {
                self.step_queued = false;
                return STEP_SECONDS * self.multiplier;
            }
            return 0.0;
        }
        raw_delta * self.multiplier
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        if !paused {
            self.step_queued = false;
        }
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    /// Queues one fixed step; consumed by the next `advance` while paused.
    pub fn request_step(&mut self) {
        if self.paused {
            self.step_queued = true;
        }
    }

    pub fn set_multiplier(&mut self, multiplier: f32) {
        self.multiplier = multiplier.clamp(MIN_TIME_MULTIPLIER, MAX_TIME_MULTIPLIER);
    }

    pub fn multiplier(&self) -> f32 {
        self.multiplier
    }

    pub fn raw_delta_seconds(&self) -> f32 {
        self.raw_delta
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.last.duration_since(self.start).as_secs_f32()
    }
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new()
    }
}
