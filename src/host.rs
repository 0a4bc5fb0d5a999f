/// Describes the current editor execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    /// Editing only; the simulation is not running.
    Editing,
    /// Game mode. `paused` distinguishes live play from paused single-step.
    Playing { paused: bool },
}

impl PlayState {
    pub fn is_playing(self) -> bool {
        matches!(self, PlayState::Playing { .. })
    }
}

/// Narrow interface the view panels use to drive the simulation, so panel
/// code does not depend on editor internals.
pub trait EditorHost {
    /// Current play/edit mode.
    fn play_state(&self) -> PlayState;

    /// Whether the simulation clock is paused.
    fn is_paused(&self) -> bool;

    /// Pause or resume the simulation clock.
    fn set_paused(&mut self, paused: bool);

    /// Queue a single simulation step while paused.
    fn request_step(&mut self);

    /// Current simulation speed multiplier.
    fn time_scale(&self) -> f32;

    /// Set the simulation speed multiplier; out-of-range values are clamped.
    fn set_time_scale(&mut self, scale: f32);
}
