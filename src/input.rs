use std::sync::Arc;
use winit::event::{DeviceEvent, ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::Key;
use winit::window::{CursorGrabMode, Window};

/// Window-level side effects of grabbing or releasing the mouse.
///
/// The game view toggles capture; the sink maps that onto the underlying
/// window, and tests can observe the calls without creating one.
pub trait CaptureSink {
    fn set_cursor_visible(&mut self, visible: bool);
    fn set_relative_mode(&mut self, relative: bool);
}

pub struct WindowCaptureSink {
    window: Arc<Window>,
}

impl WindowCaptureSink {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }
}

impl CaptureSink for WindowCaptureSink {
    fn set_cursor_visible(&mut self, visible: bool) {
        self.window.set_cursor_visible(visible);
    }

    fn set_relative_mode(&mut self, relative: bool) {
        if relative {
            // Locked is not supported everywhere (X11 in particular), so fall
            // back to confining the cursor to the window.
            if self.window.set_cursor_grab(CursorGrabMode::Locked).is_err() {
                if let Err(err) = self.window.set_cursor_grab(CursorGrabMode::Confined) {
                    log::warn!("cursor grab unavailable: {err}");
                }
            }
        } else if let Err(err) = self.window.set_cursor_grab(CursorGrabMode::None) {
            log::warn!("cursor release failed: {err}");
        }
    }
}

/// Game-side input state. Stays disabled until the game view captures the
/// mouse, so editor interactions never leak into the simulation.
pub struct InputSystem {
    enabled: bool,
    pub mouse_delta: (f32, f32),
    pub wheel: f32,
    pub events: Vec<InputEvent>,
    cursor_pos: Option<(f32, f32)>,
    left_pressed: bool,
    right_pressed: bool,
}

impl InputSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        if !enabled {
            // Drop anything accumulated this frame so a release mid-frame
            // does not feed a stale delta into the next tick.
            self.clear_frame();
            self.left_pressed = false;
            self.right_pressed = false;
        }
    }

    pub fn push(&mut self, ev: InputEvent) {
        if !self.enabled {
            return;
        }
        match &ev {
            InputEvent::MouseMove { dx, dy } => {
                self.mouse_delta.0 += *dx;
                self.mouse_delta.1 += *dy;
            }
            InputEvent::Wheel { delta } => {
                self.wheel += *delta;
            }
            InputEvent::MouseButton { button, pressed } => match button {
                MouseButton::Left => self.left_pressed = *pressed,
                MouseButton::Right => self.right_pressed = *pressed,
                _ => {}
            },
            InputEvent::CursorPos { x, y } => {
                self.cursor_pos = Some((*x, *y));
            }
            InputEvent::Key { .. } | InputEvent::Other => {}
        }
        self.events.push(ev);
    }

    pub fn clear_frame(&mut self) {
        self.events.clear();
        self.mouse_delta = (0.0, 0.0);
        self.wheel = 0.0;
    }

    pub fn left_held(&self) -> bool {
        self.left_pressed
    }

    pub fn right_held(&self) -> bool {
        self.right_pressed
    }

    pub fn cursor_position(&self) -> Option<(f32, f32)> {
        self.cursor_pos
    }
}

impl Default for InputSystem {
    fn default() -> Self {
        Self {
            enabled: false,
            mouse_delta: (0.0, 0.0),
            wheel: 0.0,
            events: Vec::new(),
            cursor_pos: None,
            left_pressed: false,
            right_pressed: false,
        }
    }
}

pub enum InputEvent {
    Key { key: Key, pressed: bool },
    MouseMove { dx: f32, dy: f32 },
    Wheel { delta: f32 },
    MouseButton { button: MouseButton, pressed: bool },
    CursorPos { x: f32, y: f32 },
    Other,
}

impl InputEvent {
    pub fn from_window_event(ev: &WindowEvent) -> Self {
        match ev {
            WindowEvent::MouseWheel { delta, .. } => {
                let d = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32,
                };
                InputEvent::Wheel { delta: d }
            }
            WindowEvent::CursorMoved { position, .. } => {
                InputEvent::CursorPos { x: position.x as f32, y: position.y as f32 }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                InputEvent::MouseButton { button: *button, pressed: *state == ElementState::Pressed }
            }
            WindowEvent::KeyboardInput { event, .. } => InputEvent::Key {
                key: event.logical_key.clone(),
                pressed: event.state == ElementState::Pressed,
            },
            _ => InputEvent::Other,
        }
    }

    pub fn from_device_event(ev: &DeviceEvent) -> Self {
        match ev {
            DeviceEvent::MouseMotion { delta: (dx, dy) } => {
                InputEvent::MouseMove { dx: *dx as f32, dy: *dy as f32 }
            }
            _ => InputEvent::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_input_ignores_motion() {
        let mut input = InputSystem::new();
        input.push(InputEvent::MouseMove { dx: 4.0, dy: -2.0 });
        assert_eq!(input.mouse_delta, (0.0, 0.0));
        assert!(input.events.is_empty());
    }

    #[test]
    fn enabled_input_accumulates_motion() {
        let mut input = InputSystem::new();
        input.set_enabled(true);
        input.push(InputEvent::MouseMove { dx: 4.0, dy: -2.0 });
        input.push(InputEvent::MouseMove { dx: 1.0, dy: 1.0 });
        assert_eq!(input.mouse_delta, (5.0, -1.0));
        assert_eq!(input.events.len(), 2);
        input.clear_frame();
        assert_eq!(input.mouse_delta, (0.0, 0.0));
        assert!(input.events.is_empty());
    }

    #[test]
    fn disabling_clears_held_state() {
        let mut input = InputSystem::new();
        input.set_enabled(true);
        input.push(InputEvent::MouseButton { button: MouseButton::Left, pressed: true });
        input.push(InputEvent::MouseMove { dx: 3.0, dy: 0.0 });
        assert!(input.left_held());
        input.set_enabled(false);
        assert!(!input.left_held());
        assert_eq!(input.mouse_delta, (0.0, 0.0));
        input.push(InputEvent::MouseButton { button: MouseButton::Left, pressed: true });
        assert!(!input.left_held(), "events while disabled must be dropped");
    }
}
