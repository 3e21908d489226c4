//! Keyboard sampling with change detection and debug toggles

use macroquad::prelude::*;
use shared::InputState;
use std::time::{Duration, Instant};

/// Inputs are resent at least this often even when nothing changed
pub const INPUT_RESEND_INTERVAL: Duration = Duration::from_millis(16);

/// Debug keys pressed this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Toggles {
    pub prediction: bool,
    pub interpolation: bool,
    pub hitboxes: bool,
}

impl Toggles {
    pub fn any(&self) -> bool {
        self.prediction || self.interpolation || self.hitboxes
    }
}

/// Samples the keyboard once per frame
pub struct InputManager {
    current_input: InputState,
    last_input_sent: Instant,

    // Previous frame key states for edge detection
    prev_key_1: bool,
    prev_key_2: bool,
    prev_key_h: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            current_input: InputState::default(),
            last_input_sent: Instant::now(),
            prev_key_1: false,
            prev_key_2: false,
            prev_key_h: false,
        }
    }

    /// Returns this frame's toggles, the held movement keys, and the input to
    /// transmit if it changed or the resend interval elapsed.
    pub fn update(&mut self) -> (Toggles, InputState, Option<InputState>) {
        let sampled = InputState {
            left: is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
            right: is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
            jump: is_key_down(KeyCode::W)
                || is_key_down(KeyCode::Up)
                || is_key_down(KeyCode::Space),
        };

        let key_1 = is_key_down(KeyCode::Key1);
        let key_2 = is_key_down(KeyCode::Key2);
        let key_h = is_key_down(KeyCode::H);

        let toggles = Toggles {
            prediction: pressed(key_1, self.prev_key_1),
            interpolation: pressed(key_2, self.prev_key_2),
            hitboxes: pressed(key_h, self.prev_key_h),
        };

        self.prev_key_1 = key_1;
        self.prev_key_2 = key_2;
        self.prev_key_h = key_h;

        let to_send = self.track(sampled, self.last_input_sent.elapsed());
        (toggles, sampled, to_send)
    }

    fn track(&mut self, sampled: InputState, since_last_send: Duration) -> Option<InputState> {
        if !should_send(&self.current_input, &sampled, since_last_send) {
            return None;
        }
        self.current_input = sampled;
        self.last_input_sent = Instant::now();
        Some(sampled)
    }

    pub fn current_input(&self) -> InputState {
        self.current_input
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Rising edge: down now, up last frame.
fn pressed(current: bool, previous: bool) -> bool {
    current && !previous
}

fn should_send(last_sent: &InputState, sampled: &InputState, since_last_send: Duration) -> bool {
    last_sent != sampled || since_last_send >= INPUT_RESEND_INTERVAL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_manager_creation() {
        let input_manager = InputManager::new();
        assert_eq!(input_manager.current_input(), InputState::default());
    }

    #[test]
    fn test_pressed_is_edge_triggered() {
        assert!(pressed(true, false));
        assert!(!pressed(true, true));
        assert!(!pressed(false, true));
        assert!(!pressed(false, false));
    }

    #[test]
    fn test_changed_input_is_sent_immediately() {
        let mut manager = InputManager::new();
        let jump = InputState {
            jump: true,
            ..InputState::default()
        };

        assert_eq!(manager.track(jump, Duration::ZERO), Some(jump));
        assert_eq!(manager.current_input(), jump);
        assert_eq!(manager.track(jump, Duration::ZERO), None);
    }

    #[test]
    fn test_unchanged_input_is_resent_periodically() {
        let mut manager = InputManager::new();
        let idle = InputState::default();

        assert_eq!(manager.track(idle, Duration::from_millis(5)), None);
        assert_eq!(manager.track(idle, INPUT_RESEND_INTERVAL), Some(idle));
    }

    #[test]
    fn test_toggles_any() {
        assert!(!Toggles::default().any());
        assert!(Toggles {
            hitboxes: true,
            ..Toggles::default()
        }
        .any());
    }
}
