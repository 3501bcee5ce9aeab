use winit::event::{ElementState, MouseButton, MouseScrollDelta};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Radians per second while an arrow key is held.
const KEY_ROTATE_SPEED: f32 = 1.5;
/// Pixels that count as one wheel step for touchpads.
const PIXELS_PER_STEP: f32 = 40.0;

#[derive(Default, Debug, Clone, Copy)]
pub struct InputState {
    pub rotate_left: bool,
    pub rotate_right: bool,
    pub rotate_up: bool,
    pub rotate_down: bool,
    dragging: bool,
    cursor: Option<(f32, f32)>,
}

impl InputState {
    pub fn handle_key(&mut self, key: PhysicalKey, pressed: bool) {
        match key {
            PhysicalKey::Code(KeyCode::ArrowLeft) => self.rotate_left = pressed,
            PhysicalKey::Code(KeyCode::ArrowRight) => self.rotate_right = pressed,
            PhysicalKey::Code(KeyCode::ArrowUp) => self.rotate_up = pressed,
            PhysicalKey::Code(KeyCode::ArrowDown) => self.rotate_down = pressed,
            _ => {}
        }
    }

    pub fn handle_button(&mut self, button: MouseButton, state: ElementState) {
        if button == MouseButton::Left {
            self.dragging = state == ElementState::Pressed;
        }
    }

    /// Records the cursor and returns the drag delta while the left button
    /// is held.
    pub fn handle_cursor(&mut self, x: f32, y: f32) -> Option<(f32, f32)> {
        let previous = self.cursor.replace((x, y));
        match previous {
            Some((px, py)) if self.dragging => Some((x - px, y - py)),
            _ => None,
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = None;
        self.dragging = false;
    }

    /// Wheel motion in zoom steps. Positive zooms in.
    pub fn wheel_steps(delta: MouseScrollDelta) -> f32 {
        match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_STEP,
        }
    }

    /// Held arrow keys as (left, up) rotation for a frame of `dt` seconds.
    pub fn key_rotation(&self, dt: f32) -> (f32, f32) {
        let axis = |positive: bool, negative: bool| match (positive, negative) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        };
        let step = KEY_ROTATE_SPEED * dt;
        (
            axis(self.rotate_left, self.rotate_right) * step,
            axis(self.rotate_up, self.rotate_down) * step,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::InputState;
    use winit::event::{ElementState, MouseButton, MouseScrollDelta};
    use winit::keyboard::{KeyCode, PhysicalKey};

    #[test]
    fn drag_reports_deltas_only_while_pressed() {
        let mut input = InputState::default();
        assert_eq!(input.handle_cursor(10.0, 10.0), None);
        input.handle_button(MouseButton::Left, ElementState::Pressed);
        assert_eq!(input.handle_cursor(15.0, 7.0), Some((5.0, -3.0)));
        input.handle_button(MouseButton::Left, ElementState::Released);
        assert_eq!(input.handle_cursor(20.0, 7.0), None);
    }

    #[test]
    fn arrow_keys_rotate_and_cancel() {
        let mut input = InputState::default();
        input.handle_key(PhysicalKey::Code(KeyCode::ArrowLeft), true);
        let (left, up) = input.key_rotation(1.0);
        assert!(left > 0.0);
        assert_eq!(up, 0.0);
        input.handle_key(PhysicalKey::Code(KeyCode::ArrowRight), true);
        assert_eq!(input.key_rotation(1.0), (0.0, 0.0));
    }

    #[test]
    fn wheel_lines_are_steps() {
        assert_eq!(InputState::wheel_steps(MouseScrollDelta::LineDelta(0.0, 2.0)), 2.0);
    }
}
