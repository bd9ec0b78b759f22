use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::Arc;

use glam::Vec2;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Lowest allowed viewer pitch in radians.
pub const MIN_PITCH: f32 = 0.1;
/// Highest allowed viewer pitch in radians.
pub const MAX_PITCH: f32 = PI / 2.5;

/// Viewer orbit angles in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub pitch: f32,
    pub yaw: f32,
}

impl Orientation {
    /// Creates an orientation with the pitch clamped into range.
    pub fn new(pitch: f32, yaw: f32) -> Self {
        Self {
            pitch: clamp_pitch(pitch),
            yaw,
        }
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self::new(PI / 20.0, 0.0)
    }
}

pub fn clamp_pitch(pitch: f32) -> f32 {
    pitch.clamp(MIN_PITCH, MAX_PITCH)
}

/// Pointer and touch input, in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    PointerDown(Vec2),
    PointerUp,
    PointerLeave,
    PointerMove(Vec2),
    TouchStart(Vec2),
    TouchMove(Vec2),
}

/// Hand-off of input events from event callbacks to the frame loop.
///
/// Clones share the same queue, so a window callback (or another thread) can
/// push while the frame loop drains once per frame.
#[derive(Debug, Clone, Default)]
pub struct InputQueue {
    events: Arc<Mutex<VecDeque<InputEvent>>>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: InputEvent) {
        self.events.lock().push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Takes every pending event in arrival order.
    pub fn drain(&self) -> Vec<InputEvent> {
        self.events.lock().drain(..).collect()
    }
}

/// Turns drags into orbit adjustments.
#[derive(Debug, Clone)]
pub struct OrientationMapper {
    orientation: Orientation,
    pressed: bool,
    last_press: Option<Vec2>,
    drag_divisor: f32,
}

impl OrientationMapper {
    pub fn new(initial: Orientation, drag_divisor: f32) -> Self {
        Self {
            orientation: initial,
            pressed: false,
            last_press: None,
            drag_divisor,
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Applies every queued event and returns the resulting orientation.
    pub fn drain(&mut self, queue: &InputQueue) -> Orientation {
        for event in queue.drain() {
            self.apply(event);
        }
        self.orientation
    }

    pub fn apply(&mut self, event: InputEvent) {
        match event {
            InputEvent::PointerDown(position) => {
                self.pressed = true;
                self.last_press = Some(position);
            }
            InputEvent::PointerUp | InputEvent::PointerLeave => {
                self.pressed = false;
            }
            InputEvent::PointerMove(position) => {
                if self.pressed {
                    self.drag_to(position);
                }
            }
            InputEvent::TouchStart(position) => {
                self.last_press = Some(position);
            }
            InputEvent::TouchMove(position) => self.drag_to(position),
        }
    }

    fn drag_to(&mut self, position: Vec2) {
        let Some(last) = self.last_press else {
            self.last_press = Some(position);
            return;
        };
        let delta = (position - last) / self.drag_divisor;
        self.orientation.pitch = clamp_pitch(self.orientation.pitch + delta.y);
        self.orientation.yaw -= delta.x;
        self.last_press = Some(position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> OrientationMapper {
        OrientationMapper::new(Orientation::default(), 50.0)
    }

    #[test]
    fn drag_adjusts_pitch_and_yaw() {
        let mut mapper = mapper();
        let start = mapper.orientation();
        mapper.apply(InputEvent::PointerDown(Vec2::new(100.0, 100.0)));
        mapper.apply(InputEvent::PointerMove(Vec2::new(110.0, 105.0)));
        let now = mapper.orientation();
        assert!((now.pitch - (start.pitch + 0.1)).abs() < 1e-6);
        assert!((now.yaw - (start.yaw - 0.2)).abs() < 1e-6);
    }

    #[test]
    fn moves_without_press_are_ignored() {
        let mut mapper = mapper();
        let start = mapper.orientation();
        mapper.apply(InputEvent::PointerMove(Vec2::new(500.0, 500.0)));
        mapper.apply(InputEvent::PointerDown(Vec2::ZERO));
        mapper.apply(InputEvent::PointerLeave);
        mapper.apply(InputEvent::PointerMove(Vec2::new(300.0, 300.0)));
        assert_eq!(mapper.orientation(), start);
        assert!(!mapper.is_pressed());
    }

    #[test]
    fn touch_moves_apply_without_press() {
        let mut mapper = mapper();
        let start = mapper.orientation();
        mapper.apply(InputEvent::TouchStart(Vec2::new(0.0, 0.0)));
        mapper.apply(InputEvent::TouchMove(Vec2::new(-25.0, 0.0)));
        assert!((mapper.orientation().yaw - (start.yaw + 0.5)).abs() < 1e-6);
    }

    #[test]
    fn pitch_never_leaves_range() {
        let mut mapper = mapper();
        mapper.apply(InputEvent::PointerDown(Vec2::ZERO));
        for step in 1..200 {
            let y = if step % 2 == 0 { 1.0e5 } else { -3.0e5 } * step as f32;
            mapper.apply(InputEvent::PointerMove(Vec2::new(0.0, y)));
            let pitch = mapper.orientation().pitch;
            assert!((MIN_PITCH..=MAX_PITCH).contains(&pitch), "{pitch}");
        }
    }

    #[test]
    fn clamping_is_idempotent() {
        for pitch in [-10.0, 0.0, 0.1, 0.5, MAX_PITCH, 3.0, f32::MAX] {
            let once = clamp_pitch(pitch);
            assert_eq!(clamp_pitch(once), once);
        }
    }

    #[test]
    fn queue_drains_in_order_once() {
        let queue = InputQueue::new();
        let producer = queue.clone();
        let handle = std::thread::spawn(move || {
            producer.push(InputEvent::PointerDown(Vec2::ZERO));
            producer.push(InputEvent::PointerMove(Vec2::new(0.0, 10.0)));
            producer.push(InputEvent::PointerUp);
        });
        handle.join().unwrap();
        assert_eq!(queue.len(), 3);

        let mut mapper = mapper();
        let start = mapper.orientation();
        let after = mapper.drain(&queue);
        assert!((after.pitch - (start.pitch + 0.2)).abs() < 1e-6);
        assert!(queue.is_empty());
        assert_eq!(mapper.drain(&queue), after);
    }
}
