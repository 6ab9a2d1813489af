use crate::math::Point2d;

pub(crate) mod cycle;

pub use cycle::{Axis, CycleController, CycleTiming};

/// The displayed state of a traffic light.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LightState {
    Red,
    Yellow,
    Green,
}

impl LightState {
    /// Whether an approaching vehicle must stop at this state.
    /// Yellow mandates a stop; there is no "already committed" exception.
    pub fn requires_stop(self) -> bool {
        !matches!(self, LightState::Green)
    }
}

/// The arrangement of a light's lamps, for rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LightOrientation {
    Vertical,
    Horizontal,
}

/// A single traffic light unit.
///
/// A pure state holder with no timing logic; its state is written
/// exclusively by the [CycleController] that owns it.
#[derive(Clone, Debug)]
pub struct TrafficLight {
    state: LightState,
    position: Point2d,
    orientation: LightOrientation,
}

impl TrafficLight {
    /// Creates a new traffic light.
    pub(crate) fn new(state: LightState, position: Point2d, orientation: LightOrientation) -> Self {
        Self {
            state,
            position,
            orientation,
        }
    }

    /// The currently displayed state.
    pub fn state(&self) -> LightState {
        self.state
    }

    /// The world space position of the light fixture.
    pub fn position(&self) -> Point2d {
        self.position
    }

    /// The arrangement of the light's lamps.
    pub fn orientation(&self) -> LightOrientation {
        self.orientation
    }

    pub(crate) fn set_state(&mut self, state: LightState) {
        self.state = state;
    }
}
