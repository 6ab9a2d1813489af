use super::LightState;
use crate::lane::LaneKey;
use crate::{JunctionId, LightSet, TrafficLightId};
use std::collections::HashMap;

/// The pair of opposing approaches a lane belongs to at a crossroads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    NorthSouth,
    EastWest,
}

/// Timing configuration for one signalised junction.
///
/// The red duration is raised to at least the opposing green plus yellow
/// at construction so an axis is never released before the other has
/// cleared. The congestion radius is deliberately a parameter rather
/// than a constant; whether it should scale with approach speed is
/// unresolved.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CycleTiming {
    /// Base green duration in ms, before congestion adjustment.
    pub green_ms: f64,
    /// Yellow duration in ms.
    pub yellow_ms: f64,
    /// Minimum red duration in ms.
    pub red_ms: f64,
    /// Floor for the congestion-shrunk green, in ms.
    pub min_green_ms: f64,
    /// Cap for the congestion-extended green, in ms.
    pub max_green_ms: f64,
    /// Green multiplier for the more congested axis.
    pub extend_factor: f64,
    /// Green multiplier for the less congested axis.
    pub shrink_factor: f64,
    /// Congestion imbalance (in vehicles) needed before the green adapts.
    pub congestion_threshold: usize,
    /// Vehicles within this distance of their lane's terminal junction
    /// count as congesting, in m.
    pub congestion_radius: f64,
}

impl Default for CycleTiming {
    fn default() -> Self {
        Self {
            green_ms: 7000.0,
            yellow_ms: 1500.0,
            red_ms: 8500.0,
            min_green_ms: 3000.0,
            max_green_ms: 15000.0,
            extend_factor: 1.5,
            shrink_factor: 0.75,
            congestion_threshold: 3,
            congestion_radius: 150.0,
        }
    }
}

/// Per-lane congestion counts fed into a controller update.
pub(crate) type CongestionCounts = HashMap<LaneKey, usize>;

/// The phase state machine for one junction's light group.
///
/// Exactly one axis is active (green or yellow) at any time while the
/// other shows red, so the two axes are never green together. The green
/// duration of an axis is recomputed from congestion counts exactly once,
/// at the instant that axis turns green, to avoid oscillation mid-phase.
#[derive(Clone, Debug)]
pub struct CycleController {
    junction: JunctionId,
    timing: CycleTiming,
    ns_state: LightState,
    ew_state: LightState,
    /// Whether the north-south axis is the one running green/yellow.
    ns_active: bool,
    /// Time spent in the current phase, in ms.
    elapsed_ms: f64,
    /// Congestion-adjusted green duration for the active axis, in ms.
    current_green_ms: f64,
    ns_lanes: Vec<(LaneKey, TrafficLightId)>,
    ew_lanes: Vec<(LaneKey, TrafficLightId)>,
}

impl CycleController {
    /// Creates a controller with the given starting states.
    /// One of the two states should be green; the other red.
    pub(crate) fn new(
        junction: JunctionId,
        ns_state: LightState,
        ew_state: LightState,
        timing: CycleTiming,
    ) -> Self {
        let timing = CycleTiming {
            red_ms: timing.red_ms.max(timing.green_ms + timing.yellow_ms),
            ..timing
        };
        Self {
            junction,
            timing,
            ns_state,
            ew_state,
            ns_active: ns_state == LightState::Green,
            elapsed_ms: 0.0,
            current_green_ms: timing.green_ms,
            ns_lanes: Vec::new(),
            ew_lanes: Vec::new(),
        }
    }

    /// The junction this controller drives.
    pub fn junction(&self) -> JunctionId {
        self.junction
    }

    /// The controller's timing configuration, with the red duration
    /// already raised to its safe minimum.
    pub fn timing(&self) -> &CycleTiming {
        &self.timing
    }

    /// The current north-south state.
    pub fn ns_state(&self) -> LightState {
        self.ns_state
    }

    /// The current east-west state.
    pub fn ew_state(&self) -> LightState {
        self.ew_state
    }

    /// The congestion-adjusted green duration of the active axis, in ms.
    pub fn current_green_ms(&self) -> f64 {
        self.current_green_ms
    }

    /// The incoming lanes grouped under the given axis.
    pub fn lanes(&self, axis: Axis) -> impl Iterator<Item = LaneKey> + '_ {
        match axis {
            Axis::NorthSouth => self.ns_lanes.iter(),
            Axis::EastWest => self.ew_lanes.iter(),
        }
        .map(|(lane, _)| *lane)
    }

    /// Attaches a light to one axis of the cycle. The light immediately
    /// receives the axis's current state so it never renders stale.
    pub(crate) fn attach(
        &mut self,
        axis: Axis,
        lane: LaneKey,
        light: TrafficLightId,
        lights: &mut LightSet,
    ) {
        let state = match axis {
            Axis::NorthSouth => {
                self.ns_lanes.push((lane, light));
                self.ns_state
            }
            Axis::EastWest => {
                self.ew_lanes.push((lane, light));
                self.ew_state
            }
        };
        if let Some(light) = lights.get_mut(light) {
            light.set_state(state);
        }
    }

    /// Advances the cycle by `dt_ms` milliseconds, executing at most one
    /// phase transition. Overshoot past a phase boundary is discarded
    /// (the timer resets to zero), an accepted minor timing drift.
    pub(crate) fn update(&mut self, dt_ms: f64, congestion: &CongestionCounts, lights: &mut LightSet) {
        if dt_ms <= 0.0 {
            return;
        }
        self.elapsed_ms += dt_ms;

        let active_state = if self.ns_active { self.ns_state } else { self.ew_state };
        let phase_ms = match active_state {
            LightState::Green => self.current_green_ms,
            LightState::Yellow => self.timing.yellow_ms,
            // The cycle is driven by the active axis; a red active axis
            // only occurs with degenerate starting states.
            LightState::Red => self.timing.red_ms,
        };
        if self.elapsed_ms < phase_ms {
            return;
        }
        self.elapsed_ms = 0.0;

        match (self.ns_active, active_state) {
            (true, LightState::Green) => {
                self.set_states(LightState::Yellow, LightState::Red, lights);
            }
            (true, LightState::Yellow) => {
                self.current_green_ms = self.adapted_green(Axis::EastWest, congestion);
                self.set_states(LightState::Red, LightState::Green, lights);
                self.ns_active = false;
            }
            (false, LightState::Green) => {
                self.set_states(LightState::Red, LightState::Yellow, lights);
            }
            (false, LightState::Yellow) => {
                self.current_green_ms = self.adapted_green(Axis::NorthSouth, congestion);
                self.set_states(LightState::Green, LightState::Red, lights);
                self.ns_active = true;
            }
            (_, LightState::Red) => {}
        }
    }

    /// The green duration for the axis about to turn green, adapted to
    /// the congestion imbalance between the two axes.
    fn adapted_green(&self, axis: Axis, congestion: &CongestionCounts) -> f64 {
        let ns = self.axis_congestion(Axis::NorthSouth, congestion);
        let ew = self.axis_congestion(Axis::EastWest, congestion);
        let (own, other) = match axis {
            Axis::NorthSouth => (ns, ew),
            Axis::EastWest => (ew, ns),
        };
        let t = &self.timing;
        if own > other + t.congestion_threshold {
            (t.green_ms * t.extend_factor).min(t.max_green_ms)
        } else if other > own + t.congestion_threshold {
            (t.green_ms * t.shrink_factor).max(t.min_green_ms)
        } else {
            t.green_ms
        }
    }

    /// Sums the congestion counts over one axis's incoming lanes.
    fn axis_congestion(&self, axis: Axis, congestion: &CongestionCounts) -> usize {
        self.lanes(axis)
            .map(|lane| congestion.get(&lane).copied().unwrap_or(0))
            .sum()
    }

    /// Sets the axis states and pushes any changes out to the lights.
    fn set_states(&mut self, ns: LightState, ew: LightState, lights: &mut LightSet) {
        if self.ns_state != ns {
            self.ns_state = ns;
            for (_, light) in &self.ns_lanes {
                if let Some(light) = lights.get_mut(*light) {
                    light.set_state(ns);
                }
            }
        }
        if self.ew_state != ew {
            self.ew_state = ew;
            for (_, light) in &self.ew_lanes {
                if let Some(light) = lights.get_mut(*light) {
                    light.set_state(ew);
                }
            }
        }
    }
}
