use crate::lane::LaneKey;
use crate::math::Point2d;
use crate::{ControllerId, JunctionId, RoadId, TrafficLightId};
use smallvec::SmallVec;
use std::cell::Cell;
use std::collections::HashMap;

/// The kind of a junction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum JunctionKind {
    /// Entry is governed by traffic lights.
    Signalised,
    /// Entry is governed by the gate alone.
    Roundabout,
}

/// Mutual exclusion over vehicle entry into a junction.
///
/// Vehicle crossings are processed in a fixed order within a tick, so the
/// gate is a plain occupancy flag rather than a blocking primitive: a
/// second `enter` while occupied is refused and the caller holds its
/// position until the next tick. The crossing code keeps the critical
/// section a single straight-line block so `leave` runs on every path
/// out of it; as it never holds the gate across vehicles, a refusal is
/// only seen when an outside caller holds the gate across ticks.
#[derive(Clone, Debug, Default)]
pub struct Gate {
    occupied: Cell<bool>,
}

impl Gate {
    /// Attempts to occupy the junction.
    /// Returns `false` if another vehicle already holds it.
    pub fn enter(&self) -> bool {
        if self.occupied.get() {
            false
        } else {
            self.occupied.set(true);
            true
        }
    }

    /// Releases the junction.
    pub fn leave(&self) {
        self.occupied.set(false);
    }

    /// Whether a vehicle currently holds the junction.
    pub fn is_occupied(&self) -> bool {
        self.occupied.get()
    }
}

/// A node of the road network where roads meet.
///
/// Signalised junctions additionally map each incoming lane to the
/// traffic light controlling it; that map and the controller reference
/// are populated once during signal installation and read-only after.
#[derive(Clone, Debug)]
pub struct Junction {
    id: JunctionId,
    centre: Point2d,
    radius: f64,
    kind: JunctionKind,
    connected_roads: SmallVec<[RoadId; 4]>,
    lights: HashMap<LaneKey, TrafficLightId>,
    controller: Option<ControllerId>,
    gate: Gate,
}

impl Junction {
    /// Creates a new junction.
    pub(crate) fn new(id: JunctionId, centre: Point2d, radius: f64, kind: JunctionKind) -> Self {
        Self {
            id,
            centre,
            radius,
            kind,
            connected_roads: SmallVec::new(),
            lights: HashMap::new(),
            controller: None,
            gate: Gate::default(),
        }
    }

    /// The junction's ID.
    pub fn id(&self) -> JunctionId {
        self.id
    }

    /// The centre of the junction in world space.
    pub fn centre(&self) -> Point2d {
        self.centre
    }

    /// The radius of the junction area in m.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// The kind of the junction.
    pub fn kind(&self) -> JunctionKind {
        self.kind
    }

    /// The roads connected to this junction.
    pub fn connected_roads(&self) -> &[RoadId] {
        &self.connected_roads
    }

    /// The cycle controller driving this junction's lights, if signalised.
    pub fn controller(&self) -> Option<ControllerId> {
        self.controller
    }

    /// The entry gate of this junction.
    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// The light controlling the given incoming lane.
    /// Always `None` for unsignalised junctions.
    pub fn light_for_lane(&self, lane: LaneKey) -> Option<TrafficLightId> {
        match self.kind {
            JunctionKind::Signalised => self.lights.get(&lane).copied(),
            JunctionKind::Roundabout => None,
        }
    }

    /// Registers a road as connected to this junction.
    pub(crate) fn connect_road(&mut self, road: RoadId) {
        if !self.connected_roads.contains(&road) {
            self.connected_roads.push(road);
        }
    }

    /// Assigns the light controlling an incoming lane.
    pub(crate) fn assign_light(&mut self, lane: LaneKey, light: TrafficLightId) {
        self.lights.insert(lane, light);
    }

    /// Sets the junction's cycle controller.
    pub(crate) fn set_controller(&mut self, controller: ControllerId) {
        self.controller = Some(controller);
    }
}
