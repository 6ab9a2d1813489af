use crate::junction::{Junction, JunctionKind};
use crate::lane::{Lane, LaneDir, LaneKey};
use crate::light::cycle::CongestionCounts;
use crate::light::{Axis, CycleController, CycleTiming, LightOrientation, LightState, TrafficLight};
use crate::math::{rot90, Point2d};
use crate::road::Road;
use crate::{
    ControllerId, ControllerSet, JunctionId, JunctionSet, LightSet, RoadId, RoadSet, TrafficLightId,
};
use cgmath::prelude::*;
use log::{error, warn};
use rand::seq::SliceRandom;
use smallvec::SmallVec;

/// Distance from a lane's end point to its traffic light, along the lane, in m.
const LIGHT_SETBACK: f64 = 15.0;

/// Lateral distance from a lane's centre line to its traffic light, in m.
const LIGHT_SIDE_OFFSET: f64 = 15.0;

/// The road, junction and signal topology of a simulation.
///
/// Construction happens in passes: junctions and roads are added first,
/// then [connect_roads](Self::connect_roads) resolves road endpoints to
/// junctions, then signals are installed per junction. After that the
/// topology is read-only.
#[derive(Default)]
pub struct RoadNetwork {
    roads: RoadSet,
    junctions: JunctionSet,
    lights: LightSet,
    controllers: ControllerSet,
}

impl RoadNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a junction to the network.
    pub fn add_junction(&mut self, centre: Point2d, radius: f64, kind: JunctionKind) -> JunctionId {
        self.junctions
            .insert_with_key(|id| Junction::new(id, centre, radius, kind))
    }

    /// Adds a road to the network, deriving its two lanes.
    pub fn add_road(&mut self, start: Point2d, end: Point2d) -> RoadId {
        self.roads.insert_with_key(|id| Road::new(id, start, end))
    }

    /// Resolves every road's endpoints against the junctions.
    /// Call once, after all junctions and roads have been added.
    pub fn connect_roads(&mut self) {
        for (_, road) in &mut self.roads {
            road.connect_to_junctions(&mut self.junctions);
        }
    }

    /// Installs a light cycle at a signalised junction.
    ///
    /// One traffic light is created per assigned incoming lane, placed a
    /// short way before the lane's end and off to the side of it, and
    /// grouped under the given axis of the new controller. Returns `None`
    /// (with a logged diagnostic) if the junction is not signalised.
    pub fn install_signals(
        &mut self,
        junction_id: JunctionId,
        ns_start: LightState,
        ew_start: LightState,
        timing: CycleTiming,
        approaches: &[(LaneKey, Axis)],
    ) -> Option<ControllerId> {
        let Some(junction) = self.junctions.get(junction_id) else {
            warn!("install_signals: no such junction {junction_id:?}");
            return None;
        };
        if junction.kind() != JunctionKind::Signalised {
            warn!("install_signals: junction {junction_id:?} is not signalised");
            return None;
        }

        let controller_id = self.controllers.insert(CycleController::new(
            junction_id,
            ns_start,
            ew_start,
            timing,
        ));

        for (lane_key, axis) in approaches {
            let Some(lane) = self.lane(*lane_key).cloned() else {
                error!("install_signals: lane {lane_key:?} does not exist");
                continue;
            };
            let orientation = match axis {
                Axis::NorthSouth => LightOrientation::Vertical,
                Axis::EastWest => LightOrientation::Horizontal,
            };
            let light_id = self.place_light(&lane, orientation);
            self.controllers[controller_id].attach(*axis, *lane_key, light_id, &mut self.lights);
            self.junctions[junction_id].assign_light(*lane_key, light_id);
        }

        self.junctions[junction_id].set_controller(controller_id);
        Some(controller_id)
    }

    /// Creates a light just before a lane's end point, offset to the
    /// right of the direction of travel.
    fn place_light(&mut self, lane: &Lane, orientation: LightOrientation) -> TrafficLightId {
        let travel = lane.end() - lane.start();
        let dir = if travel.magnitude() > 0.0 {
            travel.normalize()
        } else {
            travel
        };
        let right = rot90(dir);
        let position = lane.end() - dir * LIGHT_SETBACK + right * LIGHT_SIDE_OFFSET;
        self.lights
            .insert(TrafficLight::new(LightState::Red, position, orientation))
    }

    /// The lane with the given key, if its road exists.
    pub fn lane(&self, key: LaneKey) -> Option<&Lane> {
        self.roads.get(key.road).map(|road| road.lane(key.dir))
    }

    /// The junction a lane's travel terminates at, if any.
    pub fn ending_junction(&self, key: LaneKey) -> Option<JunctionId> {
        self.roads.get(key.road)?.ending_junction(key.dir)
    }

    /// The junction a lane's travel originates at, if any.
    pub fn starting_junction(&self, key: LaneKey) -> Option<JunctionId> {
        self.roads.get(key.road)?.starting_junction(key.dir)
    }

    /// Every lane that enters the network from a boundary: its origin end
    /// is unconnected and its far end leads to a junction.
    pub fn entry_lanes(&self) -> Vec<LaneKey> {
        self.roads
            .iter()
            .flat_map(|(id, road)| {
                let mut lanes = SmallVec::<[LaneKey; 2]>::new();
                if road.start_junction().is_none() && road.end_junction().is_some() {
                    lanes.push(LaneKey::new(id, LaneDir::Forward));
                }
                if road.end_junction().is_none() && road.start_junction().is_some() {
                    lanes.push(LaneKey::new(id, LaneDir::Backward));
                }
                lanes
            })
            .collect()
    }

    /// A uniformly random entry lane, or `None` if the network has no
    /// boundary entries.
    pub fn random_entry_lane(&self) -> Option<LaneKey> {
        let lanes = self.entry_lanes();
        if lanes.is_empty() {
            warn!("no entry lanes found in the network configuration");
            return None;
        }
        lanes.choose(&mut rand::thread_rng()).copied()
    }

    /// Selects the lane a vehicle leaving `junction_id` from `arrival`
    /// should continue on: a uniformly random connected road excluding
    /// the arrival road, taking the lane that leads away from the
    /// junction. Returns `None` at a dead end.
    pub fn next_lane(&self, arrival: LaneKey, junction_id: JunctionId) -> Option<LaneKey> {
        let junction = self.junctions.get(junction_id)?;
        let exits: SmallVec<[RoadId; 4]> = junction
            .connected_roads()
            .iter()
            .copied()
            .filter(|road| *road != arrival.road)
            .collect();
        let road_id = *exits.choose(&mut rand::thread_rng())?;
        let road = self.roads.get(road_id)?;

        if road.start_junction() == Some(junction_id) {
            Some(LaneKey::new(road_id, LaneDir::Forward))
        } else if road.end_junction() == Some(junction_id) {
            Some(LaneKey::new(road_id, LaneDir::Backward))
        } else {
            error!(
                "road {road_id:?} is listed at junction {junction_id:?} but connected to neither of its ends"
            );
            None
        }
    }

    /// Returns an iterator over all the roads in the network.
    pub fn iter_roads(&self) -> impl Iterator<Item = &Road> {
        self.roads.values()
    }

    /// Returns an iterator over all the junctions in the network.
    pub fn iter_junctions(&self) -> impl Iterator<Item = &Junction> {
        self.junctions.values()
    }

    /// Returns an iterator over all the traffic lights in the network.
    pub fn iter_lights(&self) -> impl Iterator<Item = (TrafficLightId, &TrafficLight)> {
        self.lights.iter()
    }

    /// Returns an iterator over all the cycle controllers in the network.
    pub fn iter_controllers(&self) -> impl Iterator<Item = (ControllerId, &CycleController)> {
        self.controllers.iter()
    }

    /// Gets a reference to the road with the given ID.
    pub fn road(&self, id: RoadId) -> Option<&Road> {
        self.roads.get(id)
    }

    /// Gets a reference to the junction with the given ID.
    pub fn junction(&self, id: JunctionId) -> Option<&Junction> {
        self.junctions.get(id)
    }

    /// Gets a reference to the controller with the given ID.
    pub fn controller(&self, id: ControllerId) -> Option<&CycleController> {
        self.controllers.get(id)
    }

    pub(crate) fn lights(&self) -> &LightSet {
        &self.lights
    }

    pub(crate) fn controller_ids(&self) -> Vec<ControllerId> {
        self.controllers.keys().collect()
    }

    /// Advances one controller by `dt_ms`, feeding it the given per-lane
    /// congestion counts.
    pub(crate) fn update_controller(
        &mut self,
        id: ControllerId,
        dt_ms: f64,
        congestion: &CongestionCounts,
    ) {
        if let Some(controller) = self.controllers.get_mut(id) {
            controller.update(dt_ms, congestion, &mut self.lights);
        }
    }

    /// Builds the canonical four-way signalised crossroads: one central
    /// junction with approach roads running to each edge of a
    /// `width` x `height` world. North-south starts red, east-west green.
    pub fn crossroads(width: f64, height: f64, timing: CycleTiming) -> Self {
        let mut network = Self::new();
        let centre = Point2d::new(width / 2.0, height / 2.0);
        let radius = 40.0;

        let junction = network.add_junction(centre, radius, JunctionKind::Signalised);

        let north = network.add_road(
            Point2d::new(centre.x, 0.0),
            Point2d::new(centre.x, centre.y - radius),
        );
        let east = network.add_road(
            Point2d::new(centre.x + radius, centre.y),
            Point2d::new(width, centre.y),
        );
        let south = network.add_road(
            Point2d::new(centre.x, centre.y + radius),
            Point2d::new(centre.x, height),
        );
        let west = network.add_road(
            Point2d::new(0.0, centre.y),
            Point2d::new(centre.x - radius, centre.y),
        );
        network.connect_roads();

        network.install_signals(
            junction,
            LightState::Red,
            LightState::Green,
            timing,
            &[
                // Southbound traffic arrives on the north road's forward lane.
                (LaneKey::new(north, LaneDir::Forward), Axis::NorthSouth),
                // Westbound traffic arrives on the east road's backward lane.
                (LaneKey::new(east, LaneDir::Backward), Axis::EastWest),
                // Northbound traffic arrives on the south road's backward lane.
                (LaneKey::new(south, LaneDir::Backward), Axis::NorthSouth),
                // Eastbound traffic arrives on the west road's forward lane.
                (LaneKey::new(west, LaneDir::Forward), Axis::EastWest),
            ],
        );

        network
    }

    /// Builds a single roundabout with four unsignalised approach roads.
    pub fn roundabout(width: f64, height: f64) -> Self {
        let mut network = Self::new();
        let centre = Point2d::new(width / 2.0, height / 2.0);
        let radius = 80.0;

        network.add_junction(centre, radius, JunctionKind::Roundabout);
        network.add_road(
            Point2d::new(centre.x, 0.0),
            Point2d::new(centre.x, centre.y - radius),
        );
        network.add_road(
            Point2d::new(centre.x + radius, centre.y),
            Point2d::new(width, centre.y),
        );
        network.add_road(
            Point2d::new(centre.x, centre.y + radius),
            Point2d::new(centre.x, height),
        );
        network.add_road(
            Point2d::new(0.0, centre.y),
            Point2d::new(centre.x - radius, centre.y),
        );
        network.connect_roads();

        network
    }
}
