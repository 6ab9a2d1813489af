use crate::lane::LaneKey;
use crate::light::cycle::CongestionCounts;
use crate::network::RoadNetwork;
use crate::vehicle::{Leader, Vehicle, VehicleClass};
use crate::{VehicleId, VehicleSet};
use cgmath::MetricSpace;
use itertools::Itertools;
use log::error;
use rand::prelude::*;
use rand_distr::Normal;

/// Minimum free distance at a lane start before a spawn there succeeds,
/// as a multiple of the spawning vehicle's length.
const SPAWN_CLEARANCE_FACTOR: f64 = 1.5;

/// Share of spawned vehicles that are trucks.
const TRUCK_SHARE: f64 = 0.2;

/// Standard deviation of the per-driver desired velocity adjustment.
const VEL_ADJUST_SIGMA: f64 = 0.1;

/// Number of entries in the renderer's vehicle colour palette.
const PALETTE_SIZE: u8 = 8;

/// Owns every vehicle in the simulation and runs their per-tick updates.
///
/// Vehicles never mutate the registry themselves. They signal exit by
/// nulling their lane reference and the registry reaps them in a batch
/// after the update pass, so removal never invalidates the pass.
#[derive(Default)]
pub struct VehicleRegistry {
    vehicles: VehicleSet,
    /// Seconds of inflow accumulated towards the next spawn. Carries its
    /// surplus across ticks rather than resetting, so the configured
    /// inflow rate holds over time regardless of tick length.
    spawn_timer_s: f64,
}

impl VehicleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Default::default()
    }

    /// The number of vehicles currently in the network.
    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    /// Whether the network currently has no vehicles.
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn get(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    /// Returns an iterator over all the vehicles.
    pub fn iter(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Places a vehicle of the given class on a lane directly, bypassing
    /// the inflow timer and clearance check. The driver drives exactly at
    /// the class's desired speed.
    pub(crate) fn add_at(
        &mut self,
        class: VehicleClass,
        lane_key: LaneKey,
        fraction: f64,
        network: &RoadNetwork,
    ) -> Option<VehicleId> {
        let lane = network.lane(lane_key)?;
        let id = self
            .vehicles
            .insert_with_key(|id| Vehicle::new(id, class, 0, 1.0));
        let vehicle = &mut self.vehicles[id];
        vehicle.enter_lane(lane_key, fraction);
        vehicle.update_coords(lane);
        Some(id)
    }

    /// Accumulates `dt_secs` of inflow and spawns the vehicles that are
    /// due. An `inflow` of `n` vehicles per hour spawns one vehicle every
    /// `3600 / n` seconds; a spawn attempt blocked by traffic at the
    /// entry still consumes its interval, so arrivals are dropped rather
    /// than queued.
    pub(crate) fn spawn_arrivals(&mut self, dt_secs: f64, inflow: f64, network: &RoadNetwork) {
        if inflow <= 0.0 {
            return;
        }
        let interval = 3600.0 / inflow;
        self.spawn_timer_s += dt_secs;
        while self.spawn_timer_s >= interval {
            self.spawn_timer_s -= interval;
            self.try_spawn(network);
        }
    }

    /// Attempts to spawn one vehicle at a random entry lane.
    fn try_spawn(&mut self, network: &RoadNetwork) {
        let mut rng = rand::thread_rng();
        let Some(lane_key) = network.random_entry_lane() else {
            return;
        };
        let Some(lane) = network.lane(lane_key) else {
            return;
        };

        let class = if rng.gen_bool(TRUCK_SHARE) {
            VehicleClass::Truck
        } else {
            VehicleClass::Car
        };

        // Don't spawn on top of a vehicle still clearing the entry.
        let clearance = SPAWN_CLEARANCE_FACTOR * class.length();
        let blocked = self.vehicles.values().any(|vehicle| {
            vehicle.lane() == Some(lane_key) && vehicle.fraction() * lane.length() < clearance
        });
        if blocked {
            return;
        }

        let colour = rng.gen_range(0..PALETTE_SIZE);
        let vel_adjust = Normal::new(1.0, VEL_ADJUST_SIGMA)
            .map_or(1.0, |dist| dist.sample(&mut rng))
            .clamp(0.75, 1.25);

        let id = self
            .vehicles
            .insert_with_key(|id| Vehicle::new(id, class, colour, vel_adjust));
        let vehicle = &mut self.vehicles[id];
        vehicle.enter_lane(lane_key, 0.0);
        vehicle.update_coords(lane);
    }

    /// Runs one update pass over every vehicle, then reaps the ones that
    /// exited.
    ///
    /// Leader lookups read a snapshot of positions taken before the pass,
    /// so the outcome does not depend on update order within a tick.
    /// Junction crossings do run in ID order, which serialises gate entry
    /// deterministically.
    pub(crate) fn advance_all(&mut self, dt_secs: f64, network: &RoadNetwork) {
        let snapshot: Vec<(VehicleId, LaneKey, f64, f64, f64)> = self
            .vehicles
            .iter()
            .filter_map(|(id, vehicle)| {
                let lane = vehicle.lane()?;
                Some((id, lane, vehicle.fraction(), vehicle.vel(), vehicle.half_length()))
            })
            .collect();

        let ids: Vec<VehicleId> = self.vehicles.keys().collect();
        for id in ids {
            self.advance_one(id, dt_secs, &snapshot, network);
        }

        let exited: Vec<VehicleId> = self
            .vehicles
            .iter()
            .filter(|(_, vehicle)| vehicle.has_exited())
            .map(|(id, _)| id)
            .collect();
        for id in exited {
            self.vehicles.remove(id);
        }
    }

    fn advance_one(
        &mut self,
        id: VehicleId,
        dt_secs: f64,
        snapshot: &[(VehicleId, LaneKey, f64, f64, f64)],
        network: &RoadNetwork,
    ) {
        let Some(vehicle) = self.vehicles.get_mut(id) else {
            return;
        };
        let Some(lane_key) = vehicle.lane() else {
            return;
        };
        let Some(lane) = network.lane(lane_key) else {
            error!("vehicle {id:?} references missing lane {lane_key:?}");
            vehicle.exit_network();
            return;
        };

        let leader = Self::leader_of(id, lane_key, vehicle.fraction(), vehicle.half_length(), lane.length(), snapshot);

        let junction = network
            .ending_junction(lane_key)
            .and_then(|jid| network.junction(jid));
        vehicle.check_light(lane, junction, network.lights());
        vehicle.step(dt_secs, lane, leader);

        if vehicle.fraction() >= 1.0 {
            self.cross_junction(id, lane_key, network);
        } else {
            vehicle.update_coords(lane);
        }
    }

    /// The nearest vehicle ahead on the same lane, by smallest strictly
    /// positive fraction gap. No wraparound: the front vehicle on a lane
    /// has no leader.
    fn leader_of(
        id: VehicleId,
        lane_key: LaneKey,
        fraction: f64,
        half_length: f64,
        lane_length: f64,
        snapshot: &[(VehicleId, LaneKey, f64, f64, f64)],
    ) -> Option<Leader> {
        snapshot
            .iter()
            .filter(|(other, lane, frac, _, _)| {
                *other != id && *lane == lane_key && *frac > fraction
            })
            .min_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(_, _, frac, vel, their_half)| Leader {
                net_dist: ((frac - fraction) * lane_length - their_half - half_length).max(0.0),
                vel: *vel,
            })
    }

    /// Moves a vehicle that reached the end of its lane through the
    /// terminal junction, or out of the network.
    ///
    /// The gate is held only for the duration of the lane switch, with no
    /// fallible step between enter and leave. A vehicle denied the gate
    /// waits at the lane end and retries next tick.
    fn cross_junction(&mut self, id: VehicleId, arrival: LaneKey, network: &RoadNetwork) {
        let Some(vehicle) = self.vehicles.get_mut(id) else {
            return;
        };

        let next = network
            .ending_junction(arrival)
            .and_then(|jid| Some((jid, network.junction(jid)?)))
            .and_then(|(jid, junction)| {
                Some((junction, network.next_lane(arrival, jid)?))
            });
        let Some((junction, next_key)) = next else {
            // Network boundary or dead end.
            vehicle.exit_network();
            return;
        };
        let (Some(old_lane), Some(new_lane)) = (network.lane(arrival), network.lane(next_key))
        else {
            vehicle.exit_network();
            return;
        };

        if !junction.gate().enter() {
            vehicle.hold_at_lane_end();
            vehicle.update_coords(old_lane);
            return;
        }
        let overshoot = (vehicle.fraction() - 1.0).max(0.0) * old_lane.length();
        let fraction = new_lane.fraction_at(overshoot).min(1.0);
        vehicle.enter_lane(next_key, fraction);
        vehicle.update_coords(new_lane);
        junction.gate().leave();
    }

    /// Counts the vehicles queued within `radius` of their terminal
    /// junction, per lane. Feeds the adaptive light cycles.
    pub(crate) fn congestion(&self, network: &RoadNetwork, radius: f64) -> CongestionCounts {
        self.vehicles
            .values()
            .filter_map(|vehicle| {
                let lane_key = vehicle.lane()?;
                let junction = network.junction(network.ending_junction(lane_key)?)?;
                let near = vehicle.position().distance2(junction.centre()) <= radius * radius;
                near.then_some(lane_key)
            })
            .counts()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::junction::JunctionKind;
    use crate::lane::LaneDir;
    use crate::math::Point2d;

    /// One road running into a roundabout junction: the forward lane is
    /// an entry lane, the backward lane exits at the network boundary.
    fn entry_network() -> (RoadNetwork, LaneKey) {
        let mut network = RoadNetwork::new();
        network.add_junction(Point2d::new(500.0, 0.0), 40.0, JunctionKind::Roundabout);
        let road = network.add_road(Point2d::new(0.0, 0.0), Point2d::new(460.0, 0.0));
        network.connect_roads();
        (network, LaneKey::new(road, LaneDir::Forward))
    }

    /// Two roads meeting at a roundabout junction, so a vehicle on the
    /// first road's forward lane crosses onto the second road.
    fn through_network() -> (RoadNetwork, crate::JunctionId, LaneKey, LaneKey) {
        let mut network = RoadNetwork::new();
        let junction =
            network.add_junction(Point2d::new(200.0, 0.0), 40.0, JunctionKind::Roundabout);
        let a = network.add_road(Point2d::new(0.0, 0.0), Point2d::new(160.0, 0.0));
        let b = network.add_road(Point2d::new(240.0, 0.0), Point2d::new(400.0, 0.0));
        network.connect_roads();
        (
            network,
            junction,
            LaneKey::new(a, LaneDir::Forward),
            LaneKey::new(b, LaneDir::Forward),
        )
    }

    #[test]
    fn crossing_carries_overshoot_distance() {
        let (network, _, arrival, exit) = through_network();
        let mut registry = VehicleRegistry::new();
        let id = registry.add_at(VehicleClass::Car, arrival, 0.999, &network).unwrap();

        for _ in 0..100 {
            registry.advance_all(0.1, &network);
            let vehicle = registry.get(id).unwrap();
            if vehicle.lane() == Some(exit) {
                // The distance travelled past the old lane's end reappears
                // at the start of the new lane, a fraction of its length.
                assert!(vehicle.fraction() >= 0.0);
                assert!(vehicle.fraction() < 0.05);
                return;
            }
        }
        panic!("vehicle never crossed the junction");
    }

    #[test]
    fn occupied_gate_holds_the_vehicle_at_its_lane_end() {
        let (network, junction, arrival, _) = through_network();
        let mut registry = VehicleRegistry::new();
        let id = registry.add_at(VehicleClass::Car, arrival, 0.999, &network).unwrap();

        assert!(network.junction(junction).unwrap().gate().enter());
        for _ in 0..50 {
            registry.advance_all(0.1, &network);
            let vehicle = registry.get(id).unwrap();
            assert_eq!(vehicle.lane(), Some(arrival));
            assert!(vehicle.fraction() <= 1.0);
        }

        // Releasing the gate lets the crossing through.
        network.junction(junction).unwrap().gate().leave();
        registry.advance_all(0.1, &network);
        assert!(registry
            .get(id)
            .map_or(true, |vehicle| vehicle.lane() != Some(arrival)));
    }

    #[test]
    fn spawn_respects_entry_clearance() {
        let (network, entry) = entry_network();
        let mut registry = VehicleRegistry::new();
        registry.add_at(VehicleClass::Car, entry, 0.0, &network);
        assert_eq!(registry.len(), 1);

        // One full interval elapses but the entry is blocked, so the
        // arrival is dropped rather than queued.
        registry.spawn_arrivals(3.6, 1000.0, &network);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn spawn_timer_carries_surplus() {
        let (network, _) = entry_network();
        let mut registry = VehicleRegistry::new();

        // 0.9 intervals: nothing due yet.
        registry.spawn_arrivals(3.24, 1000.0, &network);
        assert_eq!(registry.len(), 0);
        // The surplus tips the timer over one interval.
        registry.spawn_arrivals(0.4, 1000.0, &network);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn follower_never_reaches_its_leader() {
        let (network, entry) = entry_network();
        let mut registry = VehicleRegistry::new();
        let leader = registry.add_at(VehicleClass::Car, entry, 0.05, &network).unwrap();
        let follower = registry.add_at(VehicleClass::Car, entry, 0.0, &network).unwrap();

        for _ in 0..200 {
            registry.advance_all(0.05, &network);
            let gap = registry.get(leader).unwrap().fraction()
                - registry.get(follower).unwrap().fraction();
            assert!(gap * 460.0 > VehicleClass::Car.length());
        }
    }

    #[test]
    fn boundary_exit_removes_the_vehicle() {
        let (network, entry) = entry_network();
        let boundary = LaneKey::new(entry.road, LaneDir::Backward);
        let mut registry = VehicleRegistry::new();
        let id = registry.add_at(VehicleClass::Car, boundary, 0.999, &network).unwrap();

        for _ in 0..200 {
            registry.advance_all(0.1, &network);
        }
        assert!(registry.get(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn dead_end_removes_the_vehicle() {
        // The junction has one connected road, so there is nowhere to
        // turn and the vehicle is retired on arrival.
        let (network, entry) = entry_network();
        let mut registry = VehicleRegistry::new();
        let id = registry.add_at(VehicleClass::Car, entry, 0.99, &network).unwrap();

        for _ in 0..100 {
            registry.advance_all(0.1, &network);
        }
        assert!(registry.get(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn congestion_counts_only_vehicles_near_their_junction() {
        let (network, entry) = entry_network();
        let mut registry = VehicleRegistry::new();
        // 460 m lane towards a junction at x = 500: fraction 0.9 sits
        // 86 m from the centre, fraction 0.2 sits 408 m away.
        registry.add_at(VehicleClass::Car, entry, 0.9, &network);
        registry.add_at(VehicleClass::Car, entry, 0.95, &network);
        registry.add_at(VehicleClass::Car, entry, 0.2, &network);

        let counts = registry.congestion(&network, 150.0);
        assert_eq!(counts.get(&entry), Some(&2));
    }
}
