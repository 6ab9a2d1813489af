use crate::lane::LaneKey;
use crate::network::RoadNetwork;
use crate::registry::VehicleRegistry;
use crate::vehicle::{Vehicle, VehicleClass};
use crate::VehicleId;
use log::warn;

/// A traffic simulation: a road network plus the vehicles moving on it.
///
/// Constructed around a finished [RoadNetwork], then driven by repeated
/// calls to [advance](Self::advance) with the wall-clock time elapsed
/// since the previous call.
pub struct Simulation {
    network: RoadNetwork,
    registry: VehicleRegistry,
    /// Configured arrival rate in vehicles per hour.
    inflow: f64,
    /// Multiplier applied to wall-clock time.
    time_scale: f64,
    elapsed_secs: f64,
}

impl Simulation {
    /// Creates a simulation over the given network, initially with no
    /// vehicles and no inflow, running at real time.
    pub fn new(network: RoadNetwork) -> Self {
        Self {
            network,
            registry: VehicleRegistry::new(),
            inflow: 0.0,
            time_scale: 1.0,
            elapsed_secs: 0.0,
        }
    }

    /// The simulation's road network.
    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    /// The total simulated time elapsed, in seconds.
    pub fn time(&self) -> f64 {
        self.elapsed_secs
    }

    /// The number of vehicles currently in the network.
    pub fn num_vehicles(&self) -> usize {
        self.registry.len()
    }

    /// Returns an iterator over all the vehicles.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.registry.iter()
    }

    /// Gets a reference to the vehicle with the given ID, if it is still
    /// in the network.
    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.registry.get(id)
    }

    /// Sets the arrival rate at the network boundary, in vehicles per
    /// hour. Negative rates are treated as zero.
    pub fn set_inflow_rate(&mut self, vehicles_per_hour: f64) {
        if vehicles_per_hour < 0.0 {
            warn!("negative inflow rate {vehicles_per_hour} clamped to zero");
        }
        self.inflow = vehicles_per_hour.max(0.0);
    }

    /// Sets the multiplier between wall-clock time and simulated time.
    /// Non-positive scales are rejected.
    pub fn set_time_scale(&mut self, scale: f64) {
        if scale > 0.0 {
            self.time_scale = scale;
        } else {
            warn!("ignoring non-positive time scale {scale}");
        }
    }

    /// Places a vehicle of the given class on a lane, at the given
    /// fraction of its length. Returns `None` if the lane does not exist.
    pub fn add_vehicle(
        &mut self,
        class: VehicleClass,
        lane: LaneKey,
        fraction: f64,
    ) -> Option<VehicleId> {
        self.registry.add_at(class, lane, fraction, &self.network)
    }

    /// Advances the simulation by `dt_secs` of wall-clock time, scaled by
    /// the time scale.
    ///
    /// One tick runs, in order: boundary spawns, light cycle updates,
    /// vehicle updates, then removal of the vehicles that exited.
    pub fn advance(&mut self, dt_secs: f64) {
        let dt = dt_secs * self.time_scale;
        if dt <= 0.0 {
            return;
        }
        self.elapsed_secs += dt;
        self.registry.spawn_arrivals(dt, self.inflow, &self.network);
        self.advance_lights(dt * 1000.0);
        self.registry.advance_all(dt, &self.network);
    }

    /// Advances only the light cycle controllers, by `dt_ms` of simulated
    /// time. Called from [advance](Self::advance); exposed for driving
    /// the signals without moving traffic.
    pub fn advance_lights(&mut self, dt_ms: f64) {
        for id in self.network.controller_ids() {
            let Some(controller) = self.network.controller(id) else {
                continue;
            };
            let radius = controller.timing().congestion_radius;
            let congestion = self.registry.congestion(&self.network, radius);
            self.network.update_controller(id, dt_ms, &congestion);
        }
    }
}
