use self::idm::Idm;
use crate::junction::{Junction, JunctionKind};
use crate::lane::{Lane, LaneKey};
use crate::math::Point2d;
use crate::{LightSet, VehicleId};
use log::warn;

mod idm;

pub use idm::DriverParams;

/// Distance before the end of a lane at which vehicles stop for a light, in m.
const STOP_OFFSET: f64 = 15.0;

/// Vehicles only consult the light within this distance of the stop point, in m.
const LIGHT_LOOKAHEAD: f64 = 60.0;

/// Within this distance of the stop point a stopping vehicle is pinned, in m.
const STOP_TOLERANCE: f64 = 1.0;

/// The class of a vehicle, fixing its dimensions and default driving style.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VehicleClass {
    Car,
    Truck,
}

impl VehicleClass {
    /// The vehicle length in m.
    pub fn length(self) -> f64 {
        match self {
            VehicleClass::Car => 4.5,
            VehicleClass::Truck => 8.0,
        }
    }

    /// The vehicle width in m.
    pub fn width(self) -> f64 {
        match self {
            VehicleClass::Car => 2.0,
            VehicleClass::Truck => 2.5,
        }
    }

    /// The default driving parameters for this class.
    pub fn driver_params(self) -> DriverParams {
        match self {
            VehicleClass::Car => DriverParams {
                desired_speed: 15.0,
                time_headway: 1.4,
                max_acc: 2.0,
                min_gap: 2.0,
            },
            VehicleClass::Truck => DriverParams {
                desired_speed: 12.0,
                time_headway: 1.8,
                max_acc: 1.2,
                min_gap: 3.0,
            },
        }
    }
}

/// The vehicle ahead of another on the same lane.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Leader {
    /// The bumper-to-bumper gap in m, floored at zero.
    pub net_dist: f64,
    /// The leader's velocity in m/s.
    pub vel: f64,
}

/// A simulated vehicle.
///
/// A vehicle lives on one lane at a time, tracking its position as a
/// fraction of the lane's length. Its lane reference changes as it
/// transits junctions and becomes `None` once it leaves the network.
#[derive(Clone, Debug)]
pub struct Vehicle {
    id: VehicleId,
    class: VehicleClass,
    /// Index into the renderer's colour palette.
    colour: u8,
    idm: Idm,
    lane: Option<LaneKey>,
    /// Position along the current lane as a fraction of its length.
    fraction: f64,
    /// Velocity in m/s.
    vel: f64,
    /// Acceleration applied in the last step, in m/s^2.
    acc: f64,
    /// Whether a light currently requires this vehicle to stop.
    must_stop: bool,
    /// The stop point as a fraction of the current lane, if stopping.
    stop_fraction: f64,
    /// Cached world space position of the vehicle centre.
    world_pos: Point2d,
    /// Cached heading in radians.
    heading: f64,
}

impl Vehicle {
    /// Creates a new vehicle with its class's default driving parameters.
    pub(crate) fn new(id: VehicleId, class: VehicleClass, colour: u8, vel_adjust: f64) -> Self {
        Self {
            id,
            class,
            colour,
            idm: Idm::new(class.driver_params(), vel_adjust),
            lane: None,
            fraction: 0.0,
            vel: 0.0,
            acc: 0.0,
            must_stop: false,
            stop_fraction: 1.0,
            world_pos: Point2d::new(0.0, 0.0),
            heading: 0.0,
        }
    }

    /// The vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// The vehicle's class.
    pub fn class(&self) -> VehicleClass {
        self.class
    }

    /// The vehicle's palette index, for rendering.
    pub fn colour(&self) -> u8 {
        self.colour
    }

    /// The vehicle's length in m.
    pub fn length(&self) -> f64 {
        self.class.length()
    }

    /// Half the vehicle's length in m.
    pub fn half_length(&self) -> f64 {
        0.5 * self.class.length()
    }

    /// The lane the vehicle is currently on, or `None` once it has left
    /// the network.
    pub fn lane(&self) -> Option<LaneKey> {
        self.lane
    }

    /// The vehicle's position along its lane as a fraction of the lane length.
    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    /// The vehicle's velocity in m/s.
    pub fn vel(&self) -> f64 {
        self.vel
    }

    /// The acceleration applied in the last step, in m/s^2.
    pub fn acc(&self) -> f64 {
        self.acc
    }

    /// Whether a light currently requires this vehicle to stop.
    pub fn stopping_for_light(&self) -> bool {
        self.must_stop
    }

    /// The world space position of the vehicle centre.
    pub fn position(&self) -> Point2d {
        self.world_pos
    }

    /// The vehicle's heading in radians.
    pub fn heading(&self) -> f64 {
        self.heading
    }

    /// Whether the vehicle has left the network.
    pub(crate) fn has_exited(&self) -> bool {
        self.lane.is_none()
    }

    /// Places the vehicle on a lane, clearing any light-stop state.
    pub(crate) fn enter_lane(&mut self, lane: LaneKey, fraction: f64) {
        self.lane = Some(lane);
        self.fraction = fraction;
        self.must_stop = false;
        self.stop_fraction = 1.0;
    }

    /// Takes the vehicle out of the network and ends its participation
    /// in further updates.
    pub(crate) fn exit_network(&mut self) {
        self.lane = None;
        self.vel = 0.0;
        self.acc = 0.0;
    }

    /// Holds the vehicle at the end of its lane, waiting for the junction
    /// gate to free up.
    pub(crate) fn hold_at_lane_end(&mut self) {
        self.fraction = self.fraction.min(1.0);
        self.vel = 0.0;
        self.acc = 0.0;
    }

    /// Refreshes the cached world position and heading from the lane.
    pub(crate) fn update_coords(&mut self, lane: &Lane) {
        self.world_pos = lane.point_at(self.fraction);
        self.heading = lane.heading();
    }

    /// Determines whether a traffic light requires this vehicle to stop.
    ///
    /// Only lanes terminating at a signalised junction carry a stop point,
    /// which sits a fixed distance before the lane end. The light is not
    /// consulted until the vehicle is within a fixed look-ahead of that
    /// point, and a vehicle that has already passed it is committed and
    /// carries on. A signalised junction with no light assigned to this
    /// lane is a configuration error; the vehicle conservatively stops
    /// and the inconsistency is logged.
    pub(crate) fn check_light(
        &mut self,
        lane: &Lane,
        junction: Option<&Junction>,
        lights: &LightSet,
    ) {
        self.must_stop = false;
        let Some(junction) = junction else { return };
        if junction.kind() != JunctionKind::Signalised || lane.length() <= 0.0 {
            return;
        }

        let stop_fraction = f64::max(1.0 - STOP_OFFSET / lane.length(), 0.0);
        let net_dist = (stop_fraction - self.fraction) * lane.length() - self.half_length();
        if net_dist > LIGHT_LOOKAHEAD || net_dist < -STOP_TOLERANCE {
            return;
        }

        let state = junction
            .light_for_lane(lane.key())
            .and_then(|id| lights.get(id))
            .map(|light| light.state());
        match state {
            Some(state) if !state.requires_stop() => {}
            Some(_) => {
                self.must_stop = true;
                self.stop_fraction = stop_fraction;
            }
            None => {
                warn!(
                    "no traffic light assigned for lane {:?} at junction {:?}; holding vehicle {:?}",
                    lane.key(),
                    junction.id(),
                    self.id
                );
                self.must_stop = true;
                self.stop_fraction = stop_fraction;
            }
        }
    }

    /// Advances the vehicle's kinematics by `dt` seconds: car-following
    /// acceleration, light braking override, clamping, then integration
    /// of velocity and position fraction.
    pub(crate) fn step(&mut self, dt: f64, lane: &Lane, leader: Option<Leader>) {
        let mut acc = self
            .idm
            .acceleration(self.vel, leader.map(|l| (l.net_dist, l.vel)));

        if self.must_stop {
            let net_dist = (self.stop_fraction - self.fraction) * lane.length() - self.half_length();
            if net_dist <= STOP_TOLERANCE {
                // Pinned at the stop point.
                self.vel = 0.0;
                self.acc = 0.0;
                return;
            }
            acc = f64::min(acc, self.idm.brake_to_stop(self.vel, net_dist));
        }

        self.acc = self.idm.clamp(acc);
        self.vel = f64::max(self.vel + self.acc * dt, 0.0);
        if lane.length() > 0.0 {
            self.fraction += self.vel * dt / lane.length();
        } else {
            // Degenerate lane; cross it immediately.
            self.fraction = 1.0;
        }
    }
}
