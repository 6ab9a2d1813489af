pub use cgmath;
pub use junction::{Gate, Junction, JunctionKind};
pub use lane::{Lane, LaneDir, LaneKey};
pub use light::{Axis, CycleController, CycleTiming, LightOrientation, LightState, TrafficLight};
pub use network::RoadNetwork;
pub use registry::VehicleRegistry;
pub use road::Road;
pub use simulation::Simulation;
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use vehicle::{DriverParams, Vehicle, VehicleClass};

mod junction;
mod lane;
mod light;
pub mod math;
mod network;
mod registry;
mod road;
mod simulation;
mod vehicle;

new_key_type! {
    /// Unique ID of a [Road].
    pub struct RoadId;
    /// Unique ID of a [Junction].
    pub struct JunctionId;
    /// Unique ID of a [TrafficLight].
    pub struct TrafficLightId;
    /// Unique ID of a [CycleController].
    pub struct ControllerId;
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
}

type RoadSet = SlotMap<RoadId, Road>;
type JunctionSet = SlotMap<JunctionId, Junction>;
type LightSet = SlotMap<TrafficLightId, TrafficLight>;
type ControllerSet = SlotMap<ControllerId, CycleController>;
type VehicleSet = SlotMap<VehicleId, Vehicle>;
