pub use incident::{Incident, IncidentConfig, IncidentManager};
pub use lane::Lane;
pub use obstacle::Obstacle;
pub use params::{ParamsPatch, SimulationParams};
pub use ramp::OnRamp;
pub use road::{Neighbors, Road};
pub use simulation::{Simulation, SimulationState};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use util::Interval;
pub use vehicle::{RampGeometry, Vehicle, VehicleAttributes, VehicleLocation, VehicleState};

mod factory;
mod incident;
mod lane;
pub mod model;
mod obstacle;
mod params;
mod ramp;
mod road;
mod simulation;
mod util;
mod vehicle;

new_key_type! {
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
    /// Unique ID of an [OnRamp].
    pub struct RampId;
}

/// The arena owning every simulated vehicle.
pub type VehicleSet = SlotMap<VehicleId, Vehicle>;
