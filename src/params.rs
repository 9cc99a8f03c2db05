use serde::{Deserialize, Serialize};

/// The global simulation parameters, shared by all model functions.
///
/// The bundle is mostly-read and hot-swappable via [`apply`](Self::apply);
/// structural parameters (`lane_count`, `road_length`) only take effect
/// when the simulation topology is next rebuilt.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SimulationParams {
    /// The mean desired (free-flow) speed v0 in m/s.
    pub desired_speed: f64,
    /// The desired time headway T in s.
    pub time_headway: f64,
    /// The maximum acceleration a in m/s^2.
    pub max_acceleration: f64,
    /// The comfortable deceleration b in m/s^2.
    pub comfort_deceleration: f64,
    /// The minimum bumper-to-bumper gap s0 in m.
    pub minimum_gap: f64,
    /// The vehicle length in m.
    pub vehicle_length: f64,
    /// The MOBIL politeness factor p.
    pub politeness_factor: f64,
    /// The MOBIL lane changing threshold in m/s^2.
    pub changing_threshold: f64,
    /// The MOBIL safe deceleration limit in m/s^2, a positive number.
    pub safe_deceleration: f64,
    /// The road length in m.
    pub road_length: f64,
    /// The number of main-road lanes.
    pub lane_count: usize,
    /// The entrance spawn rate in vehicles per second.
    pub spawn_rate: f64,
    /// The fixed simulation timestep in s.
    pub dt: f64,
    /// Time dilation applied to wall-clock deltas in [`update`](crate::Simulation::update).
    pub speed_multiplier: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            desired_speed: 33.3, // 120 km/h
            time_headway: 1.5,
            max_acceleration: 1.0,
            comfort_deceleration: 1.5,
            minimum_gap: 2.0,
            vehicle_length: 5.0,
            politeness_factor: 0.5,
            changing_threshold: 0.2,
            safe_deceleration: 4.0,
            road_length: 2000.0,
            lane_count: 3,
            spawn_rate: 0.5,
            dt: 1.0 / 60.0,
            speed_multiplier: 1.0,
        }
    }
}

impl SimulationParams {
    /// Shallow-merges a partial parameter set into this one.
    ///
    /// Values are not validated; a malformed parameter surfaces as emergent
    /// incorrect behaviour, not an error.
    pub fn apply(&mut self, patch: &ParamsPatch) {
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = patch.$field {
                    self.$field = value;
                })*
            };
        }
        merge!(
            desired_speed,
            time_headway,
            max_acceleration,
            comfort_deceleration,
            minimum_gap,
            vehicle_length,
            politeness_factor,
            changing_threshold,
            safe_deceleration,
            road_length,
            lane_count,
            spawn_rate,
            dt,
            speed_multiplier,
        );
    }
}

/// A partial [`SimulationParams`], typically deserialized from a UI or
/// scenario event payload. Absent fields leave the live value untouched.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamsPatch {
    pub desired_speed: Option<f64>,
    pub time_headway: Option<f64>,
    pub max_acceleration: Option<f64>,
    pub comfort_deceleration: Option<f64>,
    pub minimum_gap: Option<f64>,
    pub vehicle_length: Option<f64>,
    pub politeness_factor: Option<f64>,
    pub changing_threshold: Option<f64>,
    pub safe_deceleration: Option<f64>,
    pub road_length: Option<f64>,
    pub lane_count: Option<usize>,
    pub spawn_rate: Option<f64>,
    pub dt: Option<f64>,
    pub speed_multiplier: Option<f64>,
}
