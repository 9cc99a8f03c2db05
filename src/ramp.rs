use crate::factory::sample_desired_speed;
use crate::lane::Lane;
use crate::model::idm;
use crate::obstacle::Obstacle;
use crate::params::SimulationParams;
use crate::road::Road;
use crate::util::Interval;
use crate::vehicle::{Vehicle, VehicleAttributes, VehicleLocation};
use crate::{RampId, VehicleId, VehicleSet};
use rand::Rng;
use smallvec::SmallVec;

/// The default acceleration lane length in m.
const DEFAULT_ACCEL_LANE_LENGTH: f64 = 300.0;

/// The default ramp spawn rate in vehicles per second.
const DEFAULT_SPAWN_RATE: f64 = 0.3;

/// An on-ramp: a secondary lane that spawns vehicles, advances them along
/// an acceleration lane, and merges them into the rightmost main lane.
#[derive(Clone, Debug)]
pub struct OnRamp {
    /// Where the acceleration lane ends and merging must be complete, in m.
    merge_position_x: f64,
    /// The length of the acceleration lane in m.
    acceleration_lane_length: f64,
    /// The ramp spawn rate in vehicles per second.
    spawn_rate: f64,
    /// Disabled ramps neither spawn nor step their vehicles.
    enabled: bool,
    /// The vehicles currently on the acceleration lane.
    lane: Lane,
    /// Whole units crossed trigger spawn attempts.
    spawn_accumulator: f64,
}

impl OnRamp {
    /// Creates an on-ramp merging at the given position with the default
    /// acceleration lane length and spawn rate.
    pub fn new(merge_position_x: f64) -> Self {
        Self::with_geometry(merge_position_x, DEFAULT_ACCEL_LANE_LENGTH, DEFAULT_SPAWN_RATE)
    }

    /// Creates an on-ramp with explicit geometry and spawn rate.
    pub fn with_geometry(merge_position_x: f64, acceleration_lane_length: f64, spawn_rate: f64) -> Self {
        Self {
            merge_position_x,
            acceleration_lane_length,
            spawn_rate,
            enabled: true,
            lane: Lane::new(),
            spawn_accumulator: 0.0,
        }
    }

    /// Start of the acceleration lane, upstream of the merge point, in m.
    pub fn start_x(&self) -> f64 {
        self.merge_position_x - self.acceleration_lane_length
    }

    /// End of the acceleration lane (the merge point) in m.
    pub fn end_x(&self) -> f64 {
        self.merge_position_x
    }

    /// The ramp's acceleration lane.
    pub fn lane(&self) -> &Lane {
        &self.lane
    }

    /// Whether the ramp is enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Enables or disables the ramp.
    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Adds an externally constructed vehicle to the acceleration lane.
    pub(crate) fn insert_vehicle(&mut self, vehicles: &VehicleSet, id: VehicleId) {
        self.lane.insert(vehicles, id);
    }

    /// Integrates the ramp spawn rate over `dt` and spawns vehicles at the
    /// ramp start at half their sampled desired speed, unless the entrance
    /// is blocked.
    pub(crate) fn try_spawn(
        &mut self,
        dt: f64,
        vehicles: &mut VehicleSet,
        rng: &mut impl Rng,
        params: &SimulationParams,
        ramp_id: RampId,
    ) {
        if !self.enabled {
            return;
        }
        self.spawn_accumulator += self.spawn_rate * dt;
        while self.spawn_accumulator >= 1.0 {
            self.spawn_accumulator -= 1.0;

            let entrance_gap = params.minimum_gap + params.vehicle_length;
            if let Some(last) = self.lane.last() {
                if vehicles[last].x() - self.start_x() < entrance_gap {
                    continue;
                }
            }

            let desired_speed = sample_desired_speed(rng, params);
            let id = vehicles.insert_with_key(|id| {
                Vehicle::new(
                    id,
                    &VehicleAttributes {
                        x: self.start_x(),
                        speed: 0.5 * desired_speed,
                        desired_speed,
                        length: params.vehicle_length,
                    },
                    VehicleLocation::Ramp(ramp_id),
                )
            });
            self.lane.insert(vehicles, id);
            log::debug!("ramp vehicle {:?} spawned at {:.0} m", id, self.start_x());
        }
    }

    /// Advances the ramp's vehicles by one tick: car following along the
    /// ramp, forced deceleration near the merge point, merge attempts into
    /// the rightmost main lane, integration, and overshoot cleanup.
    pub(crate) fn step_vehicles(
        &mut self,
        dt: f64,
        road: &mut Road,
        vehicles: &mut VehicleSet,
        params: &SimulationParams,
    ) {
        if !self.enabled || road.lane_count() == 0 {
            return;
        }
        let end_wall = Obstacle::stationary(self.end_x());

        // Car following against the in-ramp leader, clamped near the ramp
        // end so vehicles that cannot merge come to a stop before it.
        for id in self.lane.iter() {
            let vehicle = &vehicles[id];
            let leader = self
                .lane
                .leader_of(id)
                .map(|leader| Obstacle::from_vehicle(&vehicles[leader]));
            let mut acc = idm::acceleration(vehicle, leader.as_ref(), params, 1.0);
            if self.end_x() - vehicle.x() < 2.0 * vehicle.length() {
                acc = acc.min(idm::acceleration(vehicle, Some(&end_wall), params, 1.0));
            }
            vehicle.set_acceleration(acc);
        }

        // Merge attempts for vehicles inside the merge window.
        let target_lane = road.lane_count() - 1;
        let window = Interval::new(self.start_x(), self.end_x());
        let mut merges: SmallVec<[VehicleId; 4]> = SmallVec::new();

        for id in self.lane.iter() {
            let vehicle = &vehicles[id];
            if !window.contains(vehicle.x()) {
                continue;
            }
            let neighbors = road.neighbors(vehicles, vehicle.x(), target_lane);
            if let Some(leader) = neighbors.leader {
                if vehicles[leader].rear() - vehicle.x() < params.minimum_gap {
                    continue;
                }
            }
            if let Some(follower) = neighbors.follower {
                let follower = &vehicles[follower];
                if vehicle.rear() - follower.x() < params.minimum_gap {
                    continue;
                }
                let after =
                    idm::acceleration(follower, Some(&Obstacle::from_vehicle(vehicle)), params, 1.0);
                if after < -params.safe_deceleration {
                    continue;
                }
            }
            merges.push(id);
        }

        for id in merges {
            self.lane.remove(id);
            vehicles[id].set_location(VehicleLocation::MainRoad(target_lane));
            road.insert_vehicle(vehicles, id, target_lane);
            log::debug!("ramp vehicle {:?} merged into lane {}", id, target_lane);
        }

        // Integrate the vehicles still on the ramp.
        for id in self.lane.iter() {
            vehicles[id].integrate(dt);
        }

        // Vehicles that overshoot the merge point without merging are
        // discarded rather than forced into traffic.
        let limit = self.end_x() + params.vehicle_length;
        let overshot: SmallVec<[VehicleId; 4]> = self
            .lane
            .iter()
            .filter(|id| vehicles[*id].x() > limit)
            .collect();
        for id in overshot {
            self.lane.remove(id);
            vehicles.remove(id);
            log::debug!("ramp vehicle {:?} discarded past merge point", id);
        }

        self.lane.resort(vehicles);
    }
}
