use crate::params::SimulationParams;
use crate::road::Road;
use crate::vehicle::{Vehicle, VehicleAttributes, VehicleLocation};
use crate::{VehicleId, VehicleSet};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rand_distr::Normal;
use smallvec::SmallVec;

/// Spawns vehicles at the road entrance and despawns them past the exit.
#[derive(Clone, Debug, Default)]
pub struct VehicleFactory {
    /// Whole units crossed trigger spawn attempts.
    spawn_accumulator: f64,
}

impl VehicleFactory {
    /// Creates a new factory.
    pub fn new() -> Self {
        Default::default()
    }

    /// Integrates the spawn rate over `dt` and performs one spawn attempt
    /// per whole unit crossed. Several attempts per tick are possible at
    /// high rates or large timesteps.
    pub(crate) fn try_spawn(
        &mut self,
        dt: f64,
        road: &mut Road,
        vehicles: &mut VehicleSet,
        rng: &mut impl Rng,
        params: &SimulationParams,
    ) {
        self.spawn_accumulator += params.spawn_rate * dt;
        while self.spawn_accumulator >= 1.0 {
            self.spawn_accumulator -= 1.0;
            self.attempt_spawn(road, vehicles, rng, params);
        }
    }

    /// Removes every main-road vehicle that has travelled past the road end.
    pub(crate) fn despawn(&mut self, road: &mut Road, vehicles: &mut VehicleSet) {
        let length = road.length();
        let exited: SmallVec<[(VehicleId, usize); 8]> = road
            .lanes()
            .enumerate()
            .flat_map(|(lane_idx, lane)| {
                lane.iter()
                    .filter(|id| vehicles[*id].x() > length)
                    .map(move |id| (id, lane_idx))
            })
            .collect();
        for (id, lane) in exited {
            road.remove_vehicle(id, lane);
            vehicles.remove(id);
            log::trace!("vehicle {:?} exited past road end", id);
        }
    }

    fn attempt_spawn(
        &mut self,
        road: &mut Road,
        vehicles: &mut VehicleSet,
        rng: &mut impl Rng,
        params: &SimulationParams,
    ) {
        if road.lane_count() == 0 {
            return;
        }
        let lane_index = pick_lane(road.lane_count(), rng);

        // The entrance-closest vehicle must leave room for a new one at x = 0.
        let entrance_gap = params.minimum_gap + params.vehicle_length;
        if let Some(last) = road.lane(lane_index).last() {
            if vehicles[last].x() < entrance_gap {
                return;
            }
        }

        let desired_speed = sample_desired_speed(rng, params);
        let id = vehicles.insert_with_key(|id| {
            Vehicle::new(
                id,
                &VehicleAttributes {
                    x: 0.0,
                    speed: desired_speed,
                    desired_speed,
                    length: params.vehicle_length,
                },
                VehicleLocation::MainRoad(lane_index),
            )
        });
        road.insert_vehicle(vehicles, id, lane_index);
        log::debug!(
            "spawned vehicle {:?} in lane {} at {:.1} m/s",
            id,
            lane_index,
            desired_speed
        );
    }
}

/// Picks an entrance lane, weighted towards higher indices
/// (lane i has weight i + 1).
fn pick_lane(lane_count: usize, rng: &mut impl Rng) -> usize {
    WeightedIndex::new((0..lane_count).map(|i| i + 1))
        .map(|distr| distr.sample(rng))
        .unwrap_or(0)
}

/// Samples a desired speed from a normal distribution around the configured
/// mean with a 10% standard deviation, floored at 1 m/s.
pub(crate) fn sample_desired_speed(rng: &mut impl Rng, params: &SimulationParams) -> f64 {
    Normal::new(params.desired_speed, 0.1 * params.desired_speed)
        .map(|distr| distr.sample(rng))
        .unwrap_or(params.desired_speed)
        .max(1.0)
}
