use crate::factory::VehicleFactory;
use crate::incident::{Incident, IncidentConfig, IncidentManager};
use crate::model::{idm, mobil, LaneChangeContext};
use crate::obstacle::Obstacle;
use crate::params::{ParamsPatch, SimulationParams};
use crate::ramp::OnRamp;
use crate::road::Road;
use crate::vehicle::{RampGeometry, Vehicle, VehicleAttributes, VehicleLocation, VehicleState};
use crate::{RampId, VehicleId, VehicleSet};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use slotmap::SlotMap;

/// The accumulator cap in s, guarding against runaway catch-up after a stall.
const MAX_ACCUMULATED_TIME: f64 = 0.5;

/// A freeway traffic simulation.
///
/// Owns the road, the vehicle arena, the on-ramps and the incidents, and
/// advances them all on a fixed simulated timestep. Single-threaded and
/// step-synchronous: the caller paces the simulation by calling
/// [`update`](Self::update) or [`step`](Self::step).
pub struct Simulation {
    /// The global parameter bundle.
    params: SimulationParams,
    /// The main carriageway.
    road: Road,
    /// The on-ramps attached to the road.
    ramps: SlotMap<RampId, OnRamp>,
    /// The vehicles being simulated.
    vehicles: VehicleSet,
    /// The entrance spawner and exit despawner.
    factory: VehicleFactory,
    /// The active incidents.
    incidents: IncidentManager,
    /// The elapsed simulated time in s.
    simulation_time: f64,
    /// Simulated time not yet consumed by whole steps, in s.
    accumulator: f64,
    /// The number of lane changes executed so far.
    lane_changes: u64,
    /// The random source for spawn sampling and the per-tick shuffle.
    rng: StdRng,
}

/// A read-only snapshot of the simulation.
#[derive(Clone, Debug, Serialize)]
pub struct SimulationState {
    /// Every main-road and ramp-resident vehicle.
    pub vehicles: Vec<VehicleState>,
    /// The elapsed simulated time in s.
    pub simulation_time: f64,
}

impl Simulation {
    /// Creates a new simulation with the default topology:
    /// one on-ramp merging at a third of the road length.
    pub fn new(params: SimulationParams) -> Self {
        Self::from_rng(params, StdRng::from_entropy())
    }

    /// Creates a simulation with a seeded random source, for reproducible
    /// runs and property tests.
    pub fn with_seed(params: SimulationParams, seed: u64) -> Self {
        Self::from_rng(params, StdRng::seed_from_u64(seed))
    }

    fn from_rng(params: SimulationParams, rng: StdRng) -> Self {
        let mut sim = Self {
            params,
            road: Road::new(params.road_length, params.lane_count),
            ramps: SlotMap::with_key(),
            vehicles: VehicleSet::default(),
            factory: VehicleFactory::new(),
            incidents: IncidentManager::new(),
            simulation_time: 0.0,
            accumulator: 0.0,
            lane_changes: 0,
            rng,
        };
        sim.ramps.insert(OnRamp::new((params.road_length / 3.0).round()));
        sim
    }

    /// Advances the simulation by a wall-clock delta in milliseconds,
    /// scaled by the speed multiplier and consumed in whole fixed steps.
    /// Remaining time is carried in an accumulator capped at 0.5 s.
    pub fn update(&mut self, wall_delta_ms: f64) {
        let dt = self.params.dt;
        self.accumulator += (wall_delta_ms / 1000.0) * self.params.speed_multiplier;
        if self.accumulator > MAX_ACCUMULATED_TIME {
            self.accumulator = MAX_ACCUMULATED_TIME;
        }
        while self.accumulator >= dt {
            self.step(dt);
            self.accumulator -= dt;
        }
    }

    /// Advances the simulation by exactly one tick of `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        // 1. Entrance spawning.
        self.factory.try_spawn(
            dt,
            &mut self.road,
            &mut self.vehicles,
            &mut self.rng,
            &self.params,
        );

        // 2. Car following towards each vehicle's effective leader.
        self.apply_accelerations();

        // 3. Discretionary lane changes.
        self.apply_lane_changes();

        // 4. Integration.
        for (_, vehicle) in &mut self.vehicles {
            if vehicle.location().is_main_road() {
                vehicle.integrate(dt);
            }
        }

        // 5. Restore the per-lane sort invariant.
        self.road.resort_all(&self.vehicles);

        // 6. Despawn vehicles past the road end.
        self.factory.despawn(&mut self.road, &mut self.vehicles);

        // 7. On-ramp spawning and merging.
        let ramp_ids: Vec<RampId> = self.ramps.keys().collect();
        for ramp_id in ramp_ids {
            let ramp = &mut self.ramps[ramp_id];
            ramp.try_spawn(dt, &mut self.vehicles, &mut self.rng, &self.params, ramp_id);
            ramp.step_vehicles(dt, &mut self.road, &mut self.vehicles, &self.params);
        }

        // 8. Expire incidents against the time about to be advanced.
        self.incidents.update(self.simulation_time);

        // 9. Advance simulated time.
        self.simulation_time += dt;
    }

    /// Car following: every main-road vehicle follows the nearer of its
    /// real in-lane leader and any incident ghost, with its desired speed
    /// scaled by the rubbernecking factor.
    fn apply_accelerations(&mut self) {
        for lane in self.road.lanes() {
            for id in lane.iter() {
                let vehicle = &self.vehicles[id];
                let leader = self.effective_leader(id);
                let speed_factor = self.incidents.speed_reduction(vehicle);
                vehicle.set_acceleration(idm::acceleration(
                    vehicle,
                    leader.as_ref(),
                    &self.params,
                    speed_factor,
                ));
            }
        }
    }

    /// Lane changing: one MOBIL pass over all main-road vehicles in an
    /// order re-shuffled each tick to avoid systematic directional bias.
    /// Accepted changes are executed immediately, so later evaluations in
    /// the same pass see the updated lane membership.
    fn apply_lane_changes(&mut self) {
        let mut order: Vec<VehicleId> = self.road.iter_vehicle_ids().collect();
        order.shuffle(&mut self.rng);
        let blocked = self.incidents.blocked_lanes();

        for id in order {
            let vehicle = &self.vehicles[id];
            let ghost = self.incidents.virtual_obstacle(vehicle);
            let leader = Obstacle::nearer(self.real_leader(id), ghost);
            let ctx = LaneChangeContext {
                blocked_lanes: &blocked,
                incident_ahead: ghost.is_some(),
            };
            let decision = mobil::evaluate_lane_change(
                vehicle,
                leader.as_ref(),
                &self.road,
                &self.vehicles,
                &self.params,
                &ctx,
            );
            if let Some(target_lane) = decision {
                log::debug!("vehicle {:?} changes to lane {}", id, target_lane);
                self.road.change_lane(&mut self.vehicles, id, target_lane);
                self.lane_changes += 1;
            }
        }
    }

    /// The vehicle's real in-lane leader as an obstacle.
    fn real_leader(&self, id: VehicleId) -> Option<Obstacle> {
        self.road
            .leader_of(&self.vehicles, id)
            .map(|leader| Obstacle::from_vehicle(&self.vehicles[leader]))
    }

    /// The nearer of the vehicle's real leader and any incident ghost.
    fn effective_leader(&self, id: VehicleId) -> Option<Obstacle> {
        let ghost = self.incidents.virtual_obstacle(&self.vehicles[id]);
        Obstacle::nearer(self.real_leader(id), ghost)
    }

    /// Adds a vehicle to a main-road lane.
    pub fn add_vehicle(&mut self, attributes: &VehicleAttributes, lane: usize) -> VehicleId {
        let id = self
            .vehicles
            .insert_with_key(|id| Vehicle::new(id, attributes, VehicleLocation::MainRoad(lane)));
        self.road.insert_vehicle(&self.vehicles, id, lane);
        id
    }

    /// Adds a vehicle to an on-ramp's acceleration lane.
    pub fn add_ramp_vehicle(&mut self, ramp: RampId, attributes: &VehicleAttributes) -> VehicleId {
        let id = self
            .vehicles
            .insert_with_key(|id| Vehicle::new(id, attributes, VehicleLocation::Ramp(ramp)));
        self.ramps[ramp].insert_vehicle(&self.vehicles, id);
        id
    }

    /// Attaches an on-ramp to the road.
    pub fn add_on_ramp(&mut self, ramp: OnRamp) -> RampId {
        self.ramps.insert(ramp)
    }

    /// Enables or disables an on-ramp.
    pub fn set_ramp_enabled(&mut self, ramp: RampId, enabled: bool) {
        if let Some(ramp) = self.ramps.get_mut(ramp) {
            ramp.set_enabled(enabled);
        }
    }

    /// Registers an incident and returns a snapshot of it, including the
    /// derived rubbernecking radius.
    pub fn add_incident(&mut self, config: IncidentConfig) -> Incident {
        self.incidents.add(config)
    }

    /// Removes the incident with the given ID. No-op if it is absent.
    pub fn remove_incident(&mut self, id: u64) {
        self.incidents.remove(id);
    }

    /// Snapshots every main-road and ramp-resident vehicle into a flat
    /// read-only list. Ramp entries carry the ramp geometry for the
    /// rendering collaborator.
    pub fn state(&self) -> SimulationState {
        let mut vehicles: Vec<VehicleState> = self
            .road
            .iter_vehicle_ids()
            .map(|id| self.vehicles[id].state(None))
            .collect();
        for (_, ramp) in &self.ramps {
            let geometry = RampGeometry {
                start_x: ramp.start_x(),
                end_x: ramp.end_x(),
                lane_count: self.road.lane_count(),
            };
            vehicles.extend(
                ramp.lane()
                    .iter()
                    .map(|id| self.vehicles[id].state(Some(geometry))),
            );
        }
        SimulationState {
            vehicles,
            simulation_time: self.simulation_time,
        }
    }

    /// Discards all vehicles, ramps and incidents and rebuilds the default
    /// topology, applying any structural parameter changes made since the
    /// last reset. The random source keeps its stream.
    pub fn reset(&mut self) {
        self.road = Road::new(self.params.road_length, self.params.lane_count);
        self.ramps = SlotMap::with_key();
        self.ramps
            .insert(OnRamp::new((self.params.road_length / 3.0).round()));
        self.vehicles = VehicleSet::default();
        self.factory = VehicleFactory::new();
        self.incidents = IncidentManager::new();
        self.simulation_time = 0.0;
        self.accumulator = 0.0;
        self.lane_changes = 0;
    }

    /// Shallow-merges a partial parameter set into the live configuration.
    /// Structural parameters (`lane_count`, `road_length`) only take
    /// effect on the next [`reset`](Self::reset).
    pub fn set_params(&mut self, patch: &ParamsPatch) {
        self.params.apply(patch);
    }

    /// The current parameter bundle.
    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// The elapsed simulated time in s.
    pub fn simulation_time(&self) -> f64 {
        self.simulation_time
    }

    /// The number of lane changes executed since construction or the last
    /// reset.
    pub fn lane_change_count(&self) -> u64 {
        self.lane_changes
    }

    /// The currently active incidents.
    pub fn incidents(&self) -> &[Incident] {
        self.incidents.active()
    }

    /// The main carriageway.
    pub fn road(&self) -> &Road {
        &self.road
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn get_vehicle(&self, id: VehicleId) -> &Vehicle {
        &self.vehicles[id]
    }

    /// Returns an iterator over all the vehicles in the simulation.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Returns an iterator over the on-ramps and their IDs.
    pub fn iter_ramps(&self) -> impl Iterator<Item = (RampId, &OnRamp)> {
        self.ramps.iter()
    }
}
