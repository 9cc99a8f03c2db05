use crate::obstacle::Obstacle;
use crate::util::Interval;
use crate::vehicle::Vehicle;
use serde::Deserialize;
use smallvec::SmallVec;

/// The rubbernecking radius at severity 0, in m.
const RUBBERNECK_RADIUS_BASE: f64 = 50.0;

/// Additional rubbernecking radius at full severity, in m.
const RUBBERNECK_RADIUS_SPAN: f64 = 100.0;

/// A transient lane blockage on the road.
#[derive(Clone, Debug)]
pub struct Incident {
    /// The caller-supplied incident ID.
    pub id: u64,
    /// The longitudinal position of the incident in m.
    pub position_x: f64,
    /// The main-road lanes blocked by the incident.
    pub lanes_blocked: SmallVec<[usize; 4]>,
    /// The incident severity in [0, 1].
    pub severity: f64,
    /// The simulation time at which the incident started, in s.
    pub start_time: f64,
    /// How long the incident lasts, in s. `None` means it persists until
    /// explicitly removed.
    pub duration: Option<f64>,
    /// The speed factor applied at the incident position, in [0.5, 1.0].
    pub rubbernecking_factor: f64,
    /// How far the rubbernecking effect reaches, in m. Derived from the
    /// severity; grows monotonically with it.
    pub rubbernecking_radius: f64,
}

/// The caller-supplied description of an incident.
#[derive(Clone, Debug, Deserialize)]
pub struct IncidentConfig {
    pub id: u64,
    pub position_x: f64,
    pub lanes_blocked: Vec<usize>,
    pub severity: f64,
    pub start_time: f64,
    /// `None` requests an incident that lasts until manual removal.
    pub duration: Option<f64>,
    pub rubbernecking_factor: f64,
}

impl Incident {
    /// Creates an incident from its configuration, deriving the
    /// rubbernecking radius from the severity.
    pub fn new(config: IncidentConfig) -> Self {
        Self {
            id: config.id,
            position_x: config.position_x,
            lanes_blocked: config.lanes_blocked.into_iter().collect(),
            severity: config.severity,
            start_time: config.start_time,
            duration: config.duration,
            rubbernecking_factor: config.rubbernecking_factor,
            rubbernecking_radius: RUBBERNECK_RADIUS_BASE + RUBBERNECK_RADIUS_SPAN * config.severity,
        }
    }

    /// Whether the incident has run its course at time `t`.
    /// Manual-removal incidents never expire.
    pub fn is_expired(&self, t: f64) -> bool {
        match self.duration {
            Some(duration) => t >= self.start_time + duration,
            None => false,
        }
    }

    /// Whether the incident blocks the given main-road lane.
    pub fn blocks_lane(&self, lane: usize) -> bool {
        self.lanes_blocked.contains(&lane)
    }

    /// Whether the incident blocks a lane adjacent to the given one.
    fn blocks_adjacent_lane(&self, lane: usize) -> bool {
        self.lanes_blocked.iter().any(|blocked| blocked.abs_diff(lane) == 1)
    }
}

/// Owns the active incidents and answers the per-vehicle incident queries.
#[derive(Clone, Debug, Default)]
pub struct IncidentManager {
    incidents: Vec<Incident>,
}

impl IncidentManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds an incident and returns a snapshot of it, including the
    /// derived rubbernecking radius.
    pub fn add(&mut self, config: IncidentConfig) -> Incident {
        let incident = Incident::new(config);
        log::debug!(
            "incident {} at {:.0} m blocking lanes {:?}",
            incident.id,
            incident.position_x,
            incident.lanes_blocked
        );
        self.incidents.push(incident.clone());
        incident
    }

    /// Removes the incident with the given ID. No-op if it is absent.
    pub fn remove(&mut self, id: u64) {
        self.incidents.retain(|incident| incident.id != id);
    }

    /// The currently active incidents.
    pub fn active(&self) -> &[Incident] {
        &self.incidents
    }

    /// Evicts incidents that have expired by time `t`.
    pub fn update(&mut self, t: f64) {
        self.incidents.retain(|incident| {
            let expired = incident.is_expired(t);
            if expired {
                log::debug!("incident {} expired at t={:.1}", incident.id, t);
            }
            !expired
        });
    }

    /// The union of all lanes blocked by active incidents.
    pub fn blocked_lanes(&self) -> SmallVec<[usize; 8]> {
        let mut lanes: SmallVec<[usize; 8]> = SmallVec::new();
        for incident in &self.incidents {
            for lane in &incident.lanes_blocked {
                if !lanes.contains(lane) {
                    lanes.push(*lane);
                }
            }
        }
        lanes
    }

    /// If the vehicle's lane is blocked by an incident strictly ahead,
    /// returns the nearest one as a stopped, zero-length ghost obstacle,
    /// so the car-following law treats it exactly like a stopped leader.
    pub fn virtual_obstacle(&self, vehicle: &Vehicle) -> Option<Obstacle> {
        let lane = vehicle.lane_index()?;
        self.incidents
            .iter()
            .filter(|incident| incident.blocks_lane(lane))
            .filter(|incident| incident.position_x > vehicle.x())
            .min_by(|a, b| a.position_x.total_cmp(&b.position_x))
            .map(|incident| Obstacle::stationary(incident.position_x))
    }

    /// The rubbernecking speed factor for a vehicle passing incidents in
    /// adjacent lanes: interpolates from the incident's factor at its
    /// position to 1.0 at the radius edge, taking the most restrictive
    /// across qualifying incidents. 1.0 when none apply.
    pub fn speed_reduction(&self, vehicle: &Vehicle) -> f64 {
        let Some(lane) = vehicle.lane_index() else {
            return 1.0;
        };
        let mut factor: f64 = 1.0;
        for incident in &self.incidents {
            // Rubbernecking only applies outside the blocked lanes.
            if incident.blocks_lane(lane) || !incident.blocks_adjacent_lane(lane) {
                continue;
            }
            let span = Interval::disc(incident.position_x, incident.rubbernecking_radius);
            if !span.contains(vehicle.x()) {
                continue;
            }
            let t = (vehicle.x() - incident.position_x).abs() / incident.rubbernecking_radius;
            factor = factor.min(Interval::new(incident.rubbernecking_factor, 1.0).lerp(t));
        }
        factor
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vehicle::{VehicleAttributes, VehicleLocation};
    use crate::VehicleSet;
    use assert_approx_eq::assert_approx_eq;

    fn config(id: u64) -> IncidentConfig {
        IncidentConfig {
            id,
            position_x: 500.0,
            lanes_blocked: vec![1],
            severity: 0.5,
            start_time: 0.0,
            duration: Some(60.0),
            rubbernecking_factor: 0.6,
        }
    }

    fn vehicle(vehicles: &mut VehicleSet, x: f64, lane: usize) -> Vehicle {
        let id = vehicles.insert_with_key(|id| {
            Vehicle::new(
                id,
                &VehicleAttributes {
                    x,
                    speed: 30.0,
                    desired_speed: 33.3,
                    length: 5.0,
                },
                VehicleLocation::MainRoad(lane),
            )
        });
        vehicles[id].clone()
    }

    #[test]
    fn ghost_obstacle_appears_only_upstream_in_blocked_lanes() {
        let mut vehicles = VehicleSet::default();
        let mut mgr = IncidentManager::new();
        mgr.add(config(1));

        let upstream = vehicle(&mut vehicles, 400.0, 1);
        let obstacle = mgr.virtual_obstacle(&upstream).unwrap();
        assert_approx_eq!(obstacle.pos, 500.0);
        assert_approx_eq!(obstacle.vel, 0.0);
        assert_approx_eq!(obstacle.length, 0.0);

        let downstream = vehicle(&mut vehicles, 600.0, 1);
        assert!(mgr.virtual_obstacle(&downstream).is_none());

        let other_lane = vehicle(&mut vehicles, 400.0, 0);
        assert!(mgr.virtual_obstacle(&other_lane).is_none());
    }

    #[test]
    fn nearest_of_several_incidents_wins() {
        let mut vehicles = VehicleSet::default();
        let mut mgr = IncidentManager::new();
        mgr.add(IncidentConfig {
            position_x: 600.0,
            ..config(1)
        });
        mgr.add(IncidentConfig {
            position_x: 500.0,
            ..config(2)
        });

        let subject = vehicle(&mut vehicles, 400.0, 1);
        assert_approx_eq!(mgr.virtual_obstacle(&subject).unwrap().pos, 500.0);
    }

    #[test]
    fn rubbernecking_profile_across_the_radius() {
        let mut vehicles = VehicleSet::default();
        let mut mgr = IncidentManager::new();
        let incident = mgr.add(config(1));

        // Exactly the configured factor at the incident position.
        let at = vehicle(&mut vehicles, 500.0, 0);
        assert_approx_eq!(mgr.speed_reduction(&at), 0.6);

        // Tends to 1.0 towards the radius edge.
        let near_edge = vehicle(&mut vehicles, 500.0 + incident.rubbernecking_radius - 1.0, 0);
        let factor = mgr.speed_reduction(&near_edge);
        assert!(factor > 0.99 && factor < 1.0);

        // Exactly 1.0 beyond the radius.
        let beyond = vehicle(&mut vehicles, 500.0 + incident.rubbernecking_radius + 50.0, 0);
        assert_approx_eq!(mgr.speed_reduction(&beyond), 1.0);

        // Non-adjacent lanes are unaffected.
        let mut mgr2 = IncidentManager::new();
        mgr2.add(IncidentConfig {
            lanes_blocked: vec![0],
            ..config(2)
        });
        let far_lane = vehicle(&mut vehicles, 500.0, 2);
        assert_approx_eq!(mgr2.speed_reduction(&far_lane), 1.0);
    }

    #[test]
    fn most_restrictive_factor_wins() {
        let mut vehicles = VehicleSet::default();
        let mut mgr = IncidentManager::new();
        mgr.add(IncidentConfig {
            rubbernecking_factor: 0.8,
            ..config(1)
        });
        mgr.add(IncidentConfig {
            rubbernecking_factor: 0.5,
            ..config(2)
        });

        let subject = vehicle(&mut vehicles, 500.0, 0);
        assert_approx_eq!(mgr.speed_reduction(&subject), 0.5);
    }

    #[test]
    fn radius_grows_with_severity() {
        let mild = Incident::new(IncidentConfig {
            severity: 0.1,
            ..config(1)
        });
        let severe = Incident::new(IncidentConfig {
            severity: 0.9,
            ..config(2)
        });
        assert!(severe.rubbernecking_radius > mild.rubbernecking_radius);
    }

    #[test]
    fn expiry_rules() {
        let mut mgr = IncidentManager::new();
        mgr.add(config(1));
        mgr.update(59.9);
        assert_eq!(mgr.active().len(), 1);
        mgr.update(60.0);
        assert_eq!(mgr.active().len(), 0);

        // Manual-removal incidents outlive any update.
        mgr.add(IncidentConfig {
            duration: None,
            ..config(2)
        });
        mgr.update(10_000.0);
        assert_eq!(mgr.active().len(), 1);
        mgr.remove(2);
        assert_eq!(mgr.active().len(), 0);
    }

    #[test]
    fn blocked_lanes_union_is_deduplicated() {
        let mut mgr = IncidentManager::new();
        mgr.add(IncidentConfig {
            lanes_blocked: vec![0, 1],
            ..config(1)
        });
        mgr.add(IncidentConfig {
            lanes_blocked: vec![1, 2],
            ..config(2)
        });
        let lanes = mgr.blocked_lanes();
        assert_eq!(lanes.as_slice(), &[0, 1, 2]);
    }
}
