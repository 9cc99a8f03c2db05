use crate::lane::Lane;
use crate::vehicle::VehicleLocation;
use crate::{VehicleId, VehicleSet};

/// The main carriageway: a fixed set of lanes of a fixed length.
#[derive(Clone, Debug)]
pub struct Road {
    /// The road length in m.
    length: f64,
    /// The lanes, indexed left to right.
    lanes: Vec<Lane>,
}

/// The tightest neighbours around a position in a target lane.
#[derive(Clone, Copy, Debug, Default)]
pub struct Neighbors {
    /// The nearest vehicle at or ahead of the position.
    pub leader: Option<VehicleId>,
    /// The nearest vehicle behind the position.
    pub follower: Option<VehicleId>,
}

impl Road {
    /// Creates a road with the given length and lane count.
    pub fn new(length: f64, lane_count: usize) -> Self {
        Self {
            length,
            lanes: (0..lane_count).map(|_| Lane::new()).collect(),
        }
    }

    /// The road length in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The number of lanes.
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Gets a lane by index.
    pub fn lane(&self, index: usize) -> &Lane {
        &self.lanes[index]
    }

    /// Iterates all lanes, leftmost first.
    pub fn lanes(&self) -> impl Iterator<Item = &Lane> {
        self.lanes.iter()
    }

    /// Iterates the IDs of every vehicle on the main road.
    pub fn iter_vehicle_ids(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.lanes.iter().flat_map(|lane| lane.iter())
    }

    /// Gets the vehicle immediately ahead of the given one in its own lane.
    pub fn leader_of(&self, vehicles: &VehicleSet, id: VehicleId) -> Option<VehicleId> {
        let lane = vehicles[id].lane_index()?;
        self.lanes[lane].leader_of(id)
    }

    /// Gets the vehicle immediately behind the given one in its own lane.
    pub fn follower_of(&self, vehicles: &VehicleSet, id: VehicleId) -> Option<VehicleId> {
        let lane = vehicles[id].lane_index()?;
        self.lanes[lane].follower_of(id)
    }

    /// Finds the tightest leader and follower around position `x` in the
    /// target lane, in a single scan. An out-of-range lane yields no
    /// neighbours.
    pub fn neighbors(&self, vehicles: &VehicleSet, x: f64, target_lane: usize) -> Neighbors {
        let Some(lane) = self.lanes.get(target_lane) else {
            return Neighbors::default();
        };
        let mut neighbors = Neighbors::default();
        for id in lane.iter() {
            if vehicles[id].x() >= x {
                neighbors.leader = Some(id);
            } else {
                neighbors.follower = Some(id);
                break;
            }
        }
        neighbors
    }

    /// Atomically transfers a vehicle to the target lane: removed from its
    /// source lane, retagged, inserted in sorted position. This is the only
    /// place ownership of a vehicle moves between main-road lanes.
    /// No-op for an out-of-range target or a ramp-resident vehicle.
    pub(crate) fn change_lane(&mut self, vehicles: &mut VehicleSet, id: VehicleId, target_lane: usize) {
        if target_lane >= self.lanes.len() {
            return;
        }
        let Some(source) = vehicles[id].lane_index() else {
            return;
        };
        self.lanes[source].remove(id);
        vehicles[id].set_location(VehicleLocation::MainRoad(target_lane));
        self.lanes[target_lane].insert(vehicles, id);
    }

    /// Inserts a vehicle already tagged for `lane` into that lane.
    pub(crate) fn insert_vehicle(&mut self, vehicles: &VehicleSet, id: VehicleId, lane: usize) {
        self.lanes[lane].insert(vehicles, id);
    }

    /// Removes a vehicle from the given lane.
    pub(crate) fn remove_vehicle(&mut self, id: VehicleId, lane: usize) {
        self.lanes[lane].remove(id);
    }

    /// Re-establishes the sort invariant on every lane.
    pub(crate) fn resort_all(&mut self, vehicles: &VehicleSet) {
        for lane in &mut self.lanes {
            lane.resort(vehicles);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vehicle::{Vehicle, VehicleAttributes};

    fn add(vehicles: &mut VehicleSet, road: &mut Road, x: f64, lane: usize) -> VehicleId {
        let id = vehicles.insert_with_key(|id| {
            Vehicle::new(
                id,
                &VehicleAttributes {
                    x,
                    speed: 20.0,
                    desired_speed: 33.3,
                    length: 5.0,
                },
                VehicleLocation::MainRoad(lane),
            )
        });
        road.insert_vehicle(vehicles, id, lane);
        id
    }

    #[test]
    fn neighbors_finds_tightest_pair() {
        let mut vehicles = VehicleSet::default();
        let mut road = Road::new(2000.0, 2);
        add(&mut vehicles, &mut road, 300.0, 1);
        let leader = add(&mut vehicles, &mut road, 150.0, 1);
        let follower = add(&mut vehicles, &mut road, 90.0, 1);
        add(&mut vehicles, &mut road, 20.0, 1);

        let n = road.neighbors(&vehicles, 100.0, 1);
        assert_eq!(n.leader, Some(leader));
        assert_eq!(n.follower, Some(follower));
    }

    #[test]
    fn neighbors_out_of_range_lane_is_empty() {
        let vehicles = VehicleSet::default();
        let road = Road::new(2000.0, 2);
        let n = road.neighbors(&vehicles, 100.0, 5);
        assert!(n.leader.is_none());
        assert!(n.follower.is_none());
    }

    #[test]
    fn change_lane_moves_ownership_once() {
        let mut vehicles = VehicleSet::default();
        let mut road = Road::new(2000.0, 2);
        let id = add(&mut vehicles, &mut road, 100.0, 0);

        road.change_lane(&mut vehicles, id, 1);
        assert_eq!(road.lane(0).len(), 0);
        assert_eq!(road.lane(1).len(), 1);
        assert_eq!(vehicles[id].lane_index(), Some(1));

        // Out-of-range target is a no-op.
        road.change_lane(&mut vehicles, id, 7);
        assert_eq!(vehicles[id].lane_index(), Some(1));
        assert_eq!(road.lane(1).len(), 1);
    }
}
