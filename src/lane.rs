use crate::{VehicleId, VehicleSet};

/// An ordered container of the vehicles travelling along one lane.
///
/// Vehicles are kept strictly descending by position, front of the lane
/// first. The ordering is only allowed to lapse transiently between a
/// position update and the next [`resort`](Self::resort) call.
#[derive(Clone, Debug, Default)]
pub struct Lane {
    /// The vehicles on the lane, descending by position.
    vehicles: Vec<VehicleId>,
}

impl Lane {
    /// Creates an empty lane.
    pub fn new() -> Self {
        Default::default()
    }

    /// The number of vehicles on the lane.
    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    /// Whether the lane is empty.
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// Iterates the vehicles on the lane in descending position order.
    pub fn iter(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.vehicles.iter().copied()
    }

    /// The vehicle closest to the start of the lane, if any.
    pub fn last(&self) -> Option<VehicleId> {
        self.vehicles.last().copied()
    }

    /// Inserts the vehicle with the given ID, preserving descending order.
    /// Insertion is positional and not necessarily stable for ties.
    pub(crate) fn insert(&mut self, vehicles: &VehicleSet, id: VehicleId) {
        let x = vehicles[id].x();
        let idx = self
            .vehicles
            .iter()
            .position(|other| vehicles[*other].x() <= x)
            .unwrap_or(self.vehicles.len());
        self.vehicles.insert(idx, id);
    }

    /// Removes the vehicle with the given ID. No-op if it is absent.
    pub(crate) fn remove(&mut self, id: VehicleId) {
        if let Some(idx) = self.vehicles.iter().position(|other| *other == id) {
            self.vehicles.remove(idx);
        }
    }

    /// Gets the vehicle immediately ahead of the given one, if any.
    pub fn leader_of(&self, id: VehicleId) -> Option<VehicleId> {
        let idx = self.vehicles.iter().position(|other| *other == id)?;
        idx.checked_sub(1).map(|idx| self.vehicles[idx])
    }

    /// Gets the vehicle immediately behind the given one, if any.
    pub fn follower_of(&self, id: VehicleId) -> Option<VehicleId> {
        let idx = self.vehicles.iter().position(|other| *other == id)?;
        self.vehicles.get(idx + 1).copied()
    }

    /// Gets the nearest vehicle with a position strictly greater than `x`.
    pub fn vehicle_ahead(&self, vehicles: &VehicleSet, x: f64) -> Option<VehicleId> {
        self.vehicles
            .iter()
            .rev()
            .find(|id| vehicles[**id].x() > x)
            .copied()
    }

    /// Re-establishes the descending-position invariant after positions
    /// have been mutated. Insertion sort, since one tick only moves each
    /// vehicle a small bounded distance and the lane stays nearly sorted.
    pub(crate) fn resort(&mut self, vehicles: &VehicleSet) {
        for i in 1..self.vehicles.len() {
            let current = self.vehicles[i];
            let x = vehicles[current].x();
            let mut j = i;
            while j > 0 && vehicles[self.vehicles[j - 1]].x() < x {
                self.vehicles[j] = self.vehicles[j - 1];
                j -= 1;
            }
            self.vehicles[j] = current;
        }
    }

    /// Whether the lane's vehicles are strictly descending by position.
    pub fn is_sorted(&self, vehicles: &VehicleSet) -> bool {
        use itertools::Itertools;
        self.vehicles
            .iter()
            .tuple_windows()
            .all(|(front, rear)| vehicles[*front].x() > vehicles[*rear].x())
    }
}
