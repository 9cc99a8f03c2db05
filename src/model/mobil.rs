//! The MOBIL discretionary lane-change law.

use super::idm;
use crate::obstacle::Obstacle;
use crate::params::SimulationParams;
use crate::road::Road;
use crate::vehicle::Vehicle;
use crate::VehicleSet;
use smallvec::SmallVec;

/// Gain bonus applied to every candidate when the subject's own lane is
/// obstructed ahead by an incident, biasing it towards any lane that
/// passes the safety criterion, in m/s^2.
const INCIDENT_ESCAPE_BONUS: f64 = 2.0;

/// Per-tick context the engine supplies to the lane-change evaluation.
#[derive(Clone, Copy, Debug, Default)]
pub struct LaneChangeContext<'a> {
    /// Lanes currently blocked by incidents; never chosen as targets.
    pub blocked_lanes: &'a [usize],
    /// Whether an incident obstructs the subject's own lane ahead.
    pub incident_ahead: bool,
}

/// Evaluates whether a vehicle should change lanes.
///
/// For each in-range, unblocked adjacent lane:
/// 1. Safety: the prospective new follower must not be forced below
///    `-safe_deceleration` with the subject as its new leader.
/// 2. Incentive: the subject's acceleration gain, less the politeness-weighted
///    disadvantage imposed on the new follower, must exceed the changing
///    threshold.
///
/// Returns the target lane with the strictly greatest qualifying gain;
/// ties or no qualifying candidate leave the vehicle in place.
pub fn evaluate_lane_change(
    subject: &Vehicle,
    current_leader: Option<&Obstacle>,
    road: &Road,
    vehicles: &VehicleSet,
    params: &SimulationParams,
    ctx: &LaneChangeContext,
) -> Option<usize> {
    let current_lane = subject.lane_index()?;
    let current_acc = idm::acceleration(subject, current_leader, params, 1.0);

    let candidates: SmallVec<[usize; 2]> = [
        current_lane.checked_sub(1),
        Some(current_lane + 1).filter(|lane| *lane < road.lane_count()),
    ]
    .into_iter()
    .flatten()
    .filter(|lane| !ctx.blocked_lanes.contains(lane))
    .collect();

    let mut best: Option<(usize, f64)> = None;
    let mut tied = false;

    for target_lane in candidates {
        let neighbors = road.neighbors(vehicles, subject.x(), target_lane);
        let new_leader = neighbors
            .leader
            .map(|id| Obstacle::from_vehicle(&vehicles[id]));

        // Safety: would the new follower have to brake too hard?
        let (follower_before, follower_after) = match neighbors.follower {
            Some(id) => {
                let follower = &vehicles[id];
                let after = idm::acceleration(
                    follower,
                    Some(&Obstacle::from_vehicle(subject)),
                    params,
                    1.0,
                );
                if after < -params.safe_deceleration {
                    continue;
                }
                let before = idm::acceleration(follower, new_leader.as_ref(), params, 1.0);
                (before, after)
            }
            None => (0.0, 0.0),
        };

        let new_acc = idm::acceleration(subject, new_leader.as_ref(), params, 1.0);
        let mut gain =
            new_acc - current_acc - params.politeness_factor * (follower_before - follower_after);
        if ctx.incident_ahead {
            gain += INCIDENT_ESCAPE_BONUS;
        }

        if gain <= params.changing_threshold {
            continue;
        }
        match best {
            None => best = Some((target_lane, gain)),
            Some((_, best_gain)) if gain > best_gain => {
                best = Some((target_lane, gain));
                tied = false;
            }
            Some((_, best_gain)) if gain == best_gain => tied = true,
            Some(_) => {}
        }
    }

    if tied {
        None
    } else {
        best.map(|(lane, _)| lane)
    }
}
