//! The Intelligent Driver Model car-following law.

use crate::obstacle::Obstacle;
use crate::params::SimulationParams;
use crate::vehicle::Vehicle;

/// The minimum gap used as the interaction denominator, in m.
/// Prevents the interaction term from exploding at near-zero clearance.
const GAP_FLOOR: f64 = 0.1;

/// Computes the IDM acceleration for a vehicle with the given kinematics.
///
/// # Parameters
/// * `speed` - The subject's current speed in m/s.
/// * `desired_speed` - The subject's desired speed v0 in m/s.
/// * `gap` - The bumper-to-bumper gap to the leader in m; infinite if there is no leader.
/// * `leader_speed` - The leader's speed in m/s.
/// * `speed_factor` - Scales v0 down for rubbernecking; 1.0 means no reduction.
pub fn idm_acceleration(
    speed: f64,
    desired_speed: f64,
    gap: f64,
    leader_speed: f64,
    params: &SimulationParams,
    speed_factor: f64,
) -> f64 {
    let a = params.max_acceleration;
    let b = params.comfort_deceleration;
    let v0 = desired_speed * speed_factor;

    let free_road = 1.0 - (speed / v0).powi(4);
    if !gap.is_finite() {
        return a * free_road;
    }

    let delta_v = speed - leader_speed;
    let desired_gap = params.minimum_gap
        + f64::max(
            0.0,
            speed * params.time_headway + speed * delta_v / (2.0 * (a * b).sqrt()),
        );
    let interaction = (desired_gap / f64::max(gap, GAP_FLOOR)).powi(2);

    a * (free_road - interaction)
}

/// Computes the IDM acceleration of a vehicle towards an optional obstacle,
/// which may be a real leader or an incident's ghost vehicle. No obstacle
/// means pure free-road behaviour.
pub fn acceleration(
    vehicle: &Vehicle,
    leader: Option<&Obstacle>,
    params: &SimulationParams,
    speed_factor: f64,
) -> f64 {
    match leader {
        None => idm_acceleration(
            vehicle.speed(),
            vehicle.desired_speed(),
            f64::INFINITY,
            0.0,
            params,
            speed_factor,
        ),
        Some(leader) => idm_acceleration(
            vehicle.speed(),
            vehicle.desired_speed(),
            leader.rear() - vehicle.x(),
            leader.vel,
            params,
            speed_factor,
        ),
    }
}
