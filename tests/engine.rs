//! Tests of the engine's stepping, configuration and bookkeeping contract.

use assert_approx_eq::assert_approx_eq;
use freeway_sim::{ParamsPatch, Simulation, SimulationParams, VehicleAttributes};

fn quiet_params() -> SimulationParams {
    SimulationParams {
        lane_count: 1,
        spawn_rate: 0.0,
        ..Default::default()
    }
}

fn cruiser(x: f64) -> VehicleAttributes {
    VehicleAttributes {
        x,
        speed: 20.0,
        desired_speed: 33.3,
        length: 5.0,
    }
}

/// Splitting a wall-clock delta across two updates consumes the same
/// simulated time as one combined update.
#[test]
fn accumulator_is_associative() {
    let params = quiet_params();

    let mut split = Simulation::with_seed(params, 1);
    split.add_vehicle(&cruiser(100.0), 0);
    split.update(16.0);
    split.update(17.0);

    let mut combined = Simulation::with_seed(params, 1);
    combined.add_vehicle(&cruiser(100.0), 0);
    combined.update(33.0);

    assert_approx_eq!(split.simulation_time(), combined.simulation_time(), 1e-9);
}

/// The speed multiplier dilates simulated time linearly.
#[test]
fn speed_multiplier_dilates_time() {
    let mut normal = Simulation::with_seed(quiet_params(), 1);
    let mut doubled = Simulation::with_seed(
        SimulationParams {
            speed_multiplier: 2.0,
            ..quiet_params()
        },
        1,
    );

    normal.update(100.0);
    doubled.update(100.0);

    assert_approx_eq!(doubled.simulation_time(), 2.0 * normal.simulation_time(), 1e-9);
}

/// A stalled caller does not trigger runaway catch-up stepping.
#[test]
fn accumulator_is_capped() {
    let params = quiet_params();
    let mut sim = Simulation::with_seed(params, 1);
    sim.update(10_000.0);
    // At most the 0.5 s cap worth of steps.
    assert!(sim.simulation_time() <= 0.5 + params.dt);
}

/// Reset rebuilds the default topology and discards all state.
#[test]
fn reset_clears_state() {
    let params = SimulationParams {
        spawn_rate: 2.0,
        ..Default::default()
    };
    let mut sim = Simulation::with_seed(params, 9);
    for _ in 0..200 {
        sim.step(params.dt);
    }
    assert!(!sim.state().vehicles.is_empty());
    assert!(sim.simulation_time() > 0.0);

    sim.reset();

    assert!(sim.state().vehicles.is_empty());
    assert_approx_eq!(sim.simulation_time(), 0.0);
    assert_eq!(sim.iter_ramps().count(), 1);
}

/// Parameter patches apply immediately to behavioural parameters.
#[test]
fn set_params_merges_shallowly() {
    let mut sim = Simulation::with_seed(quiet_params(), 9);
    for _ in 0..120 {
        sim.step(1.0 / 60.0);
    }
    assert!(sim.state().vehicles.is_empty());

    sim.set_params(&ParamsPatch {
        spawn_rate: Some(3.0),
        ..Default::default()
    });
    for _ in 0..120 {
        sim.step(1.0 / 60.0);
    }
    assert!(!sim.state().vehicles.is_empty());
    // Untouched parameters keep their values.
    assert_approx_eq!(sim.params().desired_speed, 33.3);
}

/// A fast vehicle boxed in behind a slow one eventually overtakes.
#[test]
fn fast_vehicle_overtakes() {
    let params = SimulationParams {
        lane_count: 2,
        spawn_rate: 0.0,
        ..Default::default()
    };
    let mut sim = Simulation::with_seed(params, 2);
    sim.add_vehicle(
        &VehicleAttributes {
            x: 200.0,
            speed: 15.0,
            desired_speed: 15.0,
            length: 5.0,
        },
        1,
    );
    let fast = sim.add_vehicle(
        &VehicleAttributes {
            x: 170.0,
            speed: 30.0,
            desired_speed: 33.3,
            length: 5.0,
        },
        1,
    );

    let mut changed = false;
    for _ in 0..300 {
        sim.step(params.dt);
        if sim.get_vehicle(fast).lane_index() == Some(0) {
            changed = true;
            break;
        }
    }
    assert!(changed);
}

/// Raising the politeness factor never increases the number of lane
/// changes over an identical scenario.
#[test]
fn politeness_suppresses_lane_changes() {
    let run = |politeness_factor: f64| {
        let params = SimulationParams {
            spawn_rate: 2.5,
            politeness_factor,
            ..Default::default()
        };
        let mut sim = Simulation::with_seed(params, 13);
        for _ in 0..1200 {
            sim.step(params.dt);
        }
        sim.lane_change_count()
    };

    let selfish = run(0.0);
    let polite = run(5.0);
    assert!(polite <= selfish, "polite {polite} > selfish {selfish}");
}

/// Two simulations with the same seed stay in lockstep.
#[test]
fn seeded_runs_are_reproducible() {
    let params = SimulationParams {
        spawn_rate: 2.0,
        ..Default::default()
    };
    let mut a = Simulation::with_seed(params, 21);
    let mut b = Simulation::with_seed(params, 21);
    for _ in 0..600 {
        a.step(params.dt);
        b.step(params.dt);
    }

    let state_a = a.state();
    let state_b = b.state();
    assert_eq!(state_a.vehicles.len(), state_b.vehicles.len());
    for (va, vb) in state_a.vehicles.iter().zip(&state_b.vehicles) {
        assert_approx_eq!(va.x, vb.x, 1e-12);
        assert_approx_eq!(va.speed, vb.speed, 1e-12);
        assert_eq!(va.lane_index, vb.lane_index);
    }
}
