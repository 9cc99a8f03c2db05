use std::time::Instant;

use freeway_sim::{ParamsPatch, Simulation, SimulationParams};

fn main() {
    let mut params = SimulationParams::default();
    if let Some(path) = std::env::args().nth(1) {
        let content = std::fs::read_to_string(&path).unwrap();
        let patch: ParamsPatch = serde_json::from_str(&content).unwrap();
        params.apply(&patch);
    }

    let mut sim = Simulation::with_seed(params, 42);

    println!("Simulating...");
    const NUM_FRAMES: u32 = 1000;
    for _ in 0..10 {
        let start = Instant::now();
        for _ in 0..NUM_FRAMES {
            sim.step(params.dt);
        }
        let frame = start.elapsed() / NUM_FRAMES;
        let state = sim.state();
        let mean_speed = state.vehicles.iter().map(|v| v.speed).sum::<f64>()
            / f64::max(state.vehicles.len() as f64, 1.0);
        println!(
            "t={:.0}s: {} vehs, avg {:.1} m/s, {} lane changes, {:?}/frame",
            state.simulation_time,
            state.vehicles.len(),
            mean_speed,
            sim.lane_change_count(),
            frame,
        );
    }

    println!("{}", serde_json::to_string_pretty(&sim.state()).unwrap());
}
