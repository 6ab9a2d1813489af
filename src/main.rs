use std::time::Instant;

use microtraffic::{CycleTiming, RoadNetwork, Simulation};

fn main() {
    env_logger::init();

    let network = RoadNetwork::crossroads(700.0, 350.0, CycleTiming::default());
    let mut sim = Simulation::new(network);
    sim.set_inflow_rate(2000.0);

    println!("Simulating...");
    let frames_per_batch = 1000;
    loop {
        let start = Instant::now();
        for _ in 0..frames_per_batch {
            sim.advance(0.05);
        }
        let frame = start.elapsed() / frames_per_batch;
        println!(
            "Avg. frame: {:?} --> {}x speedup ({} vehs at t = {:.0}s)",
            frame,
            0.05 / frame.as_secs_f32(),
            sim.num_vehicles(),
            sim.time(),
        )
    }
}
