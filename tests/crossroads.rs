//! Tests of the signalised crossroads layout: light cycling, congestion
//! adaptation and vehicles interacting with the lights.

use assert_approx_eq::assert_approx_eq;
use microtraffic::{Axis, CycleTiming, LightState, RoadNetwork, Simulation, VehicleClass};

fn crossroads_sim() -> Simulation {
    Simulation::new(RoadNetwork::crossroads(700.0, 350.0, CycleTiming::default()))
}

fn controller_states(sim: &Simulation) -> (LightState, LightState) {
    let (_, controller) = sim.network().iter_controllers().next().unwrap();
    (controller.ns_state(), controller.ew_state())
}

/// Test that the two axes are never green at the same time, over several
/// full cycles.
#[test]
fn axes_are_never_both_green() {
    let mut sim = crossroads_sim();
    for _ in 0..600 {
        sim.advance_lights(100.0);
        let (ns, ew) = controller_states(&sim);
        assert!(!(ns == LightState::Green && ew == LightState::Green));
    }
}

/// Test the full phase sequence of one half cycle: east-west green for
/// 7000 ms, yellow for exactly 1500 ms, then the swap at 8500 ms.
#[test]
fn phase_sequence_runs_to_schedule() {
    let mut sim = crossroads_sim();
    assert_eq!(controller_states(&sim), (LightState::Red, LightState::Green));

    let step_to = |steps_done: &mut u32, target: u32, sim: &mut Simulation| {
        while *steps_done < target {
            sim.advance_lights(100.0);
            *steps_done += 1;
        }
    };
    let mut steps = 0;

    // Still green just before the 7000 ms boundary.
    step_to(&mut steps, 69, &mut sim);
    assert_eq!(controller_states(&sim), (LightState::Red, LightState::Green));
    // Yellow from 7000 ms.
    step_to(&mut steps, 70, &mut sim);
    assert_eq!(controller_states(&sim), (LightState::Red, LightState::Yellow));
    // Still yellow just before the 8500 ms boundary.
    step_to(&mut steps, 84, &mut sim);
    assert_eq!(controller_states(&sim), (LightState::Red, LightState::Yellow));
    // The swap: north-south released only once east-west shows red.
    step_to(&mut steps, 85, &mut sim);
    assert_eq!(controller_states(&sim), (LightState::Green, LightState::Red));
}

/// Test that a queue on one axis extends that axis's next green phase.
#[test]
fn congestion_extends_the_green() {
    let mut sim = crossroads_sim();
    let ns_lane = {
        let (_, controller) = sim.network().iter_controllers().next().unwrap();
        controller.lanes(Axis::NorthSouth).next().unwrap()
    };
    for fraction in [0.6, 0.7, 0.8, 0.9] {
        sim.add_vehicle(VehicleClass::Car, ns_lane, fraction).unwrap();
    }

    // Drive the lights (only) through the east-west green and yellow, to
    // the instant north-south turns green and sizes its phase.
    for _ in 0..85 {
        sim.advance_lights(100.0);
    }
    assert_eq!(controller_states(&sim).0, LightState::Green);
    let (_, controller) = sim.network().iter_controllers().next().unwrap();
    assert_approx_eq!(controller.current_green_ms(), 10500.0, 1e-9);
}

/// Test that a vehicle holds at a red light and proceeds through the
/// junction once its axis turns green.
#[test]
fn vehicle_waits_out_the_red() {
    let mut sim = crossroads_sim();
    let ns_lane = {
        let (_, controller) = sim.network().iter_controllers().next().unwrap();
        controller.lanes(Axis::NorthSouth).next().unwrap()
    };
    let veh = sim.add_vehicle(VehicleClass::Car, ns_lane, 0.7).unwrap();

    // North-south shows red until t = 8.5 s; the vehicle sits within the
    // light's look-ahead from the start, so it never gets going.
    for _ in 0..160 {
        sim.advance(0.05);
    }
    let vehicle = sim.vehicle(veh).unwrap();
    assert_eq!(vehicle.vel(), 0.0);
    assert!(vehicle.stopping_for_light());

    // Green releases it; by t = 25 s it has crossed onto another road.
    for _ in 0..340 {
        sim.advance(0.05);
    }
    if let Some(vehicle) = sim.vehicle(veh) {
        assert_ne!(vehicle.lane(), Some(ns_lane));
        assert!(!vehicle.stopping_for_light());
    }
}

/// Test that boundary inflow populates the network and traffic keeps
/// flowing through the junction rather than gridlocking.
#[test]
fn inflow_fills_and_drains_the_junction() {
    let mut sim = crossroads_sim();
    sim.set_inflow_rate(2000.0);

    // Two minutes of heavy inflow.
    for _ in 0..2400 {
        sim.advance(0.05);
    }
    assert!(sim.num_vehicles() > 0);

    // Cut the inflow; the network must eventually empty out.
    sim.set_inflow_rate(0.0);
    for _ in 0..24000 {
        sim.advance(0.05);
        if sim.num_vehicles() == 0 {
            break;
        }
    }
    assert_eq!(sim.num_vehicles(), 0);
}
