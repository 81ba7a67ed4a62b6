use episim::network::{self, HealthState, NetworkParams};
use episim::random::seeded_rng;
use episim::sirv::{
    Compartments, Scenario, SirvParams, integrate, rate_of_change, virus_survival_factor,
};
use episim::Error;

fn param_grid() -> Vec<SirvParams> {
    let mut grid = Vec::new();
    for &base_beta in &[0.0, 0.3, 1.2] {
        for &vaccine_efficacy in &[0.0, 0.8, 1.0] {
            for &temperature in &[-20.0, 10.0, 35.0] {
                grid.push(SirvParams {
                    base_beta,
                    vaccine_efficacy,
                    temperature,
                    mobility: 1.4,
                    ..SirvParams::default()
                });
            }
        }
    }
    grid
}

#[test]
fn population_is_conserved() {
    let scenario = Scenario {
        population: 50_000.0,
        initial_infected: 25.0,
        vaccinated_frac: 0.4,
    };
    let initial = scenario.initial_state().unwrap();
    for params in param_grid() {
        let traj = integrate(initial, &params, 200.0, None).unwrap();
        assert_eq!(traj.len(), 201);
        for sample in traj.samples() {
            let drift = (sample.state.total() - scenario.population).abs();
            assert!(
                drift <= 1e-6 * scenario.population,
                "drift {drift} at t = {} for {params:?}",
                sample.t
            );
            let floor = -1e-6 * scenario.population;
            assert!(sample.state.su >= floor && sample.state.i >= floor);
        }
    }
}

#[test]
fn node_states_are_monotonic() {
    let params = NetworkParams {
        n_nodes: 150,
        edge_prob: 0.06,
        init_infected_frac: 0.05,
        beta: 0.4,
        gamma: 0.2,
        n_steps: 40,
    };
    let mut rng = seeded_rng(123);
    let (_, history) = params.simulate(&mut rng).unwrap();

    let snapshots: Vec<_> = history.iter().collect();
    for pair in snapshots.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        for node in 0..prev.len() {
            match prev.get(node) {
                HealthState::Recovered => assert_eq!(next.get(node), HealthState::Recovered),
                HealthState::Infected => assert_ne!(next.get(node), HealthState::Susceptible),
                HealthState::Susceptible => {}
            }
        }
    }
}

#[test]
fn same_seed_same_history() {
    let mut rng = seeded_rng(0);
    let (graph, initial) = network::initialize(80, 0.1, 0.05, &mut rng).unwrap();

    let first = network::run(&graph, &initial, 0.3, 0.1, 25, &mut seeded_rng(99)).unwrap();
    let second = network::run(&graph, &initial, 0.3, 0.1, 25, &mut seeded_rng(99)).unwrap();
    assert_eq!(first, second);

    let a = network::initialize(80, 0.1, 0.05, &mut seeded_rng(4)).unwrap();
    let b = network::initialize(80, 0.1, 0.05, &mut seeded_rng(4)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn zero_transmission_never_grows() {
    let mut rng = seeded_rng(8);
    let (graph, initial) = network::initialize(100, 0.2, 0.1, &mut rng).unwrap();
    let history = network::run(&graph, &initial, 0.0, 0.15, 30, &mut rng).unwrap();

    let initially_infected: Vec<usize> = initial.infected_nodes().collect();
    for snapshot in history.iter() {
        for node in snapshot.infected_nodes() {
            assert!(initially_infected.contains(&node));
        }
        assert_eq!(snapshot.counts().susceptible, initial.counts().susceptible);
    }
    let infected: Vec<usize> = history.counts().iter().map(|c| c.infected).collect();
    assert!(infected.windows(2).all(|w| w[1] <= w[0]));
}

#[test]
fn warm_weather_has_no_effect() {
    for &sensitivity in &[0.0, 0.05, 3.0, -2.0, 1e9] {
        for &temperature in &[10.0, 10.5, 40.0] {
            assert_eq!(virus_survival_factor(temperature, 10.0, sensitivity), 1.0);
        }
    }
}

#[test]
fn disease_free_state_is_fixed_point() {
    let state = Compartments {
        su: 123.0,
        sv: 456.0,
        i: 0.0,
        r: 789.0,
    };
    for params in param_grid() {
        let d = rate_of_change(17.0, &state, &params);
        assert_eq!(d.su, 0.0);
        assert_eq!(d.sv, 0.0);
        assert_eq!(d.i, 0.0);
        assert_eq!(d.r, 0.0);
    }
}

#[test]
fn complete_graph_infects_everyone_in_one_step() {
    let (graph, initial) = network::initialize(10, 1.0, 0.1, &mut seeded_rng(0)).unwrap();
    assert_eq!(graph.n_edges(), 45);
    assert_eq!(initial.counts().infected, 1);

    let history = network::run(&graph, &initial, 1.0, 0.0, 1, &mut seeded_rng(0)).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history.get(0), Some(&initial));
    assert_eq!(history.get(1).unwrap().counts().infected, 10);
}

#[test]
fn zero_horizon_returns_initial_sample() {
    let scenario = Scenario {
        population: 1000.0,
        initial_infected: 10.0,
        vaccinated_frac: 0.0,
    };
    let params = SirvParams {
        base_beta: 0.3,
        gamma: 0.1,
        vaccine_efficacy: 0.8,
        temperature: 10.0,
        mobility: 1.0,
        reference_temperature: 10.0,
        temperature_sensitivity: 0.05,
    };
    let traj = integrate(scenario.initial_state().unwrap(), &params, 0.0, None).unwrap();
    assert_eq!(traj.len(), 1);
    let sample = traj.samples()[0];
    assert_eq!(sample.t, 0.0);
    assert_eq!(
        sample.state,
        Compartments {
            su: 990.0,
            sv: 0.0,
            i: 10.0,
            r: 0.0
        }
    );
}

#[test]
fn invalid_parameters_fail_before_computation() {
    let mut rng = seeded_rng(0);
    assert!(matches!(
        network::initialize(10, -0.5, 0.1, &mut rng),
        Err(Error::InvalidParameter(_))
    ));
    assert!(matches!(
        network::initialize(0, 0.5, 0.1, &mut rng),
        Err(Error::InvalidParameter(_))
    ));

    let (graph, initial) = network::initialize(10, 0.5, 0.1, &mut rng).unwrap();
    assert!(matches!(
        network::run(&graph, &initial, 0.5, 2.0, 5, &mut rng),
        Err(Error::InvalidParameter(_))
    ));

    let initial = Scenario::default().initial_state().unwrap();
    let params = SirvParams {
        vaccine_efficacy: 1.5,
        ..SirvParams::default()
    };
    assert!(matches!(
        integrate(initial, &params, 10.0, None),
        Err(Error::InvalidParameter(_))
    ));
    let empty = Compartments::default();
    assert!(matches!(
        integrate(empty, &SirvParams::default(), 10.0, None),
        Err(Error::InvalidParameter(_))
    ));
}
