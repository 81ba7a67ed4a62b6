//! Discrete-time stochastic SIR process on a contact graph.

use crate::error::{Error, Result, check_num, check_prob};
use crate::graph::ContactGraph;
use crate::random::RandomSource;
use serde::{Deserialize, Serialize};

/// Health state of a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthState {
    Susceptible,
    Infected,
    Recovered,
}

/// Number of nodes in each health state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub susceptible: usize,
    pub infected: usize,
    pub recovered: usize,
}

impl Counts {
    pub fn total(&self) -> usize {
        self.susceptible + self.infected + self.recovered
    }
}

/// Health state of every node at one time step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStates {
    state_vec: Vec<HealthState>,
}

impl NodeStates {
    /// All `n_nodes` nodes susceptible.
    pub fn all_susceptible(n_nodes: usize) -> Self {
        Self {
            state_vec: vec![HealthState::Susceptible; n_nodes],
        }
    }

    pub fn from_vec(state_vec: Vec<HealthState>) -> Self {
        Self { state_vec }
    }

    pub fn len(&self) -> usize {
        self.state_vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state_vec.is_empty()
    }

    pub fn get(&self, node: usize) -> HealthState {
        self.state_vec[node]
    }

    pub fn as_slice(&self) -> &[HealthState] {
        &self.state_vec
    }

    pub fn infected_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.state_vec
            .iter()
            .enumerate()
            .filter(|(_, state)| **state == HealthState::Infected)
            .map(|(node, _)| node)
    }

    pub fn counts(&self) -> Counts {
        let mut counts = Counts::default();
        for state in &self.state_vec {
            match state {
                HealthState::Susceptible => counts.susceptible += 1,
                HealthState::Infected => counts.infected += 1,
                HealthState::Recovered => counts.recovered += 1,
            }
        }
        counts
    }
}

/// Full sequence of snapshots produced by [`run`], indexed by time step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    snapshots: Vec<NodeStates>,
}

impl History {
    /// Number of snapshots (`n_steps + 1`).
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn get(&self, step: usize) -> Option<&NodeStates> {
        self.snapshots.get(step)
    }

    pub fn last(&self) -> Option<&NodeStates> {
        self.snapshots.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeStates> {
        self.snapshots.iter()
    }

    pub fn counts(&self) -> Vec<Counts> {
        self.snapshots.iter().map(NodeStates::counts).collect()
    }
}

/// Build a random contact graph and seed the initial infections.
///
/// `max(1, round(init_infected_frac * n_nodes))` distinct nodes start
/// infected, all others susceptible.
pub fn initialize<R>(
    n_nodes: usize,
    edge_prob: f64,
    init_infected_frac: f64,
    rng: &mut R,
) -> Result<(ContactGraph, NodeStates)>
where
    R: RandomSource + ?Sized,
{
    check_num("number of nodes", n_nodes, 1..)?;
    check_prob("edge probability", edge_prob)?;
    check_prob("initial infected fraction", init_infected_frac)?;

    let graph = ContactGraph::erdos_renyi(n_nodes, edge_prob, rng)?;
    let state = seed_infections(n_nodes, init_infected_frac, rng)?;

    Ok((graph, state))
}

fn seed_infections<R>(n_nodes: usize, init_infected_frac: f64, rng: &mut R) -> Result<NodeStates>
where
    R: RandomSource + ?Sized,
{
    check_num("number of nodes to seed", n_nodes, 1..)?;
    let n_infected = ((init_infected_frac * n_nodes as f64).round() as usize).clamp(1, n_nodes);

    let mut state = NodeStates::all_susceptible(n_nodes);
    for node in rng.sample(n_nodes, n_infected) {
        state.state_vec[node] = HealthState::Infected;
    }
    Ok(state)
}

/// Advance the process by one time step.
///
/// Every decision reads the frozen `current` snapshot: an infected node first
/// recovers with probability `gamma`; if it does not, each susceptible
/// neighbor becomes infected independently with probability `beta`.
pub fn step<R>(
    graph: &ContactGraph,
    current: &NodeStates,
    beta: f64,
    gamma: f64,
    rng: &mut R,
) -> Result<NodeStates>
where
    R: RandomSource + ?Sized,
{
    check_prob("beta", beta)?;
    check_prob("gamma", gamma)?;
    check_sizes(graph, current)?;
    Ok(step_unchecked(graph, current, beta, gamma, rng))
}

fn step_unchecked<R>(
    graph: &ContactGraph,
    current: &NodeStates,
    beta: f64,
    gamma: f64,
    rng: &mut R,
) -> NodeStates
where
    R: RandomSource + ?Sized,
{
    let mut next = current.clone();
    for node in current.infected_nodes() {
        if rng.uniform() < gamma {
            next.state_vec[node] = HealthState::Recovered;
            continue;
        }
        for &nbr in graph.neighbors(node) {
            if current.get(nbr) == HealthState::Susceptible && rng.uniform() < beta {
                next.state_vec[nbr] = HealthState::Infected;
            }
        }
    }
    next
}

/// Run the process for `n_steps` steps.
///
/// The returned history holds `n_steps + 1` snapshots, the first being
/// `initial`. Stepping continues for the full horizon even once no infected
/// nodes remain.
pub fn run<R>(
    graph: &ContactGraph,
    initial: &NodeStates,
    beta: f64,
    gamma: f64,
    n_steps: usize,
    rng: &mut R,
) -> Result<History>
where
    R: RandomSource + ?Sized,
{
    check_prob("beta", beta)?;
    check_prob("gamma", gamma)?;
    check_sizes(graph, initial)?;

    let mut snapshots = Vec::with_capacity(n_steps + 1);
    snapshots.push(initial.clone());
    for i_step in 0..n_steps {
        let next = step_unchecked(graph, &snapshots[i_step], beta, gamma, rng);
        log::debug!("step {}: {:?}", i_step + 1, next.counts());
        snapshots.push(next);
    }

    Ok(History { snapshots })
}

fn check_sizes(graph: &ContactGraph, state: &NodeStates) -> Result<()> {
    if graph.n_nodes() != state.len() {
        return Err(Error::InvalidParameter(format!(
            "state has {} nodes but graph has {}",
            state.len(),
            graph.n_nodes()
        )));
    }
    Ok(())
}

/// Parameters of one network simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NetworkParams {
    /// Number of nodes in the contact graph.
    pub n_nodes: usize,
    /// Probability that any two nodes are in contact.
    pub edge_prob: f64,
    /// Fraction of nodes infected at step 0.
    pub init_infected_frac: f64,
    /// Infection probability per contact and step.
    pub beta: f64,
    /// Recovery probability per step.
    pub gamma: f64,
    /// Number of steps to simulate.
    pub n_steps: usize,
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            n_nodes: 200,
            edge_prob: 0.05,
            init_infected_frac: 0.02,
            beta: 0.3,
            gamma: 0.1,
            n_steps: 50,
        }
    }
}

impl NetworkParams {
    pub fn validate(&self) -> Result<()> {
        check_num("number of nodes", self.n_nodes, 1..)?;
        check_prob("edge probability", self.edge_prob)?;
        check_prob("initial infected fraction", self.init_infected_frac)?;
        check_prob("beta", self.beta)?;
        check_prob("gamma", self.gamma)?;
        Ok(())
    }

    /// Initialize and run a full simulation from a single random stream.
    pub fn simulate<R>(&self, rng: &mut R) -> Result<(ContactGraph, History)>
    where
        R: RandomSource + ?Sized,
    {
        self.validate()?;
        let (graph, initial) =
            initialize(self.n_nodes, self.edge_prob, self.init_infected_frac, rng)?;
        let history = run(&graph, &initial, self.beta, self.gamma, self.n_steps, rng)?;
        Ok((graph, history))
    }
}
