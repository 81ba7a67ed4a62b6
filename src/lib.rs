//! Simulation of infectious disease spread.
//!
//! Two independent engines are provided:
//!
//! - [`network`]: a discrete-time stochastic SIR process on an Erdős–Rényi
//!   contact graph, producing the full per-node state history.
//! - [`sirv`]: a deterministic SIRV compartmental model whose transmission
//!   rate depends on temperature and mobility, integrated with an adaptive
//!   Dormand-Prince solver.
//!
//! The remaining modules drive the engines from a simulation directory.

pub mod analysis;
pub mod config;
pub mod error;
pub mod graph;
pub mod manager;
pub mod network;
pub mod random;
pub mod sirv;
pub mod solver;
pub mod stats;
pub mod types;

pub use error::{Error, Result};
