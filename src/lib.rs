//! Routing and allocation experiments on hierarchical quantum networks.
//!
//! A single entangled-pair generator feeds repeaters, which serve clients over
//! capacity limited links whose fidelity decays per hop. Networks are generated
//! at random, turned into an lp relaxation and an integer model over the same
//! candidate paths, and solved through a pluggable [`optimization::SolveOracle`].
//! Sweeps over network size, density and the fidelity exponent produce a csv
//! table of integrality gaps and solve times.

pub mod dsa;
pub mod error;
pub mod experiment;
pub mod linear_algebra;
pub mod optimization;
pub mod quantum_network;
pub mod scientific_computing;

pub use error::{Error, Result};
