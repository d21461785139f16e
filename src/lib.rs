//! Execution engine for FlowSphere HTTP sequences.
//!
//! A [`Config`] holds an ordered list of nodes; [`SequenceRunner`] executes
//! them one by one, resolving `{{ ... }}` placeholders, skipping nodes whose
//! conditions do not hold and stopping at the first failed validation or
//! transport error.

pub mod conditions;
pub mod error;
pub mod executor;
pub mod extract;
pub mod fs;
pub mod interact;
pub mod state;
pub mod substitute;
pub mod transport;
pub mod types;
pub mod validation;

pub use error::SequenceError;
pub use executor::{NodeOutcome, RunReport, SequenceRunner};
pub use types::Config;
