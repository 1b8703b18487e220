//! Core domain types
//!
//! These types describe what Ferry deploys: infrastructure stacks and their
//! parameters, references to invocable task targets, and the execution graphs
//! that run those targets on a cluster.

pub mod graph;
pub mod parameters;
pub mod stack;
pub mod target;
