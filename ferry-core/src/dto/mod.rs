//! Data Transfer Objects for control-plane communication
//!
//! Request and response shapes exchanged with the remote stack engine,
//! network inventory and workflow service. Field names follow each service's
//! wire casing.

pub mod network;
pub mod stack;
pub mod state_machine;
