//! Ferry Core
//!
//! Core types and pure logic for the Ferry deployment engine.
//!
//! This crate contains:
//! - Domain types: stacks, parameters, task targets, execution graphs
//! - DTOs: request/response shapes exchanged with the control plane
//! - The execution-graph compiler
//! - The error taxonomy shared by every Ferry crate
//!
//! Nothing in here performs I/O. Remote calls live in `ferry-client`,
//! orchestration in `ferry-engine`.

pub mod compiler;
pub mod domain;
pub mod dto;
pub mod error;

pub use error::{Error, Result};
