//! Inputs shared by the simulation: the scene and the run configuration.

pub mod config;
pub mod scene;
