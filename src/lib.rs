//! DevCrew API Library
//!
//! This library provides the core functionality for the DevCrew API: a
//! multi-agent orchestration engine that plans a development request across
//! specialist agents, runs the plan with dependency-aware scheduling and
//! synthesizes the results.

pub mod agents;
pub mod api;
pub mod config;
pub mod domain;
pub mod infrastructure;
