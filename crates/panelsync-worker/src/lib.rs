//! Consumer side of the PanelSync hot folder handoff.
//!
//! This crate provides:
//! - A worker runner that watches the folder and handles each job file once
//! - A job executor that dispatches jobs to the handler for their kind
//! - The import and mesh export handlers, plus a simulated host application

pub mod executor;
pub mod jobs;
pub mod runner;
pub mod sim_host;

pub use executor::{JobExecutionError, JobExecutor, JobHandler, JobOutcome};
pub use panelsync_storage::queue::JobQueue;
pub use runner::WorkerRunner;
pub use sim_host::SimulatedHost;
