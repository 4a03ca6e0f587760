//! Edge-triggered liveness monitoring of a persisted domain set.
//!
//! A [`LivenessMonitor`] sweeps the domains held by a [`DomainStore`], probes
//! each one in turn and sends an alert through a [`notify::Gateway`] only
//! when a domain flips between alive and dead. Operators add and remove
//! domains through the commands in [`commands`].

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod alerts;
pub mod commands;
pub mod monitor;
pub mod probe;
pub mod state;
pub mod store;

pub use commands::{Change, DomainCommands};
pub use monitor::{LivenessMonitor, MonitorConfig, MonitorError, MonitorHandle, SweepReport};
pub use probe::{HttpProbe, Probe, ProbeOutcome, DEFAULT_PROBE_TIMEOUT};
pub use state::{Alert, Liveness, LivenessTable, TransitionPolicy};
pub use store::{DomainSet, DomainStore, JsonFileStore, MemoryStore, StoreError};
