//! The device-selection model: devices, event log, election rule, simulator.

pub mod device;
pub mod election;
pub mod events;
pub mod simulator;
