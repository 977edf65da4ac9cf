//! Application layer: ports to external systems.

pub mod ports;
