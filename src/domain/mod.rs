// Domain layer: factor models and the ports (traits) the adapters implement.

pub mod model;
pub mod ports;
