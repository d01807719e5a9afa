// Domain layer: core models and ports (interfaces) to the partner network and the stores.

pub mod model;
pub mod ports;
