// Domain layer: table/fixture models and the ports the provisioner talks to.

pub mod model;
pub mod ports;
