// Domain layer: station markers, indicator values and the ports to the map and classifier.

pub mod model;
pub mod ports;
