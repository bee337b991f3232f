// Domain layer: core models, channel descriptions and ports (interfaces).

pub mod channel;
pub mod model;
pub mod ports;
pub mod socketio;
