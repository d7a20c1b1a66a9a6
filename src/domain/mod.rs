// Domain layer: wire models and ports (interfaces). No tokio or transport details here.

pub mod model;
pub mod ports;
