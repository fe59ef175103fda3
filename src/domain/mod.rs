//! Domain layer: entities, value objects and the ports the engine depends on.

pub mod money;
pub mod plan;
pub mod ports;
pub mod records;
pub mod subscription;
pub mod user;
