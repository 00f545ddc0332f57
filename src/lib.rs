mod platform;
mod simulation;

pub use simulation::*;

pub use platform::start;
