mod platform;
mod simulation;

pub use simulation::*;

fn main() {
    platform::start();
}
