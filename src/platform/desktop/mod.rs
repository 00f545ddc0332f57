mod main_loop;
mod rendering;
mod screenshot;

pub use main_loop::start;
