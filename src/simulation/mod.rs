pub mod boundary;
pub mod color_map;
pub mod concurrency;
pub mod neighborhood_search;
pub mod simulation;
pub mod simulation_parameters;
pub mod sph_kernels;

#[cfg(feature = "double-precision")]
pub mod floating_type_mod {
    pub type FT = f64;
    pub use std::f64::consts::PI;
}

#[cfg(not(feature = "double-precision"))]
pub mod floating_type_mod {
    pub type FT = f32;
    pub use std::f32::consts::PI;
}

use floating_type_mod::FT;

use nalgebra::SVector;

pub type V<T, const D: usize> = SVector<T, D>;

pub type V2 = V<FT, 2>;
pub type V2I = V<i32, 2>;
pub type V3 = V<FT, 3>;

pub fn vec2f(x: FT, y: FT) -> V2 {
    [x, y].into()
}

pub fn vec3f(x: FT, y: FT, z: FT) -> V3 {
    [x, y, z].into()
}

pub use simulation::*;
