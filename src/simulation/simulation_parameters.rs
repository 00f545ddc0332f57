use serde::{Deserialize, Serialize};

use crate::{floating_type_mod::FT, sph_kernels::KernelType, vec2f, V2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeighborhoodSearchAlgorithm {
    Grid,
    RStar,
}

/**
 * Everything that tunes a simulation run. Deserialized from the YAML file
 * given on the command line and copied by value into the per-step passes.
 */
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimulationParams {
    // world units are pixels, time is in seconds
    pub gravity: FT,
    pub timestep: FT,

    // smoothing length of the SPH kernels
    pub h: FT,
    pub particle_mass: FT,
    pub rest_density: FT,

    // WCSPH equation of state; eos_power = 1 gives the linear
    // "gas constant" law p = k * (density - rest_density)
    pub eos_stiffness: FT,
    pub eos_power: i32,

    pub viscosity: FT,

    // wall collision response
    pub damping: FT,
    pub min_bounce_velocity: FT,

    pub kernel_type: KernelType,
    pub neighborhood_search_algorithm: NeighborhoodSearchAlgorithm,

    pub target_fps: u32,
}

impl SimulationParams {
    /** Screen coordinates grow downwards, so gravity is positive. */
    pub fn gravity_vector(&self) -> V2 {
        vec2f(0., self.gravity)
    }

    /**
     * WCSPH equation of state. Negative pressures are clamped to zero so
     * the linear law does not pull isolated particles together.
     */
    pub fn pressure_from_density(&self, density: FT) -> FT {
        let pressure = self.eos_stiffness * ((density / self.rest_density).powi(self.eos_power) - 1.);
        pressure.max(0.)
    }

    pub fn support_radius(&self) -> FT {
        self.kernel_type.support_radius(self.h)
    }
}

impl Default for SimulationParams {
    fn default() -> Self {
        SimulationParams {
            gravity: 2500.,
            timestep: 1. / 240.,
            h: 14.,
            particle_mass: 1.,
            rest_density: 0.021,
            eos_stiffness: 1000.,
            eos_power: 1,
            viscosity: 0.05,
            damping: 0.8,
            min_bounce_velocity: 6.,
            kernel_type: KernelType::Poly6Spiky,
            neighborhood_search_algorithm: NeighborhoodSearchAlgorithm::Grid,
            target_fps: 60,
        }
    }
}

#[test]
fn pressure_is_zero_at_rest_density() {
    let params = SimulationParams::default();
    assert_eq!(params.pressure_from_density(params.rest_density), 0.);
}

#[test]
fn pressure_is_monotone_in_density() {
    let params = SimulationParams::default();
    let mut last = params.pressure_from_density(0.);
    for i in 1..100 {
        let density = params.rest_density * 0.05 * i as FT;
        let pressure = params.pressure_from_density(density);
        assert!(pressure >= last, "pressure decreased at density {}", density);
        last = pressure;
    }
}

#[test]
fn pressure_is_clamped_below_rest_density() {
    let params = SimulationParams::default();
    assert_eq!(params.pressure_from_density(params.rest_density * 0.5), 0.);
    assert_eq!(params.pressure_from_density(crate::sph_kernels::DENSITY_EPSILON), 0.);
}
