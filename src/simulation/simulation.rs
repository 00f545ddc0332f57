use std::{
    collections::HashMap,
    fmt::Display,
    fmt::Write as _,
    time::{Duration, Instant},
};

use nalgebra::zero;
use num_traits::Float;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    boundary::{BoundaryHandler, BoundaryHandlerTrait, BoxBoundary},
    concurrency::{par_iter_mut1, par_iter_mut2},
    floating_type_mod::FT,
    neighborhood_search::{build_neighborhood_list, NeighborhoodCache},
    simulation_parameters::SimulationParams,
    sph_kernels::DENSITY_EPSILON,
    vec2f, V2,
};

macro_rules! decl_particle_vec {
    (pub struct $struct_name:ident { $(pub $field_name:ident: Vec<$field_type:ty> | $default_value:expr),*$(,)?  }) => {
        pub struct $struct_name {
            $(
                pub $field_name : Vec<$field_type>,
            )*
        }

        impl $struct_name {
            pub fn default(len: usize) -> Self {
                Self {
                    $(
                        $field_name: (0..len).map(|_| $default_value).collect::<Vec<$field_type>>(),
                    )*
                }
            }
        }
    }
}

decl_particle_vec! {
    pub struct ParticleVec {
        pub position: Vec<V2> | zero(),
        pub velocity: Vec<V2> | zero(),
        pub accel: Vec<V2> | zero(),

        pub density: Vec<FT> | 0.,
        pub pressure: Vec<FT> | 0.,

        pub neighbor_count: Vec<usize> | 0,
    }
}

#[derive(Clone)]
struct Counter {
    values: Vec<Duration>,
    last_start: Instant,
}

impl Counter {
    fn new() -> Self {
        Counter {
            last_start: Instant::now(),
            values: Vec::new(),
        }
    }

    fn begin(&mut self) {
        self.last_start = Instant::now();
    }

    fn end(&mut self) {
        self.values.push(Instant::now() - self.last_start);
    }

    fn avg(&self) -> Duration {
        if self.values.is_empty() {
            return Duration::ZERO;
        }
        self.values.iter().cloned().sum::<Duration>() / self.values.len() as u32
    }

    fn sum(&self) -> Duration {
        self.values.iter().cloned().sum::<Duration>()
    }
}

struct PerformanceCounters {
    counters: HashMap<String, Counter>,
    enabled: bool,
}

impl PerformanceCounters {
    fn new(enabled: bool) -> PerformanceCounters {
        PerformanceCounters {
            counters: HashMap::new(),
            enabled,
        }
    }

    fn begin(&mut self, id: &str) {
        if self.enabled {
            self.counters.entry(id.to_string()).or_insert_with(Counter::new).begin();
        }
    }

    fn end(&mut self, id: &str) {
        if self.enabled {
            self.counters.get_mut(id).unwrap().end();
        }
    }
}

#[inline]
fn assert_vector_non_nan(v: &V2, name: &str) {
    for d in 0..2 {
        assert!(v[d].is_finite(), "Assertion '{}[{}].is_finite()' failed!", name, d);
    }
}

pub struct FluidSimulation {
    pub particles: ParticleVec,
    pub neighs: NeighborhoodCache,
    pub boundary_handler: BoundaryHandler,
    pub time: FT,

    pcounters: PerformanceCounters,
    step_number: usize,
}

impl FluidSimulation {
    pub fn new(
        fluid_particle_positions: Vec<V2>,
        fluid_particle_velocities: Vec<V2>,
        boundary_handler: BoundaryHandler,
        counters_enabled: bool,
    ) -> Self {
        let num_fluid_particles = fluid_particle_positions.len();
        assert!(fluid_particle_velocities.len() == num_fluid_particles);

        let mut particles = ParticleVec::default(num_fluid_particles);
        particles.position = fluid_particle_positions;
        particles.velocity = fluid_particle_velocities;

        FluidSimulation {
            particles,
            neighs: NeighborhoodCache::new(num_fluid_particles),
            boundary_handler,
            time: 0.,
            pcounters: PerformanceCounters::new(counters_enabled),
            step_number: 0,
        }
    }

    pub fn num_fluid_particles(&self) -> usize {
        self.particles.position.len()
    }

    /**
     * One explicit Euler step: neighborhood search, density/pressure pass,
     * acceleration pass (gravity + viscosity + pressure), integration with
     * wall collisions.
     */
    pub fn single_step(&mut self, simulation_params: SimulationParams) {
        self.pcounters.begin("simulation-step");

        let particles = &mut self.particles;

        self.pcounters.begin("neighborhood");
        build_neighborhood_list(
            simulation_params,
            &particles.position,
            simulation_params.support_radius(),
            &mut self.neighs,
        );
        self.pcounters.end("neighborhood");

        let neighs = &self.neighs;
        par_iter_mut1(&mut particles.neighbor_count, |i, p_neighbor_count| {
            *p_neighbor_count = neighs.neighbor_count(i);
        });

        self.pcounters.begin("density-pressure");
        {
            let position = &particles.position;
            par_iter_mut2(&mut particles.density, &mut particles.pressure, |i, p_density, p_pressure| {
                let mut kernel_sum = 0.;
                for j in neighs.iter(i) {
                    let x_ij_sq = (position[i] - position[j]).norm_squared();
                    kernel_sum += simulation_params.kernel_type.density_kernel(x_ij_sq, simulation_params.h);
                }
                *p_density = kernel_sum * simulation_params.particle_mass + DENSITY_EPSILON;
                *p_pressure = simulation_params.pressure_from_density(*p_density);
            });
        }
        self.pcounters.end("density-pressure");

        self.pcounters.begin("accelerations");
        {
            let position = &particles.position;
            let velocity = &particles.velocity;
            let density = &particles.density;
            let pressure = &particles.pressure;
            par_iter_mut1(&mut particles.accel, |i, p_accel| {
                *p_accel =
                    Self::particle_acceleration(i, position, velocity, density, pressure, neighs, simulation_params);
            });
        }
        self.pcounters.end("accelerations");

        self.pcounters.begin("integration");
        {
            let accel = &particles.accel;
            let boundary_handler = &self.boundary_handler;
            par_iter_mut2(&mut particles.position, &mut particles.velocity, |i, p_position, p_velocity| {
                *p_velocity += accel[i] * simulation_params.timestep;
                *p_position += *p_velocity * simulation_params.timestep;
                boundary_handler.enforce(p_position, p_velocity, simulation_params);
            });
        }
        self.pcounters.end("integration");

        self.time += simulation_params.timestep;
        self.step_number += 1;

        self.pcounters.end("simulation-step");
    }

    fn particle_acceleration(
        i: usize,
        position: &[V2],
        velocity: &[V2],
        density: &[FT],
        pressure: &[FT],
        neighs: &NeighborhoodCache,
        simulation_params: SimulationParams,
    ) -> V2 {
        let h = simulation_params.h;
        let mass = simulation_params.particle_mass;

        let mut accel = simulation_params.gravity_vector();

        for j in neighs.iter(i) {
            if j == i {
                continue;
            }

            let x_ij = position[i] - position[j];
            let dg_ij = simulation_params.kernel_type.kernel_deriv(x_ij, h);

            // symmetric SPH pressure gradient
            let pressure_term =
                pressure[i] / (density[i] * density[i]) + pressure[j] / (density[j] * density[j]);
            accel -= mass * pressure_term * dg_ij;

            // approximate Laplacian viscosity (SPH tutorial form), only for
            // approaching pairs
            let v_ij = velocity[i] - velocity[j];
            let divergence_estimate = x_ij.dot(&v_ij);
            if divergence_estimate < 0. {
                let rho_ij = (density[i] + density[j]) * 0.5;
                let coeff =
                    8. * (mass / rho_ij) * divergence_estimate / (x_ij.norm_squared() + 0.01 * h * h);
                accel += simulation_params.viscosity * coeff * dg_ij;
            }
        }

        assert_vector_non_nan(&accel, "accel");
        accel
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneWindow {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneBox {
    pub width: FT,
    pub height: FT,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneParticles {
    pub count: usize,
    pub draw_radius: FT,
    #[serde(default)]
    pub velocity: [FT; 2],
    #[serde(default)]
    pub jitter: FT,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    pub window: SceneWindow,
    pub r#box: SceneBox,
    pub particles: SceneParticles,
}

pub fn init_fluid_sim(
    simulation_params: SimulationParams,
    scene_config: &SceneConfig,
    counters_enabled: bool,
) -> FluidSimulation {
    let window = &scene_config.window;
    let play_area = &scene_config.r#box;
    assert!(
        play_area.width <= window.width as FT && play_area.height <= window.height as FT,
        "play area does not fit into the window"
    );
    assert!(
        simulation_params.support_radius() < play_area.width.min(play_area.height),
        "kernel support radius larger than the play area"
    );

    // the box is centered inside the window
    let box_min = vec2f(
        (window.width as FT - play_area.width) * 0.5,
        (window.height as FT - play_area.height) * 0.5,
    );
    let box_max = box_min + vec2f(play_area.width, play_area.height);

    let positions = grid_layout(&scene_config.particles, box_min, box_max);
    let velocity = vec2f(scene_config.particles.velocity[0], scene_config.particles.velocity[1]);
    let velocities = vec![velocity; positions.len()];

    println!("INIT {} FLUID PARTICLES", positions.len());

    let boundary_handler: BoundaryHandler =
        BoxBoundary::new(box_min, box_max, scene_config.particles.draw_radius).into();

    FluidSimulation::new(positions, velocities, boundary_handler, counters_enabled)
}

/**
 * Place `count` particles on a near-square grid filling the box, with the
 * outermost particles exactly one draw radius inside the walls. The last
 * row may be partial. Optional jitter breaks the lattice symmetry.
 */
pub fn grid_layout(particles: &SceneParticles, box_min: V2, box_max: V2) -> Vec<V2> {
    let count = particles.count;
    assert!(count > 0, "scene must contain at least one particle");

    let rows = usize::max(1, (count as FT).sqrt().floor() as usize);
    let cols = (count + rows - 1) / rows;

    let inner_min = box_min.add_scalar(particles.draw_radius);
    let inner_max = box_max.add_scalar(-particles.draw_radius);

    let spacing_x = if cols > 1 {
        (inner_max.x - inner_min.x) / (cols - 1) as FT
    } else {
        0.
    };
    let spacing_y = if rows > 1 {
        (inner_max.y - inner_min.y) / (rows - 1) as FT
    } else {
        0.
    };

    let mut rng = rand::thread_rng();
    let mut positions = Vec::with_capacity(count);
    'outer: for i in 0..rows {
        for j in 0..cols {
            if positions.len() == count {
                break 'outer;
            }
            let mut position = vec2f(inner_min.x + j as FT * spacing_x, inner_min.y + i as FT * spacing_y);
            if particles.jitter > 0. {
                position.x += rng.gen_range(-particles.jitter..particles.jitter);
                position.y += rng.gen_range(-particles.jitter..particles.jitter);
            }
            position.x = position.x.clamp(inner_min.x, inner_max.x);
            position.y = position.y.clamp(inner_min.y, inner_max.y);
            positions.push(position);
        }
    }
    positions
}

pub fn write_statistics(fluid_simulation: &FluidSimulation) -> String {
    let mut s = String::new();

    writeln!(
        s,
        "{} particles, {} steps, simulated time {:.3}s",
        fluid_simulation.num_fluid_particles(),
        fluid_simulation.step_number,
        fluid_simulation.time,
    )
    .unwrap();

    let mut v = fluid_simulation.pcounters.counters.iter().collect::<Vec<_>>();
    v.sort_by(|x, y| x.0.cmp(y.0));
    for (label, counter) in v {
        writeln!(
            s,
            "{}: avg:{:.3}ms total:{:.3}ms",
            label,
            counter.avg().as_secs_f64() * 1000.,
            counter.sum().as_secs_f64() * 1000.
        )
        .unwrap();
    }

    s
}

pub fn is_ft_approx_eq<FT: Float>(a: FT, b: FT, tolerance: FT) -> bool {
    (a - b).abs() <= tolerance
}

pub fn assert_ft_approx_eq<FT: Float + Display>(a: FT, b: FT, tolerance: FT, s: impl FnOnce() -> String) {
    if !is_ft_approx_eq(a, b, tolerance) {
        panic!(
            "{} value not equal with a tolerance of {}:\n\ta={}\n\tb={}\n",
            s(),
            tolerance,
            a,
            b
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::BoundaryHandlerTrait;

    fn test_scene(count: usize) -> SceneConfig {
        SceneConfig {
            window: SceneWindow { width: 500, height: 400 },
            r#box: SceneBox { width: 400., height: 300. },
            particles: SceneParticles {
                count,
                draw_radius: 2.,
                velocity: [0., 0.],
                jitter: 0.,
            },
        }
    }

    fn assert_all_inside(fluid_simulation: &FluidSimulation) {
        let (box_min, box_max) = fluid_simulation.boundary_handler.extent();
        let radius = 2.;
        for (i, position) in fluid_simulation.particles.position.iter().enumerate() {
            assert!(
                position.x >= box_min.x + radius
                    && position.x <= box_max.x - radius
                    && position.y >= box_min.y + radius
                    && position.y <= box_max.y - radius,
                "particle {} escaped the box: [{}, {}]",
                i,
                position.x,
                position.y
            );
        }
    }

    #[test]
    fn grid_layout_produces_exact_count() {
        let scene = test_scene(1000);
        let positions = grid_layout(&scene.particles, vec2f(50., 50.), vec2f(450., 350.));
        assert_eq!(positions.len(), 1000);
    }

    #[test]
    fn grid_layout_is_contained_and_near_square() {
        let scene = test_scene(1000);
        let box_min = vec2f(50., 50.);
        let box_max = vec2f(450., 350.);
        let positions = grid_layout(&scene.particles, box_min, box_max);

        for position in &positions {
            assert!(position.x >= box_min.x + 2. && position.x <= box_max.x - 2.);
            assert!(position.y >= box_min.y + 2. && position.y <= box_max.y - 2.);
        }

        // corner particles touch the inset walls
        assert_eq!(positions[0], vec2f(52., 52.));

        // floor(sqrt(1000)) = 31 rows, 33 columns
        let first_row: Vec<&V2> = positions.iter().filter(|p| p.y == 52.).collect();
        assert_eq!(first_row.len(), 33);
    }

    #[test]
    fn grid_layout_single_particle() {
        let scene = test_scene(1);
        let positions = grid_layout(&scene.particles, vec2f(0., 0.), vec2f(100., 100.));
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0], vec2f(2., 2.));
    }

    #[test]
    fn particles_stay_in_box_under_gravity() {
        let simulation_params = SimulationParams::default();
        let mut fluid_simulation = init_fluid_sim(simulation_params, &test_scene(400), false);

        for _ in 0..240 {
            fluid_simulation.single_step(simulation_params);
        }

        assert_all_inside(&fluid_simulation);
        for &density in &fluid_simulation.particles.density {
            assert!(density > 0.);
        }
    }

    #[test]
    fn particles_fall_to_the_bottom() {
        let simulation_params = SimulationParams::default();
        let mut fluid_simulation = init_fluid_sim(simulation_params, &test_scene(100), false);

        for _ in 0..600 {
            fluid_simulation.single_step(simulation_params);
        }

        let (_, box_max) = fluid_simulation.boundary_handler.extent();
        let lowest = fluid_simulation
            .particles
            .position
            .iter()
            .map(|p| p.y)
            .fold(FT::MIN, FT::max);
        // screen y grows downwards; something must have reached the floor region
        assert!(lowest > box_max.y - 50.);
    }

    #[test]
    fn uniform_block_density_is_near_rest_density() {
        // 15x15 block with spacing 7 -> number density 1/49, with unit mass
        // this must come out close to the configured rest density
        let simulation_params = SimulationParams {
            gravity: 0.,
            ..SimulationParams::default()
        };

        let spacing = 7.;
        let mut positions = Vec::new();
        for y in 0..15 {
            for x in 0..15 {
                positions.push(vec2f(200. + x as FT * spacing, 200. + y as FT * spacing));
            }
        }
        let velocities = vec![V2::zeros(); positions.len()];
        let boundary_handler: BoundaryHandler = BoxBoundary::new(vec2f(0., 0.), vec2f(500., 500.), 2.).into();
        let mut fluid_simulation = FluidSimulation::new(positions, velocities, boundary_handler, false);

        fluid_simulation.single_step(simulation_params);

        // center particle of the block
        let center = 7 * 15 + 7;
        let density = fluid_simulation.particles.density[center];
        let expected = 1. / (spacing * spacing);
        assert_ft_approx_eq(density, expected, expected * 0.2, || "center density".to_string());
    }

    #[test]
    fn shipped_config_files_parse() {
        let dir = env!("CARGO_MANIFEST_DIR");

        let params_yaml = std::fs::read_to_string(format!("{}/config/simulation.yaml", dir)).unwrap();
        let simulation_params: SimulationParams = serde_yaml::from_str(&params_yaml).unwrap();
        assert!(simulation_params.timestep > 0.);
        assert!(simulation_params.target_fps > 0);

        let scene_yaml = std::fs::read_to_string(format!("{}/config/scene.yaml", dir)).unwrap();
        let scene_config: SceneConfig = serde_yaml::from_str(&scene_yaml).unwrap();
        assert!(scene_config.particles.count > 0);
    }
}
