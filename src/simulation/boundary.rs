use enum_dispatch::enum_dispatch;

use crate::{floating_type_mod::FT, simulation_parameters::SimulationParams, V2};

#[enum_dispatch]
pub trait BoundaryHandlerTrait {
    /**
     * Clamp a particle back into the domain and reflect its velocity.
     * Called after position integration.
     */
    fn enforce(&self, position: &mut V2, velocity: &mut V2, simulation_params: SimulationParams);

    /** Domain walls as (min, max) corners, for rendering. */
    fn extent(&self) -> (V2, V2);
}

#[enum_dispatch(BoundaryHandlerTrait)]
pub enum BoundaryHandler {
    BoxBoundary,
}

/**
 * Axis-aligned box. Particles collide with the walls using their draw
 * radius, so a clamped particle circle touches the wall from the inside.
 */
pub struct BoxBoundary {
    min: V2,
    max: V2,
    particle_radius: FT,
}

impl BoxBoundary {
    pub fn new(min: V2, max: V2, particle_radius: FT) -> Self {
        assert!(min.x < max.x && min.y < max.y);
        assert!(particle_radius > 0.);
        BoxBoundary {
            min,
            max,
            particle_radius,
        }
    }
}

impl BoundaryHandlerTrait for BoxBoundary {
    fn enforce(&self, position: &mut V2, velocity: &mut V2, simulation_params: SimulationParams) {
        for d in 0..2 {
            let wall_min = self.min[d] + self.particle_radius;
            let wall_max = self.max[d] - self.particle_radius;

            let mut collided = false;
            if position[d] <= wall_min {
                position[d] = wall_min;
                collided = true;
            } else if position[d] >= wall_max {
                position[d] = wall_max;
                collided = true;
            }

            if collided {
                velocity[d] *= -simulation_params.damping;
                // stop micro-bounces so settled particles come to rest
                if velocity[d].abs() < simulation_params.min_bounce_velocity {
                    velocity[d] = 0.;
                }
            }
        }
    }

    fn extent(&self) -> (V2, V2) {
        (self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec2f;

    fn test_boundary() -> BoxBoundary {
        BoxBoundary::new(vec2f(100., 100.), vec2f(900., 700.), 2.)
    }

    fn test_params() -> SimulationParams {
        SimulationParams {
            damping: 0.8,
            min_bounce_velocity: 1.,
            ..SimulationParams::default()
        }
    }

    #[test]
    fn particle_is_clamped_to_wall() {
        let boundary = test_boundary();
        let mut position = vec2f(95., 400.);
        let mut velocity = vec2f(-50., 0.);
        boundary.enforce(&mut position, &mut velocity, test_params());
        assert_eq!(position, vec2f(102., 400.));
    }

    #[test]
    fn velocity_is_reflected_and_damped() {
        let boundary = test_boundary();
        let mut position = vec2f(400., 710.);
        let mut velocity = vec2f(3., 50.);
        boundary.enforce(&mut position, &mut velocity, test_params());
        assert_eq!(position.y, 698.);
        crate::assert_ft_approx_eq(velocity.y, -40., 1e-3, || "reflected velocity".to_string());
        // the x axis did not collide
        assert_eq!(velocity.x, 3.);
    }

    #[test]
    fn slow_bounces_come_to_rest() {
        let boundary = test_boundary();
        let mut position = vec2f(400., 699.);
        let mut velocity = vec2f(0., 1.);
        boundary.enforce(&mut position, &mut velocity, test_params());
        assert_eq!(velocity.y, 0.);
        assert_eq!(position.y, 698.);
    }

    #[test]
    fn interior_particle_is_untouched() {
        let boundary = test_boundary();
        let mut position = vec2f(400., 400.);
        let mut velocity = vec2f(10., -10.);
        boundary.enforce(&mut position, &mut velocity, test_params());
        assert_eq!(position, vec2f(400., 400.));
        assert_eq!(velocity, vec2f(10., -10.));
    }
}
