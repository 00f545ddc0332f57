use sdl2::{
    event::Event, gfx::primitives::DrawRenderer, keyboard::Keycode, pixels::Color, rect::Rect, EventPump,
};

use crate::{
    boundary::BoundaryHandlerTrait, color_map::color_map_viridis, floating_type_mod::FT, FluidSimulation, SceneConfig,
};

use super::screenshot::capture_screenshot;

// lower bound for the color ramp so a resting fluid is not colored by noise
const MIN_COLOR_SPEED: FT = 1.;

pub struct SimulationWindow {
    event_pump: EventPump,
    canvas: sdl2::render::WindowCanvas,
}

impl SimulationWindow {
    pub fn new(scene_config: &SceneConfig) -> Result<Self, String> {
        let sdl_context = sdl2::init()?;
        let video_subsystem = sdl_context.video()?;
        let window = video_subsystem
            .window("fluidbox", scene_config.window.width, scene_config.window.height)
            .position_centered()
            .opengl()
            .build()
            .map_err(|e| e.to_string())?;

        let canvas = window.into_canvas().build().map_err(|e| e.to_string())?;
        let event_pump = sdl_context.event_pump()?;

        Ok(SimulationWindow { event_pump, canvas })
    }

    /**
     * Draw one frame. Returns false when the window was closed or Escape
     * was pressed.
     */
    pub fn present(
        &mut self,
        fluid_simulation: &FluidSimulation,
        scene_config: &SceneConfig,
        simulation_failed: bool,
    ) -> Result<bool, String> {
        let canvas = &mut self.canvas;

        for event in self.event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => return Ok(false),
                Event::KeyDown {
                    keycode: Some(Keycode::F12),
                    ..
                } => {
                    capture_screenshot("./screenshot", canvas)?;
                }
                _ => {}
            }
        }

        canvas.set_draw_color(Color::BLACK);
        canvas.clear();

        // box walls, 2 pixels wide
        let (box_min, box_max) = fluid_simulation.boundary_handler.extent();
        canvas.set_draw_color(if simulation_failed { Color::RED } else { Color::WHITE });
        for inset in 0..2i32 {
            canvas.draw_rect(Rect::new(
                box_min.x as i32 + inset,
                box_min.y as i32 + inset,
                (box_max.x - box_min.x) as u32 - 2 * inset as u32,
                (box_max.y - box_min.y) as u32 - 2 * inset as u32,
            ))?;
        }

        let particles = &fluid_simulation.particles;
        let max_speed = particles
            .velocity
            .iter()
            .map(|v| v.norm())
            .fold(MIN_COLOR_SPEED, FT::max);
        let color_map = color_map_viridis(0., max_speed);

        let draw_radius = scene_config.particles.draw_radius.round() as i16;
        for i in 0..fluid_simulation.num_fluid_particles() {
            let position = particles.position[i];
            let rgb = color_map.get_u8(particles.velocity[i].norm());
            canvas.filled_circle(
                position.x.round() as i16,
                position.y.round() as i16,
                draw_radius,
                Color::RGB(rgb[0], rgb[1], rgb[2]),
            )?;
        }

        canvas.present();
        Ok(true)
    }
}
