use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    time::{Duration, Instant},
};

use clap::{App, AppSettings, Arg, SubCommand};

use crate::{
    floating_type_mod::FT, init_fluid_sim, simulation_parameters::SimulationParams, write_statistics, SceneConfig,
};

use super::rendering::SimulationWindow;

const CARGO_PKG_VERSION: &'static str = env!("CARGO_PKG_VERSION");
const CARGO_PKG_DESCRIPTION: &'static str = env!("CARGO_PKG_DESCRIPTION");

pub fn start() {
    let matches = App::new("fluidbox")
        .version(CARGO_PKG_VERSION)
        .about(CARGO_PKG_DESCRIPTION)
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("run")
                .about("Run simulation with given config")
                .arg(
                    Arg::with_name("SIMULATION_CONFIG")
                        .help("Sets the simulation parameters")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("SCENE_CONFIG")
                        .help("Scene setup")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::with_name("MAX_SECONDS")
                        .long("max-seconds")
                        .short("s")
                        .required(false)
                        .takes_value(true)
                        .help("Stop simulation after the given amount of simulated seconds"),
                )
                .arg(
                    Arg::with_name("STATISTICS_ENABLED")
                        .help("Track performance of individual steps")
                        .short("p")
                        .long("statistics-enabled")
                        .takes_value(false),
                ),
        )
        .get_matches();

    if let Some(run_matches) = matches.subcommand_matches("run") {
        let parameter_file = run_matches
            .value_of("SIMULATION_CONFIG")
            .expect("missing simulation config");
        let params_yaml = std::fs::read_to_string(parameter_file).expect("failed reading parameter file");
        let simulation_params: SimulationParams =
            serde_yaml::from_str(&params_yaml).expect("failed parsing simulation config file");
        println!("{:?}", simulation_params);

        let scene_file_path = run_matches.value_of("SCENE_CONFIG").expect("missing scene config");
        let scene_yaml = std::fs::read_to_string(scene_file_path).expect("failed reading scene file");
        let scene_config: SceneConfig = serde_yaml::from_str(&scene_yaml).expect("failed parsing scene config file");
        println!("{:?}", scene_config);

        let max_seconds = run_matches
            .value_of("MAX_SECONDS")
            .map(|x| x.parse::<FT>().expect("--max-seconds must be a number"));
        let counters_enabled = run_matches.is_present("STATISTICS_ENABLED");

        if let Err(error) = fluid_main(simulation_params, &scene_config, max_seconds, counters_enabled) {
            eprintln!("error: {}", error);
            std::process::exit(1);
        }
    } else {
        unreachable!()
    }
}

fn fluid_main(
    simulation_params: SimulationParams,
    scene_config: &SceneConfig,
    max_seconds: Option<FT>,
    counters_enabled: bool,
) -> Result<(), String> {
    let mut fluid_simulation = init_fluid_sim(simulation_params, scene_config, counters_enabled);
    let mut window = SimulationWindow::new(scene_config)?;

    let frame_budget = Duration::from_secs_f64(1. / simulation_params.target_fps as f64);
    let mut total_duration: Duration = Duration::from_nanos(0);
    let mut frame_number: u32 = 0;
    let mut simulation_failed = false;

    loop {
        let frame_start = Instant::now();

        let continue_simulation = window.present(&fluid_simulation, scene_config, simulation_failed)?;
        if !continue_simulation {
            break;
        }

        if !simulation_failed {
            let a = Instant::now();
            simulation_failed = catch_unwind(AssertUnwindSafe(|| {
                fluid_simulation.single_step(simulation_params);
            }))
            .is_err();
            let b = Instant::now();

            total_duration += b - a;
            frame_number += 1;

            if frame_number % 60 == 0 {
                println!(
                    "{:05}: {} fluid particles {:.2}msec ({:.2}msec AVG)",
                    frame_number,
                    fluid_simulation.num_fluid_particles(),
                    (b - a).as_secs_f32() * 1000.,
                    (total_duration / frame_number).as_secs_f32() * 1000.
                );
            }
        }

        if let Some(max_seconds) = max_seconds {
            if fluid_simulation.time >= max_seconds {
                break;
            }
        }

        // frame rate cap
        let elapsed = frame_start.elapsed();
        if elapsed < frame_budget {
            std::thread::sleep(frame_budget - elapsed);
        }
    }

    if counters_enabled {
        print!("{}", write_statistics(&fluid_simulation));
    }

    Ok(())
}
