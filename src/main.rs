use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{crate_version, value_parser, Arg, Command};
use env_logger::Builder;
use log::{info, warn, LevelFilter};

use frequency_response::defaults::{CONFIG_FILE_NAME, OUTPUT_FILE_NAME};
use frequency_response::io::{checkpoint, read_input, write_header, Configuration};
use frequency_response::parallel::{Communicator, SerialWorld};
use frequency_response::response::{
    Diagnostics, FrequencySolver, ModelProblem, ResponseResult, ResponseState, SolverParameters,
    StageDiagnostics, TransitionDensity,
};

fn main() -> Result<()> {
    let matches = Command::new("frequency-response")
        .version(crate_version!())
        .about("frequency-dependent linear response of a one-dimensional model system")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .takes_value(true)
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration, written with all defaults if it does not exist"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("JSON file for the iteration diagnostics"),
        )
        .get_matches();
    let config_file: PathBuf = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    let output_file: PathBuf = matches
        .get_one::<PathBuf>("output")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(OUTPUT_FILE_NAME));

    let config: Configuration = read_input(&config_file)
        .with_context(|| format!("could not read {}", config_file.display()))?;

    let level: LevelFilter = match config.response.print_level {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    Builder::new()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .filter(None, level)
        .init();
    write_header();

    let problem: ModelProblem = ModelProblem::from_config(&config.model, config.response.calc_type)
        .context("could not set up the model system")?;
    let params: SolverParameters = SolverParameters::from(&config.response);
    let pq: ResponseState = problem.perturbation(params.omega != 0.0)?;
    let world: SerialWorld = SerialWorld::new();
    info!("{: <25} {}", "processes:", world.size());
    let density: TransitionDensity = TransitionDensity::new(&problem.ground);
    let solver = FrequencySolver::new(
        &problem.model,
        &density,
        &world,
        &problem.ground,
        &problem.grid,
        &pq,
        params,
    )
    .context("invalid response parameters")?;

    let initial: ResponseState = if config.response.restart {
        let path: &Path = Path::new(&config.response.restart_file);
        info!("{: <25} {}", "restart from:", path.display());
        checkpoint::load(&world, path, pq.num_states(), pq.num_orbitals())
            .with_context(|| format!("could not restart from {}", path.display()))?
    } else {
        solver.initial_guess()
    };

    let stages = config.response.protocol_stages();
    let results: Vec<ResponseResult> = solver.solve_protocol(initial, &stages)?;

    let mut diagnostics: Diagnostics = Diagnostics::new(config.response.frequency);
    for (stage, result) in stages.iter().zip(results.iter()) {
        diagnostics.stages.push(StageDiagnostics {
            thresh: stage.thresh,
            status: format!("{:?}", result.status),
            iterations: result.records.clone(),
        });
    }
    diagnostics
        .write_json(&output_file)
        .with_context(|| format!("could not write {}", output_file.display()))?;
    info!("{: <25} {}", "diagnostics written to:", output_file.display());

    match results.last() {
        Some(result) if result.is_converged() => info!("{: ^80}", "response calculation finished"),
        Some(result) => warn!("response calculation ended with status {:?}", result.status),
        None => {}
    }
    Ok(())
}
