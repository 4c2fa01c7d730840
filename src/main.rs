use clap::{Arg, Command};
use log::error;

use mapsims::{MapSim, Result, SimConfig};

fn run(config_files: &[&str]) -> Result<()> {
    let cfg = SimConfig::from_files(config_files)?;
    let sim = MapSim::from_config(&cfg)?;
    let written = sim.write_outputs()?;
    println!("{} maps written to {}", written.len(), sim.output_folder().display());
    Ok(())
}

pub fn main() {
    env_logger::init();
    let matches = Command::new("mapsims")
        .about("Execute map based simulations for Simons Observatory")
        .arg(
            Arg::new("config")
                .takes_value(true)
                .multiple_values(true)
                .value_name("config.yaml")
                .required(true)
                .help("configuration files, later ones override earlier ones"),
        )
        .get_matches();

    let config_files: Vec<&str> = matches
        .values_of("config")
        .map(|v| v.collect())
        .unwrap_or_default();
    if let Err(e) = run(&config_files) {
        error!("{}", e);
        std::process::exit(1);
    }
}
