extern crate mapsims;

use std::fs::File;

use clap::{Arg, Command};
use serde_yaml::to_writer;

use mapsims::SimConfig;

fn main() {
    env_logger::init();
    let matches = Command::new("default_cfg")
        .about("write the default simulation configuration")
        .arg(
            Arg::new("outfile")
                .short('o')
                .long("out")
                .takes_value(true)
                .value_name("outfile")
                .default_value("mapsims.yaml")
                .help("output yaml file"),
        )
        .get_matches();

    let out_file_name = matches.value_of("outfile").unwrap_or_default();
    let written = File::create(out_file_name)
        .map_err(mapsims::MapsimsError::from)
        .and_then(|mut outfile| Ok(to_writer(&mut outfile, &SimConfig::default())?));
    if let Err(e) = written {
        log::error!("cannot write {}: {}", out_file_name, e);
        std::process::exit(1);
    }
}
