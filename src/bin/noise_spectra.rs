extern crate mapsims;

use clap::{Arg, ArgMatches, Command};
use log::error;

use mapsims::{Channel, MapsimsError, NoiseConfig, NoiseSimulator, Result};

fn run(matches: &ArgMatches) -> Result<()> {
    let channel = Channel::from_labels(
        matches.value_of("telescope").unwrap_or_default(),
        matches.value_of("band").unwrap_or_default(),
    )?;
    let nside = matches
        .value_of("nside")
        .unwrap_or_default()
        .parse::<usize>()
        .map_err(|e| MapsimsError::InvalidConfig(format!("nside: {}", e)))?;
    let cfg = NoiseConfig {
        scanning_strategy: matches.value_of("strategy").unwrap_or("classical").to_string(),
        sensitivity_mode: matches.value_of("sensitivity").unwrap_or("baseline").parse()?,
        sa_one_over_f_mode: matches.value_of("one_over_f").unwrap_or("pessimistic").parse()?,
        ..NoiseConfig::default()
    };

    let sim = NoiseSimulator::new(channel, nside, &cfg)?;
    println!("# {} {} f_sky={:.6}", channel, sim.unit(), sim.sky_fraction());
    println!("# ell N_T N_P");
    sim.noise_ell_t()
        .iter()
        .zip(sim.noise_ell_p().iter())
        .enumerate()
        .for_each(|(l, (t, p))| println!("{} {:e} {:e}", l, t, p));
    Ok(())
}

fn main() {
    env_logger::init();
    let matches = Command::new("noise_spectra")
        .about("print the noise power spectra of one channel")
        .arg(
            Arg::new("telescope")
                .short('t')
                .long("telescope")
                .takes_value(true)
                .value_name("LA or SA")
                .required(true)
                .help("telescope"),
        )
        .arg(
            Arg::new("band")
                .short('b')
                .long("band")
                .takes_value(true)
                .value_name("band")
                .required(true)
                .help("band in GHz or label, e.g. 145 or MFF2"),
        )
        .arg(
            Arg::new("nside")
                .short('n')
                .long("nside")
                .takes_value(true)
                .value_name("nside")
                .required(true)
                .help("nside"),
        )
        .arg(
            Arg::new("strategy")
                .short('s')
                .long("strategy")
                .takes_value(true)
                .value_name("strategy")
                .default_value("classical")
                .help("scanning strategy name or hit map file"),
        )
        .arg(
            Arg::new("sensitivity")
                .long("sensitivity")
                .takes_value(true)
                .value_name("mode")
                .default_value("baseline")
                .help("baseline or goal"),
        )
        .arg(
            Arg::new("one_over_f")
                .long("one-over-f")
                .takes_value(true)
                .value_name("mode")
                .default_value("pessimistic")
                .help("SA 1/f mode: pessimistic, optimistic or none"),
        )
        .get_matches();

    let result = run(&matches);
    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}
