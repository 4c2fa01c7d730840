//! Run a set of map components over a list of channels and write the
//! summed maps to disk.

use std::{fs::create_dir_all, path::PathBuf};

use log::info;

use crate::{
    channel::Channel,
    config::{SimConfig, DEFAULT_OUTPUT_FILENAME_TEMPLATE},
    error::Result,
    healpix::check_nside,
    io::write_map,
    noise::{NoiseConfig, NoiseSimulator, PolMap},
    units::Unit,
};

/// Anything that produces a T, Q, U map for a channel.
pub trait MapComponent {
    fn simulate(&self, channel: Channel, unit: Unit) -> Result<PolMap>;
}

/// Instrument noise, one independent realization per channel.
pub struct NoiseComponent {
    nside: usize,
    config: NoiseConfig,
    seed: Option<u64>,
}

impl NoiseComponent {
    pub fn new(nside: usize, config: NoiseConfig, seed: Option<u64>) -> Result<Self> {
        check_nside(nside)?;
        config.validate()?;
        Ok(NoiseComponent {
            nside,
            config,
            seed,
        })
    }

    /// Seed of `channel`: `base * n_channels + index` through SplitMix64, so
    /// distinct (base, channel) pairs never share a stream.
    pub fn channel_seed(&self, channel: Channel) -> Option<u64> {
        let all = Channel::all();
        let index = all.iter().position(|&c| c == channel).unwrap_or_default() as u64;
        self.seed
            .map(|s| splitmix64(s.wrapping_mul(all.len() as u64).wrapping_add(index)))
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

impl MapComponent for NoiseComponent {
    fn simulate(&self, channel: Channel, unit: Unit) -> Result<PolMap> {
        let config = NoiseConfig {
            unit,
            ..self.config.clone()
        };
        NoiseSimulator::new(channel, self.nside, &config)?.simulate(self.channel_seed(channel))
    }
}

/// Substitute `{telescope}`, `{band}`, `{band:03}`, `{nside}` and `{tag}`.
pub fn format_output_name(template: &str, channel: Channel, nside: usize, tag: &str) -> String {
    template
        .replace("{telescope}", &channel.telescope().tag().to_lowercase())
        .replace("{band:03}", &format!("{:03}", channel.band()))
        .replace("{band}", &channel.band().to_string())
        .replace("{nside}", &nside.to_string())
        .replace("{tag}", tag)
}

pub struct MapSim {
    channels: Vec<Channel>,
    nside: usize,
    unit: Unit,
    tag: String,
    output_folder: String,
    output_filename_template: String,
    components: Vec<Box<dyn MapComponent>>,
}

impl MapSim {
    pub fn new(channels: Vec<Channel>, nside: usize, unit: Unit) -> Result<Self> {
        check_nside(nside)?;
        Ok(MapSim {
            channels,
            nside,
            unit,
            tag: "mapsim".to_string(),
            output_folder: "output".to_string(),
            output_filename_template: DEFAULT_OUTPUT_FILENAME_TEMPLATE.to_string(),
            components: Vec::new(),
        })
    }

    pub fn from_config(cfg: &SimConfig) -> Result<Self> {
        cfg.validate()?;
        let mut sim = MapSim::new(cfg.channels.resolve()?, cfg.nside, cfg.unit)?
            .with_tag(&cfg.tag)
            .with_output_folder(&cfg.output_folder)
            .with_output_filename_template(&cfg.output_filename_template);
        if let Some(noise) = &cfg.noise {
            sim.add_component(Box::new(NoiseComponent::new(
                cfg.nside,
                noise.clone(),
                cfg.seed,
            )?));
        }
        Ok(sim)
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_string();
        self
    }

    /// Output folder; may contain `{nside}` and `{tag}`.
    pub fn with_output_folder(mut self, folder: &str) -> Self {
        self.output_folder = folder.to_string();
        self
    }

    pub fn with_output_filename_template(mut self, template: &str) -> Self {
        self.output_filename_template = template.to_string();
        self
    }

    pub fn add_component(&mut self, component: Box<dyn MapComponent>) {
        self.components.push(component);
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn output_folder(&self) -> PathBuf {
        PathBuf::from(
            self.output_folder
                .replace("{nside}", &self.nside.to_string())
                .replace("{tag}", &self.tag),
        )
    }

    pub fn output_path(&self, channel: Channel) -> PathBuf {
        self.output_folder().join(format_output_name(
            &self.output_filename_template,
            channel,
            self.nside,
            &self.tag,
        ))
    }

    fn simulate_channel(&self, channel: Channel) -> Result<PolMap> {
        let mut total = PolMap::zeros(self.nside);
        for component in self.components.iter() {
            total.accumulate(&component.simulate(channel, self.unit)?)?;
        }
        Ok(total)
    }

    /// Maps of every channel, kept in memory.
    pub fn execute(&self) -> Result<Vec<(Channel, PolMap)>> {
        self.channels
            .iter()
            .map(|&ch| -> Result<(Channel, PolMap)> { Ok((ch, self.simulate_channel(ch)?)) })
            .collect()
    }

    /// Simulate and write one file per channel, returning the paths.
    pub fn write_outputs(&self) -> Result<Vec<PathBuf>> {
        let folder = self.output_folder();
        create_dir_all(&folder)?;
        self.channels
            .iter()
            .map(|&ch| -> Result<PathBuf> {
                let map = self.simulate_channel(ch)?;
                let path = self.output_path(ch);
                write_map(&path, &map.components())?;
                info!("{} written to {}", ch, path.display());
                Ok(path)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Telescope;
    use std::collections::HashSet;

    struct Constant(f64);

    impl MapComponent for Constant {
        fn simulate(&self, _channel: Channel, _unit: Unit) -> Result<PolMap> {
            let mut m = PolMap::zeros(2);
            m.t.iter_mut().for_each(|x| *x = self.0);
            Ok(m)
        }
    }

    #[test]
    fn test_output_names() {
        let ch = Channel::new(Telescope::LargeAperture, 27).unwrap();
        assert_eq!(
            format_output_name(DEFAULT_OUTPUT_FILENAME_TEMPLATE, ch, 16, "x"),
            "simonsobs_la027_nside16.fits"
        );
        assert_eq!(
            format_output_name("{tag}/{telescope}_{band}.fits", ch, 16, "run1"),
            "run1/la_27.fits"
        );
        let sim = MapSim::new(vec![ch], 16, Unit::UKCmb)
            .unwrap()
            .with_tag("cmb")
            .with_output_folder("out_{nside}_{tag}");
        assert_eq!(
            sim.output_path(ch),
            PathBuf::from("out_16_cmb/simonsobs_la027_nside16.fits")
        );
    }

    #[test]
    fn test_components_are_summed() {
        let ch = Channel::new(Telescope::SmallAperture, 93).unwrap();
        let mut sim = MapSim::new(vec![ch], 2, Unit::UKCmb).unwrap();
        sim.add_component(Box::new(Constant(1.5)));
        sim.add_component(Box::new(Constant(2.0)));
        let out = sim.execute().unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].1.t.iter().all(|&x| x == 3.5));
        assert!(out[0].1.q.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_channel_seeds_differ() {
        let noise = NoiseComponent::new(8, NoiseConfig::default(), Some(10)).unwrap();
        let la27 = Channel::new(Telescope::LargeAperture, 27).unwrap();
        let sa27 = Channel::new(Telescope::SmallAperture, 27).unwrap();
        assert_eq!(noise.channel_seed(la27), Some(213235391877949750));
        assert_eq!(noise.channel_seed(sa27), Some(12978548834978922355));
        let unseeded = NoiseComponent::new(8, NoiseConfig::default(), None).unwrap();
        assert_eq!(unseeded.channel_seed(la27), None);
    }

    #[test]
    fn test_neighbouring_runs_do_not_share_seeds() {
        let mut seen = HashSet::new();
        for base in 0..64 {
            let noise = NoiseComponent::new(8, NoiseConfig::default(), Some(base)).unwrap();
            for channel in Channel::all() {
                assert!(seen.insert(noise.channel_seed(channel)), "{} {}", base, channel);
            }
        }
        assert_eq!(seen.len(), 64 * 12);
        assert_eq!(splitmix64(0), 16294208416658607535);
    }
}
