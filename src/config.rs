use std::{fs::File, path::Path};

use serde::{Deserialize, Serialize};
use serde_yaml::{from_reader, from_value, Mapping, Value};

use crate::{
    channel::{parse_channels, Channel},
    error::{MapsimsError, Result},
    healpix::check_nside,
    noise::NoiseConfig,
    units::Unit,
};

pub const DEFAULT_OUTPUT_FILENAME_TEMPLATE: &str = "simonsobs_{telescope}{band:03}_nside{nside}.fits";

/// Channels either as one selection string (`all`, `SA`, `LA_27,SA_93`) or
/// as a list of channel labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelList {
    Selection(String),
    Labels(Vec<String>),
}

impl ChannelList {
    pub fn resolve(&self) -> Result<Vec<Channel>> {
        match self {
            ChannelList::Selection(s) => parse_channels(s),
            ChannelList::Labels(labels) if labels.is_empty() => Err(MapsimsError::InvalidConfig(
                "empty channel list".to_string(),
            )),
            ChannelList::Labels(labels) => labels.iter().map(|l| l.parse::<Channel>()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    pub nside: usize,
    pub unit: Unit,
    pub channels: ChannelList,
    pub tag: String,
    pub output_folder: String,
    pub output_filename_template: String,
    pub seed: Option<u64>,
    /// Noise component settings; no noise is added when absent.
    pub noise: Option<NoiseConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            nside: 16,
            unit: Unit::UKCmb,
            channels: ChannelList::Selection("SA".to_string()),
            tag: "mapsim".to_string(),
            output_folder: "output".to_string(),
            output_filename_template: DEFAULT_OUTPUT_FILENAME_TEMPLATE.to_string(),
            seed: None,
            noise: Some(NoiseConfig::default()),
        }
    }
}

/// Recursively merge `overlay` into `base`. Mappings merge key by key,
/// everything else is replaced.
pub fn merge_yaml(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (k, v) in overlay {
                match base.get_mut(&k) {
                    Some(existing) => merge_yaml(existing, v),
                    None => {
                        base.insert(k, v);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

impl SimConfig {
    pub fn from_value(value: Value) -> Result<Self> {
        let cfg: SimConfig =
            from_value(value).map_err(|e| MapsimsError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load one or more YAML files, later files overriding earlier ones.
    pub fn from_files<P: AsRef<Path>>(files: &[P]) -> Result<Self> {
        if files.is_empty() {
            return Err(MapsimsError::InvalidConfig(
                "no configuration file given".to_string(),
            ));
        }
        let mut merged = Value::Mapping(Mapping::new());
        for f in files {
            let value: Value = from_reader(File::open(f.as_ref())?)?;
            // an empty document parses as null
            if !value.is_null() {
                merge_yaml(&mut merged, value);
            }
        }
        SimConfig::from_value(merged)
    }

    pub fn validate(&self) -> Result<()> {
        check_nside(self.nside)?;
        self.channels.resolve()?;
        if let Some(noise) = &self.noise {
            noise.validate()?;
        }
        Ok(())
    }
}
