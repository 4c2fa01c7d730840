use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{MapsimsError, Result};

/// Nominal band centres in GHz, shared by both telescopes.
pub const BANDS: [u32; 6] = [27, 39, 93, 145, 225, 280];

/// Beam FWHM in arcmin, per band.
const LA_BEAMS_ARCMIN: [f64; 6] = [7.4, 5.1, 2.2, 1.4, 1.0, 0.9];
const SA_BEAMS_ARCMIN: [f64; 6] = [91.0, 63.0, 30.0, 17.0, 11.0, 9.0];

const BAND_LABELS: [(&str, u32); 8] = [
    ("LF1", 27),
    ("LF2", 39),
    ("MFF1", 93),
    ("MFF2", 145),
    ("MFS1", 93),
    ("MFS2", 145),
    ("UHF1", 225),
    ("UHF2", 280),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Telescope {
    #[serde(rename = "LA")]
    LargeAperture,
    #[serde(rename = "SA")]
    SmallAperture,
}

impl Telescope {
    pub const ALL: [Telescope; 2] = [Telescope::LargeAperture, Telescope::SmallAperture];

    pub fn tag(&self) -> &'static str {
        match self {
            Telescope::LargeAperture => "LA",
            Telescope::SmallAperture => "SA",
        }
    }

    pub fn bands(&self) -> &'static [u32] {
        &BANDS
    }

    pub fn beams_arcmin(&self) -> &'static [f64] {
        match self {
            Telescope::LargeAperture => &LA_BEAMS_ARCMIN,
            Telescope::SmallAperture => &SA_BEAMS_ARCMIN,
        }
    }

    /// Row of `band` in this telescope's band list; exact match only.
    pub fn band_index(&self, band: u32) -> Result<usize> {
        self.bands()
            .iter()
            .position(|&b| b == band)
            .ok_or_else(|| MapsimsError::UnknownBand {
                telescope: self.tag().to_string(),
                band: band.to_string(),
            })
    }
}

impl fmt::Display for Telescope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Telescope {
    type Err = MapsimsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LA" | "LAT" | "LARGE-APERTURE" => Ok(Telescope::LargeAperture),
            "SA" | "SAT" | "SMALL-APERTURE" => Ok(Telescope::SmallAperture),
            _ => Err(MapsimsError::UnknownTelescope(s.to_string())),
        }
    }
}

/// Band given either as integer GHz or as a symbolic label such as `MFF2`.
pub fn parse_band(telescope: Telescope, label: &str) -> Result<u32> {
    let label = label.trim();
    let band = match label.parse::<u32>() {
        Ok(ghz) => Some(ghz),
        Err(_) => BAND_LABELS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(label))
            .map(|&(_, ghz)| ghz),
    };
    match band {
        Some(b) if telescope.bands().contains(&b) => Ok(b),
        _ => Err(MapsimsError::UnknownBand {
            telescope: telescope.tag().to_string(),
            band: label.to_string(),
        }),
    }
}

/// One detector band on one telescope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel {
    telescope: Telescope,
    band: u32,
}

impl Channel {
    pub fn new(telescope: Telescope, band: u32) -> Result<Self> {
        telescope.band_index(band)?;
        Ok(Channel { telescope, band })
    }

    pub fn from_labels(telescope: &str, band: &str) -> Result<Self> {
        let telescope = telescope.parse::<Telescope>()?;
        let band = parse_band(telescope, band)?;
        Channel::new(telescope, band)
    }

    pub fn telescope(&self) -> Telescope {
        self.telescope
    }

    pub fn band(&self) -> u32 {
        self.band
    }

    pub fn band_index(&self) -> usize {
        // validated on construction
        self.telescope.band_index(self.band).unwrap_or_default()
    }

    pub fn center_frequency_ghz(&self) -> f64 {
        self.band as f64
    }

    pub fn beam_fwhm_arcmin(&self) -> f64 {
        self.telescope.beams_arcmin()[self.band_index()]
    }

    /// Every channel of every telescope, LA first.
    pub fn all() -> Vec<Channel> {
        Telescope::ALL
            .iter()
            .flat_map(|&t| t.bands().iter().map(move |&band| Channel { telescope: t, band }))
            .collect()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.telescope, self.band)
    }
}

impl FromStr for Channel {
    type Err = MapsimsError;

    fn from_str(s: &str) -> Result<Self> {
        let (telescope, band) = s
            .trim()
            .split_once('_')
            .ok_or_else(|| MapsimsError::InvalidConfig(format!("malformed channel label '{}'", s)))?;
        Channel::from_labels(telescope, band)
    }
}

/// Expand a channel selection: `all`/`SO`, a telescope tag, or a comma
/// separated list of labels such as `LA_27,SA_MFF2`.
pub fn parse_channels(selection: &str) -> Result<Vec<Channel>> {
    let selection = selection.trim();
    match selection.to_ascii_uppercase().as_str() {
        "ALL" | "SO" => return Ok(Channel::all()),
        "LA" | "SA" => {
            let telescope = selection.parse::<Telescope>()?;
            return Ok(Channel::all()
                .into_iter()
                .filter(|ch| ch.telescope() == telescope)
                .collect());
        }
        _ => {}
    }
    let channels = selection
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(Channel::from_str)
        .collect::<Result<Vec<_>>>()?;
    if channels.is_empty() {
        return Err(MapsimsError::InvalidConfig("empty channel selection".to_string()));
    }
    Ok(channels)
}
