//! Simulated instrument noise maps for the Simons Observatory telescopes.
//!
//! The analytic noise spectra of a channel are turned into T, Q, U HEALPix
//! maps whose depth follows the hit-count map of a scanning strategy.

pub mod channel;
pub mod config;
pub mod constants;
pub mod error;
pub mod fft;
pub mod healpix;
pub mod hitmap;
pub mod io;
pub mod noise;
pub mod runner;
pub mod sht;
pub mod so_noise;
pub mod units;

pub use crate::{
    channel::{parse_channels, Channel, Telescope},
    config::SimConfig,
    constants::UNSEEN,
    error::{MapsimsError, Result},
    hitmap::HitMap,
    noise::{NoiseConfig, NoiseSimulator, PolMap},
    runner::{MapComponent, MapSim, NoiseComponent},
    so_noise::{OneOverFMode, SensitivityMode},
    units::Unit,
};
