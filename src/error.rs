use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapsimsError {
    #[error("Unknown telescope '{0}', expected LA or SA")]
    UnknownTelescope(String),

    #[error("Unknown sensitivity mode '{0}', expected baseline or goal")]
    UnknownSensitivityMode(String),

    #[error("Unknown 1/f mode '{0}', expected pessimistic, optimistic or none")]
    UnknownOneOverFMode(String),

    #[error("Band '{band}' is not available on the {telescope} telescope")]
    UnknownBand { telescope: String, band: String },

    #[error("Unknown unit '{0}', expected one of K_CMB, uK_CMB, K_RJ, uK_RJ")]
    UnknownUnit(String),

    #[error("Invalid NSIDE {0}, must be a positive power of two")]
    InvalidNside(usize),

    #[error("{0} is not a valid HEALPix pixel count")]
    InvalidPixelCount(usize),

    #[error("Spectra cover {available} multipoles but NSIDE {nside} needs {required}")]
    ResolutionMismatch {
        nside: usize,
        required: usize,
        available: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Scanning strategy '{0}' is neither an existing file nor a packaged hit map")]
    MissingResource(String),

    #[error("Hit-count map has no observed pixels")]
    EmptyHitmap,

    #[error("Malformed map file {path:?}: {reason}")]
    MalformedMap { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("FITS I/O error: {0}")]
    Fits(#[from] fitsio::errors::Error),
}

impl MapsimsError {
    /// True for errors caused by an invalid instrument or run configuration.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            MapsimsError::UnknownTelescope(_)
                | MapsimsError::UnknownSensitivityMode(_)
                | MapsimsError::UnknownOneOverFMode(_)
                | MapsimsError::UnknownBand { .. }
                | MapsimsError::UnknownUnit(_)
                | MapsimsError::InvalidNside(_)
                | MapsimsError::InvalidPixelCount(_)
                | MapsimsError::ResolutionMismatch { .. }
                | MapsimsError::InvalidConfig(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MapsimsError>;
