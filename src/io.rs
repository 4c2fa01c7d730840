//! HEALPix maps as FITS binary tables.
//!
//! A map is the first extension of the file: one row per pixel in RING
//! order and one double column per component (`TEMPERATURE`,
//! `Q_POLARISATION`, `U_POLARISATION`), with the `PIXTYPE`, `ORDERING`
//! and `NSIDE` keywords healpy writes. UNSEEN pixels are stored as is.

use std::path::Path;

use fitsio::{
    hdu::HduInfo,
    tables::{ColumnDataType, ColumnDescription},
    FitsFile,
};

use crate::{
    error::{MapsimsError, Result},
    healpix::npix2nside,
};

pub const COLUMN_NAMES: [&str; 3] = ["TEMPERATURE", "Q_POLARISATION", "U_POLARISATION"];

/// Write one to three full-sky RING components, overwriting `path`.
pub fn write_map<P: AsRef<Path>>(path: P, components: &[&[f64]]) -> Result<()> {
    if components.is_empty() || components.len() > COLUMN_NAMES.len() {
        return Err(MapsimsError::InvalidConfig(format!(
            "a map has 1 to {} components, got {}",
            COLUMN_NAMES.len(),
            components.len()
        )));
    }
    let npix = components[0].len();
    let nside = npix2nside(npix)?;
    if components.iter().any(|c| c.len() != npix) {
        return Err(MapsimsError::InvalidConfig(
            "map components differ in length".to_string(),
        ));
    }

    let columns = COLUMN_NAMES[..components.len()]
        .iter()
        .map(|name| {
            ColumnDescription::new(*name)
                .with_type(ColumnDataType::Double)
                .create()
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut fptr = FitsFile::create(path.as_ref()).overwrite().open()?;
    let hdu = fptr.create_table("xtension".to_string(), &columns)?;
    for (name, values) in COLUMN_NAMES.iter().zip(components.iter()) {
        hdu.write_col(&mut fptr, *name, &values[..])?;
    }
    hdu.write_key(&mut fptr, "PIXTYPE", "HEALPIX")?;
    hdu.write_key(&mut fptr, "ORDERING", "RING")?;
    hdu.write_key(&mut fptr, "INDXSCHM", "IMPLICIT")?;
    hdu.write_key(&mut fptr, "OBJECT", "FULLSKY")?;
    hdu.write_key(&mut fptr, "NSIDE", nside as i64)?;
    hdu.write_key(&mut fptr, "FIRSTPIX", 0_i64)?;
    hdu.write_key(&mut fptr, "LASTPIX", npix as i64 - 1)?;
    Ok(())
}

/// Every component of a map file, at most three.
pub fn read_map<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<f64>>> {
    read_columns(path.as_ref(), COLUMN_NAMES.len())
}

/// First component of a map file, the usual layout of hit-count maps.
pub fn read_first_component<P: AsRef<Path>>(path: P) -> Result<Vec<f64>> {
    let mut components = read_columns(path.as_ref(), 1)?;
    Ok(components.swap_remove(0))
}

fn read_columns(path: &Path, max_columns: usize) -> Result<Vec<Vec<f64>>> {
    let malformed = |reason: String| MapsimsError::MalformedMap {
        path: path.to_path_buf(),
        reason,
    };

    // missing files stay IO errors, anything cfitsio rejects is malformed
    std::fs::metadata(path)?;
    let mut fptr = FitsFile::open(path).map_err(|e| malformed(e.to_string()))?;
    let hdu = fptr
        .hdu(1)
        .map_err(|_| malformed("no table extension".to_string()))?;
    let names: Vec<String> = match &hdu.info {
        HduInfo::TableInfo {
            column_descriptions,
            ..
        } => column_descriptions
            .iter()
            .take(max_columns)
            .map(|c| c.name.clone())
            .collect(),
        _ => return Err(malformed("first extension is not a table".to_string())),
    };
    if names.is_empty() {
        return Err(malformed("table has no columns".to_string()));
    }
    if let Ok(ordering) = hdu.read_key::<String>(&mut fptr, "ORDERING") {
        if ordering.trim() != "RING" {
            return Err(malformed(format!(
                "{} ordering, only RING maps are supported",
                ordering.trim()
            )));
        }
    }

    let mut components = Vec::with_capacity(names.len());
    for name in &names {
        let values: Vec<f64> = hdu.read_col(&mut fptr, name.as_str())?;
        components.push(values);
    }
    let npix = components[0].len();
    let nside = npix2nside(npix)
        .map_err(|_| malformed(format!("{} pixels is not a full-sky map", npix)))?;
    if let Ok(header_nside) = hdu.read_key::<i64>(&mut fptr, "NSIDE") {
        if header_nside != nside as i64 {
            return Err(malformed(format!(
                "NSIDE keyword {} but {} pixels",
                header_nside, npix
            )));
        }
    }
    Ok(components)
}
