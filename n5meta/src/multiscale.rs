//! The multiscale attributes of a group, as read by BigDataViewer and n5-viewer.
//!
//! BigDataViewer reads
//! - `downsamplingFactors`: the factor of each scale level relative to `s0`, including `s0` itself,
//! - `resolution`: the size of a voxel of `s0` along each axis, and
//! - `units`: the unit of each `resolution` entry.
//!
//! n5-viewer additionally reads `pixelResolution`, which requires all axes to share a unit.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    attributes::{AttributesError, N5Attributes},
    length::{Length, Resolution, ResolveResolutionError},
    pyramid::Pyramid,
};

/// The attribute key of the per-level downsampling factors.
pub const DOWNSAMPLING_FACTORS_KEY: &str = "downsamplingFactors";
/// The attribute key of the per-axis resolution.
pub const RESOLUTION_KEY: &str = "resolution";
/// The attribute key of the per-axis units.
pub const UNITS_KEY: &str = "units";
/// The attribute key of the n5-viewer resolution.
pub const PIXEL_RESOLUTION_KEY: &str = "pixelResolution";

/// The n5-viewer `pixelResolution` attribute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PixelResolution {
    /// The per-axis resolution.
    pub dimensions: Vec<f64>,
    /// The unit shared by all axes.
    pub unit: String,
}

/// A multiscale attributes error.
#[derive(Debug, Error)]
pub enum MultiscaleError {
    /// The resolution does not fit the data.
    #[error(transparent)]
    Resolve(#[from] ResolveResolutionError),
    /// An attributes error.
    #[error(transparent)]
    Attributes(#[from] AttributesError),
    /// The group has no `s0` array.
    #[error("path does not seem to be a scale directory: {}", .0.display())]
    NotAPyramid(PathBuf),
    /// n5-viewer metadata was requested but the axes have different units.
    #[error("n5-viewer mode only available when dimensions all have the same units, got {0:?}")]
    MixedUnits(Vec<String>),
}

/// The multiscale attributes of a group.
#[derive(Clone, Debug, PartialEq)]
pub struct MultiscaleAttributes {
    downsampling_factors: Vec<Vec<u64>>,
    resolution: Resolution,
}

impl MultiscaleAttributes {
    /// Infer the multiscale attributes of `group`, given the resolution of `s0`.
    ///
    /// Lengths without a unit get `default_unit`.
    /// A single length is used for every axis.
    ///
    /// # Errors
    /// Returns a [`MultiscaleError`] if
    /// - a length has no unit and there is no `default_unit`,
    /// - `group` has no `s0` array,
    /// - the number of lengths is neither one nor the number of axes, or
    /// - the attributes of a scale level cannot be read.
    pub fn infer<P: AsRef<Path>>(
        group: P,
        lengths: &[Length],
        default_unit: Option<&str>,
    ) -> Result<Self, MultiscaleError> {
        let group = group.as_ref();
        let resolution = Resolution::resolve(lengths, default_unit)?;
        let pyramid =
            Pyramid::open(group)?.ok_or_else(|| MultiscaleError::NotAPyramid(group.to_path_buf()))?;
        log::debug!(
            "Found {} scale levels with {} axes",
            pyramid.num_levels(),
            pyramid.ndim()
        );
        let resolution = resolution.broadcast(pyramid.ndim())?;
        Ok(Self {
            downsampling_factors: pyramid.downsampling_factors_with_base(),
            resolution,
        })
    }

    /// The downsampling factors of all levels, starting with `s0`.
    #[must_use]
    pub fn downsampling_factors(&self) -> &[Vec<u64>] {
        &self.downsampling_factors
    }

    /// The resolution of `s0`.
    #[must_use]
    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    /// The n5-viewer `pixelResolution`, or [`None`] if the axes have different units.
    #[must_use]
    pub fn pixel_resolution(&self) -> Option<PixelResolution> {
        let unit = self.resolution.common_unit()?;
        Some(PixelResolution {
            dimensions: self.resolution.magnitudes().to_vec(),
            unit: unit.to_string(),
        })
    }

    /// Write the multiscale attributes to `attributes`, including `pixelResolution` if `n5_viewer`.
    ///
    /// # Errors
    /// Returns a [`MultiscaleError`] if
    /// - `n5_viewer` and the axes have different units, or
    /// - a key cannot be written, see [`N5Attributes::set`].
    pub fn apply(
        &self,
        attributes: &mut N5Attributes,
        n5_viewer: bool,
    ) -> Result<(), MultiscaleError> {
        let pixel_resolution = if n5_viewer {
            Some(
                self.pixel_resolution()
                    .ok_or_else(|| MultiscaleError::MixedUnits(self.resolution.units().to_vec()))?,
            )
        } else {
            None
        };
        attributes.set(DOWNSAMPLING_FACTORS_KEY, &self.downsampling_factors)?;
        attributes.set(RESOLUTION_KEY, self.resolution.magnitudes())?;
        attributes.set(UNITS_KEY, self.resolution.units())?;
        if let Some(pixel_resolution) = pixel_resolution {
            attributes.set(PIXEL_RESOLUTION_KEY, &pixel_resolution)?;
        }
        Ok(())
    }
}
