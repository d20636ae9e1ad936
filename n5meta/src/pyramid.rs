//! Scale level discovery and downsampling factor inference.
//!
//! The scale levels of a multiscale group are its child arrays `s0`, `s1`, …, where `s0` holds the
//! data at full resolution.
//! The downsampling factor of a level is its per-axis shrinkage relative to `s0`, inferred from the
//! array shapes.

use std::path::{Path, PathBuf};

use serde_json::Number;
use thiserror::Error;

use crate::{
    IncompatibleDimensionalityError,
    attributes::{AttributesError, N5Attributes, WriteMode},
    multiscale::DOWNSAMPLING_FACTORS_KEY,
};

const SCALE_PREFIX: char = 's';

const SCALES_KEY: &str = "scales";

/// The dimensionality assumed for the identity factor of `s0` when the group has none.
const DEFAULT_NDIM: usize = 3;

/// The directory name of scale `level`.
#[must_use]
pub fn scale_name(level: u64) -> String {
    format!("{SCALE_PREFIX}{level}")
}

fn parse_scale_name(name: &str) -> Option<u64> {
    name.strip_prefix(SCALE_PREFIX)?.parse().ok()
}

/// A scale level directory of a multiscale group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScaleLevel {
    /// The level, `0` for full resolution.
    pub level: u64,
    /// The path of the level directory.
    pub path: PathBuf,
}

impl ScaleLevel {
    /// The directory name, e.g. `s1`.
    #[must_use]
    pub fn name(&self) -> String {
        scale_name(self.level)
    }
}

/// List the scale level directories of `group`, sorted by level.
///
/// Children which are not directories, or whose name is not `s` followed by an integer, are ignored.
///
/// # Errors
/// Returns a [`std::io::Error`] if `group` cannot be read.
pub fn list_scales<P: AsRef<Path>>(group: P) -> std::io::Result<Vec<ScaleLevel>> {
    let mut scales = Vec::new();
    for entry in std::fs::read_dir(group)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if let Some(level) = name.to_str().and_then(parse_scale_name) {
            scales.push(ScaleLevel {
                level,
                path: entry.path(),
            });
        }
    }
    scales.sort_by_key(|scale| scale.level);
    Ok(scales)
}

/// An error inferring a downsampling factor.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DownsamplingFactorError {
    /// The shapes have a different number of axes.
    #[error(transparent)]
    IncompatibleDimensionality(#[from] IncompatibleDimensionalityError),
    /// The downsampled shape has a zero extent.
    #[error("downsampled shape has zero extent on axis {axis}")]
    ZeroExtent {
        /// The axis.
        axis: usize,
    },
}

/// Infer the downsampling factor of a level with shape `shape_n` relative to `shape0`.
///
/// Each factor is `shape0[i] / shape_n[i]` rounded to the nearest integer, with ties to even.
///
/// # Errors
/// Returns a [`DownsamplingFactorError`] if the shapes have a different number of axes, or `shape_n` has a zero extent.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn infer_downsampling_factor(
    shape0: &[u64],
    shape_n: &[u64],
) -> Result<Vec<u64>, DownsamplingFactorError> {
    if shape0.len() != shape_n.len() {
        return Err(IncompatibleDimensionalityError::new(shape_n.len(), shape0.len()).into());
    }
    std::iter::zip(shape0, shape_n)
        .enumerate()
        .map(|(axis, (&s0, &sn))| {
            if sn == 0 {
                Err(DownsamplingFactorError::ZeroExtent { axis })
            } else {
                Ok((s0 as f64 / sn as f64).round_ties_even() as u64)
            }
        })
        .collect()
}

/// The scale levels of a multiscale group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pyramid {
    group: PathBuf,
    shape: Vec<u64>,
    downsampling_factors: Vec<Vec<u64>>,
}

impl Pyramid {
    /// Discover the scale levels of `group`.
    ///
    /// Returns [`None`] if `group` has no `s0` array.
    /// Levels are discovered in order until one is missing, is not an array, or has a different
    /// number of axes to `s0`. Levels after a gap are ignored with a warning.
    ///
    /// # Errors
    /// Returns an [`AttributesError`] if the attributes of a level cannot be read.
    pub fn open<P: AsRef<Path>>(group: P) -> Result<Option<Self>, AttributesError> {
        let group = group.as_ref();
        let s0 = match N5Attributes::from_dir(group.join(scale_name(0)), WriteMode::Gentle) {
            Ok(attributes) => attributes,
            Err(AttributesError::NotFound(_)) => {
                log::info!("Group has no child 's0'");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let Some(s0) = s0.array_attributes()? else {
            log::info!("Child 's0' is not an array");
            return Ok(None);
        };

        let mut downsampling_factors = Vec::new();
        let mut level = 1;
        loop {
            let name = scale_name(level);
            let attributes = match N5Attributes::from_dir(group.join(&name), WriteMode::Gentle) {
                Ok(attributes) => attributes,
                Err(AttributesError::NotFound(_)) => {
                    log::debug!("Group has no child '{name}'");
                    break;
                }
                Err(err) => return Err(err),
            };
            let array = match attributes.array_attributes() {
                Ok(Some(array)) => array,
                Ok(None) => {
                    log::debug!("Child '{name}' is not an array");
                    break;
                }
                Err(err) => {
                    log::debug!("Child '{name}' has invalid array attributes: {err}");
                    break;
                }
            };
            match infer_downsampling_factor(&s0.dimensions, &array.dimensions) {
                Ok(factor) => downsampling_factors.push(factor),
                Err(err) => {
                    log::debug!("Cannot infer downsampling factor of '{name}': {err}");
                    break;
                }
            }
            level += 1;
        }

        warn_ignored_levels(group, level);

        Ok(Some(Self {
            group: group.to_path_buf(),
            shape: s0.dimensions,
            downsampling_factors,
        }))
    }

    /// The group path.
    #[must_use]
    pub fn group(&self) -> &Path {
        &self.group
    }

    /// The shape of `s0`.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// The number of axes.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// The number of scale levels, including `s0`.
    #[must_use]
    pub fn num_levels(&self) -> usize {
        self.downsampling_factors.len() + 1
    }

    /// The downsampling factors of the levels after `s0`.
    #[must_use]
    pub fn downsampling_factors(&self) -> &[Vec<u64>] {
        &self.downsampling_factors
    }

    /// The downsampling factors of all levels, starting with the identity factor of `s0`.
    #[must_use]
    pub fn downsampling_factors_with_base(&self) -> Vec<Vec<u64>> {
        std::iter::once(vec![1; self.ndim()])
            .chain(self.downsampling_factors.iter().cloned())
            .collect()
    }
}

fn warn_ignored_levels(group: &Path, stopped_at: u64) {
    let Ok(scales) = list_scales(group) else {
        return;
    };
    let ignored: Vec<String> = scales
        .iter()
        .filter(|scale| scale.level > stopped_at)
        .map(ScaleLevel::name)
        .collect();
    if !ignored.is_empty() {
        log::warn!(
            "Ignoring scale levels after '{}': {}",
            scale_name(stopped_at),
            ignored.join(", ")
        );
    }
}

/// Infer the downsampling factors of the levels after `s0` of `group`.
///
/// Returns [`None`] if `group` has no `s0` array. See [`Pyramid::open`].
///
/// # Errors
/// Returns an [`AttributesError`] if the attributes of a level cannot be read.
pub fn infer_pyramid<P: AsRef<Path>>(group: P) -> Result<Option<Vec<Vec<u64>>>, AttributesError> {
    Ok(Pyramid::open(group)?.map(|pyramid| pyramid.downsampling_factors))
}

/// An error reading stored downsampling factors.
#[derive(Debug, Error)]
pub enum StoredFactorsError {
    /// An attributes error.
    #[error(transparent)]
    Attributes(#[from] AttributesError),
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// A scale level other than `s0` has no downsampling factors.
    #[error("could not find scale information for '{0}'")]
    MissingScaleFactors(String),
    /// The number of downsampling factors does not match the number of scale levels.
    #[error("number of downsampling factors {factors} does not match number of scale levels {levels}")]
    LevelCountMismatch {
        /// The number of downsampling factors.
        factors: usize,
        /// The number of scale levels.
        levels: usize,
    },
}

/// Returns true if `key` is present with a value other than `null`.
fn has_value(attributes: &N5Attributes, key: &str) -> bool {
    attributes.get(key).is_ok_and(|value| !value.is_null())
}

/// Read the downsampling factors stored in the attributes of `group`, one record per scale level.
///
/// The factors are taken from the first of the following which is present and not `null`:
/// - the `downsamplingFactors` attribute of the group,
/// - the `scales` attribute of the group,
/// - the `downsamplingFactors` attribute of each scale level, with `s0` defaulting to ones.
///
/// # Errors
/// Returns a [`StoredFactorsError`] if
/// - an attributes document cannot be read or has malformed factors,
/// - a scale level other than `s0` has no factors, or
/// - the number of factors does not match the number of scale level directories.
pub fn stored_downsampling_factors<P: AsRef<Path>>(
    group: P,
) -> Result<Vec<Vec<Number>>, StoredFactorsError> {
    let group = group.as_ref();
    let attributes = N5Attributes::from_dir(group, WriteMode::Gentle)?;
    let scales = list_scales(group)?;

    let factors = if has_value(&attributes, DOWNSAMPLING_FACTORS_KEY) {
        attributes.get_as(DOWNSAMPLING_FACTORS_KEY)?
    } else if has_value(&attributes, SCALES_KEY) {
        attributes.get_as(SCALES_KEY)?
    } else {
        log::debug!("Reading downsampling factors of each scale level");
        let ndim = attributes.axis_count().unwrap_or(DEFAULT_NDIM);
        let mut factors = Vec::with_capacity(scales.len());
        for scale in &scales {
            let scale_attributes = N5Attributes::from_dir(&scale.path, WriteMode::Gentle)?;
            if has_value(&scale_attributes, DOWNSAMPLING_FACTORS_KEY) {
                factors.push(scale_attributes.get_as(DOWNSAMPLING_FACTORS_KEY)?);
            } else if scale.level == 0 {
                factors.push(vec![Number::from(1u64); ndim]);
            } else {
                return Err(StoredFactorsError::MissingScaleFactors(scale.name()));
            }
        }
        factors
    };

    if factors.len() != scales.len() {
        return Err(StoredFactorsError::LevelCountMismatch {
            factors: factors.len(),
            levels: scales.len(),
        });
    }
    Ok(factors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_names() {
        assert_eq!(scale_name(0), "s0");
        assert_eq!(scale_name(12), "s12");
        assert_eq!(parse_scale_name("s3"), Some(3));
        assert_eq!(parse_scale_name("s"), None);
        assert_eq!(parse_scale_name("sx"), None);
        assert_eq!(parse_scale_name("t1"), None);
    }

    #[test]
    fn downsampling_factor() {
        assert_eq!(
            infer_downsampling_factor(&[100, 100, 100], &[50, 50, 50]),
            Ok(vec![2, 2, 2])
        );
        assert_eq!(
            infer_downsampling_factor(&[100, 100, 100], &[100, 100, 100]),
            Ok(vec![1, 1, 1])
        );
        assert_eq!(
            infer_downsampling_factor(&[101, 100, 30], &[51, 50, 30]),
            Ok(vec![2, 2, 1])
        );
        assert_eq!(infer_downsampling_factor(&[], &[]), Ok(vec![]));
    }

    #[test]
    fn downsampling_factor_ties_to_even() {
        assert_eq!(infer_downsampling_factor(&[5, 7], &[2, 2]), Ok(vec![2, 4]));
    }

    #[test]
    fn downsampling_factor_errors() {
        assert_eq!(
            infer_downsampling_factor(&[100, 100, 100], &[50, 50]),
            Err(DownsamplingFactorError::IncompatibleDimensionality(
                IncompatibleDimensionalityError::new(2, 3)
            ))
        );
        assert_eq!(
            infer_downsampling_factor(&[100, 100], &[50, 0]),
            Err(DownsamplingFactorError::ZeroExtent { axis: 1 })
        );
    }
}
