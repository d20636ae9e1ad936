//! Physical lengths, such as the size of a voxel along one axis.
//!
//! A length is a decimal magnitude with an optional unit, e.g. `4.5nm`, `1 um`, `3`.
//! A unit is an optional SI prefix (`Y`, `Z`, `E`, `P`, `T`, `G`, `M`, `k`, `h`, `da`, `d`, `c`,
//! `m`, `u`, `µ`, `n`, `p`, `f`, `a`, `z`, `y`) followed by one of the base units `m`, `s` or `Hz`.
//!
//! Parsing is lenient about what follows the magnitude: text which does not start with a valid
//! unit leaves the unit unset rather than failing, so that a default unit can be applied later.
//! Use [`validate_unit`] where a unit must be well-formed.

use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use thiserror::Error;

/// Single character prefixes are tried before `da`, the bare base unit last.
const UNIT_PATTERN: &str = r"(?:[YZEPTGMkhdcmuµnpfazy]|da)?(?:m|s|Hz)";

static MAGNITUDE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[0-9]*\.?)?[0-9]+").expect("valid magnitude regex"));

static UNIT_PREFIX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{UNIT_PATTERN}")).expect("valid unit regex"));

static UNIT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{UNIT_PATTERN}$")).expect("valid unit regex"));

/// A length could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("length could not be parsed: '{0}'")]
pub struct LengthParseError(String);

/// A unit is not valid.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("not a valid unit: '{0}'")]
pub struct UnitParseError(String);

/// A physical length with an optional unit.
#[derive(Clone, Debug, PartialEq)]
pub struct Length {
    /// The magnitude.
    pub magnitude: f64,
    /// The unit, if given.
    pub unit: Option<String>,
}

impl Length {
    /// Create a new length.
    #[must_use]
    pub fn new(magnitude: f64, unit: Option<String>) -> Self {
        Self { magnitude, unit }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.unit {
            Some(unit) => write!(f, "{}{unit}", self.magnitude),
            None => write!(f, "{}", self.magnitude),
        }
    }
}

impl FromStr for Length {
    type Err = LengthParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_length(s)
    }
}

/// Parse a single length, e.g. `4.5nm`.
///
/// Leading and trailing whitespace is ignored, as is whitespace between the magnitude and the unit.
///
/// # Errors
/// Returns a [`LengthParseError`] if `s` does not start with a decimal number, or the number is too large to represent.
pub fn parse_length(s: &str) -> Result<Length, LengthParseError> {
    log::debug!("Parsing length '{s}'");
    let trimmed = s.trim();
    let magnitude_match = MAGNITUDE_REGEX
        .find(trimmed)
        .ok_or_else(|| LengthParseError(s.to_string()))?;
    let magnitude = magnitude_match
        .as_str()
        .parse::<f64>()
        .ok()
        .filter(|magnitude| magnitude.is_finite())
        .ok_or_else(|| LengthParseError(s.to_string()))?;

    let remainder = trimmed[magnitude_match.end()..].trim_start();
    let unit = UNIT_PREFIX_REGEX
        .find(remainder)
        .map(|unit| unit.as_str().to_string());
    log::debug!("Got magnitude {magnitude}, unit {unit:?}");

    Ok(Length { magnitude, unit })
}

/// Parse a comma separated list of lengths, e.g. `1nm,2um,3Hz`.
///
/// Each segment is parsed independently with [`parse_length`].
///
/// # Errors
/// Returns a [`LengthParseError`] if any segment is not a valid length.
pub fn parse_resolution(s: &str) -> Result<Vec<Length>, LengthParseError> {
    s.split(',').map(parse_length).collect()
}

/// Check that the whole of `s` is a unit, e.g. `nm`, `ms` or `GHz`.
///
/// # Errors
/// Returns a [`UnitParseError`] if `s` is not exactly a unit.
pub fn validate_unit(s: &str) -> Result<&str, UnitParseError> {
    if UNIT_REGEX.is_match(s) {
        Ok(s)
    } else {
        Err(UnitParseError(s.to_string()))
    }
}

/// Errors resolving lengths into a [`Resolution`].
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ResolveResolutionError {
    /// A length has no unit and there is no default unit.
    #[error("length {0} has no unit and no default unit was given")]
    MissingUnit(Length),
    /// The number of lengths does not match the dimensionality of the data.
    #[error("data has {expected} dimensions, resolution has {got}")]
    Dimensionality {
        /// The number of lengths.
        got: usize,
        /// The dimensionality of the data.
        expected: usize,
    },
}

/// Per-axis magnitudes and units, with every unit known.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    magnitudes: Vec<f64>,
    units: Vec<String>,
}

impl Resolution {
    /// Resolve `lengths`, filling in `default_unit` for lengths without a unit.
    ///
    /// # Errors
    /// Returns [`ResolveResolutionError::MissingUnit`] if a length has no unit and `default_unit` is [`None`].
    pub fn resolve(
        lengths: &[Length],
        default_unit: Option<&str>,
    ) -> Result<Self, ResolveResolutionError> {
        let mut magnitudes = Vec::with_capacity(lengths.len());
        let mut units = Vec::with_capacity(lengths.len());
        for length in lengths {
            let unit = length
                .unit
                .as_deref()
                .or(default_unit)
                .ok_or_else(|| ResolveResolutionError::MissingUnit(length.clone()))?;
            magnitudes.push(length.magnitude);
            units.push(unit.to_string());
        }
        Ok(Self { magnitudes, units })
    }

    /// Match the resolution to data with `ndim` dimensions.
    ///
    /// A single (isotropic) length is repeated for every dimension.
    ///
    /// # Errors
    /// Returns [`ResolveResolutionError::Dimensionality`] if the resolution has neither one nor `ndim` lengths.
    pub fn broadcast(self, ndim: usize) -> Result<Self, ResolveResolutionError> {
        match self.magnitudes.len() {
            len if len == ndim => Ok(self),
            1 => Ok(Self {
                magnitudes: vec![self.magnitudes[0]; ndim],
                units: vec![self.units[0].clone(); ndim],
            }),
            got => Err(ResolveResolutionError::Dimensionality {
                got,
                expected: ndim,
            }),
        }
    }

    /// The per-axis magnitudes.
    #[must_use]
    pub fn magnitudes(&self) -> &[f64] {
        &self.magnitudes
    }

    /// The per-axis units.
    #[must_use]
    pub fn units(&self) -> &[String] {
        &self.units
    }

    /// The unit shared by all axes, if there is one.
    #[must_use]
    pub fn common_unit(&self) -> Option<&str> {
        let (first, rest) = self.units.split_first()?;
        rest.iter().all(|unit| unit == first).then_some(first.as_str())
    }
}
