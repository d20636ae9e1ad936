//! Multiscale metadata for [N5](https://github.com/saalfeldlab/n5) containers.
//!
//! `n5meta` reads and writes the `attributes.json` documents of multiscale N5 groups and derives
//! the metadata expected by [BigDataViewer](https://imagej.net/plugins/bdv/),
//! [n5-viewer](https://github.com/saalfeldlab/n5-viewer) and [CATMAID](https://catmaid.org) from them.
//!
//! A multiscale group is a directory holding one child array per scale level, named `s0`, `s1`, ….
//! `s0` is the full resolution level, each further level is downsampled relative to `s0`.
//!
//! The crate provides:
//! - [`N5Attributes`]: a restricted view of an attributes document which protects the array keys
//!   (`dimensions`, `dataType`, `blockSize`, `compression`) and, by default, any existing key,
//! - [`Pyramid`] and [`infer_pyramid`]: discovery of scale levels and per-axis downsampling factors,
//! - [`Length`] and [`parse_resolution`]: parsing of physical lengths such as `4.5nm`,
//! - [`MultiscaleAttributes`]: the `downsamplingFactors`, `resolution`, `units` and `pixelResolution`
//!   attributes of a multiscale group,
//! - [`orthoview`]: formatting of CATMAID stack information for the `xy`, `xz` and `zy` orthoviews,
//! - [`AttributesSource`]: read-only access to attributes documents below a root.
//!   A filesystem source is included, see [`n5meta_http`](https://docs.rs/n5meta_http) for HTTP.
//!
//! ## Licence
//! `n5meta` is licensed under either of
//! - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//! - the MIT license <http://opensource.org/licenses/MIT>, at your option.

pub mod attributes;
pub mod length;
pub mod multiscale;
pub mod orthoview;
pub mod pyramid;
pub mod source;

pub use attributes::{
    ARRAY_ATTRIBUTE_KEYS, ATTRIBUTES_FILE, ArrayAttributes, AttributesError, Compression,
    N5Attributes, SaveOptions, SchemaError, WriteMode,
};
pub use length::{
    Length, LengthParseError, Resolution, ResolveResolutionError, UnitParseError, parse_length,
    parse_resolution, validate_unit,
};
pub use multiscale::{MultiscaleAttributes, MultiscaleError, PixelResolution};
pub use pyramid::{
    DownsamplingFactorError, Pyramid, ScaleLevel, StoredFactorsError, infer_downsampling_factor,
    infer_pyramid, list_scales, stored_downsampling_factors,
};
pub use source::{AttributesSource, FilesystemSource, SourceError};

/// An incompatible dimensionality error.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("incompatible dimensionality {0}, expected {1}")]
pub struct IncompatibleDimensionalityError(usize, usize);

impl IncompatibleDimensionalityError {
    /// Create a new incompatible dimensionality error.
    #[must_use]
    pub const fn new(got: usize, expected: usize) -> Self {
        Self(got, expected)
    }

    /// The dimensionality that was encountered.
    #[must_use]
    pub const fn got(&self) -> usize {
        self.0
    }

    /// The dimensionality that was expected.
    #[must_use]
    pub const fn expected(&self) -> usize {
        self.1
    }
}
