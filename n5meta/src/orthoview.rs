//! CATMAID stack information for the `xy`, `xz` and `zy` orthoviews of a multiscale group.
//!
//! CATMAID shows a volume in three orthogonal planes.
//! Each plane is configured as a separate stack whose first two axes are the plane axes and
//! whose third axis is the depth axis, so per-axis values have to be reordered for every plane.
//!
//! URL templates contain tokens which CATMAID substitutes:
//! [`SCALE_DATASET_TOKEN`] for the scale level, and `%AXIS_<i>%` (see [`Axis::token`]) for the
//! tile coordinate along an axis.

use std::{fmt, str::FromStr};

use derive_more::{Deref, Display, From};
use serde_json::Number;
use thiserror::Error;

use crate::{
    IncompatibleDimensionalityError,
    attributes::{AttributesError, N5Attributes, WriteMode},
    multiscale::{DOWNSAMPLING_FACTORS_KEY, RESOLUTION_KEY},
    pyramid::scale_name,
    source::{AttributesSource, SourceError, is_url, join_path, join_root_item, urljoin},
};

/// The tile size served by h2n5.
pub const H2N5_TILE_SIZE: (u64, u64) = (256, 256);

/// The JPEG quality requested from h2n5.
pub const JPEG_QUALITY: u8 = 80;

/// The URL token which CATMAID replaces with the scale level dataset.
pub const SCALE_DATASET_TOKEN: &str = "%SCALE_DATASET%";

/// A spatial axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum Axis {
    /// The `x` axis.
    #[display("x")]
    X,
    /// The `y` axis.
    #[display("y")]
    Y,
    /// The `z` axis.
    #[display("z")]
    Z,
}

impl Axis {
    /// All axes, in index order.
    pub const ALL: [Self; 3] = [Self::X, Self::Y, Self::Z];

    /// The index of the axis.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    /// The URL token which CATMAID replaces with the tile coordinate along this axis, e.g. `%AXIS_0%`.
    #[must_use]
    pub fn token(self) -> String {
        format!("%AXIS_{}%", self.index())
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            'x' => Some(Self::X),
            'y' => Some(Self::Y),
            'z' => Some(Self::Z),
            _ => None,
        }
    }
}

/// An orthoview plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum Plane {
    /// The `xy` plane, with depth `z`.
    #[display("xy")]
    Xy,
    /// The `xz` plane, with depth `y`.
    #[display("xz")]
    Xz,
    /// The `zy` plane, with depth `x`.
    #[display("zy")]
    Zy,
}

impl Plane {
    /// All planes, in the order CATMAID lists them.
    pub const ALL: [Self; 3] = [Self::Xy, Self::Xz, Self::Zy];

    /// The axes spanning the plane.
    #[must_use]
    pub const fn axes(self) -> [Axis; 2] {
        match self {
            Self::Xy => [Axis::X, Axis::Y],
            Self::Xz => [Axis::X, Axis::Z],
            Self::Zy => [Axis::Z, Axis::Y],
        }
    }

    /// The axis orthogonal to the plane.
    #[must_use]
    pub const fn depth_axis(self) -> Axis {
        match self {
            Self::Xy => Axis::Z,
            Self::Xz => Axis::Y,
            Self::Zy => Axis::X,
        }
    }

    /// The plane axes followed by the depth axis.
    #[must_use]
    pub const fn axis_order(self) -> [Axis; 3] {
        let [a, b] = self.axes();
        [a, b, self.depth_axis()]
    }
}

/// A dimension order is not a permutation of `xyz`.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("dimension order must be a permutation of x, y and z, got '{0}'")]
pub struct DimensionOrderParseError(String);

/// The spatial axis of each stored array axis, e.g. `zyx`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deref)]
pub struct DimensionOrder([Axis; 3]);

impl DimensionOrder {
    /// The position of `axis` in the order.
    #[must_use]
    pub fn position(&self, axis: Axis) -> usize {
        self.0
            .iter()
            .position(|a| *a == axis)
            .unwrap_or(axis.index())
    }
}

impl Default for DimensionOrder {
    fn default() -> Self {
        Self(Axis::ALL)
    }
}

impl FromStr for DimensionOrder {
    type Err = DimensionOrderParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || DimensionOrderParseError(s.to_string());
        let axes = s
            .to_lowercase()
            .chars()
            .map(Axis::from_char)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(err)?;
        let axes: [Axis; 3] = axes.try_into().map_err(|_| err())?;
        if Axis::ALL.iter().all(|axis| axes.contains(axis)) {
            Ok(Self(axes))
        } else {
            Err(err())
        }
    }
}

impl fmt::Display for DimensionOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for axis in self.0 {
            write!(f, "{axis}")?;
        }
        Ok(())
    }
}

/// A value for each spatial axis.
#[derive(Clone, Debug, PartialEq, Eq, From)]
pub struct PerAxis<T> {
    /// The `x` value.
    pub x: T,
    /// The `y` value.
    pub y: T,
    /// The `z` value.
    pub z: T,
}

impl<T> PerAxis<T> {
    /// Create a new per-axis value.
    pub const fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }

    /// The value of `axis`.
    pub const fn get(&self, axis: Axis) -> &T {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }
}

impl<T: Clone> PerAxis<T> {
    /// Assign `values`, given in `order`, to their axes.
    ///
    /// Values after the third are ignored.
    ///
    /// # Errors
    /// Returns an [`IncompatibleDimensionalityError`] if there are fewer than three values.
    pub fn from_ordered(
        values: &[T],
        order: &DimensionOrder,
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if values.len() < Axis::ALL.len() {
            return Err(IncompatibleDimensionalityError::new(
                values.len(),
                Axis::ALL.len(),
            ));
        }
        let value = |axis| values[order.position(axis)].clone();
        Ok(Self::new(value(Axis::X), value(Axis::Y), value(Axis::Z)))
    }
}

/// The values of `values` for `axes`, in that order.
pub fn reorder<T: Clone>(values: &PerAxis<T>, axes: &[Axis]) -> Vec<T> {
    axes.iter().map(|axis| values.get(*axis).clone()).collect()
}

/// Format downsampling factors for the "Custom downsampling" field of a CATMAID stack in `plane`.
///
/// The factors of a level are ordered by [`Plane::axis_order`] and joined by `,`, levels are
/// joined by `|`.
pub fn format_downsampling_block<T: fmt::Display>(
    factors: &[PerAxis<T>],
    plane: Plane,
) -> String {
    let order = plane.axis_order();
    factors
        .iter()
        .map(|factor| {
            order
                .iter()
                .map(|axis| factor.get(*axis).to_string())
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("|")
}

/// Format downsampling factors for every plane, each under a `<plane>\n--` heading.
pub fn format_downsampling_blocks<T: fmt::Display>(factors: &[PerAxis<T>]) -> String {
    Plane::ALL
        .iter()
        .map(|plane| {
            format!(
                "{plane}\n--\n{}",
                format_downsampling_block(factors, *plane)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn index_slug(axes: &[Axis]) -> String {
    axes.iter()
        .map(|axis| axis.index().to_string())
        .collect::<Vec<_>>()
        .join("_")
}

/// The h2n5 tile source URL of `group` in `plane`.
///
/// `h2n5_base` is the URL of the h2n5 instance, up to but excluding `tile`.
#[must_use]
pub fn make_h2n5_url(h2n5_base: &str, group: &str, plane: Plane) -> String {
    let slice_slug = index_slug(&plane.axes());
    let tile_slug = format!("{}_{}", H2N5_TILE_SIZE.0, H2N5_TILE_SIZE.1);
    let axis_slug = plane
        .axis_order()
        .iter()
        .map(|axis| axis.token())
        .collect::<Vec<_>>()
        .join("/");
    urljoin(
        h2n5_base,
        &[
            "tile",
            group,
            SCALE_DATASET_TOKEN,
            &slice_slug,
            &tile_slug,
            &axis_slug,
        ],
    )
}

/// The N5 tile source URL of the group at `path` in `plane`.
#[must_use]
pub fn make_n5_url(path: &str, plane: Plane) -> String {
    let slice_slug = index_slug(&plane.axis_order());
    if is_url(path) {
        urljoin(path, &[SCALE_DATASET_TOKEN, &slice_slug])
    } else {
        join_path(path, &[SCALE_DATASET_TOKEN, &slice_slug])
    }
}

/// A title framed by `#`.
#[must_use]
pub fn megatitle(s: &str) -> String {
    let wrapper = "#".repeat(s.chars().count() + 4);
    format!("{wrapper}\n# {s} #\n{wrapper}")
}

/// An orthoview error.
#[derive(Debug, Error)]
pub enum OrthoviewError {
    /// An attributes error.
    #[error(transparent)]
    Attributes(#[from] AttributesError),
    /// A source error.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// Per-axis attributes do not have three values.
    #[error(transparent)]
    Dimensionality(#[from] IncompatibleDimensionalityError),
}

/// Options for [`OrthoviewReport::render`].
#[derive(Debug, Clone)]
pub struct OrthoviewOptions {
    h2n5_root: Option<String>,
    include_n5: bool,
}

impl Default for OrthoviewOptions {
    fn default() -> Self {
        Self {
            h2n5_root: None,
            include_n5: true,
        }
    }
}

impl OrthoviewOptions {
    /// Set the URL of an h2n5 instance serving the container, up to but excluding `tile`.
    pub fn h2n5_root(&mut self, h2n5_root: Option<String>) -> &mut Self {
        self.h2n5_root = h2n5_root;
        self
    }

    /// Set whether to include the N5 tile source. Enabled by default.
    pub fn include_n5(&mut self, include_n5: bool) -> &mut Self {
        self.include_n5 = include_n5;
        self
    }
}

/// The stack information of a multiscale group with bigdataviewer metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrthoviewReport {
    dimensions: PerAxis<Number>,
    resolution: PerAxis<Number>,
    downsampling_factors: Vec<PerAxis<Number>>,
}

impl OrthoviewReport {
    /// Create the report from the attributes of the group and of its `s0` array.
    ///
    /// # Errors
    /// Returns an [`OrthoviewError`] if the `dimensions` of `s0`, or the `resolution` or
    /// `downsamplingFactors` of the group, are missing or have fewer than three values.
    pub fn new(group: &N5Attributes, s0: &N5Attributes) -> Result<Self, OrthoviewError> {
        let order = DimensionOrder::default();
        let dimensions: Vec<Number> = s0.get_as("dimensions")?;
        let resolution: Vec<Number> = group.get_as(RESOLUTION_KEY)?;
        let factors: Vec<Vec<Number>> = group.get_as(DOWNSAMPLING_FACTORS_KEY)?;
        Ok(Self {
            dimensions: PerAxis::from_ordered(&dimensions, &order)?,
            resolution: PerAxis::from_ordered(&resolution, &order)?,
            downsampling_factors: factors
                .iter()
                .map(|factor| PerAxis::from_ordered(factor, &order))
                .collect::<Result<_, _>>()?,
        })
    }

    /// Read the attributes of `group` and its `s0` array from `source` and create the report.
    ///
    /// # Errors
    /// Returns an [`OrthoviewError`] if an attributes document cannot be read, or see [`OrthoviewReport::new`].
    pub fn fetch(source: &dyn AttributesSource, group: &str) -> Result<Self, OrthoviewError> {
        log::debug!("Reading attributes from {}", source.location(group));
        let group_attributes =
            N5Attributes::from_map(source.get_attributes(group)?, WriteMode::Gentle);
        let s0 = format!("{group}/{}", scale_name(0));
        let s0_attributes = N5Attributes::from_map(source.get_attributes(&s0)?, WriteMode::Gentle);
        Self::new(&group_attributes, &s0_attributes)
    }

    /// The shape of `s0`.
    #[must_use]
    pub fn dimensions(&self) -> &PerAxis<Number> {
        &self.dimensions
    }

    /// The resolution of `s0`.
    #[must_use]
    pub fn resolution(&self) -> &PerAxis<Number> {
        &self.resolution
    }

    /// The downsampling factors of every level.
    #[must_use]
    pub fn downsampling_factors(&self) -> &[PerAxis<Number>] {
        &self.downsampling_factors
    }

    /// Render the stack information of every plane for the group `group` in the container at `root`.
    #[must_use]
    pub fn render(&self, root: &str, group: &str, options: &OrthoviewOptions) -> String {
        let mut url = join_root_item(root, group);
        if !is_url(&url) && !url.starts_with("file://") {
            url = format!("file://{url}");
        }

        Plane::ALL
            .iter()
            .map(|plane| {
                let plane = *plane;
                let order = plane.axis_order();
                let mut rows = vec![
                    plane.to_string().to_uppercase(),
                    megatitle(&plane.to_string()),
                    format!("Dimension: {}", xyz_row(&reorder(&self.dimensions, &order))),
                    format!("Resolution: {}", xyz_row(&reorder(&self.resolution, &order))),
                    format!(
                        "Downsampling: {}",
                        format_downsampling_block(&self.downsampling_factors, plane)
                    ),
                ];
                if let Some(h2n5_root) = &options.h2n5_root {
                    rows.push(format!(
                        "H2N5 URL: {}",
                        make_h2n5_url(h2n5_root, group, plane)
                    ));
                    rows.push(format!("H2N5 file extension: jpg?q={JPEG_QUALITY}"));
                }
                if options.include_n5 {
                    rows.push(format!("N5 URL: {}", make_n5_url(&url, plane)));
                }
                rows.join("\n")
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn xyz_row(values: &[Number]) -> String {
    format!("X: {}\tY: {}\tZ: {}", values[0], values[1], values[2])
}
