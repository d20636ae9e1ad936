#![allow(missing_docs)]

use std::{error::Error, path::Path};

use n5meta::{
    ATTRIBUTES_FILE, Pyramid, StoredFactorsError, infer_pyramid, list_scales,
    stored_downsampling_factors,
};
use serde_json::{Number, json};

fn write_attributes(dir: &Path, attributes: &serde_json::Value) -> Result<(), Box<dyn Error>> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join(ATTRIBUTES_FILE), attributes.to_string())?;
    Ok(())
}

fn write_array(dir: &Path, dimensions: &[u64]) -> Result<(), Box<dyn Error>> {
    write_attributes(
        dir,
        &json!({
            "dimensions": dimensions,
            "dataType": "uint16",
            "blockSize": vec![32; dimensions.len()],
            "compression": {"type": "gzip", "level": -1},
        }),
    )
}

fn numbers(values: &[u64]) -> Vec<Number> {
    values.iter().map(|value| Number::from(*value)).collect()
}

#[test]
fn pyramid_s0_only() -> Result<(), Box<dyn Error>> {
    let group = tempfile::TempDir::new()?;
    write_array(&group.path().join("s0"), &[100, 100, 100])?;
    assert_eq!(infer_pyramid(group.path())?, Some(vec![]));

    let pyramid = Pyramid::open(group.path())?.unwrap();
    assert_eq!(pyramid.num_levels(), 1);
    assert_eq!(pyramid.shape(), &[100, 100, 100]);
    assert_eq!(pyramid.downsampling_factors_with_base(), vec![vec![1, 1, 1]]);
    Ok(())
}

#[test]
fn pyramid_levels() -> Result<(), Box<dyn Error>> {
    let group = tempfile::TempDir::new()?;
    write_array(&group.path().join("s0"), &[100, 100, 100])?;
    write_array(&group.path().join("s1"), &[50, 50, 50])?;
    write_array(&group.path().join("s2"), &[25, 25, 100])?;
    assert_eq!(
        infer_pyramid(group.path())?,
        Some(vec![vec![2, 2, 2], vec![4, 4, 1]])
    );
    Ok(())
}

#[test]
fn pyramid_not_found() -> Result<(), Box<dyn Error>> {
    let group = tempfile::TempDir::new()?;
    assert_eq!(infer_pyramid(group.path())?, None);

    // s0 is a group
    write_attributes(&group.path().join("s0"), &json!({"n5": "2.0.0"}))?;
    assert_eq!(infer_pyramid(group.path())?, None);
    Ok(())
}

#[test]
fn pyramid_stops_at_non_array() -> Result<(), Box<dyn Error>> {
    let group = tempfile::TempDir::new()?;
    write_array(&group.path().join("s0"), &[100, 100, 100])?;
    write_array(&group.path().join("s1"), &[50, 50, 50])?;
    write_attributes(&group.path().join("s2"), &json!({}))?;
    write_array(&group.path().join("s3"), &[13, 13, 13])?;
    assert_eq!(infer_pyramid(group.path())?, Some(vec![vec![2, 2, 2]]));
    Ok(())
}

#[test]
fn pyramid_stops_at_dimensionality_change() -> Result<(), Box<dyn Error>> {
    let group = tempfile::TempDir::new()?;
    write_array(&group.path().join("s0"), &[100, 100, 100])?;
    write_array(&group.path().join("s1"), &[50, 50])?;
    assert_eq!(infer_pyramid(group.path())?, Some(vec![]));
    Ok(())
}

#[test]
fn pyramid_invalid_json() -> Result<(), Box<dyn Error>> {
    let group = tempfile::TempDir::new()?;
    write_array(&group.path().join("s0"), &[100, 100, 100])?;
    std::fs::create_dir(group.path().join("s1"))?;
    std::fs::write(group.path().join("s1").join(ATTRIBUTES_FILE), "{")?;
    assert!(infer_pyramid(group.path()).is_err());
    Ok(())
}

#[test]
fn pyramid_gap_warning() -> Result<(), Box<dyn Error>> {
    let group = tempfile::TempDir::new()?;
    write_array(&group.path().join("s0"), &[100, 100, 100])?;
    write_array(&group.path().join("s1"), &[50, 50, 50])?;
    write_array(&group.path().join("s3"), &[13, 13, 13])?;

    testing_logger::setup();
    assert_eq!(infer_pyramid(group.path())?, Some(vec![vec![2, 2, 2]]));
    testing_logger::validate(|captured_logs| {
        let warnings: Vec<_> = captured_logs
            .iter()
            .filter(|log| log.level == log::Level::Warn)
            .collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].body, "Ignoring scale levels after 's2': s3");
    });
    Ok(())
}

#[test]
fn scales_listing() -> Result<(), Box<dyn Error>> {
    let group = tempfile::TempDir::new()?;
    for name in ["s10", "s2", "s0", "sx", "t1"] {
        std::fs::create_dir(group.path().join(name))?;
    }
    std::fs::write(group.path().join("s1"), "not a directory")?;
    let scales = list_scales(group.path())?;
    let names: Vec<String> = scales.iter().map(n5meta::ScaleLevel::name).collect();
    assert_eq!(names, ["s0", "s2", "s10"]);
    Ok(())
}

#[test]
fn stored_factors_from_group() -> Result<(), Box<dyn Error>> {
    let group = tempfile::TempDir::new()?;
    write_attributes(
        group.path(),
        &json!({"downsamplingFactors": [[1, 1, 1], [2, 2, 1]], "scales": [[1, 1, 1]]}),
    )?;
    write_array(&group.path().join("s0"), &[100, 100, 30])?;
    write_array(&group.path().join("s1"), &[50, 50, 30])?;
    assert_eq!(
        stored_downsampling_factors(group.path())?,
        vec![numbers(&[1, 1, 1]), numbers(&[2, 2, 1])]
    );
    Ok(())
}

#[test]
fn stored_factors_null_is_absent() -> Result<(), Box<dyn Error>> {
    let group = tempfile::TempDir::new()?;
    write_attributes(
        group.path(),
        &json!({"downsamplingFactors": null, "scales": [[1, 1, 1], [2, 2, 1]]}),
    )?;
    write_array(&group.path().join("s0"), &[100, 100, 30])?;
    write_array(&group.path().join("s1"), &[50, 50, 30])?;
    assert_eq!(
        stored_downsampling_factors(group.path())?,
        vec![numbers(&[1, 1, 1]), numbers(&[2, 2, 1])]
    );

    write_attributes(
        group.path(),
        &json!({"downsamplingFactors": null, "scales": null}),
    )?;
    write_attributes(
        &group.path().join("s1"),
        &json!({"downsamplingFactors": [2, 2, 1]}),
    )?;
    assert_eq!(
        stored_downsampling_factors(group.path())?,
        vec![numbers(&[1, 1, 1]), numbers(&[2, 2, 1])]
    );
    Ok(())
}

#[test]
fn stored_factors_from_scales() -> Result<(), Box<dyn Error>> {
    let group = tempfile::TempDir::new()?;
    write_attributes(group.path(), &json!({"scales": [[1, 1, 1], [2, 2, 1]]}))?;
    write_array(&group.path().join("s0"), &[100, 100, 30])?;
    write_array(&group.path().join("s1"), &[50, 50, 30])?;
    assert_eq!(
        stored_downsampling_factors(group.path())?,
        vec![numbers(&[1, 1, 1]), numbers(&[2, 2, 1])]
    );
    Ok(())
}

#[test]
fn stored_factors_from_levels() -> Result<(), Box<dyn Error>> {
    let group = tempfile::TempDir::new()?;
    write_attributes(group.path(), &json!({"n5": "2.0.0"}))?;
    write_array(&group.path().join("s0"), &[100, 100, 30])?;
    write_attributes(
        &group.path().join("s1"),
        &json!({"downsamplingFactors": [2, 2, 1]}),
    )?;
    assert_eq!(
        stored_downsampling_factors(group.path())?,
        vec![numbers(&[1, 1, 1]), numbers(&[2, 2, 1])]
    );

    write_attributes(&group.path().join("s2"), &json!({}))?;
    assert!(matches!(
        stored_downsampling_factors(group.path()),
        Err(StoredFactorsError::MissingScaleFactors(scale)) if scale == "s2"
    ));
    Ok(())
}

#[test]
fn stored_factors_level_count_mismatch() -> Result<(), Box<dyn Error>> {
    let group = tempfile::TempDir::new()?;
    write_attributes(group.path(), &json!({"downsamplingFactors": [[1, 1, 1]]}))?;
    write_array(&group.path().join("s0"), &[100, 100, 30])?;
    write_array(&group.path().join("s1"), &[50, 50, 30])?;
    assert!(matches!(
        stored_downsampling_factors(group.path()),
        Err(StoredFactorsError::LevelCountMismatch {
            factors: 1,
            levels: 2
        })
    ));
    Ok(())
}
