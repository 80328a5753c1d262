// crates/kiwiglider-core/src/summary.rs

// Deployment summary: the snapshot numbers behind the summary page, and the
// seam where a renderer turns them into a picture or text.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::dataset::{AttrValue, Attributes, TimeSeriesDataset, LATITUDE, LONGITUDE, TIME};
use crate::error::{PipelineError, Result};
use crate::geo::{first_finite, format_position, last_finite};

/// Navigation and engineering variables left out of the science sensor list.
pub const NAVIGATION_VARIABLES: [&str; 12] = [
    "latitude",
    "longitude",
    "heading",
    "pitch",
    "roll",
    "pressure",
    "depth",
    "water_velocity_eastward",
    "water_velocity_northward",
    "distance_over_ground",
    "profile_index",
    "profile_direction",
];

const SECONDS_PER_DAY: f64 = 86_400.0;
const SECONDS_PER_HOUR: f64 = 3_600.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotPanel {
    pub variable: String,
    pub colour_table: String,
}

impl PlotPanel {
    pub fn new(variable: &str, colour_table: &str) -> Self {
        Self {
            variable: variable.to_string(),
            colour_table: colour_table.to_string(),
        }
    }
}

pub fn default_panels() -> Vec<PlotPanel> {
    vec![
        PlotPanel::new("temperature", "cmocean.sequential.Thermal_20"),
        PlotPanel::new("salinity", "cmocean.sequential.Haline_20"),
        PlotPanel::new("density", "cmocean.sequential.Dense_20"),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableRange {
    pub variable: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl MapBounds {
    /// Padded bounds: latitude by half a degree, longitude by a full degree,
    /// snapped outward to whole degrees and rounded to a tenth.
    pub fn around(latitudes: &[f64], longitudes: &[f64]) -> Option<Self> {
        let (lat_lo, lat_hi) = finite_extent(latitudes)?;
        let (lon_lo, lon_hi) = finite_extent(longitudes)?;
        Some(Self {
            lat_min: round_tenth((lat_lo - 0.5).floor()),
            lat_max: round_tenth((lat_hi + 0.5).ceil()),
            lon_min: round_tenth((lon_lo - 1.0).floor()),
            lon_max: round_tenth((lon_hi + 1.0).ceil()),
        })
    }
}

fn finite_extent(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Values of `name` with the declared `_FillValue` treated as a gap.
fn observed_values(dataset: &TimeSeriesDataset, name: &str) -> Result<Vec<Option<f64>>> {
    let fill = dataset.fill_value(name);
    Ok(dataset
        .values(name)?
        .into_iter()
        .map(|value| value.filter(|v| Some(*v) != fill))
        .collect())
}

fn finite_values(values: &[Option<f64>]) -> Vec<f64> {
    values
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .collect()
}

fn timestamp(seconds: f64) -> Option<DateTime<Utc>> {
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

/// "`D` days, `H` hours" for a span in seconds.
pub fn format_duration(seconds: f64) -> String {
    let days = (seconds / SECONDS_PER_DAY).floor();
    let hours = ((seconds - days * SECONDS_PER_DAY) / SECONDS_PER_HOUR).floor();
    format!("{days:.0} days, {hours:.0} hours")
}

fn required_text<'a>(metadata: &'a Attributes, key: &str) -> Result<&'a str> {
    metadata.get(key).and_then(AttrValue::as_str).ok_or_else(|| {
        PipelineError::Configuration(format!("summary needs metadata attribute '{key}'"))
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentSummary {
    pub title: String,
    pub deployment_name: String,
    pub deployment_date: Option<DateTime<Utc>>,
    pub deployment_location: Option<String>,
    pub retrieval_date: Option<DateTime<Utc>>,
    pub retrieval_location: Option<String>,
    pub duration: Option<String>,
    pub science_sensors: Vec<String>,
    pub observations: usize,
    pub glider_name: Option<String>,
    pub profiles: Option<f64>,
    pub profiling_range: Option<String>,
    pub max_depth: Option<f64>,
    pub distance_covered: Option<f64>,
    pub map_bounds: Option<MapBounds>,
    pub ranges: Vec<VariableRange>,
    pub panels: Vec<PlotPanel>,
}

impl DeploymentSummary {
    /// Summarizes a dataset. `deployment_name` and `project` come from the
    /// dataset's global attributes.
    pub fn from_dataset(dataset: &TimeSeriesDataset, panels: Vec<PlotPanel>) -> Result<Self> {
        let global = dataset.global_attributes();
        let deployment_name = required_text(global, "deployment_name")?.to_string();
        let project = required_text(global, "project")?;
        let title = format!("Ocean Glider Deployment Summary: {deployment_name} - {project}");

        let times: Vec<Option<f64>> = dataset.times()?.into_iter().map(Some).collect();
        let first_time = first_finite(&times);
        let last_time = last_finite(&times);

        let (latitudes, longitudes) = if dataset.has_variable(LATITUDE) && dataset.has_variable(LONGITUDE) {
            (
                observed_values(dataset, LATITUDE)?,
                observed_values(dataset, LONGITUDE)?,
            )
        } else {
            (Vec::new(), Vec::new())
        };
        let location = |lat: Option<f64>, lon: Option<f64>| match (lat, lon) {
            (Some(lat), Some(lon)) => Some(format_position(lat, lon)),
            _ => None,
        };

        let mut science_sensors = Vec::new();
        let mut ranges = Vec::new();
        for name in dataset.variable_names() {
            if name == TIME || dataset.is_flag_variable(&name) {
                continue;
            }
            let column = dataset.column(&name)?;
            if !column.dtype().is_primitive_numeric() {
                continue;
            }
            let finite = finite_values(&observed_values(dataset, &name)?);
            ranges.push(VariableRange {
                variable: name.clone(),
                min: finite.iter().copied().reduce(f64::min),
                max: finite.iter().copied().reduce(f64::max),
            });
            if !NAVIGATION_VARIABLES.contains(&name.as_str()) {
                let label = dataset
                    .attributes(&name)
                    .and_then(|attrs| attrs.get("long_name"))
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| name.clone());
                science_sensors.push(label);
            }
        }

        let range_of = |variable: &str| ranges.iter().find(|range| range.variable == variable);
        let profiles = range_of("profile_index").and_then(|range| range.max);
        let max_depth = range_of("depth").and_then(|range| range.max);
        let distance_covered = if dataset.has_variable("distance_over_ground") {
            last_finite(&observed_values(dataset, "distance_over_ground")?)
        } else {
            None
        };
        let glider_name = global.get("glider_name").map(|value| value.to_string());
        let profiling_range = global
            .get("glider_pump")
            .map(|value| format!("0-{value}"));

        let summary = Self {
            title,
            deployment_name,
            deployment_date: first_time.and_then(timestamp),
            deployment_location: location(first_finite(&latitudes), first_finite(&longitudes)),
            retrieval_date: last_time.and_then(timestamp),
            retrieval_location: location(last_finite(&latitudes), last_finite(&longitudes)),
            duration: first_time
                .zip(last_time)
                .map(|(start, end)| format_duration(end - start)),
            science_sensors,
            observations: dataset.height(),
            glider_name,
            profiles,
            profiling_range,
            max_depth,
            distance_covered,
            map_bounds: MapBounds::around(&finite_values(&latitudes), &finite_values(&longitudes)),
            ranges,
            panels,
        };
        debug!(title = %summary.title, sensors = summary.science_sensors.len(), "built deployment summary");
        Ok(summary)
    }

    /// Label/value pairs of the summary page's text panel.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let unknown = || "unknown".to_string();
        let date = |value: &Option<DateTime<Utc>>| {
            value
                .map(|date| date.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(unknown)
        };
        let text = |value: &Option<String>| value.clone().unwrap_or_else(unknown);

        vec![
            ("Deployment date".into(), date(&self.deployment_date)),
            ("Deployment location".into(), text(&self.deployment_location)),
            ("Retrieval date".into(), date(&self.retrieval_date)),
            ("Retrieval location".into(), text(&self.retrieval_location)),
            ("Deployment duration".into(), text(&self.duration)),
            ("Science sensors".into(), self.science_sensors.join(", ")),
            ("Observations".into(), self.observations.to_string()),
            (
                "Number of profiles".into(),
                self.profiles.map(|p| format!("{p:.0}")).unwrap_or_else(unknown),
            ),
            ("Glider".into(), text(&self.glider_name)),
            ("Profiling range".into(), text(&self.profiling_range)),
            (
                "Max depth".into(),
                self.max_depth.map(|d| format!("{d:.2}m")).unwrap_or_else(unknown),
            ),
            (
                "Distance covered".into(),
                self.distance_covered
                    .map(|d| format!("{d:.2}km"))
                    .unwrap_or_else(unknown),
            ),
        ]
    }
}

pub trait SummaryRenderer {
    /// File extension of what the renderer writes.
    fn extension(&self) -> &str;

    /// Renders `summary` to `output`; `scratch` is an empty directory for
    /// intermediate files.
    fn render(&self, summary: &DeploymentSummary, scratch: &Path, output: &Path) -> Result<()>;
}

/// Runs a renderer with a scratch directory that is removed afterwards,
/// whether or not rendering succeeded.
pub fn render_summary(
    renderer: &dyn SummaryRenderer,
    summary: &DeploymentSummary,
    output: &Path,
) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let scratch = tempfile::tempdir()?;
    info!(output = %output.display(), "rendering deployment summary");
    renderer.render(summary, scratch.path(), output)
}

/// Writes the summary as plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextSummaryRenderer;

impl SummaryRenderer for TextSummaryRenderer {
    fn extension(&self) -> &str {
        "txt"
    }

    fn render(&self, summary: &DeploymentSummary, scratch: &Path, output: &Path) -> Result<()> {
        let mut lines = vec![summary.title.clone(), String::new()];
        for (label, value) in summary.snapshot() {
            lines.push(format!("{label}: {value}"));
        }
        if let Some(bounds) = summary.map_bounds {
            lines.push(format!(
                "Map extent: {:.1} to {:.1} N, {:.1} to {:.1} E",
                bounds.lat_min, bounds.lat_max, bounds.lon_min, bounds.lon_max
            ));
        }
        lines.push(String::new());
        for range in &summary.ranges {
            let show = |v: Option<f64>| v.map(|v| format!("{v}")).unwrap_or_else(|| "-".into());
            lines.push(format!("{}: {} .. {}", range.variable, show(range.min), show(range.max)));
        }
        if !summary.panels.is_empty() {
            lines.push(String::new());
            for panel in &summary.panels {
                lines.push(format!("panel {} ({})", panel.variable, panel.colour_table));
            }
        }
        lines.push(String::new());

        let draft = scratch.join("summary.txt");
        fs::write(&draft, lines.join("\n"))?;
        fs::copy(&draft, output)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_splits_days_and_hours() {
        assert_eq!(format_duration(2.0 * 86_400.0 + 5.5 * 3_600.0), "2 days, 5 hours");
        assert_eq!(format_duration(1_800.0), "0 days, 0 hours");
    }

    #[test]
    fn map_bounds_pad_and_snap() {
        let bounds = MapBounds::around(&[-41.3, -40.9, f64::NAN], &[174.2, 174.8]).unwrap();
        assert_eq!(bounds.lat_min, -42.0);
        assert_eq!(bounds.lat_max, -40.0);
        assert_eq!(bounds.lon_min, 173.0);
        assert_eq!(bounds.lon_max, 176.0);
        assert!(MapBounds::around(&[], &[1.0]).is_none());
    }
}
