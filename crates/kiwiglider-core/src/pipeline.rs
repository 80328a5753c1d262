// crates/kiwiglider-core/src/pipeline.rs

// Stage sequencing for one deployment: raw binaries to an L0 timeseries,
// QARTOD annotation to L1, then compliance checks and the summary.
//
// Each stage needs the artifact of the stage before it; calling a stage
// early is a `PipelineError::Precondition` naming what is missing.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::info;

use crate::archive::{read_archive, write_archive, ARCHIVE_EXTENSION};
use crate::binaries::discover_binaries;
use crate::compliance::{check_directory, ComplianceChecker, ComplianceReport};
use crate::config::DeploymentConfig;
use crate::dataset::TimeSeriesDataset;
use crate::error::{PipelineError, Result};
use crate::qc::{QcEngine, QcReport};
use crate::summary::{render_summary, DeploymentSummary, PlotPanel, SummaryRenderer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingStyle {
    Realtime,
    Delayed,
}

impl ProcessingStyle {
    /// Binary file pattern: short/engineering-short files in realtime,
    /// full-resolution files in delayed mode.
    pub fn search_pattern(&self) -> &'static str {
        match self {
            ProcessingStyle::Realtime => "*.[st]bd",
            ProcessingStyle::Delayed => "*.[de]bd",
        }
    }

    /// Seconds used to smooth the profile detector.
    pub fn profile_filter_seconds(&self) -> u32 {
        match self {
            ProcessingStyle::Realtime => 20,
            ProcessingStyle::Delayed => 100,
        }
    }

    /// Shortest profile kept, in seconds.
    pub fn profile_min_seconds(&self) -> u32 {
        match self {
            ProcessingStyle::Realtime => 60,
            ProcessingStyle::Delayed => 300,
        }
    }

    pub fn directory_name(&self) -> &'static str {
        match self {
            ProcessingStyle::Realtime => "Realtime",
            ProcessingStyle::Delayed => "Delayed",
        }
    }
}

impl fmt::Display for ProcessingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.directory_name())
    }
}

impl FromStr for ProcessingStyle {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "realtime" => Ok(ProcessingStyle::Realtime),
            "delayed" => Ok(ProcessingStyle::Delayed),
            other => Err(PipelineError::Validation(format!(
                "processing style must be 'realtime' or 'delayed', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    L0,
    L1,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::L0 => f.write_str("L0"),
            Stage::L1 => f.write_str("L1"),
        }
    }
}

/// Where a deployment's files live, relative to its main directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentLayout {
    main: PathBuf,
    style: ProcessingStyle,
}

impl DeploymentLayout {
    pub fn new(main: impl Into<PathBuf>, style: ProcessingStyle) -> Self {
        Self {
            main: main.into(),
            style,
        }
    }

    pub fn style(&self) -> ProcessingStyle {
        self.style
    }

    pub fn main_directory(&self) -> &Path {
        &self.main
    }

    pub fn binary_directory(&self) -> PathBuf {
        self.main.join("Raw")
    }

    pub fn cache_directory(&self) -> PathBuf {
        self.binary_directory().join("Cache")
    }

    pub fn style_directory(&self) -> PathBuf {
        self.main.join(self.style.directory_name())
    }

    pub fn timeseries_directory(&self, stage: Stage) -> PathBuf {
        self.style_directory().join(format!("{stage}-timeseries"))
    }

    pub fn profiles_directory(&self, stage: Stage) -> PathBuf {
        self.style_directory().join(format!("{stage}-profiles"))
    }

    pub fn config_path(&self) -> PathBuf {
        self.main.join(crate::config::DEFAULT_CONFIG_FILE)
    }
}

pub struct DecodeRequest<'a> {
    pub binaries: &'a [PathBuf],
    pub cache_directory: &'a Path,
    pub config: &'a DeploymentConfig,
    pub style: ProcessingStyle,
}

/// Converts raw glider binaries into a timeseries.
pub trait BinaryDecoder {
    fn decode(&self, request: &DecodeRequest<'_>) -> Result<TimeSeriesDataset>;
}

/// Splits a timeseries into per-profile files, returning what it wrote.
pub trait ProfileExtractor {
    fn extract(
        &self,
        timeseries: &TimeSeriesDataset,
        output_directory: &Path,
        style: ProcessingStyle,
    ) -> Result<Vec<PathBuf>>;
}

fn missing(what: String) -> PipelineError {
    PipelineError::Precondition(what)
}

pub struct PipelineDriver {
    layout: DeploymentLayout,
    config: DeploymentConfig,
    engine: QcEngine,
    l0: Option<PathBuf>,
    l1: Option<PathBuf>,
}

impl PipelineDriver {
    pub fn new(layout: DeploymentLayout, config: DeploymentConfig) -> Self {
        Self {
            layout,
            config,
            engine: QcEngine::default(),
            l0: None,
            l1: None,
        }
    }

    /// Reads the configuration from the layout's main directory.
    pub fn load(layout: DeploymentLayout) -> Result<Self> {
        let path = layout.config_path();
        if !path.is_file() {
            return Err(missing(format!(
                "deployment configuration {} does not exist",
                path.display()
            )));
        }
        let config = DeploymentConfig::load(&path)?;
        Ok(Self::new(layout, config))
    }

    pub fn with_engine(mut self, engine: QcEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn layout(&self) -> &DeploymentLayout {
        &self.layout
    }

    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    pub fn artifact(&self, stage: Stage) -> Option<&Path> {
        match stage {
            Stage::L0 => self.l0.as_deref(),
            Stage::L1 => self.l1.as_deref(),
        }
    }

    fn require(&self, stage: Stage, step: &str) -> Result<&Path> {
        self.artifact(stage).ok_or_else(|| {
            missing(format!(
                "{step} needs the {stage} timeseries; produce or attach it first"
            ))
        })
    }

    fn attach(path: &Path, stage: Stage) -> Result<PathBuf> {
        if !path.is_file() {
            return Err(missing(format!(
                "{stage} timeseries {} does not exist",
                path.display()
            )));
        }
        info!(stage = %stage, path = %path.display(), "attached existing timeseries");
        Ok(path.to_path_buf())
    }

    /// Uses an existing L0 archive instead of decoding again.
    pub fn attach_l0(&mut self, path: &Path) -> Result<()> {
        self.l0 = Some(Self::attach(path, Stage::L0)?);
        self.l1 = None;
        Ok(())
    }

    pub fn attach_l1(&mut self, path: &Path) -> Result<()> {
        self.require(Stage::L0, "attach_l1")?;
        self.l1 = Some(Self::attach(path, Stage::L1)?);
        Ok(())
    }

    /// Decodes the style's binaries into `<deployment_name>.kgz` under the
    /// L0 timeseries directory, optionally extracting L0 profiles.
    pub fn make_l0(
        &mut self,
        decoder: &dyn BinaryDecoder,
        profiles: Option<&dyn ProfileExtractor>,
    ) -> Result<PathBuf> {
        let style = self.layout.style();
        let binary_directory = self.layout.binary_directory();
        let binaries = discover_binaries(&binary_directory, style.search_pattern())?;
        if binaries.is_empty() {
            return Err(missing(format!(
                "make_l0 needs glider binaries matching {} in {}",
                style.search_pattern(),
                binary_directory.display()
            )));
        }

        let cache_directory = self.layout.cache_directory();
        let request = DecodeRequest {
            binaries: &binaries,
            cache_directory: &cache_directory,
            config: &self.config,
            style,
        };
        let dataset = decoder.decode(&request)?;

        let name = self.config.deployment_name()?;
        let path = self
            .layout
            .timeseries_directory(Stage::L0)
            .join(format!("{name}.{ARCHIVE_EXTENSION}"));
        write_archive(&dataset, &path)?;
        info!(path = %path.display(), rows = dataset.height(), "wrote L0 timeseries");

        if let Some(extractor) = profiles {
            let written =
                extractor.extract(&dataset, &self.layout.profiles_directory(Stage::L0), style)?;
            info!(profiles = written.len(), "extracted L0 profiles");
        }

        self.l0 = Some(path.clone());
        self.l1 = None;
        Ok(path)
    }

    /// Annotates the L0 timeseries with the configured QARTOD tests and
    /// writes it under the L1 directory with the same file name.
    pub fn make_l1(&mut self, profiles: Option<&dyn ProfileExtractor>) -> Result<QcReport> {
        let l0 = self.require(Stage::L0, "make_l1")?.to_path_buf();
        let qartod = self.config.qartod()?;

        let dataset = read_archive(&l0)?;
        let outcome = self.engine.annotate(&dataset, qartod)?;

        let file_name = l0.file_name().ok_or_else(|| {
            PipelineError::Validation(format!("L0 path {} has no file name", l0.display()))
        })?;
        let path = self.layout.timeseries_directory(Stage::L1).join(file_name);
        write_archive(&outcome.dataset, &path)?;
        info!(path = %path.display(), annotated = outcome.report.annotated.len(), "wrote L1 timeseries");

        if let Some(extractor) = profiles {
            let written = extractor.extract(
                &outcome.dataset,
                &self.layout.profiles_directory(Stage::L1),
                self.layout.style(),
            )?;
            info!(profiles = written.len(), "extracted L1 profiles");
        }

        self.l1 = Some(path);
        Ok(outcome.report)
    }

    /// Checks the stage's profile files with an external checker.
    pub fn check_compliance(
        &self,
        stage: Stage,
        extension: &str,
        checker: &dyn ComplianceChecker,
        verbosity: u8,
    ) -> Result<ComplianceReport> {
        self.require(stage, "check_compliance")?;
        let directory = self.layout.profiles_directory(stage);
        if !directory.is_dir() {
            return Err(missing(format!(
                "check_compliance needs {stage} profiles in {}",
                directory.display()
            )));
        }
        check_directory(&directory, extension, checker, verbosity)
    }

    /// Renders a summary of the stage's timeseries next to the style
    /// directories, named after the timeseries file.
    pub fn create_summary(
        &self,
        stage: Stage,
        renderer: &dyn SummaryRenderer,
        panels: Vec<PlotPanel>,
    ) -> Result<PathBuf> {
        let timeseries = self.require(stage, "create_summary")?;
        let dataset = read_archive(timeseries)?;
        let summary = DeploymentSummary::from_dataset(&dataset, panels)?;

        let stem = timeseries
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| summary.deployment_name.clone());
        let output = self
            .layout
            .style_directory()
            .join(format!("{stem}_{stage}_summary.{}", renderer.extension()));
        render_summary(renderer, &summary, &output)?;
        Ok(output)
    }
}
