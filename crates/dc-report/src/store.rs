//! On-disk report storage, one directory per run id.

use crate::csv::{candidate_table_csv, stage_table_csv};
use crate::types::{ColumnReport, OptimizationReport, RunManifest, SweepReport};
use crate::{ReportError, ReportResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

const MANIFEST: &str = "manifest.json";
const REPORT: &str = "report.json";
const STAGES: &str = "stages.csv";
const CANDIDATES: &str = "candidates.csv";

#[derive(Debug, Clone)]
pub struct ReportStore {
    root_dir: PathBuf,
}

impl ReportStore {
    pub fn new(root_dir: PathBuf) -> ReportResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    /// Store next to the project file, under `.distilcol/runs`.
    pub fn for_project(project_path: &Path) -> ReportResult<Self> {
        let project_dir = project_path
            .parent()
            .ok_or_else(|| ReportError::InvalidPath {
                message: "project path has no parent directory".to_string(),
            })?;
        Self::new(project_dir.join(".distilcol").join("runs"))
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root_dir.join(run_id)
    }

    pub fn has_run(&self, run_id: &str) -> bool {
        self.run_dir(run_id).join(MANIFEST).exists()
    }

    fn save<T: Serialize>(
        &self,
        manifest: &RunManifest,
        report: &T,
        tables: &[(&str, String)],
    ) -> ReportResult<PathBuf> {
        let run_dir = self.run_dir(&manifest.run_id);
        fs::create_dir_all(&run_dir)?;
        fs::write(run_dir.join(MANIFEST), serde_json::to_string_pretty(manifest)?)?;
        fs::write(run_dir.join(REPORT), serde_json::to_string_pretty(report)?)?;
        for (name, content) in tables {
            fs::write(run_dir.join(name), content)?;
        }
        Ok(run_dir)
    }

    pub fn save_column(&self, report: &ColumnReport) -> ReportResult<PathBuf> {
        self.save(
            &report.manifest,
            report,
            &[(STAGES, stage_table_csv(report))],
        )
    }

    pub fn save_optimization(&self, report: &OptimizationReport) -> ReportResult<PathBuf> {
        self.save(
            report.manifest(),
            report,
            &[
                (STAGES, stage_table_csv(&report.column)),
                (
                    CANDIDATES,
                    candidate_table_csv(&report.column.components, &report.candidates),
                ),
            ],
        )
    }

    pub fn save_sweep(&self, report: &SweepReport) -> ReportResult<PathBuf> {
        self.save(
            &report.manifest,
            report,
            &[(CANDIDATES, candidate_table_csv(&report.components, &report.candidates))],
        )
    }

    fn load<T: DeserializeOwned>(&self, run_id: &str, file: &str) -> ReportResult<T> {
        let path = self.run_dir(run_id).join(file);
        if !path.exists() {
            return Err(ReportError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn load_manifest(&self, run_id: &str) -> ReportResult<RunManifest> {
        self.load(run_id, MANIFEST)
    }

    pub fn load_column(&self, run_id: &str) -> ReportResult<ColumnReport> {
        self.load(run_id, REPORT)
    }

    pub fn load_optimization(&self, run_id: &str) -> ReportResult<OptimizationReport> {
        self.load(run_id, REPORT)
    }

    pub fn load_sweep(&self, run_id: &str) -> ReportResult<SweepReport> {
        self.load(run_id, REPORT)
    }

    /// Manifests of every stored run, oldest first.
    pub fn list_runs(&self) -> ReportResult<Vec<RunManifest>> {
        let mut runs = Vec::new();
        if !self.root_dir.exists() {
            return Ok(runs);
        }
        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            if entry.path().is_dir() {
                let run_id = entry.file_name().to_string_lossy().to_string();
                if let Ok(manifest) = self.load_manifest(&run_id) {
                    runs.push(manifest);
                }
            }
        }
        runs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(runs)
    }

    pub fn delete_run(&self, run_id: &str) -> ReportResult<()> {
        let run_dir = self.run_dir(run_id);
        if run_dir.exists() {
            fs::remove_dir_all(run_dir)?;
        }
        Ok(())
    }
}
