//! Project loading, saving, validation, and introspection.

use std::path::Path;

use dc_project::schema::{ComponentDef, Project};

use crate::error::{AppError, AppResult};

/// Summary of a project for listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSummary {
    pub name: String,
    pub components: Vec<String>,
    pub catalog_components: usize,
    pub stages: usize,
    pub feed_stage: u32,
    pub reflux_ratio: f64,
    pub has_optimization: bool,
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Load a project from YAML, or JSON when the extension says so.
pub fn load_project(path: &Path) -> AppResult<Project> {
    if !path.exists() {
        return Err(AppError::ProjectFileRead {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        });
    }
    let project = if is_json(path) {
        dc_project::load_json(path)?
    } else {
        dc_project::load_yaml(path)?
    };
    Ok(project)
}

pub fn save_project(path: &Path, project: &Project) -> AppResult<()> {
    validate_project(project)?;
    let result = if is_json(path) {
        dc_project::save_json(path, project)
    } else {
        dc_project::save_yaml(path, project)
    };
    result.map_err(|e| match e {
        dc_project::ProjectError::Io(source) => AppError::ProjectFileWrite {
            path: path.to_path_buf(),
            source,
        },
        other => other.into(),
    })
}

pub fn validate_project(project: &Project) -> AppResult<()> {
    dc_project::validate_project(project).map_err(|e| AppError::Validation(e.to_string()))
}

pub fn summarize(project: &Project) -> ProjectSummary {
    ProjectSummary {
        name: project.name.clone(),
        components: project
            .component_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
        catalog_components: project
            .components
            .iter()
            .filter(|c| matches!(c, ComponentDef::Catalog { .. }))
            .count(),
        stages: project.column.stages,
        feed_stage: project.column.feed.stage,
        reflux_ratio: project.column.reflux_ratio,
        has_optimization: project.optimization.is_some(),
    }
}
