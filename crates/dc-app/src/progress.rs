use crate::run_service::RunMode;

#[derive(Debug, Clone, PartialEq)]
pub enum RunStage {
    LoadingProject,
    CheckingCache,
    LoadingCachedResult,
    CompilingProject,
    SolvingColumn,
    Optimizing,
    Sweeping,
    SavingReport,
    Completed,
}

impl RunStage {
    pub fn label(&self) -> &'static str {
        match self {
            RunStage::LoadingProject => "Loading project",
            RunStage::CheckingCache => "Checking cache",
            RunStage::LoadingCachedResult => "Loading cached result",
            RunStage::CompilingProject => "Compiling project",
            RunStage::SolvingColumn => "Solving column",
            RunStage::Optimizing => "Optimizing reflux",
            RunStage::Sweeping => "Sweeping reflux",
            RunStage::SavingReport => "Saving report",
            RunStage::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnProgress {
    pub sweep: Option<usize>,
    pub max_sweeps: Option<usize>,
    pub residual: Option<f64>,
    pub failed_stages: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct RunProgressEvent {
    pub mode: RunMode,
    pub stage: RunStage,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
    pub column: Option<ColumnProgress>,
}

impl RunProgressEvent {
    pub fn stage(
        mode: RunMode,
        stage: RunStage,
        elapsed_wall_s: f64,
        message: Option<String>,
    ) -> Self {
        Self {
            mode,
            stage,
            elapsed_wall_s,
            message,
            column: None,
        }
    }
}
