use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::ResubmitDirs;
use crate::domain::JobRecord;
use crate::error::HarvestError;
use crate::store::{ResultStore, recreate_dir};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedJob {
    pub receptor_file: String,
    pub ligand_file: String,
    pub job_name: String,
}

/// Jobs to submit again, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResubmitPlan {
    pub receptors: Vec<String>,
    pub ligands: Vec<String>,
    pub jobs: Vec<PlannedJob>,
}

impl ResubmitPlan {
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Selects job names for which every recorded attempt failed to yield a job id.
/// A name with at least one successful attempt is left alone.
pub fn plan_resubmission(records: &[JobRecord]) -> ResubmitPlan {
    let mut all_failed = HashMap::<&str, bool>::new();
    for record in records {
        let failed = record.download_id.is_err();
        all_failed
            .entry(record.job_name.as_str())
            .and_modify(|every| *every &= failed)
            .or_insert(failed);
    }

    let mut plan = ResubmitPlan::default();
    let mut seen_receptors = HashSet::new();
    let mut seen_ligands = HashSet::new();
    let mut seen_jobs = HashSet::new();
    for record in records {
        if !all_failed.get(record.job_name.as_str()).copied().unwrap_or(false) {
            continue;
        }
        if seen_receptors.insert(record.receptor_file.as_str()) {
            plan.receptors.push(record.receptor_file.clone());
        }
        if seen_ligands.insert(record.ligand_file.as_str()) {
            plan.ligands.push(record.ligand_file.clone());
        }
        let key = (
            record.receptor_file.as_str(),
            record.ligand_file.as_str(),
            record.job_name.as_str(),
        );
        if seen_jobs.insert(key) {
            plan.jobs.push(PlannedJob {
                receptor_file: record.receptor_file.clone(),
                ligand_file: record.ligand_file.clone(),
                job_name: record.job_name.clone(),
            });
        }
    }
    info!(
        jobs = plan.jobs.len(),
        receptors = plan.receptors.len(),
        ligands = plan.ligands.len(),
        "planned resubmission"
    );
    plan
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub copied: Vec<String>,
    /// Planned files absent from their source directory.
    pub missing: Vec<String>,
}

/// Recreates both submission directories and copies the planned files into them.
pub fn stage_resubmission(plan: &ResubmitPlan, dirs: &ResubmitDirs) -> Result<StageReport, HarvestError> {
    let mut report = StageReport::default();
    stage_files(
        &plan.receptors,
        dirs.source_receptor_dir.as_std_path(),
        dirs.submit_receptor_dir.as_std_path(),
        &mut report,
    )?;
    stage_files(
        &plan.ligands,
        dirs.source_ligand_dir.as_std_path(),
        dirs.submit_ligand_dir.as_std_path(),
        &mut report,
    )?;
    info!(
        copied = report.copied.len(),
        missing = report.missing.len(),
        "staged resubmission"
    );
    Ok(report)
}

fn stage_files(
    names: &[String],
    source: &Path,
    target: &Path,
    report: &mut StageReport,
) -> Result<(), HarvestError> {
    recreate_dir(target).map_err(|err| HarvestError::Filesystem(format!("{}: {err}", target.display())))?;
    for name in names {
        let from = source.join(name);
        if !from.is_file() {
            warn!(file = %from.display(), "source structure not found");
            report.missing.push(name.clone());
            continue;
        }
        ResultStore::copy_file_atomic(&from, &target.join(name))?;
        report.copied.push(name.clone());
    }
    Ok(())
}
