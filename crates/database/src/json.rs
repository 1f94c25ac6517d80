//! JSON-file record store.
//!
//! Default layout is two sibling files per task inside the working
//! directory: a workload index and a tuning-record index. The file naming
//! convention (`{task_name}_database_workload.json`,
//! `{task_name}_database_tuning_record.json`) is part of the pipeline
//! contract; the schema inside them is ours.

use crate::db::Database;
use crate::record::{TuningRecord, Workload, WorkloadId};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tuneforge_ir::{structural_eq, structural_hash, ProgramModule};

#[derive(Debug, Default, Serialize, Deserialize)]
struct State {
    workloads: Vec<Workload>,
    records: Vec<TuningRecord>,
}

pub struct JsonDatabase {
    state: Mutex<State>,
    paths: Option<(PathBuf, PathBuf)>,
}

impl JsonDatabase {
    /// Open (or create) a database backed by the two given files.
    pub fn new(path_workload: &Path, path_tuning_record: &Path) -> Result<Self> {
        let workloads = load_vec(path_workload)?;
        let records = load_vec(path_tuning_record)?;
        info!(
            workload = %path_workload.display(),
            tuning_record = %path_tuning_record.display(),
            "opened JSON database"
        );
        Ok(Self {
            state: Mutex::new(State { workloads, records }),
            paths: Some((path_workload.to_path_buf(), path_tuning_record.to_path_buf())),
        })
    }

    /// Database with no backing files, for tests and ephemeral runs.
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(State::default()),
            paths: None,
        }
    }

    fn persist(&self, state: &State) -> Result<()> {
        let Some((path_workload, path_tuning_record)) = &self.paths else {
            return Ok(());
        };
        write_vec(path_workload, &state.workloads)?;
        write_vec(path_tuning_record, &state.records)?;
        Ok(())
    }
}

impl Database for JsonDatabase {
    fn commit_workload(&self, module: &ProgramModule) -> Result<WorkloadId> {
        let mut state = self.state.lock().expect("database mutex poisoned");
        let hash = structural_hash(module);
        for workload in &state.workloads {
            if structural_hash(&workload.module) == hash
                && structural_eq(&workload.module, module)
            {
                return Ok(workload.id);
            }
        }
        let id = WorkloadId(state.workloads.len() as u64);
        state.workloads.push(Workload {
            id,
            module: module.clone(),
        });
        self.persist(&state)?;
        Ok(id)
    }

    fn commit_record(&self, record: TuningRecord) -> Result<()> {
        let mut state = self.state.lock().expect("database mutex poisoned");
        state.records.push(record);
        self.persist(&state)?;
        Ok(())
    }

    fn get_top_k(&self, workload: WorkloadId, k: usize) -> Vec<TuningRecord> {
        let state = self.state.lock().expect("database mutex poisoned");
        let mut matching: Vec<TuningRecord> = state
            .records
            .iter()
            .filter(|record| record.workload_id == workload)
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            a.achieved_cost()
                .partial_cmp(&b.achieved_cost())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matching.truncate(k);
        matching
    }

    fn len(&self) -> usize {
        self.state.lock().expect("database mutex poisoned").records.len()
    }
}

fn load_vec<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let items = serde_json::from_slice(&data)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(items)
}

fn write_vec<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let blob = serde_json::to_vec_pretty(items)?;
    fs::write(path, blob).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuneforge_ir::{tensor, DataType, ProgramModule, Trace, UnitBuilder};

    fn matmul_module(m: usize) -> ProgramModule {
        let unit = UnitBuilder::new()
            .matmul(
                "mm",
                tensor("a", &[m, 8], DataType::F32),
                tensor("b", &[8, 8], DataType::F32),
                tensor("c", &[m, 8], DataType::F32),
            )
            .build();
        ProgramModule::single(unit)
    }

    #[test]
    fn test_commit_workload_idempotent() {
        let db = JsonDatabase::in_memory();
        let first = db.commit_workload(&matmul_module(4)).unwrap();
        let second = db.commit_workload(&matmul_module(4)).unwrap();
        let other = db.commit_workload(&matmul_module(8)).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn test_top_k_orders_by_cost() {
        let db = JsonDatabase::in_memory();
        let id = db.commit_workload(&matmul_module(4)).unwrap();
        db.commit_record(TuningRecord::new(id, Trace::new(), vec![3.0]))
            .unwrap();
        db.commit_record(TuningRecord::new(id, Trace::new(), vec![1.0]))
            .unwrap();
        db.commit_record(TuningRecord::new(id, Trace::new(), vec![2.0]))
            .unwrap();
        let top = db.get_top_k(id, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].achieved_cost(), 1.0);
        assert_eq!(top[1].achieved_cost(), 2.0);
    }

    #[test]
    fn test_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let wpath = dir.path().join("main_database_workload.json");
        let rpath = dir.path().join("main_database_tuning_record.json");
        let id = {
            let db = JsonDatabase::new(&wpath, &rpath).unwrap();
            let id = db.commit_workload(&matmul_module(4)).unwrap();
            db.commit_record(TuningRecord::new(id, Trace::new(), vec![0.25]))
                .unwrap();
            id
        };
        assert!(wpath.exists());
        assert!(rpath.exists());

        let reopened = JsonDatabase::new(&wpath, &rpath).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.commit_workload(&matmul_module(4)).unwrap(), id);
        assert_eq!(reopened.get_top_k(id, 1)[0].achieved_cost(), 0.25);
    }
}
