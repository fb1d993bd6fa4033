use crate::compare::EngineSnapshot;
use crate::domain::EngineValues;
use crate::runner::RunRecord;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Everything gathered for one engine while a case runs.
#[derive(Debug, Clone, Default)]
pub struct EngineRecord {
    pub name: String,
    pub values: EngineValues,
    pub series: BTreeMap<String, Vec<f64>>,
    pub outputs: Vec<PathBuf>,
    pub runs: Vec<RunRecord>,
}

impl EngineRecord {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn first_output(&self) -> Option<&Path> {
        self.outputs.first().map(PathBuf::as_path)
    }

    /// Outcome labels of every unsuccessful run, comma separated.
    pub fn run_issue(&self) -> Option<String> {
        let issues = self
            .runs
            .iter()
            .filter_map(|run| {
                run.status
                    .issue()
                    .map(|issue| format!("cmd{:03}:{issue}", run.command_index))
            })
            .collect::<Vec<_>>();
        (!issues.is_empty()).then(|| issues.join(","))
    }
}

/// Case-scoped accumulator, engines kept in first-appearance order.
#[derive(Debug, Clone, Default)]
pub struct CaseValues {
    engines: Vec<EngineRecord>,
}

impl CaseValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engine_mut(&mut self, name: &str) -> &mut EngineRecord {
        let index = match self.engines.iter().position(|record| record.name == name) {
            Some(index) => index,
            None => {
                self.engines.push(EngineRecord::new(name));
                self.engines.len() - 1
            }
        };
        &mut self.engines[index]
    }

    pub fn engines(&self) -> &[EngineRecord] {
        &self.engines
    }

    pub fn engines_mut(&mut self) -> impl Iterator<Item = &mut EngineRecord> {
        self.engines.iter_mut()
    }

    pub fn engine(&self, name: &str) -> Option<&EngineRecord> {
        self.engines.iter().find(|record| record.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.engine(name).is_some()
    }

    pub fn engine_names(&self) -> Vec<String> {
        self.engines
            .iter()
            .map(|record| record.name.clone())
            .collect()
    }

    pub fn runs(&self) -> impl Iterator<Item = &RunRecord> {
        self.engines.iter().flat_map(|record| record.runs.iter())
    }
}

/// Holds per-engine run issues so comparator snapshots can borrow them.
pub(super) struct SnapshotSet<'a> {
    records: &'a [EngineRecord],
    issues: Vec<Option<String>>,
}

impl<'a> SnapshotSet<'a> {
    pub(super) fn new(values: &'a CaseValues) -> Self {
        Self {
            records: values.engines(),
            issues: values.engines().iter().map(EngineRecord::run_issue).collect(),
        }
    }

    pub(super) fn snapshots(&self) -> Vec<EngineSnapshot<'_>> {
        self.records
            .iter()
            .zip(&self.issues)
            .map(|(record, issue)| EngineSnapshot {
                name: record.name.as_str(),
                values: &record.values,
                series: &record.series,
                run_issue: issue.as_deref(),
            })
            .collect()
    }
}
