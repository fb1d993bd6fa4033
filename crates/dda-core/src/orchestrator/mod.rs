//! Case lifecycle: run every command, enrich the extracted values, compare
//! engine pairs and persist the results.

mod values;

pub use values::{CaseValues, EngineRecord};

use crate::cases::{CommandCase, FeatureFlags};
use crate::compare::{PairReport, compare_case};
use crate::domain::{BenchError, BenchResult, DEFAULT_QUANTITIES, Quantity};
use crate::engines::{ConfigError, EngineRegistry};
use crate::extract::{extract_aeff, extract_lambda, extract_scalar, extract_series};
use crate::reconcile::{add_recomputed_quantities, fill_cross_sections};
use crate::results::{
    BenchRunReport, REPORT_FILE, SUMMARY_FILE, case_dir, case_dir_name, write_case_results, write_report_file,
    write_summary_csv,
};
use crate::runner::{EngineRunner, Invocation, RunRecord, clean_output_tree, prepare_work_dir};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use values::SnapshotSet;

#[derive(Debug, Clone)]
pub struct BenchSettings {
    pub output_dir: PathBuf,
    pub resource_root: PathBuf,
    pub omp_threads: usize,
    pub jobs: usize,
    pub timeout: Option<Duration>,
    pub quantities: Vec<String>,
    pub clean: bool,
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            resource_root: PathBuf::from("."),
            omp_threads: 1,
            jobs: 1,
            timeout: None,
            quantities: DEFAULT_QUANTITIES.iter().map(|name| name.to_string()).collect(),
            clean: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub case_id: String,
    pub passed: bool,
    pub engines: Vec<String>,
    pub quantities: Vec<String>,
    pub pair_count: usize,
    pub failed_pair_count: usize,
    pub skipped_pair_count: usize,
    pub pairs: Vec<PairReport>,
    pub runs: Vec<RunRecord>,
    pub results_path: String,
}

/// Narrows the run's quantity list to what a case's feature flags ask for,
/// then appends anything a flag requires that the list omitted.
pub fn case_quantities(base: &[String], flags: FeatureFlags) -> Vec<String> {
    let wanted = |name: &str| match Quantity::parse(name) {
        Some(Quantity::IntField) => flags.need_int,
        Some(Quantity::E0) => flags.needs_field_amplitude(),
        Some(Quantity::Force | Quantity::Cpr) => flags.need_force,
        Some(Quantity::Torque | Quantity::Qtrq) => flags.need_torque,
        Some(Quantity::Mueller) => flags.need_mueller,
        _ => true,
    };
    let mut quantities = base
        .iter()
        .filter(|name| wanted(name))
        .cloned()
        .collect::<Vec<_>>();

    let required = [
        (flags.need_int, Quantity::IntField),
        (flags.needs_field_amplitude(), Quantity::E0),
        (flags.need_force, Quantity::Force),
        (flags.need_torque, Quantity::Torque),
        (flags.need_mueller, Quantity::Mueller),
    ];
    for (needed, quantity) in required {
        if needed && !quantities.iter().any(|name| name == quantity.as_str()) {
            quantities.push(quantity.as_str().to_string());
        }
    }
    quantities
}

/// Fails before anything runs if a case names an unknown skip-pair engine,
/// holds a command no engine claims, or shares its output directory with
/// another case.
pub fn validate_cases(cases: &[CommandCase], registry: &EngineRegistry) -> BenchResult<()> {
    let mut dir_owners: HashMap<String, &str> = HashMap::new();
    for case in cases {
        let dir = case_dir_name(&case.case_id);
        if let Some(owner) = dir_owners.insert(dir.clone(), &case.case_id) {
            return Err(BenchError::input_validation(
                "INPUT.CASE_DIR_COLLISION",
                format!(
                    "cases '{}' and '{}' both write to output directory '{}'",
                    owner, case.case_id, dir
                ),
            ));
        }
        for (first, second) in &case.skip_pairs {
            for engine in [first, second] {
                if !registry.contains(engine) {
                    return Err(ConfigError::UnknownSkipPairEngine {
                        case_id: case.case_id.clone(),
                        engine: engine.clone(),
                    }
                    .into());
                }
            }
        }
        for command in &case.commands {
            registry.detect(&command.text)?;
        }
    }
    Ok(())
}

pub struct CaseOrchestrator<'a, R: EngineRunner> {
    registry: &'a EngineRegistry,
    runner: &'a R,
    settings: &'a BenchSettings,
}

impl<'a, R: EngineRunner> CaseOrchestrator<'a, R> {
    pub fn new(registry: &'a EngineRegistry, runner: &'a R, settings: &'a BenchSettings) -> Self {
        Self {
            registry,
            runner,
            settings,
        }
    }

    /// Runs cases in input order. With more than one job the cases share a
    /// rayon pool; reports still come back in input order.
    pub fn run_cases(&self, cases: &[CommandCase]) -> BenchResult<Vec<CaseReport>> {
        validate_cases(cases, self.registry)?;
        if self.settings.jobs <= 1 || cases.len() <= 1 {
            return cases.iter().map(|case| self.run_case(case)).collect();
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.jobs)
            .build()
            .map_err(|source| {
                BenchError::internal(
                    "SYS.THREAD_POOL",
                    format!("failed to build a pool of {} workers: {}", self.settings.jobs, source),
                )
            })?;
        pool.install(|| cases.par_iter().map(|case| self.run_case(case)).collect())
    }

    pub fn run_case(&self, case: &CommandCase) -> BenchResult<CaseReport> {
        let quantities = case_quantities(&self.settings.quantities, case.policy.flags);
        info!(
            "case {}: {} command(s), quantities {}",
            case.case_id,
            case.commands.len(),
            quantities.join(",")
        );

        let mut values = self.run_commands(case, &quantities)?;
        self.warn_on_absent_skip_pairs(case, &values);
        self.enrich(case, &mut values);

        let pairs = {
            let snapshots = SnapshotSet::new(&values);
            compare_case(case, &quantities, &snapshots.snapshots())
        };
        let results_path = write_case_results(&self.settings.output_dir, &case.case_id, &values)?;

        let pair_count = pairs.len();
        let skipped_pair_count = pairs.iter().filter(|pair| pair.skipped).count();
        let failed_pair_count = pairs.iter().filter(|pair| !pair.passed).count();
        Ok(CaseReport {
            case_id: case.case_id.clone(),
            passed: failed_pair_count == 0,
            engines: values.engine_names(),
            quantities,
            pair_count,
            failed_pair_count,
            skipped_pair_count,
            pairs,
            runs: values.runs().cloned().collect(),
            results_path: results_path.to_string_lossy().replace('\\', "/"),
        })
    }

    fn run_commands(&self, case: &CommandCase, quantities: &[String]) -> BenchResult<CaseValues> {
        let mut values = CaseValues::new();
        let case_root = case_dir(&self.settings.output_dir, &case.case_id);

        for (index, command) in case.commands.iter().enumerate() {
            let engine = self.registry.detect(&command.text)?;
            let work_dir = case_root
                .join(&engine.name)
                .join(format!("cmd{index:03}"));
            prepare_work_dir(engine, &self.settings.resource_root, &work_dir)?;

            let invocation = Invocation {
                engine: engine.name.clone(),
                command_index: index,
                command_line: engine.invocation_line(&command.text),
                work_dir,
                env: engine.env.clone(),
                omp_threads: self.settings.omp_threads,
                timeout: self.settings.timeout,
            };
            let run = self.runner.run(&invocation)?;
            let primary_output = run.stdout_path.clone();

            let record = values.engine_mut(&engine.name);
            for quantity in quantities.iter().filter(|name| !is_series_quantity(name)) {
                if let Some(value) = extract_scalar(engine, quantity, &primary_output) {
                    record.values.insert_raw(quantity.as_str(), value);
                }
            }
            record.outputs.push(primary_output);
            record.runs.push(run);
        }
        Ok(values)
    }

    fn warn_on_absent_skip_pairs(&self, case: &CommandCase, values: &CaseValues) {
        for (first, second) in &case.skip_pairs {
            if !values.contains(first) || !values.contains(second) {
                warn!(
                    "{}: @skip_pairs ({}, {}) names an engine that did not run in this case (present: {})",
                    case.case_id,
                    first,
                    second,
                    values.engine_names().join(", ")
                );
            }
        }
    }

    /// Adds lengths, back-filled cross-sections, recomputed force and torque
    /// proxies and the series a case's flags require. All of it is read from
    /// the engine's first output.
    fn enrich(&self, case: &CommandCase, values: &mut CaseValues) {
        let flags = case.policy.flags;
        let series_quantities = [
            (flags.need_int, Quantity::IntField),
            (flags.need_mueller, Quantity::Mueller),
        ];

        for record in values.engines_mut() {
            let Some(engine) = self.registry.get(&record.name) else {
                continue;
            };
            let Some(primary_output) = record.first_output().map(Path::to_path_buf) else {
                continue;
            };

            if let Some(aeff) = extract_aeff(engine, &primary_output) {
                record.values.insert_raw(Quantity::Aeff.as_str(), aeff);
                fill_cross_sections(&mut record.values, aeff);
            }
            if let Some(lambda) = extract_lambda(engine, &primary_output) {
                record.values.insert_raw(Quantity::Lambda.as_str(), lambda);
            }
            add_recomputed_quantities(&mut record.values);

            for (needed, quantity) in series_quantities {
                if !needed {
                    continue;
                }
                if let Some(series) =
                    extract_series(engine, quantity.as_str(), &primary_output, &record.values)
                {
                    record.series.insert(quantity.as_str().to_string(), series);
                }
            }
        }
    }
}

fn is_series_quantity(name: &str) -> bool {
    Quantity::parse(name).is_some_and(Quantity::is_series)
}

/// Runs every case, then summarizes, cleans and writes the run report under
/// the output directory.
pub fn run_bench<R: EngineRunner>(
    cases: &[CommandCase],
    registry: &EngineRegistry,
    runner: &R,
    settings: &BenchSettings,
) -> BenchResult<BenchRunReport> {
    let orchestrator = CaseOrchestrator::new(registry, runner, settings);
    let case_reports = orchestrator.run_cases(cases)?;

    write_summary_csv(&settings.output_dir, &settings.output_dir.join(SUMMARY_FILE))?;
    if settings.clean {
        let removed = clean_output_tree(&settings.output_dir, registry);
        info!("cleanup removed {} entries under {}", removed, settings.output_dir.display());
    }

    let report = BenchRunReport::from_cases(&settings.output_dir, case_reports);
    write_report_file(&settings.output_dir.join(REPORT_FILE), &report)?;
    Ok(report)
}
