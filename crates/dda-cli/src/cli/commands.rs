use super::CliError;
use super::helpers::*;
use dda_core::cases::CommandCase;
use dda_core::domain::BenchError;
use dda_core::engines::EngineRegistry;
use dda_core::orchestrator::{BenchSettings, case_quantities, run_bench, validate_cases};
use dda_core::results::{REPORT_FILE, render_human_summary};
use dda_core::runner::ProcessRunner;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(clap::Args)]
pub(super) struct InputArgs {
    /// Command-case file
    #[arg(long, default_value = "DDA_commands")]
    commands: PathBuf,

    /// Engine configuration JSON
    #[arg(long, default_value = "dda_codes.json")]
    code_config: PathBuf,

    /// Handling of unrecognized aeff/lambda units: strict or assume-meters
    #[arg(long, default_value = "strict")]
    unit_policy: String,
}

impl InputArgs {
    fn load(&self) -> Result<(Vec<CommandCase>, EngineRegistry), CliError> {
        let unit_policy = parse_unit_policy(&self.unit_policy)?;
        let registry = load_registry(&self.code_config, unit_policy)?;
        let cases = load_cases(&self.commands)?;
        Ok((cases, registry))
    }
}

#[derive(clap::Args)]
pub(super) struct RunArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Output root; one directory per case
    #[arg(short, long, default_value = "outputs")]
    output: PathBuf,

    /// OMP_NUM_THREADS passed to every engine
    #[arg(long, default_value_t = 1)]
    omp: usize,

    /// Cases run concurrently
    #[arg(long, default_value_t = 1)]
    jobs: usize,

    /// Wall-clock limit per engine invocation
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Extra quantity to extract and compare (repeatable)
    #[arg(long = "quantity")]
    quantities: Vec<String>,

    /// Remove engine scratch files after the run
    #[arg(long)]
    clean: bool,

    /// Root for prepare-step sources (default: the engine config's directory)
    #[arg(long)]
    resource_root: Option<PathBuf>,
}

impl RunArgs {
    fn into_settings(self) -> Result<BenchSettings, CliError> {
        if self.jobs == 0 {
            return Err(CliError::Usage("--jobs must be at least 1".to_string()));
        }
        let resource_root =
            resolve_resource_root(self.resource_root.as_deref(), &self.input.code_config)?;

        let mut settings = BenchSettings {
            output_dir: self.output,
            resource_root,
            omp_threads: self.omp,
            jobs: self.jobs,
            timeout: self.timeout_secs.map(Duration::from_secs),
            clean: self.clean,
            ..BenchSettings::default()
        };
        for quantity in self.quantities {
            if !settings.quantities.contains(&quantity) {
                settings.quantities.push(quantity);
            }
        }
        Ok(settings)
    }
}

#[derive(clap::Args)]
pub(super) struct CheckArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Print the check summary as JSON
    #[arg(long)]
    json: bool,
}

pub(super) fn run_bench_command(args: RunArgs) -> Result<i32, CliError> {
    let (cases, registry) = args.input.load()?;
    let settings = args.into_settings()?;

    let runner = ProcessRunner::new();
    let report = run_bench(&cases, &registry, &runner, &settings)?;
    println!("{}", render_human_summary(&report));
    println!(
        "JSON report: {}",
        settings.output_dir.join(REPORT_FILE).display()
    );

    if report.passed { Ok(0) } else { Ok(1) }
}

#[derive(Debug, Serialize)]
struct CheckedCase {
    case_id: String,
    engines: Vec<String>,
    commands: usize,
    quantities: Vec<String>,
    skip_pairs: Vec<(String, String)>,
}

#[derive(Debug, Serialize)]
struct CheckSummary {
    case_count: usize,
    command_count: usize,
    engines: Vec<String>,
    cases: Vec<CheckedCase>,
}

fn check_summary(cases: &[CommandCase], registry: &EngineRegistry) -> Result<CheckSummary, CliError> {
    let defaults = BenchSettings::default().quantities;
    let mut checked = Vec::with_capacity(cases.len());
    for case in cases {
        let mut engines = Vec::new();
        for command in &case.commands {
            let engine = registry.detect(&command.text).map_err(BenchError::from)?;
            if !engines.contains(&engine.name) {
                engines.push(engine.name.clone());
            }
        }
        checked.push(CheckedCase {
            case_id: case.case_id.clone(),
            engines,
            commands: case.commands.len(),
            quantities: case_quantities(&defaults, case.policy.flags),
            skip_pairs: case.skip_pairs.clone(),
        });
    }

    Ok(CheckSummary {
        case_count: cases.len(),
        command_count: cases.iter().map(|case| case.commands.len()).sum(),
        engines: registry
            .engines()
            .iter()
            .map(|engine| engine.name.clone())
            .collect(),
        cases: checked,
    })
}

fn render_check_summary(summary: &CheckSummary) -> String {
    let mut lines = vec![
        format!(
            "Check status: OK ({} cases, {} commands)",
            summary.case_count, summary.command_count
        ),
        format!("Engines: {}", summary.engines.join(", ")),
    ];
    for case in &summary.cases {
        lines.push(format!(
            "{}: {} [{}]",
            case.case_id,
            case.engines.join(", "),
            case.quantities.join(",")
        ));
    }
    lines.join("\n")
}

pub(super) fn run_check_command(args: CheckArgs) -> Result<i32, CliError> {
    let (cases, registry) = args.input.load()?;
    validate_cases(&cases, &registry)?;
    let summary = check_summary(&cases, &registry)?;

    if args.json {
        let rendered = serde_json::to_string_pretty(&summary)
            .map_err(|error| anyhow::anyhow!("failed to serialize check summary: {error}"))?;
        println!("{}", rendered);
    } else {
        println!("{}", render_check_summary(&summary));
    }
    Ok(0)
}
