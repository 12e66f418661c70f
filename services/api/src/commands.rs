use crate::infra::load_scoring_service;
use clap::Args;
use lca_predictor::config::AppConfig;
use lca_predictor::error::AppError;
use lca_predictor::scoring::router::PredictionView;
use lca_predictor::scoring::wage::{build_index, WageBenchmarkIndex};
use lca_predictor::scoring::{parse_number, ApplicationRecord, BulkProcessor, WageComparison};
use lca_predictor::telemetry;
use serde::Serialize;
use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct PredictArgs {
    /// JSON file holding one application (disclosure or form field names)
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Print the full assessment as JSON instead of a summary
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct WageCompareArgs {
    /// Occupation (SOC) code, e.g. 15-1252
    #[arg(long)]
    pub(crate) soc: String,
    /// Two-letter worksite state
    #[arg(long)]
    pub(crate) state: String,
    /// Offered wage; currency symbols and separators are ignored
    #[arg(long)]
    pub(crate) wage: String,
    /// Pay unit of the offered wage (Year, Month, Bi-Weekly, Week, Day, Hour)
    #[arg(long, default_value = "Year")]
    pub(crate) unit: String,
}

#[derive(Args, Debug)]
pub(crate) struct BuildIndexArgs {
    /// Raw disclosure CSV to aggregate
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Destination for the benchmark index (defaults to LCA_WAGE_INDEX_PATH)
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct BulkArgs {
    /// CSV upload with one application per row
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Directory receiving the results file (defaults to LCA_EXPORT_DIR)
    #[arg(long)]
    pub(crate) export_dir: Option<PathBuf>,
}

fn load_config() -> Result<AppConfig, AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    Ok(config)
}

pub(crate) fn run_predict(args: PredictArgs) -> Result<(), AppError> {
    let config = load_config()?;
    let service = load_scoring_service(&config)?;

    let raw = fs::read(&args.input)?;
    let record: ApplicationRecord = serde_json::from_slice(&raw)?;
    let view = PredictionView::from(service.predict(record));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("Approval estimate: {:.2}% ({})", view.probability_percent, view.outlook.label());
    println!(
        "- model: {:.2}% [{}]",
        view.base.probability * 100.0,
        view.base.status.label()
    );
    for note in &view.rule_notes {
        println!("- {note}");
    }
    println!(
        "Scorecard: wage {:.1} | compliance {:.1} | stability {:.1} | documentation {:.1} | total {:.1}",
        view.scorecard.wage_score,
        view.scorecard.compliance_score,
        view.scorecard.stability_score,
        view.scorecard.documentation_score,
        view.scorecard.total_score
    );
    println!("  {}", view.scorecard.wage_note);
    println!("Top factors:");
    for contribution in view.attribution.contributions.iter().take(5) {
        println!("  - {}: {:.4}", contribution.feature, contribution.weight);
    }
    println!("Recommendations:");
    for recommendation in &view.recommendations {
        println!("  - {recommendation}");
    }
    for note in &view.validation {
        println!("Note: {note}");
    }
    Ok(())
}

pub(crate) fn run_wage_compare(args: WageCompareArgs) -> Result<(), AppError> {
    let config = load_config()?;
    let index = WageBenchmarkIndex::load_or_empty(&config.artifacts.wage_index)?;

    let offered = parse_number(&args.wage).unwrap_or(f64::NAN);
    let comparison = index.compare(&args.soc, &args.state, offered, &args.unit);
    print_comparison(&args, &comparison);
    Ok(())
}

fn print_comparison(args: &WageCompareArgs, comparison: &WageComparison) {
    let Some(benchmark) = &comparison.benchmark else {
        println!(
            "{} / {}: {}",
            args.soc,
            args.state,
            comparison.message.as_deref().unwrap_or_default()
        );
        return;
    };

    println!("{} / {} ({} filings)", args.soc, args.state, benchmark.n);
    println!("- offered (annual): {:.2}", benchmark.offered_yearly);
    println!(
        "- median {:.2} | p25 {:.2} | p75 {:.2}",
        benchmark.median, benchmark.p25, benchmark.p75
    );
    match benchmark.ratio {
        Some(ratio) => println!("- ratio {ratio:.3}: {}", benchmark.verdict.label()),
        None => println!("- {}", benchmark.verdict.label()),
    }
}

pub(crate) fn run_build_index(args: BuildIndexArgs) -> Result<(), AppError> {
    let config = load_config()?;
    let output = args
        .output
        .unwrap_or_else(|| config.artifacts.wage_index.clone());

    let (index, report) = build_index(File::open(&args.input)?)?;
    index.save(&output)?;

    info!(
        input = %args.input.display(),
        output = %output.display(),
        rows_read = report.rows_read,
        rows_kept = report.rows_kept,
        rows_malformed = report.rows_malformed,
        groups = report.groups,
        "wage benchmark index built"
    );
    println!(
        "Indexed {} of {} rows into {} benchmarks at {}",
        report.rows_kept,
        report.rows_read,
        report.groups,
        output.display()
    );
    Ok(())
}

#[derive(Debug, Serialize)]
struct BulkSummary<'a> {
    file_name: &'a str,
    path: String,
    rows: usize,
    errors: usize,
}

pub(crate) fn run_bulk(args: BulkArgs) -> Result<(), AppError> {
    let config = load_config()?;
    let service = load_scoring_service(&config)?;
    let export_dir = args
        .export_dir
        .unwrap_or_else(|| config.artifacts.export_dir.clone());

    let bytes = fs::read(&args.input)?;
    let processor = BulkProcessor::new(Arc::clone(&service), export_dir);
    let outcome = processor.process(&bytes)?;

    let summary = BulkSummary {
        file_name: &outcome.file_name,
        path: outcome.path.display().to_string(),
        rows: outcome.rows.len(),
        errors: outcome.error_count(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    for row in outcome.preview() {
        let probability = row
            .probability_percent
            .map(|percent| format!("{percent:.2}%"))
            .unwrap_or_else(|| "N/A".to_string());
        println!(
            "  {} | {} | {} | {} | total {:.1}",
            row.employer_name, row.job_title, probability, row.recommendation, row.score_total
        );
    }
    Ok(())
}
