//! CellAudit - rule-based KPI degradation auditor
//!
//! A CLI tool that evaluates per-technology threshold rules against the
//! last seven days of a cell KPI export and reports degraded cells.
//!
//! Exit codes:
//!   0 - Success (no violations at the --fail-on level, or no --fail-on set)
//!   1 - Runtime error (unreadable input, bad rule file, config error, etc.)
//!   2 - Violations found at or above the --fail-on level

mod analysis;
mod cli;
mod config;
mod data;
mod error;
mod models;
mod report;
mod rules;

use analysis::{
    filter_violations, generate_summary_text, worst_cells, AnalysisJob, CacheKey, Engine,
    JobStatus, SourceId, ViolationFilter,
};
use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use data::LoaderOptions;
use indicatif::{ProgressBar, ProgressStyle};
use models::AnalysisResult;
use report::ReportOptions;
use rules::{parse_rule_ref, parse_rule_replacement, parse_rule_spec, RuleStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// How often the front end polls a running analysis.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration first: it can raise the log level
    let (config, origin) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(args.log_level(config.general.verbose))?;

    info!("CellAudit v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    origin.log();

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Audit failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .cellaudit.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set input column names, the rule file and report options.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Run rule maintenance and, when an input is given, the audit. Returns exit code (0 or 2).
async fn run(args: Args, mut config: Config) -> Result<i32> {
    let start_time = Instant::now();

    config.merge_with_args(&args);
    config.validate().context("Invalid settings")?;

    // Step 1: Rules
    let rules_path = PathBuf::from(&config.rules.path);
    if args.init_rules {
        RuleStore::with_defaults()
            .save(&rules_path)
            .with_context(|| format!("Failed to write rules to {}", rules_path.display()))?;
        println!("✅ Wrote built-in rules to {}", rules_path.display());
    }

    let store = RuleStore::load_or_init(&rules_path)
        .with_context(|| format!("Failed to load rules from {}", rules_path.display()))?;

    let engine = Arc::new(
        Engine::new(
            store,
            LoaderOptions::from(&config.input),
            config.general.workers,
        )
        .context("Failed to start analysis engine")?,
    );

    // Edits go to a copy; runs only ever see a complete store
    if !args.add_rule.is_empty() || !args.replace_rule.is_empty() || !args.remove_rule.is_empty()
    {
        let mut edited = RuleStore::clone(&engine.rules());
        apply_rule_edits(&mut edited, &args)?;
        edited
            .save(&rules_path)
            .with_context(|| format!("Failed to save rules to {}", rules_path.display()))?;
        engine.replace_rules(edited);
    }

    if args.list_rules {
        print_rules(&engine.rules());
    }

    let Some(input) = args.input.clone() else {
        return Ok(0);
    };

    if engine.rules().rules_for(&args.tech).is_empty() {
        warn!(
            "No rules defined for technology '{}'; every cell will be healthy",
            args.tech
        );
    }

    // Step 2: Analyze in the background
    println!("📥 Input: {}", input.display());
    println!("🔬 Evaluating {} rules...", args.tech);

    let key = CacheKey::new(SourceId::from_path(&input), args.tech.clone());

    let result = run_job(Arc::clone(&engine), key, args.quiet)
        .await
        .with_context(|| format!("Failed to analyze {}", input.display()))?;
    debug!("{} analysis result(s) cached", engine.cached_results());

    // Step 3: Build and save the report
    let filter = ViolationFilter {
        status: args.status.map(Into::into),
        kpi: args.kpi.clone(),
        cell_contains: args.cell.clone(),
    };
    let rules = engine.rules();
    let source = input.display().to_string();
    let options = ReportOptions {
        source: &source,
        rules: &rules,
        filter: &filter,
        top_n: config.report.top_n,
        include_slots: config.report.include_slots,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&result, &filter)?,
        OutputFormat::Csv => report::generate_csv_report(&result, &filter)?,
        OutputFormat::Markdown => report::generate_markdown_report(&result, &options),
    };

    let output_path = PathBuf::from(&config.general.output);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    // Print summary
    println!("\n📊 Analysis Summary:");
    for line in generate_summary_text(&result.summary).lines() {
        println!("   {}", line);
    }
    println!("   Violating cells: {}", result.summary.violating());
    print_worst_cells(&result, &filter, config.report.top_n);
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
    println!(
        "\n✅ Audit complete! Report saved to: {}",
        output_path.display()
    );

    // Check --fail-on threshold
    if let Some(fail_level) = args.fail_on {
        let failing = filter_violations(&result.violations, &filter)
            .iter()
            .any(|r| fail_level.is_met_by(r.status));

        if failing {
            eprintln!(
                "\n⛔ Violations found at or above {:?} status. Failing (exit code 2).",
                fail_level
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Spawn the analysis job and poll it until it finishes, ticking a spinner.
async fn run_job(engine: Arc<Engine>, key: CacheKey, quiet: bool) -> Result<Arc<AnalysisResult>> {
    let spinner = if quiet {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .context("Invalid spinner template")?,
        );
        pb.set_message("Loading input...");
        Some(pb)
    };

    let job = AnalysisJob::spawn(engine, key, true)?;
    let outcome = job
        .wait(POLL_INTERVAL, |status| {
            if let Some(ref pb) = spinner {
                if let Some(JobStatus::Started { key }) = status {
                    pb.set_message(format!("Analyzing {}", key));
                }
                pb.tick();
            }
        })
        .await;

    if let Some(pb) = spinner {
        match outcome {
            Ok(_) => pb.finish_with_message("Analysis complete"),
            Err(_) => pb.abandon_with_message("Analysis failed"),
        }
    }

    Ok(outcome?)
}

/// Apply --add-rule, --replace-rule and --remove-rule to the store, in that order.
fn apply_rule_edits(store: &mut RuleStore, args: &Args) -> Result<()> {
    for spec in &args.add_rule {
        let (technology, rule) = parse_rule_spec(spec)?;
        if store.add_technology(&technology) {
            info!("Added technology {}", technology);
        }
        println!("➕ {}: {}", technology, rule.describe());
        store.add_rule(&technology, rule)?;
    }

    for spec in &args.replace_rule {
        let (technology, index, rule) = parse_rule_replacement(spec)?;
        println!("✏️  {}[{}]: {}", technology, index, rule.describe());
        store
            .replace_rule(&technology, index, rule)
            .with_context(|| format!("Failed to replace rule {}", spec))?;
    }

    for spec in &args.remove_rule {
        let (technology, index) = parse_rule_ref(spec)?;
        let removed = store
            .remove_rule(&technology, index)
            .with_context(|| format!("Failed to remove rule {}", spec))?;
        println!("➖ {}: {}", technology, removed.describe());
    }

    Ok(())
}

/// Print every technology's rules with their index.
fn print_rules(store: &RuleStore) {
    println!("📋 Rules:");
    for technology in store.technologies() {
        println!("\n   {}", technology);
        for (i, rule) in store.rules_for(technology).iter().enumerate() {
            match rule.count_column {
                Some(ref column) => println!(
                    "     [{}] {}  (failures counted when {} > {})",
                    i,
                    rule.describe(),
                    column,
                    rule.count_threshold
                ),
                None => println!("     [{}] {}", i, rule.describe()),
            }
        }
        println!(
            "     columns read: {}",
            store.referenced_columns(technology).join(", ")
        );
    }
}

/// Print the worst cells of each KPI (or only --kpi) to the console.
fn print_worst_cells(result: &AnalysisResult, filter: &ViolationFilter, top_n: usize) {
    let selected: Vec<_> = filter_violations(&result.violations, filter)
        .into_iter()
        .cloned()
        .collect();
    if selected.is_empty() {
        return;
    }

    println!("\n   Worst cells:");
    for kpi in analysis::distinct_kpis(&selected) {
        println!("   {}", kpi);
        for record in worst_cells(&selected, kpi, top_n) {
            println!(
                "     {} {:<24} score {:>2}  ({}/5 recent days bad)",
                record.status.emoji(),
                record.cell,
                record.score,
                record.last_5_bad
            );
        }
    }
}

/// Where the configuration came from, logged once logging is up.
enum ConfigOrigin {
    Explicit(PathBuf),
    Default,
    Builtin,
    Unreadable(anyhow::Error),
}

impl ConfigOrigin {
    fn log(&self) {
        match self {
            ConfigOrigin::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigOrigin::Default => info!("Loaded default config from {}", CONFIG_FILE),
            ConfigOrigin::Builtin => debug!("No config file found, using defaults"),
            ConfigOrigin::Unreadable(e) => warn!("Failed to load config: {:#}", e),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigOrigin)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigOrigin::Explicit(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigOrigin::Default)),
        Ok(None) => Ok((Config::default(), ConfigOrigin::Builtin)),
        Err(e) => Ok((Config::default(), ConfigOrigin::Unreadable(e))),
    }
}
