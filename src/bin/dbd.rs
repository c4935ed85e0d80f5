//! DBD dashboard CLI: data checks, charts and admin operations.
//!
//! Usage:
//!   dbd validate [--data path]
//!   dbd clean --output path [--data path]
//!   dbd summary [--json]
//!   dbd chart <kind> [--group-by field] [--top-n n] [--province name] [--year y]
//!   dbd logs --username u [--category auth|data]
//!   dbd insight <kind> [...]
//!   dbd edit --username u (--update id | --add | --delete id) [--set column=value]

use clap::{Parser, Subcommand, ValueEnum};
use dbd::aggregate::{summary_statistics, year_over_year, Field};
use dbd::insight::{generate_narrative, GeminiClient, InsightHistory, InsightRequest};
use dbd::schema::{clean, load_and_validate, Validated};
use dbd::storage::write_raw;
use dbd::{
    ActionCategory, ChangeSet, ChartRequest, CsvStore, DashboardApi, DashboardConfig, DatasetStore, OpenStore,
    RecordId, RecordPatch,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dbd", version, about = "Dengue (DBD) case dashboard data tools")]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Dataset CSV, overrides the configured path
    #[arg(long, global = true)]
    data: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check structure, types and business rules of the dataset
    Validate,
    /// Write a cleaned copy of the dataset
    Clean {
        #[arg(long)]
        output: PathBuf,
    },
    /// Print summary statistics
    Summary {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print chart data as JSON
    Chart {
        kind: ChartKind,
        /// Grouping field for line, pie and box charts
        #[arg(long, default_value = "province_name")]
        group_by: String,
        #[arg(long, default_value_t = 10)]
        top_n: usize,
        /// Restrict to a province (bar, heatmap)
        #[arg(long)]
        province: Vec<String>,
        /// Years to compare (comparison)
        #[arg(long)]
        year: Vec<i32>,
    },
    /// Show the activity log (master account only)
    Logs {
        #[arg(long)]
        username: String,
        /// Password; read from DBD_PASSWORD when omitted
        #[arg(long)]
        password: Option<String>,
        #[arg(long, default_value = "auth")]
        category: String,
    },
    /// Generate a narrative insight
    Insight {
        kind: InsightKind,
        /// Province for mitigation and area analysis
        #[arg(long)]
        province: Option<String>,
        /// Region name or code for area analysis
        #[arg(long)]
        region: Option<String>,
        /// Aspects to stress (comprehensive)
        #[arg(long)]
        focus: Vec<String>,
        /// Two years (compare)
        #[arg(long, num_args = 2)]
        years: Vec<i32>,
        /// Readers of the report (executive)
        #[arg(long, default_value = "Head of the Provincial Health Office")]
        audience: String,
    },
    /// Log in and apply one change
    Edit {
        #[arg(long)]
        username: String,
        /// Password; read from DBD_PASSWORD when omitted
        #[arg(long)]
        password: Option<String>,
        /// Update the record with this id
        #[arg(long, conflicts_with_all = ["add", "delete"])]
        update: Option<u64>,
        /// Add a new record
        #[arg(long, conflicts_with = "delete")]
        add: bool,
        /// Delete the record with this id
        #[arg(long)]
        delete: Option<u64>,
        /// Field values as column=value
        #[arg(long)]
        set: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ChartKind {
    Bar,
    Line,
    Heatmap,
    Pie,
    Treemap,
    Comparison,
    Box,
}

#[derive(Clone, Copy, ValueEnum)]
enum InsightKind {
    Comprehensive,
    Mitigation,
    Area,
    Compare,
    Executive,
}

fn load_config(cli: &Cli) -> Result<DashboardConfig, String> {
    let mut config = DashboardConfig::load(cli.config.as_deref()).map_err(|e| e.to_string())?;
    if let Some(data) = &cli.data {
        config.data_path = data.clone();
    }
    Ok(config)
}

fn open_store(config: &DashboardConfig) -> Result<CsvStore, String> {
    CsvStore::open(&config.data_path).map_err(|e| format!("Failed to open dataset: {}", e))
}

fn password(given: Option<String>) -> Result<String, String> {
    given
        .or_else(|| std::env::var("DBD_PASSWORD").ok())
        .ok_or_else(|| "no password given (use --password or DBD_PASSWORD)".to_string())
}

fn cmd_validate(config: &DashboardConfig) -> i32 {
    let store = match open_store(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match load_and_validate(&store) {
        Ok(Validated::Clean { dataset, warnings, .. }) => {
            println!("OK: {} records after cleaning", dataset.len());
            for w in &warnings {
                println!("Warning: {}", w);
            }
            0
        }
        Ok(Validated::Invalid { raw, errors }) => {
            println!("Invalid: {} rows checked", raw.len());
            for e in &errors {
                println!("  - {}", e);
            }
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_clean(config: &DashboardConfig, output: &PathBuf) -> i32 {
    let raw = match open_store(config).and_then(|s| s.load_raw().map_err(|e| e.to_string())) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let cleaned = clean(&raw);
    let result = std::fs::File::create(output)
        .map_err(|e| e.to_string())
        .and_then(|file| write_raw(&cleaned, file).map_err(|e| e.to_string()));
    match result {
        Ok(()) => {
            println!(
                "Wrote {} rows to {} ({} dropped)",
                cleaned.len(),
                output.display(),
                raw.len() - cleaned.len()
            );
            0
        }
        Err(e) => {
            eprintln!("Error: cannot write '{}': {}", output.display(), e);
            1
        }
    }
}

fn cmd_summary(config: &DashboardConfig, json: bool) -> i32 {
    let dataset = match open_store(config).and_then(|s| s.load().map_err(|e| e.to_string())) {
        Ok(loaded) => loaded.dataset,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let stats = summary_statistics(&dataset);
    if json {
        return match serde_json::to_string_pretty(&stats) {
            Ok(text) => {
                println!("{}", text);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        };
    }

    println!("Records:      {}", stats.records);
    println!("Total cases:  {:.0}", stats.total_cases);
    println!("Mean / std:   {:.2} / {:.2}", stats.mean_cases, stats.std_cases);
    println!("Median:       {:.2}", stats.median_cases);
    println!("Min / max:    {:.0} / {:.0}", stats.min_cases, stats.max_cases);
    println!("Provinces:    {}", stats.provinces);
    println!("Regions:      {}", stats.regions);
    if let Some((from, to)) = stats.year_range {
        println!("Years:        {}-{} ({})", from, to, stats.years);
    }
    println!();
    println!("{:<6}  {:>12}  {:>9}", "YEAR", "CASES", "CHANGE");
    for change in year_over_year(&dataset, &[]) {
        let pct = change
            .change_pct
            .map(|p| format!("{:+.1}%", p))
            .unwrap_or_else(|| "-".to_string());
        println!("{:<6}  {:>12.0}  {:>9}", change.year, change.total_cases, pct);
    }
    0
}

fn cmd_chart(config: &DashboardConfig, kind: ChartKind, group_by: &str, top_n: usize, provinces: Vec<String>, years: Vec<i32>) -> i32 {
    let Some(field) = Field::parse(group_by) else {
        eprintln!("Error: unknown field '{}'", group_by);
        return 1;
    };
    let request = match kind {
        ChartKind::Bar => ChartRequest::BarTrend { provinces },
        ChartKind::Line => ChartRequest::LineTrend { group_by: field },
        ChartKind::Heatmap => ChartRequest::Heatmap {
            province: provinces.into_iter().next(),
            top_n,
        },
        ChartKind::Pie => ChartRequest::Pie { group_by: field, top_n },
        ChartKind::Treemap => ChartRequest::Treemap,
        ChartKind::Comparison => ChartRequest::Comparison { years },
        ChartKind::Box => ChartRequest::Box { group_by: field },
    };
    let dataset = match open_store(config).and_then(|s| s.load().map_err(|e| e.to_string())) {
        Ok(loaded) => loaded.dataset,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match serde_json::to_string_pretty(&request.build(&dataset)) {
        Ok(text) => {
            println!("{}", text);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_logs(api: &DashboardApi, username: &str, password: &str, category: &str) -> i32 {
    let Some(category) = ActionCategory::parse(category) else {
        eprintln!("Error: unknown category '{}' (use auth or data)", category);
        return 1;
    };
    let id = match api.login(username, password) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let code = match api.audit_entries(id, category) {
        Ok(entries) if entries.is_empty() => {
            println!("No activity recorded.");
            0
        }
        Ok(entries) => {
            println!("{:<19}  {:<16}  {:<7}  DETAILS", "TIMESTAMP", "USERNAME", "ACTION");
            println!("{}", "-".repeat(72));
            for e in entries {
                println!("{:<19}  {:<16}  {:<7}  {}", e.formatted_timestamp(), e.username, e.action.as_str(), e.details);
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };
    if let Err(e) = api.logout(id) {
        eprintln!("Error: {}", e);
        return 1;
    }
    code
}

fn insight_request(
    kind: InsightKind,
    province: Option<String>,
    region: Option<String>,
    focus: Vec<String>,
    years: Vec<i32>,
    audience: String,
) -> Result<InsightRequest, String> {
    Ok(match kind {
        InsightKind::Comprehensive => InsightRequest::Comprehensive { focus_areas: focus },
        InsightKind::Mitigation => InsightRequest::Mitigation { province },
        InsightKind::Area => InsightRequest::AreaAnalysis {
            province: province.ok_or("area analysis needs --province")?,
            region,
        },
        InsightKind::Compare => match years.as_slice() {
            [first, second] => InsightRequest::ComparePeriods {
                first_year: *first,
                second_year: *second,
            },
            _ => return Err("compare needs --years FIRST SECOND".to_string()),
        },
        InsightKind::Executive => InsightRequest::ExecutiveReport { audience },
    })
}

fn cmd_insight(config: &DashboardConfig, request: InsightRequest) -> i32 {
    let client = match GeminiClient::from_config(&config.insight) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {} (set GEMINI_API_KEY)", e);
            return 1;
        }
    };
    let dataset = match open_store(config).and_then(|s| s.load().map_err(|e| e.to_string())) {
        Ok(loaded) => loaded.dataset,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let prompt = match request.prompt(&dataset, config.insight.top_n) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create tokio runtime: {}", e);
            return 1;
        }
    };
    let text = match rt.block_on(generate_narrative(&client, &prompt, config.insight.timeout())) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    println!("{}", text);

    if let Some(path) = &config.history_path {
        let mut history = InsightHistory::load(path).unwrap_or_default();
        history.record(&request, text);
        if let Err(e) = history.save(path) {
            eprintln!("Warning: could not write history to '{}': {}", path.display(), e);
        }
    }
    0
}

fn change_set(update: Option<u64>, add: bool, delete: Option<u64>, set: &[String]) -> Result<ChangeSet, String> {
    let mut patch = RecordPatch::new();
    for assignment in set {
        let (column, value) = assignment
            .split_once('=')
            .ok_or_else(|| format!("expected column=value, got '{}'", assignment))?;
        patch = patch.set(column.trim(), value).map_err(|e| e.to_string())?;
    }
    match (update, add, delete) {
        (Some(id), false, None) if !patch.is_empty() => Ok(ChangeSet::new().update(RecordId::new(id), patch)),
        (Some(_), _, _) => Err("--update needs at least one --set".to_string()),
        (None, true, None) => Ok(ChangeSet::new().add(patch)),
        (None, false, Some(id)) => Ok(ChangeSet::new().delete(RecordId::new(id))),
        _ => Err("choose one of --update, --add or --delete".to_string()),
    }
}

fn cmd_edit(api: &DashboardApi, username: &str, password: &str, changes: ChangeSet) -> i32 {
    let id = match api.login(username, password) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let code = match api.save_changes(id, &changes) {
        Ok(outcome) if outcome.entries.is_empty() => {
            println!("Nothing changed.");
            0
        }
        Ok(outcome) => {
            for entry in &outcome.entries {
                println!("{}: {}", entry.action, entry.details);
            }
            println!("Saved (version {})", outcome.version);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };
    if let Err(e) = api.logout(id) {
        eprintln!("Error: {}", e);
        return 1;
    }
    code
}

fn open_api(config: DashboardConfig) -> Result<DashboardApi, String> {
    DashboardApi::from_config(config).map_err(|e| e.to_string())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Validate => cmd_validate(&config),
        Commands::Clean { output } => cmd_clean(&config, &output),
        Commands::Summary { json } => cmd_summary(&config, json),
        Commands::Chart {
            kind,
            group_by,
            top_n,
            province,
            year,
        } => cmd_chart(&config, kind, &group_by, top_n, province, year),
        Commands::Logs {
            username,
            password: pw,
            category,
        } => match (password(pw), open_api(config)) {
            (Ok(pw), Ok(api)) => cmd_logs(&api, &username, &pw, &category),
            (Err(e), _) | (_, Err(e)) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Commands::Insight {
            kind,
            province,
            region,
            focus,
            years,
            audience,
        } => match insight_request(kind, province, region, focus, years, audience) {
            Ok(request) => cmd_insight(&config, request),
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Commands::Edit {
            username,
            password: pw,
            update,
            add,
            delete,
            set,
        } => {
            let prepared = password(pw)
                .and_then(|pw| change_set(update, add, delete, &set).map(|changes| (pw, changes)))
                .and_then(|(pw, changes)| open_api(config).map(|api| (api, pw, changes)));
            match prepared {
                Ok((api, pw, changes)) => cmd_edit(&api, &username, &pw, changes),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    1
                }
            }
        }
    };
    std::process::exit(code);
}
