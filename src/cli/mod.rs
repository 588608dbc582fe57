//! bayes-svr CLI Module
//!
//! Command-line front end over a directory-backed algorithm: import a table,
//! choose columns, train, predict, inspect and clear.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::algorithm::{Algorithm, AlgorithmSummary, Status};
use crate::data::{load_csv, save_csv};
use crate::error::SvrError;
use crate::store::{FsBlobStore, StoreConfig};
use crate::training::{Criterion, Kernel};
use crate::validation::{ErrorValue, HyperparameterRecord, HyperparameterSet, TrainingRequest, ValidationMode};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{:<14} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn status_label(status: Status) -> ColoredString {
    match status {
        Status::Idle => muted("idle"),
        Status::Running => accent("running"),
        Status::Done => ok("done"),
        Status::Error => "error".red(),
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "bayes-svr")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Support vector regression tuned by Bayesian optimization")]
#[command(long_about = None)]
pub struct Cli {
    /// Directory holding datasets, models and the algorithm state
    #[arg(long, global = true, env = "BAYES_SVR_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a CSV file as the training dataset
    Import {
        /// Input CSV file with a header row
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Choose feature and target columns
    Variables {
        /// Feature columns, comma separated
        #[arg(short, long, value_delimiter = ',', required_unless_present = "clear")]
        features: Vec<String>,

        /// Target column
        #[arg(short, long, required_unless_present = "clear")]
        target: Option<String>,

        /// Remove the current selection instead
        #[arg(long, conflicts_with_all = ["features", "target"])]
        clear: bool,
    },

    /// Tune and train a model
    Train(TrainArgs),

    /// Predict a CSV file with the trained model
    Predict {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Output CSV file (defaults to <input>_predicted.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove the trained model and its results
    Clear,

    /// Show the algorithm state
    Show {
        /// Print the full state as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Validation mode (5_fold, split, full_train)
    #[arg(short, long, default_value = "split")]
    pub mode: ValidationMode,

    /// Kernel (linear, poly, rbf, sigmoid)
    #[arg(short, long, default_value = "rbf")]
    pub kernel: Kernel,

    /// Error criterion (mae, mse)
    #[arg(short, long, default_value = "mse")]
    pub criterion: Criterion,

    #[arg(long, default_value = "-2", allow_hyphen_values = true)]
    pub min_ln_c: f64,

    #[arg(long, default_value = "2", allow_hyphen_values = true)]
    pub max_ln_c: f64,

    /// Smallest polynomial degree (poly kernel only)
    #[arg(long)]
    pub min_degree: Option<u32>,

    /// Largest polynomial degree (poly kernel only)
    #[arg(long)]
    pub max_degree: Option<u32>,

    /// Random exploration trials
    #[arg(long, default_value = "16")]
    pub init_points: usize,

    /// Surrogate-guided trials
    #[arg(long, default_value = "16")]
    pub n_iter: usize,

    #[arg(long)]
    pub seed: Option<u64>,
}

impl TrainArgs {
    pub fn to_request(&self) -> TrainingRequest {
        let mut request = TrainingRequest::new(self.mode, self.kernel)
            .with_criterion(self.criterion)
            .with_ln_c_bounds(self.min_ln_c, self.max_ln_c)
            .with_budget(self.init_points, self.n_iter)
            .with_seed(self.seed);
        request.min_degree = self.min_degree;
        request.max_degree = self.max_degree;
        request
    }
}

// ─── Workspace ─────────────────────────────────────────────────────────────────

const STATE_FILE: &str = "algorithm.json";
const LOCK_FILE: &str = "algorithm.lock";

/// Cross-process hold on a workspace, released on drop
struct WorkspaceLock {
    path: PathBuf,
}

impl WorkspaceLock {
    fn acquire(path: PathBuf) -> crate::Result<Self> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!(
                    lock = %path.display(),
                    "Workspace is in use; remove the lock file if no bayes-svr process is running"
                );
                return Err(SvrError::Busy);
            }
            Err(e) => return Err(e.into()),
        };
        let lock = Self { path };
        writeln!(file, "{}", std::process::id())?;
        Ok(lock)
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(lock = %self.path.display(), error = %e, "Failed to release workspace lock");
        }
    }
}

/// Algorithm state persisted next to its blobs
pub struct Workspace {
    store: Arc<FsBlobStore>,
    state_path: PathBuf,
    lock_path: PathBuf,
}

impl Workspace {
    pub fn open(data_dir: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = StoreConfig::default();
        if let Some(dir) = data_dir {
            config = config.with_data_dir(dir);
        }
        let store = FsBlobStore::open(&config)?;
        let state_path = store.root().join(STATE_FILE);
        let lock_path = store.root().join(LOCK_FILE);
        Ok(Self { store: Arc::new(store), state_path, lock_path })
    }

    pub fn load(&self) -> anyhow::Result<Algorithm> {
        if !self.state_path.exists() {
            return Ok(Algorithm::new("svr", self.store.clone()));
        }
        let bytes = std::fs::read(&self.state_path)?;
        let summary: AlgorithmSummary = serde_json::from_slice(&bytes)?;
        Ok(Algorithm::restore(summary, self.store.clone()))
    }

    pub fn save(&self, algorithm: &Algorithm) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(&algorithm.summary())?;
        std::fs::write(&self.state_path, json)?;
        Ok(())
    }

    /// Whether another operation currently holds the workspace
    pub fn is_locked(&self) -> bool {
        self.lock_path.exists()
    }

    /// Run an operation and persist the algorithm state whatever its outcome.
    /// Fails with [`SvrError::Busy`] while another process holds the workspace.
    fn with_algorithm<T>(
        &self,
        op: impl FnOnce(&Algorithm) -> crate::Result<T>,
    ) -> anyhow::Result<T> {
        let _lock = WorkspaceLock::acquire(self.lock_path.clone())?;
        let algorithm = self.load()?;
        let result = op(&algorithm);
        self.save(&algorithm)?;
        Ok(result?)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let workspace = Workspace::open(cli.data_dir.as_deref())?;
    match cli.command {
        Commands::Import { data } => cmd_import(&workspace, &data),
        Commands::Variables { features, target, clear } => {
            cmd_variables(&workspace, features, target, clear)
        }
        Commands::Train(args) => cmd_train(&workspace, &args),
        Commands::Predict { data, output } => cmd_predict(&workspace, &data, output.as_deref()),
        Commands::Clear => cmd_clear(&workspace),
        Commands::Show { json } => cmd_show(&workspace, json),
    }
}

pub fn cmd_import(workspace: &Workspace, data_path: &Path) -> anyhow::Result<()> {
    section("Import");

    step_run("Loading data");
    let start = Instant::now();
    let df = load_csv(data_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    let columns = workspace.with_algorithm(|algo| algo.import_data(&df))?;
    step_ok(&format!("Columns: {}", columns.join(", ").cyan()));
    println!();
    Ok(())
}

pub fn cmd_variables(
    workspace: &Workspace,
    features: Vec<String>,
    target: Option<String>,
    clear: bool,
) -> anyhow::Result<()> {
    section("Variables");

    if clear {
        workspace.with_algorithm(|algo| algo.clear_variables())?;
        step_ok("Variables cleared");
    } else {
        let target = target.ok_or_else(|| anyhow::anyhow!("--target is required"))?;
        let shown = format!("{} → {}", features.join(", "), target);
        workspace.with_algorithm(|algo| algo.set_variables(features, target))?;
        step_ok(&shown);
    }
    println!();
    Ok(())
}

pub fn cmd_train(workspace: &Workspace, args: &TrainArgs) -> anyhow::Result<()> {
    section("Train");

    let request = args.to_request();
    let passes = request.mode.tuning_passes();
    println!("  {}", kv("Mode", request.mode.as_str()));
    println!("  {}", kv("Kernel", request.kernel.as_str()));
    println!(
        "  {}",
        kv("Evaluations", &format!("{} × {}", passes, request.budget()))
    );
    println!();

    step_run(&format!("Tuning {}", request.kernel.as_str().cyan()));
    let start = Instant::now();
    let output = workspace.with_algorithm(|algo| algo.train(&request))?;
    step_done(&format!("{:.2?}", start.elapsed()));

    println!();
    match &output.error_measure {
        Some(measure) => match &measure.value {
            ErrorValue::Scalar(v) => {
                println!("  {:<16} {}", muted(measure.criterion.as_str()), format!("{:.6}", v).white().bold());
            }
            ErrorValue::Folds(values) => {
                for (i, v) in values.iter().enumerate() {
                    println!("  {:<16} {}", muted(&format!("fold {}", i + 1)), format!("{:.6}", v).white());
                }
                println!(
                    "  {:<16} {}",
                    muted(&format!("mean {}", measure.criterion)),
                    format!("{:.6}", measure.mean()).white().bold()
                );
            }
        },
        None => println!("  {}", muted("No held-out error in full_train mode")),
    }
    print_hyperparameters(&output.hyperparameters);
    println!();
    Ok(())
}

pub fn cmd_predict(workspace: &Workspace, data_path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading data");
    let df = load_csv(data_path)?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    step_run("Predicting");
    let start = Instant::now();
    let mut predicted = workspace.with_algorithm(|algo| algo.predict_frame(&df))?;
    step_done(&format!("{:.2?}", start.elapsed()));

    let output_path = match output {
        Some(p) => p.to_path_buf(),
        None => default_output_path(data_path),
    };
    save_csv(&mut predicted, &output_path)?;
    step_ok(&format!("Saved → {}", output_path.display()));
    println!();
    Ok(())
}

pub fn cmd_clear(workspace: &Workspace) -> anyhow::Result<()> {
    section("Clear");
    workspace.with_algorithm(|algo| algo.clear())?;
    step_ok("Model, error measure and history removed");
    println!();
    Ok(())
}

pub fn cmd_show(workspace: &Workspace, json: bool) -> anyhow::Result<()> {
    let mut summary = workspace.load()?.summary();
    if workspace.is_locked() {
        summary.status = Status::Running;
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    line_box_top();
    line_box(&format!("{} {}", "bayes-svr".white().bold(), dim(&summary.id)));
    line_box_sep();
    line_box(&format!("{:<14} {}", muted("Status"), status_label(summary.status)));
    if let Some(msg) = &summary.error_message {
        line_box(&kv("Error", msg));
    }
    line_box(&kv("Columns", &summary.columns.join(", ")));
    match &summary.roles {
        Some(roles) => {
            line_box(&kv("Features", &roles.features.join(", ")));
            line_box(&kv("Target", &roles.target));
        }
        None => line_box(&kv("Variables", "not set")),
    }
    line_box_sep();
    match &summary.result {
        Some(result) => {
            line_box(&kv("Mode", result.mode.as_str()));
            line_box(&kv("Trials", &result.history.total_trials().to_string()));
            if let Some(measure) = &result.error_measure {
                line_box(&kv(measure.criterion.as_str(), &format!("{:.6}", measure.mean())));
            }
            line_box(&kv("Trained", &result.trained_at.format("%Y-%m-%d %H:%M:%S").to_string()));
        }
        None => line_box(&kv("Model", "none")),
    }
    line_box_bottom();
    println!();
    Ok(())
}

fn print_hyperparameters(set: &HyperparameterSet) {
    let line = |label: &str, r: &HyperparameterRecord| {
        let degree = r.degree.map(|d| format!(", degree {}", d)).unwrap_or_default();
        println!("  {:<16} {}", muted(label), format!("C {:.4}{} ({})", r.c, degree, r.kernel).white());
    };
    match set {
        HyperparameterSet::Single(r) => line("best", r),
        HyperparameterSet::Folds(records) => {
            for (i, r) in records.iter().enumerate() {
                line(&format!("fold {} best", i + 1), r);
            }
        }
    }
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("data");
    input.with_file_name(format!("{}_predicted.csv", stem))
}
