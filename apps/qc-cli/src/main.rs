use clap::{Parser, Subcommand};
use qc_app::{
    AppConfig, AppError, AppResult, BulkAction, BulkProgress, HttpTransport, QcSession,
    SharedStore, apply_bulk, result_targets,
};
use qc_core::{ColumnIndex, RowIndex, ServiceItemIndex};
use qc_schema::{Payload, RequestKind};
use qc_store::{CellFlag, GridStore, ViewMode};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "qc")]
#[command(about = "QC grid CLI - inspect, edit and sync laboratory QC result payloads", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a payload file
    Validate {
        /// Path to the payload JSON file
        payload: PathBuf,
    },
    /// Summarize a payload: job, service items, analytes, row counts
    Summary {
        /// Path to the payload JSON file
        payload: PathBuf,
    },
    /// Print the filtered grid
    View {
        /// Path to the payload JSON file
        payload: PathBuf,
        /// Only show this service item (by code)
        #[arg(long)]
        service_item: Option<String>,
        /// Include non-reportable analytes
        #[arg(long)]
        all_analytes: bool,
        /// View mode: qc, report or customer
        #[arg(long, default_value = "qc")]
        mode: ViewMode,
        /// Print the grouped column header instead of rows
        #[arg(long)]
        headers: bool,
    },
    /// List conditional-formatting flags per row
    Flags {
        /// Path to the payload JSON file
        payload: PathBuf,
        /// Only show this service item (by code)
        #[arg(long)]
        service_item: Option<String>,
    },
    /// Mark every filled result cell in a column as final
    Finalize {
        /// Path to the payload JSON file
        payload: PathBuf,
        /// Result column index
        #[arg(long)]
        column: u32,
        /// Restrict to these row indices (default: all rows)
        #[arg(long, num_args = 1..)]
        rows: Vec<u32>,
        /// Output file (defaults to overwriting the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Apply a manual baseline/multiplier correction to one cell
    Correct {
        /// Path to the payload JSON file
        payload: PathBuf,
        #[arg(long)]
        row: u32,
        #[arg(long)]
        column: u32,
        #[arg(long, allow_hyphen_values = true)]
        baseline: Option<f64>,
        #[arg(long)]
        multiplier: Option<f64>,
        /// Output file (defaults to overwriting the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Download a payload from the configured load endpoint
    Fetch {
        /// Path to the config YAML file
        #[arg(long)]
        config: PathBuf,
        /// Where to write the payload
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Upload a payload to the configured save endpoint
    Push {
        /// Path to the payload JSON file
        payload: PathBuf,
        /// Path to the config YAML file
        #[arg(long)]
        config: PathBuf,
    },
    /// Submit a repeat or overlimit request for selected rows
    Request {
        /// Path to the payload JSON file
        payload: PathBuf,
        /// Path to the config YAML file
        #[arg(long)]
        config: PathBuf,
        /// repeat or overlimit
        #[arg(long)]
        kind: RequestKind,
        /// Service item code
        #[arg(long)]
        service_item: String,
        /// Row indices, in request order
        #[arg(long, num_args = 1.., required = true)]
        rows: Vec<u32>,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { payload } => cmd_validate(&payload),
        Commands::Summary { payload } => cmd_summary(&payload),
        Commands::View {
            payload,
            service_item,
            all_analytes,
            mode,
            headers,
        } => cmd_view(&payload, service_item.as_deref(), all_analytes, mode, headers),
        Commands::Flags {
            payload,
            service_item,
        } => cmd_flags(&payload, service_item.as_deref()),
        Commands::Finalize {
            payload,
            column,
            rows,
            output,
        } => cmd_finalize(&payload, column, &rows, output.as_deref()),
        Commands::Correct {
            payload,
            row,
            column,
            baseline,
            multiplier,
            output,
        } => cmd_correct(&payload, row, column, baseline, multiplier, output.as_deref()),
        Commands::Fetch { config, output } => cmd_fetch(&config, &output),
        Commands::Push { payload, config } => cmd_push(&payload, &config),
        Commands::Request {
            payload,
            config,
            kind,
            service_item,
            rows,
        } => cmd_request(&payload, &config, kind, &service_item, &rows),
    }
}

fn load_store(path: &Path) -> AppResult<GridStore> {
    let payload = qc_schema::load_json(path)?;
    debug!(path = %path.display(), rows = payload.rows.len(), "payload read");
    let mut store = GridStore::new();
    store.load(payload);
    Ok(store)
}

fn resolve_service_item(store: &GridStore, code: &str) -> AppResult<ServiceItemIndex> {
    store
        .service_item_by_code(code)
        .ok_or_else(|| AppError::InvalidInput(format!("unknown service item code: {code}")))
}

fn write_payload(store: &GridStore, input: &Path, output: Option<&Path>) -> AppResult<()> {
    let payload = store.require_payload()?;
    let target = output.unwrap_or(input);
    qc_schema::save_json(target, payload)?;
    println!("✓ Written to {}", target.display());
    Ok(())
}

fn cmd_validate(path: &Path) -> AppResult<()> {
    println!("Validating payload: {}", path.display());
    let payload = qc_schema::load_json(path)?;
    println!("✓ Payload is valid");
    println!(
        "  {} rows, {} columns, {} service items",
        payload.rows.len(),
        payload.metadata.schema.column_definitions.len(),
        payload.metadata.schema.service_items.len()
    );
    Ok(())
}

fn cmd_summary(path: &Path) -> AppResult<()> {
    let payload = qc_schema::load_json(path)?;
    let job = &payload.metadata.job;
    let schema = &payload.metadata.schema;

    println!("Job {} - {}", job.code, job.name);
    match (&job.customer_name, &job.customer_code) {
        (Some(name), Some(code)) => println!("  Customer: {name} ({code})"),
        (Some(name), None) => println!("  Customer: {name}"),
        (None, Some(code)) => println!("  Customer: {code}"),
        (None, None) => {}
    }
    if let Some(due) = &job.due_date {
        println!("  Due: {due}");
    }

    for si in &schema.service_items {
        println!("Service item {} - {}", si.code, si.name);
        for analyte in schema
            .analytes
            .iter()
            .filter(|a| si.analyte_indices.contains(&a.analyte_index))
        {
            let mut line = format!("    {} {}", analyte.code, analyte.name);
            if let Some(limits) = analyte.limits_label() {
                line.push_str(&format!(" [{limits}]"));
            }
            if !analyte.reportable {
                line.push_str(" (not reportable)");
            }
            println!("{line}");
        }
    }

    let mut controls: BTreeMap<String, usize> = BTreeMap::new();
    let mut finals = 0;
    for row in &payload.rows {
        let key = if row.control_type.trim().is_empty() {
            "(none)".to_string()
        } else {
            row.control_type.to_ascii_uppercase()
        };
        *controls.entry(key).or_default() += 1;
        finals += row.values.iter().filter(|c| c.is_final).count();
    }
    println!("Rows: {}", payload.rows.len());
    for (control, count) in controls {
        println!("  {control}: {count}");
    }
    println!("Final cells: {finals}");
    Ok(())
}

fn render_value(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn cmd_view(
    path: &Path,
    service_item: Option<&str>,
    all_analytes: bool,
    mode: ViewMode,
    headers: bool,
) -> AppResult<()> {
    let mut store = load_store(path)?;
    let si = service_item
        .map(|code| resolve_service_item(&store, code))
        .transpose()?;
    store.set_selected_service_item(si);
    store.set_show_reportable_only(!all_analytes);
    store.set_view_mode(mode);

    if headers {
        let header = store.grid_header();
        let statics: Vec<_> = header.static_columns.iter().map(|c| c.label.as_str()).collect();
        println!("Static: {}", statics.join(", "));
        for group in &header.groups {
            println!("{}", group.label);
            for analyte in &group.analytes {
                match &analyte.limits {
                    Some(limits) => println!("  {} [{}]", analyte.label, limits),
                    None => println!("  {}", analyte.label),
                }
                for col in &analyte.columns {
                    println!("    {:>3} {:<12} {}", col.column.get(), col.column_type, col.label);
                }
            }
        }
        return Ok(());
    }

    let columns = store.filtered_columns();
    let (rows, _) = store.grid_rows();
    let labels: Vec<_> = columns.iter().map(|c| c.label.as_str()).collect();
    println!("{}", labels.join("\t"));
    for row in rows.iter() {
        let cells: Vec<_> = columns
            .iter()
            .map(|c| render_value(row.get(&c.column_index.grid_key())))
            .collect();
        println!("{}", cells.join("\t"));
    }
    println!("({} rows, {} columns)", rows.len(), columns.len());
    Ok(())
}

fn describe_flag(flag: &CellFlag) -> String {
    match flag {
        CellFlag::Variance { variance_pct, .. } => format!("{} ({variance_pct:.1}%)", flag.tag()),
        other => other.tag().to_string(),
    }
}

fn cmd_flags(path: &Path, service_item: Option<&str>) -> AppResult<()> {
    let mut store = load_store(path)?;
    let si = service_item
        .map(|code| resolve_service_item(&store, code))
        .transpose()?;
    store.set_selected_service_item(si);
    store.set_show_reportable_only(false);

    let columns = store.filtered_columns();
    let mut flagged = 0;
    for &row in store.filtered_rows().iter() {
        let flags = store.row_flags(row);
        if flags.is_empty() {
            continue;
        }
        let Some(data) = store.row(row) else { continue };
        let label = format!("{:>4} {:<14} {:<10}", data.seq_no, data.sample_name, data.control_type);
        let parts: Vec<_> = columns
            .iter()
            .filter_map(|c| {
                flags
                    .get(&c.column_index.grid_key())
                    .map(|f| format!("{}: {}", c.label, describe_flag(f)))
            })
            .collect();
        println!("{label} {}", parts.join(", "));
        flagged += 1;
    }
    println!("{flagged} rows flagged");
    Ok(())
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(80));
    let _ = io::stdout().flush();
}

fn render_bulk_progress(progress: &BulkProgress) {
    let width = 28usize;
    let filled = ((progress.fraction_complete() * width as f64).round() as usize).min(width);
    print!(
        "\r[{}{}] {}/{}  affected={}  skipped={}",
        "#".repeat(filled),
        "-".repeat(width.saturating_sub(filled)),
        progress.processed,
        progress.total,
        progress.affected,
        progress.skipped
    );
    let _ = io::stdout().flush();
}

fn cmd_finalize(path: &Path, column: u32, rows: &[u32], output: Option<&Path>) -> AppResult<()> {
    let store = load_store(path)?;
    let column = ColumnIndex::new(column);
    let row_indices: Vec<RowIndex> = if rows.is_empty() {
        store
            .payload()
            .map(|p| p.rows.iter().map(|r| r.row_index).collect())
            .unwrap_or_default()
    } else {
        rows.iter().copied().map(RowIndex::new).collect()
    };
    let targets = result_targets(&store, &row_indices, &[column]);
    if targets.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "column {column} has no filled result cells in the selected rows"
        )));
    }

    let shared = SharedStore::new(store);
    let outcome = apply_bulk(
        &shared,
        &targets,
        &BulkAction::MarkFinal,
        AppConfig::default().bulk.chunk_size,
        Some(&mut |p: BulkProgress| render_bulk_progress(&p)),
    );
    clear_progress_line();
    println!(
        "✓ Finalized {} cells ({} skipped)",
        outcome.affected, outcome.skipped
    );
    shared.with(|s| write_payload(s, path, output))
}

fn cmd_correct(
    path: &Path,
    row: u32,
    column: u32,
    baseline: Option<f64>,
    multiplier: Option<f64>,
    output: Option<&Path>,
) -> AppResult<()> {
    if baseline.is_none() && multiplier.is_none() {
        return Err(AppError::InvalidInput(
            "give --baseline, --multiplier or both".to_string(),
        ));
    }
    let mut store = load_store(path)?;
    let (row, column) = (RowIndex::new(row), ColumnIndex::new(column));
    if store.is_cell_final(row, column) {
        return Err(AppError::InvalidInput(format!(
            "cell ({row}, {column}) is final"
        )));
    }
    let before = store.cell_value(row, column);
    if !store.set_manual_correction(row, column, baseline, multiplier) {
        return Err(AppError::InvalidInput(format!(
            "cannot correct cell ({row}, {column})"
        )));
    }
    let after = store.cell_value(row, column);
    println!(
        "✓ Corrected ({row}, {column}): {} -> {}",
        before.map(|v| v.to_string()).unwrap_or_default(),
        after.map(|v| v.to_string()).unwrap_or_default()
    );
    write_payload(&store, path, output)
}

fn session(config_path: &Path) -> AppResult<QcSession<HttpTransport>> {
    let config = AppConfig::load(config_path)?;
    let transport = HttpTransport::new(&config)?;
    Ok(QcSession::new(config, transport))
}

fn read_payload(path: &Path) -> AppResult<Payload> {
    Ok(qc_schema::load_json(path)?)
}

fn cmd_fetch(config: &Path, output: &Path) -> AppResult<()> {
    let mut session = session(config)?;
    let summary = session.load()?;
    println!("✓ Loaded job {} ({} rows)", summary.job_code, summary.rows);
    session
        .store()
        .with(|s| write_payload(s, output, Some(output)))
}

fn cmd_push(path: &Path, config: &Path) -> AppResult<()> {
    let mut session = session(config)?;
    session.load_payload(read_payload(path)?)?;
    let receipt = session.save()?;
    println!("✓ Saved {} rows", receipt.rows);
    println!("  Fingerprint: {}", receipt.fingerprint);
    Ok(())
}

fn cmd_request(
    path: &Path,
    config: &Path,
    kind: RequestKind,
    service_item: &str,
    rows: &[u32],
) -> AppResult<()> {
    let mut session = session(config)?;
    session.load_payload(read_payload(path)?)?;
    let si = session
        .store()
        .with(|s| resolve_service_item(s, service_item))?;
    let rows: Vec<RowIndex> = rows.iter().copied().map(RowIndex::new).collect();
    let request = session.submit_request(kind, si, &rows)?;
    println!(
        "✓ Submitted {} request {} ({} samples)",
        request.request_type,
        request.request_id,
        request.samples.len()
    );
    Ok(())
}
