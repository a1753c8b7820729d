//! spoolswap entrypoint.

use anyhow::{Context, Result, bail};
use clap::Parser;
use core_config::Config;
use core_model::{
    ConstraintValidation, GcodeStats, OptimizationResult, ParserAlgorithm, ToolId,
};
use core_session::AnalysisSession;
use core_timeline::JsonFileStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "spoolswap", version, about = "Multi-material G-code slot optimizer")]
struct Args {
    /// Print file to analyze (.gcode, or a .gcode.3mf bundle).
    pub path: PathBuf,
    /// Configuration file path (overrides discovery of `spoolswap.toml`).
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Emit the stats / optimization / validation documents as JSON.
    #[arg(long)]
    pub json: bool,
    /// Slots per unit override.
    #[arg(long)]
    pub slots: Option<u32>,
    /// Unit count override.
    #[arg(long)]
    pub units: Option<u32>,
    /// Hardware kind override: magazine or toolhead.
    #[arg(long)]
    pub kind: Option<String>,
    /// Parser algorithm override (optimized, buffer, stream, regex, fsm,
    /// worker, lazy).
    #[arg(long)]
    pub algorithm: Option<String>,
    /// Apply color merges before reporting, e.g. `--merge T0:T2,T3`
    /// (fold T2 and T3 into T0). Repeatable; applied in order.
    #[arg(long = "merge")]
    pub merges: Vec<String>,
    /// Directory for persisted merge timelines.
    #[arg(long)]
    pub state_dir: Option<PathBuf>,
}

fn configure_logging() -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::never(".", "spoolswap.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        error!(target: "runtime", info = %panic_info, "panic");
        default_hook(panic_info);
    }));
}

fn apply_overrides(config: &mut Config, args: &Args) -> Result<()> {
    if let Some(slots) = args.slots {
        config.file.system.slots_per_unit = slots;
    }
    if let Some(units) = args.units {
        config.file.system.unit_count = units;
    }
    if let Some(kind) = &args.kind {
        match kind.to_ascii_lowercase().as_str() {
            "magazine" | "toolhead" => config.file.system.kind = kind.clone(),
            other => bail!("unknown hardware kind {other:?} (magazine or toolhead)"),
        }
    }
    if let Some(name) = &args.algorithm {
        let wanted = name.to_ascii_lowercase();
        let found = ParserAlgorithm::ALL.iter().find(|a| a.as_str() == wanted);
        match found {
            Some(algorithm) => config.file.parser.algorithm = *algorithm,
            None => bail!("unknown parser algorithm {name:?}"),
        }
    }
    Ok(())
}

/// `T0:T2,T3` → (target, sources).
fn parse_merge_spec(spec: &str) -> Result<(ToolId, Vec<ToolId>)> {
    let (target, sources) = spec
        .split_once(':')
        .with_context(|| format!("merge spec {spec:?} must look like TARGET:SRC[,SRC...]"))?;
    let sources: Vec<ToolId> = sources
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToolId::new)
        .collect();
    if sources.is_empty() {
        bail!("merge spec {spec:?} names no sources");
    }
    Ok((ToolId::new(target.trim()), sources))
}

/// Human display is 1-based; internal storage stays 0-based.
fn disp(layer: u32) -> u32 {
    layer + 1
}

fn print_report(
    stats: &GcodeStats,
    optimization: &OptimizationResult,
    validation: &ConstraintValidation,
) {
    println!("== {} ==", stats.file_name);
    println!(
        "layers: {}   height: {:.2}mm   tool changes: {}",
        stats.total_layers,
        stats.total_height,
        stats.tool_changes.len()
    );
    if let Some(slicer) = &stats.slicer {
        println!(
            "slicer: {} {}",
            slicer.software.as_deref().unwrap_or("unknown"),
            slicer.version.as_deref().unwrap_or("")
        );
    }
    if let Some(time) = &stats.print_time {
        println!("estimated print time: {time}");
    }
    if let Some(cost) = stats.print_cost {
        println!("filament cost: {cost:.2}");
    }

    println!("\ncolors ({}):", stats.colors.len());
    for color in &stats.colors {
        println!(
            "  {:<4} {:<20} {:<8} layers {}-{}  {:>5.1}%",
            color.id.to_string(),
            color.name,
            color.hex.as_deref().unwrap_or("-"),
            disp(color.first_layer),
            disp(color.last_layer),
            color.usage_percent()
        );
    }

    println!("\nslot assignment ({} slots):", optimization.total_slots);
    for assignment in &optimization.assignments {
        let colors = assignment
            .colors
            .iter()
            .map(ToolId::to_string)
            .collect::<Vec<_>>()
            .join(" → ");
        let mode = if assignment.is_permanent {
            "permanent"
        } else {
            "shared"
        };
        println!(
            "  unit {} slot {} [{mode}]: {colors}",
            assignment.unit + 1,
            assignment.slot + 1
        );
    }

    if optimization.swaps.is_empty() {
        println!("\nno manual swaps needed");
    } else {
        println!("\nmanual swaps ({}):", optimization.swaps.len());
        for swap in &optimization.swaps {
            println!(
                "  layer {:>4}: {} → {} at unit {} slot {} (window {}-{}, pause {}-{}, flexibility {})",
                disp(swap.at_layer),
                swap.from,
                swap.to,
                swap.unit + 1,
                swap.slot + 1,
                disp(swap.earliest_layer),
                disp(swap.latest_layer),
                disp(swap.pause_start),
                disp(swap.pause_end),
                swap.flexibility
            );
            println!("      {}", swap.reason);
        }
        println!(
            "estimated time saved vs single-color reprints: {}s",
            optimization.estimated_time_saved_secs
        );
    }

    if validation.has_violations {
        let summary = validation.summary.as_ref();
        println!(
            "\nWARNING: {} layers need more colors than slots (worst: {} simultaneous)",
            validation.violations.len(),
            summary.map(|s| s.worst_simultaneous).unwrap_or(0)
        );
        for violation in validation.violations.iter().take(3) {
            let pairs = violation
                .suggestions
                .iter()
                .map(|s| format!("{}+{}", s.first, s.second))
                .collect::<Vec<_>>()
                .join(", ");
            println!(
                "  layer {}: {} colors, {} merge(s) needed (try {})",
                disp(violation.layer),
                violation.colors.len(),
                violation.required_merges,
                pairs
            );
        }
    }

    if !stats.parser_warnings.is_empty() {
        println!("\nparser warnings:");
        for warning in &stats.parser_warnings {
            println!("  {warning}");
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging()?;
    install_panic_hook();
    info!(target: "runtime", path = %args.path.display(), "startup");

    let mut config = core_config::load_from(args.config.clone())?;
    apply_overrides(&mut config, &args)?;

    let mut session = AnalysisSession::new(&config);
    if let Some(dir) = &args.state_dir {
        let key = args
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "spoolswap".to_string());
        session = session.with_store(&config, Arc::new(JsonFileStore::new(dir)), key);
    }

    session
        .analyze_path(&args.path)
        .with_context(|| format!("analyzing {}", args.path.display()))?;

    for spec in &args.merges {
        let (target, sources) = parse_merge_spec(spec)?;
        session
            .merge(&target, &sources)
            .with_context(|| format!("applying merge {spec:?}"))?;
    }

    let stats = session.stats().expect("analysis just completed");
    let optimization = session.optimization().expect("analysis just completed");
    let validation = session.validation().expect("analysis just completed");

    if args.json {
        let document = serde_json::json!({
            "stats": stats,
            "optimization": optimization,
            "validation": validation,
        });
        println!("{}", serde_json::to_string_pretty(&document)?);
    } else {
        print_report(stats, optimization, validation);
    }
    Ok(())
}
