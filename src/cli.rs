use crate::{
    chunk_plan::plan,
    config::Config,
    pipeline::Pipeline,
    report::{build_rows, JsonFileSink, ResultSink},
    submit::{RetryPolicy, Submitter},
    transport::{probe_health, HttpTransport},
    util::{ensure_dir, now_rfc3339, sha256_hex},
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "edit-relay")]
#[command(about = "Bulk JSON submission orchestrator (chunking + retry + bounded dispatch)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./edit-relay.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Probe the processing endpoint's health route.
    Doctor {},
    /// Print the chunk plan for one JSON file without submitting anything.
    Plan {
        #[arg(long)]
        input: PathBuf,
    },
    /// Submit every JSON file in a directory.
    Run {
        /// Source directory; defaults to source.dir from the config.
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

pub async fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref())?;
    let cfg = Config::load(&cfg_path)?;

    match &args.cmd {
        Command::Doctor {} => {
            let log_path = resolve_log_path(&cfg, None);
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            doctor(&cfg).await
        }
        Command::Plan { input } => {
            let log_path = resolve_log_path(&cfg, None);
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            plan_file(&cfg, input)
        }
        Command::Run { input, out_dir } => {
            run(&args, &cfg, input.as_deref(), out_dir.as_deref()).await
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = user {
        return Ok(p.to_path_buf());
    }
    let default = PathBuf::from("edit-relay.toml");
    if default.exists() {
        Ok(default)
    } else {
        Ok(PathBuf::from("edit-relay.example.toml"))
    }
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

async fn doctor(cfg: &Config) -> Result<()> {
    let report = probe_health(&cfg.endpoint).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn plan_file(cfg: &Config, input: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("reading input: {}", input.display()))?;
    let doc: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", input.display()))?;

    let name = input
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| input.display().to_string());

    let unit = plan(&name, doc, &cfg.source.list_field, cfg.chunking.threshold);
    println!("{}", serde_json::to_string_pretty(&unit.digest(&name))?);
    Ok(())
}

async fn run(
    args: &Args,
    cfg: &Config,
    input_override: Option<&Path>,
    out_override: Option<&Path>,
) -> Result<()> {
    let input_dir = input_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.source.dir));
    validate_input_dir(&input_dir)?;

    let cfg_norm = cfg.normalized_for_hash();
    let cfg_hash = sha256_hex(cfg_norm.as_bytes());
    let run_id = sha256_hex(format!("{}:{}", cfg_hash, input_dir.display()).as_bytes());

    let out_root = out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.output.out_dir));
    let run_dir = out_root.join(&run_id);

    if run_dir.exists() && !cfg.run.resume {
        return Err(anyhow!(
            "run_dir already exists and resume=false: {}",
            run_dir.display()
        ));
    }

    ensure_dir(&run_dir)?;
    ensure_dir(&run_dir.join("final"))?;
    ensure_dir(&run_dir.join("logs"))?;

    let log_path = resolve_log_path(cfg, Some(&run_dir));
    let _guard = init_logging(args, cfg, log_path.as_deref())?;

    info!("run_id={run_id} input={} out={}", input_dir.display(), run_dir.display());

    if cfg.debug.dump_effective_config {
        let raw = toml::to_string(cfg).unwrap_or_default();
        std::fs::write(run_dir.join("effective-config.toml"), raw)?;
    }

    let transport = HttpTransport::new(&cfg.endpoint)?;
    let submitter = Submitter::new(transport, RetryPolicy::from_endpoint(&cfg.endpoint));
    let pipeline = Pipeline::new(cfg, submitter);

    let summary = pipeline.run_dir(&input_dir, &run_dir).await?;

    if cfg.output.write_report_json {
        let (rows, chunk_rows) = build_rows(&summary);
        let mut sink = JsonFileSink::new(
            &run_dir.join("final"),
            &cfg.output.report_filename,
            &cfg.output.chunk_details_filename,
        );
        sink.write(&rows, &chunk_rows)?;
    }

    let (ok, chunked, errors) = summary.counts();

    if cfg.output.write_index_json {
        let index = serde_json::json!({
            "run_id": run_id,
            "started": summary.started,
            "finished": now_rfc3339(),
            "input_dir": input_dir,
            "report": format!("final/{}", cfg.output.report_filename),
            "chunk_details": format!("final/{}", cfg.output.chunk_details_filename),
            "files": summary.files.len(),
            "success": ok,
            "chunked": chunked,
            "error": errors,
        });
        std::fs::write(
            run_dir.join("index.json"),
            serde_json::to_string_pretty(&index)?,
        )?;
    }

    if cfg.run.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "run_id": run_id,
                "run_dir": run_dir,
                "files": summary.files.len(),
                "success": ok,
                "chunked": chunked,
                "error": errors,
            }))?
        );
    }

    Ok(())
}

fn validate_input_dir(input: &Path) -> Result<()> {
    if !input.exists() {
        return Err(anyhow!("input directory does not exist: {}", input.display()));
    }
    if !input.is_dir() {
        return Err(anyhow!("input is not a directory: {}", input.display()));
    }
    Ok(())
}

fn resolve_log_path(cfg: &Config, run_dir: Option<&Path>) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    if let Some(run_dir) = run_dir {
        return Some(run_dir.join("logs").join("edit-relay.log"));
    }

    Some(PathBuf::from(&cfg.output.out_dir).join("edit-relay.log"))
}
