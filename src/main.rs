mod cli;

use mediamorph::config;
use mm_av::{
    EngineFactory, FfmpegEngineFactory, ImageEngine, MemoryEngineFactory, ToolRegistry,
    TranscodeEngine,
};
use mm_core::config::Config;
use mm_pipeline::{ConvertedFile, Converter, LogSender, ProgressSender, SourceFile};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Engine log lines shown when a conversion fails.
const FAILURE_LOG_LINES: usize = 10;

/// Stands in for ffmpeg when it could not be found, so still-image jobs
/// still work and transcoder jobs fail with `EngineUnavailable`.
struct UnavailableEngineFactory {
    reason: String,
}

impl EngineFactory for UnavailableEngineFactory {
    fn create(&self) -> mm_core::Result<Arc<dyn TranscodeEngine>> {
        Err(mm_core::Error::engine_unavailable(self.reason.clone()))
    }
}

fn ffmpeg_factory(config: &Config) -> Arc<dyn EngineFactory> {
    let tools = ToolRegistry::discover(&config.tools);
    match FfmpegEngineFactory::from_registry(&tools, config.conversion.engine_timeout()) {
        Ok(factory) => Arc::new(factory),
        Err(e) => {
            tracing::warn!("{e}");
            Arc::new(UnavailableEngineFactory {
                reason: e.to_string(),
            })
        }
    }
}

async fn read_source(input: &Path, mime: Option<String>) -> Result<SourceFile> {
    let data = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read input file: {:?}", input))?;
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(SourceFile::new(name, mime.unwrap_or_default(), data))
}

/// Run one conversion with terminal progress and Ctrl-C cancellation.
async fn run_conversion(
    converter: &Converter,
    source: SourceFile,
    target: &str,
) -> mm_core::Result<ConvertedFile> {
    let canceller = converter.canceller();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            canceller.cancel();
        }
    });

    let lines = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = lines.clone();
    let log = LogSender::new(move |line| {
        let mut lines = sink.lock();
        if lines.len() == FAILURE_LOG_LINES {
            lines.remove(0);
        }
        lines.push(line.to_string());
    });
    let progress = ProgressSender::new(|pct, step| eprint!("\r[{pct:5.1}%] {step:<10}"));

    let result = converter.convert(source, target, progress, log).await;
    eprintln!();
    ctrl_c.abort();

    if let Err(ref e) = result {
        if !e.is_cancelled() {
            for line in lines.lock().iter() {
                eprintln!("  | {line}");
            }
        }
    }
    result
}

fn default_output(input: &Path, target: &str) -> PathBuf {
    input.with_extension(mm_core::normalize_format(target))
}

async fn convert_file(
    input: &Path,
    target: &str,
    output: Option<PathBuf>,
    mime: Option<String>,
    dry_run: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }

    let output = output.unwrap_or_else(|| default_output(input, target));
    if !dry_run && output == input {
        anyhow::bail!("Output {:?} would overwrite the input", output);
    }

    tracing::info!("Converting {:?} to {}", input, target);
    let source = read_source(input, mime).await?;

    if dry_run {
        let memory = Arc::new(MemoryEngineFactory::new());
        let converter = Converter::new(config, memory.clone(), Arc::new(ImageEngine::new()));
        let converted = run_conversion(&converter, source, target).await?;
        print_plan(&converted, &memory, false)?;
        println!("\n[DRY RUN] Would write {:?}", output);
        return Ok(());
    }

    let factory = ffmpeg_factory(&config);
    let converter = Converter::new(config, factory, Arc::new(ImageEngine::new()));
    let converted = run_conversion(&converter, source, target).await?;

    tokio::fs::write(&output, &converted.data)
        .await
        .with_context(|| format!("Failed to write output file: {:?}", output))?;

    println!(
        "Wrote {} ({}, {} bytes)",
        output.display(),
        converted.mime,
        converted.data.len()
    );
    Ok(())
}

async fn plan_file(
    input: &Path,
    target: &str,
    mime: Option<String>,
    json: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }

    let source = read_source(input, mime).await?;
    let memory = Arc::new(MemoryEngineFactory::new());
    let converter = Converter::new(config, memory.clone(), Arc::new(ImageEngine::new()));
    let converted = converter
        .convert(source, target, ProgressSender::noop(), LogSender::noop())
        .await?;

    print_plan(&converted, &memory, json)
}

fn print_plan(converted: &ConvertedFile, memory: &MemoryEngineFactory, json: bool) -> Result<()> {
    let engine = memory.latest();
    let invocations = engine.as_ref().map(|e| e.invocations()).unwrap_or_default();
    let written = engine.as_ref().map(|e| e.written()).unwrap_or_default();
    let frames = written.iter().filter(|n| n.starts_with("frame-")).count();

    if json {
        let plan = serde_json::json!({
            "scenario": converted.scenario,
            "route": converted.route.to_string(),
            "output_mime": converted.mime,
            "frames": frames,
            "invocations": invocations,
        });
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("Scenario: {}", converted.scenario);
    println!("Route: {}", converted.route);
    println!("Output MIME: {}", converted.mime);
    if frames > 0 {
        println!("Frames: {frames}");
    }
    if invocations.is_empty() {
        println!("No transcoder invocations (still-image engine)");
    }
    for (i, args) in invocations.iter().enumerate() {
        println!("  {}. ffmpeg {}", i + 1, args.join(" "));
    }
    Ok(())
}

fn list_formats(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    println!("Video targets:");
    for fmt in mm_core::VIDEO_FORMATS {
        println!(
            "  {:<6} video {:<12} audio {}",
            fmt,
            mm_core::VideoEncoder::for_format(fmt).ffmpeg_name(),
            mm_core::AudioEncoder::for_format(fmt).ffmpeg_name()
        );
    }

    println!("\nAudio targets:");
    for fmt in mm_core::AUDIO_FORMATS {
        println!(
            "  {:<6} audio {}",
            fmt,
            mm_core::AudioEncoder::for_format(fmt).ffmpeg_name()
        );
    }

    println!("\nImage targets:");
    for fmt in mm_core::IMAGE_FORMATS {
        let route = if config.routing.forces_transcoder(fmt) {
            "transcoder"
        } else if config.routing.is_animated_target(fmt) {
            "still-image (transcoder for animated input)"
        } else {
            "still-image"
        };
        println!("  {:<6} {}", fmt, route);
    }

    println!("\nVideo to gif uses a two-pass palette encode.");
    println!(
        "Animated images to video are re-timed to {} fps.",
        config.conversion.frame_rate
    );
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("ffmpeg is missing; only still-image conversions will work.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let path = path.map(Path::to_path_buf).or_else(config::find_default_config);

    let config = match path {
        Some(ref p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file found, using defaults");
            Config::default()
        }
    };

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("✓ Configuration is valid");
    } else {
        println!("Configuration has {} warning(s):", warnings.len());
        for warning in &warnings {
            println!("  - {warning}");
        }
    }
    println!("  Max input: {} bytes", config.limits.max_input_bytes);
    println!(
        "  Frame rate: {} fps, batch size {}",
        config.conversion.frame_rate,
        config.conversion.batch_size()
    );
    println!(
        "  Transcoder image targets: {}",
        config.routing.transcoder_targets.len()
    );

    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Convert {
            input,
            target,
            output,
            mime,
            dry_run,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert_file(&input, &target, output, mime, dry_run, config_path))
        }
        Commands::Plan {
            input,
            target,
            mime,
            json,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(plan_file(&input, &target, mime, json, config_path))
        }
        Commands::Formats => list_formats(config_path),
        Commands::CheckTools => check_tools(config_path),
        Commands::Validate { file } => validate_config(file.as_deref().or(config_path)),
        Commands::Version => {
            println!("mediamorph {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediamorph=debug,mm_pipeline=debug,mm_av=debug,mm_core=debug".to_string()
        } else {
            "mediamorph=info,mm_pipeline=info,mm_av=info,mm_core=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli) {
        if let Some(e) = err.downcast_ref::<mm_core::Error>() {
            eprintln!("Error: {err:#}");
            std::process::exit(e.exit_code());
        }
        return Err(err);
    }
    Ok(())
}
