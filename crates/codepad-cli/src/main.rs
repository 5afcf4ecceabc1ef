use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use codepad_core::config::{CodepadConfig, ConfigLoader};
use codepad_core::{DiagnosticService, Dispatcher, ExecutionRequest, GuestLanguage};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod render;

#[derive(Parser, Debug)]
#[clap(name = "codepad", author, version = "0.1.0", about = "Run and diagnose code snippets")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(
        long,
        short,
        global = true,
        help = "Configuration file (default: <config dir>/codepad/codepad.yaml)"
    )]
    config: Option<PathBuf>,

    #[clap(long, short, global = true, help = "Log level; overrides logging.level")]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a file (or `-` for stdin) and print its output
    Run {
        file: String,
        #[clap(long, help = "Language id or alias; inferred from the extension otherwise")]
        lang: Option<String>,
        #[clap(long, help = "Ask the model to explain a failed run")]
        diagnose: bool,
        #[clap(long, help = "Write the suggested fix back to the file (implies --diagnose)")]
        apply_fix: bool,
    },
    /// Ask the model to review a file before running it
    Review {
        file: String,
        #[clap(long)]
        lang: Option<String>,
    },
    /// Ask the model for optimization suggestions
    Optimize {
        file: String,
        #[clap(long)]
        lang: Option<String>,
    },
    /// List supported languages
    Languages,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = ConfigLoader::load(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    init_logging(&config, cli.log_level.as_deref())?;

    match cli.command {
        Commands::Languages => {
            println!("{}", render::languages());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run {
            file,
            lang,
            diagnose,
            apply_fix,
        } => run(&config, &file, lang.as_deref(), diagnose || apply_fix, apply_fix).await,
        Commands::Review { file, lang } => {
            let (source, language) = load_source(&file, lang.as_deref())?;
            let service = DiagnosticService::from_config(&config);
            let record = service
                .analyze_before_run(&source, &language)
                .await?;
            println!("{}", render::diagnostic(&record, Some(&file)));
            Ok(exit_code(!record.success))
        }
        Commands::Optimize { file, lang } => {
            let (source, language) = load_source(&file, lang.as_deref())?;
            let service = DiagnosticService::from_config(&config);
            let record = service
                .suggest_optimizations(&source, &language)
                .await?;
            println!("{}", render::diagnostic(&record, Some(&file)));
            Ok(exit_code(!record.success))
        }
    }
}

async fn run(
    config: &CodepadConfig,
    file: &str,
    lang: Option<&str>,
    diagnose: bool,
    apply_fix: bool,
) -> Result<ExitCode> {
    let (source, language) = load_source(file, lang)?;
    let dispatcher = Dispatcher::from_config(config);

    log::debug!("Running {} with a {:?} timeout", language, dispatcher.timeout());
    dispatcher.prepare(&language).await;
    let result = dispatcher
        .execute(ExecutionRequest::new(source.clone(), language.clone()))
        .await;

    println!("{}", result.output);
    eprintln!("Finished in {} ms", result.elapsed_millis);

    let Some(error_text) = result.error_text().filter(|_| diagnose) else {
        return Ok(exit_code(result.failed));
    };

    let service = DiagnosticService::from_config(config);
    let record = match service.analyze_error(&source, &language, error_text).await {
        Ok(record) => record,
        Err(e) => {
            eprintln!("\n{}", e);
            return Ok(exit_code(true));
        }
    };
    println!("\n{}", render::diagnostic(&record, Some(file)));

    if apply_fix {
        match (&record.fixed_code, file) {
            (_, "-") => eprintln!("Cannot apply a fix to stdin input"),
            (Some(code), path) => {
                std::fs::write(path, format!("{}\n", code))
                    .with_context(|| format!("Failed to write fix to {}", path))?;
                println!("\nApplied fix to {}", path);
            }
            (None, _) => eprintln!("No automatic fix is available for this error"),
        }
    }

    Ok(exit_code(true))
}

fn load_source(file: &str, lang: Option<&str>) -> Result<(String, GuestLanguage)> {
    let language = match (lang, file) {
        (Some(tag), _) => GuestLanguage::parse(tag),
        (None, "-") => bail!("--lang is required when reading from stdin"),
        (None, path) => {
            let extension = Path::new(path)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            GuestLanguage::from_extension(extension)
        }
    };

    let source = if file == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read source from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file))?
    };

    Ok((source, language))
}

fn init_logging(config: &CodepadConfig, cli_level: Option<&str>) -> Result<()> {
    let level = cli_level.unwrap_or(&config.logging.level);
    let log_level_filter: LevelFilter = level
        .parse()
        .with_context(|| format!("Unknown log level '{}'", level))?;

    let mut builder = env_logger::Builder::new();
    builder.filter_level(log_level_filter);

    if let Some(path) = &config.logging.file {
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }

    builder.init();
    Ok(())
}

fn exit_code(failed: bool) -> ExitCode {
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
