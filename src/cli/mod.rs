pub mod args;
pub mod display;
pub mod interactive;

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use llm_scaffold::{
    config, materialize, process, save_raw_output, EventHandler, ExecCtx, Extractor,
    GenerationError, Generator, MaterializeReport, ProjectOutput, ResolvedConfig, Settings,
};

use args::{Cli, Commands, GenerateArgs};
use interactive::PreviewChoice;

pub async fn run(cli: Cli) -> Result<ExitCode> {
    let config_file = cli.config.clone().unwrap_or_else(config::config_path);
    match cli.into_command() {
        Commands::Generate(args) => generate(args, &config_file).await,
        Commands::Extract { file, fallback } => {
            Ok(exit_code(extract(&file, fallback, &config_file)?))
        }
        Commands::Templates { app_type } => {
            match app_type {
                Some(app) => println!("{}", app.system_instruction()),
                None => display::print_templates(),
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Init { force } => {
            config::write_default_config(&config_file, force)?;
            println!("Wrote {}", config_file.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn load_settings(config_file: &Path) -> Result<Settings> {
    Settings::load_from(config_file)
        .with_context(|| format!("failed to load config from {}", config_file.display()))
}

/// Get the app description from flags, or interactively with a preview loop.
/// `None` means the user cancelled.
fn obtain_description(
    args: &GenerateArgs,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<Option<String>> {
    let mut description = match (&args.prompt, &args.prompt_file) {
        (Some(text), _) => text.trim().to_string(),
        (None, Some(path)) => fs_err::read_to_string(path)?.trim().to_string(),
        (None, None) if args.no_editor => interactive::read_description(input, out)?,
        (None, None) => interactive::edit_description("")?,
    };

    if args.yes {
        return Ok((!description.is_empty()).then_some(description));
    }
    loop {
        match interactive::preview(&description, input, out)? {
            PreviewChoice::Proceed if !description.is_empty() => return Ok(Some(description)),
            PreviewChoice::Proceed => {
                writeln!(out, "The description is empty.")?;
            }
            PreviewChoice::Cancel => return Ok(None),
            PreviewChoice::EditAgain => {}
        }
        description = if args.no_editor {
            interactive::read_description(input, out)?
        } else {
            interactive::edit_description(&description)?
        };
    }
}

/// Cancel `token` on the first Ctrl-C; exit on the second.
fn watch_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        let mut first = true;
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            if !first {
                eprintln!("\nForce exit.");
                std::process::exit(130);
            }
            first = false;
            eprintln!("\nCancelling (Ctrl+C again to force)...");
            token.cancel();
        }
    });
}

async fn generate(args: GenerateArgs, config_file: &Path) -> Result<ExitCode> {
    let settings = load_settings(config_file)?;
    let resolved = ResolvedConfig::resolve(&args.overrides(), &settings, |key| {
        std::env::var(key).ok()
    })?;
    tracing::debug!(?resolved, "configuration resolved");
    let backend = resolved.backend()?;

    display::print_banner();
    let (app_type, name, description) = {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut out = io::stdout();

        let app_type = match args.app_type {
            Some(app) => app,
            None => interactive::select_app_type(&mut input, &mut out)?,
        };
        let name = match &args.name {
            Some(name) => {
                interactive::check_project_name(name)?;
                name.clone()
            }
            None => interactive::ask_project_name(&mut input, &mut out)?,
        };
        let Some(description) = obtain_description(&args, &mut input, &mut out)? else {
            display::print_cancelled();
            return Ok(ExitCode::SUCCESS);
        };
        (app_type, name, description)
    };

    let cancel = CancellationToken::new();
    watch_ctrl_c(cancel.clone());

    let handler: Arc<dyn EventHandler> = if resolved.stream {
        Arc::new(display::LiveFragments)
    } else {
        Arc::new(display::Spinner::new())
    };
    let ctx = ExecCtx::builder(&resolved.base_url)
        .backend(backend)
        .cancellation(cancel)
        .timeout(resolved.timeout)
        .event_handler(handler)
        .build()?;
    let generator = Generator::new(&resolved.model)
        .with_config(resolved.llm.clone())
        .with_streaming(resolved.stream)
        .with_extractor(Extractor::with_fallback(resolved.fallback));

    display::print_generating(generator.model(), ctx.backend.name());
    let base_dir = resolved.output_dir.join(&name);
    let outcome = generate_into(
        &ctx,
        &generator,
        app_type.system_instruction(),
        &description,
        &base_dir,
        args.save_raw.as_deref(),
    )
    .await?;

    match outcome {
        Outcome::Written { project, report } => {
            display::print_written(&name, &project, &report);
            Ok(ExitCode::SUCCESS)
        }
        Outcome::Rejected(err) => {
            display::print_failure(&err);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// What a generation run left behind.
#[derive(Debug)]
enum Outcome {
    Written {
        project: ProjectOutput,
        report: MaterializeReport,
    },
    /// Nothing was written.
    Rejected(GenerationError),
}

/// Invoke the model and write the project under `base_dir` only when it
/// validates. The raw response goes to `save_raw` either way.
async fn generate_into(
    ctx: &ExecCtx,
    generator: &Generator,
    system: &str,
    description: &str,
    base_dir: &Path,
    save_raw: Option<&Path>,
) -> Result<Outcome> {
    let result = generator.generate(ctx, system, description).await;

    if let Some(path) = save_raw {
        let raw = match &result {
            Ok(generated) => generated.raw.text(),
            Err(err) => err.raw_text(),
        };
        save_raw_output(path, raw)
            .with_context(|| format!("failed to save raw response to {}", path.display()))?;
    }

    let generated = match result {
        Ok(generated) => generated,
        Err(err) => return Ok(Outcome::Rejected(err)),
    };
    let report = materialize(&generated.project, base_dir)
        .with_context(|| format!("failed to write project to {}", base_dir.display()))?;
    Ok(Outcome::Written {
        project: generated.project,
        report,
    })
}

/// Run the pipeline on a saved response. `Ok(false)` when it is rejected.
fn extract(
    file: &Path,
    fallback: Option<llm_scaffold::BraceFallback>,
    config_file: &Path,
) -> Result<bool> {
    let fallback = match fallback {
        Some(f) => f,
        None => load_settings(config_file)?.extraction.fallback.unwrap_or_default(),
    };
    let text = fs_err::read_to_string(file)?;
    match process(&text, &Extractor::with_fallback(fallback)) {
        Ok(project) => {
            display::print_extracted(&project);
            Ok(true)
        }
        Err(err) => {
            display::print_failure(&err);
            Ok(false)
        }
    }
}
