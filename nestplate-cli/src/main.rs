use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Error};
use clap::ArgMatches;
use nestplate::machinery::{parse, tokenize};
use nestplate::{Environment, Error as NError, ErrorKind};

mod cli;
mod config;
mod data;
mod generate;
mod output;

use crate::config::Config;
use crate::output::{Output, STDIN_STDOUT};

fn init_logging(matches: &ArgMatches) {
    let level = if matches.get_flag("verbose") {
        "debug"
    } else if matches.get_flag("quiet") {
        "error"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .target(env_logger::Target::Stderr)
        .init();
}

/// Creates an environment that loads templates from the file system, or
/// from stdin for `-`.
fn create_env(config: &Config, stdin_used_for_data: bool) -> Environment {
    let mut env = Environment::new();
    config.apply_to_env(&mut env);
    let cached_stdin = Mutex::new(None::<String>);
    env.set_loader(move |name| -> Result<Option<String>, NError> {
        if name == STDIN_STDOUT {
            if stdin_used_for_data {
                return Err(NError::new(
                    ErrorKind::InvalidOperation,
                    "cannot load template from stdin when data is from stdin",
                ));
            }
            let mut stdin = cached_stdin
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if stdin.is_none() {
                *stdin = Some(io::read_to_string(io::stdin()).map_err(|err| {
                    NError::new(
                        ErrorKind::InvalidOperation,
                        "failed to read template from stdin",
                    )
                    .with_source(err)
                })?);
            }
            return Ok(stdin.clone());
        }

        match fs::read_to_string(name) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(
                NError::new(ErrorKind::TemplateNotFound, "cannot read template").with_source(err),
            ),
        }
    });
    log::debug!("undefined behavior: {:?}", env.undefined_behavior());
    env
}

fn execute_render(config: &Config, matches: &ArgMatches) -> Result<i32, Error> {
    let template = matches
        .get_one::<String>("template")
        .map_or(STDIN_STDOUT, |x| x.as_str());
    let data_path = matches.get_one::<PathBuf>("data");
    let selector = matches.get_one::<String>("select").map(|x| x.as_str());
    let ctx = match data_path {
        Some(path) => data::load_data(config.format(), path, selector)?,
        None => nestplate::context!(),
    };
    let stdin_used = data_path.map_or(false, |x| x == Path::new(STDIN_STDOUT));

    let env = create_env(config, stdin_used);
    let tmpl = env.get_template(template)?;
    log::debug!("loaded template {}", tmpl.name());

    let output_path = matches
        .get_one::<PathBuf>("output")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(STDIN_STDOUT));
    let mut output = Output::new(&output_path)?;

    if let Some(dump) = matches.get_one::<String>("dump") {
        match dump.as_str() {
            "ast" => {
                writeln!(output, "{:#?}", parse(tmpl.source(), tmpl.name())?)?;
            }
            "tokens" => {
                for item in tokenize(tmpl.source()) {
                    let (token, span) = item?;
                    writeln!(output, "{:?}{:?}", token, span)?;
                }
            }
            other => anyhow::bail!("unknown dump kind '{}'", other),
        }
    } else {
        let result = tmpl.render(&ctx)?;
        if config.newline() {
            writeln!(output, "{result}")?;
        } else {
            write!(output, "{result}")?;
        }
    }

    output.commit()?;
    Ok(0)
}

fn execute_generate(config: &Config, matches: &ArgMatches) -> Result<i32, Error> {
    let template_path = matches
        .get_one::<PathBuf>("template")
        .context("missing template")?;
    let root = matches
        .get_one::<PathBuf>("metrics_dir")
        .context("missing metrics directory")?;

    let source = generate::load_template_source(template_path)?;
    let mut env = Environment::new();
    config.apply_to_env(&mut env);
    let name = template_path.display().to_string();
    env.add_template(&name, &source)?;
    let tmpl = env.get_template(&name)?;
    log::info!("Loaded template {}", name);

    let rendered = generate::generate_markdown(&tmpl, root, config)?;
    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    for item in rendered {
        writeln!(
            stdout,
            "{} -> {}",
            item.data.display(),
            item.output.display()
        )?;
    }
    Ok(0)
}

fn execute_check(matches: &ArgMatches) -> Result<i32, Error> {
    let root = matches
        .get_one::<PathBuf>("metrics_dir")
        .context("missing metrics directory")?;
    let report = generate::check_markdown(root)?;
    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    writeln!(stdout, "Directories with markdown:")?;
    for (dir, markdown) in &report.with_markdown {
        writeln!(stdout, "  {} ({})", dir.display(), markdown.display())?;
    }
    writeln!(stdout, "Directories without markdown:")?;
    for dir in &report.without_markdown {
        writeln!(stdout, "  {}", dir.display())?;
    }
    Ok(0)
}

fn execute() -> Result<i32, Error> {
    let matches = cli::make_command().get_matches();
    init_logging(&matches);

    let mut config = Config::discover()?;
    match matches.subcommand() {
        Some(("render", sub)) => {
            config.update_from_matches(sub)?;
            execute_render(&config, sub)
        }
        Some(("generate", sub)) => {
            config.update_from_matches(sub)?;
            execute_generate(&config, sub)
        }
        Some(("check", sub)) => execute_check(sub),
        _ => anyhow::bail!("no subcommand given"),
    }
}

pub fn print_error(err: &Error) {
    eprintln!("error: {err}");
    if let Some(err) = err.downcast_ref::<NError>() {
        if err.name().is_some() {
            eprintln!("{}", err.display_debug_info());
        }
    }
    let mut source_opt = err.source();
    while let Some(source) = source_opt {
        eprintln!();
        eprintln!("caused by: {source}");
        if let Some(source) = source.downcast_ref::<NError>() {
            if source.name().is_some() {
                eprintln!("{}", source.display_debug_info());
            }
        }
        source_opt = source.source();
    }
}

fn main() {
    match execute() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            print_error(&err);
            std::process::exit(1);
        }
    }
}
