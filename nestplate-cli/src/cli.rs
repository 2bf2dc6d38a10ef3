use std::path::PathBuf;

use clap::{arg, command, value_parser, Command};

/// Supported data formats and the file extensions auto detection maps to them.
pub static SUPPORTED_FORMATS: &[(&str, &[&str])] =
    &[("json", &["json"]), ("yaml", &["yaml", "yml"])];

fn format_arg() -> clap::Arg {
    arg!(-f --format <FORMAT> "The format of the input data").value_parser([
        "auto", "json", "yaml",
    ])
}

fn render_command() -> Command {
    Command::new("render")
        .about("Renders a single template with a data file")
        .args([
            format_arg(),
            arg!(--strict "Disallow undefined variables in templates"),
            arg!(--"no-newline" "Do not output a trailing newline"),
            arg!(-o --output <FILENAME> "Path to the output file")
                .default_value("-")
                .value_parser(value_parser!(PathBuf)),
            arg!(--select <SELECTOR> "Select a dotted path of the input data"),
            arg!(--dump <KIND> "Dump internals of a template")
                .value_parser(["ast", "tokens"]),
            arg!(template: [TEMPLATE] "Path to the input template").default_value("-"),
            arg!(data: [DATA] "Path to the data file").value_parser(value_parser!(PathBuf)),
        ])
}

fn generate_command() -> Command {
    Command::new("generate")
        .about("Renders markdown next to the first data file of every directory")
        .args([
            arg!(-t --template <TEMPLATE> "Path to the template used for every directory")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
            format_arg(),
            arg!(--strict "Disallow undefined variables in templates"),
            arg!(--"output-name" <NAME> "File name of the markdown written per directory"),
            arg!(metrics_dir: <METRICS_DIR> "Root of the data tree")
                .value_parser(value_parser!(PathBuf)),
        ])
}

fn check_command() -> Command {
    Command::new("check")
        .about("Reports which directories already contain markdown output")
        .args([
            arg!(metrics_dir: <METRICS_DIR> "Root of the data tree")
                .value_parser(value_parser!(PathBuf)),
        ])
}

pub(super) fn make_command() -> Command {
    command!()
        .name("nestplate")
        .args([
            arg!(-v --verbose "Enable debug logging")
                .global(true)
                .conflicts_with("quiet"),
            arg!(-q --quiet "Only log errors").global(true),
        ])
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommands([render_command(), generate_command(), check_command()])
        .about("nestplate renders templates against nested YAML or JSON data.")
        .after_help(
            "Configuration is read from ~/.config/nestplate/config.toml (or the file named \
             by NESTPLATE_CONFIG) and NESTPLATE_* environment variables.",
        )
}
