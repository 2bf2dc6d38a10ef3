use std::path::Path;
use std::{fs, io};

use anyhow::{bail, Context, Error};
use nestplate::value::{Value, ValueKind};

use crate::cli::SUPPORTED_FORMATS;
use crate::output::STDIN_STDOUT;

/// Figures out the data format for a path.
pub fn detect_format<'a>(format: &'a str, path: &Path) -> Result<&'a str, Error> {
    if format != "auto" {
        return Ok(format);
    }
    if path == Path::new(STDIN_STDOUT) {
        bail!("auto detection does not work with data from stdin");
    }
    let ext = path.extension().and_then(|x| x.to_str()).unwrap_or("");
    match SUPPORTED_FORMATS
        .iter()
        .find(|(_, extensions)| extensions.contains(&ext))
    {
        Some((name, _)) => Ok(*name),
        None => bail!("cannot auto detect format from extension"),
    }
}

/// Parses a data document into a context value.
pub fn parse_data(format: &str, contents: &str) -> Result<Value, Error> {
    Ok(match format {
        "json" => serde_json::from_str(contents)?,
        "yaml" => serde_yaml::from_str(contents)?,
        other => bail!("unsupported data format '{}'", other),
    })
}

/// Loads a data file (or stdin) and optionally selects a sub tree.
///
/// The result is always a mapping.  An empty document produces an empty
/// mapping.
pub fn load_data(format: &str, path: &Path, selector: Option<&str>) -> Result<Value, Error> {
    let contents = if path == Path::new(STDIN_STDOUT) {
        io::read_to_string(io::stdin()).context("unable to read data from stdin")?
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("unable to read data file '{}'", path.display()))?
    };
    let format = detect_format(format, path)?;
    let mut data = parse_data(format, &contents)
        .with_context(|| format!("unable to parse {} data from '{}'", format, path.display()))?;
    log::debug!("loaded {} data from {}", format, path.display());

    if let Some(selector) = selector {
        data = data
            .get_path(selector)
            .cloned()
            .with_context(|| format!("unable to select {:?} (value was {})", selector, data.kind()))?;
    }

    match data.kind() {
        ValueKind::Map => Ok(data),
        ValueKind::None | ValueKind::Undefined => Ok(Value::from_iter(
            std::iter::empty::<(String, Value)>(),
        )),
        kind => bail!("failed to interpret input data as object (value was {})", kind),
    }
}
