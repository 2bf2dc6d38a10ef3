use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Error};
use clap::ArgMatches;
use nestplate::{Environment, UndefinedBehavior};
use serde::{Deserialize, Serialize};

/// Holds in-memory config state for the execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    format: String,
    strict: bool,
    newline: bool,
    output_name: String,
    data_extension: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            format: "auto".to_string(),
            strict: false,
            newline: true,
            output_name: "output.md".to_string(),
            data_extension: "yaml".to_string(),
        }
    }
}

impl Config {
    /// Loads the config file if one exists and applies the environment.
    pub fn discover() -> Result<Config, Error> {
        let mut cfg = match config_file_path() {
            Some(path) if path.is_file() => {
                log::debug!("loading config from {}", path.display());
                Config::load_from_toml(&path)?
            }
            _ => Config::default(),
        };
        cfg.update_from_env()?;
        Ok(cfg)
    }

    pub fn load_from_toml(p: &Path) -> Result<Config, Error> {
        let contents = std::fs::read_to_string(p)
            .with_context(|| format!("unable to read config file '{}'", p.display()))?;
        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("invalid config file '{}'", p.display()))?;
        Ok(cfg)
    }

    pub fn update_from_env(&mut self) -> Result<(), Error> {
        if let Ok(format) = env::var("NESTPLATE_FORMAT") {
            self.format = format;
        }
        if let Ok(strict) = env::var("NESTPLATE_STRICT") {
            self.strict = parse_env_bool(&strict, "NESTPLATE_STRICT")?;
        }
        if let Ok(newline) = env::var("NESTPLATE_NEWLINE") {
            self.newline = parse_env_bool(&newline, "NESTPLATE_NEWLINE")?;
        }
        if let Ok(output_name) = env::var("NESTPLATE_OUTPUT_NAME") {
            self.output_name = output_name;
        }
        Ok(())
    }

    /// Applies the flags of a subcommand.  Flags a subcommand does not
    /// define are left alone.
    pub fn update_from_matches(&mut self, matches: &ArgMatches) -> Result<(), Error> {
        if let Some(format) = opt_string(matches, "format") {
            self.format = format;
        }
        if opt_flag(matches, "strict") {
            self.strict = true;
        }
        if opt_flag(matches, "no-newline") {
            self.newline = false;
        }
        if let Some(output_name) = opt_string(matches, "output-name") {
            self.output_name = output_name;
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), Error> {
        if self.format != "auto" && !crate::cli::SUPPORTED_FORMATS.iter().any(|x| x.0 == self.format)
        {
            bail!("unsupported data format '{}'", self.format);
        }
        if self.output_name.is_empty() || self.output_name.contains(['/', '\\']) {
            bail!("output name must be a plain file name, got '{}'", self.output_name);
        }
        Ok(())
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn newline(&self) -> bool {
        self.newline
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// Checks if a file name carries one of the configured data extensions.
    pub fn is_data_file(&self, path: &Path) -> bool {
        let ext = match path.extension().and_then(|x| x.to_str()) {
            Some(ext) => ext,
            None => return false,
        };
        ext == self.data_extension
            || (self.data_extension == "yaml" && ext == "yml")
            || (self.data_extension == "yml" && ext == "yaml")
    }

    pub fn apply_to_env(&self, env: &mut Environment) {
        env.set_undefined_behavior(if self.strict {
            UndefinedBehavior::Strict
        } else {
            UndefinedBehavior::Lenient
        });
    }
}

fn config_file_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os("NESTPLATE_CONFIG") {
        return Some(PathBuf::from(path));
    }
    home::home_dir().map(|home| home.join(".config").join("nestplate").join("config.toml"))
}

fn opt_string(matches: &ArgMatches, id: &str) -> Option<String> {
    matches.try_get_one::<String>(id).ok().flatten().cloned()
}

fn opt_flag(matches: &ArgMatches, id: &str) -> bool {
    matches
        .try_get_one::<bool>(id)
        .ok()
        .flatten()
        .copied()
        .unwrap_or(false)
}

fn parse_env_bool(s: &str, var_name: &str) -> Result<bool, Error> {
    match s.to_lowercase().as_str() {
        "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        _ => bail!("invalid boolean value for {}: {}", var_name, s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    #[test]
    fn test_toml_overrides_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut f,
            b"strict = true\noutput-name = \"README.md\"\ndata-extension = \"json\"\n",
        )
        .unwrap();
        let cfg = Config::load_from_toml(f.path()).unwrap();
        assert_eq!(
            cfg,
            Config {
                strict: true,
                output_name: "README.md".into(),
                data_extension: "json".into(),
                ..Config::default()
            }
        );
    }

    #[test]
    fn test_invalid_value_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut f, b"strict = \"maybe\"\n").unwrap();
        assert!(Config::load_from_toml(f.path()).is_err());
    }

    #[test]
    fn test_flags_override() {
        let matches = crate::cli::make_command()
            .try_get_matches_from(["nestplate", "render", "--strict", "--format=json", "--no-newline"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        let mut cfg = Config::default();
        cfg.update_from_matches(sub).unwrap();
        assert!(cfg.strict);
        assert!(!cfg.newline());
        assert_eq!(cfg.format(), "json");
        assert_eq!(cfg.output_name(), "output.md");
    }

    #[test]
    fn test_bad_output_name() {
        let matches = crate::cli::make_command()
            .try_get_matches_from(["nestplate", "generate", "-t", "x", "--output-name", "a/b.md", "m"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        let err = Config::default().update_from_matches(sub).unwrap_err();
        assert_eq!(err.to_string(), "output name must be a plain file name, got 'a/b.md'");
    }

    #[test]
    fn test_data_extensions() {
        let cfg = Config::default();
        assert!(cfg.is_data_file(Path::new("a/metrics.yaml")));
        assert!(cfg.is_data_file(Path::new("a/metrics.yml")));
        assert!(!cfg.is_data_file(Path::new("a/output.md")));
        assert!(!cfg.is_data_file(Path::new("a/yaml")));
    }

    #[test]
    fn test_env_bool() {
        assert!(parse_env_bool("Yes", "X").unwrap());
        assert!(!parse_env_bool("off", "X").unwrap());
        assert!(parse_env_bool("maybe", "X").is_err());
    }
}
