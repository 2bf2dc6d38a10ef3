use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Error};
use nestplate::Template;
use walkdir::WalkDir;

use crate::config::Config;
use crate::data::load_data;
use crate::output::Output;

/// A data file and the markdown file rendered from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub data: PathBuf,
    pub output: PathBuf,
}

/// Result of looking for markdown files in a data tree.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MarkdownReport {
    /// Directories with a markdown file, paired with the first one found.
    pub with_markdown: Vec<(PathBuf, PathBuf)>,
    /// Directories without any markdown file.
    pub without_markdown: Vec<PathBuf>,
}

/// Walks a directory tree in file name order.  Unreadable entries are
/// logged and skipped.
fn walk(root: &Path) -> impl Iterator<Item = walkdir::DirEntry> {
    WalkDir::new(root)
        .sort_by_file_name()
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("skipping unreadable entry: {}", err);
                None
            }
        })
}

/// Finds the first data file (by name) of every directory below `root`.
pub fn find_data_files(root: &Path, config: &Config) -> BTreeMap<PathBuf, PathBuf> {
    let mut rv = BTreeMap::new();
    for entry in walk(root) {
        if !entry.file_type().is_file() || !config.is_data_file(entry.path()) {
            continue;
        }
        if let Some(parent) = entry.path().parent() {
            rv.entry(parent.to_path_buf())
                .or_insert_with(|| entry.path().to_path_buf());
        }
    }
    rv
}

fn render_one(
    tmpl: &Template<'_>,
    data_file: &Path,
    output_file: &Path,
    config: &Config,
) -> Result<(), Error> {
    let ctx = load_data(config.format(), data_file, None)?;
    let rendered = tmpl.render(&ctx)?;
    let mut out = Output::new(output_file)?;
    out.write_all(rendered.as_bytes())?;
    if config.newline() && !rendered.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    out.commit()
}

/// Renders the template for the first data file of every directory below
/// `root`.  Failures for a single directory are logged and skipped.
pub fn generate_markdown(
    tmpl: &Template<'_>,
    root: &Path,
    config: &Config,
) -> Result<Vec<Rendered>, Error> {
    if !root.is_dir() {
        anyhow::bail!("metrics directory '{}' does not exist", root.display());
    }
    let mut rv = Vec::new();
    let mut failed = 0;
    for (dir, data) in find_data_files(root, config) {
        let output = dir.join(config.output_name());
        match render_one(tmpl, &data, &output, config) {
            Ok(()) => {
                log::info!(
                    "Rendered markdown for {} to {}",
                    data.display(),
                    output.display()
                );
                rv.push(Rendered { data, output });
            }
            Err(err) => {
                failed += 1;
                log::error!("Failed to process {}: {:#}", data.display(), err);
            }
        }
    }
    log::info!(
        "Generated {} markdown file(s), {} failed",
        rv.len(),
        failed
    );
    Ok(rv)
}

/// Reports which directories below `root` contain markdown files.
pub fn check_markdown(root: &Path) -> Result<MarkdownReport, Error> {
    if !root.is_dir() {
        anyhow::bail!("metrics directory '{}' does not exist", root.display());
    }
    let mut first_markdown = BTreeMap::<PathBuf, Option<PathBuf>>::new();
    for entry in walk(root) {
        if entry.file_type().is_dir() {
            first_markdown.entry(entry.path().to_path_buf()).or_default();
        } else if entry.path().extension().map_or(false, |x| x == "md") {
            if let Some(parent) = entry.path().parent() {
                let slot = first_markdown.entry(parent.to_path_buf()).or_default();
                if slot.is_none() {
                    *slot = Some(entry.path().to_path_buf());
                }
            }
        }
    }

    let mut report = MarkdownReport::default();
    for (dir, markdown) in first_markdown {
        match markdown {
            Some(markdown) => report.with_markdown.push((dir, markdown)),
            None => report.without_markdown.push(dir),
        }
    }
    log::debug!(
        "{} directories with markdown, {} without",
        report.with_markdown.len(),
        report.without_markdown.len()
    );
    Ok(report)
}

/// Loads the template used by `generate`.
pub fn load_template_source(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path)
        .with_context(|| format!("unable to load template '{}'", path.display()))
}
