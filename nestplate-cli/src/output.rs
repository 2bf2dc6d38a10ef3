use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Error};
use tempfile::NamedTempFile;

pub const STDIN_STDOUT: &str = "-";

/// Output target that is either stdout or a file replaced atomically on
/// [`commit`](Output::commit).
pub struct Output {
    temp: Option<(PathBuf, NamedTempFile)>,
}

impl Output {
    pub fn new(filename: &Path) -> Result<Output, Error> {
        Ok(Output {
            temp: if filename == Path::new(STDIN_STDOUT) {
                None
            } else {
                let filename = std::env::current_dir()?.join(filename);
                let ntf = NamedTempFile::new_in(
                    filename
                        .parent()
                        .ok_or_else(|| anyhow!("cannot write to root"))?,
                )
                .with_context(|| format!("unable to create '{}'", filename.display()))?;
                Some((filename, ntf))
            },
        })
    }

    pub fn commit(&mut self) -> Result<(), Error> {
        if let Some((filename, temp)) = self.temp.take() {
            temp.persist(&filename)
                .with_context(|| format!("unable to write '{}'", filename.display()))?;
        }
        Ok(())
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.temp {
            Some((_, ref mut out)) => out.write(buf),
            None => io::stdout().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.temp {
            Some((_, ref mut out)) => out.flush(),
            None => io::stdout().flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_appears_on_commit() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("output.md");
        let mut out = Output::new(&target).unwrap();
        write!(out, "# Report").unwrap();
        assert!(!target.exists());
        out.commit().unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "# Report");
    }

    #[test]
    fn test_dropped_output_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("output.md");
        {
            let mut out = Output::new(&target).unwrap();
            write!(out, "partial").unwrap();
        }
        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
