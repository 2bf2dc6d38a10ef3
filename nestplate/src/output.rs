use std::{fmt, io};

use crate::error::{Error, ErrorKind};

/// The sink templates render into.
///
/// Rendering never goes through a global buffer: the caller hands in the
/// writer and owns whatever ends up in it.
pub(crate) struct Output<'a> {
    w: &'a mut (dyn fmt::Write + 'a),
}

impl<'a> Output<'a> {
    /// Creates a new output.
    pub(crate) fn new(w: &'a mut (dyn fmt::Write + 'a)) -> Self {
        Self { w }
    }

    /// Writes some data to the underlying buffer contained within this output.
    #[inline]
    pub fn write_str(&mut self, s: &str) -> Result<(), Error> {
        self.w.write_str(s).map_err(write_failure)
    }

    /// Writes some formatted information into this instance.
    #[inline]
    pub fn write_fmt(&mut self, a: fmt::Arguments<'_>) -> Result<(), Error> {
        self.w.write_fmt(a).map_err(write_failure)
    }
}

fn write_failure(_: fmt::Error) -> Error {
    Error::new(ErrorKind::WriteFailure, "formatter error")
}

/// Adapts an [`io::Write`] so it can be rendered into.
///
/// The formatting machinery only reports [`fmt::Error`] so the actual I/O
/// error is held here until the render finishes.
pub(crate) struct WriteWrapper<W> {
    pub w: W,
    pub err: Option<io::Error>,
}

impl<W> WriteWrapper<W> {
    /// Replaces the given error with the held error if available.
    pub fn take_err(&mut self, original: Error) -> Error {
        self.err
            .take()
            .map(|io_err| {
                Error::new(ErrorKind::WriteFailure, "I/O error during rendering")
                    .with_source(io_err)
            })
            .unwrap_or(original)
    }
}

impl<W: io::Write> fmt::Write for WriteWrapper<W> {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.w.write_all(s.as_bytes()).map_err(|e| {
            self.err = Some(e);
            fmt::Error
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    struct BrokenPipe;

    impl io::Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_string_output() {
        let mut buf = String::new();
        let mut out = Output::new(&mut buf);
        out.write_str("Hello ").unwrap();
        write!(out, "{}!", "World").unwrap();
        assert_eq!(buf, "Hello World!");
    }

    #[test]
    fn test_io_error_is_kept() {
        let mut wrapper = WriteWrapper {
            w: BrokenPipe,
            err: None,
        };
        let err = Output::new(&mut wrapper).write_str("x").unwrap_err();
        let err = wrapper.take_err(err);
        assert_eq!(err.kind(), ErrorKind::WriteFailure);
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "pipe closed");
    }
}
