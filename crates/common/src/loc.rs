use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};

/// A line/column position inside a declaration file. Both are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// The source location of a declaration or of a reference to one.
///
/// Locations are metadata: they are carried into diagnostics but never take
/// part in identity comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Loc(Option<LocData>);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct LocData {
    file: Utf8PathBuf,
    start: Position,
    stop: Position,
}

impl Loc {
    pub fn new(file: impl Into<Utf8PathBuf>, start: Position, stop: Position) -> Self {
        Self(Some(LocData {
            file: file.into(),
            start,
            stop,
        }))
    }

    /// A location spanning a single line, from `column` to `column + len`.
    pub fn on_line(file: impl Into<Utf8PathBuf>, line: u32, column: u32, len: u32) -> Self {
        Self::new(
            file,
            Position::new(line, column),
            Position::new(line, column + len),
        )
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn file(&self) -> Option<&Utf8Path> {
        self.0.as_ref().map(|data| data.file.as_path())
    }

    pub fn start(&self) -> Option<Position> {
        self.0.as_ref().map(|data| data.start)
    }

    pub fn stop(&self) -> Option<Position> {
        self.0.as_ref().map(|data| data.stop)
    }
}

impl Default for Loc {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            None => write!(f, "<none>"),
            Some(LocData { file, start, stop }) if start.line == stop.line => write!(
                f,
                "{file}:{}:{}-{}",
                start.line, start.column, stop.column
            ),
            Some(LocData { file, start, stop }) => write!(
                f,
                "{file}:{}:{}-{}:{}",
                start.line, start.column, stop.line, stop.column
            ),
        }
    }
}
