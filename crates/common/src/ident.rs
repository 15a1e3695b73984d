use std::{cmp::Ordering, fmt, hash, str::FromStr};

use camino::{Utf8Path, Utf8PathBuf};
use smol_str::SmolStr;

use crate::Loc;

/// A dotted theory name such as `Stdlib.Init`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TheoryName(Vec<SmolStr>);

impl TheoryName {
    pub fn segments(&self) -> &[SmolStr] {
        &self.0
    }

    /// The name as it is written in declarations.
    pub fn dotted(&self) -> String {
        self.0.join(".")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTheoryName(pub SmolStr);

impl fmt::Display for InvalidTheoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid theory name \"{}\"", self.0)
    }
}

impl std::error::Error for InvalidTheoryName {}

impl FromStr for TheoryName {
    type Err = InvalidTheoryName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<SmolStr> = s.split('.').map(SmolStr::new).collect();
        let valid = segments.iter().all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
                && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '\'')
        });

        if valid {
            Ok(Self(segments))
        } else {
            Err(InvalidTheoryName(s.into()))
        }
    }
}

impl fmt::Display for TheoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dotted())
    }
}

/// Uniquely identifies a theory by the directory declaring it and its name.
///
/// The declaration location is carried along for diagnostics only; it does
/// not participate in equality, hashing or ordering.
#[derive(Debug, Clone)]
pub struct TheoryId {
    dir: Utf8PathBuf,
    loc: Loc,
    name: TheoryName,
}

impl TheoryId {
    pub fn new(dir: impl Into<Utf8PathBuf>, loc: Loc, name: TheoryName) -> Self {
        Self {
            dir: dir.into(),
            loc,
            name,
        }
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    pub fn loc(&self) -> &Loc {
        &self.loc
    }

    pub fn name(&self) -> &TheoryName {
        &self.name
    }
}

impl PartialEq for TheoryId {
    fn eq(&self, other: &Self) -> bool {
        self.dir == other.dir && self.name == other.name
    }
}

impl Eq for TheoryId {}

impl hash::Hash for TheoryId {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.dir.hash(state);
        self.name.hash(state);
    }
}

impl PartialOrd for TheoryId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TheoryId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dir
            .cmp(&other.dir)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl fmt::Display for TheoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "theory {} in {}", self.name, self.dir)
    }
}
