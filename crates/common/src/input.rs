use std::fmt;

use smol_str::SmolStr;

/// A language version, as declared by a stanza (`(lang 0.4)` style markers
/// are read as `0.4.0`).
pub type Version = semver::Version;

/// Parses a `major.minor` language version marker. Full semver strings are
/// accepted as well.
pub fn parse_lang_version(s: &str) -> Option<Version> {
    match s.split('.').count() {
        2 => format!("{s}.0").parse().ok(),
        _ => s.parse().ok(),
    }
}

/// The package a theory is installed with. Opaque to the resolver beyond its
/// presence: a theory with a package is public, one without is private.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Package(SmolStr);

impl Package {
    pub fn new(name: &str) -> Self {
        Self(SmolStr::new(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
