use common::{Loc, Package, TheoryName, Version};
use smol_str::SmolStr;

/// A theory as declared, before any of its references are resolved.
///
/// Stanzas come from the configuration layer and are only read here. Once
/// added to a [`Scopes`](crate::Scopes) arena they are identified by their
/// [`StanzaId`](crate::StanzaId), never by their contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stanza {
    pub name: TheoryName,
    pub loc: Loc,
    /// `None` makes the theory private.
    pub package: Option<Package>,
    /// Marks the boot theory: the one every other theory of the scope
    /// implicitly builds on.
    pub boot: bool,
    pub theories: Vec<(Loc, TheoryName)>,
    /// Library-kind dependencies.
    pub plugins: Vec<(Loc, SmolStr)>,
    pub lang_version: Version,
    /// Whether the boot theory is an implicit dependency.
    pub use_stdlib: bool,
}

impl Stanza {
    pub fn new(loc: Loc, name: TheoryName, lang_version: Version) -> Self {
        Self {
            name,
            loc,
            package: None,
            boot: false,
            theories: vec![],
            plugins: vec![],
            lang_version,
            use_stdlib: true,
        }
    }

    pub fn package(mut self, package: Package) -> Self {
        self.package = Some(package);
        self
    }

    pub fn boot(mut self) -> Self {
        self.boot = true;
        self
    }

    pub fn theory(mut self, loc: Loc, name: TheoryName) -> Self {
        self.theories.push((loc, name));
        self
    }

    pub fn plugin(mut self, loc: Loc, name: &str) -> Self {
        self.plugins.push((loc, name.into()));
        self
    }

    pub fn use_stdlib(mut self, use_stdlib: bool) -> Self {
        self.use_stdlib = use_stdlib;
        self
    }
}
