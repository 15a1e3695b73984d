#![allow(dead_code)]

use std::rc::Rc;

use common::{Loc, ResolverConfig, TheoryName, Version};
use futures::executor::block_on;
use theoria_resolver::{
    DbId, Entry, LibDbId, LibraryDb, LibraryTable, Resolve, Scopes, Stanza, StanzaId, Theory,
    TheoryResolver,
};

pub const FILE: &str = "dune";

pub fn name(s: &str) -> TheoryName {
    s.parse().unwrap()
}

pub fn loc(line: u32) -> Loc {
    Loc::on_line(FILE, line, 1, 8)
}

pub fn lang() -> Version {
    Version::new(0, 8, 0)
}

/// A declaration of `name` at line `line`.
pub fn decl(name_: &str, line: u32) -> Stanza {
    Stanza::new(loc(line), name(name_), lang())
}

/// Directory a test theory is declared in.
pub fn dir_of(stanza: &Stanza) -> String {
    format!("theories/{}", stanza.name.dotted().to_lowercase())
}

pub struct TestScopes {
    pub scopes: Scopes,
    pub libs: LibDbId,
}

impl TestScopes {
    pub fn new() -> Self {
        Self::with_libraries(LibraryTable::new())
    }

    pub fn with_libraries(libraries: impl LibraryDb + 'static) -> Self {
        let mut scopes = Scopes::new();
        let libs = scopes.add_library_db(libraries);
        Self { scopes, libs }
    }

    /// Adds `stanza` and returns the entry declaring it in a scope.
    pub fn declare(&mut self, stanza: Stanza) -> (StanzaId, Entry) {
        let dir = dir_of(&stanza);
        (self.scopes.add_stanza(stanza), Entry::Theory(dir.into()))
    }

    pub fn scope(
        &mut self,
        parent: Option<DbId>,
        entries: impl IntoIterator<Item = (StanzaId, Entry)>,
    ) -> DbId {
        self.scopes.build_db(parent, self.libs, entries).unwrap()
    }

    /// A root scope declaring every stanza.
    pub fn root(&mut self, stanzas: impl IntoIterator<Item = Stanza>) -> DbId {
        let entries: Vec<_> = stanzas.into_iter().map(|stanza| self.declare(stanza)).collect();
        self.scope(None, entries)
    }

    pub fn resolver(self) -> TheoryResolver {
        self.resolver_with(ResolverConfig::default())
    }

    pub fn resolver_with(self, config: ResolverConfig) -> TheoryResolver {
        TheoryResolver::new(self.scopes, config)
    }
}

/// Resolves `name` from `db` as referenced at line 100.
pub fn resolve(resolver: &TheoryResolver, db: DbId, name_: &str) -> Resolve<Rc<Theory>> {
    block_on(resolver.resolve(db, &lang(), &loc(100), &name(name_)))
}

pub fn names(theories: &[Rc<Theory>]) -> Vec<String> {
    theories
        .iter()
        .map(|theory| theory.name().to_string())
        .collect()
}

pub fn closure_names(theory: &Rc<Theory>) -> Vec<String> {
    names(&theory.closure().unwrap())
}
