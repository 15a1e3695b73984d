use std::{fmt, rc::Rc};

use common::Loc;
use futures::future::{self, FutureExt, LocalBoxFuture};
use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::resolve::{Resolve, ResolveError};

/// An external (non-theory) library a theory loads, such as a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Library {
    name: SmolStr,
    loc: Loc,
    private: bool,
}

impl Library {
    pub fn public(loc: Loc, name: &str) -> Self {
        Self {
            name: name.into(),
            loc,
            private: false,
        }
    }

    pub fn private(loc: Loc, name: &str) -> Self {
        Self {
            name: name.into(),
            loc,
            private: true,
        }
    }

    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    pub fn loc(&self) -> &Loc {
        &self.loc
    }

    pub fn is_private(&self) -> bool {
        self.private
    }
}

impl fmt::Display for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// The library database a scope resolves plugin names in.
///
/// Lookups may need external effects (reading installed metadata, building
/// something first), so they are asynchronous; a resolution waiting on one
/// is suspended until it completes.
pub trait LibraryDb {
    fn resolve_library(&self, loc: &Loc, name: &SmolStr)
        -> LocalBoxFuture<'static, Resolve<Rc<Library>>>;
}

/// An in-memory [`LibraryDb`].
#[derive(Debug, Default)]
pub struct LibraryTable {
    libraries: IndexMap<SmolStr, Rc<Library>>,
}

impl LibraryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, library: Library) -> Self {
        self.libraries
            .insert(library.name.clone(), Rc::new(library));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Rc<Library>> {
        self.libraries.get(name)
    }
}

impl LibraryDb for LibraryTable {
    fn resolve_library(
        &self,
        loc: &Loc,
        name: &SmolStr,
    ) -> LocalBoxFuture<'static, Resolve<Rc<Library>>> {
        let result = self
            .libraries
            .get(name)
            .cloned()
            .ok_or_else(|| ResolveError::user(loc, format!("Library \"{name}\" not found")));
        future::ready(result).boxed_local()
    }
}
