//! Scoped theory databases.
//!
//! A [`Scopes`] arena holds every scope node, stanza and library database of
//! a session. Scope nodes form a tree through their parents. Each node answers
//! name lookups with a [`Lookup`]: a theory it declares, a redirect to another
//! node, or nothing, in which case the parent is asked.

use std::{fmt, rc::Rc};

use camino::Utf8PathBuf;
use common::{config::DEFAULT_REDIRECT_LIMIT, Loc, TheoryId, TheoryName};
use id_arena::{Arena, Id};
use indexmap::{map::Entry as MapEntry, IndexMap};

use crate::{
    library::LibraryDb,
    resolve::{Resolve, ResolveError},
    stanza::Stanza,
};

pub type DbId = Id<Db>;
pub type StanzaId = Id<Stanza>;
pub type LibDbId = Id<Rc<dyn LibraryDb>>;

/// The answer of a single scope node to a name lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Theory {
        libs: LibDbId,
        dir: Utf8PathBuf,
        stanza: StanzaId,
    },
    Redirect(DbId),
    NotFound,
}

/// How a declaration takes part in a scope built by [`Scopes::build_db`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// Declared in `dir` by this scope.
    Theory(Utf8PathBuf),
    /// Declared elsewhere; lookups continue in the given scope.
    Redirect(DbId),
}

/// The result of walking the scope chain for a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Found {
    Theory {
        /// The scope whose table answered.
        scope: DbId,
        libs: LibDbId,
        dir: Utf8PathBuf,
        stanza: StanzaId,
        /// At least one redirect was followed to get here.
        via_redirect: bool,
    },
    NotFound,
}

type ResolveFn = Box<dyn Fn(&TheoryName) -> Lookup>;

pub struct Db {
    parent: Option<DbId>,
    boot_id: Option<TheoryId>,
    resolve: ResolveFn,
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("parent", &self.parent)
            .field("boot_id", &self.boot_id)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct Scopes {
    dbs: Arena<Db>,
    stanzas: Arena<Stanza>,
    library_dbs: Arena<Rc<dyn LibraryDb>>,
}

impl Scopes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stanza(&mut self, stanza: Stanza) -> StanzaId {
        self.stanzas.alloc(stanza)
    }

    pub fn add_library_db(&mut self, db: impl LibraryDb + 'static) -> LibDbId {
        self.library_dbs.alloc(Rc::new(db))
    }

    /// The id the next scope node will get, so that a scope can redirect to
    /// itself or to a scope which is built later.
    pub fn next_db_id(&self) -> DbId {
        self.dbs.next_id()
    }

    /// Adds a scope node answering lookups with `resolve`.
    pub fn add_db(
        &mut self,
        parent: Option<DbId>,
        boot_id: Option<TheoryId>,
        resolve: impl Fn(&TheoryName) -> Lookup + 'static,
    ) -> Result<DbId, ScopeError> {
        // Parents must already exist, which keeps the parent links a tree.
        if let Some(parent) = parent {
            if self.dbs.get(parent).is_none() {
                return Err(ScopeError::UnknownParent(parent));
            }
        }

        Ok(self.dbs.alloc(Db {
            parent,
            boot_id,
            resolve: Box::new(resolve),
        }))
    }

    /// Builds a scope node from flat declarations.
    ///
    /// Theories declared directly resolve their plugins in `libs`. Duplicate
    /// names and more than one boot theory are configuration errors and are
    /// reported right away. A boot theory declared through a redirect is
    /// looked up now, so that the scope registers where it lives.
    pub fn build_db(
        &mut self,
        parent: Option<DbId>,
        libs: LibDbId,
        entries: impl IntoIterator<Item = (StanzaId, Entry)>,
    ) -> Result<DbId, ScopeError> {
        if self.library_dbs.get(libs).is_none() {
            return Err(ScopeError::UnknownLibraryDb(libs));
        }

        let mut table: IndexMap<TheoryName, (StanzaId, &Stanza, Entry)> = IndexMap::new();
        let mut duplicates: IndexMap<TheoryName, Vec<Loc>> = IndexMap::new();

        for (stanza_id, entry) in entries {
            let stanza = self
                .stanzas
                .get(stanza_id)
                .ok_or(ScopeError::UnknownStanza(stanza_id))?;
            match table.entry(stanza.name.clone()) {
                MapEntry::Vacant(vacant) => {
                    vacant.insert((stanza_id, stanza, entry));
                }
                MapEntry::Occupied(occupied) => {
                    let first = occupied.get().1;
                    duplicates
                        .entry(stanza.name.clone())
                        .or_insert_with(|| vec![first.loc.clone()])
                        .push(stanza.loc.clone());
                }
            }
        }

        if let Some((name, locs)) = duplicates.into_iter().next() {
            return Err(ScopeError::DuplicateTheory { name, locs });
        }

        let boots: Vec<_> = table
            .values()
            .filter(|(_, stanza, _)| stanza.boot)
            .collect();
        let boot_id = match boots.as_slice() {
            [] => None,
            [(_, stanza, entry)] => Some(self.boot_theory_id(stanza, entry)?),
            _ => {
                return Err(ScopeError::MultipleBootTheories(
                    boots
                        .iter()
                        .map(|(_, stanza, _)| (stanza.name.clone(), stanza.loc.clone()))
                        .collect(),
                ));
            }
        };

        tracing::trace!(
            target: "resolver",
            "building scope with {} theories, boot: {:?}",
            table.len(),
            boot_id.as_ref().map(ToString::to_string)
        );

        let table: IndexMap<TheoryName, (StanzaId, Entry)> = table
            .into_iter()
            .map(|(name, (stanza_id, _, entry))| (name, (stanza_id, entry)))
            .collect();

        self.add_db(parent, boot_id, move |name| match table.get(name) {
            Some((stanza, Entry::Theory(dir))) => Lookup::Theory {
                libs,
                dir: dir.clone(),
                stanza: *stanza,
            },
            Some((_, Entry::Redirect(db))) => Lookup::Redirect(*db),
            None => Lookup::NotFound,
        })
    }

    fn boot_theory_id(&self, stanza: &Stanza, entry: &Entry) -> Result<TheoryId, ScopeError> {
        let dir = match entry {
            Entry::Theory(dir) => dir.clone(),
            Entry::Redirect(target) => {
                match self.find(*target, &stanza.name, DEFAULT_REDIRECT_LIMIT) {
                    Ok(Found::Theory { dir, .. }) => dir,
                    Ok(Found::NotFound) | Err(_) => {
                        return Err(ScopeError::UnresolvedBootTheory {
                            name: stanza.name.clone(),
                            loc: stanza.loc.clone(),
                        });
                    }
                }
            }
        };
        Ok(TheoryId::new(dir, stanza.loc.clone(), stanza.name.clone()))
    }

    pub fn stanza(&self, id: StanzaId) -> Option<&Stanza> {
        self.stanzas.get(id)
    }

    pub fn library_db(&self, id: LibDbId) -> Option<&Rc<dyn LibraryDb>> {
        self.library_dbs.get(id)
    }

    pub fn parent(&self, db: DbId) -> Option<DbId> {
        self.dbs.get(db).and_then(|node| node.parent)
    }

    /// The boot theory registered by `db` or by its nearest ancestor.
    pub fn boot_id(&self, db: DbId) -> Option<&TheoryId> {
        let mut current = Some(db);
        while let Some(db) = current {
            let node = self.dbs.get(db)?;
            if let Some(boot_id) = &node.boot_id {
                return Some(boot_id);
            }
            current = node.parent;
        }
        None
    }

    /// Walks the scope chain from `db` looking for `name`.
    ///
    /// Redirects are followed in place; `NotFound` moves on to the parent of
    /// the scope that answered it. More than `redirect_limit` redirects is
    /// treated as a redirect loop and fails instead of walking forever.
    pub fn find(
        &self,
        db: DbId,
        name: &TheoryName,
        redirect_limit: usize,
    ) -> Resolve<Found> {
        let mut current = db;
        let mut redirects = 0;

        loop {
            let node = self.dbs.get(current).ok_or_else(|| {
                ResolveError::internal(format!(
                    "scope #{} does not exist (looking up theory {name})",
                    current.index()
                ))
            })?;

            match (node.resolve)(name) {
                Lookup::Theory { libs, dir, stanza } => {
                    tracing::trace!(target: "resolver", "found {name} in scope #{}", current.index());
                    return Ok(Found::Theory {
                        scope: current,
                        libs,
                        dir,
                        stanza,
                        via_redirect: redirects > 0,
                    });
                }
                Lookup::Redirect(target) => {
                    redirects += 1;
                    if redirects > redirect_limit {
                        return Err(ResolveError::internal(format!(
                            "Redirect loop while looking up theory {name}: gave up after \
                             {redirect_limit} redirects, last at scope #{}",
                            current.index()
                        )));
                    }
                    current = target;
                }
                Lookup::NotFound => match node.parent {
                    Some(parent) => current = parent,
                    None => return Ok(Found::NotFound),
                },
            }
        }
    }
}

/// A malformed scope. These are reported as soon as the scope is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    DuplicateTheory { name: TheoryName, locs: Vec<Loc> },
    MultipleBootTheories(Vec<(TheoryName, Loc)>),
    /// A boot theory declared through a redirect that leads nowhere.
    UnresolvedBootTheory { name: TheoryName, loc: Loc },
    UnknownParent(DbId),
    UnknownStanza(StanzaId),
    UnknownLibraryDb(LibDbId),
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateTheory { name, locs } => {
                write!(f, "Theory {name} is defined more than once:")?;
                for loc in locs {
                    write!(f, "\n- {loc}")?;
                }
                Ok(())
            }
            Self::MultipleBootTheories(boots) => {
                write!(f, "Cannot have more than one boot theory in scope:")?;
                for (name, loc) in boots {
                    write!(f, "\n- {name} at {loc}")?;
                }
                Ok(())
            }
            Self::UnresolvedBootTheory { name, loc } => {
                write!(f, "Boot theory {name} declared at {loc} cannot be found")
            }
            Self::UnknownParent(parent) => {
                write!(f, "parent scope #{} does not exist", parent.index())
            }
            Self::UnknownStanza(stanza) => {
                write!(f, "stanza #{} was not added to these scopes", stanza.index())
            }
            Self::UnknownLibraryDb(libs) => {
                write!(f, "library database #{} was not added to these scopes", libs.index())
            }
        }
    }
}

impl std::error::Error for ScopeError {}
