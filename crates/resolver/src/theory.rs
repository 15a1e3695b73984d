//! Resolution of theory references into linked [`Theory`] descriptors.

use std::{
    cell::OnceCell,
    fmt,
    rc::{Rc, Weak},
};

use camino::{Utf8Path, Utf8PathBuf};
use common::{Diagnostic, Loc, Package, ResolverConfig, TheoryId, TheoryName, Version};
use futures::FutureExt;
use indexmap::IndexMap;

use crate::{
    closure::top_closure,
    library::Library,
    memo::{Cycle, Memo, Runtime},
    resolve::{map_list, Resolve, ResolveError, ResolveExt},
    scope::{DbId, Found, LibDbId, Scopes, StanzaId},
    stanza::Stanza,
};

/// A resolved theory.
///
/// Dependencies are kept as [`Resolve`] values: a theory whose dependencies
/// fail still exists and is cached, and the failure is reported every time
/// they are forced.
pub struct Theory {
    id: TheoryId,
    scope: DbId,
    stanza: StanzaId,
    package: Option<Package>,
    boot_id: Option<TheoryId>,
    implicit: bool,
    use_stdlib: bool,
    src_root: Utf8PathBuf,
    obj_root: Utf8PathBuf,
    theories: Resolve<Vec<(Loc, Rc<Theory>)>>,
    libraries: Resolve<Vec<(Loc, Rc<Library>)>>,
    /// Strict dependencies in link order. `self` is appended on access so
    /// that the cache never points back at its owner.
    closure: OnceCell<Resolve<Vec<Rc<Theory>>>>,
}

impl Theory {
    pub fn id(&self) -> &TheoryId {
        &self.id
    }

    pub fn name(&self) -> &TheoryName {
        self.id.name()
    }

    /// The scope whose table declared this theory.
    pub fn scope(&self) -> DbId {
        self.scope
    }

    pub fn stanza_id(&self) -> StanzaId {
        self.stanza
    }

    pub fn package(&self) -> Option<&Package> {
        self.package.as_ref()
    }

    pub fn is_private(&self) -> bool {
        self.package.is_none()
    }

    pub fn boot_id(&self) -> Option<&TheoryId> {
        self.boot_id.as_ref()
    }

    /// True for the boot theory itself.
    pub fn is_implicit(&self) -> bool {
        self.implicit
    }

    pub fn use_stdlib(&self) -> bool {
        self.use_stdlib
    }

    pub fn src_root(&self) -> &Utf8Path {
        &self.src_root
    }

    pub fn obj_root(&self) -> &Utf8Path {
        &self.obj_root
    }

    /// Direct theory dependencies, the implicit boot theory first.
    pub fn theories(&self) -> &Resolve<Vec<(Loc, Rc<Theory>)>> {
        &self.theories
    }

    pub fn libraries(&self) -> &Resolve<Vec<(Loc, Rc<Library>)>> {
        &self.libraries
    }

    /// The boot theory this theory's closure is built on, counting a boot
    /// theory as its own.
    fn effective_boot(&self) -> Option<&TheoryId> {
        if self.implicit {
            Some(&self.id)
        } else {
            self.boot_id.as_ref()
        }
    }

    fn dependencies(&self) -> Resolve<Vec<Rc<Theory>>> {
        self.theories
            .as_ref()
            .map(|theories| theories.iter().map(|(_, theory)| theory.clone()).collect())
            .map_err(Clone::clone)
    }

    /// Every theory this one links against, dependencies before dependents,
    /// ending with the theory itself. Computed on first use.
    pub fn closure(self: &Rc<Self>) -> Resolve<Vec<Rc<Theory>>> {
        let strict = self.closure.get_or_init(|| {
            let mut closure = link_order(vec![self.clone()])?;
            closure.pop();
            Ok(closure)
        });

        let mut closure = strict.clone()?;
        closure.push(self.clone());
        Ok(closure)
    }

    /// The libraries loaded by the whole closure, in link order and without
    /// duplicates.
    pub fn library_closure(self: &Rc<Self>) -> Resolve<Vec<Rc<Library>>> {
        let mut libraries = IndexMap::new();
        for theory in self.closure()? {
            for (_, library) in theory.libraries.as_ref().map_err(Clone::clone)? {
                libraries
                    .entry(library.name().clone())
                    .or_insert_with(|| library.clone());
            }
        }
        Ok(libraries.into_values().collect())
    }
}

impl fmt::Debug for Theory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Theory")
            .field("id", &self.id)
            .field("package", &self.package)
            .field("boot_id", &self.boot_id)
            .field("implicit", &self.implicit)
            .field("use_stdlib", &self.use_stdlib)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Theory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Orders the closure of `roots`, dependencies first.
fn link_order(roots: Vec<Rc<Theory>>) -> Resolve<Vec<Rc<Theory>>> {
    top_closure(roots, |theory| Rc::as_ptr(theory), |theory| theory.dependencies())?.map_err(
        |cycle| {
            // Descriptors are built bottom-up, so a cycle here means one was
            // linked by hand.
            let path: Vec<_> = cycle.iter().map(|theory| theory.name().to_string()).collect();
            ResolveError::internal(format!(
                "Dependency cycle between theories: {}",
                path.join(" -> ")
            ))
        },
    )
}

/// Identifies one theory creation. Two references that end up at the same
/// declaration through the same scopes share a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CreateKey {
    scope: DbId,
    libs: LibDbId,
    dir: Utf8PathBuf,
    stanza: StanzaId,
}

struct Session {
    scopes: Rc<Scopes>,
    config: ResolverConfig,
    create: Memo<CreateKey, Resolve<Rc<Theory>>>,
}

/// A resolution session over a fixed set of scopes.
///
/// Every descriptor is created at most once per session, so resolving the
/// same declaration twice yields the same `Rc`.
#[derive(Clone)]
pub struct TheoryResolver(Rc<Session>);

impl TheoryResolver {
    pub fn new(scopes: Scopes, config: ResolverConfig) -> Self {
        let scopes = Rc::new(scopes);
        let runtime = Runtime::new();

        let session = Rc::new_cyclic(|session: &Weak<Session>| {
            let session = session.clone();
            let describe_scopes = scopes.clone();
            let create = Memo::create(
                &runtime,
                "create-theory",
                move |key: &CreateKey| match describe_scopes.stanza(key.stanza) {
                    Some(stanza) => stanza.name.to_string(),
                    None => format!("stanza #{}", key.stanza.index()),
                },
                move |key: CreateKey| {
                    let session = session.clone();
                    async move {
                        let Some(session) = session.upgrade() else {
                            return Err(ResolveError::internal(
                                "theory resolver dropped while a theory was being created",
                            ));
                        };
                        session.create_theory(key).await
                    }
                    .boxed_local()
                },
            );

            Session {
                scopes,
                config,
                create,
            }
        });

        Self(session)
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.0.config
    }

    pub fn scopes(&self) -> &Scopes {
        &self.0.scopes
    }

    /// Resolves the reference `name` at `loc`, looked up from scope `db` by
    /// a theory written against `lang_version`.
    ///
    /// The dependencies of the result are forced, so a failure anywhere in
    /// its closure fails the call.
    pub async fn resolve(
        &self,
        db: DbId,
        lang_version: &Version,
        loc: &Loc,
        name: &TheoryName,
    ) -> Resolve<Rc<Theory>> {
        let result = self.0.resolve(db, lang_version, loc, name).await;
        if let Err(err) = &result {
            tracing::warn!(target: "resolver", "failed to resolve theory {name}: {}", err.message());
        }
        result
    }

    /// Resolves several references in order, stopping at the first failure.
    pub async fn resolve_many(
        &self,
        db: DbId,
        lang_version: &Version,
        references: &[(Loc, TheoryName)],
    ) -> Resolve<Vec<Rc<Theory>>> {
        map_list(references, move |(loc, name)| {
            self.resolve(db, lang_version, loc, name)
        })
        .await
    }

    /// The link-ordered closure of all `references` together.
    pub async fn requires_closure(
        &self,
        db: DbId,
        lang_version: &Version,
        references: &[(Loc, TheoryName)],
    ) -> Resolve<Vec<Rc<Theory>>> {
        let roots = self.resolve_many(db, lang_version, references).await?;
        link_order(roots)
    }

    /// Number of theory creations started in this session.
    pub fn created(&self) -> usize {
        self.0.create.len()
    }
}

impl Session {
    async fn resolve(
        &self,
        db: DbId,
        lang_version: &Version,
        loc: &Loc,
        name: &TheoryName,
    ) -> Resolve<Rc<Theory>> {
        let theory = match self.scopes.find(db, name, self.config.redirect_limit)? {
            Found::NotFound => {
                return Err(ResolveError::user(loc, format!("Theory {name} not found")));
            }
            Found::Theory {
                via_redirect: true, ..
            } if *lang_version < self.config.composition_version => {
                let required = &self.config.composition_version;
                return Err(ResolveError::fail(
                    Diagnostic::at(loc, format!("Theory {name} not found in the current scope."))
                        .paragraph(format!(
                            "Upgrade the language version to {}.{} (or later) to enable scope \
                             composition.",
                            required.major, required.minor
                        )),
                ));
            }
            Found::Theory {
                scope,
                libs,
                dir,
                stanza,
                ..
            } => {
                self.create(
                    loc,
                    CreateKey {
                        scope,
                        libs,
                        dir,
                        stanza,
                    },
                )
                .await?
            }
        };

        theory.libraries.as_ref().map_err(Clone::clone)?;
        theory.theories.as_ref().map_err(Clone::clone)?;
        Ok(theory)
    }

    async fn create(&self, loc: &Loc, key: CreateKey) -> Resolve<Rc<Theory>> {
        match self.create.exec(key).await {
            Ok(result) => result,
            Err(cycle) => Err(cycle_error(loc, &cycle)),
        }
    }

    async fn create_theory(&self, key: CreateKey) -> Resolve<Rc<Theory>> {
        let Some(stanza) = self.scopes.stanza(key.stanza) else {
            return Err(ResolveError::internal(format!(
                "stanza #{} is not part of this session",
                key.stanza.index()
            )));
        };
        let id = TheoryId::new(key.dir.clone(), stanza.loc.clone(), stanza.name.clone());
        let boot_id = if stanza.boot {
            None
        } else {
            self.scopes.boot_id(key.scope).cloned()
        };
        let allow_private_deps = stanza.package.is_none();

        tracing::debug!(
            target: "resolver",
            boot = ?boot_id.as_ref().map(|boot| boot.name().dotted()),
            "creating {id}"
        );

        let libraries = self
            .resolve_libraries(&key, stanza, allow_private_deps)
            .await
            .push_frame(|| format!("while resolving {id}"));
        let theories = self
            .resolve_theories(&key, stanza, boot_id.as_ref(), allow_private_deps)
            .await
            .push_frame(|| format!("while resolving {id}"));

        Ok(Rc::new(Theory {
            id,
            scope: key.scope,
            stanza: key.stanza,
            package: stanza.package.clone(),
            boot_id,
            implicit: stanza.boot,
            use_stdlib: stanza.use_stdlib,
            src_root: key.dir.clone(),
            obj_root: key.dir,
            theories,
            libraries,
            closure: OnceCell::new(),
        }))
    }

    async fn resolve_libraries(
        &self,
        key: &CreateKey,
        stanza: &Stanza,
        allow_private_deps: bool,
    ) -> Resolve<Vec<(Loc, Rc<Library>)>> {
        let library_db = self.scopes.library_db(key.libs).cloned().ok_or_else(|| {
            ResolveError::internal(format!(
                "library database #{} is not part of this session",
                key.libs.index()
            ))
        })?;

        map_list(&stanza.plugins, |(loc, name)| {
            let resolved = library_db.resolve_library(loc, name);
            async move {
                let library = resolved.await?;
                if library.is_private() && !allow_private_deps {
                    return Err(ResolveError::fail(
                        Diagnostic::at(
                            loc,
                            format!(
                                "Library {name} is private, it cannot be a dependency of the \
                                 public theory {}.",
                                stanza.name
                            ),
                        )
                        .paragraph(format!("Associate {name} with a package.")),
                    ));
                }
                Ok((loc.clone(), library))
            }
        })
        .await
    }

    async fn resolve_theories(
        &self,
        key: &CreateKey,
        stanza: &Stanza,
        boot_id: Option<&TheoryId>,
        allow_private_deps: bool,
    ) -> Resolve<Vec<(Loc, Rc<Theory>)>> {
        // The boot reference goes through the full lookup, visibility rules
        // included, even when it is not used as a dependency.
        let boot = match boot_id {
            Some(boot_id) => Some(
                self.resolve(key.scope, &stanza.lang_version, &stanza.loc, boot_id.name())
                    .await?,
            ),
            None => None,
        };

        let mut theories = map_list(&stanza.theories, |(loc, name)| async move {
            let theory = self
                .resolve(key.scope, &stanza.lang_version, loc, name)
                .await?;

            // A public theory may still use private theories of its own scope.
            if theory.is_private() && theory.scope != key.scope && !allow_private_deps {
                return Err(ResolveError::fail(
                    Diagnostic::at(
                        loc,
                        format!(
                            "Theory {name} is private, it cannot be a dependency of the public \
                             theory {}.",
                            stanza.name
                        ),
                    )
                    .paragraph(format!("Associate {name} with a package.")),
                ));
            }
            check_boot(loc, boot_id, &theory)?;

            Ok((loc.clone(), theory))
        })
        .await?;

        if let Some(boot) = boot.filter(|_| stanza.use_stdlib) {
            theories.insert(0, (stanza.loc.clone(), boot));
        }
        Ok(theories)
    }
}

fn check_boot(loc: &Loc, ours: Option<&TheoryId>, dependency: &Theory) -> Resolve<()> {
    let (Some(ours), Some(theirs)) = (ours, dependency.effective_boot()) else {
        return Ok(());
    };
    if ours == theirs {
        return Ok(());
    }

    Err(ResolveError::fail(
        Diagnostic::at(
            loc,
            format!(
                "Theory {} has incompatible boot libraries.",
                dependency.name()
            ),
        )
        .paragraph(format!(
            "- {} is the boot library in scope, declared at {}",
            ours.name(),
            ours.loc()
        ))
        .paragraph(format!(
            "- {} is the boot library of {}, declared at {}",
            theirs.name(),
            dependency.name(),
            theirs.loc()
        )),
    ))
}

fn cycle_error(loc: &Loc, cycle: &Cycle) -> ResolveError {
    let path: Vec<_> = cycle
        .frames()
        .iter()
        .map(|frame| frame.description.as_str())
        .collect();
    ResolveError::user(
        loc,
        format!("Dependency cycle between theories: {}", path.join(" -> ")),
    )
}
