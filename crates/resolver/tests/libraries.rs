mod test_db;

use std::{cell::Cell, rc::Rc};

use common::{Loc, Package};
use futures::{
    channel::oneshot,
    executor::block_on,
    future::{join3, FutureExt, LocalBoxFuture, Shared},
};
use smol_str::SmolStr;
use test_db::{decl, lang, loc, name, resolve, TestScopes};
use theoria_resolver::{Library, LibraryDb, LibraryTable, Resolve, ResolveError};

/// Holds every lookup until the gate opens.
struct GatedLibraries {
    gate: Shared<oneshot::Receiver<()>>,
    lookups: Rc<Cell<usize>>,
}

impl LibraryDb for GatedLibraries {
    fn resolve_library(
        &self,
        loc: &Loc,
        name: &SmolStr,
    ) -> LocalBoxFuture<'static, Resolve<Rc<Library>>> {
        self.lookups.set(self.lookups.get() + 1);
        let gate = self.gate.clone();
        let loc = loc.clone();
        let name = name.clone();
        async move {
            if gate.await.is_err() {
                return Err(ResolveError::user(&loc, "library lookup cancelled"));
            }
            Ok(Rc::new(Library::public(loc, &name)))
        }
        .boxed_local()
    }
}

#[test]
fn suspended_creation_is_shared() {
    let (open, gate) = oneshot::channel();
    let lookups = Rc::new(Cell::new(0));
    let mut scopes = TestScopes::with_libraries(GatedLibraries {
        gate: gate.shared(),
        lookups: lookups.clone(),
    });
    let db = scopes.root([
        decl("Tactics", 1).plugin(loc(2), "tactics_plugin"),
        decl("A", 3).theory(loc(4), name("Tactics")),
        decl("B", 5).theory(loc(6), name("Tactics")),
    ]);
    let resolver = scopes.resolver();

    let version = lang();
    let (a, b, ()) = block_on(join3(
        resolver.resolve(db, &version, &loc(10), &name("A")),
        resolver.resolve(db, &version, &loc(11), &name("B")),
        async move {
            open.send(()).unwrap();
        },
    ));

    let (a, b) = (a.unwrap(), b.unwrap());
    let tactics = |theory: &Rc<theoria_resolver::Theory>| {
        theory.theories().as_ref().unwrap()[0].1.clone()
    };
    assert!(Rc::ptr_eq(&tactics(&a), &tactics(&b)));
    assert_eq!(lookups.get(), 1);
    assert_eq!(resolver.created(), 3);
}

#[test]
fn private_library_needs_a_private_theory() {
    let libraries = LibraryTable::new()
        .with(Library::private(Loc::none(), "ltac2_plugin"))
        .with(Library::public(Loc::none(), "zify_plugin"));
    let mut scopes = TestScopes::with_libraries(libraries);
    let db = scopes.root([
        decl("Public", 1)
            .package(Package::new("pub"))
            .plugin(loc(2), "zify_plugin")
            .plugin(loc(3), "ltac2_plugin"),
        decl("Private", 4).plugin(loc(5), "ltac2_plugin"),
    ]);
    let resolver = scopes.resolver();

    let err = resolve(&resolver, db, "Public").unwrap_err();
    assert_eq!(
        err.diagnostic().paragraphs,
        [
            "Library ltac2_plugin is private, it cannot be a dependency of the public theory \
             Public.",
            "Associate ltac2_plugin with a package.",
        ]
    );
    assert_eq!(err.diagnostic().loc, Some(loc(3)));
    assert_eq!(err.frames(), &["while resolving theory Public in theories/public"]);

    let private = resolve(&resolver, db, "Private").unwrap();
    let libraries = private.libraries().as_ref().unwrap();
    assert_eq!(libraries.len(), 1);
    assert!(libraries[0].1.is_private());
}

#[test]
fn missing_library() {
    let mut scopes = TestScopes::new();
    let db = scopes.root([decl("A", 1).plugin(loc(2), "zify_plugin")]);
    let resolver = scopes.resolver();

    let err = resolve(&resolver, db, "A").unwrap_err();
    assert_eq!(err.message(), "Library \"zify_plugin\" not found");
    assert_eq!(err.diagnostic().loc, Some(loc(2)));
}

#[test]
fn library_closure_follows_link_order() {
    let libraries = LibraryTable::new()
        .with(Library::public(Loc::none(), "ltac_plugin"))
        .with(Library::public(Loc::none(), "zify_plugin"))
        .with(Library::public(Loc::none(), "micromega_plugin"));
    let mut scopes = TestScopes::with_libraries(libraries);
    let db = scopes.root([
        decl("Init", 1).boot().plugin(loc(2), "ltac_plugin"),
        decl("Zify", 3).plugin(loc(4), "zify_plugin"),
        decl("Lia", 5)
            .theory(loc(6), name("Zify"))
            .plugin(loc(7), "micromega_plugin")
            .plugin(loc(8), "zify_plugin"),
    ]);
    let resolver = scopes.resolver();

    let lia = resolve(&resolver, db, "Lia").unwrap();
    let names: Vec<_> = lia
        .library_closure()
        .unwrap()
        .iter()
        .map(|library| library.name().to_string())
        .collect();
    assert_eq!(names, ["ltac_plugin", "zify_plugin", "micromega_plugin"]);
}
