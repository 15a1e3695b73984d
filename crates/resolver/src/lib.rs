//! Resolution of theory references across scoped declaration tables.
//!
//! A session starts from a [`Scopes`] arena describing what each scope
//! declares, and is driven through a [`TheoryResolver`]. Resolved theories are
//! shared, immutable [`Theory`] descriptors carrying their dependencies and
//! link-order closure.

pub mod closure;
pub mod library;
pub mod memo;
pub mod resolve;
pub mod scope;
pub mod stanza;
pub mod theory;

pub use library::{Library, LibraryDb, LibraryTable};
pub use resolve::{Resolve, ResolveError, ResolveExt};
pub use scope::{DbId, Entry, Found, LibDbId, Lookup, ScopeError, Scopes, StanzaId};
pub use stanza::Stanza;
pub use theory::{Theory, TheoryResolver};
