//! The result type of resolution.
//!
//! A [`Resolve`] is an ordinary `Result`, so binding is `?` and mapping is
//! `Result::map`. What this module adds is the error side: a structured
//! [`Diagnostic`] plus a stack of "while resolving" frames that grows as a
//! failure crosses theory boundaries on its way out.

use std::{fmt, future::Future, rc::Rc};

use common::{Diagnostic, Loc};

pub type Resolve<T> = Result<T, ResolveError>;

/// A resolution failure. Cheap to clone; memoized results share it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveError(Rc<ErrorData>);

#[derive(Debug, PartialEq, Eq)]
struct ErrorData {
    diagnostic: Diagnostic,
    frames: Vec<String>,
}

impl ResolveError {
    pub fn fail(diagnostic: Diagnostic) -> Self {
        Self(Rc::new(ErrorData {
            diagnostic,
            frames: vec![],
        }))
    }

    /// A user error at `loc`.
    pub fn user(loc: &Loc, message: impl Into<String>) -> Self {
        Self::fail(Diagnostic::at(loc, message))
    }

    /// A violated internal invariant. Still a value, never a panic.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::fail(Diagnostic::new(message).needs_stack_trace())
    }

    pub fn diagnostic(&self) -> &Diagnostic {
        &self.0.diagnostic
    }

    /// Context frames, innermost first.
    pub fn frames(&self) -> &[String] {
        &self.0.frames
    }

    pub fn message(&self) -> &str {
        self.0.diagnostic.message()
    }

    fn with_frame(self, frame: String) -> Self {
        let mut frames = self.0.frames.clone();
        frames.push(frame);
        Self(Rc::new(ErrorData {
            diagnostic: self.0.diagnostic.clone(),
            frames,
        }))
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.diagnostic)?;
        for frame in self.frames() {
            write!(f, "\n-> {frame}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ResolveError {}

pub trait ResolveExt {
    /// Adds a context frame to a failure; successes pass through.
    fn push_frame<F, S>(self, frame: F) -> Self
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResolveExt for Resolve<T> {
    fn push_frame<F, S>(self, frame: F) -> Self
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|err| err.with_frame(frame().into()))
    }
}

/// Collects every success in input order, stopping at the first failure.
pub fn all<T>(items: impl IntoIterator<Item = Resolve<T>>) -> Resolve<Vec<T>> {
    items.into_iter().collect()
}

/// Applies an asynchronous resolution to each item in order.
///
/// Items are resolved one after another so that, when several fail, the
/// reported failure is always the first one in input order.
pub async fn map_list<I, T, F, Fut>(items: I, mut f: F) -> Resolve<Vec<T>>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Resolve<T>>,
{
    let items = items.into_iter();
    let mut resolved = Vec::with_capacity(items.size_hint().0);
    for item in items {
        resolved.push(f(item).await?);
    }
    Ok(resolved)
}
