use std::fmt;

use crate::Loc;

/// A user-facing message produced by resolution.
///
/// The presentation layer decides how to render it; the core only builds
/// these values and never prints them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub paragraphs: Vec<String>,
    pub loc: Option<Loc>,
    /// Set for violated internal invariants, as opposed to user errors.
    pub needs_stack_trace: bool,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            paragraphs: vec![message.into()],
            loc: None,
            needs_stack_trace: false,
        }
    }

    /// A diagnostic attached to `loc`. A `Loc::none()` is dropped.
    pub fn at(loc: &Loc, message: impl Into<String>) -> Self {
        Self::new(message).with_loc(loc)
    }

    pub fn with_loc(mut self, loc: &Loc) -> Self {
        self.loc = (!loc.is_none()).then(|| loc.clone());
        self
    }

    pub fn paragraph(mut self, text: impl Into<String>) -> Self {
        self.paragraphs.push(text.into());
        self
    }

    pub fn needs_stack_trace(mut self) -> Self {
        self.needs_stack_trace = true;
        self
    }

    /// The first paragraph.
    pub fn message(&self) -> &str {
        self.paragraphs.first().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(loc) = &self.loc {
            writeln!(f, "{loc}:")?;
        }
        if self.needs_stack_trace {
            write!(f, "Internal error: ")?;
        } else {
            write!(f, "Error: ")?;
        }
        for (idx, paragraph) in self.paragraphs.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{paragraph}")?;
        }
        Ok(())
    }
}
