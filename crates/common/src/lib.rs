pub mod config;
pub mod diagnostics;
pub mod ident;
pub mod input;
pub mod loc;

pub use config::ResolverConfig;
pub use diagnostics::Diagnostic;
pub use ident::{TheoryId, TheoryName};
pub use input::{Package, Version};
pub use loc::Loc;
