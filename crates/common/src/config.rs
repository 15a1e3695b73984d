use std::{fmt::Display, str::FromStr};

use smol_str::SmolStr;
use toml::Value;

use crate::input::{parse_lang_version, Version};

/// Redirect hops allowed when no configuration says otherwise.
pub const DEFAULT_REDIRECT_LIMIT: usize = 64;

/// Knobs of a resolution session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolverConfig {
    /// The first language version at which theories reached through a
    /// redirect (scope composition) are visible. Below it they are reported
    /// as hidden.
    pub composition_version: Version,
    /// Upper bound on redirect hops taken while looking a name up.
    pub redirect_limit: usize,
    pub diagnostics: Vec<ConfigDiagnostic>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            composition_version: Version::new(0, 4, 0),
            redirect_limit: DEFAULT_REDIRECT_LIMIT,
            diagnostics: vec![],
        }
    }
}

impl ResolverConfig {
    /// Reads the `[resolver]` table of a TOML document. Fields which are
    /// absent keep their defaults; fields with bad values are reported in
    /// `diagnostics` and also keep their defaults.
    pub fn parse(content: &str) -> Result<Self, <Value as FromStr>::Err> {
        let mut config = Self::default();
        let parsed: Value = content.parse()?;

        let Some(table) = parsed.get("resolver") else {
            return Ok(config);
        };
        let Some(table) = table.as_table() else {
            config.diagnostics.push(ConfigDiagnostic::UnexpectedTomlData {
                field: "resolver".into(),
                found: table.type_str().into(),
                expected: Some("table".into()),
            });
            return Ok(config);
        };

        for (key, value) in table {
            match key.as_str() {
                "composition_version" => {
                    match value.as_str().and_then(parse_lang_version) {
                        Some(version) => config.composition_version = version,
                        None => config
                            .diagnostics
                            .push(ConfigDiagnostic::InvalidVersion(value.to_string().into())),
                    }
                }
                "redirect_limit" => match value.as_integer() {
                    Some(limit) if limit > 0 => config.redirect_limit = limit as usize,
                    _ => config
                        .diagnostics
                        .push(ConfigDiagnostic::InvalidRedirectLimit(value.to_string().into())),
                },
                _ => config
                    .diagnostics
                    .push(ConfigDiagnostic::UnknownField(key.into())),
            }
        }

        Ok(config)
    }

    pub fn formatted_diagnostics(&self) -> Option<String> {
        if self.diagnostics.is_empty() {
            None
        } else {
            Some(
                self.diagnostics
                    .iter()
                    .map(|diag| format!("  {diag}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConfigDiagnostic {
    InvalidVersion(SmolStr),
    InvalidRedirectLimit(SmolStr),
    UnknownField(SmolStr),
    UnexpectedTomlData {
        field: SmolStr,
        found: SmolStr,
        expected: Option<SmolStr>,
    },
}

impl Display for ConfigDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidVersion(version) => {
                write!(f, "Invalid composition version {version}")
            }
            Self::InvalidRedirectLimit(limit) => {
                write!(f, "Invalid redirect limit {limit}, expected a positive integer")
            }
            Self::UnknownField(field) => write!(f, "Unknown resolver field \"{field}\""),
            Self::UnexpectedTomlData {
                field,
                found,
                expected,
            } => {
                if let Some(expected) = expected {
                    write!(
                        f,
                        "Expected a {expected} in field \"{field}\", but found a {found}"
                    )
                } else {
                    write!(f, "Unexpected {found} in field \"{field}\"")
                }
            }
        }
    }
}
