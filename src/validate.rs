//! Pre-flight input validation.
//!
//! Small, independent checks consumed before any workflow step runs;
//! everything here fails as [`Error::Usage`] so bad input never
//! reaches a collaborator.

use url::Url;

use crate::error::{Error, Result};
use crate::registry::Registry;

/// Runtime families the environment manager can provision.
pub const SUPPORTED_LANGUAGES: &[&str] = &["python", "nodejs"];

/// A parsed language token: runtime family plus optional version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    pub name: String,
    pub version: String,
}

impl Language {
    /// Splits a combined token into the leading alphabetic run (name)
    /// and the trailing numeric/dot run (version): `"python3.6"` →
    /// `python` + `3.6`, `"nodejs"` → `nodejs` + empty.
    pub fn parse(token: &str) -> Self {
        let name = token.chars().filter(|c| c.is_alphabetic()).collect();
        let version = token
            .chars()
            .filter(|c| c.is_numeric() || *c == '.')
            .collect();
        Self { name, version }
    }

    /// Environment-manager pin, e.g. `python=3.6`; bare name when no
    /// version was given.
    pub fn pin(&self) -> String {
        if self.version.is_empty() {
            self.name.clone()
        } else {
            format!("{}={}", self.name, self.version)
        }
    }
}

/// Fails unless `name` is free to use for a new sandbox.
pub fn verify_available_sandbox<'a>(registry: &Registry, name: &'a str) -> Result<&'a str> {
    if registry.contains_name(name) {
        return Err(Error::Usage(format!(
            "sandbox '{}' already exists, pick a new name",
            name
        )));
    }
    Ok(name)
}

/// Fails unless `name` refers to an existing sandbox.
pub fn verify_name_sandbox<'a>(registry: &Registry, name: &'a str) -> Result<&'a str> {
    if registry.contains_name(name) {
        return Ok(name);
    }
    Err(Error::Usage(format!(
        "sandbox '{}' does not exist, check the name",
        name
    )))
}

/// Fails unless `raw` is a well-formed URL.
pub fn verify_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::Usage(format!("'{}' is not a valid URL: {}", raw, e)))
}

/// Fails unless the token names a supported runtime family.
pub fn verify_language(token: &str) -> Result<Language> {
    let language = Language::parse(token);
    if !SUPPORTED_LANGUAGES.contains(&language.name.as_str()) {
        return Err(Error::Usage(format!(
            "unsupported language '{}', expected one of: {}",
            language.name,
            SUPPORTED_LANGUAGES.join(", ")
        )));
    }
    Ok(language)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Sandbox, SandboxRecord};
    use tempfile::TempDir;

    fn registry_with(names: &[&str]) -> (TempDir, Registry) {
        let dir = TempDir::new().unwrap();
        let mut registry = Registry::open(dir.path()).unwrap();
        for (i, name) in names.iter().enumerate() {
            registry
                .register(SandboxRecord {
                    id: 1000 + i as u32,
                    sandbox: Sandbox::new(*name, "python3.6"),
                })
                .unwrap();
        }
        (dir, registry)
    }

    #[test]
    fn language_parse_splits_name_and_version() {
        let language = Language::parse("python3.6");
        assert_eq!(language.name, "python");
        assert_eq!(language.version, "3.6");
    }

    #[test]
    fn language_parse_handles_versionless_tokens() {
        let language = Language::parse("nodejs");
        assert_eq!(language.name, "nodejs");
        assert_eq!(language.version, "");
        assert_eq!(language.pin(), "nodejs");
    }

    #[test]
    fn language_pin_joins_name_and_version() {
        assert_eq!(Language::parse("python3.6").pin(), "python=3.6");
    }

    #[test]
    fn verify_language_accepts_supported_families() {
        assert!(verify_language("python3.6").is_ok());
        assert!(verify_language("nodejs").is_ok());
    }

    #[test]
    fn verify_language_rejects_unsupported_families() {
        let err = verify_language("ruby2.7").unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
        assert!(err.to_string().contains("ruby"));
    }

    #[test]
    fn verify_url_accepts_well_formed_urls() {
        let url = verify_url("https://example.com/demo.git").unwrap();
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn verify_url_rejects_garbage() {
        assert!(matches!(
            verify_url("not a url").unwrap_err(),
            Error::Usage(_)
        ));
    }

    #[test]
    fn available_and_name_checks_are_complements() {
        let (_dir, registry) = registry_with(&["demo"]);

        assert!(verify_available_sandbox(&registry, "demo").is_err());
        assert!(verify_available_sandbox(&registry, "fresh").is_ok());

        assert!(verify_name_sandbox(&registry, "demo").is_ok());
        assert!(verify_name_sandbox(&registry, "fresh").is_err());
    }
}
