//! Curated issue templates keyed by Lighthouse audit id.
//!
//! The registry is built once at startup and only read afterwards, so one
//! instance can be shared by any number of concurrent scans.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sitefix_common::{Category, Severity};
use tracing::info;

/// Layout version this build understands.
pub const TEMPLATE_FORMAT_VERSION: u32 = 1;

const BUILTIN_TEMPLATES: &str = include_str!("../templates/issue_templates.toml");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueTemplate {
    pub category: Category,
    /// When absent, severity comes from the audit score.
    #[serde(default, rename = "severity", skip_serializing_if = "Option::is_none")]
    pub severity_override: Option<Severity>,
    pub title: String,
    pub why: String,
    pub how: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub impact: String,
}

/// Read-only lookup from audit id to template.
pub trait TemplateLookup: Send + Sync {
    fn lookup(&self, audit_id: &str) -> Option<&IssueTemplate>;
}

#[derive(Debug, Deserialize)]
struct TemplateFile {
    version: u32,
    #[serde(default)]
    templates: HashMap<String, IssueTemplate>,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    version: u32,
    templates: HashMap<String, IssueTemplate>,
}

impl TemplateRegistry {
    /// The table compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_TEMPLATES).context("Built-in issue templates are invalid")
    }

    /// Load from an override file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read issue templates from {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("Invalid issue templates in {}", path.display()))
    }

    /// The override file if one is configured, otherwise the built-in table.
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let registry = match override_path {
            Some(path) => Self::from_path(path)?,
            None => Self::builtin()?,
        };
        info!(
            version = registry.version,
            templates = registry.len(),
            source = %override_path.map(|p| p.display().to_string()).unwrap_or_else(|| "builtin".into()),
            "Issue templates loaded"
        );
        Ok(registry)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: TemplateFile = toml::from_str(raw)?;
        if file.version != TEMPLATE_FORMAT_VERSION {
            bail!(
                "unsupported template version {} (expected {TEMPLATE_FORMAT_VERSION})",
                file.version
            );
        }
        for (audit_id, template) in &file.templates {
            validate_template(audit_id, template)?;
        }
        Ok(Self {
            version: file.version,
            templates: file.templates,
        })
    }

    /// Build a registry directly, e.g. for tests.
    pub fn from_templates<I, K>(templates: I) -> Self
    where
        I: IntoIterator<Item = (K, IssueTemplate)>,
        K: Into<String>,
    {
        Self {
            version: TEMPLATE_FORMAT_VERSION,
            templates: templates.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateLookup for TemplateRegistry {
    fn lookup(&self, audit_id: &str) -> Option<&IssueTemplate> {
        self.templates.get(audit_id)
    }
}

/// Every text field a reader sees must be present.
fn validate_template(audit_id: &str, template: &IssueTemplate) -> Result<()> {
    let fields = [
        ("title", &template.title),
        ("why", &template.why),
        ("how", &template.how),
        ("impact", &template.impact),
    ];
    for (name, value) in fields {
        if value.trim().is_empty() {
            bail!("template '{audit_id}' has an empty {name}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_parses() {
        let registry = TemplateRegistry::builtin().unwrap();
        assert_eq!(registry.version(), TEMPLATE_FORMAT_VERSION);
        assert!(registry.len() > 20);
    }

    #[test]
    fn render_blocking_is_speed_medium() {
        let registry = TemplateRegistry::builtin().unwrap();
        let t = registry.lookup("render-blocking-resources").unwrap();
        assert_eq!(t.category, Category::Speed);
        assert_eq!(t.severity_override, Some(Severity::Medium));
        assert!(t.code.is_some());
    }

    #[test]
    fn override_is_optional() {
        let registry = TemplateRegistry::builtin().unwrap();
        let t = registry.lookup("offscreen-images").unwrap();
        assert_eq!(t.severity_override, None);
    }

    #[test]
    fn unknown_audit_has_no_template() {
        let registry = TemplateRegistry::builtin().unwrap();
        assert!(registry.lookup("unknown-audit").is_none());
    }

    #[test]
    fn rejects_other_versions() {
        let err = TemplateRegistry::from_toml_str("version = 2\n").unwrap_err();
        assert!(err.to_string().contains("unsupported template version"));
    }

    #[test]
    fn rejects_empty_text() {
        let raw = r#"
version = 1

[templates.document-title]
category = "seo"
title = "Page has no title"
why = ""
how = "Add a title."
impact = "Better rankings."
"#;
        let err = TemplateRegistry::from_toml_str(raw).unwrap_err();
        assert!(err.to_string().contains("empty why"));
    }

    #[test]
    fn rejects_unknown_category() {
        let raw = r#"
version = 1

[templates.x]
category = "performance"
title = "t"
why = "w"
how = "h"
impact = "i"
"#;
        assert!(TemplateRegistry::from_toml_str(raw).is_err());
    }

    #[test]
    fn missing_override_file_errors() {
        let err = TemplateRegistry::from_path(Path::new("/nonexistent/templates.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read issue templates"));
    }
}
