//! Turns one raw Lighthouse report into an ordered list of issues.
//!
//! Pure: no I/O, and the same report always yields the same issues in the
//! report's own audit order. Audits with a null score or a score of at least
//! [`PASSING_SCORE`] are passing and never become issues, template or not.

use std::collections::HashMap;
use std::sync::LazyLock;

use pagespeed_client::{Audit, RawAuditReport};
use regex::Regex;
use sitefix_common::{Category, Issue, Severity};

use crate::templates::{IssueTemplate, TemplateLookup};

pub const PASSING_SCORE: f64 = 0.9;

const FALLBACK_TITLE: &str = "Performance issue";
const GENERIC_WHY: &str = "This issue is slowing your site or making it harder to use. Fixing it will improve user experience and rankings.";
const FALLBACK_HOW: &str = "Follow Lighthouse recommendations to resolve this audit.";
const GENERIC_IMPACT: &str = "Faster load times and improved scores.";

/// `[text](url)` markdown links.
static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("valid regex"));

/// How one failing audit becomes an issue, decided by a single lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution<'a> {
    TemplateMatch(&'a IssueTemplate),
    HeuristicFallback,
}

impl<'a> Resolution<'a> {
    pub fn for_audit(audit_id: &str, templates: &'a dyn TemplateLookup) -> Self {
        match templates.lookup(audit_id) {
            Some(template) => Resolution::TemplateMatch(template),
            None => Resolution::HeuristicFallback,
        }
    }

    /// Build the issue for a failing audit with the given score. `audit_id`
    /// is the id the audit was resolved under, used for the category lookup.
    pub fn into_issue(
        self,
        audit_id: &str,
        audit: &Audit,
        score: f64,
        categories: &HashMap<&str, Category>,
    ) -> Issue {
        match self {
            Resolution::TemplateMatch(template) => Issue {
                title: template.title.clone(),
                category: template.category,
                severity: template
                    .severity_override
                    .unwrap_or_else(|| Severity::from_score(Some(score))),
                why: template.why.clone(),
                how: template.how.clone(),
                code: template.code.clone(),
                impact: template.impact.clone(),
            },
            Resolution::HeuristicFallback => Issue {
                title: if audit.title.is_empty() {
                    FALLBACK_TITLE.to_string()
                } else {
                    audit.title.clone()
                },
                category: categories
                    .get(audit_id)
                    .copied()
                    .unwrap_or(Category::Speed),
                severity: Severity::from_score(Some(score)),
                why: GENERIC_WHY.to_string(),
                how: audit
                    .description
                    .as_deref()
                    .map(strip_links)
                    .filter(|how| !how.is_empty())
                    .unwrap_or_else(|| FALLBACK_HOW.to_string()),
                code: None,
                impact: GENERIC_IMPACT.to_string(),
            },
        }
    }
}

/// Extract issues from a report, in the report's audit order.
pub fn extract(report: &RawAuditReport, templates: &dyn TemplateLookup) -> Vec<Issue> {
    let categories = audit_categories(report);

    report
        .lighthouse_result
        .audits
        .iter()
        .filter_map(|(key, audit)| {
            let score = audit.score.filter(|s| *s < PASSING_SCORE)?;
            let audit_id = if audit.id.is_empty() { key } else { audit.id.as_str() };
            Some(Resolution::for_audit(audit_id, templates).into_issue(
                audit_id,
                audit,
                score,
                &categories,
            ))
        })
        .collect()
}

/// Audit id -> issue category, from the report's category audit refs.
/// Categories outside the four audited ones are ignored. If an audit is
/// referenced by several, the last one wins.
fn audit_categories(report: &RawAuditReport) -> HashMap<&str, Category> {
    let mut map = HashMap::new();
    for (category_id, category) in report.lighthouse_result.categories.iter() {
        let Some(mapped) = Category::from_lighthouse(category_id) else {
            continue;
        };
        for audit_ref in &category.audit_refs {
            map.insert(audit_ref.id.as_str(), mapped);
        }
    }
    map
}

/// Rewrite `[text](url)` to `text` and trim.
pub fn strip_links(text: &str) -> String {
    MARKDOWN_LINK.replace_all(text, "$1").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::TemplateRegistry;
    use crate::testing::ReportBuilder;

    fn template(category: Category, severity: Option<Severity>) -> IssueTemplate {
        IssueTemplate {
            category,
            severity_override: severity,
            title: "Render-blocking CSS and JavaScript".into(),
            why: "Blocks first paint.".into(),
            how: "Defer scripts.".into(),
            code: Some("<script defer src=\"/app.js\"></script>".into()),
            impact: "Faster first paint.".into(),
        }
    }

    #[test]
    fn strips_markdown_links() {
        assert_eq!(strip_links("See [here](http://x)"), "See here");
        assert_eq!(
            strip_links("Use [WebP](https://web.dev/webp) or [AVIF](https://web.dev/avif). "),
            "Use WebP or AVIF."
        );
        assert_eq!(strip_links("no links"), "no links");
    }

    #[test]
    fn passing_and_unscored_audits_are_skipped_even_with_template() {
        let report = ReportBuilder::new()
            .audit("x", "X", Some(0.95))
            .audit("y", "Y", None)
            .audit("z", "Z", Some(0.9))
            .build();
        let registry = TemplateRegistry::from_templates([
            ("x", template(Category::Seo, Some(Severity::High))),
            ("y", template(Category::Seo, Some(Severity::High))),
        ]);
        assert!(extract(&report, &registry).is_empty());
    }

    #[test]
    fn template_wins_over_score() {
        let report = ReportBuilder::new()
            .audit("render-blocking-resources", "Eliminate render-blocking resources", Some(0.3))
            .category("seo", Some(0.8), &["render-blocking-resources"])
            .build();
        let registry = TemplateRegistry::from_templates([(
            "render-blocking-resources",
            template(Category::Speed, Some(Severity::Medium)),
        )]);

        let issues = extract(&report, &registry);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Medium);
        assert_eq!(issues[0].category, Category::Speed);
        assert_eq!(issues[0].title, "Render-blocking CSS and JavaScript");
        assert!(issues[0].code.is_some());
    }

    #[test]
    fn template_without_override_uses_score() {
        let report = ReportBuilder::new().audit("offscreen-images", "Defer offscreen images", Some(0.6)).build();
        let registry =
            TemplateRegistry::from_templates([("offscreen-images", template(Category::Speed, None))]);
        assert_eq!(extract(&report, &registry)[0].severity, Severity::High);
    }

    #[test]
    fn fallback_issue_for_unknown_audit() {
        let report = ReportBuilder::new()
            .audit_with_description("unknown-audit", "Some check", Some(0.42), "See [here](http://x)")
            .build();
        let issues = extract(&report, &TemplateRegistry::default());

        assert_eq!(issues.len(), 1);
        let issue = &issues[0];
        assert_eq!(issue.title, "Some check");
        assert_eq!(issue.severity, Severity::Critical);
        assert_eq!(issue.how, "See here");
        assert_eq!(issue.category, Category::Speed);
        assert_eq!(issue.why, GENERIC_WHY);
        assert_eq!(issue.impact, GENERIC_IMPACT);
        assert_eq!(issue.code, None);
    }

    #[test]
    fn fallback_fills_empty_title_and_description() {
        let report = ReportBuilder::new().audit("blank", "", Some(0.75)).build();
        let issue = &extract(&report, &TemplateRegistry::default())[0];
        assert_eq!(issue.title, FALLBACK_TITLE);
        assert_eq!(issue.how, FALLBACK_HOW);
        assert_eq!(issue.severity, Severity::Medium);
    }

    #[test]
    fn fallback_keeps_audit_title_verbatim() {
        let report = ReportBuilder::new().audit("spaced", "  ", Some(0.75)).build();
        let issue = &extract(&report, &TemplateRegistry::default())[0];
        assert_eq!(issue.title, "  ");
    }

    #[test]
    fn audit_without_id_uses_its_key_for_template_and_category() {
        let report: RawAuditReport = serde_json::from_value(serde_json::json!({
            "lighthouseResult": {
                "audits": {
                    "image-alt-x": {"id": "", "title": "Images lack alt", "score": 0.2},
                    "tap-targets-x": {"title": "Tap targets", "score": 0.4}
                },
                "categories": {
                    "accessibility": {"score": 0.6, "auditRefs": [{"id": "image-alt-x"}, {"id": "tap-targets-x"}]}
                }
            }
        }))
        .unwrap();
        let registry = TemplateRegistry::from_templates([(
            "tap-targets-x",
            template(Category::Accessibility, Some(Severity::Low)),
        )]);

        let issues = extract(&report, &registry);

        assert_eq!(issues[0].title, "Images lack alt");
        assert_eq!(issues[0].category, Category::Accessibility);
        assert_eq!(issues[1].severity, Severity::Low);
        assert_eq!(issues[1].title, "Render-blocking CSS and JavaScript");
    }

    #[test]
    fn fallback_category_comes_from_audit_refs() {
        let report = ReportBuilder::new()
            .audit("image-alt", "Images lack alt", Some(0.0))
            .audit("link-text", "Generic link text", Some(0.5))
            .audit("pwa-thing", "PWA check", Some(0.1))
            .category("accessibility", Some(0.7), &["image-alt"])
            .category("seo", Some(0.8), &["link-text"])
            .category("pwa", Some(0.1), &["pwa-thing"])
            .build();
        let issues = extract(&report, &TemplateRegistry::default());
        let categories: Vec<Category> = issues.iter().map(|i| i.category).collect();
        assert_eq!(
            categories,
            vec![Category::Accessibility, Category::Seo, Category::Speed]
        );
    }

    #[test]
    fn last_category_reference_wins() {
        let report = ReportBuilder::new()
            .audit("shared", "Shared audit", Some(0.2))
            .category("seo", None, &["shared"])
            .category("best-practices", None, &["shared"])
            .build();
        let issues = extract(&report, &TemplateRegistry::default());
        assert_eq!(issues[0].category, Category::BestPractices);
    }

    #[test]
    fn output_follows_report_order_and_is_deterministic() {
        let report = ReportBuilder::new()
            .audit("zeta", "Zeta", Some(0.1))
            .audit("alpha", "Alpha", Some(0.8))
            .audit("mid", "Mid", Some(0.6))
            .build();
        let registry = TemplateRegistry::builtin().unwrap();

        let first = extract(&report, &registry);
        let second = extract(&report, &registry);
        assert_eq!(first, second);
        let titles: Vec<&str> = first.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Zeta", "Alpha", "Mid"]);
    }
}
