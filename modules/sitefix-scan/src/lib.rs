//! The scan pipeline: template registry, issue extraction, concurrent
//! mobile/desktop audits, the PENDING -> COMPLETE | FAILED driver, and the
//! plan gate applied when a scan is read.

pub mod error;
pub mod extractor;
pub mod pipeline;
pub mod plan_gate;
pub mod runner;
pub mod templates;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use error::{AuditFetchError, ScanError};
pub use extractor::{extract, Resolution};
pub use pipeline::{ScanOutcome, ScanPipeline};
pub use plan_gate::{can_start_scan, filter_for_plan, resolve_plan, PlanView, ScanView};
pub use runner::{load_view, ScanRunner};
pub use templates::{IssueTemplate, TemplateLookup, TemplateRegistry};
pub use traits::{AuditFetcher, ScanStore};
