//! Contentflow Validator: seven weighted rules over templates and content
//!
//! A [`ValidationResult`] passes only when the weighted score clears the
//! profile's bar, no critical rule failed and the template parsed cleanly.
//! Fixable issues carry a [`FixKind`] that [`apply_fixes`] can act on.

pub mod cache;
pub mod fixes;
pub mod profile;
pub mod rules;
pub mod target;
pub mod text;
pub mod validator;

pub use cache::{TtlCache, ValidationCache, DEFAULT_VALIDATION_TTL};
pub use fixes::{apply_fix, apply_fixes, DISCLAIMER, UNSUBSCRIBE_NOTICE};
pub use profile::{BrandTerm, ValidationProfile};
pub use rules::{FixKind, Issue, IssueSeverity, RuleId, RuleSpec, RULES};
pub use target::{TargetKind, ValidationTarget};
pub use validator::{complexity_score, RuleResult, ValidationResult, TemplateValidator};
