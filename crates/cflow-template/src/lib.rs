//! Contentflow Template: the template micro-language
//!
//! - [`syntax`]: static analysis (balanced blocks, variables, complexity)
//! - [`renderer`]: Handlebars-backed rendering with the helper set
//! - [`templates`]: the built-in set and the runtime registry

pub mod renderer;
pub mod syntax;
pub mod templates;

pub use renderer::{render_string, TemplateRenderer};
pub use syntax::{analyze, leftover_placeholders, strip_tags, SyntaxError, SyntaxErrorKind, TemplateAnalysis};
pub use templates::{builtin_templates, TemplateRegistry, TemplatesFile};
