//! Named-field prompt templates.
//!
//! `{context}` and `{query}` are substituted in one left-to-right pass, so
//! braces that arrive inside the substituted text are never expanded.
//! Any other `{...}` sequence is copied through unchanged.

use finelaw_core::error::{FineLawError, Result};

const FIELDS: [&str; 2] = ["context", "query"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
}

impl PromptTemplate {
    /// Both `{context}` and `{query}` must appear.
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        for field in FIELDS {
            if !source.contains(&format!("{{{field}}}")) {
                return Err(FineLawError::Config(format!(
                    "prompt template is missing the {{{field}}} placeholder"
                )));
            }
        }
        Ok(Self { source })
    }

    /// Skip validation for templates known to carry both fields.
    pub(crate) fn trusted(source: String) -> Self {
        Self { source }
    }

    pub fn render(&self, context: &str, query: &str) -> String {
        let mut out = String::with_capacity(self.source.len() + context.len() + query.len());
        let mut rest = self.source.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let value = after.find('}').and_then(|close| match &after[..close] {
                "context" => Some((context, close)),
                "query" => Some((query, close)),
                _ => None,
            });
            match value {
                Some((value, close)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}
