//! Prompt assembly from ranked retrieval results.

use crate::error::{Error, Result};
use crate::models::RetrievalResult;

pub const CONTEXT_PLACEHOLDER: &str = "{context}";
pub const QUESTION_PLACEHOLDER: &str = "{question}";

/// Separator placed between consecutive chunk texts in the context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

pub const DEFAULT_PROMPT_TEMPLATE: &str = "
Please answer the question based only on the below context:

{context}

---

Please answer the question based only on the context: {question}
";

/// A prompt template known to contain both placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
            if !template.contains(placeholder) {
                return Err(Error::Template(format!(
                    "template is missing the {} placeholder",
                    placeholder
                )));
            }
        }
        Ok(Self { template })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Fill both placeholders in a single pass, so text inside the context
    /// or question is never itself treated as a placeholder.
    pub fn render(&self, context: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();
        loop {
            let next = [
                (CONTEXT_PLACEHOLDER, context),
                (QUESTION_PLACEHOLDER, question),
            ]
            .into_iter()
            .filter_map(|(placeholder, value)| {
                rest.find(placeholder).map(|at| (at, placeholder, value))
            })
            .min_by_key(|(at, _, _)| *at);

            match next {
                Some((at, placeholder, value)) => {
                    out.push_str(&rest[..at]);
                    out.push_str(value);
                    rest = &rest[at + placeholder.len()..];
                }
                None => {
                    out.push_str(rest);
                    return out;
                }
            }
        }
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

/// Join chunk texts in rank order with [`CONTEXT_SEPARATOR`].
pub fn context_text(results: &[RetrievalResult]) -> String {
    results
        .iter()
        .map(|r| r.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Build the generation prompt for `question` from `results`.
///
/// Fails with [`Error::Template`] when `template` lacks either placeholder.
/// Empty `results` still produce a prompt, with an empty context block.
pub fn assemble(results: &[RetrievalResult], question: &str, template: &str) -> Result<String> {
    let template = PromptTemplate::new(template)?;
    Ok(template.render(&context_text(results), question))
}
