use std::sync::Arc;
use tracing::debug;

use docchat_core::error::{Error, Result};
use docchat_core::remote::CallGuard;
use docchat_core::traits::LanguageModel;
use docchat_core::types::RetrievalResult;

const CONTEXT: &str = "{context}";
const QUERY: &str = "{query}";

/// Builds the grounded prompt and asks the language model once.
pub struct GenerationOrchestrator {
    collection: String,
    template: String,
    model: Arc<dyn LanguageModel>,
    guard: CallGuard,
}

impl GenerationOrchestrator {
    /// The template must contain both `{context}` and `{query}`.
    pub fn new(collection: impl Into<String>, template: impl Into<String>, model: Arc<dyn LanguageModel>, guard: CallGuard) -> Result<Self> {
        let template = template.into();
        for placeholder in [CONTEXT, QUERY] {
            if !template.contains(placeholder) {
                return Err(Error::config("generation.prompt_template", format!("missing {placeholder} placeholder")));
            }
        }
        Ok(Self { collection: collection.into(), template, model, guard })
    }

    pub fn model_id(&self) -> &str { self.model.model_id() }

    pub fn build_prompt(&self, query: &str, context: &str) -> String {
        fill_template(&self.template, context, query)
    }

    pub async fn answer(&self, query: &str, retrieved: &RetrievalResult) -> Result<String> {
        let context = build_context(retrieved);
        let prompt = self.build_prompt(query, &context);
        debug!(collection = %self.collection, documents = retrieved.len(), prompt_chars = prompt.len(), "generating answer");
        self.guard.run("generate answer", self.model.generate(&prompt)).await
    }
}

/// Document texts in rank order, separated by a blank line.
pub fn build_context(retrieved: &RetrievalResult) -> String {
    retrieved.documents().map(|d| d.text.as_str()).collect::<Vec<_>>().join("\n\n")
}

/// Single pass, so placeholder-like text inside the substituted values is left alone.
fn fill_template(template: &str, context: &str, query: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + query.len());
    let mut rest = template;
    loop {
        let next = [(CONTEXT, context), (QUERY, query)]
            .into_iter()
            .filter_map(|(p, v)| rest.find(p).map(|at| (at, p, v)))
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
