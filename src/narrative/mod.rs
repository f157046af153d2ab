//! Narrative generation collaborator.
//!
//! The interpreter hands a question and a bounded evidence set to a
//! [`NarrativeGenerator`] and gets back lightly marked-up text. The markup
//! (emphasis, headings, list items, `#id` references) is produced here and
//! rendered by the consumer.

mod openai;

pub use openai::OpenAiNarrator;

use std::fmt::Write as _;
use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::model::WorkItem;

/// Instructions sent ahead of every narrative request.
pub const SYSTEM_PROMPT: &str = "You answer questions about a team's Azure DevOps work items. \
Use only the work items provided. Refer to items as #<id>. \
Format with light markdown: **bold** or *italic* for emphasis, '## ' headings, and '- ' list items. \
Do not use tables, code blocks, or links. If the items do not answer the question, say so briefly.";

/// Render the evidence set as the user message.
#[must_use]
pub fn build_context(question: &str, evidence: &[WorkItem]) -> String {
    let mut out = String::from("Work items:\n");
    for item in evidence {
        let _ = write!(
            out,
            "- #{} [{}] {} (State: {}, Assigned: {}",
            item.id,
            item.work_item_type,
            item.title,
            item.state,
            item.assigned_to.as_deref().unwrap_or("Unassigned"),
        );
        if let Some(changed) = item.changed_date {
            let _ = write!(out, ", Last changed: {}", changed.format("%Y-%m-%d"));
        }
        if let Some(iteration) = &item.iteration_path {
            let _ = write!(out, ", Iteration: {iteration}");
        }
        let tags = item.tag_list();
        if !tags.is_empty() {
            let _ = write!(out, ", Tags: {}", tags.join(", "));
        }
        out.push_str(")\n");
    }
    let _ = write!(out, "\nQuestion: {question}");
    out
}

/// Produces narrative answers from evidence.
pub trait NarrativeGenerator: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Answer `question` using only `evidence`.
    fn generate(
        &self,
        question: &str,
        evidence: &[WorkItem],
    ) -> impl Future<Output = Result<String>> + Send;
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`NarrativeGenerator`] for boxing.
pub trait NarrativeGeneratorBoxed: Send + Sync {
    fn name(&self) -> &'static str;
    fn generate_boxed(&self, question: String, evidence: Vec<WorkItem>)
        -> BoxFuture<'_, Result<String>>;
}

/// Boxed generator for dynamic dispatch.
pub struct BoxedNarrator {
    inner: Box<dyn NarrativeGeneratorBoxed>,
}

impl BoxedNarrator {
    pub fn new<G: NarrativeGenerator + 'static>(generator: G) -> Self {
        Self {
            inner: Box::new(BoxedNarratorWrapper(generator)),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    /// See [`NarrativeGenerator::generate`].
    ///
    /// # Errors
    ///
    /// Propagates the generator's error.
    pub async fn generate(&self, question: &str, evidence: &[WorkItem]) -> Result<String> {
        self.inner
            .generate_boxed(question.to_string(), evidence.to_vec())
            .await
    }
}

struct BoxedNarratorWrapper<G: NarrativeGenerator + 'static>(G);

impl<G: NarrativeGenerator + 'static> NarrativeGeneratorBoxed for BoxedNarratorWrapper<G> {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn generate_boxed(
        &self,
        question: String,
        evidence: Vec<WorkItem>,
    ) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move { self.0.generate(&question, &evidence).await })
    }
}
