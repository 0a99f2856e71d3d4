//! Notifier that posts rendered notices as tracker comments.

use crate::pipeline::{
    domain::Notice,
    ports::{IssueTracker, Notifier, NotifyError, NotifyResult},
};
use crate::task::domain::TicketId;
use async_trait::async_trait;
use minijinja::{Environment, context};
use std::collections::BTreeMap;
use std::sync::Arc;

const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    (
        "compliance_checked",
        "{% if notice.recheck %}[Re-check] {% endif %}Compliance check for {{ ticket }}: \
         {% if notice.score is none %}no score{% else %}{{ notice.score }}%{% endif %}\n\n\
         {{ notice.analysis }}",
    ),
    (
        "cases_generated",
        "Generated {{ notice.count }} test case(s) for {{ ticket }}\
         {% if notice.degraded %} without compliance context{% endif %}.",
    ),
    (
        "stage_failed",
        "{{ notice.stage | capitalize }} stage failed for {{ ticket }} \
         ({{ notice.category }}): {{ notice.message }}",
    ),
    (
        "blocked",
        "{{ notice.stage | capitalize }} stage for {{ ticket }} is temporarily blocked: \
         {{ notice.reason }}. It will be retried after {{ notice.retry_at }}.",
    ),
    (
        "queue_timeout",
        "Analysis for {{ ticket }} did not start: the AI queue stayed busy for \
         {{ notice.waited_secs }}s. Move the ticket again to retry.",
    ),
    (
        "returned",
        "Compliance score {{ notice.score }}% is below the {{ notice.threshold }}% \
         threshold. {% if notice.transitioned %}{{ ticket }} was moved to \
         {{ notice.target_status }}.{% else %}Please move {{ ticket }} to \
         {{ notice.target_status }}.{% endif %}",
    ),
    (
        "skipped",
        "Compliance check skipped for {{ ticket }}: {{ notice.code }} found in comments.",
    ),
];

/// Renders notices with `minijinja` templates and posts them through the
/// tracker.
///
/// Templates are keyed by [`Notice::kind`] and see two variables: `ticket`
/// (the ticket key) and `notice` (the serialized notice fields).
#[derive(Clone)]
pub struct CommentNotifier {
    tracker: Arc<dyn IssueTracker>,
    templates: BTreeMap<&'static str, String>,
}

impl CommentNotifier {
    /// Creates a notifier with the built-in templates.
    #[must_use]
    pub fn new(tracker: Arc<dyn IssueTracker>) -> Self {
        let templates = DEFAULT_TEMPLATES
            .iter()
            .map(|(kind, template)| (*kind, (*template).to_owned()))
            .collect();
        Self { tracker, templates }
    }

    /// Replaces the template for one notice kind.
    #[must_use]
    pub fn with_template(mut self, kind: &'static str, template: impl Into<String>) -> Self {
        self.templates.insert(kind, template.into());
        self
    }

    /// Renders a notice without posting it.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Render`] when no template exists for the
    /// notice kind or the template fails to render.
    pub fn render(&self, ticket_id: &TicketId, notice: &Notice) -> NotifyResult<String> {
        let kind = notice.kind();
        let template = self.templates.get(kind).ok_or_else(|| NotifyError::Render {
            kind,
            message: "no template registered".to_owned(),
        })?;
        Environment::new()
            .render_str(template, context! { ticket => ticket_id.as_str(), notice => notice })
            .map_err(|error| NotifyError::Render {
                kind,
                message: error.to_string(),
            })
    }
}

#[async_trait]
impl Notifier for CommentNotifier {
    async fn notify(&self, ticket_id: &TicketId, notice: &Notice) -> NotifyResult<()> {
        let body = self.render(ticket_id, notice)?;
        let posted = self
            .tracker
            .add_comment(ticket_id, &body)
            .await
            .map_err(NotifyError::delivery)?;
        if posted {
            Ok(())
        } else {
            Err(NotifyError::Rejected)
        }
    }
}
