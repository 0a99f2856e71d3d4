//! Scripted AI-backed services.
//!
//! Each service replays queued results in order and falls back to a fixed
//! default once the queue is empty. Every call records the instant it was
//! issued, which is what pacing tests assert on.

use crate::pipeline::{
    domain::GenerationMode,
    ports::{
        AnalysisError, AnalysisResult, CaseGenerator, ComplianceAnalyzer, ComplianceReport,
        GeneratedCases,
    },
};
use crate::task::domain::TicketId;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// One recorded service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall<M> {
    /// Ticket the call was for.
    pub ticket_id: TicketId,
    /// When the call was issued.
    pub at: Instant,
    /// Call-specific detail.
    pub detail: M,
}

#[derive(Debug)]
struct Script<T, M> {
    queued: VecDeque<AnalysisResult<T>>,
    fallback: AnalysisResult<T>,
    calls: Vec<RecordedCall<M>>,
    latency: Duration,
}

impl<T: Clone, M: Clone> Script<T, M> {
    fn new(fallback: AnalysisResult<T>) -> Self {
        Self {
            queued: VecDeque::new(),
            fallback,
            calls: Vec::new(),
            latency: Duration::ZERO,
        }
    }

    fn next(&mut self, ticket_id: &TicketId, detail: M) -> (AnalysisResult<T>, Duration) {
        self.calls.push(RecordedCall {
            ticket_id: ticket_id.clone(),
            at: Instant::now(),
            detail,
        });
        let result = self
            .queued
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        (result, self.latency)
    }
}

type Shared<T, M> = Arc<Mutex<Script<T, M>>>;

fn lock<T, M>(script: &Shared<T, M>) -> std::sync::MutexGuard<'_, Script<T, M>> {
    script.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Compliance analyzer replaying scripted results.
#[derive(Debug, Clone)]
pub struct ScriptedComplianceAnalyzer {
    script: Shared<ComplianceReport, ()>,
}

impl ScriptedComplianceAnalyzer {
    /// Creates an analyzer whose default result is `fallback`.
    #[must_use]
    pub fn new(fallback: AnalysisResult<ComplianceReport>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::new(fallback))),
        }
    }

    /// Queues one result.
    pub fn push(&self, result: AnalysisResult<ComplianceReport>) {
        lock(&self.script).queued.push_back(result);
    }

    /// Makes each call take `latency` before returning.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.script).latency = latency;
    }

    /// Returns every call issued so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall<()>> {
        lock(&self.script).calls.clone()
    }
}

#[async_trait]
impl ComplianceAnalyzer for ScriptedComplianceAnalyzer {
    async fn analyze(&self, ticket_id: &TicketId) -> AnalysisResult<ComplianceReport> {
        let (result, latency) = lock(&self.script).next(ticket_id, ());
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        result
    }
}

/// Case generator replaying scripted results.
#[derive(Debug, Clone)]
pub struct ScriptedCaseGenerator {
    script: Shared<GeneratedCases, GenerationMode>,
}

impl ScriptedCaseGenerator {
    /// Creates a generator whose default result is `fallback`.
    #[must_use]
    pub fn new(fallback: AnalysisResult<GeneratedCases>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::new(fallback))),
        }
    }

    /// Queues one result.
    pub fn push(&self, result: AnalysisResult<GeneratedCases>) {
        lock(&self.script).queued.push_back(result);
    }

    /// Makes each call take `latency` before returning.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.script).latency = latency;
    }

    /// Returns every call issued so far, with the requested mode.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall<GenerationMode>> {
        lock(&self.script).calls.clone()
    }
}

#[async_trait]
impl CaseGenerator for ScriptedCaseGenerator {
    async fn generate(
        &self,
        ticket_id: &TicketId,
        mode: GenerationMode,
    ) -> AnalysisResult<GeneratedCases> {
        let (result, latency) = lock(&self.script).next(ticket_id, mode);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        result
    }
}

impl Default for ScriptedComplianceAnalyzer {
    fn default() -> Self {
        Self::new(Err(AnalysisError::new("no scripted compliance result")))
    }
}

impl Default for ScriptedCaseGenerator {
    fn default() -> Self {
        Self::new(Ok(GeneratedCases { items: Vec::new() }))
    }
}
