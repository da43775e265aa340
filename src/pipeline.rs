//! Fetch pipeline: list papers from the primary index, drop records without
//! a DOI, then run each enricher over the survivors in order.

use std::fmt;

use thiserror::Error;
use tracing::{info, instrument};

use crate::http::ConcurrencyGate;
use crate::paper::Paper;
use crate::source::{PaperEnricher, PaperRetriever, SourceError};

/// Pipeline progress, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Constructed, not yet run.
    Init,
    /// Primary list retrieved.
    ListFetched,
    /// Records without DOI removed.
    Filtered,
    /// Running the enricher at this index.
    Enriching(usize),
    /// Finished.
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::ListFetched => write!(f, "list_fetched"),
            Self::Filtered => write!(f, "filtered"),
            Self::Enriching(index) => write!(f, "enriching({index})"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The primary paper list could not be retrieved.
    #[error("failed to retrieve paper list: {0}")]
    Retrieve(#[source] SourceError),
}

/// One-shot orchestrator for a (conference, year) crawl.
///
/// [`FetchPipeline::run`] consumes the pipeline; build a new one per request.
pub struct FetchPipeline {
    retriever: Box<dyn PaperRetriever>,
    enrichers: Vec<Box<dyn PaperEnricher>>,
    stage: PipelineStage,
}

impl fmt::Debug for FetchPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchPipeline")
            .field("retriever", &self.retriever.name())
            .field(
                "enrichers",
                &self.enrichers.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .field("stage", &self.stage)
            .finish()
    }
}

impl FetchPipeline {
    /// Creates a pipeline; `enrichers` run in the given order.
    #[must_use]
    pub fn new(retriever: Box<dyn PaperRetriever>, enrichers: Vec<Box<dyn PaperEnricher>>) -> Self {
        Self {
            retriever,
            enrichers,
            stage: PipelineStage::Init,
        }
    }

    /// Returns the current stage.
    #[must_use]
    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    fn advance(&mut self, next: PipelineStage) {
        info!(from = %self.stage, to = %next, "pipeline stage transition");
        self.stage = next;
    }

    /// Runs the crawl for `conf` in `year`.
    ///
    /// The same `gate` bounds requests of every stage. Enrichment failures
    /// only leave records unenriched; they never fail the run.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Retrieve`] if the primary list cannot be
    /// fetched.
    #[instrument(skip(self, gate), fields(retriever = self.retriever.name()))]
    pub async fn run(
        mut self,
        conf: &str,
        year: i32,
        page_size: usize,
        gate: &ConcurrencyGate,
    ) -> Result<Vec<Paper>, PipelineError> {
        info!(conf, year, "fetching paper list");
        let papers = self
            .retriever
            .fetch_papers(conf, year, page_size, gate)
            .await
            .map_err(PipelineError::Retrieve)?;
        let fetched = papers.len();
        self.advance(PipelineStage::ListFetched);

        let mut papers: Vec<Paper> = papers.into_iter().filter(|p| p.doi().is_some()).collect();
        info!(fetched, kept = papers.len(), "dropped papers without DOI");
        self.advance(PipelineStage::Filtered);

        if papers.is_empty() {
            self.advance(PipelineStage::Done);
            return Ok(papers);
        }

        for index in 0..self.enrichers.len() {
            self.advance(PipelineStage::Enriching(index));
            let enricher = &self.enrichers[index];
            info!(enricher = enricher.name(), "enriching papers");
            let enriched = enricher.enrich_papers(&mut papers, gate, false).await;
            info!(
                enricher = enricher.name(),
                enriched,
                total = papers.len(),
                "enrichment stage finished"
            );
        }

        self.advance(PipelineStage::Done);
        Ok(papers)
    }
}
