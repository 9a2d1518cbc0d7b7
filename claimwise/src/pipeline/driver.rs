//! The claim pipeline driver: `process_insurance_claim`.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use serde::{Deserialize, Serialize};
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::claim::{ClaimTask, Photo};
use crate::docgen::{DocGenRequest, DocGenTarget, DocumentGenerator};
use crate::error::Result;
use crate::storage::{SharedContentStore, SharedRecordSource};

use super::orchestrator::{Orchestrator, RunOutcome};

/// Default number of claims processed at once by
/// [`ClaimPipeline::process_many`].
pub const DEFAULT_CONCURRENCY: usize = 4;

/// References to the inputs of one claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRequest {
    /// Raw claim record id.
    pub claim_id: String,
    /// Customer record id.
    pub customer_id: String,
    /// Image file ids or URLs, in order.
    pub image_ids: Vec<String>,
}

/// Entry point for processing claims end to end.
#[derive(Clone)]
pub struct ClaimPipeline {
    orchestrator: Orchestrator,
    records: SharedRecordSource,
    content: SharedContentStore,
    documents: Option<(Arc<dyn DocumentGenerator>, DocGenTarget)>,
    concurrency: usize,
}

impl ClaimPipeline {
    /// Create a pipeline.
    #[must_use]
    pub fn new(
        orchestrator: Orchestrator,
        records: SharedRecordSource,
        content: SharedContentStore,
    ) -> Self {
        Self {
            orchestrator,
            records,
            content,
            documents: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Submit every finished report to a document generator.
    #[must_use]
    pub fn with_document_generator(
        mut self,
        generator: Arc<dyn DocumentGenerator>,
        target: DocGenTarget,
    ) -> Self {
        self.documents = Some((generator, target));
        self
    }

    /// Bound the number of claims [`process_many`](Self::process_many) runs
    /// at once. Zero is treated as one.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Load, run and validate one claim.
    ///
    /// A guardrail rejection is returned as [`RunOutcome::Rejected`]. Every
    /// failure is logged and returned; no partial report is ever returned as
    /// a success.
    ///
    /// # Errors
    ///
    /// - [`Error::Storage`](crate::Error::Storage) or
    ///   [`Error::Http`](crate::Error::Http) when inputs cannot be loaded
    /// - any error of [`Orchestrator::run`]
    /// - [`Error::ContractViolation`](crate::Error::ContractViolation) when
    ///   the report breaks its contract
    /// - [`Error::DocGen`](crate::Error::DocGen) when the document job is
    ///   refused
    pub async fn process_insurance_claim(&self, request: &ClaimRequest) -> Result<RunOutcome> {
        let run_id = Uuid::new_v4();
        let span = info_span!("claim", %run_id, claim_id = %request.claim_id);
        async {
            let result = self.process_inner(request).await;
            match &result {
                Ok(RunOutcome::Completed(run)) => {
                    info!(claim_number = %run.report.claim_number, "Claim processed");
                }
                Ok(RunOutcome::Rejected(rejection)) => {
                    info!(reasoning = %rejection.verdict.reasoning, "Claim rejected by guardrail");
                }
                Err(e) => error!(
                    error = %e,
                    external = e.is_external(),
                    transient = e.is_transient(),
                    "Claim failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn process_inner(&self, request: &ClaimRequest) -> Result<RunOutcome> {
        let customer = self.records.load_customer(&request.customer_id).await?;
        let raw_claim = self.records.load_claim(&request.claim_id).await?;

        let mut photos = Vec::with_capacity(request.image_ids.len());
        for id in &request.image_ids {
            let url = self.content.fetch_download_url(id).await?;
            photos.push(Photo::new(id.as_str(), url));
        }

        let task = ClaimTask::new(customer, raw_claim, photos);
        let outcome = self.orchestrator.run(&task).await?;

        let RunOutcome::Completed(mut run) = outcome else {
            return Ok(outcome);
        };
        run.report.validate(task.claim_number())?;

        if let Some((generator, target)) = &self.documents {
            let job = DocGenRequest::for_report(target, &run.report)?;
            run.document = Some(generator.submit(&job).await?);
        }
        Ok(RunOutcome::Completed(run))
    }

    /// Process independent claims concurrently, at most `concurrency` at a
    /// time. Results are returned in request order.
    pub async fn process_many(&self, requests: &[ClaimRequest]) -> Vec<Result<RunOutcome>> {
        stream::iter(requests)
            .map(|request| self.process_insurance_claim(request))
            .buffered(self.concurrency)
            .collect()
            .await
    }
}

impl std::fmt::Debug for ClaimPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimPipeline")
            .field("orchestrator", &self.orchestrator)
            .field("documents", &self.documents.as_ref().map(|(_, target)| target))
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}
