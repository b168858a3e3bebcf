//! Sequential pipeline engine.

use super::{ExecutionOptions, PipelineOutput};
use crate::cancellation::CancellationToken;
use crate::core::{Outcome, Request, RequestId, StageKind};
use crate::errors::{Result, StagechainError};
use crate::events::{event_payload, types, EventSink, NoOpEventSink};
use crate::stages::Stage;
use async_trait::async_trait;
use futures::FutureExt;
use serde_json::json;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lifecycle of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Building,
    Frozen,
}

/// Why a stage invocation did not produce an outcome.
enum Interrupted {
    TimedOut,
    Cancelled,
}

/// An ordered sequence of stages.
///
/// Stages are appended while the pipeline is building; [`freeze`] locks the
/// order. Only frozen pipelines execute, and a frozen pipeline can be
/// shared (behind an `Arc` or by cloning) across any number of concurrent
/// executions.
///
/// A frozen pipeline is itself a [`Stage`], so pipelines nest.
///
/// [`freeze`]: Pipeline::freeze
#[derive(Clone)]
pub struct Pipeline {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
    state: PipelineState,
    options: ExecutionOptions,
    event_sink: Arc<dyn EventSink>,
}

impl Pipeline {
    /// Creates an empty pipeline in the building state.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            state: PipelineState::Building,
            options: ExecutionOptions::default(),
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Appends a stage.
    ///
    /// # Errors
    ///
    /// Returns `PipelineFrozen` if the pipeline has been frozen.
    pub fn append(mut self, stage: Arc<dyn Stage>) -> Result<Self> {
        self.add_stage(stage)?;
        Ok(self)
    }

    /// Appends a stage by value.
    ///
    /// # Errors
    ///
    /// Returns `PipelineFrozen` if the pipeline has been frozen.
    pub fn stage<S: Stage + 'static>(self, stage: S) -> Result<Self> {
        self.append(Arc::new(stage))
    }

    /// Appends a stage in place.
    ///
    /// # Errors
    ///
    /// Returns `PipelineFrozen` if the pipeline has been frozen.
    pub fn add_stage(&mut self, stage: Arc<dyn Stage>) -> Result<()> {
        if self.is_frozen() {
            return Err(StagechainError::PipelineFrozen {
                pipeline: self.name.clone(),
            });
        }
        self.stages.push(stage);
        Ok(())
    }

    /// Locks the stage order. Freezing twice is a no-op.
    #[must_use]
    pub fn freeze(mut self) -> Self {
        self.state = PipelineState::Frozen;
        self
    }

    /// Sets the options applied by [`execute`](Self::execute).
    #[must_use]
    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets a default deadline for [`execute`](Self::execute).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Routes execution events to `sink`.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true once the pipeline has been frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.state == PipelineState::Frozen
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Returns the execution options.
    #[must_use]
    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    /// Runs `request` through every stage in order.
    ///
    /// Returns the final request if every stage continued, or the response
    /// of the first stage that short-circuited. The first failing stage
    /// aborts execution with a `StageFailure` naming it.
    ///
    /// # Errors
    ///
    /// `StageFailure` when a stage fails, `Timeout` when the configured
    /// deadline expires, and `PipelineNotFrozen` when called before
    /// [`freeze`](Self::freeze).
    pub async fn execute(&self, request: Request) -> Result<PipelineOutput> {
        self.run(request, self.options.timeout, None).await
    }

    /// Runs `request` with a deadline of `timeout`.
    ///
    /// On expiry the in-flight stage is dropped.
    ///
    /// # Errors
    ///
    /// As [`execute`](Self::execute), with `Timeout` on expiry.
    pub async fn execute_with_timeout(
        &self,
        request: Request,
        timeout: Duration,
    ) -> Result<PipelineOutput> {
        self.run(request, Some(timeout), None).await
    }

    /// Runs `request` until completion or until `token` is cancelled.
    ///
    /// # Errors
    ///
    /// As [`execute`](Self::execute), with `Cancelled` once the token fires.
    pub async fn execute_with_cancellation(
        &self,
        request: Request,
        token: &CancellationToken,
    ) -> Result<PipelineOutput> {
        self.run(request, self.options.timeout, Some(token)).await
    }

    async fn run(
        &self,
        request: Request,
        timeout: Option<Duration>,
        token: Option<&CancellationToken>,
    ) -> Result<PipelineOutput> {
        if !self.is_frozen() {
            return Err(StagechainError::PipelineNotFrozen {
                pipeline: self.name.clone(),
            });
        }

        let start = Instant::now();
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        let request_id = request.id();

        debug!(pipeline = %self.name, %request_id, stages = self.stages.len(), "Pipeline started");
        self.emit(
            types::PIPELINE_STARTED,
            request_id,
            json!({"stage_count": self.stages.len()}),
        );

        let mut current = request;

        for (index, stage) in self.stages.iter().enumerate() {
            if let Some(token) = token.filter(|t| t.is_cancelled()) {
                return Err(self.cancelled(request_id, token.reason(), None, start));
            }
            if let (Some(timeout), Some(deadline)) = (timeout, deadline) {
                if tokio::time::Instant::now() >= deadline {
                    return Err(self.timed_out(request_id, timeout, None, start));
                }
            }

            self.emit(
                types::STAGE_STARTED,
                request_id,
                json!({"stage": stage.name(), "index": index}),
            );

            let stage_start = Instant::now();
            let outcome = match self.invoke(stage.as_ref(), current, deadline, token).await {
                Ok(outcome) => outcome,
                Err(Interrupted::TimedOut) => {
                    let timeout = timeout.unwrap_or_default();
                    return Err(self.timed_out(request_id, timeout, Some(stage.name()), start));
                }
                Err(Interrupted::Cancelled) => {
                    let reason = token.and_then(CancellationToken::reason);
                    return Err(self.cancelled(request_id, reason, Some(stage.name()), start));
                }
            };
            let stage_ms = elapsed_ms(stage_start);

            match outcome {
                Outcome::Continue(next) => {
                    debug!(pipeline = %self.name, stage = stage.name(), index, "Stage continued");
                    self.emit(
                        types::STAGE_CONTINUED,
                        request_id,
                        json!({"stage": stage.name(), "index": index, "duration_ms": stage_ms}),
                    );
                    current = next;
                }
                Outcome::ShortCircuit(response) => {
                    debug!(
                        pipeline = %self.name,
                        stage = stage.name(),
                        index,
                        status = response.status(),
                        "Stage short-circuited"
                    );
                    self.emit(
                        types::STAGE_SHORT_CIRCUITED,
                        request_id,
                        json!({
                            "stage": stage.name(),
                            "index": index,
                            "status": response.status(),
                            "duration_ms": stage_ms,
                        }),
                    );
                    self.emit(
                        types::PIPELINE_SHORT_CIRCUITED,
                        request_id,
                        json!({
                            "stage": stage.name(),
                            "status": response.status(),
                            "duration_ms": elapsed_ms(start),
                        }),
                    );
                    return Ok(PipelineOutput::ShortCircuited(response));
                }
                Outcome::Fail(cause) => {
                    let err = StagechainError::stage_failure(stage.name(), index, cause);
                    warn!(pipeline = %self.name, stage = stage.name(), index, error = %err, "Stage failed");
                    self.emit(
                        types::STAGE_FAILED,
                        request_id,
                        json!({
                            "stage": stage.name(),
                            "index": index,
                            "error": err.to_dict(),
                            "duration_ms": stage_ms,
                        }),
                    );
                    self.emit(
                        types::PIPELINE_FAILED,
                        request_id,
                        json!({
                            "stage": stage.name(),
                            "index": index,
                            "code": err.root_cause().code(),
                            "duration_ms": elapsed_ms(start),
                        }),
                    );
                    return Err(err);
                }
            }
        }

        info!(
            pipeline = %self.name,
            %request_id,
            duration_ms = elapsed_ms(start),
            "Pipeline completed"
        );
        self.emit(
            types::PIPELINE_COMPLETED,
            request_id,
            json!({"duration_ms": elapsed_ms(start)}),
        );

        Ok(PipelineOutput::Completed(current))
    }
}

impl Pipeline {
    /// Awaits one stage, racing it against cancellation and the deadline.
    async fn invoke(
        &self,
        stage: &dyn Stage,
        request: Request,
        deadline: Option<tokio::time::Instant>,
        token: Option<&CancellationToken>,
    ) -> std::result::Result<Outcome, Interrupted> {
        let catch_panics = self.options.catch_panics;
        let process = async move {
            if catch_panics {
                AssertUnwindSafe(stage.process(request))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| {
                        Outcome::internal(format!("stage panicked: {}", panic_message(&*payload)))
                    })
            } else {
                stage.process(request).await
            }
        };

        let cancelled = async {
            match token {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        let expired = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = cancelled => Err(Interrupted::Cancelled),
            () = expired => Err(Interrupted::TimedOut),
            outcome = process => Ok(outcome),
        }
    }

    fn timed_out(
        &self,
        request_id: RequestId,
        timeout: Duration,
        stage: Option<&str>,
        start: Instant,
    ) -> StagechainError {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        warn!(pipeline = %self.name, %request_id, stage, timeout_ms, "Pipeline timed out");
        self.emit(
            types::PIPELINE_TIMED_OUT,
            request_id,
            json!({"stage": stage, "timeout_ms": timeout_ms, "duration_ms": elapsed_ms(start)}),
        );
        StagechainError::Timeout {
            pipeline: self.name.clone(),
            stage: stage.map(str::to_string),
            timeout_ms,
        }
    }

    fn cancelled(
        &self,
        request_id: RequestId,
        reason: Option<String>,
        stage: Option<&str>,
        start: Instant,
    ) -> StagechainError {
        let reason = reason.unwrap_or_else(|| "cancelled".to_string());
        info!(pipeline = %self.name, %request_id, stage, reason = %reason, "Pipeline cancelled");
        self.emit(
            types::PIPELINE_CANCELLED,
            request_id,
            json!({"stage": stage, "reason": reason, "duration_ms": elapsed_ms(start)}),
        );
        StagechainError::Cancelled {
            pipeline: self.name.clone(),
            reason,
        }
    }

    fn emit(&self, event_type: &str, request_id: RequestId, extra: serde_json::Value) {
        self.event_sink
            .try_emit(event_type, Some(event_payload(&self.name, request_id, extra)));
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .field("state", &self.state)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for Pipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Composite
    }

    async fn process(&self, request: Request) -> Outcome {
        match self.execute(request).await {
            Ok(output) => output.into_outcome(),
            Err(err) => Outcome::Fail(err),
        }
    }
}
