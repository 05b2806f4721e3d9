//! Execution of a single [`FunctionCall`] against a [`Registry`].
//!
//! Every call produces a [`FunctionResult`]. Lookup misses and validation
//! failures come back as `Ok` with an unsuccessful result, since they are
//! ordinary, user-actionable outcomes. A function body that returns an error
//! (a timeout or cancellation included) comes back as `Err(ExecutionFailure)`,
//! which still carries the unsuccessful result.
//!
//! The body runs on the caller's task. There is no worker pool and no
//! per-name exclusivity.

use crate::context::Context;
use crate::error::{ExecutionFailure, FunctionError};
use crate::function::{FunctionCall, FunctionOptions};
use crate::registry::Registry;
use crate::result::{FunctionResult, Progress, monotonic};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Progress events held for a slow receiver in
/// [`Registry::execute_with_progress`] before newer ones are dropped.
pub const PROGRESS_QUEUE: usize = 64;

impl Registry {
    /// Runs `call` to completion.
    ///
    /// `None` options means a 30 second timeout. A non-zero
    /// `options.timeout` bounds the context handed to the body; the derived
    /// context is cancelled as soon as this call returns. The result's
    /// duration is measured here and overwrites whatever the body set.
    pub async fn execute(
        &self,
        ctx: &Context,
        call: &FunctionCall,
        options: Option<FunctionOptions>,
    ) -> Result<FunctionResult, ExecutionFailure> {
        let started = Instant::now();

        let Some(function) = self.get(call.name()) else {
            let err = FunctionError::NotFound(call.name().to_string());
            warn!("{}", err);
            return Ok(finish(
                FunctionResult::failure_with_message(err.to_string(), "Function not found"),
                started,
            ));
        };

        let mut options = options.unwrap_or_default();

        if let Err(err) = function.validate_parameters(call.parameters()) {
            warn!("Parameter validation failed for '{}': {}", call.name(), err);
            return Ok(finish(
                FunctionResult::failure_with_message(err.to_string(), "Parameter validation failed"),
                started,
            ));
        }

        if let Some(callback) = options.progress.take() {
            options.progress = Some(monotonic(callback));
        }

        let (exec_ctx, _cancel) = if options.timeout > Duration::ZERO {
            let (child, guard) = ctx.with_timeout(options.timeout);
            (child, Some(guard))
        } else {
            (ctx.clone(), None)
        };

        debug!(
            "Executing function: {} with parameters: {:?}",
            call.name(),
            call.parameters()
        );

        match function.execute(&exec_ctx, call.parameters(), &options).await {
            Ok(result) => {
                let result = finish(result, started);
                debug!("Function {} finished in {:?}", call.name(), result.duration());
                Ok(result)
            }
            Err(source) => {
                let result = finish(
                    FunctionResult::failure_with_message(source.to_string(), "Function execution failed"),
                    started,
                );
                error!("Function '{}' execution failed: {}", call.name(), source);
                Err(ExecutionFailure {
                    name: call.name().to_string(),
                    result,
                    source,
                })
            }
        }
    }

    /// Like [`execute`](Registry::execute), relaying the progress events the
    /// body reports onto `progress`, in emission order.
    ///
    /// The body never blocks on the channel. Events wait in a queue of
    /// [`PROGRESS_QUEUE`] entries and are forwarded alongside the body; once
    /// the queue is full, newer events are dropped. Forwarding stops when the
    /// call's context (bounded by `options.timeout`) is done or the receiver
    /// is dropped. After the body returns, whatever still fits in the channel
    /// is sent without waiting and the rest is discarded, so a full, unread
    /// channel never delays the result.
    pub async fn execute_with_progress(
        &self,
        ctx: &Context,
        call: &FunctionCall,
        options: Option<FunctionOptions>,
        progress: mpsc::Sender<Progress>,
    ) -> Result<FunctionResult, ExecutionFailure> {
        let options = options.unwrap_or_default();
        let (call_ctx, _cancel) = if options.timeout > Duration::ZERO {
            let (child, guard) = ctx.with_timeout(options.timeout);
            (child, Some(guard))
        } else {
            (ctx.clone(), None)
        };

        let (queue, mut queued) = mpsc::channel::<Progress>(PROGRESS_QUEUE);
        let options = options.with_progress(move |event| {
            if queue.try_send(event).is_err() {
                debug!("Progress queue full or closed, dropping event");
            }
        });

        let execution = self.execute(&call_ctx, call, Some(options));
        tokio::pin!(execution);

        let mut pending: Option<Progress> = None;
        let mut relaying = true;
        let outcome = loop {
            tokio::select! {
                biased;
                permit = progress.reserve(), if relaying && pending.is_some() => match permit {
                    Ok(permit) => {
                        if let Some(event) = pending.take() {
                            permit.send(event);
                        }
                    }
                    Err(_) => relaying = false,
                },
                event = queued.recv(), if relaying && pending.is_none() => match event {
                    Some(event) => pending = Some(event),
                    None => relaying = false,
                },
                _ = call_ctx.done(), if relaying => relaying = false,
                outcome = &mut execution => break outcome,
            }
        };

        if relaying {
            let leftovers = pending
                .into_iter()
                .chain(std::iter::from_fn(|| queued.try_recv().ok()));
            for event in leftovers {
                if progress.try_send(event).is_err() {
                    debug!("Progress channel full after '{}' returned, dropping the rest", call.name());
                    break;
                }
            }
        }

        outcome
    }

    /// Lookup and validation without running anything.
    pub fn validate_call(&self, call: &FunctionCall) -> Result<(), FunctionError> {
        let function = self
            .get(call.name())
            .ok_or_else(|| FunctionError::NotFound(call.name().to_string()))?;
        function.validate_parameters(call.parameters())?;
        Ok(())
    }
}

fn finish(mut result: FunctionResult, started: Instant) -> FunctionResult {
    result.complete(started.elapsed());
    result
}
