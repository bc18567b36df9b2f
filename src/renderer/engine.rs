//! Sequential step execution.
//!
//! Steps run strictly in order. A `Stop` result halts everything after it, a
//! failed or skipped dependency skips its dependants, and a failing or
//! panicking step is recorded without aborting its siblings.

use std::panic::AssertUnwindSafe;

use anyhow::anyhow;
use futures::FutureExt;

use crate::core::element::RenderStatus;
use crate::renderer::step::StepOutcome;
use crate::renderer::{Phase, Renderer, StepPayload, StepState};

/// Run every step of `renderer` and settle its target.
pub async fn run(mut renderer: Renderer) -> Renderer {
    run_steps(&mut renderer).await;
    renderer
}

/// Run every step of `renderer`, appending to its result log.
pub async fn run_steps(renderer: &mut Renderer) -> RenderStatus {
    let steps = renderer.steps().to_vec();

    for step in steps {
        let name = step.name().to_string();

        let stopped = renderer
            .results
            .last()
            .is_some_and(|result| result.state == StepState::Stop);
        if stopped {
            renderer.record(Phase::Render, &name, StepState::Stop, StepPayload::None);
            continue;
        }

        if let Some(dependency) = step.depends() {
            if matches!(
                renderer.state_of(dependency),
                Some(StepState::Skip | StepState::Fail)
            ) {
                log::debug!("skipping '{name}', '{dependency}' did not succeed");
                renderer.record(Phase::Render, &name, StepState::Skip, StepPayload::None);
                continue;
            }
        }

        let outcome = AssertUnwindSafe(step.run(renderer)).catch_unwind().await;
        let (state, payload) = match outcome {
            Ok(Ok(StepOutcome::Done(value))) => (StepState::Success, StepPayload::Value(value)),
            Ok(Ok(StepOutcome::Skip)) => (StepState::Skip, StepPayload::None),
            Ok(Err(err)) => {
                log::warn!("step '{name}' failed: {err:#}");
                (StepState::Fail, StepPayload::Error(err))
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                log::warn!("step '{name}' panicked: {reason}");
                (StepState::Fail, StepPayload::Error(anyhow!("step panicked: {reason}")))
            }
        };
        renderer.record(Phase::Render, &name, state, payload);
    }

    finish(renderer)
}

/// Write the aggregated status to the target, unless a newer render owns it.
pub fn finish(renderer: &Renderer) -> RenderStatus {
    let status = renderer.status();
    if let Some(target) = &renderer.target {
        match renderer.generation() {
            Some(generation) => {
                if !target.settle(generation, status) {
                    log::debug!("render superseded, leaving target status untouched");
                }
            }
            None => target.set_render_status(status),
        }
    }
    status
}
