//! Ordered step execution over an append-only output context.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::engine::EngineError;

/// How a step drives the control plane; recorded for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// A single mutating or fetching call, usually under conflict retry.
    Action,
    /// A wait for an asynchronous resource to settle.
    Poll,
    /// Delete-then-recreate of a named resource.
    Replace,
}

impl StepKind {
    fn as_str(self) -> &'static str {
        match self {
            StepKind::Action => "action",
            StepKind::Poll => "poll",
            StepKind::Replace => "replace",
        }
    }
}

type StepFn<'a> = Box<dyn FnOnce(&PipelineContext) -> Result<Value, EngineError> + 'a>;

struct Step<'a> {
    name: &'static str,
    kind: StepKind,
    run: StepFn<'a>,
}

/// Outputs of completed steps, keyed by step name.
///
/// Write-once: a recorded output never changes for the rest of the run. The
/// context lives for exactly one pipeline run; nothing carries over between
/// invocations of the tool.
#[derive(Debug, Default)]
pub struct PipelineContext {
    outputs: BTreeMap<String, Value>,
}

impl PipelineContext {
    /// Output of an earlier step; an error if that step has not recorded
    /// one, which would mean the pipeline was wired out of order.
    pub fn output(&self, step: &str) -> Result<&Value, EngineError> {
        self.outputs.get(step).ok_or_else(|| EngineError::MissingOutput {
            step: step.to_string(),
        })
    }

    /// String field of an earlier step's output, addressed by JSON pointer.
    pub fn string(&self, step: &str, pointer: &str) -> Result<String, EngineError> {
        self.output(step)?
            .pointer(pointer)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| EngineError::MissingField {
                step: step.to_string(),
                pointer: pointer.to_string(),
            })
    }

    fn record(&mut self, step: &str, output: Value) -> Result<(), EngineError> {
        if self.outputs.contains_key(step) {
            return Err(EngineError::DuplicateOutput {
                step: step.to_string(),
            });
        }
        self.outputs.insert(step.to_string(), output);
        Ok(())
    }
}

/// An ordered sequence of named steps executed once per invocation.
///
/// Steps run strictly in order; each receives the outputs of every step
/// before it. The first fatal error aborts the run with no compensation of
/// earlier steps, so a partially provisioned resource graph can remain —
/// replace semantics make a full rerun the recovery path.
#[derive(Default)]
pub struct Pipeline<'a> {
    steps: Vec<Step<'a>>,
}

impl<'a> Pipeline<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step. Closures are `FnOnce`: a step can never run twice
    /// within one pipeline execution, retries happen inside the step.
    pub fn step(
        &mut self,
        name: &'static str,
        kind: StepKind,
        run: impl FnOnce(&PipelineContext) -> Result<Value, EngineError> + 'a,
    ) {
        self.steps.push(Step {
            name,
            kind,
            run: Box::new(run),
        });
    }

    /// Execute all steps, returning the final step's output (`Null` when
    /// the pipeline is empty).
    pub fn run(self) -> Result<Value, EngineError> {
        let total = self.steps.len();
        let mut context = PipelineContext::default();
        let mut last = Value::Null;
        for (index, step) in self.steps.into_iter().enumerate() {
            tracing::info!(
                step = step.name,
                kind = step.kind.as_str(),
                position = index + 1,
                total,
                "step starting"
            );
            let output = (step.run)(&context).map_err(|err| {
                tracing::error!(step = step.name, error = %err, "step failed; aborting pipeline");
                err
            })?;
            context.record(step.name, output.clone())?;
            last = output;
        }
        Ok(last)
    }
}
