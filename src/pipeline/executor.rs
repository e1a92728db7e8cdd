// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Pipeline executor
//!
//! Runs stages strictly in declaration order. Each stage's prompt is its
//! description plus the recorded outputs of its dependencies; the reply is
//! recorded verbatim for later stages.

use std::sync::Arc;
use std::time::{Duration, Instant};

use colored::Colorize;
use serde::Serialize;

use crate::errors::CrewflowError;
use crate::pipeline::{effective_prompt, ExecutionContext, Pipeline, PipelineValidator, Stage};
use crate::reasoning::{Reasoner, ReasonerRegistry, ReasoningRequest};
use crate::utils::{create_spinner, finish_stage};

/// Pipeline execution options
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Validate and resolve bindings, but invoke nothing
    pub dry_run: bool,
    /// Print each stage's output as it completes
    pub verbose: bool,
    /// Print the plan and per-stage progress to the terminal
    pub show_progress: bool,
}

/// Lifecycle of one stage within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Per-stage execution record
#[derive(Debug, Clone)]
pub struct StageReport {
    pub id: String,
    pub binding: String,
    pub status: StageStatus,
    pub duration: Duration,
    pub prompt_len: usize,
    pub output_len: usize,
}

/// Result of executing a pipeline
#[derive(Debug)]
pub struct PipelineResult {
    /// Output of the last stage (empty for a dry run)
    pub final_output: String,
    /// Every stage's recorded output
    pub context: ExecutionContext,
    /// One report per stage, in declaration order
    pub reports: Vec<StageReport>,
    /// Total execution time
    pub duration: Duration,
}

/// A stage paired with the reasoner it is bound to
struct BoundStage<'a> {
    stage: &'a Stage,
    binding: &'a str,
    reasoner: Arc<dyn Reasoner>,
}

/// Pipeline executor
pub struct PipelineExecutor {
    reasoners: ReasonerRegistry,
}

impl PipelineExecutor {
    /// Create an executor over the given reasoner bindings
    pub fn new(reasoners: ReasonerRegistry) -> Self {
        Self { reasoners }
    }

    /// Execute a pipeline with a fresh context
    pub async fn execute(
        &self,
        pipeline: &Pipeline,
        options: &ExecutionOptions,
    ) -> Result<PipelineResult, CrewflowError> {
        let start = Instant::now();
        let mut context = ExecutionContext::new();
        let mut reports = Vec::with_capacity(pipeline.stages.len());

        let final_output = self
            .run(pipeline, options, &mut context, &mut reports)
            .await?;

        Ok(PipelineResult {
            final_output,
            context,
            reports,
            duration: start.elapsed(),
        })
    }

    /// Execute into a caller-owned context, which must start empty.
    ///
    /// On failure at stage k the context holds the outputs of stages before
    /// k and nothing else. `reports` is replaced with one entry per stage
    /// once bindings resolve, so the failed stage and the stages it
    /// skipped stay visible after an error.
    pub async fn execute_with_context(
        &self,
        pipeline: &Pipeline,
        options: &ExecutionOptions,
        context: &mut ExecutionContext,
        reports: &mut Vec<StageReport>,
    ) -> Result<String, CrewflowError> {
        self.run(pipeline, options, context, reports).await
    }

    async fn run(
        &self,
        pipeline: &Pipeline,
        options: &ExecutionOptions,
        context: &mut ExecutionContext,
        reports: &mut Vec<StageReport>,
    ) -> Result<String, CrewflowError> {
        if !context.is_empty() {
            return Err(CrewflowError::InvalidPipeline {
                reason: "execution context must be empty at pipeline start".into(),
                help: None,
            });
        }

        let warnings = PipelineValidator::validate(pipeline).into_result()?;
        for warning in &warnings {
            tracing::debug!("{}", warning);
        }

        let bound = self.bind(pipeline)?;

        reports.clear();
        reports.extend(bound.iter().map(|b| StageReport {
            id: b.stage.id.clone(),
            binding: b.binding.to_string(),
            status: StageStatus::Pending,
            duration: Duration::ZERO,
            prompt_len: 0,
            output_len: 0,
        }));

        if options.show_progress {
            self.print_execution_plan(pipeline, &bound);
        }

        if options.dry_run {
            return Ok(String::new());
        }

        let run_start = Instant::now();
        for (report, b) in reports.iter_mut().zip(&bound) {
            self.run_stage(pipeline, b, context, report, options).await?;
        }

        if options.show_progress {
            println!();
            println!(
                "{}",
                format!(
                    "Pipeline completed in {:.2}s",
                    run_start.elapsed().as_secs_f64()
                )
                .green()
            );
        }

        // Validation guarantees at least one stage, and every stage recorded.
        Ok(context
            .last()
            .map(|entry| entry.output.clone())
            .unwrap_or_default())
    }

    /// Resolve every stage's reasoner before anything runs
    fn bind<'a>(&self, pipeline: &'a Pipeline) -> Result<Vec<BoundStage<'a>>, CrewflowError> {
        pipeline
            .stages
            .iter()
            .map(|stage| {
                let binding = pipeline.binding_for(stage);
                let reasoner = self.reasoners.resolve(binding).ok_or_else(|| {
                    CrewflowError::ReasonerNotFound {
                        binding: binding.to_string(),
                        stage: stage.id.clone(),
                    }
                })?;
                Ok::<_, CrewflowError>(BoundStage {
                    stage,
                    binding,
                    reasoner,
                })
            })
            .collect()
    }

    async fn run_stage(
        &self,
        pipeline: &Pipeline,
        bound: &BoundStage<'_>,
        context: &mut ExecutionContext,
        report: &mut StageReport,
        options: &ExecutionOptions,
    ) -> Result<(), CrewflowError> {
        let stage = bound.stage;

        // Missing context is a configuration error, raised before the call.
        let prompt = {
            let sections = context.gather(&stage.id, &stage.depends_on)?;
            effective_prompt(&stage.description, &sections)
        };

        let persona = pipeline.persona_for(stage);
        let request = ReasoningRequest {
            stage_id: stage.id.clone(),
            prompt,
            persona: persona.cloned(),
            expected_output: stage.expected_output.clone(),
            tools: persona.map(|p| p.tools.clone()).unwrap_or_default(),
        };

        report.status = StageStatus::Running;
        report.prompt_len = request.prompt.len();
        tracing::info!(
            stage = %stage.id,
            reasoner = %bound.reasoner.name(),
            deps = stage.depends_on.len(),
            "running stage"
        );
        tracing::debug!(stage = %stage.id, prompt_len = report.prompt_len, "effective prompt built");

        let spinner = options
            .show_progress
            .then(|| create_spinner(&format!("{} ({})", stage.id, bound.binding)));

        let started = Instant::now();
        let outcome = bound.reasoner.reason(&request).await;
        report.duration = started.elapsed();

        let output = match outcome {
            Ok(output) => output,
            Err(e) => {
                report.status = StageStatus::Failed;
                if let Some(pb) = spinner {
                    finish_stage(pb, &stage.id, report.duration, false);
                }
                tracing::error!(stage = %stage.id, "reasoner failed: {}", e);
                return Err(CrewflowError::reasoning_failed(&stage.id, e));
            }
        };

        if output.trim().is_empty() {
            tracing::warn!(stage = %stage.id, "stage produced empty output");
        }

        report.output_len = output.len();

        if let Some(pb) = spinner {
            finish_stage(pb, &stage.id, report.duration, true);
            if options.verbose {
                println!("{}", output.dimmed());
            }
        }

        context.record(stage.id.clone(), output)?;
        report.status = StageStatus::Completed;

        tracing::info!(
            stage = %stage.id,
            elapsed_ms = report.duration.as_millis() as u64,
            output_len = report.output_len,
            "stage completed"
        );

        Ok(())
    }

    /// Print the execution plan
    fn print_execution_plan(&self, pipeline: &Pipeline, bound: &[BoundStage<'_>]) {
        println!();
        println!("{}: {}", "Pipeline".bold(), pipeline.name);
        println!("{}", "═".repeat(50));
        println!(
            "Execution plan ({} stage{}):",
            bound.len(),
            if bound.len() == 1 { "" } else { "s" }
        );
        println!();

        for (i, b) in bound.iter().enumerate() {
            print!(
                "  {}. {} ({})",
                i + 1,
                b.stage.id.bold(),
                b.reasoner.name()
            );

            if let Some(agent) = &b.stage.agent {
                print!(" {}", format!("as {}", agent).cyan());
            }

            if !b.stage.depends_on.is_empty() {
                print!(
                    " {}",
                    format!("[context: {}]", b.stage.depends_on.join(", ")).dimmed()
                );
            }

            println!();
        }

        println!();
    }

    /// Bindings whose backend reports itself unavailable
    pub async fn check_reasoners(&self, pipeline: &Pipeline) -> Result<Vec<String>, CrewflowError> {
        let mut unavailable = Vec::new();
        let mut checked: Vec<&str> = Vec::new();

        for b in self.bind(pipeline)? {
            if checked.contains(&b.binding) {
                continue;
            }
            checked.push(b.binding);

            match b.reasoner.check_available().await {
                Ok(true) => {}
                Ok(false) | Err(_) => {
                    unavailable.push(format!("{} ({})", b.binding, b.reasoner.name()))
                }
            }
        }

        Ok(unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Persona, Stage};
    use crate::reasoning::{EchoReasoner, ReasoningError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Uppercases prompts, records every request, and can fail on one stage
    #[derive(Default)]
    struct Recorder {
        requests: Mutex<Vec<ReasoningRequest>>,
        fail_on: Option<String>,
        reply: Option<String>,
    }

    impl Recorder {
        fn failing_on(stage: &str) -> Arc<Self> {
            Arc::new(Self {
                fail_on: Some(stage.into()),
                ..Default::default()
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.prompt.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Reasoner for Recorder {
        async fn reason(&self, request: &ReasoningRequest) -> Result<String, ReasoningError> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail_on.as_deref() == Some(request.stage_id.as_str()) {
                return Err(ReasoningError::Transport("service unavailable".into()));
            }
            Ok(self
                .reply
                .clone()
                .unwrap_or_else(|| request.prompt.to_uppercase()))
        }

        async fn check_available(&self) -> Result<bool, ReasoningError> {
            Ok(self.fail_on.is_none())
        }

        fn name(&self) -> String {
            "recorder".into()
        }
    }

    fn executor(reasoner: Arc<dyn Reasoner>) -> PipelineExecutor {
        PipelineExecutor::new(ReasonerRegistry::single(reasoner))
    }

    fn chain(stages: Vec<(&str, Vec<&str>)>) -> Pipeline {
        stages.into_iter().fold(Pipeline::new("test"), |p, (id, deps)| {
            p.with_stage(Stage::new(id, format!("do {id}")).depends_on(deps))
        })
    }

    #[tokio::test]
    async fn test_summary_report_scenario() {
        let pipeline = Pipeline::new("scenario")
            .with_stage(Stage::new("A", "Summarize topic X"))
            .with_stage(Stage::new("B", "Write a report using the summary").depends_on(["A"]));

        let recorder = Arc::new(Recorder::default());
        let result = executor(recorder.clone())
            .execute(&pipeline, &ExecutionOptions::default())
            .await
            .unwrap();

        let b_prompt = "Write a report using the summary\n[context from A]: SUMMARIZE TOPIC X";
        assert_eq!(result.context.get("A"), Some("SUMMARIZE TOPIC X"));
        assert_eq!(recorder.prompts(), vec!["Summarize topic X", b_prompt]);
        assert_eq!(result.final_output, b_prompt.to_uppercase());
        assert_eq!(result.context.get("B"), Some(result.final_output.as_str()));
        assert!(result
            .reports
            .iter()
            .all(|r| r.status == StageStatus::Completed));
    }

    #[tokio::test]
    async fn test_context_sections_in_declared_order() {
        let pipeline = chain(vec![
            ("a", vec![]),
            ("b", vec![]),
            ("c", vec![]),
            ("d", vec!["c", "a", "b"]),
        ]);

        let recorder = Arc::new(Recorder::default());
        executor(recorder.clone())
            .execute(&pipeline, &ExecutionOptions::default())
            .await
            .unwrap();

        let prompt = &recorder.prompts()[3];
        assert_eq!(
            prompt,
            "do d\n[context from c]: DO C\n[context from a]: DO A\n[context from b]: DO B"
        );
        assert_eq!(prompt.matches("[context from ").count(), 3);
    }

    #[tokio::test]
    async fn test_forward_reference_fails_before_any_call() {
        let pipeline = chain(vec![("a", vec![]), ("b", vec!["c"]), ("c", vec![])]);

        let recorder = Arc::new(Recorder::default());
        let err = executor(recorder.clone())
            .execute(&pipeline, &ExecutionOptions::default())
            .await
            .unwrap_err();

        assert!(err.is_configuration_error());
        assert!(matches!(err, CrewflowError::ForwardDependency { .. }));
        assert!(recorder.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_dependency_fails_before_any_call() {
        let pipeline = chain(vec![("a", vec![]), ("b", vec!["ghost"])]);

        let recorder = Arc::new(Recorder::default());
        let err = executor(recorder.clone())
            .execute(&pipeline, &ExecutionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, CrewflowError::UnknownDependency { .. }));
        assert!(recorder.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_empty_pipeline_is_configuration_error() {
        let err = executor(Arc::new(EchoReasoner::default()))
            .execute(&Pipeline::new("empty"), &ExecutionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CrewflowError::EmptyPipeline));
    }

    #[tokio::test]
    async fn test_failure_stops_pipeline_and_keeps_prior_outputs() {
        let pipeline = chain(vec![
            ("one", vec![]),
            ("two", vec!["one"]),
            ("three", vec!["two"]),
            ("four", vec!["three"]),
        ]);

        let recorder = Recorder::failing_on("three");
        let mut context = ExecutionContext::new();
        let mut reports = Vec::new();
        let err = executor(recorder.clone())
            .execute_with_context(
                &pipeline,
                &ExecutionOptions::default(),
                &mut context,
                &mut reports,
            )
            .await
            .unwrap_err();

        match &err {
            CrewflowError::ReasoningFailed { stage, source, .. } => {
                assert_eq!(stage, "three");
                assert!(matches!(source, ReasoningError::Transport(_)));
            }
            other => panic!("expected ReasoningFailed, got {other:?}"),
        }

        let seen: Vec<String> = recorder
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.stage_id.clone())
            .collect();
        assert_eq!(seen, vec!["one", "two", "three"]);

        let recorded: Vec<&str> = context.entries().iter().map(|e| e.stage.as_str()).collect();
        assert_eq!(recorded, vec!["one", "two"]);

        let statuses: Vec<StageStatus> = reports.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                StageStatus::Completed,
                StageStatus::Completed,
                StageStatus::Failed,
                StageStatus::Pending,
            ]
        );
        assert_eq!(reports[3].output_len, 0);
    }

    #[tokio::test]
    async fn test_empty_output_is_recorded_verbatim() {
        let pipeline = chain(vec![("blank", vec![]), ("next", vec!["blank"])]);

        let recorder = Arc::new(Recorder {
            reply: Some(String::new()),
            ..Default::default()
        });
        let result = executor(recorder.clone())
            .execute(&pipeline, &ExecutionOptions::default())
            .await
            .unwrap();

        assert_eq!(result.final_output, "");
        assert_eq!(result.context.get("blank"), Some(""));
        assert_eq!(recorder.prompts()[1], "do next\n[context from blank]: ");
    }

    #[tokio::test]
    async fn test_deterministic_runs_are_identical() {
        let pipeline = chain(vec![("a", vec![]), ("b", vec!["a"]), ("c", vec!["a", "b"])]);
        let exec = executor(Arc::new(EchoReasoner::uppercase()));

        let first = exec
            .execute(&pipeline, &ExecutionOptions::default())
            .await
            .unwrap();
        let second = exec
            .execute(&pipeline, &ExecutionOptions::default())
            .await
            .unwrap();

        assert_eq!(first.context, second.context);
        assert_eq!(first.final_output, second.final_output);
        assert_eq!(first.context.fingerprint(), second.context.fingerprint());
    }

    #[tokio::test]
    async fn test_persona_and_expected_output_pass_through() {
        let pipeline = Pipeline::new("crew")
            .with_agent(
                "critic",
                Persona::new("Venture Capital Critic", "Evaluate feasibility", "Experienced VC."),
            )
            .with_stage(
                Stage::new("critique", "Evaluate the idea.")
                    .with_agent("critic")
                    .with_expected_output("Strengths and weaknesses"),
            );

        let recorder = Arc::new(Recorder::default());
        executor(recorder.clone())
            .execute(&pipeline, &ExecutionOptions::default())
            .await
            .unwrap();

        let requests = recorder.requests.lock().unwrap();
        let req = &requests[0];
        assert_eq!(req.prompt, "Evaluate the idea.");
        assert_eq!(req.persona.as_ref().unwrap().role, "Venture Capital Critic");
        assert_eq!(req.expected_output.as_deref(), Some("Strengths and weaknesses"));
    }

    #[tokio::test]
    async fn test_stages_bind_to_their_agent_llm() {
        let mut persona = Persona::new("Local", "", "");
        persona.llm = Some("local".into());
        let pipeline = Pipeline::new("bindings")
            .with_agent("local_agent", persona)
            .with_stage(Stage::new("a", "first"))
            .with_stage(Stage::new("b", "second").with_agent("local_agent").depends_on(["a"]));

        let default = Arc::new(Recorder::default());
        let local = Arc::new(Recorder::default());
        let mut registry = ReasonerRegistry::new();
        registry.register("default", default.clone());
        registry.register("local", local.clone());

        let result = PipelineExecutor::new(registry)
            .execute(&pipeline, &ExecutionOptions::default())
            .await
            .unwrap();

        assert_eq!(default.prompts(), vec!["first"]);
        assert_eq!(local.prompts(), vec!["second\n[context from a]: FIRST"]);
        assert_eq!(result.reports[1].binding, "local");
    }

    #[tokio::test]
    async fn test_missing_binding_fails_before_any_call() {
        let mut persona = Persona::new("Remote", "", "");
        persona.llm = Some("remote".into());
        let pipeline = Pipeline::new("p")
            .with_agent("remote_agent", persona)
            .with_stage(Stage::new("a", "first"))
            .with_stage(Stage::new("b", "second").with_agent("remote_agent"));

        let default = Arc::new(Recorder::default());
        let mut registry = ReasonerRegistry::new();
        registry.register("default", default.clone());

        let err = PipelineExecutor::new(registry)
            .execute(&pipeline, &ExecutionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CrewflowError::ReasonerNotFound { ref binding, .. } if binding == "remote"
        ));
        assert!(default.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_invokes_nothing() {
        let pipeline = chain(vec![("a", vec![]), ("b", vec!["a"])]);
        let recorder = Arc::new(Recorder::default());

        let result = executor(recorder.clone())
            .execute(
                &pipeline,
                &ExecutionOptions {
                    dry_run: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(recorder.prompts().is_empty());
        assert!(result.context.is_empty());
        assert_eq!(result.reports.len(), 2);
        assert!(result
            .reports
            .iter()
            .all(|r| r.status == StageStatus::Pending));
    }

    #[tokio::test]
    async fn test_non_empty_context_rejected() {
        let pipeline = chain(vec![("a", vec![])]);
        let mut context = ExecutionContext::new();
        context.record("stale", "x").unwrap();

        let err = executor(Arc::new(EchoReasoner::default()))
            .execute_with_context(
                &pipeline,
                &ExecutionOptions::default(),
                &mut context,
                &mut Vec::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CrewflowError::InvalidPipeline { .. }));
    }

    #[tokio::test]
    async fn test_check_reasoners() {
        let pipeline = chain(vec![("a", vec![]), ("b", vec!["a"])]);

        let unavailable = executor(Recorder::failing_on("x"))
            .check_reasoners(&pipeline)
            .await
            .unwrap();
        assert_eq!(unavailable, vec!["default (recorder)"]);

        let fine = executor(Arc::new(EchoReasoner::default()))
            .check_reasoners(&pipeline)
            .await
            .unwrap();
        assert!(fine.is_empty());
    }
}
