// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Init command - create a new pipeline file

use colored::Colorize;
use miette::Result;
use std::path::Path;

use super::DEFAULT_PIPELINE_FILE;
use crate::errors::CrewflowError;

/// Templates offered by `crewflow init --template`
pub const TEMPLATES: &[(&str, &str)] = &[
    ("research-report", "Research analyst → technical writer"),
    ("startup", "Idea → VC critique → business model canvas"),
    ("financial", "Financial analysis → risk register → executive brief"),
    ("code-review", "Engineer writes code → senior reviewer improves it"),
    ("strategic-planning", "CEO → CTO → CFO → CRO investment review"),
    ("react", "Single agent using tools in an act/observe loop"),
];

/// Run the init command
pub async fn run(template: Option<String>, force: bool, verbose: bool) -> Result<()> {
    let project_name = std::env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|s| s.to_string_lossy().to_string()))
        .unwrap_or_else(|| "my-pipeline".to_string());

    println!("{}", "Initializing crewflow pipeline...".bold());
    println!();

    let path = Path::new(DEFAULT_PIPELINE_FILE);
    if path.exists() && !force {
        return Err(miette::miette!(
            help = "Pass --force to overwrite it",
            "{} already exists",
            DEFAULT_PIPELINE_FILE
        ));
    }

    let template = template.as_deref().unwrap_or("research-report");
    let pipeline_content = render_template(template, &project_name)?;

    std::fs::write(path, &pipeline_content).map_err(|e| CrewflowError::FileWriteError {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    println!("  {} Created {} ({})", "✓".green(), DEFAULT_PIPELINE_FILE, template);

    println!();
    println!("{}", "Pipeline initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to define your stages", DEFAULT_PIPELINE_FILE.cyan());
    println!("  2. Run {} to check it", "crewflow validate".cyan());
    println!(
        "  3. Run {} (or {} offline)",
        "crewflow run".cyan(),
        "--backend echo".cyan()
    );
    println!();

    if verbose {
        println!("{}", "Generated pipeline:".dimmed());
        println!("{}", "─".repeat(50).dimmed());
        println!("{}", pipeline_content.dimmed());
    }

    Ok(())
}

/// Render a named template for a project
pub fn render_template(template: &str, name: &str) -> Result<String> {
    // A JSON string is a valid YAML double-quoted scalar.
    let quoted = serde_json::to_string(name).map_err(CrewflowError::from)?;
    let name = quoted.as_str();

    let content = match template {
        "research-report" => generate_research_template(name),
        "startup" => generate_startup_template(name),
        "financial" => generate_financial_template(name),
        "code-review" => generate_code_review_template(name),
        "strategic-planning" => generate_strategy_template(name),
        "react" => generate_react_template(name),
        t => {
            let available: Vec<String> = TEMPLATES
                .iter()
                .map(|(id, about)| format!("  • {:<20} - {}", id, about))
                .collect();
            return Err(miette::miette!(
                "Unknown template: '{}'\n\nAvailable templates:\n{}",
                t,
                available.join("\n")
            ));
        }
    };
    Ok(content)
}

fn generate_research_template(name: &str) -> String {
    format!(
        r#"# crewflow pipeline configuration
#
# Stages run top to bottom. A stage sees only the outputs listed in
# depends_on, appended to its description as "[context from <id>]: ...".

version: "1"
name: {name}

inputs:
  topic: "Agentic AI"

llms:
  default:
    provider: openai
    model: gpt-4o-mini

agents:
  researcher:
    role: "Research Analyst"
    goal: "Find accurate information on a topic"
    backstory: "Expert in deep research and summarization."
  writer:
    role: "Technical Writer"
    goal: "Write structured professional reports"
    backstory: "Expert in business communication."

stages:
  - id: research
    agent: researcher
    description: "Research the latest trends in {{topic}}."
    expected_output: "A detailed list of key trends with explanations."

  - id: report
    agent: writer
    description: "Write a structured 5-section report based on the research findings."
    expected_output: "A professional report with headings and clear sections."
    depends_on:
      - research
"#
    )
}

fn generate_startup_template(name: &str) -> String {
    format!(
        r#"# crewflow pipeline - startup idea review
version: "1"
name: {name}

llms:
  default:
    provider: openai
    model: gpt-4o-mini
    temperature: 0.3

agents:
  ideator:
    role: "Startup Idea Generator"
    goal: "Generate innovative AI startup ideas"
    backstory: "Creative technologist."
  critic:
    role: "Venture Capital Critic"
    goal: "Evaluate feasibility and risks"
    backstory: "Experienced VC partner."
  strategist:
    role: "Product Strategist"
    goal: "Refine an idea into a business model canvas"
    backstory: "Strategic product expert."

stages:
  - id: idea
    agent: ideator
    description: "Generate one innovative AI startup idea in 3-5 sentences."
    expected_output: "A clearly defined startup idea with target market and core value proposition."

  - id: critique
    agent: critic
    description: "Critically evaluate the startup idea. Analyze risks, competition, feasibility and revenue potential."
    expected_output: "A structured evaluation with strengths, weaknesses, risks and an investment viability score."
    depends_on: [idea]

  - id: canvas
    agent: strategist
    description: "Refine the startup idea into a structured Business Model Canvas."
    expected_output: |
      A business model canvas including:
      - Customer Segments
      - Value Proposition
      - Revenue Streams
      - Key Activities
      - Key Resources
      - Channels
      - Cost Structure
      - Key Partnerships
    depends_on: [idea, critique]
"#
    )
}

fn generate_financial_template(name: &str) -> String {
    format!(
        r#"# crewflow pipeline - financial analysis
version: "1"
name: {name}

inputs:
  company: "a mid-size SaaS company"

agents:
  analyst:
    role: "Financial Analyst"
    goal: "Analyze company performance"
    backstory: "CFA charterholder with ten years of equity research."
  risk:
    role: "Risk Analyst"
    goal: "Identify financial and operational risks"
    backstory: "Former auditor focused on downside scenarios."
  advisor:
    role: "Executive Advisor"
    goal: "Summarize findings for a board-level audience"
    backstory: "Board advisor who writes short, decision-ready briefs."

stages:
  - id: analysis
    agent: analyst
    description: "Analyze the recent financial performance of {{company}}: revenue, margins, cash flow and growth drivers."
    expected_output: "A structured analysis with key metrics and trends and 5-10 bullet insights."

  - id: risks
    agent: risk
    description: "Using the analysis, identify the main financial and operational risks for {{company}}."
    expected_output: "A risk register with 6-10 risks, severity and mitigation actions."
    depends_on: [analysis]

  - id: brief
    agent: advisor
    description: "Write an executive summary of the analysis and risks for the board."
    expected_output: "A concise executive summary with 3 recommendations."
    depends_on: [analysis, risks]
"#
    )
}

fn generate_code_review_template(name: &str) -> String {
    format!(
        r#"# crewflow pipeline - build and review
version: "1"
name: {name}

inputs:
  feature: "a FastAPI service exposing CRUD endpoints for a todo list"

agents:
  engineer:
    role: "Software Engineer"
    goal: "Write production-ready code"
    backstory: "Pragmatic backend engineer."
  reviewer:
    role: "Senior Code Reviewer"
    goal: "Review and improve code quality"
    backstory: "Staff engineer who cares about correctness and readability."

stages:
  - id: build
    agent: engineer
    description: "Implement {{feature}} as a single runnable file with input validation and error handling."
    expected_output: "A complete code listing that can run locally."

  - id: review
    agent: reviewer
    description: "Review the code for bugs, security issues and style, then provide an improved version."
    expected_output: "A review section (bullets) followed by the revised code."
    depends_on: [build]
"#
    )
}

fn generate_strategy_template(name: &str) -> String {
    format!(
        r#"# crewflow pipeline - strategic planning
version: "1"
name: {name}

inputs:
  question: "Should we invest $10M into building an AI platform?"

agents:
  ceo:
    role: "CEO"
    goal: "Drive growth strategy and make an investment recommendation"
    backstory: "Operator who has scaled two companies."
  cto:
    role: "CTO"
    goal: "Evaluate technology feasibility and delivery approach"
    backstory: "Platform architect."
  cfo:
    role: "CFO"
    goal: "Analyze financial viability, ROI and funding allocation"
    backstory: "Disciplined capital allocator."
  cro:
    role: "Chief Risk Officer"
    goal: "Identify compliance, security, privacy and operational risks"
    backstory: "Regulated-industry risk lead."

stages:
  - id: vision
    agent: ceo
    description: "{{question}} Provide a crisp recommendation and rationale."
    expected_output: "A recommendation (Yes/No/Conditional) with 5-8 bullets and success criteria."

  - id: feasibility
    agent: cto
    description: "Evaluate tech feasibility: architecture, timeline, team, build vs buy, risks and dependencies."
    expected_output: "A feasibility assessment with a phased delivery plan (90 days / 6 months / 12 months)."
    depends_on: [vision]

  - id: financials
    agent: cfo
    description: "Analyze financial impact: cost breakdown, ROI assumptions, payback period and KPIs to track."
    expected_output: "A financial view with budget allocation, ROI assumptions and go/no-go metrics."
    depends_on: [vision, feasibility]

  - id: risk_register
    agent: cro
    description: "Identify regulatory, security, privacy, model, operational and reputational risks. Include mitigations."
    expected_output: "A risk register with severity and mitigations, including the top 5 must-have controls."
    depends_on: [vision, feasibility, financials]
"#
    )
}

fn generate_react_template(name: &str) -> String {
    format!(
        r#"# crewflow pipeline - tool-using agent
#
# Agents listing tools may reply with "ACTION: tool(input)"; the result comes
# back as "OBSERVATION: ..." until the agent gives a final answer.
version: "1"
name: {name}

inputs:
  topic: "Agentic AI"

agents:
  tracer:
    role: "ReAct Trace Agent"
    goal: "Answer by alternating reasoning with tool calls"
    backstory: "Methodical analyst who checks facts with tools."
    tools: [word_count, char_count]

stages:
  - id: answer
    agent: tracer
    description: "Summarize the two most important trends in {{topic}}, then report the word count of your summary."
    expected_output: "A short summary followed by its word count."
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Pipeline, PipelineValidator};

    #[test]
    fn test_every_template_is_a_valid_pipeline() {
        for (id, _) in TEMPLATES {
            let yaml = render_template(id, "demo").unwrap();
            let pipeline = Pipeline::from_yaml(&yaml)
                .unwrap_or_else(|e| panic!("template {id} does not parse: {e}"));

            assert_eq!(pipeline.name, "demo");
            let result = PipelineValidator::validate(&pipeline);
            assert!(result.is_valid(), "template {id}: {:?}", result.errors);
            assert!(pipeline.unresolved_inputs().is_empty(), "template {id}");
        }
    }

    #[test]
    fn test_research_template_wires_context() {
        let pipeline =
            Pipeline::from_yaml(&render_template("research-report", "demo").unwrap()).unwrap();
        assert_eq!(pipeline.stage_ids(), vec!["research", "report"]);
        assert_eq!(pipeline.stages[1].depends_on, vec!["research"]);
        assert!(pipeline.stages[0].description.contains("{topic}"));
    }

    #[test]
    fn test_project_name_is_quoted() {
        for name in [r#"we"ird\dir"#, "a: b # c", "'single'", "line\nbreak"] {
            let yaml = render_template("startup", name).unwrap();
            let pipeline = Pipeline::from_yaml(&yaml)
                .unwrap_or_else(|e| panic!("name {name:?} breaks the template: {e}"));
            assert_eq!(pipeline.name, name);
        }
    }

    #[test]
    fn test_unknown_template() {
        let err = render_template("kubernetes", "demo").unwrap_err();
        assert!(err.to_string().contains("research-report"));
    }
}
