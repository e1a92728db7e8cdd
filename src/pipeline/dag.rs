// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Dependency graph for pipeline stages
//!
//! Execution always follows declaration order; the graph answers questions
//! about who feeds whom and renders the pipeline for humans.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;

use crate::errors::CrewflowError;
use crate::pipeline::Pipeline;

/// Builder for stage dependency DAGs
pub struct DagBuilder {
    graph: DiGraph<usize, ()>,
    id_to_index: HashMap<String, NodeIndex>,
    /// Nodes in declaration order
    order: Vec<NodeIndex>,
}

impl DagBuilder {
    /// Create an empty DAG builder
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            id_to_index: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Build a DAG from a pipeline
    ///
    /// Edges point from a dependency to the stage that reads it. Fails on
    /// unknown or forward references.
    pub fn build(pipeline: &Pipeline) -> Result<Self, CrewflowError> {
        let mut builder = Self::new();

        for (idx, stage) in pipeline.stages.iter().enumerate() {
            let node = builder.graph.add_node(idx);
            builder.id_to_index.insert(stage.id.clone(), node);
            builder.order.push(node);
        }

        for (idx, stage) in pipeline.stages.iter().enumerate() {
            let stage_node = builder.order[idx];

            for dep in &stage.depends_on {
                let dep_node = *builder.id_to_index.get(dep).ok_or_else(|| {
                    CrewflowError::UnknownDependency {
                        stage: stage.id.clone(),
                        dependency: dep.clone(),
                    }
                })?;

                if builder.graph[dep_node] >= idx {
                    return Err(CrewflowError::ForwardDependency {
                        stage: stage.id.clone(),
                        dependency: dep.clone(),
                    });
                }

                if !builder.graph.contains_edge(dep_node, stage_node) {
                    builder.graph.add_edge(dep_node, stage_node, ());
                }
            }
        }

        Ok(builder)
    }

    fn id_of(&self, node: NodeIndex, pipeline: &Pipeline) -> String {
        pipeline.stages[self.graph[node]].id.clone()
    }

    fn neighbors(&self, stage_id: &str, dir: Direction) -> Option<Vec<usize>> {
        let node = self.id_to_index.get(stage_id)?;
        let mut idxs: Vec<usize> = self
            .graph
            .neighbors_directed(*node, dir)
            .map(|n| self.graph[n])
            .collect();
        idxs.sort_unstable();
        Some(idxs)
    }

    /// Stage indices this stage reads from, in declaration order
    pub fn dependencies(&self, stage_id: &str) -> Option<Vec<usize>> {
        self.neighbors(stage_id, Direction::Incoming)
    }

    /// Stage indices that read this stage's output, in declaration order
    pub fn dependents(&self, stage_id: &str) -> Option<Vec<usize>> {
        self.neighbors(stage_id, Direction::Outgoing)
    }

    /// Check if stage A depends (directly or transitively) on stage B
    pub fn depends_on(&self, stage_a: &str, stage_b: &str) -> bool {
        let Some(node_a) = self.id_to_index.get(stage_a) else {
            return false;
        };
        let Some(node_b) = self.id_to_index.get(stage_b) else {
            return false;
        };

        node_a != node_b
            && petgraph::algo::has_path_connecting(&self.graph, *node_b, *node_a, None)
    }

    /// Longest dependency chain, counted in stages
    pub fn depth(&self) -> usize {
        // Declaration order is topological, so one forward pass suffices.
        let mut depth = vec![0usize; self.order.len()];
        for &node in &self.order {
            let idx = self.graph[node];
            let best = self
                .graph
                .neighbors_directed(node, Direction::Incoming)
                .map(|n| depth[self.graph[n]])
                .max()
                .unwrap_or(0);
            depth[idx] = best + 1;
        }
        depth.into_iter().max().unwrap_or(0)
    }

    /// Generate Mermaid diagram of the DAG
    pub fn to_mermaid(&self, pipeline: &Pipeline) -> String {
        let mut out = String::from("graph TD\n");

        for &node in &self.order {
            let stage = &pipeline.stages[self.graph[node]];
            let label = match stage.agent.as_deref() {
                Some(agent) => format!("{}<br/>{}", stage.id, agent),
                None => stage.id.clone(),
            };
            out.push_str(&format!("    {}[\"{}\"]\n", stage.id, label));
        }

        for edge in self.graph.edge_indices() {
            if let Some((from, to)) = self.graph.edge_endpoints(edge) {
                out.push_str(&format!(
                    "    {} --> {}\n",
                    self.id_of(from, pipeline),
                    self.id_of(to, pipeline)
                ));
            }
        }

        out
    }

    /// Generate DOT diagram of the DAG
    pub fn to_dot(&self, pipeline: &Pipeline) -> String {
        let mut out = format!("digraph \"{}\" {{\n", pipeline.name);
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for &node in &self.order {
            out.push_str(&format!("    \"{}\";\n", self.id_of(node, pipeline)));
        }

        for edge in self.graph.edge_indices() {
            if let Some((from, to)) = self.graph.edge_endpoints(edge) {
                out.push_str(&format!(
                    "    \"{}\" -> \"{}\";\n",
                    self.id_of(from, pipeline),
                    self.id_of(to, pipeline)
                ));
            }
        }

        out.push_str("}\n");
        out
    }

    /// Generate text representation of execution order
    pub fn to_text(&self, pipeline: &Pipeline) -> String {
        let mut out = String::new();

        for (i, stage) in pipeline.stages.iter().enumerate() {
            let deps = self.dependencies(&stage.id).unwrap_or_default();

            out.push_str(&format!("{}. {}", i + 1, stage.id));
            if let Some(agent) = &stage.agent {
                out.push_str(&format!(" ({})", agent));
            }

            if !deps.is_empty() {
                let names: Vec<&str> = deps
                    .iter()
                    .map(|&d| pipeline.stages[d].id.as_str())
                    .collect();
                out.push_str(&format!(" [context: {}]", names.join(", ")));
            }

            out.push('\n');
        }

        out
    }
}

impl Default for DagBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stage;

    fn make_test_pipeline(stages: Vec<(&str, Vec<&str>)>) -> Pipeline {
        stages
            .into_iter()
            .fold(Pipeline::new("test"), |p, (id, deps)| {
                p.with_stage(Stage::new(id, id).depends_on(deps))
            })
    }

    #[test]
    fn test_diamond_dag() {
        let pipeline = make_test_pipeline(vec![
            ("a", vec![]),
            ("b", vec!["a"]),
            ("c", vec!["a"]),
            ("d", vec!["c", "b"]),
        ]);

        let dag = DagBuilder::build(&pipeline).unwrap();

        assert_eq!(dag.dependencies("d").unwrap(), vec![1, 2]);
        assert_eq!(dag.dependents("a").unwrap(), vec![1, 2]);
        assert!(dag.dependents("d").unwrap().is_empty());
        assert_eq!(dag.depth(), 3);
    }

    #[test]
    fn test_forward_reference_rejected() {
        let pipeline = make_test_pipeline(vec![("a", vec!["b"]), ("b", vec![])]);

        let result = DagBuilder::build(&pipeline);
        assert!(matches!(result, Err(CrewflowError::ForwardDependency { .. })));
    }

    #[test]
    fn test_unknown_dependency() {
        let pipeline = make_test_pipeline(vec![("a", vec!["nonexistent"])]);

        let result = DagBuilder::build(&pipeline);
        assert!(matches!(result, Err(CrewflowError::UnknownDependency { .. })));
    }

    #[test]
    fn test_depends_on_check() {
        let pipeline = make_test_pipeline(vec![
            ("a", vec![]),
            ("b", vec!["a"]),
            ("c", vec!["b"]),
        ]);

        let dag = DagBuilder::build(&pipeline).unwrap();

        assert!(dag.depends_on("c", "a")); // transitive
        assert!(dag.depends_on("c", "b")); // direct
        assert!(!dag.depends_on("a", "c")); // reverse
        assert!(!dag.depends_on("a", "a"));
    }

    #[test]
    fn test_renderings() {
        let pipeline = Pipeline::new("report")
            .with_stage(Stage::new("research", "r").with_agent("researcher"))
            .with_stage(Stage::new("write", "w").depends_on(["research"]));

        let dag = DagBuilder::build(&pipeline).unwrap();

        let mermaid = dag.to_mermaid(&pipeline);
        assert!(mermaid.starts_with("graph TD\n"));
        assert!(mermaid.contains("research[\"research<br/>researcher\"]"));
        assert!(mermaid.contains("research --> write"));

        let dot = dag.to_dot(&pipeline);
        assert!(dot.contains("digraph \"report\""));
        assert!(dot.contains("\"research\" -> \"write\";"));

        assert_eq!(
            dag.to_text(&pipeline),
            "1. research (researcher)\n2. write [context: research]\n"
        );
    }
}
