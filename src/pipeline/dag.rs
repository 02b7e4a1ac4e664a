// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! DAG (Directed Acyclic Graph) builder for pipeline dependencies
//!
//! Builds the dependency graph of a pipeline, detects cycles and computes
//! the execution order.

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

use crate::errors::{PipeflowError, PipeflowResult};
use crate::pipeline::Pipeline;

/// Dependency graph of one pipeline; edges point dependency -> dependent
pub struct DagBuilder {
    pipeline_name: String,
    graph: DiGraph<String, ()>,
    name_to_index: HashMap<String, NodeIndex>,
}

impl DagBuilder {
    /// Build the graph from a pipeline
    pub fn build(pipeline: &Pipeline) -> Self {
        let mut graph = DiGraph::new();
        let mut name_to_index = HashMap::new();

        // One node per step
        for name in pipeline.step_names() {
            let node = graph.add_node(name.to_string());
            name_to_index.insert(name.to_string(), node);
        }

        // One edge per recorded dependency
        for name in pipeline.step_names() {
            let step_node = name_to_index[name];
            for dep_name in pipeline.dependencies_of(name) {
                match name_to_index.get(dep_name) {
                    Some(dep_node) => {
                        graph.update_edge(*dep_node, step_node, ());
                    }
                    None => {
                        tracing::warn!(
                            pipeline = %pipeline.name(),
                            step = %name,
                            dependency = %dep_name,
                            "dependency is not a step of this pipeline; ignoring"
                        );
                    }
                }
            }
        }

        Self {
            pipeline_name: pipeline.name().to_string(),
            graph,
            name_to_index,
        }
    }

    /// Fail with every cycle if the graph is not acyclic
    pub fn validate_acyclic(&self) -> PipeflowResult<()> {
        let cycles = self.cycles();
        if cycles.is_empty() {
            Ok(())
        } else {
            Err(PipeflowError::CyclicDependency {
                pipeline: self.pipeline_name.clone(),
                cycles,
            })
        }
    }

    /// All elementary cycles, each starting at its earliest-registered step
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles = Vec::new();

        for mut component in tarjan_scc(&self.graph) {
            let single = component.len() == 1;
            if single && !self.graph.contains_edge(component[0], component[0]) {
                continue;
            }

            component.sort();
            for (i, &start) in component.iter().enumerate() {
                let allowed: HashSet<NodeIndex> = component[i..].iter().copied().collect();
                let mut path = vec![start];
                self.collect_cycles(start, start, &allowed, &mut path, &mut cycles);
            }
        }

        cycles.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        cycles
    }

    /// Backtracking search for cycles through `start` within `allowed`
    fn collect_cycles(
        &self,
        start: NodeIndex,
        node: NodeIndex,
        allowed: &HashSet<NodeIndex>,
        path: &mut Vec<NodeIndex>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
            if !allowed.contains(&next) {
                continue;
            }
            if next == start {
                cycles.push(path.iter().map(|n| self.graph[*n].clone()).collect());
            } else if !path.contains(&next) {
                path.push(next);
                self.collect_cycles(start, next, allowed, path, cycles);
                path.pop();
            }
        }
    }

    /// Get topologically sorted step names
    pub fn topological_order_names(&self) -> PipeflowResult<Vec<String>> {
        self.validate_acyclic()?;

        toposort(&self.graph, None)
            .map(|nodes| nodes.into_iter().map(|n| self.graph[n].clone()).collect())
            .map_err(|_| PipeflowError::CyclicDependency {
                pipeline: self.pipeline_name.clone(),
                cycles: self.cycles(),
            })
    }

    /// Get dependencies for a step (steps that must run before it)
    pub fn dependencies(&self, step_name: &str) -> Option<Vec<String>> {
        let node = self.name_to_index.get(step_name)?;
        let mut deps: Vec<String> = self
            .graph
            .neighbors_directed(*node, Direction::Incoming)
            .map(|n| self.graph[n].clone())
            .collect();
        deps.sort();
        Some(deps)
    }

    /// Generate Mermaid diagram of the DAG
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");

        // Node ids are generated; step names only appear as quoted labels
        for node in self.graph.node_indices() {
            out.push_str(&format!(
                "    n{}[\"{}\"]\n",
                node.index(),
                mermaid_label(&self.graph[node])
            ));
        }

        for edge in self.graph.raw_edges() {
            out.push_str(&format!(
                "    n{} --> n{}\n",
                edge.source().index(),
                edge.target().index()
            ));
        }

        out
    }

    /// Generate DOT diagram of the DAG
    pub fn to_dot(&self) -> String {
        let mut out = format!("digraph \"{}\" {{\n", self.pipeline_name);
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for edge in self.graph.raw_edges() {
            out.push_str(&format!(
                "    \"{}\" -> \"{}\";\n",
                self.graph[edge.source()],
                self.graph[edge.target()]
            ));
        }

        // Isolated nodes have no edge to mention them
        for node in self.graph.node_indices() {
            if self.graph.neighbors_undirected(node).count() == 0 {
                out.push_str(&format!("    \"{}\";\n", self.graph[node]));
            }
        }

        out.push_str("}\n");
        out
    }

    /// Generate text representation of execution order
    pub fn to_text(&self, pipeline: &Pipeline) -> PipeflowResult<String> {
        let order = self.topological_order_names()?;
        let mut out = String::new();

        for (i, name) in order.iter().enumerate() {
            let step = pipeline.get_step(name)?;
            let deps = self.dependencies(name).unwrap_or_default();

            out.push_str(&format!("{}. {} ({})", i + 1, name, step.describe()));

            if !deps.is_empty() {
                out.push_str(&format!(" [depends: {}]", deps.join(", ")));
            }

            out.push('\n');
        }

        Ok(out)
    }
}

/// Escape a step name for use inside a quoted Mermaid label
fn mermaid_label(name: &str) -> String {
    name.replace('"', "#quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Step;
    use serde_json::Value;

    fn make_test_pipeline(steps: Vec<(&str, Vec<&str>)>) -> Pipeline {
        let mut pipeline = Pipeline::new("test");
        for (name, deps) in steps {
            pipeline
                .add_step(Step::new(name, |_| Ok(Value::Null)), &deps)
                .unwrap();
        }
        pipeline
    }

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_linear_dag() {
        let pipeline = make_test_pipeline(vec![("a", vec![]), ("b", vec!["a"]), ("c", vec!["b"])]);

        let order = DagBuilder::build(&pipeline).topological_order_names().unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_diamond_dag() {
        let pipeline = make_test_pipeline(vec![
            ("a", vec![]),
            ("b", vec!["a"]),
            ("c", vec!["a"]),
            ("d", vec!["b", "c"]),
        ]);

        let order = DagBuilder::build(&pipeline).topological_order_names().unwrap();

        // a must come first, d must come last
        assert_eq!(order[0], "a");
        assert_eq!(order[3], "d");
        // b and c can be in either order
        assert!(order[1] == "b" || order[1] == "c");
        assert!(order[2] == "b" || order[2] == "c");
    }

    #[test]
    fn test_order_respects_every_edge() {
        let pipeline = make_test_pipeline(vec![
            ("fetch", vec![]),
            ("schema", vec![]),
            ("parse", vec!["fetch"]),
            ("validate", vec!["parse", "schema"]),
            ("index", vec!["parse"]),
            ("publish", vec!["validate", "index"]),
            ("notify", vec!["publish", "fetch"]),
        ]);

        let order = DagBuilder::build(&pipeline).topological_order_names().unwrap();
        assert_eq!(order.len(), pipeline.len());

        for (step, deps) in pipeline.dependencies() {
            for dep in deps {
                assert!(
                    position(&order, dep) < position(&order, step),
                    "{} must run before {}",
                    dep,
                    step
                );
            }
        }
    }

    #[test]
    fn test_two_step_cycle() {
        let mut pipeline = make_test_pipeline(vec![("a", vec![]), ("b", vec!["a"])]);
        pipeline.add_dependency("a", "b").unwrap();

        let dag = DagBuilder::build(&pipeline);
        assert_eq!(dag.cycles(), vec![vec!["a".to_string(), "b".to_string()]]);
        assert!(matches!(
            dag.topological_order_names(),
            Err(PipeflowError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn test_every_cycle_is_reported() {
        // a -> b -> c -> a, plus c -> b, plus an unrelated self-loop on d
        let mut pipeline = make_test_pipeline(vec![
            ("a", vec![]),
            ("b", vec!["a"]),
            ("c", vec!["b"]),
            ("d", vec![]),
        ]);
        pipeline.add_dependency("a", "c").unwrap();
        pipeline.add_dependency("b", "c").unwrap();
        pipeline.add_dependency("d", "d").unwrap();

        let cycles = DagBuilder::build(&pipeline).cycles();
        assert_eq!(
            cycles,
            vec![
                vec!["d".to_string()],
                vec!["b".to_string(), "c".to_string()],
                vec!["a".to_string(), "b".to_string(), "c".to_string()],
            ]
        );
    }

    #[test]
    fn test_acyclic_graph_has_no_cycles() {
        let pipeline = make_test_pipeline(vec![("a", vec![]), ("b", vec!["a"]), ("c", vec!["a"])]);
        assert!(DagBuilder::build(&pipeline).cycles().is_empty());
    }

    #[test]
    fn test_mermaid_output() {
        let pipeline = make_test_pipeline(vec![("a", vec![]), ("b", vec!["a"])]);

        let mermaid = DagBuilder::build(&pipeline).to_mermaid();

        assert!(mermaid.contains("graph TD"));
        assert!(mermaid.contains("    n0[\"a\"]"));
        assert!(mermaid.contains("    n1[\"b\"]"));
        assert!(mermaid.contains("n0 --> n1"));
    }

    #[test]
    fn test_mermaid_quotes_awkward_names() {
        let pipeline = make_test_pipeline(vec![
            ("fetch data", vec![]),
            ("parse [v2]", vec!["fetch data"]),
            ("say \"hi\"", vec!["parse [v2]"]),
        ]);

        let mermaid = DagBuilder::build(&pipeline).to_mermaid();

        assert!(mermaid.contains("[\"fetch data\"]"));
        assert!(mermaid.contains("[\"parse [v2]\"]"));
        assert!(mermaid.contains("[\"say #quot;hi#quot;\"]"));
        for line in mermaid.lines().filter(|l| l.contains("-->")) {
            let ids: Vec<&str> = line.trim().split(" --> ").collect();
            assert_eq!(ids.len(), 2, "{}", line);
            assert!(ids.iter().all(|id| id.starts_with('n') && id[1..].parse::<usize>().is_ok()));
        }
    }

    #[test]
    fn test_dot_output_lists_isolated_steps() {
        let pipeline = make_test_pipeline(vec![("a", vec![]), ("b", vec!["a"]), ("lonely", vec![])]);

        let dot = DagBuilder::build(&pipeline).to_dot();

        assert!(dot.contains("\"a\" -> \"b\";"));
        assert!(dot.contains("    \"lonely\";"));
    }

    #[test]
    fn test_text_plan() {
        let pipeline = make_test_pipeline(vec![("a", vec![]), ("b", vec!["a"])]);

        let text = DagBuilder::build(&pipeline).to_text(&pipeline).unwrap();

        assert_eq!(text, "1. a (function)\n2. b (function) [depends: a]\n");
    }
}
