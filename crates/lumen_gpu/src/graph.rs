//! Dependency graph of kernel dispatches.
//!
//! A frame is a chain of iterations, each running collect, traverse, fetch
//! and bounce in that order. Every node depends on the node before it, so
//! the graph must stay linear and keep the stage order.

use std::collections::VecDeque;

use crate::error::{GpuError, GpuResult};

/// One wavefront kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Respawn idle slots as fresh camera rays
    Collect,
    /// Find the closest hit through the flattened BVH
    Traverse,
    /// Load material and shading data at the hit
    Fetch,
    /// Accumulate radiance and scatter
    Bounce,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Collect, Stage::Traverse, Stage::Fetch, Stage::Bounce];

    pub fn index(self) -> usize {
        match self {
            Stage::Collect => 0,
            Stage::Traverse => 1,
            Stage::Fetch => 2,
            Stage::Bounce => 3,
        }
    }

    /// Shader entry point implementing this stage.
    pub fn entry_point(self) -> &'static str {
        match self {
            Stage::Collect => "collect",
            Stage::Traverse => "traverse",
            Stage::Fetch => "fetch",
            Stage::Bounce => "bounce",
        }
    }

    /// Stage that must follow this one.
    pub fn next(self) -> Stage {
        match self {
            Stage::Collect => Stage::Traverse,
            Stage::Traverse => Stage::Fetch,
            Stage::Fetch => Stage::Bounce,
            Stage::Bounce => Stage::Collect,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.entry_point())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageNode {
    pub stage: Stage,
    pub iteration: usize,
    /// Indices of nodes that must finish first
    pub deps: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct StageGraph {
    nodes: Vec<StageNode>,
}

impl StageGraph {
    /// Linear chain of `iterations` full wavefront iterations.
    pub fn wavefront(iterations: usize) -> Self {
        let nodes = (0..iterations)
            .flat_map(|iteration| Stage::ALL.map(move |stage| (iteration, stage)))
            .enumerate()
            .map(|(i, (iteration, stage))| StageNode {
                stage,
                iteration,
                deps: if i == 0 { Vec::new() } else { vec![i - 1] },
            })
            .collect();
        Self { nodes }
    }

    pub fn from_nodes(nodes: Vec<StageNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[StageNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iterations(&self) -> usize {
        self.nodes.iter().map(|n| n.iteration + 1).max().unwrap_or(0)
    }

    /// Kahn ordering of the nodes; fails on cycles and dangling edges.
    pub fn topological_order(&self) -> GpuResult<Vec<usize>> {
        let n = self.nodes.len();
        let mut indegree = vec![0usize; n];
        let mut dependents = vec![Vec::new(); n];

        for (i, node) in self.nodes.iter().enumerate() {
            for &dep in &node.deps {
                if dep >= n {
                    return Err(GpuError::Schedule(format!(
                        "node {i} depends on missing node {dep}"
                    )));
                }
                indegree[i] += 1;
                dependents[dep].push(i);
            }
        }

        let mut ready: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = ready.pop_front() {
            order.push(i);
            for &next in &dependents[i] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.push_back(next);
                }
            }
        }

        if order.len() != n {
            return Err(GpuError::Schedule(format!(
                "stage graph has a cycle through {} nodes",
                n - order.len()
            )));
        }
        Ok(order)
    }

    /// Check the graph is a single chain that starts at collect and keeps
    /// the stage order, returning the dispatch order.
    pub fn validate(&self) -> GpuResult<Vec<Stage>> {
        let order = self.topological_order()?;

        for (position, &i) in order.iter().enumerate() {
            let node = &self.nodes[i];
            let expected_deps: &[usize] = if position == 0 { &[] } else { &order[position - 1..position] };
            if node.deps != expected_deps {
                return Err(GpuError::Schedule(format!(
                    "node {i} ({} of iteration {}) is not part of a single chain",
                    node.stage, node.iteration
                )));
            }

            let expected_stage = match position {
                0 => Stage::Collect,
                _ => self.nodes[order[position - 1]].stage.next(),
            };
            if node.stage != expected_stage {
                return Err(GpuError::Schedule(format!(
                    "{} scheduled where {} is required",
                    node.stage, expected_stage
                )));
            }
        }

        if let Some(&last) = order.last() {
            if self.nodes[last].stage != Stage::Bounce {
                return Err(GpuError::Schedule(format!(
                    "graph ends with {} instead of bounce",
                    self.nodes[last].stage
                )));
            }
        }

        Ok(order.into_iter().map(|i| self.nodes[i].stage).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wavefront_chain() {
        let graph = StageGraph::wavefront(3);
        assert_eq!(graph.len(), 12);
        assert_eq!(graph.iterations(), 3);

        let order = graph.validate().unwrap();
        let expected: Vec<Stage> = (0..3).flat_map(|_| Stage::ALL).collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn test_empty_graph_is_valid() {
        let graph = StageGraph::wavefront(0);
        assert!(graph.is_empty());
        assert!(graph.validate().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_out_of_order_stage() {
        let nodes = vec![
            StageNode { stage: Stage::Collect, iteration: 0, deps: vec![] },
            StageNode { stage: Stage::Fetch, iteration: 0, deps: vec![0] },
            StageNode { stage: Stage::Traverse, iteration: 0, deps: vec![1] },
            StageNode { stage: Stage::Bounce, iteration: 0, deps: vec![2] },
        ];
        let err = StageGraph::from_nodes(nodes).validate().unwrap_err();
        assert!(matches!(err, GpuError::Schedule(_)));
    }

    #[test]
    fn test_rejects_cycle() {
        let nodes = vec![
            StageNode { stage: Stage::Collect, iteration: 0, deps: vec![1] },
            StageNode { stage: Stage::Traverse, iteration: 0, deps: vec![0] },
        ];
        let err = StageGraph::from_nodes(nodes).topological_order().unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_rejects_parallel_branches() {
        let mut graph = StageGraph::wavefront(1);
        graph.nodes[2].deps = vec![0];
        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_rejects_truncated_iteration() {
        let mut graph = StageGraph::wavefront(1);
        graph.nodes.pop();
        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_stage_cycle() {
        for stage in Stage::ALL {
            assert_eq!(Stage::ALL[(stage.index() + 1) % 4], stage.next());
        }
        assert_eq!(Stage::Fetch.to_string(), "fetch");
    }
}
