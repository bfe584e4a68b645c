//! The Graph Builder: assembles a directed FK graph over
//! qualified table keys, computes degree centrality on the undirected
//! projection, and partitions tables into subject areas via greedy
//! modularity maximization.

use std::collections::HashMap;

use graphrs::{Edge, Graph, GraphSpecs, Node};
use tracing::instrument;

use crate::error::SchemaMindError;
use crate::models::SchemaEdge;

/// The assembled FK graph plus its derived per-table metrics.
pub struct SchemaGraph {
    pub graph: Graph<String, ()>,
    pub table_keys: Vec<String>,
}

pub struct GraphBuildResult {
    pub centrality: HashMap<String, f64>,
    /// community id -> member table keys, ids are stable within one build
    /// but carry no meaning across builds.
    pub communities: HashMap<String, usize>,
}

impl SchemaGraph {
    #[instrument(skip(table_keys, edges))]
    pub fn build(table_keys: &[String], edges: &[SchemaEdge]) -> Result<Self, SchemaMindError> {
        let mut graph = Graph::<String, ()>::new(GraphSpecs::directed());

        for key in table_keys {
            graph.add_node(Node::from_name(key.clone()));
        }

        for edge in edges {
            if !table_keys.contains(&edge.src) || !table_keys.contains(&edge.dst) {
                continue;
            }
            if edge.src == edge.dst {
                // Self-referencing FK: still a real edge for centrality/community
                // purposes, but graphrs rejects true self-loops on some specs;
                // keep it since GraphSpecs::directed() allows multi-edges.
            }
            let graph_edge = Edge::new(edge.src.clone(), edge.dst.clone());
            graph
                .add_edge(graph_edge)
                .map_err(|e| SchemaMindError::SchemaReflection(format!("graph edge error: {e:?}")))?;
        }

        Ok(Self {
            graph,
            table_keys: table_keys.to_vec(),
        })
    }

    /// Degree centrality on the undirected projection, normalized by `n - 1`
    ///. Isolated nodes (n <= 1) all score 0.0.
    pub fn degree_centrality(&self) -> HashMap<String, f64> {
        let n = self.table_keys.len();
        if n <= 1 {
            return self.table_keys.iter().map(|k| (k.clone(), 0.0)).collect();
        }

        let mut degree: HashMap<&String, usize> = HashMap::new();
        for edge in self.graph.get_all_edges() {
            if edge.u != edge.v {
                *degree.entry(&edge.u).or_default() += 1;
                *degree.entry(&edge.v).or_default() += 1;
            }
        }

        self.table_keys
            .iter()
            .map(|k| {
                let d = degree.get(k).copied().unwrap_or(0);
                (k.clone(), d as f64 / (n - 1) as f64)
            })
            .collect()
    }

    /// Greedy modularity maximization (CNM-style) over the undirected
    /// projection of the FK graph. Each table starts in its own
    /// community; the pair of communities whose merge yields the largest
    /// modularity gain is merged repeatedly until no merge would increase
    /// modularity. Returns table key -> community index.
    pub fn greedy_modularity_communities(&self) -> HashMap<String, usize> {
        let n = self.table_keys.len();
        if n == 0 {
            return HashMap::new();
        }

        let index_of: HashMap<&String, usize> = self
            .table_keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k, i))
            .collect();

        // Undirected, unweighted-per-pair adjacency weight = count of FK
        // edges between the pair (in either direction), self-loops excluded.
        let mut weight: HashMap<(usize, usize), f64> = HashMap::new();
        for edge in self.graph.get_all_edges() {
            let (Some(&u), Some(&v)) = (index_of.get(&edge.u), index_of.get(&edge.v)) else {
                continue;
            };
            if u == v {
                continue;
            }
            let key = if u < v { (u, v) } else { (v, u) };
            *weight.entry(key).or_insert(0.0) += 1.0;
        }

        if weight.is_empty() {
            // No edges at all: a single community contains every table.
            return self.table_keys.iter().map(|k| (k.clone(), 0)).collect();
        }

        let two_m: f64 = weight.values().sum::<f64>() * 2.0;

        // community id -> (members, degree sum, sparse e-row to other communities)
        let mut members: HashMap<usize, Vec<usize>> =
            (0..n).map(|i| (i, vec![i])).collect();
        let mut degree_sum: HashMap<usize, f64> = HashMap::new();
        let mut e: HashMap<usize, HashMap<usize, f64>> = HashMap::new();

        for i in 0..n {
            degree_sum.insert(i, 0.0);
            e.insert(i, HashMap::new());
        }
        for (&(u, v), &w) in &weight {
            *degree_sum.get_mut(&u).unwrap() += w;
            *degree_sum.get_mut(&v).unwrap() += w;
            e.get_mut(&u).unwrap().insert(v, w);
            e.get_mut(&v).unwrap().insert(u, w);
        }

        let a = |degree_sum: &HashMap<usize, f64>, c: usize| -> f64 {
            degree_sum.get(&c).copied().unwrap_or(0.0) / two_m
        };

        loop {
            let mut best: Option<(usize, usize, f64)> = None;

            for (&i, neighbors) in &e {
                for (&j, &w_ij) in neighbors {
                    if j <= i {
                        continue;
                    }
                    let e_ij = w_ij / two_m;
                    let delta = 2.0 * (e_ij - a(&degree_sum, i) * a(&degree_sum, j));
                    if best.map(|(_, _, best_delta)| delta > best_delta).unwrap_or(true) {
                        best = Some((i, j, delta));
                    }
                }
            }

            let Some((i, j, delta)) = best else { break };
            if delta <= 0.0 {
                break;
            }

            // Merge j into i.
            let j_members = members.remove(&j).unwrap();
            members.get_mut(&i).unwrap().extend(j_members);

            let j_degree = degree_sum.remove(&j).unwrap();
            *degree_sum.get_mut(&i).unwrap() += j_degree;

            let j_row = e.remove(&j).unwrap();
            for (k, w) in j_row {
                if k == i {
                    continue;
                }
                *e.get_mut(&i).unwrap().entry(k).or_insert(0.0) += w;
                if let Some(k_row) = e.get_mut(&k) {
                    k_row.remove(&j);
                    *k_row.entry(i).or_insert(0.0) += w;
                }
            }
            e.get_mut(&i).unwrap().remove(&j);
            for row in e.values_mut() {
                row.remove(&j);
            }
        }

        let mut result = HashMap::new();
        for (community_id, member_indices) in &members {
            for &idx in member_indices {
                result.insert(self.table_keys[idx].clone(), *community_id);
            }
        }
        result
    }

    /// Raw undirected degree per table (self-loops excluded), used by the
    /// Classifier's BRIDGE/FACT/REFERENCE rules.
    pub fn undirected_degree(&self) -> HashMap<String, usize> {
        let mut degree: HashMap<String, usize> =
            self.table_keys.iter().map(|k| (k.clone(), 0)).collect();
        for edge in self.graph.get_all_edges() {
            if edge.u != edge.v {
                *degree.entry(edge.u.clone()).or_default() += 1;
                *degree.entry(edge.v.clone()).or_default() += 1;
            }
        }
        degree
    }

    pub fn analyze(&self) -> GraphBuildResult {
        GraphBuildResult {
            centrality: self.degree_centrality(),
            communities: self.greedy_modularity_communities(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(src: &str, dst: &str) -> SchemaEdge {
        SchemaEdge {
            src: src.to_string(),
            dst: dst.to_string(),
            descriptor: format!("{src}->{dst}"),
        }
    }

    #[test]
    fn isolated_tables_have_zero_centrality() {
        let keys = vec!["a".to_string(), "b".to_string()];
        let graph = SchemaGraph::build(&keys, &[]).unwrap();
        let centrality = graph.degree_centrality();
        assert_eq!(centrality["a"], 0.0);
        assert_eq!(centrality["b"], 0.0);
    }

    #[test]
    fn star_hub_has_higher_centrality_than_leaves() {
        let keys = vec!["hub".to_string(), "a".to_string(), "b".to_string(), "c".to_string()];
        let edges = vec![edge("a", "hub"), edge("b", "hub"), edge("c", "hub")];
        let graph = SchemaGraph::build(&keys, &edges).unwrap();
        let centrality = graph.degree_centrality();
        assert!(centrality["hub"] > centrality["a"]);
    }

    #[test]
    fn two_disconnected_clusters_form_two_communities() {
        let keys = vec![
            "a1".to_string(),
            "a2".to_string(),
            "b1".to_string(),
            "b2".to_string(),
        ];
        let edges = vec![edge("a1", "a2"), edge("b1", "b2")];
        let graph = SchemaGraph::build(&keys, &edges).unwrap();
        let communities = graph.greedy_modularity_communities();
        assert_eq!(communities["a1"], communities["a2"]);
        assert_eq!(communities["b1"], communities["b2"]);
        assert_ne!(communities["a1"], communities["b1"]);
    }

    #[test]
    fn no_edges_forms_a_single_shared_community() {
        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let graph = SchemaGraph::build(&keys, &[]).unwrap();
        let communities = graph.greedy_modularity_communities();
        assert_eq!(communities["a"], communities["b"]);
        assert_eq!(communities["b"], communities["c"]);
    }

    #[test]
    fn fk_cycle_terminates_and_covers_all_tables() {
        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let edges = vec![edge("a", "b"), edge("b", "c"), edge("c", "a")];
        let graph = SchemaGraph::build(&keys, &edges).unwrap();
        let result = graph.analyze();
        assert_eq!(result.centrality.len(), 3);
        assert_eq!(result.communities.len(), 3);
    }
}
