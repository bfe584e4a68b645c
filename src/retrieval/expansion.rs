//! The Graph Expander: augments a seed table selection with
//! useful graph neighbors, up to a cap `k`, without ever reordering the
//! original seeds or introducing tables absent from the `SchemaCard`.

use std::collections::HashSet;

use crate::models::Archetype;
use crate::schema::card::SchemaCard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionStrategy {
    FkFollowing,
    Simple,
}

pub struct GraphExpander<'a> {
    card: &'a SchemaCard,
}

impl<'a> GraphExpander<'a> {
    pub fn new(card: &'a SchemaCard) -> Self {
        Self { card }
    }

    /// Expand `seeds` to at most `k` tables. Invalid seeds (absent from the
    /// card) are dropped first; the remaining seeds keep their original
    /// order and always come first in the result.
    pub fn expand(&self, seeds: &[String], k: usize, strategy: ExpansionStrategy) -> Vec<String> {
        let valid_seeds = dedupe_existing(seeds, self.card);
        if valid_seeds.is_empty() || k == 0 {
            return Vec::new();
        }

        match strategy {
            ExpansionStrategy::Simple => self.expand_simple(&valid_seeds, k),
            ExpansionStrategy::FkFollowing => self.expand_fk_following(&valid_seeds, k),
        }
    }

    fn expand_simple(&self, seeds: &[String], k: usize) -> Vec<String> {
        let mut selected = seeds.to_vec();
        let mut seen: HashSet<String> = selected.iter().cloned().collect();

        'outer: for seed in seeds {
            for neighbor in self.card.neighbors(seed) {
                if selected.len() >= k {
                    break 'outer;
                }
                if seen.contains(&neighbor) || self.card.table(&neighbor).is_none() {
                    continue;
                }
                seen.insert(neighbor.clone());
                selected.push(neighbor);
            }
        }

        selected.truncate(k);
        selected
    }

    fn expand_fk_following(&self, seeds: &[String], k: usize) -> Vec<String> {
        let mut selected = seeds.to_vec();
        let mut seen: HashSet<String> = selected.iter().cloned().collect();
        let first_subject_area = self.card.table(&seeds[0]).map(|t| t.subject_area.clone());

        while selected.len() < k {
            let mut frontier: Vec<String> = Vec::new();
            for table in &selected {
                for neighbor in self.card.neighbors(table) {
                    if seen.contains(&neighbor) || self.card.table(&neighbor).is_none() {
                        continue;
                    }
                    if !frontier.contains(&neighbor) {
                        frontier.push(neighbor);
                    }
                }
            }

            if frontier.is_empty() {
                break;
            }

            let best = frontier
                .into_iter()
                .map(|t| {
                    let utility = self.neighbor_utility(&t, &first_subject_area);
                    (t, utility)
                })
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

            let Some((candidate, _)) = best else { break };
            seen.insert(candidate.clone());
            selected.push(candidate);
        }

        selected
    }

    /// Neighbor utility: archetype base + metric/date/centrality
    /// boosts, audit/archive penalties, same-subject-area bonus relative to
    /// the first seed.
    fn neighbor_utility(&self, table_key: &str, first_subject_area: &Option<String>) -> f64 {
        let Some(profile) = self.card.table(table_key) else {
            return f64::MIN;
        };

        let mut utility = match profile.archetype {
            Archetype::Fact => 2.0,
            Archetype::Dimension => 1.0,
            _ => 0.5,
        };
        utility += 0.3 * (profile.n_metrics.min(2) as f64);
        if profile.n_dates > 0 {
            utility += 0.2;
        }
        utility += 0.2 * profile.centrality;
        if profile.is_audit_like {
            utility -= 0.5;
        }
        if profile.is_archive {
            utility -= 0.6;
        }
        if let Some(area) = first_subject_area {
            if &profile.subject_area == area {
                utility += 0.2;
            }
        }
        utility
    }
}

fn dedupe_existing(seeds: &[String], card: &SchemaCard) -> Vec<String> {
    let mut seen = HashSet::new();
    seeds
        .iter()
        .filter(|s| card.table(s).is_some())
        .filter(|s| seen.insert((*s).clone()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnProfile, ColumnRole, SchemaEdge, TableProfile};
    use std::collections::BTreeMap;

    fn table(key: &str, archetype: Archetype, subject_area: &str) -> TableProfile {
        TableProfile {
            key: key.to_string(),
            schema: "public".into(),
            name: key.split('.').last().unwrap().to_string(),
            columns: vec![ColumnProfile {
                name: "id".into(),
                sql_type: "integer".into(),
                nullable: false,
                is_primary_key: true,
                is_foreign_key: false,
                fk_reference: None,
                null_rate: None,
                approx_distinct_ratio: None,
                sample_patterns: Vec::new(),
                semantic_tags: Vec::new(),
                role: ColumnRole::Key,
                distinct_values: None,
                value_range: None,
            }],
            pk_columns: vec!["id".into()],
            fks: Vec::new(),
            approx_rowcount: None,
            n_rows_sampled: 0,
            archetype,
            summary: String::new(),
            subject_area: subject_area.into(),
            centrality: 0.0,
            n_metrics: 0,
            n_dates: 0,
            is_archive: false,
            is_audit_like: false,
        }
    }

    fn edge(src: &str, dst: &str) -> SchemaEdge {
        SchemaEdge {
            src: src.into(),
            dst: dst.into(),
            descriptor: format!("{src}->{dst}"),
        }
    }

    fn sample_card() -> SchemaCard {
        let mut tables = BTreeMap::new();
        tables.insert(
            "sales.orders".to_string(),
            table("sales.orders", Archetype::Fact, "area_0"),
        );
        tables.insert(
            "sales.customers".to_string(),
            table("sales.customers", Archetype::Dimension, "area_0"),
        );
        tables.insert(
            "sales.products".to_string(),
            table("sales.products", Archetype::Dimension, "area_0"),
        );
        SchemaCard {
            dialect: "postgres".into(),
            url_fingerprint: "fp".into(),
            schemas: vec!["sales".into()],
            tables,
            edges: vec![
                edge("sales.orders", "sales.customers"),
                edge("sales.orders", "sales.products"),
            ],
            subject_areas: BTreeMap::new(),
            built_at: chrono::Utc::now(),
            reflection_hash: "x".into(),
        }
    }

    #[test]
    fn invalid_seeds_are_dropped() {
        let card = sample_card();
        let expander = GraphExpander::new(&card);
        let result = expander.expand(
            &["sales.orders".to_string(), "sales.missing".to_string()],
            3,
            ExpansionStrategy::Simple,
        );
        assert!(!result.contains(&"sales.missing".to_string()));
    }

    #[test]
    fn seeds_stay_first_and_in_order() {
        let card = sample_card();
        let expander = GraphExpander::new(&card);
        let result = expander.expand(
            &["sales.customers".to_string(), "sales.orders".to_string()],
            4,
            ExpansionStrategy::FkFollowing,
        );
        assert_eq!(result[0], "sales.customers");
        assert_eq!(result[1], "sales.orders");
    }

    #[test]
    fn fk_following_fills_up_to_k() {
        let card = sample_card();
        let expander = GraphExpander::new(&card);
        let result = expander.expand(&["sales.orders".to_string()], 3, ExpansionStrategy::FkFollowing);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn simple_strategy_adds_direct_neighbors_only() {
        let card = sample_card();
        let expander = GraphExpander::new(&card);
        let result = expander.expand(&["sales.orders".to_string()], 3, ExpansionStrategy::Simple);
        assert!(result.contains(&"sales.customers".to_string()));
        assert!(result.contains(&"sales.products".to_string()));
    }
}
