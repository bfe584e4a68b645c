//! Turns a free-form request into a structured query plan: selects a
//! candidate table set via the Retrieval Engine and Graph Expander, picks a
//! main table, bridges gaps in the join graph, and renders table summaries,
//! join examples, group-by/filter candidates, and a narrative next step.
//! Never fails outright — dialect-tooling errors downgrade to notes, and an
//! empty candidate set downgrades the plan to `NeedsInput` rather than an
//! error.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::config::Config;
use crate::dialect::facade::{DialectFacade, DialectName};
use crate::models::plan::{
    FilterCandidate, JoinExample, JoinStep, NextAction, PlanColumn, PlanStatus, QueryPlan,
    RelevantTable, SelectedColumn,
};
use crate::models::{Archetype, ColumnProfile, ColumnRole, SchemaEdge, TableProfile};
use crate::retrieval::engine::{RetrievalEngine, RetrievalStrategy};
use crate::retrieval::expansion::{ExpansionStrategy, GraphExpander};
use crate::schema::card::SchemaCard;
use crate::schema::service::SchemaService;
use crate::utils::tokenize::tokenize_identifier;

const DEFAULT_TABLE_BUDGET: usize = 6;
const DEFAULT_MAX_COLUMNS_PER_TABLE: usize = 12;
const DEFAULT_SAMPLE_VALUES: usize = 5;
const DEFAULT_JOIN_LIMIT: usize = 8;
const DEFAULT_GROUP_BY_LIMIT: usize = 6;

/// Column tokens that mark an FK edge as administrative bookkeeping rather
/// than a meaningful business relationship (last-edited-by, created-by, …).
const ADMIN_TOKENS: &[&str] = &[
    "last", "edited", "created", "modified", "updated", "changed", "deleted", "by",
];
/// Table-name tokens for generic lookup/identity tables, penalized as bridge
/// hops because they rarely carry the attribute the caller actually wants.
const IDENTITY_TOKENS: &[&str] = &["type", "category", "status", "code", "lookup", "ref", "reference"];
const AGGREGATE_HINTS: &[&str] = &[
    "top", "rank", "sum", "total", "count", "avg", "average", "median", "percent", "percentage",
    "group", "order",
];

/// Caller-provided caps for `plan_query_for_intent`: how many tables to
/// consider, how many columns to render per table, and how many sample
/// values to attach per column. Absent fields fall back to the builder's
/// defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PlanBudget {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tables: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub columns_per_table: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sample_values: Option<usize>,
}

pub struct PlanBuilder<'a> {
    card: &'a SchemaCard,
    service: &'a SchemaService,
    dialect: &'a DialectFacade,
    config: &'a Config,
    target_dialect: DialectName,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(
        card: &'a SchemaCard,
        service: &'a SchemaService,
        dialect: &'a DialectFacade,
        config: &'a Config,
        target_dialect: DialectName,
    ) -> Self {
        Self {
            card,
            service,
            dialect,
            config,
            target_dialect,
        }
    }

    #[instrument(skip(self, request, constraints, budget))]
    pub async fn build(
        &self,
        request: &str,
        constraints: Option<&BTreeMap<String, Value>>,
        full_detail: bool,
        budget: Option<&PlanBudget>,
    ) -> QueryPlan {
        if self.card.tables.is_empty() {
            return needs_input(
                request,
                "The database has no reflected tables yet; nothing to plan against.",
            );
        }

        let mut assumptions = Vec::new();
        let table_budget = budget.and_then(|b| b.tables).unwrap_or(DEFAULT_TABLE_BUDGET).max(1);
        let columns_per_table = budget
            .and_then(|b| b.columns_per_table)
            .unwrap_or(DEFAULT_MAX_COLUMNS_PER_TABLE)
            .max(1);
        let sample_cap = budget
            .and_then(|b| b.sample_values)
            .unwrap_or(if full_detail { DEFAULT_SAMPLE_VALUES } else { 0 });

        if !self.service.embeddings_available() {
            assumptions.push("embeddings unavailable; retrieval used lexical scoring only".to_string());
        }

        let query_vector = self.service.embed_query(request).await;

        let retrieval = RetrievalEngine::new(self.card, self.service, self.config);
        let scored = retrieval.retrieve(
            request,
            table_budget,
            RetrievalStrategy::Combined,
            query_vector.as_deref(),
            self.config.strict_archive_exclude,
        );
        let mut selected: Vec<String> = scored.into_iter().map(|s| s.table).collect();

        if selected.is_empty() {
            selected = self.fallback_by_centrality(table_budget);
            if !selected.is_empty() {
                assumptions.push(
                    "no lexical or embedding matches for this request; falling back to the most central tables"
                        .to_string(),
                );
            }
        }

        if selected.is_empty() {
            return needs_input(
                request,
                "No tables matched this request; name a specific table, column, or business concept.",
            );
        }

        let expander = GraphExpander::new(self.card);
        selected = expander.expand(&selected, table_budget, ExpansionStrategy::FkFollowing);

        let query_tokens: BTreeSet<String> = tokenize_identifier(request).into_iter().collect();
        let main_table = self.pick_main_table(&selected, &query_tokens);

        if let Some(ref main) = main_table {
            if let Some(pos) = selected.iter().position(|k| k == main) {
                let mt = selected.remove(pos);
                selected.insert(0, mt);
            }
            self.augment_with_bridges(main, &mut selected);
        }

        let selected_set: BTreeSet<String> = selected.iter().cloned().collect();

        let mut relevant_tables = Vec::with_capacity(selected.len());
        let mut key_columns = BTreeMap::new();
        for key in &selected {
            let Some(table) = self.card.table(key) else { continue };
            relevant_tables.push(self.table_summary(table, columns_per_table, sample_cap));
            key_columns.insert(key.clone(), table.pk_columns.clone());
        }

        let (join_examples, join_plan) = if let Some(ref main) = main_table {
            (
                self.build_join_examples(&selected_set, main, &query_tokens).await,
                self.build_join_plan(main, &selected_set).await,
            )
        } else {
            (Vec::new(), Vec::new())
        };

        let mut group_by_candidates = Vec::new();
        let mut filter_candidates = Vec::new();
        let mut selected_columns = Vec::new();
        if let Some(ref main) = main_table {
            group_by_candidates = self.group_by_candidates(&selected, main);
            filter_candidates = self.filter_candidates(&selected);
            selected_columns = self.selected_columns(&selected, main);
        }

        let (constraint_filters, constraint_notes) = self.apply_constraints(constraints, &selected);
        filter_candidates.extend(constraint_filters);
        assumptions.extend(constraint_notes);

        let suggested_approach = main_table
            .as_deref()
            .map(|main| self.suggested_approach(main, &selected, request))
            .unwrap_or_else(|| "Inspect the listed tables before deciding how to proceed.".to_string());

        let mut confidence: f64 = 0.5;
        if main_table.is_some() {
            confidence += 0.2;
        }
        if self.service.embeddings_available() {
            confidence += 0.15;
        }
        if !join_plan.is_empty() || selected.len() <= 1 {
            confidence += 0.15;
        }
        confidence = confidence.clamp(0.0, 1.0);

        let (next_action, clarifications) = if confidence < 0.55 {
            (
                NextAction::InspectTable,
                Some(vec![format!(
                    "Confidence is low; consider calling get_table_info on {} before executing a query.",
                    main_table.clone().unwrap_or_default()
                )]),
            )
        } else {
            (NextAction::ExecuteQuery, None)
        };

        QueryPlan {
            request: request.to_string(),
            relevant_tables,
            join_examples,
            suggested_approach,
            key_columns,
            main_table,
            join_plan,
            group_by_candidates,
            filter_candidates,
            selected_columns,
            draft_sql: None,
            clarifications,
            assumptions,
            confidence,
            status: PlanStatus::Ok,
            next_action,
        }
    }

    fn fallback_by_centrality(&self, k: usize) -> Vec<String> {
        let mut ranked: Vec<(String, f64)> = self
            .card
            .tables
            .values()
            .filter(|t| !t.is_archive)
            .map(|t| (t.key.clone(), t.centrality))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
        ranked.into_iter().take(k).map(|(k, _)| k).collect()
    }

    fn pick_main_table(&self, selected: &[String], query_tokens: &BTreeSet<String>) -> Option<String> {
        let mut candidates: Vec<(String, f64)> = selected
            .iter()
            .filter_map(|k| self.card.table(k).map(|t| (k.clone(), main_table_score(query_tokens, t))))
            .collect();
        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
        candidates.into_iter().next().map(|(k, _)| k)
    }

    /// For each selected table not directly adjacent to `main_table`, find
    /// the best-scoring one-hop bridge table and splice it into the
    /// selection. Leaves the table alone if no bridge candidate exists.
    fn augment_with_bridges(&self, main_table: &str, selected: &mut Vec<String>) {
        let direct_neighbors: BTreeSet<String> = self.card.neighbors(main_table).into_iter().collect();
        let snapshot = selected.clone();
        let mut known: BTreeSet<String> = selected.iter().cloned().collect();

        for t in &snapshot {
            if t == main_table || direct_neighbors.contains(t) {
                continue;
            }
            let t_neighbors: BTreeSet<String> = self.card.neighbors(t).into_iter().collect();
            let mut candidates: Vec<String> = direct_neighbors
                .intersection(&t_neighbors)
                .filter(|x| !known.contains(*x))
                .cloned()
                .collect();
            if candidates.is_empty() {
                continue;
            }
            candidates.sort();

            let mut scored: Vec<(String, f64)> = candidates
                .into_iter()
                .map(|x| {
                    let score = self.score_bridge_candidate(main_table, t, &x);
                    (x, score)
                })
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(&b.0)));

            if let Some((best, _)) = scored.into_iter().next() {
                known.insert(best.clone());
                selected.push(best);
            }
        }
    }

    fn score_bridge_candidate(&self, main_table: &str, t: &str, x: &str) -> f64 {
        let mut score = 0.0_f64;

        let main_area = self.card.table(main_table).map(|p| p.subject_area.as_str());
        let t_area = self.card.table(t).map(|p| p.subject_area.as_str());
        let x_area = self.card.table(x).map(|p| p.subject_area.as_str());
        if x_area.is_some() && (x_area == main_area || x_area == t_area) {
            score += 0.2;
        }

        if self.card.table(x).map(|p| p.is_audit_like).unwrap_or(false) {
            score -= 0.6;
        }

        let bridge_tokens: Vec<String> = fk_tokens_between(self.card, main_table, x)
            .into_iter()
            .chain(fk_tokens_between(self.card, x, t))
            .collect();
        let admin_hit = bridge_tokens.iter().any(|tok| ADMIN_TOKENS.contains(&tok.as_str()));
        if admin_hit {
            score -= 0.4;
        }

        let x_name = self.card.table(x).map(|p| p.name.as_str()).unwrap_or(x);
        let identity_hit = tokenize_identifier(x_name)
            .iter()
            .any(|tok| IDENTITY_TOKENS.contains(&tok.as_str()));
        if admin_hit && identity_hit {
            score -= 0.4;
        }
        if identity_hit {
            score -= 0.2;
        }

        if !admin_hit && bridge_tokens.iter().any(|tok| tok == "id") {
            score += 0.1;
        }

        score
    }

    fn table_summary(&self, table: &TableProfile, columns_per_table: usize, sample_cap: usize) -> RelevantTable {
        let mut columns: Vec<&ColumnProfile> = table.columns.iter().collect();
        columns.sort_by_key(column_priority);
        columns.truncate(columns_per_table);

        let mut common_filter_hints = Vec::new();
        let plan_columns = columns
            .into_iter()
            .map(|c| {
                if let Some(hint) = filter_hint(c) {
                    common_filter_hints.push(hint);
                }
                PlanColumn {
                    name: c.name.clone(),
                    sql_type: c.sql_type.clone(),
                    nullable: c.nullable,
                    is_primary_key: c.is_primary_key,
                    is_foreign_key: c.is_foreign_key,
                    role: c.role.to_string(),
                    sample_values: if sample_cap > 0 {
                        c.distinct_values
                            .as_ref()
                            .map(|v| v.iter().take(sample_cap).cloned().collect())
                    } else {
                        None
                    },
                }
            })
            .collect();

        RelevantTable {
            table: table.key.clone(),
            purpose: table.summary.clone(),
            columns: plan_columns,
            common_filter_hints,
        }
    }

    fn join_example_score(&self, edge: &SchemaEdge, main_table: &str, query_tokens: &BTreeSet<String>) -> f64 {
        let mut score = 0.0_f64;
        if edge.src == main_table || edge.dst == main_table {
            score += 1.0;
        }

        let src_arch = self.card.table(&edge.src).map(|t| t.archetype);
        let dst_arch = self.card.table(&edge.dst).map(|t| t.archetype);
        if src_arch == Some(Archetype::Fact) && dst_arch == Some(Archetype::Dimension) {
            score += 0.2;
        }
        if src_arch == Some(Archetype::Dimension) && dst_arch == Some(Archetype::Dimension) {
            score -= 0.2;
        }

        let src_tokens: BTreeSet<String> = tokenize_identifier(&edge.src).into_iter().collect();
        let dst_tokens: BTreeSet<String> = tokenize_identifier(&edge.dst).into_iter().collect();
        if !query_tokens.is_disjoint(&src_tokens) || !query_tokens.is_disjoint(&dst_tokens) {
            score += 0.2;
        }

        if edge.src == edge.dst && edge.src != main_table {
            score -= 0.3;
        }

        score
    }

    async fn build_join_examples(
        &self,
        selected_set: &BTreeSet<String>,
        main_table: &str,
        query_tokens: &BTreeSet<String>,
    ) -> Vec<JoinExample> {
        let mut scored: Vec<(&SchemaEdge, f64)> = self
            .card
            .edges
            .iter()
            .filter(|e| selected_set.contains(&e.src) && selected_set.contains(&e.dst))
            .map(|e| (e, self.join_example_score(e, main_table, query_tokens)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| (a.0.src.as_str(), a.0.dst.as_str()).cmp(&(b.0.src.as_str(), b.0.dst.as_str())))
        });
        scored.truncate(DEFAULT_JOIN_LIMIT);

        let mut out = Vec::with_capacity(scored.len());
        for (edge, _) in scored {
            let Some((local_col, ref_col)) = fk_columns_for_edge(self.card, edge) else {
                continue;
            };
            let on = self.compiled_join_condition(&edge.src, &edge.dst, local_col, ref_col).await;
            out.push(JoinExample {
                left_table: edge.src.clone(),
                right_table: edge.dst.clone(),
                sql_on_clause: on,
            });
        }
        out
    }

    /// Spanning-tree join plan from `main_table` over the induced subgraph of
    /// the selected tables, one `JoinStep` per edge traversed.
    async fn build_join_plan(&self, main_table: &str, selected_set: &BTreeSet<String>) -> Vec<JoinStep> {
        let edges_in_selection: Vec<&SchemaEdge> = self
            .card
            .edges
            .iter()
            .filter(|e| selected_set.contains(&e.src) && selected_set.contains(&e.dst))
            .collect();

        let mut adjacency: BTreeMap<String, Vec<&SchemaEdge>> = BTreeMap::new();
        for e in &edges_in_selection {
            adjacency.entry(e.src.clone()).or_default().push(e);
            adjacency.entry(e.dst.clone()).or_default().push(e);
        }

        let mut visited: BTreeSet<String> = BTreeSet::new();
        visited.insert(main_table.to_string());
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(main_table.to_string());

        let mut steps = Vec::new();
        while let Some(current) = queue.pop_front() {
            let Some(edges) = adjacency.get(&current) else { continue };
            let mut local_edges: Vec<&SchemaEdge> = edges.clone();
            local_edges.sort_by_key(|e| if e.src == current { e.dst.clone() } else { e.src.clone() });

            for e in local_edges {
                let neighbor = if e.src == current { e.dst.clone() } else { e.src.clone() };
                if visited.contains(&neighbor) {
                    continue;
                }
                visited.insert(neighbor.clone());

                let (local_col, ref_col) = fk_columns_for_edge(self.card, e).unwrap_or(("id", "id"));
                let on = self.compiled_join_condition(&current, &neighbor, local_col, ref_col).await;
                let cardinality = if e.src == current { "many-to-one" } else { "one-to-many" };
                let purpose = join_purpose(self.card, &neighbor);

                steps.push(JoinStep {
                    left_table: current.clone(),
                    right_table: neighbor.clone(),
                    on,
                    cardinality: cardinality.to_string(),
                    purpose,
                });
                queue.push_back(neighbor);
            }
        }
        steps
    }

    /// Round-trip a trivial join SQL string through the dialect facade to
    /// get a normalized `ON` clause for the active target dialect; falls
    /// back to the raw clause if the facade can't parse it (dialect errors
    /// never fail planning).
    async fn compiled_join_condition(&self, left: &str, right: &str, local_col: &str, ref_col: &str) -> String {
        let raw = format!("{left}.{local_col} = {right}.{ref_col}");
        let sql = format!("SELECT 1 FROM {left} JOIN {right} ON {raw}");
        match self
            .dialect
            .transpile(&sql, self.target_dialect, self.target_dialect, false)
            .await
        {
            Ok(outcome) => extract_on_clause(&outcome.sql).unwrap_or(raw),
            Err(_) => raw,
        }
    }

    fn group_by_candidates(&self, selected: &[String], main_table: &str) -> Vec<String> {
        let mut out = Vec::new();
        for key in selected {
            if key == main_table {
                continue;
            }
            let Some(table) = self.card.table(key) else { continue };
            if table.archetype != Archetype::Dimension {
                continue;
            }
            for c in &table.columns {
                if matches!(c.role, ColumnRole::Category | ColumnRole::Text) {
                    out.push(format!("{key}.{}", c.name));
                }
            }
        }
        if let Some(main) = self.card.table(main_table) {
            for c in main.date_columns() {
                out.push(format!("{main_table}.{}", c.name));
            }
        }
        out.truncate(DEFAULT_GROUP_BY_LIMIT);
        out
    }

    fn filter_candidates(&self, selected: &[String]) -> Vec<FilterCandidate> {
        let mut out = Vec::new();
        for key in selected {
            let Some(table) = self.card.table(key) else { continue };
            for c in table.date_columns() {
                out.push(FilterCandidate {
                    table: key.clone(),
                    column: c.name.clone(),
                    operator_examples: vec![">=".into(), "<=".into(), "BETWEEN".into()],
                });
            }
        }
        for key in selected {
            let Some(table) = self.card.table(key) else { continue };
            for c in table.metric_columns() {
                out.push(FilterCandidate {
                    table: key.clone(),
                    column: c.name.clone(),
                    operator_examples: vec![">=".into(), "<=".into(), ">".into(), "<".into()],
                });
            }
        }
        for key in selected {
            let Some(table) = self.card.table(key) else { continue };
            for c in &table.columns {
                if c.role == ColumnRole::Category || c.distinct_values.is_some() {
                    out.push(FilterCandidate {
                        table: key.clone(),
                        column: c.name.clone(),
                        operator_examples: vec!["=".into(), "IN".into()],
                    });
                }
            }
        }
        out
    }

    fn selected_columns(&self, selected: &[String], main_table: &str) -> Vec<SelectedColumn> {
        let mut out = Vec::new();
        if let Some(main) = self.card.table(main_table) {
            if let Some(metric) = main.metric_columns().next() {
                out.push(SelectedColumn {
                    table: main_table.to_string(),
                    column: metric.name.clone(),
                    reason: "primary metric to aggregate".to_string(),
                });
            }
            if let Some(date) = main.date_columns().next() {
                out.push(SelectedColumn {
                    table: main_table.to_string(),
                    column: date.name.clone(),
                    reason: "primary time filter".to_string(),
                });
            } else if let Some(pk) = main.pk_columns.first() {
                out.push(SelectedColumn {
                    table: main_table.to_string(),
                    column: pk.clone(),
                    reason: "primary key for row identification".to_string(),
                });
            }
        }

        let mut dim_labels = 0;
        for key in selected {
            if key == main_table || dim_labels >= 2 {
                continue;
            }
            let Some(table) = self.card.table(key) else { continue };
            if table.archetype != Archetype::Dimension {
                continue;
            }
            if let Some(label) = table
                .columns
                .iter()
                .find(|c| matches!(c.role, ColumnRole::Text | ColumnRole::Category))
            {
                out.push(SelectedColumn {
                    table: key.clone(),
                    column: label.name.clone(),
                    reason: format!("descriptive label from {key}"),
                });
                dim_labels += 1;
            }
        }
        out
    }

    fn apply_constraints(
        &self,
        constraints: Option<&BTreeMap<String, Value>>,
        selected: &[String],
    ) -> (Vec<FilterCandidate>, Vec<String>) {
        let mut filters = Vec::new();
        let mut notes = Vec::new();
        let Some(constraints) = constraints else {
            return (filters, notes);
        };

        for (column, value) in constraints {
            let mut matched = false;
            for key in selected {
                let Some(table) = self.card.table(key) else { continue };
                if table.column(column).is_some() {
                    filters.push(FilterCandidate {
                        table: key.clone(),
                        column: column.clone(),
                        operator_examples: vec![format!("= {}", scalar_to_string(value))],
                    });
                    matched = true;
                }
            }
            if matched {
                notes.push(format!("applied constraint {column} = {}", scalar_to_string(value)));
            } else {
                notes.push(format!(
                    "constraint '{column}' does not match a column on any selected table; ignored"
                ));
            }
        }
        (filters, notes)
    }

    fn suggested_approach(&self, main_table: &str, selected: &[String], request: &str) -> String {
        let dims: Vec<&str> = selected
            .iter()
            .filter(|k| {
                k.as_str() != main_table
                    && self.card.table(k).map(|t| t.archetype == Archetype::Dimension).unwrap_or(false)
            })
            .map(String::as_str)
            .collect();

        let dim_clause = if dims.is_empty() {
            String::new()
        } else {
            format!(" joined with {}", dims.join(", "))
        };

        if wants_aggregate(request) {
            format!(
                "Start from {main_table}{dim_clause}, aggregate its metrics, and order the result to surface the top rows."
            )
        } else {
            format!("Start from {main_table}{dim_clause} and apply the filter candidates above to narrow the result set.")
        }
    }
}

fn needs_input(request: &str, message: &str) -> QueryPlan {
    QueryPlan {
        request: request.to_string(),
        relevant_tables: Vec::new(),
        join_examples: Vec::new(),
        suggested_approach: message.to_string(),
        key_columns: BTreeMap::new(),
        main_table: None,
        join_plan: Vec::new(),
        group_by_candidates: Vec::new(),
        filter_candidates: Vec::new(),
        selected_columns: Vec::new(),
        draft_sql: None,
        clarifications: Some(vec![message.to_string()]),
        assumptions: Vec::new(),
        confidence: 0.0,
        status: PlanStatus::NeedsInput,
        next_action: NextAction::RequestClarification,
    }
}

fn main_table_score(query_tokens: &BTreeSet<String>, table: &TableProfile) -> f64 {
    let mut score = table.n_metrics as f64 * 2.0;
    if table.n_dates > 0 {
        score += 1.0;
    }
    if table.archetype == Archetype::Fact {
        score += 1.5;
    }
    score += 0.3 * table.centrality;
    score += lexical_overlap(query_tokens, table);
    score
}

fn lexical_overlap(query_tokens: &BTreeSet<String>, table: &TableProfile) -> f64 {
    let mut table_tokens: BTreeSet<String> = tokenize_identifier(&table.name).into_iter().collect();
    for c in &table.columns {
        table_tokens.extend(tokenize_identifier(&c.name));
    }
    query_tokens.intersection(&table_tokens).count() as f64 * 0.4
}

fn wants_aggregate(request: &str) -> bool {
    tokenize_identifier(request)
        .iter()
        .any(|t| AGGREGATE_HINTS.contains(&t.as_str()))
}

fn column_priority(c: &&ColumnProfile) -> u8 {
    if c.is_primary_key {
        0
    } else if c.is_foreign_key {
        1
    } else {
        match c.role {
            ColumnRole::Date => 2,
            ColumnRole::Metric => 3,
            ColumnRole::Category => 4,
            ColumnRole::Key | ColumnRole::Id => 5,
            ColumnRole::Text => 6,
        }
    }
}

fn filter_hint(c: &ColumnProfile) -> Option<String> {
    if let Some(values) = &c.distinct_values {
        let sample: Vec<&str> = values.iter().take(3).map(String::as_str).collect();
        let ellipsis = if values.len() > 3 { ", ..." } else { "" };
        return Some(format!("{} IN ({}{ellipsis})", c.name, sample.join(", ")));
    }
    if let Some((min, max)) = c.value_range {
        return Some(format!("{} BETWEEN {min} AND {max}", c.name));
    }
    if c.role == ColumnRole::Date {
        return Some(format!("{} supports >=, <=, BETWEEN date filters", c.name));
    }
    None
}

fn fk_columns_for_edge<'b>(card: &'b SchemaCard, edge: &SchemaEdge) -> Option<(&'b str, &'b str)> {
    card.table(&edge.src)?
        .fks
        .iter()
        .find(|fk| fk.referenced_table == edge.dst)
        .map(|fk| (fk.local_column.as_str(), fk.referenced_column.as_str()))
}

fn fk_tokens_between(card: &SchemaCard, a: &str, b: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    if let Some(ta) = card.table(a) {
        for fk in &ta.fks {
            if fk.referenced_table == b {
                tokens.extend(tokenize_identifier(&fk.local_column));
            }
        }
    }
    if let Some(tb) = card.table(b) {
        for fk in &tb.fks {
            if fk.referenced_table == a {
                tokens.extend(tokenize_identifier(&fk.local_column));
            }
        }
    }
    tokens
}

fn join_purpose(card: &SchemaCard, to: &str) -> String {
    match card.table(to).map(|t| t.archetype) {
        Some(Archetype::Dimension) => format!("resolve descriptive attributes from {to}"),
        Some(Archetype::Fact) => format!("bring in related facts from {to}"),
        Some(Archetype::Bridge) => format!("traverse the {to} bridge table"),
        Some(Archetype::Reference) => format!("look up reference values from {to}"),
        _ => format!("join in {to}"),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn extract_on_clause(sql: &str) -> Option<String> {
    let upper = sql.to_uppercase();
    let idx = upper.rfind(" ON ")?;
    Some(sql[idx + 4..].trim_end_matches(';').trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::embedding::NoopEmbedder;
    use crate::models::{ColumnProfile, ForeignKeyEdge, SubjectArea};
    use std::sync::Arc;

    fn column(name: &str, role: ColumnRole, is_pk: bool, is_fk: bool, fk_ref: Option<(&str, &str)>) -> ColumnProfile {
        ColumnProfile {
            name: name.to_string(),
            sql_type: match role {
                ColumnRole::Date => "timestamp".to_string(),
                ColumnRole::Metric => "numeric".to_string(),
                _ => "varchar".to_string(),
            },
            nullable: !is_pk,
            is_primary_key: is_pk,
            is_foreign_key: is_fk,
            fk_reference: fk_ref.map(|(t, c)| crate::models::FkReference {
                referenced_table: t.to_string(),
                referenced_column: c.to_string(),
            }),
            null_rate: None,
            approx_distinct_ratio: None,
            sample_patterns: Vec::new(),
            semantic_tags: Vec::new(),
            role,
            distinct_values: None,
            value_range: None,
        }
    }

    fn orders_customers_card() -> SchemaCard {
        let mut tables = BTreeMap::new();
        tables.insert(
            "sales.orders".to_string(),
            TableProfile {
                key: "sales.orders".into(),
                schema: "sales".into(),
                name: "orders".into(),
                columns: vec![
                    column("order_id", ColumnRole::Key, true, false, None),
                    column("customer_id", ColumnRole::Key, false, true, Some(("sales.customers", "customer_id"))),
                    column("order_date", ColumnRole::Date, false, false, None),
                    column("amount", ColumnRole::Metric, false, false, None),
                ],
                pk_columns: vec!["order_id".into()],
                fks: vec![ForeignKeyEdge {
                    local_column: "customer_id".into(),
                    referenced_table: "sales.customers".into(),
                    referenced_column: "customer_id".into(),
                }],
                approx_rowcount: None,
                n_rows_sampled: 10,
                archetype: Archetype::Fact,
                summary: "Sales orders placed by customers.".into(),
                subject_area: "area_0".into(),
                centrality: 0.5,
                n_metrics: 1,
                n_dates: 1,
                is_archive: false,
                is_audit_like: false,
            },
        );
        tables.insert(
            "sales.customers".to_string(),
            TableProfile {
                key: "sales.customers".into(),
                schema: "sales".into(),
                name: "customers".into(),
                columns: vec![
                    column("customer_id", ColumnRole::Key, true, false, None),
                    column("name", ColumnRole::Text, false, false, None),
                ],
                pk_columns: vec!["customer_id".into()],
                fks: Vec::new(),
                approx_rowcount: None,
                n_rows_sampled: 5,
                archetype: Archetype::Dimension,
                summary: "Customers who place orders.".into(),
                subject_area: "area_0".into(),
                centrality: 0.5,
                n_metrics: 0,
                n_dates: 0,
                is_archive: false,
                is_audit_like: false,
            },
        );

        let edges = vec![SchemaEdge {
            src: "sales.orders".into(),
            dst: "sales.customers".into(),
            descriptor: "sales.orders.customer_id->sales.customers.customer_id".into(),
        }];

        let mut subject_areas = BTreeMap::new();
        subject_areas.insert(
            "area_0".to_string(),
            SubjectArea {
                id: "area_0".into(),
                name: "Sales".into(),
                tables: vec!["sales.orders".into(), "sales.customers".into()],
                summary: "Sales domain.".into(),
            },
        );

        SchemaCard {
            dialect: "postgres".into(),
            url_fingerprint: "fp".into(),
            schemas: vec!["sales".into()],
            tables,
            edges,
            subject_areas,
            built_at: chrono::Utc::now(),
            reflection_hash: "hash".into(),
        }
    }

    fn test_config() -> Config {
        let mut cfg = Config::from_env_or_default();
        cfg.database_url = "sqlite::memory:".to_string();
        cfg
    }

    #[tokio::test]
    async fn fact_centric_plan_picks_orders_as_main_table() {
        let card = orders_customers_card();
        let config = test_config();
        let noop: Arc<dyn crate::embedding::Embedder> = Arc::new(NoopEmbedder::new(8));
        let service = SchemaService::build(Arc::new(card.clone()), noop, &config).await;
        let dialect = DialectFacade::new();
        let builder = PlanBuilder::new(&card, &service, &dialect, &config, DialectName::Postgres);

        let plan = builder
            .build("top 10 customers by revenue last 30 days", None, false, None)
            .await;

        assert_eq!(plan.status, PlanStatus::Ok);
        assert_eq!(plan.main_table.as_deref(), Some("sales.orders"));
        assert_eq!(plan.join_plan.len(), 1);
        assert_eq!(plan.join_plan[0].left_table, "sales.orders");
        assert_eq!(plan.join_plan[0].right_table, "sales.customers");
        assert!(plan
            .group_by_candidates
            .iter()
            .any(|c| c == "sales.customers.name"));
        assert!(plan
            .filter_candidates
            .iter()
            .any(|f| f.table == "sales.orders" && f.column == "order_date" && f.operator_examples.contains(&">=".to_string())));
        assert!(plan.selected_columns.iter().any(|c| c.column == "amount"));
        assert!(plan.selected_columns.iter().any(|c| c.column == "name"));
    }

    #[tokio::test]
    async fn empty_card_returns_needs_input() {
        let card = SchemaCard {
            dialect: "postgres".into(),
            url_fingerprint: "fp".into(),
            schemas: Vec::new(),
            tables: BTreeMap::new(),
            edges: Vec::new(),
            subject_areas: BTreeMap::new(),
            built_at: chrono::Utc::now(),
            reflection_hash: "hash".into(),
        };
        let config = test_config();
        let noop: Arc<dyn crate::embedding::Embedder> = Arc::new(NoopEmbedder::new(8));
        let service = SchemaService::build(Arc::new(card.clone()), noop, &config).await;
        let dialect = DialectFacade::new();
        let builder = PlanBuilder::new(&card, &service, &dialect, &config, DialectName::Postgres);

        let plan = builder.build("anything", None, false, None).await;
        assert_eq!(plan.status, PlanStatus::NeedsInput);
        assert_eq!(plan.next_action, NextAction::RequestClarification);
    }

    #[test]
    fn extract_on_clause_finds_trailing_condition() {
        let sql = "SELECT 1 FROM a JOIN b ON a.id = b.a_id";
        assert_eq!(extract_on_clause(sql), Some("a.id = b.a_id".to_string()));
    }

    #[test]
    fn column_priority_orders_pk_before_text() {
        let pk = column("id", ColumnRole::Key, true, false, None);
        let text = column("notes", ColumnRole::Text, false, false, None);
        assert!(column_priority(&&pk) < column_priority(&&text));
    }
}
