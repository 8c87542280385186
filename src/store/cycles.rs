//! Depth-bounded cycle enumeration over synthesised investment edges.
//!
//! Backends load the edges reachable from the origin and hand them to
//! [`InvestmentGraph`], so no backend needs a native path-query language.

use std::collections::{BTreeMap, BTreeSet};

use bigdecimal::BigDecimal;
use num_traits::Zero;
use tracing::debug;

use crate::models::{Cycle, InvestmentEdge};

#[derive(Debug, Clone, Default)]
pub struct InvestmentGraph {
    adjacency: BTreeMap<String, Vec<InvestmentEdge>>,
}

impl InvestmentGraph {
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = InvestmentEdge>,
    {
        let mut adjacency: BTreeMap<String, Vec<InvestmentEdge>> = BTreeMap::new();
        for edge in edges {
            adjacency.entry(edge.source_id.clone()).or_default().push(edge);
        }
        // Fixed visiting order keeps enumeration deterministic.
        for outgoing in adjacency.values_mut() {
            outgoing.sort_by(|a, b| a.target_id.cmp(&b.target_id));
        }
        Self { adjacency }
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    /// All simple cycles through `origin` with 2..=`max_depth` edges.
    ///
    /// Cycles visiting the same set of companies are reported once, keeping
    /// the one with the largest amount. Output is sorted by amount
    /// descending, then by path.
    pub fn cycles_through(&self, origin: &str, max_depth: usize) -> Vec<Cycle> {
        let mut found: BTreeMap<BTreeSet<String>, Cycle> = BTreeMap::new();
        if max_depth < 2 || !self.adjacency.contains_key(origin) {
            return Vec::new();
        }

        let mut path: Vec<&InvestmentEdge> = Vec::with_capacity(max_depth);
        let mut on_path: BTreeSet<&str> = BTreeSet::new();
        on_path.insert(origin);
        self.walk(origin, origin, max_depth, &mut path, &mut on_path, &mut found);

        let mut cycles: Vec<Cycle> = found.into_values().collect();
        cycles.sort_by(|a, b| {
            b.total_amount
                .cmp(&a.total_amount)
                .then_with(|| a.company_ids.cmp(&b.company_ids))
        });

        debug!(
            origin = %origin,
            max_depth = max_depth,
            cycles = cycles.len(),
            "Enumerated investment cycles"
        );
        cycles
    }

    fn walk<'a>(
        &'a self,
        origin: &str,
        current: &str,
        depth_left: usize,
        path: &mut Vec<&'a InvestmentEdge>,
        on_path: &mut BTreeSet<&'a str>,
        found: &mut BTreeMap<BTreeSet<String>, Cycle>,
    ) {
        if depth_left == 0 {
            return;
        }
        let Some(outgoing) = self.adjacency.get(current) else {
            return;
        };

        for edge in outgoing {
            if edge.target_id == origin {
                // Self-investment is not a cycle between companies.
                if !path.is_empty() {
                    path.push(edge);
                    Self::record(path, found);
                    path.pop();
                }
                continue;
            }
            if on_path.contains(edge.target_id.as_str()) {
                continue;
            }
            path.push(edge);
            on_path.insert(edge.target_id.as_str());
            self.walk(origin, &edge.target_id, depth_left - 1, path, on_path, found);
            on_path.remove(edge.target_id.as_str());
            path.pop();
        }
    }

    fn record(path: &[&InvestmentEdge], found: &mut BTreeMap<BTreeSet<String>, Cycle>) {
        let mut company_ids = Vec::with_capacity(path.len() + 1);
        let mut company_names = Vec::with_capacity(path.len() + 1);
        company_ids.push(path[0].source_id.clone());
        company_names.push(path[0].source_name.clone());

        let mut total_amount = BigDecimal::zero();
        for edge in path {
            company_ids.push(edge.target_id.clone());
            company_names.push(edge.target_name.clone());
            total_amount += &edge.total_amount;
        }

        let node_set: BTreeSet<String> = company_ids.iter().cloned().collect();
        let cycle = Cycle {
            company_ids,
            company_names,
            total_amount,
            length: path.len(),
        };

        let keep_existing = found
            .get(&node_set)
            .is_some_and(|existing| existing.total_amount >= cycle.total_amount);
        if !keep_existing {
            found.insert(node_set, cycle);
        }
    }
}
