// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.
use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, Result};

#[derive(Debug)]
pub struct BuildInfo<'a> {
    // Relative names of the files the build reads.
    pub inputs: Vec<&'a str>,

    // Relative names of the files the build produces.
    pub outputs: Vec<&'a str>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SortResult {
    // The order in which builds must run.
    Order(Vec<usize>),
    // A file on a cycle and the builds that could not be ordered.
    Cycle(String, Vec<usize>),
}

/// Order builds so that every build comes after the builds producing its
/// inputs.
///
/// Among builds that are ready at the same time the one inserted first is
/// scheduled first, so the order depends only on insertion order.
pub fn schedule(infos: &[BuildInfo<'_>]) -> Result<SortResult> {
    // Mapping from each file to the build that produces it.
    let mut producer: BTreeMap<&str, usize> = BTreeMap::new();
    for (idx, info) in infos.iter().enumerate() {
        for output in &info.outputs {
            if let Some(other) = producer.insert(*output, idx) {
                if other != idx {
                    bail!("internal error: '{output}' is produced by builds {other} and {idx}");
                }
            }
        }
    }

    // For each build, the builds that must run before it.
    let mut pending: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); infos.len()];
    // For each build, the builds waiting for it.
    let mut dependents: Vec<Vec<usize>> = vec![vec![]; infos.len()];
    for (idx, info) in infos.iter().enumerate() {
        for input in &info.inputs {
            if let Some(p) = producer.get(input) {
                if pending[idx].insert(*p) {
                    dependents[*p].push(idx);
                }
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..infos.len())
        .filter(|idx| pending[*idx].is_empty())
        .collect();
    let mut order = Vec::with_capacity(infos.len());

    while let Some(idx) = ready.pop_first() {
        order.push(idx);
        for d in &dependents[idx] {
            pending[*d].remove(&idx);
            if pending[*d].is_empty() {
                ready.insert(*d);
            }
        }
    }

    if order.len() == infos.len() {
        return Ok(SortResult::Order(order));
    }

    let scheduled: BTreeSet<usize> = order.into_iter().collect();
    let stuck: Vec<usize> = (0..infos.len())
        .filter(|idx| !scheduled.contains(idx))
        .collect();
    let file = stuck
        .iter()
        .flat_map(|idx| infos[*idx].inputs.iter())
        .find(|input| match producer.get(*input) {
            Some(p) => !scheduled.contains(p),
            None => false,
        })
        .map(|f| f.to_string())
        .unwrap_or_default();
    Ok(SortResult::Cycle(file, stuck))
}
