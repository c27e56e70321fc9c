// src/aggregation/mod.rs - Collapse matched rows into opening/closing rank intervals
use std::collections::BTreeMap;

use crate::matching::MatchedRow;
use crate::models::{AggregationKey, CutoffRecord, MatchStage};
use crate::normalize::normalize_round;

/// One observation inside a group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankSample {
    pub rank: u32,
    pub confidence: f64,
    pub stage: MatchStage,
}

/// Samples sharing an aggregation key. Never empty: it can only be created with a sample.
#[derive(Debug, Clone, PartialEq)]
pub struct RankGroup {
    samples: Vec<RankSample>,
}

impl RankGroup {
    pub fn new(first: RankSample) -> Self {
        Self {
            samples: vec![first],
        }
    }

    pub fn push(&mut self, sample: RankSample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn samples(&self) -> &[RankSample] {
        &self.samples
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    /// Sorted by key.
    pub records: Vec<CutoffRecord>,
    pub unmatched_count: usize,
}

impl Aggregation {
    pub fn sample_total(&self) -> usize {
        self.records.iter().map(|r| r.sample_count).sum()
    }
}

/// Key for a matched row; `None` for unmatched rows or rows missing a resolved reference.
pub fn aggregation_key(matched: &MatchedRow) -> Option<AggregationKey> {
    let result = &matched.result;
    if !result.is_matched() {
        return None;
    }
    Some(AggregationKey {
        state: result.state_ref.clone()?,
        institution_ref: result.institution_ref.clone()?,
        year: matched.row.year,
        round: normalize_round(&matched.row.round_text),
        course_ref: result.course_ref.clone()?,
        quota: result.quota.clone(),
        category: result.category.clone(),
    })
}

/// Groups matched rows by key. Returns the groups and the number of rows left out.
pub fn group<'a, I>(rows: I) -> (BTreeMap<AggregationKey, RankGroup>, usize)
where
    I: IntoIterator<Item = &'a MatchedRow>,
{
    let mut groups: BTreeMap<AggregationKey, RankGroup> = BTreeMap::new();
    let mut unmatched = 0;
    for matched in rows {
        let key = match aggregation_key(matched) {
            Some(key) => key,
            None => {
                unmatched += 1;
                continue;
            }
        };
        let sample = RankSample {
            rank: matched.row.rank,
            confidence: matched.result.confidence,
            stage: matched.result.match_stage,
        };
        match groups.get_mut(&key) {
            Some(group) => group.push(sample),
            None => {
                groups.insert(key, RankGroup::new(sample));
            }
        }
    }
    (groups, unmatched)
}

pub fn reduce(key: AggregationKey, group: &RankGroup) -> CutoffRecord {
    let mut ranks: Vec<u32> = group.samples.iter().map(|s| s.rank).collect();
    ranks.sort_unstable();
    let confidence = group
        .samples
        .iter()
        .map(|s| s.confidence)
        .fold(f64::INFINITY, f64::min);
    let weakest_stage = group
        .samples
        .iter()
        .map(|s| s.stage)
        .fold(MatchStage::Exact, MatchStage::weaker);

    CutoffRecord {
        key,
        // The group is never empty, so first/last exist.
        opening_rank: ranks.first().copied().unwrap_or_default(),
        closing_rank: ranks.last().copied().unwrap_or_default(),
        sample_count: ranks.len(),
        confidence,
        ranks,
        weakest_stage,
    }
}

pub fn aggregate<'a, I>(rows: I) -> Aggregation
where
    I: IntoIterator<Item = &'a MatchedRow>,
{
    let (groups, unmatched_count) = group(rows);
    let records = groups
        .into_iter()
        .map(|(key, group)| reduce(key, &group))
        .collect();
    Aggregation {
        records,
        unmatched_count,
    }
}
