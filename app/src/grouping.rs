// ==============================================================================
// grouping.rs - Gene Grouping & Merging Engine
// ==============================================================================
// Description: Single-pass reducer that builds one GeneRecord per gene row
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// GFF3 rows carry no parent linkage that we trust here. A sub-feature belongs
// to the most recent `gene` row before it, so input order is a precondition:
// sub-features that appear before any gene are dropped and counted.
// ==============================================================================

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Feature, FeatureKind, GeneRecord, SubFeatureSpan};

/// Where an adjacent repeat_region is merged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMergePolicy {
    /// Extend the previous repeat_region span
    #[default]
    Corrected,
    /// Legacy behavior: extend the gene's last rRNA span and drop the repeat
    Compatible,
}

impl std::str::FromStr for RepeatMergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "corrected" => Ok(RepeatMergePolicy::Corrected),
            "compatible" | "legacy" => Ok(RepeatMergePolicy::Compatible),
            other => Err(format!("unknown repeat merge policy '{}'", other)),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupingError {
    #[error(
        "repeat_region at line {line} in gene '{gene}' would merge into an rRNA span, \
         but the gene has none (compatible repeat merge policy)"
    )]
    CompatMergeWithoutRrna { gene: String, line: usize },
}

/// Counters for one grouping pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupingStats {
    pub genes: usize,
    /// Spans appended across all genes and kinds
    pub spans: usize,
    /// Sub-features folded into an existing span
    pub merged: usize,
    /// Sub-features dropped because no gene preceded them
    pub orphans: usize,
}

/// Output of a grouping pass
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    pub records: Vec<GeneRecord>,
    pub stats: GroupingStats,
}

/// Explicit accumulator for the grouping pass
#[derive(Debug, Default)]
pub struct GeneGrouper {
    policy: RepeatMergePolicy,
    current: Option<GeneRecord>,
    output: Vec<GeneRecord>,
    stats: GroupingStats,
}

impl GeneGrouper {
    pub fn new(policy: RepeatMergePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Feed the next normalized feature
    pub fn push(&mut self, feature: Feature) -> Result<(), GroupingError> {
        if !feature.kind.is_sub_feature() {
            self.start_gene(feature);
            return Ok(());
        }

        let Some(gene) = self.current.as_mut() else {
            self.stats.orphans += 1;
            warn!(
                "Dropping {} at line {} ({}..{}): no preceding gene",
                feature.kind.label(),
                feature.line,
                feature.start,
                feature.end
            );
            return Ok(());
        };

        // Only the last span of the same kind is a merge candidate
        let last_is_adjacent = gene
            .spans(feature.kind)
            .last()
            .is_some_and(|last| last.is_adjacent_to(feature.start));

        if !last_is_adjacent {
            if let Some(spans) = gene.spans_mut(feature.kind) {
                spans.push(SubFeatureSpan {
                    kind: feature.kind,
                    start: feature.start,
                    end: feature.end,
                });
                self.stats.spans += 1;
            }
            return Ok(());
        }

        let target_kind = match (feature.kind, self.policy) {
            (FeatureKind::RepeatRegion, RepeatMergePolicy::Compatible) => FeatureKind::Rrna,
            (kind, _) => kind,
        };

        // Only Compatible can land on an empty list: the target is rRNA, not the adjacent repeat
        let target = match gene.spans_mut(target_kind).and_then(|spans| spans.last_mut()) {
            Some(target) => target,
            None => {
                return Err(GroupingError::CompatMergeWithoutRrna {
                    gene: gene.gene_name.clone(),
                    line: feature.line,
                })
            }
        };

        debug!(
            "Line {}: merging {} {}..{} into {}..{}",
            feature.line,
            feature.kind.label(),
            feature.start,
            feature.end,
            target.start,
            target.end
        );
        target.end = feature.end;
        self.stats.merged += 1;

        Ok(())
    }

    /// Flush the in-progress gene and return everything collected
    pub fn finish(mut self) -> Grouping {
        if let Some(gene) = self.current.take() {
            self.output.push(gene);
        }
        self.stats.genes = self.output.len();

        if self.stats.orphans > 0 {
            warn!(
                "{} sub-feature(s) appeared before any gene and were dropped",
                self.stats.orphans
            );
        }

        Grouping {
            records: self.output,
            stats: self.stats,
        }
    }

    fn start_gene(&mut self, feature: Feature) {
        if let Some(previous) = self.current.take() {
            self.output.push(previous);
        }
        // Parser guarantees a name on gene rows
        let name = feature.name.unwrap_or_default();
        self.current = Some(GeneRecord::new(name, feature.start, feature.end));
    }
}

/// Group a normalized feature stream in one pass
pub fn group_features(
    features: impl IntoIterator<Item = Feature>,
    policy: RepeatMergePolicy,
) -> Result<Grouping, GroupingError> {
    let mut grouper = GeneGrouper::new(policy);
    for feature in features {
        grouper.push(feature)?;
    }
    Ok(grouper.finish())
}

/// Apply the adjacency merge to an existing span list
///
/// Each span is compared with the most recent output span of the same kind.
/// Running this on its own output returns the same list.
pub fn merge_spans(spans: &[SubFeatureSpan]) -> Vec<SubFeatureSpan> {
    let mut merged: Vec<SubFeatureSpan> = Vec::with_capacity(spans.len());

    for span in spans {
        let last_same_kind = merged.iter().rposition(|s| s.kind == span.kind);
        match last_same_kind {
            Some(idx) if merged[idx].is_adjacent_to(span.start) => merged[idx].end = span.end,
            _ => merged.push(*span),
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Strand;

    fn gene(name: &str, start: u64, end: u64) -> Feature {
        Feature {
            kind: FeatureKind::Gene,
            start,
            end,
            strand: Strand::Forward,
            name: Some(name.to_string()),
            line: 0,
        }
    }

    fn sub(kind: FeatureKind, start: u64, end: u64) -> Feature {
        Feature {
            kind,
            start,
            end,
            strand: Strand::Forward,
            name: None,
            line: 0,
        }
    }

    fn span(kind: FeatureKind, start: u64, end: u64) -> SubFeatureSpan {
        SubFeatureSpan { kind, start, end }
    }

    fn group(features: Vec<Feature>) -> Grouping {
        group_features(features, RepeatMergePolicy::Corrected).unwrap()
    }

    #[test]
    fn test_adjacent_cds_merge() {
        let grouping = group(vec![
            gene("abc", 1, 500),
            sub(FeatureKind::Cds, 1, 100),
            sub(FeatureKind::Cds, 101, 200),
        ]);

        assert_eq!(grouping.records.len(), 1);
        assert_eq!(grouping.records[0].cds, vec![span(FeatureKind::Cds, 1, 200)]);
        assert_eq!(grouping.stats.merged, 1);
        assert_eq!(grouping.stats.spans, 1);
    }

    #[test]
    fn test_gap_keeps_spans_separate() {
        let grouping = group(vec![
            gene("abc", 1, 500),
            sub(FeatureKind::Cds, 1, 100),
            sub(FeatureKind::Cds, 150, 200),
        ]);

        assert_eq!(
            grouping.records[0].cds,
            vec![span(FeatureKind::Cds, 1, 100), span(FeatureKind::Cds, 150, 200)]
        );
    }

    #[test]
    fn test_overlap_is_not_merged() {
        let grouping = group(vec![
            gene("abc", 1, 500),
            sub(FeatureKind::Cds, 1, 100),
            sub(FeatureKind::Cds, 50, 200),
        ]);
        assert_eq!(grouping.records[0].cds.len(), 2);
    }

    #[test]
    fn test_chain_of_adjacent_spans() {
        let grouping = group(vec![
            gene("abc", 1, 500),
            sub(FeatureKind::Trna, 1, 10),
            sub(FeatureKind::Trna, 11, 20),
            sub(FeatureKind::Trna, 21, 30),
        ]);
        assert_eq!(grouping.records[0].trna, vec![span(FeatureKind::Trna, 1, 30)]);
        assert_eq!(grouping.stats.merged, 2);
    }

    #[test]
    fn test_no_merge_across_kinds() {
        let grouping = group(vec![
            gene("abc", 1, 500),
            sub(FeatureKind::Cds, 1, 100),
            sub(FeatureKind::Trna, 101, 200),
            sub(FeatureKind::Rrna, 201, 300),
        ]);

        let record = &grouping.records[0];
        assert_eq!(record.cds, vec![span(FeatureKind::Cds, 1, 100)]);
        assert_eq!(record.trna, vec![span(FeatureKind::Trna, 101, 200)]);
        assert_eq!(record.rrna, vec![span(FeatureKind::Rrna, 201, 300)]);
    }

    #[test]
    fn test_only_last_span_is_candidate() {
        // 101 is adjacent to the first span but not to the last one
        let grouping = group(vec![
            gene("abc", 1, 500),
            sub(FeatureKind::Cds, 1, 100),
            sub(FeatureKind::Cds, 300, 400),
            sub(FeatureKind::Cds, 101, 150),
        ]);
        assert_eq!(grouping.records[0].cds.len(), 3);
    }

    #[test]
    fn test_interleaved_kinds_still_merge_with_own_kind() {
        let grouping = group(vec![
            gene("abc", 1, 500),
            sub(FeatureKind::Cds, 1, 100),
            sub(FeatureKind::Trna, 200, 250),
            sub(FeatureKind::Cds, 101, 150),
        ]);
        assert_eq!(grouping.records[0].cds, vec![span(FeatureKind::Cds, 1, 150)]);
    }

    #[test]
    fn test_no_merge_across_genes() {
        let grouping = group(vec![
            gene("a", 1, 100),
            sub(FeatureKind::Cds, 1, 100),
            gene("b", 101, 200),
            sub(FeatureKind::Cds, 101, 200),
        ]);

        assert_eq!(grouping.records.len(), 2);
        assert_eq!(grouping.records[0].cds, vec![span(FeatureKind::Cds, 1, 100)]);
        assert_eq!(grouping.records[1].cds, vec![span(FeatureKind::Cds, 101, 200)]);
    }

    #[test]
    fn test_record_count_matches_gene_rows_in_order() {
        let grouping = group(vec![
            gene("z", 900, 1000),
            gene("a", 1, 10),
            sub(FeatureKind::Rrna, 2, 9),
            gene("m", 500, 600),
        ]);

        let names: Vec<_> = grouping.records.iter().map(|r| r.gene_name.as_str()).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
        assert_eq!(grouping.stats.genes, 3);
    }

    #[test]
    fn test_orphans_are_dropped_and_counted() {
        let grouping = group(vec![
            sub(FeatureKind::Cds, 1, 100),
            sub(FeatureKind::RepeatRegion, 1, 100),
            gene("abc", 200, 300),
            sub(FeatureKind::Cds, 200, 300),
        ]);

        assert_eq!(grouping.stats.orphans, 2);
        assert_eq!(grouping.records.len(), 1);
        assert_eq!(grouping.records[0].cds.len(), 1);
        assert!(grouping.records[0].repeat_region.is_empty());
    }

    #[test]
    fn test_empty_stream() {
        let grouping = group(Vec::new());
        assert!(grouping.records.is_empty());
        assert_eq!(grouping.stats, GroupingStats::default());
    }

    #[test]
    fn test_repeat_merge_corrected() {
        let grouping = group(vec![
            gene("abc", 1, 500),
            sub(FeatureKind::Rrna, 1, 50),
            sub(FeatureKind::RepeatRegion, 100, 200),
            sub(FeatureKind::RepeatRegion, 201, 300),
        ]);

        let record = &grouping.records[0];
        assert_eq!(record.repeat_region, vec![span(FeatureKind::RepeatRegion, 100, 300)]);
        assert_eq!(record.rrna, vec![span(FeatureKind::Rrna, 1, 50)]);
    }

    #[test]
    fn test_repeat_merge_compatible_extends_rrna() {
        let grouping = group_features(
            vec![
                gene("abc", 1, 500),
                sub(FeatureKind::Rrna, 1, 50),
                sub(FeatureKind::RepeatRegion, 100, 200),
                sub(FeatureKind::RepeatRegion, 201, 300),
            ],
            RepeatMergePolicy::Compatible,
        )
        .unwrap();

        let record = &grouping.records[0];
        assert_eq!(record.repeat_region, vec![span(FeatureKind::RepeatRegion, 100, 200)]);
        assert_eq!(record.rrna, vec![span(FeatureKind::Rrna, 1, 300)]);
    }

    #[test]
    fn test_repeat_merge_compatible_without_rrna_fails() {
        let adjacent = Feature {
            line: 3,
            ..sub(FeatureKind::RepeatRegion, 201, 300)
        };
        let result = group_features(
            vec![
                gene("abc", 1, 500),
                sub(FeatureKind::RepeatRegion, 100, 200),
                adjacent,
            ],
            RepeatMergePolicy::Compatible,
        );

        match result.unwrap_err() {
            GroupingError::CompatMergeWithoutRrna { gene, line } => {
                assert_eq!(gene, "abc");
                assert_eq!(line, 3);
            }
        }
    }

    #[test]
    fn test_grouper_keeps_state_after_compatible_failure() {
        let mut grouper = GeneGrouper::new(RepeatMergePolicy::Compatible);
        grouper.push(gene("abc", 1, 500)).unwrap();
        grouper.push(sub(FeatureKind::RepeatRegion, 100, 200)).unwrap();
        assert!(grouper.push(sub(FeatureKind::RepeatRegion, 201, 300)).is_err());

        let grouping = grouper.finish();
        assert_eq!(grouping.stats.merged, 0);
        assert_eq!(
            grouping.records[0].repeat_region,
            vec![span(FeatureKind::RepeatRegion, 100, 200)]
        );
    }

    #[test]
    fn test_reverse_strand_spans_after_normalization() {
        // Normalized minus-strand exons run high -> low and are not adjacent
        let grouping = group(vec![
            gene("rev", 500, 1),
            sub(FeatureKind::Cds, 500, 301),
            sub(FeatureKind::Cds, 300, 1),
        ]);
        assert_eq!(grouping.records[0].cds.len(), 2);
    }

    #[test]
    fn test_merge_spans_is_idempotent() {
        let input = vec![
            span(FeatureKind::Cds, 1, 100),
            span(FeatureKind::Cds, 101, 200),
            span(FeatureKind::Cds, 250, 300),
            span(FeatureKind::Cds, 301, 310),
            span(FeatureKind::Cds, 400, 450),
        ];

        let once = merge_spans(&input);
        assert_eq!(
            once,
            vec![
                span(FeatureKind::Cds, 1, 200),
                span(FeatureKind::Cds, 250, 310),
                span(FeatureKind::Cds, 400, 450),
            ]
        );
        assert_eq!(merge_spans(&once), once);
    }

    #[test]
    fn test_merge_spans_matches_grouper_output() {
        let grouping = group(vec![
            gene("abc", 1, 1000),
            sub(FeatureKind::Cds, 1, 10),
            sub(FeatureKind::Cds, 11, 20),
            sub(FeatureKind::Cds, 40, 50),
        ]);
        let cds = &grouping.records[0].cds;
        assert_eq!(&merge_spans(cds), cds);
    }

    #[test]
    fn test_merge_spans_never_crosses_kinds() {
        let input = vec![span(FeatureKind::Cds, 1, 100), span(FeatureKind::Trna, 101, 200)];
        assert_eq!(merge_spans(&input), input);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("corrected".parse(), Ok(RepeatMergePolicy::Corrected));
        assert_eq!("Compatible".parse(), Ok(RepeatMergePolicy::Compatible));
        assert_eq!("legacy".parse(), Ok(RepeatMergePolicy::Compatible));
        assert!("other".parse::<RepeatMergePolicy>().is_err());
    }
}
