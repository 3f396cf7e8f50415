use segpatch_config::PackAttributeConfig;
use segpatch_partition::{DocScope, PartitionData, VersionDiff};

/// Estimates the extra memory needed to rewrite pack values of documents in
/// segments added since the last load.
pub trait PackExpandEstimator: Send + Sync {
    fn estimate(
        &self,
        pack: &PackAttributeConfig,
        partition: &PartitionData,
        diff: &VersionDiff,
        scope: DocScope,
    ) -> u64;
}

/// Charges the fixed region of every new document of a pack that has a
/// variable-length sub attribute. Packs made only of fixed-length fields are
/// updated in place and cost nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentDiffEstimator;

impl PackExpandEstimator for SegmentDiffEstimator {
    fn estimate(
        &self,
        pack: &PackAttributeConfig,
        partition: &PartitionData,
        diff: &VersionDiff,
        scope: DocScope,
    ) -> u64 {
        if !pack.has_var_len_field() {
            return 0;
        }
        let doc_count: u64 = diff
            .segments()
            .iter()
            .filter_map(|&id| partition.segment(id))
            .map(|segment| segment.doc_count(scope) as u64)
            .sum();
        doc_count * pack.fixed_region_len() as u64
    }
}
