use log::info;
use serde::{Deserialize, Serialize};

use segpatch_budget_tracker::Budget;
use segpatch_common::{Result, SegmentId, error::Error, error::ErrorKind};
use segpatch_config::PartitionSchema;
use segpatch_partition::{PartitionData, Version};

use crate::{
    AttrFieldValue, AttributeUpdater, MultiFieldPatchIterator, PatchScanOptions, run_work_items,
};

/// Replay settings, loadable from JSON. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatchReplayOptions {
    /// Worker threads for independent work items; `<= 1` replays the merged
    /// stream on the calling thread.
    pub max_parallelism: usize,
    /// Bytes available for loading patches.
    pub memory_budget: u64,
    pub ignore_patch_to_old_inc_segment: bool,
    pub start_load_segment: SegmentId,
}

impl Default for PatchReplayOptions {
    fn default() -> Self {
        PatchReplayOptions {
            max_parallelism: std::thread::available_parallelism().map_or(1, |n| n.get()),
            memory_budget: u64::MAX,
            ignore_patch_to_old_inc_segment: false,
            start_load_segment: 0,
        }
    }
}

impl PatchReplayOptions {
    pub fn from_json(json: &str) -> Result<PatchReplayOptions> {
        serde_json::from_str(json).map_err(|e| Error::metadata("patch replay options", e))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub applied: u64,
    pub patch_item_count: u64,
    pub patch_load_expand_size: u64,
    pub work_items: usize,
}

impl ReplayStats {
    fn add(&mut self, other: ReplayStats) {
        self.applied += other.applied;
        self.patch_item_count += other.patch_item_count;
        self.patch_load_expand_size += other.patch_load_expand_size;
        self.work_items += other.work_items;
    }
}

/// Applies the patches of a partition to attribute storage.
pub struct PatchReplayer<'a> {
    schema: &'a PartitionSchema,
    partition: &'a PartitionData,
    options: PatchReplayOptions,
    budget: Budget,
}

impl<'a> PatchReplayer<'a> {
    pub fn new(
        schema: &'a PartitionSchema,
        partition: &'a PartitionData,
        options: PatchReplayOptions,
    ) -> PatchReplayer<'a> {
        let budget = Budget::new(options.memory_budget);
        PatchReplayer {
            schema,
            partition,
            options,
            budget,
        }
    }

    /// Charges patch loading against `shared` as well. `memory_budget` still
    /// caps what this replayer may take from it.
    pub fn with_budget(mut self, shared: &Budget) -> PatchReplayer<'a> {
        self.budget = shared.subordinate(self.options.memory_budget);
        self
    }

    pub fn options(&self) -> &PatchReplayOptions {
        &self.options
    }

    /// Replays main document patches into `main` and, when the schema has a
    /// sub document scope, sub document patches into `sub`.
    pub fn replay(
        &self,
        last_loaded_version: &Version,
        main: &dyn AttributeUpdater,
        sub: Option<&dyn AttributeUpdater>,
    ) -> Result<ReplayStats> {
        let mut stats = self.replay_scope(last_loaded_version, false, main)?;
        if let (Some(_), Some(sub)) = (self.schema.sub(), sub) {
            stats.add(self.replay_scope(last_loaded_version, true, sub)?);
        }
        Ok(stats)
    }

    pub fn replay_scope(
        &self,
        last_loaded_version: &Version,
        is_sub: bool,
        updater: &dyn AttributeUpdater,
    ) -> Result<ReplayStats> {
        let Some(schema) = self.schema.attribute_schema(is_sub) else {
            return Ok(ReplayStats::default());
        };
        let scan = PatchScanOptions {
            ignore_patch_to_old_inc_segment: self.options.ignore_patch_to_old_inc_segment,
            last_loaded_version: last_loaded_version.clone(),
            start_load_segment: self.options.start_load_segment,
        };
        let mut iter = MultiFieldPatchIterator::open(schema, self.partition, &scan, is_sub)?;

        let required = iter.patch_load_expand_size();
        let _allocation = self.budget.allocate(required).map_err(|_| {
            Error::from(ErrorKind::BudgetExceeded {
                required,
                remaining: self.budget.available(),
            })
        })?;

        let mut stats = ReplayStats {
            patch_item_count: iter.patch_item_count(),
            patch_load_expand_size: required,
            ..Default::default()
        };
        if self.options.max_parallelism <= 1 {
            let mut value = AttrFieldValue::new();
            iter.reserve(&mut value);
            while iter.has_next() {
                iter.next(&mut value)?;
                updater.update(&value)?;
                stats.applied += 1;
            }
        } else {
            let items = iter.create_independent_patch_work_items();
            stats.work_items = items.len();
            stats.applied = run_work_items(items, self.options.max_parallelism, updater)?;
        }
        info!(
            "replayed {} of {} patches for {} docs of version {}",
            stats.applied,
            stats.patch_item_count,
            if is_sub { "sub" } else { "main" },
            self.partition.version().version_id
        );
        Ok(stats)
    }
}
