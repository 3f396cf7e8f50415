use log::{debug, info};
use rayon::prelude::*;

use segpatch_common::{Result, error::Error};

use crate::{AttrFieldValue, AttributeUpdater, multi_field_patch_iterator::PatchIterator};

/// The patches of one attribute or one pack attribute, replayable on its own.
///
/// Items built from the same iterator write disjoint columns, so they can run
/// concurrently. Each item replays its own records in doc id order.
pub struct PatchWorkItem {
    id: String,
    is_sub: bool,
    patch_item_count: u64,
    source: PatchIterator,
}

impl PatchWorkItem {
    pub fn new(
        id: String,
        is_sub: bool,
        patch_item_count: u64,
        source: PatchIterator,
    ) -> PatchWorkItem {
        PatchWorkItem {
            id,
            is_sub,
            patch_item_count,
            source,
        }
    }

    /// `{attribute}_{main|sub}`
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_sub(&self) -> bool {
        self.is_sub
    }

    /// Number of patch records, used as the item's cost.
    pub fn patch_item_count(&self) -> u64 {
        self.patch_item_count
    }

    /// Replays every remaining record into `updater` and returns how many were
    /// applied.
    pub fn process(&mut self, updater: &dyn AttributeUpdater) -> Result<u64> {
        let mut value = AttrFieldValue::new();
        self.source.reserve(&mut value);
        let mut applied = 0;
        while self.source.has_next() {
            self.source.next(&mut value)?;
            updater.update(&value)?;
            applied += 1;
        }
        debug!("work item {}: applied {applied} patches", self.id);
        Ok(applied)
    }
}

impl std::fmt::Debug for PatchWorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchWorkItem")
            .field("id", &self.id)
            .field("is_sub", &self.is_sub)
            .field("patch_item_count", &self.patch_item_count)
            .finish_non_exhaustive()
    }
}

/// Runs work items to completion, the most expensive first, on up to
/// `max_parallelism` threads. Returns the total number of applied patches.
pub fn run_work_items(
    mut items: Vec<PatchWorkItem>,
    max_parallelism: usize,
    updater: &dyn AttributeUpdater,
) -> Result<u64> {
    items.sort_by(|a, b| b.patch_item_count.cmp(&a.patch_item_count));
    info!(
        "running {} patch work items with parallelism {max_parallelism}",
        items.len()
    );
    if max_parallelism <= 1 || items.len() <= 1 {
        return items.iter_mut().map(|item| item.process(updater)).sum();
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(max_parallelism.min(items.len()))
        .thread_name(|i| format!("segpatch_replay_{i}"))
        .build()
        .map_err(|e| Error::invalid_operation(format!("patch replay thread pool: {e}")))?;
    let applied = pool.install(|| {
        items
            .into_par_iter()
            .map(|mut item| item.process(updater))
            .collect::<Result<Vec<_>>>()
    })?;
    Ok(applied.into_iter().sum())
}
