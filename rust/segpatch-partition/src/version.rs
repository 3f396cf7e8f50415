use serde::{Deserialize, Serialize};

use segpatch_common::SegmentId;

/// A committed partition version: the ordered list of live segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub version_id: u32,
    pub segments: Vec<SegmentId>,
}

impl Version {
    pub fn new(version_id: u32, segments: Vec<SegmentId>) -> Version {
        Version {
            version_id,
            segments,
        }
    }

    pub fn has_segment(&self, segment_id: SegmentId) -> bool {
        self.segments.contains(&segment_id)
    }

    pub fn last_segment(&self) -> Option<SegmentId> {
        self.segments.last().copied()
    }
}

/// Segments present in a version that a previously loaded version did not have.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionDiff {
    segments: Vec<SegmentId>,
}

impl VersionDiff {
    pub fn between(current: &Version, last_loaded: &Version) -> VersionDiff {
        VersionDiff {
            segments: current
                .segments
                .iter()
                .copied()
                .filter(|&id| !last_loaded.has_segment(id))
                .collect(),
        }
    }

    pub fn segments(&self) -> &[SegmentId] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
