//! On-disk partition layout:
//!
//! ```text
//! <root>/version.json
//! <root>/segment_<id>/segment_info.json
//! <root>/segment_<id>/attribute/<name>/<src>_<dest>.patch
//! <root>/segment_<id>/sub_attribute/<name>/<src>_<dest>.patch
//! ```

use std::path::{Path, PathBuf};

use segpatch_common::SegmentId;

use crate::DocScope;

pub const VERSION_FILE_NAME: &str = "version.json";
pub const SEGMENT_INFO_FILE_NAME: &str = "segment_info.json";
pub const PATCH_FILE_SUFFIX: &str = "patch";

pub fn segment_dir(root: &Path, segment_id: SegmentId) -> PathBuf {
    root.join(format!("segment_{segment_id}"))
}

pub fn attribute_dir(root: &Path, segment_id: SegmentId, scope: DocScope, attribute: &str) -> PathBuf {
    segment_dir(root, segment_id)
        .join(scope.dir_name())
        .join(attribute)
}

pub fn patch_file_name(src_segment: SegmentId, dest_segment: SegmentId) -> String {
    format!("{src_segment}_{dest_segment}.{PATCH_FILE_SUFFIX}")
}

pub fn patch_file_path(
    root: &Path,
    src_segment: SegmentId,
    scope: DocScope,
    attribute: &str,
    dest_segment: SegmentId,
) -> PathBuf {
    attribute_dir(root, src_segment, scope, attribute).join(patch_file_name(src_segment, dest_segment))
}
