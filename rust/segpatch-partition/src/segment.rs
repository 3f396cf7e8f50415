use serde::{Deserialize, Serialize};

use segpatch_common::{DocId, SegmentId};

use crate::PatchFileInfo;

/// Document namespace: main documents or nested sub documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocScope {
    Main,
    Sub,
}

impl DocScope {
    pub fn from_is_sub(is_sub: bool) -> DocScope {
        if is_sub { DocScope::Sub } else { DocScope::Main }
    }

    pub fn is_sub(&self) -> bool {
        matches!(self, DocScope::Sub)
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            DocScope::Main => "attribute",
            DocScope::Sub => "sub_attribute",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocScope::Main => "main",
            DocScope::Sub => "sub",
        }
    }
}

/// Patch file recorded by a segment, as listed in its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchFileMeta {
    pub attribute: String,
    pub scope: DocScope,
    pub dest_segment: SegmentId,
}

/// Persisted segment metadata (`segment_info.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub doc_count: u32,
    #[serde(default)]
    pub sub_doc_count: u32,
    #[serde(default)]
    pub patches: Vec<PatchFileMeta>,
}

/// A loaded segment: its metadata, its position in the partition's doc id space
/// and the patch files it carries.
#[derive(Debug, Clone)]
pub struct SegmentData {
    segment_id: SegmentId,
    doc_count: u32,
    sub_doc_count: u32,
    base_doc_id: DocId,
    sub_base_doc_id: DocId,
    patch_files: Vec<PatchFileInfo>,
}

impl SegmentData {
    pub(crate) fn new(
        segment_id: SegmentId,
        info: &SegmentInfo,
        base_doc_id: DocId,
        sub_base_doc_id: DocId,
        patch_files: Vec<PatchFileInfo>,
    ) -> SegmentData {
        SegmentData {
            segment_id,
            doc_count: info.doc_count,
            sub_doc_count: info.sub_doc_count,
            base_doc_id,
            sub_base_doc_id,
            patch_files,
        }
    }

    pub fn segment_id(&self) -> SegmentId {
        self.segment_id
    }

    pub fn doc_count(&self, scope: DocScope) -> u32 {
        match scope {
            DocScope::Main => self.doc_count,
            DocScope::Sub => self.sub_doc_count,
        }
    }

    /// First global doc id of this segment in the given scope.
    pub fn base_doc_id(&self, scope: DocScope) -> DocId {
        match scope {
            DocScope::Main => self.base_doc_id,
            DocScope::Sub => self.sub_base_doc_id,
        }
    }

    /// Patch files written by this segment against older segments.
    pub fn patch_files(&self) -> &[PatchFileInfo] {
        &self.patch_files
    }
}
