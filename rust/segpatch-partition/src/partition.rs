use std::{path::Path, sync::Arc};

use ahash::AHashMap;
use log::{debug, info, warn};

use segpatch_common::{DocId, Result, SegmentId, error::Error};
use segpatch_io::{FileReader, ReadAt};

use crate::{
    DocScope, PatchFileInfo, SegmentData, SegmentInfo, Version, VersionDiff, layout,
};

/// Patch files targeting one destination segment, ordered by source segment.
#[derive(Debug, Clone)]
pub struct SegmentPatches {
    pub dest: Arc<SegmentData>,
    pub files: Vec<PatchFileInfo>,
}

/// Read-only view of a partition at one committed version.
///
/// Shared freely between threads: nothing here is mutated after loading.
#[derive(Debug, Clone)]
pub struct PartitionData {
    version: Version,
    segments: Vec<Arc<SegmentData>>,
    positions: AHashMap<SegmentId, usize>,
}

impl PartitionData {
    /// Loads the partition stored under `root`.
    ///
    /// Every patch file listed in a segment's metadata must exist; a missing
    /// file fails the whole load.
    pub fn open(root: impl AsRef<Path>) -> Result<PartitionData> {
        let root = root.as_ref();
        let version: Version = read_json(&root.join(layout::VERSION_FILE_NAME))?;
        let mut builder = PartitionDataBuilder::new(version.clone());
        for &segment_id in &version.segments {
            let info: SegmentInfo = read_json(
                &layout::segment_dir(root, segment_id).join(layout::SEGMENT_INFO_FILE_NAME),
            )?;
            for meta in &info.patches {
                let path = layout::patch_file_path(
                    root,
                    segment_id,
                    meta.scope,
                    &meta.attribute,
                    meta.dest_segment,
                );
                if !path.is_file() {
                    return Err(Error::missing_patch_file(path.display().to_string()));
                }
                let reader = FileReader::open(&path)
                    .map_err(|e| Error::io(path.display().to_string(), e))?;
                builder.add_patch_file(PatchFileInfo {
                    attribute: meta.attribute.clone(),
                    scope: meta.scope,
                    src_segment: segment_id,
                    dest_segment: meta.dest_segment,
                    path: path.display().to_string(),
                    reader: Arc::new(reader),
                });
            }
            builder.add_segment_info(segment_id, info);
        }
        let partition = builder.build()?;
        info!(
            "opened partition {} at version {}: {} segments",
            root.display(),
            partition.version.version_id,
            partition.segments.len()
        );
        Ok(partition)
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Segments in version order.
    pub fn segments(&self) -> &[Arc<SegmentData>] {
        &self.segments
    }

    pub fn segment(&self, segment_id: SegmentId) -> Option<&Arc<SegmentData>> {
        self.positions
            .get(&segment_id)
            .map(|&pos| &self.segments[pos])
    }

    pub fn total_doc_count(&self, scope: DocScope) -> u64 {
        self.segments
            .iter()
            .map(|s| s.doc_count(scope) as u64)
            .sum()
    }

    pub fn diff(&self, last_loaded: &Version) -> VersionDiff {
        VersionDiff::between(&self.version, last_loaded)
    }

    /// Collects the patch files of `attribute` in `scope`, grouped by
    /// destination segment in version order. Within a group, files are ordered
    /// by source segment, oldest first.
    pub fn find_patch_files(&self, attribute: &str, scope: DocScope) -> Vec<SegmentPatches> {
        let mut groups: Vec<Vec<PatchFileInfo>> = vec![Vec::new(); self.segments.len()];
        for src in &self.segments {
            for file in src.patch_files() {
                if file.attribute != attribute || file.scope != scope {
                    continue;
                }
                match self.positions.get(&file.dest_segment) {
                    Some(&pos) => groups[pos].push(file.clone()),
                    None => warn!(
                        "ignoring patch file {}: destination segment {} is not in version {}",
                        file.path, file.dest_segment, self.version.version_id
                    ),
                }
            }
        }
        groups
            .into_iter()
            .zip(&self.segments)
            .filter(|(files, _)| !files.is_empty())
            .map(|(mut files, dest)| {
                files.sort_by_key(|f| f.src_segment);
                SegmentPatches {
                    dest: dest.clone(),
                    files,
                }
            })
            .collect()
    }
}

/// Assembles a [`PartitionData`] from segment metadata and patch file readers.
///
/// Used by [`PartitionData::open`] and directly for in-memory partitions.
pub struct PartitionDataBuilder {
    version: Version,
    infos: AHashMap<SegmentId, SegmentInfo>,
    patch_files: Vec<PatchFileInfo>,
}

impl PartitionDataBuilder {
    pub fn new(version: Version) -> PartitionDataBuilder {
        PartitionDataBuilder {
            version,
            infos: AHashMap::new(),
            patch_files: Vec::new(),
        }
    }

    pub fn add_segment(
        &mut self,
        segment_id: SegmentId,
        doc_count: u32,
        sub_doc_count: u32,
    ) -> &mut Self {
        self.add_segment_info(
            segment_id,
            SegmentInfo {
                doc_count,
                sub_doc_count,
                patches: Vec::new(),
            },
        )
    }

    pub fn add_segment_info(&mut self, segment_id: SegmentId, info: SegmentInfo) -> &mut Self {
        self.infos.insert(segment_id, info);
        self
    }

    pub fn add_patch_file(&mut self, file: PatchFileInfo) -> &mut Self {
        self.patch_files.push(file);
        self
    }

    /// Adds an in-memory patch file.
    pub fn add_patch_data(
        &mut self,
        src_segment: SegmentId,
        scope: DocScope,
        attribute: &str,
        dest_segment: SegmentId,
        data: Vec<u8>,
    ) -> &mut Self {
        let path = format!(
            "mem://segment_{src_segment}/{}/{attribute}/{}",
            scope.dir_name(),
            layout::patch_file_name(src_segment, dest_segment)
        );
        self.add_patch_file(PatchFileInfo {
            attribute: attribute.to_string(),
            scope,
            src_segment,
            dest_segment,
            path,
            reader: Arc::new(data) as Arc<dyn ReadAt>,
        })
    }

    pub fn build(mut self) -> Result<PartitionData> {
        let mut by_src: AHashMap<SegmentId, Vec<PatchFileInfo>> = AHashMap::new();
        for file in std::mem::take(&mut self.patch_files) {
            if file.src_segment <= file.dest_segment {
                return Err(Error::invalid_arg(
                    "patch_file",
                    format!(
                        "{}: source segment {} must be newer than destination {}",
                        file.path, file.src_segment, file.dest_segment
                    ),
                ));
            }
            by_src.entry(file.src_segment).or_default().push(file);
        }

        let mut segments = Vec::with_capacity(self.version.segments.len());
        let mut positions = AHashMap::with_capacity(self.version.segments.len());
        let mut base_doc_id: DocId = 0;
        let mut sub_base_doc_id: DocId = 0;
        for &segment_id in &self.version.segments {
            let info = self.infos.remove(&segment_id).ok_or_else(|| {
                Error::invalid_arg(
                    "version",
                    format!("segment {segment_id} has no segment info"),
                )
            })?;
            let patch_files = by_src.remove(&segment_id).unwrap_or_default();
            debug!(
                "segment {segment_id}: {} docs, {} sub docs, {} patch files",
                info.doc_count,
                info.sub_doc_count,
                patch_files.len()
            );
            let segment = SegmentData::new(
                segment_id,
                &info,
                base_doc_id,
                sub_base_doc_id,
                patch_files,
            );
            base_doc_id = advance_base(base_doc_id, info.doc_count)?;
            sub_base_doc_id = advance_base(sub_base_doc_id, info.sub_doc_count)?;
            positions.insert(segment_id, segments.len());
            segments.push(Arc::new(segment));
        }
        for (src, files) in by_src {
            warn!(
                "dropping {} patch files of segment {src} which is not in version {}",
                files.len(),
                self.version.version_id
            );
        }
        Ok(PartitionData {
            version: self.version,
            segments,
            positions,
        })
    }
}

fn advance_base(base: DocId, doc_count: u32) -> Result<DocId> {
    i32::try_from(doc_count)
        .ok()
        .and_then(|count| base.checked_add(count))
        .ok_or_else(|| Error::invalid_arg("doc_count", "partition exceeds the doc id space"))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read(path).map_err(|e| Error::io(path.display().to_string(), e))?;
    serde_json::from_slice(&data).map_err(|e| Error::metadata(path.display().to_string(), e))
}
