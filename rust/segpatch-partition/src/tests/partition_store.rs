use std::path::Path;

use ahash::AHashMap;
use tempfile::TempDir;

use segpatch_common::{DocId, Result, SegmentId, error::Error};
use segpatch_io::FileWriter;

use crate::{
    DocScope, PartitionData, PatchCompression, PatchFileWriter, SegmentInfo, Version, layout,
    segment::PatchFileMeta,
};

/// On-disk partition fixture: segments, patch files and versions are written to
/// a temporary directory that is removed when the store is dropped.
pub struct PartitionStore {
    dir: TempDir,
    infos: AHashMap<SegmentId, SegmentInfo>,
    compression: PatchCompression,
}

impl PartitionStore {
    pub fn new() -> PartitionStore {
        PartitionStore {
            dir: TempDir::new().expect("temp dir"),
            infos: AHashMap::new(),
            compression: PatchCompression::None,
        }
    }

    pub fn with_compression(mut self, compression: PatchCompression) -> PartitionStore {
        self.compression = compression;
        self
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn add_segment(&mut self, segment_id: SegmentId, doc_count: u32, sub_doc_count: u32) {
        self.infos.insert(
            segment_id,
            SegmentInfo {
                doc_count,
                sub_doc_count,
                patches: Vec::new(),
            },
        );
        self.write_segment_info(segment_id)
            .expect("write segment info");
    }

    /// Writes a patch file into `src_segment` for docs of `dest_segment`
    /// (local doc ids) and lists it in the source segment's metadata.
    pub fn add_patch(
        &mut self,
        src_segment: SegmentId,
        scope: DocScope,
        attribute: &str,
        dest_segment: SegmentId,
        records: &[(DocId, Vec<u8>)],
    ) -> Result<()> {
        let path = layout::patch_file_path(
            self.root(),
            src_segment,
            scope,
            attribute,
            dest_segment,
        );
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = PatchFileWriter::new(FileWriter::create(&path)?, self.compression);
        for (doc_id, value) in records {
            writer.add(*doc_id, value)?;
        }
        writer.finish()?;

        let info = self.infos.get_mut(&src_segment).ok_or_else(|| {
            Error::invalid_arg("src_segment", format!("unknown segment {src_segment}"))
        })?;
        info.patches.push(PatchFileMeta {
            attribute: attribute.to_string(),
            scope,
            dest_segment,
        });
        self.write_segment_info(src_segment)
    }

    /// Lists a patch file in segment metadata without writing the file.
    pub fn add_dangling_patch_meta(
        &mut self,
        src_segment: SegmentId,
        scope: DocScope,
        attribute: &str,
        dest_segment: SegmentId,
    ) -> Result<()> {
        if let Some(info) = self.infos.get_mut(&src_segment) {
            info.patches.push(PatchFileMeta {
                attribute: attribute.to_string(),
                scope,
                dest_segment,
            });
        }
        self.write_segment_info(src_segment)
    }

    pub fn commit_version(&self, version: &Version) -> Result<()> {
        let data = serde_json::to_vec_pretty(version)
            .map_err(|e| Error::metadata("serialize version", e))?;
        std::fs::write(self.root().join(layout::VERSION_FILE_NAME), data)?;
        Ok(())
    }

    pub fn open(&self) -> Result<PartitionData> {
        PartitionData::open(self.root())
    }

    fn write_segment_info(&self, segment_id: SegmentId) -> Result<()> {
        let dir = layout::segment_dir(self.root(), segment_id);
        std::fs::create_dir_all(&dir)?;
        let info = &self.infos[&segment_id];
        let data = serde_json::to_vec_pretty(info)
            .map_err(|e| Error::metadata("serialize segment info", e))?;
        std::fs::write(dir.join(layout::SEGMENT_INFO_FILE_NAME), data)?;
        Ok(())
    }
}

impl Default for PartitionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Little-endian encoding of an `i32` patch value.
pub fn i32_value(value: i32) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}
