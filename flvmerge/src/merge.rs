//! Merge driver: sequential FLV concatenation with deferred patching.
//!
//! The merge runs in two phases. Phase one streams every input into the
//! output, rebasing media timestamps and recording where the duration and
//! filesize numbers of the first script tag landed. Phase two seeks back
//! to those positions and overwrites them with the final totals.

use crate::copy::copy_exact;
use crate::error::{MergeError, Result};
use crate::header::FileHeader;
use crate::script::{self, MAX_SCRIPT_PAYLOAD};
use crate::tag::{TagHeader, TagKind, TAG_HEADER_SIZE, TAG_TRAILER_SIZE};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Absolute byte position in the output file, recorded while streaming
/// and consumed by the finalization patch. Distinct from input positions
/// and payload-relative indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchOffset(
    /// Byte position from the start of the output.
    pub u64,
);

/// Mutable context threaded through every input of a merge.
#[derive(Debug, Default)]
struct MergeState {
    /// The output header has been written (from the first accepted input).
    header_written: bool,
    /// A script tag has been emitted; later ones are dropped.
    script_written: bool,
    /// Base added to every media timestamp of the current input.
    timestamp_base: u32,
    /// Bytes written to the output so far.
    bytes_written: u64,
    /// Duration accumulated from every input's script tag.
    duration: f64,
    /// Where the duration number sits in the output, once known.
    duration_offset: Option<PatchOffset>,
    /// Where the filesize number sits in the output, once known.
    filesize_offset: Option<PatchOffset>,
}

/// Per-input statistics reported by a successful append.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FileStats {
    /// Video tags written.
    pub video_tags: u64,
    /// Audio tags written.
    pub audio_tags: u64,
    /// Script tags seen (written or dropped).
    pub script_tags: u64,
    /// Bytes this input contributed to the output.
    pub bytes_out: u64,
    /// Adjusted timestamp of the input's last media tag.
    pub last_timestamp_ms: Option<u32>,
}

/// Totals reported after finalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeSummary {
    /// Final size of the output in bytes.
    pub total_bytes: u64,
    /// Accumulated duration in seconds.
    pub duration_seconds: f64,
    /// The duration field was patched in place.
    pub duration_patched: bool,
    /// The filesize field was patched in place.
    pub filesize_patched: bool,
}

/// Sequential FLV merger.
///
/// Owns the output writer for the whole merge. Inputs are appended one at
/// a time; a failing input aborts only itself and the merge continues with
/// whatever the next append brings. [`Merger::finalize`] patches the
/// recorded metadata fields once every input has been seen.
pub struct Merger<W: Write + Seek> {
    out: W,
    state: MergeState,
}

impl<W: Write + Seek> Merger<W> {
    /// Create a merger writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            state: MergeState::default(),
        }
    }

    /// Append one input stream.
    ///
    /// On error, bytes already flushed stay in the output and the duration
    /// and timestamp state gathered from the input's readable prefix is
    /// retained, so the merge can continue with the next input.
    pub fn append<R: Read + Seek>(&mut self, input: &mut R) -> Result<FileStats> {
        let mut last_media = None;
        let result = self.append_inner(input, &mut last_media);

        // The last media timestamp carries into the next input even when
        // this one aborted mid-stream.
        if let Some(timestamp_ms) = last_media {
            self.state.timestamp_base = timestamp_ms;
            debug!(timestamp_ms, "carrying timestamp base forward");
        }

        result
    }

    /// Open `path` and append it.
    pub fn append_path(&mut self, path: &Path) -> Result<FileStats> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        self.append(&mut reader)
    }

    fn append_inner<R: Read + Seek>(
        &mut self,
        input: &mut R,
        last_media: &mut Option<u32>,
    ) -> Result<FileStats> {
        let header = FileHeader::read(input)?;
        debug!(
            version = header.version,
            flags = header.flags,
            header_len = header.header_len,
            "validated file header"
        );

        let mut stats = FileStats::default();
        let start_bytes = self.state.bytes_written;

        if !self.state.header_written {
            self.state.bytes_written += header.write(&mut self.out)?;
            self.state.header_written = true;
        }

        while let Some(mut tag) = TagHeader::read_opt(input)? {
            let body_len = u64::from(tag.data_size) + TAG_TRAILER_SIZE;
            match tag.kind() {
                TagKind::Audio | TagKind::Video => {
                    let adjusted = tag.rebase(self.state.timestamp_base);
                    *last_media = Some(adjusted);
                    if tag.kind() == TagKind::Audio {
                        stats.audio_tags += 1;
                    } else {
                        stats.video_tags += 1;
                    }
                    self.write_tag_through(input, &tag, body_len)?;
                }
                TagKind::Script => {
                    stats.script_tags += 1;
                    self.process_script(input, &tag, body_len)?;
                }
            }
        }

        stats.bytes_out = self.state.bytes_written - start_bytes;
        stats.last_timestamp_ms = *last_media;
        Ok(stats)
    }

    /// Write a tag header and stream its payload and trailer through.
    fn write_tag_through<R: Read>(
        &mut self,
        input: &mut R,
        tag: &TagHeader,
        body_len: u64,
    ) -> Result<()> {
        self.state.bytes_written += tag.write(&mut self.out)?;
        match copy_exact(input, &mut self.out, body_len) {
            Ok(copied) => {
                self.state.bytes_written += copied;
                Ok(())
            }
            Err(MergeError::CopyIncomplete { copied, remaining }) => {
                // The short prefix did land in the output; keep the
                // counter honest before aborting the input.
                self.state.bytes_written += copied;
                Err(MergeError::CopyIncomplete { copied, remaining })
            }
            Err(err) => Err(err),
        }
    }

    /// Scan a script tag and emit it only if none has been emitted yet.
    fn process_script<R: Read + Seek>(
        &mut self,
        input: &mut R,
        tag: &TagHeader,
        body_len: u64,
    ) -> Result<()> {
        if tag.data_size as usize >= MAX_SCRIPT_PAYLOAD {
            return Err(MergeError::ScriptPayloadTooLarge {
                size: tag.data_size,
                limit: MAX_SCRIPT_PAYLOAD,
            });
        }

        let payload_start = input.stream_position()?;
        let mut payload = Vec::with_capacity(tag.data_size as usize);
        input
            .by_ref()
            .take(u64::from(tag.data_size))
            .read_to_end(&mut payload)?;

        let first = !self.state.script_written;
        self.state.script_written = true;

        let scan = script::scan(&payload);
        if let Some(value) = scan.duration {
            self.state.duration += value;
            debug!(
                duration = value,
                total = self.state.duration,
                "accumulated duration field"
            );
        }

        if first {
            // Field positions become absolute output offsets relative to
            // where this tag's header is about to land.
            if let Some(pos) = scan.duration_pos {
                self.state.duration_offset = Some(PatchOffset(
                    self.state.bytes_written + TAG_HEADER_SIZE + pos as u64,
                ));
                if let Some(pos) = scan.filesize_pos {
                    self.state.filesize_offset = Some(PatchOffset(
                        self.state.bytes_written + TAG_HEADER_SIZE + pos as u64,
                    ));
                }
            }
            input.seek(SeekFrom::Start(payload_start))?;
            self.write_tag_through(input, tag, body_len)
        } else {
            debug!(size = tag.data_size, "dropping duplicate script tag");
            input.seek(SeekFrom::Start(payload_start + body_len))?;
            Ok(())
        }
    }

    /// Patch the recorded metadata fields and flush the output.
    pub fn finalize(&mut self) -> Result<MergeSummary> {
        let total_bytes = self.state.bytes_written;
        let filesize_patched = self.patch(self.state.filesize_offset, total_bytes as f64, "filesize")?;
        let duration_patched = self.patch(self.state.duration_offset, self.state.duration, "duration")?;
        self.out.flush()?;

        info!(
            total_bytes,
            duration = self.state.duration,
            "merge finalized"
        );
        Ok(MergeSummary {
            total_bytes,
            duration_seconds: self.state.duration,
            duration_patched,
            filesize_patched,
        })
    }

    /// Overwrite one 8-byte number field. A failed seek skips the patch.
    fn patch(&mut self, offset: Option<PatchOffset>, value: f64, field: &'static str) -> Result<bool> {
        let Some(PatchOffset(position)) = offset else {
            return Ok(false);
        };
        if let Err(err) = self.out.seek(SeekFrom::Start(position)) {
            warn!(field, position, %err, "skipping patch, seek failed");
            return Ok(false);
        }
        self.out.write_all(&script::encode_number(value))?;
        debug!(field, position, value, "patched metadata field");
        Ok(true)
    }

    /// Bytes written to the output so far.
    pub fn bytes_written(&self) -> u64 {
        self.state.bytes_written
    }

    /// Duration accumulated so far, in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.state.duration
    }

    /// The timestamp base the next input will be rebased onto.
    pub fn timestamp_base_ms(&self) -> u32 {
        self.state.timestamp_base
    }

    /// Get a reference to the output writer.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Consume the merger, returning the output writer without patching.
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::TAG_TYPE_VIDEO;
    use std::io::Cursor;

    #[test]
    fn test_empty_merge_finalizes_clean() {
        let mut merger = Merger::new(Cursor::new(Vec::new()));
        let summary = merger.finalize().unwrap();

        assert_eq!(summary.total_bytes, 0);
        assert_eq!(summary.duration_seconds, 0.0);
        assert!(!summary.duration_patched);
        assert!(!summary.filesize_patched);
    }

    #[test]
    fn test_rejected_input_leaves_state_untouched() {
        let mut merger = Merger::new(Cursor::new(Vec::new()));
        let mut bogus = Cursor::new(b"not an flv file at all".to_vec());

        let result = merger.append(&mut bogus);
        assert!(matches!(result, Err(MergeError::InvalidSignature(_))));
        assert_eq!(merger.bytes_written(), 0);
        assert_eq!(merger.timestamp_base_ms(), 0);
    }

    #[test]
    fn test_oversize_script_is_fatal() {
        let mut input = Vec::new();
        input.extend_from_slice(b"FLV\x01\x05\x00\x00\x00\x09\x00\x00\x00\x00");
        TagHeader::new(crate::tag::TAG_TYPE_SCRIPT_DATA, 256 * 1024, 0)
            .write(&mut input)
            .unwrap();

        let mut merger = Merger::new(Cursor::new(Vec::new()));
        let err = merger.append(&mut Cursor::new(input)).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            MergeError::ScriptPayloadTooLarge { size, .. } if size == 256 * 1024
        ));
    }

    #[test]
    fn test_truncated_payload_still_folds_timestamp() {
        let mut input = Vec::new();
        input.extend_from_slice(b"FLV\x01\x01\x00\x00\x00\x09\x00\x00\x00\x00");
        // Declares 100 payload bytes but provides none.
        TagHeader::new(TAG_TYPE_VIDEO, 100, 250).write(&mut input).unwrap();

        let mut merger = Merger::new(Cursor::new(Vec::new()));
        let err = merger.append(&mut Cursor::new(input)).unwrap_err();
        assert!(matches!(err, MergeError::CopyIncomplete { .. }));

        // The failed tag's adjusted timestamp still becomes the base.
        assert_eq!(merger.timestamp_base_ms(), 250);
    }
}
