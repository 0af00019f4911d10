//! # flvmerge
//!
//! Concatenation of FLV container files into one continuous stream.
//!
//! Inputs are appended in order to a single output. Media tag timestamps
//! are rebased so playback time keeps increasing across file joins, only
//! the first script-data tag survives into the output, and once every
//! input has been streamed the `duration` and `filesize` numbers inside
//! that tag are patched in place with the final totals.
//!
//! ## Example
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufWriter;
//! use flvmerge::Merger;
//!
//! let out = File::create("out.flv").unwrap();
//! let mut merger = Merger::new(BufWriter::new(out));
//!
//! for path in ["a.flv", "b.flv"] {
//!     if let Err(err) = merger.append_path(path.as_ref()) {
//!         eprintln!("skipping {}: {}", path, err);
//!     }
//! }
//!
//! let summary = merger.finalize().unwrap();
//! println!("{} bytes, {:.1}s", summary.total_bytes, summary.duration_seconds);
//! ```
//!
//! ## File structure
//!
//! ```text
//! Merged output
//! ├── File header (13 bytes, copied from the first accepted input)
//! │   ├── Signature: "FLV"
//! │   ├── Version, flags, header size
//! │   └── PreviousTagSize0 (4 bytes)
//! └── Tags from every input, in input order (repeating)
//!     ├── Tag header (11 bytes)
//!     │   ├── Tag type (8=audio, 9=video, other=script)
//!     │   ├── Data size (3 bytes)
//!     │   ├── Timestamp (3 bytes + 1 extended) — rebased for media tags
//!     │   └── Stream ID (3 bytes, passed through)
//!     ├── Tag data (copied verbatim)
//!     └── Previous tag size (4 bytes, copied verbatim)
//! ```
//!
//! A failing input aborts only itself: whatever it contributed before the
//! failure stays in the output, and the merge moves on to the next input.
//! The single exception is a script payload above the 256 KiB scanner
//! bound, which is treated as a run-level fault
//! ([`MergeError::is_fatal`]).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod copy;
pub mod error;
pub mod header;
pub mod merge;
pub mod script;
pub mod tag;

// Re-export main types
pub use copy::copy_exact;
pub use error::{MergeError, Result};
pub use header::{FileHeader, FILE_HEADER_SIZE, FLAG_AUDIO, FLAG_VIDEO, FLV_SIGNATURE};
pub use merge::{FileStats, MergeSummary, Merger, PatchOffset};
pub use script::{
    decode_number, encode_number, ScriptScan, DURATION_KEY, FILESIZE_KEY, MAX_SCRIPT_PAYLOAD,
};
pub use tag::{
    be_uint, TagHeader, TagKind, TAG_HEADER_SIZE, TAG_TRAILER_SIZE, TAG_TYPE_AUDIO,
    TAG_TYPE_SCRIPT_DATA, TAG_TYPE_VIDEO,
};
