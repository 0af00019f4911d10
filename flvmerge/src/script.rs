//! Script-data payload scanning.
//!
//! The merger does not parse AMF. It searches a script payload for the raw
//! key bytes of the two fields it patches, `duration` and `filesize`, and
//! remembers where each 8-byte number sits so the finalization pass can
//! overwrite it in place. Both numbers are big-endian IEEE-754 doubles,
//! like every AMF0 number.

use byteorder::{BigEndian, ByteOrder};

/// Largest script payload the scanner will buffer. A declared size at or
/// above this bound means malformed or adversarial input and aborts the
/// whole merge.
pub const MAX_SCRIPT_PAYLOAD: usize = 256 * 1024;

/// Key bytes of the duration field.
pub const DURATION_KEY: &[u8] = b"duration";

/// Key bytes of the total-size field.
pub const FILESIZE_KEY: &[u8] = b"filesize";

/// Distance from the start of a key to its number payload: the 8-byte key
/// followed by the AMF0 number marker.
const VALUE_OFFSET: usize = 9;

/// What one script payload yielded.
///
/// Positions are payload-relative; the merge driver turns them into
/// absolute output offsets.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ScriptScan {
    /// Decoded duration, when the field was present and complete.
    pub duration: Option<f64>,
    /// Offset of the duration number within the payload.
    pub duration_pos: Option<usize>,
    /// Offset of the filesize number within the payload.
    pub filesize_pos: Option<usize>,
}

/// Scan a script payload for the duration and filesize fields.
///
/// A payload without a complete `duration` field yields an empty scan —
/// that is "no metadata here", not an error. The `filesize` field is only
/// looked for once `duration` was found.
pub fn scan(payload: &[u8]) -> ScriptScan {
    let Some(pos) = field_value_pos(payload, DURATION_KEY) else {
        return ScriptScan::default();
    };

    ScriptScan {
        duration: Some(decode_number(&payload[pos..pos + 8])),
        duration_pos: Some(pos),
        filesize_pos: field_value_pos(payload, FILESIZE_KEY),
    }
}

/// Locate `key` and return the offset of its 8-byte number, or `None` when
/// the key is absent or the number would overrun the payload.
fn field_value_pos(payload: &[u8], key: &[u8]) -> Option<usize> {
    let at = find(payload, key)?;
    let pos = at + VALUE_OFFSET;
    if pos + 8 > payload.len() {
        return None;
    }
    Some(pos)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Decode a script number field.
pub fn decode_number(bytes: &[u8]) -> f64 {
    BigEndian::read_f64(bytes)
}

/// Encode a script number field for in-place patching.
pub fn encode_number(value: f64) -> [u8; 8] {
    let mut bytes = [0u8; 8];
    BigEndian::write_f64(&mut bytes, value);
    bytes
}
