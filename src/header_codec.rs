//! Bit layout and pack/unpack routines for the 32-bit log header.
//!
//! Every record emitted by the firmware starts with one header word followed
//! by `param_count` parameter words:
//!
//! ```text
//!  31                    20 19                 8 7            2 1       0
//! +-----------------------+--------------------+--------------+---------+
//! |  identity (12 bits)   |  line (12 bits)    | count (6)    | lvl (2) |
//! +-----------------------+--------------------+--------------+---------+
//! ```
//!
//! All fields are unsigned; unpacking never sign-extends.

use std::fmt;
use std::str::FromStr;

use crate::error::CodecError;

/// Width of the identity (file ID) field in bits.
pub const IDENTITY_BITS: u32 = 12;
/// Width of the line number field in bits.
pub const LINE_BITS: u32 = 12;
/// Width of the parameter count field in bits.
pub const PARAM_COUNT_BITS: u32 = 6;
/// Width of the level field in bits.
pub const LEVEL_BITS: u32 = 2;

/// Number of low bits holding level and parameter count.
const TAIL_BITS: u32 = PARAM_COUNT_BITS + LEVEL_BITS;
const IDENTITY_SHIFT: u32 = LINE_BITS + TAIL_BITS;
const LINE_SHIFT: u32 = TAIL_BITS;
const PARAM_COUNT_SHIFT: u32 = LEVEL_BITS;

const IDENTITY_MASK: u32 = (1 << IDENTITY_BITS) - 1;
const LINE_MASK: u32 = (1 << LINE_BITS) - 1;
const PARAM_COUNT_MASK: u32 = (1 << PARAM_COUNT_BITS) - 1;
const LEVEL_MASK: u32 = (1 << LEVEL_BITS) - 1;

/// Largest identity that fits in the header.
pub const MAX_IDENTITY: u16 = IDENTITY_MASK as u16;
/// Largest line number that fits in the header.
pub const MAX_LINE: u16 = LINE_MASK as u16;
/// Largest parameter count that fits in the header.
pub const MAX_PARAM_COUNT: u8 = PARAM_COUNT_MASK as u8;

/// Severity of a log call site, stored in the two lowest header bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogLevel {
    Err = 0,
    Wrn = 1,
    Inf = 2,
    Dbg = 3,
}

impl LogLevel {
    /// All levels in encoding order.
    pub const ALL: [LogLevel; 4] = [LogLevel::Err, LogLevel::Wrn, LogLevel::Inf, LogLevel::Dbg];

    /// Maps the two level bits back to a level. Every 2-bit value is valid.
    pub fn from_bits(bits: u32) -> Self {
        match bits & LEVEL_MASK {
            0 => LogLevel::Err,
            1 => LogLevel::Wrn,
            2 => LogLevel::Inf,
            _ => LogLevel::Dbg,
        }
    }

    /// The encoded value of this level.
    pub fn bits(self) -> u32 {
        self as u32
    }

    /// Three-letter tag used in decoded output.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Err => "ERR",
            LogLevel::Wrn => "WRN",
            LogLevel::Inf => "INF",
            LogLevel::Dbg => "DBG",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_ascii_uppercase().as_str() {
            "ERR" | "ERROR" => Ok(LogLevel::Err),
            "WRN" | "WARN" => Ok(LogLevel::Wrn),
            "INF" | "INFO" => Ok(LogLevel::Inf),
            "DBG" | "DEBUG" => Ok(LogLevel::Dbg),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// A decoded (or to-be-encoded) log header.
///
/// Construct with [`LogHeader::new`], which rejects values that do not fit
/// their field. [`LogHeader::unpack`] is total: every `u32` is a valid header.
///
/// # Examples
///
/// ```
/// use fileid_log::header_codec::{LogHeader, LogLevel};
///
/// let header = LogHeader::new(51, 42, LogLevel::Err, 1).unwrap();
/// let word = header.pack();
/// assert_eq!(word, 0x0330_2A04);
/// assert_eq!(LogHeader::unpack(word), header);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogHeader {
    pub identity: u16,
    pub line: u16,
    pub level: LogLevel,
    pub param_count: u8,
}

impl LogHeader {
    /// Creates a header, validating each field against its bit width.
    ///
    /// # Arguments
    ///
    /// * `identity` - File ID, 0-4095
    /// * `line` - Source line, 0-4095
    /// * `level` - Severity
    /// * `param_count` - Number of trailing parameter words, 0-63
    ///
    /// # Returns
    ///
    /// The header, or a [`CodecError`] naming the first field out of range.
    pub fn new(
        identity: u32,
        line: u32,
        level: LogLevel,
        param_count: u32,
    ) -> Result<Self, CodecError> {
        if identity > IDENTITY_MASK {
            return Err(CodecError::IdentityOutOfRange(identity));
        }
        if line > LINE_MASK {
            return Err(CodecError::LineOutOfRange(line));
        }
        if param_count > PARAM_COUNT_MASK {
            return Err(CodecError::ParamCountOutOfRange(param_count));
        }
        Ok(Self {
            identity: identity as u16,
            line: line as u16,
            level,
            param_count: param_count as u8,
        })
    }

    /// Packs the header into its 32-bit wire form.
    pub fn pack(&self) -> u32 {
        pack_truncating(
            u32::from(self.identity),
            u32::from(self.line),
            self.level,
            u32::from(self.param_count),
        )
    }

    /// Unpacks a 32-bit header word. Exact inverse of [`LogHeader::pack`].
    pub fn unpack(word: u32) -> Self {
        Self {
            identity: ((word >> IDENTITY_SHIFT) & IDENTITY_MASK) as u16,
            line: ((word >> LINE_SHIFT) & LINE_MASK) as u16,
            level: LogLevel::from_bits(word),
            param_count: ((word >> PARAM_COUNT_SHIFT) & PARAM_COUNT_MASK) as u8,
        }
    }
}

/// Packs header fields without validation, masking each to its width.
///
/// This mirrors the firmware encode macro and is lossy: an identity of 4096
/// silently becomes 0 and a line of 5000 becomes 904. Host code should prefer
/// [`LogHeader::new`], which reports such values as errors.
pub fn pack_truncating(identity: u32, line: u32, level: LogLevel, param_count: u32) -> u32 {
    ((identity & IDENTITY_MASK) << IDENTITY_SHIFT)
        | ((line & LINE_MASK) << LINE_SHIFT)
        | ((param_count & PARAM_COUNT_MASK) << PARAM_COUNT_SHIFT)
        | level.bits()
}

/// Encodes a complete record: the header word followed by its parameters.
///
/// # Arguments
///
/// * `header` - The header; its `param_count` must equal `params.len()`
/// * `params` - Parameter words in call order
///
/// # Returns
///
/// The words in emission order, or [`CodecError::ParamCountMismatch`]
pub fn encode_record(header: &LogHeader, params: &[u32]) -> Result<Vec<u32>, CodecError> {
    if usize::from(header.param_count) != params.len() {
        return Err(CodecError::ParamCountMismatch {
            declared: header.param_count,
            supplied: params.len(),
        });
    }
    let mut words = Vec::with_capacity(1 + params.len());
    words.push(header.pack());
    words.extend_from_slice(params);
    Ok(words)
}

/// Formats words the way the firmware prints them: `0x%08X` separated by spaces.
pub fn format_tokens(words: &[u32]) -> String {
    words
        .iter()
        .map(|w| format!("0x{:08X}", w))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_layout() {
        let header = LogHeader::new(0xABC, 0x123, LogLevel::Dbg, 0x2A).unwrap();
        let word = header.pack();
        assert_eq!(word >> 20, 0xABC);
        assert_eq!((word >> 8) & 0xFFF, 0x123);
        assert_eq!((word >> 2) & 0x3F, 0x2A);
        assert_eq!(word & 0x3, 3);
    }

    #[test]
    fn test_round_trip_extremes() {
        for level in LogLevel::ALL {
            for &(id, line, count) in &[(0, 0, 0), (4095, 4095, 63), (1, 4095, 0), (4095, 0, 63)] {
                let header = LogHeader::new(id, line, level, count).unwrap();
                let back = LogHeader::unpack(header.pack());
                assert_eq!(back, header);
            }
        }
    }

    #[test]
    fn test_round_trip_all_identities() {
        for id in 0..=u32::from(MAX_IDENTITY) {
            let header = LogHeader::new(id, id, LogLevel::from_bits(id), id % 64).unwrap();
            assert_eq!(LogHeader::unpack(header.pack()), header);
        }
    }

    #[test]
    fn test_unpack_no_sign_extension() {
        let header = LogHeader::unpack(0xFFFF_FFFF);
        assert_eq!(header.identity, 4095);
        assert_eq!(header.line, 4095);
        assert_eq!(header.param_count, 63);
        assert_eq!(header.level, LogLevel::Dbg);
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert_eq!(
            LogHeader::new(4096, 1, LogLevel::Inf, 0),
            Err(CodecError::IdentityOutOfRange(4096))
        );
        assert_eq!(
            LogHeader::new(1, 4096, LogLevel::Inf, 0),
            Err(CodecError::LineOutOfRange(4096))
        );
        assert_eq!(
            LogHeader::new(1, 1, LogLevel::Inf, 64),
            Err(CodecError::ParamCountOutOfRange(64))
        );
    }

    #[test]
    fn test_truncating_pack_is_lossy() {
        let word = pack_truncating(4096 + 7, 5000, LogLevel::Wrn, 0);
        let header = LogHeader::unpack(word);
        assert_eq!(header.identity, 7);
        assert_eq!(header.line, 5000 & 0xFFF);
    }

    #[test]
    fn test_encode_record() {
        let header = LogHeader::new(51, 42, LogLevel::Err, 1).unwrap();
        let words = encode_record(&header, &[42]).unwrap();
        assert_eq!(words, vec![0x0330_2A04, 0x2A]);
        assert_eq!(format_tokens(&words), "0x03302A04 0x0000002A");

        let err = encode_record(&header, &[]).unwrap_err();
        assert_eq!(err, CodecError::ParamCountMismatch { declared: 1, supplied: 0 });
    }

    #[test]
    fn test_level_parse_and_display() {
        assert_eq!("err".parse::<LogLevel>().unwrap(), LogLevel::Err);
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Wrn);
        assert!("fatal".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Inf.to_string(), "INF");
    }
}
