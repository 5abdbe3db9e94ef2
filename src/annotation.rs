//! Sparse annotation records: comments, NAGs, variation forks, and
//! newline markers, each keyed by a mainline move index.
//!
//! Wire form: varint `move_index`, one tag byte, then a payload whose
//! shape is determined by the record type in the tag's low 3 bits.

use std::io::{Read, Write};

use crate::error::StoreError;

const TYPE_MASK: u8 = 0b0000_0111;
const FLAG_IS_PRE: u8 = 0b0000_1000;
const FLAG_IS_SEMICOLON: u8 = 0b0001_0000;
const FLAG_COMMENT_NEWLINE: u8 = 0b0010_0000;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AnnotationKind {
    Comment {
        text_hash: u64,
        is_pre: bool,
        is_semicolon: bool,
        comment_newline: bool,
    },
    Nag {
        code: u8,
    },
    Variation {
        variation_move_hash: u64,
        variation_meta_hash: u64,
    },
    Newline,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AnnotationRecord {
    pub move_index: u64,
    pub kind: AnnotationKind,
}

fn write_varint<W: Write>(mut w: W, mut value: u64) -> Result<(), StoreError> {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        w.write_all(&[byte])?;
        if value == 0 {
            break;
        }
    }
    Ok(())
}

fn read_varint<R: Read>(mut r: R) -> Result<u64, StoreError> {
    let mut value: u64 = 0;
    let mut shift = 0;
    loop {
        let mut byte = [0u8; 1];
        r.read_exact(&mut byte)?;
        value |= ((byte[0] & 0x7f) as u64) << shift;
        if byte[0] & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    Ok(value)
}

impl AnnotationRecord {
    pub fn comment(move_index: u64, text_hash: u64, is_pre: bool, is_semicolon: bool, comment_newline: bool) -> Self {
        Self { move_index, kind: AnnotationKind::Comment { text_hash, is_pre, is_semicolon, comment_newline } }
    }

    pub fn nag(move_index: u64, code: u8) -> Self {
        Self { move_index, kind: AnnotationKind::Nag { code } }
    }

    pub fn variation(move_index: u64, variation_move_hash: u64, variation_meta_hash: u64) -> Self {
        Self { move_index, kind: AnnotationKind::Variation { variation_move_hash, variation_meta_hash } }
    }

    pub fn newline(move_index: u64) -> Self {
        Self { move_index, kind: AnnotationKind::Newline }
    }

    pub fn write<W: Write>(&self, mut w: W) -> Result<(), StoreError> {
        write_varint(&mut w, self.move_index)?;
        match &self.kind {
            AnnotationKind::Comment { text_hash, is_pre, is_semicolon, comment_newline } => {
                let mut tag = 0u8; // type 0
                if *is_pre {
                    tag |= FLAG_IS_PRE;
                }
                if *is_semicolon {
                    tag |= FLAG_IS_SEMICOLON;
                }
                if *comment_newline {
                    tag |= FLAG_COMMENT_NEWLINE;
                }
                w.write_all(&[tag])?;
                w.write_all(&text_hash.to_le_bytes())?;
            }
            AnnotationKind::Nag { code } => {
                w.write_all(&[1u8])?;
                w.write_all(&[*code])?;
            }
            AnnotationKind::Variation { variation_move_hash, variation_meta_hash } => {
                w.write_all(&[2u8])?;
                w.write_all(&variation_move_hash.to_le_bytes())?;
                w.write_all(&variation_meta_hash.to_le_bytes())?;
            }
            AnnotationKind::Newline => {
                w.write_all(&[3u8 | FLAG_COMMENT_NEWLINE])?;
            }
        }
        Ok(())
    }

    pub fn read<R: Read>(mut r: R) -> Result<Self, StoreError> {
        let move_index = read_varint(&mut r)?;
        let mut tag_buf = [0u8; 1];
        r.read_exact(&mut tag_buf)?;
        let tag = tag_buf[0];
        let kind = match tag & TYPE_MASK {
            0 => {
                let mut hash_buf = [0u8; 8];
                r.read_exact(&mut hash_buf)?;
                AnnotationKind::Comment {
                    text_hash: u64::from_le_bytes(hash_buf),
                    is_pre: tag & FLAG_IS_PRE != 0,
                    is_semicolon: tag & FLAG_IS_SEMICOLON != 0,
                    comment_newline: tag & FLAG_COMMENT_NEWLINE != 0,
                }
            }
            1 => {
                let mut code_buf = [0u8; 1];
                r.read_exact(&mut code_buf)?;
                AnnotationKind::Nag { code: code_buf[0] }
            }
            2 => {
                let mut a = [0u8; 8];
                let mut b = [0u8; 8];
                r.read_exact(&mut a)?;
                r.read_exact(&mut b)?;
                AnnotationKind::Variation {
                    variation_move_hash: u64::from_le_bytes(a),
                    variation_meta_hash: u64::from_le_bytes(b),
                }
            }
            3 => AnnotationKind::Newline,
            other => return Err(StoreError::UnknownAnnotationTag(other)),
        };
        Ok(Self { move_index, kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(rec: &AnnotationRecord) -> AnnotationRecord {
        let mut buf = Vec::new();
        rec.write(&mut buf).unwrap();
        AnnotationRecord::read(&buf[..]).unwrap()
    }

    #[test]
    fn comment_round_trips_with_flags() {
        let rec = AnnotationRecord::comment(12, 0xdead_beef, true, false, true);
        assert_eq!(round_trip(&rec), rec);
    }

    #[test]
    fn nag_round_trips() {
        let rec = AnnotationRecord::nag(3, 1);
        assert_eq!(round_trip(&rec), rec);
    }

    #[test]
    fn variation_round_trips() {
        let rec = AnnotationRecord::variation(12, 111, 222);
        assert_eq!(round_trip(&rec), rec);
    }

    #[test]
    fn newline_round_trips() {
        let rec = AnnotationRecord::newline(5);
        assert_eq!(round_trip(&rec), rec);
    }

    #[test]
    fn unknown_tag_is_corrupt() {
        let mut buf = Vec::new();
        write_varint(&mut buf, 0).unwrap();
        buf.push(7); // type bits 111 are not in {0,1,2,3}
        buf.extend_from_slice(&0u64.to_le_bytes());
        assert!(matches!(AnnotationRecord::read(&buf[..]), Err(StoreError::UnknownAnnotationTag(7))));
    }

    #[test]
    fn varint_round_trips_for_large_indices() {
        for v in [0u64, 1, 127, 128, 300, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            write_varint(&mut buf, v).unwrap();
            assert_eq!(read_varint(&buf[..]).unwrap(), v);
        }
    }

    proptest::proptest! {
        #[test]
        fn varint_round_trips_for_any_u64(v: u64) {
            let mut buf = Vec::new();
            write_varint(&mut buf, v).unwrap();
            proptest::prop_assert_eq!(read_varint(&buf[..]).unwrap(), v);
        }
    }
}
