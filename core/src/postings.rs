//! Postings store: a flat file of fixed-size records.
//!
//! Each record is 16 bytes, four little-endian `i32`s:
//! `doc_id, tf_title, tf_abstract, tf_claims`.
//! A term's records are contiguous; the term dictionary holds the byte
//! offset of the first record and the record count.

use crate::{IndexError, Posting, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Seek, SeekFrom, Write};

pub const RECORD_SIZE: u64 = 16;

/// Appends posting blocks while tracking the running byte offset.
pub struct PostingsWriter<W: Write> {
    inner: W,
    offset: u64,
}

impl<W: Write> PostingsWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, offset: 0 }
    }

    /// Writes one term's block and returns `(start, length)` for its dictionary entry.
    pub fn write_block(&mut self, postings: &[Posting]) -> Result<(u64, u32)> {
        let start = self.offset;
        for p in postings {
            self.inner.write_i32::<LittleEndian>(to_i32(p.doc_id)?)?;
            for tf in p.tf {
                self.inner.write_i32::<LittleEndian>(to_i32(tf)?)?;
            }
            self.offset += RECORD_SIZE;
        }
        Ok((start, postings.len() as u32))
    }

    pub fn bytes_written(&self) -> u64 {
        self.offset
    }

    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

fn to_i32(v: u32) -> Result<i32> {
    i32::try_from(v).map_err(|_| IndexError::InvalidIndex(format!("value {v} exceeds i32 record field")))
}

/// Random-access reader over a postings store.
pub struct PostingsReader<R: Read + Seek> {
    inner: R,
}

impl<R: Read + Seek> PostingsReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Seeks to `start` and reads `length` records. A short read is reported as corruption.
    ///
    /// Pre-allocation is bounded by the bytes left in the store, so a bogus `length`
    /// ends in a short read rather than a huge allocation.
    pub fn read_postings(&mut self, start: u64, length: u32) -> Result<Vec<Posting>> {
        let end = self.inner.seek(SeekFrom::End(0))?;
        let available = end.saturating_sub(start) / RECORD_SIZE;
        self.inner.seek(SeekFrom::Start(start))?;
        let mut out = Vec::with_capacity((length as u64).min(available) as usize);
        let mut buf = [0u8; RECORD_SIZE as usize];
        for i in 0..length as u64 {
            let offset = start + i * RECORD_SIZE;
            match self.inner.read_exact(&mut buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(IndexError::Corruption {
                        offset,
                        reason: format!("incomplete record {} of {}", i + 1, length),
                    });
                }
                Err(e) => return Err(e.into()),
            }
            out.push(decode_record(&buf, offset)?);
        }
        Ok(out)
    }
}

fn decode_record(mut buf: &[u8], offset: u64) -> Result<Posting> {
    let mut fields = [0u32; 4];
    for slot in fields.iter_mut() {
        let v = buf.read_i32::<LittleEndian>()?;
        *slot = u32::try_from(v).map_err(|_| IndexError::Corruption {
            offset,
            reason: format!("negative value {v} in posting record"),
        })?;
    }
    Ok(Posting { doc_id: fields[0], tf: [fields[1], fields[2], fields[3]] })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> Vec<Posting> {
        vec![
            Posting { doc_id: 0, tf: [1, 0, 3] },
            Posting { doc_id: 4, tf: [0, 2, 0] },
        ]
    }

    #[test]
    fn blocks_are_contiguous_and_readable_by_offset() {
        let mut w = PostingsWriter::new(Vec::new());
        let (s0, l0) = w.write_block(&sample()).unwrap();
        let (s1, l1) = w.write_block(&[Posting { doc_id: 2, tf: [5, 5, 5] }]).unwrap();
        assert_eq!((s0, l0), (0, 2));
        assert_eq!((s1, l1), (32, 1));
        let bytes = w.finish().unwrap();
        assert_eq!(bytes.len(), 48);

        let mut r = PostingsReader::new(Cursor::new(bytes));
        assert_eq!(r.read_postings(s1, l1).unwrap(), vec![Posting { doc_id: 2, tf: [5, 5, 5] }]);
        assert_eq!(r.read_postings(s0, l0).unwrap(), sample());
    }

    #[test]
    fn byte_layout_is_little_endian() {
        let mut w = PostingsWriter::new(Vec::new());
        w.write_block(&[Posting { doc_id: 1, tf: [2, 0, 0x0102] }]).unwrap();
        let bytes = w.finish().unwrap();
        assert_eq!(&bytes[0..4], &[1, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &[2, 0, 0, 0]);
        assert_eq!(&bytes[12..16], &[2, 1, 0, 0]);
    }

    #[test]
    fn short_read_is_corruption() {
        let mut w = PostingsWriter::new(Vec::new());
        w.write_block(&sample()).unwrap();
        let mut bytes = w.finish().unwrap();
        bytes.truncate(24);
        let mut r = PostingsReader::new(Cursor::new(bytes));
        let err = r.read_postings(0, 2).unwrap_err();
        match err {
            IndexError::Corruption { offset, .. } => assert_eq!(offset, 16),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn oversized_length_is_corruption_not_allocation() {
        let mut w = PostingsWriter::new(Vec::new());
        w.write_block(&sample()).unwrap();
        let mut r = PostingsReader::new(Cursor::new(w.finish().unwrap()));
        let err = r.read_postings(0, 4_000_000_000).unwrap_err();
        assert!(matches!(err, IndexError::Corruption { offset: 32, .. }));
        let err = r.read_postings(1 << 40, u32::MAX).unwrap_err();
        assert!(err.is_corruption());
    }
}
