//! Binary store used to persist layers.
//!
//! Format: little-endian primitives; sizes as u64; strings and arrays are
//! prefixed with their element count. The reader checks every prefix
//! against the bytes that remain before allocating, so a corrupt length
//! fails with [`LayerError::Format`] instead of exhausting memory.

use crate::error::{LayerError, LayerResult};

#[derive(Debug, Default, Clone)]
pub struct StoreWriter {
    buf: Vec<u8>,
}

impl StoreWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_size(&mut self, value: usize) {
        self.buf.extend_from_slice(&(value as u64).to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_size(value.len());
        self.buf.extend_from_slice(value.as_bytes());
    }

    pub fn write_f32_slice(&mut self, values: &[f32]) {
        self.write_size(values.len());
        for &value in values {
            self.write_f32(value);
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[derive(Debug, Clone)]
pub struct StoreReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> StoreReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Fail if anything is left after the last expected value.
    pub fn expect_end(&self) -> LayerResult<()> {
        if self.is_exhausted() {
            Ok(())
        } else {
            Err(LayerError::format(
                self.pos,
                format!("{} trailing bytes", self.remaining()),
            ))
        }
    }

    fn take(&mut self, len: usize) -> LayerResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(LayerError::format(
                self.pos,
                format!("need {} bytes, {} remaining", len, self.remaining()),
            ));
        }
        let data = self.data;
        let bytes = &data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> LayerResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> LayerResult<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_size(&mut self) -> LayerResult<usize> {
        let offset = self.pos;
        let raw = u64::from_le_bytes(self.take_array()?);
        usize::try_from(raw)
            .map_err(|_| LayerError::format(offset, format!("size {} does not fit in usize", raw)))
    }

    pub fn read_f32(&mut self) -> LayerResult<f32> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    /// Read an element count and check that `element_size * count` bytes remain.
    fn read_count(&mut self, element_size: usize) -> LayerResult<usize> {
        let offset = self.pos;
        let count = self.read_size()?;
        let needed = count.checked_mul(element_size);
        match needed {
            Some(bytes) if bytes <= self.remaining() => Ok(count),
            _ => Err(LayerError::format(
                offset,
                format!(
                    "declared length {} exceeds the {} bytes remaining",
                    count,
                    self.remaining()
                ),
            )),
        }
    }

    pub fn read_string(&mut self) -> LayerResult<String> {
        let len = self.read_count(1)?;
        let offset = self.pos;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| LayerError::format(offset, format!("invalid UTF-8 string: {}", e)))
    }

    pub fn read_f32_vec(&mut self) -> LayerResult<Vec<f32>> {
        let len = self.read_count(4)?;
        let mut values = Vec::with_capacity(len);
        for _ in 0..len {
            values.push(self.read_f32()?);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_read_back_in_order() {
        let mut writer = StoreWriter::new();
        writer.write_u8(3);
        writer.write_size(42);
        writer.write_str("dense");
        writer.write_f32_slice(&[1.0, -2.5]);

        let bytes = writer.into_bytes();
        let mut reader = StoreReader::new(&bytes);
        assert_eq!(reader.read_u8().unwrap(), 3);
        assert_eq!(reader.read_size().unwrap(), 42);
        assert_eq!(reader.read_string().unwrap(), "dense");
        assert_eq!(reader.read_f32_vec().unwrap(), vec![1.0, -2.5]);
        assert!(reader.expect_end().is_ok());
    }

    #[test]
    fn test_truncated_primitive() {
        let mut reader = StoreReader::new(&[1, 2, 3]);
        let err = reader.read_size().unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn test_declared_length_exceeds_remaining() {
        let mut writer = StoreWriter::new();
        writer.write_size(1_000_000);
        writer.write_f32(1.0);
        let bytes = writer.into_bytes();

        let err = StoreReader::new(&bytes).read_f32_vec().unwrap_err();
        match err {
            LayerError::Format { offset, reason } => {
                assert_eq!(offset, 0);
                assert!(reason.contains("exceeds"), "{}", reason);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_huge_count_does_not_overflow() {
        let mut writer = StoreWriter::new();
        writer.write_size(usize::MAX);
        let bytes = writer.into_bytes();

        assert!(StoreReader::new(&bytes).read_f32_vec().unwrap_err().is_format());
    }

    #[test]
    fn test_invalid_utf8() {
        let mut writer = StoreWriter::new();
        writer.write_size(2);
        let mut bytes = writer.into_bytes();
        bytes.extend_from_slice(&[0xff, 0xfe]);

        assert!(StoreReader::new(&bytes).read_string().unwrap_err().is_format());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let reader = StoreReader::new(&[0]);
        assert!(reader.expect_end().unwrap_err().is_format());
    }
}
