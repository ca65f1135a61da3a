use crate::error::StrapError;

type Result<T> = std::result::Result<T, InvalidIndexError>;

#[derive(Debug)]
pub struct InvalidIndexError;

/// Sequential little-endian reads that consume the front of a byte slice.
pub trait BufferReader {
    fn read<const N: usize>(&mut self) -> Result<[u8; N]>;
    fn skip(&mut self, n: usize) -> Result<()>;

    fn pop_front(&mut self) -> Result<u8> {
        let [byte] = self.read()?;
        Ok(byte)
    }
    fn read_u32_le(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read()?))
    }
    fn read_u16_le(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read()?))
    }
}

impl BufferReader for &[u8] {
    fn read<const N: usize>(&mut self) -> Result<[u8; N]> {
        let (head, tail) = self.split_first_chunk::<N>().ok_or(InvalidIndexError)?;
        *self = tail;
        Ok(*head)
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        *self = self.get(n..).ok_or(InvalidIndexError)?;
        Ok(())
    }
}

pub(crate) fn byte_at(data: &[u8], offset: usize) -> Result<u8> {
    data.get(offset).copied().ok_or(InvalidIndexError)
}

pub(crate) fn u16_le_at(data: &[u8], offset: usize) -> Result<u16> {
    let mut tail = data.get(offset..).ok_or(InvalidIndexError)?;
    tail.read_u16_le()
}

pub(crate) fn u32_le_at(data: &[u8], offset: usize) -> Result<u32> {
    let mut tail = data.get(offset..).ok_or(InvalidIndexError)?;
    tail.read_u32_le()
}

impl From<InvalidIndexError> for StrapError {
    fn from(_: InvalidIndexError) -> Self {
        Self::UnexpectedEnd
    }
}
