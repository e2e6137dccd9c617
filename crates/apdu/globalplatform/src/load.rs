//! Load file segmentation
//!
//! A load file travels to the card as one Load File Data Block
//! (`C4 ‖ BER length ‖ load file`) split over numbered LOAD commands.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result, commands::LoadCommand, constants::tags};

/// Default block size for LOAD commands, leaving room for a C-MAC
pub const BLOCK_SIZE: usize = 247;

/// Largest block a LOAD command can carry without a C-MAC
pub const MAX_BLOCK_SIZE: usize = 255;

/// P2 numbers blocks with a single byte
pub const MAX_BLOCKS: usize = 256;

/// Encode a length as a BER-TLV length field
///
/// Short form below `0x80`, then `81`..`84` followed by one to four length
/// bytes. Lengths of 2^32 and above cannot be encoded.
pub fn encode_length(length: usize) -> Result<Vec<u8>> {
    let encoded = if length < 0x80 {
        vec![length as u8]
    } else if length < 0x100 {
        vec![0x81, length as u8]
    } else if length < 0x1_0000 {
        vec![0x82, (length >> 8) as u8, length as u8]
    } else if length < 0x100_0000 {
        vec![0x83, (length >> 16) as u8, (length >> 8) as u8, length as u8]
    } else if (length as u64) < 0x1_0000_0000 {
        let mut encoded = vec![0x84];
        encoded.extend_from_slice(&(length as u32).to_be_bytes());
        encoded
    } else {
        return Err(Error::LengthOverflow(length));
    };
    Ok(encoded)
}

/// Wrap raw load file bytes in the C4 Load File Data Block tag
pub fn load_file_data_block(load_file: &[u8]) -> Result<Bytes> {
    let length = encode_length(load_file.len())?;
    let mut block = BytesMut::with_capacity(1 + length.len() + load_file.len());
    block.put_u8(tags::LOAD_FILE_DATA_BLOCK);
    block.put_slice(&length);
    block.put_slice(load_file);
    Ok(block.freeze())
}

/// A stream of LOAD commands for one load file
#[derive(Debug)]
pub struct LoadCommandStream {
    /// Load File Data Block
    data: Bytes,
    /// Bytes per LOAD command
    block_size: usize,
    /// Current position in data
    position: usize,
    /// Total blocks count
    blocks_count: usize,
    /// Current block index
    current_block: usize,
}

impl LoadCommandStream {
    /// Segment `load_file` into blocks of at most `block_size` bytes
    pub fn new(load_file: &[u8], block_size: usize) -> Result<Self> {
        if block_size == 0 || block_size > MAX_BLOCK_SIZE {
            return Err(Error::InvalidBlockSize(block_size));
        }
        let data = load_file_data_block(load_file)?;
        let blocks_count = data.len().div_ceil(block_size);
        if blocks_count > MAX_BLOCKS {
            return Err(Error::LoadFileTooLarge {
                blocks: blocks_count,
            });
        }

        Ok(Self {
            data,
            block_size,
            position: 0,
            blocks_count,
            current_block: 0,
        })
    }

    /// Get the total number of blocks
    pub const fn blocks_count(&self) -> usize {
        self.blocks_count
    }

    /// Get the current block index
    pub const fn current_block(&self) -> usize {
        self.current_block
    }

    /// Check if there are more blocks
    pub const fn has_next(&self) -> bool {
        self.position < self.data.len()
    }
}

impl Iterator for LoadCommandStream {
    type Item = LoadCommand;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }

        let remaining = self.data.len() - self.position;
        let size = remaining.min(self.block_size);
        let is_last = remaining <= self.block_size;

        // blocks_count <= 256 keeps the index within a byte
        let block_number = self.current_block as u8;
        let block = self.data.slice(self.position..self.position + size);

        self.position += size;
        self.current_block += 1;

        Some(LoadCommand::block(block_number, block, is_last))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.blocks_count - self.current_block;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for LoadCommandStream {}

#[cfg(test)]
mod tests {
    use super::*;
    use cardcheck_apdu_core::ApduCommand;
    use hex_literal::hex;

    #[test]
    fn test_encode_length() {
        assert_eq!(encode_length(0x00).unwrap(), vec![0x00]);
        assert_eq!(encode_length(0x7F).unwrap(), vec![0x7F]);
        assert_eq!(encode_length(0x80).unwrap(), vec![0x81, 0x80]);
        assert_eq!(encode_length(0xFF).unwrap(), vec![0x81, 0xFF]);
        assert_eq!(encode_length(0x100).unwrap(), vec![0x82, 0x01, 0x00]);
        assert_eq!(encode_length(0xFFFF).unwrap(), vec![0x82, 0xFF, 0xFF]);
        assert_eq!(encode_length(0x1_0000).unwrap(), vec![0x83, 0x01, 0x00, 0x00]);
        assert_eq!(
            encode_length(0x100_0000).unwrap(),
            vec![0x84, 0x01, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            encode_length(0xFFFF_FFFF).unwrap(),
            vec![0x84, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_encode_length_overflow() {
        assert!(matches!(
            encode_length(0x1_0000_0000),
            Err(Error::LengthOverflow(0x1_0000_0000))
        ));
    }

    #[test]
    fn test_load_file_data_block() {
        assert_eq!(load_file_data_block(&hex!("0102")).unwrap().as_ref(), hex!("C4020102"));
        let block = load_file_data_block(&[0xAB; 0x90]).unwrap();
        assert_eq!(&block[..3], hex!("C48190"));
        assert_eq!(block.len(), 3 + 0x90);
    }

    #[test]
    fn test_blocks_reassemble_in_order() {
        let load_file: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
        let stream = LoadCommandStream::new(&load_file, 247).unwrap();
        assert_eq!(stream.blocks_count(), 5);
        assert_eq!(stream.len(), 5);

        let commands: Vec<_> = stream.collect();
        let mut reassembled = Vec::new();
        for (index, command) in commands.iter().enumerate() {
            assert_eq!(usize::from(command.p2()), index);
            assert_eq!(command.is_last(), index == commands.len() - 1);
            assert!(command.payload().len() <= 247);
            reassembled.extend_from_slice(command.payload());
        }
        assert_eq!(reassembled, load_file_data_block(&load_file).unwrap());
        assert_eq!(commands[4].p1(), 0x80);
        assert!(commands[..4].iter().all(|command| command.p1() == 0x00));
    }

    #[test]
    fn test_single_block() {
        let mut stream = LoadCommandStream::new(&hex!("01020304"), 247).unwrap();
        let only = stream.next().unwrap();
        assert!(only.is_last());
        assert_eq!(only.to_bytes().as_ref(), hex!("80E8800006C40401020304"));
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_block_limits() {
        // 256 blocks of 1 byte fit, 257 do not
        assert!(LoadCommandStream::new(&[0u8; 253], 1).is_ok());
        assert!(matches!(
            LoadCommandStream::new(&[0u8; 254], 1),
            Err(Error::LoadFileTooLarge { blocks: 257 })
        ));
        assert!(matches!(
            LoadCommandStream::new(&[0u8; 4], 0),
            Err(Error::InvalidBlockSize(0))
        ));
        assert!(matches!(
            LoadCommandStream::new(&[0u8; 4], 256),
            Err(Error::InvalidBlockSize(256))
        ));
    }
}
