use crate::{
    boards::BoardInfo,
    uf2::{
        BlockDefect, UF2_BLOCK_SIZE, UF2_FLAG_FAMILY_ID_PRESENT, UF2_MAGIC_END, UF2_MAGIC_START0,
        UF2_MAGIC_START1, UF2_PAYLOAD_CAPACITY, Uf2Block, Uf2BlockData, Uf2BlockFooter,
        Uf2BlockHeader, blocks,
    },
};
use std::io::Write;

use assert_into::AssertInto;
use log::*;
use thiserror::Error;
use zerocopy::{IntoBytes, byteorder::little_endian::U32};

pub mod boards;
pub mod output;
pub mod uf2;

/// Payload bytes per block used by most UF2 bootloaders.
pub const DEFAULT_CHUNK_SIZE: usize = 256;

// See https://github.com/microsoft/uf2/blob/master/utils/uf2families.json for list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
#[allow(non_camel_case_types)]
pub enum Family {
    /// Microchip (Atmel) SAMD21
    SAMD21 = 0x68ed2b88,

    /// Microchip (Atmel) SAMD51
    SAMD51 = 0x55114460,

    /// Raspberry Pi RP2040
    RP2040 = 0xe48bff56,

    /// Raspberry Pi Microcontrollers: Absolute (unpartitioned) download
    RP2XXX_ABSOLUTE = 0xe48bff57,

    /// Raspberry Pi Microcontrollers: Data partition download
    RP2XXX_DATA = 0xe48bff58,

    /// Raspberry Pi RP2350, Secure Arm image
    RP2350_ARM_S = 0xe48bff59,

    /// Raspberry Pi RP2350, RISC-V image
    RP2350_RISCV = 0xe48bff5a,

    /// Raspberry Pi RP2350, Non-secure Arm image
    RP2350_ARM_NS = 0xe48bff5b,
}

impl Family {
    pub const ALL: &'static [Family] = &[
        Family::SAMD21,
        Family::SAMD51,
        Family::RP2040,
        Family::RP2XXX_ABSOLUTE,
        Family::RP2XXX_DATA,
        Family::RP2350_ARM_S,
        Family::RP2350_RISCV,
        Family::RP2350_ARM_NS,
    ];

    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|family| family.id() == id)
    }
}

/// Everything the encoder needs besides the image itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Payload bytes per block, 1..=476
    pub chunk_size: usize,
    pub family_id: Option<u32>,
    /// Flash address of the first image byte
    pub start_address: u32,
}

impl EncodeOptions {
    pub fn new(chunk_size: usize, family_id: Option<u32>, start_address: u32) -> Self {
        Self {
            chunk_size,
            family_id,
            start_address,
        }
    }

    pub fn for_board(board: &dyn BoardInfo) -> Self {
        Self::new(
            board.chunk_size(),
            Some(board.family_id()),
            board.start_address(),
        )
    }

    /// Checks the options against an image of `image_len` bytes and returns the block count.
    pub fn num_blocks(&self, image_len: usize) -> Result<u32, Bin2Uf2Error> {
        if self.chunk_size == 0 || self.chunk_size > UF2_PAYLOAD_CAPACITY {
            return Err(Bin2Uf2Error::InvalidArgument(format!(
                "chunk size must be between 1 and {} bytes, got {}",
                UF2_PAYLOAD_CAPACITY, self.chunk_size
            )));
        }

        let num_blocks = u32::try_from(image_len.div_ceil(self.chunk_size)).map_err(|_| {
            Bin2Uf2Error::InvalidArgument(format!("image of {} bytes is too large", image_len))
        })?;

        if image_len > 0 {
            let last_addr = u64::from(self.start_address) + image_len as u64 - 1;
            if last_addr > u64::from(u32::MAX) {
                return Err(Bin2Uf2Error::InvalidArgument(format!(
                    "image of {} bytes at {:#010x} runs past the end of the 32 bit address space",
                    image_len, self.start_address
                )));
            }
        }

        Ok(num_blocks)
    }
}

#[derive(Error, Debug)]
pub enum Bin2Uf2Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Malformed UF2 block {index}: {reason}")]
    MalformedBlock { index: usize, reason: BlockDefect },
    #[error("Inconsistent UF2 block set: {0}")]
    InconsistentBlockSet(String),
    #[error("Failed to write to output")]
    FailedToWrite(std::io::Error),
}

/// Streams the UF2 encoding of `image` into `output`, one block at a time.
pub fn write_uf2(
    image: &[u8],
    options: &EncodeOptions,
    mut output: impl Write,
) -> Result<(), Bin2Uf2Error> {
    let num_blocks = options.num_blocks(image.len())?;

    let (flags, file_size) = match options.family_id {
        Some(family_id) => (UF2_FLAG_FAMILY_ID_PRESENT, family_id),
        None => (0, 0),
    };

    let mut block_header = Uf2BlockHeader {
        magic_start0: U32::new(UF2_MAGIC_START0),
        magic_start1: U32::new(UF2_MAGIC_START1),
        flags: U32::new(flags),
        target_addr: U32::new(0),
        payload_size: U32::new(0),
        block_no: U32::new(0),
        num_blocks: U32::new(num_blocks),
        file_size: U32::new(file_size),
    };

    let mut block_data: Uf2BlockData = [0; UF2_PAYLOAD_CAPACITY];

    let block_footer = Uf2BlockFooter {
        magic_end: U32::new(UF2_MAGIC_END),
    };

    for (block_no, chunk) in image.chunks(options.chunk_size).enumerate() {
        // Both fit: num_blocks checked the block count and the address range.
        let offset: u32 = (block_no * options.chunk_size).assert_into();
        block_header.target_addr = U32::new(options.start_address + offset);
        block_header.payload_size = U32::new(chunk.len().assert_into());
        block_header.block_no = U32::new(block_no.assert_into());

        debug!(
            "Block {} / {} {:#010x} ({} bytes)",
            block_no,
            num_blocks,
            block_header.target_addr.get(),
            chunk.len()
        );

        block_data[..chunk.len()].copy_from_slice(chunk);
        block_data[chunk.len()..].iter_mut().for_each(|v| *v = 0);

        output
            .write_all(block_header.as_bytes())
            .map_err(Bin2Uf2Error::FailedToWrite)?;
        output
            .write_all(block_data.as_bytes())
            .map_err(Bin2Uf2Error::FailedToWrite)?;
        output
            .write_all(block_footer.as_bytes())
            .map_err(Bin2Uf2Error::FailedToWrite)?;
    }

    Ok(())
}

/// Converts a firmware image into a UF2 file.
///
/// An empty image yields an empty file. The output is always `512 * ceil(len / chunk_size)`
/// bytes long.
pub fn encode(
    image: &[u8],
    chunk_size: usize,
    family_id: Option<u32>,
    start_address: u32,
) -> Result<Vec<u8>, Bin2Uf2Error> {
    let options = EncodeOptions::new(chunk_size, family_id, start_address);
    let num_blocks = options.num_blocks(image.len())?;

    let mut output = Vec::with_capacity(num_blocks as usize * UF2_BLOCK_SIZE);
    write_uf2(image, &options, &mut output)?;

    Ok(output)
}

/// Reassembles the firmware image from a UF2 file.
///
/// Blocks may be stored in any order, but their numbers must form exactly `0..num_blocks`.
pub fn decode(data: &[u8]) -> Result<Vec<u8>, Bin2Uf2Error> {
    let parsed = blocks(data).collect::<Result<Vec<_>, _>>()?;

    let Some(first) = parsed.first() else {
        return Ok(Vec::new());
    };
    let num_blocks = first.num_blocks;

    if let Some((index, block)) = parsed
        .iter()
        .enumerate()
        .find(|(_, block)| block.num_blocks != num_blocks)
    {
        return Err(Bin2Uf2Error::InconsistentBlockSet(format!(
            "block {} declares {} total blocks, block 0 declares {}",
            index, block.num_blocks, num_blocks
        )));
    }
    if num_blocks as usize != parsed.len() {
        return Err(Bin2Uf2Error::InconsistentBlockSet(format!(
            "blocks declare {} total blocks but {} are present",
            num_blocks,
            parsed.len()
        )));
    }

    let mut ordered: Vec<Option<Uf2Block<'_>>> = vec![None; parsed.len()];

    for (index, block) in parsed.iter().enumerate() {
        let slot = ordered.get_mut(block.block_no as usize).ok_or_else(|| {
            Bin2Uf2Error::InconsistentBlockSet(format!(
                "block {} has number {}, outside 0..{}",
                index, block.block_no, num_blocks
            ))
        })?;
        if slot.is_some() {
            return Err(Bin2Uf2Error::InconsistentBlockSet(format!(
                "block number {} appears more than once",
                block.block_no
            )));
        }
        *slot = Some(*block);
    }

    // No duplicates and no out of range numbers, so every slot is filled.
    let image = ordered
        .into_iter()
        .flatten()
        .flat_map(|block| block.payload().iter().copied())
        .collect();

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
    }

    fn block_numbers(data: &[u8]) -> Vec<u32> {
        blocks(data).map(|block| block.unwrap().block_no).collect()
    }

    #[test]
    fn empty_image_has_no_blocks() {
        assert_eq!(encode(&[], 256, None, 0).unwrap(), Vec::<u8>::new());
        assert_eq!(encode(&[], 256, Some(0x68ed2b88), 0x2000).unwrap(), Vec::<u8>::new());
        assert_eq!(decode(&[]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn round_trip() {
        for len in [1, 255, 256, 257, 476, 1000, 4096, 10_000] {
            for chunk_size in [1, 100, 256, 476] {
                let image = pattern(len);
                let encoded = encode(&image, chunk_size, Some(0xe48bff56), 0x1000_0000).unwrap();
                assert_eq!(decode(&encoded).unwrap(), image, "len {len} chunk {chunk_size}");
            }
        }
    }

    #[test]
    fn size_law() {
        for (len, chunk_size, expected_blocks) in
            [(1, 256, 1), (256, 256, 1), (257, 256, 2), (1000, 476, 3), (10, 1, 10)]
        {
            let encoded = encode(&pattern(len), chunk_size, None, 0).unwrap();
            assert_eq!(encoded.len(), expected_blocks * UF2_BLOCK_SIZE);
        }
    }

    #[test]
    fn block_numbers_are_sequential() {
        let encoded = encode(&pattern(3000), 256, None, 0).unwrap();
        assert_eq!(block_numbers(&encoded), (0..12).collect::<Vec<_>>());
        assert!(blocks(&encoded).all(|block| block.unwrap().num_blocks == 12));
    }

    #[test]
    fn padding_is_zero() {
        let image = vec![0xff; 1000];
        let encoded = encode(&image, 300, None, 0).unwrap();
        for block in blocks(&encoded) {
            let block = block.unwrap();
            assert!(block.payload().iter().all(|&b| b == 0xff));
            assert!(block.padding().iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn two_block_scenario() {
        let mut image: Vec<u8> = (0..=255).collect();
        image.extend_from_slice(&[0; 10]);

        let encoded = encode(&image, 256, None, 0x2000).unwrap();
        let parsed: Vec<_> = blocks(&encoded).map(Result::unwrap).collect();
        assert_eq!(parsed.len(), 2);

        assert_eq!(parsed[0].payload_size, 256);
        assert_eq!(parsed[0].target_addr, 0x2000);
        assert_eq!(parsed[0].payload(), &image[..256]);

        assert_eq!(parsed[1].payload_size, 10);
        assert_eq!(parsed[1].target_addr, 0x2000 + 256);
        assert!(parsed[1].data.iter().all(|&b| b == 0));
    }

    #[test]
    fn family_id_sets_flag() {
        let with = encode(&[1, 2, 3], 256, Some(Family::SAMD21.id()), 0).unwrap();
        let block = Uf2Block::parse(&with, 0).unwrap();
        assert_eq!(block.flags, UF2_FLAG_FAMILY_ID_PRESENT);
        assert_eq!(block.family_id(), Some(0x68ed2b88));

        let without = encode(&[1, 2, 3], 256, None, 0).unwrap();
        let block = Uf2Block::parse(&without, 0).unwrap();
        assert_eq!(block.flags, 0);
        assert_eq!(block.file_size, 0);
        assert_eq!(block.family_id(), None);
    }

    #[test]
    fn invalid_chunk_size() {
        for chunk_size in [0, UF2_PAYLOAD_CAPACITY + 1] {
            assert!(matches!(
                encode(&[1], chunk_size, None, 0),
                Err(Bin2Uf2Error::InvalidArgument(_))
            ));
        }
        // Checked even when there is nothing to encode
        assert!(matches!(
            encode(&[], 0, None, 0),
            Err(Bin2Uf2Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn address_overflow() {
        assert!(encode(&[0; 16], 256, None, u32::MAX - 15).is_ok());
        assert!(matches!(
            encode(&[0; 17], 256, None, u32::MAX - 15),
            Err(Bin2Uf2Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn short_input_is_malformed() {
        assert!(matches!(
            decode(&[0; 511]),
            Err(Bin2Uf2Error::MalformedBlock { index: 0, .. })
        ));
    }

    #[test]
    fn bad_magic_names_block() {
        let mut encoded = encode(&pattern(1000), 256, None, 0).unwrap();
        encoded[2 * UF2_BLOCK_SIZE] = 0;
        assert!(matches!(
            decode(&encoded),
            Err(Bin2Uf2Error::MalformedBlock {
                index: 2,
                reason: BlockDefect::BadMagicStart0(_)
            })
        ));
    }

    #[test]
    fn decode_tolerates_shuffled_blocks() {
        let image = pattern(1200);
        let encoded = encode(&image, 256, None, 0).unwrap();

        let mut shuffled = Vec::new();
        for index in [3, 0, 4, 2, 1] {
            shuffled.extend_from_slice(
                &encoded[index * UF2_BLOCK_SIZE..(index + 1) * UF2_BLOCK_SIZE],
            );
        }

        assert_eq!(decode(&shuffled).unwrap(), image);
    }

    #[test]
    fn decode_rejects_duplicate_blocks() {
        let encoded = encode(&pattern(600), 256, None, 0).unwrap();
        let mut duplicated = encoded[..UF2_BLOCK_SIZE].to_vec();
        duplicated.extend_from_slice(&encoded[..UF2_BLOCK_SIZE * 2]);

        // Three blocks claiming a total of three, but block 0 twice and block 2 missing.
        assert!(matches!(
            decode(&duplicated),
            Err(Bin2Uf2Error::InconsistentBlockSet(_))
        ));
    }

    #[test]
    fn decode_rejects_missing_blocks() {
        let encoded = encode(&pattern(1000), 256, None, 0).unwrap();
        let truncated = &encoded[..UF2_BLOCK_SIZE * 3];
        assert!(matches!(
            decode(truncated),
            Err(Bin2Uf2Error::InconsistentBlockSet(_))
        ));
    }

    #[test]
    fn decode_rejects_disagreeing_totals() {
        let mut encoded = encode(&pattern(600), 256, None, 0).unwrap();
        // num_blocks of block 1
        encoded[UF2_BLOCK_SIZE + 24..UF2_BLOCK_SIZE + 28].copy_from_slice(&4u32.to_le_bytes());
        assert!(matches!(
            decode(&encoded),
            Err(Bin2Uf2Error::InconsistentBlockSet(_))
        ));
    }

    #[test]
    fn family_lookup() {
        assert_eq!(Family::from_id(0x55114460), Some(Family::SAMD51));
        assert_eq!(Family::from_id(0), None);
    }
}
