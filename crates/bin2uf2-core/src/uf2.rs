use std::{collections::BTreeSet, mem};

use static_assertions::const_assert;
use thiserror::Error;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, byteorder::little_endian::U32};

use crate::Bin2Uf2Error;

pub const UF2_MAGIC_START0: u32 = 0x0A324655;
pub const UF2_MAGIC_START1: u32 = 0x9E5D5157;
pub const UF2_MAGIC_END: u32 = 0x0AB16F30;

pub const UF2_FLAG_NOT_MAIN_FLASH: u32 = 0x00000001;
pub const UF2_FLAG_FILE_CONTAINER: u32 = 0x00001000;
pub const UF2_FLAG_FAMILY_ID_PRESENT: u32 = 0x00002000;
pub const UF2_FLAG_MD5_PRESENT: u32 = 0x00004000;

pub const UF2_BLOCK_SIZE: usize = 512;
pub const UF2_PAYLOAD_CAPACITY: usize = 476;

pub type Uf2BlockData = [u8; UF2_PAYLOAD_CAPACITY];

#[repr(C)]
#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable)]
pub struct Uf2BlockHeader {
    pub magic_start0: U32,
    pub magic_start1: U32,
    pub flags: U32,
    pub target_addr: U32,
    pub payload_size: U32,
    pub block_no: U32,
    pub num_blocks: U32,
    pub file_size: U32, // or familyID
}

#[repr(C)]
#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable)]
pub struct Uf2BlockFooter {
    pub magic_end: U32,
}

#[repr(C)]
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable)]
struct RawUf2Block {
    header: Uf2BlockHeader,
    data: Uf2BlockData,
    footer: Uf2BlockFooter,
}

const_assert!(mem::size_of::<Uf2BlockHeader>() == 32);
const_assert!(mem::size_of::<Uf2BlockFooter>() == 4);
const_assert!(mem::size_of::<RawUf2Block>() == UF2_BLOCK_SIZE);

/// What is wrong with a block that failed structural validation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDefect {
    #[error("block is {0} bytes long, expected 512")]
    WrongLength(usize),
    #[error("bad first start magic {0:#010x}")]
    BadMagicStart0(u32),
    #[error("bad second start magic {0:#010x}")]
    BadMagicStart1(u32),
    #[error("bad end magic {0:#010x}")]
    BadMagicEnd(u32),
    #[error("payload size {0} exceeds the 476 byte capacity")]
    PayloadTooLarge(u32),
}

/// A validated view of a single block inside a UF2 byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uf2Block<'a> {
    pub flags: u32,
    pub target_addr: u32,
    pub payload_size: u32,
    pub block_no: u32,
    pub num_blocks: u32,
    pub file_size: u32,
    pub data: &'a Uf2BlockData,
}

impl<'a> Uf2Block<'a> {
    /// Parses the block at position `index` of a stream. `bytes` must be exactly one block.
    pub fn parse(bytes: &'a [u8], index: usize) -> Result<Self, Bin2Uf2Error> {
        let malformed = |reason| Bin2Uf2Error::MalformedBlock { index, reason };

        let raw = RawUf2Block::ref_from_bytes(bytes)
            .map_err(|_| malformed(BlockDefect::WrongLength(bytes.len())))?;

        let header = &raw.header;
        if header.magic_start0.get() != UF2_MAGIC_START0 {
            return Err(malformed(BlockDefect::BadMagicStart0(
                header.magic_start0.get(),
            )));
        }
        if header.magic_start1.get() != UF2_MAGIC_START1 {
            return Err(malformed(BlockDefect::BadMagicStart1(
                header.magic_start1.get(),
            )));
        }
        if raw.footer.magic_end.get() != UF2_MAGIC_END {
            return Err(malformed(BlockDefect::BadMagicEnd(raw.footer.magic_end.get())));
        }
        let payload_size = header.payload_size.get();
        if payload_size as usize > UF2_PAYLOAD_CAPACITY {
            return Err(malformed(BlockDefect::PayloadTooLarge(payload_size)));
        }

        Ok(Self {
            flags: header.flags.get(),
            target_addr: header.target_addr.get(),
            payload_size,
            block_no: header.block_no.get(),
            num_blocks: header.num_blocks.get(),
            file_size: header.file_size.get(),
            data: &raw.data,
        })
    }

    /// The declared payload, without padding.
    pub fn payload(&self) -> &'a [u8] {
        &self.data[..self.payload_size as usize]
    }

    /// The zero padding that follows the payload in the data area.
    pub fn padding(&self) -> &'a [u8] {
        &self.data[self.payload_size as usize..]
    }

    pub fn family_id(&self) -> Option<u32> {
        if self.flags & UF2_FLAG_FAMILY_ID_PRESENT != 0 {
            Some(self.file_size)
        } else {
            None
        }
    }

    pub fn is_main_flash(&self) -> bool {
        self.flags & UF2_FLAG_NOT_MAIN_FLASH == 0
    }
}

/// Iterates over the blocks of a UF2 stream in the order they are stored.
///
/// A trailing partial block is reported as [`BlockDefect::WrongLength`].
pub fn blocks(data: &[u8]) -> impl Iterator<Item = Result<Uf2Block<'_>, Bin2Uf2Error>> {
    data.chunks(UF2_BLOCK_SIZE)
        .enumerate()
        .map(|(index, bytes)| Uf2Block::parse(bytes, index))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Uf2Summary {
    pub num_blocks: usize,
    pub payload_bytes: u64,
    pub not_main_flash_blocks: usize,
    /// Lowest target address and highest end address (exclusive) of main flash blocks
    pub address_range: Option<(u32, u64)>,
    pub family_ids: BTreeSet<u32>,
}

/// Collects statistics over every block of a UF2 stream without reassembling it.
pub fn summarize(data: &[u8]) -> Result<Uf2Summary, Bin2Uf2Error> {
    let mut summary = Uf2Summary::default();

    for block in blocks(data) {
        let block = block?;

        summary.num_blocks += 1;
        summary.payload_bytes += u64::from(block.payload_size);

        if let Some(family_id) = block.family_id() {
            summary.family_ids.insert(family_id);
        }

        if !block.is_main_flash() {
            summary.not_main_flash_blocks += 1;
            continue;
        }

        let start = block.target_addr;
        let end = u64::from(block.target_addr) + u64::from(block.payload_size);
        summary.address_range = Some(match summary.address_range {
            Some((low, high)) => (low.min(start), high.max(end)),
            None => (start, end),
        });
    }

    Ok(summary)
}
