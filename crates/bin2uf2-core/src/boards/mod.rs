pub use rp2040::RP2040;
pub use rp2350::RP2350;
pub use samd21::SAMD21;
pub use samd51::SAMD51;

use crate::DEFAULT_CHUNK_SIZE;

pub mod rp2040;
pub mod rp2350;
pub mod samd21;
pub mod samd51;

/// This is a helper struct, which allows you to iterate over every board defined
pub struct BoardIter {
    inner: std::vec::IntoIter<Box<dyn BoardInfo>>,
}

impl BoardIter {
    /// Creates a new BoardIter
    pub fn new() -> Self {
        Self {
            inner: vec![
                Box::new(SAMD21::default()) as Box<dyn BoardInfo>,
                Box::new(SAMD51::default()),
                Box::new(RP2040::default()),
                Box::new(RP2350::default()),
            ]
            .into_iter(),
        }
    }

    pub fn find_by_name(name: &str) -> Option<Box<dyn BoardInfo>> {
        Self::new().find(|board| board.board_name().eq_ignore_ascii_case(name))
    }
}

impl Default for BoardIter {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for BoardIter {
    type Item = Box<dyn BoardInfo>;
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// A named set of encoding parameters for a family of boards.
pub trait BoardInfo {
    /// Returns the proper family id to use for the uf2 file
    fn family_id(&self) -> u32;

    /// Flash address the application is linked at, usually just past the bootloader
    fn start_address(&self) -> u32;

    /// Optional, defaults to 256 payload bytes per block. Anything up to 476 is valid UF2, but
    /// bootloaders vary in what they accept
    fn chunk_size(&self) -> usize {
        DEFAULT_CHUNK_SIZE
    }

    /// Get the board's name
    fn board_name(&self) -> String;
}
