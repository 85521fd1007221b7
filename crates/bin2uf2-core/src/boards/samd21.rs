use crate::{Family, boards::BoardInfo};

/// SAMD21 boards running the Adafruit/Microsoft UF2 bootloader (ItsyBitsy M0, Feather M0, ...)
#[derive(Debug, Default, Clone)]
pub struct SAMD21;

impl BoardInfo for SAMD21 {
    fn family_id(&self) -> u32 {
        Family::SAMD21.id()
    }

    fn start_address(&self) -> u32 {
        APP_START_SAMD21
    }

    fn board_name(&self) -> String {
        "samd21".to_string()
    }
}

/// The bootloader occupies the first 8 KiB of flash
pub const APP_START_SAMD21: u32 = 0x00002000;
