use crate::{Family, boards::BoardInfo};

#[derive(Debug, Default, Clone)]
pub struct SAMD51;

impl BoardInfo for SAMD51 {
    fn family_id(&self) -> u32 {
        Family::SAMD51.id()
    }

    fn start_address(&self) -> u32 {
        APP_START_SAMD51
    }

    fn board_name(&self) -> String {
        "samd51".to_string()
    }
}

/// The bootloader occupies the first 16 KiB of flash
pub const APP_START_SAMD51: u32 = 0x00004000;
