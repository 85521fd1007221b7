use crate::{Family, boards::BoardInfo};

#[derive(Debug, Default, Clone)]
pub struct RP2040;

impl BoardInfo for RP2040 {
    fn family_id(&self) -> u32 {
        Family::RP2040.id()
    }

    fn start_address(&self) -> u32 {
        FLASH_START_RP2040
    }

    fn board_name(&self) -> String {
        "rp2040".to_string()
    }
}

pub const FLASH_START_RP2040: u32 = 0x10000000;
