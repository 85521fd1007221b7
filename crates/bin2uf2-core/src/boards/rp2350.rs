use crate::{Family, boards::BoardInfo};

#[derive(Debug, Default, Clone)]
pub struct RP2350;

impl BoardInfo for RP2350 {
    fn family_id(&self) -> u32 {
        // This is the rp2350 arm secure family id, should technically always be true if you held the bootsel button down and cycled power.
        Family::RP2350_ARM_S.id()
    }

    fn start_address(&self) -> u32 {
        FLASH_START_RP2350
    }

    fn board_name(&self) -> String {
        "rp2350".to_string()
    }
}

pub const FLASH_START_RP2350: u32 = 0x10000000;
