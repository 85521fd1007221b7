use std::{fs, path::Path};

use bin2uf2_core::{Family, decode, uf2::summarize};
use log::info;

pub fn info<P: AsRef<Path>>(input_path: &P) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input_path)?;

    let summary = summarize(&data)?;
    // Surfaces numbering and block count problems that a per-block scan can't see
    let image = decode(&data)?;

    info!("{} blocks, {} payload bytes", summary.num_blocks, image.len());

    if let Some((start, end)) = summary.address_range {
        info!("Flash range {:#010x}..{:#010x}", start, end);
    }
    if summary.not_main_flash_blocks > 0 {
        info!("{} blocks not for main flash", summary.not_main_flash_blocks);
    }

    for id in &summary.family_ids {
        match Family::from_id(*id) {
            Some(family) => info!("Family {:?} ({:#010x})", family, id),
            None => info!("Family {:#010x}", id),
        }
    }
    if summary.family_ids.is_empty() {
        info!("No family id");
    }

    Ok(())
}
