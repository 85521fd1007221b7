use std::io::{self, Stdout, Write};

use bin2uf2_core::uf2::UF2_BLOCK_SIZE;
use pbr::ProgressBar;

/// Counts the UF2 blocks that pass through to `inner` on a progress bar.
pub struct ProgressBarReporter<T> {
    pb: ProgressBar<Stdout>,
    inner: T,
    partial_block: usize,
}

impl<T> ProgressBarReporter<T>
where
    T: Write,
{
    pub fn new(num_blocks: u64, inner: T) -> Self {
        let mut pb = ProgressBar::new(num_blocks);
        pb.message("Blocks ");

        Self {
            pb,
            inner,
            partial_block: 0,
        }
    }

    pub fn finish(&mut self) {
        self.pb.finish();
    }
}

impl<T> Write for ProgressBarReporter<T>
where
    T: Write,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;

        self.partial_block += written;
        let completed = self.partial_block / UF2_BLOCK_SIZE;
        if completed > 0 {
            self.pb.add(completed as u64);
            self.partial_block %= UF2_BLOCK_SIZE;
        }

        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
