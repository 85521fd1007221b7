//! Naming and persisting of build outputs.
//!
//! Nothing here looks at the environment: the project directory and the uniqueness token are
//! always handed in by the caller.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use log::debug;

/// Directory below the project root that receives the UF2 files.
pub const OUTPUT_DIR: &str = "build";

/// `<project_dir>/build/<token>.uf2`
pub fn output_path(project_dir: impl AsRef<Path>, token: &str) -> PathBuf {
    project_dir
        .as_ref()
        .join(OUTPUT_DIR)
        .join(format!("{}.uf2", token))
}

/// Seconds since the unix epoch, clamped to zero for clocks set before 1970.
pub fn unix_time_token(now: SystemTime) -> String {
    now.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
        .to_string()
}

/// Creates the output directory if needed and returns the path the UF2 file should go to.
pub fn prepare_output(project_dir: impl AsRef<Path>, token: &str) -> io::Result<PathBuf> {
    let path = output_path(project_dir, token);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    debug!("Output path {}", path.display());
    Ok(path)
}

/// Writes `uf2` to `<project_dir>/build/<token>.uf2`, replacing any existing file.
pub fn write_output_file(
    project_dir: impl AsRef<Path>,
    token: &str,
    uf2: &[u8],
) -> io::Result<PathBuf> {
    let path = prepare_output(project_dir, token)?;
    fs::write(&path, uf2)?;
    Ok(path)
}
