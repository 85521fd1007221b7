use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
    time::SystemTime,
};

use bin2uf2_core::{
    Bin2Uf2Error, EncodeOptions, Family,
    output::{prepare_output, unix_time_token},
    write_uf2,
};
use log::{LevelFilter, info, warn};

use crate::reporter::ProgressBarReporter;

pub fn convert<P1: AsRef<Path>, P2: AsRef<Path>>(
    input_path: &P1,
    output_path: &P2,
    options: &EncodeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let output_path = output_path.as_ref().with_extension("uf2");
    write_file(input_path.as_ref(), &output_path, options)
}

/// The build hook: `<project_dir>/build/<token>.uf2`, with the unix time as default token.
pub fn post_build<P1: AsRef<Path>, P2: AsRef<Path>>(
    input_path: &P1,
    project_dir: &P2,
    token: Option<String>,
    options: &EncodeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let token = token.unwrap_or_else(|| unix_time_token(SystemTime::now()));
    let output_path = prepare_output(project_dir, &token)?;

    info!("{}", input_path.as_ref().display());
    write_file(input_path.as_ref(), &output_path, options)?;
    info!("Wrote {}", output_path.display());

    Ok(())
}

fn write_file(
    input_path: &Path,
    output_path: &Path,
    options: &EncodeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = fs::read(input_path)?;
    let num_blocks = options.num_blocks(image.len())?;

    match options.family_id {
        Some(id) => match Family::from_id(id) {
            Some(family) => info!("Using UF2 Family {:?} ({:#010x})", family, id),
            None => info!("Using UF2 Family {:#010x}", id),
        },
        None => info!("No UF2 Family"),
    }
    info!(
        "{} bytes at {:#010x} in {} blocks",
        image.len(),
        options.start_address,
        num_blocks
    );

    let output = BufWriter::new(File::create(output_path)?);
    stream_or_remove(&image, options, output, output_path)
}

/// Streams the UF2 into `output` and deletes `output_path` if that fails part way.
fn stream_or_remove(
    image: &[u8],
    options: &EncodeOptions,
    mut output: impl Write,
    output_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let should_print_progress = log::max_level() >= LevelFilter::Info;

    let result = if should_print_progress {
        info!("Writing UF2 to disk");
        let num_blocks = options.num_blocks(image.len())?;
        let mut reporter = ProgressBarReporter::new(u64::from(num_blocks), output);
        let result = write_uf2(image, options, &mut reporter)
            .and_then(|()| reporter.flush().map_err(Bin2Uf2Error::FailedToWrite));
        reporter.finish();
        println!();
        result
    } else {
        write_uf2(image, options, &mut output)
            .and_then(|()| output.flush().map_err(Bin2Uf2Error::FailedToWrite))
    };

    if let Err(err) = result {
        if let Err(remove_err) = fs::remove_file(output_path) {
            warn!(
                "Failed to remove partial output {}: {}",
                output_path.display(),
                remove_err
            );
        }
        return Err(Box::new(err));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bin2uf2_core::{boards::SAMD21, decode};
    use std::io;
    use tempfile::tempdir;

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn firmware() -> Vec<u8> {
        (0..700u32).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn post_build_writes_named_file() {
        let project = tempdir().unwrap();
        let input = project.path().join("firmware.bin");
        fs::write(&input, firmware()).unwrap();

        let options = EncodeOptions::for_board(&SAMD21);
        post_build(&input, &project.path(), Some("42".to_string()), &options).unwrap();

        let written = fs::read(project.path().join("build").join("42.uf2")).unwrap();
        assert_eq!(written.len(), 3 * 512);
        assert_eq!(decode(&written).unwrap(), firmware());
    }

    #[test]
    fn post_build_defaults_to_unix_time_token() {
        let project = tempdir().unwrap();
        let input = project.path().join("firmware.bin");
        fs::write(&input, firmware()).unwrap();

        let before = unix_time_token(SystemTime::now()).parse::<u64>().unwrap();
        let options = EncodeOptions::for_board(&SAMD21);
        post_build(&input, &project.path(), None, &options).unwrap();
        let after = unix_time_token(SystemTime::now()).parse::<u64>().unwrap();

        let names: Vec<String> = fs::read_dir(project.path().join("build"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);

        let token: u64 = names[0].strip_suffix(".uf2").unwrap().parse().unwrap();
        assert!(before <= token && token <= after);
    }

    #[test]
    fn failed_write_removes_partial_file() {
        let project = tempdir().unwrap();
        let output_path = project.path().join("partial.uf2");
        fs::write(&output_path, b"half a block").unwrap();

        let options = EncodeOptions::new(256, None, 0);
        let err =
            stream_or_remove(&firmware(), &options, FailingWriter, &output_path).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Bin2Uf2Error>(),
            Some(Bin2Uf2Error::FailedToWrite(_))
        ));
        assert!(!output_path.exists());
    }

    #[test]
    fn failed_cleanup_keeps_write_error() {
        let project = tempdir().unwrap();
        let output_path = project.path().join("never-created.uf2");

        let options = EncodeOptions::new(256, None, 0);
        let err =
            stream_or_remove(&firmware(), &options, FailingWriter, &output_path).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Bin2Uf2Error>(),
            Some(Bin2Uf2Error::FailedToWrite(_))
        ));
    }
}
