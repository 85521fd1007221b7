use std::fs;

use bin2uf2_core::{EncodeOptions, boards::SAMD21, decode, encode, output::write_output_file};
use tempfile::tempdir;

#[test]
fn writes_timestamped_file_into_new_build_dir() {
    let project = tempdir().unwrap();
    assert!(!project.path().join("build").exists());

    let image: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
    let options = EncodeOptions::for_board(&SAMD21);
    let uf2 = encode(
        &image,
        options.chunk_size,
        options.family_id,
        options.start_address,
    )
    .unwrap();

    let path = write_output_file(project.path(), "1700000000", &uf2).unwrap();

    assert_eq!(path, project.path().join("build").join("1700000000.uf2"));
    let written = fs::read(&path).unwrap();
    assert_eq!(written, uf2);
    assert_eq!(decode(&written).unwrap(), image);
}

#[test]
fn existing_build_dir_and_file_are_reused() {
    let project = tempdir().unwrap();
    fs::create_dir_all(project.path().join("build")).unwrap();
    fs::write(project.path().join("build").join("42.uf2"), b"stale").unwrap();

    let uf2 = encode(&[1, 2, 3], 256, None, 0).unwrap();
    let path = write_output_file(project.path(), "42", &uf2).unwrap();

    assert_eq!(fs::read(path).unwrap(), uf2);
}
