use std::process::Command;
use tempfile::tempdir;

// Writes a ZIP with the library, then calls the system `unzip -t` to verify
// the on-disk bytes are a spec-conformant archive a third-party reader
// accepts. Skips if `unzip` isn't present.

use zipkit::{Archive, ArchiveConfig, BufferSource};

#[test]
fn unzip_compatibility() {
    let check = Command::new("unzip").arg("-v").output();
    if check.is_err() {
        eprintln!("skipping test: `unzip` not found");
        return;
    }

    let dir = tempdir().unwrap();
    let zip_path = dir.path().join("compat.zip");

    {
        let mut archive = Archive::open_write_new(&zip_path, ArchiveConfig::default()).unwrap();
        archive
            .add(b"hello.txt", BufferSource::borrowed(b"hello from test"), Some(8))
            .unwrap();
        let big = vec![0u8; 1024 * 1024];
        archive
            .add(b"big.bin", BufferSource::borrowed(&big), Some(8))
            .unwrap();
        archive.close().unwrap();
    }

    let output = Command::new("unzip")
        .arg("-t")
        .arg(&zip_path)
        .output()
        .expect("failed to run unzip");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(
        output.status.success(),
        "unzip reported failure: {} {}",
        stdout,
        stderr
    );
}
