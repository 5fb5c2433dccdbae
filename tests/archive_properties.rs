//! End-to-end scenarios against the public `Archive` API.

use tempfile::tempdir;
use zipkit::zip::records::{CentralDirectoryHeader, EndOfCentralDirectory, LocalFileHeader};
use zipkit::{Archive, ArchiveConfig, BufferSource, ZipKitError};

fn temp_zip_path(name: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join(name);
    (dir, path)
}

#[test]
fn s1_round_trip_store() {
    let (_dir, path) = temp_zip_path("s1.zip");
    {
        let mut archive = Archive::open_write_new(&path, ArchiveConfig::default()).unwrap();
        archive
            .add(b"hello.txt", BufferSource::borrowed(b"hello\n"), Some(0))
            .unwrap();
        archive.close().unwrap();
    }

    let mut archive = Archive::open_read(&path, ArchiveConfig::default()).unwrap();
    assert_eq!(archive.num_entries(), 1);
    let stat = archive.stat(0).unwrap();
    assert_eq!(stat.uncompressed_size, 6);
    assert_eq!(stat.compressed_size, 6);
    assert_eq!(stat.crc32, 0x363A_3020);
    assert_eq!(stat.method, 0);
    let opened = archive.open_index(0).unwrap();
    assert_eq!(opened.bytes(), b"hello\n");
}

#[test]
fn s2_round_trip_deflate() {
    let (_dir, path) = temp_zip_path("s2.zip");
    {
        let mut archive = Archive::open_write_new(&path, ArchiveConfig::default()).unwrap();
        archive
            .add(b"hello.txt", BufferSource::borrowed(b"hello\n"), Some(8))
            .unwrap();
        archive.close().unwrap();
    }

    let mut archive = Archive::open_read(&path, ArchiveConfig::default()).unwrap();
    let stat = archive.stat(0).unwrap();
    assert_eq!(stat.uncompressed_size, 6);
    assert_eq!(stat.crc32, 0x363A_3020);
    assert_eq!(stat.method, 8);
    assert!(stat.compressed_size <= 6 + 11 + 64);
    let opened = archive.open_index(0).unwrap();
    assert_eq!(opened.bytes(), b"hello\n");
}

#[test]
fn s3_fallback_to_store_on_incompressible_input() {
    let (_dir, path) = temp_zip_path("s3.zip");
    let data: Vec<u8> = (0..16u8).collect();
    {
        let mut archive = Archive::open_write_new(&path, ArchiveConfig::default()).unwrap();
        archive
            .add(b"noise.bin", BufferSource::borrowed(&data), Some(8))
            .unwrap();
        archive.close().unwrap();
    }

    let mut archive = Archive::open_read(&path, ArchiveConfig::default()).unwrap();
    let stat = archive.stat(0).unwrap();
    assert_eq!(stat.method, 0);
    assert_eq!(stat.compressed_size, 16);
}

#[test]
fn s5_malformed_central_directory_is_rejected() {
    // EOCD claims 2 entries, but the bytes at cd_offset are not a CD header.
    let mut file = vec![0xFFu8; 100];
    let eocd = EndOfCentralDirectory {
        entries_on_disk: 2,
        entries_total: 2,
        cd_size: 46,
        cd_offset: 0,
    };
    file.extend_from_slice(&eocd.serialize());
    let file_size = file.len() as u64;

    let result = EndOfCentralDirectory::locate(&file, 0, file_size);
    assert!(result.is_err());
}

#[test]
fn s6_zipbomb_guard_rejects_then_allows_with_override() {
    // Hand-build a one-entry archive whose CD declares a 10 GB uncompressed
    // size backed by a 100-byte stored payload.
    let payload = vec![0u8; 100];
    let crc = zipkit::crc32::checksum(&payload);

    let lfh = LocalFileHeader {
        version_needed: 20,
        flags: 0,
        method: 0,
        dos_time: 0,
        dos_date: 0x21,
        crc32: crc,
        compressed_size: 100,
        uncompressed_size: 100,
        name: b"bomb.bin".to_vec(),
        extra_len: 0,
    };
    let lfh_bytes = lfh.serialize();

    let mut file = Vec::new();
    file.extend_from_slice(&lfh_bytes);
    file.extend_from_slice(&payload);
    let cd_offset = file.len() as u32;

    let cd = CentralDirectoryHeader {
        version_made_by: 0x031E,
        version_needed: 20,
        flags: 0,
        method: 0,
        dos_time: 0,
        dos_date: 0x21,
        crc32: crc,
        compressed_size: 100,
        // Declares far more uncompressed data than the 100-byte payload
        // backs, simulating a zipbomb-style archive (kept within the u32
        // field width, since ZIP64 declared sizes are out of scope here).
        uncompressed_size: 2_000_000,
        external_attrs: 0o100644 << 16,
        lfh_offset: 0,
        name: b"bomb.bin".to_vec(),
    };
    let cd_bytes = cd.serialize();
    file.extend_from_slice(&cd_bytes);

    let eocd = EndOfCentralDirectory {
        entries_on_disk: 1,
        entries_total: 1,
        cd_size: cd_bytes.len() as u32,
        cd_offset,
    };
    file.extend_from_slice(&eocd.serialize());

    let dir = tempdir().unwrap();
    let path = dir.path().join("bomb.zip");
    std::fs::write(&path, &file).unwrap();

    let mut strict = Archive::open_read(&path, ArchiveConfig::default()).unwrap();
    let err = strict.open_index(0).unwrap_err();
    assert!(matches!(err, ZipKitError::ExpansionRefused { .. }));

    let permissive_config = ArchiveConfig {
        ignore_zipbomb: true,
        ..ArchiveConfig::default()
    };
    let mut permissive = Archive::open_read(&path, permissive_config).unwrap();
    // The declared size is nonsense, but with the guard off extraction must
    // not fail with expansion-refused specifically (whatever else happens
    // downstream is a separate concern from the guard itself).
    let result = permissive.open_index(0);
    assert!(!matches!(result, Err(ZipKitError::ExpansionRefused { .. })));
}

#[test]
fn empty_archive_has_zero_cd_size_and_cd_offset_at_eocd() {
    let (_dir, path) = temp_zip_path("empty.zip");
    {
        let archive = Archive::open_write_new(&path, ArchiveConfig::default()).unwrap();
        archive.close().unwrap();
    }

    let bytes = std::fs::read(&path).unwrap();
    let eocd = EndOfCentralDirectory::parse(&bytes).unwrap();
    assert_eq!(eocd.entries_total, 0);
    assert_eq!(eocd.cd_size, 0);
    assert_eq!(eocd.cd_offset, 0);

    let mut archive = Archive::open_read(&path, ArchiveConfig::default()).unwrap();
    assert_eq!(archive.num_entries(), 0);
    assert!(archive.stat(0).is_err());
}

#[test]
fn one_byte_entry_round_trips() {
    let (_dir, path) = temp_zip_path("one_byte.zip");
    {
        let mut archive = Archive::open_write_new(&path, ArchiveConfig::default()).unwrap();
        archive
            .add(b"x", BufferSource::borrowed(b"Q"), Some(8))
            .unwrap();
        archive.close().unwrap();
    }

    let mut archive = Archive::open_read(&path, ArchiveConfig::default()).unwrap();
    let opened = archive.open_index(0).unwrap();
    assert_eq!(opened.bytes(), b"Q");
}

#[test]
fn locate_returns_the_index_it_was_added_at() {
    let (_dir, path) = temp_zip_path("locate.zip");
    {
        let mut archive = Archive::open_write_new(&path, ArchiveConfig::default()).unwrap();
        archive
            .add(b"a.txt", BufferSource::borrowed(b"a"), Some(0))
            .unwrap();
        archive
            .add(b"b.txt", BufferSource::borrowed(b"b"), Some(0))
            .unwrap();
        archive.close().unwrap();
    }

    let archive = Archive::open_read(&path, ArchiveConfig::default()).unwrap();
    assert_eq!(archive.locate(b"a.txt"), Some(0));
    assert_eq!(archive.locate(b"b.txt"), Some(1));
    assert_eq!(archive.locate(b"missing.txt"), None);
}

#[test]
fn append_preserves_existing_entries_and_positions_new_ones_after() {
    let (_dir, path) = temp_zip_path("append.zip");
    {
        let mut archive = Archive::open_write_new(&path, ArchiveConfig::default()).unwrap();
        archive
            .add(b"first.txt", BufferSource::borrowed(b"one"), Some(0))
            .unwrap();
        archive.close().unwrap();
    }
    {
        let mut archive = Archive::open_append(&path, ArchiveConfig::default()).unwrap();
        archive
            .add(b"second.txt", BufferSource::borrowed(b"two"), Some(0))
            .unwrap();
        archive.close().unwrap();
    }

    let mut archive = Archive::open_read(&path, ArchiveConfig::default()).unwrap();
    assert_eq!(archive.num_entries(), 2);
    assert_eq!(archive.open_index(0).unwrap().bytes(), b"one");
    assert_eq!(archive.open_index(1).unwrap().bytes(), b"two");
}

#[test]
fn replace_points_the_entry_at_a_freshly_written_payload() {
    let (_dir, path) = temp_zip_path("replace.zip");
    let mut archive = Archive::open_write_new(&path, ArchiveConfig::default()).unwrap();
    archive
        .add(b"a.txt", BufferSource::borrowed(b"original"), Some(0))
        .unwrap();
    archive
        .replace(0, BufferSource::borrowed(b"replaced contents"))
        .unwrap();
    archive.close().unwrap();

    let mut archive = Archive::open_read(&path, ArchiveConfig::default()).unwrap();
    assert_eq!(archive.open_index(0).unwrap().bytes(), b"replaced contents");
}
