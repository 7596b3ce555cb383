use super::*;
use std::io::Write;
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

fn build_container(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options: FileOptions<'_, ()> =
        FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }

    writer.finish().unwrap().into_inner()
}

fn host_prefix(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn fuse(prefix_len: usize, container: &[u8]) -> Vec<u8> {
    let mut image = host_prefix(prefix_len);
    image.extend_from_slice(container);
    image
}

fn eocd_record(entries: u16, cd_size: u32, cd_offset: u32) -> Vec<u8> {
    let mut record = EOCD_SIGNATURE.to_vec();
    record.extend_from_slice(&[0, 0, 0, 0]);
    record.extend_from_slice(&entries.to_le_bytes());
    record.extend_from_slice(&entries.to_le_bytes());
    record.extend_from_slice(&cd_size.to_le_bytes());
    record.extend_from_slice(&cd_offset.to_le_bytes());
    record.extend_from_slice(&0u16.to_le_bytes());
    record
}

#[test]
fn test_recovers_table_for_any_prefix_length() {
    let container = build_container(&[
        ("main.lua", b"print('hi')"),
        ("lib/util.lua", b"return {}"),
    ]);

    for prefix_len in [0usize, 1, 65536] {
        let image = fuse(prefix_len, &container);
        assert_eq!(find_container_start(&image).unwrap(), prefix_len);

        let archive = FusedArchive::from_image(&image).unwrap();
        assert_eq!(archive.names(), vec!["lib/util.lua", "main.lua"]);
        assert_eq!(archive.get("main.lua").unwrap(), b"print('hi')");
        assert_eq!(archive.get("lib/util.lua").unwrap(), b"return {}");
    }
}

#[test]
fn test_trailing_comment_with_stray_signature() {
    let mut container = build_container(&[("main.lua", b"-- ok")]);

    // Give the record a comment that itself contains the signature bytes
    let record = container.len() - EOCD_LEN;
    let mut comment = EOCD_SIGNATURE.to_vec();
    comment.extend(std::iter::repeat(b'z').take(30));
    container[record + 20..record + 22].copy_from_slice(&(comment.len() as u16).to_le_bytes());
    container.extend_from_slice(&comment);

    let image = fuse(17, &container);
    assert_eq!(find_container_start(&image).unwrap(), 17);

    let archive = FusedArchive::from_image(&image).unwrap();
    assert_eq!(archive.get("main.lua").unwrap(), b"-- ok");
}

#[test]
fn test_trailing_garbage_is_not_a_container() {
    let mut image = fuse(64, &build_container(&[("main.lua", b"x")]));
    image.extend(std::iter::repeat(0xEE).take(100));

    assert!(matches!(
        find_container_start(&image),
        Err(ArchiveError::NoDirectory)
    ));
}

#[test]
fn test_plain_executable_has_no_directory() {
    assert!(matches!(
        FusedArchive::from_image(&host_prefix(4096)),
        Err(ArchiveError::NoDirectory)
    ));
    assert!(matches!(
        FusedArchive::from_image(b"tiny"),
        Err(ArchiveError::NoDirectory)
    ));
}

#[test]
fn test_offsets_before_image_start_rejected() {
    // Directory claims 100 bytes but the record sits at byte 0
    let image = eocd_record(1, 100, 0);
    assert!(matches!(
        find_container_start(&image),
        Err(ArchiveError::BadOffset)
    ));

    // Directory fits but its recorded offset reaches before the image
    let mut image = vec![0u8; 10];
    image.extend_from_slice(&eocd_record(1, 10, 50));
    assert!(matches!(
        find_container_start(&image),
        Err(ArchiveError::BadOffset)
    ));
}

#[test]
fn test_unparseable_region_rejected() {
    let mut image = vec![0xAB; 40];
    image.extend_from_slice(&eocd_record(1, 10, 0));

    assert_eq!(find_container_start(&image).unwrap(), 30);
    assert!(matches!(
        FusedArchive::from_image(&image),
        Err(ArchiveError::ZipParseFailed(_))
    ));
}

#[test]
fn test_directories_skipped() {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options: FileOptions<'_, ()> = FileOptions::default();
    writer.add_directory("assets/", options).unwrap();
    writer.start_file("assets/font.lua", options).unwrap();
    writer.write_all(b"return 1").unwrap();
    let container = writer.finish().unwrap().into_inner();

    let archive = FusedArchive::from_image(&container).unwrap();
    assert_eq!(archive.len(), 1);
    assert!(archive.contains("assets/font.lua"));
    assert!(!archive.contains("assets/"));
}

#[test]
fn test_directory_only_container_is_empty() {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options: FileOptions<'_, ()> = FileOptions::default();
    writer.add_directory("only/", options).unwrap();
    let container = writer.finish().unwrap().into_inner();

    assert!(matches!(
        FusedArchive::from_image(&container),
        Err(ArchiveError::Empty)
    ));
}

#[test]
fn test_corrupt_entry_skipped() {
    let payload = b"stored-payload-0123456789";
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let deflated: FileOptions<'_, ()> =
        FileOptions::default().compression_method(CompressionMethod::Deflated);
    let stored: FileOptions<'_, ()> =
        FileOptions::default().compression_method(CompressionMethod::Stored);
    writer.start_file("main.lua", deflated).unwrap();
    writer.write_all(b"print('hi')").unwrap();
    writer.start_file("broken.dat", stored).unwrap();
    writer.write_all(payload).unwrap();
    let mut container = writer.finish().unwrap().into_inner();

    // Damage the stored bytes so the checksum no longer matches
    let at = container
        .windows(payload.len())
        .position(|w| w == payload)
        .unwrap();
    container[at] ^= 0xFF;

    let archive = FusedArchive::from_image(&fuse(300, &container)).unwrap();
    assert_eq!(archive.len(), 1);
    assert_eq!(archive.get("main.lua"), Some(&b"print('hi')"[..]));
    assert!(!archive.contains("broken.dat"));
}

#[test]
fn test_all_entries_corrupt_is_empty() {
    let payload = b"only-entry-payload-9876543210";
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let stored: FileOptions<'_, ()> =
        FileOptions::default().compression_method(CompressionMethod::Stored);
    writer.start_file("data.bin", stored).unwrap();
    writer.write_all(payload).unwrap();
    let mut container = writer.finish().unwrap().into_inner();

    let at = container
        .windows(payload.len())
        .position(|w| w == payload)
        .unwrap();
    container[at + 3] ^= 0x5A;

    assert!(matches!(
        FusedArchive::from_image(&container),
        Err(ArchiveError::Empty)
    ));
}

#[test]
fn test_reload_clears_previous_table() {
    let mut archive = FusedArchive::new();
    archive
        .load_image(&build_container(&[("first.lua", b"1")]))
        .unwrap();
    archive
        .load_image(&fuse(5, &build_container(&[("second.lua", b"2")])))
        .unwrap();

    assert_eq!(archive.names(), vec!["second.lua"]);

    assert!(archive.load_image(b"not an archive at all, just bytes").is_err());
    assert!(archive.is_empty());
    assert_eq!(archive.total_size(), 0);
}

#[test]
fn test_lookup_normalizes_names() {
    let archive = FusedArchive::from_image(&build_container(&[("app/main.lua", b"m")])).unwrap();

    assert_eq!(archive.get("./app/main.lua").unwrap(), b"m");
    assert_eq!(archive.get("app\\main.lua").unwrap(), b"m");
    assert!(archive.get("main.lua").is_none());
}

#[test]
fn test_normalize_entry_name() {
    assert_eq!(normalize_entry_name("./a/b.lua"), "a/b.lua");
    assert_eq!(normalize_entry_name("././a.lua"), "a.lua");
    assert_eq!(normalize_entry_name("dir\\file.lua"), "dir/file.lua");
    assert_eq!(normalize_entry_name("plain.lua"), "plain.lua");
}

#[test]
fn test_arena_concatenation() {
    let archive = FusedArchive::from_image(&build_container(&[
        ("a.txt", b"AAA"),
        ("b.txt", b"BBBB"),
    ]))
    .unwrap();

    assert_eq!(archive.total_size(), 7);
    let entry = archive.get_entry("b.txt").unwrap();
    assert_eq!(entry.length, 4);
    assert_eq!(entry.name, "b.txt");
}

#[test]
fn test_open_reads_executable_from_disk() {
    let dir = TempDir::new().unwrap();
    let exe = dir.path().join("FusedApp.exe");
    std::fs::write(&exe, fuse(1024, &build_container(&[("main.lua", b"-- fused")]))).unwrap();

    let archive = FusedArchive::open(&exe).unwrap();
    assert_eq!(archive.get("main.lua").unwrap(), b"-- fused");

    let missing = FusedArchive::open(&dir.path().join("missing.exe"));
    assert!(matches!(missing, Err(ArchiveError::ReadFailed { .. })));
}
