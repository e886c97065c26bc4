/*!
 * Namespace Tests
 * Create, mkdirs, delete, rename and listing through the facade
 */

use pretty_assertions::assert_eq;
use std::io::Write;

use rgwfs::{Backend, CreateOptions, FileType, FsError, Permissions};

use crate::common::setup;

#[test]
fn test_create_existing_respects_overwrite() {
    let (backend, fs) = setup();
    fs.create("/f", false, 1024)
        .unwrap()
        .write_all(b"original")
        .unwrap();

    assert_eq!(
        fs.create("/f", false, 1024).unwrap_err(),
        FsError::AlreadyExists("/f".into())
    );

    let mut out = fs.create("/f", true, 1024).unwrap();
    out.write_all(b"new").unwrap();
    out.close().unwrap();
    assert_eq!(backend.contents("f").unwrap(), b"new".to_vec());
}

#[test]
fn test_create_makes_missing_parents() {
    let (_backend, fs) = setup();
    fs.create("/a/b/c/file", false, 1024).unwrap().close().unwrap();
    assert!(fs.is_directory("/a/b/c").unwrap());
    assert!(fs.is_file("/a/b/c/file").unwrap());
}

#[test]
fn test_create_under_file_fails_parent_creation() {
    let (backend, fs) = setup();
    backend.put_file("plain", b"x").unwrap();
    assert!(matches!(
        fs.create("/plain/child", false, 1024),
        Err(FsError::ParentCreation(_))
    ));
}

#[test]
fn test_open_directory_is_not_a_file() {
    let (backend, fs) = setup();
    fs.mkdirs("/dir").unwrap();
    assert_eq!(fs.open("/dir").unwrap_err(), FsError::NotAFile("/dir".into()));
    assert_eq!(backend.stats().open_handles, 0);
    assert!(fs.open("/missing").unwrap_err().is_not_found());
}

#[test]
fn test_mkdirs_twice_succeeds() {
    let (_backend, fs) = setup();
    assert!(fs.mkdirs("/x/y/z").unwrap());
    assert!(fs.mkdirs("/x/y/z").unwrap());
    assert!(fs.mkdirs("/x").unwrap());
}

#[test]
fn test_mkdirs_over_file_fails() {
    let (backend, fs) = setup();
    backend.put_file("f", b"").unwrap();
    assert_eq!(
        fs.mkdirs("/f").unwrap_err(),
        FsError::NotADirectory("/f".into())
    );
    assert_eq!(
        fs.mkdirs("/f/sub").unwrap_err(),
        FsError::NotADirectory("/f/sub".into())
    );
}

#[test]
fn test_mkdirs_with_permission() {
    let (_backend, fs) = setup();
    fs.mkdirs_with_permission("/private", Permissions::new(0o700))
        .unwrap();
    let status = fs.get_file_status("/private").unwrap();
    assert_eq!(status.permission.mode, 0o700);
    assert_eq!(status.file_type, FileType::Directory);
}

#[test]
fn test_delete_non_recursive_vs_recursive() {
    let (backend, fs) = setup();
    backend.put_file("tree/a", b"1").unwrap();
    backend.put_file("tree/sub/b", b"2").unwrap();
    backend.put_file("tree/sub/deeper/c", b"3").unwrap();

    assert_eq!(
        fs.delete("/tree", false).unwrap_err(),
        FsError::DirectoryNotEmpty("/tree".into())
    );
    assert!(fs.exists("/tree/sub/deeper/c").unwrap());

    assert!(fs.delete("/tree", true).unwrap());
    assert!(!fs.exists("/tree").unwrap());
    assert!(fs.list_status("/").unwrap().is_empty());
}

#[test]
fn test_delete_file_and_empty_dir() {
    let (_backend, fs) = setup();
    fs.mkdirs("/empty").unwrap();
    fs.create("/f", false, 1024).unwrap().close().unwrap();

    assert!(fs.delete("/empty", false).unwrap());
    assert!(fs.delete("/f", false).unwrap());
    assert!(!fs.delete("/f", false).unwrap());
}

#[test]
fn test_recursive_delete_aborts_on_failure() {
    let (backend, fs) = setup();
    backend.put_file("d/1", b"").unwrap();
    backend.put_file("d/2", b"").unwrap();
    backend.put_file("d/3", b"").unwrap();
    backend.fail_unlink_of("d/2");

    assert!(fs.delete("/d", true).is_err());
    let remaining: Vec<String> = fs
        .list_status("/d")
        .unwrap()
        .into_iter()
        .map(|s| s.path)
        .collect();
    assert_eq!(
        remaining,
        vec![
            "rgw://test-bucket/d/2".to_string(),
            "rgw://test-bucket/d/3".to_string()
        ]
    );
}

#[test]
fn test_rename() {
    let (backend, fs) = setup();
    backend.put_file("src/f", b"data").unwrap();
    fs.mkdirs("/dst").unwrap();

    assert!(fs.rename("/src", "/dst/moved").unwrap());
    assert_eq!(backend.contents("dst/moved/f").unwrap(), b"data".to_vec());
    assert!(!fs.exists("/src").unwrap());

    assert!(fs.rename("/missing", "/other").unwrap_err().is_not_found());
    assert_eq!(
        fs.rename("/dst/moved", "/dst").unwrap_err(),
        FsError::AlreadyExists("/dst".into())
    );
}

#[test]
fn test_list_status() {
    let (backend, fs) = setup();
    backend.put_file("dir/b", b"bb").unwrap();
    backend.put_file("dir/a", b"a").unwrap();
    fs.mkdirs("/dir/c").unwrap();

    let listing = fs.list_status("/dir").unwrap();
    let summary: Vec<(String, FileType, u64)> = listing
        .iter()
        .map(|s| (s.path.clone(), s.file_type, s.length))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("rgw://test-bucket/dir/a".to_string(), FileType::File, 1),
            ("rgw://test-bucket/dir/b".to_string(), FileType::File, 2),
            ("rgw://test-bucket/dir/c".to_string(), FileType::Directory, 0),
        ]
    );

    let file = fs.list_status("/dir/b").unwrap();
    assert_eq!(file.len(), 1);
    assert_eq!(file[0].path, "rgw://test-bucket/dir/b");

    assert!(fs.list_status("/nope").unwrap_err().is_not_found());
}

#[test]
fn test_file_status_fields() {
    let (_backend, fs) = setup();
    let mut out = fs
        .create_with(
            "/st",
            CreateOptions::default().permission(Permissions::new(0o640)),
        )
        .unwrap();
    out.write_all(&[7u8; 123]).unwrap();
    out.close().unwrap();

    let status = fs.get_file_status("/st").unwrap();
    assert_eq!(status.length, 123);
    assert_eq!(status.permission.mode, 0o640);
    assert_eq!(status.owner, "tester");
    assert_eq!(status.replication, fs.default_replication());
    assert!(status.is_file());
    assert_eq!(fs.default_block_size(), 64 * 1024 * 1024);
}

#[test]
fn test_relative_paths_use_working_directory() {
    let (backend, fs) = setup();
    fs.mkdirs("projects").unwrap();
    assert!(backend.lstat("user/tester/projects").unwrap().is_dir);

    fs.set_working_directory("projects").unwrap();
    fs.create("notes", false, 1024).unwrap().close().unwrap();
    assert!(fs.is_file("/user/tester/projects/notes").unwrap());
    assert!(fs.is_file("../projects/./notes").unwrap());
}
