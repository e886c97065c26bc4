/*!
 * Mock Backend Tests
 * Backend call sequences verified against a mockall double
 */

use mockall::predicate::eq;
use mockall::{mock, Sequence};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::Arc;

use rgwfs::backend::{
    bits, Backend, BackendError, BackendResult, BackendStat, BackendStatVfs, Handle, MountArgs,
    SetAttrMask,
};
use rgwfs::{FsError, RgwFileSystem};

use crate::common::config;

mock! {
    pub Gateway {}

    impl Backend for Gateway {
        fn mount(&self, args: &MountArgs) -> BackendResult<()>;
        fn unmount(&self) -> BackendResult<()>;
        fn open(&self, path: &str, flags: u32, mode: u32) -> BackendResult<Handle>;
        fn close(&self, handle: Handle) -> BackendResult<()>;
        fn read(&self, handle: Handle, offset: u64, buf: &mut [u8]) -> BackendResult<usize>;
        fn write(&self, handle: Handle, offset: u64, buf: &[u8]) -> BackendResult<usize>;
        fn fsync(&self, handle: Handle) -> BackendResult<()>;
        fn lstat(&self, path: &str) -> BackendResult<BackendStat>;
        fn setattr(&self, path: &str, stat: &BackendStat, mask: SetAttrMask) -> BackendResult<()>;
        fn statfs(&self, path: &str) -> BackendResult<BackendStatVfs>;
        fn unlink(&self, path: &str) -> BackendResult<()>;
        fn rename(&self, from: &str, to: &str) -> BackendResult<()>;
        fn listdir(&self, path: &str) -> BackendResult<Vec<String>>;
        fn mkdirs(&self, path: &str, mode: u32) -> BackendResult<()>;
    }
}

/// Mock that accepts the mount/unmount lifecycle
fn gateway() -> MockGateway {
    let mut mock = MockGateway::new();
    mock.expect_mount()
        .withf(|args: &MountArgs| args.authority == "test-bucket")
        .times(1)
        .returning(|_| Ok(()));
    mock.expect_unmount().times(1).returning(|| Ok(()));
    mock
}

fn connect(mock: MockGateway) -> RgwFileSystem {
    RgwFileSystem::initialize("rgw://test-bucket", Arc::new(mock), config()).unwrap()
}

fn dir_stat() -> BackendStat {
    BackendStat {
        mode: 0o755,
        is_dir: true,
        ..Default::default()
    }
}

fn file_stat(size: u64) -> BackendStat {
    BackendStat {
        mode: 0o644,
        size,
        blksize: 4096,
        ..Default::default()
    }
}

#[test]
fn test_open_directory_closes_handle() {
    let mut mock = gateway();
    mock.expect_open()
        .withf(|path: &str, flags: &u32, _mode: &u32| path == "dir" && *flags == bits::O_RDONLY)
        .times(1)
        .returning(|_, _, _| Ok(42));
    mock.expect_lstat().returning(|_| Ok(dir_stat()));
    mock.expect_close()
        .with(eq(42))
        .times(1)
        .returning(|_| Ok(()));

    let fs = connect(mock);
    assert_eq!(fs.open("/dir").unwrap_err(), FsError::NotAFile("/dir".into()));
}

#[test]
fn test_rename_propagates_every_backend_error() {
    let mut mock = gateway();
    mock.expect_rename()
        .withf(|from: &str, to: &str| from == "a" && to == "b")
        .times(1)
        .returning(|from, _| Err(BackendError::NotFound(from.to_string())));
    mock.expect_rename()
        .withf(|from: &str, _to: &str| from == "c")
        .times(1)
        .returning(|_, _| Err(BackendError::Errno(-5)));

    let fs = connect(mock);
    assert_eq!(
        fs.rename("/a", "/b").unwrap_err(),
        FsError::NotFound("/a".into())
    );
    assert!(matches!(
        fs.rename("/c", "/d").unwrap_err(),
        FsError::Backend { code: -5, .. }
    ));
}

#[test]
fn test_flush_writes_then_fsyncs() {
    let mut mock = gateway();
    let mut seq = Sequence::new();

    // Missing before the create, a file once opened
    let mut target_stats = 0;
    mock.expect_lstat()
        .withf(|path: &str| path == "f")
        .times(2)
        .returning(move |path| {
            target_stats += 1;
            if target_stats == 1 {
                Err(BackendError::NotFound(path.to_string()))
            } else {
                Ok(file_stat(0))
            }
        });
    mock.expect_lstat()
        .withf(|path: &str| path.is_empty())
        .times(1)
        .returning(|_| Ok(dir_stat()));
    mock.expect_open()
        .withf(|path: &str, flags: &u32, mode: &u32| {
            path == "f"
                && *flags == bits::O_WRONLY | bits::O_CREAT | bits::O_EXCL
                && *mode == 0o644
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(7));
    mock.expect_write()
        .withf(|handle: &Handle, offset: &u64, buf: &[u8]| {
            *handle == 7 && *offset == 0 && buf == b"abcdef"
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(4));
    mock.expect_write()
        .withf(|handle: &Handle, offset: &u64, buf: &[u8]| {
            *handle == 7 && *offset == 4 && buf == b"ef"
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, buf| Ok(buf.len()));
    mock.expect_fsync()
        .with(eq(7))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    mock.expect_close()
        .with(eq(7))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));

    let fs = connect(mock);
    let mut out = fs.create("/f", false, 1024).unwrap();
    out.write_all(b"abcdef").unwrap();
    out.close().unwrap();
}

#[test]
fn test_create_without_overwrite_loses_race_to_existing_file() {
    let mut mock = gateway();
    mock.expect_lstat()
        .withf(|path: &str| path == "f")
        .times(1)
        .returning(|path| Err(BackendError::NotFound(path.to_string())));
    mock.expect_lstat()
        .withf(|path: &str| path.is_empty())
        .returning(|_| Ok(dir_stat()));
    // Someone else created the file after the existence check
    mock.expect_open()
        .withf(|_path: &str, flags: &u32, _mode: &u32| flags & bits::O_EXCL != 0)
        .times(1)
        .returning(|path, _, _| Err(BackendError::AlreadyExists(path.to_string())));

    let fs = connect(mock);
    assert_eq!(
        fs.create("/f", false, 1024).unwrap_err(),
        FsError::AlreadyExists("/f".into())
    );
}

#[test]
fn test_read_error_code_is_surfaced() {
    let mut mock = gateway();
    mock.expect_open().returning(|_, _, _| Ok(3));
    mock.expect_lstat().returning(|_| Ok(file_stat(10)));
    mock.expect_read()
        .times(1)
        .returning(|_, _, _| Err(BackendError::Errno(-110)));
    mock.expect_close().with(eq(3)).times(1).returning(|_| Ok(()));

    let fs = connect(mock);
    let mut input = fs.open("/f").unwrap();
    assert_eq!(
        input.read_byte().unwrap_err(),
        FsError::BackendRead {
            handle: 3,
            code: -110
        }
    );
}

#[test]
fn test_zero_progress_write_fails() {
    let mut mock = gateway();
    mock.expect_lstat()
        .withf(|path: &str| path == "f")
        .returning(|_| Ok(file_stat(0)));
    mock.expect_open().returning(|_, _, _| Ok(9));
    mock.expect_write().returning(|_, _, _| Ok(0));
    mock.expect_close().with(eq(9)).times(1).returning(|_| Ok(()));

    let fs = connect(mock);
    let mut out = fs.append("/f").unwrap();
    out.write_all(b"stuck").unwrap();
    assert_eq!(
        out.flush().unwrap_err(),
        FsError::BackendWrite { handle: 9, code: 0 }
    );
    // Drop still releases the handle
}

#[test]
fn test_mount_failure_aborts_initialize() {
    let mut mock = MockGateway::new();
    mock.expect_mount()
        .returning(|_| Err(BackendError::Errno(-13)));

    let result = RgwFileSystem::initialize("rgw://test-bucket", Arc::new(mock), config());
    assert_eq!(
        result.unwrap_err(),
        FsError::Backend {
            op: "mount".into(),
            code: -13
        }
    );
}
