/*!
 * Stream Tests
 * Buffered read/write behavior through the filesystem facade
 */

use pretty_assertions::assert_eq;
use std::io::{Read, Seek, SeekFrom, Write};

use rgwfs::{FsError, RgwConfig};

use crate::common::{config, payload, setup, setup_with, MIB};

#[test]
fn test_round_trip() {
    let (_backend, fs) = setup();
    let data = payload(100_000);

    let mut out = fs.create("/data/blob", false, 1024).unwrap();
    out.write_all(&data).unwrap();
    out.close().unwrap();

    let mut input = fs.open("/data/blob").unwrap();
    let mut read_back = Vec::new();
    input.read_to_end(&mut read_back).unwrap();
    assert_eq!(read_back, data);
    assert_eq!(input.read_into(&mut [0u8; 4]).unwrap(), None);
}

#[test]
fn test_small_sequential_reads_match_bulk_read() {
    let (backend, fs) = setup();
    let data = payload(10 * MIB);
    backend.put_file("big", &data).unwrap();

    let mut input = fs.open("/big").unwrap();
    let mut chunked = Vec::with_capacity(data.len());
    let mut chunk = [0u8; 3];
    while let Some(n) = input.read_into(&mut chunk).unwrap() {
        assert!(n <= chunk.len());
        chunked.extend_from_slice(&chunk[..n]);
    }
    assert_eq!(chunked.len(), 10 * MIB);
    assert_eq!(input.position(), 10 * MIB as u64);
    // 4MiB buffer over 10MiB
    assert_eq!(backend.stats().reads, 3);

    let mut bulk = Vec::new();
    fs.open("/big").unwrap().read_to_end(&mut bulk).unwrap();
    assert!(chunked == bulk, "chunked read differs from bulk read");
}

#[test]
fn test_short_backend_writes_are_drained() {
    let (backend, fs) = setup();
    backend.set_max_write_chunk(Some(MIB));
    let data = payload(5 * MIB);

    let mut out = fs.create("/five", false, 1024).unwrap();
    out.write_bytes(&data).unwrap();
    out.flush().unwrap();
    assert_eq!(backend.stats().writes, 5);
    assert_eq!(out.position().unwrap(), 5 * MIB as u64);

    out.close().unwrap();
    assert_eq!(backend.stats().writes, 5);
    assert!(backend.contents("five").unwrap() == data);
}

#[test]
fn test_short_backend_reads_are_looped() {
    let (backend, fs) = setup();
    let data = payload(1000);
    backend.put_file("f", &data).unwrap();
    backend.set_max_read_chunk(Some(7));

    let mut input = fs.open("/f").unwrap();
    let mut buf = vec![0u8; 500];
    assert_eq!(input.read_into(&mut buf).unwrap(), Some(500));
    assert_eq!(&buf[..], &data[..500]);
    assert_eq!(input.available().unwrap(), 500);
}

#[test]
fn test_file_shrunk_after_open_returns_short_count() {
    let (backend, fs) = setup();
    backend.put_file("f", &payload(100)).unwrap();
    let mut input = fs.open("/f").unwrap();
    backend.put_file("f", &payload(40)).unwrap();

    let mut buf = [0u8; 100];
    assert_eq!(input.read_into(&mut buf).unwrap(), Some(40));
    assert_eq!(input.position(), 40);
    // Position is still short of the recorded length
    assert_eq!(input.read_into(&mut buf).unwrap(), Some(0));
}

#[test]
fn test_seek_semantics() {
    let (backend, fs) = setup();
    let data = payload(256);
    backend.put_file("f", &data).unwrap();

    let mut input = fs.open("/f").unwrap();
    assert_eq!(input.seek(SeekFrom::End(-6)).unwrap(), 250);
    assert_eq!(input.read_byte().unwrap(), Some(data[250]));
    input.seek_to(256).unwrap();
    assert_eq!(input.read_byte().unwrap(), None);
    assert_eq!(
        input.seek_to(257),
        Err(FsError::InvalidSeek {
            target: 257,
            length: 256
        })
    );
    assert!(input.seek(SeekFrom::Current(-1000)).is_err());
    assert_eq!(input.position(), 256);
}

#[test]
fn test_backend_read_error_invalidates_buffer() {
    let (backend, fs) = setup_with(RgwConfig {
        read_buffer_size: 16,
        ..config()
    });
    let data = payload(64);
    backend.put_file("f", &data).unwrap();

    let mut input = fs.open("/f").unwrap();
    let mut buf = [0u8; 8];
    input.read_into(&mut buf).unwrap();

    backend.fail_reads_with(Some(-5));
    let mut big = [0u8; 32];
    let err = input.read_into(&mut big).unwrap_err();
    assert!(matches!(err, FsError::BackendRead { code: -5, .. }));

    backend.clear_faults();
    let pos = input.position();
    input.seek_to(pos).unwrap();
    let n = input.read_into(&mut big).unwrap().unwrap();
    assert_eq!(&big[..n], &data[pos as usize..pos as usize + n]);
}

#[test]
fn test_write_retry_after_backend_fault_keeps_bytes_once() {
    let (backend, fs) = setup_with(RgwConfig {
        write_buffer_size: 4,
        ..config()
    });
    let data = b"abcdef";
    let mut out = fs.create("/retry", false, 1024).unwrap();
    backend.fail_writes_with(Some(-5));

    let mut written = 0;
    while written < data.len() {
        match out.write(&data[written..]) {
            Ok(n) => written += n,
            Err(_) => {
                assert_eq!(out.position().unwrap(), written as u64);
                backend.clear_faults();
            }
        }
    }
    out.close().unwrap();
    assert_eq!(backend.contents("retry").unwrap(), data.to_vec());
}

#[test]
fn test_append_after_create() {
    let (backend, fs) = setup();
    let mut out = fs.create("/log", false, 1024).unwrap();
    out.write_all(b"first ").unwrap();
    out.close().unwrap();

    let mut out = fs.append("/log").unwrap();
    out.write_all(b"second").unwrap();
    drop(out);

    assert_eq!(backend.contents("log").unwrap(), b"first second".to_vec());
    assert_eq!(backend.stats().open_handles, 0);
}

#[test]
fn test_streams_fail_after_filesystem_close() {
    let (backend, fs) = setup();
    backend.put_file("f", &payload(10)).unwrap();
    let mut input = fs.open("/f").unwrap();
    let mut out = fs.create("/g", false, 1024).unwrap();
    out.write_all(b"pending").unwrap();

    fs.close().unwrap();
    assert_eq!(
        input.read_into(&mut [0u8; 4]).unwrap_err(),
        FsError::ConnectionClosed
    );
    assert_eq!(out.flush().unwrap_err(), FsError::ConnectionClosed);
}

#[test]
fn test_closed_streams_reject_io() {
    let (backend, fs) = setup();
    backend.put_file("f", &payload(10)).unwrap();

    let mut input = fs.open("/f").unwrap();
    input.close().unwrap();
    input.close().unwrap();
    assert!(matches!(
        input.read_byte(),
        Err(FsError::ClosedStream { .. })
    ));
    assert!(input.available().is_err());

    let err = input.read(&mut [0u8; 1]).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
}
