/*!
 * In-Memory Gateway Backend
 * Volatile backend for tests and demos, with injectable transfer limits and faults
 */

use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::{
    errno, Backend, BackendError, BackendResult, BackendStat, BackendStatVfs, Handle, MountArgs,
    OpenFlags, SetAttrMask,
};

/// Block size reported by `lstat` and `statfs`
const MEM_BLOCK_SIZE: u64 = 4096;

/// Default capacity (1GB)
const MEM_DEFAULT_CAPACITY: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone)]
enum Node {
    File {
        data: Vec<u8>,
        mode: u32,
        mtime_ms: u64,
        atime_ms: u64,
    },
    Directory {
        children: BTreeSet<String>,
        mode: u32,
        mtime_ms: u64,
        atime_ms: u64,
    },
}

impl Node {
    fn directory(mode: u32) -> Self {
        let now = now_ms();
        Node::Directory {
            children: BTreeSet::new(),
            mode,
            mtime_ms: now,
            atime_ms: now,
        }
    }

    fn file(mode: u32) -> Self {
        let now = now_ms();
        Node::File {
            data: Vec::new(),
            mode,
            mtime_ms: now,
            atime_ms: now,
        }
    }

    fn is_dir(&self) -> bool {
        matches!(self, Node::Directory { .. })
    }

    fn stat(&self) -> BackendStat {
        match self {
            Node::File {
                data,
                mode,
                mtime_ms,
                atime_ms,
            } => BackendStat {
                mode: *mode,
                size: data.len() as u64,
                blksize: MEM_BLOCK_SIZE,
                mtime_ms: *mtime_ms,
                atime_ms: *atime_ms,
                is_dir: false,
            },
            Node::Directory {
                mode,
                mtime_ms,
                atime_ms,
                ..
            } => BackendStat {
                mode: *mode,
                size: 0,
                blksize: MEM_BLOCK_SIZE,
                mtime_ms: *mtime_ms,
                atime_ms: *atime_ms,
                is_dir: true,
            },
        }
    }
}

#[derive(Debug, Clone)]
struct OpenHandle {
    path: String,
    flags: OpenFlags,
}

/// Injected transfer limits and failures
#[derive(Debug, Default)]
struct Faults {
    max_read_chunk: Option<usize>,
    max_write_chunk: Option<usize>,
    read_error: Option<i32>,
    write_error: Option<i32>,
    unlink_errors: HashSet<String>,
}

#[derive(Debug, Default)]
struct Counters {
    opens: AtomicUsize,
    closes: AtomicUsize,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fsyncs: AtomicUsize,
    unlinks: AtomicUsize,
}

/// Snapshot of backend call counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendCallStats {
    pub opens: usize,
    pub closes: usize,
    pub reads: usize,
    pub writes: usize,
    pub fsyncs: usize,
    pub unlinks: usize,
    pub open_handles: usize,
}

/// In-memory backend implementation
///
/// Clones share the same namespace, handle table and counters.
#[derive(Debug, Clone)]
pub struct MemBackend {
    nodes: Arc<DashMap<String, Node, RandomState>>,
    handles: Arc<DashMap<Handle, OpenHandle, RandomState>>,
    next_handle: Arc<AtomicU64>,
    faults: Arc<Mutex<Faults>>,
    counters: Arc<Counters>,
    mounted: Arc<AtomicBool>,
    capacity: u64,
}

impl MemBackend {
    /// Create new in-memory backend
    pub fn new() -> Self {
        Self::with_capacity(MEM_DEFAULT_CAPACITY)
    }

    /// Create with the capacity reported by `statfs`
    pub fn with_capacity(capacity: u64) -> Self {
        let nodes = DashMap::with_hasher(RandomState::new());
        nodes.insert(String::new(), Node::directory(0o755));

        Self {
            nodes: Arc::new(nodes),
            handles: Arc::new(DashMap::with_hasher(RandomState::new())),
            next_handle: Arc::new(AtomicU64::new(1)),
            faults: Arc::new(Mutex::new(Faults::default())),
            counters: Arc::new(Counters::default()),
            mounted: Arc::new(AtomicBool::new(false)),
            capacity,
        }
    }

    /// Cap the bytes returned by each `read` call
    pub fn set_max_read_chunk(&self, limit: Option<usize>) {
        self.faults.lock().max_read_chunk = limit;
    }

    /// Cap the bytes accepted by each `write` call
    pub fn set_max_write_chunk(&self, limit: Option<usize>) {
        self.faults.lock().max_write_chunk = limit;
    }

    /// Make every `read` fail with `code`
    pub fn fail_reads_with(&self, code: Option<i32>) {
        self.faults.lock().read_error = code;
    }

    /// Make every `write` fail with `code`
    pub fn fail_writes_with(&self, code: Option<i32>) {
        self.faults.lock().write_error = code;
    }

    /// Make `unlink` of one path fail with EIO
    pub fn fail_unlink_of(&self, path: &str) {
        self.faults.lock().unlink_errors.insert(key(path));
    }

    /// Remove every injected limit and failure
    pub fn clear_faults(&self) {
        *self.faults.lock() = Faults::default();
    }

    pub fn stats(&self) -> BackendCallStats {
        BackendCallStats {
            opens: self.counters.opens.load(Ordering::SeqCst),
            closes: self.counters.closes.load(Ordering::SeqCst),
            reads: self.counters.reads.load(Ordering::SeqCst),
            writes: self.counters.writes.load(Ordering::SeqCst),
            fsyncs: self.counters.fsyncs.load(Ordering::SeqCst),
            unlinks: self.counters.unlinks.load(Ordering::SeqCst),
            open_handles: self.handles.len(),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// File contents, if the path names a file
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        match self.nodes.get(&key(path)).map(|n| n.clone()) {
            Some(Node::File { data, .. }) => Some(data),
            _ => None,
        }
    }

    /// Replace (or create) a file's contents, creating missing ancestors
    pub fn put_file(&self, path: &str, data: &[u8]) -> BackendResult<()> {
        let key = key(path);
        let (parent, _) = split(&key);
        match self.mkdirs(parent, 0o755) {
            Ok(()) | Err(BackendError::AlreadyExists(_)) => {}
            Err(e) => return Err(e),
        }

        if let Some(mut entry) = self.nodes.get_mut(&key) {
            return match entry.value_mut() {
                Node::File {
                    data: contents,
                    mtime_ms,
                    ..
                } => {
                    *contents = data.to_vec();
                    *mtime_ms = now_ms();
                    Ok(())
                }
                Node::Directory { .. } => Err(BackendError::Errno(-errno::EISDIR)),
            };
        }

        let mut node = Node::file(0o644);
        if let Node::File { data: contents, .. } = &mut node {
            *contents = data.to_vec();
        }
        self.insert_child(&key, node)
    }

    /// Insert a node and link it into its parent directory
    fn insert_child(&self, key: &str, node: Node) -> BackendResult<()> {
        let (parent, name) = split(key);
        match self.nodes.get_mut(parent) {
            Some(mut entry) => match entry.value_mut() {
                Node::Directory { children, .. } => {
                    children.insert(name.to_string());
                }
                Node::File { .. } => return Err(BackendError::Errno(-errno::ENOTDIR)),
            },
            None => return Err(BackendError::NotFound(parent.to_string())),
        }
        self.nodes.insert(key.to_string(), node);
        Ok(())
    }

    fn unlink_child(&self, key: &str) {
        let (parent, name) = split(key);
        if let Some(mut entry) = self.nodes.get_mut(parent) {
            if let Node::Directory { children, .. } = entry.value_mut() {
                children.remove(name);
            }
        }
    }

    fn handle(&self, handle: Handle) -> BackendResult<OpenHandle> {
        self.handles
            .get(&handle)
            .map(|h| h.clone())
            .ok_or(BackendError::Errno(-errno::EBADF))
    }

    fn used_bytes(&self) -> u64 {
        self.nodes
            .iter()
            .map(|entry| match entry.value() {
                Node::File { data, .. } => data.len() as u64,
                Node::Directory { .. } => 0,
            })
            .sum()
    }
}

impl Default for MemBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemBackend {
    fn mount(&self, _args: &MountArgs) -> BackendResult<()> {
        self.mounted.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn unmount(&self) -> BackendResult<()> {
        self.mounted.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn open(&self, path: &str, flags: u32, mode: u32) -> BackendResult<Handle> {
        let key = key(path);
        let flags = OpenFlags::from_backend(flags);

        let existing = self.nodes.get(&key).map(|n| n.is_dir());
        match existing {
            Some(_) if flags.create_new => return Err(BackendError::AlreadyExists(key)),
            Some(false) if flags.truncate => {
                if let Some(mut entry) = self.nodes.get_mut(&key) {
                    if let Node::File { data, mtime_ms, .. } = entry.value_mut() {
                        data.clear();
                        *mtime_ms = now_ms();
                    }
                }
            }
            Some(_) => {}
            None if flags.will_create() => self.insert_child(&key, Node::file(mode & 0o7777))?,
            None => return Err(BackendError::NotFound(key)),
        }

        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.handles.insert(handle, OpenHandle { path: key, flags });
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    fn close(&self, handle: Handle) -> BackendResult<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        self.handles
            .remove(&handle)
            .map(|_| ())
            .ok_or(BackendError::Errno(-errno::EBADF))
    }

    fn read(&self, handle: Handle, offset: u64, buf: &mut [u8]) -> BackendResult<usize> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        let limit = {
            let faults = self.faults.lock();
            if let Some(code) = faults.read_error {
                return Err(BackendError::Errno(code));
            }
            faults.max_read_chunk
        };

        let open = self.handle(handle)?;
        let entry = self
            .nodes
            .get(&open.path)
            .ok_or_else(|| BackendError::NotFound(open.path.clone()))?;
        match entry.value() {
            Node::File { data, .. } => {
                let offset = offset as usize;
                if offset >= data.len() {
                    return Ok(0);
                }
                let mut n = buf.len().min(data.len() - offset);
                if let Some(limit) = limit {
                    n = n.min(limit);
                }
                buf[..n].copy_from_slice(&data[offset..offset + n]);
                Ok(n)
            }
            Node::Directory { .. } => Err(BackendError::Errno(-errno::EISDIR)),
        }
    }

    fn write(&self, handle: Handle, offset: u64, buf: &[u8]) -> BackendResult<usize> {
        self.counters.writes.fetch_add(1, Ordering::SeqCst);
        let limit = {
            let faults = self.faults.lock();
            if let Some(code) = faults.write_error {
                return Err(BackendError::Errno(code));
            }
            faults.max_write_chunk
        };

        let open = self.handle(handle)?;
        if !open.flags.is_writable() {
            return Err(BackendError::Errno(-errno::EBADF));
        }

        let mut entry = self
            .nodes
            .get_mut(&open.path)
            .ok_or_else(|| BackendError::NotFound(open.path.clone()))?;
        match entry.value_mut() {
            Node::File { data, mtime_ms, .. } => {
                let mut n = buf.len();
                if let Some(limit) = limit {
                    n = n.min(limit);
                }
                let start = if open.flags.append {
                    data.len()
                } else {
                    offset as usize
                };
                let end = start + n;
                if data.len() < end {
                    data.resize(end, 0);
                }
                data[start..end].copy_from_slice(&buf[..n]);
                *mtime_ms = now_ms();
                Ok(n)
            }
            Node::Directory { .. } => Err(BackendError::Errno(-errno::EISDIR)),
        }
    }

    fn fsync(&self, handle: Handle) -> BackendResult<()> {
        self.counters.fsyncs.fetch_add(1, Ordering::SeqCst);
        self.handle(handle).map(|_| ())
    }

    fn lstat(&self, path: &str) -> BackendResult<BackendStat> {
        let key = key(path);
        self.nodes
            .get(&key)
            .map(|n| n.stat())
            .ok_or(BackendError::NotFound(key))
    }

    fn setattr(&self, path: &str, stat: &BackendStat, mask: SetAttrMask) -> BackendResult<()> {
        let key = key(path);
        let mut entry = self
            .nodes
            .get_mut(&key)
            .ok_or_else(|| BackendError::NotFound(key.clone()))?;
        let (mode, mtime_ms, atime_ms) = match entry.value_mut() {
            Node::File {
                mode,
                mtime_ms,
                atime_ms,
                ..
            }
            | Node::Directory {
                mode,
                mtime_ms,
                atime_ms,
                ..
            } => (mode, mtime_ms, atime_ms),
        };

        if mask.contains(SetAttrMask::MODE) {
            *mode = stat.mode & 0o7777;
        }
        if mask.contains(SetAttrMask::MTIME) {
            *mtime_ms = stat.mtime_ms;
        }
        if mask.contains(SetAttrMask::ATIME) {
            *atime_ms = stat.atime_ms;
        }
        Ok(())
    }

    fn statfs(&self, path: &str) -> BackendResult<BackendStatVfs> {
        let key = key(path);
        if !self.nodes.contains_key(&key) {
            return Err(BackendError::NotFound(key));
        }

        let blocks = self.capacity / MEM_BLOCK_SIZE;
        let used = self.used_bytes().div_ceil(MEM_BLOCK_SIZE);
        Ok(BackendStatVfs {
            bsize: MEM_BLOCK_SIZE,
            blocks,
            bavail: blocks.saturating_sub(used),
        })
    }

    fn unlink(&self, path: &str) -> BackendResult<()> {
        self.counters.unlinks.fetch_add(1, Ordering::SeqCst);
        let key = key(path);
        if key.is_empty() {
            return Err(BackendError::Errno(-errno::EINVAL));
        }
        if self.faults.lock().unlink_errors.contains(&key) {
            return Err(BackendError::Errno(-errno::EIO));
        }

        match self.nodes.get(&key).map(|n| n.clone()) {
            Some(Node::Directory { children, .. }) if !children.is_empty() => {
                Err(BackendError::Errno(-errno::ENOTEMPTY))
            }
            Some(_) => {
                self.nodes.remove(&key);
                self.unlink_child(&key);
                Ok(())
            }
            None => Err(BackendError::NotFound(key)),
        }
    }

    fn rename(&self, from: &str, to: &str) -> BackendResult<()> {
        let from = key(from);
        let to = key(to);

        if !self.nodes.contains_key(&from) {
            return Err(BackendError::NotFound(from));
        }
        if self.nodes.contains_key(&to) {
            return Err(BackendError::AlreadyExists(to));
        }
        if from.is_empty() || to.starts_with(&format!("{}/", from)) {
            return Err(BackendError::Errno(-errno::EINVAL));
        }
        let (to_parent, _) = split(&to);
        match self.nodes.get(to_parent).map(|n| n.is_dir()) {
            Some(true) => {}
            Some(false) => return Err(BackendError::Errno(-errno::ENOTDIR)),
            None => return Err(BackendError::NotFound(to_parent.to_string())),
        }

        let prefix = format!("{}/", from);
        let moved: Vec<String> = self
            .nodes
            .iter()
            .filter(|entry| entry.key() == &from || entry.key().starts_with(&prefix))
            .map(|entry| entry.key().clone())
            .collect();

        self.unlink_child(&from);
        let mut root = None;
        for old in moved {
            if let Some((_, node)) = self.nodes.remove(&old) {
                if old == from {
                    root = Some(node);
                } else {
                    self.nodes.insert(format!("{}{}", to, &old[from.len()..]), node);
                }
            }
        }
        if let Some(node) = root {
            self.insert_child(&to, node)?;
        }

        for mut entry in self.handles.iter_mut() {
            let path = &mut entry.value_mut().path;
            if *path == from || path.starts_with(&prefix) {
                *path = format!("{}{}", to, &path[from.len()..]);
            }
        }
        Ok(())
    }

    fn listdir(&self, path: &str) -> BackendResult<Vec<String>> {
        let key = key(path);
        match self.nodes.get(&key).map(|n| n.clone()) {
            Some(Node::Directory { children, .. }) => Ok(children.into_iter().collect()),
            Some(Node::File { .. }) => Err(BackendError::Errno(-errno::ENOTDIR)),
            None => Err(BackendError::NotFound(key)),
        }
    }

    fn mkdirs(&self, path: &str, mode: u32) -> BackendResult<()> {
        let key = key(path);
        if self.nodes.contains_key(&key) {
            return Err(BackendError::AlreadyExists(key));
        }

        let mut current = String::new();
        for component in key.split('/') {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(component);

            match self.nodes.get(&current).map(|n| n.is_dir()) {
                Some(true) => {}
                Some(false) => return Err(BackendError::Errno(-errno::ENOTDIR)),
                None => self.insert_child(&current, Node::directory(mode & 0o7777))?,
            }
        }
        Ok(())
    }
}

/// Root-relative key: no leading or trailing slash, root is empty
fn key(path: &str) -> String {
    path.trim_matches('/').to_string()
}

/// Split a key into (parent, name)
fn split(key: &str) -> (&str, &str) {
    key.rsplit_once('/').unwrap_or(("", key))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
