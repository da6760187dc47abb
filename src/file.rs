// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// A regular file as a byte transport: record a frame stream to disk, or play
// one back. EOF on read is reported once as a clean 0, then as a failure.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::CloseReason;
use crate::transport::Transport;

/// A file-backed transport.
pub struct FileTransport {
    file: Mutex<File>,
    closed: AtomicBool,
    eof_delivered: AtomicBool,
}

impl FileTransport {
    /// Open `path` for reading and/or writing. Opening write-only creates
    /// the file and truncates any previous contents.
    pub fn open<P: AsRef<Path>>(path: P, read: bool, write: bool) -> std::io::Result<Self> {
        let mut options = OpenOptions::new();
        options.read(read).write(write);
        if write && !read {
            options.create(true).truncate(true);
        }
        let file = options.open(path)?;
        Ok(Self {
            file: Mutex::new(file),
            closed: AtomicBool::new(false),
            eof_delivered: AtomicBool::new(false),
        })
    }
}

impl Transport for FileTransport {
    fn read_raw(&self, buf: &mut [u8]) -> isize {
        if self.closed.load(Ordering::Acquire) {
            return -1;
        }
        let mut file = self.file.lock().unwrap();
        match file.read(buf) {
            Ok(0) => {
                // First EOF is a clean end of stream; afterwards the caller
                // is reading past the end.
                if self.eof_delivered.swap(true, Ordering::AcqRel) {
                    -1
                } else {
                    0
                }
            }
            Ok(n) => n as isize,
            Err(_) => -1,
        }
    }

    fn write_raw(&self, buf: &[u8]) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        self.file.lock().unwrap().write_all(buf).is_ok()
    }

    fn abort(&self, reason: CloseReason) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        if first {
            log::debug!("file transport aborted: {reason:?}");
            let _ = self.file.lock().unwrap().flush();
        }
        first
    }
}
