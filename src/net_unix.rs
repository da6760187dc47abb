// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// A connected UNIX domain socket as a byte transport. The listener that
// accepts connections and the reconnecting client live outside this crate;
// anything that yields a connected `UnixStream` can be wrapped here.

use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::CloseReason;
use crate::transport::Transport;

/// Socket send buffer requested for every wrapped stream.
const SEND_BUFFER_SIZE: libc::c_int = 262144;

/// A UNIX-domain-socket transport.
///
/// Records the peer's process id at wrap time (informational; framing does
/// not depend on it).
pub struct SocketTransport {
    stream: UnixStream,
    closed: AtomicBool,
    peer_pid: u32,
}

impl SocketTransport {
    /// Wrap a connected stream, applying the default socket options.
    pub fn from_stream(stream: UnixStream) -> Self {
        let fd = stream.as_raw_fd();
        set_default_options(fd);
        Self {
            stream,
            closed: AtomicBool::new(false),
            peer_pid: peer_pid(fd),
        }
    }

    /// Process id of the remote endpoint, or 0 where the platform did not
    /// report one.
    pub fn peer_process_id(&self) -> u32 {
        self.peer_pid
    }
}

impl Transport for SocketTransport {
    fn read_raw(&self, buf: &mut [u8]) -> isize {
        if self.closed.load(Ordering::Acquire) {
            return -1;
        }
        match (&self.stream).read(buf) {
            Ok(n) => n as isize,
            Err(_) => -1,
        }
    }

    fn write_raw(&self, buf: &[u8]) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        (&self.stream).write_all(buf).is_ok()
    }

    fn abort(&self, reason: CloseReason) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        if first {
            log::debug!("socket transport aborted: {reason:?}");
            let _ = self.stream.shutdown(std::net::Shutdown::Both);
        }
        first
    }
}

fn set_default_options(fd: libc::c_int) {
    unsafe {
        let size = SEND_BUFFER_SIZE;
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_SNDBUF,
            &size as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn peer_pid(fd: libc::c_int) -> u32 {
    unsafe {
        let mut cred: libc::ucred = std::mem::zeroed();
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;
        let rc = libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_PEERCRED,
            &mut cred as *mut libc::ucred as *mut libc::c_void,
            &mut len,
        );
        if rc == -1 {
            0
        } else {
            cred.pid as u32
        }
    }
}

#[cfg(target_os = "macos")]
fn peer_pid(fd: libc::c_int) -> u32 {
    unsafe {
        let mut pid: libc::pid_t = 0;
        let mut len = std::mem::size_of::<libc::pid_t>() as libc::socklen_t;
        let rc = libc::getsockopt(
            fd,
            libc::SOL_LOCAL,
            libc::LOCAL_PEERPID,
            &mut pid as *mut libc::pid_t as *mut libc::c_void,
            &mut len,
        );
        if rc == -1 {
            0
        } else {
            pid as u32
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "macos")))]
fn peer_pid(_fd: libc::c_int) -> u32 {
    0
}
