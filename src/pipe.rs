//! 内存管道
//!
//! 单生产者、单消费者的有界字节通道。写满时写端阻塞，读空时读端阻塞，
//! 任意一端都可以带着错误提前关闭，另一端的阻塞操作会立即返回该错误。
//!
//! 读端只有在写端被“干净地”关闭后才会读到 EOF；写端带错误关闭时，
//! 读端随后的读取会失败，而不是把截断的输出当作完整的流。

use crate::error::DumpError;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// 管道关闭错误，包装在 `io::ErrorKind::BrokenPipe` 中返回
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("pipe {side} closed: {reason}")]
pub struct PipeClosed {
    /// 关闭的一端：`reader` 或 `writer`
    pub side: &'static str,
    /// 关闭原因
    pub reason: String,
}

impl PipeClosed {
    /// 从 `io::Error` 中取出管道关闭错误
    pub fn from_io(err: &io::Error) -> Option<&PipeClosed> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<PipeClosed>())
    }

    fn into_io(self) -> io::Error {
        io::Error::new(io::ErrorKind::BrokenPipe, self)
    }
}

#[derive(Debug, Clone)]
enum Closed {
    Clean,
    Error(String),
}

#[derive(Debug)]
struct State {
    buf: VecDeque<u8>,
    capacity: usize,
    write_closed: Option<Closed>,
    read_closed: Option<Closed>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
    readable: Condvar,
    writable: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 创建一对管道端点
///
/// # 参数
///
/// * `capacity` - 缓冲区容量（字节），最小为 1
pub fn pipe(capacity: usize) -> (PipeReader, PipeWriter) {
    let capacity = capacity.max(1);
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            buf: VecDeque::with_capacity(capacity),
            capacity,
            write_closed: None,
            read_closed: None,
        }),
        readable: Condvar::new(),
        writable: Condvar::new(),
    });
    (
        PipeReader {
            shared: Arc::clone(&shared),
        },
        PipeWriter { shared },
    )
}

fn reason_of(err: Option<&DumpError>) -> Closed {
    match err {
        Some(err) => Closed::Error(err.to_string()),
        None => Closed::Clean,
    }
}

/// 管道读端
#[derive(Debug)]
pub struct PipeReader {
    shared: Arc<Shared>,
}

impl PipeReader {
    /// 关闭读端
    ///
    /// 之后写端的写入都会失败；`err` 为 `None` 时原因记为 `reader closed`。
    pub fn close_with_error(&self, err: Option<&DumpError>) {
        let mut state = self.shared.lock();
        if state.read_closed.is_none() {
            tracing::debug!(error = ?err.map(ToString::to_string), "pipe reader closed");
            state.read_closed = Some(reason_of(err));
            state.buf.clear();
        }
        drop(state);
        self.shared.writable.notify_all();
    }
}

impl Read for PipeReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        let mut state = self.shared.lock();
        loop {
            if state.read_closed.is_some() {
                return Err(PipeClosed {
                    side: "reader",
                    reason: "read on closed reader".to_string(),
                }
                .into_io());
            }
            if !state.buf.is_empty() {
                let n = out.len().min(state.buf.len());
                for (slot, byte) in out.iter_mut().zip(state.buf.drain(..n)) {
                    *slot = byte;
                }
                drop(state);
                self.shared.writable.notify_one();
                return Ok(n);
            }
            match state.write_closed.clone() {
                Some(Closed::Clean) => return Ok(0),
                Some(Closed::Error(reason)) => {
                    return Err(PipeClosed {
                        side: "writer",
                        reason,
                    }
                    .into_io());
                }
                None => {
                    state = self
                        .shared
                        .readable
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        if state.read_closed.is_none() {
            state.read_closed = Some(Closed::Error("reader dropped without close".to_string()));
            state.buf.clear();
        }
        drop(state);
        self.shared.writable.notify_all();
    }
}

/// 管道写端
#[derive(Debug)]
pub struct PipeWriter {
    shared: Arc<Shared>,
}

impl PipeWriter {
    /// 关闭写端
    ///
    /// `err` 为 `None` 时读端在读完缓冲区后得到 EOF，否则得到带原因的错误。
    pub fn close_with_error(&self, err: Option<&DumpError>) {
        let mut state = self.shared.lock();
        if state.write_closed.is_none() {
            tracing::debug!(error = ?err.map(ToString::to_string), "pipe writer closed");
            state.write_closed = Some(reason_of(err));
        }
        drop(state);
        self.shared.readable.notify_all();
    }
}

impl Write for PipeWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        let mut state = self.shared.lock();
        loop {
            if state.write_closed.is_some() {
                return Err(PipeClosed {
                    side: "writer",
                    reason: "write on closed writer".to_string(),
                }
                .into_io());
            }
            if let Some(closed) = &state.read_closed {
                let reason = match closed {
                    Closed::Clean => "reader closed".to_string(),
                    Closed::Error(reason) => reason.clone(),
                };
                return Err(PipeClosed {
                    side: "reader",
                    reason,
                }
                .into_io());
            }
            let free = state.capacity - state.buf.len();
            if free > 0 {
                let n = free.min(data.len());
                state.buf.extend(&data[..n]);
                drop(state);
                self.shared.readable.notify_one();
                return Ok(n);
            }
            state = self
                .shared
                .writable
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        if state.write_closed.is_none() {
            state.write_closed = Some(Closed::Error("writer dropped without close".to_string()));
        }
        drop(state);
        self.shared.readable.notify_all();
    }
}
