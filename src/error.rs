//! 错误类型定义
//!
//! 定义了构造参数、执行 mysqldump 以及流式解析过程中可能出现的所有错误类型。

use std::io;
use std::process::ExitStatus;
use thiserror::Error;

/// 导出错误类型
///
/// 一次 `dump` / `dump_and_parse` 调用只会返回一个错误：
/// 进程侧的错误优先于解析侧的错误。
#[derive(Debug, Error)]
pub enum DumpError {
    /// 地址缺少主机部分
    #[error("invalid address '{address}': missing host")]
    InvalidAddress {
        /// 原始地址
        address: String,
    },

    /// 找不到 mysqldump 可执行文件
    #[error("dump utility '{path}' not found: {reason}")]
    ExecutableNotFound {
        /// 传入的可执行文件路径或名称
        path: String,
        /// 查找失败的原因
        reason: String,
    },

    /// 子进程启动失败
    #[error("failed to start '{path}': {source}")]
    Spawn {
        /// 已解析的可执行文件路径
        path: String,
        /// 底层 IO 错误
        #[source]
        source: io::Error,
    },

    /// 子进程以非零状态退出
    #[error("dump process exited with {status}")]
    ProcessFailed {
        /// 进程退出状态
        status: ExitStatus,
    },

    /// 转发子进程输出失败
    #[error("failed to forward dump output: {0}")]
    Output(#[source] io::Error),

    /// 解析器无法识别字节流
    #[error("parse error: {0}")]
    Parse(String),

    /// 解析事件的接收方拒绝了事件
    #[error("handler error: {0}")]
    Handler(String),

    /// 管道另一端已关闭
    ///
    /// 仅在内部传递，`dump_and_parse` 不会直接返回该错误。
    #[error("stream closed: {0}")]
    StreamClosed(String),
}

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 配置错误，导出不会开始
    Config,
    /// 可执行文件解析失败
    Resolution,
    /// 子进程启动失败、异常退出或输出转发失败
    Process,
    /// 解析失败
    Parse,
    /// 管道关闭信号
    StreamClosed,
}

impl DumpError {
    /// 返回错误所属的分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            DumpError::InvalidAddress { .. } => ErrorKind::Config,
            DumpError::ExecutableNotFound { .. } => ErrorKind::Resolution,
            DumpError::Spawn { .. } | DumpError::ProcessFailed { .. } | DumpError::Output(_) => {
                ErrorKind::Process
            }
            DumpError::Parse(_) | DumpError::Handler(_) => ErrorKind::Parse,
            DumpError::StreamClosed(_) => ErrorKind::StreamClosed,
        }
    }

    /// 是否为进程侧错误
    pub fn is_process_error(&self) -> bool {
        self.kind() == ErrorKind::Process
    }

    /// 是否为解析侧错误
    pub fn is_parse_error(&self) -> bool {
        self.kind() == ErrorKind::Parse
    }
}
