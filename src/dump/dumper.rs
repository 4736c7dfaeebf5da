//! Dumper - 执行 mysqldump
//!
//! 在创建时解析一次可执行文件路径，之后可以按不同范围重复导出。

use crate::config::{DumpConfig, ErrorSink};
use crate::dump::invocation::Invocation;
use crate::error::DumpError;
use crate::pipe::PipeClosed;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, Command, ExitStatus, Stdio};
use std::thread;

/// mysqldump 驱动
///
/// 与直接调用 mysqldump 不同，`Dumper` 固定了便于解析和同步的输出格式。
#[derive(Debug)]
pub struct Dumper {
    execution_path: PathBuf,
    config: DumpConfig,
}

impl Dumper {
    /// 创建 Dumper
    ///
    /// # 参数
    ///
    /// * `execution_path` - mysqldump 的名称或路径，如 `mysqldump`、`/usr/bin/mysqldump`
    /// * `address` - `host[:port]`
    /// * `user` - 用户名
    /// * `password` - 密码
    ///
    /// # 返回
    ///
    /// * `Err(DumpError::ExecutableNotFound)` - 在 PATH 中找不到可执行文件
    ///
    /// # 示例
    ///
    /// ```no_run
    /// use mysqldump_stream::Dumper;
    ///
    /// let mut dumper = Dumper::new("mysqldump", "127.0.0.1:3306", "root", "")?;
    /// dumper.config_mut().add_tables("shop", ["orders"]);
    ///
    /// let mut out = Vec::new();
    /// dumper.dump(&mut out)?;
    /// # Ok::<(), mysqldump_stream::DumpError>(())
    /// ```
    pub fn new(
        execution_path: &str,
        address: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, DumpError> {
        Self::with_config(execution_path, DumpConfig::new(address, user, password))
    }

    /// 使用现成的配置创建 Dumper
    pub fn with_config(execution_path: &str, config: DumpConfig) -> Result<Self, DumpError> {
        let execution_path = resolve_executable(execution_path)?;
        tracing::debug!(path = %execution_path.display(), "resolved dump utility");
        Ok(Self {
            execution_path,
            config,
        })
    }

    pub fn execution_path(&self) -> &Path {
        &self.execution_path
    }

    pub fn config(&self) -> &DumpConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut DumpConfig {
        &mut self.config
    }

    /// 按当前配置构造 mysqldump 参数
    pub fn invocation(&self) -> Result<Invocation, DumpError> {
        Invocation::build(&self.config)
    }

    /// 执行 mysqldump，把输出写入 `w`
    ///
    /// 先写入前导内容，再把子进程 stdout 原样转发到 `w`，最后等待进程退出。
    /// `w` 写入失败时子进程会被终止。
    pub fn dump<W: Write + ?Sized>(&self, w: &mut W) -> Result<(), DumpError> {
        let invocation = self.invocation()?;

        w.write_all(&invocation.preamble).map_err(output_error)?;

        tracing::info!(
            path = %self.execution_path.display(),
            args = ?invocation.masked_args(),
            "exec mysqldump"
        );

        let child = Command::new(&self.execution_path)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(stderr_stdio(&self.config.err_out))
            .spawn()
            .map_err(|source| DumpError::Spawn {
                path: self.execution_path.display().to_string(),
                source,
            })?;
        let mut child = ChildGuard::new(child);
        let stdout = child.child.stdout.take();
        let stderr = child.child.stderr.take();

        thread::scope(|s| {
            let forwarder = stderr.map(|stderr| {
                let sink = &self.config.err_out;
                s.spawn(move || forward_stderr(stderr, sink))
            });

            let copied = match stdout {
                Some(mut stdout) => io::copy(&mut stdout, w).map_err(output_error),
                None => Ok(0),
            };
            if copied.is_err() {
                child.kill();
            }
            let status = child.wait();

            if let Some(forwarder) = forwarder {
                let _ = forwarder.join();
            }

            let bytes = copied?;
            let status = status.map_err(DumpError::Output)?;
            if !status.success() {
                tracing::warn!(%status, bytes, "mysqldump failed");
                return Err(DumpError::ProcessFailed { status });
            }
            tracing::debug!(bytes, "mysqldump finished");
            Ok(())
        })
    }
}

fn resolve_executable(path: &str) -> Result<PathBuf, DumpError> {
    if path.is_empty() {
        return Err(DumpError::ExecutableNotFound {
            path: String::new(),
            reason: "empty execution path".to_string(),
        });
    }
    which::which(path).map_err(|e| DumpError::ExecutableNotFound {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

/// 读端已关闭时转换为 `StreamClosed`，交给协调方处理
fn output_error(err: io::Error) -> DumpError {
    match PipeClosed::from_io(&err) {
        Some(closed) if closed.side == "reader" => DumpError::StreamClosed(closed.reason.clone()),
        _ => DumpError::Output(err),
    }
}

fn stderr_stdio(sink: &ErrorSink) -> Stdio {
    match sink {
        ErrorSink::Inherit => Stdio::inherit(),
        ErrorSink::Null => Stdio::null(),
        ErrorSink::Log | ErrorSink::Writer(_) => Stdio::piped(),
    }
}

fn forward_stderr(stderr: ChildStderr, sink: &ErrorSink) {
    match sink {
        ErrorSink::Log => {
            for line in BufReader::new(stderr).split(b'\n') {
                match line {
                    Ok(line) => {
                        tracing::warn!(target: "mysqldump", "{}", String::from_utf8_lossy(&line).trim_end())
                    }
                    Err(_) => break,
                }
            }
        }
        ErrorSink::Writer(writer) => {
            let mut stderr = stderr;
            let mut buf = [0u8; 8192];
            loop {
                let n = match stderr.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                let mut writer = writer.lock().unwrap_or_else(|e| e.into_inner());
                if writer.write_all(&buf[..n]).is_err() {
                    break;
                }
            }
        }
        ErrorSink::Inherit | ErrorSink::Null => {}
    }
}

/// 子进程守卫，未等待退出就被释放时终止并回收子进程
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    fn kill(&mut self) {
        let _ = self.child.kill();
    }

    fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait()?;
        self.reaped = true;
        Ok(status)
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
