//! 边导出边解析
//!
//! mysqldump 的输出经内存管道直接交给解析器，不落盘。
//! 生产者（子进程）在调用线程中运行，解析在作用域线程中并发运行，
//! 两侧的结果最终合并为一个。

use crate::dump::dumper::Dumper;
use crate::error::DumpError;
use crate::handler::{DumpParser, ParseHandler, ParseOptions};
use crate::pipe::pipe;
use std::io::BufReader;
use std::thread;

impl Dumper {
    /// 解析器应期待的内容，由配置推导
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            binlog_position_expected: self.config().binlog_position_expected(),
            gtid_expected: self.config().gtid_expected(),
        }
    }

    /// 导出并立即解析
    ///
    /// 调用线程会一直阻塞到子进程和解析都结束。
    ///
    /// # 返回
    ///
    /// * 进程侧出错时返回进程侧错误，即使解析侧也报错
    /// * 否则返回解析侧的结果
    ///
    /// 失败前已经投递给 `handler` 的事件不会撤回。
    ///
    /// # 示例
    ///
    /// ```no_run
    /// use mysqldump_stream::{DumpError, Dumper, ParseHandler, ParseOptions};
    /// use std::io::BufRead;
    ///
    /// struct RowCounter(usize);
    ///
    /// impl ParseHandler for RowCounter {
    ///     fn binlog(&mut self, _name: &str, _pos: u64) -> Result<(), DumpError> { Ok(()) }
    ///     fn gtid_set(&mut self, _gtid_set: &str) -> Result<(), DumpError> { Ok(()) }
    ///     fn data(&mut self, _schema: &str, _table: &str, _values: &[String]) -> Result<(), DumpError> {
    ///         self.0 += 1;
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let dumper = Dumper::new("mysqldump", "127.0.0.1:3306", "root", "")?;
    /// let mut parser = |reader: &mut dyn BufRead, handler: &mut dyn ParseHandler, _opts: ParseOptions| -> Result<(), DumpError> {
    ///     for line in reader.lines() {
    ///         let line = line.map_err(|e| DumpError::Parse(e.to_string()))?;
    ///         if line.starts_with("INSERT INTO") {
    ///             handler.data("", "", &[line])?;
    ///         }
    ///     }
    ///     Ok(())
    /// };
    /// let mut counter = RowCounter(0);
    /// dumper.dump_and_parse(&mut parser, &mut counter)?;
    /// println!("rows: {}", counter.0);
    /// # Ok::<(), DumpError>(())
    /// ```
    pub fn dump_and_parse<P, H>(&self, parser: &mut P, handler: &mut H) -> Result<(), DumpError>
    where
        P: DumpParser + Send + ?Sized,
        H: ParseHandler + Send + ?Sized,
    {
        // 配置错误直接返回，不启动解析
        self.invocation()?;

        let (reader, mut writer) = pipe(self.config().pipe_capacity);
        let options = self.parse_options();

        thread::scope(|s| {
            let consumer = s.spawn(move || {
                let mut handler = handler;
                let mut reader = BufReader::new(reader);
                let result = parser.parse(&mut reader, &mut handler, options);
                reader.get_ref().close_with_error(result.as_ref().err());
                result
            });

            let dumped = self.dump(&mut writer);
            writer.close_with_error(dumped.as_ref().err());

            let parsed = consumer
                .join()
                .unwrap_or_else(|_| Err(DumpError::Parse("parse task panicked".to_string())));

            merge_outcomes(dumped, parsed)
        })
    }
}

/// 合并两侧结果：进程侧错误优先
///
/// 进程侧看到 `StreamClosed` 说明解析先结束并关闭了读端，此时以解析结果为准。
pub(crate) fn merge_outcomes(
    dumped: Result<(), DumpError>,
    parsed: Result<(), DumpError>,
) -> Result<(), DumpError> {
    match dumped {
        Err(DumpError::StreamClosed(reason)) => {
            tracing::debug!(%reason, "consumer closed the stream first");
            parsed
        }
        Err(err) => {
            if let Err(parse_err) = &parsed {
                tracing::debug!(error = %parse_err, "parse error superseded by dump error");
            }
            Err(err)
        }
        Ok(()) => parsed,
    }
}
