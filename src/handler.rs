//! 解析边界
//!
//! mysqldump 文本格式的解析不在本 crate 内实现，这里只定义两侧的能力：
//! - [`DumpParser`]：从字节流中按顺序、惰性地解析出事件
//! - [`ParseHandler`]：接收解析出的事件
//!
//! 约定：定义表结构的语句先于该表的数据行到达；每条语句最多投递一次。

use crate::error::DumpError;
use std::io::BufRead;

/// 解析选项，由导出配置推导
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseOptions {
    /// 输出中应包含 binlog 位点
    pub binlog_position_expected: bool,
    /// 输出中应包含 GTID 集合
    pub gtid_expected: bool,
}

/// 解析事件接收方
///
/// 任一方法返回错误都会终止本次解析。
pub trait ParseHandler {
    /// 与快照一致的 binlog 位点
    fn binlog(&mut self, name: &str, pos: u64) -> Result<(), DumpError>;

    /// 与快照一致的 GTID 集合
    fn gtid_set(&mut self, gtid_set: &str) -> Result<(), DumpError>;

    /// 一行数据
    fn data(&mut self, schema: &str, table: &str, values: &[String]) -> Result<(), DumpError>;
}

impl<H: ParseHandler + ?Sized> ParseHandler for &mut H {
    fn binlog(&mut self, name: &str, pos: u64) -> Result<(), DumpError> {
        (**self).binlog(name, pos)
    }

    fn gtid_set(&mut self, gtid_set: &str) -> Result<(), DumpError> {
        (**self).gtid_set(gtid_set)
    }

    fn data(&mut self, schema: &str, table: &str, values: &[String]) -> Result<(), DumpError> {
        (**self).data(schema, table, values)
    }
}

/// 导出文本解析器
///
/// 实现方应逐行消费 `reader`，直到 EOF 或遇到格式错误。
/// 读取失败（例如生产者带错误关闭了管道）必须作为错误返回，不能当作正常结束。
pub trait DumpParser {
    fn parse(
        &mut self,
        reader: &mut dyn BufRead,
        handler: &mut dyn ParseHandler,
        options: ParseOptions,
    ) -> Result<(), DumpError>;
}

impl<F> DumpParser for F
where
    F: FnMut(&mut dyn BufRead, &mut dyn ParseHandler, ParseOptions) -> Result<(), DumpError>,
{
    fn parse(
        &mut self,
        reader: &mut dyn BufRead,
        handler: &mut dyn ParseHandler,
        options: ParseOptions,
    ) -> Result<(), DumpError> {
        self(reader, handler, options)
    }
}
