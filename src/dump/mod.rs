//! Dump 模块 - 驱动 mysqldump
//!
//! 此模块包括:
//! - 参数构造（`Invocation`）
//! - 执行 mysqldump 并把输出写入任意写入器（`Dumper::dump`）
//! - 经内存管道边导出边解析（`Dumper::dump_and_parse`）

mod dumper;
pub mod invocation;
mod stream;

pub use dumper::Dumper;
pub use invocation::Invocation;
