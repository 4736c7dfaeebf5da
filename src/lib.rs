//! # mysqldump-stream
//!
//! 驱动 mysqldump 生成一致性快照，并把输出通过内存管道流式交给解析器，
//! 整个导出不会写到磁盘上。
//!
//! ## 功能特性
//!
//! - **一致性快照**: 固定使用单事务、不锁表的参数，可选记录 binlog 位点与 GTID
//! - **便于解析的输出**: 紧凑格式、每条 INSERT 一行，解析器可以逐行处理
//! - **有界内存**: 生产者与解析器之间是有界管道，解析慢时 mysqldump 会被阻塞
//! - **错误不丢失**: 进程异常退出时解析器读到的是错误而不是 EOF，截断的输出不会被当作完整结果
//!
//! ## 快速开始
//!
//! ### 导出到任意写入器
//!
//! ```rust,no_run
//! use mysqldump_stream::Dumper;
//! use std::fs::File;
//!
//! let mut dumper = Dumper::new("mysqldump", "127.0.0.1:3306", "root", "secret")?;
//! dumper.config_mut().add_databases(["shop"]);
//! dumper.config_mut().add_ignore_tables("shop", ["audit_log"]);
//!
//! let mut file = File::create("shop.sql").map_err(mysqldump_stream::DumpError::Output)?;
//! dumper.dump(&mut file)?;
//! # Ok::<(), mysqldump_stream::DumpError>(())
//! ```
//!
//! ### 查看参数
//!
//! ```rust
//! use mysqldump_stream::{DumpConfig, Invocation};
//!
//! let mut config = DumpConfig::new("127.0.0.1:3306", "root", "");
//! config.add_tables("shop", ["orders"]);
//!
//! let invocation = Invocation::build(&config).unwrap();
//! assert!(invocation.args.ends_with(&["shop".to_string(), "orders".to_string()]));
//! assert!(invocation.preamble.starts_with(b"CREATE DATABASE IF NOT EXISTS `shop`;"));
//! ```
//!
//! 边导出边解析见 [`Dumper::dump_and_parse`]。

pub mod config;
pub mod dump;
pub mod error;
pub mod handler;
pub mod pipe;

pub use config::{DEFAULT_CHARSET, DEFAULT_PIPE_CAPACITY, DumpConfig, ErrorSink, TableScope};
pub use dump::{Dumper, Invocation};
pub use error::{DumpError, ErrorKind};
pub use handler::{DumpParser, ParseHandler, ParseOptions};
pub use pipe::{PipeClosed, PipeReader, PipeWriter, pipe};
