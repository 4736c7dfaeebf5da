//! 导出配置模块
//!
//! `DumpConfig` 描述一次（或多次）导出的目标与输出格式，
//! 并提供在两次导出之间调整范围与过滤条件的方法。

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 默认字符集
pub const DEFAULT_CHARSET: &str = "utf8";

/// 默认内存管道容量（字节）
pub const DEFAULT_PIPE_CAPACITY: usize = 64 * 1024;

/// 子进程 stderr 的去向
#[derive(Clone, Default)]
pub enum ErrorSink {
    /// 继承当前进程的 stderr
    #[default]
    Inherit,
    /// 丢弃
    Null,
    /// 按行转发到 `tracing`，target 为 `mysqldump`
    Log,
    /// 复制到任意写入器
    Writer(Arc<Mutex<dyn Write + Send>>),
}

impl ErrorSink {
    /// 用任意写入器构造
    pub fn writer<W: Write + Send + 'static>(w: W) -> Self {
        ErrorSink::Writer(Arc::new(Mutex::new(w)))
    }
}

impl fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSink::Inherit => f.write_str("Inherit"),
            ErrorSink::Null => f.write_str("Null"),
            ErrorSink::Log => f.write_str("Log"),
            ErrorSink::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

/// 按表导出的范围：一个数据库加若干张表
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TableScope {
    /// 数据库名
    pub database: String,
    /// 表名，按添加顺序
    pub tables: Vec<String>,
}

/// 导出配置
///
/// 除 `address`、`user`、`password` 外，其余字段都有合理的默认值。
/// 进行中的导出调用期间不要修改配置。
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DumpConfig {
    /// `host[:port]`，IPv6 地址使用 `[addr]:port`
    pub address: String,

    /// 用户名
    pub user: String,

    /// 密码
    pub password: String,

    /// 按表导出，设置后覆盖 `databases`
    pub table_scope: Option<TableScope>,

    /// 按库导出，仅在 `table_scope` 为空时生效
    pub databases: Vec<String>,

    /// 需要跳过的表：数据库名 -> 表名集合
    pub ignore_tables: BTreeMap<String, BTreeSet<String>>,

    /// 行过滤条件，对每张表生效
    pub where_clause: Option<String>,

    /// 字符集，空字符串表示不传该参数
    pub charset: String,

    /// `max_allowed_packet`，单位 MB，0 表示使用 mysqldump 默认值
    pub max_allowed_packet_mb: u32,

    /// 是否在输出中记录与快照一致的 binlog 位点
    pub capture_binlog_position: bool,

    /// binlog 位点是否包含 GTID，仅在 `capture_binlog_position` 为真时有意义
    pub gtid_enabled: bool,

    /// 二进制列是否以十六进制输出
    pub hex_blob: bool,

    /// 只导出表结构
    pub schema_only: bool,

    /// 内存管道容量（字节）
    pub pipe_capacity: usize,

    /// 子进程 stderr 的去向
    #[cfg_attr(feature = "serde", serde(skip))]
    pub err_out: ErrorSink,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            user: String::new(),
            password: String::new(),
            table_scope: None,
            databases: Vec::new(),
            ignore_tables: BTreeMap::new(),
            where_clause: None,
            charset: DEFAULT_CHARSET.to_string(),
            max_allowed_packet_mb: 0,
            capture_binlog_position: true,
            gtid_enabled: false,
            hex_blob: false,
            schema_only: false,
            pipe_capacity: DEFAULT_PIPE_CAPACITY,
            err_out: ErrorSink::Inherit,
        }
    }
}

impl DumpConfig {
    /// 用连接信息创建配置，其余字段取默认值
    pub fn new(address: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            user: user.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    pub fn set_charset(&mut self, charset: impl Into<String>) {
        self.charset = charset.into();
    }

    /// 设置行过滤条件，空字符串等同于清除
    pub fn set_where(&mut self, clause: impl Into<String>) {
        let clause = clause.into();
        self.where_clause = if clause.is_empty() { None } else { Some(clause) };
    }

    pub fn set_err_out(&mut self, sink: ErrorSink) {
        self.err_out = sink;
    }

    /// 部分云数据库没有 `--master-data` 所需的权限，此时关闭位点记录
    pub fn set_capture_binlog_position(&mut self, capture: bool) {
        self.capture_binlog_position = capture;
    }

    pub fn set_gtid_enabled(&mut self, enabled: bool) {
        self.gtid_enabled = enabled;
    }

    pub fn set_max_allowed_packet(&mut self, megabytes: u32) {
        self.max_allowed_packet_mb = megabytes;
    }

    pub fn set_hex_blob(&mut self, hex_blob: bool) {
        self.hex_blob = hex_blob;
    }

    pub fn set_schema_only(&mut self, schema_only: bool) {
        self.schema_only = schema_only;
    }

    /// 设置内存管道容量，最小为 1 字节
    pub fn set_pipe_capacity(&mut self, capacity: usize) {
        self.pipe_capacity = capacity.max(1);
    }

    /// 追加要导出的数据库
    pub fn add_databases<I, S>(&mut self, databases: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.databases.extend(databases.into_iter().map(Into::into));
    }

    /// 追加要导出的表
    ///
    /// 切换到另一个数据库时，之前累积的表列表会被清空。
    pub fn add_tables<I, S>(&mut self, database: &str, tables: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.table_scope.as_ref().is_none_or(|s| s.database != database) {
            self.table_scope = Some(TableScope {
                database: database.to_string(),
                tables: Vec::new(),
            });
        }
        if let Some(scope) = &mut self.table_scope {
            scope.tables.extend(tables.into_iter().map(Into::into));
        }
    }

    /// 追加要跳过的表，与导出范围无关，始终生效
    pub fn add_ignore_tables<I, S>(&mut self, database: &str, tables: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_tables
            .entry(database.to_string())
            .or_default()
            .extend(tables.into_iter().map(Into::into));
    }

    /// 清空导出范围、跳过列表和行过滤条件
    ///
    /// 连接信息与输出格式选项保持不变。
    pub fn reset(&mut self) {
        self.table_scope = None;
        self.databases.clear();
        self.ignore_tables.clear();
        self.where_clause = None;
    }

    /// 解析器是否应期待 binlog 位点
    pub fn binlog_position_expected(&self) -> bool {
        self.capture_binlog_position
    }

    /// 解析器是否应期待 GTID 集合
    pub fn gtid_expected(&self) -> bool {
        self.capture_binlog_position && self.gtid_enabled
    }
}
