//! mysqldump 参数构造
//!
//! 同一份配置总是得到同一组参数。输出格式被固定为便于流式解析的形态：
//! 单事务快照、不锁表、紧凑输出、每条 INSERT 只含一行。

use crate::config::DumpConfig;
use crate::error::DumpError;

/// 一次 mysqldump 调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// 按顺序排列的命令行参数
    pub args: Vec<String>,
    /// 写在 mysqldump 输出之前的内容
    ///
    /// 按表导出时 mysqldump 不输出库名，这里补上 `CREATE DATABASE` / `USE`。
    pub preamble: Vec<u8>,
}

impl Invocation {
    /// 根据配置构造参数
    ///
    /// # 返回
    ///
    /// * `Ok(Invocation)` - 参数与前导内容
    /// * `Err(DumpError::InvalidAddress)` - 地址缺少主机部分
    pub fn build(config: &DumpConfig) -> Result<Self, DumpError> {
        let mut args = Vec::with_capacity(24);
        let mut preamble = Vec::new();

        let (host, port) = split_address(&config.address)?;
        args.push(format!("--host={host}"));
        if let Some(port) = port {
            args.push(format!("--port={port}"));
        }

        args.push(format!("--user={}", config.user));
        args.push(format!("--password={}", config.password));

        if config.capture_binlog_position {
            args.push("--master-data".to_string());
            if config.gtid_enabled {
                args.push("--set-gtid-purged=ON".to_string());
            }
        }

        if config.schema_only {
            args.push("--no-data".to_string());
        }

        if config.max_allowed_packet_mb > 0 {
            // mysqldump 只认 --max-allowed-packet，不认 --max_allowed_packet
            args.push(format!("--max-allowed-packet={}M", config.max_allowed_packet_mb));
        }

        args.push("--single-transaction".to_string());
        args.push("--skip-lock-tables".to_string());

        args.push("--compact".to_string());
        args.push("--skip-opt".to_string());
        args.push("--quick".to_string());

        // 每条 INSERT 一行
        args.push("--skip-extended-insert".to_string());

        if config.hex_blob {
            args.push("--hex-blob".to_string());
        }

        for (db, tables) in &config.ignore_tables {
            for table in tables {
                args.push(format!("--ignore-table={db}.{table}"));
            }
        }

        if !config.charset.is_empty() {
            args.push(format!("--default-character-set={}", config.charset));
        }

        if let Some(clause) = config.where_clause.as_deref().filter(|c| !c.is_empty()) {
            args.push(format!("--where={clause}"));
        }

        match &config.table_scope {
            Some(scope) if !scope.tables.is_empty() => {
                args.push(scope.database.clone());
                args.extend(scope.tables.iter().cloned());

                preamble.extend_from_slice(
                    format!("CREATE DATABASE IF NOT EXISTS `{}`;\n", scope.database).as_bytes(),
                );
                preamble.extend_from_slice(format!("USE `{}`;\n", scope.database).as_bytes());
            }
            _ if !config.databases.is_empty() => {
                args.push("--databases".to_string());
                args.extend(config.databases.iter().cloned());
            }
            _ => args.push("--all-databases".to_string()),
        }

        Ok(Self { args, preamble })
    }

    /// 用于日志输出的参数，密码替换为 `***`
    pub fn masked_args(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                if arg.starts_with("--password=") {
                    "--password=***".to_string()
                } else {
                    arg.clone()
                }
            })
            .collect()
    }
}

/// 拆分 `host[:port]`
///
/// 支持 `[::1]:3306` 形式的 IPv6 地址；端口部分为空时视为未指定。
pub(crate) fn split_address(address: &str) -> Result<(&str, Option<&str>), DumpError> {
    let invalid = || DumpError::InvalidAddress {
        address: address.to_string(),
    };

    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let (host, rest) = rest.split_once(']').ok_or_else(invalid)?;
        match rest {
            "" => (host, None),
            _ => (host, Some(rest.strip_prefix(':').ok_or_else(invalid)?)),
        }
    } else {
        match address.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (address, None),
        }
    };

    if host.trim().is_empty() {
        return Err(invalid());
    }
    Ok((host, port.filter(|p| !p.is_empty())))
}
