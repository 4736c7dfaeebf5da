//! 集成测试公共工具
#![allow(dead_code)]

use mysqldump_stream::{DumpError, ParseHandler, ParseOptions};
use std::fs;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

/// 同一进程内串行化“写脚本 + 执行脚本”，避免 ETXTBSY
pub static SPAWN_LOCK: Mutex<()> = Mutex::new(());

/// 写一个可执行的 sh 脚本，用来代替 mysqldump
#[cfg(unix)]
pub fn fake_dump(dir: &TempDir, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join("mysqldump");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Binlog(String, u64),
    GtidSet(String),
    Data(String, String, Vec<String>),
}

/// 记录收到的所有事件
#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Vec<Event>,
}

impl ParseHandler for Recorder {
    fn binlog(&mut self, name: &str, pos: u64) -> Result<(), DumpError> {
        self.events.push(Event::Binlog(name.to_string(), pos));
        Ok(())
    }

    fn gtid_set(&mut self, gtid_set: &str) -> Result<(), DumpError> {
        self.events.push(Event::GtidSet(gtid_set.to_string()));
        Ok(())
    }

    fn data(&mut self, schema: &str, table: &str, values: &[String]) -> Result<(), DumpError> {
        self.events
            .push(Event::Data(schema.to_string(), table.to_string(), values.to_vec()));
        Ok(())
    }
}

fn between<'a>(line: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let rest = &line[line.find(start)? + start.len()..];
    Some(&rest[..rest.find(end)?])
}

/// 极简的逐行解析器，只识别测试里用到的几种语句
///
/// - 每条语句必须以 `;` 和换行结束
/// - 读取失败作为解析错误返回
pub fn line_parser(
    reader: &mut dyn BufRead,
    handler: &mut dyn ParseHandler,
    _options: ParseOptions,
) -> Result<(), DumpError> {
    let mut db = String::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| DumpError::Parse(format!("read failed: {e}")))?;
        if n == 0 {
            return Ok(());
        }
        if buf.last() != Some(&b'\n') {
            return Err(DumpError::Parse("unexpected EOF in statement".to_string()));
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if !line.ends_with(';') {
            return Err(DumpError::Parse(format!("unterminated statement: {line}")));
        }

        if line.starts_with("CHANGE MASTER TO") {
            let file = between(line, "MASTER_LOG_FILE='", "'")
                .ok_or_else(|| DumpError::Parse(line.to_string()))?;
            let pos = between(line, "MASTER_LOG_POS=", ";")
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| DumpError::Parse(line.to_string()))?;
            handler.binlog(file, pos)?;
        } else if line.starts_with("SET @@GLOBAL.GTID_PURGED=") {
            let set = between(line, "='", "'").ok_or_else(|| DumpError::Parse(line.to_string()))?;
            handler.gtid_set(set)?;
        } else if line.starts_with("USE ") {
            db = between(line, "`", "`")
                .ok_or_else(|| DumpError::Parse(line.to_string()))?
                .to_string();
        } else if line.starts_with("INSERT INTO ") {
            let table = between(line, "`", "`").ok_or_else(|| DumpError::Parse(line.to_string()))?;
            let values = between(line, "VALUES (", ");")
                .ok_or_else(|| DumpError::Parse(line.to_string()))?
                .split(',')
                .map(ToString::to_string)
                .collect::<Vec<_>>();
            handler.data(&db, table, &values)?;
        }
    }
}
