//! 边导出边解析的端到端测试
//!
//! 用 sh 脚本代替 mysqldump，覆盖正常结束、进程失败、输出截断和解析器提前退出。
#![cfg(unix)]

mod common;

use common::{Event, Recorder, SPAWN_LOCK, fake_dump, line_parser};
use mysqldump_stream::{DumpError, Dumper, ErrorKind, ErrorSink, ParseHandler, ParseOptions};
use std::io::{BufRead, Read};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn dumper(dir: &TempDir, body: &str) -> Dumper {
    let path = fake_dump(dir, body);
    let mut dumper = Dumper::new(path.to_str().unwrap(), "127.0.0.1:3306", "root", "secret").unwrap();
    dumper.config_mut().set_err_out(ErrorSink::Null);
    dumper
}

#[test]
fn test_dump_writes_preamble_then_stdout() {
    let _guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let mut dumper = dumper(&dir, r#"for a in "$@"; do echo "$a"; done"#);
    dumper.config_mut().add_tables("shop", ["orders", "items"]);

    let mut out = Vec::new();
    dumper.dump(&mut out).unwrap();

    let text = String::from_utf8(out).unwrap();
    let mut expected = String::from("CREATE DATABASE IF NOT EXISTS `shop`;\nUSE `shop`;\n");
    for arg in dumper.invocation().unwrap().args {
        expected.push_str(&arg);
        expected.push('\n');
    }
    assert_eq!(text, expected);
}

#[test]
fn test_dump_and_parse_delivers_events_in_order() {
    let _guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let mut dumper = dumper(
        &dir,
        r#"cat <<'SQL'
CHANGE MASTER TO MASTER_LOG_FILE='mysql-bin.000003', MASTER_LOG_POS=154;
CREATE TABLE `orders` (`id` int, `name` varchar(10));
INSERT INTO `orders` VALUES (1,'a');
INSERT INTO `orders` VALUES (2,'b');
SQL"#,
    );
    dumper.config_mut().add_tables("shop", ["orders"]);

    let mut recorder = Recorder::default();
    let mut parser = line_parser;
    dumper.dump_and_parse(&mut parser, &mut recorder).unwrap();

    assert_eq!(
        recorder.events,
        vec![
            Event::Binlog("mysql-bin.000003".to_string(), 154),
            Event::Data("shop".to_string(), "orders".to_string(), vec!["1".to_string(), "'a'".to_string()]),
            Event::Data("shop".to_string(), "orders".to_string(), vec!["2".to_string(), "'b'".to_string()]),
        ]
    );
}

#[test]
fn test_large_output_flows_through_small_pipe() {
    let _guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let mut dumper = dumper(
        &dir,
        r#"i=0
while [ $i -lt 2000 ]; do
  echo "INSERT INTO \`t\` VALUES ($i);"
  i=$((i+1))
done"#,
    );
    dumper.config_mut().set_pipe_capacity(16);

    let mut recorder = Recorder::default();
    let mut parser = line_parser;
    dumper.dump_and_parse(&mut parser, &mut recorder).unwrap();

    assert_eq!(recorder.events.len(), 2000);
    for (i, event) in recorder.events.iter().enumerate() {
        assert_eq!(event, &Event::Data(String::new(), "t".to_string(), vec![i.to_string()]));
    }
}

#[test]
fn test_process_failure_before_output() {
    let _guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let mut dumper = dumper(&dir, "echo 'Access denied for user' >&2\nexit 2");
    let stderr = Arc::new(Mutex::new(Vec::<u8>::new()));
    dumper.config_mut().set_err_out(ErrorSink::Writer(stderr.clone()));

    let mut seen = None;
    let mut parser = |reader: &mut dyn BufRead,
                      _handler: &mut dyn ParseHandler,
                      _options: ParseOptions|
     -> Result<(), DumpError> {
        let mut buf = Vec::new();
        let result = reader.read_to_end(&mut buf);
        seen = Some(result.map_err(|e| e.kind()));
        Err(DumpError::Parse("stream failed".to_string()))
    };
    let mut recorder = Recorder::default();
    let err = dumper.dump_and_parse(&mut parser, &mut recorder).unwrap_err();

    assert!(matches!(err, DumpError::ProcessFailed { status } if status.code() == Some(2)));
    assert_eq!(err.kind(), ErrorKind::Process);
    // 读端看到的是错误，而不是 EOF
    assert_eq!(seen, Some(Err(std::io::ErrorKind::BrokenPipe)));
    let stderr = String::from_utf8(stderr.lock().unwrap().clone()).unwrap();
    assert!(stderr.contains("Access denied"));
}

#[test]
fn test_process_failure_mid_stream_keeps_delivered_prefix() {
    let _guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let dumper = dumper(&dir, "echo 'INSERT INTO `t` VALUES (1);'\nexit 3");

    let mut recorder = Recorder::default();
    let mut parser = line_parser;
    let err = dumper.dump_and_parse(&mut parser, &mut recorder).unwrap_err();

    assert!(err.is_process_error(), "{err}");
    assert_eq!(
        recorder.events,
        vec![Event::Data(String::new(), "t".to_string(), vec!["1".to_string()])]
    );
}

#[test]
fn test_truncated_stream_with_clean_exit_is_parse_error() {
    let _guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let dumper = dumper(&dir, "printf 'INSERT INTO `t` VALUES (1,'");

    let mut recorder = Recorder::default();
    let mut parser = line_parser;
    let err = dumper.dump_and_parse(&mut parser, &mut recorder).unwrap_err();

    assert!(matches!(&err, DumpError::Parse(msg) if msg.contains("unexpected EOF")), "{err}");
    assert!(recorder.events.is_empty());
}

#[test]
fn test_parser_failure_stops_endless_producer() {
    let _guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let dumper = dumper(&dir, "while true; do echo 'not a statement'; done");

    let mut recorder = Recorder::default();
    let mut parser = line_parser;
    let err = dumper.dump_and_parse(&mut parser, &mut recorder).unwrap_err();

    assert!(matches!(&err, DumpError::Parse(msg) if msg.contains("unterminated")), "{err}");
}

#[test]
fn test_handler_error_is_returned() {
    struct Reject;

    impl ParseHandler for Reject {
        fn binlog(&mut self, _name: &str, _pos: u64) -> Result<(), DumpError> {
            Ok(())
        }

        fn gtid_set(&mut self, _gtid_set: &str) -> Result<(), DumpError> {
            Ok(())
        }

        fn data(&mut self, _schema: &str, table: &str, _values: &[String]) -> Result<(), DumpError> {
            Err(DumpError::Handler(format!("unexpected table {table}")))
        }
    }

    let _guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let dumper = dumper(&dir, "echo 'INSERT INTO `t` VALUES (1);'");

    let mut parser = line_parser;
    let err = dumper.dump_and_parse(&mut parser, &mut Reject).unwrap_err();
    assert!(matches!(&err, DumpError::Handler(msg) if msg == "unexpected table t"));
}

#[test]
fn test_parse_options_follow_config() {
    let _guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let mut dumper = dumper(&dir, "exit 0");
    dumper.config_mut().set_gtid_enabled(true);

    let mut seen = Vec::new();
    let mut parser = |_reader: &mut dyn BufRead,
                      _handler: &mut dyn ParseHandler,
                      options: ParseOptions|
     -> Result<(), DumpError> {
        seen.push(options);
        Ok(())
    };
    let mut recorder = Recorder::default();
    dumper.dump_and_parse(&mut parser, &mut recorder).unwrap();

    dumper.config_mut().set_capture_binlog_position(false);
    dumper.dump_and_parse(&mut parser, &mut recorder).unwrap();

    assert_eq!(
        seen,
        vec![
            ParseOptions {
                binlog_position_expected: true,
                gtid_expected: true,
            },
            ParseOptions {
                binlog_position_expected: false,
                gtid_expected: false,
            },
        ]
    );
}

#[test]
fn test_invalid_address_never_starts_dump() {
    let _guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("started");
    let mut dumper = dumper(&dir, &format!("touch {}", marker.display()));
    dumper.config_mut().address = ":3306".to_string();

    let mut called = false;
    let mut parser = |_reader: &mut dyn BufRead,
                      _handler: &mut dyn ParseHandler,
                      _options: ParseOptions|
     -> Result<(), DumpError> {
        called = true;
        Ok(())
    };
    let mut recorder = Recorder::default();
    let err = dumper.dump_and_parse(&mut parser, &mut recorder).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(!called);
    assert!(!marker.exists());
}

#[test]
fn test_stderr_forwarded_to_log_sink() {
    let _guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let mut dumper = dumper(&dir, "echo 'Warning: using a password' >&2\necho 'INSERT INTO `t` VALUES (1);'");
    dumper.config_mut().set_err_out(ErrorSink::Log);

    let mut recorder = Recorder::default();
    let mut parser = line_parser;
    dumper.dump_and_parse(&mut parser, &mut recorder).unwrap();
    assert_eq!(recorder.events.len(), 1);
}
