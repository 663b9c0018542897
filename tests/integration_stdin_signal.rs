#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// The process exits with success on SIGTERM, even while stdin stays open.
#[tokio::test]
async fn test_stdin_command_exits_on_sigterm() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_stream-loader"))
        .args(["--disable-otel", "stdin", "--data-source", "D"])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .unwrap();
    // keep the pipe open for the whole test
    let mut stdin = child.stdin.take().unwrap();
    stdin.write_all(b"{\"RECORD_ID\":\"1\"}\n").await.unwrap();
    stdin.flush().await.unwrap();

    // let the signal handler be installed
    tokio::time::sleep(Duration::from_secs(2)).await;
    let pid = child.id().unwrap();
    let killed = Command::new("kill").args(["-TERM", &pid.to_string()]).status().await.unwrap();
    assert!(killed.success());

    let status = tokio::time::timeout(Duration::from_secs(10), child.wait())
        .await
        .expect("still running 10s after SIGTERM")
        .unwrap();
    assert!(status.success(), "{status:?}");
    drop(stdin);
}
