//! Integration tests for the child process launcher.

use std::io::{Read, Write};
use std::os::unix::process::ExitStatusExt;
use std::time::{Duration, Instant};

use netcp_integration_tests::test_helpers::{ci_timeout, random_bytes};
use netcp_process::{ProcessError, Redirection, Stream, Subprocess};

#[test]
fn test_stdin_payload_delivered() {
    let mut child = Subprocess::new(
        ["sh", "-c", "[ $(wc -c) -eq 65536 ]"],
        Redirection::Stdin,
    )
    .unwrap();
    child.exec().unwrap();

    let payload = random_bytes(64 * 1024);
    let mut stdin = child.take_stdin().unwrap();
    stdin.write_all(&payload).unwrap();
    drop(stdin);

    assert!(child.wait().unwrap().unwrap().success());
}

#[test]
fn test_large_output_drained() {
    // more than a pipe buffer's worth
    let mut child = Subprocess::new(
        ["sh", "-c", "head -c 200000 /dev/zero"],
        Redirection::Stdout,
    )
    .unwrap();
    child.exec().unwrap();

    let mut output = Vec::new();
    child.take_stdout().unwrap().read_to_end(&mut output).unwrap();
    assert_eq!(output.len(), 200_000);
    assert!(child.wait().unwrap().unwrap().success());
}

#[test]
fn test_exit_code_preserved() {
    let mut child = Subprocess::new(["sh", "-c", "exit 7"], Redirection::Stdout).unwrap();
    child.exec().unwrap();
    assert_eq!(child.wait().unwrap().unwrap().code(), Some(7));
}

#[test]
fn test_kill_reaches_process_group() {
    // the shell's own child would survive a plain kill of the shell
    let mut child = Subprocess::new(
        ["sh", "-c", "sleep 30; echo never"],
        Redirection::Stdout,
    )
    .unwrap();
    child.exec().unwrap();
    std::thread::sleep(Duration::from_millis(100));

    let started = Instant::now();
    child.kill().unwrap();
    assert_eq!(child.exit_status().unwrap().signal(), Some(libc::SIGKILL));

    // EOF arrives only once every holder of the write end is gone
    let mut output = String::new();
    child.take_stdout().unwrap().read_to_string(&mut output).unwrap();
    assert!(output.is_empty());
    assert!(started.elapsed() < ci_timeout(Duration::from_secs(5)));
}

#[test]
fn test_stream_mode_enforced() {
    let mut child = Subprocess::new(["true"], Redirection::Stdin).unwrap();
    assert!(matches!(
        child.take_stdout(),
        Err(ProcessError::StreamNotRedirected(Stream::Stdout))
    ));
    child.exec().unwrap();
    child.wait().unwrap();
}

#[test]
fn test_missing_program() {
    let mut child = Subprocess::new(["/nonexistent/netcp-test"], Redirection::Combined).unwrap();
    let err = child.exec().unwrap_err();
    assert_eq!(err.os_code(), Some(libc::ENOENT));
    assert!(child.wait().unwrap().is_none());
}
