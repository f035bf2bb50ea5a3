//! Smoke tests for the cdnet binary
//!
//! These tests run the real executable and check what goes over the wire
//! (for `send`) or what comes out on stdout (for `listen`).

use std::io::{BufRead, BufReader, Write};
use std::net::UdpSocket;
use std::process::{Command, Output, Stdio};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use cdnet_protocol::{
    Buffer, Identifier, ParseOptions, SecurityLevel, StaticPasswords, Value, ValueList, parse,
};
use tempfile::NamedTempFile;

fn cdnet() -> Command {
    Command::new(env!("CARGO_BIN_EXE_cdnet"))
}

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn receiver() -> (UdpSocket, String) {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let addr = socket.local_addr().unwrap().to_string();
    (socket, addr)
}

fn recv_packet(socket: &UdpSocket) -> Vec<u8> {
    let mut buf = vec![0u8; 65536];
    let (n, _) = socket.recv_from(&mut buf).expect("no datagram received");
    buf.truncate(n);
    buf
}

fn run_send(config: &NamedTempFile, server: &str, extra: &[&str]) -> Output {
    cdnet()
        .arg("--config")
        .arg(config.path())
        .args(["send", "--server", server])
        .args(extra)
        .output()
        .unwrap()
}

#[test]
fn test_help_lists_commands() {
    let output = cdnet().arg("--help").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["send", "listen", "relay"] {
        assert!(stdout.contains(command), "missing {command} in help");
    }
}

#[test]
fn test_missing_config_file_fails() {
    let output = cdnet()
        .args(["--config", "/nonexistent/cdnet.toml", "send", "-p", "cpu", "-t", "percent"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("config file not found"));
}

#[test]
fn test_invalid_config_fails() {
    let config = config_file("[client]\nsecurity_level = \"sign\"\n");
    let (_socket, addr) = receiver();

    let output = run_send(&config, &addr, &["-p", "cpu", "-t", "percent", "--gauge", "1"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("username"));
}

#[test]
fn test_send_plain_value_list() {
    let config = config_file("");
    let (socket, addr) = receiver();

    let output = run_send(
        &config,
        &addr,
        &[
            "--host",
            "web-01",
            "--plugin",
            "load",
            "--type",
            "load",
            "--gauge",
            "0.5",
            "--gauge",
            "0.25",
            "--gauge",
            "-1",
        ],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let vls = parse(&recv_packet(&socket), &ParseOptions::new()).unwrap();
    assert_eq!(vls.len(), 1);
    assert_eq!(vls[0].identifier.to_string(), "web-01/load/load");
    assert_eq!(
        vls[0].values,
        vec![Value::Gauge(0.5), Value::Gauge(0.25), Value::Gauge(-1.0)]
    );
    assert_eq!(vls[0].interval, Duration::from_secs(10));
}

#[test]
fn test_send_encrypted_value_list() {
    let config = config_file(
        "[client]\nsecurity_level = \"encrypt\"\nusername = \"alice\"\npassword = \"secret\"\n",
    );
    let (socket, addr) = receiver();

    let output = run_send(
        &config,
        &addr,
        &["-p", "interface", "--plugin-instance", "eth0", "-t", "if_octets", "--derive", "7", "--derive", "9"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let opts = ParseOptions::new()
        .with_security_level(SecurityLevel::Encrypt)
        .with_password_lookup(Arc::new(StaticPasswords::new().with_user("alice", "secret")));
    let vls = parse(&recv_packet(&socket), &opts).unwrap();
    assert_eq!(vls.len(), 1);
    assert_eq!(vls[0].identifier.plugin_instance, "eth0");
    assert_eq!(vls[0].values, vec![Value::Derive(7), Value::Derive(9)]);
}

#[test]
fn test_send_without_values_fails() {
    let config = config_file("");
    let (_socket, addr) = receiver();

    let output = run_send(&config, &addr, &["-p", "cpu", "-t", "percent"]);

    assert!(!output.status.success());
}

#[test]
fn test_listen_prints_value_lists() {
    let port = UdpSocket::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let config = config_file("");

    let mut child = cdnet()
        .arg("--config")
        .arg(config.path())
        .args(["listen", "--address", "127.0.0.1", "--port", &port.to_string()])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let stdout = child.stdout.take().unwrap();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut line = String::new();
        if BufReader::new(stdout).read_line(&mut line).is_ok() {
            let _ = tx.send(line);
        }
    });

    let vl = ValueList::new(Identifier::new("h1", "cpu", "percent").with_type_instance("idle"))
        .with_values(vec![Value::Gauge(97.5)]);
    let buffer = Buffer::default();
    let sender = UdpSocket::bind("127.0.0.1:0").unwrap();

    // the listener may not be bound yet: resend until a line shows up
    let mut line = None;
    for _ in 0..50 {
        buffer.write(&vl).unwrap();
        sender
            .send_to(&buffer.bytes().unwrap(), ("127.0.0.1", port))
            .unwrap();
        if let Ok(received) = rx.recv_timeout(Duration::from_millis(100)) {
            line = Some(received);
            break;
        }
    }

    let _ = child.kill();
    let _ = child.wait();

    let line = line.expect("listen printed nothing");
    assert!(line.starts_with("h1/cpu/percent-idle "), "got {line:?}");
    assert!(line.contains("gauge=97.5"));
}
