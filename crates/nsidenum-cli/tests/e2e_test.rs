//! End-to-end tests for the nsidenum CLI.
//!
//! These tests run the actual binary, either against argument combinations that
//! must be rejected before any network activity, or against a mock anycast DNS
//! server on localhost that answers with a different NSID per source port.

use hickory_proto::op::{Edns, Message, MessageType};
use hickory_proto::rr::rdata::opt::{EdnsCode, EdnsOption};
use hickory_proto::serialize::binary::BinEncodable;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

const LOCALHOST_TARGET: &str = "127.0.0.1";
const NUM_BACKENDS: u16 = 3;
const CLI_TIMEOUT: Duration = Duration::from_secs(60);

/// Results structure matching the JSON output.
#[derive(Debug, Deserialize)]
struct Results {
    destination: ResultDestination,
    query: ResultQuery,
    base_port: u16,
    paths: u8,
    timeout_ms: u64,
    identifiers: Vec<String>,
    stats: PathStats,
}

#[derive(Debug, Deserialize)]
struct ResultDestination {
    target: String,
    ip_address: IpAddr,
    port: u16,
}

#[derive(Debug, Deserialize)]
struct ResultQuery {
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    class: String,
}

#[derive(Debug, Deserialize)]
struct PathStats {
    total: u32,
    answered: u32,
    timeouts: u32,
    transport_failures: u32,
    malformed: u32,
}

// =============================================================================
// Binary and Server Helpers
// =============================================================================

/// Get the CLI binary path.
fn get_cli_binary() -> String {
    // Check EXECUTABLE environment variable first (set by CI)
    if let Ok(executable) = std::env::var("EXECUTABLE") {
        if std::path::Path::new(&executable).exists() {
            return executable;
        }
    }
    env!("CARGO_BIN_EXE_nsidenum").to_string()
}

/// Starts a mock anycast resolver. The backend is picked from the client's
/// source port, like an ECMP hash would.
fn start_mock_server() -> u16 {
    let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let port = socket.local_addr().unwrap().port();

    std::thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            let Ok((len, from)) = socket.recv_from(&mut buf) else {
                return;
            };
            let Ok(request) = Message::from_vec(&buf[..len]) else {
                continue;
            };
            let nsid = format!("backend-{}", from.port() % NUM_BACKENDS);
            let _ = socket.send_to(&build_response(&request, nsid.as_bytes()), from);
        }
    });

    port
}

fn build_response(request: &Message, nsid: &[u8]) -> Vec<u8> {
    let mut response = Message::new();
    response
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(request.op_code())
        .set_recursion_desired(request.recursion_desired());
    response.add_queries(request.queries().to_vec());

    let mut edns = Edns::new();
    edns.set_max_payload(1232);
    edns.options_mut()
        .insert(EdnsOption::Unknown(u16::from(EdnsCode::NSID), nsid.to_vec()));
    response.set_edns(edns);

    response.to_bytes().unwrap()
}

/// Finds `count` consecutive source ports that can currently be bound.
fn free_port_range(count: u16) -> u16 {
    for _ in 0..50 {
        let probe = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();
        let base = probe.local_addr().unwrap().port();
        drop(probe);
        if base as u32 + count as u32 > u16::MAX as u32 {
            continue;
        }
        let all_free =
            (base..base + count).all(|port| UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)).is_ok());
        if all_free {
            return base;
        }
    }
    panic!("no free range of {} source ports", count);
}

// =============================================================================
// CLI Runner
// =============================================================================

/// Run the CLI with the given arguments, killing it if it hangs.
fn run_cli(args: &[String]) -> Result<Output, String> {
    let binary = get_cli_binary();
    eprintln!("Running: {} {:?}", binary, args);

    let mut child = Command::new(&binary)
        .args(args)
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("Failed to spawn command: {}", e))?;

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) => {
                if start.elapsed() > CLI_TIMEOUT {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(format!("Process timed out after {:?}", CLI_TIMEOUT));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => return Err(format!("Error waiting for process: {}", e)),
        }
    }

    let output = child
        .wait_with_output()
        .map_err(|e| format!("Failed to collect output: {}", e))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.is_empty() {
        eprintln!("CLI stderr:\n{}", stderr);
    }
    Ok(output)
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn expect_failure(list: &[&str], message: &str) {
    let output = run_cli(&args(list)).unwrap();
    assert!(!output.status.success(), "{:?} should fail", list);
    assert!(output.stdout.is_empty(), "nothing should be printed on stdout");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains(message),
        "stderr should contain {:?}, got:\n{}",
        message,
        stderr
    );
}

/// Expected identifiers for a run of `paths` ports starting at `base`.
fn expected_backends(base: u16, paths: u16) -> Vec<String> {
    let mut ids: Vec<String> = (base..base + paths)
        .map(|port| format!("backend-{}", port % NUM_BACKENDS))
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

// =============================================================================
// Argument Validation Tests
// =============================================================================

#[test]
fn test_conflicting_families_rejected() {
    expect_failure(
        &[LOCALHOST_TARGET, "-4", "-6"],
        "Cannot force both IPv4 and IPv6",
    );
}

#[test]
fn test_source_port_overflow_rejected() {
    expect_failure(
        &[LOCALHOST_TARGET, "-s", "65500", "-p", "100"],
        "exceeds 65535",
    );
}

#[test]
fn test_invalid_query_type_rejected() {
    expect_failure(&[LOCALHOST_TARGET, "-t", "BOGUS"], "Invalid query type");
}

#[test]
fn test_invalid_timeout_rejected() {
    expect_failure(
        &[LOCALHOST_TARGET, "-T", "0"],
        "Timeout must be a number between 1 and 65535",
    );
}

#[test]
fn test_family_mismatch_rejected() {
    expect_failure(
        &[LOCALHOST_TARGET, "-6"],
        "does not match the requested family",
    );
}

// =============================================================================
// Enumeration Tests
// =============================================================================

#[test]
fn test_localhost_json() {
    let server_port = start_mock_server();
    let paths: u16 = 6;
    let base = free_port_range(paths);

    let output = run_cli(&args(&[
        LOCALHOST_TARGET,
        "--json",
        "-d",
        &server_port.to_string(),
        "-s",
        &base.to_string(),
        "-p",
        &paths.to_string(),
        "-T",
        "2000",
    ]))
    .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let results: Results = serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("Failed to parse JSON output: {}\nOutput: {}", e, stdout));

    assert_eq!(results.destination.target, LOCALHOST_TARGET);
    assert_eq!(
        results.destination.ip_address,
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    );
    assert_eq!(results.destination.port, server_port);
    assert_eq!(results.query.name, ".");
    assert_eq!(results.query.record_type, "A");
    assert_eq!(results.query.class, "IN");
    assert_eq!(results.base_port, base);
    assert_eq!(results.paths as u16, paths);
    assert_eq!(results.timeout_ms, 2000);

    assert_eq!(results.identifiers, expected_backends(base, paths));

    let stats = &results.stats;
    assert_eq!(stats.total, paths as u32);
    assert_eq!(stats.answered, paths as u32);
    assert_eq!(stats.timeouts, 0);
    assert_eq!(stats.transport_failures, 0);
    assert_eq!(stats.malformed, 0);
}

#[test]
fn test_localhost_quiet() {
    let server_port = start_mock_server();
    let paths: u16 = 4;
    let base = free_port_range(paths);

    let output = run_cli(&args(&[
        LOCALHOST_TARGET,
        "-q",
        "-d",
        &server_port.to_string(),
        "-s",
        &base.to_string(),
        "-p",
        &paths.to_string(),
    ]))
    .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<String> = stdout.lines().map(str::to_string).collect();
    assert_eq!(lines, expected_backends(base, paths));
}

#[test]
fn test_localhost_numbered() {
    let server_port = start_mock_server();
    let base = free_port_range(1);

    let output = run_cli(&args(&[
        LOCALHOST_TARGET,
        "--id-server",
        "-d",
        &server_port.to_string(),
        "-s",
        &base.to_string(),
    ]))
    .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let expected = format!("Found 1 server\n1) backend-{}\n", base % NUM_BACKENDS);
    assert!(stdout.starts_with(&expected), "unexpected output:\n{}", stdout);
    assert!(stdout.contains("Total DNS queries      : 1"));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--id-server overrides"));
}
