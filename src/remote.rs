// enveye is a tool for comparing application environment snapshots
// Copyright (C) 2025  Peoples Grocers LLC
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//
// To purchase a license under different terms contact admin@peoplesgrocers.com
// To request changes, report bugs, or give user feedback contact
// marxism@peoplesgrocers.com
//

//! Running a command on many remote hosts at once.
//!
//! The transport is abstract. [`CommandTransport`] shells out through a
//! template, by default PowerShell remoting (`Invoke-Command -ComputerName`),
//! so anything that can reach a host from the command line works.
//! [`dispatch`] runs one worker thread per host and never waits longer than
//! the per-host timeout for any of them.

use crate::diagnostics::{Diagnostic, DiagnosticCode};
use serde::Serialize;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_TEMPLATE: &str = "powershell -NoProfile -NonInteractive -Command \"Invoke-Command -ComputerName {host} -ScriptBlock { {command} }\"";

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const READER_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteOutcome {
    pub host: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration_ms: u64,
}

impl RemoteOutcome {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// A diagnostic for anything other than a clean exit.
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        if self.timed_out {
            return Some(
                Diagnostic::warning(
                    DiagnosticCode::RemoteTimeout,
                    format!(
                        "{} did not finish within {} ms, so I stopped waiting for it.",
                        self.host, self.duration_ms
                    ),
                )
                .with_advice("Raise --timeout if the host is slow but reachable.".to_string()),
            );
        }

        if self.exit_code != Some(0) {
            let status = match self.exit_code {
                Some(code) => format!("exit code {}", code),
                None => "no exit code".to_string(),
            };
            let mut diagnostic = Diagnostic::fatal(
                DiagnosticCode::RemoteCommandFailed,
                format!("The command on {} failed with {}.", self.host, status),
            );
            let stderr = self.stderr.trim();
            if !stderr.is_empty() {
                diagnostic = diagnostic.with_snippet(stderr.to_string());
            }
            return Some(diagnostic);
        }

        None
    }
}

pub trait RemoteTransport: Sync {
    fn run(&self, host: &str, command: &str, timeout: Duration) -> Result<RemoteOutcome, Diagnostic>;
}

pub type HostResult = Result<RemoteOutcome, Diagnostic>;

/// Runs `command` on every host concurrently. Results come back in the order
/// of `hosts`.
pub fn dispatch(
    hosts: &[String],
    command: &str,
    transport: &dyn RemoteTransport,
    timeout: Duration,
) -> Result<Vec<HostResult>, Diagnostic> {
    if hosts.is_empty() {
        return Err(Diagnostic::fatal(
            DiagnosticCode::NoRemoteHosts,
            "I need at least one host to run the command on, but you didn't provide any."
                .to_string(),
        )
        .with_advice("Usage: enveye remote <host> [<host> ...] --command <command>".to_string()));
    }

    for host in hosts {
        validate_host(host)?;
    }

    let results: Vec<HostResult> = thread::scope(|scope| {
        let workers: Vec<_> = hosts
            .iter()
            .map(|host| {
                scope.spawn(move || {
                    tracing::debug!(host = %host, "remote command started");
                    let result = transport.run(host, command, timeout);
                    match &result {
                        Ok(outcome) => tracing::info!(
                            host = %host,
                            exit_code = ?outcome.exit_code,
                            timed_out = outcome.timed_out,
                            duration_ms = outcome.duration_ms,
                            "remote command finished"
                        ),
                        Err(diagnostic) => tracing::warn!(
                            host = %host,
                            error = %diagnostic.description,
                            "remote command could not run"
                        ),
                    }
                    result
                })
            })
            .collect();

        workers
            .into_iter()
            .zip(hosts)
            .map(|(worker, host)| {
                worker.join().unwrap_or_else(|_| {
                    Err(Diagnostic::fatal(
                        DiagnosticCode::RemoteCommandFailed,
                        format!("The worker for {} stopped unexpectedly.", host),
                    ))
                })
            })
            .collect()
    });

    Ok(results)
}

fn validate_host(host: &str) -> Result<(), Diagnostic> {
    let valid = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':'));
    if valid {
        Ok(())
    } else {
        Err(Diagnostic::fatal(
            DiagnosticCode::InvalidFlag,
            format!("'{}' is not a host name I can pass to the remote transport.", host),
        )
        .with_advice(
            "Host names may contain letters, digits, '.', '-', '_' and ':'.".to_string(),
        ))
    }
}

/// Spawns a local command built from a template with `{host}` and `{command}`
/// placeholders.
pub struct CommandTransport {
    template: Vec<String>,
}

impl CommandTransport {
    pub fn new(template: &str) -> Result<Self, Diagnostic> {
        let args = shell_words::split(template).map_err(|e| {
            Diagnostic::fatal(
                DiagnosticCode::InvalidFlag,
                format!("I couldn't parse the remote command template '{}': {}", template, e),
            )
        })?;

        if args.is_empty() {
            return Err(Diagnostic::fatal(
                DiagnosticCode::InvalidFlag,
                "The remote command template is empty.".to_string(),
            ));
        }

        Ok(Self { template: args })
    }

    /// Placeholders are filled per argument after splitting, so a command
    /// with spaces or quotes stays a single argument.
    pub fn argv(&self, host: &str, command: &str) -> Vec<String> {
        self.template
            .iter()
            .map(|arg| arg.replace("{host}", host).replace("{command}", command))
            .collect()
    }
}

impl RemoteTransport for CommandTransport {
    fn run(&self, host: &str, command: &str, timeout: Duration) -> Result<RemoteOutcome, Diagnostic> {
        let argv = self.argv(host, command);
        let start = Instant::now();

        let mut child = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Diagnostic::fatal(
                    DiagnosticCode::RemoteCommandFailed,
                    format!("I couldn't start '{}' for {}: {}", argv[0], host, e),
                )
            })?;

        // Drain both pipes while waiting so a chatty command cannot block on a
        // full pipe.
        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let wait_error = |e: std::io::Error| {
            Diagnostic::fatal(
                DiagnosticCode::RemoteCommandFailed,
                format!("I lost track of the command for {}: {}", host, e),
            )
        };

        let mut timed_out = false;
        let status = loop {
            if let Some(status) = child.try_wait().map_err(wait_error)? {
                break status;
            }
            if start.elapsed() > timeout {
                timed_out = true;
                break kill_and_reap(&mut child).map_err(wait_error)?;
            }
            thread::sleep(POLL_INTERVAL);
        };

        // A killed command may leave grandchildren holding the pipes open.
        // After a timeout the readers get a short grace period; a reader still
        // blocked after that is detached and its output dropped.
        let (stdout, stderr) = if timed_out {
            let deadline = Instant::now() + READER_GRACE;
            (
                join_before(stdout_reader, deadline),
                join_before(stderr_reader, deadline),
            )
        } else {
            (
                stdout_reader.join().unwrap_or_default(),
                stderr_reader.join().unwrap_or_default(),
            )
        };

        Ok(RemoteOutcome {
            host: host.to_string(),
            exit_code: if timed_out { None } else { status.code() },
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            timed_out,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

fn kill_and_reap(child: &mut Child) -> std::io::Result<std::process::ExitStatus> {
    let _ = child.kill();
    child.wait()
}

fn join_before(reader: thread::JoinHandle<Vec<u8>>, deadline: Instant) -> Vec<u8> {
    while !reader.is_finished() {
        if Instant::now() >= deadline {
            return Vec::new();
        }
        thread::sleep(POLL_INTERVAL);
    }
    reader.join().unwrap_or_default()
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SleepyTransport {
        calls: AtomicUsize,
    }

    impl RemoteTransport for SleepyTransport {
        fn run(&self, host: &str, command: &str, _timeout: Duration) -> Result<RemoteOutcome, Diagnostic> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if host == "unreachable" {
                return Err(Diagnostic::fatal(
                    DiagnosticCode::RemoteCommandFailed,
                    "no route".to_string(),
                ));
            }
            // Later hosts finish first.
            let delay = match host {
                "web01" => 150,
                "web02" => 75,
                _ => 0,
            };
            thread::sleep(Duration::from_millis(delay));
            Ok(RemoteOutcome {
                host: host.to_string(),
                exit_code: Some(0),
                stdout: format!("{} ran {}", host, command),
                stderr: String::new(),
                timed_out: false,
                duration_ms: delay,
            })
        }
    }

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_results_follow_host_order() {
        let transport = SleepyTransport {
            calls: AtomicUsize::new(0),
        };
        let results = dispatch(
            &hosts(&["web01", "web02", "db01"]),
            "collect",
            &transport,
            Duration::from_secs(5),
        )
        .unwrap();

        let order: Vec<String> = results
            .iter()
            .map(|r| r.as_ref().unwrap().host.clone())
            .collect();
        assert_eq!(order, vec!["web01", "web02", "db01"]);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(results[0].as_ref().unwrap().stdout, "web01 ran collect");
    }

    #[test]
    fn test_hosts_run_concurrently() {
        let transport = SleepyTransport {
            calls: AtomicUsize::new(0),
        };
        let start = Instant::now();
        dispatch(
            &hosts(&["web01", "web01", "web01", "web01"]),
            "collect",
            &transport,
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(start.elapsed() < Duration::from_millis(550));
    }

    #[test]
    fn test_one_failing_host_does_not_stop_others() {
        let transport = SleepyTransport {
            calls: AtomicUsize::new(0),
        };
        let results = dispatch(
            &hosts(&["unreachable", "db01"]),
            "collect",
            &transport,
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(results[0].is_err());
        assert!(results[1].as_ref().unwrap().succeeded());
    }

    #[test]
    fn test_no_hosts() {
        let transport = SleepyTransport {
            calls: AtomicUsize::new(0),
        };
        let err = dispatch(&[], "collect", &transport, Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::NoRemoteHosts);
    }

    #[test]
    fn test_rejects_suspicious_host() {
        let transport = SleepyTransport {
            calls: AtomicUsize::new(0),
        };
        let err = dispatch(
            &hosts(&["web01; Remove-Item C:\\"]),
            "collect",
            &transport,
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert_eq!(err.code, DiagnosticCode::InvalidFlag);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_template_substitution_keeps_arguments_whole() {
        let transport = CommandTransport::new(DEFAULT_TEMPLATE).unwrap();
        let argv = transport.argv("web01", "enveye collect 'C:\\Program Files\\App' --app-type web");
        assert_eq!(argv[0], "powershell");
        assert_eq!(argv.len(), 5);
        assert_eq!(
            argv[4],
            "Invoke-Command -ComputerName web01 -ScriptBlock { enveye collect 'C:\\Program Files\\App' --app-type web }"
        );
    }

    #[test]
    fn test_outcome_diagnostics() {
        let mut outcome = RemoteOutcome {
            host: "web01".to_string(),
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            timed_out: false,
            duration_ms: 10,
        };
        assert!(outcome.diagnostic().is_none());

        outcome.exit_code = Some(2);
        outcome.stderr = "Access is denied.".to_string();
        let diagnostic = outcome.diagnostic().unwrap();
        assert!(diagnostic.is_fatal());
        assert_eq!(diagnostic.code_snippet.as_deref(), Some("Access is denied."));

        outcome.timed_out = true;
        let diagnostic = outcome.diagnostic().unwrap();
        assert_eq!(diagnostic.code, DiagnosticCode::RemoteTimeout);
        assert!(!diagnostic.is_fatal());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_transport_captures_output() {
        let transport = CommandTransport::new("sh -c {command}").unwrap();
        let outcome = transport
            .run("localhost", "echo out; echo err >&2; exit 4", Duration::from_secs(5))
            .unwrap();
        assert_eq!(outcome.exit_code, Some(4));
        assert_eq!(outcome.stdout, "out\n");
        assert_eq!(outcome.stderr, "err\n");
        assert!(!outcome.succeeded());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_transport_times_out() {
        let transport = CommandTransport::new("sh -c {command}").unwrap();
        let start = Instant::now();
        let outcome = transport
            .run("localhost", "sleep 5", Duration::from_millis(200))
            .unwrap();
        assert!(outcome.timed_out);
        assert_eq!(outcome.exit_code, None);
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_timed_out_command_keeps_partial_output() {
        let transport = CommandTransport::new("sh -c {command}").unwrap();
        let outcome = transport
            .run("localhost", "echo partial; exec sleep 5", Duration::from_millis(300))
            .unwrap();
        assert!(outcome.timed_out);
        assert_eq!(outcome.stdout, "partial\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_orphaned_pipe_does_not_block_timeout() {
        // The backgrounded sleep outlives sh and keeps stdout open.
        let transport = CommandTransport::new("sh -c {command}").unwrap();
        let start = Instant::now();
        let outcome = transport
            .run("localhost", "sleep 5 & echo started; wait", Duration::from_millis(200))
            .unwrap();
        assert!(outcome.timed_out);
        assert!(outcome.stdout.is_empty());
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_transport_large_output() {
        let transport = CommandTransport::new("sh -c {command}").unwrap();
        let outcome = transport
            .run("localhost", "head -c 300000 /dev/zero | tr '\\0' x", Duration::from_secs(10))
            .unwrap();
        assert!(outcome.succeeded());
        assert_eq!(outcome.stdout.len(), 300000);
    }
}
