//! Optional pre-build SQL assertion, run as a subprocess with a time budget.

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::CapbookError;
use crate::spec::SpecAssertionCommand;

const N_POLL_INTERVAL_MS: u64 = 50;
const N_STDERR_TAIL_CHARS: usize = 400;

/// Run the assertion command to completion or until its budget expires.
///
/// A process still running at the deadline is killed and reported as
/// [`CapbookError::AssertionTimeout`].
pub fn run_assertion(command: &SpecAssertionCommand) -> Result<(), CapbookError> {
    if command.program.trim().is_empty() {
        return Err(CapbookError::InvalidOption {
            option: "assertion.program".to_string(),
            message: "program must not be empty".to_string(),
        });
    }

    let mut child = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| CapbookError::AssertionFailed {
            program: command.program.clone(),
            code: None,
            stderr_tail: format!("failed to spawn: {err}"),
        })?;

    // Drain stderr off-thread so a chatty process never blocks on a full pipe.
    let handle_stderr = child.stderr.take().map(|mut stderr| {
        thread::spawn(move || {
            let mut c_buf = String::new();
            let _ = stderr.read_to_string(&mut c_buf);
            c_buf
        })
    });

    let t_start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if t_start.elapsed() >= command.timeout => {
                let _ = child.kill();
                let _ = child.wait();
                warn!(program = %command.program, "assertion timed out");
                return Err(CapbookError::AssertionTimeout {
                    program: command.program.clone(),
                    timeout_secs: command.timeout.as_secs_f64(),
                });
            }
            Ok(None) => thread::sleep(Duration::from_millis(N_POLL_INTERVAL_MS)),
            Err(err) => {
                let _ = child.kill();
                return Err(CapbookError::AssertionFailed {
                    program: command.program.clone(),
                    code: None,
                    stderr_tail: format!("failed to poll: {err}"),
                });
            }
        }
    };

    let c_stderr = handle_stderr
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    if !status.success() {
        return Err(CapbookError::AssertionFailed {
            program: command.program.clone(),
            code: status.code(),
            stderr_tail: derive_tail(&c_stderr, N_STDERR_TAIL_CHARS),
        });
    }
    info!(
        program = %command.program,
        elapsed_ms = t_start.elapsed().as_millis() as u64,
        "assertion passed"
    );
    Ok(())
}

fn derive_tail(text: &str, n_chars: usize) -> String {
    let c_trimmed = text.trim();
    let n_total = c_trimmed.chars().count();
    if n_total <= n_chars {
        return c_trimmed.to_string();
    }
    c_trimmed.chars().skip(n_total - n_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derive_command(program: &str, args: &[&str], n_ms: u64) -> SpecAssertionCommand {
        SpecAssertionCommand {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout: Duration::from_millis(n_ms),
        }
    }

    #[test]
    fn test_tail_keeps_the_end() {
        assert_eq!(derive_tail("  abcdef \n", 3), "def");
        assert_eq!(derive_tail("ab", 3), "ab");
    }

    #[test]
    fn test_empty_program_is_an_option_error() {
        let err = run_assertion(&derive_command(" ", &[], 1000)).expect_err("empty");
        assert!(matches!(err, CapbookError::InvalidOption { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_maps_to_outcome() {
        run_assertion(&derive_command("sh", &["-c", "exit 0"], 5_000)).expect("pass");

        let err = run_assertion(&derive_command("sh", &["-c", "echo boom >&2; exit 3"], 5_000))
            .expect_err("fail");
        match err {
            CapbookError::AssertionFailed {
                code, stderr_tail, ..
            } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr_tail, "boom");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_slow_process_is_killed_at_budget() {
        let t_start = Instant::now();
        let err = run_assertion(&derive_command("sleep", &["5"], 200)).expect_err("timeout");
        assert!(matches!(err, CapbookError::AssertionTimeout { .. }));
        assert!(t_start.elapsed() < Duration::from_secs(4));
    }
}
