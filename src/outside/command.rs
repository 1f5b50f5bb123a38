use std::{
    io::{BufRead, BufReader},
    ops::{Deref, DerefMut},
    process::{Child, Command, ExitStatus, Output, Stdio},
};

use bitflags::bitflags;
use miette::{miette, Context, IntoDiagnostic, Result};
use tracing::{debug, trace};

pub const YT_DL: &str = "youtube-dl";
pub const YT_DLP: &str = "yt-dlp";
pub const FFMPEG: &str = "ffmpeg";
pub const FFXXX_DEFAULT_ARGS: [&str; 3] = ["-hide_banner", "-loglevel", "error"];

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capture: u8 {
        const STDIN = 0b0000001;
        const STDOUT = 0b0000010;
        const STDERR = 0b0000100;
    }
}

/// Run a command, returning its raw output handle.
///
/// IO handles will be captured only if the caller required it or if the log level is Debug.
/// In that last case, `stdout` and `stderr` will be logged.
///
/// The function returns an error only if the command failed to execute.
/// If the program runs but returns a non-0 status code, it will not trigger an error.
pub fn run_command<F: FnOnce(&mut Command) -> &mut Command>(
    program: &str,
    f: F,
    capture: Capture,
) -> Result<Output> {
    let is_debug = tracing::enabled!(tracing::Level::DEBUG);
    let get_io = |capture| {
        if capture {
            Stdio::piped()
        } else {
            Stdio::null()
        }
    };

    let mut cmd = Command::new(program);
    let cmd = f(&mut cmd)
        .stdin(get_io(capture.contains(Capture::STDIN)))
        .stdout(get_io(is_debug || capture.contains(Capture::STDOUT)))
        .stderr(get_io(is_debug || capture.contains(Capture::STDERR)));

    debug!("Executing command: {cmd:?}");
    let res = cmd
        .output()
        .into_diagnostic()
        .wrap_err_with(|| format!("Could not run {program}"))?;

    if is_debug {
        debug!("status: {}", res.status);
        debug!("stdout: {} bytes long", res.stdout.len());
        trace!("stdout: {:?}", String::from_utf8_lossy(&res.stdout));
        debug!("stderr: {} bytes long", res.stderr.len());
        trace!("stderr: {:?}", String::from_utf8_lossy(&res.stderr));
    }

    Ok(res)
}

/// Run the command and verify that it has returned a success status code.
pub fn assert_success_command<F: FnOnce(&mut Command) -> &mut Command>(
    program: &str,
    f: F,
) -> Result<()> {
    let res = run_command(program, f, Capture::STDERR)?;
    if res.status.success() {
        Ok(())
    } else {
        Err(miette!(
            "{program} did run but was not successful ({}): {}",
            res.status,
            String::from_utf8_lossy(&res.stderr).trim()
        ))
    }
}

/// Status and error output of a command whose stdout was consumed line by line
#[derive(Debug)]
pub struct StreamedOutput {
    pub status: ExitStatus,
    pub stderr: Vec<String>,
}

impl StreamedOutput {
    /// Fail with the last lines of stderr if the command was not successful
    pub fn check_success(&self, program: &str) -> Result<()> {
        if self.status.success() {
            return Ok(());
        }

        let tail = self.stderr.iter().rev().take(5).rev().cloned();
        Err(miette!(
            "{program} did run but was not successful ({}): {}",
            self.status,
            tail.collect::<Vec<_>>().join(" | ")
        ))
    }
}

/// Run a command and call `on_line` for every line it writes on stdout, as soon as it is written.
///
/// stderr is drained by a helper thread so that the child never blocks on a full pipe.
/// The child is killed and reaped if this function returns early.
pub fn stream_command<F, L>(program: &str, f: F, mut on_line: L) -> Result<StreamedOutput>
where
    F: FnOnce(&mut Command) -> &mut Command,
    L: FnMut(&str),
{
    let mut cmd = Command::new(program);
    let cmd = f(&mut cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("Executing command: {cmd:?}");
    let mut child = ChildGuard::spawn(cmd).wrap_err_with(|| format!("Could not run {program}"))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| miette!("stdout of {program} not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| miette!("stderr of {program} not captured"))?;

    let (send, receive) = crossbeam_channel::unbounded();
    let drain = std::thread::Builder::new()
        .name(format!("{program}-stderr"))
        .spawn(move || {
            // Read until EOF whatever the encoding, or the child could get a broken pipe
            for line in BufReader::new(stderr).split(b'\n').map_while(|line| line.ok()) {
                let line = decode_line(&line);
                trace!("stderr: {line}");
                if send.send(line).is_err() {
                    break;
                }
            }
        })
        .into_diagnostic()
        .wrap_err("Could not spawn the stderr reader thread")?;

    for line in BufReader::new(stdout).split(b'\n') {
        let line = line
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not read the output of {program}"))?;
        let line = decode_line(&line);
        trace!("stdout: {line}");
        on_line(&line);
    }

    let status = child
        .wait()
        .into_diagnostic()
        .wrap_err_with(|| format!("Could not wait for {program}"))?;
    drain
        .join()
        .map_err(|_| miette!("The stderr reader thread of {program} panicked"))?;

    debug!("status: {status}");
    Ok(StreamedOutput {
        status,
        stderr: receive.try_iter().collect(),
    })
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// A spawned child process that is killed and reaped when dropped while still running
#[derive(Debug)]
pub struct ChildGuard(Child);

impl ChildGuard {
    pub fn spawn(cmd: &mut Command) -> Result<Self> {
        Ok(Self(cmd.spawn().into_diagnostic()?))
    }
}

impl Deref for ChildGuard {
    type Target = Child;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for ChildGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Ok(None) = self.0.try_wait() {
            debug!("Killing still running child process {}", self.0.id());
            let _ = self.0.kill();
            let _ = self.0.wait();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn stream_command_yields_stdout_lines_and_collects_stderr() {
        let mut lines = Vec::new();
        let output = stream_command(
            "sh",
            |cmd| cmd.args(["-c", "echo one; echo oops >&2; echo two"]),
            |line| lines.push(line.to_string()),
        )
        .unwrap();

        assert!(output.status.success());
        assert_eq!(lines, ["one", "two"]);
        assert_eq!(output.stderr, ["oops"]);
        assert!(output.check_success("sh").is_ok());
    }

    #[test]
    fn check_success_reports_stderr_tail() {
        let output = stream_command("sh", |cmd| cmd.args(["-c", "echo bad >&2; exit 3"]), |_| {})
            .unwrap();

        let err = output.check_success("sh").unwrap_err();
        assert!(err.to_string().contains("bad"), "{err}");
    }

    #[test]
    fn invalid_utf8_output_is_read_to_the_end() {
        let mut lines = Vec::new();
        let output = stream_command(
            "sh",
            |cmd| {
                cmd.args([
                    "-c",
                    r"printf 'bad \377 err\nlast err\n' >&2; printf 'bad \377 out\r\nlast out\n'",
                ])
            },
            |line| lines.push(line.to_string()),
        )
        .unwrap();

        assert!(output.status.success());
        assert_eq!(lines, ["bad \u{FFFD} out", "last out"]);
        assert_eq!(output.stderr, ["bad \u{FFFD} err", "last err"]);
    }

    #[test]
    fn missing_program_is_an_error() {
        assert!(stream_command("surely-not-an-installed-program", |cmd| cmd, |_| {}).is_err());
        assert!(assert_success_command("surely-not-an-installed-program", |cmd| cmd).is_err());
    }
}
