//! Scan sources backed by the system's WiFi tools.
//!
//! Each scan spawns the tool, drains its output on helper threads (an `iw`
//! dump can overflow a pipe buffer) and kills it if it overruns the cycle's
//! timeout. Nothing here interprets the text; the library parses it.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use beaconwatch::monitor::{ScanError, ScanSource};
use beaconwatch::scanner::ScanFormat;

/// Fields requested from nmcli, in the order the library parses them.
const NMCLI_FIELDS: &str = "IN-USE,BSSID,SSID,MODE,CHAN,RATE,SIGNAL,BARS,SECURITY";

/// How often a running child is checked for exit
const WAIT_POLL: Duration = Duration::from_millis(20);

/// Captured result of a finished command.
struct Finished {
    success: bool,
    status: String,
    stdout: String,
    stderr: String,
}

/// Run `program args…`, giving up after `timeout`.
fn run_bounded(program: &str, args: &[&str], timeout: Duration) -> Result<Finished, ScanError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ScanError::Spawn(format!("`{program}`: {e}")))?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match wait_until(&mut child, Instant::now() + timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            abandon(&mut child);
            log::debug!("`{program} {}` killed after {:?}", args.join(" "), timeout);
            return Err(ScanError::TimedOut(timeout));
        }
        Err(e) => {
            abandon(&mut child);
            return Err(ScanError::Failed(format!("`{program}`: {e}")));
        }
    };

    Ok(Finished {
        success: status.success(),
        status: status.to_string(),
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn wait_until(child: &mut Child, deadline: Instant) -> std::io::Result<Option<std::process::ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(WAIT_POLL.min(deadline - now));
    }
}

/// Kill and reap a child that is no longer wanted.
fn abandon(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Turn a finished command into scan text, or a failure carrying stderr.
fn into_output(program: &str, done: Finished) -> Result<String, ScanError> {
    if !done.success {
        let detail = done.stderr.trim();
        return Err(ScanError::Failed(if detail.is_empty() {
            format!("`{program}` {}", done.status)
        } else {
            format!("`{program}` {}: {detail}", done.status)
        }));
    }
    // nmcli prints its "Error: ..." sentinel on stderr with a clean exit
    // in some versions; hand it on so the driver classifies it.
    if done.stdout.trim().is_empty() && done.stderr.trim_start().starts_with("Error") {
        return Ok(done.stderr);
    }
    Ok(done.stdout)
}

/// `nmcli dev wifi list`, tabular or terse.
pub struct NmcliSource {
    format: ScanFormat,
    interface: Option<String>,
    rescan: bool,
}

impl NmcliSource {
    pub fn new(terse: bool, interface: Option<String>, rescan: bool) -> Self {
        Self {
            format: if terse {
                ScanFormat::NmcliTerse
            } else {
                ScanFormat::NmcliTabular
            },
            interface,
            rescan,
        }
    }

    fn list_args(&self) -> Vec<&str> {
        let mut args = Vec::new();
        if self.format == ScanFormat::NmcliTerse {
            args.push("-t");
        }
        args.extend(["-f", NMCLI_FIELDS, "dev", "wifi", "list"]);
        if let Some(ifname) = &self.interface {
            args.extend(["ifname", ifname.as_str()]);
        }
        args
    }

    fn rescan_args(&self) -> Vec<&str> {
        let mut args = vec!["dev", "wifi", "rescan"];
        if let Some(ifname) = &self.interface {
            args.extend(["ifname", ifname.as_str()]);
        }
        args
    }
}

impl ScanSource for NmcliSource {
    fn format(&self) -> ScanFormat {
        self.format
    }

    fn scan(&mut self, timeout: Duration) -> Result<String, ScanError> {
        let started = Instant::now();
        if self.rescan {
            // NetworkManager rate-limits rescans; a refusal still leaves a
            // usable cached list.
            if let Err(e) = run_bounded("nmcli", &self.rescan_args(), timeout).and_then(|d| into_output("nmcli", d)) {
                log::debug!("rescan skipped: {e}");
            }
        }
        let remaining = timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(ScanError::TimedOut(timeout));
        }
        run_bounded("nmcli", &self.list_args(), remaining).and_then(|d| into_output("nmcli", d))
    }
}

/// `iw dev <if> scan`. Needs CAP_NET_ADMIN.
pub struct IwSource {
    interface: String,
}

impl IwSource {
    pub fn new(interface: String) -> Self {
        Self { interface }
    }
}

impl ScanSource for IwSource {
    fn format(&self) -> ScanFormat {
        ScanFormat::IwBlocks
    }

    fn scan(&mut self, timeout: Duration) -> Result<String, ScanError> {
        run_bounded("iw", &["dev", &self.interface, "scan"], timeout).and_then(|d| into_output("iw", d))
    }
}
