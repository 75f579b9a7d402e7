use anyhow::Result;
use arboard::Clipboard;
#[cfg(target_os = "linux")]
use arboard::SetExtLinux;
use base64::{Engine as _, engine::general_purpose};
use std::io::Write;
#[cfg(target_os = "linux")]
use std::{process::ExitStatus, thread};
use thiserror::Error;

pub const DAEMON_FLAG: &str = "__clipboard_daemon";

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("clipboard write rejected: {0}")]
    Rejected(String),
}

/// Something that can put text on a clipboard.
pub trait ClipboardWriter {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

#[cfg(target_os = "linux")]
fn run_daemon_mode() -> Result<()> {
    let text = std::io::read_to_string(std::io::stdin())?;

    let mut clipboard = Clipboard::new()?;
    // Blocks until another program takes the clipboard over.
    clipboard.set().wait().text(text)?;
    Ok(())
}

/// Checks if the DAEMON_FLAG is present in args. If so, runs in daemon mode and exits.
/// Returns Ok(true) if daemon mode was run (and exited), Ok(false) otherwise.
pub fn check_and_run_daemon_if_requested() -> Result<bool> {
    if std::env::args().any(|a| a == DAEMON_FLAG) {
        #[cfg(target_os = "linux")]
        {
            run_daemon_mode()?;
            return Ok(true);
        }
        #[cfg(not(target_os = "linux"))]
        {
            eprintln!(
                "⚠️ Warning: {} flag used on non-Linux system. Ignoring.",
                DAEMON_FLAG
            );
            return Ok(true);
        }
    }
    Ok(false)
}

/// The OS clipboard through arboard.
///
/// On Linux the clipboard lives only as long as the process that owns it, so
/// the text is handed to a detached copy of this executable started with
/// [`DAEMON_FLAG`], which keeps serving it after we exit.
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl ClipboardWriter for SystemClipboard {
    #[cfg(not(target_os = "linux"))]
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard =
            Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| ClipboardError::Rejected(e.to_string()))
    }

    #[cfg(target_os = "linux")]
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        use std::process::Command;

        // Probe first: without a display server the daemon would die silently.
        Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;

        let exe = std::env::current_exe().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        let mut command = Command::new(exe);
        command.arg(DAEMON_FLAG).current_dir("/");
        hand_off_to_daemon(command, text).map(|_| ())
    }
}

/// Spawns `command`, pipes `text` to its stdin and closes it.
///
/// The daemon exits once a later copy takes the clipboard over, so each one
/// gets a thread that waits on it. The returned handle yields its exit status.
#[cfg(target_os = "linux")]
fn hand_off_to_daemon(
    mut command: std::process::Command,
    text: &str,
) -> Result<thread::JoinHandle<std::io::Result<ExitStatus>>, ClipboardError> {
    use std::process::Stdio;

    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ClipboardError::Unavailable(e.to_string()))?;

    let written = match child.stdin.take() {
        Some(mut stdin) => stdin
            .write_all(text.as_bytes())
            .and_then(|_| stdin.flush())
            .map_err(|e| ClipboardError::Rejected(e.to_string())),
        None => Err(ClipboardError::Rejected(
            "Failed to get stdin for clipboard daemon".to_string(),
        )),
    };

    let reaper = thread::spawn(move || child.wait());
    written.map(|_| reaper)
}

/// Fallback route: asks the terminal emulator to set its clipboard with an
/// OSC 52 escape sequence. Works over SSH and without a display server.
pub struct Osc52Clipboard<W: Write> {
    out: W,
    tmux: bool,
}

impl Osc52Clipboard<std::io::Stdout> {
    pub fn stdout() -> Self {
        Osc52Clipboard::new(std::io::stdout(), in_tmux())
    }
}

impl<W: Write> Osc52Clipboard<W> {
    pub fn new(out: W, tmux: bool) -> Self {
        Osc52Clipboard { out, tmux }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ClipboardWriter for Osc52Clipboard<W> {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        let seq = osc52_sequence(text);
        let seq = if self.tmux { tmux_passthrough(&seq) } else { seq };
        self.out
            .write_all(seq.as_bytes())
            .and_then(|_| self.out.flush())
            .map_err(|e| ClipboardError::Rejected(e.to_string()))
    }
}

fn osc52_sequence(text: &str) -> String {
    let encoded = general_purpose::STANDARD.encode(text.as_bytes());
    format!("\x1b]52;c;{}\x07", encoded)
}

fn in_tmux() -> bool {
    std::env::var_os("TMUX").is_some()
        || std::env::var_os("TERM").is_some_and(|t| t.to_string_lossy().starts_with("tmux"))
}

fn tmux_passthrough(seq: &str) -> String {
    let escaped = seq.replace('\x1b', "\x1b\x1b");
    format!("\x1bPtmux;{}\x1b\\", escaped)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Remembers what it was asked to write; optionally refuses.
    #[derive(Default)]
    pub(crate) struct RecordingClipboard {
        pub written: Vec<String>,
        pub refuse: bool,
    }

    impl ClipboardWriter for RecordingClipboard {
        fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
            if self.refuse {
                return Err(ClipboardError::Unavailable("no clipboard here".into()));
            }
            self.written.push(text.to_string());
            Ok(())
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn handed_off_daemon_is_reaped_once_it_exits() {
        use std::process::Command;

        let reaper = hand_off_to_daemon(Command::new("cat"), "clipboard text").unwrap();
        let status = reaper.join().unwrap().unwrap();
        assert!(status.success());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn missing_daemon_binary_is_unavailable() {
        let command = std::process::Command::new("/nonexistent/repopick-daemon");
        assert!(matches!(
            hand_off_to_daemon(command, "x"),
            Err(ClipboardError::Unavailable(_))
        ));
    }

    #[test]
    fn osc52_wraps_base64_payload() {
        let mut clip = Osc52Clipboard::new(Vec::new(), false);
        clip.write_text("hi").unwrap();
        let out = String::from_utf8(clip.into_inner()).unwrap();
        assert_eq!(out, "\x1b]52;c;aGk=\x07");
    }

    #[test]
    fn osc52_inside_tmux_uses_passthrough() {
        let mut clip = Osc52Clipboard::new(Vec::new(), true);
        clip.write_text("hi").unwrap();
        let out = String::from_utf8(clip.into_inner()).unwrap();
        assert_eq!(out, "\x1bPtmux;\x1b\x1b]52;c;aGk=\x07\x1b\\");
    }

    #[test]
    fn osc52_reports_broken_terminal() {
        struct Closed;
        impl Write for Closed {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let mut clip = Osc52Clipboard::new(Closed, false);
        assert!(matches!(
            clip.write_text("x"),
            Err(ClipboardError::Rejected(_))
        ));
    }
}
