use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ratatui::style::Color;

use crate::page::Page;

/// How long a copy marker stays on its element.
pub const FEEDBACK_WINDOW: Duration = Duration::from_millis(800);
pub const FAILURE_COLOR: Color = Color::Rgb(0xfc, 0xa5, 0xa5);

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClipboardError {
    Unavailable,
    Failed(String),
}

impl fmt::Display for ClipboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClipboardError::Unavailable => write!(f, "no clipboard available"),
            ClipboardError::Failed(message) => write!(f, "clipboard write failed: {message}"),
        }
    }
}

impl std::error::Error for ClipboardError {}

pub trait ClipboardSink: Send {
    fn name(&self) -> &'static str;
    fn write(&self, text: &str) -> Result<(), ClipboardError>;
}

/// The desktop clipboard, through whichever helper binary is installed.
pub struct SystemClipboard;

const CLIPBOARD_COMMANDS: &[(&str, &[&str])] = &[
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
    ("pbcopy", &[]),
    ("clip.exe", &[]),
];

fn is_wsl() -> bool {
    if std::env::var("WSL_DISTRO_NAME").is_ok() || std::env::var("WSL_INTEROP").is_ok() {
        return true;
    }
    fs::read_to_string("/proc/sys/kernel/osrelease")
        .map(|value| value.to_lowercase().contains("microsoft"))
        .unwrap_or(false)
}

fn pipe_to_command(program: &str, args: &[&str], text: &str) -> Result<(), ClipboardError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|_| ClipboardError::Unavailable)?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(text.as_bytes())
            .map_err(|err| ClipboardError::Failed(err.to_string()))?;
    }
    let status = child
        .wait()
        .map_err(|err| ClipboardError::Failed(err.to_string()))?;
    if status.success() {
        Ok(())
    } else {
        Err(ClipboardError::Failed(format!("{program} exited with {status}")))
    }
}

impl ClipboardSink for SystemClipboard {
    fn name(&self) -> &'static str {
        "system"
    }

    fn write(&self, text: &str) -> Result<(), ClipboardError> {
        let mut candidates = CLIPBOARD_COMMANDS.to_vec();
        if is_wsl() {
            candidates.rotate_right(1);
        }
        let mut last = ClipboardError::Unavailable;
        for (program, args) in candidates {
            match pipe_to_command(program, args, text) {
                Ok(()) => return Ok(()),
                Err(ClipboardError::Unavailable) => continue,
                Err(err) => last = err,
            }
        }
        Err(last)
    }
}

/// Terminal-side copy: an OSC 52 sequence the emulator turns into a
/// clipboard write. Works over SSH, but nothing confirms it landed.
pub struct Osc52Clipboard;

pub fn osc52_sequence(text: &str) -> String {
    format!("\u{1b}]52;c;{}\u{7}", BASE64.encode(text.as_bytes()))
}

impl ClipboardSink for Osc52Clipboard {
    fn name(&self) -> &'static str {
        "osc52"
    }

    fn write(&self, text: &str) -> Result<(), ClipboardError> {
        let mut stdout = io::stdout();
        stdout
            .write_all(osc52_sequence(text).as_bytes())
            .and_then(|()| stdout.flush())
            .map_err(|err| ClipboardError::Failed(err.to_string()))
    }
}

pub struct Clipboard {
    primary: Box<dyn ClipboardSink>,
    fallback: Box<dyn ClipboardSink>,
}

impl Clipboard {
    pub fn new(primary: Box<dyn ClipboardSink>, fallback: Box<dyn ClipboardSink>) -> Self {
        Self { primary, fallback }
    }

    pub fn system() -> Self {
        Self::new(Box::new(SystemClipboard), Box::new(Osc52Clipboard))
    }

    /// Tries the primary sink, then the fallback. Never fails loudly.
    pub fn copy(&self, text: &str) -> bool {
        match self.primary.write(text) {
            Ok(()) => return true,
            Err(err) => log_debug!("{} clipboard: {err}", self.primary.name()),
        }
        match self.fallback.write(text) {
            Ok(()) => true,
            Err(err) => {
                log_debug!("{} clipboard: {err}", self.fallback.name());
                false
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Revert {
    Copied,
    Color(Option<Color>),
}

#[derive(Clone, Debug)]
struct PendingRevert {
    target: String,
    due: Instant,
    revert: Revert,
}

/// Transient copy markers and the deadlines at which they come off.
#[derive(Clone, Debug, Default)]
pub struct CopyFeedback {
    pending: Vec<PendingRevert>,
}

impl CopyFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, page: &mut Page, target: &str, ok: bool, now: Instant) {
        let Some(element) = page.get_mut(target) else {
            return;
        };
        let due = now + FEEDBACK_WINDOW;
        if ok {
            element.copied = true;
            self.replace(target, due, Revert::Copied);
            return;
        }

        // A second failure inside the window must not capture the error
        // color as the one to restore.
        let original = self
            .pending
            .iter()
            .find_map(|pending| match &pending.revert {
                Revert::Color(color) if pending.target == target => Some(*color),
                _ => None,
            })
            .unwrap_or(element.color);
        element.color = Some(FAILURE_COLOR);
        self.replace(target, due, Revert::Color(original));
    }

    fn replace(&mut self, target: &str, due: Instant, revert: Revert) {
        let kind = std::mem::discriminant(&revert);
        self.pending.retain(|pending| {
            pending.target != target || std::mem::discriminant(&pending.revert) != kind
        });
        self.pending.push(PendingRevert {
            target: target.to_string(),
            due,
            revert,
        });
    }

    /// Takes off every marker whose window has passed.
    pub fn expire(&mut self, page: &mut Page, now: Instant) {
        let (due, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|pending| pending.due <= now);
        self.pending = keep;
        for pending in due {
            let Some(element) = page.get_mut(&pending.target) else {
                continue;
            };
            match pending.revert {
                Revert::Copied => element.copied = false,
                Revert::Color(color) => element.color = color,
            }
        }
    }

    pub fn is_pending(&self, target: &str) -> bool {
        self.pending.iter().any(|pending| pending.target == target)
    }
}

/// Copies `text` and, when a target is given, marks it for the feedback
/// window. Returns whether any clipboard accepted the text.
pub fn copy_text(
    clipboard: &Clipboard,
    feedback: &mut CopyFeedback,
    page: &mut Page,
    text: &str,
    target: Option<&str>,
    now: Instant,
) -> bool {
    let ok = clipboard.copy(text);
    if let Some(target) = target {
        feedback.apply(page, target, ok, now);
    }
    ok
}
