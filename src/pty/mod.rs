//! PTY (Pseudo-Terminal) execution.
//!
//! This module provides the pseudo-terminal strategy and the check that
//! decides whether one may be used. It supports both Unix PTY and Windows
//! ConPTY through portable-pty, but only Unix ever reports a pty as
//! available; elsewhere a pty must be forced by disabling fallback.

mod native;

pub use native::PtyStrategy;

/// Size of a PTY in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtySize {
    /// Number of rows (height).
    pub rows: u16,
    /// Number of columns (width).
    pub cols: u16,
}

impl PtySize {
    /// Create a new PtySize with the given dimensions.
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    /// Size of the terminal attached to our stdout, or the default.
    pub fn detect() -> Self {
        terminal_size().unwrap_or_default()
    }
}

impl Default for PtySize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

#[cfg(unix)]
fn terminal_size() -> Option<PtySize> {
    let mut size = std::mem::MaybeUninit::<libc::winsize>::zeroed();
    // SAFETY: TIOCGWINSZ writes a winsize into the provided pointer.
    let rc = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, size.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    // SAFETY: zero-initialized and filled in by a successful ioctl.
    let size = unsafe { size.assume_init() };
    (size.ws_row > 0 && size.ws_col > 0).then(|| PtySize::new(size.ws_row, size.ws_col))
}

#[cfg(not(unix))]
fn terminal_size() -> Option<PtySize> {
    None
}

/// Whether a pseudo-terminal can be used for the current process.
///
/// Requires our own stdin to be an interactive terminal whose attributes
/// can be read.
#[cfg(unix)]
pub fn is_available() -> bool {
    use std::io::IsTerminal;

    if !std::io::stdin().is_terminal() {
        return false;
    }
    let mut termios = std::mem::MaybeUninit::<libc::termios>::zeroed();
    // SAFETY: tcgetattr fills the termios struct for a valid descriptor.
    unsafe { libc::tcgetattr(libc::STDIN_FILENO, termios.as_mut_ptr()) == 0 }
}

/// No pty is ever considered available on non-Unix platforms.
#[cfg(not(unix))]
pub fn is_available() -> bool {
    false
}

/// Whether our process group is the foreground group of the terminal on stdin.
///
/// Children started in a new group would be background jobs of that
/// terminal and get stopped by SIGTTIN/SIGTTOU as soon as they touch it.
#[cfg(unix)]
pub fn in_foreground() -> bool {
    // SAFETY: both calls only query process and terminal state.
    unsafe {
        let foreground = libc::tcgetpgrp(libc::STDIN_FILENO);
        foreground != -1 && foreground == libc::getpgrp()
    }
}

/// There is no terminal job control on non-Unix platforms.
#[cfg(not(unix))]
pub fn in_foreground() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pty_size_default() {
        let size = PtySize::default();
        assert_eq!(size.rows, 24);
        assert_eq!(size.cols, 80);
    }

    #[test]
    fn test_pty_size_new() {
        let size = PtySize::new(40, 120);
        assert_eq!(size.rows, 40);
        assert_eq!(size.cols, 120);
    }

    #[test]
    fn test_detect_is_non_empty() {
        let size = PtySize::detect();
        assert!(size.rows > 0);
        assert!(size.cols > 0);
    }

    #[test]
    fn test_is_available_does_not_panic() {
        let _ = is_available();
    }

    #[cfg(unix)]
    #[test]
    fn test_foreground_requires_terminal() {
        use std::io::IsTerminal;

        if !std::io::stdin().is_terminal() {
            assert!(!in_foreground());
        }
    }
}
