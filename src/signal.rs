//! Signal handling around a running child.
//!
//! - [`SignalTarget`] forwards a signal to a child, or to the process group
//!   it leads when it was started in one.
//! - [`InterruptGuard`] observes SIGINT for the lifetime of one run only.
//!   The handler is installed when the first concurrent run starts and the
//!   previous disposition is restored when the last one finishes.
//!
//! On non-Unix platforms a console Ctrl+C already reaches every process
//! attached to the console, so forwarding is a no-op and no handler is
//! installed.

use std::io;

/// Signal to deliver to a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildSignal {
    /// SIGINT - interrupt (Ctrl+C equivalent)
    Interrupt,
    /// SIGKILL - immediate termination
    Kill,
}

#[cfg(unix)]
impl ChildSignal {
    fn as_libc_signal(self) -> libc::c_int {
        match self {
            ChildSignal::Interrupt => libc::SIGINT,
            ChildSignal::Kill => libc::SIGKILL,
        }
    }
}

/// Where a forwarded signal is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalTarget {
    /// The process group led by this pid: the shell and everything it started.
    Group(u32),
    /// The shell process alone; it shares the caller's process group.
    Process(u32),
}

impl SignalTarget {
    /// The pid the target is named after.
    pub fn pid(&self) -> u32 {
        match self {
            Self::Group(pid) | Self::Process(pid) => *pid,
        }
    }

    /// Deliver `signal`. A target that already exited is not an error.
    pub fn send(&self, signal: ChildSignal) -> io::Result<()> {
        match *self {
            Self::Group(pid) => signal_group(pid, signal),
            Self::Process(pid) => signal_process(pid, signal),
        }
    }
}

#[cfg(unix)]
fn to_pid(pid: u32) -> io::Result<libc::pid_t> {
    match libc::pid_t::try_from(pid) {
        Ok(pid) if pid > 0 => Ok(pid),
        _ => Err(io::Error::new(io::ErrorKind::InvalidInput, "invalid pid")),
    }
}

#[cfg(unix)]
fn check(result: libc::c_int) -> io::Result<()> {
    if result == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        return Err(err);
    }
    Ok(())
}

/// Send `signal` to the process group led by `pid`.
///
/// A group that already exited is not an error.
#[cfg(unix)]
pub fn signal_group(pid: u32, signal: ChildSignal) -> io::Result<()> {
    let pgid = to_pid(pid)?;
    // SAFETY: killpg only reads its integer arguments.
    check(unsafe { libc::killpg(pgid, signal.as_libc_signal()) })
}

/// Send `signal` to the single process `pid`.
#[cfg(unix)]
pub fn signal_process(pid: u32, signal: ChildSignal) -> io::Result<()> {
    let pid = to_pid(pid)?;
    // SAFETY: kill only reads its integer arguments.
    check(unsafe { libc::kill(pid, signal.as_libc_signal()) })
}

/// No-op on non-Unix platforms.
#[cfg(not(unix))]
pub fn signal_group(_pid: u32, _signal: ChildSignal) -> io::Result<()> {
    Ok(())
}

/// No-op on non-Unix platforms.
#[cfg(not(unix))]
pub fn signal_process(_pid: u32, _signal: ChildSignal) -> io::Result<()> {
    Ok(())
}

/// Counts SIGINTs delivered to this process while at least one run is active.
///
/// Dropping the guard releases the handler; the last guard out puts the
/// disposition that was in place before the first one back.
#[derive(Debug)]
pub struct InterruptGuard {
    start: usize,
    installed: bool,
}

impl InterruptGuard {
    /// Start observing SIGINT.
    ///
    /// When the caller ignores SIGINT it stays ignored and the guard never
    /// reports an interrupt.
    pub fn install() -> io::Result<Self> {
        let installed = imp::acquire()?;
        Ok(Self {
            start: imp::count(),
            installed,
        })
    }

    /// Number of interrupts received since this guard was installed.
    pub fn received(&self) -> usize {
        if self.installed {
            imp::count().wrapping_sub(self.start)
        } else {
            0
        }
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        if self.installed {
            if let Err(e) = imp::release() {
                tracing::warn!("failed to restore SIGINT disposition: {}", e);
            }
        }
    }
}

#[cfg(unix)]
mod imp {
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    static INTERRUPTS: AtomicUsize = AtomicUsize::new(0);
    static INSTALLED: Mutex<Option<Installed>> = Mutex::new(None);

    struct Installed {
        active: usize,
        previous: libc::sigaction,
    }

    extern "C" fn on_interrupt(_signal: libc::c_int) {
        // Only an atomic increment: async-signal-safe.
        INTERRUPTS.fetch_add(1, Ordering::SeqCst);
    }

    pub(super) fn count() -> usize {
        INTERRUPTS.load(Ordering::SeqCst)
    }

    fn current() -> io::Result<libc::sigaction> {
        let mut action = std::mem::MaybeUninit::<libc::sigaction>::zeroed();
        // SAFETY: a null new action only queries the current one.
        if unsafe { libc::sigaction(libc::SIGINT, std::ptr::null(), action.as_mut_ptr()) } == -1 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: filled in by the successful call above.
        Ok(unsafe { action.assume_init() })
    }

    fn set(action: &libc::sigaction) -> io::Result<()> {
        // SAFETY: `action` is a fully initialized sigaction.
        if unsafe { libc::sigaction(libc::SIGINT, action, std::ptr::null_mut()) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Returns false when SIGINT is ignored and was left alone.
    pub(super) fn acquire() -> io::Result<bool> {
        let mut installed = INSTALLED.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(installed) = installed.as_mut() {
            installed.active += 1;
            return Ok(true);
        }

        let previous = current()?;
        if previous.sa_sigaction == libc::SIG_IGN {
            return Ok(false);
        }

        // SAFETY: zeroed is a valid sigaction; the fields are set below.
        let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
        action.sa_sigaction = on_interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = libc::SA_RESTART;
        // SAFETY: sa_mask is owned and valid for writing.
        unsafe { libc::sigemptyset(&mut action.sa_mask) };
        set(&action)?;

        *installed = Some(Installed {
            active: 1,
            previous,
        });
        Ok(true)
    }

    pub(super) fn release() -> io::Result<()> {
        let mut installed = INSTALLED.lock().unwrap_or_else(|e| e.into_inner());
        let Some(state) = installed.as_mut() else {
            return Ok(());
        };
        state.active -= 1;
        if state.active == 0 {
            let previous = state.previous;
            *installed = None;
            set(&previous)?;
        }
        Ok(())
    }
}

#[cfg(not(unix))]
mod imp {
    use std::io;

    pub(super) fn count() -> usize {
        0
    }

    pub(super) fn acquire() -> io::Result<bool> {
        Ok(false)
    }

    pub(super) fn release() -> io::Result<()> {
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::{CommandExt, ExitStatusExt};
    use std::process::Command;

    #[test]
    fn test_interrupt_reaches_group() {
        let mut child = Command::new("sleep")
            .arg("30")
            .process_group(0)
            .spawn()
            .unwrap();

        SignalTarget::Group(child.id())
            .send(ChildSignal::Interrupt)
            .unwrap();
        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGINT));
    }

    #[test]
    fn test_kill_reaches_process() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();

        let target = SignalTarget::Process(child.id());
        assert_eq!(target.pid(), child.id());
        target.send(ChildSignal::Kill).unwrap();
        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGKILL));
    }

    #[test]
    fn test_missing_group_is_ok() {
        let mut child = Command::new("/bin/sh")
            .args(["-c", "exit 0"])
            .process_group(0)
            .spawn()
            .unwrap();
        let pid = child.id();
        child.wait().unwrap();

        assert!(signal_group(pid, ChildSignal::Kill).is_ok());
    }

    #[test]
    fn test_rejects_invalid_pid() {
        assert!(signal_group(0, ChildSignal::Kill).is_err());
        assert!(signal_process(0, ChildSignal::Kill).is_err());
    }

    #[test]
    fn test_guard_starts_at_zero() {
        let guard = InterruptGuard::install().unwrap();
        assert_eq!(guard.received(), 0);
    }
}
