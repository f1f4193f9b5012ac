//! Fork/exec with one redirected standard stream.
//!
//! The child runs in its own process group so [`Subprocess::kill`] reaches
//! anything it spawned. Exec failures travel back over a close-on-exec
//! status pipe, so [`Subprocess::exec`] reports them synchronously.
//!
//! A child launched in the foreground (see [`Subprocess::foreground`]) is
//! given the controlling terminal while it runs, so it can read from the
//! terminal without being stopped by `SIGTTIN`.

use std::ffi::{CString, OsStr};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::os::raw::{c_char, c_int};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::str::FromStr;

use crate::EXEC_FAILURE_STATUS;
use crate::error::{ProcessError, ProcessResult};

/// Which of the child's standard streams is connected to the pipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirection {
    /// Parent writes, child reads stdin
    Stdin,
    /// Child writes stdout, parent reads
    Stdout,
    /// Child writes stderr, parent reads
    Stderr,
    /// Child writes both stdout and stderr into one pipe
    Combined,
}

impl Redirection {
    /// Whether `stream` is served by the pipe in this mode
    #[must_use]
    pub fn covers(self, stream: Stream) -> bool {
        matches!(
            (self, stream),
            (Self::Stdin, Stream::Stdin)
                | (Self::Stdout, Stream::Stdout)
                | (Self::Stderr, Stream::Stderr)
                | (Self::Combined, Stream::Stdout | Stream::Stderr)
        )
    }

    fn child_targets(self) -> &'static [c_int] {
        match self {
            Self::Stdin => &[libc::STDIN_FILENO],
            Self::Stdout => &[libc::STDOUT_FILENO],
            Self::Stderr => &[libc::STDERR_FILENO],
            Self::Combined => &[libc::STDOUT_FILENO, libc::STDERR_FILENO],
        }
    }
}

impl fmt::Display for Redirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stdin => "stdin",
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::Combined => "combined",
        };
        f.write_str(name)
    }
}

impl FromStr for Redirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdin" | "in" => Ok(Self::Stdin),
            "stdout" | "out" => Ok(Self::Stdout),
            "stderr" | "err" => Ok(Self::Stderr),
            "combined" | "outerr" => Ok(Self::Combined),
            other => Err(format!("unknown redirection: {other}")),
        }
    }
}

/// A standard stream of the child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Standard input
    Stdin,
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdin => f.write_str("stdin"),
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

#[derive(Debug)]
struct PipePair {
    read: Option<OwnedFd>,
    write: Option<OwnedFd>,
}

impl PipePair {
    fn new() -> io::Result<Self> {
        let (read, write) = pipe_cloexec()?;
        Ok(Self {
            read: Some(read),
            write: Some(write),
        })
    }
}

fn pipe_cloexec() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds: [c_int; 2] = [-1; 2];
    // SAFETY: `fds` has room for the two descriptors pipe2 writes.
    if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) } == -1 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: both descriptors were just created and nothing else owns them.
    Ok(unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) })
}

/// The single pipe, tagged with the stream it serves
#[derive(Debug)]
enum StdioPipe {
    Stdin(PipePair),
    Stdout(PipePair),
    Stderr(PipePair),
    Combined(PipePair),
}

impl StdioPipe {
    fn new(redirection: Redirection) -> io::Result<Self> {
        let pair = PipePair::new()?;
        Ok(match redirection {
            Redirection::Stdin => Self::Stdin(pair),
            Redirection::Stdout => Self::Stdout(pair),
            Redirection::Stderr => Self::Stderr(pair),
            Redirection::Combined => Self::Combined(pair),
        })
    }

    fn redirection(&self) -> Redirection {
        match self {
            Self::Stdin(_) => Redirection::Stdin,
            Self::Stdout(_) => Redirection::Stdout,
            Self::Stderr(_) => Redirection::Stderr,
            Self::Combined(_) => Redirection::Combined,
        }
    }

    /// (parent end, child end)
    fn ends(&self) -> (&Option<OwnedFd>, &Option<OwnedFd>) {
        match self {
            Self::Stdin(p) => (&p.write, &p.read),
            Self::Stdout(p) | Self::Stderr(p) | Self::Combined(p) => (&p.read, &p.write),
        }
    }

    fn ends_mut(&mut self) -> (&mut Option<OwnedFd>, &mut Option<OwnedFd>) {
        match self {
            Self::Stdin(p) => (&mut p.write, &mut p.read),
            Self::Stdout(p) | Self::Stderr(p) | Self::Combined(p) => (&mut p.read, &mut p.write),
        }
    }
}

/// Child process with one redirected standard stream
///
/// A `Subprocess` spawns at most once. Dropping it closes the parent's
/// pipe end but neither kills nor waits for the child.
#[derive(Debug)]
pub struct Subprocess {
    argv: Vec<CString>,
    pipe: StdioPipe,
    pid: Option<libc::pid_t>,
    status: Option<ExitStatus>,
    stopped: Option<c_int>,
    foreground: bool,
    terminal: Option<ForegroundTerminal>,
    spawned: bool,
}

impl Subprocess {
    /// Prepare `argv` for execution and allocate the redirection pipe.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::EmptyCommand`] if `argv` is empty
    /// - [`ProcessError::InvalidArgument`] if an argument contains a NUL byte
    /// - [`ProcessError::PipeAllocationFailed`] if the pipe cannot be created
    pub fn new<I, S>(argv: I, redirection: Redirection) -> ProcessResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let argv = argv
            .into_iter()
            .map(|arg| {
                let bytes = arg.as_ref().as_bytes();
                CString::new(bytes).map_err(|_| {
                    ProcessError::InvalidArgument(String::from_utf8_lossy(bytes).into_owned())
                })
            })
            .collect::<ProcessResult<Vec<_>>>()?;

        if argv.is_empty() {
            return Err(ProcessError::EmptyCommand);
        }

        let pipe = StdioPipe::new(redirection).map_err(ProcessError::PipeAllocationFailed)?;

        Ok(Self {
            argv,
            pipe,
            pid: None,
            status: None,
            stopped: None,
            foreground: false,
            terminal: None,
            spawned: false,
        })
    }

    /// Hand the controlling terminal to the child's process group while it
    /// runs, and take it back once the child has been reaped.
    ///
    /// Only takes effect when our stdin is a terminal we hold in the
    /// foreground and the child inherits it (any mode but `Stdin`).
    #[must_use]
    pub fn foreground(mut self, enabled: bool) -> Self {
        self.foreground = enabled;
        self
    }

    /// Fork and exec the command.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::AlreadySpawned`] on a second call
    /// - [`ProcessError::PipeAllocationFailed`] if the status pipe cannot be created
    /// - [`ProcessError::SpawnFailed`] if `fork` fails or the child cannot exec
    ///   (carrying the child's errno; the child has been reaped)
    pub fn exec(&mut self) -> ProcessResult<()> {
        if self.spawned {
            return Err(ProcessError::AlreadySpawned);
        }

        let (parent_end, child_end) = self.pipe.ends();
        let parent_fd = parent_end.as_ref().map(AsRawFd::as_raw_fd);
        let child_fd = child_end
            .as_ref()
            .map(AsRawFd::as_raw_fd)
            .ok_or_else(|| self.spawn_error(io::Error::from_raw_os_error(libc::EBADF)))?;
        let targets = self.pipe.redirection().child_targets();

        // Everything the child touches is allocated before the fork.
        let argv_ptrs: Vec<*const c_char> = self
            .argv
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect();

        let (status_read, status_write) =
            pipe_cloexec().map_err(ProcessError::PipeAllocationFailed)?;

        let take_terminal = self.foreground
            && self.redirection() != Redirection::Stdin
            && holds_terminal(libc::STDIN_FILENO);

        self.spawned = true;

        // SAFETY: the child branch only makes async-signal-safe calls before
        // exec or _exit.
        let pid = unsafe { libc::fork() };
        if pid == -1 {
            return Err(self.spawn_error(io::Error::last_os_error()));
        }
        if pid == 0 {
            // SAFETY: in the forked child; all pointers refer to memory
            // allocated before the fork.
            unsafe {
                exec_child(
                    argv_ptrs.as_ptr(),
                    child_fd,
                    parent_fd,
                    targets,
                    take_terminal,
                    status_write.as_raw_fd(),
                )
            }
        }

        // Either side may win the race to create the group; the loser's
        // call is redundant.
        // SAFETY: plain syscall on our own child.
        unsafe {
            libc::setpgid(pid, pid);
        }

        if take_terminal {
            self.terminal = Some(ForegroundTerminal::hand_to(libc::STDIN_FILENO, pid));
        }

        drop(status_write);
        self.pipe.ends_mut().1.take();

        let mut errno = [0u8; 4];
        match read_status(File::from(status_read), &mut errno) {
            Ok(0) => {
                self.pid = Some(pid);
                tracing::debug!(pid, program = %self.program(), redirection = %self.redirection(), "child spawned");
                Ok(())
            }
            Ok(_) => {
                if let Err(e) = wait_blocking(pid) {
                    tracing::warn!(pid, "cannot reap failed child: {}", e);
                }
                self.terminal = None;
                let source = io::Error::from_raw_os_error(i32::from_ne_bytes(errno));
                tracing::debug!(program = %self.program(), "exec failed: {}", source);
                Err(self.spawn_error(source))
            }
            Err(e) => {
                self.pid = Some(pid);
                let _ = self.kill();
                Err(self.spawn_error(e))
            }
        }
    }

    /// Block until the child exits and return its status.
    ///
    /// Without a live child this returns the cached status (or `None` if the
    /// process never ran).
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::WaitFailed`] if `waitpid` fails.
    pub fn wait(&mut self) -> ProcessResult<Option<ExitStatus>> {
        let Some(pid) = self.pid else {
            return Ok(self.status);
        };
        let status = wait_blocking(pid).map_err(ProcessError::WaitFailed)?;
        self.reaped(status);
        Ok(Some(status))
    }

    /// Send `SIGKILL` to the child's process group and reap the child.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::KillFailed`] if the signal cannot be sent or
    /// [`ProcessError::WaitFailed`] if reaping fails.
    pub fn kill(&mut self) -> ProcessResult<()> {
        let Some(pid) = self.pid else {
            return Ok(());
        };

        // SAFETY: plain syscalls on our own child and its group.
        if unsafe { libc::killpg(pid, libc::SIGKILL) } == -1 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                return Err(ProcessError::KillFailed(err));
            }
            // group not created yet
            // SAFETY: as above.
            unsafe {
                libc::kill(pid, libc::SIGKILL);
            }
        }

        let status = wait_blocking(pid).map_err(ProcessError::WaitFailed)?;
        self.reaped(status);
        tracing::debug!(pid, "child killed");
        Ok(())
    }

    /// Whether the child is still running.
    ///
    /// Reaps the child if it has exited; the status stays available through
    /// [`wait`](Self::wait) and [`exit_status`](Self::exit_status). A stopped
    /// child counts as alive; see [`stopped_signal`](Self::stopped_signal).
    pub fn is_alive(&mut self) -> bool {
        let Some(pid) = self.pid else {
            return false;
        };
        let mut raw: c_int = 0;
        let flags = libc::WNOHANG | libc::WUNTRACED | libc::WCONTINUED;
        // SAFETY: `raw` is a valid out-pointer.
        match unsafe { libc::waitpid(pid, &mut raw, flags) } {
            0 => true,
            r if r == pid => {
                if libc::WIFSTOPPED(raw) {
                    let signo = libc::WSTOPSIG(raw);
                    tracing::debug!(pid, signo, "child stopped");
                    self.stopped = Some(signo);
                    true
                } else if libc::WIFCONTINUED(raw) {
                    self.stopped = None;
                    true
                } else {
                    self.reaped(ExitStatus::from_raw(raw));
                    false
                }
            }
            _ => {
                // reaped elsewhere; the status is lost
                let err = io::Error::last_os_error();
                tracing::warn!(pid, "waitpid failed: {}", err);
                self.pid = None;
                self.stopped = None;
                self.terminal = None;
                false
            }
        }
    }

    /// Signal that stopped the child, as last observed by
    /// [`is_alive`](Self::is_alive); `None` while it runs.
    #[must_use]
    pub fn stopped_signal(&self) -> Option<i32> {
        self.stopped
    }

    /// Parent's end of the child's stdin pipe.
    ///
    /// # Errors
    ///
    /// [`ProcessError::StreamNotRedirected`] unless the mode is `Stdin`,
    /// [`ProcessError::StreamTaken`] after [`take_stdin`](Self::take_stdin).
    pub fn stdin_fd(&self) -> ProcessResult<BorrowedFd<'_>> {
        self.parent_fd(Stream::Stdin)
    }

    /// Parent's end of the child's stdout pipe (`Stdout` or `Combined`).
    ///
    /// # Errors
    ///
    /// See [`stdin_fd`](Self::stdin_fd).
    pub fn stdout_fd(&self) -> ProcessResult<BorrowedFd<'_>> {
        self.parent_fd(Stream::Stdout)
    }

    /// Parent's end of the child's stderr pipe (`Stderr` or `Combined`).
    ///
    /// # Errors
    ///
    /// See [`stdin_fd`](Self::stdin_fd).
    pub fn stderr_fd(&self) -> ProcessResult<BorrowedFd<'_>> {
        self.parent_fd(Stream::Stderr)
    }

    /// Take ownership of the stdin pipe. Dropping the file signals EOF to
    /// the child.
    ///
    /// # Errors
    ///
    /// See [`stdin_fd`](Self::stdin_fd).
    pub fn take_stdin(&mut self) -> ProcessResult<File> {
        self.take_parent_end(Stream::Stdin)
    }

    /// Take ownership of the stdout pipe.
    ///
    /// # Errors
    ///
    /// See [`stdin_fd`](Self::stdin_fd).
    pub fn take_stdout(&mut self) -> ProcessResult<File> {
        self.take_parent_end(Stream::Stdout)
    }

    /// Take ownership of the stderr pipe.
    ///
    /// # Errors
    ///
    /// See [`stdin_fd`](Self::stdin_fd).
    pub fn take_stderr(&mut self) -> ProcessResult<File> {
        self.take_parent_end(Stream::Stderr)
    }

    /// Child pid while it is running (or exited but not yet reaped)
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid.and_then(|pid| u32::try_from(pid).ok())
    }

    /// Exit status once the child has been reaped
    #[must_use]
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.status
    }

    /// Command line
    #[must_use]
    pub fn argv(&self) -> &[CString] {
        &self.argv
    }

    /// Redirection mode
    #[must_use]
    pub fn redirection(&self) -> Redirection {
        self.pipe.redirection()
    }

    fn program(&self) -> String {
        self.argv[0].to_string_lossy().into_owned()
    }

    fn spawn_error(&self, source: io::Error) -> ProcessError {
        ProcessError::SpawnFailed {
            program: self.program(),
            source,
        }
    }

    fn reaped(&mut self, status: ExitStatus) {
        tracing::debug!(pid = ?self.pid, %status, "child reaped");
        self.pid = None;
        self.status = Some(status);
        self.stopped = None;
        self.terminal = None;
    }

    fn check_stream(&self, stream: Stream) -> ProcessResult<()> {
        if self.redirection().covers(stream) {
            Ok(())
        } else {
            Err(ProcessError::StreamNotRedirected(stream))
        }
    }

    fn parent_fd(&self, stream: Stream) -> ProcessResult<BorrowedFd<'_>> {
        self.check_stream(stream)?;
        self.pipe
            .ends()
            .0
            .as_ref()
            .map(AsFd::as_fd)
            .ok_or(ProcessError::StreamTaken(stream))
    }

    fn take_parent_end(&mut self, stream: Stream) -> ProcessResult<File> {
        self.check_stream(stream)?;
        self.pipe
            .ends_mut()
            .0
            .take()
            .map(File::from)
            .ok_or(ProcessError::StreamTaken(stream))
    }
}

/// Runs in the forked child: wire the pipe onto the target streams and exec.
///
/// # Safety
///
/// Must only be called in a freshly forked child. `argv` must be a
/// NUL-terminated array of valid C strings.
unsafe fn exec_child(
    argv: *const *const c_char,
    child_fd: RawFd,
    parent_fd: Option<RawFd>,
    targets: &[c_int],
    take_terminal: bool,
    status_fd: RawFd,
) -> ! {
    unsafe {
        libc::setpgid(0, 0);

        if take_terminal {
            // we are a background group now; tcsetpgrp would raise SIGTTOU
            let previous = libc::signal(libc::SIGTTOU, libc::SIG_IGN);
            libc::tcsetpgrp(libc::STDIN_FILENO, libc::getpid());
            libc::signal(libc::SIGTTOU, previous);
        }

        // Rust ignores SIGPIPE and that disposition would survive exec.
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        let mut empty: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut empty);
        libc::sigprocmask(libc::SIG_SETMASK, &empty, std::ptr::null_mut());

        if let Some(fd) = parent_fd {
            libc::close(fd);
        }

        for &target in targets {
            if child_fd == target {
                // dup2 onto itself would leave FD_CLOEXEC set
                let flags = libc::fcntl(child_fd, libc::F_GETFD);
                if flags == -1 {
                    report_exec_failure(status_fd);
                }
                if libc::fcntl(child_fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) == -1 {
                    report_exec_failure(status_fd);
                }
            } else if libc::dup2(child_fd, target) == -1 {
                report_exec_failure(status_fd);
            }
        }

        if !targets.contains(&child_fd) {
            libc::close(child_fd);
        }

        libc::execvp(*argv, argv);
        report_exec_failure(status_fd)
    }
}

/// Write errno to the status pipe and exit without running destructors.
///
/// # Safety
///
/// Must only be called in a forked child.
unsafe fn report_exec_failure(status_fd: RawFd) -> ! {
    let errno = io::Error::last_os_error()
        .raw_os_error()
        .unwrap_or(libc::EINVAL);
    let bytes = errno.to_ne_bytes();
    unsafe {
        libc::write(status_fd, bytes.as_ptr().cast(), bytes.len());
        libc::_exit(EXEC_FAILURE_STATUS)
    }
}

/// Whether `fd` is a terminal whose foreground group is ours
fn holds_terminal(fd: RawFd) -> bool {
    // SAFETY: plain queries on a descriptor we do not own.
    unsafe { libc::isatty(fd) == 1 && libc::tcgetpgrp(fd) == libc::getpgrp() }
}

/// Terminal handed to a child's process group; dropping it takes the
/// terminal back
#[derive(Debug)]
struct ForegroundTerminal {
    tty: RawFd,
    previous: libc::pid_t,
}

impl ForegroundTerminal {
    /// The child may already have taken the terminal itself, so the guard
    /// is returned (and restores on drop) even if our own call fails.
    fn hand_to(tty: RawFd, pgid: libc::pid_t) -> Self {
        // SAFETY: plain query.
        let previous = unsafe { libc::getpgrp() };
        match set_foreground(tty, pgid) {
            Ok(()) => tracing::debug!(pgid, "terminal handed to child"),
            Err(e) => tracing::warn!(pgid, "cannot hand terminal to child: {}", e),
        }
        Self { tty, previous }
    }
}

impl Drop for ForegroundTerminal {
    fn drop(&mut self) {
        match set_foreground(self.tty, self.previous) {
            Ok(()) => tracing::debug!(pgid = self.previous, "terminal taken back"),
            Err(e) => tracing::warn!("cannot take terminal back: {}", e),
        }
    }
}

/// `tcsetpgrp` with `SIGTTOU` ignored, so a background caller is not stopped
fn set_foreground(tty: RawFd, pgid: libc::pid_t) -> io::Result<()> {
    // SAFETY: the previous disposition is restored before returning.
    unsafe {
        let previous = libc::signal(libc::SIGTTOU, libc::SIG_IGN);
        let result = libc::tcsetpgrp(tty, pgid);
        let err = io::Error::last_os_error();
        libc::signal(libc::SIGTTOU, previous);
        if result == -1 { Err(err) } else { Ok(()) }
    }
}

fn read_status(mut pipe: File, buf: &mut [u8; 4]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match pipe.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn wait_blocking(pid: libc::pid_t) -> io::Result<ExitStatus> {
    loop {
        let mut raw: c_int = 0;
        // SAFETY: `raw` is a valid out-pointer.
        if unsafe { libc::waitpid(pid, &mut raw, 0) } == -1 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        return Ok(ExitStatus::from_raw(raw));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sh(script: &str, redirection: Redirection) -> Subprocess {
        Subprocess::new(["sh", "-c", script], redirection).unwrap()
    }

    #[test]
    fn test_stdout_literal() {
        let mut child = Subprocess::new(["printf", "hello netcp"], Redirection::Stdout).unwrap();
        child.exec().unwrap();
        assert!(child.pid().is_some());

        let mut output = String::new();
        child.take_stdout().unwrap().read_to_string(&mut output).unwrap();
        assert_eq!(output, "hello netcp");

        let status = child.wait().unwrap().unwrap();
        assert!(status.success());
        assert!(child.pid().is_none());
    }

    #[test]
    fn test_stdout_fd_readable() {
        let mut child = Subprocess::new(["printf", "fd"], Redirection::Stdout).unwrap();
        child.exec().unwrap();

        let fd = child.stdout_fd().unwrap().try_clone_to_owned().unwrap();
        let mut output = String::new();
        File::from(fd).read_to_string(&mut output).unwrap();
        assert_eq!(output, "fd");
        child.wait().unwrap();
    }

    #[test]
    fn test_is_alive_until_exit() {
        let mut child = sh("printf 'hello netcp'; sleep 0.3", Redirection::Stdout);
        assert!(!child.is_alive());
        child.exec().unwrap();
        assert!(child.is_alive());

        let mut output = String::new();
        child.take_stdout().unwrap().read_to_string(&mut output).unwrap();
        assert_eq!(output, "hello netcp");

        assert!(child.wait().unwrap().unwrap().success());
        assert!(!child.is_alive());
        // cached
        assert!(child.wait().unwrap().unwrap().success());
    }

    #[test]
    fn test_stdin_redirection() {
        let mut child = sh(r#"read line; test "$line" = ping"#, Redirection::Stdin);
        child.exec().unwrap();

        let mut stdin = child.take_stdin().unwrap();
        stdin.write_all(b"ping\n").unwrap();
        drop(stdin);

        assert!(child.wait().unwrap().unwrap().success());
    }

    #[test]
    fn test_stderr_redirection() {
        let mut child = sh("echo oops >&2", Redirection::Stderr);
        child.exec().unwrap();

        let mut output = String::new();
        child.take_stderr().unwrap().read_to_string(&mut output).unwrap();
        assert_eq!(output, "oops\n");
        child.wait().unwrap();
    }

    #[test]
    fn test_combined_redirection() {
        let mut child = sh("echo out; echo err >&2", Redirection::Combined);
        child.exec().unwrap();
        assert!(child.stderr_fd().is_ok());

        let mut output = String::new();
        child.take_stdout().unwrap().read_to_string(&mut output).unwrap();
        assert_eq!(output, "out\nerr\n");
        assert!(matches!(
            child.take_stderr(),
            Err(ProcessError::StreamTaken(Stream::Stderr))
        ));
        child.wait().unwrap();
    }

    #[test]
    fn test_stream_not_redirected() {
        let child = Subprocess::new(["true"], Redirection::Stdout).unwrap();
        assert!(matches!(
            child.stdin_fd(),
            Err(ProcessError::StreamNotRedirected(Stream::Stdin))
        ));
        assert!(matches!(
            child.stderr_fd(),
            Err(ProcessError::StreamNotRedirected(Stream::Stderr))
        ));
    }

    #[test]
    fn test_exec_failure_reported() {
        let mut child =
            Subprocess::new(["netcp-no-such-command-xyz"], Redirection::Stdout).unwrap();
        let err = child.exec().unwrap_err();
        assert!(matches!(err, ProcessError::SpawnFailed { .. }));
        assert_eq!(err.os_code(), Some(libc::ENOENT));
        assert!(child.pid().is_none());
        assert!(!child.is_alive());
    }

    #[test]
    fn test_spawns_once() {
        let mut child = Subprocess::new(["true"], Redirection::Stdout).unwrap();
        child.exec().unwrap();
        assert!(matches!(child.exec(), Err(ProcessError::AlreadySpawned)));
        child.wait().unwrap();
    }

    #[test]
    fn test_kill_reaps() {
        let mut child = Subprocess::new(["sleep", "10"], Redirection::Stdout).unwrap();
        child.exec().unwrap();
        assert!(child.is_alive());

        child.kill().unwrap();
        assert!(!child.is_alive());
        assert!(child.pid().is_none());
        assert_eq!(child.exit_status().unwrap().signal(), Some(libc::SIGKILL));

        // no child left: both are no-ops
        child.kill().unwrap();
        assert_eq!(child.wait().unwrap().unwrap().signal(), Some(libc::SIGKILL));
    }

    #[test]
    fn test_stopped_child_reported() {
        let mut child = sh("kill -STOP $$", Redirection::Stdout);
        child.exec().unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while child.stopped_signal().is_none() && std::time::Instant::now() < deadline {
            assert!(child.is_alive());
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(child.stopped_signal(), Some(libc::SIGSTOP));

        child.kill().unwrap();
        assert_eq!(child.stopped_signal(), None);
        assert_eq!(child.exit_status().unwrap().signal(), Some(libc::SIGKILL));
    }

    #[test]
    fn test_reaped_elsewhere() {
        let mut child = Subprocess::new(["true"], Redirection::Stdout).unwrap();
        child.exec().unwrap();
        let pid = child.pid().unwrap() as libc::pid_t;
        // SAFETY: reaping our own child.
        unsafe {
            libc::waitpid(pid, std::ptr::null_mut(), 0);
        }

        assert!(!child.is_alive());
        assert!(child.pid().is_none());
        assert!(child.wait().unwrap().is_none());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_sigpipe_default_in_child() {
        let mut child = sh("grep SigIgn /proc/self/status", Redirection::Stdout);
        child.exec().unwrap();

        let mut output = String::new();
        child.take_stdout().unwrap().read_to_string(&mut output).unwrap();
        assert!(child.wait().unwrap().unwrap().success());

        let mask = output.trim().trim_start_matches("SigIgn:").trim();
        let ignored = u64::from_str_radix(mask, 16).unwrap();
        assert_eq!(ignored & (1 << (libc::SIGPIPE - 1)), 0, "SigIgn {mask}");
    }

    #[test]
    fn test_broken_pipe_kills_writer() {
        let mut child = sh("yes | head -c 1", Redirection::Combined);
        child.exec().unwrap();

        let mut output = String::new();
        child.take_stdout().unwrap().read_to_string(&mut output).unwrap();
        assert_eq!(output, "y");
        assert!(child.wait().unwrap().unwrap().success());
    }

    #[test]
    fn test_foreground_terminal_released() {
        // with or without a terminal on stdin, nothing is held after the reap
        let mut child = Subprocess::new(["true"], Redirection::Stdout)
            .unwrap()
            .foreground(true);
        child.exec().unwrap();
        assert!(child.wait().unwrap().unwrap().success());
        assert!(child.terminal.is_none());
    }

    #[test]
    fn test_wait_without_child() {
        let mut child = Subprocess::new(["true"], Redirection::Stdin).unwrap();
        assert!(child.wait().unwrap().is_none());
    }

    #[test]
    fn test_invalid_commands() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            Subprocess::new(empty, Redirection::Stdout),
            Err(ProcessError::EmptyCommand)
        ));
        assert!(matches!(
            Subprocess::new(["ec\0ho"], Redirection::Stdout),
            Err(ProcessError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_redirection_parse() {
        assert_eq!("stdout".parse::<Redirection>().unwrap(), Redirection::Stdout);
        assert_eq!("Combined".parse::<Redirection>().unwrap(), Redirection::Combined);
        assert!("both".parse::<Redirection>().is_err());
        assert!(Redirection::Combined.covers(Stream::Stderr));
        assert!(!Redirection::Stdin.covers(Stream::Stdout));
    }
}
