use std::time::Duration;
use tokio::process::Command;

#[cfg(unix)]
mod unix;

#[cfg(unix)]
use unix as imp;

/// Create a platform-appropriate shell command.
/// Unix: `$SHELL -l -c <command>`.
pub fn shell_command(command: &str) -> Command {
    imp::shell_command(command)
}

/// Configure the command to run detached in its own process group so that
/// it survives the CLI exiting and can be signalled as a group later.
pub fn configure_detached(cmd: &mut Command) {
    imp::configure_detached(cmd)
}

/// Terminate a process group led by `pid`. Sends a graceful signal first and
/// force-kills once `grace` elapses. Returns false when nothing was running.
pub async fn terminate_pid(pid: u32, grace: Duration) -> bool {
    imp::terminate_pid(pid, grace).await
}

/// Check if a process with the given PID is still alive.
pub fn is_process_alive(pid: u32) -> bool {
    imp::is_process_alive(pid)
}

/// Identify which process owns a given TCP port.
pub fn identify_port_owner(port: u16) -> Option<String> {
    imp::identify_port_owner(port)
}

/// Shell name for log messages.
pub fn shell_name() -> String {
    imp::shell_name()
}

/// Hold an exclusive advisory lock on `file` until it is dropped.
pub fn lock_exclusive(file: &std::fs::File) -> std::io::Result<()> {
    imp::lock_exclusive(file)
}
