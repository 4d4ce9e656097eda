use std::os::unix::io::AsRawFd;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;

/// Return the user's default shell from `$SHELL`, falling back to `sh`.
fn user_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "sh".to_string())
}

/// Human-readable description of the shell for log messages.
pub fn shell_name() -> String {
    let shell = user_shell();
    format!("{} -lc", shell)
}

pub fn shell_command(command: &str) -> Command {
    let shell = user_shell();
    let mut cmd = Command::new(&shell);
    // Login shell (-l) sources the user's profile/rc files so that
    // PATH and other environment customisations are available.
    cmd.arg("-l").arg("-c").arg(command);
    cmd
}

pub fn configure_detached(cmd: &mut Command) {
    cmd.process_group(0);
    cmd.kill_on_drop(false);
}

pub async fn terminate_pid(pid: u32, grace: Duration) -> bool {
    let pgid = Pid::from_raw(pid as i32);
    match killpg(pgid, Signal::SIGTERM) {
        Ok(()) => {
            debug!(pid, "sent SIGTERM to process group");
        }
        Err(nix::errno::Errno::ESRCH) => {
            // Not a group leader (or already gone); fall back to the pid itself.
            match kill(pgid, Signal::SIGTERM) {
                Ok(()) => debug!(pid, "sent SIGTERM to process"),
                Err(_) => {
                    debug!(pid, "process already exited");
                    return false;
                }
            }
        }
        Err(e) => {
            warn!(pid, error = %e, "killpg(SIGTERM) failed, sending SIGKILL");
            let _ = kill(pgid, Signal::SIGKILL);
            return true;
        }
    }

    let deadline = tokio::time::Instant::now() + grace;
    while tokio::time::Instant::now() < deadline {
        if !is_process_alive(pid) {
            debug!(pid, "process exited after SIGTERM");
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    warn!(pid, "process did not exit within {:?}, sending SIGKILL", grace);
    let _ = killpg(pgid, Signal::SIGKILL);
    let _ = kill(pgid, Signal::SIGKILL);
    true
}

pub fn is_process_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    if kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }
    // Zombies still answer kill(0); treat them as gone.
    !is_zombie(pid)
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{}/stat", pid))
        .ok()
        .and_then(|stat| {
            // Field 3 follows the parenthesised command name.
            let after = stat.rsplit_once(')')?.1;
            after.split_whitespace().next().map(|s| s == "Z")
        })
        .unwrap_or(false)
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(_pid: u32) -> bool {
    false
}

pub fn lock_exclusive(file: &std::fs::File) -> std::io::Result<()> {
    // SAFETY: fd is valid for the lifetime of `file`
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(target_os = "linux")]
pub fn identify_port_owner(port: u16) -> Option<String> {
    let port_hex = format!("{:04X}", port);

    let mut target_inode: Option<String> = None;
    for table in ["/proc/net/tcp", "/proc/net/tcp6"] {
        let Ok(content) = std::fs::read_to_string(table) else {
            continue;
        };
        for line in content.lines().skip(1) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 {
                continue;
            }
            if fields[1].rsplit(':').next() == Some(port_hex.as_str()) {
                target_inode = Some(fields[9].to_string());
                break;
            }
        }
        if target_inode.is_some() {
            break;
        }
    }

    let inode = target_inode?;
    if inode == "0" {
        return None;
    }

    let needle = format!("socket:[{}]", inode);
    let proc_dir = std::fs::read_dir("/proc").ok()?;
    for entry in proc_dir.flatten() {
        let pid_str = entry.file_name().to_string_lossy().to_string();
        if !pid_str.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let Ok(fds) = std::fs::read_dir(format!("/proc/{}/fd", pid_str)) else {
            continue;
        };
        for fd_entry in fds.flatten() {
            let Ok(link) = std::fs::read_link(fd_entry.path()) else {
                continue;
            };
            if link.to_string_lossy() != needle {
                continue;
            }
            let cmd = std::fs::read_to_string(format!("/proc/{}/cmdline", pid_str))
                .map(|c| c.replace('\0', " ").trim().to_string())
                .unwrap_or_default();
            return Some(owner_label(&cmd, &pid_str));
        }
    }

    None
}

/// `cmd (PID n)`, with long command lines cut to 57 characters.
#[cfg(target_os = "linux")]
fn owner_label(cmd: &str, pid: &str) -> String {
    match cmd.chars().count() {
        0 => format!("PID {}", pid),
        n if n > 60 => format!("{}... (PID {})", cmd.chars().take(57).collect::<String>(), pid),
        _ => format!("{} (PID {})", cmd, pid),
    }
}

#[cfg(not(target_os = "linux"))]
pub fn identify_port_owner(_port: u16) -> Option<String> {
    None
}
