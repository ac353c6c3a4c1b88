//! POSIX process-group management for spawned children (git and friends).
//! Grounded on the same `killpg`/SIGTERM→SIGKILL escalation used by the
//! teacher's shell-command runner: put every child in its own process
//! group at spawn time so a cancelling host can terminate the whole
//! subtree, not just the direct child, by signalling the negated pid.

use std::os::unix::process::CommandExt;
use std::process::{Child, Command};
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

/// Detach the spawned child into its own process group (pgid == its own
/// pid) before exec, so it and any descendants can be signalled together.
pub fn put_in_own_process_group(cmd: &mut Command) {
    cmd.process_group(0);
}

fn process_group_alive(pgid: Pid) -> bool {
    signal::kill(Pid::from_raw(-pgid.as_raw()), None).is_ok()
}

/// Send `SIGTERM` to the child's process group, wait `grace` (default
/// ~100ms), then `SIGKILL` if the group is still alive.
pub fn terminate_process_group(child: &mut Child) {
    terminate_process_group_with_grace(child, Duration::from_millis(100));
}

pub fn terminate_process_group_with_grace(child: &mut Child, grace: Duration) {
    let pgid = Pid::from_raw(child.id() as i32);

    let _ = signal::kill(Pid::from_raw(-pgid.as_raw()), Signal::SIGTERM);
    std::thread::sleep(grace);

    if process_group_alive(pgid) {
        let _ = signal::kill(Pid::from_raw(-pgid.as_raw()), Signal::SIGKILL);
    }

    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Stdio;

    #[test]
    fn terminate_kills_a_sleeping_child_group() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30").stdout(Stdio::null()).stderr(Stdio::null());
        put_in_own_process_group(&mut cmd);
        let mut child = cmd.spawn().expect("spawn sleep");

        terminate_process_group_with_grace(&mut child, Duration::from_millis(50));

        let status = child.try_wait().expect("try_wait");
        assert!(status.is_some(), "child should have exited after termination");
    }
}
