use std::thread;

use crate::cli::LogAction;
use crate::logger::{follow_poll, tail_lines, FollowCursor, FollowEvent, FOLLOW_POLL_INTERVAL, FOLLOW_REAPPEAR_TIMEOUT};

pub fn run_log(action: LogAction) -> Result<(), crate::CtxForgeError> {
    let LogAction::Tail { file, lines, follow } = action;

    let path = file.ok_or_else(|| {
        crate::CtxForgeError::Config("log tail: no --file given and no log file configured".to_string())
    })?;

    let initial = tail_lines(&path, lines).map_err(|e| crate::CtxForgeError::Config(e.to_string()))?;
    for line in &initial {
        println!("{line}");
    }

    if !follow {
        return Ok(());
    }

    let mut cursor = FollowCursor {
        offset: std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0),
    };
    let mut waited = std::time::Duration::ZERO;

    loop {
        match follow_poll(&path, &mut cursor) {
            Ok(FollowEvent::Lines(lines)) => {
                waited = std::time::Duration::ZERO;
                for line in lines {
                    println!("{line}");
                }
            }
            Ok(FollowEvent::Reopened) => {
                waited = std::time::Duration::ZERO;
            }
            Ok(FollowEvent::Waiting) => {
                waited += FOLLOW_POLL_INTERVAL;
                if !path.exists() && waited > FOLLOW_REAPPEAR_TIMEOUT {
                    return Err(crate::CtxForgeError::Config(format!(
                        "timed out waiting for {} to reappear",
                        path.display()
                    )));
                }
            }
            Err(e) => return Err(crate::CtxForgeError::Config(e.to_string())),
        }
        thread::sleep(FOLLOW_POLL_INTERVAL);
    }
}
