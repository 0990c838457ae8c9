// src/exec/command.rs

//! Shell command runner used by config-declared tasks.

use std::fs::{self, File};
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::errors::ExecutionError;
use crate::task::TaskId;

use super::process::WORKER_TASK_ENV;

/// Run `cmd` through the platform shell and wait for it.
///
/// With a `log_file`, stdout and stderr are both written there (the parent
/// directory is created if needed); otherwise they are inherited.
pub fn run_shell(id: &TaskId, cmd: &str, log_file: Option<&Path>) -> Result<(), ExecutionError> {
    info!(task = %id, cmd = %cmd, log_file = ?log_file, "starting task process");

    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    // Nested batchdag runs must not mistake themselves for workers.
    command.env_remove(WORKER_TASK_ENV);

    match log_file {
        Some(path) => {
            let (stdout, stderr) = open_log(path)?;
            command.stdout(stdout).stderr(stderr);
        }
        None => {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
    }

    let status = command
        .status()
        .map_err(|e| ExecutionError::Spawn(format!("{cmd}: {e}")))?;

    debug!(task = %id, code = ?status.code(), success = status.success(), "task process exited");

    if status.success() {
        Ok(())
    } else {
        Err(ExecutionError::CommandFailed {
            code: status.code(),
        })
    }
}

pub(crate) fn open_log(path: &Path) -> Result<(File, File), ExecutionError> {
    let log_err = |e: std::io::Error| ExecutionError::LogFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(log_err)?;
        }
    }
    let stdout = File::create(path).map_err(log_err)?;
    let stderr = stdout.try_clone().map_err(log_err)?;
    Ok((stdout, stderr))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn non_zero_exit_is_reported_with_code() {
        let id = TaskId::new("a");
        assert_eq!(
            run_shell(&id, "exit 3", None),
            Err(ExecutionError::CommandFailed { code: Some(3) })
        );
        assert_eq!(run_shell(&id, "true", None), Ok(()));
    }

    #[test]
    fn output_goes_to_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("logs").join("a.log");

        run_shell(&TaskId::new("a"), "echo out; echo err 1>&2", Some(&log)).unwrap();

        let text = std::fs::read_to_string(&log).unwrap();
        assert!(text.contains("out"));
        assert!(text.contains("err"));
    }
}
