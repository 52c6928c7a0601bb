// src/process/local.rs

//! Local OS process backing a [`ProcessHandle`].

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::{RelaunchError, Result};
use crate::process::{ProcessEvent, ProcessEventSender, ProcessHandle};
use crate::profile::RunProfile;
use crate::types::ExecutionId;

/// Control requests sent from the handle to the monitor task.
#[derive(Debug, Clone, Copy)]
enum Control {
    Destroy,
    Kill,
    Detach,
}

#[derive(Default)]
struct State {
    terminating: AtomicBool,
    terminated: AtomicBool,
}

/// A process spawned from a profile's command line.
///
/// The handle itself is cheap and shareable; the child is owned by a
/// background monitor task that reacts to control requests and reports
/// [`ProcessEvent`]s when the process shuts down.
pub struct LocalProcess {
    profile_name: String,
    execution_id: ExecutionId,
    detach_is_default: bool,
    state: Arc<State>,
    control: mpsc::UnboundedSender<Control>,
}

impl LocalProcess {
    /// Spawn the profile's command and start monitoring it.
    pub fn spawn(
        profile: &RunProfile,
        execution_id: ExecutionId,
        events: ProcessEventSender,
    ) -> Result<Arc<LocalProcess>> {
        info!(
            profile = %profile.id,
            %execution_id,
            cmd = %profile.cmd,
            "starting process"
        );

        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&profile.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&profile.cmd);
            c
        };

        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        if let Some(cwd) = &profile.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &profile.env {
            cmd.env(k, v);
        }

        let mut child = cmd.spawn().map_err(|e| RelaunchError::SpawnFailed {
            profile: profile.id.clone(),
            source: e,
        })?;

        drain_output(&profile.id, execution_id, &mut child);

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let state = Arc::new(State::default());

        let handle = Arc::new(LocalProcess {
            profile_name: profile.id.clone(),
            execution_id,
            detach_is_default: profile.detach_is_default,
            state: Arc::clone(&state),
            control: control_tx,
        });

        tokio::spawn(monitor(
            profile.id.clone(),
            execution_id,
            child,
            control_rx,
            state,
            events,
        ));

        Ok(handle)
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }
}

impl ProcessHandle for LocalProcess {
    fn is_terminated(&self) -> bool {
        self.state.terminated.load(Ordering::SeqCst)
    }

    fn is_terminating(&self) -> bool {
        self.state.terminating.load(Ordering::SeqCst) && !self.is_terminated()
    }

    fn detach_is_default(&self) -> bool {
        self.detach_is_default
    }

    fn destroy(&self) {
        if self.is_terminated() {
            return;
        }
        self.state.terminating.store(true, Ordering::SeqCst);
        if self.control.send(Control::Destroy).is_err() {
            debug!(
                profile = %self.profile_name,
                execution_id = %self.execution_id,
                "destroy requested but monitor already finished"
            );
        }
    }

    fn detach(&self) {
        // A detached process is no longer ours; report it as terminated so
        // "running" queries and the termination wait stop considering it.
        self.state.terminated.store(true, Ordering::SeqCst);
        if self.control.send(Control::Detach).is_err() {
            debug!(
                profile = %self.profile_name,
                execution_id = %self.execution_id,
                "detach requested but monitor already finished"
            );
        }
    }

    fn can_kill(&self) -> bool {
        true
    }

    fn kill(&self) {
        if self.is_terminated() {
            return;
        }
        self.state.terminating.store(true, Ordering::SeqCst);
        let _ = self.control.send(Control::Kill);
    }
}

/// Consume stdout/stderr so OS buffers don't fill; log lines at debug.
fn drain_output(profile: &str, execution_id: ExecutionId, child: &mut Child) {
    if let Some(stdout) = child.stdout.take() {
        let profile = profile.to_string();
        tokio::spawn(async move {
            let reader = BufReader::new(stdout);
            let mut lines = reader.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(profile = %profile, %execution_id, "stdout: {}", line);
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let profile = profile.to_string();
        tokio::spawn(async move {
            let reader = BufReader::new(stderr);
            let mut lines = reader.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(profile = %profile, %execution_id, "stderr: {}", line);
            }
        });
    }
}

/// Own the child until it exits, is killed, or is detached.
async fn monitor(
    profile: String,
    execution_id: ExecutionId,
    mut child: Child,
    mut control_rx: mpsc::UnboundedReceiver<Control>,
    state: Arc<State>,
    events: ProcessEventSender,
) {
    let mut control_closed = false;

    loop {
        tokio::select! {
            status_res = child.wait() => {
                let exit_code = match status_res {
                    Ok(status) => {
                        info!(
                            profile = %profile,
                            %execution_id,
                            exit_code = ?status.code(),
                            success = status.success(),
                            "process exited"
                        );
                        status.code()
                    }
                    Err(err) => {
                        warn!(
                            profile = %profile,
                            %execution_id,
                            error = %err,
                            "waiting for process failed; treating as terminated"
                        );
                        None
                    }
                };

                state.terminated.store(true, Ordering::SeqCst);
                let _ = events.send(ProcessEvent::Terminated {
                    execution_id,
                    exit_code,
                });
                return;
            }

            ctrl = control_rx.recv(), if !control_closed => {
                match ctrl {
                    Some(Control::Destroy) => {
                        info!(profile = %profile, %execution_id, "terminating process");
                        let _ = events.send(ProcessEvent::WillTerminate { execution_id });
                        if let Err(e) = child.start_kill() {
                            warn!(
                                profile = %profile,
                                %execution_id,
                                error = %e,
                                "failed to signal process for termination"
                            );
                        }
                        // Keep looping: the wait() arm reports the exit.
                    }
                    Some(Control::Kill) => {
                        info!(profile = %profile, %execution_id, "force-killing process");
                        if let Err(e) = child.start_kill() {
                            warn!(
                                profile = %profile,
                                %execution_id,
                                error = %e,
                                "failed to force-kill process"
                            );
                        }
                    }
                    Some(Control::Detach) => {
                        info!(
                            profile = %profile,
                            %execution_id,
                            "detaching from process; it keeps running"
                        );
                        // No Terminated event for a detached process: the
                        // handle already reports terminated and the run is
                        // disposed by the coordinator's stop path.
                        return;
                    }
                    None => {
                        // All handles dropped; keep waiting for the exit so
                        // the child is reaped.
                        control_closed = true;
                    }
                }
            }
        }
    }
}
