//! Watchdog - command 1 件ごとのタイムアウト検知
//!
//! backend 呼び出しそのものは止められないので、watchdog ができるのは
//! 「時間切れになった」ことを別タスクから知らせることだけです。
//!
//! # 状態遷移
//! `ARMED -> FIRED` または `ARMED -> CANCELLED` の一度きり（compare-and-swap）。
//! - 発火が始まった後の cancel は何もしない
//! - cancel 後の発火は絶対に起きない

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::trace;

use crate::domain::{CommandId, StatusCommand, WatchdogError};

const ARMED: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// How a watchdog ended when its handle was disarmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disarmed {
    /// Cancelled before the deadline; `on_fire` never ran.
    Cancelled,
    /// The deadline had already passed and `on_fire` ran (or is running).
    AlreadyFired,
}

/// Arms at most one timer at a time.
///
/// Clones share the same slot, so a clone can observe whether a command is
/// currently guarded.
#[derive(Debug, Clone, Default)]
pub struct Watchdog {
    slot: Arc<Slot>,
}

#[derive(Debug, Default)]
struct Slot {
    armed: AtomicBool,
    // only read on the error path, to name the command holding the slot
    holder: std::sync::Mutex<Option<CommandId>>,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Is a command currently guarded by this watchdog?
    pub fn is_armed(&self) -> bool {
        self.slot.armed.load(Ordering::Acquire)
    }

    /// Start a timer that calls `on_fire(&command)` once after `duration`.
    ///
    /// Must be called from within a tokio runtime. Fails if the previous
    /// handle from this watchdog has not been disarmed or dropped yet.
    pub fn arm<F>(
        &self,
        command: StatusCommand,
        duration: Duration,
        on_fire: F,
    ) -> Result<WatchdogHandle, WatchdogError>
    where
        F: FnOnce(&StatusCommand) + Send + 'static,
    {
        if self
            .slot
            .armed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let armed_for = self
                .slot
                .holder
                .lock()
                .ok()
                .and_then(|holder| *holder)
                .unwrap_or(command.id);
            return Err(WatchdogError::AlreadyArmed {
                armed_for,
                requested: command.id,
            });
        }
        if let Ok(mut holder) = self.slot.holder.lock() {
            *holder = Some(command.id);
        }

        let command_id = command.id;
        let state = Arc::new(AtomicU8::new(ARMED));
        let timer = tokio::spawn({
            let state = Arc::clone(&state);
            async move {
                tokio::time::sleep(duration).await;
                if state
                    .compare_exchange(ARMED, FIRED, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    on_fire(&command);
                }
            }
        });
        trace!(command_id = %command_id, ?duration, "watchdog armed");

        Ok(WatchdogHandle {
            command_id,
            state,
            timer: Some(timer.abort_handle()),
            slot: Arc::clone(&self.slot),
        })
    }
}

/// Timer state for one in-flight command.
///
/// Dropping the handle cancels the timer, so a worker that dies mid-command
/// never leaves a watchdog behind.
#[derive(Debug)]
pub struct WatchdogHandle {
    command_id: CommandId,
    state: Arc<AtomicU8>,
    timer: Option<AbortHandle>,
    slot: Arc<Slot>,
}

impl WatchdogHandle {
    pub fn command_id(&self) -> CommandId {
        self.command_id
    }

    pub fn has_fired(&self) -> bool {
        self.state.load(Ordering::Acquire) == FIRED
    }

    /// Cancel the timer. A no-op on the callback if it already fired.
    pub fn disarm(mut self) -> Disarmed {
        self.release()
    }

    fn release(&mut self) -> Disarmed {
        let outcome = match self.state.compare_exchange(
            ARMED,
            CANCELLED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) | Err(CANCELLED) => Disarmed::Cancelled,
            Err(_) => Disarmed::AlreadyFired,
        };
        if let Some(timer) = self.timer.take() {
            // after FIRED the callback is not interrupted: it runs to completion
            // within the poll that won the race
            if outcome == Disarmed::Cancelled {
                timer.abort();
            }
            if let Ok(mut holder) = self.slot.holder.lock() {
                *holder = None;
            }
            self.slot.armed.store(false, Ordering::Release);
            trace!(command_id = %self.command_id, ?outcome, "watchdog disarmed");
        }
        outcome
    }
}

impl Drop for WatchdogHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce(&StatusCommand) + Send + 'static) {
        let fired = Arc::new(AtomicUsize::new(0));
        let hook = {
            let fired = Arc::clone(&fired);
            move |_: &StatusCommand| {
                fired.fetch_add(1, Ordering::SeqCst);
            }
        };
        (fired, hook)
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_before_deadline_prevents_fire() {
        let watchdog = Watchdog::new();
        let (fired, hook) = counter();

        let handle = watchdog
            .arm(StatusCommand::status("NAMENODE"), Duration::from_secs(5), hook)
            .unwrap();
        assert!(watchdog.is_armed());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.disarm(), Disarmed::Cancelled);
        assert!(!watchdog.is_armed());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fires_exactly_once_after_deadline() {
        let watchdog = Watchdog::new();
        let (fired, hook) = counter();

        let handle = watchdog
            .arm(StatusCommand::status("DATANODE"), Duration::from_secs(1), hook)
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(handle.has_fired());
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.disarm(), Disarmed::AlreadyFired);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fire_hook_receives_bound_command() {
        let watchdog = Watchdog::new();
        let seen = Arc::new(std::sync::Mutex::new(None));
        let command = StatusCommand::status("HBASE_REGIONSERVER");
        let expected = command.id;

        let _handle = watchdog
            .arm(command, Duration::from_millis(10), {
                let seen = Arc::clone(&seen);
                move |command: &StatusCommand| {
                    *seen.lock().unwrap() = Some(command.id);
                }
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*seen.lock().unwrap(), Some(expected));
    }

    #[tokio::test(start_paused = true)]
    async fn arming_twice_fails_loudly() {
        let watchdog = Watchdog::new();
        let first = StatusCommand::status("NAMENODE");
        let first_id = first.id;
        let _handle = watchdog
            .arm(first, Duration::from_secs(5), |_: &StatusCommand| {})
            .unwrap();

        let second = StatusCommand::status("DATANODE");
        let second_id = second.id;
        let err = watchdog
            .arm(second, Duration::from_secs(5), |_: &StatusCommand| {})
            .unwrap_err();

        assert_eq!(
            err,
            WatchdogError::AlreadyArmed {
                armed_for: first_id,
                requested: second_id,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_cancels_and_frees_slot() {
        let watchdog = Watchdog::new();
        let (fired, hook) = counter();

        let handle = watchdog
            .arm(StatusCommand::status("NAMENODE"), Duration::from_secs(1), hook)
            .unwrap();
        drop(handle);
        assert!(!watchdog.is_armed());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        let again = watchdog.arm(
            StatusCommand::status("NAMENODE"),
            Duration::from_secs(1),
            |_: &StatusCommand| {},
        );
        assert!(again.is_ok());
    }
}
