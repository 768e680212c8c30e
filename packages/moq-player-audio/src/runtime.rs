//! A dedicated OS thread that drives the real-time audio consumer loop.
//!
//! The audio thread must stay outside whatever cooperative executor the
//! session and presentation sides share — it runs a fixed-budget quantum on
//! its own schedule and must never be delayed behind an unrelated task.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::priority::raise_thread_priority;

/// Owns the background thread driving one audio consumer's quantum loop.
/// Dropping it (or calling [`Self::shutdown`]) signals the thread to drain
/// and exit; it never blocks on a remote peer, only on its own join.
pub struct AudioThreadHandle {
    cancel: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl AudioThreadHandle {
    /// Spawns a named OS thread that calls `quantum` every `period` until
    /// shut down, raising its own scheduling priority first.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS fails to spawn the thread.
    pub fn spawn<F>(name: &str, period: Duration, mut quantum: F) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        let name = name.to_string();

        let thread = thread::Builder::new().name(name.clone()).spawn(move || {
            raise_thread_priority();
            log::info!("audio thread '{name}' started");
            while !cancel_clone.is_cancelled() {
                quantum();
                thread::sleep(period);
            }
            log::info!("audio thread '{name}' draining and exiting");
        })?;

        Ok(Self {
            cancel,
            thread: Some(thread),
        })
    }

    /// Signals the thread to stop and waits for it to exit.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(thread) = self.thread.take() {
            if let Err(panic) = thread.join() {
                log::error!("audio thread panicked: {panic:?}");
            }
        }
    }
}

impl Drop for AudioThreadHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.shutdown();
        }
    }
}
