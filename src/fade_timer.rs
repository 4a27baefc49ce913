//! Cancellable periodic timer driving the near-end fade.
//!
//! The engine exposes only point-in-time position queries, so the fade is
//! sampled by polling. A [`FadeTask`] is created on entering `Playing` and
//! cancelled on any exit from it; ticks carry the task generation so samples
//! from a cancelled task can be told apart from the live one.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use log::trace;
use tokio::sync::mpsc::UnboundedSender;

use crate::protocol::Message;

/// Opacity for a player with `remaining_secs` left inside a fade window.
///
/// Scales linearly from 1.0 at the window start to 0.0 at the end. Pinned to
/// 1.0 outside the window or while the duration is unknown.
pub fn fade_opacity(duration_secs: f64, elapsed_secs: f64, window_secs: f64) -> f64 {
    if duration_secs <= 0.0 || window_secs <= 0.0 {
        return 1.0;
    }
    let remaining = duration_secs - elapsed_secs;
    if (0.0..=window_secs).contains(&remaining) {
        remaining / window_secs
    } else {
        1.0
    }
}

/// Handle to a running fade timer. Dropping the handle cancels the timer.
#[derive(Debug)]
pub struct FadeTask {
    generation: u64,
    cancelled: Arc<AtomicBool>,
}

impl FadeTask {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Shared flag observed by the timer implementation.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }
}

impl Drop for FadeTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Creates fade timers.
pub trait FadeScheduler {
    fn start(&mut self, generation: u64, interval: Duration) -> FadeTask;
}

/// Posts [`Message::FadeTick`] onto the runtime bus from a ticker thread.
pub struct ThreadFadeScheduler {
    bus_sender: UnboundedSender<Message>,
}

impl ThreadFadeScheduler {
    pub fn new(bus_sender: UnboundedSender<Message>) -> Self {
        Self { bus_sender }
    }
}

impl FadeScheduler for ThreadFadeScheduler {
    fn start(&mut self, generation: u64, interval: Duration) -> FadeTask {
        let task = FadeTask::new(generation);
        let cancelled = task.cancel_flag();
        let bus_sender = self.bus_sender.clone();
        let spawn_result = thread::Builder::new()
            .name(format!("fade-timer-{generation}"))
            .spawn(move || loop {
                thread::sleep(interval);
                if cancelled.load(Ordering::SeqCst) {
                    trace!("ThreadFadeScheduler: timer {} stopped", generation);
                    break;
                }
                if bus_sender.send(Message::FadeTick { generation }).is_err() {
                    break;
                }
            });
        if let Err(err) = spawn_result {
            log::error!("ThreadFadeScheduler: failed to spawn fade timer: {}", err);
        }
        task
    }
}

#[cfg(test)]
mod tests {
    use super::{fade_opacity, FadeScheduler, FadeTask, ThreadFadeScheduler};
    use crate::protocol::Message;
    use std::time::Duration;

    #[test]
    fn test_opacity_is_pinned_outside_fade_window() {
        assert_eq!(fade_opacity(200.0, 10.0, 5.0), 1.0);
        assert_eq!(fade_opacity(200.0, 194.9, 5.0), 1.0);
        assert_eq!(fade_opacity(0.0, 0.0, 5.0), 1.0);
        assert_eq!(fade_opacity(200.0, 201.0, 5.0), 1.0);
    }

    #[test]
    fn test_opacity_scales_linearly_inside_fade_window() {
        assert!((fade_opacity(200.0, 195.0, 5.0) - 1.0).abs() < 1e-9);
        assert!((fade_opacity(200.0, 197.5, 5.0) - 0.5).abs() < 1e-9);
        assert!((fade_opacity(200.0, 199.0, 5.0) - 0.2).abs() < 1e-9);
        assert!(fade_opacity(200.0, 200.0, 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_dropping_task_cancels_it() {
        let task = FadeTask::new(3);
        let flag = task.cancel_flag();
        assert!(!task.is_cancelled());
        drop(task);
        assert!(flag.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_thread_scheduler_ticks_until_cancelled() {
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        let mut scheduler = ThreadFadeScheduler::new(sender);
        let task = scheduler.start(9, Duration::from_millis(5));

        let first = receiver.blocking_recv();
        assert_eq!(first, Some(Message::FadeTick { generation: 9 }));

        task.cancel();
        std::thread::sleep(Duration::from_millis(40));
        while receiver.try_recv().is_ok() {}
        std::thread::sleep(Duration::from_millis(40));
        assert!(receiver.try_recv().is_err());
    }
}
