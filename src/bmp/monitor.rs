//! Per-row progress reporting and cooperative cancellation.

use enough::Stop;

/// How a pixel pass ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Completion {
    Finished,
    /// The stop signal fired; rows already produced are kept.
    Aborted,
    /// Input ran out inside the pixel data.
    Truncated,
}

pub(crate) struct RowMonitor<'a> {
    stop: &'a dyn Stop,
    progress: Option<&'a mut (dyn FnMut(f32) + 'a)>,
    total: u32,
    done: u32,
}

impl<'a> RowMonitor<'a> {
    pub fn new<'p: 'a>(
        stop: &'a dyn Stop,
        progress: Option<&'a mut (dyn FnMut(f32) + 'p)>,
        total: u32,
    ) -> Self {
        Self {
            stop,
            progress: progress.map(|p| p as &mut (dyn FnMut(f32) + 'a)),
            total,
            done: 0,
        }
    }

    pub fn should_stop(&self) -> bool {
        self.stop.check().is_err()
    }

    /// Record a finished output row and report the running percentage.
    pub fn row_done(&mut self) {
        self.done += 1;
        if let Some(progress) = self.progress.as_deref_mut() {
            let pct = 100.0 * self.done.min(self.total) as f32 / self.total.max(1) as f32;
            progress(pct);
        }
    }

    pub fn rows_done(&self) -> u32 {
        self.done
    }
}
