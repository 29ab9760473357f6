//! Progress reporting from analyzers

/// Receives advisory completion updates from a running analyzer
///
/// Implementations must return immediately; analyzers call `report` from
/// inside their hot loops. Values are percentages and callers may exceed 100,
/// so implementations clamp.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, percent: u8);

    /// Report `done` out of `total` steps
    fn report_step(&self, done: usize, total: usize) {
        if total > 0 {
            let pct = (done.min(total) * 100 / total) as u8;
            self.report(pct);
        }
    }
}

/// Reporter that discards every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _percent: u8) {}
}

impl<F> ProgressReporter for F
where
    F: Fn(u8) + Send + Sync,
{
    fn report(&self, percent: u8) {
        self(percent.min(100));
    }
}
