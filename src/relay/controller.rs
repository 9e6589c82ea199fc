//! Pause/resume decisions for the upstream source.
//!
//! The controller only decides; the relay issues the returned
//! [`SourceCommand`] outside its critical section. Decisions flip the
//! controller's view of the source immediately, so repeated requests in the
//! same direction collapse to `None`.

/// A flow-control call to make on the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCommand {
    Pause,
    Resume,
}

/// Tracks whether the source is paused and whether a `resume()` call is in
/// progress.
#[derive(Debug)]
pub struct SourceController {
    high_water_mark: usize,
    paused: bool,
    resuming: bool,
}

impl SourceController {
    pub fn new(high_water_mark: usize) -> Self {
        Self {
            high_water_mark: high_water_mark.max(1),
            paused: false,
            resuming: false,
        }
    }

    /// The buffer grew. `excess` is the number of buffered items beyond what
    /// outstanding demand will take right away.
    pub fn on_buffer_grew(&mut self, excess: usize) -> Option<SourceCommand> {
        if excess >= self.high_water_mark && !self.paused {
            self.paused = true;
            Some(SourceCommand::Pause)
        } else {
            None
        }
    }

    /// The buffer holds no items. Resumes a paused source unless a
    /// `resume()` call is already underway.
    pub fn on_buffer_shrank(&mut self, buffered: usize) -> Option<SourceCommand> {
        if buffered == 0 && self.paused && !self.resuming {
            self.paused = false;
            self.resuming = true;
            Some(SourceCommand::Resume)
        } else {
            None
        }
    }

    /// Release backpressure unconditionally (cancellation). Same guards as
    /// [`on_buffer_shrank`](Self::on_buffer_shrank), minus the occupancy check.
    pub fn release(&mut self) -> Option<SourceCommand> {
        self.on_buffer_shrank(0)
    }

    /// The source's `resume()` returned.
    pub fn resume_returned(&mut self) {
        self.resuming = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[cfg(test)]
    pub fn is_resuming(&self) -> bool {
        self.resuming
    }

    #[cfg(test)]
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }
}
