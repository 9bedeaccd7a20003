//! Observational notifications emitted while talking to a device.

/// Device identity summary, assembled during dive enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceInfo {
    /// Numeric model code (0 for unrecognized variants).
    pub model: u32,
    /// Firmware version, 0 when not reported.
    pub firmware: u32,
    /// Device serial number.
    pub serial: u32,
}

/// Receives observational notifications during long-running operations.
///
/// All methods default to no-ops; implement only what you care about. The
/// unit type implements the trait, so callers without any interest in
/// events can pass `&mut ()`.
pub trait EventHandler {
    /// Raw identification block as reported by the device.
    fn vendor(&mut self, data: &[u8]) {
        let _ = data;
    }

    /// Monotone byte-level progress. `maximum` can grow while an operation
    /// discovers additional work.
    fn progress(&mut self, current: u32, maximum: u32) {
        let _ = (current, maximum);
    }

    /// Model, firmware and serial number summary.
    fn device_info(&mut self, info: &DeviceInfo) {
        let _ = info;
    }
}

/// No-op handler.
impl EventHandler for () {}

/// Progress bookkeeping shared by download loops.
pub(crate) struct Progress {
    current: u32,
    maximum: u32,
}

impl Progress {
    pub(crate) fn new(maximum: u32) -> Self {
        Self {
            current: 0,
            maximum,
        }
    }

    /// Raise the expected total without advancing.
    pub(crate) fn grow(&mut self, n: u32) {
        self.maximum += n;
    }

    /// Advance and notify.
    pub(crate) fn advance(&mut self, events: &mut dyn EventHandler, n: u32) {
        self.current += n;
        events.progress(self.current, self.maximum);
    }

    /// Notify without advancing.
    pub(crate) fn emit(&self, events: &mut dyn EventHandler) {
        events.progress(self.current, self.maximum);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        updates: Vec<(u32, u32)>,
    }

    impl EventHandler for Recorder {
        fn progress(&mut self, current: u32, maximum: u32) {
            self.updates.push((current, maximum));
        }
    }

    #[test]
    fn test_progress_monotone() {
        let mut recorder = Recorder::default();
        let mut progress = Progress::new(100);
        progress.emit(&mut recorder);
        progress.advance(&mut recorder, 40);
        progress.grow(4);
        progress.advance(&mut recorder, 4);

        assert_eq!(recorder.updates, vec![(0, 100), (40, 100), (44, 104)]);
    }

    #[test]
    fn test_unit_handler_is_silent() {
        let mut progress = Progress::new(10);
        progress.advance(&mut (), 10);
    }
}
