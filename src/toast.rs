use std::time::{Duration, Instant};

pub const TOAST_DURATION: Duration = Duration::from_secs(3);

/// Single-slot notification banner. A new message replaces the pending one
/// and restarts the window.
#[derive(Debug)]
pub struct Toast {
    duration: Duration,
    active: Option<(String, Instant)>,
}

impl Default for Toast {
    fn default() -> Self {
        Self::new(TOAST_DURATION)
    }
}

impl Toast {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            active: None,
        }
    }

    pub fn notify(&mut self, message: impl Into<String>, now: Instant) {
        self.active = Some((message.into(), now + self.duration));
    }

    /// Message still on screen at `now`; clears it once expired.
    pub fn current(&mut self, now: Instant) -> Option<&str> {
        if matches!(&self.active, Some((_, until)) if now >= *until) {
            self.active = None;
        }
        self.active.as_ref().map(|(m, _)| m.as_str())
    }

    pub fn cancel(&mut self) -> bool {
        self.active.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_after_three_seconds() {
        let t0 = Instant::now();
        let mut toast = Toast::default();
        toast.notify("Student added", t0);
        assert_eq!(toast.current(t0), Some("Student added"));
        assert_eq!(
            toast.current(t0 + Duration::from_millis(2999)),
            Some("Student added")
        );
        assert_eq!(toast.current(t0 + TOAST_DURATION), None);
    }

    #[test]
    fn new_message_resets_the_window() {
        let t0 = Instant::now();
        let mut toast = Toast::default();
        toast.notify("Student added", t0);
        let t1 = t0 + Duration::from_secs(2);
        toast.notify("Student deleted", t1);
        assert_eq!(
            toast.current(t0 + Duration::from_secs(4)),
            Some("Student deleted")
        );
        assert_eq!(toast.current(t1 + TOAST_DURATION), None);
    }

    #[test]
    fn cancel_clears_pending_message() {
        let t0 = Instant::now();
        let mut toast = Toast::default();
        assert!(!toast.cancel());
        toast.notify("Student updated", t0);
        assert!(toast.cancel());
        assert_eq!(toast.current(t0), None);
    }
}
