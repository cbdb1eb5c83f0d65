use crate::error::CoreError;
use chrono::NaiveTime;

/// A daily `start..end` window during which regulation is active.
///
/// `end < start` is legal and means the window crosses midnight (e.g.
/// `22:00-06:00`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegulationWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl RegulationWindow {
    /// Parses `HH:MM-HH:MM`.
    pub fn parse(spec: &str) -> Result<Self, CoreError> {
        let (start, end) = spec
            .split_once('-')
            .ok_or_else(|| CoreError::InvalidWindow(spec.to_string()))?;
        Ok(RegulationWindow { start: parse_time(start)?, end: parse_time(end)? })
    }

    /// Whether `now` falls inside this window, handling the midnight-wrap case.
    pub fn contains(&self, now: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= now && now < self.end
        } else {
            now >= self.start || now < self.end
        }
    }
}

fn parse_time(s: &str) -> Result<NaiveTime, CoreError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| CoreError::InvalidTime(s.trim().to_string()))
}

/// An ordered set of [`RegulationWindow`]s; active if any member window is active.
#[derive(Debug, Clone, Default)]
pub struct RegulationWindows(pub Vec<RegulationWindow>);

impl RegulationWindows {
    pub fn parse(specs: &[String]) -> Result<Self, CoreError> {
        let windows = specs.iter().map(|s| RegulationWindow::parse(s)).collect::<Result<_, _>>()?;
        Ok(RegulationWindows(windows))
    }

    pub fn is_active(&self, now: NaiveTime) -> bool {
        if self.0.is_empty() {
            return true;
        }
        self.0.iter().any(|w| w.contains(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn plain_window_contains_midpoint() {
        let w = RegulationWindow::parse("08:00-18:00").unwrap();
        assert!(w.contains(t(12, 0)));
        assert!(!w.contains(t(19, 0)));
        assert!(!w.contains(t(7, 59)));
    }

    #[test]
    fn window_boundaries_are_half_open() {
        let w = RegulationWindow::parse("08:00-18:00").unwrap();
        assert!(w.contains(t(8, 0)));
        assert!(!w.contains(t(18, 0)));
    }

    #[test]
    fn midnight_wrap_window() {
        let w = RegulationWindow::parse("22:00-06:00").unwrap();
        assert!(w.contains(t(23, 30)));
        assert!(w.contains(t(2, 0)));
        assert!(!w.contains(t(12, 0)));
    }

    #[test]
    fn empty_window_set_is_always_active() {
        let windows = RegulationWindows::default();
        assert!(windows.is_active(t(3, 0)));
    }

    #[test]
    fn malformed_window_is_rejected() {
        assert!(RegulationWindow::parse("08:00").is_err());
        assert!(RegulationWindow::parse("8h-18h").is_err());
    }
}
