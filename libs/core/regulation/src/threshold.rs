/// One row of the default regulation table: above `injection_threshold_w` of
/// grid injection, apply `increment_permille` to the current limit and
/// expect the next sample within `advisory_delay_s` (or the meter's own
/// default cadence if `None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdRow {
    pub injection_threshold_w: i32,
    pub increment_permille: i32,
    pub advisory_delay_s: Option<u32>,
}

/// Rows sorted by `injection_threshold_w` descending; the last row's
/// threshold acts as a catch-all floor.
#[derive(Debug, Clone)]
pub struct ThresholdTable(Vec<ThresholdRow>);

impl ThresholdTable {
    pub fn new(rows: Vec<ThresholdRow>) -> Self {
        debug_assert!(!rows.is_empty(), "threshold table must not be empty");
        debug_assert!(
            rows.windows(2).all(|w| w[0].injection_threshold_w > w[1].injection_threshold_w),
            "threshold table rows must be strictly descending by threshold"
        );
        ThresholdTable(rows)
    }

    /// Returns the matching row together with the threshold of the row
    /// immediately above it, if any (used to render a `"X..Y"` reason tag).
    pub fn match_injection(&self, injection_power: i32) -> (&ThresholdRow, Option<i32>) {
        let idx = self
            .0
            .iter()
            .position(|row| injection_power >= row.injection_threshold_w)
            .unwrap_or(self.0.len() - 1);
        let previous_threshold = if idx == 0 { None } else { Some(self.0[idx - 1].injection_threshold_w) };
        (&self.0[idx], previous_threshold)
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        ThresholdTable::new(vec![
            ThresholdRow { injection_threshold_w: 600, increment_permille: -200, advisory_delay_s: Some(5) },
            ThresholdRow { injection_threshold_w: 250, increment_permille: -100, advisory_delay_s: Some(5) },
            ThresholdRow { injection_threshold_w: 130, increment_permille: -50, advisory_delay_s: Some(5) },
            ThresholdRow { injection_threshold_w: 60, increment_permille: -10, advisory_delay_s: Some(5) },
            ThresholdRow { injection_threshold_w: 30, increment_permille: -5, advisory_delay_s: None },
            ThresholdRow { injection_threshold_w: 0, increment_permille: 0, advisory_delay_s: None },
            ThresholdRow { injection_threshold_w: -30, increment_permille: 10, advisory_delay_s: None },
            ThresholdRow { injection_threshold_w: -100, increment_permille: 20, advisory_delay_s: Some(5) },
            ThresholdRow { injection_threshold_w: -200, increment_permille: 50, advisory_delay_s: Some(5) },
            ThresholdRow { injection_threshold_w: -600, increment_permille: 100, advisory_delay_s: Some(5) },
            ThresholdRow { injection_threshold_w: -99999, increment_permille: 200, advisory_delay_s: Some(5) },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_top_row_with_no_previous() {
        let table = ThresholdTable::default();
        let (row, previous) = table.match_injection(1000);
        assert_eq!(row.injection_threshold_w, 600);
        assert_eq!(previous, None);
    }

    #[test]
    fn matches_interior_row_with_previous() {
        let table = ThresholdTable::default();
        let (row, previous) = table.match_injection(100);
        assert_eq!(row.injection_threshold_w, 60);
        assert_eq!(previous, Some(130));
    }

    #[test]
    fn catch_all_floor_matches_deep_import() {
        let table = ThresholdTable::default();
        let (row, _) = table.match_injection(-5000);
        assert_eq!(row.injection_threshold_w, -99999);
    }

    #[test]
    fn zero_row_is_a_no_op() {
        let table = ThresholdTable::default();
        let (row, _) = table.match_injection(10);
        assert_eq!(row.increment_permille, 0);
    }
}
