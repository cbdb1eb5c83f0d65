use crate::constants::{
    CONSECUTIVE_IMPORT_COUNT_FOR_RESET, FAST_COOLDOWN_NB, MAX_LIMIT, METER_DEFAULT_DELAY_S, MIN_LIMIT,
};
use crate::model::{Decision, RegulatorEvent};
use crate::state::RegulationState;
use crate::threshold::ThresholdTable;

/// Tuning for Algorithm 1 (Fast Rise).
#[derive(Debug, Clone)]
pub struct FastRiseConfig {
    pub enabled: bool,
    /// Injection below this (importing hard) counts towards the trigger.
    pub deep_import_threshold_w: i32,
    pub trigger_count: u32,
    pub rise_to_permille: i32,
    pub delay_s: i32,
}

impl Default for FastRiseConfig {
    fn default() -> Self {
        FastRiseConfig {
            enabled: true,
            deep_import_threshold_w: -800,
            trigger_count: 2,
            rise_to_permille: 1000,
            delay_s: 10,
        }
    }
}

/// Tuning for Algorithm 2 (Fast Drop).
#[derive(Debug, Clone)]
pub struct FastDropConfig {
    pub enabled: bool,
    /// Injection above this (exporting hard) counts towards the trigger.
    pub high_injection_threshold_w: i32,
    pub trigger_count: u32,
    /// Fast drop only fires while the current limit is above this.
    pub floor_permille: i32,
    pub delay_s: i32,
}

impl Default for FastDropConfig {
    fn default() -> Self {
        FastDropConfig {
            enabled: true,
            high_injection_threshold_w: 30,
            trigger_count: 2,
            floor_permille: 500,
            delay_s: 10,
        }
    }
}

/// Everything the control engine needs besides the mutable [`RegulationState`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub fast_rise: FastRiseConfig,
    pub fast_drop: FastDropConfig,
    pub table: ThresholdTable,
    /// Total nameplate AC power of the installation, in watts. Used by
    /// Algorithm 2 to estimate the limit that would zero out injection.
    pub total_rated_w: i32,
}

fn clamp_limit(v: i32) -> i32 {
    v.clamp(MIN_LIMIT, MAX_LIMIT)
}

/// Runs one control-engine decision cycle.
///
/// Assumes `state.current_limit` is already known (callers defer to a
/// reconciling read before the first invocation); this function only
/// advances the algorithm counters and proposes the next limit.
pub fn decide(state: &mut RegulationState, injection_power: i32, solar_power: i32, cfg: &EngineConfig) -> (Decision, Option<RegulatorEvent>) {
    debug_assert!(state.limit_is_known(), "decide() requires a reconciled current_limit");

    if state.fast_cooldown > 0 {
        state.fast_cooldown -= 1;
    }

    let mut skip_import_lock = false;

    if cfg.fast_rise.enabled {
        if let Some(result) = try_fast_rise(state, injection_power, &cfg.fast_rise) {
            return (result, Some(RegulatorEvent::FastRise));
        }
    } else {
        state.consec_deep_import = 0;
    }

    if cfg.fast_drop.enabled {
        match try_fast_drop(state, injection_power, solar_power, cfg) {
            FastDropOutcome::Fired(decision) => return (decision, Some(RegulatorEvent::FastDrop)),
            FastDropOutcome::SkipImportLock => skip_import_lock = true,
            FastDropOutcome::NotTriggered => {}
        }
    } else {
        state.consec_high_injection = 0;
    }

    if !skip_import_lock {
        if let Some(decision) = try_import_lock(state, injection_power) {
            return (decision, None);
        }
    }

    (threshold_table_decision(state, injection_power, &cfg.table), None)
}

fn try_fast_rise(state: &mut RegulationState, injection_power: i32, cfg: &FastRiseConfig) -> Option<Decision> {
    if injection_power < cfg.deep_import_threshold_w {
        state.consec_deep_import += 1;
    } else {
        state.consec_deep_import = 0;
    }

    if state.consec_deep_import >= cfg.trigger_count && state.fast_cooldown == 0 && state.current_limit < cfg.rise_to_permille {
        let previous = state.current_limit;
        state.current_limit = cfg.rise_to_permille;
        state.fast_cooldown = FAST_COOLDOWN_NB;
        state.consec_deep_import = 0;
        return Some(Decision {
            new_limit: state.current_limit,
            increment: state.current_limit - previous,
            reason: "Importation tres forte".to_string(),
            next_sample_delay_s: cfg.delay_s,
        });
    }
    None
}

enum FastDropOutcome {
    Fired(Decision),
    SkipImportLock,
    NotTriggered,
}

fn try_fast_drop(state: &mut RegulationState, injection_power: i32, solar_power: i32, cfg: &EngineConfig) -> FastDropOutcome {
    let drop_cfg = &cfg.fast_drop;
    if injection_power > drop_cfg.high_injection_threshold_w {
        state.consec_high_injection += 1;
    } else {
        state.consec_high_injection = 0;
    }

    let triggered = state.consec_high_injection >= drop_cfg.trigger_count
        && state.current_limit > drop_cfg.floor_permille
        && solar_power > 0
        && state.fast_cooldown == 0;

    if !triggered {
        return FastDropOutcome::NotTriggered;
    }

    let estimate = (((solar_power - injection_power) as f64 / cfg.total_rated_w as f64) * 1000.0).round() as i32;

    if estimate < state.current_limit {
        let previous = state.current_limit;
        state.current_limit = clamp_limit(estimate);
        state.fast_cooldown = FAST_COOLDOWN_NB;
        state.consec_high_injection = 0;
        FastDropOutcome::Fired(Decision {
            new_limit: state.current_limit,
            increment: state.current_limit - previous,
            reason: "Injection haute".to_string(),
            next_sample_delay_s: drop_cfg.delay_s,
        })
    } else {
        FastDropOutcome::SkipImportLock
    }
}

fn try_import_lock(state: &mut RegulationState, injection_power: i32) -> Option<Decision> {
    if injection_power < 0 {
        state.consec_import += 1;
    } else {
        state.consec_import = 0;
    }

    if state.consec_import >= CONSECUTIVE_IMPORT_COUNT_FOR_RESET {
        let previous = state.current_limit;
        state.current_limit = MAX_LIMIT;
        state.consec_import = 0;
        return Some(Decision {
            new_limit: MAX_LIMIT,
            increment: MAX_LIMIT - previous,
            reason: "Importation continue".to_string(),
            next_sample_delay_s: METER_DEFAULT_DELAY_S,
        });
    }
    None
}

fn threshold_table_decision(state: &mut RegulationState, injection_power: i32, table: &ThresholdTable) -> Decision {
    let (row, previous_threshold) = table.match_injection(injection_power);
    let reason = match previous_threshold {
        None => format!(">{}W", row.injection_threshold_w),
        Some(previous) => format!("{}W..<{}W", row.injection_threshold_w, previous),
    };
    let delay_s = row.advisory_delay_s.map(|d| d as i32).unwrap_or(METER_DEFAULT_DELAY_S);

    if row.increment_permille == 0 {
        return Decision { new_limit: state.current_limit, increment: 0, reason, next_sample_delay_s: delay_s };
    }

    let previous = state.current_limit;
    let mut new_limit = clamp_limit(previous + row.increment_permille);
    let mut delay_s = delay_s;

    if previous == MAX_LIMIT && new_limit == MAX_LIMIT {
        delay_s = METER_DEFAULT_DELAY_S;
    }

    if new_limit == crate::constants::BUGGY_LIMIT {
        new_limit = clamp_limit(new_limit + if row.increment_permille > 0 { 5 } else { -5 });
    }

    state.current_limit = new_limit;
    Decision { new_limit, increment: new_limit - previous, reason, next_sample_delay_s: delay_s }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EngineConfig {
        EngineConfig {
            fast_rise: FastRiseConfig::default(),
            fast_drop: FastDropConfig::default(),
            table: ThresholdTable::default(),
            total_rated_w: 2640,
        }
    }

    fn state_at(limit: i32) -> RegulationState {
        let mut s = RegulationState::unknown();
        s.current_limit = limit;
        s
    }

    #[test]
    fn fast_rise_fires_after_two_deep_imports() {
        let mut state = state_at(500);
        let c = cfg();
        // First deep import only advances the counter; the threshold table
        // still runs underneath and moves the limit on its own.
        let (d1, e1) = decide(&mut state, -900, 0, &c);
        assert!(e1.is_none());
        assert_eq!(d1.new_limit, 700);
        let (d2, e2) = decide(&mut state, -900, 0, &c);
        assert_eq!(d2.new_limit, 1000);
        assert_eq!(e2, Some(RegulatorEvent::FastRise));
        assert_eq!(state.fast_cooldown, FAST_COOLDOWN_NB);
    }

    #[test]
    fn fast_rise_respects_cooldown() {
        let mut state = state_at(500);
        let c = cfg();
        decide(&mut state, -900, 0, &c);
        decide(&mut state, -900, 0, &c);
        assert_eq!(state.current_limit, 1000);
        state.current_limit = 200;
        state.consec_import = 0;
        state.consec_deep_import = 0;
        let (d3, e3) = decide(&mut state, -900, 0, &c);
        assert!(e3.is_none(), "fast rise must stay silent while fast_cooldown > 0");
        assert_eq!(state.fast_cooldown, FAST_COOLDOWN_NB - 1);
        assert_eq!(d3.new_limit, 400);
    }

    #[test]
    fn fast_drop_fires_when_estimate_improves() {
        let mut state = state_at(900);
        let c = cfg();
        decide(&mut state, 40, 2000, &c);
        let (d, e) = decide(&mut state, 40, 2000, &c);
        assert_eq!(e, Some(RegulatorEvent::FastDrop));
        let expected = (((2000 - 40) as f64 / 2640.0) * 1000.0).round() as i32;
        assert_eq!(d.new_limit, expected);
    }

    #[test]
    fn fast_drop_falls_through_to_threshold_table_when_estimate_does_not_improve() {
        // High injection relative to solar production means the fast-drop
        // estimate lands above the current limit, so it must defer to the
        // threshold table instead of "improving" anything.
        let mut state = state_at(600);
        let c = cfg();
        decide(&mut state, 100, 2000, &c);
        let (d, e) = decide(&mut state, 100, 2000, &c);
        assert!(e.is_none());
        assert_eq!(d.increment, -10);
    }

    #[test]
    fn import_lock_snaps_to_max_after_fifteen_consecutive_imports() {
        let mut state = state_at(200);
        let c = cfg();
        for _ in 0..14 {
            decide(&mut state, -10, -1, &c);
        }
        let (d, e) = decide(&mut state, -10, -1, &c);
        assert!(e.is_none());
        assert_eq!(d.new_limit, MAX_LIMIT);
        assert_eq!(d.next_sample_delay_s, METER_DEFAULT_DELAY_S);
    }

    #[test]
    fn threshold_table_zero_row_is_no_op() {
        let mut state = state_at(400);
        let c = cfg();
        let (d, e) = decide(&mut state, 10, -1, &c);
        assert!(e.is_none());
        assert_eq!(d.increment, 0);
        assert_eq!(d.new_limit, 400);
    }

    #[test]
    fn threshold_table_perturbs_buggy_limit() {
        let mut state = state_at(310);
        let c = cfg();
        let (d, _) = decide(&mut state, 70, -1, &c);
        assert_ne!(d.new_limit, crate::constants::BUGGY_LIMIT);
    }

    #[test]
    fn threshold_table_forces_default_delay_when_pinned_at_max() {
        let mut state = state_at(MAX_LIMIT);
        let c = cfg();
        let (d, _) = decide(&mut state, -500, -1, &c);
        assert_eq!(d.new_limit, MAX_LIMIT);
        assert_eq!(d.next_sample_delay_s, METER_DEFAULT_DELAY_S);
    }
}
