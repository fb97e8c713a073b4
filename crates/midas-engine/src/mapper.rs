//! Value transform for `logic.mapper` nodes.

use std::f64::consts::E;

use midas_graph::{Curve, MapperConfig};
use midas_midi::MidiEvent;

/// Map `value` from the configured input range onto the output range.
///
/// The input is normalized into [0, 1] (a degenerate range counts as width 1),
/// shaped by the curve, scaled onto the output range, then rounded and
/// clamped.
pub fn map_value(config: &MapperConfig, value: i32) -> i32 {
    let span = (config.input_max - config.input_min).max(1.0);
    let normalized = ((f64::from(value) - config.input_min) / span).clamp(0.0, 1.0);

    let shaped = match config.curve {
        Curve::Log => (normalized * (E - 1.0)).ln_1p(),
        Curve::Exp => (normalized.exp() - 1.0) / (E - 1.0),
        Curve::Step => {
            let steps = config.steps.max(1) as f64;
            (normalized * steps).round_ties_even() / steps
        }
        Curve::Linear | Curve::Other(_) => normalized,
    };

    let (lo, hi) = (config.output_min, config.output_max);
    let scaled = lo + shaped * (hi - lo);
    // Bounds may be inverted; clamp against the ordered pair.
    let clamped = scaled.clamp(lo.min(hi), lo.max(hi));
    clamped.round_ties_even() as i32
}

/// Copy of `event` with its value mapped. Events without a value pass through.
pub fn apply_mapper(config: &MapperConfig, event: &MidiEvent) -> MidiEvent {
    match event.value {
        Some(v) => event.with_value(Some(map_value(config, v))),
        None => event.clone(),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn cfg(in_lo: f64, in_hi: f64, out_lo: f64, out_hi: f64, curve: Curve) -> MapperConfig {
        MapperConfig {
            input_min: in_lo,
            input_max: in_hi,
            output_min: out_lo,
            output_max: out_hi,
            curve,
            steps: 8,
        }
    }

    #[test]
    fn linear_scales_and_rounds() {
        let c = cfg(0.0, 127.0, 0.0, 100.0, Curve::Linear);
        assert_eq!(map_value(&c, 0), 0);
        assert_eq!(map_value(&c, 100), 79);
        assert_eq!(map_value(&c, 127), 100);
        assert_eq!(map_value(&c, 500), 100);
        assert_eq!(map_value(&c, -20), 0);
    }

    #[test]
    fn curves_keep_endpoints() {
        for curve in [Curve::Log, Curve::Exp, Curve::Step] {
            let c = cfg(0.0, 127.0, 0.0, 127.0, curve);
            assert_eq!(map_value(&c, 0), 0);
            assert_eq!(map_value(&c, 127), 127);
        }
        let log = cfg(0.0, 127.0, 0.0, 127.0, Curve::Log);
        let exp = cfg(0.0, 127.0, 0.0, 127.0, Curve::Exp);
        assert!(map_value(&log, 64) > 64);
        assert!(map_value(&exp, 64) < 64);
    }

    #[test]
    fn step_quantizes() {
        let mut c = cfg(0.0, 100.0, 0.0, 100.0, Curve::Step);
        c.steps = 4;
        assert_eq!(map_value(&c, 10), 0);
        assert_eq!(map_value(&c, 30), 25);
        assert_eq!(map_value(&c, 60), 50);
        assert_eq!(map_value(&c, 90), 100);
    }

    #[test]
    fn halves_round_to_even() {
        assert_eq!(map_value(&cfg(0.0, 2.0, 0.0, 1.0, Curve::Linear), 1), 0);
        assert_eq!(map_value(&cfg(0.0, 2.0, 0.0, 5.0, Curve::Linear), 1), 2);
        assert_eq!(map_value(&cfg(0.0, 2.0, 0.0, 3.0, Curve::Linear), 1), 2);
        let step = MapperConfig {
            steps: 2,
            ..cfg(0.0, 4.0, 0.0, 4.0, Curve::Step)
        };
        assert_eq!(map_value(&step, 1), 0);
        assert_eq!(map_value(&step, 3), 4);
    }

    #[test]
    fn degenerate_input_range() {
        let c = cfg(10.0, 10.0, 0.0, 127.0, Curve::Linear);
        assert_eq!(map_value(&c, 10), 0);
        assert_eq!(map_value(&c, 11), 127);
    }

    #[test]
    fn unknown_curve_is_linear() {
        let c = cfg(0.0, 127.0, 0.0, 127.0, Curve::Other("sigmoid".into()));
        assert_eq!(map_value(&c, 42), 42);
    }

    #[test]
    fn apply_keeps_other_fields() {
        let c = cfg(0.0, 127.0, 0.0, 100.0, Curve::Linear);
        let ev = MidiEvent::control_change(2, 7, 127).with_source("port");
        let out = apply_mapper(&c, &ev);
        assert_eq!(out.value, Some(100));
        assert_eq!(out.control, Some(7));
        assert_eq!(out.channel, Some(2));
        assert_eq!(out.source.as_deref(), Some("port"));

        let note = MidiEvent::note_on(0, 60, 90);
        assert_eq!(apply_mapper(&c, &note), note);
    }

    proptest! {
        #[test]
        fn output_stays_in_range(
            v in -1000i32..1000,
            in_lo in -200.0f64..200.0,
            width in 0.0f64..300.0,
            out_lo in -500.0f64..500.0,
            out_width in 0.0f64..500.0,
            curve in prop_oneof![
                Just(Curve::Linear), Just(Curve::Log), Just(Curve::Exp), Just(Curve::Step)
            ],
        ) {
            let c = cfg(in_lo, in_lo + width, out_lo, out_lo + out_width, curve);
            let out = f64::from(map_value(&c, v));
            prop_assert!(out >= out_lo.round() - 1.0 && out <= (out_lo + out_width).round() + 1.0);
        }

        #[test]
        fn linear_identity(v in 0i32..=127) {
            let c = cfg(0.0, 127.0, 0.0, 127.0, Curve::Linear);
            prop_assert_eq!(map_value(&c, v), v);
        }

        #[test]
        fn single_step_collapses_low_half(v in 0i32..63) {
            let mut c = cfg(0.0, 127.0, 0.0, 127.0, Curve::Step);
            c.steps = 1;
            prop_assert_eq!(map_value(&c, v), 0);
        }
    }
}
