use serde::{Deserialize, Serialize};

use super::{Args, Param, Pattern, PatternMap, Value};
use crate::error::PatternError;

/// Tick controls handed to a reducer alongside the pattern map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReduceControls {
    pub iterator: i64,
    pub divisor: f64,
    pub rate: f64,
}

impl Default for ReduceControls {
    fn default() -> Self {
        Self {
            iterator: 0,
            divisor: 1.0,
            rate: 1.0,
        }
    }
}

impl ReduceControls {
    pub fn at(iterator: i64) -> Self {
        Self {
            iterator,
            ..Self::default()
        }
    }

    pub fn with_divisor(mut self, divisor: f64) -> Self {
        self.divisor = divisor;
        self
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }
}

pub type ArgsIter<'a> = Box<dyn Iterator<Item = Args> + Send + 'a>;

/// Turns a pattern map into the concrete argument sets for one tick.
pub trait PatternReducer: Send + Sync {
    fn reduce<'a>(
        &self,
        pattern: &'a PatternMap,
        controls: ReduceControls,
    ) -> Result<ArgsIter<'a>, PatternError>;
}

/// Steps sequences by tick and fans chords out into parallel messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct CyclicReducer;

static REST: Value = Value::Rest;

enum Picked<'a> {
    One(&'a Value),
    Many(&'a [Value]),
}

impl CyclicReducer {
    fn step(controls: &ReduceControls) -> i64 {
        (controls.iterator as f64 * controls.rate / controls.divisor).floor() as i64
    }

    fn pick<'a>(pattern: &'a Pattern, step: i64) -> Picked<'a> {
        match pattern {
            Pattern::Value(value) => Picked::One(value),
            Pattern::Sequence(values) if values.is_empty() => Picked::One(&REST),
            Pattern::Sequence(values) => {
                let idx = step.rem_euclid(values.len() as i64) as usize;
                Picked::One(&values[idx])
            }
            Pattern::Chord(values) if values.is_empty() => Picked::One(&REST),
            Pattern::Chord(values) => Picked::Many(values),
        }
    }
}

impl PatternReducer for CyclicReducer {
    fn reduce<'a>(
        &self,
        pattern: &'a PatternMap,
        controls: ReduceControls,
    ) -> Result<ArgsIter<'a>, PatternError> {
        if !controls.divisor.is_finite() || controls.divisor <= 0.0 {
            return Err(PatternError::InvalidDivisor(controls.divisor));
        }
        if pattern.is_empty() || controls.iterator as f64 % controls.divisor != 0.0 {
            return Ok(Box::new(std::iter::empty()));
        }

        let step = Self::step(&controls);
        let picked: Vec<(&'a Param, Picked<'a>)> = pattern
            .iter()
            .map(|(param, pattern)| (param, Self::pick(pattern, step)))
            .collect();

        let voices = picked
            .iter()
            .map(|(_, p)| match p {
                Picked::One(_) => 1,
                Picked::Many(values) => values.len(),
            })
            .max()
            .unwrap_or(1);

        tracing::trace!(step, voices, "reduced pattern");

        Ok(Box::new((0..voices).map(move |voice| {
            picked
                .iter()
                .map(|(param, p)| {
                    let value = match p {
                        Picked::One(value) => (*value).clone(),
                        Picked::Many(values) => values[voice % values.len()].clone(),
                    };
                    ((*param).clone(), value)
                })
                .collect::<Args>()
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notes(reducer: &CyclicReducer, map: &PatternMap, controls: ReduceControls) -> Vec<Value> {
        reducer
            .reduce(map, controls)
            .unwrap()
            .map(|args| args.get(&Param::Note).cloned().unwrap())
            .collect()
    }

    #[test]
    fn fixed_values_yield_one_set() {
        let map = PatternMap::from([
            (Param::Note, Pattern::from(60)),
            (Param::Duration, Pattern::from(2)),
        ]);
        let out: Vec<Args> = CyclicReducer
            .reduce(&map, ReduceControls::default())
            .unwrap()
            .collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get(&Param::Note), Some(&Value::Int(60)));
        assert_eq!(out[0].get(&Param::Duration), Some(&Value::Int(2)));
    }

    #[test]
    fn sequence_steps_with_iterator() {
        let map = PatternMap::from([(Param::Note, Pattern::sequence([60, 64, 67]))]);
        let picked: Vec<Value> = (0..5)
            .flat_map(|i| notes(&CyclicReducer, &map, ReduceControls::at(i)))
            .collect();
        assert_eq!(
            picked,
            [60, 64, 67, 60, 64].map(Value::from).to_vec()
        );
    }

    #[test]
    fn rate_scales_the_step() {
        let map = PatternMap::from([(Param::Note, Pattern::sequence([60, 64, 67, 71]))]);
        let controls = ReduceControls::at(1).with_rate(2.0);
        assert_eq!(notes(&CyclicReducer, &map, controls), vec![Value::Int(67)]);

        let controls = ReduceControls::at(3).with_rate(0.5);
        assert_eq!(notes(&CyclicReducer, &map, controls), vec![Value::Int(64)]);
    }

    #[test]
    fn divisor_skips_off_ticks() {
        let map = PatternMap::from([(Param::Note, Pattern::sequence([60, 64]))]);
        let controls = ReduceControls::at(3).with_divisor(2.0);
        assert!(notes(&CyclicReducer, &map, controls).is_empty());

        let controls = ReduceControls::at(4).with_divisor(2.0);
        assert_eq!(notes(&CyclicReducer, &map, controls), vec![Value::Int(60)]);
    }

    #[test]
    fn invalid_divisor_is_rejected() {
        let map = PatternMap::from([(Param::Note, Pattern::from(60))]);
        for divisor in [0.0, -1.0, f64::NAN] {
            let controls = ReduceControls::default().with_divisor(divisor);
            assert!(matches!(
                CyclicReducer.reduce(&map, controls),
                Err(PatternError::InvalidDivisor(_))
            ));
        }
    }

    #[test]
    fn chord_fans_out_and_cycles_shorter_chords() {
        let map = PatternMap::from([
            (Param::Note, Pattern::chord([60, 64, 67])),
            (Param::Duration, Pattern::chord([1, 2])),
        ]);
        let out: Vec<(Value, Value)> = CyclicReducer
            .reduce(&map, ReduceControls::default())
            .unwrap()
            .map(|a| {
                (
                    a.get(&Param::Note).cloned().unwrap(),
                    a.get(&Param::Duration).cloned().unwrap(),
                )
            })
            .collect();
        assert_eq!(
            out,
            vec![
                (Value::Int(60), Value::Int(1)),
                (Value::Int(64), Value::Int(2)),
                (Value::Int(67), Value::Int(1)),
            ]
        );
    }

    #[test]
    fn empty_sequence_reads_as_rest() {
        let map = PatternMap::from([(Param::Note, Pattern::Sequence(vec![]))]);
        assert_eq!(
            notes(&CyclicReducer, &map, ReduceControls::default()),
            vec![Value::Rest]
        );
    }
}
