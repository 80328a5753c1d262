// crates/kiwiglider-qartod/src/checks.rs

// Per-sample QARTOD tests.
//
// Every test returns one flag per input value. Null and NaN values are
// missing and always flag as `QartodFlag::Missing`. Tests that compare a
// sample with its neighbours flag samples without usable context as
// `QartodFlag::Unknown`.

use crate::errors::QartodError;
use crate::flags::QartodFlag;
use crate::params::{
    FlatLineParams, GrossRangeParams, QartodTest, RateOfChangeParams, SpikeMethod, SpikeParams,
    TestKind,
};

fn observed(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

/// Runs a configured test over a value sequence and its timestamps (seconds).
pub fn run_test(
    test: &QartodTest,
    values: &[Option<f64>],
    times: &[f64],
) -> Result<Vec<QartodFlag>, QartodError> {
    match test {
        QartodTest::GrossRange(params) => Ok(gross_range_test(values, params)),
        QartodTest::Spike(params) => Ok(spike_test(values, params)),
        QartodTest::RateOfChange(params) => rate_of_change_test(values, times, params),
        QartodTest::FlatLine(params) => flat_line_test(values, times, params),
    }
}

pub fn gross_range_test(values: &[Option<f64>], params: &GrossRangeParams) -> Vec<QartodFlag> {
    let [fail_min, fail_max] = params.fail_span;

    values
        .iter()
        .map(|value| {
            let Some(value) = observed(*value) else {
                return QartodFlag::Missing;
            };
            if value < fail_min || value > fail_max {
                return QartodFlag::Fail;
            }
            match params.suspect_span {
                Some([min, max]) if value < min || value > max => QartodFlag::Suspect,
                _ => QartodFlag::Good,
            }
        })
        .collect()
}

pub fn spike_test(values: &[Option<f64>], params: &SpikeParams) -> Vec<QartodFlag> {
    let len = values.len();
    let mut flags = Vec::with_capacity(len);

    for idx in 0..len {
        let Some(current) = observed(values[idx]) else {
            flags.push(QartodFlag::Missing);
            continue;
        };
        if idx == 0 || idx + 1 == len {
            flags.push(QartodFlag::Unknown);
            continue;
        }
        let (Some(previous), Some(next)) = (observed(values[idx - 1]), observed(values[idx + 1]))
        else {
            flags.push(QartodFlag::Unknown);
            continue;
        };

        let reference = match params.method {
            SpikeMethod::Average => (current - (previous + next) / 2.0).abs(),
            SpikeMethod::Differential => {
                let back = current - previous;
                let forward = current - next;
                if back != 0.0 && forward != 0.0 && back.signum() == forward.signum() {
                    back.abs().min(forward.abs())
                } else {
                    0.0
                }
            }
        };

        let flag = if reference > params.fail_threshold {
            QartodFlag::Fail
        } else if reference > params.suspect_threshold {
            QartodFlag::Suspect
        } else {
            QartodFlag::Good
        };
        flags.push(flag);
    }

    flags
}

pub fn rate_of_change_test(
    values: &[Option<f64>],
    times: &[f64],
    params: &RateOfChangeParams,
) -> Result<Vec<QartodFlag>, QartodError> {
    check_lengths(TestKind::RateOfChange, values, times)?;

    let mut flags = Vec::with_capacity(values.len());
    for idx in 0..values.len() {
        let Some(current) = observed(values[idx]) else {
            flags.push(QartodFlag::Missing);
            continue;
        };
        if idx == 0 {
            flags.push(QartodFlag::Unknown);
            continue;
        }
        let Some(previous) = observed(values[idx - 1]) else {
            flags.push(QartodFlag::Unknown);
            continue;
        };
        let elapsed = times[idx] - times[idx - 1];
        if elapsed.is_nan() || elapsed <= 0.0 {
            flags.push(QartodFlag::Unknown);
            continue;
        }

        let rate = (current - previous).abs() / elapsed;
        if rate > params.threshold {
            flags.push(QartodFlag::Suspect);
        } else {
            flags.push(QartodFlag::Good);
        }
    }

    Ok(flags)
}

pub fn flat_line_test(
    values: &[Option<f64>],
    times: &[f64],
    params: &FlatLineParams,
) -> Result<Vec<QartodFlag>, QartodError> {
    check_lengths(TestKind::FlatLine, values, times)?;

    let record_start = times.iter().copied().find(|t| t.is_finite());
    let mut flags = Vec::with_capacity(values.len());

    for idx in 0..values.len() {
        let Some(current) = observed(values[idx]) else {
            flags.push(QartodFlag::Missing);
            continue;
        };
        let now = times[idx];
        let Some(start) = record_start.filter(|_| now.is_finite()) else {
            flags.push(QartodFlag::Unknown);
            continue;
        };
        let history = now - start;

        if history >= params.fail_threshold
            && is_flat(values, times, idx, current, params.fail_threshold, params.tolerance)
        {
            flags.push(QartodFlag::Fail);
        } else if history >= params.suspect_threshold {
            if is_flat(values, times, idx, current, params.suspect_threshold, params.tolerance) {
                flags.push(QartodFlag::Suspect);
            } else {
                flags.push(QartodFlag::Good);
            }
        } else {
            flags.push(QartodFlag::Unknown);
        }
    }

    Ok(flags)
}

/// True when every observed sample in the `window` seconds ending at `idx`
/// stays within `tolerance` (max - min) and the window holds at least two
/// observations.
fn is_flat(
    values: &[Option<f64>],
    times: &[f64],
    idx: usize,
    current: f64,
    window: f64,
    tolerance: f64,
) -> bool {
    let now = times[idx];
    let mut low = current;
    let mut high = current;
    let mut count = 1usize;

    for back in (0..idx).rev() {
        let t = times[back];
        if !t.is_finite() {
            continue;
        }
        if now - t > window {
            break;
        }
        if let Some(value) = observed(values[back]) {
            low = low.min(value);
            high = high.max(value);
            count += 1;
            if high - low >= tolerance {
                return false;
            }
        }
    }

    count >= 2 && high - low < tolerance
}

fn check_lengths(test: TestKind, values: &[Option<f64>], times: &[f64]) -> Result<(), QartodError> {
    if values.len() != times.len() {
        return Err(QartodError::LengthMismatch {
            test,
            values: values.len(),
            times: times.len(),
        });
    }
    Ok(())
}
