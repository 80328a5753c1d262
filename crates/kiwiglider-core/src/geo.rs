// crates/kiwiglider-core/src/geo.rs

/// Splits decimal degrees into whole degrees (truncated toward zero, sign
/// kept) and unsigned decimal minutes.
pub fn dd2dm(decimal_degrees: f64) -> (f64, f64) {
    let degrees = decimal_degrees.trunc();
    let minutes = 60.0 * (decimal_degrees.abs() % 1.0);
    (degrees, minutes)
}

/// Inverse of [`dd2dm`]; a negative degree or minute part makes the result
/// negative.
pub fn dm2dd(degrees: f64, minutes: f64) -> f64 {
    let decimal = degrees.abs() + minutes.abs() / 60.0;
    if degrees.is_sign_negative() || minutes < 0.0 {
        -decimal
    } else {
        decimal
    }
}

pub fn first_finite(values: &[Option<f64>]) -> Option<f64> {
    values.iter().flatten().copied().find(|v| v.is_finite())
}

pub fn last_finite(values: &[Option<f64>]) -> Option<f64> {
    values.iter().rev().flatten().copied().find(|v| v.is_finite())
}

fn format_axis(value: f64, positive: char, negative: char) -> String {
    let (degrees, minutes) = dd2dm(value);
    let hemisphere = if value < 0.0 { negative } else { positive };
    format!("{:.0}\u{b0}{minutes:.2}'{hemisphere}", degrees.abs())
}

/// Degree-minute position such as `41°17.50'S,174°46.20'E`.
pub fn format_position(latitude: f64, longitude: f64) -> String {
    format!(
        "{},{}",
        format_axis(latitude, 'N', 'S'),
        format_axis(longitude, 'E', 'W')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degree_minutes_round_trip_keeps_hemisphere() {
        let (deg, min) = dd2dm(-41.2916);
        assert_eq!(deg, -41.0);
        assert!((min - 17.496).abs() < 1e-9);
        assert!((dm2dd(deg, min) + 41.2916).abs() < 1e-12);
    }

    #[test]
    fn positions_south_of_equator_under_one_degree() {
        assert_eq!(format_position(-0.5, 174.77), "0\u{b0}30.00'S,174\u{b0}46.20'E");
    }

    #[test]
    fn finite_scans_skip_gaps() {
        let values = [None, Some(f64::NAN), Some(1.5), Some(2.5), None];
        assert_eq!(first_finite(&values), Some(1.5));
        assert_eq!(last_finite(&values), Some(2.5));
        assert_eq!(first_finite(&[None]), None);
    }
}
