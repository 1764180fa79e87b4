//! Centre of a crowd of detections.

use niftybot_types::FeatureRecord;

/// Average `(center_x, center_y)` of `features`, each rounded to the nearest
/// integer (halves away from zero).  Returns `(0, 0)` for an empty slice.
pub fn centroid(features: &[FeatureRecord]) -> (i32, i32) {
    if features.is_empty() {
        return (0, 0);
    }
    let n = features.len() as f64;
    let (sum_x, sum_y) = features.iter().fold((0.0f64, 0.0f64), |(x, y), f| {
        (x + f64::from(f.center_x), y + f64::from(f.center_y))
    });
    ((sum_x / n).round() as i32, (sum_y / n).round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f32, y: f32) -> FeatureRecord {
        FeatureRecord {
            height: 10.0,
            width: 10.0,
            top_left_x: x - 5.0,
            top_left_y: y - 5.0,
            center_x: x,
            center_y: y,
            handle: None,
        }
    }

    #[test]
    fn empty_is_origin() {
        assert_eq!(centroid(&[]), (0, 0));
    }

    #[test]
    fn single_feature_is_its_own_centre() {
        assert_eq!(centroid(&[at(42.0, 7.0)]), (42, 7));
    }

    #[test]
    fn two_people_meet_in_the_middle() {
        assert_eq!(centroid(&[at(100.0, 50.0), at(200.0, 150.0)]), (150, 100));
    }

    #[test]
    fn mean_is_rounded_to_nearest() {
        // x mean 1.5 -> 2, y mean 4/3 -> 1
        assert_eq!(centroid(&[at(1.0, 1.0), at(2.0, 1.0)]).0, 2);
        assert_eq!(centroid(&[at(0.0, 1.0), at(0.0, 1.0), at(0.0, 2.0)]), (0, 1));
        // 2.6 rounds up
        assert_eq!(centroid(&[at(2.6, 0.4)]), (3, 0));
    }
}
