use switchback::{
    config::Config,
    race::SectorCounter,
    track::{SegmentKind, TrackRow},
    Track,
};

fn rows() -> Vec<TrackRow> {
    let mut curve = TrackRow::new(SegmentKind::Curve, 10);
    curve.curve = 3.0;
    let mut hill = TrackRow::new(SegmentKind::Hill, 20);
    hill.height = 3.0;
    vec![TrackRow::new(SegmentKind::Straight, 10), curve, hill, TrackRow::new(SegmentKind::Straight, 20)]
}

#[test]
fn segment_lookup_is_wrap_invariant() {
    let track = Track::from_rows(&rows(), 200.0).unwrap();
    let length = track.length();
    for i in 0..track.len() {
        let s = (i as f32 + 0.37) * track.segment_length();
        let expected = track.segment_at_distance(track.wrap(s)).index;
        assert_eq!(expected, i);
        for k in -3..=3 {
            let shifted = s + k as f32 * length;
            assert_eq!(track.segment_at_distance(shifted).index, expected, "s={} k={}", s, k);
        }
    }
}

#[test]
fn elevation_is_continuous_across_the_seam() {
    let mut track = Track::from_rows(&rows(), 200.0).unwrap();
    let last = track.len() - 1;
    assert_eq!(track.segments()[last].y1, 600.0);

    track.enforce_wrap_continuity(8);
    assert_eq!(track.segments()[last].y1, track.segments()[0].y0);
    let length = track.length();
    assert!((track.elevation_at(length - 1.0) - track.elevation_at(0.0)).abs() < 1.0);
    let before = track.ground_profile_at(length - 1.0);
    let after = track.ground_profile_at(1.0);
    assert!((before.slope - after.slope).abs() < 0.01);
    // the blend leaves the middle of the track alone
    assert_eq!(track.segments()[40].y0, 600.0);
}

#[test]
fn smooth_hill_reaches_its_height_monotonically() {
    let config = Config::default();
    let segment_length = config.track.segment_length;
    let mut hill = TrackRow::new(SegmentKind::Hill, 30);
    hill.height = 6.0;
    let track = Track::from_rows(&[hill], segment_length).unwrap();
    let segments = track.segments();
    assert_eq!(segments.len(), 30);
    assert_eq!(segments[0].y0, 0.0);
    assert!((segments[29].y1 - 6.0 * segment_length).abs() < 1.0e-3);
    for segment in segments {
        assert!(segment.y1 >= segment.y0);
    }
    for pair in segments.windows(2) {
        assert_eq!(pair[0].y1, pair[1].y0);
    }
}

#[test]
fn laps_follow_total_progress() {
    let length = 6000.0f64;
    let step = 37.3f64;
    let mut counter = SectorCounter::new(32, 0.0, length as f32);
    let mut total = 0.0f64;
    let mut laps = 0;
    for _ in 0..1000 {
        total += step;
        let s = total.rem_euclid(length) as f32;
        laps += counter.update(s, length as f32);
        assert_eq!(counter.laps(), laps);
    }
    assert_eq!(laps, (total / length).floor() as u32);
    assert_eq!(laps, 6);
}
