use std::collections::HashMap;
use std::fs;

use nfl_separation::assemble::DerivedFeatures;
use nfl_separation::engine::{FeatureEngine, SeparationSummary};
use nfl_separation::error::EngineError;
use nfl_separation::output::{feature_header, write_features_csv};
use nfl_separation::partition::{IssueKind, PlayKey};
use nfl_separation::roles::Role;
use nfl_separation::supplementary::{SupplementaryPlay, load_supplementary_csv, merge_supplementary};
use nfl_separation::tracking::{
    REQUIRED_COLUMNS, TrackingRow, TrackingTable, load_tracking_csv, load_tracking_dir,
};

fn tracking_row(
    play_id: i64,
    nfl_id: i64,
    frame_id: u32,
    side: &str,
    position: &str,
    x: f64,
    y: f64,
) -> TrackingRow {
    TrackingRow {
        game_id: 2023091700,
        play_id,
        nfl_id,
        frame_id,
        x,
        y,
        s: 4.25,
        a: 1.5,
        dir: Some(181.3),
        o: Some(12.75),
        player_side: side.to_string(),
        player_position: position.to_string(),
        player_role: "Other Route Runner".to_string(),
        ball_land_x: 52.5,
        ball_land_y: 26.65,
        absolute_yardline_number: 70.0,
        play_direction: "right".to_string(),
        player_name: Some(format!("Player {nfl_id}")),
        player_to_predict: Some(nfl_id == 1),
        num_frames_output: Some(12),
        down: Some(3.0),
        yards_to_go: Some(4.0),
        yardline_number: Some(40.0),
        pass_result: None,
        team_coverage_type: None,
        offense_formation: None,
    }
}

fn small_play(play_id: i64, frames: u32) -> Vec<TrackingRow> {
    let mut rows = Vec::new();
    for f in 1..=frames {
        let t = f as f64 * 0.3;
        rows.push(tracking_row(play_id, 1, f, "Offense", "WR", 40.0 + t, 20.0));
        rows.push(tracking_row(play_id, 2, f, "Offense", "RB", 38.0, 24.0 - t));
        rows.push(tracking_row(play_id, 3, f, "Offense", "QB", 35.0, 26.0));
        rows.push(tracking_row(play_id, 11, f, "Defense", "CB", 42.0 + 0.5 * t, 21.0));
        rows.push(tracking_row(play_id, 12, f, "Defense", "ILB", 41.0, 25.0));
    }
    rows
}

#[test]
fn one_output_row_per_input_row_in_canonical_order() {
    let mut rows = small_play(7, 4);
    rows.extend(small_play(3, 3));
    rows.reverse();
    let input_len = rows.len();

    let out = FeatureEngine::default()
        .run(TrackingTable::from_rows(rows))
        .expect("engine run");

    assert_eq!(out.rows.len(), input_len);
    assert_eq!(out.report.rows, input_len);
    assert_eq!(out.report.plays, 2);
    assert_eq!(out.report.receiver_rows, 14);
    assert_eq!(out.report.receiver_rows_with_separation, 14);

    let keys: Vec<_> = out.rows.iter().map(|r| r.sort_key()).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    assert_eq!(out.rows[0].tracking.play_id, 3);
}

#[test]
fn only_receivers_get_derived_features() {
    let out = FeatureEngine::default()
        .run(TrackingTable::from_rows(small_play(1, 3)))
        .expect("engine run");

    for row in &out.rows {
        match row.role {
            Role::Receiver => assert!(row.features.nearest_defender_distance.is_some()),
            Role::Defender | Role::Other => {
                assert_eq!(row.features, DerivedFeatures::default());
            }
        }
    }
    let qb = out.rows.iter().find(|r| r.tracking.nfl_id == 3).expect("qb row");
    assert_eq!(qb.role, Role::Other);
}

#[test]
fn throw_frame_spans_every_role() {
    let mut rows = Vec::new();
    for f in 1..=45u32 {
        if f <= 40 {
            rows.push(tracking_row(1, 1, f, "Offense", "WR", 30.0, 20.0));
        }
        rows.push(tracking_row(1, 11, f, "Defense", "CB", 33.0, 24.0));
    }
    let out = FeatureEngine::default()
        .run(TrackingTable::from_rows(rows))
        .expect("engine run");

    let last = out
        .rows
        .iter()
        .find(|r| r.tracking.nfl_id == 1 && r.tracking.frame_id == 40)
        .expect("receiver frame 40");
    assert_eq!(last.features.frames_until_throw, Some(5));
    assert!((last.features.frame_progress.unwrap() - 40.0 / 45.0).abs() < 1e-12);
    assert!((last.features.nearest_defender_distance.unwrap() - 5.0).abs() < 1e-12);
}

#[test]
fn derived_context_columns() {
    let mut rows = small_play(1, 2);
    for r in &mut rows {
        r.yardline_number = Some(15.0);
    }
    let mut no_yardline = small_play(2, 2);
    for r in &mut no_yardline {
        r.yardline_number = None;
        r.absolute_yardline_number = -1.0;
    }
    rows.extend(no_yardline);

    let out = FeatureEngine::default()
        .run(TrackingTable::from_rows(rows))
        .expect("engine run");

    let red = out
        .rows
        .iter()
        .find(|r| r.tracking.play_id == 1 && r.tracking.nfl_id == 1)
        .expect("play 1 receiver");
    assert_eq!(red.features.is_red_zone, Some(true));
    let f = &red.features;
    let expected = f.nearest_defender_distance.unwrap() / 71.0;
    assert!((f.relative_separation.unwrap() - expected).abs() < 1e-12);
    assert!((f.speed_differential.unwrap()).abs() < 1e-12);
    let land = ((red.tracking.x - 52.5f64).powi(2) + (red.tracking.y - 26.65f64).powi(2)).sqrt();
    assert!((f.distance_to_ball_land.unwrap() - land).abs() < 1e-9);

    let unknown = out
        .rows
        .iter()
        .find(|r| r.tracking.play_id == 2 && r.tracking.nfl_id == 1)
        .expect("play 2 receiver");
    assert_eq!(unknown.features.is_red_zone, Some(false));
    assert_eq!(unknown.features.relative_separation, None);
    assert!(unknown.features.nearest_defender_distance.is_some());
}

#[test]
fn missing_required_column_fails_before_processing() {
    let table = TrackingTable {
        columns: REQUIRED_COLUMNS
            .iter()
            .filter(|c| **c != "x" && **c != "ball_land_y")
            .map(|c| c.to_string())
            .collect(),
        rows: small_play(1, 2),
    };
    let err = FeatureEngine::default().run(table).expect_err("schema mismatch");
    assert_eq!(
        err,
        EngineError::SchemaMismatch {
            missing: vec!["x".to_string(), "ball_land_y".to_string()],
        }
    );
}

#[test]
fn loader_reports_schema_mismatch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("input_2023_w01.csv");
    fs::write(&path, "game_id,play_id,nfl_id,frame_id,x\n1,1,1,1,2.0\n").expect("write");

    let err = load_tracking_csv(&path).expect_err("missing columns");
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::SchemaMismatch { missing }) => {
            assert!(missing.contains(&"y".to_string()));
            assert!(!missing.contains(&"x".to_string()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn non_finite_coordinates_only_null_their_own_frame() {
    let rows = vec![
        tracking_row(6, 1, 1, "Offense", "WR", 10.0, 20.0),
        tracking_row(6, 2, 1, "Offense", "TE", 30.0, 20.0),
        tracking_row(6, 50, 1, "Defense", "CB", f64::NAN, 21.0),
        tracking_row(6, 51, 1, "Defense", "FS", 13.0, 24.0),
        tracking_row(6, 1, 2, "Offense", "WR", 10.0, 20.0),
        tracking_row(6, 2, 2, "Offense", "TE", f64::NAN, 20.0),
        tracking_row(6, 50, 2, "Defense", "CB", 11.0, 21.0),
        tracking_row(6, 51, 2, "Defense", "FS", 13.0, 24.0),
    ];
    let mut sibling = small_play(7, 2);
    sibling.extend(rows);

    let out = FeatureEngine::default()
        .run(TrackingTable::from_rows(sibling))
        .expect("engine run");
    assert_eq!(out.rows.len(), 18);

    let find = |nfl_id: i64, frame_id: u32| {
        out.rows
            .iter()
            .find(|r| {
                let t = &r.tracking;
                t.play_id == 6 && t.nfl_id == nfl_id && t.frame_id == frame_id
            })
            .expect("row")
    };

    // A non-finite defender is not a candidate at its frame.
    let r1_f1 = &find(1, 1).features;
    assert_eq!(r1_f1.nearest_defender_id, Some(51));
    assert!((r1_f1.nearest_defender_distance.unwrap() - 5.0).abs() < 1e-12);
    assert_eq!(r1_f1.second_nearest_defender_distance, None);

    // The same defender counts again once its position is finite.
    let r1_f2 = &find(1, 2).features;
    assert_eq!(r1_f2.nearest_defender_id, Some(50));
    assert!((r1_f2.nearest_defender_distance.unwrap() - 2f64.sqrt()).abs() < 1e-12);
    assert!((r1_f2.second_nearest_defender_distance.unwrap() - 5.0).abs() < 1e-12);
    assert_eq!(r1_f2.frames_until_throw, Some(0));
    assert!((r1_f2.separation_change.unwrap() - (2f64.sqrt() - 5.0)).abs() < 1e-12);

    // A non-finite receiver loses separation at that frame only.
    let r2_f1 = &find(2, 1).features;
    assert!((r2_f1.nearest_defender_distance.unwrap() - 17f64.hypot(4.0)).abs() < 1e-12);
    let r2_f2 = &find(2, 2).features;
    assert_eq!(r2_f2.nearest_defender_distance, None);
    assert_eq!(r2_f2.distance_to_ball_land, None);
    assert_eq!(r2_f2.frames_until_throw, Some(0));
    assert_eq!(r2_f2.frame_progress, Some(1.0));
    assert_eq!(r2_f2.is_red_zone, Some(false));

    for kind in [
        IssueKind::NonFiniteCoordinates {
            nfl_id: 50,
            frame_id: 1,
        },
        IssueKind::NonFiniteCoordinates {
            nfl_id: 2,
            frame_id: 2,
        },
    ] {
        assert!(out.report.issues.iter().any(|i| i.play_id == 6 && i.kind == kind));
    }
    assert!(out.report.issues.iter().all(|i| i.play_id == 6));

    let sibling_rows = out
        .rows
        .iter()
        .filter(|r| r.tracking.play_id == 7 && r.role == Role::Receiver);
    for row in sibling_rows {
        assert!(row.features.nearest_defender_distance.is_some());
    }
}

#[test]
fn empty_measurement_cell_loads_as_null_feature() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("input_2023_w03.csv");
    let body = format!(
        "{}\n\
         2023091700,1,1,1,10,20,,1.5,90,90,Offense,WR,Targeted Receiver,30,20,45,right\n\
         2023091700,1,11,1,13,24,3.0,1.0,,,Defense,CB,Defensive Coverage,30,20,45,right\n",
        REQUIRED_COLUMNS.join(",")
    );
    fs::write(&path, body).expect("write");

    let table = load_tracking_csv(&path).expect("empty cell is not a load error");
    assert_eq!(table.len(), 2);
    assert!(table.rows[0].s.is_nan());
    assert_eq!(table.rows[1].dir, None);

    let out = FeatureEngine::default().run(table).expect("engine run");
    let receiver = out.rows.iter().find(|r| r.tracking.nfl_id == 1).expect("receiver");
    let f = &receiver.features;
    assert!((f.nearest_defender_distance.unwrap() - 5.0).abs() < 1e-12);
    assert_eq!(f.receiver_speed, None);
    assert_eq!(f.speed_differential, None);
    assert_eq!(f.speed_rolling_mean, None);
    assert_eq!(f.nearest_defender_speed, Some(3.0));
    assert_eq!(f.acceleration_differential, Some(0.5));

    // The missing cell stays empty when written back out.
    let written = dir.path().join("enriched.csv");
    write_features_csv(&written, &out.rows).expect("write features");
    let reread = load_tracking_csv(&written).expect("reload");
    let again = reread.rows.iter().find(|r| r.nfl_id == 1).expect("receiver");
    assert!(again.s.is_nan());
}

#[test]
fn out_of_order_frames_are_reported_and_resorted() {
    let ordered = FeatureEngine::default()
        .run(TrackingTable::from_rows(small_play(1, 3)))
        .expect("ordered run");
    assert!(ordered.report.issues.is_empty());

    let mut rows = small_play(1, 3);
    rows.reverse();
    let reversed = FeatureEngine::default()
        .run(TrackingTable::from_rows(rows))
        .expect("reversed run");

    assert_eq!(ordered.rows, reversed.rows);
    for nfl_id in [1, 2, 3, 11, 12] {
        assert!(
            reversed
                .report
                .issues
                .contains(&nfl_separation::partition::PlayIssue {
                    game_id: 2023091700,
                    play_id: 1,
                    kind: IssueKind::NonMonotonicFrames { nfl_id },
                })
        );
    }
}

#[test]
fn duplicate_frames_are_reported_not_fatal() {
    let mut rows = small_play(1, 2);
    rows.push(tracking_row(1, 1, 2, "Offense", "WR", 41.0, 20.0));

    let out = FeatureEngine::default()
        .run(TrackingTable::from_rows(rows))
        .expect("engine run");

    assert_eq!(out.rows.len(), 11);
    assert!(out.report.issues.iter().any(|issue| {
        issue.kind
            == IssueKind::DuplicateFrame {
                nfl_id: 1,
                frame_id: 2,
            }
    }));
}

#[test]
fn rerun_on_written_output_reproduces_features() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("out").join("input_with_separation.csv");

    let mut rows = small_play(4, 5);
    rows.extend(small_play(9, 3));
    let first = FeatureEngine::default()
        .run(TrackingTable::from_rows(rows))
        .expect("first run");
    write_features_csv(&path, &first.rows).expect("write features");
    assert!(!path.with_extension("csv.tmp").exists());

    let reread = load_tracking_csv(&path).expect("reload");
    assert_eq!(reread.columns.len(), feature_header().len());
    let second = FeatureEngine::default().run(reread).expect("second run");

    assert_eq!(first.rows.len(), second.rows.len());
    for (a, b) in first.rows.iter().zip(&second.rows) {
        assert_eq!(a.tracking, b.tracking);
        assert_eq!(a.features, b.features);
    }
}

#[test]
fn directory_loader_concatenates_weeks() {
    let dir = tempfile::tempdir().expect("tempdir");
    let week1 = FeatureEngine::default()
        .run(TrackingTable::from_rows(small_play(1, 2)))
        .expect("run");
    let week2 = FeatureEngine::default()
        .run(TrackingTable::from_rows(small_play(2, 2)))
        .expect("run");
    write_features_csv(&dir.path().join("input_2023_w01.csv"), &week1.rows).expect("w1");
    write_features_csv(&dir.path().join("input_2023_w02.csv"), &week2.rows).expect("w2");
    fs::write(dir.path().join("notes.txt"), "ignored").expect("notes");

    let table = load_tracking_dir(dir.path(), "input_2023_w").expect("load dir");
    assert_eq!(table.len(), 20);
    assert_eq!(table.rows[0].play_id, 1);
    assert_eq!(table.rows[19].play_id, 2);
}

#[test]
fn supplementary_values_fill_play_context() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("supplementary_data.csv");
    fs::write(
        &path,
        "game_id,play_id,down,yards_to_go,yardline_number,pass_result,team_coverage_type,offense_formation\n\
         2023091700,1,1,10,12,C,COVER_2_ZONE,SHOTGUN\n\
         2023091700,5,2,,,I,,\n",
    )
    .expect("write supplementary");

    let plays = load_supplementary_csv(&path).expect("load supplementary");
    assert_eq!(plays.len(), 2);

    let mut table = TrackingTable::from_rows(small_play(1, 2));
    table.rows.extend(small_play(2, 1));
    let matched = merge_supplementary(&mut table, &plays);
    assert_eq!(matched, 10);

    let out = FeatureEngine::default().run(table).expect("engine run");
    let receiver = out
        .rows
        .iter()
        .find(|r| r.tracking.play_id == 1 && r.tracking.nfl_id == 1)
        .expect("receiver");
    assert_eq!(receiver.tracking.pass_result.as_deref(), Some("C"));
    assert_eq!(receiver.tracking.down, Some(1.0));
    assert_eq!(receiver.features.is_red_zone, Some(true));

    let untouched = out
        .rows
        .iter()
        .find(|r| r.tracking.play_id == 2)
        .expect("play 2 row");
    assert_eq!(untouched.tracking.down, Some(3.0));
    assert_eq!(untouched.tracking.pass_result, None);
}

#[test]
fn absent_supplementary_values_keep_existing() {
    let mut plays = HashMap::new();
    let play = SupplementaryPlay {
        game_id: 2023091700,
        play_id: 1,
        pass_result: Some("IN".to_string()),
        ..Default::default()
    };
    plays.insert(PlayKey { game_id: 2023091700, play_id: 1 }, play);

    let mut table = TrackingTable::from_rows(small_play(1, 1));
    merge_supplementary(&mut table, &plays);
    assert!(table.rows.iter().all(|r| r.pass_result.as_deref() == Some("IN")));
    assert!(table.rows.iter().all(|r| r.yardline_number == Some(40.0)));
}

#[test]
fn summary_uses_receiver_separation_only() {
    let out = FeatureEngine::default()
        .run(TrackingTable::from_rows(small_play(1, 3)))
        .expect("engine run");
    let summary = SeparationSummary::from_rows(&out.rows).expect("summary");
    assert_eq!(summary.count, 6);
    assert!(summary.min <= summary.median && summary.median <= summary.max);
    assert!(summary.std >= 0.0);

    assert!(SeparationSummary::from_rows(&[]).is_none());
}
