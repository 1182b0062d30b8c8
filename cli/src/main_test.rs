use super::*;

#[test]
fn ws_url_maps_scheme_and_appends_channel_path() {
    assert_eq!(ws_url("http://127.0.0.1:3000").expect("http"), "ws://127.0.0.1:3000/api/ws");
    assert_eq!(ws_url("https://draw.example.com/").expect("https"), "wss://draw.example.com/api/ws");
    assert!(matches!(ws_url("ftp://nope"), Err(CliError::InvalidBaseUrl(_))));
}

#[test]
fn parse_point_accepts_signed_decimals() {
    assert_eq!(parse_point("10,20").expect("point"), (10.0, 20.0));
    assert_eq!(parse_point(" -1.5 , 2 ").expect("point"), (-1.5, 2.0));
}

#[test]
fn parse_point_rejects_garbage() {
    for raw in ["10", "a,b", "1,2,3", "inf,0", ""] {
        assert!(matches!(parse_point(raw), Err(CliError::InvalidPoint(_))), "{raw}");
    }
}

#[test]
fn points_chain_into_segments() {
    let segments = segments_from_points(&[(0.0, 0.0), (10.0, 10.0), (20.0, 5.0)], "#ff0000").expect("segments");
    assert_eq!(
        segments,
        vec![
            StrokeSegment::new(0.0, 0.0, 10.0, 10.0, "#ff0000"),
            StrokeSegment::new(10.0, 10.0, 20.0, 5.0, "#ff0000"),
        ]
    );
}

#[test]
fn a_single_point_is_not_a_stroke() {
    assert!(matches!(segments_from_points(&[(1.0, 1.0)], "#000000"), Err(CliError::TooFewPoints)));
}

#[test]
fn stroke_command_parses_repeated_points() {
    let cli = Cli::try_parse_from([
        "drawboard-cli",
        "stroke",
        "--whiteboard-id",
        "42",
        "--point",
        "0,0",
        "--point",
        "-5,3",
    ])
    .expect("parse");
    let Command::Stroke(args) = cli.command else {
        panic!("expected stroke command");
    };
    assert_eq!(args.points, vec!["0,0", "-5,3"]);
    assert_eq!(args.color, DEFAULT_STROKE_COLOR);
    assert_eq!(args.target.requested(), Some(WhiteboardId::new("42")));
}

#[test]
fn clear_without_id_targets_default_whiteboard() {
    let cli = Cli::try_parse_from(["drawboard-cli", "--base-url", "http://h:1", "clear"]).expect("parse");
    assert_eq!(cli.base_url, "http://h:1");
    let Command::Clear(target) = cli.command else {
        panic!("expected clear command");
    };
    assert_eq!(target.requested(), None);
    assert_eq!(target.timeout(), Duration::from_secs(5));
}
