//! End-to-end editing sessions: load, draw, select, apply, export.

use pitch_core::{
    render::FINAL_COLOR, Compositor, EditorEvent, EditorSession, FrameTarget, Mode, PitchDocument, PitchError,
    RenderCommand,
};

fn document(cols: usize) -> pitch_core::LoadedDocument {
    let mel: Vec<Vec<f64>> = (0..8).map(|band| (0..cols).map(|t| (band * t) as f64).collect()).collect();
    let text = serde_json::json!({
        "mel": mel,
        "pitches": {
            "final": vec![0.0; cols],
            "crepe": vec![220.0; cols],
            "harvest": vec![330.0; cols],
        }
    })
    .to_string();
    PitchDocument::from_json_str(&text).unwrap()
}

#[test]
fn test_draw_then_apply_then_export() {
    let mut session = EditorSession::new(256);
    let mut compositor = Compositor::new();

    let commands = session.load(document(16));
    let frames = compositor.execute(&session, &commands);
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].target, FrameTarget::Editor);

    // Freehand stroke across steps 2..=6 at the vertical middle.
    session.handle(EditorEvent::PointerDown { x: 2.0, y: 128.0 }).unwrap();
    for x in [3.5, 6.0] {
        let commands = session.handle(EditorEvent::PointerMove { x, y: 128.0 }).unwrap();
        assert_eq!(commands, vec![RenderCommand::RenderEditor]);
        let frames = compositor.execute(&session, &commands);
        assert!(frames[0].image.pixels().any(|p| *p == FINAL_COLOR));
    }
    session.handle(EditorEvent::PointerUp { x: 6.0, y: 128.0 }).unwrap();

    let drawn = session.mel_scale().frequency(64.0);
    let contour = session.final_contour().unwrap().to_vec();
    assert!(contour[2..=6].iter().all(|&v| v == drawn));
    assert_eq!(contour[7], 0.0);

    // Replace steps 4..8 from the "harvest" candidate.
    session.handle(EditorEvent::SetMode { mode: Mode::Select }).unwrap();
    session.handle(EditorEvent::SelectSource { name: Some("harvest".into()) }).unwrap();
    session.handle(EditorEvent::PointerDown { x: 8.9, y: 0.0 }).unwrap();
    session.handle(EditorEvent::PointerMove { x: 4.0, y: 0.0 }).unwrap();
    session.handle(EditorEvent::PointerUp { x: 4.0, y: 0.0 }).unwrap();
    session.handle(EditorEvent::Apply).unwrap();

    let contour = session.final_contour().unwrap();
    assert_eq!(contour[3], drawn);
    assert!(contour[4..8].iter().all(|&v| v == 330.0));
    assert_eq!(contour[8], 0.0);
    assert_eq!(contour.len(), 16);

    let exported: Vec<f64> = serde_json::from_str(&session.document().unwrap().final_json()).unwrap();
    assert_eq!(exported, contour);
}

#[test]
fn test_apply_respects_zoomed_scale() {
    let mut session = EditorSession::new(64);
    session.load(document(8));
    session.handle(EditorEvent::ZoomIn).unwrap();
    session.handle(EditorEvent::ZoomIn).unwrap(); // 4 px per step
    session.handle(EditorEvent::SetMode { mode: Mode::Select }).unwrap();
    session.handle(EditorEvent::SelectSource { name: Some("crepe".into()) }).unwrap();
    session.handle(EditorEvent::PointerDown { x: 4.0, y: 0.0 }).unwrap();
    session.handle(EditorEvent::PointerMove { x: 15.0, y: 0.0 }).unwrap();
    session.handle(EditorEvent::Apply).unwrap();

    // floor(4/4) = 1 up to floor(15/4) = 3, end exclusive.
    assert_eq!(
        session.final_contour().unwrap(),
        &[0.0, 220.0, 220.0, 0.0, 0.0, 0.0, 0.0, 0.0]
    );
}

#[test]
fn test_newer_upload_wins_over_older_in_flight() {
    let mut session = EditorSession::new(256);
    let older = session.begin_load();
    let newer = session.begin_load();

    session.complete_load(newer, document(4)).unwrap();
    session.handle(EditorEvent::ZoomIn).unwrap();

    let err = session.complete_load(older, document(32)).unwrap_err();
    assert!(matches!(err, PitchError::StaleLoad { .. }));
    // Neither the document nor the view was touched by the stale completion.
    assert_eq!(session.document().unwrap().matrix.cols(), 4);
    assert_eq!(session.view().scale, 2.0);
}

#[test]
fn test_invalid_document_never_reaches_session() {
    let mut session = EditorSession::new(256);
    session.load(document(4));
    let ticket = session.begin_load();
    let err = PitchDocument::from_json_str(r#"{"mel": [[1, 2]], "pitches": {"final": [1]}}"#).unwrap_err();
    assert!(matches!(err, PitchError::InvalidDocument(_)));
    // The previous document is still in place; the ticket simply goes unused.
    assert_eq!(ticket.generation(), session.generation());
    assert_eq!(session.document().unwrap().matrix.cols(), 4);
}
