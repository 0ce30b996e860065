//! End-to-end pointer gestures driven through the canvas.

use canvasloom_core::model::{Endpoint, MediaNode, ShapeKind, ShapeNode, Side};
use canvasloom_core::{
    Canvas, CanvasNode, EntityId, HitTarget, Lifecycle, MemoryStorage, Modifiers, MouseButton,
    NodeKind, PointerEvent, ToolKind,
};
use kurbo::{Point, Rect, Vec2};
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn canvas() -> Canvas<MemoryStorage> {
    init_logging();
    Canvas::new(Arc::new(MemoryStorage::new()))
}

fn add_node(canvas: &mut Canvas<MemoryStorage>, rect: Rect, kind: NodeKind) -> EntityId {
    canvas
        .document_mut()
        .create_node(CanvasNode::new("", rect, kind), Lifecycle::Persisted)
}

fn shape(canvas: &mut Canvas<MemoryStorage>, rect: Rect) -> EntityId {
    add_node(canvas, rect, NodeKind::Shape(ShapeNode::default()))
}

fn press(x: f64, y: f64) -> PointerEvent {
    PointerEvent::new(Point::new(x, y))
}

fn drag(canvas: &mut Canvas<MemoryStorage>, from: PointerEvent, to: PointerEvent) {
    canvas.pointer_down(&from);
    let midway = PointerEvent {
        position: from.position.midpoint(to.position),
        ..to.clone()
    };
    canvas.pointer_move(&midway);
    canvas.pointer_move(&to);
    canvas.pointer_up(&to);
}

fn click(canvas: &mut Canvas<MemoryStorage>, event: PointerEvent) {
    canvas.pointer_down(&event);
    canvas.pointer_up(&event);
}

#[test]
fn test_create_move_undo_redo() {
    let mut canvas = canvas();
    canvas.set_tool(ToolKind::Shape(ShapeKind::Rectangle));
    drag(&mut canvas, press(10.0, 10.0), press(110.0, 60.0));
    let id = canvas.document().queue().ids().next().unwrap().to_string();
    let created = canvas.document().node(&id).unwrap().bounds();
    assert_eq!(created, Rect::new(10.0, 10.0, 110.0, 60.0));

    canvas.set_tool(ToolKind::Select);
    drag(&mut canvas, press(50.0, 30.0), press(80.0, 50.0));
    let moved = canvas.document().node(&id).unwrap().position();
    assert!((moved.x - 40.0).abs() < 1e-9);
    assert!((moved.y - 30.0).abs() < 1e-9);

    assert!(canvas.undo());
    assert_eq!(canvas.document().node(&id).unwrap().position(), Point::new(10.0, 10.0));
    assert!(canvas.undo());
    assert!(canvas.document().is_empty());
    assert!(!canvas.undo());

    assert!(canvas.redo());
    assert!(canvas.redo());
    assert_eq!(canvas.document().node(&id).unwrap().position(), moved);
}

#[test]
fn test_undo_redo_restores_identical_document() {
    let mut canvas = canvas();
    let a = shape(&mut canvas, Rect::new(0.0, 0.0, 100.0, 100.0));
    shape(&mut canvas, Rect::new(200.0, 0.0, 300.0, 100.0));
    click(&mut canvas, press(50.0, 50.0));
    drag(&mut canvas, press(50.0, 50.0), press(90.0, 130.0));
    canvas.select_all();
    canvas.group_selection().unwrap();

    let after = canvas.document().export().unwrap();
    assert!(canvas.undo());
    assert!(canvas.undo());
    assert_ne!(canvas.document().export().unwrap(), after);
    assert!(canvas.redo());
    assert!(canvas.redo());
    assert_eq!(canvas.document().export().unwrap(), after);
    assert!(canvas.document().node(&a).unwrap().group_id.is_some());
}

#[test]
fn test_media_corner_rescale_keeps_aspect_ratio() {
    let mut canvas = canvas();
    let image = add_node(
        &mut canvas,
        Rect::new(0.0, 0.0, 200.0, 100.0),
        NodeKind::Image(MediaNode {
            src: "photo".into(),
            ..MediaNode::default()
        }),
    );
    click(&mut canvas, press(100.0, 50.0));
    assert!(canvas.selection().is_selected(&image));

    drag(&mut canvas, press(200.0, 100.0), press(300.0, 130.0));
    let node = canvas.document().node(&image).unwrap();
    assert!((node.width - 300.0).abs() < 1e-6);
    assert!((node.width / node.height - 2.0).abs() < 1e-6);
    assert_eq!(node.position(), Point::new(0.0, 0.0));
}

#[test]
fn test_shift_connect_snaps_to_45_degrees() {
    let mut canvas = canvas();
    canvas.set_tool(ToolKind::Connector);
    drag(
        &mut canvas,
        press(0.0, 0.0).with_modifiers(Modifiers::SHIFT),
        press(100.0, 90.0).with_modifiers(Modifiers::SHIFT),
    );

    let edge = canvas.document().store().edges().next().unwrap();
    let to = edge.to.free_point().unwrap();
    assert!((to.x - to.y).abs() < 1e-6);
    let expected = Vec2::new(100.0, 90.0).hypot();
    assert!((to.to_vec2().hypot() - expected).abs() < 1e-6);
    assert!(canvas.selection().is_selected(&edge.id));
}

#[test]
fn test_connector_attaches_to_node_under_release() {
    let mut canvas = canvas();
    let target = shape(&mut canvas, Rect::new(200.0, 0.0, 300.0, 100.0));
    canvas.set_tool(ToolKind::Connector);
    drag(&mut canvas, press(0.0, 50.0), press(210.0, 50.0));

    let edge = canvas.document().store().edges().next().unwrap();
    assert_eq!(edge.from.free_point(), Some(Point::new(0.0, 50.0)));
    assert_eq!(
        edge.to,
        Endpoint::Connected {
            node_id: target.clone(),
            side: Side::Left
        }
    );
    assert!(
        canvas
            .document()
            .node(&target)
            .unwrap()
            .edges
            .contains(&edge.id)
    );
}

#[test]
fn test_rubber_band_selects_touched_nodes() {
    let mut canvas = canvas();
    let a = shape(&mut canvas, Rect::new(0.0, 0.0, 50.0, 50.0));
    let b = shape(&mut canvas, Rect::new(60.0, 0.0, 110.0, 50.0));
    let c = shape(&mut canvas, Rect::new(400.0, 400.0, 450.0, 450.0));

    drag(&mut canvas, press(-20.0, -20.0), press(120.0, 60.0));
    assert!(canvas.selection().is_selected(&a));
    assert!(canvas.selection().is_selected(&b));
    assert!(!canvas.selection().is_selected(&c));
    assert!(canvas.document().len() == 3);
}

#[test]
fn test_release_over_ignored_target_aborts_creation() {
    let mut canvas = canvas();
    canvas.set_tool(ToolKind::Shape(ShapeKind::Ellipse));
    canvas.pointer_down(&press(10.0, 10.0));
    canvas.pointer_move(&press(110.0, 110.0));
    assert!(canvas.tools().is_active());
    canvas.pointer_up(&press(110.0, 110.0).with_target(HitTarget::Ignored));

    assert!(canvas.document().is_empty());
    assert!(canvas.document().preview_queue().is_empty());
    assert!(!canvas.history().can_undo());
    assert!(!canvas.tools().is_busy());
}

#[test]
fn test_middle_button_pans_without_history() {
    let mut canvas = canvas();
    shape(&mut canvas, Rect::new(0.0, 0.0, 50.0, 50.0));
    drag(
        &mut canvas,
        press(10.0, 10.0).with_button(MouseButton::Middle),
        press(40.0, 50.0).with_button(MouseButton::Middle),
    );
    assert_eq!(canvas.camera().offset, Vec2::new(30.0, 40.0));
    assert!(!canvas.history().can_undo());
    assert_eq!(canvas.active_tool(), ToolKind::Select);
}

#[test]
fn test_pencil_stroke_is_simplified_and_undoable() {
    let mut canvas = canvas();
    canvas.set_tool(ToolKind::Pencil);
    canvas.pointer_down(&press(0.0, 0.0));
    for i in 1..=20 {
        canvas.pointer_move(&press(i as f64 * 5.0, 0.0));
    }
    canvas.pointer_up(&press(100.0, 0.0));

    let node = canvas.document().store().nodes().next().unwrap();
    let NodeKind::Pencil(pencil) = &node.kind else {
        panic!("expected a pencil stroke");
    };
    assert_eq!(pencil.coords.len(), 2);
    assert!(canvas.undo());
    assert!(canvas.document().is_empty());
}
