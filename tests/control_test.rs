mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::*;
use live2d_mascot::config::MotionName;
use live2d_mascot::control::ClickAction;
use live2d_mascot::{FrameInputs, FrameSnapshot, Mascot, MascotConfig, MotionHandle, Priority, Renderer};

#[derive(Default)]
struct CountingRenderer {
    frames: AtomicUsize,
}

impl Renderer for CountingRenderer {
    fn draw(&self, _frame: &FrameSnapshot) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }
}

fn fixture() -> ModelFixture {
    ModelFixture::new()
        .motion_group("Idle", 1)
        .motion_group("TapBody", 2)
        .expression("smile")
        .expression("angry")
        .textures(1)
}

async fn mascot(config: MascotConfig) -> Mascot {
    let h = loaded(&fixture(), config).await;
    Mascot::new(h.model)
}

#[tokio::test]
async fn test_click_routes_through_hit_areas() {
    let mascot = mascot(test_config()).await;

    // Head area is the upper band of the canvas, body below it
    let head = mascot.on_click(0.0, 0.8).await;
    assert!(matches!(head, ClickAction::Expression(handle) if handle.is_started()));

    let body = mascot.on_click(0.0, -0.4).await;
    assert!(matches!(body, ClickAction::Motion(handle) if handle.is_started()));
    assert_eq!(mascot.model().motion_priorities().1, Priority::Normal);

    let elsewhere = mascot.on_click(1.9, 1.9).await;
    assert!(matches!(elsewhere, ClickAction::Expression(_)));
}

#[tokio::test]
async fn test_hit_test_uses_view_coordinates() {
    let mascot = mascot(test_config()).await;
    let model = mascot.model();

    assert!(model.hit_test("Head", 0.0, 0.8));
    assert!(!model.hit_test("Head", 0.0, -0.4));
    assert!(model.hit_test("Body", 0.0, -0.4));
    assert!(!model.hit_test("Tail", 0.0, 0.0));
}

#[tokio::test]
async fn test_pointer_and_look_at() {
    let mascot = mascot(test_config()).await;

    mascot.on_pointer_moved(3.0, -0.5);
    assert_eq!(mascot.drag_target(), (1.0, -0.5));

    mascot.look_at(0.4, 0.2, Some(Duration::from_millis(30)));
    assert_eq!(mascot.drag_target(), (0.4, 0.2));
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(mascot.drag_target(), (0.0, 0.0));

    // A newer look cancels the pending reset
    mascot.look_at(0.4, 0.2, Some(Duration::from_millis(30)));
    mascot.look_at(-0.3, 0.1, None);
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(mascot.drag_target(), (-0.3, 0.1));

    mascot.reset_angle();
    assert_eq!(mascot.drag_target(), (0.0, 0.0));
}

#[tokio::test]
async fn test_named_motions_and_default_expression() {
    let mut config = test_config();
    config
        .motion_names
        .insert("wave".to_string(), MotionName::new("TapBody", 1, Priority::Normal));
    config
        .expression_names
        .insert("default".to_string(), "angry".to_string());
    let mascot = mascot(config).await;

    assert!(mascot.play_named_motion("Wave").await.is_started());
    assert_eq!(mascot.play_named_motion("dance").await, MotionHandle::NOT_STARTED);

    assert!(mascot.play_expression("smile").is_started());
    assert!(mascot.reset_default_expression().is_started());

    assert_eq!(
        mascot.motions_info(),
        Some(vec![
            ("Idle".to_string(), vec!["Idle_0".to_string()]),
            (
                "TapBody".to_string(),
                vec!["TapBody_0".to_string(), "TapBody_1".to_string()]
            ),
        ])
    );
    assert_eq!(
        mascot.expressions_info(),
        Some(vec!["smile".to_string(), "angry".to_string()])
    );
}

#[tokio::test]
async fn test_reset_without_default_expression_keeps_current() {
    let mascot = mascot(test_config()).await;
    let frame = FrameInputs::with_delta(1.0 / 60.0);

    assert!(mascot.play_expression("smile").is_started());
    mascot.model().update(&frame);
    assert_eq!(mascot.reset_default_expression(), MotionHandle::NOT_STARTED);

    for _ in 0..90 {
        mascot.model().update(&frame);
    }
    let cheek = mascot.model().parameter("ParamCheek").unwrap();
    assert!((cheek - 0.5).abs() < 1e-4, "cheek was {cheek}");
}

#[tokio::test]
async fn test_lip_sync_input_reaches_frame_inputs() {
    let mascot = mascot(test_config()).await;
    mascot.set_lip_sync(1.5, None);
    let inputs = mascot.frame_inputs();
    assert_eq!(inputs.lip_sync_value, 1.0);
    assert_eq!(inputs.lip_sync_weight, 0.8);

    mascot.set_lip_sync(0.25, Some(0.5));
    let inputs = mascot.frame_inputs();
    assert_eq!((inputs.lip_sync_value, inputs.lip_sync_weight), (0.25, 0.5));
}

#[tokio::test]
async fn test_frame_loop_draws_until_stopped() {
    let mut config = test_config();
    config.target_fps = 100;
    let mascot = mascot(config).await;
    let renderer = Arc::new(CountingRenderer::default());

    mascot.start(renderer.clone());
    assert!(mascot.is_running());
    tokio::time::sleep(Duration::from_millis(100)).await;
    mascot.stop();
    assert!(!mascot.is_running());

    tokio::time::sleep(Duration::from_millis(20)).await;
    let drawn = renderer.frames.load(Ordering::SeqCst);
    assert!(drawn > 0);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(renderer.frames.load(Ordering::SeqCst), drawn);
    assert!(mascot.model().is_ready());
}

#[tokio::test]
async fn test_release_stops_loop_and_frees_textures() {
    let fetcher = MockFetcher::new();
    fixture().install(&fetcher);
    let h = harness(test_config(), fetcher);
    let backend = h.backend.clone();
    let mascot = Mascot::new(h.model);

    mascot.spawn_load();
    mascot.wait_until_loaded().await.unwrap();
    assert_eq!(backend.live_count(), 1);

    mascot.start(Arc::new(CountingRenderer::default()));
    tokio::time::sleep(Duration::from_millis(30)).await;
    mascot.release().await;

    assert!(!mascot.is_running());
    assert_eq!(backend.live_count(), 0);
    assert!(!mascot.tick());
}
