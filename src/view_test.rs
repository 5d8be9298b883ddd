use crate::config::HeatmapConfig;
use crate::error::{FetchError, HeatmapError};
use crate::heat_cell::HeatCell;
use crate::metric::Metric;
use crate::overlay::{blobs, OverlayState, RedrawOutcome};
use crate::source::{HeatmapQuery, HeatmapSource};
use crate::surface::{DrawingSurface, RasterSurface};
use crate::view::HeatmapView;
use async_trait::async_trait;
use glam::DVec2;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color_scale::SPEED_PALETTE;
    use crate::fetch::FetchState;

    /// Serves the two-cell Astana scenario; resolution 5 answers HTTP 500 and
    /// gated resolutions wait for a notification.
    #[derive(Clone, Default)]
    struct ScenarioSource {
        gates: Arc<Mutex<HashMap<u8, Arc<Notify>>>>,
        requests: Arc<Mutex<Vec<HeatmapQuery>>>,
    }

    impl ScenarioSource {
        fn gate(&self, resolution: u8) -> Arc<Notify> {
            let notify = Arc::new(Notify::new());
            self.gates.lock().unwrap().insert(resolution, Arc::clone(&notify));
            notify
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HeatmapSource for ScenarioSource {
        async fn fetch(&self, query: &HeatmapQuery) -> Result<Vec<HeatCell>, FetchError> {
            self.requests.lock().unwrap().push(*query);
            let resolution = u8::from(query.resolution);
            let gate = self.gates.lock().unwrap().get(&resolution).cloned();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if resolution == 5 {
                return Err(FetchError::Status {
                    status: 500,
                    body: "Internal Server Error".into(),
                });
            }

            let with_metric = |cell: HeatCell, avg: f64| {
                if query.metric.is_selected() { cell.with_avg_value(avg) } else { cell }
            };
            Ok(vec![
                with_metric(HeatCell::new(51.09, 71.43, 100.0, "A").with_unique_values(40), 12.5),
                with_metric(HeatCell::new(51.10, 71.44, 50.0, "B").with_unique_values(20), 30.0),
                // one extra cell per resolution step so snapshots are distinguishable
                with_metric(
                    HeatCell::new(51.095, 71.435, resolution as f64, format!("res{resolution}")),
                    20.0,
                ),
            ])
        }
    }

    fn config() -> HeatmapConfig {
        HeatmapConfig::default()
            .with_access_token("pk.test")
            .with_metric(Metric::Speed)
            .with_size(800, 600)
    }

    fn mount(source: ScenarioSource) -> HeatmapView<ScenarioSource, RasterSurface> {
        HeatmapView::mount(&config(), source, RasterSurface::new(1, 1)).unwrap()
    }

    #[test]
    fn test_missing_token_refuses_to_mount() {
        let config = HeatmapConfig::default();
        let result = HeatmapView::mount(&config, ScenarioSource::default(), RasterSurface::new(1, 1));
        assert!(matches!(result, Err(HeatmapError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_mount_fetches_and_renders_the_snapshot() {
        let source = ScenarioSource::default();
        let mut view = mount(source.clone());
        assert!(view.is_loading());
        assert_eq!(view.caption(), None);
        assert_eq!(view.overlay().state(), OverlayState::MountedEmpty);

        assert!(view.settle().await);
        assert_eq!(source.request_count(), 1);
        assert_eq!(view.snapshot().len(), 3);
        assert_eq!(view.caption().as_deref(), Some("3 cells"));
        assert_eq!(view.overlay().state(), OverlayState::MountedWithPoints);
        assert_eq!(view.markers().len(), 3);

        let surface = view.overlay().surface().unwrap();
        assert_eq!(surface.size(), (800, 600));
        // the map is centred near the cells, so the middle of the canvas is painted
        assert!(surface.image().pixels().any(|p| p.0[3] > 0));
    }

    #[tokio::test]
    async fn test_speed_scenario_colors_agree_across_layers() {
        let mut view = mount(ScenarioSource::default());
        view.settle().await;

        let styled = blobs(view.snapshot(), view.overlay().style());
        let markers = view.markers().markers();
        assert_eq!(styled.len(), markers.len());
        for (blob, marker) in styled.iter().zip(markers) {
            assert_eq!(blob.color, marker.color, "{}", marker.cell_id);
        }
        assert_eq!(markers[0].color, SPEED_PALETTE.first());
        assert_eq!(markers[1].color, SPEED_PALETTE.last());
    }

    #[tokio::test]
    async fn test_selecting_a_then_b_then_dismiss() {
        let mut view = mount(ScenarioSource::default());
        view.settle().await;

        view.select("A").unwrap();
        let popup = view.select("B").unwrap();
        assert_eq!(popup.cell.cell_id, "B");
        assert_eq!(view.popup().unwrap().cell.cell_id, "B");
        assert!(popup.to_string().contains("Avg speed: 30.00 m/s"));

        view.dismiss_popup();
        assert!(view.popup().is_none());
    }

    #[tokio::test]
    async fn test_selection_survives_a_refetch_that_keeps_the_cell() {
        let mut view = mount(ScenarioSource::default());
        view.settle().await;

        view.select("A").unwrap();
        view.set_resolution(9).unwrap();
        assert!(view.popup().is_none(), "no popup while the new snapshot loads");
        view.settle().await;
        assert_eq!(view.popup().unwrap().cell.cell_id, "A");

        view.select("res9").unwrap();
        view.set_resolution(8).unwrap();
        view.settle().await;
        assert!(view.popup().is_none(), "res9 is gone at resolution 8");

        view.select("B").unwrap();
        view.set_resolution(5).unwrap();
        view.settle().await;
        view.set_resolution(7).unwrap();
        view.settle().await;
        assert!(view.popup().is_none(), "a failed fetch drops the selection");
    }

    #[tokio::test]
    async fn test_clicking_a_marker_opens_its_popup() {
        let mut view = mount(ScenarioSource::default());
        view.settle().await;

        let viewport = view.map().projector().unwrap();
        let layer_point = view.markers().markers()[0].position.unwrap();
        let container_point = layer_point - viewport.container_to_layer(DVec2::ZERO);
        let popup = view.click(container_point).unwrap();
        // "res10" sits between A and B but several pixels away at zoom 12
        assert_eq!(popup.cell.cell_id, "A");

        // a click on empty map keeps the open popup
        assert!(view.click(DVec2::new(1.0, 1.0)).is_some());
        assert!(view.click(container_point).is_none(), "second click on A closes it");
    }

    #[tokio::test]
    async fn test_http_500_fails_then_new_resolution_recovers() {
        let mut view = mount(ScenarioSource::default());
        view.settle().await;

        view.set_resolution(5).unwrap();
        view.settle().await;
        assert!(matches!(view.fetch_state(), FetchState::Failed(_)));
        assert!(view.error_banner().unwrap().contains("HTTP 500"));
        assert!(view.snapshot().is_empty());
        assert!(view.markers().is_empty());
        assert_eq!(view.caption(), None);

        view.set_resolution(9).unwrap();
        assert!(view.error_banner().is_none());
        view.settle().await;
        assert!(view.error_banner().is_none());
        assert_eq!(view.snapshot().len(), 3);
        assert!(view.snapshot().get("res9").is_some());
    }

    #[tokio::test]
    async fn test_error_banner_is_dismissible() {
        let mut view = mount(ScenarioSource::default());
        view.set_resolution(5).unwrap();
        view.settle().await;

        view.dismiss_error();
        assert!(view.error_banner().is_none());
        assert!(view.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_resolution_change_mid_flight_commits_only_the_latest() {
        let source = ScenarioSource::default();
        let slow = source.gate(10);
        let mut view = mount(source.clone());

        view.set_resolution(8).unwrap();
        view.settle().await;
        assert!(view.snapshot().get("res8").is_some());

        slow.notify_one();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!view.poll());
        assert!(view.snapshot().get("res8").is_some());
        assert!(view.snapshot().get("res10").is_none());
        assert_eq!(source.request_count(), 2);
    }

    #[tokio::test]
    async fn test_metric_change_refetches_with_new_palette() {
        let source = ScenarioSource::default();
        let mut view = mount(source.clone());
        view.settle().await;

        view.set_metric(Metric::Speed);
        assert_eq!(source.request_count(), 1, "same metric does not refetch");

        view.set_metric(Metric::None);
        assert!(view.snapshot().is_empty(), "old snapshot is discarded while loading");
        view.settle().await;
        assert_eq!(view.snapshot().metric, Metric::None);
        assert_eq!(view.query().metric, Metric::None);
    }

    #[tokio::test]
    async fn test_viewport_changes_redraw_with_the_committed_snapshot() {
        let mut view = mount(ScenarioSource::default());
        view.settle().await;

        let before = view.markers().markers()[0].position.unwrap();
        match view.pan_by(DVec2::new(5000.0, 0.0)) {
            RedrawOutcome::Drawn(stats) => {
                assert_eq!(stats.drawn, 0);
                assert_eq!(stats.culled, 3);
            }
            RedrawOutcome::Skipped => panic!("map is laid out"),
        }
        // layer-space marker positions only change with zoom
        assert_eq!(view.markers().markers()[0].position.unwrap(), before);

        view.pan_by(DVec2::new(-5000.0, 0.0));
        match view.zoom_to(13.0) {
            RedrawOutcome::Drawn(stats) => assert_eq!(stats.drawn, 3),
            RedrawOutcome::Skipped => panic!("map is laid out"),
        }
        assert_ne!(view.markers().markers()[0].position.unwrap(), before);
    }

    #[tokio::test]
    async fn test_zero_sized_map_skips_until_resized() {
        let config = config().with_size(0, 0);
        let mut view = HeatmapView::mount(&config, ScenarioSource::default(), RasterSurface::new(1, 1)).unwrap();
        view.settle().await;

        assert_eq!(view.snapshot().len(), 3);
        assert_eq!(view.overlay().state(), OverlayState::MountedEmpty);
        assert!(view.click(DVec2::ZERO).is_none());

        assert!(matches!(view.resize(640, 480), RedrawOutcome::Drawn(_)));
        assert_eq!(view.overlay().state(), OverlayState::MountedWithPoints);
    }

    #[tokio::test]
    async fn test_unmount_releases_everything() {
        let source = ScenarioSource::default();
        let gate = source.gate(10);
        let mut view = mount(source.clone());
        assert_eq!(view.map().overlay_count(), 1);

        let surface = view.unmount();
        assert!(surface.is_some());
        assert!(!view.is_mounted());
        assert_eq!(view.map().overlay_count(), 0);
        assert_eq!(view.overlay().state(), OverlayState::Unmounted);
        assert_eq!(view.fetch_state(), &FetchState::Idle);

        gate.notify_one();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!view.poll());
        assert!(view.markers().is_empty());
        assert_eq!(view.pan_by(DVec2::new(10.0, 0.0)), RedrawOutcome::Skipped);
        assert!(view.unmount().is_none());
    }

    #[tokio::test]
    async fn test_rendered_png_can_be_saved() {
        let mut view = mount(ScenarioSource::default());
        view.settle().await;
        view.paint_markers();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heatmap.png");
        view.overlay().surface().unwrap().save(&path).unwrap();
        assert_eq!(image::open(&path).unwrap().to_rgba8().dimensions(), (800, 600));
    }
}
