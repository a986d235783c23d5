//! Handler-level API tests: happy paths, validation rejections, and the
//! promise that a failed mutation changes nothing and broadcasts
//! nothing.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use core_anim::AnimationEngine;
use core_api::{handlers, ApiState, LogHistory};
use core_color::{Color, PresetTable, Rgb};
use core_control::{wire_controllers, Services};
use core_events::{EventBus, TaskRegistry};
use core_hw::{Chain, MockChain};
use core_model::{
    AnimationConfig, AnimationId, AnimationState, ParamDef, ParamId, ParamKind, ParamValue,
    ZoneConfig, ZoneId, ZoneMapper,
};
use core_render::{ChainBinding, FrameManager, FrameManagerConfig, SubmitFrames};
use core_state::{PersistedState, StateRepository, ZoneService};
use core_transition::TransitionService;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

fn zone_config(id: &str, order: usize, start: usize, pixels: usize) -> ZoneConfig {
    ZoneConfig {
        id: ZoneId::from(id),
        display_name: id.to_string(),
        pixel_count: pixels,
        enabled: true,
        reversed: false,
        order,
        gpio: 18,
        start_index: start,
    }
}

async fn state(dir: &std::path::Path) -> ApiState {
    let configs = vec![zone_config("FLOOR", 0, 0, 3), zone_config("LAMP", 1, 3, 3)];
    let registry = ZoneService::registry_handle(configs.clone(), &PersistedState::default());
    let provider = ZoneService::provider_for(&registry);
    let (repo, _task) = StateRepository::spawn(dir.join("state.json"), provider);
    let bus = Arc::new(EventBus::new());
    let presets = Arc::new(PresetTable::from_parts(
        [("warm_white".to_string(), Rgb(255, 200, 150))]
            .into_iter()
            .collect(),
        vec!["warm_white".to_string()],
        ["warm_white".to_string()].into_iter().collect(),
    ));
    let speed = ParamDef {
        id: ParamId::from("SPEED"),
        kind: ParamKind::Percent,
        min: 1.0,
        max: 100.0,
        step: 5.0,
        wraps: false,
        default: ParamValue::Int(50),
    };
    let params: Arc<BTreeMap<ParamId, ParamDef>> =
        Arc::new([(speed.id.clone(), speed)].into_iter().collect());
    let animations = Arc::new(vec![AnimationConfig {
        id: AnimationId::from("BREATHE"),
        display_name: "Breathe".to_string(),
        description: "Sinusoidal brightness swell".to_string(),
        parameters: vec![ParamId::from("SPEED")],
    }]);
    let zones = Arc::new(ZoneService::new(
        registry,
        bus.clone(),
        repo,
        presets,
        params,
        animations,
    ));
    let chain = Arc::new(MockChain::new("main", 6));
    let mapper = ZoneMapper::new(&configs, 6).unwrap();
    let statics_zones = zones.clone();
    let (manager, sink) = FrameManager::new(
        vec![ChainBinding {
            chain: chain as Arc<dyn Chain>,
            mapper,
        }],
        None,
        Arc::new(move || statics_zones.static_zone_rgbs()),
        FrameManagerConfig::default(),
    );
    let transitions = Arc::new(TransitionService::new(
        Arc::new(sink.clone()) as Arc<dyn SubmitFrames>,
        manager.composite(),
        Duration::from_millis(1),
    ));
    let engine = Arc::new(AnimationEngine::new(
        zones.clone(),
        Arc::new(sink.clone()) as Arc<dyn SubmitFrames>,
        transitions.clone(),
        bus.clone(),
    ));
    let services = Services {
        zones,
        engine,
        transitions,
        sink,
        bus,
        tasks: Arc::new(TaskRegistry::new()),
    };
    let lighting = wire_controllers(&services);
    ApiState::new(services, lighting, LogHistory::new())
}

#[tokio::test(start_paused = true)]
async fn health_reports_ok() {
    let Json(body) = handlers::health().await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test(start_paused = true)]
async fn zone_listing_and_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let api = state(dir.path()).await;
    let Json(zones) = handlers::list_zones(State(api.clone())).await;
    assert_eq!(zones.len(), 2);

    let result = handlers::get_zone(State(api.clone()), Path("FLOOR".to_string())).await;
    assert_eq!(result.unwrap().0.id, ZoneId::from("FLOOR"));

    let err = handlers::get_zone(State(api), Path("ATTIC".to_string()))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn color_put_applies_and_validates() {
    let dir = tempfile::tempdir().unwrap();
    let api = state(dir.path()).await;
    let snapshot = handlers::put_color(
        State(api.clone()),
        Path("FLOOR".to_string()),
        Json(Color::hue(180)),
    )
    .await
    .unwrap();
    assert_eq!(snapshot.0.color, Color::hue(180));

    let err = handlers::put_color(
        State(api.clone()),
        Path("FLOOR".to_string()),
        Json(Color::preset("no_such_preset")),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);

    // failed mutation preserved the previous state
    let current = handlers::get_zone(State(api), Path("FLOOR".to_string()))
        .await
        .unwrap();
    assert_eq!(current.0.color, Color::hue(180));
}

#[tokio::test(start_paused = true)]
async fn render_mode_rejects_unknown_strings() {
    let dir = tempfile::tempdir().unwrap();
    let api = state(dir.path()).await;
    let err = handlers::put_render_mode(
        State(api),
        Path("FLOOR".to_string()),
        Json(handlers::RenderModeBody {
            mode: "DISCO".to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn animation_parameter_flow_and_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let api = state(dir.path()).await;

    // parameter update without an assigned animation conflicts
    let err = handlers::put_animation_parameters(
        State(api.clone()),
        Path("FLOOR".to_string()),
        Json(handlers::ParametersBody {
            parameters: [(ParamId::from("SPEED"), ParamValue::Int(80))]
                .into_iter()
                .collect(),
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::CONFLICT);

    handlers::put_animation(
        State(api.clone()),
        Path("FLOOR".to_string()),
        Json(handlers::AnimationBody {
            animation: Some(AnimationState::new(AnimationId::from("BREATHE"))),
        }),
    )
    .await
    .unwrap();

    let snapshot = handlers::put_animation_parameters(
        State(api.clone()),
        Path("FLOOR".to_string()),
        Json(handlers::ParametersBody {
            parameters: [(ParamId::from("SPEED"), ParamValue::Int(80))]
                .into_iter()
                .collect(),
        }),
    )
    .await
    .unwrap();
    let anim = snapshot.0.animation.unwrap();
    assert_eq!(
        anim.parameters.get(&ParamId::from("SPEED")),
        Some(&ParamValue::Int(80))
    );

    // out-of-range values are rejected
    let err = handlers::put_animation_parameters(
        State(api),
        Path("FLOOR".to_string()),
        Json(handlers::ParametersBody {
            parameters: [(ParamId::from("SPEED"), ParamValue::Int(500))]
                .into_iter()
                .collect(),
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn animation_catalog_includes_param_defs() {
    let dir = tempfile::tempdir().unwrap();
    let api = state(dir.path()).await;
    let Json(catalog) = handlers::list_animations(State(api.clone())).await;
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].parameters[0].id, ParamId::from("SPEED"));

    let err = handlers::get_animation(State(api), Path("STROBE".to_string()))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}
