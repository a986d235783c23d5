//! HTTP handlers. Thin: validate, delegate to the services, map errors.

use crate::{ApiError, ApiState};
use axum::extract::{Path, State};
use axum::Json;
use core_color::Color;
use core_model::{
    AnimationId, AnimationState, ParamDef, ParamId, ParamValue, RenderMode, ZoneId, ZoneSnapshot,
};
use core_transition::TransitionConfig;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

pub async fn list_zones(State(state): State<ApiState>) -> Json<Vec<ZoneSnapshot>> {
    Json(state.services.zones.snapshots())
}

pub async fn get_zone(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<ZoneSnapshot>, ApiError> {
    let snapshot = state.services.zones.snapshot(&ZoneId::from(id))?;
    Ok(Json(snapshot))
}

pub async fn put_color(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(color): Json<Color>,
) -> Result<Json<ZoneSnapshot>, ApiError> {
    let snapshot = state
        .services
        .zones
        .set_color(&ZoneId::from(id), color)
        .await?;
    Ok(Json(snapshot))
}

#[derive(Debug, Deserialize)]
pub struct BrightnessBody {
    pub brightness: u8,
}

pub async fn put_brightness(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<BrightnessBody>,
) -> Result<Json<ZoneSnapshot>, ApiError> {
    let snapshot = state
        .services
        .zones
        .set_brightness(&ZoneId::from(id), body.brightness)
        .await?;
    Ok(Json(snapshot))
}

#[derive(Debug, Deserialize)]
pub struct IsOnBody {
    pub is_on: bool,
}

pub async fn put_is_on(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<IsOnBody>,
) -> Result<Json<ZoneSnapshot>, ApiError> {
    let snapshot = state
        .services
        .zones
        .set_power(&ZoneId::from(id), body.is_on)
        .await?;
    Ok(Json(snapshot))
}

#[derive(Debug, Deserialize)]
pub struct RenderModeBody {
    pub mode: String,
}

pub async fn put_render_mode(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<RenderModeBody>,
) -> Result<Json<ZoneSnapshot>, ApiError> {
    let mode = RenderMode::from_str(&body.mode).map_err(|e| ApiError::validation(e.to_string()))?;
    let zone = ZoneId::from(id);
    let snapshot = state.services.zones.set_mode(&zone, mode).await?;
    state
        .lighting
        .sync_engine(Some(TransitionConfig::mode_switch()))
        .await;
    Ok(Json(snapshot))
}

#[derive(Debug, Deserialize)]
pub struct AnimationBody {
    pub animation: Option<AnimationState>,
}

pub async fn put_animation(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<AnimationBody>,
) -> Result<Json<ZoneSnapshot>, ApiError> {
    let zone = ZoneId::from(id);
    let snapshot = state
        .services
        .zones
        .set_animation(&zone, body.animation)
        .await?;
    if snapshot.mode == RenderMode::Animation {
        state
            .lighting
            .sync_engine(Some(TransitionConfig::animation_switch()))
            .await;
    }
    Ok(Json(snapshot))
}

#[derive(Debug, Deserialize)]
pub struct ParametersBody {
    pub parameters: BTreeMap<ParamId, ParamValue>,
}

pub async fn put_animation_parameters(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<ParametersBody>,
) -> Result<Json<ZoneSnapshot>, ApiError> {
    let zone = ZoneId::from(id);
    let mut snapshot = state.services.zones.snapshot(&zone)?;
    for (param, value) in body.parameters {
        snapshot = state
            .services
            .zones
            .set_animation_param(&zone, &param, value)
            .await?;
    }
    Ok(Json(snapshot))
}

/// Animation metadata joined with its full parameter definitions.
#[derive(Debug, Clone, Serialize)]
pub struct AnimationInfo {
    pub id: AnimationId,
    pub display_name: String,
    pub description: String,
    pub parameters: Vec<ParamDef>,
}

fn animation_info(
    config: core_model::AnimationConfig,
    defs: &BTreeMap<ParamId, ParamDef>,
) -> AnimationInfo {
    AnimationInfo {
        parameters: config
            .parameters
            .iter()
            .filter_map(|p| defs.get(p).cloned())
            .collect(),
        id: config.id,
        display_name: config.display_name,
        description: config.description,
    }
}

pub async fn list_animations(State(state): State<ApiState>) -> Json<Vec<AnimationInfo>> {
    let defs = state.services.zones.param_defs();
    Json(
        state
            .services
            .zones
            .animations()
            .into_iter()
            .map(|config| animation_info(config, &defs))
            .collect(),
    )
}

pub async fn get_animation(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<AnimationInfo>, ApiError> {
    let config = state
        .services
        .zones
        .animation_config(&AnimationId::from(id))?;
    let defs = state.services.zones.param_defs();
    Ok(Json(animation_info(config, &defs)))
}

pub async fn list_tasks(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(json!({"tasks": state.services.tasks.all()}))
}

pub async fn list_active_tasks(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(json!({"tasks": state.services.tasks.active()}))
}
