//! The single mutation path for zone and application state.
//!
//! Controllers and the API never touch `ZoneCombined` directly: every
//! write goes through a service method that validates, clamps, publishes
//! the resulting snapshot on the bus, and schedules a debounced save.
//! Readers snapshot freely; on a failed mutation the previous visible
//! state is preserved and no snapshot is broadcast.

use crate::{
    ApplicationState, EditTarget, PersistedState, PersistedZone, SaveKey, StateRepository,
    ZoneCombined, ZoneState,
};
use core_color::{Color, PresetTable, Rgb};
use core_model::{
    AnimationConfig, AnimationId, AnimationState, ParamDef, ParamError, ParamId, RenderMode,
    ZoneConfig, ZoneId, ZoneSnapshot,
};
use core_events::{Event, EventBus};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("unknown zone {0}")]
    ZoneNotFound(ZoneId),
    #[error("unknown animation {0}")]
    AnimationNotFound(AnimationId),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Param(#[from] ParamError),
}

/// Aggregate owner: zones in declared order plus application state.
/// Shared between the service and the repository's snapshot provider;
/// opaque outside this crate.
#[derive(Debug)]
pub struct Registry {
    /// In declared `order`, the order selection cycles through.
    zones: Vec<ZoneCombined>,
    app: ApplicationState,
}

pub struct ZoneService {
    inner: Arc<Mutex<Registry>>,
    bus: Arc<EventBus>,
    repo: StateRepository,
    presets: Arc<PresetTable>,
    params: Arc<BTreeMap<ParamId, ParamDef>>,
    animations: Arc<Vec<AnimationConfig>>,
}

impl ZoneService {
    /// Build the registry from config, overlaying persisted state where
    /// present. The shared registry handle feeds the repository's state
    /// provider, so construct the provider from `registry_handle` before
    /// spawning the repository.
    pub fn registry_handle(
        configs: Vec<ZoneConfig>,
        persisted: &PersistedState,
    ) -> Arc<Mutex<Registry>> {
        let mut zones: Vec<ZoneCombined> = configs
            .into_iter()
            .map(|config| {
                let state = persisted
                    .zones
                    .get(&config.id)
                    .cloned()
                    .map(PersistedZone::into_state)
                    .unwrap_or_else(ZoneState::factory_default);
                ZoneCombined { config, state }
            })
            .collect();
        zones.sort_by_key(|z| z.config.order);
        let mut app = persisted.application.clone();
        if app.selected_zone_index >= zones.len() {
            app.selected_zone_index = 0;
        }
        Arc::new(Mutex::new(Registry { zones, app }))
    }

    /// Snapshot provider closure for `StateRepository::spawn`.
    pub fn provider_for(registry: &Arc<Mutex<Registry>>) -> crate::StateProvider {
        let registry = registry.clone();
        Arc::new(move || {
            let reg = registry.lock().expect("zone registry poisoned");
            PersistedState {
                zones: reg
                    .zones
                    .iter()
                    .map(|z| (z.config.id.clone(), PersistedZone::from_state(&z.state)))
                    .collect(),
                application: reg.app.clone(),
            }
        })
    }

    pub fn new(
        registry: Arc<Mutex<Registry>>,
        bus: Arc<EventBus>,
        repo: StateRepository,
        presets: Arc<PresetTable>,
        params: Arc<BTreeMap<ParamId, ParamDef>>,
        animations: Arc<Vec<AnimationConfig>>,
    ) -> Self {
        Self {
            inner: registry,
            bus,
            repo,
            presets,
            params,
            animations,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.inner.lock().expect("zone registry poisoned")
    }

    fn snapshot_of(zone: &ZoneCombined) -> ZoneSnapshot {
        ZoneSnapshot {
            id: zone.config.id.clone(),
            display_name: zone.config.display_name.clone(),
            pixel_count: zone.config.pixel_count,
            color: zone.state.color.clone(),
            brightness: zone.state.brightness,
            is_on: zone.state.power,
            mode: zone.state.mode,
            animation: zone.state.animation.clone(),
        }
    }

    async fn commit(&self, zone: ZoneId, snapshot: ZoneSnapshot, extra: Option<Event>) {
        let save = self.lock().app.save_on_change;
        if save {
            self.repo.mark_dirty(SaveKey::Zones);
        }
        self.bus
            .publish(Event::ZoneStateChanged { zone: zone.clone() })
            .await;
        if let Some(event) = extra {
            self.bus.publish(event).await;
        }
        self.bus
            .publish(Event::ZoneSnapshotUpdated { snapshot })
            .await;
    }

    // ---- reads ----------------------------------------------------------

    pub fn zone_ids(&self) -> Vec<ZoneId> {
        self.lock()
            .zones
            .iter()
            .map(|z| z.config.id.clone())
            .collect()
    }

    pub fn zone_configs(&self) -> Vec<ZoneConfig> {
        self.lock().zones.iter().map(|z| z.config.clone()).collect()
    }

    pub fn snapshots(&self) -> Vec<ZoneSnapshot> {
        self.lock().zones.iter().map(Self::snapshot_of).collect()
    }

    pub fn snapshot(&self, zone: &ZoneId) -> Result<ZoneSnapshot, StateError> {
        let reg = self.lock();
        reg.zones
            .iter()
            .find(|z| &z.config.id == zone)
            .map(Self::snapshot_of)
            .ok_or_else(|| StateError::ZoneNotFound(zone.clone()))
    }

    pub fn animations(&self) -> Vec<AnimationConfig> {
        self.animations.as_ref().clone()
    }

    pub fn animation_config(&self, id: &AnimationId) -> Result<AnimationConfig, StateError> {
        self.animations
            .iter()
            .find(|a| &a.id == id)
            .cloned()
            .ok_or_else(|| StateError::AnimationNotFound(id.clone()))
    }

    pub fn param_defs(&self) -> Arc<BTreeMap<ParamId, ParamDef>> {
        self.params.clone()
    }

    pub fn presets(&self) -> Arc<PresetTable> {
        self.presets.clone()
    }

    pub fn app_state(&self) -> ApplicationState {
        self.lock().app.clone()
    }

    /// Effective RGB for a zone right now: color × brightness, black when
    /// powered off. This is what producers and the static-merge step use.
    pub fn zone_rgb(&self, zone: &ZoneId) -> Result<Rgb, StateError> {
        let reg = self.lock();
        let z = reg
            .zones
            .iter()
            .find(|z| &z.config.id == zone)
            .ok_or_else(|| StateError::ZoneNotFound(zone.clone()))?;
        Ok(effective_rgb(&z.state, &self.presets))
    }

    /// Effective colors of every zone currently in STATIC mode.
    pub fn static_zone_rgbs(&self) -> Vec<(ZoneId, Rgb)> {
        let reg = self.lock();
        reg.zones
            .iter()
            .filter(|z| z.state.mode == RenderMode::Static)
            .map(|z| (z.config.id.clone(), effective_rgb(&z.state, &self.presets)))
            .collect()
    }

    pub fn zones_in_mode(&self, mode: RenderMode) -> Vec<ZoneId> {
        self.lock()
            .zones
            .iter()
            .filter(|z| z.state.mode == mode)
            .map(|z| z.config.id.clone())
            .collect()
    }

    // ---- zone mutations -------------------------------------------------

    pub async fn set_color(&self, zone: &ZoneId, color: Color) -> Result<ZoneSnapshot, StateError> {
        let color = self.validate_color(color)?;
        let snapshot = {
            let mut reg = self.lock();
            let z = find_mut(&mut reg, zone)?;
            z.state.color = color;
            Self::snapshot_of(z)
        };
        debug!(target: "state.store", zone = %zone, "zone_color_set");
        self.commit(zone.clone(), snapshot.clone(), None).await;
        Ok(snapshot)
    }

    pub async fn set_brightness(
        &self,
        zone: &ZoneId,
        brightness: u8,
    ) -> Result<ZoneSnapshot, StateError> {
        let brightness = brightness.min(100);
        let snapshot = {
            let mut reg = self.lock();
            let z = find_mut(&mut reg, zone)?;
            z.state.brightness = brightness;
            Self::snapshot_of(z)
        };
        self.commit(zone.clone(), snapshot.clone(), None).await;
        Ok(snapshot)
    }

    pub async fn set_power(&self, zone: &ZoneId, on: bool) -> Result<ZoneSnapshot, StateError> {
        let snapshot = {
            let mut reg = self.lock();
            let z = find_mut(&mut reg, zone)?;
            z.state.power = on;
            Self::snapshot_of(z)
        };
        self.commit(zone.clone(), snapshot.clone(), None).await;
        Ok(snapshot)
    }

    pub async fn set_mode(
        &self,
        zone: &ZoneId,
        mode: RenderMode,
    ) -> Result<ZoneSnapshot, StateError> {
        let snapshot = {
            let mut reg = self.lock();
            let z = find_mut(&mut reg, zone)?;
            z.state.mode = mode;
            Self::snapshot_of(z)
        };
        self.commit(
            zone.clone(),
            snapshot.clone(),
            Some(Event::ZoneRenderModeChanged {
                zone: zone.clone(),
                mode,
            }),
        )
        .await;
        Ok(snapshot)
    }

    /// Assign (or clear) the zone's animation, seeding missing parameters
    /// with their defaults.
    pub async fn set_animation(
        &self,
        zone: &ZoneId,
        animation: Option<AnimationState>,
    ) -> Result<ZoneSnapshot, StateError> {
        let animation = match animation {
            Some(mut anim) => {
                let config = self.animation_config(&anim.id)?;
                for pid in &config.parameters {
                    let def = self
                        .params
                        .get(pid)
                        .ok_or_else(|| StateError::Validation(format!("unknown parameter {pid}")))?;
                    match anim.parameters.get(pid) {
                        Some(value) => {
                            let validated = def.validate(*value)?;
                            anim.parameters.insert(pid.clone(), validated);
                        }
                        None => {
                            anim.parameters.insert(pid.clone(), def.default);
                        }
                    }
                }
                let unknown: Vec<String> = anim
                    .parameters
                    .keys()
                    .filter(|p| !config.parameters.contains(*p))
                    .map(ToString::to_string)
                    .collect();
                if !unknown.is_empty() {
                    return Err(StateError::Validation(format!(
                        "animation {} does not accept parameters: {}",
                        anim.id,
                        unknown.join(", ")
                    )));
                }
                Some(anim)
            }
            None => None,
        };
        let animation_id = animation.as_ref().map(|a| a.id.clone());
        let snapshot = {
            let mut reg = self.lock();
            let z = find_mut(&mut reg, zone)?;
            z.state.animation = animation;
            Self::snapshot_of(z)
        };
        self.commit(
            zone.clone(),
            snapshot.clone(),
            Some(Event::ZoneAnimationChanged {
                zone: zone.clone(),
                animation: animation_id,
            }),
        )
        .await;
        Ok(snapshot)
    }

    /// Update one parameter of the zone's assigned animation. Conflicts
    /// when no animation is assigned.
    pub async fn set_animation_param(
        &self,
        zone: &ZoneId,
        param: &ParamId,
        value: core_model::ParamValue,
    ) -> Result<ZoneSnapshot, StateError> {
        let def = self
            .params
            .get(param)
            .ok_or_else(|| StateError::Validation(format!("unknown parameter {param}")))?;
        let validated = def.validate(value)?;
        let (snapshot, animation_id) = {
            let mut reg = self.lock();
            let z = find_mut(&mut reg, zone)?;
            let anim = z.state.animation.as_mut().ok_or_else(|| {
                StateError::Conflict(format!("zone {zone} has no animation assigned"))
            })?;
            anim.parameters.insert(param.clone(), validated);
            let id = anim.id.clone();
            (Self::snapshot_of(z), id)
        };
        self.commit(
            zone.clone(),
            snapshot.clone(),
            Some(Event::AnimationParamChanged {
                animation: animation_id,
                param: param.clone(),
                value: validated,
            }),
        )
        .await;
        Ok(snapshot)
    }

    fn validate_color(&self, color: Color) -> Result<Color, StateError> {
        match color {
            Color::Hue { hue } => Ok(Color::hue(i32::from(hue))),
            Color::Preset { preset_name } => {
                if !self.presets.contains(&preset_name) {
                    return Err(StateError::Validation(format!(
                        "unknown preset `{preset_name}`"
                    )));
                }
                Ok(Color::Preset { preset_name })
            }
            Color::Hsv {
                hue,
                saturation,
                value,
            } => {
                if !(0.0..=1.0).contains(&saturation) || !(0.0..=1.0).contains(&value) {
                    return Err(StateError::Validation(
                        "hsv saturation/value must be within [0, 1]".to_string(),
                    ));
                }
                Ok(Color::Hsv {
                    hue: hue.rem_euclid(360.0),
                    saturation,
                    value,
                })
            }
            other @ (Color::Rgb { .. } | Color::Kelvin { .. }) => Ok(other),
        }
    }

    // ---- application mutations ------------------------------------------

    /// Step zone selection by `delta`, wrapping over the declared order.
    pub async fn select_zone(&self, delta: i32) -> ZoneId {
        let (zone, save) = {
            let mut reg = self.lock();
            let len = reg.zones.len() as i32;
            let idx =
                (reg.app.selected_zone_index as i32 + delta).rem_euclid(len.max(1)) as usize;
            reg.app.selected_zone_index = idx;
            (reg.zones[idx].config.id.clone(), reg.app.save_on_change)
        };
        if save {
            self.repo.mark_dirty(SaveKey::Application);
        }
        zone
    }

    pub fn selected_zone(&self) -> ZoneId {
        let reg = self.lock();
        reg.zones[reg.app.selected_zone_index.min(reg.zones.len() - 1)]
            .config
            .id
            .clone()
    }

    pub async fn cycle_edit_target(&self) -> EditTarget {
        let (target, save) = {
            let mut reg = self.lock();
            reg.app.selected_edit_target = reg.app.selected_edit_target.next();
            (reg.app.selected_edit_target, reg.app.save_on_change)
        };
        if save {
            self.repo.mark_dirty(SaveKey::Application);
        }
        target
    }

    pub async fn set_selected_param(&self, param: Option<ParamId>) {
        let save = {
            let mut reg = self.lock();
            reg.app.selected_animation_param = param;
            reg.app.save_on_change
        };
        if save {
            self.repo.mark_dirty(SaveKey::Application);
        }
    }

    pub async fn set_edit_mode(&self, on: bool) {
        let save = {
            let mut reg = self.lock();
            reg.app.edit_mode = on;
            reg.app.save_on_change
        };
        if save {
            self.repo.mark_dirty(SaveKey::Application);
        }
    }

    pub fn set_frame_by_frame(&self, on: bool) {
        self.lock().app.frame_by_frame = on;
    }
}

fn find_mut<'a>(reg: &'a mut Registry, zone: &ZoneId) -> Result<&'a mut ZoneCombined, StateError> {
    reg.zones
        .iter_mut()
        .find(|z| &z.config.id == zone)
        .ok_or_else(|| StateError::ZoneNotFound(zone.clone()))
}

fn effective_rgb(state: &ZoneState, presets: &PresetTable) -> Rgb {
    if !state.power {
        return Rgb::BLACK;
    }
    state.color.to_rgb(presets).scale(state.brightness)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::ParamValue;

    fn zone_config(id: &str, order: usize, pixels: usize) -> ZoneConfig {
        ZoneConfig {
            id: ZoneId::from(id),
            display_name: id.to_string(),
            pixel_count: pixels,
            enabled: true,
            reversed: false,
            order,
            gpio: 18,
            start_index: 0,
        }
    }

    fn presets() -> Arc<PresetTable> {
        Arc::new(PresetTable::from_parts(
            [("warm_white".to_string(), Rgb(255, 200, 150))]
                .into_iter()
                .collect(),
            vec!["warm_white".to_string()],
            ["warm_white".to_string()].into_iter().collect(),
        ))
    }

    fn params() -> Arc<BTreeMap<ParamId, ParamDef>> {
        let def = ParamDef {
            id: ParamId::from("SPEED"),
            kind: core_model::ParamKind::Percent,
            min: 1.0,
            max: 100.0,
            step: 5.0,
            wraps: false,
            default: ParamValue::Int(50),
        };
        Arc::new([(def.id.clone(), def)].into_iter().collect())
    }

    fn animations() -> Arc<Vec<AnimationConfig>> {
        Arc::new(vec![AnimationConfig {
            id: AnimationId::from("BREATHE"),
            display_name: "Breathe".to_string(),
            description: String::new(),
            parameters: vec![ParamId::from("SPEED")],
        }])
    }

    async fn service(dir: &std::path::Path) -> (ZoneService, Arc<EventBus>) {
        let configs = vec![
            zone_config("FLOOR", 0, 42),
            zone_config("DESK", 1, 30),
            zone_config("LAMP", 2, 18),
        ];
        let registry = ZoneService::registry_handle(configs, &PersistedState::default());
        let provider = ZoneService::provider_for(&registry);
        let (repo, _task) = StateRepository::spawn(dir.join("state.json"), provider);
        let bus = Arc::new(EventBus::new());
        let svc = ZoneService::new(registry, bus.clone(), repo, presets(), params(), animations());
        (svc, bus)
    }

    #[tokio::test]
    async fn set_color_publishes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, bus) = service(dir.path()).await;
        let snap = svc
            .set_color(&ZoneId::from("FLOOR"), Color::hue(180))
            .await
            .unwrap();
        assert_eq!(snap.color, Color::hue(180));
        let history = bus.history();
        assert!(history
            .iter()
            .any(|e| matches!(e, Event::ZoneSnapshotUpdated { snapshot } if snapshot.id == ZoneId::from("FLOOR"))));
    }

    #[tokio::test]
    async fn unknown_preset_is_rejected_and_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, bus) = service(dir.path()).await;
        let before = svc.snapshot(&ZoneId::from("FLOOR")).unwrap();
        let err = svc
            .set_color(&ZoneId::from("FLOOR"), Color::preset("nope"))
            .await;
        assert!(matches!(err, Err(StateError::Validation(_))));
        assert_eq!(svc.snapshot(&ZoneId::from("FLOOR")).unwrap(), before);
        assert!(bus.history().is_empty(), "failed mutation broadcasts nothing");
    }

    #[tokio::test]
    async fn brightness_clamps_to_one_hundred() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, _) = service(dir.path()).await;
        let snap = svc
            .set_brightness(&ZoneId::from("DESK"), 250)
            .await
            .unwrap();
        assert_eq!(snap.brightness, 100);
    }

    #[tokio::test]
    async fn hue_wraps_modulo_360() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, _) = service(dir.path()).await;
        let snap = svc
            .set_color(&ZoneId::from("DESK"), Color::Hue { hue: 540 })
            .await
            .unwrap();
        assert_eq!(snap.color, Color::hue(180));
    }

    #[tokio::test]
    async fn unknown_zone_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, _) = service(dir.path()).await;
        let err = svc.set_power(&ZoneId::from("ATTIC"), true).await;
        assert!(matches!(err, Err(StateError::ZoneNotFound(_))));
    }

    #[tokio::test]
    async fn param_without_animation_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, _) = service(dir.path()).await;
        let err = svc
            .set_animation_param(
                &ZoneId::from("FLOOR"),
                &ParamId::from("SPEED"),
                ParamValue::Int(80),
            )
            .await;
        assert!(matches!(err, Err(StateError::Conflict(_))));
    }

    #[tokio::test]
    async fn set_animation_seeds_defaults_and_rejects_strangers() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, _) = service(dir.path()).await;
        let snap = svc
            .set_animation(
                &ZoneId::from("FLOOR"),
                Some(AnimationState::new(AnimationId::from("BREATHE"))),
            )
            .await
            .unwrap();
        let anim = snap.animation.unwrap();
        assert_eq!(
            anim.parameters.get(&ParamId::from("SPEED")),
            Some(&ParamValue::Int(50))
        );

        let mut bogus = AnimationState::new(AnimationId::from("BREATHE"));
        bogus
            .parameters
            .insert(ParamId::from("WOBBLE"), ParamValue::Int(1));
        let err = svc.set_animation(&ZoneId::from("FLOOR"), Some(bogus)).await;
        assert!(matches!(err, Err(StateError::Validation(_))));
    }

    #[tokio::test]
    async fn selection_wraps_over_declared_order() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, _) = service(dir.path()).await;
        assert_eq!(svc.selected_zone(), ZoneId::from("FLOOR"));
        assert_eq!(svc.select_zone(1).await, ZoneId::from("DESK"));
        assert_eq!(svc.select_zone(2).await, ZoneId::from("FLOOR"));
        assert_eq!(svc.select_zone(-1).await, ZoneId::from("LAMP"));
    }

    #[tokio::test]
    async fn static_merge_uses_effective_color() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, _) = service(dir.path()).await;
        svc.set_color(&ZoneId::from("LAMP"), Color::preset("warm_white"))
            .await
            .unwrap();
        svc.set_brightness(&ZoneId::from("LAMP"), 80).await.unwrap();
        let statics = svc.static_zone_rgbs();
        let lamp = statics
            .iter()
            .find(|(id, _)| id == &ZoneId::from("LAMP"))
            .unwrap();
        assert_eq!(lamp.1, Rgb(255, 200, 150).scale(80));

        svc.set_power(&ZoneId::from("LAMP"), false).await.unwrap();
        let statics = svc.static_zone_rgbs();
        let lamp = statics
            .iter()
            .find(|(id, _)| id == &ZoneId::from("LAMP"))
            .unwrap();
        assert_eq!(lamp.1, Rgb::BLACK);
    }

    #[tokio::test]
    async fn mode_change_publishes_render_mode_event() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, bus) = service(dir.path()).await;
        svc.set_mode(&ZoneId::from("FLOOR"), RenderMode::Animation)
            .await
            .unwrap();
        assert!(bus.history().iter().any(|e| matches!(
            e,
            Event::ZoneRenderModeChanged { mode: RenderMode::Animation, .. }
        )));
        assert_eq!(
            svc.zones_in_mode(RenderMode::Animation),
            vec![ZoneId::from("FLOOR")]
        );
    }
}
