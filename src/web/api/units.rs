use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::playback::{Frame, UnitInfo, UnitSnapshot};
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::server::AppState;

#[utoipa::path(
    get,
    path = "/api/units",
    responses(
        (status = 200, description = "Units displayed in the current frame", body = Frame)
    ),
    tag = "units"
)]
pub async fn list_units(State(state): State<AppState>) -> Json<Frame> {
    Json(state.engine.frame())
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnitFocus {
    pub snapshot: UnitSnapshot,
    /// Registry entry; absent for units not listed in the configuration.
    pub info: Option<UnitInfo>,
}

/// Used by the map to fly to a selected boat.
#[utoipa::path(
    get,
    path = "/api/units/{id}",
    params(
        ("id" = String, Path, description = "Unit identifier")
    ),
    responses(
        (status = 200, description = "Displayed snapshot of the unit", body = UnitFocus),
        (status = 404, description = "Unit not displayed in the current frame", body = ErrorResponse)
    ),
    tag = "units"
)]
pub async fn get_unit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<UnitFocus>> {
    let snapshot = state
        .engine
        .frame()
        .units
        .into_iter()
        .find(|unit| unit.unit_id == id)
        .ok_or(ApiError::NotFound("unit_not_displayed"))?;
    let info = state.registry.get(&id).cloned();
    Ok(Json(UnitFocus { snapshot, info }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{HistoryRow, MemoryHistorySource};
    use crate::playback::{ControllerSettings, Engine, ModeController, UnitRegistry};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn registry() -> UnitRegistry {
        UnitRegistry::new(vec![UnitInfo {
            id: "boat-1".into(),
            name: "Sea Star".into(),
            registration_number: Some("TN-MAL-001".into()),
        }])
    }

    async fn state() -> AppState {
        let now = chrono::Utc::now();
        let mut controller =
            ModeController::new(ControllerSettings::default(), registry(), now).unwrap();
        controller.seed_live(vec![HistoryRow {
            unit_id: Some("boat-1".into()),
            lat: 8.08,
            lon: 77.53,
            heading: Some(90.0),
            speed: Some(2.0),
            battery_level: Some(75.0),
            recorded_at: now.to_rfc3339(),
        }]);
        let (live_tx, live_rx) = mpsc::channel(4);
        let engine = Engine::start(
            controller,
            Arc::new(MemoryHistorySource::default()),
            live_rx,
            std::time::Duration::from_millis(5),
        );
        AppState {
            engine: Arc::new(engine),
            registry: Arc::new(registry()),
            live_tx,
        }
    }

    #[tokio::test]
    async fn test_focus_carries_registry_entry() {
        let state = state().await;

        let Ok(Json(focus)) = get_unit(State(state.clone()), Path("boat-1".to_string())).await else {
            panic!("boat-1 should be displayed");
        };
        assert_eq!(focus.snapshot.position.lat, 8.08);
        assert_eq!(
            focus.info.and_then(|i| i.registration_number).as_deref(),
            Some("TN-MAL-001")
        );

        assert!(matches!(
            get_unit(State(state.clone()), Path("boat-9".to_string())).await,
            Err(ApiError::NotFound(_))
        ));
        state.engine.stop().await;
    }
}
