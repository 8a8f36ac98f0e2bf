use utoipa::OpenApi;

use super::api::error::ErrorResponse;
use super::api::playback::{ModeRequest, SeekRequest, SpeedRequest, StepRequest, WindowRequest};
use super::api::units::UnitFocus;

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::units::list_units,
        super::api::units::get_unit,
        super::api::playback::status,
        super::api::playback::play,
        super::api::playback::pause,
        super::api::playback::seek,
        super::api::playback::step,
        super::api::playback::set_speed,
        super::api::playback::next_speed,
        super::api::playback::set_window,
        super::api::playback::set_mode,
        super::api::playback::toggle,
        super::api::live::push_update,
    ),
    components(
        schemas(
            SeekRequest,
            StepRequest,
            SpeedRequest,
            WindowRequest,
            ModeRequest,
            ErrorResponse,
            UnitFocus,
            crate::playback::UnitInfo,
            crate::playback::Frame,
            crate::playback::UnitSnapshot,
            crate::playback::SnapshotSource,
            crate::playback::Position,
            crate::playback::LiveUpdate,
            crate::playback::Mode,
            crate::playback::TimeStep,
            crate::playback::TimeWindow,
            crate::playback::PlaybackClock,
            crate::playback::PlaybackStatus,
            crate::playback::FetchTicket,
            crate::playback::FeedHealth,
        )
    ),
    info(
        title = "Boatwatch Playback API",
        description = "Live and historical positions of the fleet",
        version = "0.1.0"
    ),
    tags(
        (name = "units", description = "Displayed unit positions"),
        (name = "playback", description = "Mode and playback clock controls"),
        (name = "live", description = "Push feed ingestion")
    )
)]
pub struct ApiDoc;
