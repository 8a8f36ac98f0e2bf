use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use utoipa::ToSchema;

use super::clock::TimeStep;
use super::controller::{FetchTicket, ModeController, PlaybackStatus};
use super::error::{FetchError, PlaybackError};
use super::store::{SampleStore, WindowData};
use super::types::{LiveUpdate, Mode, UnitSnapshot};
use crate::history::HistorySource;

const CONTROL_QUEUE: usize = 32;
const FETCH_QUEUE: usize = 4;
const MIN_FRAME_INTERVAL: std::time::Duration = std::time::Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq)]
pub enum ControlRequest {
    Play,
    Pause,
    Seek(DateTime<Utc>),
    Step { amount: i32, unit: TimeStep },
    SetSpeed(f64),
    NextSpeed,
    SetWindowHours(f64),
    SetMode(Mode),
    Toggle,
}

/// What the map shows right now.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Frame {
    pub mode: Mode,
    /// Playback position; absent while live.
    pub virtual_time: Option<DateTime<Utc>>,
    pub units: Vec<UnitSnapshot>,
    pub rendered_at: DateTime<Utc>,
}

struct ControlEnvelope {
    request: ControlRequest,
    reply: oneshot::Sender<Result<PlaybackStatus, PlaybackError>>,
}

type FetchResult = (FetchTicket, Result<WindowData, FetchError>);

#[derive(Debug)]
struct Shared {
    frame: Frame,
    status: PlaybackStatus,
}

#[derive(Debug)]
struct WorkerHandle {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Runs a [`ModeController`] on its own task.
///
/// The task owns the controller; everything else talks to it through
/// [`Engine::control`] and reads the last published frame and status.
pub struct Engine {
    shared: Arc<StdMutex<Shared>>,
    control_tx: mpsc::Sender<ControlEnvelope>,
    worker: StdMutex<Option<WorkerHandle>>,
}

impl Engine {
    /// Spawns the frame loop. Must be called from within a tokio runtime.
    pub fn start(
        mut controller: ModeController,
        source: Arc<dyn HistorySource>,
        live_rx: mpsc::Receiver<LiveUpdate>,
        frame_interval: std::time::Duration,
    ) -> Self {
        let units = controller.project();
        let shared = Arc::new(StdMutex::new(Shared {
            frame: frame_of(&controller, units),
            status: controller.status(),
        }));
        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE);
        let (stop_tx, stop_rx) = oneshot::channel();

        let join = tokio::spawn(run_engine_loop(
            controller,
            source,
            shared.clone(),
            control_rx,
            live_rx,
            frame_interval,
            stop_rx,
        ));

        Self {
            shared,
            control_tx,
            worker: StdMutex::new(Some(WorkerHandle { stop_tx, join })),
        }
    }

    pub fn frame(&self) -> Frame {
        lock(&self.shared).frame.clone()
    }

    pub fn status(&self) -> PlaybackStatus {
        lock(&self.shared).status.clone()
    }

    /// Applies `request` on the engine task and returns the resulting status.
    pub async fn control(&self, request: ControlRequest) -> Result<PlaybackStatus, PlaybackError> {
        let (reply, response) = oneshot::channel();
        self.control_tx
            .send(ControlEnvelope { request, reply })
            .await
            .map_err(|_| PlaybackError::EngineStopped)?;
        response.await.map_err(|_| PlaybackError::EngineStopped)?
    }

    pub async fn stop(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            let _ = worker.stop_tx.send(());
            let _ = worker.join.await;
            log::info!("Playback engine stopped");
        }
    }
}

fn lock(shared: &StdMutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

fn frame_of(controller: &ModeController, units: Vec<UnitSnapshot>) -> Frame {
    let mode = controller.mode();
    Frame {
        mode,
        virtual_time: (mode == Mode::Historical).then(|| controller.clock().virtual_time()),
        units,
        rendered_at: Utc::now(),
    }
}

fn publish(shared: &StdMutex<Shared>, controller: &ModeController, units: Vec<UnitSnapshot>) {
    let frame = frame_of(controller, units);
    let status = controller.status();
    let mut locked = lock(shared);
    locked.frame = frame;
    locked.status = status;
}

fn apply_control(
    controller: &mut ModeController,
    request: ControlRequest,
    now: DateTime<Utc>,
) -> Result<Option<FetchTicket>, PlaybackError> {
    match request {
        ControlRequest::Play => controller.play(),
        ControlRequest::Pause => controller.pause(),
        ControlRequest::Seek(instant) => {
            controller.seek(instant);
        }
        ControlRequest::Step { amount, unit } => {
            controller.step(amount, unit);
        }
        ControlRequest::SetSpeed(multiplier) => controller.set_speed(multiplier)?,
        ControlRequest::NextSpeed => {
            controller.next_speed();
        }
        ControlRequest::SetWindowHours(hours) => return controller.set_window_hours(hours, now),
        ControlRequest::SetMode(mode) => return Ok(controller.set_mode(mode, now)),
        ControlRequest::Toggle => return Ok(controller.toggle(now)),
    }
    Ok(None)
}

fn spawn_fetch(source: Arc<dyn HistorySource>, ticket: FetchTicket, tx: mpsc::Sender<FetchResult>) {
    tokio::spawn(async move {
        let result = SampleStore::load_window(source.as_ref(), ticket.window).await;
        if tx.send((ticket, result)).await.is_err() {
            log::debug!("Engine gone before fetch #{} completed", ticket.generation);
        }
    });
}

async fn run_engine_loop(
    mut controller: ModeController,
    source: Arc<dyn HistorySource>,
    shared: Arc<StdMutex<Shared>>,
    mut control_rx: mpsc::Receiver<ControlEnvelope>,
    mut live_rx: mpsc::Receiver<LiveUpdate>,
    frame_interval: std::time::Duration,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let (fetch_tx, mut fetch_rx) = mpsc::channel::<FetchResult>(FETCH_QUEUE);
    // interval() panics on a zero period
    let frame_interval = frame_interval.max(MIN_FRAME_INTERVAL);
    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_tick = Instant::now();
    let mut live_open = true;

    log::info!("Playback engine running, frame interval {:?}", frame_interval);

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            now = ticker.tick() => {
                let elapsed = now.saturating_duration_since(last_tick);
                last_tick = now;
                let units = controller.tick(elapsed);
                publish(&shared, &controller, units);
            }
            envelope = control_rx.recv() => {
                let Some(ControlEnvelope { request, reply }) = envelope else {
                    break;
                };
                log::debug!("Control request {:?}", request);
                let result = match apply_control(&mut controller, request, Utc::now()) {
                    Ok(ticket) => {
                        if let Some(ticket) = ticket {
                            spawn_fetch(source.clone(), ticket, fetch_tx.clone());
                        }
                        Ok(controller.status())
                    }
                    Err(e) => Err(e),
                };
                let units = controller.project();
                publish(&shared, &controller, units);
                let _ = reply.send(result);
            }
            update = live_rx.recv(), if live_open => {
                match update {
                    Some(update) => {
                        controller.ingest_live(update);
                    }
                    None => {
                        live_open = false;
                        controller.live_feed_down(
                            &FetchError::LiveFeed("push channel closed".into()),
                            Utc::now(),
                        );
                    }
                }
                let units = controller.project();
                publish(&shared, &controller, units);
            }
            Some((ticket, result)) = fetch_rx.recv() => {
                controller.apply_fetch(ticket, result);
                let units = controller.project();
                publish(&shared, &controller, units);
            }
        }
    }
}
