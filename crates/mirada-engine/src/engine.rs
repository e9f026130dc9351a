use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mirada_core::{FaceGeometry, FaceQuality, Observation, Rect};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::capture::{CaptureError, CapturedImage, FrameSource};
use crate::config::VerifierConfig;
use crate::controller::{
    Controller, HoldCompletion, PersistRequest, StateSnapshot, StepOutcome, VerificationEvent,
};
use crate::store::{CaptureStore, StoreError};

#[derive(Error, Debug)]
pub enum VerifierError {
    #[error("verifier task exited")]
    ChannelClosed,
}

/// Messages handled by the verifier task. Capture/persist completions
/// re-enter through the same queue so controller state is only ever touched
/// from one place.
enum VerifierMsg {
    Start {
        reply: oneshot::Sender<Uuid>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
    LayoutChanged {
        viewport: Rect,
        reply: oneshot::Sender<()>,
    },
    GeometryFrame {
        obs: Observation<FaceGeometry>,
        reply: oneshot::Sender<()>,
    },
    QualityFrame {
        obs: Observation<FaceQuality>,
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<StateSnapshot>,
    },
    CaptureDone {
        run_id: Uuid,
        result: Result<CapturedImage, CaptureError>,
    },
    PersistDone {
        run_id: Uuid,
        result: Result<PathBuf, StoreError>,
    },
}

/// Clone-safe handle to the verifier task.
#[derive(Clone)]
pub struct VerifierHandle {
    tx: mpsc::Sender<VerifierMsg>,
    state_rx: watch::Receiver<StateSnapshot>,
}

impl VerifierHandle {
    /// Begin a fresh verification run and return its id.
    pub async fn start(&self) -> Result<Uuid, VerifierError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(VerifierMsg::Start { reply: reply_tx })
            .await
            .map_err(|_| VerifierError::ChannelClosed)?;
        reply_rx.await.map_err(|_| VerifierError::ChannelClosed)
    }

    /// Halt the run: no further captures, in-flight completions discarded.
    pub async fn stop(&self) -> Result<(), VerifierError> {
        self.unit_request(|reply| VerifierMsg::Stop { reply }).await
    }

    /// Clear all run state back to not-started.
    pub async fn reset(&self) -> Result<(), VerifierError> {
        self.unit_request(|reply| VerifierMsg::Reset { reply }).await
    }

    /// Re-centre the face guide within a resized viewport.
    pub async fn layout_changed(&self, viewport: Rect) -> Result<(), VerifierError> {
        self.unit_request(|reply| VerifierMsg::LayoutChanged { viewport, reply })
            .await
    }

    /// Feed one geometry observation. Resolves once the frame is applied, so
    /// a caller that awaits sees its effect in the next snapshot.
    pub async fn geometry_frame(
        &self,
        obs: Observation<FaceGeometry>,
    ) -> Result<(), VerifierError> {
        self.unit_request(|reply| VerifierMsg::GeometryFrame { obs, reply })
            .await
    }

    /// Feed one quality observation.
    pub async fn quality_frame(&self, obs: Observation<FaceQuality>) -> Result<(), VerifierError> {
        self.unit_request(|reply| VerifierMsg::QualityFrame { obs, reply })
            .await
    }

    /// Current state, queried through the queue (ordered after everything
    /// already sent on this handle).
    pub async fn snapshot(&self) -> Result<StateSnapshot, VerifierError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(VerifierMsg::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| VerifierError::ChannelClosed)?;
        reply_rx.await.map_err(|_| VerifierError::ChannelClosed)
    }

    /// Watch channel carrying the latest state; updated only when the state
    /// actually changes.
    pub fn state(&self) -> watch::Receiver<StateSnapshot> {
        self.state_rx.clone()
    }

    async fn unit_request(
        &self,
        build: impl FnOnce(oneshot::Sender<()>) -> VerifierMsg,
    ) -> Result<(), VerifierError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| VerifierError::ChannelClosed)?;
        reply_rx.await.map_err(|_| VerifierError::ChannelClosed)
    }
}

/// Spawn the verifier actor.
///
/// All controller state lives inside the spawned task; the handle talks to it
/// over a bounded queue and capture/persist completions re-enter through a
/// weak sender, so the task exits once every handle is dropped even with work
/// in flight. Returns the handle and the event stream for the host.
pub fn spawn_verifier(
    config: VerifierConfig,
    frames: Arc<dyn FrameSource>,
    store: Arc<dyn CaptureStore>,
) -> (VerifierHandle, mpsc::UnboundedReceiver<VerificationEvent>) {
    let (tx, rx) = mpsc::channel(config.queue_depth);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let controller = Controller::new(config.hold_duration, config.layout_guide);
    let (state_tx, state_rx) = watch::channel(controller.snapshot());

    let task = VerifierTask {
        rx,
        tx_weak: tx.downgrade(),
        controller,
        tick_interval: config.tick_interval,
        frames,
        store,
        events: events_tx,
        state: state_tx,
    };
    tokio::spawn(task.run());

    (VerifierHandle { tx, state_rx }, events_rx)
}

struct VerifierTask {
    rx: mpsc::Receiver<VerifierMsg>,
    tx_weak: mpsc::WeakSender<VerifierMsg>,
    controller: Controller,
    tick_interval: Duration,
    frames: Arc<dyn FrameSource>,
    store: Arc<dyn CaptureStore>,
    events: mpsc::UnboundedSender<VerificationEvent>,
    state: watch::Sender<StateSnapshot>,
}

impl VerifierTask {
    async fn run(mut self) {
        tracing::info!("verifier task started");
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                // Drain pending messages before ticking so a frame that
                // arrived in the same interval is counted by that tick.
                biased;
                msg = self.rx.recv() => {
                    let Some(msg) = msg else { break };
                    self.handle(msg);
                }
                _ = ticker.tick() => self.on_tick(),
            }
        }
        tracing::info!("verifier task exiting");
    }

    fn handle(&mut self, msg: VerifierMsg) {
        match msg {
            VerifierMsg::Start { reply } => {
                let run_id = self.controller.start();
                let _ = reply.send(run_id);
            }
            VerifierMsg::Stop { reply } => {
                self.controller.stop();
                let _ = reply.send(());
            }
            VerifierMsg::Reset { reply } => {
                self.controller.reset();
                let _ = reply.send(());
            }
            VerifierMsg::LayoutChanged { viewport, reply } => {
                self.controller.layout_changed(viewport);
                let _ = reply.send(());
            }
            VerifierMsg::GeometryFrame { obs, reply } => {
                self.controller.geometry_frame(obs);
                let _ = reply.send(());
            }
            VerifierMsg::QualityFrame { obs, reply } => {
                self.controller.quality_frame(obs);
                let _ = reply.send(());
            }
            VerifierMsg::Snapshot { reply } => {
                let _ = reply.send(self.controller.snapshot());
            }
            VerifierMsg::CaptureDone { run_id, result } => {
                if let Some(request) = self.controller.capture_result(run_id, result) {
                    self.spawn_persist(request);
                }
            }
            VerifierMsg::PersistDone { run_id, result } => {
                match self.controller.persist_result(run_id, result) {
                    Some(StepOutcome::Stored { record, finished }) => {
                        self.emit(VerificationEvent::CaptureStored {
                            pose: record.pose,
                            step: record.step,
                            location: record.location.clone(),
                        });
                        if finished {
                            self.emit(VerificationEvent::Succeeded);
                        }
                    }
                    Some(StepOutcome::RunFailed { reason }) => {
                        self.emit(VerificationEvent::Failed { reason });
                    }
                    None => {}
                }
            }
        }
        self.publish();
    }

    fn on_tick(&mut self) {
        if let Some(completion) = self.controller.tick(self.tick_interval) {
            self.emit(VerificationEvent::HoldCompleted {
                pose: completion.pose,
                step: completion.step,
            });
            self.spawn_capture(completion);
        }
        self.publish();
    }

    fn spawn_capture(&self, completion: HoldCompletion) {
        let frames = Arc::clone(&self.frames);
        let tx = self.tx_weak.clone();
        tokio::spawn(async move {
            let result = frames.capture_still().await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx
                    .send(VerifierMsg::CaptureDone {
                        run_id: completion.run_id,
                        result,
                    })
                    .await;
            }
        });
    }

    fn spawn_persist(&self, request: PersistRequest) {
        let store = Arc::clone(&self.store);
        let tx = self.tx_weak.clone();
        tokio::spawn(async move {
            let result = store.save(&request.image, request.pose).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx
                    .send(VerifierMsg::PersistDone {
                        run_id: request.run_id,
                        result,
                    })
                    .await;
            }
        });
    }

    fn emit(&self, event: VerificationEvent) {
        // The host may drop the event stream and rely on the watch channel.
        let _ = self.events.send(event);
    }

    fn publish(&self) {
        let snapshot = self.controller.snapshot();
        self.state.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirada_core::{Pose, VerificationStage};

    struct NullFrames;

    #[async_trait::async_trait]
    impl FrameSource for NullFrames {
        async fn capture_still(&self) -> Result<CapturedImage, CaptureError> {
            Err(CaptureError::Unavailable("no camera in tests".into()))
        }
    }

    struct NullStore;

    #[async_trait::async_trait]
    impl CaptureStore for NullStore {
        async fn save(&self, _image: &CapturedImage, _pose: Pose) -> Result<PathBuf, StoreError> {
            Ok(PathBuf::from("/dev/null"))
        }

        async fn list(&self) -> Result<Vec<(Pose, PathBuf)>, StoreError> {
            Ok(Vec::new())
        }

        async fn clear(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_initial_state_is_not_started() {
        let (handle, _events) = spawn_verifier(
            VerifierConfig::default(),
            Arc::new(NullFrames),
            Arc::new(NullStore),
        );

        let snap = handle.snapshot().await.unwrap();
        assert_eq!(snap.stage, VerificationStage::NotStarted);
        assert!(snap.run_id.is_none());
        assert_eq!(snap.active_pose, None);

        let state = handle.state();
        assert_eq!(state.borrow().stage, VerificationStage::NotStarted);
    }

    #[tokio::test]
    async fn test_start_through_handle() {
        let (handle, _events) = spawn_verifier(
            VerifierConfig::default(),
            Arc::new(NullFrames),
            Arc::new(NullStore),
        );

        let run_id = handle.start().await.unwrap();
        let snap = handle.snapshot().await.unwrap();
        assert!(snap.stage.is_in_progress());
        assert_eq!(snap.run_id, Some(run_id));
        assert_eq!(snap.active_pose, Some(Pose::Center));
    }

    #[tokio::test]
    async fn test_closed_channel_reported() {
        let (tx, rx) = mpsc::channel(1);
        let controller = Controller::new(Duration::from_secs(3), Rect::new(0.0, 0.0, 100.0, 100.0));
        let (_state_tx, state_rx) = watch::channel(controller.snapshot());
        drop(rx);

        let handle = VerifierHandle { tx, state_rx };
        assert!(matches!(
            handle.start().await,
            Err(VerifierError::ChannelClosed)
        ));
        assert!(matches!(
            handle.snapshot().await,
            Err(VerifierError::ChannelClosed)
        ));
    }
}
