//! Async driver for a calibration session.
//!
//! Detection requests run as tokio tasks tagged with the photo id they were
//! started for. Their results come back over a channel and are applied only
//! if that photo is still the current one (last photo wins).

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::calibration::{BatchKind, CalibrationSession, EstimatorSettings, PhotoId};
use crate::detection::DetectionBatch;
use crate::detector::DetectorClient;

/// A detector result addressed to a photo session.
#[derive(Debug, Clone)]
pub struct DetectionUpdate {
    pub photo_id: PhotoId,
    pub kind: BatchKind,
    pub batch: DetectionBatch,
}

/// What happened to an update taken off the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied(BatchKind),
    Stale,
}

/// Sending half handed to detection tasks.
#[derive(Clone)]
pub struct UpdateSender {
    tx: mpsc::UnboundedSender<DetectionUpdate>,
}

impl UpdateSender {
    /// Deliver a batch. Returns `false` if the controller is gone.
    pub fn send(&self, photo_id: PhotoId, kind: BatchKind, batch: DetectionBatch) -> bool {
        self.tx
            .send(DetectionUpdate {
                photo_id,
                kind,
                batch,
            })
            .is_ok()
    }
}

/// Owns the current session and the in-flight detection tasks.
pub struct SessionController {
    session: CalibrationSession,
    tx: mpsc::UnboundedSender<DetectionUpdate>,
    rx: mpsc::UnboundedReceiver<DetectionUpdate>,
    in_flight: Vec<JoinHandle<()>>,
    /// Results still expected for the current photo.
    pending: usize,
}

impl SessionController {
    pub fn new(settings: EstimatorSettings) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            session: CalibrationSession::new(settings),
            tx,
            rx,
            in_flight: Vec::new(),
            pending: 0,
        }
    }

    pub fn session(&self) -> &CalibrationSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut CalibrationSession {
        &mut self.session
    }

    /// Sender that delivers results into this controller.
    pub fn sender(&self) -> UpdateSender {
        UpdateSender {
            tx: self.tx.clone(),
        }
    }

    /// Number of detection results still expected for the current photo.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Start a new photo session, cancelling detection for the previous one.
    pub fn capture(&mut self, photo_uri: Option<String>) -> PhotoId {
        let cancelled = self.in_flight.iter().filter(|h| !h.is_finished()).count();
        for handle in self.in_flight.drain(..) {
            handle.abort();
        }
        if cancelled > 0 {
            tracing::info!("Cancelled {} in-flight detection request(s)", cancelled);
        }
        self.pending = 0;
        self.session.begin_photo(photo_uri)
    }

    /// Run `detection` in the background and deliver its batch for `photo_id`.
    pub fn spawn_detection<F>(&mut self, photo_id: PhotoId, kind: BatchKind, detection: F)
    where
        F: Future<Output = DetectionBatch> + Send + 'static,
    {
        if self.session.current_photo() == Some(photo_id) {
            self.pending += 1;
        }
        let sender = self.sender();
        let handle = tokio::spawn(async move {
            let batch = detection.await;
            sender.send(photo_id, kind, batch);
        });
        self.in_flight.retain(|h| !h.is_finished());
        self.in_flight.push(handle);
    }

    /// Capture a photo and start detection on it.
    ///
    /// The reference client, when given, runs concurrently with the subject
    /// client on the same image.
    pub fn capture_and_detect(
        &mut self,
        photo_uri: Option<String>,
        image: Vec<u8>,
        subject: &DetectorClient,
        reference: Option<&DetectorClient>,
    ) -> PhotoId {
        let photo_id = self.capture(photo_uri);
        let image: Arc<[u8]> = image.into();

        let client = subject.clone();
        let bytes = Arc::clone(&image);
        self.spawn_detection(photo_id, BatchKind::Subject, async move {
            client.detect_or_empty(&bytes).await
        });

        if let Some(reference) = reference {
            let client = reference.clone();
            let bytes = Arc::clone(&image);
            self.spawn_detection(photo_id, BatchKind::Reference, async move {
                client.detect_or_empty(&bytes).await
            });
        }

        photo_id
    }

    fn apply(&mut self, update: DetectionUpdate) -> UpdateOutcome {
        let kind = update.kind;
        if self.session.receive(update.photo_id, kind, update.batch) {
            self.pending = self.pending.saturating_sub(1);
            UpdateOutcome::Applied(kind)
        } else {
            UpdateOutcome::Stale
        }
    }

    /// Wait for the next delivered result and apply it.
    ///
    /// Returns `None` when nothing is pending and nothing is queued.
    pub async fn next_update(&mut self) -> Option<UpdateOutcome> {
        if self.pending == 0 {
            return self.rx.try_recv().ok().map(|update| self.apply(update));
        }
        let update = self.rx.recv().await?;
        Some(self.apply(update))
    }

    /// Wait until every result for the current photo has been applied.
    pub async fn settle(&mut self) {
        while self.pending > 0 {
            if self.next_update().await.is_none() {
                break;
            }
        }
    }

    /// Apply everything already delivered without waiting.
    pub fn drain_ready(&mut self) -> Vec<UpdateOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(update) = self.rx.try_recv() {
            outcomes.push(self.apply(update));
        }
        outcomes
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(EstimatorSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Detection;
    use crate::session::SessionPhase;
    use std::time::Duration;

    fn batch(width: f64) -> DetectionBatch {
        DetectionBatch {
            image: None,
            detections: vec![Detection::new(0.0, 0.0, width, 10.0, "fish", 0.9)],
        }
    }

    #[tokio::test]
    async fn test_detection_is_applied() {
        let mut controller = SessionController::default();
        let id = controller.capture(None);
        controller.spawn_detection(id, BatchKind::Subject, async { batch(50.0) });
        assert_eq!(controller.pending(), 1);

        controller.settle().await;
        assert_eq!(controller.pending(), 0);
        assert_eq!(controller.session().detections()[0].width, 50.0);
        assert_eq!(controller.session().phase(), &SessionPhase::TwoPointCalibrating(0));
    }

    #[tokio::test]
    async fn test_new_capture_cancels_in_flight_detection() {
        let mut controller = SessionController::default();
        let first = controller.capture(None);
        controller.spawn_detection(first, BatchKind::Subject, async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            batch(111.0)
        });

        let second = controller.capture(None);
        controller.spawn_detection(second, BatchKind::Subject, async { batch(222.0) });
        controller.settle().await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(controller.drain_ready().is_empty());
        assert_eq!(controller.session().current_photo(), Some(second));
        assert_eq!(controller.session().detections()[0].width, 222.0);
    }

    #[tokio::test]
    async fn test_stale_response_does_not_overwrite_newer_session() {
        let mut controller = SessionController::default();
        let sender = controller.sender();
        let first = controller.capture(None);
        let second = controller.capture(None);

        controller.spawn_detection(second, BatchKind::Subject, async { batch(222.0) });
        controller.settle().await;

        // The first photo's request resolves late through a detached sender.
        assert!(sender.send(first, BatchKind::Subject, batch(111.0)));
        assert_eq!(controller.drain_ready(), vec![UpdateOutcome::Stale]);
        assert_eq!(controller.session().detections().len(), 1);
        assert_eq!(controller.session().detections()[0].width, 222.0);
    }

    #[tokio::test]
    async fn test_next_update_without_pending_returns_none() {
        let mut controller = SessionController::default();
        controller.capture(None);
        assert_eq!(controller.next_update().await, None);
    }

    #[tokio::test]
    async fn test_concurrent_subject_and_reference() {
        use crate::session::CalibrationMode;

        let settings = EstimatorSettings::default()
            .with_mode(CalibrationMode::ReferenceObject)
            .with_reference("coin", 2.0)
            .with_separate_reference_model(true);
        let mut controller = SessionController::new(settings);
        let id = controller.capture(None);

        controller.spawn_detection(id, BatchKind::Reference, async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            DetectionBatch {
                image: None,
                detections: vec![Detection::new(0.0, 0.0, 20.0, 18.0, "coin", 0.9)],
            }
        });
        controller.spawn_detection(id, BatchKind::Subject, async { batch(150.0) });
        assert_eq!(controller.pending(), 2);

        controller.settle().await;
        assert_eq!(controller.session().estimate().map(|e| e.length_cm), Some(15.0));
    }
}
