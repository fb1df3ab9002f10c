//! A single canvas and its viewers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use rbrowser_core::types::{CanvasEntry, CanvasKind, Drawable};

use crate::protocol::CanvasEvent;

/// One object on a canvas together with its draw options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Primitive {
    pub object: Drawable,
    #[serde(default)]
    pub options: String,
}

/// A drawable surface. Owns every object drawn on it.
#[derive(Debug)]
pub struct Canvas {
    name: String,
    kind: CanvasKind,
    width: u32,
    height: u32,
    primitives: Vec<Primitive>,
    subscribers: Vec<mpsc::Sender<String>>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Canvas {
    pub fn new(name: impl Into<String>, kind: CanvasKind, width: u32, height: u32) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            kind,
            width,
            height,
            primitives: Vec::new(),
            subscribers: Vec::new(),
            created_at: now,
            last_updated: now,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CanvasKind {
        self.kind
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    pub fn num_primitives(&self) -> usize {
        self.primitives.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// The `[kind, url, name]` triple clients use to open this canvas.
    pub fn entry(&self) -> CanvasEntry {
        CanvasEntry::new(self.kind, &self.name)
    }

    pub fn snapshot(&self) -> CanvasEvent {
        CanvasEvent::Snapshot {
            canvas: self.name.clone(),
            width: self.width,
            height: self.height,
            primitives: self.primitives.clone(),
        }
    }

    /// Register a viewer. It receives the current snapshot right away.
    pub fn subscribe(&mut self, tx: mpsc::Sender<String>) {
        if let Ok(msg) = serde_json::to_string(&self.snapshot()) {
            if tx.try_send(msg).is_err() {
                debug!(canvas = %self.name, "Viewer went away before first snapshot");
                return;
            }
        }
        self.subscribers.push(tx);
    }

    /// Replace whatever is shown with `object`.
    ///
    /// Legacy canvases clear and re-send the full state. Next-gen canvases
    /// wipe only when something is shown, then append the new primitive.
    pub fn draw(&mut self, object: Drawable, options: &str) {
        let primitive = Primitive {
            object,
            options: options.to_string(),
        };

        match self.kind {
            CanvasKind::Legacy => {
                self.primitives.clear();
                self.primitives.push(primitive);
                self.touch();
                let snapshot = self.snapshot();
                self.broadcast(&snapshot);
            }
            CanvasKind::NextGen => {
                if !self.primitives.is_empty() {
                    self.wipe();
                }
                self.primitives.push(primitive.clone());
                self.touch();
                self.broadcast(&CanvasEvent::Drawn {
                    index: self.primitives.len() - 1,
                    primitive,
                });
            }
        }
        debug!(canvas = %self.name, kind = ?self.kind, "Canvas updated");
    }

    /// Remove all primitives.
    pub fn wipe(&mut self) {
        self.primitives.clear();
        self.touch();
        self.broadcast(&CanvasEvent::Wiped);
    }

    /// Tell viewers the canvas is gone and drop them.
    pub fn close(&mut self) {
        self.broadcast(&CanvasEvent::Closed);
        self.subscribers.clear();
    }

    fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    fn broadcast(&mut self, event: &CanvasEvent) {
        let msg = match serde_json::to_string(event) {
            Ok(m) => m,
            Err(e) => {
                warn!(%e, "Failed to serialize canvas event");
                return;
            }
        };

        let name = &self.name;
        self.subscribers.retain(|tx| match tx.try_send(msg.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(canvas = %name, "Viewer queue full, dropping canvas event");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: &str) -> Drawable {
        Drawable::new(name, "image/png", "AAAA")
    }

    fn next_event(rx: &mut mpsc::Receiver<String>) -> serde_json::Value {
        let msg = rx.try_recv().expect("expected a canvas event");
        serde_json::from_str(&msg).unwrap()
    }

    #[test]
    fn test_subscribe_sends_snapshot() {
        let mut canvas = Canvas::new("webcanv1", CanvasKind::Legacy, 800, 600);
        let (tx, mut rx) = mpsc::channel(8);
        canvas.subscribe(tx);

        let event = next_event(&mut rx);
        assert_eq!(event["type"], "snapshot");
        assert_eq!(event["canvas"], "webcanv1");
        assert_eq!(event["width"], 800);
        assert_eq!(canvas.subscriber_count(), 1);
    }

    #[test]
    fn test_legacy_draw_replaces_content() {
        let mut canvas = Canvas::new("webcanv1", CanvasKind::Legacy, 800, 600);
        canvas.draw(image("a.png"), "");
        canvas.draw(image("b.png"), "same");

        assert_eq!(canvas.num_primitives(), 1);
        assert_eq!(canvas.primitives()[0].object.name, "b.png");
        assert_eq!(canvas.primitives()[0].options, "same");
    }

    #[test]
    fn test_nextgen_draw_wipes_then_draws() {
        let mut canvas = Canvas::new("rcanv1", CanvasKind::NextGen, 800, 600);
        let (tx, mut rx) = mpsc::channel(8);
        canvas.subscribe(tx);
        let _ = next_event(&mut rx);

        canvas.draw(image("a.png"), "");
        assert_eq!(next_event(&mut rx)["type"], "drawn");

        canvas.draw(image("b.png"), "");
        assert_eq!(next_event(&mut rx)["type"], "wiped");
        let drawn = next_event(&mut rx);
        assert_eq!(drawn["type"], "drawn");
        assert_eq!(drawn["index"], 0);
        assert_eq!(drawn["primitive"]["object"]["name"], "b.png");
        assert_eq!(canvas.num_primitives(), 1);
    }

    #[test]
    fn test_closed_viewers_are_dropped() {
        let mut canvas = Canvas::new("webcanv1", CanvasKind::Legacy, 800, 600);
        let (tx, rx) = mpsc::channel(8);
        canvas.subscribe(tx);
        drop(rx);

        canvas.draw(image("a.png"), "");
        assert_eq!(canvas.subscriber_count(), 0);
    }

    #[test]
    fn test_full_viewer_queue_keeps_subscriber() {
        let mut canvas = Canvas::new("webcanv1", CanvasKind::Legacy, 800, 600);
        let (tx, _rx) = mpsc::channel(1);
        // Snapshot fills the queue
        canvas.subscribe(tx);

        canvas.draw(image("a.png"), "");
        assert_eq!(canvas.subscriber_count(), 1);
    }

    #[test]
    fn test_close_notifies_viewers() {
        let mut canvas = Canvas::new("rcanv1", CanvasKind::NextGen, 800, 600);
        let (tx, mut rx) = mpsc::channel(8);
        canvas.subscribe(tx);
        let _ = next_event(&mut rx);

        canvas.close();
        assert_eq!(next_event(&mut rx)["type"], "closed");
        assert_eq!(canvas.subscriber_count(), 0);
    }
}
