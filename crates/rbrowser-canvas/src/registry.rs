//! Registry of open canvases and the active-canvas pointer.

use std::collections::HashMap;

use tracing::{debug, info};

use rbrowser_core::types::{CanvasEntry, CanvasKind};

use crate::canvas::Canvas;

/// All canvases of one browser session, keyed by name.
///
/// Names are `webcanvN` / `rcanvN` with a per-kind counter that only grows,
/// so a closed canvas's name is never handed out again.
#[derive(Debug)]
pub struct CanvasRegistry {
    canvases: Vec<Canvas>,
    active: String,
    issued: HashMap<CanvasKind, u32>,
    width: u32,
    height: u32,
}

impl Default for CanvasRegistry {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

impl CanvasRegistry {
    /// New registry whose canvases get the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvases: Vec::new(),
            active: String::new(),
            issued: HashMap::new(),
            width,
            height,
        }
    }

    /// Create a canvas of `kind`. It becomes the active canvas.
    pub fn create(&mut self, kind: CanvasKind) -> &mut Canvas {
        let counter = self.issued.entry(kind).or_insert(0);
        *counter += 1;
        let name = format!("{}{}", kind.name_prefix(), counter);

        info!(canvas = %name, ?kind, "Created canvas");
        self.active = name.clone();
        self.canvases
            .push(Canvas::new(name, kind, self.width, self.height));
        let last = self.canvases.len() - 1;
        &mut self.canvases[last]
    }

    /// Close and drop a canvas. Clears the active pointer if it pointed here.
    pub fn close(&mut self, name: &str) -> Option<Canvas> {
        let removed = self
            .canvases
            .iter()
            .position(|c| c.name() == name)
            .map(|idx| {
                let mut canvas = self.canvases.remove(idx);
                canvas.close();
                canvas
            });

        if self.active == name {
            self.active.clear();
        }

        match &removed {
            Some(_) => info!(canvas = %name, "Closed canvas"),
            None => debug!(canvas = %name, "Close requested for unknown canvas"),
        }
        removed
    }

    /// Point the active canvas at `name`. Does not check that it exists.
    pub fn select(&mut self, name: impl Into<String>) {
        self.active = name.into();
        debug!(canvas = %self.active, "Selected canvas");
    }

    pub fn active_name(&self) -> &str {
        &self.active
    }

    /// The active canvas, if the active name matches an open one.
    pub fn active(&self) -> Option<&Canvas> {
        self.get(&self.active)
    }

    pub fn active_mut(&mut self) -> Option<&mut Canvas> {
        let active = self.active.clone();
        self.get_mut(&active)
    }

    pub fn get(&self, name: &str) -> Option<&Canvas> {
        self.canvases.iter().find(|c| c.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Canvas> {
        self.canvases.iter_mut().find(|c| c.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Canvas> {
        self.canvases.iter()
    }

    /// Listing for the init message: legacy canvases first, each kind in
    /// creation order.
    pub fn entries(&self) -> Vec<CanvasEntry> {
        let legacy = self.canvases.iter().filter(|c| c.kind() == CanvasKind::Legacy);
        let next_gen = self.canvases.iter().filter(|c| c.kind() == CanvasKind::NextGen);
        legacy.chain(next_gen).map(Canvas::entry).collect()
    }

    pub fn len(&self) -> usize {
        self.canvases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canvases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbrowser_core::types::Drawable;

    #[test]
    fn test_create_names_and_activates() {
        let mut reg = CanvasRegistry::default();
        assert_eq!(reg.create(CanvasKind::Legacy).name(), "webcanv1");
        assert_eq!(reg.create(CanvasKind::Legacy).name(), "webcanv2");
        assert_eq!(reg.create(CanvasKind::NextGen).name(), "rcanv1");
        assert_eq!(reg.active_name(), "rcanv1");
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_close_removes_exactly_one() {
        let mut reg = CanvasRegistry::default();
        for _ in 0..4 {
            reg.create(CanvasKind::Legacy);
        }
        reg.select("webcanv2");

        let closed = reg.close("webcanv2").unwrap();
        assert_eq!(closed.name(), "webcanv2");
        assert_eq!(reg.len(), 3);
        assert!(reg.get("webcanv2").is_none());
        assert!(reg.get("webcanv1").is_some());
        assert!(reg.get("webcanv4").is_some());
        assert_eq!(reg.active_name(), "");
        assert!(reg.active().is_none());
    }

    #[test]
    fn test_close_inactive_keeps_active() {
        let mut reg = CanvasRegistry::default();
        reg.create(CanvasKind::Legacy);
        reg.create(CanvasKind::Legacy);
        reg.close("webcanv1");
        assert_eq!(reg.active_name(), "webcanv2");
        assert!(reg.close("webcanv9").is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_names_never_reused() {
        let mut reg = CanvasRegistry::default();
        reg.create(CanvasKind::Legacy);
        reg.create(CanvasKind::Legacy);
        reg.close("webcanv1");
        // One canvas left, but the next name is not webcanv2 again
        assert_eq!(reg.create(CanvasKind::Legacy).name(), "webcanv3");
        let names: Vec<_> = reg.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, ["webcanv2", "webcanv3"]);
    }

    #[test]
    fn test_select_unknown_is_fail_soft() {
        let mut reg = CanvasRegistry::default();
        reg.create(CanvasKind::NextGen);
        reg.select("missing");
        assert_eq!(reg.active_name(), "missing");
        assert!(reg.active().is_none());
        assert!(reg.active_mut().is_none());

        reg.select("rcanv1");
        assert_eq!(reg.active().unwrap().name(), "rcanv1");
    }

    #[test]
    fn test_entries_legacy_first() {
        let mut reg = CanvasRegistry::default();
        reg.create(CanvasKind::NextGen);
        reg.create(CanvasKind::Legacy);
        reg.create(CanvasKind::NextGen);

        let entries = reg.entries();
        let names: Vec<_> = entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, ["webcanv1", "rcanv1", "rcanv2"]);
        assert_eq!(entries[0].kind(), "root6");
        assert_eq!(entries[1].url(), "canvas/rcanv1/");
    }

    #[test]
    fn test_draw_on_active() {
        let mut reg = CanvasRegistry::default();
        reg.create(CanvasKind::Legacy);
        reg.active_mut()
            .unwrap()
            .draw(Drawable::new("h.png", "image/png", "AA=="), "");
        assert_eq!(reg.get("webcanv1").unwrap().num_primitives(), 1);
    }
}
