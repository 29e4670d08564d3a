use std::collections::HashSet;

/// Selection and preview state for the gallery, kept separate from the
/// canonical item list so every mutation goes through one owner.
///
/// Selection is N independent booleans keyed by item identifier; the preview
/// target is at most one identifier. Both are intersected with the live
/// identifier set on every list refresh so neither can reference a stale item.
#[derive(Debug, Default)]
pub struct GalleryState {
    selection: HashSet<String>,
    preview: Option<String>,
}

impl GalleryState {
    /// Flip membership in the selection set. No other effect.
    pub fn toggle_select(&mut self, id: &str) {
        if !self.selection.remove(id) {
            self.selection.insert(id.to_string());
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.contains(id)
    }

    pub fn selected_count(&self) -> usize {
        self.selection.len()
    }

    /// Opening a preview never touches the selection set.
    pub fn open_preview(&mut self, id: &str) {
        self.preview = Some(id.to_string());
    }

    pub fn close_preview(&mut self) {
        self.preview = None;
    }

    pub fn preview(&self) -> Option<&str> {
        self.preview.as_deref()
    }

    /// Drop selection entries and a preview target that no longer exist in
    /// the refreshed canonical list.
    pub fn prune(&mut self, live_ids: &HashSet<&str>) {
        self.selection.retain(|id| live_ids.contains(id.as_str()));
        if let Some(p) = &self.preview {
            if !live_ids.contains(p.as_str()) {
                self.preview = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_toggle_is_identity() {
        let mut gallery = GalleryState::default();
        gallery.toggle_select("a.pdf");
        assert!(gallery.is_selected("a.pdf"));
        gallery.toggle_select("a.pdf");
        assert!(!gallery.is_selected("a.pdf"));
        assert_eq!(gallery.selected_count(), 0);
    }

    #[test]
    fn test_preview_does_not_change_selection() {
        let mut gallery = GalleryState::default();
        gallery.toggle_select("a.pdf");

        gallery.open_preview("b.pdf");
        assert_eq!(gallery.preview(), Some("b.pdf"));
        assert!(gallery.is_selected("a.pdf"));
        assert!(!gallery.is_selected("b.pdf"));

        gallery.close_preview();
        assert_eq!(gallery.preview(), None);
        assert!(gallery.is_selected("a.pdf"));
    }

    #[test]
    fn test_prune_drops_stale_entries() {
        let mut gallery = GalleryState::default();
        gallery.toggle_select("a.pdf");
        gallery.toggle_select("b.pdf");
        gallery.open_preview("b.pdf");

        let live = HashSet::from(["a.pdf"]);
        gallery.prune(&live);

        assert!(gallery.is_selected("a.pdf"));
        assert!(!gallery.is_selected("b.pdf"));
        assert_eq!(gallery.preview(), None);
    }

    #[test]
    fn test_prune_keeps_live_preview() {
        let mut gallery = GalleryState::default();
        gallery.open_preview("a.pdf");

        let live = HashSet::from(["a.pdf", "b.pdf"]);
        gallery.prune(&live);

        assert_eq!(gallery.preview(), Some("a.pdf"));
    }
}
