use crate::api::{ConverterClient, ConvertedFile};
use crate::config::AppConfig;
use crate::gallery::GalleryState;
use crate::intake::PendingUploads;
use crate::util::{DirEntryInfo, list_dir};

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent};
use futures::StreamExt;
use ratatui::{DefaultTerminal, widgets::TableState};
use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Transient status message shown in the status bar until it expires or the
/// user dismisses it.
#[derive(Debug, Clone)]
pub struct Alert {
    pub message: String,
    pub severity: Severity,
    raised_at: Instant,
}

impl Alert {
    fn new(message: String, severity: Severity) -> Self {
        Self {
            message,
            severity,
            raised_at: Instant::now(),
        }
    }

    pub fn expired(&self, ttl: Duration) -> bool {
        self.raised_at.elapsed() >= ttl
    }
}

/// Application.
#[derive(Debug)]
pub struct App {
    /// Is the application running?
    pub running: bool,
    /// Should we show the help?
    pub show_help: bool,
    /// Should we show the file picker?
    pub show_picker: bool,
    /// Fetching the file list
    pub loading: bool,
    /// An upload request is in flight
    pub uploading: bool,
    /// A download request is in flight
    pub downloading: bool,
    /// Canonical list of converted documents, server-sourced
    pub items: Vec<ConvertedFile>,
    /// Selection set and preview target
    pub gallery: GalleryState,
    /// Files queued for the next upload
    pub pending: PendingUploads,
    /// Transient status message
    pub alert: Option<Alert>,
    /// Gallery table selection state
    pub table_state: TableState,
    /// Pending uploads table selection state
    pub pending_state: TableState,
    /// File picker selection state
    pub picker_state: TableState,
    /// Directory the file picker is showing
    pub picker_dir: PathBuf,
    /// Entries of the picker directory
    pub picker_entries: Vec<DirEntryInfo>,
    /// Where downloads are saved
    pub download_dir: PathBuf,
    alert_ttl: Duration,
}

impl App {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            running: true,
            show_help: false,
            show_picker: false,
            loading: false,
            uploading: false,
            downloading: false,
            items: vec![],
            gallery: GalleryState::default(),
            pending: PendingUploads::default(),
            alert: None,
            table_state: TableState::default(),
            pending_state: TableState::default(),
            picker_state: TableState::default(),
            picker_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            picker_entries: vec![],
            download_dir: config.download_dir.clone(),
            alert_ttl: Duration::from_secs(config.alert_timeout_secs),
        }
    }

    /// Run the application's main loop.
    pub async fn run(
        mut self,
        terminal: &mut DefaultTerminal,
        client: &ConverterClient,
    ) -> color_eyre::Result<()> {
        let mut ticker = interval(Duration::from_millis(500));
        let mut events = EventStream::new();

        // Initial load & draw
        self.loading = true;
        self.redraw(terminal)?;
        self.load_files(client).await;
        self.loading = false;
        self.redraw(terminal)?;

        while self.running {
            tokio::select! {
                // Alert expiry arm
                _ = ticker.tick() => {
                    self.expire_alert();
                },

                // User input arm
                maybe_event = events.next() => {
                    if let Some(Ok(Event::Key(key))) = maybe_event {
                        self.handle_key(key, terminal, client).await?;
                    }
                },
            }
            self.redraw(terminal)?;
        }

        Ok(())
    }

    fn redraw(&mut self, terminal: &mut DefaultTerminal) -> io::Result<()> {
        terminal.draw(|frame| frame.render_widget(&mut *self, frame.area()))?;
        Ok(())
    }

    async fn handle_key(
        &mut self,
        key: KeyEvent,
        terminal: &mut DefaultTerminal,
        client: &ConverterClient,
    ) -> color_eyre::Result<()> {
        // Popups capture the keyboard while they are up
        if self.show_help {
            if let KeyCode::Char('q') | KeyCode::Esc = key.code {
                self.show_help = false;
            }
            return Ok(());
        }

        if self.show_picker {
            self.handle_picker_key(key);
            return Ok(());
        }

        if self.gallery.preview().is_some() {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => self.gallery.close_preview(),
                // Download the previewed document; preview and selection stay put
                KeyCode::Char('d') => {
                    if let Some(name) = self.gallery.preview().map(str::to_string) {
                        self.download_one(&name, client, terminal).await?;
                    }
                }
                _ => {}
            }
            return Ok(());
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                // Dismiss the alert first, quit on the next press
                if self.alert.is_some() {
                    self.alert = None;
                } else {
                    self.quit();
                }
            }
            KeyCode::Char('j') | KeyCode::Down => self.select_next_row(),
            KeyCode::Char('k') | KeyCode::Up => self.select_previous_row(),
            KeyCode::Char(' ') => self.toggle_select_current(),
            KeyCode::Enter => self.open_preview_current(),
            KeyCode::Char('a') => self.open_picker(),
            KeyCode::Char('x') => self.remove_pending_current(),
            KeyCode::Char('J') => self.select_next_pending(),
            KeyCode::Char('K') => self.select_previous_pending(),
            KeyCode::Char('u') => self.upload_pending(client, terminal).await?,
            KeyCode::Char('r') => self.refresh(client, terminal).await?,
            KeyCode::Char('d') => {
                if let Some(name) = self.current_item().map(|f| f.filename.clone()) {
                    self.download_one(&name, client, terminal).await?;
                }
            }
            KeyCode::Char('s') => self.download_selected(client, terminal).await?,
            KeyCode::Char('z') => self.download_all(client),
            KeyCode::Char('?') => self.show_help = true,
            _ => {}
        }
        Ok(())
    }

    /// Set running to false to quit the application.
    pub fn quit(&mut self) {
        self.running = false;
    }

    // Alerts

    pub fn alert_info(&mut self, message: String) {
        self.alert = Some(Alert::new(message, Severity::Info));
    }

    pub fn alert_warning(&mut self, message: String) {
        self.alert = Some(Alert::new(message, Severity::Warning));
    }

    pub fn alert_error(&mut self, message: String) {
        self.alert = Some(Alert::new(message, Severity::Error));
    }

    /// Clear the alert once it has been on screen long enough.
    pub fn expire_alert(&mut self) {
        if let Some(alert) = &self.alert {
            if alert.expired(self.alert_ttl) {
                self.alert = None;
            }
        }
    }

    // Gallery navigation and view-state transitions

    pub fn current_item(&self) -> Option<&ConvertedFile> {
        self.table_state.selected().and_then(|i| self.items.get(i))
    }

    pub fn preview_item(&self) -> Option<&ConvertedFile> {
        let id = self.gallery.preview()?;
        self.items.iter().find(|f| f.filename == id)
    }

    pub fn select_next_row(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.table_state.selected() {
            Some(i) => (i + 1) % self.items.len(),
            None => 0,
        };
        self.table_state.select(Some(i));
    }

    pub fn select_previous_row(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.table_state.selected() {
            Some(i) => (i + self.items.len() - 1) % self.items.len(),
            None => 0,
        };
        self.table_state.select(Some(i));
    }

    pub fn toggle_select_current(&mut self) {
        if let Some(item) = self.current_item() {
            let id = item.filename.clone();
            self.gallery.toggle_select(&id);
        }
    }

    pub fn open_preview_current(&mut self) {
        if let Some(item) = self.current_item() {
            let id = item.filename.clone();
            self.gallery.open_preview(&id);
        }
    }

    /// Selected filenames in canonical-list order.
    pub fn selected_filenames(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|f| self.gallery.is_selected(&f.filename))
            .map(|f| f.filename.clone())
            .collect()
    }

    /// Swap in a freshly fetched list, restore the cursor by identifier and
    /// prune view-state that points at items which are gone.
    pub fn apply_refreshed(&mut self, files: Vec<ConvertedFile>) {
        // Storing last highlighted id for restoring after the refresh
        let prev_id = self
            .table_state
            .selected()
            .and_then(|i| self.items.get(i).map(|f| f.filename.clone()));

        self.items = files;

        if !self.items.is_empty() {
            let new_selection = prev_id
                // If we had an id, try to find it in the refreshed list
                .and_then(|id| self.items.iter().position(|f| f.filename == id))
                // Otherwise (or if not found), default to the top
                .or(Some(0));
            self.table_state.select(new_selection);
        } else {
            // No items at all -> clear cursor
            self.table_state.select(None);
        }

        let live: HashSet<&str> = self.items.iter().map(|f| f.filename.as_str()).collect();
        self.gallery.prune(&live);
    }

    // Pending uploads

    pub fn select_next_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let i = match self.pending_state.selected() {
            Some(i) => (i + 1) % self.pending.len(),
            None => 0,
        };
        self.pending_state.select(Some(i));
    }

    pub fn select_previous_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let i = match self.pending_state.selected() {
            Some(i) => (i + self.pending.len() - 1) % self.pending.len(),
            None => 0,
        };
        self.pending_state.select(Some(i));
    }

    /// Remove the highlighted file from the pending set. Disabled while an
    /// upload is in flight.
    pub fn remove_pending_current(&mut self) {
        if self.uploading {
            self.alert_warning("Upload in progress, cannot remove files now".to_string());
            return;
        }
        if let Some(i) = self.pending_state.selected() {
            if self.pending.remove(i).is_some() && i >= self.pending.len() {
                if self.pending.is_empty() {
                    self.pending_state.select(None);
                } else {
                    self.pending_state.select(Some(self.pending.len() - 1));
                }
            }
        }
    }

    /// Filter candidates into the pending set and surface the outcome.
    pub fn queue_candidates(&mut self, paths: Vec<PathBuf>) {
        let outcome = self.pending.add_candidates(paths);

        if outcome.accepted == 0 && !outcome.rejected.is_empty() {
            self.alert_error(format!(
                "No valid files: only .{} files are accepted",
                crate::intake::ACCEPTED_EXTENSION
            ));
        } else if !outcome.rejected.is_empty() {
            self.alert_warning(format!(
                "Queued {} file(s), skipped {}: {}",
                outcome.accepted,
                outcome.rejected.len(),
                outcome.rejected.join(", ")
            ));
        } else if outcome.accepted > 0 {
            self.alert_info(format!("Queued {} file(s) for conversion", outcome.accepted));
        }

        if !self.pending.is_empty() && self.pending_state.selected().is_none() {
            self.pending_state.select(Some(0));
        }
    }

    // File picker

    pub fn open_picker(&mut self) {
        self.picker_entries = list_dir(&self.picker_dir);
        self.picker_state.select(if self.picker_entries.is_empty() {
            None
        } else {
            Some(0)
        });
        self.show_picker = true;
    }

    fn handle_picker_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.show_picker = false,
            KeyCode::Char('j') | KeyCode::Down => {
                if !self.picker_entries.is_empty() {
                    let i = match self.picker_state.selected() {
                        Some(i) => (i + 1) % self.picker_entries.len(),
                        None => 0,
                    };
                    self.picker_state.select(Some(i));
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if !self.picker_entries.is_empty() {
                    let i = match self.picker_state.selected() {
                        Some(i) => (i + self.picker_entries.len() - 1) % self.picker_entries.len(),
                        None => 0,
                    };
                    self.picker_state.select(Some(i));
                }
            }
            KeyCode::Enter => {
                let entry = self
                    .picker_state
                    .selected()
                    .and_then(|i| self.picker_entries.get(i))
                    .cloned();
                if let Some(entry) = entry {
                    if entry.is_dir {
                        self.picker_dir = entry.path;
                        self.picker_entries = list_dir(&self.picker_dir);
                        self.picker_state.select(if self.picker_entries.is_empty() {
                            None
                        } else {
                            Some(0)
                        });
                    } else {
                        self.queue_candidates(vec![entry.path]);
                    }
                }
            }
            // Queue every file in the directory at once; the intake filter
            // sorts out what is acceptable
            KeyCode::Char('A') => {
                let candidates: Vec<PathBuf> = self
                    .picker_entries
                    .iter()
                    .filter(|e| !e.is_dir)
                    .map(|e| e.path.clone())
                    .collect();
                if candidates.is_empty() {
                    self.alert_warning("No files in this directory".to_string());
                } else {
                    self.queue_candidates(candidates);
                }
            }
            _ => {}
        }
    }

    // Network-backed operations

    /// Fetch the canonical list. Failures are logged and degrade to an alert
    /// with the previous list left in place.
    pub async fn load_files(&mut self, client: &ConverterClient) {
        match client.list_files().await {
            Ok(files) => {
                info!(count = files.len(), "fetched file list");
                self.apply_refreshed(files);
            }
            Err(e) => {
                error!(error = %e, "failed to fetch file list");
                self.alert_error(format!("Failed to fetch file list: {e}"));
            }
        }
    }

    pub async fn refresh(
        &mut self,
        client: &ConverterClient,
        terminal: &mut DefaultTerminal,
    ) -> color_eyre::Result<()> {
        self.loading = true;
        self.redraw(terminal)?;
        self.load_files(client).await;
        self.loading = false;
        self.redraw(terminal)?;
        Ok(())
    }

    /// Submit the pending set as one multipart upload, then refresh the
    /// canonical list unconditionally when at least one file converted.
    pub async fn upload_pending(
        &mut self,
        client: &ConverterClient,
        terminal: &mut DefaultTerminal,
    ) -> color_eyre::Result<()> {
        if self.uploading {
            return Ok(());
        }
        if self.pending.is_empty() {
            self.alert_warning("No files queued: pick .msg files with <a> first".to_string());
            return Ok(());
        }

        let paths = self.pending.paths();
        self.uploading = true;
        self.redraw(terminal)?;

        let result = client.upload_files(&paths).await;
        self.uploading = false;

        match result {
            Ok(response) => {
                let converted = response.converted_count();
                let failed = response.failed();

                if converted > 0 {
                    for outcome in &failed {
                        warn!(
                            file = %outcome.original_filename,
                            message = outcome.message.as_deref().unwrap_or(""),
                            "conversion failed"
                        );
                    }
                    if failed.is_empty() {
                        self.alert_info(format!("Converted {converted} file(s)"));
                    } else {
                        self.alert_warning(format!(
                            "Converted {converted} file(s), {} failed",
                            failed.len()
                        ));
                    }
                    self.pending.clear();
                    self.pending_state.select(None);
                    // Full refresh, no local merge
                    self.loading = true;
                    self.redraw(terminal)?;
                    self.load_files(client).await;
                    self.loading = false;
                } else {
                    self.alert_error("Conversion failed for every uploaded file".to_string());
                }
            }
            Err(e) => {
                error!(error = %e, "upload failed");
                self.alert_error(format!("Upload failed: {e}"));
            }
        }

        self.redraw(terminal)?;
        Ok(())
    }

    /// Download one document into the configured download directory. Leaves
    /// selection and preview untouched.
    pub async fn download_one(
        &mut self,
        filename: &str,
        client: &ConverterClient,
        terminal: &mut DefaultTerminal,
    ) -> color_eyre::Result<()> {
        if self.downloading {
            return Ok(());
        }
        self.downloading = true;
        self.redraw(terminal)?;

        let result = client.download_file(filename, &self.download_dir).await;
        self.downloading = false;

        match result {
            Ok(path) => {
                info!(file = filename, "downloaded");
                self.alert_info(format!("Saved {}", path.display()));
            }
            Err(e) => {
                error!(error = %e, file = filename, "download failed");
                self.alert_error(format!("Download failed: {e}"));
            }
        }
        Ok(())
    }

    /// Batch-download the selection as one zip. No-op when nothing is
    /// selected; the flag goes up before the request so a second trigger is
    /// ignored until the first completes.
    pub async fn download_selected(
        &mut self,
        client: &ConverterClient,
        terminal: &mut DefaultTerminal,
    ) -> color_eyre::Result<()> {
        if !self.can_download_selected() {
            return Ok(());
        }

        let filenames = self.selected_filenames();
        self.downloading = true;
        self.redraw(terminal)?;

        let result = client
            .download_selected(&filenames, &self.download_dir)
            .await;
        self.downloading = false;

        match result {
            Ok(path) => {
                info!(count = filenames.len(), "downloaded selection");
                self.alert_info(format!("Saved {}", path.display()));
            }
            Err(e) => {
                error!(error = %e, "selection download failed");
                self.alert_error(format!("Download failed: {e}"));
            }
        }
        Ok(())
    }

    pub fn can_download_selected(&self) -> bool {
        !self.downloading && self.gallery.selected_count() > 0
    }

    /// Download-all depends on the canonical list only, never the selection.
    pub fn can_download_all(&self) -> bool {
        !self.downloading && !self.items.is_empty()
    }

    /// Hand the download-all endpoint to the browser. Fire-and-forget: only
    /// failures to launch the browser are observable here.
    pub fn download_all(&mut self, client: &ConverterClient) {
        if !self.can_download_all() {
            return;
        }

        let url = client.download_all_url();
        match open::that(&url) {
            Ok(()) => {
                info!(url = %url, "opened download-all in browser");
                self.alert_info("Opened archive download in your browser".to_string());
            }
            Err(e) => {
                error!(error = %e, url = %url, "failed to open browser");
                self.alert_error(format!("Could not open browser: {e}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FileMetadata, Recipients};

    fn sample_file(name: &str) -> ConvertedFile {
        ConvertedFile {
            filename: name.to_string(),
            original_filename: name.replace(".pdf", ".msg"),
            size: 1024,
            thumbnail_url: format!("/api/thumbnail/{name}"),
            pdf_url: format!("/api/preview/{name}"),
            metadata: FileMetadata {
                page_count: 2,
                date: None,
                size: None,
                sender: None,
                subject: None,
                recipients: Recipients::default(),
            },
        }
    }

    fn app_with_items(names: &[&str]) -> App {
        let mut app = App::new(&AppConfig::default());
        app.apply_refreshed(names.iter().map(|n| sample_file(n)).collect());
        app
    }

    #[test]
    fn test_toggle_select_twice_restores_state() {
        let mut app = app_with_items(&["a.pdf", "b.pdf"]);
        app.toggle_select_current();
        assert_eq!(app.gallery.selected_count(), 1);
        app.toggle_select_current();
        assert_eq!(app.gallery.selected_count(), 0);
    }

    #[test]
    fn test_preview_leaves_selection_alone() {
        let mut app = app_with_items(&["a.pdf", "b.pdf"]);
        app.toggle_select_current();
        app.select_next_row();
        app.open_preview_current();

        assert_eq!(app.gallery.preview(), Some("b.pdf"));
        assert!(app.gallery.is_selected("a.pdf"));
        assert!(!app.gallery.is_selected("b.pdf"));
    }

    #[test]
    fn test_refresh_prunes_selection_and_preview() {
        let mut app = app_with_items(&["a.pdf", "b.pdf"]);
        app.toggle_select_current(); // a.pdf
        app.select_next_row();
        app.toggle_select_current(); // b.pdf
        app.open_preview_current(); // b.pdf

        app.apply_refreshed(vec![sample_file("a.pdf")]);

        assert!(app.gallery.is_selected("a.pdf"));
        assert!(!app.gallery.is_selected("b.pdf"));
        assert_eq!(app.gallery.preview(), None);
    }

    #[test]
    fn test_refresh_restores_cursor_by_id() {
        let mut app = app_with_items(&["a.pdf", "b.pdf", "c.pdf"]);
        app.select_next_row(); // b.pdf

        // b.pdf moves to the top in the refreshed list
        app.apply_refreshed(vec![sample_file("b.pdf"), sample_file("c.pdf")]);
        assert_eq!(app.current_item().unwrap().filename, "b.pdf");

        // Cursor id gone entirely -> default to the top
        app.apply_refreshed(vec![sample_file("x.pdf")]);
        assert_eq!(app.current_item().unwrap().filename, "x.pdf");

        // Empty list -> no cursor
        app.apply_refreshed(vec![]);
        assert!(app.current_item().is_none());
    }

    #[test]
    fn test_selected_filenames_follow_canonical_order() {
        let mut app = app_with_items(&["a.pdf", "b.pdf", "c.pdf"]);
        // Select c first, then a
        app.select_next_row();
        app.select_next_row();
        app.toggle_select_current(); // c.pdf
        app.select_next_row(); // wraps to a.pdf
        app.toggle_select_current(); // a.pdf

        assert_eq!(app.selected_filenames(), vec!["a.pdf", "c.pdf"]);
    }

    #[test]
    fn test_download_selected_requires_selection() {
        let mut app = app_with_items(&["a.pdf"]);
        assert!(!app.can_download_selected());

        app.toggle_select_current();
        assert!(app.can_download_selected());

        app.downloading = true;
        assert!(!app.can_download_selected());
    }

    #[test]
    fn test_download_all_ignores_selection_state() {
        let empty = App::new(&AppConfig::default());
        assert!(!empty.can_download_all());

        let mut app = app_with_items(&["a.pdf", "b.pdf"]);
        assert!(app.can_download_all());

        // Selection on or off makes no difference
        app.toggle_select_current();
        assert!(app.can_download_all());
        app.toggle_select_current();
        assert!(app.can_download_all());

        app.downloading = true;
        assert!(!app.can_download_all());
    }

    #[test]
    fn test_queue_candidates_mixed() {
        let mut app = App::new(&AppConfig::default());
        app.queue_candidates(vec![PathBuf::from("a.msg"), PathBuf::from("b.txt")]);

        assert_eq!(app.pending.len(), 1);
        let alert = app.alert.as_ref().unwrap();
        assert_eq!(alert.severity, Severity::Warning);
        assert!(alert.message.contains("b.txt"));
    }

    #[test]
    fn test_queue_candidates_all_rejected() {
        let mut app = App::new(&AppConfig::default());
        app.queue_candidates(vec![PathBuf::from("b.txt")]);

        assert!(app.pending.is_empty());
        assert_eq!(app.alert.as_ref().unwrap().severity, Severity::Error);
    }

    #[test]
    fn test_remove_pending_blocked_while_uploading() {
        let mut app = App::new(&AppConfig::default());
        app.queue_candidates(vec![PathBuf::from("a.msg")]);
        app.uploading = true;

        app.remove_pending_current();
        assert_eq!(app.pending.len(), 1);
        assert_eq!(app.alert.as_ref().unwrap().severity, Severity::Warning);

        app.uploading = false;
        app.remove_pending_current();
        assert!(app.pending.is_empty());
    }

    #[test]
    fn test_navigation_on_empty_list_is_safe() {
        let mut app = App::new(&AppConfig::default());
        app.select_next_row();
        app.select_previous_row();
        assert!(app.current_item().is_none());
    }

    #[test]
    fn test_alert_expiry() {
        let mut app = App::new(&AppConfig::default());
        app.alert_ttl = Duration::from_secs(0);
        app.alert_info("done".to_string());
        app.expire_alert();
        assert!(app.alert.is_none());
    }
}
