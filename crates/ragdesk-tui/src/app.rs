use std::path::{Path, PathBuf};

use ratatui::layout::Rect;
use ratatui::widgets::TableState;
use ragdesk_core::api::{AppSettings, DocumentDetail, DocumentInfo, Uploaded};
use ragdesk_core::{
    ChatSession, ChunkMode, ClientError, Config, MessageHandle, ModelProvider, RagClient, StreamEvent,
    StreamHandler, StreamMetadata, StreamOutcome,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Upload,
    Documents,
    Chat,
    Settings,
}

impl Screen {
    pub fn all() -> [Screen; 4] {
        [Screen::Upload, Screen::Documents, Screen::Chat, Screen::Settings]
    }

    pub fn title(&self) -> &'static str {
        match self {
            Screen::Upload => "Upload",
            Screen::Documents => "Documents",
            Screen::Chat => "Chat",
            Screen::Settings => "API Keys",
        }
    }

    pub fn next(&self) -> Screen {
        match self {
            Screen::Upload => Screen::Documents,
            Screen::Documents => Screen::Chat,
            Screen::Chat => Screen::Settings,
            Screen::Settings => Screen::Upload,
        }
    }

    pub fn prev(&self) -> Screen {
        match self {
            Screen::Upload => Screen::Settings,
            Screen::Documents => Screen::Upload,
            Screen::Chat => Screen::Documents,
            Screen::Settings => Screen::Chat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadField {
    Path,
    ChunkMode,
    ChunkSize,
    Overlap,
    Provider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    OpenAiKey,
    OpenAiBaseUrl,
    BailianKey,
}

impl SettingsField {
    pub fn all() -> [SettingsField; 3] {
        [SettingsField::OpenAiKey, SettingsField::OpenAiBaseUrl, SettingsField::BailianKey]
    }

    pub fn label(&self) -> &'static str {
        match self {
            SettingsField::OpenAiKey => "OpenAI API Key",
            SettingsField::OpenAiBaseUrl => "OpenAI Base URL",
            SettingsField::BailianKey => "Bailian API Key",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailTab {
    Chunks,
    Vectors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    Success,
    Error,
}

/// Dismissible status line shown under a form or table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub kind: BannerKind,
    pub text: String,
}

impl Banner {
    pub fn success(text: impl Into<String>) -> Self {
        Self { kind: BannerKind::Success, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { kind: BannerKind::Error, text: text.into() }
    }
}

/// Single-line text field with a character cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    pub value: String,
    pub cursor: usize, // cursor position in chars, not bytes
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

impl TextInput {
    pub fn with_value(value: impl Into<String>) -> Self {
        let value = value.into();
        let cursor = value.chars().count();
        Self { value, cursor }
    }

    pub fn set(&mut self, value: impl Into<String>) {
        *self = Self::with_value(value);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.value, self.cursor);
        self.value.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.value.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.value.chars().count();
    }
}

/// Results of background requests, delivered back to the UI loop.
#[derive(Debug)]
pub enum ApiResult {
    Uploaded(Result<Uploaded, String>),
    Documents(Result<Vec<DocumentInfo>, String>),
    Detail(Result<DocumentDetail, String>),
    Deleted(Result<String, String>),
    SettingsLoaded(Result<AppSettings, String>),
    SettingsSaved(Result<AppSettings, String>),
}

/// What the streaming task reports about the in-flight answer.
#[derive(Debug)]
pub enum StreamUpdate {
    Event(StreamEvent),
    Failed(String),
    /// Body ended without a `done` record.
    Ended,
    Aborted,
}

/// Forwards decoded stream events to the UI loop, tagged with the message
/// they belong to.
struct StreamForwarder {
    tx: mpsc::UnboundedSender<AppEvent>,
    handle: MessageHandle,
}

impl StreamForwarder {
    fn send(&self, update: StreamUpdate) {
        let _ = self.tx.send(AppEvent::Stream(self.handle, update));
    }
}

impl StreamHandler for StreamForwarder {
    fn on_metadata(&mut self, metadata: StreamMetadata) {
        self.send(StreamUpdate::Event(StreamEvent::Metadata(metadata)));
    }

    fn on_delta(&mut self, content: String) {
        self.send(StreamUpdate::Event(StreamEvent::Delta(content)));
    }

    fn on_done(&mut self) {
        self.send(StreamUpdate::Event(StreamEvent::Done));
    }

    fn on_error(&mut self, error: &ClientError) {
        self.send(StreamUpdate::Failed(error.to_string()));
    }
}

fn to_message<T>(result: Result<T, ClientError>) -> Result<T, String> {
    result.map_err(|e| e.to_string())
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub config: Config,
    pub config_path: Option<PathBuf>,
    // On-disk values shadowed by command-line overrides for this session
    saved_base_url: Option<String>,
    saved_provider: Option<ModelProvider>,
    pub client: RagClient,
    events: mpsc::UnboundedSender<AppEvent>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Upload state
    pub upload_field: UploadField,
    pub upload_path: TextInput,
    pub chunk_size_input: TextInput,
    pub overlap_input: TextInput,
    pub uploading: bool,
    pub upload_banner: Option<Banner>,

    // Document list state
    pub documents: Vec<DocumentInfo>,
    pub documents_state: TableState,
    pub documents_loading: bool,
    pub documents_banner: Option<Banner>,
    pub pending_delete: Option<DocumentInfo>,

    // Document detail modal
    pub detail: Option<DocumentDetail>,
    pub detail_loading: bool,
    pub detail_tab: DetailTab,
    pub detail_scroll: usize,

    // Chat state
    pub chat: ChatSession,
    pub chat_input: TextInput,
    pub chat_scroll: usize,
    pub chat_follow: bool, // keep the newest line in view while streaming
    pub chat_height: usize, // Height of chat area for scroll calculations
    pub stream_cancel: Option<CancellationToken>,
    pub show_provenance: bool,
    pub show_prompt: bool,

    // Settings state
    pub settings_field: SettingsField,
    pub openai_key_input: TextInput,
    pub openai_base_url_input: TextInput,
    pub bailian_key_input: TextInput,
    pub settings_loading: bool,
    pub settings_saving: bool,
    pub settings_banner: Option<Banner>,

    // Panel areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
    pub detail_area: Option<Rect>,
}

impl App {
    pub fn new(config: Config, events: mpsc::UnboundedSender<AppEvent>) -> Self {
        let client = RagClient::new(&config.base_url);
        let chunk_size_input = TextInput::with_value(config.chunk_size.to_string());
        let overlap_input = TextInput::with_value(config.overlap.to_string());

        Self {
            should_quit: false,
            screen: Screen::Upload,
            input_mode: InputMode::Normal,
            config,
            config_path: None,
            saved_base_url: None,
            saved_provider: None,
            client,
            events,

            animation_frame: 0,

            upload_field: UploadField::Path,
            upload_path: TextInput::default(),
            chunk_size_input,
            overlap_input,
            uploading: false,
            upload_banner: None,

            documents: Vec::new(),
            documents_state: TableState::default(),
            documents_loading: false,
            documents_banner: None,
            pending_delete: None,

            detail: None,
            detail_loading: false,
            detail_tab: DetailTab::Chunks,
            detail_scroll: 0,

            chat: ChatSession::new(),
            chat_input: TextInput::default(),
            chat_scroll: 0,
            chat_follow: true,
            chat_height: 0,
            stream_cancel: None,
            show_provenance: true,
            show_prompt: false,

            settings_field: SettingsField::OpenAiKey,
            openai_key_input: TextInput::default(),
            openai_base_url_input: TextInput::default(),
            bailian_key_input: TextInput::default(),
            settings_loading: false,
            settings_saving: false,
            settings_banner: None,

            chat_area: None,
            detail_area: None,
        }
    }

    /// Persist preference changes to this file.
    pub fn with_config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Use a different backend or provider for this session only. The config
    /// file keeps its own values unless the user changes them here.
    pub fn with_overrides(mut self, base_url: Option<String>, provider: Option<ModelProvider>) -> Self {
        if let Some(base_url) = base_url {
            self.saved_base_url = Some(std::mem::replace(&mut self.config.base_url, base_url));
            self.client = RagClient::new(&self.config.base_url);
        }
        if let Some(provider) = provider {
            self.saved_provider = Some(std::mem::replace(&mut self.config.model_provider, provider));
        }
        self
    }

    /// The preferences as they should be written to disk.
    fn persisted_config(&self) -> Config {
        let mut config = self.config.clone();
        if let Some(base_url) = &self.saved_base_url {
            config.base_url = base_url.clone();
        }
        if let Some(provider) = self.saved_provider {
            config.model_provider = provider;
        }
        config
    }

    fn save_config(&self) {
        if let Some(path) = &self.config_path {
            if let Err(e) = self.persisted_config().save_to(path) {
                warn!(error = %e, "failed to save config");
            }
        }
    }

    pub fn set_screen(&mut self, screen: Screen) {
        if self.screen == screen {
            return;
        }
        self.screen = screen;
        self.input_mode = InputMode::Normal;
        match screen {
            Screen::Documents if self.documents.is_empty() => self.refresh_documents(),
            Screen::Settings if !self.settings_loaded() => self.load_settings(),
            _ => {}
        }
    }

    fn settings_loaded(&self) -> bool {
        self.settings_loading
            || !self.openai_key_input.value.is_empty()
            || !self.openai_base_url_input.value.is_empty()
            || !self.bailian_key_input.value.is_empty()
    }

    /// The text field that receives keystrokes in editing mode.
    pub fn active_input(&mut self) -> Option<&mut TextInput> {
        match self.screen {
            Screen::Upload => match self.upload_field {
                UploadField::Path => Some(&mut self.upload_path),
                UploadField::ChunkSize => Some(&mut self.chunk_size_input),
                UploadField::Overlap => Some(&mut self.overlap_input),
                UploadField::ChunkMode | UploadField::Provider => None,
            },
            Screen::Chat => Some(&mut self.chat_input),
            Screen::Settings => Some(self.settings_input_mut(self.settings_field)),
            Screen::Documents => None,
        }
    }

    pub fn settings_input(&self, field: SettingsField) -> &TextInput {
        match field {
            SettingsField::OpenAiKey => &self.openai_key_input,
            SettingsField::OpenAiBaseUrl => &self.openai_base_url_input,
            SettingsField::BailianKey => &self.bailian_key_input,
        }
    }

    fn settings_input_mut(&mut self, field: SettingsField) -> &mut TextInput {
        match field {
            SettingsField::OpenAiKey => &mut self.openai_key_input,
            SettingsField::OpenAiBaseUrl => &mut self.openai_base_url_input,
            SettingsField::BailianKey => &mut self.bailian_key_input,
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.chat.is_awaiting() || self.uploading || self.documents_loading || self.detail_loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // ----- Upload -----

    /// Fields reachable with up/down. Size and overlap are hidden for
    /// semantic chunking.
    pub fn upload_fields(&self) -> Vec<UploadField> {
        let mut fields = vec![UploadField::Path, UploadField::ChunkMode];
        if self.config.chunk_mode.uses_window() {
            fields.push(UploadField::ChunkSize);
            fields.push(UploadField::Overlap);
        }
        fields.push(UploadField::Provider);
        fields
    }

    pub fn upload_field_down(&mut self) {
        let fields = self.upload_fields();
        let i = fields.iter().position(|f| *f == self.upload_field).unwrap_or(0);
        self.upload_field = fields[(i + 1).min(fields.len() - 1)];
    }

    pub fn upload_field_up(&mut self) {
        let fields = self.upload_fields();
        let i = fields.iter().position(|f| *f == self.upload_field).unwrap_or(0);
        self.upload_field = fields[i.saturating_sub(1)];
    }

    pub fn cycle_chunk_mode(&mut self, forward: bool) {
        let modes = ChunkMode::all();
        let i = modes.iter().position(|m| *m == self.config.chunk_mode).unwrap_or(0);
        let next = if forward {
            (i + 1) % modes.len()
        } else {
            (i + modes.len() - 1) % modes.len()
        };
        self.config.chunk_mode = modes[next];
        self.save_config();
    }

    pub fn cycle_provider(&mut self) {
        // An explicit choice replaces the command-line override.
        self.saved_provider = None;
        self.config.model_provider = self.config.model_provider.next();
        self.save_config();
    }

    /// Parse the numeric fields back into the config. Anything that isn't a
    /// positive number is reverted to the stored value.
    pub fn commit_number_fields(&mut self) {
        match self.chunk_size_input.value.trim().parse::<u32>() {
            Ok(v) if v > 0 => self.config.chunk_size = v,
            _ => {}
        }
        match self.overlap_input.value.trim().parse::<u32>() {
            Ok(v) => self.config.overlap = v,
            Err(_) => {}
        }
        self.chunk_size_input.set(self.config.chunk_size.to_string());
        self.overlap_input.set(self.config.overlap.to_string());
        self.save_config();
    }

    /// Send the selected file. An empty path is ignored without a request.
    pub fn start_upload(&mut self) {
        let path = self.upload_path.value.trim();
        if path.is_empty() || self.uploading {
            return;
        }
        let path = PathBuf::from(path);
        let options = self.config.upload_options();
        let client = self.client.clone();
        let tx = self.events.clone();

        self.uploading = true;
        self.upload_banner = None;
        info!(path = %path.display(), "starting upload");

        tokio::spawn(async move {
            let result = client.upload_document(&path, &options).await;
            let _ = tx.send(AppEvent::Api(ApiResult::Uploaded(to_message(result))));
        });
    }

    // ----- Documents -----

    pub fn refresh_documents(&mut self) {
        if self.documents_loading {
            return;
        }
        self.documents_loading = true;
        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = client.list_documents().await;
            let _ = tx.send(AppEvent::Api(ApiResult::Documents(to_message(result))));
        });
    }

    pub fn selected_document(&self) -> Option<&DocumentInfo> {
        self.documents_state.selected().and_then(|i| self.documents.get(i))
    }

    pub fn documents_down(&mut self) {
        let len = self.documents.len();
        if len > 0 {
            let i = self.documents_state.selected().unwrap_or(0);
            self.documents_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn documents_up(&mut self) {
        let i = self.documents_state.selected().unwrap_or(0);
        self.documents_state.select(Some(i.saturating_sub(1)));
    }

    pub fn open_detail(&mut self) {
        let Some(doc_id) = self.selected_document().map(|d| d.doc_id.clone()) else {
            return;
        };
        self.detail = None;
        self.detail_loading = true;
        self.detail_tab = DetailTab::Chunks;
        self.detail_scroll = 0;

        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = client.document_detail(&doc_id).await;
            let _ = tx.send(AppEvent::Api(ApiResult::Detail(to_message(result))));
        });
    }

    pub fn detail_open(&self) -> bool {
        self.detail_loading || self.detail.is_some()
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
        self.detail_loading = false;
        self.detail_scroll = 0;
    }

    pub fn toggle_detail_tab(&mut self) {
        self.detail_tab = match self.detail_tab {
            DetailTab::Chunks => DetailTab::Vectors,
            DetailTab::Vectors => DetailTab::Chunks,
        };
        self.detail_scroll = 0;
    }

    /// Ask for confirmation before deleting the selected document.
    pub fn request_delete(&mut self) {
        self.pending_delete = self.selected_document().cloned();
    }

    pub fn confirm_delete(&mut self) {
        let Some(doc) = self.pending_delete.take() else {
            return;
        };
        let client = self.client.clone();
        let tx = self.events.clone();
        let provider = self.config.model_provider;
        tokio::spawn(async move {
            let result = client
                .delete_document(&doc.doc_id, provider)
                .await
                .map(|_| doc.filename);
            let _ = tx.send(AppEvent::Api(ApiResult::Deleted(to_message(result))));
        });
    }

    // ----- Chat -----

    /// Submit the input line. Empty input, or a request still in flight,
    /// leaves everything untouched and sends nothing.
    pub fn submit_question(&mut self) -> bool {
        let Some(submission) = self.chat.submit(&self.chat_input.value) else {
            return false;
        };
        self.chat_input.clear();
        self.chat_follow = true;

        let request = self.config.query_request(&submission.question);
        let client = self.client.clone();
        let cancel = CancellationToken::new();
        self.stream_cancel = Some(cancel.clone());
        let mut forwarder = StreamForwarder {
            tx: self.events.clone(),
            handle: submission.handle,
        };

        tokio::spawn(async move {
            let outcome = client.query_stream(&request, &mut forwarder, &cancel).await;
            debug!(?outcome, "answer stream finished");
            match outcome {
                StreamOutcome::Aborted => forwarder.send(StreamUpdate::Aborted),
                StreamOutcome::EndOfStream => forwarder.send(StreamUpdate::Ended),
                StreamOutcome::Done | StreamOutcome::Failed => {}
            }
        });
        true
    }

    pub fn apply_stream(&mut self, handle: MessageHandle, update: StreamUpdate) {
        match update {
            StreamUpdate::Event(event) => {
                self.chat.apply(handle, event);
            }
            StreamUpdate::Failed(error) => {
                self.chat.fail(handle, &error);
            }
            StreamUpdate::Ended => {
                self.chat.finish(handle);
            }
            StreamUpdate::Aborted => {
                self.chat.abort(handle);
            }
        }
        if !self.chat.is_awaiting() {
            self.stream_cancel = None;
        }
    }

    /// Stop reading the current answer. The streaming task reports back with
    /// an abort, never an error.
    pub fn cancel_stream(&mut self) {
        if let Some(cancel) = self.stream_cancel.take() {
            info!("cancelling answer stream");
            cancel.cancel();
        }
    }

    pub fn clear_chat(&mut self) {
        if self.chat.clear() {
            self.chat_scroll = 0;
            self.chat_follow = true;
        }
    }

    pub fn toggle_rerank(&mut self) {
        self.config.use_rerank = !self.config.use_rerank;
        self.save_config();
    }

    pub fn adjust_top_k(&mut self, delta: i32) {
        let top_k = (self.config.top_k as i32 + delta).clamp(1, 50);
        self.config.top_k = top_k as u32;
        self.save_config();
    }

    pub fn scroll_chat_up(&mut self, lines: usize) {
        self.chat_follow = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_chat_down(&mut self, lines: usize) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    // ----- Settings -----

    pub fn load_settings(&mut self) {
        self.settings_loading = true;
        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = client.settings().await;
            let _ = tx.send(AppEvent::Api(ApiResult::SettingsLoaded(to_message(result))));
        });
    }

    /// Save, then read back so the form shows the masked values.
    pub fn save_settings(&mut self) {
        if self.settings_saving {
            return;
        }
        self.settings_saving = true;
        self.settings_banner = None;
        let settings = AppSettings {
            openai_api_key: self.openai_key_input.value.clone(),
            openai_base_url: self.openai_base_url_input.value.clone(),
            bailian_api_key: self.bailian_key_input.value.clone(),
        };
        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = match client.save_settings(&settings).await {
                Ok(_) => client.settings().await,
                Err(e) => Err(e),
            };
            let _ = tx.send(AppEvent::Api(ApiResult::SettingsSaved(to_message(result))));
        });
    }

    pub fn settings_field_down(&mut self) {
        let fields = SettingsField::all();
        let i = fields.iter().position(|f| *f == self.settings_field).unwrap_or(0);
        self.settings_field = fields[(i + 1).min(fields.len() - 1)];
    }

    pub fn settings_field_up(&mut self) {
        let fields = SettingsField::all();
        let i = fields.iter().position(|f| *f == self.settings_field).unwrap_or(0);
        self.settings_field = fields[i.saturating_sub(1)];
    }

    fn fill_settings(&mut self, settings: AppSettings) {
        self.openai_key_input.set(settings.openai_api_key);
        self.openai_base_url_input.set(settings.openai_base_url);
        self.bailian_key_input.set(settings.bailian_api_key);
    }

    // ----- Background results -----

    pub fn handle_api(&mut self, result: ApiResult) {
        match result {
            ApiResult::Uploaded(result) => {
                self.uploading = false;
                self.upload_banner = Some(match result {
                    Ok(uploaded) => {
                        self.upload_path.clear();
                        // The list is stale now.
                        self.documents.clear();
                        Banner::success(format!(
                            "Uploaded! Document ID: {}, chunks: {}",
                            uploaded.doc_id, uploaded.chunk_count
                        ))
                    }
                    Err(e) => Banner::error(format!("Upload failed: {}", e)),
                });
            }
            ApiResult::Documents(result) => {
                self.documents_loading = false;
                match result {
                    Ok(documents) => {
                        self.documents = documents;
                        let selected = match self.documents_state.selected() {
                            _ if self.documents.is_empty() => None,
                            Some(i) => Some(i.min(self.documents.len() - 1)),
                            None => Some(0),
                        };
                        self.documents_state.select(selected);
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to list documents");
                        self.documents_banner = Some(Banner::error(format!("Could not load documents: {}", e)));
                    }
                }
            }
            ApiResult::Detail(result) => {
                // Closed while loading
                if !self.detail_loading {
                    return;
                }
                self.detail_loading = false;
                match result {
                    Ok(detail) => self.detail = Some(detail),
                    Err(e) => {
                        self.documents_banner = Some(Banner::error(format!("Could not load details: {}", e)));
                    }
                }
            }
            ApiResult::Deleted(result) => match result {
                Ok(filename) => {
                    self.documents_banner = Some(Banner::success(format!("Deleted {}", filename)));
                    self.refresh_documents();
                }
                Err(e) => {
                    self.documents_banner = Some(Banner::error(format!("Delete failed: {}", e)));
                }
            },
            ApiResult::SettingsLoaded(result) => {
                self.settings_loading = false;
                match result {
                    Ok(settings) => self.fill_settings(settings),
                    Err(e) => {
                        self.settings_banner = Some(Banner::error(format!("Could not load settings: {}", e)));
                    }
                }
            }
            ApiResult::SettingsSaved(result) => {
                self.settings_saving = false;
                self.settings_banner = Some(match result {
                    Ok(settings) => {
                        self.fill_settings(settings);
                        Banner::success("Settings saved")
                    }
                    Err(e) => Banner::error(format!("Save failed: {}", e)),
                });
            }
        }
    }
}
