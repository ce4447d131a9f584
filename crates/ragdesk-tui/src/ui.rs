use std::sync::OnceLock;

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs, Wrap},
};
use ragdesk_core::api::{ChunkResults, VectorDump};
use ragdesk_core::chat::FAILURE_PREFIX;
use ragdesk_core::{ChatMessage, ChatRole, ChunkMode};
use regex::Regex;

use crate::app::{App, Banner, BannerKind, DetailTab, InputMode, Screen, SettingsField, TextInput, UploadField};

/// Wrap text to fit within a given width, returning multiple lines
/// Uses word boundaries for wrapping (doesn't break mid-word)
fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if current_len == 0 {
            // First word on line
            current_line = word.to_string();
            current_len = word_len;
        } else if current_len + 1 + word_len <= width {
            // Word fits on current line
            current_line.push(' ');
            current_line.push_str(word);
            current_len += 1 + word_len;
        } else {
            // Word doesn't fit, start new line
            lines.push(current_line);
            current_line = word.to_string();
            current_len = word_len;
        }
    }

    // Don't forget the last line
    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str, base: Style) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::styled(std::mem::take(&mut current_text), base));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(bold_text, base.add_modifier(Modifier::BOLD)));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::styled(current_text, base));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn json_token_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?P<key>"(?:[^"\\]|\\.)*"\s*:)|(?P<string>"(?:[^"\\]|\\.)*")|(?P<number>-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?)|(?P<literal>\btrue\b|\bfalse\b|\bnull\b)"#,
        )
        .ok()
    })
    .as_ref()
}

/// Color one line of pretty-printed JSON: keys, strings, numbers, and
/// `true`/`false`/`null` each get their own style.
fn highlight_json_line(line: &str) -> Line<'static> {
    let Some(re) = json_token_regex() else {
        return Line::from(line.to_string());
    };
    let mut spans = Vec::new();
    let mut last = 0;

    for caps in re.captures_iter(line) {
        let Some(m) = caps.get(0) else { continue };
        if m.start() > last {
            spans.push(Span::raw(line[last..m.start()].to_string()));
        }
        let style = if caps.name("key").is_some() {
            Style::default().fg(Color::Cyan)
        } else if caps.name("string").is_some() {
            Style::default().fg(Color::Green)
        } else if caps.name("number").is_some() {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Magenta)
        };
        spans.push(Span::styled(m.as_str().to_string(), style));
        last = m.end();
    }

    if last < line.len() {
        spans.push(Span::raw(line[last..].to_string()));
    }
    Line::from(spans)
}

fn highlight_json(value: &serde_json::Value) -> Vec<Line<'static>> {
    match serde_json::to_string_pretty(value) {
        Ok(pretty) => pretty.lines().map(highlight_json_line).collect(),
        Err(e) => vec![Line::from(format!("<unprintable: {}>", e))],
    }
}

fn format_embedding_preview(preview: &[f64]) -> String {
    let values: Vec<String> = preview.iter().map(|v| format!("{:.4}", v)).collect();
    format!("[{} ...]", values.join(", "))
}

fn ellipsis(frame: u8) -> String {
    // Animated ellipsis: cycles through ".", "..", "..."
    ".".repeat(frame as usize + 1)
}

/// Clamp `scroll` to the last full page and return the lines in view.
///
/// Slicing here keeps long transcripts out of `Paragraph::scroll`, whose
/// offset is a `u16`.
fn visible_window(lines: Vec<Line<'static>>, scroll: &mut usize, height: usize) -> Vec<Line<'static>> {
    let max_scroll = lines.len().saturating_sub(height);
    *scroll = (*scroll).min(max_scroll);
    lines.into_iter().skip(*scroll).take(height).collect()
}

/// Rect of the given size centered in `area`, clamped to fit.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, tabs, body, footer
    let [header_area, tabs_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_tabs(app, frame, tabs_area);

    app.chat_area = None;
    app.detail_area = None;

    match app.screen {
        Screen::Upload => render_upload_screen(app, frame, body_area),
        Screen::Documents => render_documents_screen(app, frame, body_area),
        Screen::Chat => render_chat_screen(app, frame, body_area),
        Screen::Settings => render_settings_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    // Render popups (in order of priority)
    if app.screen == Screen::Documents {
        if app.pending_delete.is_some() {
            render_delete_confirm(app, frame, area);
        } else if app.detail_open() {
            render_detail_modal(app, frame, area);
        }
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" ragdesk ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.client.base_url().to_string(), Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_tabs(app: &App, frame: &mut Frame, area: Rect) {
    let titles: Vec<String> = Screen::all()
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{} {}", i + 1, s.title()))
        .collect();
    let selected = Screen::all().iter().position(|s| *s == app.screen).unwrap_or(0);

    let tabs = Tabs::new(titles)
        .select(selected)
        .style(Style::default().fg(Color::Gray))
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .divider("|");
    frame.render_widget(tabs, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " EDIT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let pairs: Vec<(&str, &str)> = match (app.screen, app.input_mode) {
        (_, InputMode::Editing) if app.screen == Screen::Chat => {
            vec![("Enter", "send"), ("Esc", "stop editing")]
        }
        (_, InputMode::Editing) => vec![("Enter/Esc", "done")],
        (Screen::Upload, InputMode::Normal) => vec![
            ("j/k", "field"),
            ("h/l", "change"),
            ("Enter", "edit"),
            ("u", "upload"),
            ("Tab", "screen"),
            ("q", "quit"),
        ],
        (Screen::Documents, InputMode::Normal) if app.pending_delete.is_some() => {
            vec![("y", "delete"), ("n/Esc", "keep")]
        }
        (Screen::Documents, InputMode::Normal) if app.detail_open() => {
            vec![("Tab", "chunks/vectors"), ("j/k", "scroll"), ("Esc", "close")]
        }
        (Screen::Documents, InputMode::Normal) => vec![
            ("j/k", "select"),
            ("Enter", "details"),
            ("d", "delete"),
            ("r", "refresh"),
            ("Tab", "screen"),
            ("q", "quit"),
        ],
        (Screen::Chat, InputMode::Normal) => {
            let mut pairs = vec![("i", "ask")];
            if app.chat.is_awaiting() {
                pairs.push(("Esc", "stop"));
            }
            pairs.extend([
                ("m", "provider"),
                ("+/-", "top-k"),
                ("r", "rerank"),
                ("p", "provenance"),
                ("P", "prompt"),
                ("^L", "clear"),
            ]);
            pairs
        }
        (Screen::Settings, InputMode::Normal) => vec![
            ("j/k", "field"),
            ("Enter", "edit"),
            ("s", "save"),
            ("r", "reload"),
            ("Tab", "screen"),
            ("q", "quit"),
        ],
    };

    let hints = pairs.into_iter().flat_map(|(key, label)| {
        [
            Span::styled(format!(" {} ", key), key_style),
            Span::styled(format!(" {} ", label), label_style),
        ]
    });

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

/// Bordered single-line input with horizontal scrolling to keep the cursor
/// in view.
fn render_input(frame: &mut Frame, area: Rect, input: &TextInput, title: &str, editing: bool, selected: bool) {
    let border_color = if editing {
        Color::Yellow
    } else if selected {
        Color::Cyan
    } else {
        Color::DarkGray
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" {} ", title));

    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = input.cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = input.value.chars().skip(scroll_offset).take(inner_width).collect();
    let paragraph = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(paragraph, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn banner_line(banner: &Banner) -> Line<'static> {
    let (icon, color) = match banner.kind {
        BannerKind::Success => ("✓", Color::Green),
        BannerKind::Error => ("✗", Color::Red),
    };
    Line::from(vec![
        Span::styled(format!(" {} ", icon), Style::default().fg(color).bold()),
        Span::styled(banner.text.clone(), Style::default().fg(color)),
        Span::styled("  (Esc to dismiss)", Style::default().fg(Color::DarkGray)),
    ])
}

/// Selector row rendered like an input box, with arrows to hint it cycles.
fn render_selector(frame: &mut Frame, area: Rect, title: &str, value: &str, selected: bool) {
    let border_color = if selected { Color::Cyan } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" {} ", title));
    let text = Line::from(vec![
        Span::styled("◀ ", Style::default().fg(Color::DarkGray)),
        Span::styled(value.to_string(), Style::default().fg(Color::White).bold()),
        Span::styled(" ▶", Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(text).block(block), area);
}

fn render_upload_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let outer = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Upload a document ");
    let inner = outer.inner(area);
    frame.render_widget(outer, area);

    let fields = app.upload_fields();
    let mut constraints: Vec<Constraint> = fields
        .iter()
        .map(|field| match field {
            // Selector plus description line
            UploadField::ChunkMode => Constraint::Length(5),
            _ => Constraint::Length(3),
        })
        .collect();
    constraints.push(Constraint::Length(2));
    constraints.push(Constraint::Min(0));
    let rows = Layout::vertical(constraints).split(inner);

    let editing = app.input_mode == InputMode::Editing;
    for (i, field) in fields.iter().enumerate() {
        let selected = app.upload_field == *field;
        let row = rows[i];
        match field {
            UploadField::Path => render_input(
                frame,
                row,
                &app.upload_path,
                "File path (PDF, Markdown, text)",
                editing && selected,
                selected,
            ),
            UploadField::ChunkMode => {
                let [selector, description] =
                    Layout::vertical([Constraint::Length(3), Constraint::Length(2)]).areas(row);
                render_selector(
                    frame,
                    selector,
                    "Chunk mode",
                    app.config.chunk_mode.display_name(),
                    selected,
                );
                let desc = Paragraph::new(app.config.chunk_mode.description())
                    .style(Style::default().fg(Color::DarkGray))
                    .wrap(Wrap { trim: true });
                frame.render_widget(desc, description.inner(ratatui::layout::Margin::new(1, 0)));
            }
            UploadField::ChunkSize => render_input(
                frame,
                row,
                &app.chunk_size_input,
                "Chunk size (tokens)",
                editing && selected,
                selected,
            ),
            UploadField::Overlap => render_input(
                frame,
                row,
                &app.overlap_input,
                "Overlap (tokens)",
                editing && selected,
                selected,
            ),
            UploadField::Provider => render_selector(
                frame,
                row,
                "Embedding provider",
                app.config.model_provider.display_name(),
                selected,
            ),
        }
    }

    let status_area = rows[fields.len()];
    let status = if app.uploading {
        Line::from(Span::styled(
            format!(" Uploading and indexing{}", ellipsis(app.animation_frame)),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        ))
    } else if let Some(banner) = &app.upload_banner {
        banner_line(banner)
    } else if app.config.chunk_mode == ChunkMode::Semantic {
        Line::from(Span::styled(
            " Semantic mode ignores chunk size and overlap",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::default()
    };
    frame.render_widget(Paragraph::new(status), status_area);
}

fn render_documents_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [table_area, status_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(area);

    let title = if app.documents_loading {
        format!(" Documents (loading{}) ", ellipsis(app.animation_frame))
    } else {
        format!(" Documents ({}) ", app.documents.len())
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);

    if app.documents.is_empty() {
        let text = if app.documents_loading {
            "Loading..."
        } else {
            "No documents yet. Upload one on the Upload screen, or press r to refresh."
        };
        let empty = Paragraph::new(Span::styled(text, Style::default().fg(Color::DarkGray))).block(block);
        frame.render_widget(empty, table_area);
    } else {
        let header = Row::new(["Filename", "Chunks", "Status", "Provider", "Mode", "Size / Overlap"])
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

        let rows: Vec<Row> = app
            .documents
            .iter()
            .map(|doc| {
                let status_style = if doc.is_completed() {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::Yellow)
                };
                let window = match ChunkMode::from_str(&doc.chunk_mode) {
                    Some(mode) if !mode.uses_window() => "-".to_string(),
                    _ => format!("{} / {}", doc.chunk_size, doc.overlap),
                };
                Row::new(vec![
                    Cell::from(doc.filename.clone()),
                    Cell::from(doc.chunk_count.to_string()),
                    Cell::from(Span::styled(doc.status.clone(), status_style)),
                    Cell::from(doc.model_provider.clone()),
                    Cell::from(doc.chunk_mode.clone()),
                    Cell::from(window),
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Min(20),
                Constraint::Length(7),
                Constraint::Length(11),
                Constraint::Length(9),
                Constraint::Length(9),
                Constraint::Length(15),
            ],
        )
        .header(header)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Cyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

        frame.render_stateful_widget(table, table_area, &mut app.documents_state);
    }

    if let Some(banner) = &app.documents_banner {
        frame.render_widget(Paragraph::new(banner_line(banner)), status_area);
    }
}

fn render_delete_confirm(app: &App, frame: &mut Frame, area: Rect) {
    let Some(doc) = &app.pending_delete else {
        return;
    };
    let popup_area = centered(area, 60, 5);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Delete document ");

    let text = Text::from(vec![
        Line::from(vec![
            Span::raw("Delete "),
            Span::styled(doc.filename.clone(), Style::default().bold()),
            Span::raw(" and its vectors?"),
        ]),
        Line::from(Span::styled("y to delete, n or Esc to keep", Style::default().fg(Color::DarkGray))),
    ]);

    frame.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: true }), popup_area);
}

fn chunk_lines(chunks: &ChunkResults, width: usize) -> Vec<Line<'static>> {
    let label = Style::default().fg(Color::DarkGray);
    let value = Style::default().fg(Color::White).bold();
    let config = &chunks.config;

    let mut settings = vec![
        Span::styled("Mode ", label),
        Span::styled(config.chunk_mode.clone(), value),
    ];
    if ChunkMode::from_str(&config.chunk_mode).map_or(true, |m| m.uses_window()) {
        settings.extend([
            Span::styled("  Size ", label),
            Span::styled(config.chunk_size.to_string(), value),
            Span::styled("  Overlap ", label),
            Span::styled(config.overlap.to_string(), value),
        ]);
    }
    settings.extend([
        Span::styled("  Provider ", label),
        Span::styled(config.model_provider.clone(), value),
        Span::styled("  Chunks ", label),
        Span::styled(chunks.total_chunks.to_string(), value),
    ]);

    let mut lines = vec![Line::from(settings)];
    if !chunks.created_at.is_empty() {
        lines.push(Line::from(Span::styled(format!("Created {}", chunks.created_at), label)));
    }
    lines.push(Line::default());

    for chunk in &chunks.chunks {
        lines.push(Line::from(vec![
            Span::styled(format!("#{}", chunk.index), Style::default().fg(Color::Cyan).bold()),
            Span::styled(
                format!(
                    "  {} tokens  {} chars  {}-dim",
                    chunk.token_count, chunk.char_count, chunk.embedding_dim
                ),
                label,
            ),
        ]));
        for line in chunk.content.lines() {
            for wrapped in wrap_text_to_width(line, width) {
                lines.push(Line::from(wrapped));
            }
        }
        if !chunk.embedding_preview.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("embedding: {}", format_embedding_preview(&chunk.embedding_preview)),
                Style::default().fg(Color::Magenta),
            )));
        }
        lines.push(Line::default());
    }
    lines
}

fn vector_lines(vectors: &VectorDump) -> Vec<Line<'static>> {
    let label = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Collection ", label),
            Span::styled(vectors.collection.clone(), Style::default().bold()),
            Span::styled("  Records ", label),
            Span::styled(vectors.total_records.to_string(), Style::default().bold()),
        ]),
        Line::default(),
        Line::from(Span::styled("Schema", Style::default().fg(Color::Yellow).bold())),
    ];
    lines.extend(highlight_json(&vectors.schema));
    lines.push(Line::default());
    lines.push(Line::from(Span::styled("Records", Style::default().fg(Color::Yellow).bold())));
    lines.extend(highlight_json(&serde_json::Value::Array(vectors.records.clone())));
    lines
}

fn render_detail_modal(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup_area = centered(area, area.width * 9 / 10, area.height * 9 / 10);
    app.detail_area = Some(popup_area);
    frame.render_widget(Clear, popup_area);

    let title = match &app.detail {
        Some(detail) => format!(" {} ", detail.chunks.filename),
        None => " Document ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let [tabs_area, content_area] =
        Layout::vertical([Constraint::Length(2), Constraint::Min(0)]).areas(inner);

    let tabs = Tabs::new(vec!["Chunks", "Vector store"])
        .select(match app.detail_tab {
            DetailTab::Chunks => 0,
            DetailTab::Vectors => 1,
        })
        .style(Style::default().fg(Color::Gray))
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD | Modifier::UNDERLINED));
    frame.render_widget(tabs, tabs_area);

    let Some(detail) = &app.detail else {
        let loading = Paragraph::new(Span::styled(
            format!("Loading{}", ellipsis(app.animation_frame)),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ));
        frame.render_widget(loading, content_area);
        return;
    };

    let lines = match app.detail_tab {
        DetailTab::Chunks => chunk_lines(&detail.chunks, content_area.width as usize),
        DetailTab::Vectors => vector_lines(&detail.vectors),
    };

    let visible = visible_window(lines, &mut app.detail_scroll, content_area.height as usize);
    let paragraph = Paragraph::new(Text::from(visible));
    frame.render_widget(paragraph, content_area);
}

/// Provenance block under an answer: hit count, pipeline, scored hits.
fn provenance_lines(msg: &ChatMessage, show_prompt: bool, width: usize) -> Vec<Line<'static>> {
    if !msg.has_retrieval() {
        return Vec::new();
    }
    let Some(hits) = msg.retrieval.as_ref() else {
        return Vec::new();
    };
    let reranked = msg.use_rerank.unwrap_or(false);
    let dim = Style::default().fg(Color::DarkGray);

    let mut summary = vec![Span::styled(format!("  Retrieval ({} hits", hits.len()), dim)];
    if reranked {
        summary.push(Span::styled(" · reranked", Style::default().fg(Color::Yellow)));
    }
    summary.push(Span::styled(")", dim));

    let mut pipeline = vec![
        Span::raw("  "),
        Span::styled("Embedding", Style::default().fg(Color::Blue)),
        Span::styled(" → ", dim),
        Span::styled(format!("Vector search Top {}", hits.len()), Style::default().fg(Color::Green)),
    ];
    if reranked {
        pipeline.push(Span::styled(" → ", dim));
        pipeline.push(Span::styled("Rerank", Style::default().fg(Color::Yellow)));
    }
    pipeline.push(Span::styled(" → ", dim));
    pipeline.push(Span::styled("LLM", Style::default().fg(Color::Magenta)));

    let mut lines = vec![Line::from(summary), Line::from(pipeline)];

    for (i, hit) in hits.iter().enumerate() {
        let mut header = vec![
            Span::styled(format!("  #{}", i + 1), Style::default().fg(Color::Blue).bold()),
            Span::styled(
                format!(" similarity {:.1}%", hit.score * 100.0),
                Style::default().fg(Color::Green),
            ),
        ];
        if let Some(score) = hit.rerank_score {
            header.push(Span::styled(format!(" rerank {:.1}", score), Style::default().fg(Color::Yellow)));
        }
        lines.push(Line::from(header));

        // At most three lines of each passage
        let wrapped = wrap_text_to_width(&hit.content, width.saturating_sub(4));
        let clipped = wrapped.len() > 3;
        for (j, text) in wrapped.into_iter().take(3).enumerate() {
            let text = if clipped && j == 2 { format!("{}…", text) } else { text };
            lines.push(Line::from(Span::styled(format!("    {}", text), dim)));
        }
    }

    if show_prompt {
        if let Some(prompt) = msg.prompt.as_deref().filter(|p| !p.is_empty()) {
            lines.push(Line::from(Span::styled("  Prompt", Style::default().fg(Color::Gray).bold())));
            for line in prompt.lines() {
                for wrapped in wrap_text_to_width(line, width.saturating_sub(4)) {
                    lines.push(Line::from(Span::styled(format!("    {}", wrapped), dim)));
                }
            }
        }
    }

    lines
}

fn chat_lines(app: &App, width: usize) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let messages = app.chat.messages();
    let in_flight = app.chat.in_flight().map(|h| h.index());

    for (i, msg) in messages.iter().enumerate() {
        match msg.role {
            ChatRole::User => {
                lines.push(Line::from(Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
                for line in msg.content.lines() {
                    for wrapped in wrap_text_to_width(line, width) {
                        lines.push(Line::from(wrapped));
                    }
                }
            }
            ChatRole::Assistant => {
                lines.push(Line::from(Span::styled(
                    "AI:",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
                if in_flight == Some(i) && msg.content.is_empty() {
                    lines.push(Line::from(Span::styled(
                        format!("Thinking{}", ellipsis(app.animation_frame)),
                        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                    )));
                } else {
                    let base = if in_flight != Some(i) && msg.content.starts_with(FAILURE_PREFIX) {
                        Style::default().fg(Color::Red)
                    } else {
                        Style::default()
                    };
                    for line in msg.content.lines() {
                        for wrapped in wrap_text_to_width(line, width) {
                            lines.push(parse_markdown_line(&wrapped, base));
                        }
                    }
                }
                if app.show_provenance {
                    lines.extend(provenance_lines(msg, app.show_prompt, width));
                }
            }
        }
        lines.push(Line::default());
    }
    lines
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    // Store area for mouse hit-testing
    app.chat_area = Some(chat_area);
    app.chat_height = chat_area.height.saturating_sub(2) as usize;

    let rerank = if app.config.use_rerank { "on" } else { "off" };
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(
            " {} · top-k {} · rerank {} ",
            app.config.model_provider.display_name(),
            app.config.top_k,
            rerank
        ));

    let width = chat_area.width.saturating_sub(2) as usize;
    let text = if app.chat.messages().is_empty() {
        Text::from(Span::styled(
            "Ask a question about your documents...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        // Lines are pre-wrapped, so the count is exact
        let lines = chat_lines(app, width);
        let max_scroll = lines.len().saturating_sub(app.chat_height);
        if app.chat_follow || app.chat_scroll >= max_scroll {
            app.chat_scroll = max_scroll;
            app.chat_follow = true;
        }
        Text::from(visible_window(lines, &mut app.chat_scroll, app.chat_height))
    };

    let chat = Paragraph::new(text).block(chat_block);
    frame.render_widget(chat, chat_area);

    let title = if app.chat.is_awaiting() {
        "Answering... (Esc to stop)"
    } else {
        "Ask"
    };
    render_input(
        frame,
        input_area,
        &app.chat_input,
        title,
        app.input_mode == InputMode::Editing,
        true,
    );
}

fn render_settings_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let title = if app.settings_loading {
        format!(" API Keys (loading{}) ", ellipsis(app.animation_frame))
    } else if app.settings_saving {
        format!(" API Keys (saving{}) ", ellipsis(app.animation_frame))
    } else {
        " API Keys ".to_string()
    };
    let outer = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(title);
    let inner = outer.inner(area);
    frame.render_widget(outer, area);

    let [a, b, c, note, status, _] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(2),
        Constraint::Length(1),
        Constraint::Min(0),
    ])
    .areas(inner);

    let editing = app.input_mode == InputMode::Editing;
    for (field, row) in SettingsField::all().into_iter().zip([a, b, c]) {
        let selected = app.settings_field == field;
        render_input(frame, row, app.settings_input(field), field.label(), editing && selected, selected);
    }

    let hint = Paragraph::new("Keys are stored by the server and shown masked. Leave a masked value as-is to keep it.")
        .style(Style::default().fg(Color::DarkGray))
        .wrap(Wrap { trim: true });
    frame.render_widget(hint, note);

    if let Some(banner) = &app.settings_banner {
        frame.render_widget(Paragraph::new(banner_line(banner)), status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragdesk_core::{Config, RetrievalHit};
    use ratatui::{Terminal, backend::TestBackend};
    use tokio::sync::mpsc;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_wrap_text_to_width() {
        assert_eq!(wrap_text_to_width("one two three", 7), vec!["one two", "three"]);
        assert_eq!(wrap_text_to_width("", 10), vec![String::new()]);
    }

    #[test]
    fn test_bold_markdown() {
        let line = parse_markdown_line("a **b** c", Style::default());
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "b");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));

        let unclosed = parse_markdown_line("a **b", Style::default());
        assert_eq!(line_text(&unclosed), "a **b");
    }

    #[test]
    fn test_json_highlight_keeps_text_and_classifies_tokens() {
        let line = highlight_json_line(r#"  "id": 42, "ok": true, "name": "x: 1","#);
        assert_eq!(line_text(&line), r#"  "id": 42, "ok": true, "name": "x: 1","#);

        let styled: Vec<(&str, Option<Color>)> = line
            .spans
            .iter()
            .map(|s| (s.content.as_ref(), s.style.fg))
            .collect();
        assert!(styled.contains(&(r#""id":"#, Some(Color::Cyan))));
        assert!(styled.contains(&("42", Some(Color::Yellow))));
        assert!(styled.contains(&("true", Some(Color::Magenta))));
        // Digits inside a string stay part of the string
        assert!(styled.contains(&(r#""x: 1""#, Some(Color::Green))));
    }

    #[test]
    fn test_embedding_preview_format() {
        assert_eq!(format_embedding_preview(&[0.1, -0.23456]), "[0.1000, -0.2346 ...]");
    }

    #[test]
    fn test_provenance_lines() {
        let mut msg = ChatMessage::assistant("answer");
        assert!(provenance_lines(&msg, false, 80).is_empty());

        msg.retrieval = Some(vec![
            RetrievalHit { content: "alpha".to_string(), score: 0.8734, rerank_score: Some(7.31) },
            RetrievalHit { content: "beta".to_string(), score: 0.5, rerank_score: None },
        ]);
        msg.use_rerank = Some(true);
        msg.prompt = Some("system prompt".to_string());

        let text: Vec<String> = provenance_lines(&msg, false, 80).iter().map(line_text).collect();
        assert!(text[0].contains("2 hits"));
        assert!(text[0].contains("reranked"));
        assert_eq!(text[1].trim(), "Embedding → Vector search Top 2 → Rerank → LLM");
        assert!(text.iter().any(|l| l.contains("similarity 87.3%") && l.contains("rerank 7.3")));
        assert!(!text.iter().any(|l| l.contains("system prompt")));

        let with_prompt: Vec<String> = provenance_lines(&msg, true, 80).iter().map(line_text).collect();
        assert!(with_prompt.iter().any(|l| l.contains("system prompt")));
    }

    #[test]
    fn test_pipeline_without_rerank() {
        let mut msg = ChatMessage::assistant("answer");
        msg.retrieval = Some(vec![RetrievalHit { content: "a".to_string(), score: 1.0, rerank_score: None }]);
        msg.use_rerank = Some(false);

        let text: Vec<String> = provenance_lines(&msg, false, 80).iter().map(line_text).collect();
        assert_eq!(text[1].trim(), "Embedding → Vector search Top 1 → LLM");
    }

    #[test]
    fn test_visible_window_clamps_past_end() {
        let lines: Vec<Line<'static>> = (0..10).map(|i| Line::from(i.to_string())).collect();
        let mut scroll = usize::MAX;
        let visible = visible_window(lines, &mut scroll, 4);
        assert_eq!(scroll, 6);
        let text: Vec<String> = visible.iter().map(line_text).collect();
        assert_eq!(text, vec!["6", "7", "8", "9"]);
    }

    #[test]
    fn test_long_transcript_shows_latest_message() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(Config::new(), tx);
        app.screen = Screen::Chat;

        // Three lines per message puts the tail well past u16::MAX.
        let mut history = Vec::new();
        for i in 0..12_000 {
            history.push(ChatMessage::user(format!("question {}", i)));
            history.push(ChatMessage::assistant(format!("answer {}", i)));
        }
        history.push(ChatMessage::user("FINAL-QUESTION"));
        history.push(ChatMessage::assistant("final answer"));
        assert!(app.chat.restore(history));

        let mut terminal = Terminal::new(TestBackend::new(80, 30)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let screen: String = terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(screen.contains("FINAL-QUESTION"));
        assert!(screen.contains("final answer"));
        assert!(app.chat_scroll > u16::MAX as usize);
    }
}
