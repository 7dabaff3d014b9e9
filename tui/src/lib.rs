//! TUI rendering for Refine using ratatui.

mod clipboard;
mod input;
mod theme;

pub use clipboard::copy_text;
pub use input::{InputPump, handle_events};
pub use theme::{Glyphs, Palette, glyphs, palette, spinner_frame, styles};

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, BorderType, Borders, Clear, List, ListItem, ListState, Padding, Paragraph, Wrap,
    },
};
use unicode_width::UnicodeWidthStr;

use refine_engine::ui::{ActiveView, InputMode, StatusKind};
use refine_engine::{App, GenerativeService, HistoryEntry, Temperature, truncate_preview};

const HISTORY_PREVIEW_CHARS: usize = 50;
const HISTORY_PREVIEW_SUFFIX: &str = "...";
const SLIDER_CELLS: usize = 21;

/// Main draw function
pub fn draw<S: GenerativeService>(frame: &mut Frame, app: &App<S>) {
    let options = app.ui_options();
    let palette = palette(options);
    let glyphs = glyphs(options);
    let bg_block = Block::default().style(Style::default().bg(palette.bg_dark));
    frame.render_widget(bg_block, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1), // Tabs + model + temperature
            Constraint::Min(6),    // Active view
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    draw_header(frame, app, chunks[0], &palette, &glyphs);
    match app.view() {
        ActiveView::Optimizer => draw_optimizer(frame, app, chunks[1], &palette),
        ActiveView::History => draw_history(frame, app, chunks[1], &palette, &glyphs),
    }
    draw_status_bar(frame, app, chunks[2], &palette, &glyphs);

    match app.input_mode() {
        InputMode::ModelSelect => draw_model_selector(frame, app, &palette, &glyphs),
        InputMode::KeyPrompt => draw_key_prompt(frame, app, &palette, &glyphs),
        InputMode::Normal | InputMode::Insert => {}
    }
}

fn draw_header<S: GenerativeService>(
    frame: &mut Frame,
    app: &App<S>,
    area: Rect,
    palette: &Palette,
    glyphs: &Glyphs,
) {
    let mut spans = Vec::new();
    for view in [ActiveView::Optimizer, ActiveView::History] {
        let style = if view == app.view() {
            Style::default()
                .fg(palette.bg_dark)
                .bg(palette.primary)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.text_muted)
        };
        spans.push(Span::styled(format!(" {} ", view.title()), style));
        spans.push(Span::raw(" "));
    }

    let selector = app.selector();
    let model_style = if selector.is_enabled() {
        Style::default().fg(palette.gemini)
    } else {
        Style::default().fg(palette.text_disabled)
    };
    let mut model_spans = Vec::new();
    if app.is_refreshing() {
        model_spans.push(Span::styled(
            format!("{} ", spinner_frame(app.tick_count(), app.ui_options())),
            Style::default().fg(palette.accent),
        ));
    }
    model_spans.push(Span::styled(selector.label().to_string(), model_style));

    let key_glyph = if app.has_credential() {
        Span::styled(glyphs.status_ready, Style::default().fg(palette.success))
    } else {
        Span::styled(glyphs.status_missing, Style::default().fg(palette.warning))
    };

    let right: Vec<Span> = model_spans
        .into_iter()
        .chain([
            Span::styled(format!(" {} ", glyphs.separator), styles::key_hint(palette)),
            Span::styled("temp ", styles::key_hint(palette)),
            Span::styled(
                temperature_slider(app.temperature(), glyphs),
                Style::default().fg(palette.primary),
            ),
            Span::styled(
                format!(" {}", app.temperature()),
                Style::default().fg(palette.text_primary),
            ),
            Span::styled(format!(" {} key ", glyphs.separator), styles::key_hint(palette)),
            key_glyph,
        ])
        .collect();

    let left_width: usize = spans.iter().map(|span| span.content.width()).sum();
    let right_width: usize = right.iter().map(|span| span.content.width()).sum();
    let gap = (area.width as usize).saturating_sub(left_width + right_width);
    spans.push(Span::raw(" ".repeat(gap)));
    spans.extend(right);

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn temperature_slider(temperature: Temperature, glyphs: &Glyphs) -> String {
    let position = (temperature.value() / Temperature::STEP).round() as usize;
    let position = position.min(SLIDER_CELLS - 1);
    (0..SLIDER_CELLS)
        .map(|cell| {
            if cell == position {
                glyphs.thumb
            } else {
                glyphs.track
            }
        })
        .collect()
}

fn draw_optimizer<S: GenerativeService>(
    frame: &mut Frame,
    app: &App<S>,
    area: Rect,
    palette: &Palette,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40), // Input
            Constraint::Length(3),      // Trigger
            Constraint::Min(3),         // Output
        ])
        .split(area);

    draw_input(frame, app, chunks[0], palette);
    draw_trigger(frame, app, chunks[1], palette);
    draw_output(frame, app, chunks[2], palette);
}

fn draw_input<S: GenerativeService>(
    frame: &mut Frame,
    app: &App<S>,
    area: Rect,
    palette: &Palette,
) {
    let editing = app.input_mode() == InputMode::Insert;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(styles::border(palette, editing))
        .padding(Padding::horizontal(1))
        .title(Span::styled(
            " Your prompt ",
            Style::default()
                .fg(palette.text_primary)
                .add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);

    let draft = app.input();
    let text = draft.text();
    if text.is_empty() && !editing {
        let placeholder = Paragraph::new(Line::from(vec![
            Span::styled("Press ", styles::key_hint(palette)),
            Span::styled("i", styles::key_highlight(palette)),
            Span::styled(" to write a prompt, or paste one", styles::key_hint(palette)),
        ]))
        .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let before_cursor = &text[..draft.byte_index()];
    let cursor_row = before_cursor.matches('\n').count();
    let cursor_col = before_cursor.rsplit('\n').next().unwrap_or("").width();

    let visible_rows = inner.height.max(1) as usize;
    let scroll = (cursor_row + 1).saturating_sub(visible_rows);
    let lines: Vec<Line> = text
        .split('\n')
        .map(|line| Line::from(Span::styled(line, Style::default().fg(palette.text_primary))))
        .collect();

    let paragraph = Paragraph::new(lines)
        .block(block)
        .scroll((scroll as u16, 0));
    frame.render_widget(paragraph, area);

    if editing {
        let max_x = inner.x + inner.width.saturating_sub(1);
        let cursor_x = inner.x.saturating_add(cursor_col as u16).min(max_x);
        let cursor_y = inner.y + (cursor_row - scroll) as u16;
        frame.set_cursor_position((cursor_x, cursor_y));
    }
}

fn draw_trigger<S: GenerativeService>(
    frame: &mut Frame,
    app: &App<S>,
    area: Rect,
    palette: &Palette,
) {
    let trigger = app.trigger();
    let label = if trigger.enabled {
        format!(" {} ", trigger.label)
    } else {
        format!(
            " {} {} ",
            spinner_frame(app.tick_count(), app.ui_options()),
            trigger.label
        )
    };
    let width = (label.width() as u16 + 4).min(area.width);
    let button_area = Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y,
        width,
        height: area.height,
    };

    let button = Paragraph::new(Line::from(Span::styled(
        label,
        styles::trigger(palette, trigger.enabled),
    )))
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(styles::border(palette, trigger.enabled)),
    );
    frame.render_widget(button, button_area);
}

fn draw_output<S: GenerativeService>(
    frame: &mut Frame,
    app: &App<S>,
    area: Rect,
    palette: &Palette,
) {
    let mut title = vec![Span::styled(
        " Optimized prompt ",
        Style::default()
            .fg(palette.text_primary)
            .add_modifier(Modifier::BOLD),
    )];
    if app.copy_acknowledged() {
        title.push(Span::styled(
            "Copied! ",
            Style::default()
                .fg(palette.success)
                .add_modifier(Modifier::BOLD),
        ));
    }

    let failed = app.status().kind == StatusKind::Error;
    let text_style = if failed {
        Style::default().fg(palette.error)
    } else {
        Style::default().fg(palette.text_primary)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(styles::border(palette, false))
        .padding(Padding::horizontal(1))
        .title(Line::from(title));

    let paragraph = Paragraph::new(app.output().to_string())
        .style(text_style)
        .wrap(Wrap { trim: false })
        .block(block);
    frame.render_widget(paragraph, area);
}

/// `HH:MM | N tok` header and a one-line prompt preview for a history row.
#[must_use]
pub fn history_row(entry: &HistoryEntry) -> (String, String) {
    let tokens = entry
        .tokens
        .map_or_else(|| "?".to_string(), |n| n.to_string());
    let header = format!("{} | {tokens} tok", entry.ts);
    let flattened = entry.prompt.split_whitespace().collect::<Vec<_>>().join(" ");
    let preview = truncate_preview(&flattened, HISTORY_PREVIEW_CHARS, HISTORY_PREVIEW_SUFFIX);
    (header, preview)
}

fn draw_history<S: GenerativeService>(
    frame: &mut Frame,
    app: &App<S>,
    area: Rect,
    palette: &Palette,
    glyphs: &Glyphs,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(styles::border(palette, true))
        .title(Span::styled(
            format!(" History ({}) ", app.history().len()),
            Style::default()
                .fg(palette.text_primary)
                .add_modifier(Modifier::BOLD),
        ));

    if app.history().is_empty() {
        let empty = Paragraph::new(Span::styled(
            "No optimizations yet",
            styles::key_hint(palette),
        ))
        .alignment(Alignment::Center)
        .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = app
        .history()
        .entries()
        .iter()
        .map(|entry| {
            let (header, preview) = history_row(entry);
            ListItem::new(vec![
                Line::from(vec![
                    Span::styled(format!(" {header}"), Style::default().fg(palette.accent)),
                    Span::styled(format!("  {}", entry.model), styles::key_hint(palette)),
                ]),
                Line::from(Span::styled(
                    format!("   {preview}"),
                    Style::default().fg(palette.text_secondary),
                )),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(palette.bg_highlight)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(glyphs.selected);

    let mut state = ListState::default().with_selected(Some(app.history_cursor()));
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_status_bar<S: GenerativeService>(
    frame: &mut Frame,
    app: &App<S>,
    area: Rect,
    palette: &Palette,
    glyphs: &Glyphs,
) {
    let mode = app.input_mode();
    let (mode_label, mode_style) = match mode {
        InputMode::Normal => (" NORMAL ", styles::mode_normal(palette)),
        InputMode::Insert => (" INSERT ", styles::mode_insert(palette)),
        InputMode::ModelSelect => (" MODEL ", styles::mode_model(palette)),
        InputMode::KeyPrompt => (" API KEY ", styles::mode_key(palette)),
    };

    let status = app.status();
    let status_prefix = match status.kind {
        StatusKind::Busy => format!("{} ", spinner_frame(app.tick_count(), app.ui_options())),
        StatusKind::Success => format!("{} ", glyphs.ok),
        StatusKind::Error => format!("{} ", glyphs.err),
        StatusKind::Info | StatusKind::Warning => String::new(),
    };

    let hint = |key: &'static str, label: &'static str| {
        [
            Span::styled(key, styles::key_highlight(palette)),
            Span::styled(label, styles::key_hint(palette)),
        ]
    };
    let hints: Vec<Span> = match (mode, app.view()) {
        (InputMode::Normal, ActiveView::Optimizer) => [
            hint("i", " edit  "),
            hint("Enter", " optimize  "),
            hint("m", " model  "),
            hint("+/-", " temp  "),
            hint("y", " copy  "),
            hint("Tab", " history  "),
            hint("q", " quit "),
        ]
        .into_iter()
        .flatten()
        .collect(),
        (InputMode::Normal, ActiveView::History) => [
            hint("↑↓", " select  "),
            hint("Enter", " load  "),
            hint("Tab", " optimizer  "),
            hint("q", " quit "),
        ]
        .into_iter()
        .flatten()
        .collect(),
        (InputMode::Insert, _) => [hint("Ctrl+S", " optimize  "), hint("Esc", " normal ")]
            .into_iter()
            .flatten()
            .collect(),
        (InputMode::ModelSelect, _) => [
            hint("↑↓", " select  "),
            hint("Enter", " confirm  "),
            hint("Esc", " cancel "),
        ]
        .into_iter()
        .flatten()
        .collect(),
        (InputMode::KeyPrompt, _) => [hint("Enter", " save  "), hint("Esc", " cancel ")]
            .into_iter()
            .flatten()
            .collect(),
    };

    let mut left = vec![
        Span::styled(mode_label, mode_style),
        Span::raw(" "),
        Span::styled(
            format!("{status_prefix}{}", status.text),
            styles::status(palette, status.kind),
        ),
    ];
    let left_width: usize = left.iter().map(|span| span.content.width()).sum();
    let hints_width: usize = hints.iter().map(|span| span.content.width()).sum();
    if left_width + hints_width < area.width as usize {
        let gap = area.width as usize - left_width - hints_width;
        left.push(Span::raw(" ".repeat(gap)));
        left.extend(hints);
    }

    frame.render_widget(Paragraph::new(Line::from(left)), area);
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    }
}

fn overlay_block<'a>(title: &'a str, palette: &Palette) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(palette.primary))
        .style(Style::default().bg(palette.bg_panel))
        .padding(Padding::uniform(1))
        .title(Line::from(vec![Span::styled(
            title,
            Style::default()
                .fg(palette.text_primary)
                .add_modifier(Modifier::BOLD),
        )]))
}

pub fn draw_model_selector<S: GenerativeService>(
    frame: &mut Frame,
    app: &App<S>,
    palette: &Palette,
    glyphs: &Glyphs,
) {
    let area = frame.area();
    let selected_index = app.model_select_index().unwrap_or(0);
    let options = app.selector().options();
    let current = app.selector().selected_index();

    let selector_width = 60.min(area.width.saturating_sub(4)).max(30);
    let content_width = selector_width.saturating_sub(4).max(1) as usize;

    let mut lines: Vec<Line> = Vec::with_capacity(options.len() + 2);
    for (i, name) in options.iter().enumerate() {
        let selected = i == selected_index;
        let prefix = if selected { glyphs.selected } else { " " };
        let marker = if current == Some(i) { glyphs.bullet } else { " " };
        let row = format!(" {prefix} {:>2}  {name} {marker}", i + 1);
        let filler = content_width.saturating_sub(row.width());
        let style = if selected {
            Style::default()
                .fg(palette.text_primary)
                .bg(palette.bg_highlight)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.text_secondary)
        };
        lines.push(Line::from(Span::styled(
            format!("{row}{}", " ".repeat(filler)),
            style,
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("  ↑↓", styles::key_highlight(palette)),
        Span::styled(" select  ", styles::key_hint(palette)),
        Span::styled("1-9", styles::key_highlight(palette)),
        Span::styled(" quick pick  ", styles::key_hint(palette)),
        Span::styled("Enter", styles::key_highlight(palette)),
        Span::styled(" confirm  ", styles::key_hint(palette)),
        Span::styled("Esc", styles::key_highlight(palette)),
        Span::styled(" cancel", styles::key_hint(palette)),
    ]));

    let height = (lines.len() as u16).saturating_add(4);
    let selector_area = centered_rect(area, selector_width, height);

    frame.render_widget(Clear, selector_area);
    let visible = selector_area.height.saturating_sub(4) as usize;
    let scroll = (selected_index + 1).saturating_sub(visible.saturating_sub(2));
    let selector = Paragraph::new(lines)
        .scroll((scroll as u16, 0))
        .block(overlay_block(" Select Gemini Model ", palette));
    frame.render_widget(selector, selector_area);
}

/// Masked display of a secret draft: one bullet per grapheme, capped to `max`.
fn masked(len: usize, max: usize, bullet: &str) -> String {
    let shown = len.min(max);
    let mut out = bullet.repeat(shown);
    if len > max {
        out.push_str(&format!(" (+{})", len - max));
    }
    out
}

fn draw_key_prompt<S: GenerativeService>(
    frame: &mut Frame,
    app: &App<S>,
    palette: &Palette,
    glyphs: &Glyphs,
) {
    let area = frame.area();
    let prompt_area = centered_rect(area, 64, 11);
    let content_width = prompt_area.width.saturating_sub(4).max(1) as usize;

    let draft = app.key_draft();
    let mask = masked(
        draft.grapheme_count(),
        content_width.saturating_sub(12),
        glyphs.bullet,
    );

    let lines = vec![
        Line::from(Span::styled(
            "Paste or type your Google AI Studio API key.",
            Style::default().fg(palette.text_secondary),
        )),
        Line::from(Span::styled(
            "It is stored in user_config.json in the data directory.",
            styles::key_hint(palette),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("> ", Style::default().fg(palette.primary)),
            Span::styled(mask.clone(), Style::default().fg(palette.text_primary)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Enter", styles::key_highlight(palette)),
            Span::styled(" save  ", styles::key_hint(palette)),
            Span::styled("Esc", styles::key_highlight(palette)),
            Span::styled(" cancel", styles::key_hint(palette)),
        ]),
    ];

    frame.render_widget(Clear, prompt_area);
    frame.render_widget(
        Paragraph::new(lines).block(overlay_block(" Gemini API Key ", palette)),
        prompt_area,
    );

    let cursor_x = prompt_area
        .x
        .saturating_add(2 + 2 + mask.width() as u16)
        .min(prompt_area.x + prompt_area.width.saturating_sub(2));
    let cursor_y = prompt_area.y + 2 + 3;
    frame.set_cursor_position((cursor_x, cursor_y));
}
