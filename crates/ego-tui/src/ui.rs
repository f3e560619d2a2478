use ego_core::timing::format_duration;
use ego_core::{ChatRole, InputMode, ModelTier};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, EditMode};

const SIDEBAR_WIDTH: u16 = 34;

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c != '*' || chars.peek() != Some(&'*') {
            current_text.push(c);
            continue;
        }
        chars.next(); // second *

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
            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }
            spans.push(Span::styled(bold_text, Style::default().add_modifier(Modifier::BOLD)));
        } else {
            // No closing **, treat as literal
            current_text.push_str("**");
            current_text.push_str(&bold_text);
            if found_close {
                current_text.push_str("**");
            }
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }
    Line::from(spans)
}

/// Centered rectangle of at most `width` x `height` inside `area`.
fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    Rect::new(
        area.x + (area.width.saturating_sub(width)) / 2,
        area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    )
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let [sidebar_area, main_area] =
        Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)]).areas(body_area);
    render_sidebar(app, frame, sidebar_area);

    if app.quota.is_limit_reached() && !app.is_busy() {
        app.chat_area = None;
        render_limit_screen(app, frame, main_area);
    } else {
        let [chat_area, input_area] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(main_area);
        render_chat(app, frame, chat_area);
        render_input(app, frame, input_area);
    }

    render_footer(app, frame, footer_area);

    if app.show_upgrade_notice {
        render_upgrade_notice(frame, area);
    } else if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let login_badge = match &app.username {
        Some(name) => Span::styled(format!(" @{} ", name), Style::default().fg(Color::Green).bold()),
        None => Span::styled(" guest ", Style::default().fg(Color::Gray)),
    };

    let usage_color = if app.quota.is_limit_reached() {
        Color::Red
    } else if app.quota.is_near_limit() {
        Color::Yellow
    } else {
        Color::Gray
    };

    let title = Line::from(vec![
        Span::styled(" Ego ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
        Span::raw("  "),
        login_badge,
        Span::styled(
            format!(
                " {}/{} this week ",
                app.quota.current_usage(),
                app.quota.max_quota()
            ),
            Style::default().fg(usage_color),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.edit_mode {
        EditMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        EditMode::Editing => (" INSERT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let pairs: &[(&str, &str)] = if app.show_model_picker {
        &[("j/k", "nav"), ("Enter", "select"), ("Esc", "close")]
    } else if app.show_upgrade_notice {
        &[("any key", "close")]
    } else if app.edit_mode == EditMode::Editing {
        &[("Enter", "send"), ("Esc", "done"), ("←/→", "move")]
    } else if app.is_busy() {
        &[("Esc", "cancel"), ("j/k", "scroll"), ("q", "quit")]
    } else {
        &[
            ("i", "type"),
            ("M", "model"),
            ("A", "auto"),
            ("T", "tone"),
            ("+/-", "verbosity"),
            ("[/]", "temp"),
            ("m", "mode"),
            ("I", "input"),
            ("r", "record"),
            ("v", "voice"),
            ("C", "clear"),
            ("L", "login"),
            ("q", "quit"),
        ]
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    if let Some(status) = &app.status {
        spans.push(Span::styled(format!(" {} ", status), Style::default().fg(Color::Yellow)));
        spans.push(Span::raw(" "));
    }
    for (key, label) in pairs {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_sidebar(app: &App, frame: &mut Frame, area: Rect) {
    let (model, settings, input_mode) = {
        let store = app.session().lock();
        (store.selected_model().cloned(), store.customization(), store.input_mode())
    };
    let stats = app.controller.response_stats();

    let heading = |text: &'static str| {
        Line::from(Span::styled(text, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)))
    };
    let row = |label: &str, value: String| {
        Line::from(vec![
            Span::styled(format!(" {:<12}", label), Style::default().fg(Color::Gray)),
            Span::raw(value),
        ])
    };
    let on_off = |flag: bool| (if flag { "on" } else { "off" }).to_string();

    let mut lines = vec![heading("Model")];
    match &model {
        Some(m) => {
            let tier_style = match m.tier {
                ModelTier::Premium => Style::default().fg(Color::Magenta),
                ModelTier::Free => Style::default().fg(Color::Green),
            };
            lines.push(Line::from(vec![
                Span::raw(format!(" {} ", m.name)),
                Span::styled(m.tier.display_name(), tier_style),
            ]));
        }
        None => lines.push(Line::from(Span::styled(
            " default (M to choose)",
            Style::default().fg(Color::Gray),
        ))),
    }

    lines.push(Line::default());
    lines.push(heading("Customization"));
    lines.push(row("Tone", settings.tone.display_name().to_string()));
    lines.push(row("Verbosity", settings.verbosity.to_string()));
    lines.push(row("Temperature", format!("{:.1}", settings.temperature)));
    lines.push(row("Mode", settings.chat_mode().display_name().to_string()));
    lines.push(row("Thinking", on_off(settings.thinking_mode)));
    lines.push(row("Web search", on_off(settings.web_search)));
    lines.push(row("Input", input_mode.display_name().to_string()));
    lines.push(row("Voice out", on_off(app.voice_output)));

    lines.push(Line::default());
    lines.push(heading("Response timer"));
    if let Some(elapsed) = app.response_elapsed() {
        lines.push(row("Current", format_duration(elapsed)).fg(Color::Yellow));
    }
    lines.push(row(
        "Last",
        app.last_response.map(format_duration).unwrap_or_else(|| "-".to_string()),
    ));
    if stats.total_requests > 0 {
        lines.push(row("Average", format_duration(stats.average)));
        lines.push(row(
            "Fast/Med/Slow",
            format!(
                "{}/{}/{}",
                stats.distribution.fast, stats.distribution.medium, stats.distribution.slow
            ),
        ));
    }

    lines.push(Line::default());
    lines.push(heading("Weekly usage"));
    let days = app.quota.days_until_reset(app.controller.now());
    lines.push(row("Remaining", app.quota.remaining().to_string()));
    lines.push(row("Resets in", format!("{} day{}", days, if days == 1 { "" } else { "s" })));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [info_area, gauge_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(inner);
    frame.render_widget(Paragraph::new(Text::from(lines)), info_area);

    let gauge_color = if app.quota.is_limit_reached() {
        Color::Red
    } else if app.quota.is_near_limit() {
        Color::Yellow
    } else {
        Color::Green
    };
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(gauge_color).bg(Color::Black))
        .ratio((app.quota.usage_percentage() / 100.0).clamp(0.0, 1.0))
        .label(format!(
            "{}/{}",
            app.quota.current_usage(),
            app.quota.max_quota()
        ));
    frame.render_widget(gauge, gauge_area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);
    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let (messages, is_thinking, model_name) = {
        let store = app.session().lock();
        (
            store.messages().to_vec(),
            store.is_thinking(),
            store.selected_model().map(|m| m.name.clone()),
        )
    };

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" Chat: {} ", model_name.as_deref().unwrap_or("default model")));

    let chat_text = if messages.is_empty() && !app.is_busy() {
        Text::from(Span::styled(
            "Ask anything. Press i to type, M to pick a model.",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in &messages {
            let time = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(msg.timestamp)
                .map(|t| t.format(" %H:%M").to_string())
                .unwrap_or_default();
            let (label, color) = match msg.role {
                ChatRole::User => ("You:", Color::Cyan),
                ChatRole::Assistant => ("Ego:", Color::Yellow),
            };
            lines.push(Line::from(vec![
                Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
                Span::styled(time, Style::default().fg(Color::DarkGray)),
            ]));
            if let Some(image) = &msg.image {
                lines.push(Line::from(Span::styled(
                    format!("[image: {}]", image.as_str()),
                    Style::default().fg(Color::Magenta),
                )));
            }
            for line in msg.content.lines() {
                if msg.is_user() {
                    lines.push(Line::from(line.to_string()));
                } else {
                    lines.push(parse_markdown_line(line));
                }
            }
            lines.push(Line::default());
        }

        if app.is_busy() {
            lines.push(Line::from(Span::styled(
                "Ego:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            let label = if is_thinking { "Thinking deeply" } else { "Thinking" };
            lines.push(Line::from(Span::styled(
                format!("{}{}", label, dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let input_mode = app.session().lock().input_mode();
    let title = match (input_mode, &app.pending_image) {
        (_, Some(image)) => format!(" Message with {} ", image.as_str()),
        (InputMode::Image, None) => " Image path (Enter to attach) ".to_string(),
        (InputMode::Voice, None) => " Message (r to record) ".to_string(),
        (InputMode::Text, None) => " Message (i to type) ".to_string(),
    };

    let border_color = if app.edit_mode == EditMode::Editing {
        Color::Yellow
    } else {
        Color::DarkGray
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width == 0 || app.cursor < inner_width {
        0
    } else {
        app.cursor - inner_width + 1
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, area);

    if app.edit_mode == EditMode::Editing {
        let cursor_x = (app.cursor - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_limit_screen(app: &App, frame: &mut Frame, area: Rect) {
    let reset_at = app.quota.reset_at();
    let days = app.quota.days_until_reset(app.controller.now());

    let lines = vec![
        Line::default(),
        Line::from(Span::styled(
            "Weekly limit reached",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from(format!(
            "You've used all {} messages for this week.",
            app.quota.max_quota()
        )),
        Line::from(format!(
            "Your quota resets in {} day{}, on {}.",
            days,
            if days == 1 { "" } else { "s" },
            reset_at.format("%A %B %-d at %H:%M UTC")
        )),
        Line::default(),
        Line::from(Span::styled(
            "Press U for upgrade options or q to quit.",
            Style::default().fg(Color::Gray),
        )),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Limit reached ");
    let screen = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(block);
    frame.render_widget(screen, area);
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup = popup_area(area, 48, app.available_models.len() as u16 + 2);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Model (Enter to select, Esc to cancel) ");

    let selected_id = app.session().lock().selected_model().map(|m| m.id.clone());
    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|model| {
            let style = if Some(&model.id) == selected_id.as_ref() {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let usage = if model.is_premium() {
                format!(
                    "  {}/{} ({:.0}%)",
                    model.quota_used,
                    model.quota_limit,
                    model.quota_percentage()
                )
            } else {
                String::new()
            };
            ListItem::new(format!(" {:<18}{:<8}{}", model.name, model.tier.display_name(), usage))
                .style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup, &mut app.model_picker_state);
}

fn render_upgrade_notice(frame: &mut Frame, area: Rect) {
    let popup = popup_area(area, 50, 8);
    frame.render_widget(Clear, popup);

    let text = vec![
        Line::from(Span::styled("Ego Premium", Style::default().fg(Color::Magenta).bold())),
        Line::default(),
        Line::from("More weekly messages and priority access to"),
        Line::from("premium models are coming soon."),
        Line::default(),
        Line::from(Span::styled("Press any key to close", Style::default().fg(Color::Gray))),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(" Upgrade ");
    frame.render_widget(
        Paragraph::new(text).alignment(Alignment::Center).block(block),
        popup,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_app;
    use ratatui::{backend::TestBackend, Terminal};

    fn draw(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_parse_markdown_bold() {
        let line = parse_markdown_line("**Model:** GPT-4 Turbo");
        assert_eq!(line.spans.len(), 2);
        assert_eq!(line.spans[0].content, "Model:");
        assert!(line.spans[0].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(line.spans[1].content, " GPT-4 Turbo");
    }

    #[test]
    fn test_parse_markdown_unclosed_is_literal() {
        let line = parse_markdown_line("2 ** 3");
        assert_eq!(line.spans.len(), 1);
        assert_eq!(line.spans[0].content, "2 ** 3");
    }

    #[test]
    fn test_popup_area_is_centered() {
        let popup = popup_area(Rect::new(0, 0, 100, 40), 40, 10);
        assert_eq!(popup, Rect::new(30, 15, 40, 10));
    }

    #[tokio::test]
    async fn test_render_shows_sidebar_and_chat() {
        let mut app = test_app(2, 7);
        let screen = draw(&mut app);
        assert!(screen.contains("Customization"));
        assert!(screen.contains("Weekly usage"));
        assert!(screen.contains("2/7 this week"));
        assert!(screen.contains("Ask anything"));
        assert!(app.chat_area.is_some());
    }

    #[tokio::test]
    async fn test_render_limit_screen_when_exhausted() {
        let mut app = test_app(7, 7);
        let screen = draw(&mut app);
        assert!(screen.contains("Weekly limit reached"));
        assert!(screen.contains("You've used all 7 messages"));
        assert!(app.chat_area.is_none());
    }

    #[tokio::test]
    async fn test_render_bold_only_for_assistant() {
        let mut app = test_app(0, 7);
        let now = chrono::Utc::now();
        let user = ego_core::ChatMessage::user("keep **stars** here", None, now);
        let reply = ego_core::ChatMessage::reply_to(&user, "**Model:** GPT-4 Turbo", now);
        app.session().with(|store| {
            store.add_message(user).unwrap();
            store.add_message(reply).unwrap();
        });

        let screen = draw(&mut app);
        assert!(screen.contains("keep **stars** here"));
        assert!(screen.contains("Model: GPT-4 Turbo"));
        assert!(!screen.contains("**Model:**"));
    }

    #[tokio::test]
    async fn test_render_model_picker_popup() {
        let mut app = test_app(0, 7);
        app.open_model_picker();
        let screen = draw(&mut app);
        assert!(screen.contains("Select Model"));
        assert!(screen.contains("Claude 3 Opus"));
        // gpt-4 has used 3 of 7 premium messages
        assert!(screen.contains("3/7 (43%)"));
    }
}
