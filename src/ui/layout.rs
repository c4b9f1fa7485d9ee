use crate::app::{App, AppView};
use crate::settings::SettingsField;
use crate::speedtest::TestPhase;
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

// Color Palette - Elegant & Minimal
const ACCENT: Color = Color::Rgb(100, 149, 237); // Cornflower blue
const SUCCESS: Color = Color::Rgb(134, 194, 156); // Soft green
const SUCCESS_DIM: Color = Color::Rgb(80, 120, 90);
const INFO: Color = Color::Rgb(147, 180, 220); // Soft blue
const INFO_DIM: Color = Color::Rgb(90, 110, 140);
const WARN: Color = Color::Rgb(220, 180, 130); // Soft amber
const ERROR: Color = Color::Rgb(210, 130, 130); // Soft red
const TEXT_PRIMARY: Color = Color::Rgb(230, 230, 230);
const TEXT_SECONDARY: Color = Color::Rgb(160, 160, 160);
const TEXT_MUTED: Color = Color::Rgb(100, 100, 100);
const BORDER: Color = Color::Rgb(60, 60, 65);

pub fn draw_ui(frame: &mut Frame, app: &App) {
    let area = frame.area();

    match app.view {
        AppView::Main => draw_main_view(frame, area, app),
        AppView::Settings => draw_settings_view(frame, area, app),
    }
}

fn draw_main_view(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(4),
        Constraint::Min(6),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .split(area);

    draw_header(frame, chunks[0], app);
    draw_meter(frame, chunks[1], app);
    draw_history_chart(frame, chunks[2], app);
    draw_results(frame, chunks[3], app);
    draw_help(frame, chunks[4], app);
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(BORDER));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::horizontal([
        Constraint::Length(12),
        Constraint::Min(10),
        Constraint::Length(20),
    ])
    .split(inner);

    // Title
    let title = Paragraph::new("netpulse")
        .style(Style::default().fg(TEXT_PRIMARY).add_modifier(Modifier::BOLD));
    frame.render_widget(title, chunks[0]);

    // Status
    let (status, color) = match app.state.phase {
        TestPhase::Idle => match app.state.error.as_deref() {
            Some(message) => (message, ERROR),
            None => ("Ready", TEXT_MUTED),
        },
        TestPhase::Ping => ("Measuring latency...", WARN),
        TestPhase::Download => ("Testing download...", SUCCESS),
        TestPhase::Upload => ("Testing upload...", INFO),
        TestPhase::Complete => ("Complete", ACCENT),
    };

    let status_text = Paragraph::new(status)
        .style(Style::default().fg(color))
        .alignment(Alignment::Center);
    frame.render_widget(status_text, chunks[1]);

    // Phase indicator
    frame.render_widget(
        Paragraph::new(create_phase_text(app.state.phase)).alignment(Alignment::Right),
        chunks[2],
    );
}

fn create_phase_text(phase: TestPhase) -> Line<'static> {
    let phases = [
        (TestPhase::Ping, "ping"),
        (TestPhase::Download, "down"),
        (TestPhase::Upload, "up"),
    ];

    let mut spans = Vec::new();

    for (i, (p, label)) in phases.iter().enumerate() {
        let is_active = phase == *p;
        let is_complete = match phase {
            TestPhase::Download => *p == TestPhase::Ping,
            TestPhase::Upload => *p == TestPhase::Ping || *p == TestPhase::Download,
            TestPhase::Complete => true,
            _ => false,
        };

        let style = if is_active {
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
        } else if is_complete {
            Style::default().fg(TEXT_SECONDARY)
        } else {
            Style::default().fg(TEXT_MUTED)
        };

        spans.push(Span::styled(*label, style));

        if i < phases.len() - 1 {
            spans.push(Span::styled(" / ", Style::default().fg(TEXT_MUTED)));
        }
    }

    Line::from(spans)
}

// The live readout: smoothed speed for the active transfer and how far
// through the phase window it is.
fn draw_meter(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::vertical([Constraint::Length(2), Constraint::Length(1)]).split(area);

    let label = match app.state.phase {
        TestPhase::Upload => "Upload",
        TestPhase::Complete => "Done",
        _ => "Download",
    };
    let (color, dim_color) = phase_colors(app.state.phase);

    let speed_line = Line::from(vec![
        Span::styled(
            format_speed(app.state.current_mbps),
            Style::default().fg(TEXT_PRIMARY).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("  {}", label), Style::default().fg(TEXT_MUTED)),
    ]);
    frame.render_widget(
        Paragraph::new(speed_line).alignment(Alignment::Center),
        chunks[0],
    );

    draw_progress_bar(
        frame,
        chunks[1],
        app.state.progress_percent / 100.0,
        color,
        dim_color,
    );
}

fn draw_progress_bar(frame: &mut Frame, area: Rect, ratio: f64, color: Color, dim_color: Color) {
    if area.width < 4 {
        return;
    }

    let width = (area.width - 2) as usize;
    let filled = ((ratio * width as f64) as usize).min(width);
    let empty = width.saturating_sub(filled);

    let bar = Line::from(vec![
        Span::raw(" "),
        Span::styled("━".repeat(filled), Style::default().fg(color)),
        Span::styled("━".repeat(empty), Style::default().fg(dim_color)),
        Span::raw(" "),
    ]);

    frame.render_widget(Paragraph::new(bar), area);
}

fn draw_history_chart(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER))
        .title(Span::styled(" Speed ", Style::default().fg(TEXT_SECONDARY)));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let history = &app.state.history;
    if history.is_empty() || inner.width < 10 || inner.height < 3 {
        return;
    }

    let (color, _) = phase_colors(app.state.phase);
    let points: Vec<(f64, f64)> = history.iter().map(|p| (p.time_secs, p.mbps)).collect();
    let max_mbps = history.iter().map(|p| p.mbps).fold(0.0, f64::max);
    let y_max = (max_mbps * 1.1).max(1.0);
    let x_max = (app.settings.phase_duration_ms as f64 / 1000.0).max(1.0);

    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(color))
        .data(&points);

    let chart = Chart::new(vec![dataset])
        .x_axis(
            Axis::default()
                .bounds([0.0, x_max])
                .labels(vec![
                    Span::styled("0s", Style::default().fg(TEXT_MUTED)),
                    Span::styled(format!("{:.0}s", x_max), Style::default().fg(TEXT_MUTED)),
                ]),
        )
        .y_axis(
            Axis::default()
                .bounds([0.0, y_max])
                .labels(vec![
                    Span::styled("0", Style::default().fg(TEXT_MUTED)),
                    Span::styled(format!("{:.0}", y_max), Style::default().fg(TEXT_MUTED)),
                ]),
        );

    frame.render_widget(chart, inner);
}

fn draw_results(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(BORDER));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::horizontal([
        Constraint::Ratio(1, 3),
        Constraint::Ratio(1, 3),
        Constraint::Ratio(1, 3),
    ])
    .split(inner);

    let latency = match app.state.result.ping_ms {
        Some(ms) => format!("{} ms", ms),
        None => latest_ping_text(&app.state.ping_samples),
    };
    draw_result_cell(frame, chunks[0], "latency", &latency, WARN);
    draw_result_cell(
        frame,
        chunks[1],
        "download",
        &format_optional_speed(app.state.result.download_mbps),
        SUCCESS,
    );
    draw_result_cell(
        frame,
        chunks[2],
        "upload",
        &format_optional_speed(app.state.result.upload_mbps),
        INFO,
    );
}

fn latest_ping_text(samples: &[f64]) -> String {
    match samples.last() {
        Some(ms) => format!("{:.0} ms", ms),
        None => "—".to_string(),
    }
}

fn draw_result_cell(frame: &mut Frame, area: Rect, label: &str, value: &str, color: Color) {
    let chunks = Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).split(area);

    frame.render_widget(
        Paragraph::new(label)
            .style(Style::default().fg(color))
            .alignment(Alignment::Center),
        chunks[0],
    );
    frame.render_widget(
        Paragraph::new(value.to_string())
            .style(Style::default().fg(TEXT_PRIMARY).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center),
        chunks[1],
    );
}

fn draw_help(frame: &mut Frame, area: Rect, app: &App) {
    let help = match app.state.phase {
        TestPhase::Idle | TestPhase::Complete => "enter start · s settings · r reset · q quit",
        _ => "esc cancel · q quit",
    };

    frame.render_widget(
        Paragraph::new(help)
            .style(Style::default().fg(TEXT_MUTED))
            .alignment(Alignment::Center),
        area,
    );
}

// Settings view
fn draw_settings_view(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER))
        .title(Span::styled(" Settings ", Style::default().fg(ACCENT)));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(4),
        Constraint::Length(1),
    ])
    .split(inner);

    let rows = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .split(chunks[1]);

    draw_setting_row(
        frame,
        rows[0],
        "Ping attempts",
        &format!("{}", app.settings.ping_attempts),
        app.selected_setting == SettingsField::PingAttempts,
    );

    draw_setting_row(
        frame,
        rows[1],
        "Phase duration",
        &format!("{} s", app.settings.phase_duration_ms / 1000),
        app.selected_setting == SettingsField::PhaseDuration,
    );

    draw_setting_row(
        frame,
        rows[2],
        "Upload chunk",
        &format!("{} KiB", app.settings.upload_chunk_bytes / 1024),
        app.selected_setting == SettingsField::UploadChunk,
    );

    // Help
    let help = "↑↓ select · ←→ adjust · enter done";
    frame.render_widget(
        Paragraph::new(help)
            .style(Style::default().fg(TEXT_MUTED))
            .alignment(Alignment::Center),
        chunks[2],
    );
}

fn draw_setting_row(frame: &mut Frame, area: Rect, label: &str, value: &str, selected: bool) {
    let chunks = Layout::horizontal([Constraint::Length(16), Constraint::Min(10)]).split(area);

    let label_style = if selected {
        Style::default().fg(ACCENT)
    } else {
        Style::default().fg(TEXT_SECONDARY)
    };

    frame.render_widget(
        Paragraph::new(format!(" {}", label)).style(label_style),
        chunks[0],
    );

    let value_text = if selected {
        format!("< {} >", value)
    } else {
        value.to_string()
    };

    let value_style = if selected {
        Style::default().fg(TEXT_PRIMARY)
    } else {
        Style::default().fg(TEXT_MUTED)
    };

    frame.render_widget(Paragraph::new(value_text).style(value_style), chunks[1]);
}

// Helpers
fn phase_colors(phase: TestPhase) -> (Color, Color) {
    match phase {
        TestPhase::Upload => (INFO, INFO_DIM),
        _ => (SUCCESS, SUCCESS_DIM),
    }
}

fn format_optional_speed(mbps: Option<f64>) -> String {
    match mbps {
        Some(value) => format_speed(value),
        None => "—".to_string(),
    }
}

fn format_speed(mbps: f64) -> String {
    if mbps >= 1000.0 {
        format!("{:.1} Gbps", mbps / 1000.0)
    } else if mbps >= 1.0 {
        format!("{:.1} Mbps", mbps)
    } else if mbps > 0.0 {
        format!("{:.0} Kbps", mbps * 1000.0)
    } else {
        "—".to_string()
    }
}
