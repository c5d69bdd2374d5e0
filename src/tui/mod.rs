//! Ratatui-based terminal UI.
//!
//! `TerminalSurface` lets the operator pick the linear intensity range of each
//! column. One tab per column shows the recorded intensities against the
//! linear response on log axes, with the pending bounds drawn as horizontal
//! lines. Nothing is refitted until the bounds are applied.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use plotters::style::RGBColor;
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs},
};
use tracing::info;

use crate::correction::{FitComputed, InteractiveSurface, SessionHandle};
use crate::domain::{Bounds, ColumnMap};
use crate::error::CorrectionError;

mod plotters_chart;

use plotters_chart::{Layer, LayeredChart};

/// Relative step of one bound adjustment.
const STEP: f64 = 0.05;

const YELLOW: RGBColor = RGBColor(255, 255, 0);
const CYAN: RGBColor = RGBColor(0, 255, 255);
const GREEN: RGBColor = RGBColor(0, 255, 0);
const WHITE: RGBColor = RGBColor(255, 255, 255);

/// Full-screen bounds editor.
#[derive(Debug, Default)]
pub struct TerminalSurface;

impl InteractiveSurface for TerminalSurface {
    fn run(
        &mut self,
        columns: &ColumnMap,
        initial: Vec<FitComputed>,
        session: &mut dyn SessionHandle,
    ) -> Result<(), CorrectionError> {
        let _guard = TerminalGuard::new()?;

        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)
            .map_err(|e| CorrectionError::Surface(format!("Failed to initialize terminal: {e}")))?;

        let mut app = App::new(columns, initial);
        app.event_loop(&mut terminal, session)
    }
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, CorrectionError> {
        enable_raw_mode().map_err(|e| CorrectionError::Surface(format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(CorrectionError::Surface(format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

struct ColumnTab {
    column_id: String,
    nickname: String,
    fit: FitComputed,
    /// Bounds being edited; applied with Enter.
    draft: Bounds,
}

struct App {
    tabs: Vec<ColumnTab>,
    selected: usize,
    status: String,
}

impl App {
    fn new(columns: &ColumnMap, initial: Vec<FitComputed>) -> Self {
        let tabs = initial
            .into_iter()
            .map(|fit| ColumnTab {
                nickname: columns
                    .get(&fit.column_id)
                    .map(|c| c.nickname.clone())
                    .unwrap_or_else(|| fit.column_id.clone()),
                column_id: fit.column_id.clone(),
                draft: fit.bounds,
                fit,
            })
            .collect();

        Self {
            tabs,
            selected: 0,
            status: "Adjust the bounds, Enter to refit, s to save.".to_string(),
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        session: &mut dyn SessionHandle,
    ) -> Result<(), CorrectionError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| CorrectionError::Surface(format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| CorrectionError::Surface(format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| CorrectionError::Surface(format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code, session)? {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, code: KeyCode, session: &mut dyn SessionHandle) -> Result<bool, CorrectionError> {
        if self.tabs.is_empty() {
            return Ok(matches!(code, KeyCode::Char('q') | KeyCode::Esc));
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Right | KeyCode::Tab => {
                self.selected = (self.selected + 1) % self.tabs.len();
            }
            KeyCode::Left | KeyCode::BackTab => {
                self.selected = (self.selected + self.tabs.len() - 1) % self.tabs.len();
            }
            KeyCode::Up => self.edit_draft(|b| (nudge(b.lb(), true), nudge(b.ub(), true))),
            KeyCode::Down => self.edit_draft(|b| (nudge(b.lb(), false), nudge(b.ub(), false))),
            KeyCode::Char('[') => self.edit_draft(|b| (nudge(b.lb(), false), b.ub())),
            KeyCode::Char(']') => self.edit_draft(|b| (nudge(b.lb(), true), b.ub())),
            KeyCode::Char('-') => self.edit_draft(|b| (b.lb(), nudge(b.ub(), false))),
            KeyCode::Char('+') | KeyCode::Char('=') => self.edit_draft(|b| (b.lb(), nudge(b.ub(), true))),
            KeyCode::Char('r') => {
                let tab = &mut self.tabs[self.selected];
                tab.draft = tab.fit.bounds;
                self.status = "Bounds reset.".to_string();
            }
            KeyCode::Enter => self.apply(session)?,
            KeyCode::Char('a') => {
                let tab = &mut self.tabs[self.selected];
                let fit = session.estimate(&tab.column_id)?;
                tab.draft = fit.bounds;
                tab.fit = fit;
                self.status = format!("{}: bounds estimated.", tab.nickname);
            }
            KeyCode::Char('s') => {
                let path = session.commit()?;
                info!(path = %path.display(), "report saved");
                self.status = format!("Saved {}", path.display());
            }
            _ => {}
        }

        Ok(false)
    }

    fn edit_draft(&mut self, edit: impl FnOnce(&Bounds) -> (f64, f64)) {
        let tab = &mut self.tabs[self.selected];
        let (lb, ub) = edit(&tab.draft);
        match Bounds::new(lb, ub) {
            Ok(bounds) => tab.draft = bounds,
            Err(err) => self.status = format!("Rejected: {err}"),
        }
    }

    fn apply(&mut self, session: &mut dyn SessionHandle) -> Result<(), CorrectionError> {
        let tab = &mut self.tabs[self.selected];
        if !covers_points(&tab.fit, &tab.draft) {
            self.status = format!(
                "No calibration points in [{:.4}, {:.4}]; widen the bounds.",
                tab.draft.lb(),
                tab.draft.ub()
            );
            return Ok(());
        }

        let fit = session.fit(&tab.column_id, Some(tab.draft))?;
        tab.draft = fit.bounds;
        tab.fit = fit;
        self.status = format!("{}: refitted.", tab.nickname);
        Ok(())
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(0)])
            .split(inner);

        let titles: Vec<Line> = self.tabs.iter().map(|t| Line::from(t.nickname.clone())).collect();
        let tabs = Tabs::new(titles)
            .select(self.selected)
            .style(Style::default().fg(Color::Gray))
            .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
        frame.render_widget(tabs, rows[0]);

        let Some(tab) = self.tabs.get(self.selected) else {
            return;
        };
        let pending = tab.draft != tab.fit.bounds;
        let mut lines = vec![Line::from(Span::styled(
            format!(
                "column {} | fitted [{:.4}, {:.4}] | n={}",
                tab.column_id,
                tab.fit.bounds.lb(),
                tab.fit.bounds.ub(),
                tab.fit.comparison.len(),
            ),
            Style::default().fg(Color::Gray),
        ))];
        if pending {
            lines.push(Line::from(Span::styled(
                format!("pending [{:.4}, {:.4}] (Enter to apply)", tab.draft.lb(), tab.draft.ub()),
                Style::default().fg(Color::Yellow),
            )));
        }
        frame.render_widget(Paragraph::new(Text::from(lines)), rows[1].union(rows[2]));
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
            .split(area);

        self.draw_chart(frame, chunks[0]);
        self.draw_table(frame, chunks[1]);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("Calibration").borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(tab) = self.tabs.get(self.selected) else {
            let msg = Paragraph::new("No columns to correct.")
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default());
            frame.render_widget(msg, inner);
            return;
        };

        let series = chart_series(&tab.fit, &tab.draft);
        let layout = chart_layout(inner);
        let [x0, x1] = series.x_bounds;
        let band: Vec<[(f64, f64); 2]> = series
            .bounds
            .iter()
            .filter(|level| level.is_finite())
            .map(|&level| [(x0, level), (x1, level)])
            .collect();

        let mut layers: Vec<Layer<'_>> = band.iter().map(|line| Layer::line(line, YELLOW)).collect();
        layers.push(Layer::line(&series.expected, CYAN));
        layers.push(Layer::dots(&series.recorded, WHITE));
        layers.push(Layer::dots(&series.linearized, GREEN));

        let widget = LayeredChart {
            layers: &layers,
            x_range: series.x_bounds,
            y_range: series.y_bounds,
        };

        match layout {
            Some(layout) => {
                frame.render_widget(widget, layout.plot);
                draw_axis_ticks(frame, layout, series.x_bounds, series.y_bounds);
            }
            None => frame.render_widget(widget, inner),
        }
    }

    fn draw_table(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("Recorded vs linear").borders(Borders::ALL);
        let Some(tab) = self.tabs.get(self.selected) else {
            frame.render_widget(block, area);
            return;
        };

        let header = Row::new(["probe", "c", "I", "k·c", "corr"])
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
        let rows = tab.fit.comparison.iter().map(|row| {
            let style = if tab.draft.contains(row.intensity) {
                Style::default()
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Row::new([
                Cell::from(row.probe.clone()),
                Cell::from(format!("{:.4}", row.concentration)),
                Cell::from(format!("{:.3}", row.intensity)),
                Cell::from(format!("{:.3}", row.intensity_true)),
                Cell::from(format!("{:.3}", row.intensity_linearized)),
            ])
            .style(style)
        });

        let table = Table::new(
            rows,
            [
                Constraint::Min(8),
                Constraint::Length(8),
                Constraint::Length(9),
                Constraint::Length(9),
                Constraint::Length(9),
            ],
        )
        .header(header)
        .block(block);
        frame.render_widget(table, area);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "←/→ column  ↑/↓ shift  [/] lower  -/+ upper  Enter fit  a estimate  r reset  s save  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

/// Move `value` by one relative step, keeping a small absolute step near zero.
fn nudge(value: f64, up: bool) -> f64 {
    let step = (value.abs() * STEP).max(1e-9);
    if up { value + step } else { value - step }
}

/// Whether `bounds` keep at least one point the regression can use.
fn covers_points(fit: &FitComputed, bounds: &Bounds) -> bool {
    fit.comparison
        .iter()
        .any(|r| r.concentration > 0.0 && r.intensity > 0.0 && bounds.contains(r.intensity))
}

/// Chart data in log10 space; non-positive values cannot be drawn and are dropped.
#[derive(Debug, Clone, PartialEq)]
struct ChartSeries {
    expected: Vec<(f64, f64)>,
    recorded: Vec<(f64, f64)>,
    linearized: Vec<(f64, f64)>,
    bounds: [f64; 2],
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
}

fn log_point(x: f64, y: f64) -> Option<(f64, f64)> {
    (x > 0.0 && y > 0.0 && x.is_finite() && y.is_finite()).then(|| (x.log10(), y.log10()))
}

fn log_level(value: f64) -> f64 {
    if value > 0.0 { value.log10() } else { f64::NAN }
}

fn chart_series(fit: &FitComputed, draft: &Bounds) -> ChartSeries {
    let rows = &fit.comparison;
    let recorded: Vec<_> = rows.iter().filter_map(|r| log_point(r.concentration, r.intensity)).collect();
    let linearized: Vec<_> = rows
        .iter()
        .filter_map(|r| log_point(r.concentration, r.intensity_linearized))
        .collect();
    let expected: Vec<_> = rows
        .iter()
        .filter_map(|r| log_point(r.concentration, r.intensity_true))
        .collect();
    let bounds = [log_level(draft.lb()), log_level(draft.ub())];

    let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(x, y) in recorded.iter().chain(&linearized).chain(&expected) {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }
    for level in bounds.into_iter().filter(|v| v.is_finite()) {
        y_min = y_min.min(level);
        y_max = y_max.max(level);
    }

    ChartSeries {
        expected,
        recorded,
        linearized,
        bounds,
        x_bounds: padded(x_min, x_max),
        y_bounds: padded(y_min, y_max),
    }
}

fn padded(min: f64, max: f64) -> [f64; 2] {
    if !min.is_finite() || !max.is_finite() {
        return [0.0, 1.0];
    }
    let pad = ((max - min).abs() * 0.05).max(0.05);
    [min - pad, max + pad]
}

/// Tick label for a log10 axis value.
fn fmt_log_axis(v: f64) -> String {
    let value = 10f64.powf(v);
    if (0.01..1000.0).contains(&value) {
        format!("{value:.2}")
    } else {
        format!("{value:.0e}")
    }
}

/// Chart area plus the gutters its tick labels are printed into.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ChartFrame {
    plot: Rect,
    /// Left of `plot`, same rows.
    y_gutter: Rect,
    /// Below `plot`: tick row, then the axis title row.
    x_gutter: Rect,
}

const Y_GUTTER: u16 = 8;
const X_GUTTER: u16 = 2;

/// Split `inner` into the plot and its gutters; `None` when too small for labels.
fn chart_layout(inner: Rect) -> Option<ChartFrame> {
    if inner.width < Y_GUTTER + 20 || inner.height < X_GUTTER + 8 {
        return None;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(X_GUTTER)])
        .split(inner);
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(Y_GUTTER), Constraint::Min(0)])
        .split(rows[0]);

    Some(ChartFrame {
        plot: cols[1],
        y_gutter: cols[0],
        x_gutter: Rect {
            x: cols[1].x,
            width: cols[1].width,
            ..rows[1]
        },
    })
}

/// Evenly spaced `(offset, value)` ticks over `span` cells.
fn ticks(range: [f64; 2], span: u16, count: usize) -> impl Iterator<Item = (u16, f64)> {
    let last = span.saturating_sub(1) as f64;
    (0..count).map(move |i| {
        let u = i as f64 / (count - 1) as f64;
        ((last * u).round() as u16, range[0] + u * (range[1] - range[0]))
    })
}

fn draw_axis_ticks(frame: &mut ratatui::Frame<'_>, layout: ChartFrame, x_range: [f64; 2], y_range: [f64; 2]) {
    let style = Style::default().fg(Color::Gray);
    let buf = frame.buffer_mut();

    let ChartFrame { plot, y_gutter, x_gutter } = layout;
    for (offset, value) in ticks(x_range, plot.width, 4) {
        let label = fmt_log_axis(value);
        let half = (label.len() / 2) as u16;
        let x = (x_gutter.x + offset).saturating_sub(half);
        buf.set_stringn(x, x_gutter.y, &label, (x_gutter.right() - x) as usize, style);
    }
    for (offset, value) in ticks(y_range, plot.height, 4) {
        let label = fmt_log_axis(value);
        let y = plot.bottom() - 1 - offset;
        let x = (y_gutter.right() - 1).saturating_sub(label.len() as u16).max(y_gutter.x);
        buf.set_stringn(x, y, &label, (y_gutter.right() - 1 - x) as usize, style);
    }

    frame.render_widget(
        Paragraph::new("concentration").alignment(Alignment::Center).style(style),
        Rect {
            y: x_gutter.y + 1,
            height: 1,
            ..x_gutter
        },
    );
    frame.render_widget(
        Paragraph::new("I").style(style.add_modifier(Modifier::BOLD)),
        Rect { height: 1, ..y_gutter },
    );
}
