//! Plotters-powered chart widget for Ratatui.
//!
//! The widget knows nothing about calibrations: it draws a list of layers in
//! order, each either a polyline or a cloud of dots. Tick labels are drawn by
//! the caller around the chart area, so the mesh here is axes only.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{buffer::Buffer, layout::Rect, style::Style, widgets::Widget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Line,
    /// One `Pixel` per point; the backend mis-scales `Circle` radii.
    Dots,
}

#[derive(Debug, Clone, Copy)]
pub struct Layer<'a> {
    pub kind: LayerKind,
    pub points: &'a [(f64, f64)],
    pub color: RGBColor,
}

impl<'a> Layer<'a> {
    pub fn line(points: &'a [(f64, f64)], color: RGBColor) -> Self {
        Self {
            kind: LayerKind::Line,
            points,
            color,
        }
    }

    pub fn dots(points: &'a [(f64, f64)], color: RGBColor) -> Self {
        Self {
            kind: LayerKind::Dots,
            points,
            color,
        }
    }
}

pub struct LayeredChart<'a> {
    /// Drawn first to last; later layers cover earlier ones.
    pub layers: &'a [Layer<'a>],
    pub x_range: [f64; 2],
    pub y_range: [f64; 2],
}

impl LayeredChart<'_> {
    fn ranges_valid(&self) -> bool {
        let [x0, x1] = self.x_range;
        let [y0, y1] = self.y_range;
        [x0, x1, y0, y1].iter().all(|v| v.is_finite()) && x0 < x1 && y0 < y1
    }
}

impl Widget for LayeredChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < 20 || area.height < 8 {
            buf.set_string(area.x, area.y, "Resize the terminal to see the chart.", Style::default());
            return;
        }
        if !self.ranges_valid() {
            return;
        }

        let [x0, x1] = self.x_range;
        let [y0, y1] = self.y_range;
        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root).margin(1).build_cartesian_2d(x0..x1, y0..y1)?;
            chart
                .configure_mesh()
                .disable_mesh()
                .x_labels(0)
                .y_labels(0)
                .axis_style(&WHITE)
                .draw()?;

            for layer in self.layers {
                match layer.kind {
                    LayerKind::Line => {
                        chart.draw_series(LineSeries::new(layer.points.iter().copied(), &layer.color))?;
                    }
                    LayerKind::Dots => {
                        chart.draw_series(layer.points.iter().map(|&p| Pixel::new(p, layer.color)))?;
                    }
                }
            }
            Ok(())
        });

        widget.render(area, buf);
    }
}
