//! Log-log scatter chart of a [`Summary`], written as a standalone SVG
//! document.
//!
//! Rendering is split in two steps: [`chart`] checks the summary and extracts
//! the series to draw, and [`Chart::to_svg`] lays them out. Both are pure, so
//! the same summary always produces the same document.

use std::{collections::BTreeMap, fmt::Write};

use anyhow::Result;

use crate::{error::RenderError, stats::Program, stats::Summary};

const MARGIN_LEFT: f64 = 90.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 70.0;
const MARKER_SIZE: f64 = 4.0;
const TICK_LENGTH: f64 = 6.0;
const MINOR_TICK_LENGTH: f64 = 3.0;

/// Point shape of a series.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Marker {
  Circle,
  Square,
  Triangle,
}

/// Fixed visual encoding of each program.
fn encoding(program: Program) -> (Marker, &'static str) {
  match program {
    Program::Cpu => (Marker::Circle, "#0000ff"),
    Program::OpenCl => (Marker::Square, "#ff0000"),
    Program::AesNi => (Marker::Triangle, "#008000"),
  }
}

/// Labels and dimensions of a chart.
#[derive(Clone, Debug, PartialEq)]
pub struct ChartStyle {
  pub title: String,
  pub x_label: String,
  pub y_label: String,
  /// Legend entry per program. Programs without one use their id.
  pub legend: BTreeMap<Program, String>,
  pub width: u32,
  pub height: u32,
}

impl ChartStyle {
  /// The published AES-128 comparison, averaged over `trials` executions.
  pub fn reference(trials: usize) -> Self {
    Self {
      title: "Runtime Comparison for AES-128 Encryption Implementations".to_string(),
      x_label: "File Size (bytes)".to_string(),
      y_label: format!("Average time to encrypt across {trials} executions (msec)"),
      legend: BTreeMap::from([
        (Program::Cpu, "Plain C".to_string()),
        (Program::OpenCl, "OpenCL/GPU".to_string()),
        (Program::AesNi, "AES-NI".to_string()),
      ]),
      width: 800,
      height: 600,
    }
  }

  fn legend(&self, program: Program) -> String {
    self
      .legend
      .get(&program)
      .cloned()
      .unwrap_or_else(|| program.id().to_string())
  }
}

/// One plotted program: `(size in bytes, average msec)` in size order.
#[derive(Clone, Debug, PartialEq)]
pub struct Series {
  pub program: Program,
  pub legend: String,
  pub marker: Marker,
  pub color: &'static str,
  pub points: Vec<(u64, f64)>,
}

/// Everything drawn on the chart.
#[derive(Clone, Debug, PartialEq)]
pub struct Chart {
  pub title: String,
  pub x_label: String,
  pub y_label: String,
  pub width: u32,
  pub height: u32,
  pub series: Vec<Series>,
}

/// Checks that every series is drawable on the same log-log axes and extracts
/// them. The first program's sizes are the shared x axis; any other program
/// with different sizes is rejected rather than realigned.
pub fn chart(summary: &Summary, style: &ChartStyle) -> Result<Chart, RenderError> {
  let mut programs = summary.iter();
  let (reference, reference_sizes) = programs.next().ok_or(RenderError::Empty)?;

  if reference_sizes.is_empty() {
    return Err(RenderError::EmptySeries(reference));
  }

  for (program, sizes) in programs {
    if sizes.len() != reference_sizes.len() {
      return Err(RenderError::LengthMismatch {
        program,
        len: sizes.len(),
        reference,
        expected: reference_sizes.len(),
      });
    }

    let mut pairs = sizes.keys().zip(reference_sizes.keys());
    if let Some((size, expected)) = pairs.find(|(size, expected)| size != expected) {
      return Err(RenderError::SizeMismatch {
        program,
        size: *size,
        reference,
        expected: *expected,
      });
    }
  }

  let mut series = Vec::new();

  for (program, sizes) in summary.iter() {
    if sizes.contains_key(&0) {
      return Err(RenderError::NonPositiveSize { program, size: 0 });
    }

    if let Some((size, latency)) = sizes.iter().find(|(_, latency)| !(latency.is_finite() && **latency > 0.0)) {
      return Err(RenderError::NonPositiveLatency {
        program,
        size: *size,
        latency: *latency,
      });
    }

    let (marker, color) = encoding(program);

    series.push(Series {
      program,
      legend: style.legend(program),
      marker,
      color,
      points: sizes.iter().map(|(size, latency)| (*size, *latency)).collect(),
    });
  }

  Ok(Chart {
    title: style.title.clone(),
    x_label: style.x_label.clone(),
    y_label: style.y_label.clone(),
    width: style.width,
    height: style.height,
    series,
  })
}

/// Checks `summary` and renders it as an SVG document.
pub fn render(summary: &Summary, style: &ChartStyle) -> Result<String> {
  chart(summary, style)?.to_svg()
}

/// Whole decades `10^lo ..= 10^hi` covering a set of positive values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Decades {
  lo: i32,
  hi: i32,
}

impl Decades {
  fn covering<I: IntoIterator<Item = f64>>(values: I) -> Self {
    let (min, max) = values
      .into_iter()
      .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| (min.min(v), max.max(v)));

    let lo = min.log10().floor() as i32;
    let hi = (max.log10().ceil() as i32).max(lo + 1);

    Self { lo, hi }
  }

  /// Position of `value` along the axis, 0 at `10^lo` and 1 at `10^hi`.
  fn fraction(&self, value: f64) -> f64 {
    (value.log10() - f64::from(self.lo)) / f64::from(self.hi - self.lo)
  }
}

/// Plot area in pixels plus the decades mapped onto it.
struct Frame {
  left: f64,
  right: f64,
  top: f64,
  bottom: f64,
  x: Decades,
  y: Decades,
}

impl Frame {
  fn px(&self, x: f64, y: f64) -> (f64, f64) {
    (
      self.left + self.x.fraction(x) * (self.right - self.left),
      self.bottom - self.y.fraction(y) * (self.bottom - self.top),
    )
  }
}

impl Chart {
  pub fn to_svg(&self) -> Result<String> {
    let (width, height) = (f64::from(self.width), f64::from(self.height));

    let frame = Frame {
      left: MARGIN_LEFT,
      right: width - MARGIN_RIGHT,
      top: MARGIN_TOP,
      bottom: height - MARGIN_BOTTOM,
      x: Decades::covering(self.points().map(|(size, _)| size as f64)),
      y: Decades::covering(self.points().map(|(_, ms)| ms)),
    };

    let mut svg = String::new();
    writeln!(svg, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
    writeln!(
      svg,
      "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{}\" viewBox=\"0 0 {} {}\">",
      self.width, self.height, self.width, self.height
    )?;
    writeln!(svg, "  <style>")?;
    writeln!(svg, "    text {{ font-family: sans-serif; font-size: 12px; }}")?;
    writeln!(svg, "    .title {{ font-size: 16px; font-weight: bold; }}")?;
    writeln!(svg, "    .grid {{ stroke: #dddddd; stroke-width: 0.5; }}")?;
    writeln!(svg, "    .axis {{ stroke: #000000; stroke-width: 1; fill: none; }}")?;
    writeln!(svg, "  </style>")?;
    writeln!(svg, "  <rect width=\"100%\" height=\"100%\" fill=\"#ffffff\"/>")?;
    writeln!(
      svg,
      "  <text class=\"title\" x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\">{}</text>",
      (frame.left + frame.right) / 2.0,
      frame.top / 2.0 + 6.0,
      escape(&self.title)
    )?;

    write_x_axis(&mut svg, &frame, &self.x_label)?;
    write_y_axis(&mut svg, &frame, &self.y_label)?;

    writeln!(
      svg,
      "  <rect class=\"axis\" x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\"/>",
      frame.left,
      frame.top,
      frame.right - frame.left,
      frame.bottom - frame.top
    )?;

    for series in &self.series {
      writeln!(svg, "  <g class=\"series\" data-program=\"{}\" fill=\"{}\">", series.program, series.color)?;
      for (size, ms) in &series.points {
        let (x, y) = frame.px(*size as f64, *ms);
        write_marker(&mut svg, series.marker, x, y)?;
      }
      writeln!(svg, "  </g>")?;
    }

    write_legend(&mut svg, &frame, &self.series)?;

    writeln!(svg, "</svg>")?;

    Ok(svg)
  }

  fn points(&self) -> impl Iterator<Item = (u64, f64)> + '_ {
    self.series.iter().flat_map(|series| series.points.iter().copied())
  }
}

fn write_x_axis(svg: &mut String, frame: &Frame, label: &str) -> Result<()> {
  for exp in frame.x.lo..=frame.x.hi {
    let (x, _) = frame.px(10_f64.powi(exp), 10_f64.powi(frame.y.lo));

    writeln!(
      svg,
      "  <line class=\"grid\" x1=\"{x:.2}\" y1=\"{:.2}\" x2=\"{x:.2}\" y2=\"{:.2}\"/>",
      frame.top, frame.bottom
    )?;
    writeln!(
      svg,
      "  <line class=\"axis\" x1=\"{x:.2}\" y1=\"{:.2}\" x2=\"{x:.2}\" y2=\"{:.2}\"/>",
      frame.bottom,
      frame.bottom + TICK_LENGTH
    )?;
    writeln!(
      svg,
      "  <text x=\"{x:.2}\" y=\"{:.2}\" text-anchor=\"middle\">{}</text>",
      frame.bottom + TICK_LENGTH + 16.0,
      power_of_ten(exp)
    )?;

    if exp < frame.x.hi {
      for m in 2..10 {
        let (x, _) = frame.px(f64::from(m) * 10_f64.powi(exp), 10_f64.powi(frame.y.lo));
        writeln!(
          svg,
          "  <line class=\"axis\" x1=\"{x:.2}\" y1=\"{:.2}\" x2=\"{x:.2}\" y2=\"{:.2}\"/>",
          frame.bottom,
          frame.bottom + MINOR_TICK_LENGTH
        )?;
      }
    }
  }

  writeln!(
    svg,
    "  <text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\">{}</text>",
    (frame.left + frame.right) / 2.0,
    frame.bottom + MARGIN_BOTTOM - 16.0,
    escape(label)
  )?;

  Ok(())
}

fn write_y_axis(svg: &mut String, frame: &Frame, label: &str) -> Result<()> {
  for exp in frame.y.lo..=frame.y.hi {
    let (_, y) = frame.px(10_f64.powi(frame.x.lo), 10_f64.powi(exp));

    writeln!(
      svg,
      "  <line class=\"grid\" x1=\"{:.2}\" y1=\"{y:.2}\" x2=\"{:.2}\" y2=\"{y:.2}\"/>",
      frame.left, frame.right
    )?;
    writeln!(
      svg,
      "  <line class=\"axis\" x1=\"{:.2}\" y1=\"{y:.2}\" x2=\"{:.2}\" y2=\"{y:.2}\"/>",
      frame.left - TICK_LENGTH,
      frame.left
    )?;
    writeln!(
      svg,
      "  <text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"end\">{}</text>",
      frame.left - TICK_LENGTH - 4.0,
      y + 4.0,
      power_of_ten(exp)
    )?;

    if exp < frame.y.hi {
      for m in 2..10 {
        let (_, y) = frame.px(10_f64.powi(frame.x.lo), f64::from(m) * 10_f64.powi(exp));
        writeln!(
          svg,
          "  <line class=\"axis\" x1=\"{:.2}\" y1=\"{y:.2}\" x2=\"{:.2}\" y2=\"{y:.2}\"/>",
          frame.left - MINOR_TICK_LENGTH,
          frame.left
        )?;
      }
    }
  }

  let (x, y) = (20.0, (frame.top + frame.bottom) / 2.0);
  writeln!(
    svg,
    "  <text x=\"{x:.2}\" y=\"{y:.2}\" text-anchor=\"middle\" transform=\"rotate(-90 {x:.2} {y:.2})\">{}</text>",
    escape(label)
  )?;

  Ok(())
}

fn write_marker(svg: &mut String, marker: Marker, x: f64, y: f64) -> Result<()> {
  let r = MARKER_SIZE;

  match marker {
    Marker::Circle => writeln!(svg, "    <circle cx=\"{x:.2}\" cy=\"{y:.2}\" r=\"{r:.2}\"/>")?,
    Marker::Square => writeln!(
      svg,
      "    <rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\"/>",
      x - r,
      y - r,
      2.0 * r,
      2.0 * r
    )?,
    Marker::Triangle => writeln!(
      svg,
      "    <polygon points=\"{:.2},{:.2} {:.2},{:.2} {:.2},{:.2}\"/>",
      x,
      y - r,
      x - r,
      y + r,
      x + r,
      y + r
    )?,
  }

  Ok(())
}

fn write_legend(svg: &mut String, frame: &Frame, series: &[Series]) -> Result<()> {
  let longest = series.iter().map(|s| s.legend.chars().count()).max().unwrap_or(0);
  let width = 12.0 + 7.0 * longest as f64 + 30.0;
  let height = 8.0 + 18.0 * series.len() as f64;
  let (left, top) = (frame.left + 10.0, frame.top + 10.0);

  writeln!(
    svg,
    "  <rect x=\"{left:.2}\" y=\"{top:.2}\" width=\"{width:.2}\" height=\"{height:.2}\" \
     fill=\"#ffffff\" stroke=\"#cccccc\"/>"
  )?;

  for (i, series) in series.iter().enumerate() {
    let y = top + 13.0 + 18.0 * i as f64;

    writeln!(svg, "  <g fill=\"{}\">", series.color)?;
    write_marker(svg, series.marker, left + 14.0, y)?;
    writeln!(svg, "  </g>")?;
    writeln!(
      svg,
      "  <text x=\"{:.2}\" y=\"{:.2}\">{}</text>",
      left + 28.0,
      y + 4.0,
      escape(&series.legend)
    )?;
  }

  Ok(())
}

fn power_of_ten(exp: i32) -> String {
  format!("10<tspan dy=\"-6\" font-size=\"9\">{exp}</tspan>")
}

fn escape(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len());

  for c in text.chars() {
    match c {
      '&' => escaped.push_str("&amp;"),
      '<' => escaped.push_str("&lt;"),
      '>' => escaped.push_str("&gt;"),
      '"' => escaped.push_str("&quot;"),
      c => escaped.push(c),
    }
  }

  escaped
}

#[cfg(test)]
mod tests {
  use super::*;

  fn summary(table: Vec<(Program, Vec<(u64, f64)>)>) -> Summary {
    Summary::from(
      table
        .into_iter()
        .map(|(program, points)| (program, points.into_iter().collect()))
        .collect::<BTreeMap<_, _>>(),
    )
  }

  fn aligned() -> Summary {
    summary(vec![
      (Program::Cpu, vec![(1024, 437.43), (2048, 2.04), (1 << 31, 29644.36)]),
      (Program::OpenCl, vec![(1024, 302.29), (2048, 16.76), (1 << 31, 3001.35)]),
      (Program::AesNi, vec![(1024, 5.54), (2048, 4.01), (1 << 31, 4422.75)]),
    ])
  }

  #[test]
  fn series_follow_shared_size_order() {
    let chart = chart(&aligned(), &ChartStyle::reference(10)).unwrap();

    let legends: Vec<_> = chart.series.iter().map(|s| s.legend.as_str()).collect();
    assert_eq!(legends, ["Plain C", "OpenCL/GPU", "AES-NI"]);

    for series in &chart.series {
      let sizes: Vec<_> = series.points.iter().map(|(size, _)| *size).collect();
      assert_eq!(sizes, [1024, 2048, 1 << 31]);
    }

    assert_eq!(chart.series[2].points[0], (1024, 5.54));
    assert_eq!(chart.y_label, "Average time to encrypt across 10 executions (msec)");
  }

  #[test]
  fn rendering_is_deterministic() {
    let style = ChartStyle::reference(10);

    assert_eq!(chart(&aligned(), &style), chart(&aligned(), &style));
    assert_eq!(render(&aligned(), &style).unwrap(), render(&aligned(), &style).unwrap());
  }

  #[test]
  fn missing_size_is_rejected() {
    let summary = summary(vec![(Program::Cpu, vec![(1024, 1.0), (2048, 2.0)]), (Program::OpenCl, vec![(1024, 1.0)])]);

    assert_eq!(
      chart(&summary, &ChartStyle::reference(10)),
      Err(RenderError::LengthMismatch {
        program: Program::OpenCl,
        len: 1,
        reference: Program::Cpu,
        expected: 2,
      })
    );
  }

  #[test]
  fn different_sizes_are_rejected() {
    let summary = summary(vec![
      (Program::Cpu, vec![(1024, 1.0), (2048, 2.0)]),
      (Program::AesNi, vec![(1024, 1.0), (4096, 2.0)]),
    ]);

    assert_eq!(
      chart(&summary, &ChartStyle::reference(10)),
      Err(RenderError::SizeMismatch {
        program: Program::AesNi,
        size: 4096,
        reference: Program::Cpu,
        expected: 2048,
      })
    );
  }

  #[test]
  fn non_positive_latency_is_rejected() {
    let style = ChartStyle::reference(10);

    let zero = summary(vec![(Program::Cpu, vec![(1024, 0.0)])]);
    assert!(matches!(chart(&zero, &style), Err(RenderError::NonPositiveLatency { size: 1024, .. })));

    let nan = summary(vec![(Program::Cpu, vec![(1024, 1.0), (2048, f64::NAN)])]);
    assert!(matches!(chart(&nan, &style), Err(RenderError::NonPositiveLatency { size: 2048, .. })));
  }

  #[test]
  fn zero_size_is_rejected() {
    let style = ChartStyle::reference(10);
    let summary = summary(vec![(Program::Cpu, vec![(0, 1.0), (1024, 2.0)])]);

    assert_eq!(
      chart(&summary, &style),
      Err(RenderError::NonPositiveSize {
        program: Program::Cpu,
        size: 0
      })
    );

    let err = render(&summary, &style).unwrap_err();
    assert_eq!(err.to_string(), "program bench_cpu has non-positive size 0");
  }

  #[test]
  fn empty_summary_is_rejected() {
    let style = ChartStyle::reference(10);

    assert_eq!(chart(&summary(vec![]), &style), Err(RenderError::Empty));
    assert_eq!(chart(&summary(vec![(Program::Cpu, vec![])]), &style), Err(RenderError::EmptySeries(Program::Cpu)));
  }

  #[test]
  fn render_error_survives_anyhow() {
    let summary = summary(vec![(Program::Cpu, vec![(1024, -1.0)])]);

    let err = render(&summary, &ChartStyle::reference(10)).unwrap_err();

    assert!(err.downcast_ref::<RenderError>().is_some());
  }

  #[test]
  fn decades_cover_values() {
    assert_eq!(Decades::covering([1024.0, 2147483648.0]), Decades { lo: 3, hi: 10 });
    assert_eq!(Decades::covering([2.04, 29644.36]), Decades { lo: 0, hi: 5 });
    assert_eq!(Decades::covering([0.5, 0.7]), Decades { lo: -1, hi: 0 });
    assert_eq!(Decades::covering([100.0]), Decades { lo: 2, hi: 3 });

    let decades = Decades { lo: 3, hi: 10 };
    assert!(decades.fraction(1e3).abs() < 1e-12);
    assert!((decades.fraction(1e10) - 1.0).abs() < 1e-12);
  }

  #[test]
  fn svg_has_labels_legend_and_one_marker_per_point() {
    let svg = render(&aligned(), &ChartStyle::reference(10)).unwrap();

    assert!(svg.starts_with("<?xml"));
    assert!(svg.trim_end().ends_with("</svg>"));
    assert!(svg.contains(">Runtime Comparison for AES-128 Encryption Implementations</text>"));
    assert!(svg.contains(">File Size (bytes)</text>"));
    assert!(svg.contains(">Average time to encrypt across 10 executions (msec)</text>"));
    assert!(svg.contains(">OpenCL/GPU</text>"));

    // three points per series plus one legend swatch
    assert_eq!(svg.matches("<circle").count(), 4);
    assert_eq!(svg.matches("<polygon").count(), 4);
    assert!(svg.contains("data-program=\"bench_cl\" fill=\"#ff0000\""));
  }

  #[test]
  fn text_is_escaped() {
    let style = ChartStyle {
      title: "a < b & c".to_string(),
      ..ChartStyle::reference(1)
    };

    let svg = render(&aligned(), &style).unwrap();

    assert!(svg.contains(">a &lt; b &amp; c</text>"));
  }
}
