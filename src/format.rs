//! Line-oriented text encoding of a [`ProjectionModel`].
//!
//! ```text
//! Flex Projector Model 2
//! Scale
//! 0.8487
//! Vertical Scale
//! 0.507
//! Length
//! 1
//! ...
//! ```
//!
//! Each label sits on its own line and is followed by its values, one per line. Knot sections
//! run until the next label.
use std::fmt;
use std::io::{self, BufRead, Write};
use std::iter::Peekable;
use std::str::FromStr;

use thiserror::Error;

use crate::model::{CurveShape, LATITUDE_KNOTS, MERIDIAN_KNOTS, ProjectionModel};

/// Identifier written on the first line of every model.
pub const FORMAT_ID: &str = "Flex Projector Model 2";
/// Identifier of models whose pole-direction angle went through a second degree conversion.
pub const LEGACY_FORMAT_ID: &str = "Flex Projector Model 1";

const SCALE: &str = "Scale";
const VERTICAL_SCALE: &str = "Vertical Scale";
const LENGTH: &str = "Length";
const POLE_DIRECTION: &str = "Pole Direction";
const EQUATOR_SMOOTHNESS: &str = "Equator Smoothness";
const DISTANCE: &str = "Distance";
const BENDING: &str = "Bending";
const MERIDIANS: &str = "Meridians";

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Could not read model")]
    Io(#[from] io::Error),
    #[error("Unknown model format: {0:?}")]
    UnknownFormat(String),
    #[error("Model ended while reading {0}")]
    UnexpectedEnd(&'static str),
    #[error("Expected section {expected:?}, found {found:?}")]
    ExpectedLabel {
        expected: &'static str,
        found: String,
    },
    #[error("Invalid number in section {section:?}: {value:?}")]
    InvalidNumber {
        section: &'static str,
        value: String,
    },
    #[error("Invalid flag in section {0:?}")]
    InvalidFlag(&'static str),
    #[error("Unknown curve shape: {0:?}")]
    UnknownCurveShape(String),
    #[error("Section {section:?} has {found} knots, expected {expected}")]
    KnotCount {
        section: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Forward-only reader over the non-blank, trimmed lines of a model.
struct Tokens<I: Iterator<Item = String>> {
    lines: Peekable<I>,
}

impl<I: Iterator<Item = String>> Tokens<I> {
    fn new(lines: I) -> Self {
        Tokens {
            lines: lines.peekable(),
        }
    }

    fn next_line(&mut self, section: &'static str) -> Result<String, FormatError> {
        self.lines.next().ok_or(FormatError::UnexpectedEnd(section))
    }

    fn label(&mut self, expected: &'static str) -> Result<(), FormatError> {
        let found = self.next_line(expected)?;
        if found.eq_ignore_ascii_case(expected) {
            Ok(())
        } else {
            Err(FormatError::ExpectedLabel { expected, found })
        }
    }

    fn number(&mut self, section: &'static str) -> Result<f64, FormatError> {
        let line = self.next_line(section)?;
        parse_number(&line).ok_or(FormatError::InvalidNumber {
            section,
            value: line,
        })
    }

    fn flag(&mut self, section: &'static str) -> Result<bool, FormatError> {
        match self.next_line(section)?.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(FormatError::InvalidFlag(section)),
        }
    }

    /// Numbers up to the next non-numeric line, which must total `expected`.
    fn knots(&mut self, section: &'static str, expected: usize) -> Result<Vec<f64>, FormatError> {
        let mut knots = Vec::with_capacity(expected);
        while let Some(value) = self.lines.peek().and_then(|line| parse_number(line)) {
            knots.push(value);
            self.lines.next();
        }
        if knots.len() == expected {
            Ok(knots)
        } else {
            Err(FormatError::KnotCount {
                section,
                expected,
                found: knots.len(),
            })
        }
    }
}

fn parse_number(line: &str) -> Option<f64> {
    line.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_lines<I>(lines: I) -> Result<ProjectionModel, FormatError>
where
    I: Iterator<Item = String>,
{
    let mut tokens = Tokens::new(lines);
    let id = tokens.next_line("format identifier")?;
    let legacy = if id.eq_ignore_ascii_case(FORMAT_ID) {
        false
    } else if id.eq_ignore_ascii_case(LEGACY_FORMAT_ID) {
        true
    } else {
        return Err(FormatError::UnknownFormat(id));
    };

    tokens.label(SCALE)?;
    let scale = tokens.number(SCALE)?;
    tokens.label(VERTICAL_SCALE)?;
    let vertical_scale = tokens.number(VERTICAL_SCALE)?;
    tokens.label(LENGTH)?;
    let length = tokens.knots(LENGTH, LATITUDE_KNOTS)?;
    tokens.label(POLE_DIRECTION)?;
    let adjust_pole_direction = tokens.flag(POLE_DIRECTION)?;
    let mut pole_direction = tokens.number(POLE_DIRECTION)?;
    if legacy {
        pole_direction = pole_direction.to_radians();
    }
    tokens.label(EQUATOR_SMOOTHNESS)?;
    let smooth_equator = tokens.flag(EQUATOR_SMOOTHNESS)?;
    tokens.label(DISTANCE)?;
    let distance = tokens.knots(DISTANCE, LATITUDE_KNOTS)?;
    tokens.label(BENDING)?;
    let shape_name = tokens.next_line(BENDING)?;
    let curve_shape = CurveShape::from_str(&shape_name)
        .map_err(|_| FormatError::UnknownCurveShape(shape_name))?;
    let bend = tokens.knots(BENDING, LATITUDE_KNOTS)?;
    tokens.label(MERIDIANS)?;
    let meridians = tokens.knots(MERIDIANS, MERIDIAN_KNOTS)?;
    if let Some(extra) = tokens.lines.next() {
        return Err(FormatError::InvalidNumber {
            section: MERIDIANS,
            value: extra,
        });
    }

    let mut model = ProjectionModel::flat();
    model.set_scale(scale);
    model.set_vertical_scale(vertical_scale);
    model.set_length_knots(&length);
    model.set_distance_knots(&distance);
    model.set_bend_knots(&bend);
    model.set_meridian_knots(&meridians);
    model.set_curve_shape(curve_shape);
    model.set_pole_direction(adjust_pole_direction, pole_direction);
    model.set_smooth_equator(smooth_equator);
    Ok(model)
}

fn significant(line: &str) -> Option<String> {
    let line = line.trim();
    (!line.is_empty()).then(|| line.to_owned())
}

impl ProjectionModel {
    /// Reads a model. Nothing is returned unless the whole input is valid.
    pub fn read<R: BufRead>(reader: R) -> Result<Self, FormatError> {
        let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;
        parse_lines(lines.iter().filter_map(|line| significant(line)))
    }

    pub fn from_text(text: &str) -> Result<Self, FormatError> {
        parse_lines(text.lines().filter_map(significant))
    }

    /// Writes the model in the current format.
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        write!(writer, "{self}")
    }

    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl FromStr for ProjectionModel {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProjectionModel::from_text(s)
    }
}

impl fmt::Display for ProjectionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn knots(f: &mut fmt::Formatter<'_>, values: &[f64]) -> fmt::Result {
            values.iter().try_for_each(|v| writeln!(f, "{v}"))
        }

        writeln!(f, "{FORMAT_ID}")?;
        writeln!(f, "{SCALE}\n{}", self.scale())?;
        writeln!(f, "{VERTICAL_SCALE}\n{}", self.vertical_scale())?;
        writeln!(f, "{LENGTH}")?;
        knots(f, self.length().knots())?;
        writeln!(
            f,
            "{POLE_DIRECTION}\n{}\n{}",
            self.adjust_pole_direction(),
            self.pole_direction()
        )?;
        writeln!(f, "{EQUATOR_SMOOTHNESS}\n{}", self.smooth_equator())?;
        writeln!(f, "{DISTANCE}")?;
        knots(f, self.distance().knots())?;
        writeln!(f, "{BENDING}\n{}", self.curve_shape())?;
        knots(f, self.bend().knots())?;
        writeln!(f, "{MERIDIANS}")?;
        knots(f, self.meridians().knots())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn edited() -> ProjectionModel {
        let mut model = ProjectionModel::robinson();
        model.set_bend_knot(10, 0.3);
        model.set_meridian_knot(4, -0.25);
        model.set_curve_shape(CurveShape::Cosine);
        model.set_pole_direction(true, 30.0);
        model.set_smooth_equator(true);
        model
    }

    #[test]
    fn written_model_reads_back() {
        let model = edited();
        let text = model.to_text();
        assert!(text.starts_with("Flex Projector Model 2\nScale\n0.8487\n"));
        assert_eq!(ProjectionModel::from_text(&text).unwrap(), model);

        let mut buffer = Vec::new();
        model.write(&mut buffer).unwrap();
        assert_eq!(ProjectionModel::read(buffer.as_slice()).unwrap(), model);
    }

    #[test]
    fn whitespace_and_label_case_are_ignored() {
        let text = edited()
            .to_text()
            .replace("Vertical Scale", "  vertical scale  \n")
            .replace('\n', "\r\n");
        assert_eq!(text.parse::<ProjectionModel>().unwrap(), edited());
    }

    #[test]
    fn legacy_pole_direction_is_converted() {
        let mut text = edited().to_text().replace(FORMAT_ID, LEGACY_FORMAT_ID);
        // 30° stored after a second degree conversion
        text = text.replace(
            "Pole Direction\ntrue\n30\n",
            "Pole Direction\ntrue\n1718.8733853924698\n",
        );
        let model = ProjectionModel::from_text(&text).unwrap();
        assert_relative_eq!(model.pole_direction(), 30.0, epsilon = 1e-9);
        assert!(model.adjust_pole_direction());
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        let text = edited().to_text().replace(FORMAT_ID, "Flex Projector Model 7");
        assert!(matches!(
            ProjectionModel::from_text(&text),
            Err(FormatError::UnknownFormat(id)) if id == "Flex Projector Model 7"
        ));
    }

    #[test]
    fn short_knot_section_is_rejected() {
        let model = ProjectionModel::flat();
        let mut text = String::new();
        let mut skipped = false;
        // drop the last distance knot
        for line in model.to_text().lines() {
            if !skipped && line == "Bending" {
                let end = text.trim_end_matches('\n').rfind('\n').unwrap_or(0);
                text.truncate(end + 1);
                skipped = true;
            }
            text.push_str(line);
            text.push('\n');
        }
        assert!(matches!(
            ProjectionModel::from_text(&text),
            Err(FormatError::KnotCount {
                section: "Distance",
                expected: 19,
                found: 18
            })
        ));
    }

    #[test]
    fn malformed_sections() {
        let text = ProjectionModel::flat().to_text();
        assert!(matches!(
            ProjectionModel::from_text(&text.replace("cubic", "spiral")),
            Err(FormatError::UnknownCurveShape(name)) if name == "spiral"
        ));
        assert!(matches!(
            ProjectionModel::from_text(&text.replace("Scale\n1\n", "Scale\nbig\n")),
            Err(FormatError::InvalidNumber { section: "Scale", .. })
        ));
        let flag = text.replace("Equator Smoothness\nfalse", "Equator Smoothness\nmaybe");
        assert!(matches!(
            ProjectionModel::from_text(&flag),
            Err(FormatError::InvalidFlag("Equator Smoothness"))
        ));
        assert!(matches!(
            ProjectionModel::from_text("Flex Projector Model 2\nScale\n"),
            Err(FormatError::UnexpectedEnd("Scale"))
        ));
        assert!(matches!(
            ProjectionModel::from_text(&text.replace("Length", "Width")),
            Err(FormatError::ExpectedLabel { expected: "Length", .. })
        ));
    }

    #[test]
    fn meridian_ends_are_pinned_on_read() {
        let text = ProjectionModel::flat().to_text();
        let (head, _) = text.split_at(text.find("Meridians").unwrap());
        let mut meridians = String::from("Meridians\n0.5\n");
        for _ in 0..11 {
            meridians.push_str("0.1\n");
        }
        meridians.push_str("-0.5\n");
        let model = ProjectionModel::from_text(&format!("{head}{meridians}")).unwrap();
        assert_eq!(model.meridians().first(), 0.0);
        assert_eq!(model.meridians().last(), 0.0);
        assert_eq!(model.meridians().knot(6), 0.1);
    }
}
