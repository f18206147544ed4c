//! Plain-text record formatting (spec.md section 6, "Output format"), field-for-field compatible
//! with `print_header_decay`/`print_header_grammage`/`format_*` in
//! `examples/original_source/src/danton.c`.

use danton::record::EventRecord;
use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

const HEADER_DECAY: &str = "    Event   PID    Energy             Direction or Momentum                       Position                    Weight\n                    (GeV)                 (1 or GeV/c)                               (m)\n                                    ux or Px     uy or Py    uz or Pz        X            Y            Z\n";

const HEADER_GRAMMAGE: &str = "  cos(theta)    Grammage\n                (kg/m^2)\n";

/// A C `%E`-style scientific notation field: sign-less mantissa with `precision` digits after the
/// point, a two-digit (or wider) exponent with an explicit sign.
fn sci(value: f64, precision: usize) -> String {
    if value == 0.0 {
        return format!("{:.*}E+00", precision, 0.0);
    }
    let mut exponent = value.abs().log10().floor() as i32;
    let mut mantissa = value / 10f64.powi(exponent);
    // Rounding at `precision` digits can push the mantissa up to 10.0; renormalize.
    if format!("{mantissa:.precision$}").trim_start_matches('-').starts_with("10") {
        mantissa /= 10.0;
        exponent += 1;
    }
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa:.precision$}E{sign}{:02}", exponent.abs())
}

/// Right-justifies `text` in a field of `width` columns, as printf's `%Nc`/`%NE`/`%Nd` does.
fn pad(text: &str, width: usize) -> String {
    format!("{text:>width$}")
}

fn sci_field(value: f64, width: usize, precision: usize) -> String {
    pad(&sci(value, precision), width)
}

fn fixed_field(value: f64, width: usize, precision: usize) -> String {
    pad(&format!("{value:.precision$}"), width)
}

/// Formats one [`EventRecord`] as the one or two output lines `print_header_decay`'s columns
/// describe (a tau-pair record emits two lines, as the original two-line `format_tau` did).
#[must_use]
pub fn format_record(record: &EventRecord) -> String {
    let mut out = String::new();
    match *record {
        EventRecord::Ancestor { eventid, pid, energy, direction, position, weight } => {
            let _ = writeln!(
                out,
                "{} {} {} {} {} {} {} {} {} {}",
                pad(&eventid.to_string(), 10),
                pad(&pid.to_string(), 4),
                sci_field(energy, 12, 5),
                sci_field(direction[0], 12, 5),
                sci_field(direction[1], 12, 5),
                sci_field(direction[2], 12, 5),
                fixed_field(position[0], 12, 3),
                fixed_field(position[1], 12, 3),
                fixed_field(position[2], 12, 3),
                sci_field(weight, 12, 5),
            );
        }
        EventRecord::Neutrino { eventid, pid, energy, direction, position, weight } => {
            let _ = writeln!(
                out,
                "{} {} {} {} {} {} {} {} {} {}",
                pad(&eventid.to_string(), 10),
                pad(&pid.to_string(), 4),
                sci_field(energy, 12, 5),
                sci_field(direction[0], 12, 5),
                sci_field(direction[1], 12, 5),
                sci_field(direction[2], 12, 5),
                fixed_field(position[0], 12, 3),
                fixed_field(position[1], 12, 3),
                fixed_field(position[2], 12, 3),
                sci_field(weight, 12, 5),
            );
        }
        EventRecord::TauPair { generation, pid, production, decay } => {
            let _ = writeln!(
                out,
                "{} {} {} {} {} {} {} {} {}",
                pad(&generation.to_string(), 10),
                pad(&pid.to_string(), 4),
                sci_field(production.kinetic, 12, 5),
                sci_field(production.direction[0], 12, 5),
                sci_field(production.direction[1], 12, 5),
                sci_field(production.direction[2], 12, 5),
                fixed_field(production.position[0], 12, 3),
                fixed_field(production.position[1], 12, 3),
                fixed_field(production.position[2], 12, 3),
            );
            let _ = writeln!(
                out,
                "{} {} {} {} {} {} {} {} {}",
                pad("", 10),
                pad("", 4),
                sci_field(decay.kinetic, 12, 5),
                sci_field(decay.direction[0], 12, 5),
                sci_field(decay.direction[1], 12, 5),
                sci_field(decay.direction[2], 12, 5),
                fixed_field(decay.position[0], 12, 3),
                fixed_field(decay.position[1], 12, 3),
                fixed_field(decay.position[2], 12, 3),
            );
        }
        EventRecord::DecayProduct { pid, momentum } => {
            let _ = writeln!(
                out,
                "{} {} {} {} {} {}",
                pad("", 10),
                pad(&pid.to_string(), 4),
                pad("", 12),
                sci_field(momentum[0], 12, 5),
                sci_field(momentum[1], 12, 5),
                sci_field(momentum[2], 12, 5),
            );
        }
        EventRecord::Grammage { angle, grammage } => {
            let _ = writeln!(out, "{} {}", sci_field(angle, 12, 5), sci_field(grammage, 12, 5));
        }
    }
    out
}

/// The output stream a run writes to, and whether a header line should precede the first record
/// (spec.md section 6: "a header precedes each run unless `--append` is set").
pub struct Sink {
    writer: Box<dyn Write>,
    print_header: bool,
}

impl Sink {
    /// Opens the sink described by `path` (or stdout if `None`). When `append` is set and `path`
    /// exists, records are appended with no header; otherwise the file is (re)created and a
    /// header is written first, mirroring `output_open`/`print_header` in the original front-end.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is given but cannot be opened for writing.
    pub fn open(path: Option<&Path>, append: bool) -> io::Result<Self> {
        match path {
            None => Ok(Self { writer: Box::new(io::stdout()), print_header: !append }),
            Some(path) => {
                if append {
                    match OpenOptions::new().append(true).open(path) {
                        Ok(file) => Ok(Self { writer: Box::new(file), print_header: false }),
                        Err(_) => Ok(Self { writer: Box::new(File::create(path)?), print_header: true }),
                    }
                } else {
                    Ok(Self { writer: Box::new(File::create(path)?), print_header: true })
                }
            }
        }
    }

    /// Writes the appropriate header (decay or grammage) if one is due.
    pub fn write_header(&mut self, grammage_mode: bool) -> io::Result<()> {
        if self.print_header {
            self.writer.write_all(if grammage_mode { HEADER_GRAMMAGE } else { HEADER_DECAY }.as_bytes())?;
        }
        Ok(())
    }

    /// Writes one record's formatted line(s).
    pub fn write_record(&mut self, record: &EventRecord) -> io::Result<()> {
        self.writer.write_all(format_record(record).as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scientific_matches_printf_style() {
        assert_eq!(sci(1.0e+09, 5), "1.00000E+09");
        assert_eq!(sci(-2.5e-03, 2), "-2.50E-03");
    }

    #[test]
    fn grammage_record_has_two_fields() {
        let line = format_record(&EventRecord::Grammage { angle: 0.2, grammage: 1.234e+07 });
        assert_eq!(line.trim_end(), "2.00000E-01 1.23400E+07");
    }

    #[test]
    fn tau_pair_emits_two_lines() {
        use danton::record::TauPoint;
        let record = EventRecord::TauPair {
            generation: 1,
            pid: 15,
            production: TauPoint { kinetic: 1.0e+09, direction: [0.0, 0.0, 1.0], position: [0.0, 0.0, 0.0] },
            decay: TauPoint { kinetic: 5.0e+08, direction: [0.0, 0.0, 1.0], position: [0.0, 0.0, 1.0e+04] },
        };
        assert_eq!(format_record(&record).lines().count(), 2);
    }
}
