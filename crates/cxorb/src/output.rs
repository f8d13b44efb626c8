use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Result of one call against a remote port.
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    pub action: &'static str,
    pub endpoint: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
}

/// Printed once by `serve` after the listener is bound.
#[derive(Debug, Clone, Serialize)]
pub struct Listening {
    pub event: &'static str,
    pub endpoint: String,
    pub objects: Vec<String>,
    pub width: u32,
}

/// Print readings; JSON output is one object per line.
pub fn print_readings(readings: &[Reading], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for reading in readings {
                println!("{}", to_json(reading));
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ACTION", "TARGET", "BIT", "VALUE"]);
            for reading in readings {
                table.add_row(vec![
                    reading.action.to_string(),
                    reading.target.clone(),
                    reading.bit.map(|b| b.to_string()).unwrap_or_default(),
                    value_text(reading),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for reading in readings {
                match reading.bit {
                    Some(bit) => println!(
                        "{} {} bit {bit}: {}",
                        reading.action,
                        reading.target,
                        value_text(reading)
                    ),
                    None => println!(
                        "{} {}: {}",
                        reading.action,
                        reading.target,
                        value_text(reading)
                    ),
                }
            }
        }
    }
}

pub fn print_listening(listening: &Listening, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(listening)),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Listening on {}", listening.endpoint);
            println!("  Objects: {}", listening.objects.join(", "));
            println!("  Width:   {} bits", listening.width);
        }
    }
}

fn value_text(reading: &Reading) -> String {
    match (reading.value, reading.width) {
        (Some(true), _) => "high".to_string(),
        (Some(false), _) => "low".to_string(),
        (None, Some(width)) => format!("{width} bits"),
        (None, None) => "ok".to_string(),
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(value: Option<bool>, width: Option<u32>) -> Reading {
        Reading {
            action: "read",
            endpoint: "tcp://localhost:12345".to_string(),
            target: "0x00010000".to_string(),
            bit: Some(1),
            value,
            width,
        }
    }

    #[test]
    fn value_text_prefers_bit_value() {
        assert_eq!(value_text(&reading(Some(true), None)), "high");
        assert_eq!(value_text(&reading(Some(false), None)), "low");
        assert_eq!(value_text(&reading(None, Some(32))), "32 bits");
        assert_eq!(value_text(&reading(None, None)), "ok");
    }

    #[test]
    fn json_skips_absent_fields() {
        let json: serde_json::Value =
            serde_json::from_str(&to_json(&reading(Some(true), None))).unwrap();
        assert_eq!(json["value"], true);
        assert!(json.get("width").is_none());
    }
}
