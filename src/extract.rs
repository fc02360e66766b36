use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::table::{Cell, RawTableFrame};

/// Turns PDF bytes into the tables found on its pages, in page order.
#[async_trait]
pub trait TableExtractor: Send + Sync {
    async fn extract(&self, pdf: &[u8]) -> Result<Vec<RawTableFrame>>;
}

/// Runs tabula-java in lattice mode over every page and reads its JSON output.
pub struct TabulaExtractor {
    java_bin: String,
    jar: PathBuf,
}

impl TabulaExtractor {
    pub fn new(java_bin: impl Into<String>, jar: impl Into<PathBuf>) -> Self {
        TabulaExtractor {
            java_bin: java_bin.into(),
            jar: jar.into(),
        }
    }
}

#[async_trait]
impl TableExtractor for TabulaExtractor {
    async fn extract(&self, pdf: &[u8]) -> Result<Vec<RawTableFrame>> {
        let mut file = tempfile::Builder::new()
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| PipelineError::Extraction(format!("temp file: {}", e)))?;
        file.write_all(pdf)
            .map_err(|e| PipelineError::Extraction(format!("temp file: {}", e)))?;

        debug!("Running tabula on {} bytes", pdf.len());
        let output = Command::new(&self.java_bin)
            .arg("-jar")
            .arg(&self.jar)
            .args(["--lattice", "--pages", "all", "--format", "JSON", "--silent"])
            .arg(file.path())
            .output()
            .await;

        let output = match output {
            Ok(o) if o.status.success() => o,
            Ok(o) => {
                let stderr = String::from_utf8_lossy(&o.stderr);
                return Err(PipelineError::Extraction(format!(
                    "tabula exited with {}: {}",
                    o.status,
                    stderr.trim()
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::Extraction(format!(
                    "{} not found (a JRE is needed to run tabula)",
                    self.java_bin
                )));
            }
            Err(e) => return Err(PipelineError::Extraction(e.to_string())),
        };

        let frames = frames_from_json(&String::from_utf8_lossy(&output.stdout))?;
        info!("Extracted {} tables", frames.len());
        Ok(frames)
    }
}

// ── tabula JSON ──

#[derive(Deserialize)]
struct TabulaTable {
    data: Vec<Vec<TabulaCell>>,
}

#[derive(Deserialize)]
struct TabulaCell {
    text: String,
}

/// First row of each table is its header. Blank headers become `Unnamed: <i>`,
/// blank cells are absent, and a column whose present cells all read as
/// numbers is typed numeric.
pub fn frames_from_json(json: &str) -> Result<Vec<RawTableFrame>> {
    let tables: Vec<TabulaTable> = serde_json::from_str(json)
        .map_err(|e| PipelineError::Extraction(format!("malformed tabula output: {}", e)))?;

    let frames: Vec<RawTableFrame> = tables
        .into_iter()
        .filter(|t| !t.data.is_empty())
        .map(to_frame)
        .collect();

    if frames.is_empty() {
        return Err(PipelineError::Extraction(
            "no lattice table found on any page".to_string(),
        ));
    }
    Ok(frames)
}

fn to_frame(table: TabulaTable) -> RawTableFrame {
    let mut rows = table.data.into_iter();
    let header = rows.next().unwrap_or_default();
    let columns = header
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            if c.text.is_empty() {
                format!("Unnamed: {}", i)
            } else {
                c.text
            }
        })
        .collect();

    let mut frame = RawTableFrame::new(columns);
    for row in rows {
        frame.push_row(
            row.into_iter()
                .map(|c| (!c.text.is_empty()).then(|| Cell::Text(c.text)))
                .collect(),
        );
    }
    infer_numeric_columns(&mut frame);
    frame
}

fn infer_numeric_columns(frame: &mut RawTableFrame) {
    for col in 0..frame.columns.len() {
        let present: Vec<&str> = frame
            .rows
            .iter()
            .filter_map(|r| r[col].as_ref().and_then(Cell::as_text))
            .collect();
        if present.is_empty() {
            continue;
        }
        let all_int = present.iter().all(|s| s.trim().parse::<i64>().is_ok());
        let all_num = all_int || present.iter().all(|s| s.trim().parse::<f64>().is_ok());
        if !all_num {
            continue;
        }
        // A gap forces the column to floating point, as a dataframe would.
        let as_int = all_int && present.len() == frame.rows.len();
        for row in frame.rows.iter_mut() {
            let parsed = match &row[col] {
                Some(Cell::Text(s)) if as_int => s.trim().parse().ok().map(Cell::Int),
                Some(Cell::Text(s)) => s.trim().parse().ok().map(Cell::Float),
                _ => None,
            };
            if parsed.is_some() {
                row[col] = parsed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> String {
        std::fs::read_to_string("tests/fixtures/tabula_two_rows.json").unwrap()
    }

    #[test]
    fn header_row_and_unnamed_columns() {
        let frames = frames_from_json(&fixture()).unwrap();
        assert_eq!(frames.len(), 1);
        let f = &frames[0];
        assert_eq!(f.columns[0], "Unnamed: 0");
        assert_eq!(f.columns[1], "Unnamed: 1");
        assert_eq!(f.columns[2], "番号");
        assert_eq!(f.columns.last().map(String::as_str), Some("電話"));
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn numeric_and_mixed_columns() {
        let frames = frames_from_json(&fixture()).unwrap();
        let f = &frames[0];
        assert_eq!(f.cell(0, "番号"), Some(&Cell::Int(1)));
        assert_eq!(f.cell(1, "番号"), Some(&Cell::Int(2)));
        // "×" keeps the column textual.
        assert_eq!(f.cell(0, "1歳"), Some(&Cell::Text("×".into())));
        assert_eq!(f.cell(1, "1歳"), Some(&Cell::Text("2".into())));
        // blank cell in an otherwise numeric column
        assert_eq!(f.cell(0, "0歳"), None);
        assert_eq!(f.cell(1, "0歳"), Some(&Cell::Float(3.0)));
        assert_eq!(f.cell(0, "電話"), Some(&Cell::Text("03-1111-2222".into())));
    }

    #[test]
    fn empty_output_is_extraction_error() {
        assert!(matches!(
            frames_from_json("[]"),
            Err(PipelineError::Extraction(_))
        ));
        assert!(matches!(
            frames_from_json(r#"[{"data": []}]"#),
            Err(PipelineError::Extraction(_))
        ));
    }

    #[test]
    fn malformed_output_is_extraction_error() {
        assert!(matches!(
            frames_from_json("Error: no tables"),
            Err(PipelineError::Extraction(_))
        ));
    }

    #[tokio::test]
    async fn missing_binary_is_extraction_error() {
        let extractor = TabulaExtractor::new("definitely-not-a-java-binary", "tabula.jar");
        assert!(matches!(
            extractor.extract(b"%PDF-1.4").await,
            Err(PipelineError::Extraction(_))
        ));
    }
}
