use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, instrument};
use wealthdash_core::portfolio::Worksheet;
use wealthdash_core::ports::SpreadsheetExporter;
use wealthdash_core::Error;

/// Workbook kept as a directory with one CSV file per worksheet
pub struct CsvWorkbookExporter {
    dir: PathBuf,
}

impl CsvWorkbookExporter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing the worksheet titled `title`
    pub fn sheet_path(&self, title: &str) -> PathBuf {
        let name: String = title
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c => c,
            })
            .collect();
        self.dir.join(format!("{}.csv", name))
    }
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn write_record(out: &mut String, fields: &[String]) {
    let line: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
    out.push_str(&line.join(","));
    out.push_str("\r\n");
}

/// Header plus rows as CSV with CRLF line endings
pub fn render_csv(worksheet: &Worksheet) -> String {
    let mut out = String::new();
    write_record(&mut out, &worksheet.header);
    for row in &worksheet.rows {
        write_record(&mut out, row);
    }
    out
}

#[async_trait]
impl SpreadsheetExporter for CsvWorkbookExporter {
    #[instrument(skip(self, worksheet), fields(title = %worksheet.title, rows = worksheet.rows.len()))]
    async fn replace_worksheet(&self, worksheet: &Worksheet) -> Result<(), Error> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::Export(format!("{}: {}", self.dir.display(), e)))?;

        let path = self.sheet_path(&worksheet.title);
        let tmp = path.with_extension("csv.tmp");

        fs::write(&tmp, render_csv(worksheet))
            .await
            .map_err(|e| Error::Export(format!("{}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::Export(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), "worksheet replaced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sheet(title: &str, rows: Vec<Vec<&str>>) -> Worksheet {
        Worksheet {
            title: title.to_string(),
            header: vec!["tradingsymbol".to_string(), "note".to_string()],
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(String::from).collect())
                .collect(),
        }
    }

    #[test]
    fn test_render_csv_escapes_fields() {
        let csv = render_csv(&sheet(
            "Holdings_A1",
            vec![vec!["INFY", "plain"], vec!["M&M", "has, comma and \"quotes\""]],
        ));

        insta::assert_snapshot!(csv.replace("\r\n", "\n"), @r###"
        tradingsymbol,note
        INFY,plain
        M&M,"has, comma and ""quotes"""
        "###);
    }

    #[test]
    fn test_sheet_path_sanitizes_title() {
        let exporter = CsvWorkbookExporter::new(PathBuf::from("/tmp/book"));
        assert_eq!(
            exporter.sheet_path("Holdings_A/1"),
            PathBuf::from("/tmp/book/Holdings_A_1.csv")
        );
    }

    #[tokio::test]
    async fn test_replace_overwrites_previous_content() {
        let dir = tempdir().unwrap();
        let exporter = CsvWorkbookExporter::new(dir.path().join("workbook"));

        exporter
            .replace_worksheet(&sheet("Trades_A1", vec![vec!["INFY", "old"], vec!["TCS", "old"]]))
            .await
            .unwrap();
        exporter
            .replace_worksheet(&sheet("Trades_A1", vec![vec!["INFY", "new"]]))
            .await
            .unwrap();

        let content = fs::read_to_string(exporter.sheet_path("Trades_A1"))
            .await
            .unwrap();
        assert_eq!(content, "tradingsymbol,note\r\nINFY,new\r\n");

        let mut entries = fs::read_dir(exporter.dir()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["Trades_A1.csv"]);
    }
}
