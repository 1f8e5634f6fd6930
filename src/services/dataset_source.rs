// Dataset Source
// Downloads (or reads) the public Grammy dataset, unpacks it in memory and
// normalizes its columns into the schema of the embedded fallback.

use std::io::{Cursor, Read};
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use reqwest::Client;
use serde_json::{Number, Value};
use thiserror::Error;

use crate::models::{field_flag, field_number, field_text, DatasetRecord, DatasetSourceConfig};

const KAGGLE_DOWNLOAD_BASE: &str = "https://www.kaggle.com/api/v1/datasets/download";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
/// Upper bound on a decompressed CSV entry
pub const MAX_CSV_ENTRY_BYTES: u64 = 256 * 1024 * 1024;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d.%m.%Y", "%b %d, %Y", "%B %d, %Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("No dataset source configured (set DATALAB_SOURCE_URL, DATALAB_SOURCE_FILE or KAGGLE_USERNAME/KAGGLE_KEY)")]
    Unconfigured,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Dataset source returned status {0}")]
    Status(u16),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive extraction failed: {0}")]
    Archive(String),

    #[error("No CSV inside dataset archive")]
    CsvNotFound,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Dataset contains no rows")]
    Empty,
}

/// Dataset as held by the service: normalized records plus the raw header
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDataset {
    pub columns: Vec<String>,
    pub records: Vec<DatasetRecord>,
}

/// Raw columns mapped onto the canonical fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub year: Option<String>,
    pub category: Option<String>,
    pub nominee: Option<String>,
    pub artist: Option<String>,
    pub winner: Option<String>,
}

impl ColumnMap {
    pub fn detect(columns: &[String]) -> Self {
        let find = |needles: &[&str]| -> Option<String> {
            needles.iter().find_map(|needle| {
                columns
                    .iter()
                    .find(|column| column.to_lowercase().contains(needle))
                    .cloned()
            })
        };

        Self {
            year: find(&["year", "date"]),
            category: find(&["category", "award"]),
            nominee: find(&["nominee", "title", "song", "album", "work"]),
            artist: find(&["artist", "performer"]),
            winner: find(&["winner", "result", "won"]),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub struct DatasetLoader {
    client: Client,
    source: DatasetSourceConfig,
}

impl DatasetLoader {
    pub fn new(source: DatasetSourceConfig, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Failed to configure HTTP client, using defaults: {e}");
                Client::new()
            });
        Self { client, source }
    }

    pub fn source(&self) -> &DatasetSourceConfig {
        &self.source
    }

    /// Fetch and parse the dataset. Nothing is written to disk.
    pub async fn load(&self) -> Result<LoadedDataset, SourceError> {
        let bytes = match &self.source {
            DatasetSourceConfig::Url { url } => {
                log::info!("Downloading dataset from {url}");
                self.download(url, None).await?
            }
            DatasetSourceConfig::Kaggle {
                owner,
                slug,
                username,
                key,
            } => {
                let url = format!("{KAGGLE_DOWNLOAD_BASE}/{owner}/{slug}");
                log::info!("Downloading Kaggle dataset {owner}/{slug}");
                self.download(&url, Some((username, key))).await?
            }
            DatasetSourceConfig::File { path } => {
                log::info!("Reading dataset from {:?}", path);
                tokio::fs::read(path).await?
            }
            DatasetSourceConfig::Unconfigured => return Err(SourceError::Unconfigured),
        };

        let csv_bytes = if bytes.starts_with(ZIP_MAGIC) {
            extract_first_csv(&bytes)?
        } else {
            bytes
        };

        let (columns, rows) = parse_csv(&csv_bytes)?;
        if rows.is_empty() {
            return Err(SourceError::Empty);
        }

        let records = normalize_records(&columns, rows);
        log::info!(
            "Loaded {} record(s) with columns {:?}",
            records.len(),
            columns
        );
        Ok(LoadedDataset { columns, records })
    }

    async fn download(&self, url: &str, auth: Option<(&String, &String)>) -> Result<Vec<u8>, SourceError> {
        let mut request = self.client.get(url);
        if let Some((username, key)) = auth {
            request = request.basic_auth(username, Some(key));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Contents of the first `.csv` entry of a ZIP archive held in memory
pub fn extract_first_csv(bytes: &[u8]) -> Result<Vec<u8>, SourceError> {
    extract_first_csv_limited(bytes, MAX_CSV_ENTRY_BYTES)
}

fn extract_first_csv_limited(bytes: &[u8], limit: u64) -> Result<Vec<u8>, SourceError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| SourceError::Archive(e.to_string()))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| SourceError::Archive(e.to_string()))?;
        if !file.name().to_lowercase().ends_with(".csv") {
            continue;
        }
        log::debug!("Using archive entry {}", file.name());
        // The header's declared size is not trusted; the read itself is capped
        let mut content = Vec::new();
        file.by_ref().take(limit + 1).read_to_end(&mut content)?;
        if content.len() as u64 > limit {
            return Err(SourceError::Archive(format!(
                "CSV entry exceeds {limit} bytes"
            )));
        }
        return Ok(content);
    }

    Err(SourceError::CsvNotFound)
}

/// Parse CSV into (header, typed rows). Invalid UTF-8 is replaced.
pub fn parse_csv(bytes: &[u8]) -> Result<(Vec<String>, Vec<DatasetRecord>), SourceError> {
    let text = String::from_utf8_lossy(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record: DatasetRecord = columns
            .iter()
            .zip(row.iter())
            .map(|(column, cell)| (column.clone(), infer_scalar(cell)))
            .collect();
        rows.push(record);
    }

    Ok((columns, rows))
}

fn infer_scalar(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(n) = cell.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Some(n) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    match cell.to_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}

/// Map raw rows onto `year, category, nominee, artist, winner`. When no
/// known column is present the rows pass through unchanged.
pub fn normalize_records(columns: &[String], rows: Vec<DatasetRecord>) -> Vec<DatasetRecord> {
    let map = ColumnMap::detect(columns);
    if map.is_empty() {
        log::warn!("No known columns in dataset, serving raw rows");
        return rows;
    }

    rows.into_iter()
        .map(|row| {
            let mut record = DatasetRecord::new();
            if let Some(year) = map.year.as_deref().and_then(|column| extract_year(&row, column)) {
                record.insert("year".to_string(), Value::Number(year.into()));
            }
            for (field, column) in [
                ("category", &map.category),
                ("nominee", &map.nominee),
                ("artist", &map.artist),
            ] {
                if let Some(text) = column.as_deref().and_then(|column| field_text(&row, column)) {
                    record.insert(field.to_string(), Value::String(text));
                }
            }
            let winner = map
                .winner
                .as_deref()
                .map(|column| field_flag(&row, column))
                .unwrap_or(false);
            record.insert("winner".to_string(), Value::Bool(winner));
            record
        })
        .collect()
}

/// Year from a numeric cell or the leading digits of a date string
fn extract_year(row: &DatasetRecord, column: &str) -> Option<i64> {
    if let Some(Value::String(text)) = row.get(column) {
        let text = text.trim();
        if let Some(year) = parse_date_year(text) {
            return Some(year);
        }
        let digits: String = text.chars().take(4).collect();
        return digits.parse().ok();
    }
    field_number(row, column).map(|n| n as i64)
}

fn parse_date_year(text: &str) -> Option<i64> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.year() as i64);
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|datetime| datetime.year() as i64)
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .map(|date| date.year() as i64)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::test_support::{closed_addr, spawn_server};
    use axum::{http::StatusCode, routing::get, Router};
    use std::io::Write;

    const SAMPLE_CSV: &str = "year,title,published_at,category,nominee,artist,workers,winner\n\
        2020,62nd Annual GRAMMY Awards,2020-05-19,Record Of The Year,Bad Guy,Billie Eilish,Finneas,True\n\
        2020,62nd Annual GRAMMY Awards,2020-05-19,Record Of The Year,Hey Ma,Bon Iver,,False\n\
        2019,61st Annual GRAMMY Awards,2019-02-10,Best New Artist,Dua Lipa,Dua Lipa,,True\n";

    fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            let options = zip::write::FileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);
            for (name, content) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn test_detect_columns() {
        let columns: Vec<String> = ["year", "title", "category", "nominee", "artist", "workers", "winner"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let map = ColumnMap::detect(&columns);
        assert_eq!(map.year.as_deref(), Some("year"));
        assert_eq!(map.nominee.as_deref(), Some("nominee"));
        assert_eq!(map.artist.as_deref(), Some("artist"));
        assert_eq!(map.winner.as_deref(), Some("winner"));
    }

    #[test]
    fn test_parse_and_normalize_sample() {
        let (columns, rows) = parse_csv(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(columns.len(), 8);
        let records = normalize_records(&columns, rows);

        assert_eq!(records.len(), 3);
        let first = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(
            first,
            serde_json::json!({
                "year": 2020,
                "category": "Record Of The Year",
                "nominee": "Bad Guy",
                "artist": "Billie Eilish",
                "winner": true
            })
        );
        assert_eq!(records[1]["winner"], false);
    }

    #[test]
    fn test_year_from_date_column() {
        let columns = vec!["ceremony_date".to_string(), "award".to_string()];
        let (_, rows) = parse_csv(b"ceremony_date,award\n1999-02-24,Album Of The Year\n").unwrap();
        let records = normalize_records(&columns, rows);
        assert_eq!(records[0]["year"], 1999);
        assert_eq!(records[0]["category"], "Album Of The Year");
        assert_eq!(records[0]["winner"], false);
    }

    #[test]
    fn test_year_from_formatted_dates() {
        let year_of = |text: &str| {
            let mut row = DatasetRecord::new();
            row.insert("date".to_string(), Value::String(text.to_string()));
            extract_year(&row, "date")
        };
        assert_eq!(year_of("2/10/2019"), Some(2019));
        assert_eq!(year_of("Feb 10, 2019"), Some(2019));
        assert_eq!(year_of("February 10, 2019"), Some(2019));
        assert_eq!(year_of("2019-02-10T20:00:00Z"), Some(2019));
        assert_eq!(year_of("2019/02/10"), Some(2019));
        assert_eq!(year_of("2019"), Some(2019));
        assert_eq!(year_of("sometime"), None);

        let (columns, rows) = parse_csv(b"date,category\n\"Feb 10, 2019\",Song Of The Year\n").unwrap();
        let records = normalize_records(&columns, rows);
        assert_eq!(records[0]["year"], 2019);
    }

    #[test]
    fn test_unknown_columns_pass_through() {
        let (columns, rows) = parse_csv(b"x,y\n1,2.5\n").unwrap();
        let records = normalize_records(&columns, rows);
        assert_eq!(serde_json::to_value(&records).unwrap(), serde_json::json!([{ "x": 1, "y": 2.5 }]));
    }

    #[test]
    fn test_extract_first_csv_from_zip() {
        let bytes = zip_bytes(&[("README.txt", "hello"), ("data/grammy.csv", SAMPLE_CSV)]);
        assert!(bytes.starts_with(ZIP_MAGIC));
        assert_eq!(extract_first_csv(&bytes).unwrap(), SAMPLE_CSV.as_bytes());

        let no_csv = zip_bytes(&[("README.txt", "hello")]);
        assert!(matches!(extract_first_csv(&no_csv), Err(SourceError::CsvNotFound)));
    }

    #[test]
    fn test_oversized_csv_entry_is_rejected() {
        let bytes = zip_bytes(&[("grammy.csv", SAMPLE_CSV)]);
        let size = SAMPLE_CSV.len() as u64;
        assert!(matches!(
            extract_first_csv_limited(&bytes, size - 1),
            Err(SourceError::Archive(_))
        ));
        assert_eq!(extract_first_csv_limited(&bytes, size).unwrap(), SAMPLE_CSV.as_bytes());
    }

    #[tokio::test]
    async fn test_load_from_url_serving_zip() {
        let archive = zip_bytes(&[("grammy.csv", SAMPLE_CSV)]);
        let router = Router::new().route("/grammy.zip", get(move || {
            let body = archive.clone();
            async move { body }
        }));
        let addr = spawn_server(router).await;

        let loader = DatasetLoader::new(
            DatasetSourceConfig::Url { url: format!("http://{addr}/grammy.zip") },
            Duration::from_secs(5),
        );
        let dataset = loader.load().await.unwrap();
        assert_eq!(dataset.records.len(), 3);
        assert!(dataset.columns.contains(&"nominee".to_string()));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("grammy.csv");
        std::fs::write(&path, SAMPLE_CSV).unwrap();

        let loader = DatasetLoader::new(DatasetSourceConfig::File { path: path.clone() }, Duration::from_secs(5));
        assert_eq!(loader.source(), &DatasetSourceConfig::File { path });
        assert_eq!(loader.load().await.unwrap().records.len(), 3);
    }

    #[tokio::test]
    async fn test_load_failures() {
        let router = Router::new()
            .route("/missing", get(|| async { (StatusCode::NOT_FOUND, "gone") }))
            .route("/empty", get(|| async { "year,category\n" }));
        let addr = spawn_server(router).await;

        let not_found = DatasetLoader::new(
            DatasetSourceConfig::Url { url: format!("http://{addr}/missing") },
            Duration::from_secs(5),
        );
        assert!(matches!(not_found.load().await, Err(SourceError::Status(404))));

        let empty = DatasetLoader::new(
            DatasetSourceConfig::Url { url: format!("http://{addr}/empty") },
            Duration::from_secs(5),
        );
        assert!(matches!(empty.load().await, Err(SourceError::Empty)));

        let unreachable = DatasetLoader::new(
            DatasetSourceConfig::Url { url: format!("http://{}/x.csv", closed_addr().await) },
            Duration::from_secs(5),
        );
        assert!(matches!(unreachable.load().await, Err(SourceError::Network(_))));

        let unconfigured = DatasetLoader::new(DatasetSourceConfig::Unconfigured, Duration::from_secs(5));
        assert!(matches!(unconfigured.load().await, Err(SourceError::Unconfigured)));
    }
}
