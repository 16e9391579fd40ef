use crate::domain::ports::RowStore;
use crate::domain::registration::RegistrationRow;
use crate::error::{RegistrationError, Result};
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Registration rows kept in a local CSV file, one file per event.
///
/// The header line is written together with the first row. Later rows are
/// laid out under whatever header the file has, and reads tolerate extra or
/// missing columns, so the file can be edited in a spreadsheet tool.
#[derive(Clone)]
pub struct CsvRowStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl CsvRowStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// `<dir>/<slug>.csv`, creating `dir` if needed.
    pub fn in_dir(dir: &Path, slug: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self::new(dir.join(format!("{slug}.csv"))))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// First line of the file, if it has any non-empty cell.
    fn read_header(&self) -> Result<Option<Vec<String>>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(&self.path)?;
        let mut record = csv::StringRecord::new();
        if !reader.read_record(&mut record)? {
            return Ok(None);
        }
        let header: Vec<String> = record.iter().map(str::to_string).collect();
        Ok(Some(header).filter(|h| h.iter().any(|c| !c.is_empty())))
    }

    fn read_rows(&self) -> Result<Vec<RegistrationRow>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(&self.path)?;
        reader
            .deserialize::<RegistrationRow>()
            .map(|result| result.map_err(RegistrationError::from))
            .collect()
    }
}

fn ends_with_newline(file: &mut File) -> Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

#[async_trait]
impl RowStore for CsvRowStore {
    async fn append(&self, row: RegistrationRow) -> Result<()> {
        let _guard = self.lock.lock().await;

        let header = self.read_header()?;
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        if header.is_some() && !ends_with_newline(&mut file)? {
            file.write_all(b"\n")?;
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(file);
        for line in row.append_lines(header) {
            writer.write_record(&line)?;
        }
        writer.flush()?;
        Ok(())
    }

    async fn rows(&self) -> Result<Vec<RegistrationRow>> {
        let _guard = self.lock.lock().await;
        self.read_rows()
    }
}
