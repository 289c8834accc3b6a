//! I/O utilities.
//!
//! Output either goes to a file or to standard output. We use `-` as the
//! conventional name for standard output on the command line.

use serde::Serialize;
use tokio::{
    fs::File,
    io::{AsyncWrite, AsyncWriteExt as _, BufWriter},
};

use crate::prelude::*;

/// Create a writer for a [`Path`], or for standard output if the path is
/// `None` or `-`.
pub async fn create_writer(
    path: Option<&Path>,
) -> Result<Box<dyn AsyncWrite + Unpin + Send + Sync + 'static>> {
    match path {
        Some(path) if path != Path::new("-") => {
            let file = File::create(path)
                .await
                .with_context(|| format!("Failed to create file at path: {:?}", path))?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(tokio::io::stdout())),
    }
}

/// Write `bytes` to `path`, creating or truncating it.
pub async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut writer = create_writer(Some(path)).await?;
    writer
        .write_all(bytes)
        .await
        .with_context(|| format!("Failed to write file at path: {:?}", path))?;
    writer
        .flush()
        .await
        .with_context(|| format!("Failed to flush file at path: {:?}", path))?;
    Ok(())
}

/// Write records as JSON Lines to either standard output or a file.
pub async fn write_jsonl<T: Serialize>(path: Option<&Path>, records: &[T]) -> Result<()> {
    let mut writer = BufWriter::new(create_writer(path).await?);
    for record in records {
        let json =
            serde_json::to_string(record).context("Failed to serialize record as JSON")?;
        writer
            .write_all(json.as_bytes())
            .await
            .context("Failed to write JSON to output")?;
        writer
            .write_all(b"\n")
            .await
            .context("Failed to write newline to output")?;
    }
    writer.flush().await.context("Failed to flush output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    #[derive(Serialize)]
    struct Row {
        name: &'static str,
    }

    #[tokio::test]
    async fn test_write_jsonl_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        write_jsonl(Some(&path), &[Row { name: "a" }, Row { name: "b" }])
            .await
            .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let lines = written
            .lines()
            .map(|l| serde_json::from_str::<Value>(l).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["name"], "b");
    }

    #[tokio::test]
    async fn test_write_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        write_bytes(&path, b"\x00\x01\x02").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![0, 1, 2]);
    }
}
