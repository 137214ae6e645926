use std::path::Path;
use std::time::Instant;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::error::Error;
use crate::queue::WorkQueue;

/// Streams every line of `path` into `queue`, then closes it.
///
/// The queue is closed even when reading fails so that nothing waits on a
/// loader that will never finish. Returns the number of lines offered.
pub async fn load_file(path: &Path, queue: &WorkQueue) -> Result<usize, Error> {
    let start = Instant::now();
    let result = read_lines(path, queue).await;
    queue.close();

    let count = result?;
    info!(lines = count, "file read in {} ms", start.elapsed().as_millis());
    info!("total # of passwords to process: {}", queue.len());

    Ok(count)
}

async fn read_lines(path: &Path, queue: &WorkQueue) -> Result<usize, Error> {
    let input_error = |source| Error::Input { path: path.to_path_buf(), source };

    let file = File::open(path).await.map_err(input_error)?;
    let mut lines = BufReader::new(file).lines();

    let mut count = 0;
    while let Some(line) = lines.next_line().await.map_err(input_error)? {
        queue.offer(line)?;
        count += 1;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn input_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn drain(queue: &WorkQueue) -> Vec<String> {
        std::iter::from_fn(|| queue.poll()).collect()
    }

    #[tokio::test]
    async fn test_loads_lines_and_closes() {
        let file = input_file("abc\npassword\n\n");
        let queue = WorkQueue::new();

        assert_eq!(load_file(file.path(), &queue).await.unwrap(), 3);
        assert!(queue.is_closed());
        assert_eq!(drain(&queue), ["abc", "password", ""]);
        assert!(queue.is_exhausted());
    }

    #[tokio::test]
    async fn test_strips_crlf_and_keeps_last_line_without_newline() {
        let file = input_file("hunter2\r\nletmein\r\nqwerty");
        let queue = WorkQueue::new();

        assert_eq!(load_file(file.path(), &queue).await.unwrap(), 3);
        assert_eq!(drain(&queue), ["hunter2", "letmein", "qwerty"]);
    }

    #[tokio::test]
    async fn test_missing_file_closes_queue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.txt");
        let queue = WorkQueue::new();

        let err = load_file(&path, &queue).await.unwrap_err();
        assert!(matches!(err, Error::Input { path: p, .. } if p == path));
        assert!(queue.is_exhausted());
    }
}
