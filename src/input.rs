use anyhow::{Context, Result};
use tokio::io::{self, AsyncReadExt};

/// One email per line; blank lines and `#` comments are skipped.
pub fn parse_email_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Reads emails from `path`, or from stdin when no path is configured.
pub async fn read_emails(path: Option<&str>) -> Result<Vec<String>> {
    let text = match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read email list {path}"))?,
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .await
                .context("failed to read email list from stdin")?;
            text
        }
    };
    let emails = parse_email_lines(&text);
    tracing::info!(target: "input", count = emails.len(), "emails loaded");
    Ok(emails)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn skips_blank_lines_and_comments() {
        let text = "a@x\n\n  # staff\n b@x \r\na@x\n";
        assert_eq!(parse_email_lines(text), vec!["a@x", "b@x", "a@x"]);
    }

    #[tokio::test]
    async fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "one@x\n# skip\ntwo@x").unwrap();

        let emails = read_emails(file.path().to_str()).await.unwrap();

        assert_eq!(emails, vec!["one@x", "two@x"]);
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        assert!(read_emails(Some("/definitely/not/here.txt")).await.is_err());
    }
}
