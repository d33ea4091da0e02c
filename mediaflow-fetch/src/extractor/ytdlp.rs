//! `yt-dlp` extractor.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{CookieMaterial, ExtractRequest, ExtractedMedia, MediaExtractor, mime_for_extension};
use crate::error::FetchError;
use crate::host::browser::{Cookie, to_netscape_file};
use crate::host::process::ProcessRunner;
use crate::temp::TempResource;

/// Marker prefixed to the line yt-dlp prints after moving the final file.
const RESULT_MARKER: &str = "MEDIAFLOW";

/// Runs `yt-dlp` as a child process, one invocation per attempt.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    runner: ProcessRunner,
    binary: String,
}

impl YtDlpExtractor {
    /// Creates an extractor using `binary` (a name on PATH or a path).
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            runner: ProcessRunner::new(),
            binary: binary.into(),
        }
    }

    /// True if the binary can be found.
    pub fn is_installed(&self) -> bool {
        self.runner.command_exists(&self.binary)
    }

    /// Builds the argument list for one attempt.
    fn build_args(
        request: &ExtractRequest<'_>,
        dir: &Path,
        cookie_file: Option<&Path>,
    ) -> Vec<String> {
        let strategy = request.strategy;
        let mut args: Vec<String> = vec![
            "--no-playlist".into(),
            "--no-progress".into(),
            "--no-quiet".into(),
            "--restrict-filenames".into(),
            "--no-part".into(),
            "-f".into(),
            strategy.format_hint.clone(),
            "--max-filesize".into(),
            request.max_filesize_bytes.to_string(),
            "-o".into(),
            dir.join("%(id)s.%(ext)s").to_string_lossy().into_owned(),
            "--print".into(),
            format!("after_move:{RESULT_MARKER}\t%(filepath)s\t%(duration)s\t%(title)s"),
        ];

        for (name, value) in &strategy.headers {
            args.push("--add-header".into());
            args.push(format!("{name}:{value}"));
        }
        if let Some(hint) = &strategy.extractor_hint {
            args.push("--extractor-args".into());
            args.push(hint.clone());
        }
        if let Some(file) = cookie_file {
            args.push("--cookies".into());
            args.push(file.to_string_lossy().into_owned());
        }

        args.push("--".into());
        args.push(request.url.to_string());
        args
    }

    /// Writes the strategy's cookies as a Netscape file inside the scratch dir.
    ///
    /// Request cookies go through a file too, so they never appear in argv.
    async fn write_cookie_file(
        request: &ExtractRequest<'_>,
        scratch: &TempResource,
    ) -> Result<Option<std::path::PathBuf>, FetchError> {
        let cookies = match request.cookies {
            None => return Ok(None),
            Some(CookieMaterial::Jar(cookies)) => cookies.clone(),
            Some(CookieMaterial::Header(header)) => {
                parse_cookie_header(header, request.platform.domains())
            }
        };
        if cookies.is_empty() {
            return Ok(None);
        }

        let path = scratch.dir().join("cookies.txt");
        tokio::fs::write(&path, to_netscape_file(&cookies)).await?;
        Ok(Some(path))
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    fn id(&self) -> &str {
        "yt-dlp"
    }

    #[instrument(skip_all, fields(strategy = %request.strategy.name, url = %request.url))]
    async fn extract(
        &self,
        request: &ExtractRequest<'_>,
        scratch: &mut TempResource,
    ) -> Result<ExtractedMedia, FetchError> {
        let cookie_file = Self::write_cookie_file(request, scratch).await?;
        let args = Self::build_args(request, scratch.dir(), cookie_file.as_deref());
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();

        let output = self
            .runner
            .run(&self.binary, &argv, request.timeout)
            .await?;

        if !output.success() {
            return Err(FetchError::Extractor(output.stderr_summary()));
        }

        let Some(printed) = parse_result_line(&output.stdout) else {
            let all = format!("{}\n{}", output.stdout, output.stderr);
            if all.to_ascii_lowercase().contains("max-filesize") {
                return Err(FetchError::SizeLimitExceeded {
                    limit: request.max_filesize_bytes,
                    actual: None,
                });
            }
            return Err(FetchError::Extractor(format!(
                "no file produced: {}",
                output.stderr_summary()
            )));
        };

        let size = scratch.adopt(&printed.path).map_err(|e| {
            FetchError::Io(std::io::Error::new(
                e.kind(),
                format!("extractor output {}: {e}", printed.path),
            ))
        })?;
        debug!(size, path = %printed.path, "Extractor produced file");

        let ext = Path::new(&printed.path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        Ok(ExtractedMedia {
            title: printed.title,
            duration_seconds: printed.duration,
            mime_type: mime_for_extension(ext).to_string(),
        })
    }
}

// ============================================================================
// Output Parsing
// ============================================================================

#[derive(Debug, PartialEq)]
struct PrintedResult {
    path: String,
    duration: Option<f64>,
    title: Option<String>,
}

/// Finds the marker line yt-dlp prints after the final move.
fn parse_result_line(stdout: &str) -> Option<PrintedResult> {
    let line = stdout
        .lines()
        .rev()
        .find(|l| l.starts_with(RESULT_MARKER))?;
    let mut fields = line.splitn(4, '\t').skip(1);

    let path = fields.next().filter(|p| !p.is_empty())?.to_string();
    let duration = fields
        .next()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0);
    let title = fields
        .next()
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != "NA")
        .map(str::to_string);

    Some(PrintedResult {
        path,
        duration,
        title,
    })
}

/// Splits a `Cookie` header into cookies scoped to each of `domains`.
fn parse_cookie_header(header: &str, domains: &[&str]) -> Vec<Cookie> {
    let pairs: Vec<(&str, &str)> = header
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, _)| !k.is_empty())
        .collect();

    domains
        .iter()
        .flat_map(|domain| {
            pairs.iter().map(move |(name, value)| Cookie {
                name: (*name).to_string(),
                value: (*value).to_string(),
                domain: format!(".{domain}"),
                path: "/".to_string(),
                expires: None,
                secure: true,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::AcquisitionStrategy;
    use mediaflow_core::Platform;
    use std::time::Duration;

    #[test]
    fn test_parse_result_line() {
        let stdout = "[youtube] Extracting URL\nMEDIAFLOW\t/tmp/x/abc.mp4\t212.0\tNever Gonna Give You Up\n";
        let parsed = parse_result_line(stdout).unwrap();
        assert_eq!(parsed.path, "/tmp/x/abc.mp4");
        assert_eq!(parsed.duration, Some(212.0));
        assert_eq!(parsed.title.as_deref(), Some("Never Gonna Give You Up"));
    }

    #[test]
    fn test_parse_result_line_missing_fields() {
        let parsed = parse_result_line("MEDIAFLOW\t/tmp/x/a.jpg\tNA\tNA").unwrap();
        assert_eq!(parsed.duration, None);
        assert_eq!(parsed.title, None);
        assert!(parse_result_line("nothing here").is_none());
        assert!(parse_result_line("MEDIAFLOW\t\t1\tx").is_none());
    }

    #[test]
    fn test_parse_cookie_header() {
        let cookies = parse_cookie_header("sessionid=abc; csrftoken = def ;junk", &["instagram.com"]);
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].name, "sessionid");
        assert_eq!(cookies[1].value, "def");
        assert_eq!(cookies[0].domain, ".instagram.com");
    }

    #[test]
    fn test_build_args() {
        let strategy = AcquisitionStrategy::new("youtube.android")
            .extractor_hint("youtube:player_client=android")
            .header("Accept-Language", "en-US");
        let request = ExtractRequest {
            url: "https://www.youtube.com/watch?v=abc",
            platform: Platform::YouTube,
            strategy: &strategy,
            cookies: None,
            max_filesize_bytes: 1024,
            timeout: Duration::from_secs(10),
        };

        let args = YtDlpExtractor::build_args(&request, Path::new("/scratch"), Some(Path::new("/scratch/cookies.txt")));
        let joined = args.join(" ");
        assert!(joined.contains("--max-filesize 1024"));
        assert!(joined.contains("--extractor-args youtube:player_client=android"));
        assert!(joined.contains("--add-header Accept-Language:en-US"));
        assert!(joined.contains("--cookies /scratch/cookies.txt"));
        assert_eq!(args.last().map(String::as_str), Some("https://www.youtube.com/watch?v=abc"));
        assert_eq!(args[args.len() - 2], "--");
    }
}
