//! Office-document backend, grounded on `preview/backends/office.py`'s
//! `convert()`: hand the source to a running soffice listener and get a
//! PDF back, retrying a fixed number of times since the listener
//! occasionally refuses a connection under load.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::sleep;

use super::{Backend, BackendContext};
use crate::error::{MediaError, Result};
use crate::pathref::PathRef;
use crate::request::PreviewRequest;

pub const EXTENSIONS: &[&str] = &[
    "doc", "docx", "ppt", "pptx", "xls", "xlsx", "odt", "odp", "ods", "rtf", "csv",
];

/// Delay between retries, matching the original's `sleep(0.2)`.
const RETRY_DELAY: Duration = Duration::from_millis(200);

pub struct OfficeBackend;

impl OfficeBackend {
    pub fn new() -> Self {
        OfficeBackend
    }
}

impl Default for OfficeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for OfficeBackend {
    fn name(&self) -> &'static str {
        "office"
    }

    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    async fn preview(&self, req: &mut PreviewRequest, ctx: &BackendContext) -> Result<()> {
        let started = Instant::now();
        let _permit = ctx.pools.acquire_office().await;

        let pdf_path = std::env::temp_dir().join(format!("pvs-{}.pdf", uuid::Uuid::new_v4()));
        let connection = format!("socket,host={},port={};urp;", ctx.soffice_addr, ctx.soffice_port);

        let shared_path = req.src().is_shared().then(|| req.src().path().to_path_buf());
        let extension = req.extension.clone();

        let mut last_err = None;
        for attempt in 0..=ctx.soffice_retry {
            let result = match &shared_path {
                Some(path) => convert_from_path(path, &pdf_path, &connection, ctx.soffice_timeout).await,
                None => convert_from_stdin(req.src().path(), &extension, &pdf_path, &connection, ctx.soffice_timeout).await,
            };
            match result {
                Ok(()) => {
                    last_err = None;
                    break;
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "office conversion attempt failed");
                    last_err = Some(err);
                    if attempt < ctx.soffice_retry {
                        sleep(RETRY_DELAY).await;
                    }
                }
            }
        }
        if let Some(err) = last_err {
            return Err(err);
        }

        let pdf_ref = PathRef::new_temp(pdf_path).await?;
        req.set_src(pdf_ref).await;
        ctx.pdf.preview(req, ctx).await?;

        ctx.metrics.record_preview(self.name(), &req.extension, req.format.as_str(), &started.elapsed());
        Ok(())
    }
}

/// A source the soffice listener can see on its own filesystem: passed
/// as a plain path argument, same as the original's `unoconv <src>`.
async fn convert_from_path(src: &std::path::Path, dest: &std::path::Path, connection: &str, timeout: Duration) -> Result<()> {
    let mut cmd = base_command(dest, connection);
    cmd.arg(src);
    cmd.stdin(std::process::Stdio::null());
    run(cmd, timeout).await
}

/// A source the listener can't reach directly (a temp upload or a
/// downloaded URL, addressed by host:port rather than co-located on
/// disk): piped on stdin with `--input-filter` declaring the extension,
/// since `unoconv` can't sniff a format from an anonymous stream.
async fn convert_from_stdin(
    src: &std::path::Path,
    extension: &str,
    dest: &std::path::Path,
    connection: &str,
    timeout: Duration,
) -> Result<()> {
    let bytes = tokio::fs::read(src).await?;

    let mut cmd = base_command(dest, connection);
    cmd.args(["--input-filter".into(), extension.to_string()]);
    cmd.arg("-"); // read the document from stdin
    cmd.stdin(std::process::Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| MediaError::transport(format!("failed to spawn unoconv: {e}")))?;
    let mut stdin = child.stdin.take().expect("stdin was configured as piped");
    let write = async {
        stdin.write_all(&bytes).await?;
        stdin.shutdown().await
    };
    tokio::time::timeout(timeout, write)
        .await
        .map_err(|_| MediaError::transport("office conversion timed out writing stdin"))?
        .map_err(|e| MediaError::transport(format!("failed to write document to unoconv stdin: {e}")))?;
    drop(stdin);

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| MediaError::transport("office conversion timed out"))?
        .map_err(|e| MediaError::transport(format!("failed to wait for unoconv: {e}")))?;
    check_status(&output)
}

fn base_command(dest: &std::path::Path, connection: &str) -> Command {
    let mut cmd = Command::new("unoconv");
    cmd.args([
        "--connection".into(),
        connection.to_string(),
        "--format".into(),
        "pdf".into(),
        "--output".into(),
        dest.display().to_string(),
    ]);
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd
}

async fn run(mut cmd: Command, timeout: Duration) -> Result<()> {
    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| MediaError::transport("office conversion timed out"))?
        .map_err(|e| MediaError::transport(format!("failed to spawn unoconv: {e}")))?;
    check_status(&output)
}

fn check_status(output: &std::process::Output) -> Result<()> {
    if !output.status.success() {
        return Err(MediaError::transport(format!(
            "unoconv exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}
