//! Process-isolated candidates.
//!
//! The candidate is an executable. At load time it is copied into a private
//! directory named after the module key, so later writes to the original path
//! cannot change what this evaluation runs. Each `build_kernel` spawns the
//! snapshot, writes the `KernelParams` as JSON on stdin and expects a
//! `BuiltKernel` JSON document on stdout. Crashes and hangs stay in the child.
use crate::{content_hash, CandidateLoader};
use anyhow::{bail, Context};
use cascade_core::{
    BuiltKernel, DebugInfo, Instruction, KernelBuilder, KernelParams, LoadError, LoadedCandidate,
    ModuleKey, ProcessConfig,
};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const SPAWN_RETRIES: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct ProcessLoader {
    timeout: Option<Duration>,
}

impl ProcessLoader {
    pub fn new(config: &ProcessConfig) -> Self {
        Self {
            timeout: config.build_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

struct Snapshot {
    _dir: TempDir,
    exe: PathBuf,
}

impl CandidateLoader for ProcessLoader {
    fn load(&self, path: &Path, key: &ModuleKey) -> Result<LoadedCandidate, LoadError> {
        let bytes = crate::read_candidate(path)?;
        ensure_executable(path)?;

        let unreadable = |reason: String| LoadError::Unreadable {
            path: path.to_path_buf(),
            reason,
        };
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", key))
            .tempdir()
            .map_err(|e| unreadable(e.to_string()))?;
        let exe = dir.path().join(
            path.file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "candidate".into()),
        );
        std::fs::write(&exe, &bytes).map_err(|e| unreadable(e.to_string()))?;
        mark_executable(&exe).map_err(|e| unreadable(e.to_string()))?;

        tracing::debug!("snapshotted {} to {} as {}", path.display(), exe.display(), key);

        let snapshot = Arc::new(Snapshot { _dir: dir, exe });
        let timeout = self.timeout;
        Ok(LoadedCandidate::new(
            key.clone(),
            path,
            content_hash(&bytes),
            Arc::new(move || {
                Box::new(ProcessKernelBuilder {
                    snapshot: Arc::clone(&snapshot),
                    timeout,
                    built: None,
                }) as Box<dyn KernelBuilder>
            }),
        ))
    }
}

#[cfg(unix)]
fn ensure_executable(path: &Path) -> Result<(), LoadError> {
    use std::os::unix::fs::PermissionsExt;
    let meta = std::fs::metadata(path).map_err(|e| LoadError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !meta.is_file() || meta.permissions().mode() & 0o111 == 0 {
        return Err(LoadError::NotExecutable(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_executable(path: &Path) -> Result<(), LoadError> {
    if !path.is_file() {
        return Err(LoadError::NotExecutable(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

struct ProcessKernelBuilder {
    snapshot: Arc<Snapshot>,
    timeout: Option<Duration>,
    built: Option<BuiltKernel>,
}

impl KernelBuilder for ProcessKernelBuilder {
    fn build_kernel(&mut self, params: &KernelParams) -> anyhow::Result<()> {
        let request = serde_json::to_vec(params)?;
        let mut child = spawn(&self.snapshot.exe)?;

        if let Some(mut stdin) = child.stdin.take() {
            // The candidate may exit without reading its input.
            let _ = stdin.write_all(&request);
        }
        let stdout = read_in_background(child.stdout.take());
        let stderr = read_in_background(child.stderr.take());

        let status = wait_with_timeout(&mut child, self.timeout)?;
        let stdout = stdout.join().unwrap_or_default();
        let stderr = String::from_utf8_lossy(&stderr.join().unwrap_or_default()).trim().to_string();

        if !status.success() {
            bail!("candidate exited with {}: {}", status, stderr);
        }

        let kernel: BuiltKernel = serde_json::from_slice(&stdout)
            .context("candidate wrote malformed kernel output")?;
        self.built = Some(kernel);
        Ok(())
    }

    fn instrs(&self) -> &[Instruction] {
        self.built.as_ref().map(|k| k.instrs.as_slice()).unwrap_or(&[])
    }

    fn debug_info(&self) -> DebugInfo {
        self.built.as_ref().map(|k| k.debug_info.clone()).unwrap_or_default()
    }
}

fn spawn(exe: &Path) -> anyhow::Result<Child> {
    let mut attempt = 0;
    loop {
        let result = Command::new(exe)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        match result {
            Ok(child) => return Ok(child),
            // ETXTBSY: a concurrent fork still holds the freshly written snapshot open.
            Err(e) if e.raw_os_error() == Some(26) && attempt < SPAWN_RETRIES => {
                attempt += 1;
                thread::sleep(Duration::from_millis(10 * attempt as u64));
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to spawn {}", exe.display()));
            }
        }
    }
}

fn read_in_background<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>) -> anyhow::Result<ExitStatus> {
    let Some(limit) = timeout else {
        return child.wait().context("waiting for candidate");
    };
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait().context("polling candidate")? {
            return Ok(status);
        }
        if started.elapsed() >= limit {
            let _ = child.kill();
            let _ = child.wait();
            bail!("candidate build timed out after {}ms", limit.as_millis());
        }
        thread::sleep(Duration::from_millis(5));
    }
}
