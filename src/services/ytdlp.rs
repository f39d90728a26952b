use std::env;
use std::path::{Path, PathBuf};
use tokio::process::Command;

#[cfg(windows)]
const BINARY_NAME: &str = "yt-dlp.exe";
#[cfg(not(windows))]
const BINARY_NAME: &str = "yt-dlp";

/// How the extraction tool should be invoked for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    /// Single consolidated JSON document for a video or channel URL.
    Lookup,
    /// Flat-playlist summary, cheap, used only to read a total item count.
    CountProbe,
    /// One JSON document per playlist item, emitted incrementally and
    /// continuing past per-item errors.
    Full { descriptions: bool },
}

/// Wrapper around the yt-dlp executable. Builds ready-to-spawn commands;
/// interpreting failures is the caller's job, no retries happen here.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
}

impl YtDlp {
    /// Prefer a binary colocated with the running executable, so a privately
    /// installed yt-dlp wins over a global one; fall back to PATH resolution.
    pub fn resolve() -> Self {
        if let Ok(exe) = env::current_exe() {
            if let Some(dir) = exe.parent() {
                let sibling = dir.join(BINARY_NAME);
                if is_executable(&sibling) {
                    return YtDlp { program: sibling };
                }
            }
        }
        YtDlp {
            program: PathBuf::from(BINARY_NAME),
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        YtDlp {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn command(&self, url: &str, mode: ExtractMode) -> Command {
        let mut cmd = Command::new(&self.program);
        match mode {
            ExtractMode::Lookup => {
                cmd.args(["--dump-single-json", "--playlist-items", "0", "--no-warnings"]);
            }
            ExtractMode::CountProbe => {
                cmd.args(["--flat-playlist", "--dump-single-json", "--no-warnings"]);
            }
            ExtractMode::Full { descriptions: true } => {
                cmd.args(["--dump-json", "--no-download", "--no-warnings", "--ignore-errors"]);
            }
            ExtractMode::Full { descriptions: false } => {
                cmd.args(["--flat-playlist", "--dump-json", "--no-warnings", "--ignore-errors"]);
            }
        }
        cmd.arg(url);
        cmd
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn lookup_requests_one_consolidated_document() {
        let tool = YtDlp::with_program("yt-dlp");
        let cmd = tool.command("https://youtube.com/@chan", ExtractMode::Lookup);
        let args = args_of(&cmd);
        assert_eq!(
            args,
            vec![
                "--dump-single-json",
                "--playlist-items",
                "0",
                "--no-warnings",
                "https://youtube.com/@chan"
            ]
        );
    }

    #[test]
    fn count_probe_stays_flat() {
        let tool = YtDlp::with_program("yt-dlp");
        let args = args_of(&tool.command("u", ExtractMode::CountProbe));
        assert!(args.contains(&"--flat-playlist".to_string()));
        assert!(args.contains(&"--dump-single-json".to_string()));
        assert!(!args.contains(&"--ignore-errors".to_string()));
    }

    #[test]
    fn full_extraction_ignores_per_item_errors() {
        let tool = YtDlp::with_program("yt-dlp");
        let with_desc = args_of(&tool.command("u", ExtractMode::Full { descriptions: true }));
        assert!(with_desc.contains(&"--dump-json".to_string()));
        assert!(with_desc.contains(&"--ignore-errors".to_string()));
        assert!(!with_desc.contains(&"--flat-playlist".to_string()));

        let flat = args_of(&tool.command("u", ExtractMode::Full { descriptions: false }));
        assert!(flat.contains(&"--flat-playlist".to_string()));
        assert!(flat.contains(&"--ignore-errors".to_string()));
    }

    #[test]
    fn resolve_falls_back_to_path_lookup() {
        // No sibling binary in the test environment, so the bare name is used.
        let tool = YtDlp::resolve();
        assert!(!tool.program().as_os_str().is_empty());
    }
}
