//! # Platform-specific utilities
//!
//! Questo modulo centralizza i nomi dei comandi esterni (ffmpeg, ffprobe)
//! per i diversi sistemi operativi, la verifica della loro presenza e la
//! terminazione forzata di un processo (segnale diretto su unix, `taskkill`
//! su Windows).

use std::collections::HashMap;
use std::sync::OnceLock;

/// Platform-specific command names
pub struct PlatformCommands {
    commands: HashMap<&'static str, &'static str>,
    which_command: &'static str,
}

impl PlatformCommands {
    /// Get the singleton instance
    pub fn instance() -> &'static Self {
        static INSTANCE: OnceLock<PlatformCommands> = OnceLock::new();
        INSTANCE.get_or_init(Self::new)
    }

    fn new() -> Self {
        let mut commands = HashMap::new();
        let which_command = if cfg!(windows) {
            commands.insert("ffmpeg", "ffmpeg.exe");
            commands.insert("ffprobe", "ffprobe.exe");
            commands.insert("kill", "taskkill");
            "where"
        } else {
            commands.insert("ffmpeg", "ffmpeg");
            commands.insert("ffprobe", "ffprobe");
            "which"
        };

        Self {
            commands,
            which_command,
        }
    }

    /// Get the platform-specific command name
    pub fn get_command<'a>(&self, base_name: &'a str) -> &'a str {
        self.commands.get(base_name).copied().unwrap_or(base_name)
    }

    /// Check if a program can be found by name or path
    pub async fn is_command_available(&self, program: &str) -> bool {
        if std::path::Path::new(program).components().count() > 1 {
            return std::path::Path::new(program).is_file();
        }

        let result = tokio::process::Command::new(self.which_command)
            .arg(self.get_command(program))
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await;

        matches!(result, Ok(status) if status.success())
    }

    /// Forcibly terminate a process by id. Synchronous: it runs right before
    /// the program exits.
    #[cfg(unix)]
    pub fn kill_process(&self, pid: u32) -> std::io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let raw = i32::try_from(pid).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("pid {} out of range", pid))
        })?;
        kill(Pid::from_raw(raw), Signal::SIGKILL)?;
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn kill_process(&self, pid: u32) -> std::io::Result<()> {
        let status = std::process::Command::new(self.get_command("kill"))
            .args(["/F", "/T", "/PID", &pid.to_string()])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("taskkill exited with {}", status),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_commands() {
        let platform = PlatformCommands::instance();
        assert!(platform.get_command("ffmpeg").starts_with("ffmpeg"));
        assert_eq!(platform.get_command("something-else"), "something-else");
    }

    #[tokio::test]
    async fn test_missing_path_is_unavailable() {
        let platform = PlatformCommands::instance();
        assert!(!platform.is_command_available("/definitely/not/here/ffmpeg").await);
    }

    #[cfg(unix)]
    #[test]
    fn test_kill_process_sends_sigkill() {
        use std::os::unix::process::ExitStatusExt;

        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();

        PlatformCommands::instance().kill_process(child.id()).unwrap();

        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(9));
    }
}
