//! # Video Processing Module
//!
//! Questo modulo gestisce la riduzione dei video tramite processi esterni.
//!
//! ## Responsabilità:
//! - Analisi dimensioni/durata con ffprobe
//! - Compressione con ffmpeg (libx264, CRF configurabile)
//! - Lettura in streaming del progresso dallo stderr di ffmpeg
//! - Verifica della durata dell'output (tolleranza 1 secondo)
//! - Timeout e cancellazione dei processi figli
//!
//! ## Pipeline di compressione:
//! 1. Probe della sorgente (senza durata non si può procedere)
//! 2. Larghezza target: 1080 per video orizzontali/quadrati, 720 per verticali;
//!    il filtro di scala viene aggiunto solo se la sorgente è più larga
//! 3. ffmpeg scrive sul path temporaneo; ogni riga di stato (terminata da `\r`)
//!    contiene `time=HH:MM:SS.cc` da cui si calcola la percentuale
//! 4. Lo stato di uscita di ffmpeg decide successo o fallimento
//! 5. Probe dell'output e confronto delle durate
//!
//! ## Protocollo di progresso:
//! ```text
//! frame=  240 fps= 48 q=28.0 size=    1024kB time=00:00:08.00 bitrate=1048.6kbits/s speed=1.6x \r
//! ```
//! Righe senza `time=` o senza spazio finale vengono loggate e saltate.
//!
//! ## Dipendenze richieste:
//! - `ffmpeg`: Compressione video
//! - `ffprobe`: Analisi proprietà video

use crate::config::Config;
use crate::error::ShrinkError;
use crate::media::ProcessingRequest;
use crate::platform::PlatformCommands;
use crate::process_registry::ProcessRegistry;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Largest accepted difference between source and output durations, in seconds
pub const DURATION_TOLERANCE: f64 = 1.0;

const LANDSCAPE_WIDTH: u32 = 1080;
const PORTRAIT_WIDTH: u32 = 720;

/// Lines of non-progress transcoder output kept for error messages
const STDERR_TAIL_LINES: usize = 8;

/// Dimensions and duration reported by the probe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoSize {
    pub width: u32,
    pub height: u32,
    /// In seconds
    pub duration: f64,
}

/// One parsed transcoder status line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoProgress {
    /// Seconds of video encoded so far
    pub processed: f64,
    pub percentage: f64,
}

/// Why a status line carried no usable timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressLineError {
    NoMarker,
    Unterminated,
}

/// Handles video shrinking
pub struct VideoProcessor {
    ffmpeg: String,
    ffprobe: String,
    crf: u8,
    timeout: Option<Duration>,
    registry: ProcessRegistry,
}

impl VideoProcessor {
    pub fn new(config: &Config, registry: ProcessRegistry) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            ffprobe: config.ffprobe_path.clone(),
            crf: config.video_crf,
            timeout: config.video_timeout(),
            registry,
        }
    }

    /// Shrink one video into `request.output_path`, reporting every parsed
    /// status line through `on_progress`.
    pub async fn shrink<F>(&self, request: &ProcessingRequest, mut on_progress: F) -> Result<(), ShrinkError>
    where
        F: FnMut(VideoProgress),
    {
        let source = self
            .probe(&request.input_path)
            .await
            .map_err(|e| with_probe_context(e, "Probing video size failed"))?;

        let target = target_width(source.width, source.height);
        let args = transcode_args(&request.input_path, &request.output_path, source.width, target, self.crf);
        debug!("{} {:?}", self.ffmpeg, args);

        let mut stop = self.registry.subscribe();
        self.ensure_not_cancelled("ffmpeg")?;
        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ShrinkError::TranscodeProcess(format!("Failed to launch {}: {}", self.ffmpeg, e)))?;

        let _registered = child
            .id()
            .map(|pid| self.registry.register(pid, format!("ffmpeg {}", request.input_path.display())));

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ShrinkError::TranscodeProcess("ffmpeg stderr was not captured".to_string()))?;

        let started = Instant::now();
        let run = async {
            let tail = read_progress(stderr, source.duration, &mut on_progress).await;
            (child.wait().await, tail)
        };

        let (status, tail) = match self.supervise(run, &mut stop, "ffmpeg").await {
            Ok(finished) => finished,
            Err(e) => {
                let _ = child.kill().await;
                return Err(e);
            }
        };

        let status = status
            .map_err(|e| ShrinkError::TranscodeProcess(format!("ffmpeg did not close properly: {}", e)))?;
        if !status.success() {
            return Err(ShrinkError::TranscodeProcess(format!(
                "ffmpeg exited with {}: {}",
                status,
                tail.join(" | ")
            )));
        }

        info!(
            "Transcoded {} in {:.1}s",
            request.input_path.display(),
            started.elapsed().as_secs_f64()
        );

        let output = self.probe(&request.output_path).await.map_err(|e| {
            with_probe_context(e, "Conversion appears to have failed because ffprobe failed")
        })?;

        if !durations_roughly_equal(source.duration, output.duration) {
            return Err(ShrinkError::DurationMismatch {
                expected: source.duration,
                actual: output.duration,
            });
        }

        Ok(())
    }

    /// Query width, height and duration of the first video stream
    pub async fn probe(&self, path: &Path) -> Result<VideoSize, ShrinkError> {
        //    ffprobe -v fatal -select_streams v:0 -show_entries stream=width,height,duration \
        //            -of default=noprint_wrappers=1:nokey=1 VID_20191207_115139.mp4
        //    1920
        //    1080
        //    75.049911
        let mut stop = self.registry.subscribe();
        self.ensure_not_cancelled("ffprobe")?;
        let child = Command::new(&self.ffprobe)
            .args([
                "-v", "fatal",
                "-select_streams", "v:0",
                "-show_entries", "stream=width,height,duration",
                "-of", "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ShrinkError::Probe(format!("Failed to execute {}: {}", self.ffprobe, e)))?;

        let _registered = child
            .id()
            .map(|pid| self.registry.register(pid, format!("ffprobe {}", path.display())));

        let output = self
            .supervise(child.wait_with_output(), &mut stop, "ffprobe")
            .await?
            .map_err(|e| ShrinkError::Probe(format!("ffprobe command failed with: {}", e)))?;

        if !output.status.success() {
            return Err(ShrinkError::Probe(format!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_probe_output(&String::from_utf8_lossy(&output.stdout)).map_err(ShrinkError::Probe)
    }

    /// Names of the external tools that cannot be found
    pub async fn missing_dependencies(&self) -> Vec<String> {
        let platform = PlatformCommands::instance();
        let mut missing = Vec::new();
        for tool in [&self.ffmpeg, &self.ffprobe] {
            if !platform.is_command_available(tool).await {
                missing.push(tool.clone());
            }
        }
        missing
    }

    fn ensure_not_cancelled(&self, what: &str) -> Result<(), ShrinkError> {
        if self.registry.is_cancelled() {
            Err(ShrinkError::Cancelled(what.to_string()))
        } else {
            Ok(())
        }
    }

    /// Race `fut` against cancellation and the configured timeout
    async fn supervise<T>(
        &self,
        fut: impl Future<Output = T>,
        stop: &mut broadcast::Receiver<()>,
        what: &str,
    ) -> Result<T, ShrinkError> {
        let timeout = self.timeout;
        let expired = async move {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        // Cancellation wins over a child that exited because it was killed
        tokio::select! {
            biased;
            _ = stop.recv() => Err(ShrinkError::Cancelled(what.to_string())),
            _ = expired => Err(ShrinkError::Timeout {
                what: what.to_string(),
                secs: timeout.map(|t| t.as_secs()).unwrap_or_default(),
            }),
            out = fut => Ok(out),
        }
    }
}

/// Prefix probe failures; timeouts and cancellations pass through untouched
fn with_probe_context(err: ShrinkError, context: &str) -> ShrinkError {
    match err {
        ShrinkError::Probe(message) => ShrinkError::Probe(format!("{}: {}", context, message)),
        other => other,
    }
}

/// Read carriage-return separated status lines until end of stream.
///
/// Returns the last few lines that were not status lines, for error reports.
pub async fn read_progress<R, F>(stream: R, total_duration: f64, on_progress: &mut F) -> Vec<String>
where
    R: AsyncRead + Unpin,
    F: FnMut(VideoProgress),
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

    loop {
        buf.clear();
        match reader.read_until(b'\r', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                // Not necessarily a failed conversion; the exit status decides
                warn!("I/O error while reading transcoder output: {}", e);
                break;
            }
        }

        let chunk = String::from_utf8_lossy(&buf);
        let timestamp = match extract_timestamp(&chunk) {
            Ok(timestamp) => timestamp,
            Err(reason) => {
                debug!("Skipping transcoder line ({:?}): {}", reason, chunk.trim());
                for line in chunk.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line.to_string());
                }
                continue;
            }
        };

        let Some(processed) = parse_ff_time(timestamp) else {
            debug!("Could not parse timestamp: {}", timestamp);
            continue;
        };

        let percentage = if total_duration > 0.0 {
            processed / total_duration * 100.0
        } else {
            0.0
        };
        on_progress(VideoProgress { processed, percentage });
    }

    tail.into_iter().collect()
}

/// Value after the last `time=` marker, up to the next space
pub fn extract_timestamp(line: &str) -> Result<&str, ProgressLineError> {
    let start = line.rfind("time=").ok_or(ProgressLineError::NoMarker)? + "time=".len();
    let rest = &line[start..];
    let end = rest.find(' ').ok_or(ProgressLineError::Unterminated)?;
    Ok(&rest[..end])
}

/// Parse `HH:MM:SS.cc` into seconds. The fraction is taken as centiseconds.
pub fn parse_ff_time(ts: &str) -> Option<f64> {
    let mut parts = ts.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let (seconds, centis) = match seconds_part.split_once('.') {
        Some((seconds, centis)) => (seconds.parse::<u64>().ok()?, centis.parse::<u64>().ok()?),
        None => (seconds_part.parse::<u64>().ok()?, 0),
    };

    Some(centis as f64 / 100.0 + (seconds + minutes * 60 + hours * 3600) as f64)
}

/// Parse the three lines printed by the probe: width, height, duration
pub fn parse_probe_output(output: &str) -> Result<VideoSize, String> {
    let mut fields = output.split_whitespace();
    let mut next = |name: &str| {
        fields
            .next()
            .ok_or_else(|| format!("ffprobe output parsing failed: missing {}", name))
    };

    let width = next("width")?;
    let height = next("height")?;
    let duration = next("duration")?;

    let width = width
        .parse()
        .map_err(|_| format!("ffprobe output parsing failed: bad width {:?}", width))?;
    let height = height
        .parse()
        .map_err(|_| format!("ffprobe output parsing failed: bad height {:?}", height))?;
    let duration: f64 = duration
        .parse()
        .map_err(|_| format!("ffprobe output parsing failed: bad duration {:?}", duration))?;

    Ok(VideoSize { width, height, duration })
}

/// Output width for a source: 720 for portrait sources, 1080 otherwise
pub fn target_width(width: u32, height: u32) -> u32 {
    if width < height {
        PORTRAIT_WIDTH
    } else {
        LANDSCAPE_WIDTH
    }
}

/// Transcoder arguments; the scale filter is only added when shrinking
pub fn transcode_args(input: &Path, output: &Path, source_width: u32, target_width: u32, crf: u8) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-nostdin".into(), "-y".into(), "-i".into(), input.into()];
    if source_width > target_width {
        args.push("-vf".into());
        args.push(format!("scale={}:-2", target_width).into());
    }
    for arg in ["-c:v", "libx264", "-crf"] {
        args.push(arg.into());
    }
    args.push(crf.to_string().into());
    args.push(output.into());
    args
}

pub fn durations_roughly_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < DURATION_TOLERANCE
}

/// `HH:MM:SS` for elapsed times
pub fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ff_time() {
        let parsed = parse_ff_time("00:00:41.36").unwrap();
        assert!((parsed - 41.36).abs() < 1e-9);
        assert_eq!(parse_ff_time("01:02:03.50"), Some(3723.5));
        assert_eq!(parse_ff_time("00:00:07"), Some(7.0));
        assert_eq!(parse_ff_time("N/A"), None);
        assert_eq!(parse_ff_time("-00:00:00.02"), None);
        assert_eq!(parse_ff_time("00:00"), None);
    }

    #[test]
    fn test_extract_timestamp() {
        let line = "frame=  240 fps= 48 q=28.0 size=    1024kB time=00:00:08.00 bitrate=1048.6kbits/s speed=1.6x    \r";
        assert_eq!(extract_timestamp(line), Ok("00:00:08.00"));

        assert_eq!(extract_timestamp("Press [q] to stop\r"), Err(ProgressLineError::NoMarker));
        assert_eq!(extract_timestamp("size=0kB time=00:00:01.00"), Err(ProgressLineError::Unterminated));

        // The last marker wins when the header and a status line share a chunk
        let chunk = "Stream mapping: time=bogus x\nframe=1 time=00:00:00.40 bitrate=N/A\r";
        assert_eq!(extract_timestamp(chunk), Ok("00:00:00.40"));
    }

    #[test]
    fn test_parse_probe_output() {
        let size = parse_probe_output("1920\n1080\n75.049911\n").unwrap();
        assert_eq!(size, VideoSize { width: 1920, height: 1080, duration: 75.049911 });

        assert!(parse_probe_output("1920\n1080\nN/A\n").is_err());
        assert!(parse_probe_output("").is_err());
    }

    #[test]
    fn test_target_width_never_upscales() {
        assert_eq!(target_width(1920, 1080), 1080);
        assert_eq!(target_width(1000, 1000), 1080);
        assert_eq!(target_width(1080, 1920), 720);

        let args = transcode_args(Path::new("in.mp4"), Path::new("out.mp4"), 1920, 1080, 26);
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            ["-nostdin", "-y", "-i", "in.mp4", "-vf", "scale=1080:-2", "-c:v", "libx264", "-crf", "26", "out.mp4"]
        );

        let args = transcode_args(Path::new("in.mp4"), Path::new("out.mp4"), 640, 1080, 26);
        assert!(!args.iter().any(|a| a == "-vf"));
    }

    #[test]
    fn test_durations_and_time_format() {
        assert!(durations_roughly_equal(10.0, 10.9));
        assert!(!durations_roughly_equal(10.0, 11.0));
        assert_eq!(format_time(3725.9), "01:02:05");
    }

    #[tokio::test]
    async fn test_read_progress_skips_malformed_lines() {
        let stderr: &[u8] = b"ffmpeg version 6.0\nInput #0, mov,mp4\r\
            frame=  10 size=0kB time=00:00:02.50 bitrate=N/A\r\
            frame=  15 size=0kB time=N/A bitrate=N/A\r\
            frame=  20 size=0kB time=00:00:05.00 bitrate=N/A\r\
            frame=  30 size=0kB time=00:00:07.50\r\
            frame=  40 size=9kB time=00:00:10.00 bitrate=N/A\n";

        let mut seen = Vec::new();
        let tail = read_progress(stderr, 10.0, &mut |p: VideoProgress| seen.push(p)).await;

        let percentages: Vec<f64> = seen.iter().map(|p| p.percentage).collect();
        assert_eq!(percentages, [25.0, 50.0, 100.0]);
        assert_eq!(seen[1].processed, 5.0);
        assert!(tail.iter().any(|l| l.contains("ffmpeg version")));
    }

    #[cfg(unix)]
    mod with_fake_tools {
        use super::*;
        use crate::test_support::{fake_tools_config, write_bytes};
        use tempfile::TempDir;

        fn processor(config: &Config) -> VideoProcessor {
            VideoProcessor::new(config, ProcessRegistry::new())
        }

        fn request(dir: &TempDir, name: &str) -> ProcessingRequest {
            let input = dir.path().join("src").join(name);
            write_bytes(&input, 4096);
            let scratch = dir.path().join("scratch");
            std::fs::create_dir_all(&scratch).unwrap();
            ProcessingRequest {
                input_path: input,
                output_path: scratch.join(name),
            }
        }

        #[tokio::test]
        async fn test_shrink_reports_progress() {
            let dir = TempDir::new().unwrap();
            let config = fake_tools_config(dir.path());
            let request = request(&dir, "a.mp4");

            let mut percentages = Vec::new();
            processor(&config)
                .shrink(&request, |p| percentages.push(p.percentage))
                .await
                .unwrap();

            assert_eq!(percentages, [25.0, 50.0, 100.0]);
            assert!(request.output_path.exists());
        }

        #[tokio::test]
        async fn test_failed_transcoder_is_transcode_failure() {
            let dir = TempDir::new().unwrap();
            let config = fake_tools_config(dir.path());
            let request = request(&dir, "crash.mp4");

            let err = processor(&config).shrink(&request, |_| {}).await.unwrap_err();

            match err {
                ShrinkError::TranscodeProcess(message) => assert!(message.contains("Invalid data")),
                other => panic!("unexpected error {:?}", other),
            }
            assert!(!request.output_path.exists());
        }

        #[tokio::test]
        async fn test_short_output_is_duration_mismatch() {
            let dir = TempDir::new().unwrap();
            let config = fake_tools_config(dir.path());
            let request = request(&dir, "truncated.mp4");

            let err = processor(&config).shrink(&request, |_| {}).await.unwrap_err();
            assert_eq!(err, ShrinkError::DurationMismatch { expected: 10.0, actual: 4.0 });
        }

        #[tokio::test]
        async fn test_unprobeable_source_aborts_before_transcoding() {
            let dir = TempDir::new().unwrap();
            let config = fake_tools_config(dir.path());
            let request = request(&dir, "unprobeable.mp4");

            let err = processor(&config).shrink(&request, |_| {}).await.unwrap_err();
            assert!(matches!(err, ShrinkError::Probe(_)), "{:?}", err);
            assert!(!request.output_path.exists());
        }

        #[tokio::test]
        async fn test_hung_transcoder_times_out() {
            let dir = TempDir::new().unwrap();
            let mut config = fake_tools_config(dir.path());
            config.video_timeout_secs = Some(1);
            let request = request(&dir, "slow.mp4");

            let registry = ProcessRegistry::new();
            let processor = VideoProcessor::new(&config, registry.clone());
            let err = processor.shrink(&request, |_| {}).await.unwrap_err();

            assert_eq!(err, ShrinkError::Timeout { what: "ffmpeg".into(), secs: 1 });
            assert!(registry.running().is_empty());
        }

        #[tokio::test]
        async fn test_cancelled_registry_spawns_nothing() {
            let dir = TempDir::new().unwrap();
            let config = fake_tools_config(dir.path());
            let request = request(&dir, "a.mp4");

            let registry = ProcessRegistry::new();
            registry.kill_all();
            let processor = VideoProcessor::new(&config, registry.clone());

            let err = processor.shrink(&request, |_| {}).await.unwrap_err();
            assert!(matches!(err, ShrinkError::Cancelled(_)), "{:?}", err);
            assert!(!request.output_path.exists());
        }

        #[tokio::test]
        async fn test_portrait_video_is_scaled_to_portrait_width() {
            let dir = TempDir::new().unwrap();
            let config = fake_tools_config(dir.path());
            let request = request(&dir, "portrait.mp4");

            processor(&config).shrink(&request, |_| {}).await.unwrap();

            let args = std::fs::read_to_string(request.output_path.with_extension("args")).unwrap();
            assert!(args.contains("-vf scale=720:-2"), "{}", args);
        }

        #[tokio::test]
        async fn test_landscape_video_is_scaled_to_landscape_width() {
            let dir = TempDir::new().unwrap();
            let config = fake_tools_config(dir.path());
            let request = request(&dir, "a.mp4");

            processor(&config).shrink(&request, |_| {}).await.unwrap();

            let args = std::fs::read_to_string(request.output_path.with_extension("args")).unwrap();
            assert!(args.contains("-vf scale=1080:-2"), "{}", args);
        }

        #[tokio::test]
        async fn test_missing_transcoder_is_launch_failure() {
            let dir = TempDir::new().unwrap();
            let mut config = fake_tools_config(dir.path());
            config.ffmpeg_path = dir.path().join("no-ffmpeg").to_string_lossy().into_owned();
            let request = request(&dir, "a.mp4");

            let processor = processor(&config);
            let err = processor.shrink(&request, |_| {}).await.unwrap_err();
            assert!(matches!(err, ShrinkError::TranscodeProcess(_)));
            assert_eq!(processor.missing_dependencies().await, vec![config.ffmpeg_path.clone()]);
        }
    }
}
