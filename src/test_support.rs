//! Stand-ins for ffprobe/ffmpeg used by the unit tests.
//!
//! The scripts pick their behavior from the file name they are given:
//! `crash` makes the transcoder fail, `slow` hangs it, `bloat` produces an
//! output larger than the input, `truncated` yields a short output duration,
//! `unprobeable` makes the probe fail and `portrait` reports a tall video.
//! The transcoder saves its arguments next to its output, as `<out>.args`
//! with the output extension replaced.

use crate::config::Config;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::TempDir;

const FAKE_FFPROBE: &str = r#"#!/bin/sh
for last; do :; done
case "$last" in
  *unprobeable*) echo "Invalid data found when processing input" >&2; exit 1 ;;
  */scratch/*truncated*) printf '1920\n1080\n4.000000\n' ;;
  *portrait*) printf '1080\n1920\n10.000000\n' ;;
  *) printf '1920\n1080\n10.000000\n' ;;
esac
"#;

const FAKE_FFMPEG: &str = r#"#!/bin/sh
in=""
prev=""
for arg; do
  if [ "$prev" = "-i" ]; then in="$arg"; fi
  prev="$arg"
  out="$arg"
done
printf '%s\n' "$*" > "${out%.*}.args"
printf 'ffmpeg version fake\n' >&2
case "$in" in
  *crash*) printf 'Invalid data found when processing input\n' >&2; exit 1 ;;
esac
printf 'frame=   10 fps=0.0 q=28.0 size=       0kB time=00:00:02.50 bitrate=N/A speed=5x    \r' >&2
case "$in" in
  *slow*) exec sleep 30 ;;
esac
printf 'frame=   20 fps=0.0 q=28.0 size=       0kB time=00:00:05.00 bitrate=N/A speed=5x    \r' >&2
printf 'Press [q] to stop\r' >&2
case "$in" in
  *bloat*) cat "$in" "$in" > "$out" ;;
  *) head -c 100 "$in" > "$out" ;;
esac
printf 'frame=   40 fps=0.0 q=-1.0 Lsize=       1kB time=00:00:10.00 bitrate=0.8kbits/s speed=5x    \n' >&2
"#;

struct FakeTools {
    _dir: TempDir,
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

/// Scripts are written once per test binary, so no test ever executes a file
/// another thread is still writing.
fn fake_tools() -> &'static FakeTools {
    static TOOLS: OnceLock<FakeTools> = OnceLock::new();
    TOOLS.get_or_init(|| {
        let dir = TempDir::new().unwrap();
        let ffmpeg = write_script(dir.path(), "ffmpeg", FAKE_FFMPEG);
        let ffprobe = write_script(dir.path(), "ffprobe", FAKE_FFPROBE);
        FakeTools {
            _dir: dir,
            ffmpeg,
            ffprobe,
        }
    })
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Config rooted at `root` (`src`, `dst`, `scratch`) using the fake tools
pub fn fake_tools_config(root: &Path) -> Config {
    let tools = fake_tools();
    Config {
        src_dir: root.join("src"),
        dst_dir: root.join("dst"),
        tmp_dir: root.join("scratch"),
        ffmpeg_path: tools.ffmpeg.to_string_lossy().into_owned(),
        ffprobe_path: tools.ffprobe.to_string_lossy().into_owned(),
        ..Default::default()
    }
}

/// Write `len` bytes of filler to `path`, creating parent directories
pub fn write_bytes(path: &Path, len: usize) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(path, bytes).unwrap();
}
