use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use shorts_config::RenderSettings;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::{CanvasConfig, RenderError, Renderer, TimedImage};

/// Renders with the `ffmpeg` binary.
pub struct FfmpegRenderer {
    ffmpeg: PathBuf,
    http: reqwest::Client,
}

impl FfmpegRenderer {
    pub fn new(settings: &RenderSettings) -> Self {
        Self {
            ffmpeg: PathBuf::from(&settings.ffmpeg_path),
            http: reqwest::Client::new(),
        }
    }

    async fn run(&self, args: Vec<OsString>, cancel: &CancellationToken) -> Result<(), RenderError> {
        let mut command = Command::new(&self.ffmpeg);
        command
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .args(args)
            .kill_on_drop(true);

        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(RenderError::Cancelled),
            output = command.output() => output?,
        };

        if !output.status.success() {
            return Err(RenderError::Ffmpeg {
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            });
        }
        Ok(())
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), RenderError> {
        let fetch = async {
            self.http
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await
        };
        let bytes = tokio::select! {
            _ = cancel.cancelled() => return Err(RenderError::Cancelled),
            bytes = fetch => bytes.map_err(|source| RenderError::Download {
                url: url.to_string(),
                source,
            })?,
        };
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }

    async fn render_clip(
        &self,
        image: &Path,
        clip: &Path,
        seconds: f64,
        canvas: &CanvasConfig,
        cancel: &CancellationToken,
    ) -> Result<(), RenderError> {
        let frames = frame_count(seconds, canvas.fps);
        let args: Vec<OsString> = vec![
            "-i".into(),
            image.into(),
            "-vf".into(),
            clip_filter(canvas, seconds).into(),
            "-frames:v".into(),
            frames.to_string().into(),
            "-c:v".into(),
            "libx264".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            clip.into(),
        ];
        self.run(args, cancel).await
    }

    async fn compose(
        &self,
        images: &[TimedImage],
        per_image_secs: f64,
        canvas: &CanvasConfig,
        work_dir: &Path,
        cancel: &CancellationToken,
        scratch: &mut Vec<PathBuf>,
    ) -> Result<PathBuf, RenderError> {
        let mut clips = Vec::with_capacity(images.len());
        for (i, image) in images.iter().enumerate() {
            let still = work_dir.join(format!("image_{i}.jpg"));
            scratch.push(still.clone());
            self.download(&image.url, &still, cancel).await?;

            let clip = work_dir.join(format!("clip_{i}.mp4"));
            scratch.push(clip.clone());
            self.render_clip(&still, &clip, per_image_secs, canvas, cancel)
                .await?;
            tracing::debug!(index = i, timestamp = image.timestamp, "Rendered clip");
            clips.push(clip);
        }

        let list = work_dir.join("clips.txt");
        scratch.push(list.clone());
        tokio::fs::write(&list, concat_list(&clips)).await?;

        let sequence = work_dir.join("sequence.mp4");
        let args: Vec<OsString> = vec![
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-i".into(),
            list.into(),
            "-c".into(),
            "copy".into(),
            sequence.clone().into(),
        ];
        self.run(args, cancel).await?;
        Ok(sequence)
    }
}

async fn remove_scratch(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove scratch file");
        }
    }
}

fn frame_count(seconds: f64, fps: u32) -> u64 {
    ((seconds * fps as f64).ceil() as u64).max(1)
}

/// Scale-to-fill, slow centered zoom, fade in and out.
pub(crate) fn clip_filter(canvas: &CanvasConfig, seconds: f64) -> String {
    let CanvasConfig {
        width: w,
        height: h,
        fps,
        zoom,
        ..
    } = *canvas;
    let frames = frame_count(seconds, fps);
    let step = (zoom - 1.0).max(0.0) / frames as f64;
    let fade = canvas.fade_secs.min(seconds / 2.0).max(0.0);
    let fade_out = (seconds - fade).max(0.0);

    format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},\
         zoompan=z='min(zoom+{step:.6},{zoom})':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d={frames}:s={w}x{h}:fps={fps},\
         fade=t=in:st=0:d={fade:.3},fade=t=out:st={fade_out:.3}:d={fade:.3},format=yuv420p"
    )
}

pub(crate) fn concat_list(clips: &[PathBuf]) -> String {
    clips
        .iter()
        .map(|clip| {
            let path = clip.to_string_lossy().replace('\'', "'\\''");
            format!("file '{path}'\n")
        })
        .collect()
}

/// `ass=` filter argument. The path is escaped once as an option value and
/// again for the filtergraph, with no quoting.
pub(crate) fn ass_filter(subtitles: &Path) -> String {
    let value = escape(&subtitles.to_string_lossy(), &['\\', '\'', ':']);
    format!("ass={}", escape(&value, &['\\', '\'', ',', ';', '[', ']']))
}

fn escape(text: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// File extension for a downloaded media URL, ignoring any query string.
pub(crate) fn url_extension(url: &str, fallback: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let name = path.rsplit('/').next().unwrap_or_default();
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => fallback.to_string(),
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(5)..].join(" | ")
}

#[async_trait]
impl Renderer for FfmpegRenderer {
    async fn compose_image_sequence(
        &self,
        images: &[TimedImage],
        per_image_secs: f64,
        canvas: &CanvasConfig,
        work_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, RenderError> {
        if images.is_empty() {
            return Err(RenderError::NoImages);
        }
        tokio::fs::create_dir_all(work_dir).await?;

        let mut scratch = Vec::new();
        let result = self
            .compose(images, per_image_secs, canvas, work_dir, cancel, &mut scratch)
            .await;
        remove_scratch(&scratch).await;
        result
    }

    async fn mux_audio_and_subtitles(
        &self,
        video: &Path,
        audio_url: &str,
        subtitles: &Path,
        work_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, RenderError> {
        tokio::fs::create_dir_all(work_dir).await?;
        let audio = work_dir.join(format!("narration.{}", url_extension(audio_url, "wav")));
        let output = work_dir.join("short.mp4");

        let result = async {
            self.download(audio_url, &audio, cancel).await?;
            let args: Vec<OsString> = vec![
                "-i".into(),
                video.into(),
                "-i".into(),
                audio.clone().into(),
                "-map".into(),
                "0:v:0".into(),
                "-map".into(),
                "1:a:0".into(),
                "-vf".into(),
                ass_filter(subtitles).into(),
                "-c:v".into(),
                "libx264".into(),
                "-pix_fmt".into(),
                "yuv420p".into(),
                "-c:a".into(),
                "aac".into(),
                "-shortest".into(),
                output.clone().into(),
            ];
            self.run(args, cancel).await
        }
        .await;

        remove_scratch(std::slice::from_ref(&audio)).await;
        result.map(|()| output)
    }
}
