//! Recording output settings.
//!
//! Builds the settings blob each recording mode hands to its output:
//! simple file or replay buffer, advanced file, and custom FFmpeg.

use tracing::{debug, info, warn};

use broadcaster_config::paths::{
    ensure_directory_exists, find_best_filename, generate_formatted_filename,
    remove_reserved_file_characters,
};
use broadcaster_config::{ConfigStore, DEFAULT_FILENAME_FORMAT};
use broadcaster_media::{Resolution, Settings};

/// `AdvOut.RecType` value selecting the custom FFmpeg output.
pub const FFMPEG_RECORDING_TYPE: &str = "Custom Output (FFmpeg)";

/// Extension used by the lossless recording preset.
const LOSSLESS_EXTENSION: &str = "avi";

/// Parse a `WxH` string. Anything else, or a zero dimension, is `None`.
pub fn parse_resolution(value: &str) -> Option<Resolution> {
    let (w, h) = value.trim().split_once('x')?;
    let res = Resolution::new(w.trim().parse().ok()?, h.trim().parse().ok()?);
    (!res.is_zero()).then_some(res)
}

/// Rescale target from a flag and a `WxH` key; `None` disables scaling.
pub fn rescale_target(config: &ConfigStore, section: &str, flag: &str, key: &str) -> Option<Resolution> {
    if !config.get_bool(section, flag) {
        return None;
    }
    config
        .get_string(section, key)
        .filter(|s| !s.is_empty())
        .and_then(parse_resolution)
}

/// Directory joined with a fresh templated filename, made unique unless
/// overwriting is allowed. The directory is created if missing.
fn recording_path(
    config: &ConfigStore,
    directory: &str,
    extension: &str,
    no_space: bool,
) -> String {
    let format = config
        .get_string("Output", "FilenameFormatting")
        .unwrap_or(DEFAULT_FILENAME_FORMAT);

    let mut path = directory.to_string();
    if !path.ends_with(['/', '\\']) {
        path.push('/');
    }
    path.push_str(&generate_formatted_filename(extension, no_space, format));

    if let Err(e) = ensure_directory_exists(&path) {
        warn!(error = %e, "Failed to create recording directory");
    }
    if !config.get_bool("Output", "OverwriteIfExists") {
        path = find_best_filename(&path, no_space);
    }
    path
}

/// Replay buffer filename format: prefix, template and suffix separated
/// by single spaces, with reserved characters replaced.
fn replay_buffer_format(prefix: Option<&str>, format: &str, suffix: Option<&str>) -> String {
    let mut f = String::new();
    if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
        f.push_str(prefix);
        if !f.ends_with(' ') {
            f.push(' ');
        }
    }
    f.push_str(format);
    if let Some(suffix) = suffix.filter(|s| !s.is_empty()) {
        if !suffix.starts_with(' ') {
            f.push(' ');
        }
        f.push_str(suffix);
    }
    remove_reserved_file_characters(&f)
}

/// Settings for the simple-mode recording output.
///
/// With `SimpleOutput.RecRB` the output becomes a replay buffer and gets
/// directory, extension and limits instead of a path. The lossless preset
/// writes AVI through a raw FFmpeg output, which takes `url`.
pub fn simple_recording_settings(
    config: &ConfigStore,
    using_recording_preset: bool,
    lossless: bool,
) -> Settings {
    let directory = config.get_string("SimpleOutput", "FilePath").unwrap_or(".");
    let format = config.get_string("SimpleOutput", "RecFormat").unwrap_or("flv");
    let extension = if lossless { LOSSLESS_EXTENSION } else { format };
    let no_space = config.get_bool("SimpleOutput", "FileNameWithoutSpace");
    let mut settings = Settings::new();

    if config.get_bool("SimpleOutput", "RecRB") {
        let filename_format = config
            .get_string("Output", "FilenameFormatting")
            .unwrap_or(DEFAULT_FILENAME_FORMAT);
        let rb_size = if using_recording_preset {
            config.get_int("SimpleOutput", "RecRBSize")
        } else {
            0
        };

        settings
            .set_string("directory", directory)
            .set_string(
                "format",
                replay_buffer_format(
                    config.get_string("SimpleOutput", "RecRBPrefix"),
                    filename_format,
                    config.get_string("SimpleOutput", "RecRBSuffix"),
                ),
            )
            .set_string("extension", extension)
            .set_int("max_time_sec", config.get_int("SimpleOutput", "RecRBTime"))
            .set_int("max_size_mb", rb_size);
        debug!(directory, "Replay buffer settings");
    } else {
        let path = recording_path(config, directory, extension, no_space);
        settings.set_string(if lossless { "url" } else { "path" }, path);
    }

    if let Some(mux) = config
        .get_string("SimpleOutput", "MuxerCustom")
        .filter(|m| !m.is_empty())
    {
        settings.set_string("muxer_settings", mux);
    }
    settings
}

/// Settings for the advanced-mode file recording output.
pub fn advanced_recording_settings(config: &ConfigStore) -> Settings {
    let directory = config.get_string("AdvOut", "RecFilePath").unwrap_or(".");
    let format = config.get_string("AdvOut", "RecFormat").unwrap_or("flv");
    let no_space = config.get_bool("AdvOut", "RecFileNameWithoutSpace");

    let mut settings = Settings::new();
    settings
        .set_string("path", recording_path(config, directory, format, no_space))
        .set_string(
            "muxer_settings",
            config.get_string("AdvOut", "RecMuxerCustom").unwrap_or_default(),
        );
    settings
}

/// Split a legacy `AdvOut.FFURL` file path into directory and extension.
///
/// Runs once: skipped when `FFOutputToFile` was ever set, and for real
/// URLs. Returns whether the config changed; the config is saved if so.
pub fn migrate_ffmpeg_url(config: &mut ConfigStore) -> bool {
    if config.has_user_value("AdvOut", "FFOutputToFile") {
        return false;
    }
    let Some(url) = config.get_string("AdvOut", "FFURL") else {
        return false;
    };
    if url.contains("://") {
        return false;
    }

    let Some(sep) = url.rfind(['/', '\\']) else {
        return false;
    };
    let (directory, file) = (&url[..sep], &url[sep + 1..]);
    let Some((_, extension)) = file.rsplit_once('.') else {
        return false;
    };
    if directory.is_empty() || extension.is_empty() {
        return false;
    }

    let (directory, extension) = (directory.to_string(), extension.to_string());
    config.remove_value("AdvOut", "FFURL");
    config.set_string("AdvOut", "FFFilePath", &directory);
    config.set_string("AdvOut", "FFExtension", &extension);
    config.set_bool("AdvOut", "FFOutputToFile", true);

    info!(directory, extension, "Migrated FFmpeg output URL");
    if let Err(e) = config.save_safe("tmp") {
        warn!(error = %e, "Failed to save config");
    }
    true
}

/// Settings for the custom FFmpeg recording output.
pub fn ffmpeg_output_settings(config: &ConfigStore) -> Settings {
    let url = if config.get_bool("AdvOut", "FFOutputToFile") {
        let directory = config.get_string("AdvOut", "FFFilePath").unwrap_or(".");
        let extension = config.get_string("AdvOut", "FFExtension").unwrap_or("mp4");
        recording_path(
            config,
            directory,
            extension,
            config.get_bool("AdvOut", "FFFileNameWithoutSpace"),
        )
    } else {
        config.get_string("AdvOut", "FFURL").unwrap_or_default().to_string()
    };

    let string = |key: &str| config.get_string("AdvOut", key).unwrap_or_default().to_string();

    let mut settings = Settings::new();
    settings
        .set_string("url", url)
        .set_string("format_name", string("FFFormat"))
        .set_string("format_mime_type", string("FFFormatMimeType"))
        .set_string("muxer_settings", string("FFMCustom"))
        .set_int("gop_size", config.get_int("AdvOut", "FFVGOPSize"))
        .set_int("video_bitrate", config.get_int("AdvOut", "FFVBitrate"))
        .set_string("video_encoder", string("FFVEncoder"))
        .set_int("video_encoder_id", config.get_int("AdvOut", "FFVEncoderId"))
        .set_string("video_settings", string("FFVCustom"))
        .set_int("audio_bitrate", config.get_int("AdvOut", "FFABitrate"))
        .set_string("audio_encoder", string("FFAEncoder"))
        .set_int("audio_encoder_id", config.get_int("AdvOut", "FFAEncoderId"))
        .set_string("audio_settings", string("FFACustom"));

    if let Some(res) = rescale_target(config, "AdvOut", "FFRescale", "FFRescaleRes") {
        settings
            .set_int("scale_width", res.width as i64)
            .set_int("scale_height", res.height as i64);
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use broadcaster_config::register_basic_defaults;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> ConfigStore {
        let mut config = ConfigStore::in_memory();
        register_basic_defaults(&mut config);
        let path = dir.path().to_string_lossy().into_owned();
        config.set_string("SimpleOutput", "FilePath", &path);
        config.set_string("AdvOut", "RecFilePath", &path);
        config
    }

    #[test]
    fn test_parse_resolution() {
        assert_eq!(parse_resolution("1280x720"), Some(Resolution::new(1280, 720)));
        assert_eq!(parse_resolution(" 640 x 360 "), Some(Resolution::new(640, 360)));
        assert_eq!(parse_resolution("1280*720"), None);
        assert_eq!(parse_resolution("0x720"), None);
        assert_eq!(parse_resolution("wide"), None);
    }

    #[test]
    fn test_replay_buffer_keys() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.set_bool("SimpleOutput", "RecRB", true);
        config.set_int("SimpleOutput", "RecRBTime", 20);
        config.set_int("SimpleOutput", "RecRBSize", 512);
        config.set_string("SimpleOutput", "RecRBSuffix", "clip");

        let settings = simple_recording_settings(&config, true, false);
        assert!(settings.contains("directory"));
        assert_eq!(settings.get_string("extension"), Some("flv"));
        assert_eq!(settings.get_int("max_time_sec"), Some(20));
        assert_eq!(settings.get_int("max_size_mb"), Some(512));
        assert_eq!(
            settings.get_string("format"),
            Some("Replay %CCYY-%MM-%DD %hh-%mm-%ss clip")
        );
        assert!(!settings.contains("path"));
        assert!(!settings.contains("url"));
    }

    #[test]
    fn test_replay_buffer_size_needs_preset() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.set_bool("SimpleOutput", "RecRB", true);
        config.set_int("SimpleOutput", "RecRBSize", 512);

        let settings = simple_recording_settings(&config, false, false);
        assert_eq!(settings.get_int("max_size_mb"), Some(0));
    }

    #[test]
    fn test_replay_buffer_format_strips_reserved() {
        assert_eq!(
            replay_buffer_format(Some("Replay "), "%hh:%mm", Some(" end")),
            "Replay %hh_%mm end"
        );
        assert_eq!(replay_buffer_format(None, "x", Some("")), "x");
    }

    #[test]
    fn test_simple_path_and_lossless_url() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.set_string("SimpleOutput", "MuxerCustom", "movflags=faststart");

        let settings = simple_recording_settings(&config, false, false);
        let path = settings.get_string("path").unwrap();
        assert!(path.ends_with(".flv"));
        assert!(path.starts_with(&*dir.path().to_string_lossy()));
        assert_eq!(settings.get_string("muxer_settings"), Some("movflags=faststart"));

        let lossless = simple_recording_settings(&config, true, true);
        assert!(lossless.get_string("url").unwrap().ends_with(".avi"));
        assert!(!lossless.contains("path"));
    }

    #[test]
    fn test_existing_file_gets_suffix() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.set_string("Output", "FilenameFormatting", "fixed");

        std::fs::write(dir.path().join("fixed.flv"), b"").unwrap();
        let settings = simple_recording_settings(&config, false, false);
        assert!(settings.get_string("path").unwrap().ends_with("fixed (2).flv"));

        config.set_bool("Output", "OverwriteIfExists", true);
        let settings = simple_recording_settings(&config, false, false);
        assert!(settings.get_string("path").unwrap().ends_with("fixed.flv"));
    }

    #[test]
    fn test_advanced_recording_settings() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.set_string("AdvOut", "RecFormat", "mkv");
        config.set_string("AdvOut", "RecMuxerCustom", "x=1");

        let settings = advanced_recording_settings(&config);
        assert!(settings.get_string("path").unwrap().ends_with(".mkv"));
        assert_eq!(settings.get_string("muxer_settings"), Some("x=1"));
    }

    #[test]
    fn test_migrate_ffmpeg_url_once() {
        let mut config = ConfigStore::in_memory();
        config.set_string("AdvOut", "FFURL", "C:\\Videos\\out.mkv");

        assert!(migrate_ffmpeg_url(&mut config));
        assert_eq!(config.get_string("AdvOut", "FFFilePath"), Some("C:\\Videos"));
        assert_eq!(config.get_string("AdvOut", "FFExtension"), Some("mkv"));
        assert!(config.get_bool("AdvOut", "FFOutputToFile"));
        assert!(!config.has_user_value("AdvOut", "FFURL"));

        config.set_string("AdvOut", "FFURL", "/tmp/other.mp4");
        assert!(!migrate_ffmpeg_url(&mut config));
    }

    #[test]
    fn test_migrate_skips_network_urls() {
        let mut config = ConfigStore::in_memory();
        config.set_string("AdvOut", "FFURL", "rtmp://host/app/key.x");
        assert!(!migrate_ffmpeg_url(&mut config));

        config.set_string("AdvOut", "FFURL", "noextension/file");
        assert!(!migrate_ffmpeg_url(&mut config));
    }

    #[test]
    fn test_ffmpeg_output_settings() {
        let mut config = ConfigStore::in_memory();
        config.set_string("AdvOut", "FFURL", "udp://239.0.0.1:1234");
        config.set_string("AdvOut", "FFFormat", "mpegts");
        config.set_int("AdvOut", "FFVBitrate", 8000);
        config.set_int("AdvOut", "FFVGOPSize", 120);
        config.set_bool("AdvOut", "FFRescale", true);
        config.set_string("AdvOut", "FFRescaleRes", "1280x720");

        let settings = ffmpeg_output_settings(&config);
        assert_eq!(settings.get_string("url"), Some("udp://239.0.0.1:1234"));
        assert_eq!(settings.get_string("format_name"), Some("mpegts"));
        assert_eq!(settings.get_int("video_bitrate"), Some(8000));
        assert_eq!(settings.get_int("gop_size"), Some(120));
        assert_eq!(settings.get_int("scale_width"), Some(1280));
        assert_eq!(settings.get_int("scale_height"), Some(720));
        assert_eq!(settings.get_string("audio_encoder"), Some(""));
    }

    #[test]
    fn test_ffmpeg_output_to_file() {
        let dir = TempDir::new().unwrap();
        let mut config = ConfigStore::in_memory();
        config.set_bool("AdvOut", "FFOutputToFile", true);
        config.set_string("AdvOut", "FFFilePath", &dir.path().to_string_lossy());
        config.set_string("AdvOut", "FFExtension", "mkv");

        let settings = ffmpeg_output_settings(&config);
        assert!(settings.get_string("url").unwrap().ends_with(".mkv"));
        assert!(!settings.contains("scale_width"));
    }
}
