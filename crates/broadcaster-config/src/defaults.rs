//! Defaults for the basic session configuration.

use crate::store::ConfigStore;

pub const DEFAULT_FILENAME_FORMAT: &str = "%CCYY-%MM-%DD %hh-%mm-%ss";

/// Register the values keys resolve to before the user sets them.
pub fn register_basic_defaults(store: &mut ConfigStore) {
    store.set_default_string("Output", "Mode", "Simple");
    store.set_default_string("Output", "FilenameFormatting", DEFAULT_FILENAME_FORMAT);

    store.set_default_uint("Audio", "SampleRate", 44100);
    store.set_default_string("Audio", "ChannelSetup", "Stereo");

    store.set_default_string("SimpleOutput", "FilePath", ".");
    store.set_default_string("SimpleOutput", "RecFormat", "flv");
    store.set_default_string("SimpleOutput", "RecQuality", "Stream");
    store.set_default_string("SimpleOutput", "RecRBPrefix", "Replay");

    store.set_default_string("AdvOut", "RecFilePath", ".");
    store.set_default_string("AdvOut", "RecFormat", "flv");
    store.set_default_uint("AdvOut", "TrackIndex", 1);
    store.set_default_uint("AdvOut", "FFAudioTrack", 1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_do_not_count_as_user_values() {
        let mut store = ConfigStore::in_memory();
        register_basic_defaults(&mut store);

        assert!(store.is_empty());
        assert_eq!(store.get_string("Output", "Mode"), Some("Simple"));
        assert_eq!(store.get_uint("AdvOut", "TrackIndex"), 1);
        assert_eq!(store.get_uint("Audio", "SampleRate"), 44100);
    }
}
