//! Audio bitrate and codec resolution.

use broadcaster_media::MediaEngine;

/// Closest supported AAC bitrate to `configured`; ties go to the higher rate.
pub fn closest_aac_bitrate(supported: &[u32], configured: u32) -> Option<u32> {
    let mut sorted = supported.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    if sorted.contains(&configured) {
        return Some(configured);
    }

    let below = sorted.iter().copied().filter(|&b| b < configured).last();
    let above = sorted.iter().copied().find(|&b| b > configured);

    match (below, above) {
        (Some(lo), Some(hi)) if configured - lo < hi - configured => Some(lo),
        (_, Some(hi)) => Some(hi),
        (lo, None) => lo,
    }
}

/// First engine encoder type producing `codec`.
pub fn find_audio_encoder_for_codec(engine: &dyn MediaEngine, codec: &str) -> Option<String> {
    engine
        .encoder_types()
        .into_iter()
        .find(|ty| engine.encoder_codec(ty).as_deref() == Some(codec))
}
