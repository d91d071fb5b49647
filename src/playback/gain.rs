/// Scale little-endian s16 samples in place by a linear `gain`, saturating at
/// the sample range. A trailing odd byte is left alone.
pub fn apply_gain(frame: &mut [u8], gain: f32) {
    if (gain - 1.0).abs() < f32::EPSILON {
        return;
    }
    for sample in frame.chunks_exact_mut(2) {
        let scaled = f32::from(i16::from_le_bytes([sample[0], sample[1]])) * gain;
        let clamped = scaled.clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16;
        sample.copy_from_slice(&clamped.to_le_bytes());
    }
}
