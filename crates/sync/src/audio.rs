//! Audio capture abstraction and speaking detection
//!
//! The platform capture stack sits behind `AudioBackend` so the presence
//! layer never touches device APIs directly and tests can inject mocks.
//! Device acquisition is permission-gated and fails in four distinguishable
//! ways; each variant carries its own actionable message rather than a
//! generic failure.

use thiserror::Error;

/// Size of the frequency-domain sample polled each frame
pub const SPECTRUM_BINS: usize = 32;

/// Why the microphone could not be acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MicError {
    #[error("Microphone access was denied. Allow microphone use in your system privacy settings and try again")]
    Denied,

    #[error("No microphone was found. Connect an input device and try again")]
    NotFound,

    #[error("The microphone is in use by another application. Close it and try again")]
    Busy,

    #[error("Audio capture is not supported in this environment")]
    Unsupported,
}

/// An acquired capture device
pub trait CaptureDevice: Send {
    /// Fill `bins` with the current frequency-bin magnitudes
    fn spectrum(&mut self, bins: &mut [f32; SPECTRUM_BINS]);

    /// Release the underlying device handle
    fn close(&mut self);
}

/// Platform seam for acquiring a capture device
pub trait AudioBackend: Send + Sync {
    fn request_device(&self) -> Result<Box<dyn CaptureDevice>, MicError>;
}

/// Flag the local user as speaking when the mean bin magnitude clears the
/// threshold. Debounce comes from the polling cadence alone.
pub fn is_speaking(bins: &[f32], threshold: f32) -> bool {
    if bins.is_empty() {
        return false;
    }
    let mean = bins.iter().sum::<f32>() / bins.len() as f32;
    mean > threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_is_not_speaking() {
        let bins = [0.0f32; SPECTRUM_BINS];
        assert!(!is_speaking(&bins, 20.0));
    }

    #[test]
    fn test_loud_spectrum_is_speaking() {
        let bins = [60.0f32; SPECTRUM_BINS];
        assert!(is_speaking(&bins, 20.0));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let bins = [20.0f32; SPECTRUM_BINS];
        assert!(!is_speaking(&bins, 20.0));
    }

    #[test]
    fn test_mean_not_peak_decides() {
        // One hot bin among silence stays under the mean threshold
        let mut bins = [0.0f32; SPECTRUM_BINS];
        bins[0] = 100.0;
        assert!(!is_speaking(&bins, 20.0));
    }

    #[test]
    fn test_empty_spectrum_is_not_speaking() {
        assert!(!is_speaking(&[], 0.0));
    }

    #[test]
    fn test_each_mic_error_has_distinct_message() {
        let variants = [
            MicError::Denied,
            MicError::NotFound,
            MicError::Busy,
            MicError::Unsupported,
        ];
        let messages: Vec<String> = variants.iter().map(|e| e.to_string()).collect();
        for (i, a) in messages.iter().enumerate() {
            assert!(!a.is_empty());
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
