//! Fingerprint stage: cutouts in, one feature vector per cutout out.
pub mod cutout;
pub mod extractor;
pub mod record;
pub mod source;
pub mod worker;

pub use cutout::{Cutout, PixelBounds};
pub use extractor::{ExtractorConfig, ExtractorKind, FeatureExtractor, ImagePatch};
pub use record::FingerprintRecord;
pub use source::{PatchSource, SyntheticPatchSource};
