pub mod analysis;
pub mod codec;
pub mod compose;
pub mod descriptor;
pub mod extract;

pub use analysis::{analyze_banner, BannerAnalysis, VisionBackend};
pub use codec::{CodecError, EncodedImage, ImageDimensions};
pub use compose::compose_prompt;
pub use descriptor::{BannerDescriptor, BannerField};
pub use extract::{extract_descriptor, FallbackReason};
