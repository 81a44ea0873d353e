//! Persistent cache for new-tab background images
//!
//! Stores one image per provider together with its metadata, hands out
//! process-local display handles for cached blobs, and decides from the
//! user's schedule whether a provider should fetch a fresh image.

mod attribution;
mod cache;
mod clock;
mod error;
mod handles;
mod normalize;
mod policy;
mod render;
mod settings;
mod store;
mod types;

pub use attribution::{Attribution, LocationInfo};
pub use cache::BackgroundCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CacheError, Result};
pub use handles::{DisplayHandle, HandleRegistry, DEFAULT_HANDLE_BASE};
pub use normalize::{decode_data_url, BlobNormalizer, HttpImageFetcher, ImageFetcher};
pub use policy::{is_stale, ExpiryRule};
pub use render::{Container, DiscardLocation, LocationNotifier, LogHints, RenderError, UiHints};
pub use settings::{
    last_changed_key, JsonFileSettings, MemorySettings, ScheduleSettings, SettingsMap,
    SettingsStore, LOCAL_MODE_KEY, SCHEDULE_KEY,
};
pub use store::BackgroundStore;
pub use types::{
    CacheEntry, CacheStats, CachedBackground, ImageBlob, ImageInput, LocalImageMode,
    SchedulePolicy, Source,
};
