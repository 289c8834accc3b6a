//! Standard APIs we use everywhere.

pub use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

pub use anyhow::{Context as _, Result, anyhow, bail};
pub use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
pub use tracing::{debug, error, info, instrument, trace, warn};
