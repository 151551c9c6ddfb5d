//! gpu-draw - GPU state and material binding for immediate-mode drawing
//!
//! Sits between [`gpu_scene`] data and a graphics API. It keeps a baseline
//! pipeline state, snapshots and restores state groups around nested draws,
//! binds materials and texture pages per draw call, and caches the textures
//! those binds need.
//!
//! # Architecture
//!
//! - [`GpuContext`] - Owns the backend and texture cache; global state,
//!   blending, lights, snapshots and selection colors
//! - [`MaterialSession`] - Material binding for one object's draw
//! - [`TexFaceSession`] - Per-face texture pages and bitmap text
//! - [`TextureCache`] - Image textures keyed by image and sampling, with
//!   tile animation, paint updates and deferred frees
//! - [`GpuBackend`] - The graphics API; [`RecordingBackend`] runs headless

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod lights;
pub mod material;
pub mod select;
pub mod state;
pub mod texface;
pub mod text;
pub mod texture;

pub use backend::{BackendCall, BackendLimits, GpuBackend, RecordingBackend, TextureId};
pub use config::DrawConfig;
pub use context::GpuContext;
pub use error::{BackendError, DrawError, Result};
pub use material::{AlphaBlend, BindOutcome, MaterialPassParams, MaterialSession, SkipReason};
pub use select::SelectEncoding;
pub use state::{GpuStateValues, StateMask};
pub use texface::{TexFaceSession, TexPageOutcome};
pub use text::{GlyphMatrix, TextMesh, layout_text};
pub use texture::{FreeQueueHandle, TextureCache, VerifyParams};
