#![forbid(unsafe_code)]
//! CapVisor client side: bearer-token session, typed API client, and the asset stream
//! workbench that drives per-card translation, rendering, and knowledge distillation.

mod client;
mod editor;
mod session;
mod workbench;

pub use client::{ApiClient, ClientError, DEFAULT_SERVER_URL};
pub use editor::{EditorError, RenderOutcome, StreamEditor};
pub use session::{FileTokenStore, MemoryTokenStore, Session, TokenStore};
pub use workbench::{AssetService, RenderJob, RenderResult, Workbench};

pub const CRATE_NAME: &str = "capvisor-workbench";
