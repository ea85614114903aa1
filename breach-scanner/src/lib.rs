//! Attack-surface discovery: a same-origin crawler that collects forms,
//! inferred pseudo-forms and API calls through a pluggable fetch engine.

pub mod api;
#[cfg(feature = "browser")]
pub mod browser;
pub mod crawler;
pub mod engine;
pub mod error;
pub mod extract;
pub mod form;
pub mod normalize;
pub mod result;

pub use api::{ApiCall, ApiRegistry, JsonBody};
#[cfg(feature = "browser")]
pub use browser::BrowserEngine;
pub use crawler::{Crawler, ProgressCallback};
pub use engine::{
    EngineConfig, FetchEngine, HttpEngine, ProbeRequest, ProbeResponse, RenderedPage, SubmitBody,
};
pub use error::ScanError;
pub use form::{Form, FormKey, HttpMethod, InputKind};
pub use result::CrawlResult;
