//! Configurable provider adapters.
//!
//! Each `[[providers]]` entry of the configuration describes either a JSON
//! endpoint ([`HttpJsonAdapter`]) or a search page rendered in a browser
//! session ([`BrowserPageAdapter`]). [`build_registry`] turns the enabled
//! entries into a [`ProviderRegistry`](regscout_provider::ProviderRegistry).

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod browser_page;
pub mod error;
pub mod http_json;
pub mod registry;
pub mod template;

pub use browser_page::{interpret_page_text, BrowserPageAdapter, PagePatterns};
pub use error::{AdapterError, Result};
pub use http_json::{build_http_client, extract_result, HttpJsonAdapter};
pub use registry::build_registry;
pub use template::expand_url;
