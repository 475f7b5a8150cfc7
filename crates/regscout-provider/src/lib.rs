//! regscout Provider - the adapter contract.
//!
//! Every registrar lookup, however it is implemented, is polymorphic over
//! one capability: [`ProviderAdapter::check`] returning a
//! [`ProviderResult`]. The [`ProviderRegistry`] maps the fixed set of
//! [`ProviderId`](regscout_core::ProviderId)s to adapters at startup.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod adapter;
pub mod error;
pub mod registry;
pub mod result;

pub use adapter::{AdapterKind, ProviderAdapter};
pub use error::{ProviderError, Result};
pub use registry::ProviderRegistry;
pub use result::ProviderResult;
