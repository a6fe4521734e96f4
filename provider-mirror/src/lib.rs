//! Provider Mirror - offline mirrors of infrastructure providers
//!
//! This library resolves providers against an upstream registry, downloads and
//! verifies their platform archives, and lays them out in the network-mirror
//! directory format:
//!
//! ```text
//! <out>/<host>/<namespace>/<type>/index.json
//! <out>/<host>/<namespace>/<type>/<version>.json
//! <out>/<host>/<namespace>/<type>/terraform-provider-<type>_<version>_<os>_<arch>.zip
//! ```
//!
//! # Example
//!
//! ```no_run
//! use provider_mirror::provider::{Platform, ProviderRequirement};
//! use provider_mirror::{MirrorConfig, MirrorPolicy, Reconciler};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> provider_mirror::MirrorResult<()> {
//! let config = MirrorConfig::new("/srv/mirror")
//!     .with_policy(MirrorPolicy::Keep)
//!     .with_platforms(vec!["linux_amd64".parse::<Platform>()?]);
//! let requirements: Vec<ProviderRequirement> = vec!["hashicorp/null=2.1.0".parse()?];
//!
//! let report = Reconciler::from_config(config)?
//!     .run(&requirements, &CancellationToken::new())
//!     .await?;
//! println!("{}", report);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;

pub mod checksum;
pub mod config;
pub mod error;
pub mod fetch;
mod http;
pub mod logging;
pub mod provider;
pub mod reconcile;
pub mod registry;
pub mod resolver;
pub mod store;

pub use config::MirrorConfig;
pub use error::{MirrorError, MirrorResult};
pub use reconcile::{MirrorPolicy, MirrorReport, Reconciler};

/// Boxed future used by the collaborator traits so they stay dyn-compatible.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
