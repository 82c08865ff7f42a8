//! Propel transport for Poolflow
//!
//! Implements the remote operation client traits of `poolflow-cloud` over
//! the Propel GraphQL API and wires them into one reconciler per resource
//! type.
//!
//! # Authentication
//!
//! Either a static API token (`POOLFLOW_API_TOKEN`) or OAuth2 client
//! credentials (`POOLFLOW_CLIENT_ID`, `POOLFLOW_CLIENT_SECRET`) exchanged at
//! the configured `auth_url`.
//!
//! # Example
//!
//! ```ignore
//! use poolflow_cloud::resources::DataPoolSpec;
//! use poolflow_propel::PropelProvider;
//!
//! let provider = PropelProvider::from_env()?;
//! let pools = provider.data_pools();
//!
//! let spec = DataPoolSpec::new("DSO01", "ORDERS").named("orders");
//! let state = pools.create(&spec).await?;
//! println!("{} is {}", state.id, state.status);
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod provider;
pub mod queries;

pub use client::PropelClient;
pub use error::{PropelError, Result};
pub use provider::{AuthStatus, PropelProvider};
