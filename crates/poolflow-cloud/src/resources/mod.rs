//! Resource type implementations

pub mod data_pool;
pub mod data_source;
pub mod materialized_view;
pub mod metric;
pub mod policy;

pub use data_pool::{DataPool, DataPoolSpec, DataPoolState, TableEngine, TableSettings};
pub use data_source::{DataSource, DataSourceSpec, DataSourceState};
pub use materialized_view::{
    Destination, MaterializedView, MaterializedViewSpec, MaterializedViewState, NewPool,
};
pub use metric::{Metric, MetricSpec, MetricState, MetricType};
pub use policy::{Policy, PolicySpec, PolicyState};
