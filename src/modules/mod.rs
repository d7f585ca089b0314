// ABOUTME: Ready-made container specs for common services.
// ABOUTME: Each preset fixes image, ports, env and wait; callers can still layer builder calls.

mod mariadb;
mod mysql;
mod opensearch;
mod postgres;
mod redis;

pub use mariadb::MariaDb;
pub use mysql::MySql;
pub use opensearch::OpenSearch;
pub use postgres::Postgres;
pub use redis::Redis;

use crate::container::{ContainerBuilder, ContainerSpec, SpecError};

pub const DEFAULT_TAG: &str = "latest";

/// A service preset that expands into a container builder.
pub trait Preset {
    fn into_builder(self) -> ContainerBuilder;

    fn build(self) -> Result<ContainerSpec, SpecError>
    where
        Self: Sized,
    {
        self.into_builder().build()
    }
}

fn image(repository: &str, tag: &str) -> String {
    format!("{}:{}", repository, tag)
}
