// ABOUTME: MariaDB preset.
// ABOUTME: Same shape as MySQL with MARIADB_* variables and mariadb-admin.

use super::{DEFAULT_TAG, Preset, image};
use crate::container::ContainerBuilder;
use crate::wait::WaitStrategy;

pub const MARIADB_PORT: u16 = 3306;

#[derive(Debug, Clone)]
pub struct MariaDb {
    tag: String,
    root_password: String,
    user: Option<(String, String)>,
    database: Option<String>,
}

impl MariaDb {
    pub fn new() -> Self {
        Self::with_tag(DEFAULT_TAG)
    }

    pub fn with_tag(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            root_password: "root".to_string(),
            user: None,
            database: None,
        }
    }

    pub fn with_root_password(mut self, password: impl Into<String>) -> Self {
        self.root_password = password.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some((user.into(), password.into()));
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

impl Default for MariaDb {
    fn default() -> Self {
        Self::new()
    }
}

impl Preset for MariaDb {
    fn into_builder(self) -> ContainerBuilder {
        let mut builder = ContainerBuilder::new(image("mariadb", &self.tag))
            .with_exposed_port(MARIADB_PORT)
            .with_env("MARIADB_ROOT_PASSWORD", self.root_password)
            .with_wait(WaitStrategy::exec([
                "mariadb-admin",
                "ping",
                "-h",
                "127.0.0.1",
            ]));
        if let Some((user, password)) = self.user {
            builder = builder
                .with_env("MARIADB_USER", user)
                .with_env("MARIADB_PASSWORD", password);
        }
        if let Some(database) = self.database {
            builder = builder.with_env("MARIADB_DATABASE", database);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mariadb_env() {
        let spec = MariaDb::with_tag("11")
            .with_root_password("toor")
            .with_user("app", "pw")
            .build()
            .unwrap();
        assert_eq!(spec.image().to_string(), "mariadb:11");
        assert_eq!(spec.env()["MARIADB_ROOT_PASSWORD"], "toor");
        assert_eq!(spec.env()["MARIADB_USER"], "app");
        assert!(spec.wait().unwrap().describe().contains("mariadb-admin ping"));
    }
}
