// ABOUTME: MySQL preset.
// ABOUTME: Readiness is mysqladmin ping against the local server.

use super::{DEFAULT_TAG, Preset, image};
use crate::container::ContainerBuilder;
use crate::wait::WaitStrategy;

pub const MYSQL_PORT: u16 = 3306;

#[derive(Debug, Clone)]
pub struct MySql {
    tag: String,
    root_password: String,
    user: Option<(String, String)>,
    database: Option<String>,
}

impl MySql {
    /// `mysql:latest` with root password `root`.
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

    /// Create an extra non-root account at first start.
    pub fn with_user(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some((user.into(), password.into()));
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

impl Default for MySql {
    fn default() -> Self {
        Self::new()
    }
}

impl Preset for MySql {
    fn into_builder(self) -> ContainerBuilder {
        let mut builder = ContainerBuilder::new(image("mysql", &self.tag))
            .with_exposed_port(MYSQL_PORT)
            .with_env("MYSQL_ROOT_PASSWORD", self.root_password)
            .with_wait(WaitStrategy::exec(["mysqladmin", "ping", "-h", "127.0.0.1"]));
        if let Some((user, password)) = self.user {
            builder = builder
                .with_env("MYSQL_USER", user)
                .with_env("MYSQL_PASSWORD", password);
        }
        if let Some(database) = self.database {
            builder = builder.with_env("MYSQL_DATABASE", database);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_account_and_database() {
        let plain = MySql::new().build().unwrap();
        assert_eq!(plain.env()["MYSQL_ROOT_PASSWORD"], "root");
        assert!(!plain.env().contains_key("MYSQL_USER"));
        assert!(!plain.env().contains_key("MYSQL_DATABASE"));

        let full = MySql::with_tag("8.4")
            .with_user("app", "pw")
            .with_database("shop")
            .build()
            .unwrap();
        assert_eq!(full.image().to_string(), "mysql:8.4");
        assert_eq!(full.env()["MYSQL_USER"], "app");
        assert_eq!(full.env()["MYSQL_PASSWORD"], "pw");
        assert_eq!(full.env()["MYSQL_DATABASE"], "shop");
        assert!(full.wait().unwrap().describe().contains("mysqladmin ping"));
    }
}
