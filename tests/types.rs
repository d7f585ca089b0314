// ABOUTME: Integration tests for identifiers, image references and port tokens.
// ABOUTME: Tests parsing, normalization, and serde behavior of the public types.

use cairn::types::*;

mod image_ref_tests {
    use super::*;

    #[test]
    fn parse_name_with_tag() {
        let img = ImageRef::parse("nginx:1.25").unwrap();
        assert_eq!(img.name(), "nginx");
        assert_eq!(img.tag(), Some("1.25"));
    }

    #[test]
    fn parse_with_registry() {
        let img = ImageRef::parse("registry.example.com/myapp:v1.2.3").unwrap();
        assert_eq!(img.registry(), Some("registry.example.com"));
        assert_eq!(img.name(), "myapp");
        assert_eq!(img.tag(), Some("v1.2.3"));
    }

    #[test]
    fn parse_full_reference() {
        let img = ImageRef::parse("ghcr.io/org/app:v1@sha256:deadbeef").unwrap();
        assert_eq!(img.registry(), Some("ghcr.io"));
        assert_eq!(img.name(), "org/app");
        assert_eq!(img.tag(), Some("v1"));
        assert_eq!(img.digest(), Some("sha256:deadbeef"));
        assert_eq!(img.to_string(), "ghcr.io/org/app:v1@sha256:deadbeef");
    }

    #[test]
    fn from_str_matches_parse() {
        let img: ImageRef = "postgres".parse().unwrap();
        assert_eq!(img, ImageRef::parse("postgres:latest").unwrap());
    }

    #[test]
    fn deserializes_from_yaml_string() {
        let img: ImageRef = serde_yaml::from_str("redis:7-alpine").unwrap();
        assert_eq!(img.tag(), Some("7-alpine"));
        assert!(serde_yaml::from_str::<ImageRef>("\"bad image\"").is_err());
    }
}

mod exposed_port_tests {
    use super::*;

    #[test]
    fn bare_numbers_are_tcp() {
        assert_eq!(ExposedPort::parse("6379").unwrap(), ExposedPort::tcp(6379));
        assert_eq!(ExposedPort::from(80).to_string(), "80/tcp");
    }

    #[test]
    fn udp_is_kept() {
        let port: ExposedPort = "53/udp".parse().unwrap();
        assert_eq!(port.key(), "53/udp");
    }

    #[test]
    fn unknown_protocol_is_rejected() {
        assert!(ExposedPort::parse("80/sctp").is_err());
        assert!(ExposedPort::parse("70000").is_err());
        assert!(ExposedPort::parse("").is_err());
    }

    #[test]
    fn deserializes_numbers_and_tokens() {
        let ports: Vec<ExposedPort> = serde_yaml::from_str("[6379, \"53/udp\", \"8080\"]").unwrap();
        assert_eq!(
            ports,
            vec![ExposedPort::tcp(6379), ExposedPort::udp(53), ExposedPort::tcp(8080)]
        );
    }
}

mod id_tests {
    use super::*;

    #[test]
    fn container_id_stores_value() {
        let id = ContainerId::new("abc123");
        assert_eq!(id.as_str(), "abc123");
        assert_eq!(id.to_string(), "abc123");
    }

    #[test]
    fn short_id_is_twelve_chars() {
        let id = ContainerId::new("0123456789abcdef0123");
        assert_eq!(id.short(), "0123456789ab");
        assert_eq!(ContainerId::new("abc").short(), "abc");
    }

    #[test]
    fn network_id_stores_value() {
        let id = NetworkId::new("net456");
        assert_eq!(id.into_inner(), "net456");
    }
}
