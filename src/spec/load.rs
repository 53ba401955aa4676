use anyhow::Context;
use std::path::Path;
use tracing::debug;

use super::build::MetadataResolver;
use super::declare::{ServiceDeclaration, ServicesDocument};
use crate::registry::ServiceRegistry;

/// Parse a YAML services document.
pub fn parse_services_yaml(text: &str) -> anyhow::Result<Vec<ServiceDeclaration>> {
    let doc: ServicesDocument =
        serde_yaml::from_str(text).context("failed to parse services YAML")?;
    Ok(doc.services)
}

/// Parse a JSON services document.
pub fn parse_services_json(text: &str) -> anyhow::Result<Vec<ServiceDeclaration>> {
    let doc: ServicesDocument =
        serde_json::from_str(text).context("failed to parse services JSON")?;
    Ok(doc.services)
}

/// Read service declarations from a file. `.json` files are parsed as JSON,
/// everything else as YAML.
pub fn load_services(path: impl AsRef<Path>) -> anyhow::Result<Vec<ServiceDeclaration>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read services file {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let services = if is_json {
        parse_services_json(&content)
    } else {
        parse_services_yaml(&content)
    }
    .with_context(|| format!("invalid services file {}", path.display()))?;
    debug!(path = %path.display(), services = services.len(), "Loaded service declarations");
    Ok(services)
}

/// Load a services file and resolve it with `resolver`.
pub fn load_registry(
    path: impl AsRef<Path>,
    resolver: &MetadataResolver,
) -> anyhow::Result<ServiceRegistry> {
    let path = path.as_ref();
    let declarations = load_services(path)?;
    let registry = resolver
        .resolve(&declarations)
        .with_context(|| format!("invalid service metadata in {}", path.display()))?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ResponseDeclaration, SecurityDeclaration};

    #[test]
    fn parses_yaml_shorthands() {
        let yaml = r#"
services:
  - name: users
    security: [public, authenticated]
    routes:
      - verb: get
        handler: list_users
        response: manual
        parameters:
          - { name: age, type: int, default: 18, minValue: 0 }
"#;
        let services = parse_services_yaml(yaml).unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(
            services[0].security,
            Some(SecurityDeclaration::Combined(vec![
                "public".into(),
                "authenticated".into()
            ]))
        );
        let route = &services[0].routes[0];
        assert_eq!(route.response, Some(ResponseDeclaration::manual()));
        assert_eq!(route.parameters[0].min, Some(0.0));
    }

    #[test]
    fn parses_json_documents() {
        let json = r#"{"services":[{"name":"ping","routes":[{"verb":"GET","handler":"pong",
            "response":{"status":204,"body":"empty"}}]}]}"#;
        let services = parse_services_json(json).unwrap();
        assert_eq!(services[0].routes[0].handler, "pong");
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_services("/definitely/not/here.yaml").unwrap_err();
        assert!(format!("{err:#}").contains("/definitely/not/here.yaml"));
    }
}
