//! GI-013: Container image registry.

use crate::core::error::Result;
use crate::core::schema::{ArtifactRegistryRepository, Body};
use crate::core::stack::{backend_context, Declaration, ProviderConfig, Stack};
use crate::core::types::InfraConfig;
use std::rc::Rc;

pub fn build(provider: &Rc<ProviderConfig>, config: &InfraConfig) -> Result<Stack> {
    let settings = &config.registry;
    let mut stack = Stack::new(backend_context(provider, config, &settings.stack_id))?;
    let location = stack.context().region().to_string();
    stack.declare(Declaration::new(
        &settings.stack_id,
        Body::ArtifactRegistryRepository(ArtifactRegistryRepository {
            format: "DOCKER".to_string(),
            repository_id: settings.repository_id.clone(),
            location,
        }),
    ))?;
    Ok(stack)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gi013_repository() {
        let config = InfraConfig::default();
        let provider = Rc::new(ProviderConfig::google(&config.provider));
        let stack = build(&provider, &config).unwrap();
        let doc = stack.to_json().unwrap();

        let repo = &doc["resource"]["google_artifact_registry_repository"]["container-registry"];
        assert_eq!(repo["format"], "DOCKER");
        assert_eq!(repo["repository_id"], "go-services");
        assert_eq!(repo["location"], "europe-west1");
        assert_eq!(
            doc["terraform"]["backend"]["gcs"]["prefix"],
            "terraform/state/container-registry"
        );
    }

    #[test]
    fn test_gi013_repository_id_matches_image_paths() {
        let mut config = InfraConfig::default();
        config.registry.repository_id = "images".to_string();
        let provider = Rc::new(ProviderConfig::google(&config.provider));
        let stack = build(&provider, &config).unwrap();
        let path = stack
            .context()
            .container_image_repository_path("svc")
            .to_terraform();
        assert!(path.ends_with("/images/svc"));
    }
}
