//! GI-012: Remote state storage bucket.
//!
//! Built on the base context only: the bucket holds every other stack's
//! state, so its own state stays local.

use crate::core::error::Result;
use crate::core::schema::{Body, StorageBucket, Versioning};
use crate::core::stack::{base_context, Declaration, ProviderConfig, Stack};
use crate::core::types::InfraConfig;
use std::rc::Rc;

pub fn build(provider: &Rc<ProviderConfig>, config: &InfraConfig) -> Result<Stack> {
    let settings = &config.state_backend;
    let mut stack = Stack::new(base_context(provider, config, &settings.stack_id))?;
    let location = stack.context().region().to_string();
    stack.declare(Declaration::new(
        &settings.stack_id,
        Body::StorageBucket(StorageBucket {
            name: settings.bucket.clone(),
            location,
            storage_class: settings.storage_class.clone(),
            force_destroy: false,
            public_access_prevention: "enforced".to_string(),
            versioning: Versioning { enabled: true },
        }),
    ))?;
    Ok(stack)
}
