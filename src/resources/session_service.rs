//! GI-014: Session service stack.
//!
//! Declares the Firestore database, the Cloud Run service with its main and
//! companion containers, the peer host lookup and the public invoker binding.
//! Ordering: database, then service, then binding, all as explicit edges.

use crate::core::error::Result;
use crate::core::expr::Expr;
use crate::core::host;
use crate::core::schema::{
    Address, Body, CloudRunService, CloudRunServiceIamBinding, CloudRunServiceLookup, Container,
    ContainerPort, EnvVar, FirestoreDatabase, ServiceTemplate, TemplateMetadata, TemplateSpec,
};
use crate::core::stack::{backend_context, Declaration, ProviderConfig, Stack, StackContext};
use crate::core::types::{
    CompanionSettings, DataStoreSettings, InfraConfig, PeerServiceSettings,
    SessionServiceSettings, Variable,
};
use indexmap::IndexMap;
use std::rc::Rc;

pub const GIT_HASH_VAR: &str = "git-hash";
pub const GUEST_PASSWORD_VAR: &str = "guest-password";
pub const ACCESS_TOKEN_EXPIRATION_VAR: &str = "access-token-expiration";
pub const REFRESH_TOKEN_EXPIRATION_VAR: &str = "refresh-token-expiration";
pub const JWT_SECRET_KEY_VAR: &str = "jwt-secret-key";

const MAX_SCALE_ANNOTATION: &str = "autoscaling.knative.dev/maxScale";
const MIN_SCALE_ANNOTATION: &str = "autoscaling.knative.dev/minScale";
const FIRESTORE_ENDPOINT: &str = "firestore.googleapis.com:443";
const PEER_URL_ATTRIBUTE: &str = "status[0].url";

/// References to the application security inputs.
struct SecurityInputs {
    guest_password: Expr,
    access_token_expiration: Expr,
    refresh_token_expiration: Expr,
    jwt_secret_key: Expr,
}

pub fn build(provider: &Rc<ProviderConfig>, config: &InfraConfig) -> Result<Stack> {
    let settings = &config.session_service;
    let mut stack = Stack::new(backend_context(provider, config, &settings.stack_id))?;

    let git_hash = stack.variable(Variable::string(GIT_HASH_VAR, "Current Git Hash"))?;
    let security = declare_security_inputs(&mut stack)?;

    let store = declare_data_store(&mut stack, &settings.data_store)?;
    let peer_host = resolve_peer_host(&mut stack, &settings.peer)?;

    let context = stack.context();
    let mut containers = vec![main_container(
        context,
        settings,
        git_hash.clone(),
        peer_host,
        security,
    )];
    if let Some(companion) = &settings.companion {
        containers.push(companion_container(context, companion, git_hash));
    }

    let mut annotations = IndexMap::new();
    annotations.insert(MAX_SCALE_ANNOTATION.to_string(), settings.max_instances.clone());
    annotations.insert(MIN_SCALE_ANNOTATION.to_string(), settings.min_instances.clone());

    let location = context.region().to_string();
    let service = stack.declare(
        Declaration::new(
            &settings.service_id,
            Body::CloudRunService(CloudRunService {
                name: settings.service_id.clone(),
                location: location.clone(),
                template: ServiceTemplate {
                    metadata: TemplateMetadata { annotations },
                    spec: TemplateSpec {
                        container_concurrency: settings.container_concurrency,
                        containers,
                    },
                },
            }),
        )
        .depends_on(&store),
    )?;

    let access = &settings.access;
    stack.declare(
        Declaration::new(
            &access.binding_name,
            Body::CloudRunServiceIamBinding(CloudRunServiceIamBinding {
                location,
                service: Expr::attr(&service, "name"),
                role: access.role.clone(),
                members: access.members.clone(),
            }),
        )
        .depends_on(&service),
    )?;

    Ok(stack)
}

fn declare_security_inputs(stack: &mut Stack) -> Result<SecurityInputs> {
    Ok(SecurityInputs {
        guest_password: stack.variable(
            Variable::string(GUEST_PASSWORD_VAR, "Password of the shared guest account").sensitive(),
        )?,
        access_token_expiration: stack.variable(
            Variable::number(
                ACCESS_TOKEN_EXPIRATION_VAR,
                "Access token lifetime in milliseconds",
            )
            .sensitive(),
        )?,
        refresh_token_expiration: stack.variable(
            Variable::number(
                REFRESH_TOKEN_EXPIRATION_VAR,
                "Refresh token lifetime in milliseconds",
            )
            .sensitive(),
        )?,
        jwt_secret_key: stack.variable(
            Variable::string(JWT_SECRET_KEY_VAR, "Signing key for issued tokens").sensitive(),
        )?,
    })
}

fn declare_data_store(stack: &mut Stack, settings: &DataStoreSettings) -> Result<Address> {
    let project = stack.context().project();
    stack.declare(Declaration::new(
        &settings.resource_name,
        Body::FirestoreDatabase(FirestoreDatabase {
            project,
            name: settings.database_name.clone(),
            location_id: settings.location.clone(),
            database_type: settings.database_type.clone(),
        }),
    ))
}

/// A pinned URL is resolved now; otherwise the peer is looked up and its host
/// extracted by Terraform.
fn resolve_peer_host(stack: &mut Stack, peer: &PeerServiceSettings) -> Result<Expr> {
    if let Some(url) = &peer.url {
        let resolved = host::resolve_host(Expr::lit(url.as_str()))?;
        tracing::debug!(stack = stack.id(), host = %resolved, "peer host pinned");
        return Ok(resolved);
    }
    let location = stack.context().region().to_string();
    let lookup = stack.declare(Declaration::new(
        &peer.lookup_name,
        Body::CloudRunServiceData(CloudRunServiceLookup {
            location,
            name: peer.service_name.clone(),
        }),
    ))?;
    Ok(host::host_expr(Expr::attr(&lookup, PEER_URL_ATTRIBUTE)))
}

fn main_container(
    context: &StackContext,
    settings: &SessionServiceSettings,
    git_hash: Expr,
    peer_host: Expr,
    security: SecurityInputs,
) -> Container {
    let store = &settings.data_store;
    let emulator_enabled = store.emulator_host.is_some();
    let store_endpoint = store
        .emulator_host
        .clone()
        .unwrap_or_else(|| FIRESTORE_ENDPOINT.to_string());

    let mut env = vec![
        EnvVar::new("GAME_CLIENT_SOCKET_HOST", peer_host),
        EnvVar::new("GAME_CLIENT_SOCKET_PORT", settings.peer.port.as_str()),
        EnvVar::new(
            "SPRING_CLOUD_GCP_FIRESTORE_EMULATOR_ENABLED",
            emulator_enabled.to_string(),
        ),
        EnvVar::new("SPRING_CLOUD_GCP_FIRESTORE_HOST_PORT", store_endpoint),
        EnvVar::new("SPRING_CLOUD_GCP_FIRESTORE_PROJECT_ID", context.project()),
        EnvVar::new("APPLICATION_SECURITY_GUEST_PASSWORD", security.guest_password),
        EnvVar::new(
            "APPLICATION_SECURITY_JWT_ACCESS_TOKEN_EXPIRATION",
            security.access_token_expiration,
        ),
        EnvVar::new(
            "APPLICATION_SECURITY_JWT_REFRESH_TOKEN_EXPIRATION",
            security.refresh_token_expiration,
        ),
        EnvVar::new("APPLICATION_SECURITY_JWT_SECRET_KEY", security.jwt_secret_key),
    ];
    if let Some(companion) = &settings.companion {
        env.push(EnvVar::new("GNUGO_HOST", "localhost"));
        env.push(EnvVar::new("GNUGO_PORT", companion.port.to_string()));
    }

    Container {
        name: settings.service_id.clone(),
        image: context.image_reference(&settings.service_id, git_hash),
        ports: vec![ContainerPort {
            container_port: settings.container_port,
        }],
        env,
    }
}

/// Shares the pod network; only the main container exposes a port.
fn companion_container(
    context: &StackContext,
    companion: &CompanionSettings,
    git_hash: Expr,
) -> Container {
    Container {
        name: companion.service_id.clone(),
        image: context.image_reference(&companion.service_id, git_hash),
        ports: Vec::new(),
        env: Vec::new(),
    }
}
