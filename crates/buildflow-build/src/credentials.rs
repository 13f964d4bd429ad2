//! Builder credentials
//!
//! Derives the secret payloads the remote builder consumes: a registry
//! auth-config document for pushing the image, and object store access keys
//! for fetching the build context.

use crate::error::{BuildError, BuildResult};
use base64::Engine;
use buildflow_config::{ObjectStoreSettings, RegistrySettings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Secret field holding the registry auth-config document
pub const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";
pub const ACCESS_KEY_ID_FIELD: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_ACCESS_KEY_FIELD: &str = "AWS_SECRET_ACCESS_KEY";
pub const REGION_FIELD: &str = "AWS_REGION";

/// Credential kinds the builder needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CredentialKind {
    RegistryAuth,
    ObjectStoreAccess,
}

impl CredentialKind {
    /// Every kind a build from an object store requires, in application order
    pub const REQUIRED: [CredentialKind; 2] =
        [CredentialKind::RegistryAuth, CredentialKind::ObjectStoreAccess];

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKind::RegistryAuth => "registry-auth",
            CredentialKind::ObjectStoreAccess => "object-store-access",
        }
    }

    /// Kubernetes secret type for this kind
    pub fn secret_type(&self) -> &'static str {
        match self {
            CredentialKind::RegistryAuth => "kubernetes.io/dockerconfigjson",
            CredentialKind::ObjectStoreAccess => "Opaque",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialKind {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registry-auth" => Ok(CredentialKind::RegistryAuth),
            "object-store-access" => Ok(CredentialKind::ObjectStoreAccess),
            other => Err(BuildError::UnknownCredentialKind(other.to_string())),
        }
    }
}

/// Secret field name -> raw value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialPayload {
    fields: BTreeMap<String, Vec<u8>>,
}

impl CredentialPayload {
    fn with_field(mut self, name: &str, value: impl Into<Vec<u8>>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&[u8]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A named secret ready to be applied to the cluster
#[derive(Debug, Clone)]
pub struct SecretManifest {
    pub name: String,
    pub kind: CredentialKind,
    pub payload: CredentialPayload,
}

/// `config.json` layout understood by the builder
#[derive(Debug, Serialize, Deserialize)]
struct DockerConfig {
    auths: BTreeMap<String, AuthEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AuthEntry {
    /// Base64 of "username:password"
    auth: String,
}

/// Derives credential payloads from configuration
///
/// Each payload is computed on first request and kept for the lifetime of the
/// provisioner. The cache cells are synchronized, so one provisioner can be
/// shared across concurrent runs behind an `Arc`. Derivation failures are not
/// cached.
#[derive(Debug)]
pub struct CredentialProvisioner {
    registry: RegistrySettings,
    object_store: ObjectStoreSettings,
    registry_auth: OnceLock<CredentialPayload>,
    object_store_access: OnceLock<CredentialPayload>,
}

impl CredentialProvisioner {
    pub fn new(registry: RegistrySettings, object_store: ObjectStoreSettings) -> Self {
        Self {
            registry,
            object_store,
            registry_auth: OnceLock::new(),
            object_store_access: OnceLock::new(),
        }
    }

    /// Payload for `kind`
    pub fn get(&self, kind: CredentialKind) -> BuildResult<&CredentialPayload> {
        let cell = match kind {
            CredentialKind::RegistryAuth => &self.registry_auth,
            CredentialKind::ObjectStoreAccess => &self.object_store_access,
        };

        if let Some(payload) = cell.get() {
            return Ok(payload);
        }

        let payload = match kind {
            CredentialKind::RegistryAuth => self.derive_registry_auth()?,
            CredentialKind::ObjectStoreAccess => self.derive_object_store_access()?,
        };
        tracing::debug!("Derived {} credentials ({} fields)", kind, payload.len());

        // A concurrent caller may have won the race; both derived the same value.
        Ok(cell.get_or_init(|| payload))
    }

    /// Payload for a kind given by name
    pub fn get_by_name(&self, kind: &str) -> BuildResult<&CredentialPayload> {
        self.get(kind.parse()?)
    }

    /// Region the builder reaches the object store in
    pub fn region(&self) -> BuildResult<&str> {
        self.object_store
            .region()
            .map_err(|source| BuildError::Credential {
                kind: CredentialKind::ObjectStoreAccess.as_str(),
                source,
            })
    }

    fn derive_registry_auth(&self) -> BuildResult<CredentialPayload> {
        let kind = CredentialKind::RegistryAuth.as_str();
        let missing = |source| BuildError::Credential { kind, source };

        let username = self.registry.username().map_err(missing)?;
        let password = self.registry.password().map_err(missing)?;
        let server = self.registry.auth_server().map_err(missing)?;

        let auth = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", username, password));
        let config = DockerConfig {
            auths: BTreeMap::from([(server, AuthEntry { auth })]),
        };
        let document =
            serde_json::to_vec(&config).map_err(|source| BuildError::Serialize { kind, source })?;

        Ok(CredentialPayload::default().with_field(DOCKER_CONFIG_JSON_KEY, document))
    }

    fn derive_object_store_access(&self) -> BuildResult<CredentialPayload> {
        let kind = CredentialKind::ObjectStoreAccess.as_str();
        let missing = |source| BuildError::Credential { kind, source };

        let access_key_id = self.object_store.access_key_id().map_err(missing)?;
        let secret_access_key = self.object_store.secret_access_key().map_err(missing)?;
        let region = self.object_store.region().map_err(missing)?;

        Ok(CredentialPayload::default()
            .with_field(ACCESS_KEY_ID_FIELD, access_key_id)
            .with_field(SECRET_ACCESS_KEY_FIELD, secret_access_key)
            .with_field(REGION_FIELD, region))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn registry() -> RegistrySettings {
        RegistrySettings {
            username: Some("alice".to_string()),
            password: Some("s3cret".to_string()),
            server: None,
            repository: Some("web".to_string()),
            tag: Some("v1".to_string()),
        }
    }

    fn object_store() -> ObjectStoreSettings {
        ObjectStoreSettings {
            access_key_id: Some("AKIAEXAMPLE".to_string()),
            secret_access_key: Some("wJalrXUtnFEMI".to_string()),
            region: Some("us-east-1".to_string()),
            endpoint: None,
        }
    }

    #[test]
    fn test_registry_auth_document() {
        let provisioner = CredentialProvisioner::new(registry(), object_store());
        let payload = provisioner.get(CredentialKind::RegistryAuth).unwrap();

        assert_eq!(payload.len(), 1);
        let document: DockerConfig =
            serde_json::from_slice(payload.get(DOCKER_CONFIG_JSON_KEY).unwrap()).unwrap();

        let entry = document
            .auths
            .get(buildflow_config::DOCKER_HUB_AUTH_SERVER)
            .unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&entry.auth)
            .unwrap();
        assert_eq!(decoded, b"alice:s3cret");
    }

    #[test]
    fn test_registry_auth_uses_configured_server() {
        let mut settings = registry();
        settings.server = Some("ghcr.io".to_string());
        let provisioner = CredentialProvisioner::new(settings, object_store());

        let payload = provisioner.get(CredentialKind::RegistryAuth).unwrap();
        let document: DockerConfig =
            serde_json::from_slice(payload.get(DOCKER_CONFIG_JSON_KEY).unwrap()).unwrap();
        assert_eq!(document.auths.keys().collect::<Vec<_>>(), vec!["ghcr.io"]);
    }

    #[test]
    fn test_object_store_access_fields() {
        let provisioner = CredentialProvisioner::new(registry(), object_store());
        let payload = provisioner.get(CredentialKind::ObjectStoreAccess).unwrap();

        assert_eq!(payload.len(), 3);
        assert_eq!(payload.get(ACCESS_KEY_ID_FIELD).unwrap(), b"AKIAEXAMPLE");
        assert_eq!(payload.get(SECRET_ACCESS_KEY_FIELD).unwrap(), b"wJalrXUtnFEMI");
        assert_eq!(payload.get(REGION_FIELD).unwrap(), b"us-east-1");
    }

    #[test]
    fn test_object_store_access_is_deterministic() {
        let provisioner = CredentialProvisioner::new(registry(), object_store());

        let first = provisioner.get(CredentialKind::ObjectStoreAccess).unwrap();
        let second = provisioner.get(CredentialKind::ObjectStoreAccess).unwrap();
        assert_eq!(first, second);
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_concurrent_first_use() {
        let provisioner = Arc::new(CredentialProvisioner::new(registry(), object_store()));

        let payloads: Vec<CredentialPayload> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let provisioner = Arc::clone(&provisioner);
                    scope.spawn(move || {
                        provisioner
                            .get(CredentialKind::ObjectStoreAccess)
                            .unwrap()
                            .clone()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(payloads.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(payloads[0].len(), 3);
    }

    #[test]
    fn test_missing_configuration() {
        let mut settings = object_store();
        settings.secret_access_key = None;
        let provisioner = CredentialProvisioner::new(registry(), settings);

        let result = provisioner.get(CredentialKind::ObjectStoreAccess);
        match result {
            Err(BuildError::Credential { kind, .. }) => assert_eq!(kind, "object-store-access"),
            other => panic!("Expected Credential error, got {:?}", other),
        }
    }

    #[test]
    fn test_get_by_name() {
        let provisioner = CredentialProvisioner::new(registry(), object_store());

        assert!(provisioner.get_by_name("registry-auth").is_ok());
        assert!(matches!(
            provisioner.get_by_name("gcs"),
            Err(BuildError::UnknownCredentialKind(_))
        ));
    }

    #[test]
    fn test_kind_names() {
        for kind in CredentialKind::REQUIRED {
            assert_eq!(kind.as_str().parse::<CredentialKind>().unwrap(), kind);
        }
        assert_eq!(
            CredentialKind::RegistryAuth.secret_type(),
            "kubernetes.io/dockerconfigjson"
        );
        assert_eq!(CredentialKind::ObjectStoreAccess.secret_type(), "Opaque");
    }
}
