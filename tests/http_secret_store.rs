//! Secret resolution against a live HTTP secret backend.

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use config_compiler::error::CompileError;
use config_compiler::loader::{HttpSecretStore, LoadError, SecretStore, SecretStoreError};
use config_compiler::schema::parse_schema;
use config_compiler::secrets::{SecretResolutionError, SecretResolver};
use config_compiler::{CompileOptions, Compiler, KeyPath, Source};

use common::start_secret_backend;

const SCHEMA: &str = r#"
[[entry]]
key = "secret"
type = "string"
required = true
secret = true

[[entry]]
key = "session_lifetime"
type = "integer"
default = 86400
"#;

fn compiler(resolver: SecretResolver) -> Compiler {
    let schema = parse_schema(SCHEMA, &PathBuf::from("inline.toml")).unwrap();
    Compiler::new(schema, CompileOptions::default()).with_resolver(resolver)
}

fn base_fragment(dir: &tempfile::TempDir, reference: &str) -> Source {
    let path = dir.path().join("base.toml");
    std::fs::write(&path, format!("secret = {{ \"$ref\" = \"{}\" }}\n", reference)).unwrap();
    Source::file(path, 10)
}

#[tokio::test]
async fn test_reference_resolved_with_bearer_token() {
    let backend = start_secret_backend(&[("nextcloud-secret", "s3cret-from-vault\n")], Duration::ZERO).await;
    let store = HttpSecretStore::new("vault", backend.base_url()).with_token("vault-token");
    let resolver = SecretResolver::new(Duration::from_secs(2)).with_store(Arc::new(store));

    let dir = tempfile::tempdir().unwrap();
    let compilation = compiler(resolver)
        .compile(&[base_fragment(&dir, "secret://vault/nextcloud-secret")])
        .await
        .unwrap();

    assert_eq!(
        compilation.config.get_str(&KeyPath::new(["secret"])),
        Some("s3cret-from-vault")
    );
    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/v1/nextcloud-secret");
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer vault-token"));
}

#[tokio::test]
async fn test_absent_key_is_missing() {
    let backend = start_secret_backend(&[], Duration::ZERO).await;
    let store = HttpSecretStore::new("vault", backend.base_url());
    let resolver = SecretResolver::new(Duration::from_secs(2)).with_store(Arc::new(store));

    let dir = tempfile::tempdir().unwrap();
    let err = compiler(resolver)
        .compile(&[base_fragment(&dir, "secret://vault/nextcloud-secret")])
        .await
        .unwrap_err();

    match &err {
        CompileError::SecretResolution(SecretResolutionError::Missing { path, .. }) => {
            assert_eq!(path, &KeyPath::new(["secret"]));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.exit_code(), 2);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let backend = start_secret_backend(&[("nextcloud-secret", "late")], Duration::from_secs(2)).await;
    let store = HttpSecretStore::new("vault", backend.base_url());
    let resolver = SecretResolver::new(Duration::from_millis(100)).with_store(Arc::new(store));

    let dir = tempfile::tempdir().unwrap();
    let err = compiler(resolver)
        .compile(&[base_fragment(&dir, "secret://vault/nextcloud-secret")])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CompileError::SecretResolution(SecretResolutionError::Timeout { .. })
    ));
    assert!(err.is_retryable());
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_store_document_as_source() {
    let document = "secret = \"document-secret\"\nsession_lifetime = \"1800\"\n";
    let backend = start_secret_backend(&[("nextcloud", document)], Duration::ZERO).await;
    let store = Arc::new(HttpSecretStore::new("vault", backend.base_url()));
    let compiler = compiler(SecretResolver::new(Duration::from_secs(2)));

    let compilation = compiler
        .compile(&[Source::secret_store(store.clone(), "nextcloud", 10)])
        .await
        .unwrap();
    assert_eq!(compilation.config.get_i64(&KeyPath::new(["session_lifetime"])), Some(1800));

    let err = compiler
        .compile(&[Source::secret_store(store, "absent", 10)])
        .await
        .unwrap_err();
    assert!(matches!(err, CompileError::Load(LoadError::SourceMissing { .. })));
}

#[tokio::test]
async fn test_key_cannot_redirect_to_another_host() {
    let elsewhere = start_secret_backend(&[("x", "leaked")], Duration::ZERO).await;
    let store = HttpSecretStore::new("vault", url::Url::parse("https://vault.invalid/v1/").unwrap())
        .with_token("vault-token");

    let key = format!("http:{}/v1/x", elsewhere.addr);
    assert!(matches!(
        store.fetch(&key).await,
        Err(SecretStoreError::InvalidKey(_))
    ));

    let resolver = SecretResolver::new(Duration::from_secs(2)).with_store(Arc::new(store));
    let dir = tempfile::tempdir().unwrap();
    let err = compiler(resolver)
        .compile(&[base_fragment(&dir, &format!("secret://vault/{}", key))])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CompileError::SecretResolution(SecretResolutionError::Store {
            source: SecretStoreError::InvalidKey(_),
            ..
        })
    ));
    assert!(elsewhere.requests().is_empty());
}

#[tokio::test]
async fn test_slow_store_document_times_out() {
    let backend = start_secret_backend(&[("nextcloud", "secret = \"late-secret\"\n")], Duration::from_secs(2)).await;
    let store = Arc::new(HttpSecretStore::new("vault", backend.base_url()));
    let schema = parse_schema(SCHEMA, &PathBuf::from("inline.toml")).unwrap();
    let options = CompileOptions {
        timeout: Duration::from_millis(100),
        ..CompileOptions::default()
    };
    let compiler = Compiler::new(schema, options);

    let err = compiler
        .compile(&[Source::secret_store(store, "nextcloud", 10)])
        .await
        .unwrap_err();

    match &err {
        CompileError::Load(LoadError::Timeout(timeout)) => {
            assert_eq!(timeout.origin, "secret:vault/nextcloud");
            assert_eq!(timeout.budget, Duration::from_millis(100));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_retryable());
    assert_eq!(err.exit_code(), 2);
}
