//! Drives an in-memory provider through ProviderHost: configure, validate,
//! plan, apply, read, import and data source reads.

#![allow(clippy::disallowed_methods)]

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::defaults::StaticDefault;
use tfplug::import::import_state_passthrough_id;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderMetaSchemaRequest, ProviderMetaSchemaResponse, ProviderMetadataRequest,
    ProviderMetadataResponse, ProviderSchemaRequest, ProviderSchemaResponse, ResourceFactory,
    StopProviderRequest, StopProviderResponse, ValidateProviderConfigRequest,
    ValidateProviderConfigResponse,
};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ManagedResource, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue, ServerCapabilities};
use tfplug::{ObjectBuilder, ObjectReader, ProviderHost};

#[derive(Default)]
struct Store {
    entries: RwLock<HashMap<String, String>>,
    creates: AtomicUsize,
    deletes: AtomicUsize,
}

struct KvProvider {
    store: Arc<Store>,
}

#[async_trait]
impl Provider for KvProvider {
    fn type_name(&self) -> &str {
        "kv"
    }

    async fn metadata(&self, _ctx: Context, _request: ProviderMetadataRequest) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: "kv".to_string(),
            server_capabilities: ServerCapabilities::default(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: SchemaBuilder::new()
                .attribute(
                    AttributeBuilder::new("namespace", AttributeType::String)
                        .required()
                        .build(),
                )
                .build(),
            diagnostics: vec![],
        }
    }

    async fn meta_schema(&self, _ctx: Context, _request: ProviderMetaSchemaRequest) -> ProviderMetaSchemaResponse {
        ProviderMetaSchemaResponse {
            schema: None,
            diagnostics: vec![],
        }
    }

    async fn configure(&mut self, _ctx: Context, request: ConfigureProviderRequest) -> ConfigureProviderResponse {
        let namespace = ObjectReader::new(&request.config)
            .required_string("namespace")
            .unwrap();
        ConfigureProviderResponse {
            diagnostics: vec![],
            provider_data: Some(Arc::new(KvData {
                store: self.store.clone(),
                namespace,
            }) as Arc<dyn Any + Send + Sync>),
        }
    }

    async fn validate(&self, _ctx: Context, _request: ValidateProviderConfigRequest) -> ValidateProviderConfigResponse {
        ValidateProviderConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn stop(&self, _ctx: Context, _request: StopProviderRequest) -> StopProviderResponse {
        StopProviderResponse { error: None }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
        factories.insert(
            "kv_entry".to_string(),
            Box::new(|| Box::new(KvEntry { data: None }) as Box<dyn ManagedResource>),
        );
        factories
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut factories: HashMap<String, DataSourceFactory> = HashMap::new();
        factories.insert(
            "kv_lookup".to_string(),
            Box::new(|| Box::new(KvLookup { data: None }) as Box<dyn DataSourceWithConfigure>),
        );
        factories
    }
}

#[derive(Clone)]
struct KvData {
    store: Arc<Store>,
    namespace: String,
}

impl KvData {
    fn key(&self, name: &str) -> String {
        format!("{}/{}", self.namespace, name)
    }
}

fn entry_schema() -> Schema {
    SchemaBuilder::new()
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("name", AttributeType::String)
                .required()
                .plan_modifier(RequiresReplace::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("value", AttributeType::String)
                .default(StaticDefault::string("empty"))
                .build(),
        )
        .build()
}

struct KvEntry {
    data: Option<KvData>,
}

impl KvEntry {
    fn state(id: &str, name: &str, value: &str) -> DynamicValue {
        ObjectBuilder::new()
            .string("id", id)
            .string("name", name)
            .string("value", value)
            .into_value()
    }
}

#[async_trait]
impl Resource for KvEntry {
    fn type_name(&self) -> &str {
        "kv_entry"
    }

    async fn metadata(&self, _ctx: Context, _request: ResourceMetadataRequest) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: "kv_entry".to_string(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: entry_schema(),
            diagnostics: vec![],
        }
    }

    async fn validate(&self, _ctx: Context, request: ValidateResourceConfigRequest) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];
        if let Ok(Some(name)) = ObjectReader::new(&request.config).string("name") {
            if name.contains('/') {
                diagnostics.push(
                    Diagnostic::error("Invalid name", "name must not contain '/'")
                        .with_attribute(AttributePath::new("name")),
                );
            }
        }
        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let data = self.data.as_ref().unwrap();
        let planned = ObjectReader::new(&request.planned_state);
        let name = planned.required_string("name").unwrap();
        let value = planned.string("value").unwrap().unwrap();
        let key = data.key(&name);

        let mut entries = data.store.entries.write().await;
        if entries.contains_key(&key) {
            return CreateResourceResponse {
                new_state: DynamicValue::null(),
                private: vec![],
                diagnostics: vec![Diagnostic::error("Resource already exists", key)],
            };
        }
        entries.insert(key.clone(), value.clone());
        data.store.creates.fetch_add(1, Ordering::SeqCst);

        CreateResourceResponse {
            new_state: Self::state(&key, &name, &value),
            private: vec![],
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let data = self.data.as_ref().unwrap();
        let id = ObjectReader::new(&request.current_state)
            .required_string("id")
            .unwrap();
        let entries = data.store.entries.read().await;
        let new_state = entries.get(&id).map(|value| {
            let name = id.rsplit('/').next().unwrap_or_default();
            Self::state(&id, name, value)
        });
        ReadResourceResponse {
            new_state,
            diagnostics: vec![],
            private: vec![],
            deferred: None,
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let data = self.data.as_ref().unwrap();
        let planned = ObjectReader::new(&request.planned_state);
        let id = planned.required_string("id").unwrap();
        let name = planned.required_string("name").unwrap();
        let value = planned.string("value").unwrap().unwrap();
        data.store.entries.write().await.insert(id.clone(), value.clone());

        UpdateResourceResponse {
            new_state: Self::state(&id, &name, &value),
            private: vec![],
            diagnostics: vec![],
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let data = self.data.as_ref().unwrap();
        let id = ObjectReader::new(&request.prior_state)
            .required_string("id")
            .unwrap();
        data.store.entries.write().await.remove(&id);
        data.store.deletes.fetch_add(1, Ordering::SeqCst);
        DeleteResourceResponse { diagnostics: vec![] }
    }
}

#[async_trait]
impl ResourceWithConfigure for KvEntry {
    async fn configure(&mut self, _ctx: Context, request: ConfigureResourceRequest) -> ConfigureResourceResponse {
        let data = request
            .provider_data
            .and_then(|d| d.downcast_ref::<KvData>().cloned());
        let diagnostics = match data {
            Some(data) => {
                self.data = Some(data);
                vec![]
            }
            None => vec![Diagnostic::error("Provider not configured", "no kv data")],
        };
        ConfigureResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithImportState for KvEntry {
    async fn import_state(&self, ctx: Context, request: ImportResourceStateRequest) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();
        import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}

struct KvLookup {
    data: Option<KvData>,
}

#[async_trait]
impl DataSource for KvLookup {
    fn type_name(&self) -> &str {
        "kv_lookup"
    }

    async fn metadata(&self, _ctx: Context, _request: DataSourceMetadataRequest) -> DataSourceMetadataResponse {
        DataSourceMetadataResponse {
            type_name: "kv_lookup".to_string(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: DataSourceSchemaRequest) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: SchemaBuilder::new()
                .attribute(AttributeBuilder::new("name", AttributeType::String).required().build())
                .attribute(AttributeBuilder::new("value", AttributeType::String).computed().build())
                .build(),
            diagnostics: vec![],
        }
    }

    async fn validate(&self, _ctx: Context, _request: ValidateDataSourceConfigRequest) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse { diagnostics: vec![] }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let data = self.data.as_ref().unwrap();
        let name = ObjectReader::new(&request.config).required_string("name").unwrap();
        match data.store.entries.read().await.get(&data.key(&name)) {
            Some(value) => ReadDataSourceResponse {
                state: ObjectBuilder::new().string("name", name).string("value", value.clone()).into_value(),
                diagnostics: vec![],
                deferred: None,
            },
            None => ReadDataSourceResponse {
                state: DynamicValue::null(),
                diagnostics: vec![Diagnostic::error("Entry not found", name)],
                deferred: None,
            },
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for KvLookup {
    async fn configure(&mut self, _ctx: Context, request: ConfigureDataSourceRequest) -> ConfigureDataSourceResponse {
        self.data = request
            .provider_data
            .and_then(|d| d.downcast_ref::<KvData>().cloned());
        ConfigureDataSourceResponse { diagnostics: vec![] }
    }
}

async fn configured_host() -> (ProviderHost<KvProvider>, Arc<Store>) {
    let store = Arc::new(Store::default());
    let host = ProviderHost::new(KvProvider {
        store: store.clone(),
    });
    let diags = host
        .configure(
            &Context::new(),
            ObjectBuilder::new().string("namespace", "ns").into_value(),
        )
        .await;
    assert!(diags.is_empty(), "{diags:?}");
    (host, store)
}

fn entry_config(name: &str, value: Option<&str>) -> DynamicValue {
    ObjectBuilder::new()
        .string("name", name)
        .opt_string("value", value)
        .into_value()
}

#[tokio::test]
async fn configure_rejects_missing_required_attribute() {
    let host = ProviderHost::new(KvProvider {
        store: Arc::new(Store::default()),
    });
    let diags = host
        .configure(&Context::new(), ObjectBuilder::new().into_value())
        .await;
    assert_eq!(diags[0].summary, "Missing required argument");
}

#[tokio::test]
async fn full_lifecycle_create_update_replace_delete() {
    let (host, store) = configured_host().await;
    let ctx = Context::new();

    let created = host
        .apply(&ctx, "kv_entry", &DynamicValue::null(), &entry_config("a", None))
        .await;
    assert!(created.diagnostics.is_empty(), "{:?}", created.diagnostics);
    let state = created.new_state.unwrap();
    assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "ns/a");
    assert_eq!(state.get_string(&AttributePath::new("value")).unwrap(), "empty");

    let updated = host
        .apply(&ctx, "kv_entry", &state, &entry_config("a", Some("v2")))
        .await;
    let state = updated.new_state.unwrap();
    assert_eq!(state.get_string(&AttributePath::new("value")).unwrap(), "v2");
    assert_eq!(store.creates.load(Ordering::SeqCst), 1);

    let replaced = host
        .apply(&ctx, "kv_entry", &state, &entry_config("b", Some("v2")))
        .await;
    let state = replaced.new_state.unwrap();
    assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "ns/b");
    assert_eq!(store.creates.load(Ordering::SeqCst), 2);
    assert_eq!(store.deletes.load(Ordering::SeqCst), 1);

    let destroyed = host
        .apply(&ctx, "kv_entry", &state, &DynamicValue::null())
        .await;
    assert!(destroyed.new_state.is_none());
    assert!(store.entries.read().await.is_empty());
}

#[tokio::test]
async fn read_drops_state_when_entry_vanishes() {
    let (host, store) = configured_host().await;
    let ctx = Context::new();

    let state = host
        .apply(&ctx, "kv_entry", &DynamicValue::null(), &entry_config("gone", None))
        .await
        .new_state
        .unwrap();
    store.entries.write().await.clear();

    let read = host.read_resource(&ctx, "kv_entry", &state).await;
    assert!(read.new_state.is_none());
    assert!(read.diagnostics.is_empty());
}

#[tokio::test]
async fn validation_runs_before_any_apply() {
    let (host, store) = configured_host().await;
    let result = host
        .apply(&Context::new(), "kv_entry", &DynamicValue::null(), &entry_config("a/b", None))
        .await;

    assert_eq!(result.diagnostics[0].summary, "Invalid name");
    assert!(result.new_state.is_none());
    assert_eq!(store.creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn import_then_read() {
    let (host, store) = configured_host().await;
    store
        .entries
        .write()
        .await
        .insert("ns/imported".to_string(), "x".to_string());
    let ctx = Context::new();

    let imported = host.import_resource_state(&ctx, "kv_entry", "ns/imported").await;
    let state = &imported.imported_resources[0].state;
    let read = host.read_resource(&ctx, "kv_entry", state).await;

    let refreshed = read.new_state.unwrap();
    assert_eq!(refreshed.get_string(&AttributePath::new("name")).unwrap(), "imported");
    assert_eq!(refreshed.get_string(&AttributePath::new("value")).unwrap(), "x");
}

#[tokio::test]
async fn data_source_reads_entries() {
    let (host, _store) = configured_host().await;
    let ctx = Context::new();
    host.apply(&ctx, "kv_entry", &DynamicValue::null(), &entry_config("k", Some("v")))
        .await;

    let found = host
        .read_data_source(&ctx, "kv_lookup", &ObjectBuilder::new().string("name", "k").into_value())
        .await;
    assert_eq!(found.state.get_string(&AttributePath::new("value")).unwrap(), "v");

    let missing = host
        .read_data_source(&ctx, "kv_lookup", &ObjectBuilder::new().string("name", "nope").into_value())
        .await;
    assert_eq!(missing.diagnostics[0].summary, "Entry not found");
}

#[tokio::test]
async fn unknown_types_are_diagnostics() {
    let (host, _store) = configured_host().await;
    let result = host
        .apply(&Context::new(), "kv_missing", &DynamicValue::null(), &entry_config("a", None))
        .await;
    assert_eq!(result.diagnostics[0].summary, "Unknown resource type");
}

#[tokio::test]
async fn concurrent_applies_share_the_provider() {
    let (host, store) = configured_host().await;
    let host = Arc::new(host);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let host = host.clone();
            tokio::spawn(async move {
                host.apply(
                    &Context::new(),
                    "kv_entry",
                    &DynamicValue::null(),
                    &entry_config(&format!("e{i}"), None),
                )
                .await
                .diagnostics
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_empty());
    }
    assert_eq!(store.creates.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn schemas_are_listed_by_type() {
    let (host, _store) = configured_host().await;
    let schemas = host.schemas(&Context::new()).await;

    assert!(schemas.resources.contains_key("kv_entry"));
    assert!(schemas.data_sources.contains_key("kv_lookup"));
    assert!(schemas.provider.block.attribute("namespace").is_some());
}
