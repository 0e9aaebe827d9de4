//! Drives the provider through ProviderHost against a mocked Resource
//! Manager: configure, apply, read, import and data source reads.

#![allow(clippy::disallowed_methods)]

use apimanagement::ApiManagementProvider;
use mockito::{Matcher, Server, ServerGuard};
use tfplug::types::{has_errors, AttributePath, Dynamic, DynamicValue};
use tfplug::{Context, ObjectBuilder, ProviderHost};

const SUBSCRIPTION: &str = "11111111-1111-1111-1111-111111111111";

fn service_path() -> String {
    format!(
        "/subscriptions/{}/resourceGroups/rg1/providers/Microsoft.ApiManagement/service/apim1",
        SUBSCRIPTION
    )
}

fn named_value_path() -> String {
    format!("{}/namedValues/nv1", service_path())
}

async fn configured_host(server: &ServerGuard) -> ProviderHost<ApiManagementProvider> {
    let host = ProviderHost::new(ApiManagementProvider::new());
    let config = ObjectBuilder::new()
        .string("subscription_id", SUBSCRIPTION)
        .string("access_token", "test-token")
        .string("resource_manager_endpoint", server.url())
        .into_value();
    let diagnostics = host.configure(&Context::new(), config).await;
    assert!(!has_errors(&diagnostics), "{:?}", diagnostics);
    host
}

fn named_value_config(value: &str) -> DynamicValue {
    ObjectBuilder::new()
        .string("name", "nv1")
        .string("resource_group_name", "rg1")
        .string("api_management_name", "apim1")
        .string("display_name", "My-Value")
        .string("value", value)
        .into_value()
}

fn named_value_body(value: &str) -> String {
    format!(
        r#"{{"properties":{{"displayName":"My-Value","value":"{}","secret":false,"provisioningState":"Succeeded"}}}}"#,
        value
    )
}

#[tokio::test]
async fn schemas_cover_every_handler() {
    let host = ProviderHost::new(ApiManagementProvider::new());
    let schemas = host.schemas(&Context::new()).await;

    assert_eq!(schemas.resources.len(), 13);
    assert_eq!(schemas.data_sources.len(), 3);
    assert!(schemas.provider.block.nested_block("features").is_some());

    let service = &schemas.resources["azurerm_api_management"];
    for required in ["name", "resource_group_name", "location", "publisher_name", "publisher_email", "sku_name"] {
        assert!(service.block.attribute(required).unwrap().required, "{}", required);
    }
    let secret = schemas.provider.block.attribute("client_secret").unwrap();
    assert!(secret.sensitive);
}

#[tokio::test(flavor = "multi_thread")]
async fn named_value_lifecycle() {
    let mut server = Server::new_async().await;
    let host = configured_host(&server).await;
    let ctx = Context::new();
    let path = named_value_path();

    let _absent = server
        .mock("GET", path.as_str())
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"error":{"code":"ResourceNotFound","message":"not found"}}"#)
        .expect(1)
        .create_async()
        .await;
    let put = server
        .mock("PUT", path.as_str())
        .match_query(Matcher::UrlEncoded("api-version".into(), "2024-05-01".into()))
        .match_header("authorization", "Bearer test-token")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "properties": {"displayName": "My-Value", "value": "plain", "secret": false}
        })))
        .with_status(200)
        .with_body(named_value_body("plain"))
        .create_async()
        .await;
    let _present = server
        .mock("GET", path.as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(named_value_body("plain"))
        .create_async()
        .await;

    let created = host
        .apply(
            &ctx,
            "azurerm_api_management_named_value",
            &DynamicValue::null(),
            &named_value_config("plain"),
        )
        .await;
    assert!(!has_errors(&created.diagnostics), "{:?}", created.diagnostics);
    put.assert_async().await;

    let state = created.new_state.unwrap();
    assert_eq!(
        state.get_string(&AttributePath::new("id")).unwrap(),
        format!("/subscriptions/{}/resourceGroups/rg1/providers/Microsoft.ApiManagement/service/apim1/namedValues/nv1", SUBSCRIPTION)
    );
    assert!(!state.get_bool(&AttributePath::new("secret")).unwrap());

    let read = host
        .read_resource(&ctx, "azurerm_api_management_named_value", &state)
        .await;
    assert!(read.diagnostics.is_empty(), "{:?}", read.diagnostics);
    assert_eq!(
        read.new_state
            .unwrap()
            .get_string(&AttributePath::new("value"))
            .unwrap(),
        "plain"
    );

    let delete = server
        .mock("DELETE", path.as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .create_async()
        .await;
    let destroyed = host
        .apply(
            &ctx,
            "azurerm_api_management_named_value",
            &state,
            &DynamicValue::null(),
        )
        .await;
    assert!(!has_errors(&destroyed.diagnostics), "{:?}", destroyed.diagnostics);
    assert!(destroyed.new_state.is_none());
    delete.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn create_refuses_to_adopt_existing_object() {
    let mut server = Server::new_async().await;
    let host = configured_host(&server).await;

    let _existing = server
        .mock("GET", named_value_path().as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(named_value_body("plain"))
        .create_async()
        .await;
    let put = server
        .mock("PUT", named_value_path().as_str())
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let result = host
        .apply(
            &Context::new(),
            "azurerm_api_management_named_value",
            &DynamicValue::null(),
            &named_value_config("plain"),
        )
        .await;

    assert!(has_errors(&result.diagnostics));
    assert_eq!(result.diagnostics[0].summary, "Resource already exists");
    assert!(result.diagnostics[0].detail.contains(&named_value_path()));
    put.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn read_of_vanished_object_clears_state() {
    let mut server = Server::new_async().await;
    let host = configured_host(&server).await;

    let _gone = server
        .mock("GET", named_value_path().as_str())
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"error":{"code":"ResourceNotFound","message":"not found"}}"#)
        .create_async()
        .await;

    let state = ObjectBuilder::new()
        .string("id", named_value_path())
        .into_value();
    let response = host
        .read_resource(&Context::new(), "azurerm_api_management_named_value", &state)
        .await;

    assert!(response.diagnostics.is_empty());
    assert!(response.new_state.is_none());
}

#[tokio::test]
async fn import_validates_the_id() {
    let server = Server::new_async().await;
    let host = configured_host(&server).await;
    let ctx = Context::new();

    let imported = host
        .import_resource_state(&ctx, "azurerm_api_management_named_value", &named_value_path())
        .await;
    assert!(imported.diagnostics.is_empty(), "{:?}", imported.diagnostics);
    assert_eq!(imported.imported_resources.len(), 1);
    assert_eq!(
        imported.imported_resources[0]
            .state
            .get_string(&AttributePath::new("id"))
            .unwrap(),
        named_value_path()
    );

    let rejected = host
        .import_resource_state(&ctx, "azurerm_api_management_named_value", &service_path())
        .await;
    assert!(has_errors(&rejected.diagnostics));
    assert!(rejected.imported_resources.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn subscription_data_source_reads_keys() {
    let mut server = Server::new_async().await;
    let host = configured_host(&server).await;
    let subscription_path = format!("{}/subscriptions/partner", service_path());

    let _get = server
        .mock("GET", subscription_path.as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(format!(
            r#"{{"properties":{{"displayName":"Partner","scope":"{}/apis","state":"active"}}}}"#,
            service_path()
        ))
        .create_async()
        .await;
    let _secrets = server
        .mock("POST", format!("{}/listSecrets", subscription_path).as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"primaryKey":"pk","secondaryKey":"sk"}"#)
        .create_async()
        .await;

    let config = ObjectBuilder::new()
        .string("api_management_id", service_path())
        .string("subscription_id", "partner")
        .into_value();
    let response = host
        .read_data_source(&Context::new(), "azurerm_api_management_subscription", &config)
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    let state = response.state;
    assert_eq!(state.get_string(&AttributePath::new("display_name")).unwrap(), "Partner");
    assert_eq!(state.get_string(&AttributePath::new("secondary_key")).unwrap(), "sk");
    assert!(!matches!(
        state.get(&AttributePath::new("product_id")),
        Some(Dynamic::String(_))
    ));
}

#[tokio::test]
async fn configure_requires_credentials() {
    let host = ProviderHost::new(ApiManagementProvider::new());
    let config = ObjectBuilder::new()
        .string("subscription_id", SUBSCRIPTION)
        .string("tenant_id", "tenant")
        .string("client_id", "client")
        .string("client_secret", "secret")
        .string("resource_manager_endpoint", "not a url")
        .into_value();

    let diagnostics = host.configure(&Context::new(), config).await;
    assert!(has_errors(&diagnostics));
}
