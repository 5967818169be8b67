/// HTTP-level tests of the client and data source endpoints
/// Drives the full router over the in-memory store with a stubbed company lookup
mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::{test_config, StubLookup, TestApp};
use legal_entities_api::enrichment::CompanyRecord;
use legal_entities_api::router::MAX_BODY_BYTES;
use serde_json::{json, Value};
use std::time::Duration;

fn app() -> TestApp {
    TestApp::new(StubLookup::returning(Ok(CompanyRecord::default())))
}

fn full_client(data_source: i64) -> Value {
    json!({
        "full_name": "Общество с ограниченной ответственностью \"Ромашка\"",
        "short_name": "ООО \"Ромашка\"",
        "inn": "7707083893",
        "kpp": "773601001",
        "ogrn": "1027700132195",
        "address": "г Москва, ул Вавилова, д 19",
        "okved": "64.19",
        "reg_date": "2002-08-16",
        "authorized_capital": "10000",
        "status": "active",
        "data_source": data_source
    })
}

#[tokio::test]
async fn test_create_rejects_malformed_identifiers() {
    let app = app();
    let source = app.data_source("Manual").await;

    for (field, value) in [
        ("inn", "12345"),
        ("inn", "77070838931"),
        ("inn", "77070838AB"),
        ("kpp", "77360100"),
        ("kpp", "77360100X"),
        ("ogrn", "102770013219"),
        ("ogrn", "102770013219X"),
    ] {
        let mut body = full_client(source);
        body[field] = json!(value);

        let (status, errors) = app.send(Method::POST, "/api/clients/", Some(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{}={}", field, value);
        assert!(errors[field].is_array(), "no error for {}: {}", field, errors);
    }
    assert_eq!(app.client_count().await, 0);
}

#[tokio::test]
async fn test_create_requires_inn_or_ogrn() {
    let app = app();
    let source = app.data_source("Manual").await;

    let (status, errors) = app
        .send(
            Method::POST,
            "/api/clients/",
            Some(json!({ "full_name": "Безымянная", "data_source": source })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(errors["inn"][0], "Either INN or OGRN must be provided.");
    assert_eq!(errors["ogrn"][0], "Either INN or OGRN must be provided.");
}

#[tokio::test]
async fn test_create_then_retrieve_full_record() {
    let app = app();
    let source = app.data_source("Manual").await;

    let (status, created) = app
        .send(Method::POST, "/api/clients/", Some(full_client(source)))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let uri = format!("/api/clients/{}/", created["id"]);
    let (status, fetched) = app.send(Method::GET, &uri, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
    assert_eq!(fetched["inn"], "7707083893");
    assert_eq!(fetched["kpp"], "773601001");
    assert_eq!(fetched["ogrn"], "1027700132195");
    assert_eq!(fetched["reg_date"], "2002-08-16");
    assert_eq!(fetched["authorized_capital"], "10000.00");
    assert_eq!(fetched["status"], "active");
    assert_eq!(fetched["data_source"], source);
    assert_eq!(fetched["data_source_name"], "Manual");
    assert_eq!(fetched["last_checked_at"], Value::Null);
    assert!(fetched["created_at"].is_string());
    assert!(fetched["updated_at"].is_string());
}

#[tokio::test]
async fn test_read_only_fields_are_ignored() {
    let app = app();
    let source = app.data_source("Manual").await;
    let mut body = full_client(source);
    body["id"] = json!(999);
    body["created_at"] = json!("2001-01-01T00:00:00Z");
    body["data_source_name"] = json!("Spoofed");

    let (status, created) = app.send(Method::POST, "/api/clients/", Some(body)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(created["id"], 999);
    assert_ne!(created["created_at"], "2001-01-01T00:00:00Z");
    assert_eq!(created["data_source_name"], "Manual");
}

#[tokio::test]
async fn test_unknown_data_source_is_a_field_error() {
    let app = app();

    let (status, errors) = app
        .send(
            Method::POST,
            "/api/clients/",
            Some(json!({ "inn": "7707083893", "data_source": 404 })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        errors["data_source"][0],
        "Invalid pk \"404\" - object does not exist."
    );
}

#[tokio::test]
async fn test_capital_sent_as_number_keeps_its_cents() {
    let app = app();
    let source = app.data_source("Manual").await;

    for (amount, stored) in [
        (json!(12345.67), "12345.67"),
        (json!(0.1), "0.10"),
        (json!(100.1), "100.10"),
        (json!(250000), "250000.00"),
    ] {
        let mut body = full_client(source);
        body["authorized_capital"] = amount.clone();

        let (status, created) = app.send(Method::POST, "/api/clients/", Some(body)).await;

        assert_eq!(status, StatusCode::CREATED, "{}: {}", amount, created);
        assert_eq!(created["authorized_capital"], stored);
    }

    let mut body = full_client(source);
    body["authorized_capital"] = json!(0.125);
    let (status, errors) = app.send(Method::POST, "/api/clients/", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        errors["authorized_capital"][0],
        "Ensure that there are no more than 2 decimal places."
    );
}

#[tokio::test]
async fn test_unreadable_values_are_reported_per_field() {
    let app = app();
    let source = app.data_source("Manual").await;

    for (field, value, message) in [
        (
            "reg_date",
            json!("16.08.2002"),
            "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.",
        ),
        ("authorized_capital", json!("abc"), "A valid number is required."),
        (
            "data_source",
            json!("abc"),
            "Incorrect type. Expected pk value, received str.",
        ),
        ("inn", json!({ "value": "7707083893" }), "Not a valid string."),
    ] {
        let mut body = full_client(source);
        body[field] = value;

        let (status, errors) = app.send(Method::POST, "/api/clients/", Some(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", field);
        assert_eq!(errors[field], json!([message]), "{}", errors);
        assert_eq!(errors.as_object().map(|o| o.len()), Some(1), "{}", errors);
    }

    let mut body = full_client(source);
    body["reg_date"] = json!("yesterday");
    body["kpp"] = json!("1");
    let (status, errors) = app.send(Method::POST, "/api/clients/", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(errors["reg_date"].is_array());
    assert!(errors["kpp"].is_array());
    assert_eq!(app.client_count().await, 0);
}

#[tokio::test]
async fn test_numeric_identifiers_are_read_as_text() {
    let app = app();
    let source = app.data_source("Manual").await;
    let mut body = full_client(source);
    body["inn"] = json!(7707083893u64);
    body["data_source"] = json!(source.to_string());

    let (status, created) = app.send(Method::POST, "/api/clients/", Some(body)).await;

    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["inn"], "7707083893");
    assert_eq!(created["data_source"], source);
}

#[tokio::test]
async fn test_patch_rejects_null_data_source() {
    let app = app();
    let source = app.data_source("Manual").await;
    let (_, created) = app
        .send(Method::POST, "/api/clients/", Some(full_client(source)))
        .await;
    let uri = format!("/api/clients/{}/", created["id"]);

    let (status, errors) = app
        .send(Method::PATCH, &uri, Some(json!({ "data_source": null })))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(errors["data_source"], json!(["This field may not be null."]));

    let (_, stored) = app.send(Method::GET, &uri, None).await;
    assert_eq!(stored, created);
}

#[tokio::test]
async fn test_delete_then_retrieve_is_not_found() {
    let app = app();
    let source = app.data_source("Manual").await;
    let (_, created) = app
        .send(Method::POST, "/api/clients/", Some(full_client(source)))
        .await;
    let uri = format!("/api/clients/{}/", created["id"]);

    let (status, body) = app.send(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body) = app.send(Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "Not found." }));

    let (status, _) = app.send(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_patch_status_changes_only_status() {
    let app = app();
    let source = app.data_source("Manual").await;
    let (_, created) = app
        .send(Method::POST, "/api/clients/", Some(full_client(source)))
        .await;
    let uri = format!("/api/clients/{}/", created["id"]);

    tokio::time::sleep(Duration::from_millis(5)).await;
    let (status, patched) = app
        .send(Method::PATCH, &uri, Some(json!({ "status": "liquidated" })))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["status"], "liquidated");
    assert_eq!(patched["created_at"], created["created_at"]);
    assert_ne!(patched["updated_at"], created["updated_at"]);

    let unchanged = |mut record: Value| {
        let object = record.as_object_mut().expect("object");
        for key in ["status", "updated_at"] {
            object.remove(key);
        }
        record
    };
    assert_eq!(unchanged(patched), unchanged(created));
}

#[tokio::test]
async fn test_patch_rejects_unknown_status() {
    let app = app();
    let source = app.data_source("Manual").await;
    let (_, created) = app
        .send(Method::POST, "/api/clients/", Some(full_client(source)))
        .await;
    let uri = format!("/api/clients/{}/", created["id"]);

    let (status, errors) = app
        .send(Method::PATCH, &uri, Some(json!({ "status": "bankrupt" })))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(errors["status"][0], "\"bankrupt\" is not a valid choice.");
}

#[tokio::test]
async fn test_put_replaces_whole_record() {
    let app = app();
    let source = app.data_source("Manual").await;
    let (_, created) = app
        .send(Method::POST, "/api/clients/", Some(full_client(source)))
        .await;
    let uri = format!("/api/clients/{}/", created["id"]);

    let (status, errors) = app
        .send(Method::PUT, &uri, Some(json!({ "ogrn": "1027700132195" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(errors["data_source"][0], "This field is required.");

    let (status, replaced) = app
        .send(
            Method::PUT,
            &uri,
            Some(json!({ "ogrn": "1027700132195", "data_source": source })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replaced["ogrn"], "1027700132195");
    assert_eq!(replaced["inn"], Value::Null);
    assert_eq!(replaced["full_name"], Value::Null);
    assert_eq!(replaced["created_at"], created["created_at"]);
}

#[tokio::test]
async fn test_non_numeric_id_is_not_found() {
    let app = app();

    let (status, body) = app.send(Method::GET, "/api/clients/abc/", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "Not found." }));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/clients/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"inn\": "))
        .unwrap();

    let (status, body) = app.call(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let app = app();
    let payload = vec![b' '; MAX_BODY_BYTES + 1];
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/clients/")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, payload.len())
        .body(Body::from(payload))
        .unwrap();

    let (status, _) = app.call(request).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_list_newest_first_with_optional_pages() {
    let app = TestApp::with_config(
        test_config(&[("ALLOWED_HOSTS", "*"), ("PAGE_SIZE", "2")]),
        StubLookup::returning(Ok(CompanyRecord::default())),
    );
    let source = app.data_source("Manual").await;
    for inn in ["7707083893", "7728168971", "7702070139"] {
        let (status, _) = app
            .send(
                Method::POST,
                "/api/clients/",
                Some(json!({ "inn": inn, "data_source": source })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, all) = app.send(Method::GET, "/api/clients/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["count"], 3);
    assert_eq!(all["next"], Value::Null);
    let inns: Vec<&str> = all["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["inn"].as_str().unwrap())
        .collect();
    assert_eq!(inns, ["7702070139", "7728168971", "7707083893"]);

    let (status, first) = app.send(Method::GET, "/api/clients/?page=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["results"].as_array().unwrap().len(), 2);
    assert_eq!(first["next"], "/api/clients/?page=2");
    assert_eq!(first["previous"], Value::Null);

    let (status, _) = app.send(Method::GET, "/api/clients/?page=3", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_data_source_lifecycle() {
    let app = app();

    let (status, errors) = app
        .send(Method::POST, "/api/data-sources/", Some(json!({ "name": "" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(errors["name"].is_array());

    let (status, source) = app
        .send(Method::POST, "/api/data-sources/", Some(json!({ "name": "Manual" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let source_uri = format!("/api/data-sources/{}/", source["id"]);

    let (_, client) = app
        .send(
            Method::POST,
            "/api/clients/",
            Some(json!({ "inn": "7707083893", "data_source": source["id"] })),
        )
        .await;

    let (status, body) = app.send(Method::DELETE, &source_uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());

    let client_uri = format!("/api/clients/{}/", client["id"]);
    app.send(Method::DELETE, &client_uri, None).await;

    let (status, _) = app.send(Method::DELETE, &source_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, list) = app.send(Method::GET, "/api/data-sources/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 0);
}

#[tokio::test]
async fn test_unlisted_host_is_rejected_but_health_is_open() {
    let app = TestApp::with_config(
        test_config(&[]),
        StubLookup::returning(Ok(CompanyRecord::default())),
    );

    let request = |host: &str, uri: &str| {
        Request::builder()
            .uri(uri)
            .header(header::HOST, host)
            .body(Body::empty())
            .unwrap()
    };

    let (status, body) = app.call(request("evil.example", "/api/clients/")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid Host header");

    let (status, _) = app.call(request("localhost:8000", "/api/clients/")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, health) = app.call(request("evil.example", "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = app();

    let (status, doc) = app.send(Method::GET, "/api-docs/openapi.json", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/clients/{id}/"].is_object());
}
