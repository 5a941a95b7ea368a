//! End-to-end calls over HTTP against a mock SOAP service

mod common;

use std::io::Write;
use std::sync::Arc;

use pmosoap::{Error, Params, SoapClient, payload_from_error};
use serde::Deserialize;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{OK_ENVELOPE, RecordingTransport};

fn stock_wsdl(endpoint: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<wsdl:definitions xmlns:wsdl="http://schemas.xmlsoap.org/wsdl/"
                  xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
                  xmlns:tns="http://example.com/stock/"
                  targetNamespace="http://example.com/stock/">
  <wsdl:binding name="StockBinding" type="tns:StockPortType">
    <soap:binding style="document" transport="http://schemas.xmlsoap.org/soap/http"/>
    <wsdl:operation name="GetPrice">
      <soap:operation soapAction=""/>
    </wsdl:operation>
    <wsdl:operation name="SetPrice">
      <soap:operation soapAction="http://example.com/stock#SetPrice"/>
    </wsdl:operation>
  </wsdl:binding>
  <wsdl:service name="StockService">
    <wsdl:port name="StockPort" binding="tns:StockBinding">
      <soap:address location="{endpoint}"/>
    </wsdl:port>
  </wsdl:service>
</wsdl:definitions>"#
    )
}

/// Mock server exposing the WSDL at `/stock?wsdl` and the service at `/soap`
async fn setup_stock_server() -> MockServer {
    let server = MockServer::start().await;
    let wsdl = stock_wsdl(&format!("{}/soap", server.uri()));

    Mock::given(method("GET"))
        .and(path("/stock"))
        .respond_with(ResponseTemplate::new(200).set_body_string(wsdl))
        .mount(&server)
        .await;

    server
}

fn wsdl_url(server: &MockServer) -> String {
    format!("{}/stock?wsdl", server.uri())
}

#[derive(Debug, Deserialize)]
struct GetPriceResponse {
    #[serde(rename = "Price")]
    price: f64,
}

#[tokio::test]
async fn test_call_posts_envelope_to_service_address() {
    let server = setup_stock_server().await;

    Mock::given(method("POST"))
        .and(path("/soap"))
        .and(header("Content-Type", "text/xml;charset=UTF-8"))
        .and(header("Accept", "text/xml"))
        .and(header("SOAPAction", "http://example.com/stock/GetPrice"))
        .and(body_string_contains(
            r#"<GetPrice xmlns="http://example.com/stock">"#,
        ))
        .and(body_string_contains("<Item>Apple</Item>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(OK_ENVELOPE))
        .expect(1)
        .mount(&server)
        .await;

    let client = SoapClient::new(&wsdl_url(&server)).unwrap();
    let response = client
        .call("GetPrice", Params::new().with("Item", "Apple"))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert!(response.header.is_empty());
    assert!(response.body_text().contains("<Price>1.5</Price>"));

    let parsed: GetPriceResponse = response.unmarshal().unwrap();
    assert_eq!(parsed.price, 1.5);

    assert_eq!(client.base_url().await, "http://example.com/stock");
    assert_eq!(client.active_calls(), 0);
}

#[tokio::test]
async fn test_declared_soap_action_is_used() {
    let server = setup_stock_server().await;

    Mock::given(method("POST"))
        .and(path("/soap"))
        .and(header("SOAPAction", "http://example.com/stock#SetPrice"))
        .respond_with(ResponseTemplate::new(200).set_body_string(OK_ENVELOPE))
        .expect(1)
        .mount(&server)
        .await;

    let client = SoapClient::new(&wsdl_url(&server)).unwrap();
    client
        .call("SetPrice", Params::new().with("Price", 2.5))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_basic_auth_sent_with_complete_credentials() {
    let server = setup_stock_server().await;

    Mock::given(method("POST"))
        .and(path("/soap"))
        .and(header("Authorization", "Basic YWxpY2U6c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(OK_ENVELOPE))
        .expect(1)
        .mount(&server)
        .await;

    let client = SoapClient::builder(wsdl_url(&server))
        .credentials("alice", "secret")
        .build()
        .unwrap();

    client.call("GetPrice", Params::new()).await.unwrap();
}

#[tokio::test]
async fn test_partial_credentials_are_not_sent() {
    let server = setup_stock_server().await;

    Mock::given(method("POST"))
        .and(path("/soap"))
        .respond_with(ResponseTemplate::new(200).set_body_string(OK_ENVELOPE))
        .expect(2)
        .mount(&server)
        .await;

    for (username, password) in [("alice", ""), ("", "secret")] {
        let client = SoapClient::builder(wsdl_url(&server))
            .credentials(username, password)
            .build()
            .unwrap();
        client.call("GetPrice", Params::new()).await.unwrap();
    }

    let requests = server.received_requests().await.unwrap();
    let posts = requests
        .iter()
        .filter(|r| r.method.as_str() == "POST")
        .collect::<Vec<_>>();
    assert_eq!(posts.len(), 2);
    for request in posts {
        assert!(request.headers.get("authorization").is_none());
    }
}

#[tokio::test]
async fn test_latin1_response_is_transcoded() {
    let server = setup_stock_server().await;

    let mut body = br#"<?xml version="1.0" encoding="ISO-8859-1"?><soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><City>M"#.to_vec();
    body.push(0xFC);
    body.extend_from_slice(b"nchen</City></soap:Body></soap:Envelope>");

    Mock::given(method("POST"))
        .and(path("/soap"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/xml; charset=ISO-8859-1"))
        .mount(&server)
        .await;

    let client = SoapClient::new(&wsdl_url(&server)).unwrap();
    let response = client.call("GetCity", Params::new()).await.unwrap();

    assert_eq!(response.body_text(), "<City>München</City>");
}

#[tokio::test]
async fn test_fault_with_http_500_is_a_response() {
    let server = setup_stock_server().await;

    let fault = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <soap:Fault>
      <faultcode>soap:Server</faultcode>
      <faultstring>Out of stock</faultstring>
    </soap:Fault>
  </soap:Body>
</soap:Envelope>"#;

    Mock::given(method("POST"))
        .and(path("/soap"))
        .respond_with(ResponseTemplate::new(500).set_body_string(fault))
        .mount(&server)
        .await;

    let client = SoapClient::new(&wsdl_url(&server)).unwrap();
    let response = client.call("GetPrice", Params::new()).await.unwrap();

    assert_eq!(response.status, 500);
    let parsed = response.fault().expect("fault expected");
    assert_eq!(parsed.fault_code, "soap:Server");
    assert_eq!(parsed.fault_string, "Out of stock");
    assert!(matches!(
        response.unmarshal::<GetPriceResponse>(),
        Err(Error::Fault(_))
    ));
}

#[tokio::test]
async fn test_undecodable_response_keeps_payload_and_status() {
    let server = setup_stock_server().await;

    Mock::given(method("POST"))
        .and(path("/soap"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html><body>Bad gateway</body></html>"))
        .mount(&server)
        .await;

    let client = SoapClient::new(&wsdl_url(&server)).unwrap();
    let err = client
        .call("GetPrice", Params::new().with("Item", "Apple"))
        .await
        .unwrap_err();

    let payload = err.payload().expect("payload expected").to_vec();
    assert!(String::from_utf8_lossy(&payload).contains("<Item>Apple</Item>"));
    assert_eq!(payload_from_error(&err), Some(payload.as_slice()));

    let partial = err.partial_response().expect("partial response expected");
    assert_eq!(partial.status, 502);
    assert!(partial.body.is_empty());
    assert_eq!(partial.payload, payload);
}

#[tokio::test]
async fn test_truncated_response_keeps_decoded_header() {
    let server = setup_stock_server().await;

    let truncated = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Header><Trace>7</Trace></soap:Header><soap:Body>"#;

    Mock::given(method("POST"))
        .and(path("/soap"))
        .respond_with(ResponseTemplate::new(200).set_body_string(truncated))
        .mount(&server)
        .await;

    let client = SoapClient::new(&wsdl_url(&server)).unwrap();
    let err = client.call("GetPrice", Params::new()).await.unwrap_err();

    let partial = err.partial_response().expect("partial response expected");
    assert_eq!(partial.header, b"<Trace>7</Trace>");
}

#[tokio::test]
async fn test_wsdl_http_error_is_retained() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stock"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = SoapClient::new(&wsdl_url(&server)).unwrap();

    for _ in 0..3 {
        let err = client.call("GetPrice", Params::new()).await.unwrap_err();
        assert!(matches!(err, Error::Description(_)));
        assert!(err.payload().is_none());
    }
    assert!(client.description().await.is_none());
}

#[tokio::test]
async fn test_wsdl_loaded_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(stock_wsdl("http://stock.example.com/soap").as_bytes())
        .unwrap();
    let locator = Url::from_file_path(file.path()).unwrap();

    let transport = Arc::new(RecordingTransport::ok());
    let client = SoapClient::builder(locator.as_str())
        .transport(transport.clone())
        .build()
        .unwrap();

    client.call("GetPrice", Params::new()).await.unwrap();

    let request = transport.last_request();
    assert_eq!(request.url, "http://stock.example.com/soap");
    assert_eq!(request.soap_action, "http://example.com/stock/GetPrice");

    let description = client.description().await.unwrap();
    assert_eq!(description.services[0].name, "StockService");
}
