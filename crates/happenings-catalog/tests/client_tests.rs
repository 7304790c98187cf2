// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use happenings_app::{CatalogSource, Category, Filter};
use happenings_catalog::Client;
use happenings_testkit::{events_json, sample_events};
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Request, Response, Server};

fn header_value(request: &Request, name: &'static str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|header| header.field.equiv(name))
        .map(|header| header.value.as_str().to_owned())
}

fn json_response(body: String, status: u16) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body)
        .with_status_code(status)
        .with_header(
            Header::from_bytes("Content-Type", "application/json")
                .expect("valid content type header"),
        )
}

#[test]
fn unreachable_store_error_names_the_endpoint() {
    let client = Client::new(
        "http://127.0.0.1:1",
        "anon-key",
        "events",
        Duration::from_millis(50),
    )
    .expect("client should initialize");

    let failure = client
        .fetch(Filter::All)
        .expect_err("fetch should fail for unreachable endpoint");
    assert!(failure.message.contains("cannot reach"));
    assert!(failure.message.contains("127.0.0.1:1/rest/v1"));
}

#[test]
fn all_filter_requests_every_row_with_credentials() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());
    let rows = sample_events(7, 4);
    let body = events_json(&rows);

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/rest/v1/events?select=*");
        assert_eq!(header_value(&request, "apikey").as_deref(), Some("anon-key"));
        assert_eq!(
            header_value(&request, "Authorization").as_deref(),
            Some("Bearer anon-key")
        );
        request
            .respond(json_response(body, 200))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, "anon-key", "events", Duration::from_secs(1))?;
    let fetched = client.fetch_events(Filter::All)?;
    assert_eq!(fetched, rows);

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn category_filter_adds_equality_constraint() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}/rest/v1/", server.server_addr());

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/rest/v1/happenings?select=*&category=eq.Music");
        let body = r#"[{"id":"m1","name":"Quartet","category":"Music","image":"","host":"Ana","startDate":"2026-05-01T19:00:00Z","endDate":"2026-05-01T21:00:00Z","location":"Hall"}]"#;
        request
            .respond(json_response(body.to_owned(), 200))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, "anon-key", "happenings", Duration::from_secs(1))?;
    let fetched = client.fetch(Filter::Music).map_err(|failure| anyhow!(failure))?;
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].category, Category::Music);
    assert_eq!(fetched[0].host, "Ana");

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn unrecognized_category_rows_are_kept() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        let body = r#"[{"id":"x1","name":"Pottery","category":"Crafts","image":"","host":"Jo","startDate":"2026-05-02","endDate":"2026-05-02","location":"Studio"}]"#;
        request
            .respond(json_response(body.to_owned(), 200))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, "anon-key", "events", Duration::from_secs(1))?;
    let fetched = client.fetch_events(Filter::All)?;
    assert_eq!(fetched[0].category, Category::Unknown("Crafts".to_owned()));

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn store_error_envelope_becomes_query_failure() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        let body = r#"{"code":"PGRST205","details":null,"hint":"Perhaps you meant the table 'public.event'","message":"Could not find the table 'public.events' in the schema cache"}"#;
        request
            .respond(json_response(body.to_owned(), 404))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, "anon-key", "events", Duration::from_secs(1))?;
    let failure = client
        .fetch(Filter::Food)
        .expect_err("404 should become a query failure");
    assert_eq!(
        failure.message,
        "store error (404): Could not find the table 'public.events' in the schema cache -- Perhaps you meant the table 'public.event'"
    );

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn malformed_rows_fail_to_decode() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        request
            .respond(json_response(r#"[{"id":42}]"#.to_owned(), 200))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, "anon-key", "events", Duration::from_secs(1))?;
    let failure = client
        .fetch(Filter::All)
        .expect_err("bad rows should fail");
    assert!(failure.message.starts_with("decode catalog rows"));

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn ping_probes_a_single_id() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/rest/v1/events?select=id&limit=1");
        request
            .respond(json_response("[]".to_owned(), 200))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, "anon-key", "events", Duration::from_secs(1))?;
    client.ping()?;

    handle.join().expect("server thread should join");
    Ok(())
}
