//! End-to-end tests of the HTTP primitives and the orchestrator against a
//! mock file service.

use std::sync::Arc;

use fileshell::orchestrator::{FileOrchestrator, OperationError};
use fileshell::primitive::{HttpPrimitive, PrimitiveError, RemoteFilePrimitive};
use fileshell::ProbeOutcome;
use httpmock::prelude::*;
use protocol::{Payload, Session};
use reqwest::Client;
use serde_json::json;
use url::Url;

const ALICE_BASIC: &str = "Basic YWxpY2U6c2VjcmV0";

fn primitive(server: &MockServer) -> HttpPrimitive {
    let root = Url::parse(&server.url("/share/")).unwrap();
    HttpPrimitive::new(Client::new(), root)
}

fn orchestrator(server: &MockServer) -> FileOrchestrator<HttpPrimitive> {
    FileOrchestrator::new(Arc::new(primitive(server)))
}

#[tokio::test]
async fn read_returns_body_and_content_type() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/share/docs/a.txt")
            .header("x-requested-with", "XMLHttpRequest");
        then.status(200)
            .header("content-type", "text/plain")
            .body("alpha");
    });

    let payload = primitive(&server)
        .read("/docs/a.txt", None)
        .await
        .unwrap();

    mock.assert();
    assert_eq!(payload.data.as_ref(), b"alpha");
    assert_eq!(payload.content_type.as_deref(), Some("text/plain"));
}

#[tokio::test]
async fn authorization_header_is_forwarded() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(DELETE)
            .path("/share/a.txt")
            .header("authorization", ALICE_BASIC);
        then.status(204);
    });

    primitive(&server)
        .delete("/a.txt", Some(ALICE_BASIC))
        .await
        .unwrap();

    mock.assert();
}

#[tokio::test]
async fn status_mapping() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/share/challenged");
        then.status(401)
            .header("www-authenticate", "Basic realm=\"files\"");
    });
    server.mock(|when, then| {
        when.method(GET).path("/share/forbidden");
        then.status(403);
    });
    server.mock(|when, then| {
        when.method(GET).path("/share/missing");
        then.status(404);
    });
    server.mock(|when, then| {
        when.method(GET).path("/share/broken");
        then.status(500);
    });
    let http = primitive(&server);

    assert_eq!(
        http.read("/challenged", None).await,
        Err(PrimitiveError::AuthenticationRequired {
            challenge: Some("Basic realm=\"files\"".to_string())
        })
    );
    assert_eq!(
        http.read("/forbidden", None).await,
        Err(PrimitiveError::AuthenticationRequired { challenge: None })
    );
    assert_eq!(
        http.read("/missing", None).await,
        Err(PrimitiveError::NotFound {
            url: server.url("/share/missing")
        })
    );
    assert!(matches!(
        http.read("/broken", None).await,
        Err(PrimitiveError::Transport { status: 500, .. })
    ));
}

#[tokio::test]
async fn unreachable_service_is_transport_error_without_status() {
    let http = HttpPrimitive::new(Client::new(), Url::parse("http://127.0.0.1:1/").unwrap());

    let result = http.read("/a", None).await;

    assert!(matches!(
        result,
        Err(PrimitiveError::Transport { status: 0, .. })
    ));
}

#[tokio::test]
async fn write_sends_payload_and_content_type() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(PUT)
            .path("/share/data.json")
            .header("content-type", "text/json")
            .body("{\"k\":1}");
        then.status(200);
    });

    let payload = Payload::json(&json!({"k": 1})).unwrap();
    primitive(&server)
        .write("/data.json", Some(&payload), None)
        .await
        .unwrap();

    mock.assert();
}

#[tokio::test]
async fn update_uses_post() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(POST).path("/share/notes.md").body("v2");
        then.status(200).body("v2");
    });

    let orchestrator = orchestrator(&server);
    orchestrator
        .update("notes.md", Payload::bytes("v2"))
        .await
        .unwrap();

    mock.assert();
}

#[tokio::test]
async fn probe_reads_identity_headers() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/share/");
        then.status(200)
            .header("x-remote-user", "alice")
            .header("x-remote-group", "staff")
            .header("x-remote-home", "/home/alice/");
    });

    let session = primitive(&server).probe(None).await.unwrap();

    assert_eq!(
        session,
        Some(Session {
            principal: "alice".to_string(),
            group: Some("staff".to_string()),
            home: Some("/home/alice/".to_string()),
        })
    );
}

#[tokio::test]
async fn basic_login_after_challenge() {
    let server = MockServer::start_async().await;
    let mut challenge = server.mock(|when, then| {
        when.method(GET).path("/share/");
        then.status(401)
            .header("www-authenticate", "Basic realm=\"files\"");
    });
    let orchestrator = orchestrator(&server);

    let outcome = orchestrator.probe().await;
    assert_eq!(
        outcome,
        ProbeOutcome::Challenged("Basic realm=\"files\"".to_string())
    );
    challenge.delete();

    let accepted = server.mock(|when, then| {
        when.method(GET)
            .path("/share/")
            .header("authorization", ALICE_BASIC);
        then.status(200).header("x-remote-user", "alice");
    });

    let outcome = orchestrator.login("alice", "secret").await;

    accepted.assert();
    assert!(outcome.is_authorized());
    assert_eq!(
        orchestrator.session().await.map(|s| s.principal),
        Some("alice".to_string())
    );
    assert_eq!(
        orchestrator.auth().current_token().await.as_deref(),
        Some(ALICE_BASIC)
    );
}

#[tokio::test]
async fn digest_login_after_challenge() {
    let server = MockServer::start_async().await;
    let mut challenge = server.mock(|when, then| {
        when.method(GET).path("/share/");
        then.status(401).header(
            "www-authenticate",
            "Digest realm=\"files\", qop=\"auth\", nonce=\"dcd98b7102dd2f0e\", opaque=\"5ccc069c\"",
        );
    });
    let orchestrator = orchestrator(&server);

    assert!(matches!(
        orchestrator.probe().await,
        ProbeOutcome::Challenged(_)
    ));
    challenge.delete();

    let accepted = server.mock(|when, then| {
        when.method(GET)
            .path("/share/")
            .header_exists("authorization");
        then.status(200).header("x-remote-user", "alice");
    });

    let outcome = orchestrator.login("alice", "secret").await;

    accepted.assert();
    assert!(outcome.is_authorized());
    let token = orchestrator.auth().current_token().await.unwrap();
    assert!(token.starts_with("Digest username=\"alice\", realm=\"files\""));
    assert!(token.contains("uri=\"/share/\""));
    assert!(token.contains("qop=auth"));
    assert!(token.contains("opaque=\"5ccc069c\""));
}

#[tokio::test]
async fn list_drops_trailing_sentinel() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/share/docs/");
        then.status(200)
            .header("content-type", "text/json")
            .json_body(json!({
                "method": "GET",
                "result": "OK",
                "name": "/docs/",
                "content": [
                    {"name": "sub", "type": 4, "mime": "inode/directory"},
                    {"name": "a.txt", "size": "5 B", "type": 8, "mime": "text/plain"},
                    {}
                ]
            }));
    });

    let entries = orchestrator(&server).list(Some("docs")).await.unwrap();

    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["sub", "a.txt"]);
    assert!(entries[0].is_directory());
    assert_eq!(entries[1].size.as_deref(), Some("5 B"));
}

#[tokio::test]
async fn malformed_listing_is_protocol_error() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/share/");
        then.status(200).body("<html>not a listing</html>");
    });

    let result = orchestrator(&server).list(None).await;

    assert!(matches!(result, Err(OperationError::Protocol(_))));
}

#[tokio::test]
async fn move_runs_read_write_delete() {
    let server = MockServer::start_async().await;
    let read = server.mock(|when, then| {
        when.method(GET).path("/share/a.txt");
        then.status(200).body("alpha");
    });
    let write = server.mock(|when, then| {
        when.method(PUT).path("/share/b.txt").body("alpha");
        then.status(200);
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE).path("/share/a.txt");
        then.status(200);
    });

    orchestrator(&server).move_file("a.txt", "b.txt").await.unwrap();

    read.assert();
    write.assert();
    delete.assert();
}

#[tokio::test]
async fn move_stops_when_write_fails() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/share/a.txt");
        then.status(200).body("alpha");
    });
    let write = server.mock(|when, then| {
        when.method(PUT).path("/share/b.txt");
        then.status(500);
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE).path("/share/a.txt");
        then.status(200);
    });

    let result = orchestrator(&server).move_file("a.txt", "b.txt").await;

    assert!(matches!(
        result,
        Err(OperationError::Transport { status: 500, .. })
    ));
    write.assert();
    delete.assert_hits(0);
}

#[tokio::test]
async fn challenge_mid_sequence_is_used_by_next_request() {
    let server = MockServer::start_async().await;
    let mut denied = server.mock(|when, then| {
        when.method(GET).path("/share/a.txt");
        then.status(401).header(
            "www-authenticate",
            "Digest realm=\"files\", nonce=\"fresh\"",
        );
    });
    let orchestrator = orchestrator(&server);
    orchestrator.login("alice", "secret").await;

    let result = orchestrator.download("a.txt").await;
    assert!(matches!(
        result,
        Err(OperationError::AuthenticationRequired { .. })
    ));
    denied.delete();

    let accepted = server.mock(|when, then| {
        when.method(GET)
            .path("/share/a.txt")
            .header_exists("authorization");
        then.status(200).body("alpha");
    });

    let data = orchestrator.download("a.txt").await.unwrap();

    accepted.assert();
    assert_eq!(data.as_ref(), b"alpha");
    assert_eq!(orchestrator.auth().challenge().await.nonce(), Some("fresh"));
}

#[tokio::test]
async fn mkdir_writes_empty_directory_target() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(PUT).path("/share/sub/");
        then.status(200);
    });

    orchestrator(&server).mkdir(Some("sub")).await.unwrap();

    mock.assert();
}

#[tokio::test]
async fn move_escapes_reserved_characters_in_names() {
    let server = MockServer::start_async().await;
    let unrelated = server.mock(|when, then| {
        when.path("/share/report");
        then.status(200).body("keep me");
    });
    let read = server.mock(|when, then| {
        when.method(GET).path("/share/report%3F.txt");
        then.status(200).body("alpha");
    });
    let write = server.mock(|when, then| {
        when.method(PUT).path("/share/100%25%20%23done.txt").body("alpha");
        then.status(200);
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE).path("/share/report%3F.txt");
        then.status(200);
    });

    orchestrator(&server)
        .move_file("report?.txt", "100% #done.txt")
        .await
        .unwrap();

    read.assert();
    write.assert();
    delete.assert();
    unrelated.assert_hits(0);
}

#[tokio::test]
async fn digest_uri_matches_escaped_request_path() {
    let server = MockServer::start_async().await;
    let mut challenge = server.mock(|when, then| {
        when.method(GET).path("/share/");
        then.status(401).header(
            "www-authenticate",
            "Digest realm=\"files\", nonce=\"abc123\"",
        );
    });
    let orchestrator = orchestrator(&server);
    orchestrator.probe().await;
    challenge.delete();
    server.mock(|when, then| {
        when.method(GET)
            .path("/share/")
            .header_includes("authorization", "uri=\"/share/\"");
        then.status(200).header("x-remote-user", "alice");
    });
    assert!(orchestrator.login("alice", "secret").await.is_authorized());

    let accepted = server.mock(|when, then| {
        when.method(GET)
            .path("/share/a%23b.txt")
            .header_includes("authorization", "uri=\"/share/a%23b.txt\"");
        then.status(200).body("beta");
    });

    let data = orchestrator.download("a#b.txt").await.unwrap();

    accepted.assert();
    assert_eq!(data.as_ref(), b"beta");
}
