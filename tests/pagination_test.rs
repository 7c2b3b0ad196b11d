mod helpers;

use std::collections::HashSet;

use axum::http::{Method, StatusCode};

use helpers::{encode, request, test_app};

fn titles(body: &serde_json::Value) -> Vec<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn twenty_five_memos_span_two_pages() {
    let app = test_app();
    app.seed_memos("alice", 25);
    let token = app.login("alice", "alice@example.com");

    let first = app
        .send(request(Method::GET, "/api/memos", Some(&token), None))
        .await;
    assert_eq!(first.status, StatusCode::OK);
    let first_titles = titles(&first.body);
    assert_eq!(first_titles.len(), 20);
    assert_eq!(first_titles[0], "Memo 24");
    assert_eq!(first_titles[19], "Memo 5");
    assert_eq!(first.body["pagination"]["hasNextPage"], true);
    assert_eq!(first.body["pagination"]["limit"], 20);

    let cursor = first.body["pagination"]["nextCursor"].as_str().unwrap();
    assert_eq!(cursor, first.body["data"][19]["createdAt"].as_str().unwrap());

    let second = app
        .send(request(
            Method::GET,
            &format!("/api/memos?cursor={}", encode(cursor)),
            Some(&token),
            None,
        ))
        .await;
    assert_eq!(second.status, StatusCode::OK);
    let second_titles = titles(&second.body);
    assert_eq!(second_titles, vec!["Memo 4", "Memo 3", "Memo 2", "Memo 1", "Memo 0"]);
    assert_eq!(second.body["pagination"]["hasNextPage"], false);
    assert!(second.body["pagination"]["nextCursor"].is_null());

    let seen: HashSet<_> = first_titles.iter().chain(second_titles.iter()).collect();
    assert_eq!(seen.len(), 25);
}

#[tokio::test]
async fn exact_page_has_no_next_page() {
    let app = test_app();
    app.seed_memos("alice", 20);
    let token = app.login("alice", "alice@example.com");

    let res = app
        .send(request(Method::GET, "/api/memos", Some(&token), None))
        .await;
    assert_eq!(titles(&res.body).len(), 20);
    assert_eq!(res.body["pagination"]["hasNextPage"], false);
    assert!(res.body["pagination"]["nextCursor"].is_null());
}

#[tokio::test]
async fn custom_limit_walks_every_memo_once() {
    let app = test_app();
    app.seed_memos("alice", 7);
    app.seed_memos("bob", 3);
    let token = app.login("alice", "alice@example.com");

    let mut uri = "/api/memos?limit=3".to_string();
    let mut collected = Vec::new();
    let mut pages = 0;
    loop {
        let res = app.send(request(Method::GET, &uri, Some(&token), None)).await;
        assert_eq!(res.status, StatusCode::OK);
        collected.extend(titles(&res.body));
        pages += 1;
        match res.body["pagination"]["nextCursor"].as_str() {
            Some(cursor) => uri = format!("/api/memos?limit=3&cursor={}", encode(cursor)),
            None => break,
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(collected.len(), 7);
    assert_eq!(collected.first().map(String::as_str), Some("Memo 6"));
    assert_eq!(collected.last().map(String::as_str), Some("Memo 0"));
}

#[tokio::test]
async fn archived_filter_and_empty_list() {
    let app = test_app();
    let token = app.login("alice", "alice@example.com");

    let res = app
        .send(request(Method::GET, "/api/memos", Some(&token), None))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(titles(&res.body).is_empty());
    assert_eq!(res.body["pagination"]["hasNextPage"], false);

    let memos = app.seed_memos("alice", 3);
    let res = app
        .send(request(
            Method::PUT,
            &format!("/api/memos/{}", memos[1].id),
            Some(&token),
            Some(serde_json::json!({ "isArchived": true })),
        ))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app
        .send(request(Method::GET, "/api/memos?isArchived=true", Some(&token), None))
        .await;
    assert_eq!(titles(&res.body), vec!["Memo 1"]);

    let res = app
        .send(request(Method::GET, "/api/memos?isArchived=false", Some(&token), None))
        .await;
    assert_eq!(titles(&res.body), vec!["Memo 2", "Memo 0"]);
}
