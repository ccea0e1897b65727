//! Integration tests for the feed client
//!
//! Tests HTTP client behavior using wiremock for request/response mocking.

use serde_json::json;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use hn_triage::config::{FeedConfig, FetchConfig};
use hn_triage::error::FeedError;
use hn_triage::hn::HnClient;

/// Create a test client pointing at the mock server
fn create_test_client(base_url: &str) -> HnClient {
    let config = FeedConfig {
        base_url: base_url.to_string(),
        ranking_count: 100,
    };

    let fetch_config = FetchConfig {
        timeout_ms: 5000,
        max_retries: 0, // No retries unless a test opts in
        retry_delay_ms: 10,
        concurrency: 4,
        requests_per_second: 1000.0,
        burst_capacity: 100,
        cache_ttl_secs: 3600,
        run_timeout_secs: 0,
    };

    HnClient::new(&config, fetch_config).expect("Failed to create client")
}

fn story_body(id: u64, title: &str, score: i64, descendants: i64) -> serde_json::Value {
    json!({
        "id": id,
        "title": title,
        "url": format!("https://example.com/{}", id),
        "by": "tester",
        "score": score,
        "descendants": descendants,
        "type": "story"
    })
}

#[cfg(test)]
mod ranking_tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_ranking() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/topstories.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([101, 102, 103])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let ids = client.fetch_ranking(10).await.unwrap();

        assert_eq!(ids, vec![101, 102, 103]);
    }

    #[tokio::test]
    async fn test_fetch_ranking_truncates_to_count() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/topstories.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2, 3, 4, 5])))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let ids = client.fetch_ranking(2).await.unwrap();

        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_fetch_ranking_malformed_payload() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/topstories.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"not": "an array"})),
            )
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let result = client.fetch_ranking(10).await;

        assert!(matches!(result, Err(FeedError::InvalidResponse { .. })));
    }

    #[tokio::test]
    async fn test_fetch_ranking_server_error_surfaces_after_retries() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/topstories.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let config = FeedConfig {
            base_url: mock_server.uri(),
            ranking_count: 100,
        };
        let fetch_config = FetchConfig {
            max_retries: 2,
            retry_delay_ms: 10,
            requests_per_second: 1000.0,
            burst_capacity: 100,
            ..FetchConfig::default()
        };
        let client = HnClient::new(&config, fetch_config).unwrap();

        let result = client.fetch_ranking(10).await;

        match result {
            Err(FeedError::Unavailable { retries, .. }) => assert_eq!(retries, 3),
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }
}

#[cfg(test)]
mod item_tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_item() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/item/101.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(story_body(101, "A story", 42, 7)),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let story = client.fetch_item(101).await.unwrap();

        assert_eq!(story.id, 101);
        assert_eq!(story.title.as_deref(), Some("A story"));
        assert_eq!(story.score, 42);
    }

    #[tokio::test]
    async fn test_fetch_item_null_body_is_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/item/999.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(null)))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let result = client.fetch_item(999).await;

        assert!(matches!(result, Err(FeedError::NotFound { id: 999 })));
    }

    #[tokio::test]
    async fn test_fetch_item_404_is_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/item/999.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let result = client.fetch_item(999).await;

        assert!(matches!(result, Err(FeedError::NotFound { id: 999 })));
    }

    #[tokio::test]
    async fn test_cache_hit_short_circuits_network() {
        let mock_server = MockServer::start().await;

        // expect(1): the second fetch must come from the cache.
        Mock::given(method("GET"))
            .and(path("/item/101.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(story_body(101, "A story", 42, 7)),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let first = client.fetch_item(101).await.unwrap();
        let second = client.fetch_item(101).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.title, second.title);
    }

    #[tokio::test]
    async fn test_reset_clears_cache() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/item/101.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(story_body(101, "A story", 42, 7)),
            )
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        client.fetch_item(101).await.unwrap();
        client.reset().await;
        client.fetch_item(101).await.unwrap();
    }
}

#[cfg(test)]
mod batch_tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_batch_attempts_every_id() {
        let mock_server = MockServer::start().await;

        for id in [1u64, 2, 3] {
            Mock::given(method("GET"))
                .and(path(format!("/item/{}.json", id)))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(story_body(id, &format!("Story {}", id), 10, 5)),
                )
                .mount(&mock_server)
                .await;
        }

        let client = create_test_client(&mock_server.uri());
        let results = client.fetch_batch(&[1, 2, 3]).await;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
    }

    #[tokio::test]
    async fn test_fetch_batch_isolates_failures() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/item/1.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(story_body(1, "Alive", 10, 5)),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/item/2.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(null)))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/item/3.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(story_body(3, "Also alive", 20, 8)),
            )
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let results = client.fetch_batch(&[1, 2, 3]).await;

        assert_eq!(results.len(), 3);

        let ok_count = results.iter().filter(|(_, r)| r.is_ok()).count();
        assert_eq!(ok_count, 2, "healthy ids must survive a failing sibling");

        let failed = results.iter().find(|(id, _)| *id == 2).unwrap();
        assert!(matches!(failed.1, Err(FeedError::NotFound { id: 2 })));
    }
}

#[cfg(test)]
mod thread_tests {
    use super::*;

    fn comment_body(id: u64, kids: &[u64]) -> serde_json::Value {
        json!({
            "id": id,
            "by": "commenter",
            "text": format!("comment {}", id),
            "kids": kids,
            "type": "comment"
        })
    }

    #[tokio::test]
    async fn test_fetch_thread_respects_depth() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/item/100.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 100,
                "title": "Root story",
                "kids": [200],
                "type": "story"
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/item/200.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(comment_body(200, &[300])))
            .mount(&mock_server)
            .await;
        // Depth 2 comment exists but must never be requested at max_depth 1.
        Mock::given(method("GET"))
            .and(path("/item/300.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(comment_body(300, &[])))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let thread = client.fetch_thread(100, 1).await.unwrap();

        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].id, 200);
        assert_eq!(thread[0].depth, 1);
        assert!(thread[0].children.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_thread_builds_nested_tree() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/item/100.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 100,
                "title": "Root story",
                "kids": [200, 201],
                "type": "story"
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/item/200.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(comment_body(200, &[300])))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/item/201.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(comment_body(201, &[])))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/item/300.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(comment_body(300, &[])))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let thread = client.fetch_thread(100, 3).await.unwrap();

        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].id, 200);
        assert_eq!(thread[1].id, 201);
        assert_eq!(thread[0].children.len(), 1);
        assert_eq!(thread[0].children[0].id, 300);
        assert_eq!(thread[0].children[0].depth, 2);
    }

    #[tokio::test]
    async fn test_fetch_thread_zero_depth_fetches_no_comments() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/item/100.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 100,
                "title": "Root story",
                "kids": [200],
                "type": "story"
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/item/200.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(comment_body(200, &[])))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let thread = client.fetch_thread(100, 0).await.unwrap();

        assert!(thread.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_thread_skips_deleted_comments() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/item/100.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 100,
                "title": "Root story",
                "kids": [200, 201],
                "type": "story"
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/item/200.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(null)))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/item/201.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(comment_body(201, &[])))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let thread = client.fetch_thread(100, 2).await.unwrap();

        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].id, 201);
    }
}

#[cfg(test)]
mod user_tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_user() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user/pg.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pg",
                "karma": 157236,
                "submitted": [1, 2, 3]
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let user = client.fetch_user("pg").await.unwrap().unwrap();

        assert_eq!(user.id, "pg");
        assert_eq!(user.karma, 157236);
    }

    #[tokio::test]
    async fn test_fetch_unknown_user_is_none() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user/nobody.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(null)))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let user = client.fetch_user("nobody").await.unwrap();

        assert!(user.is_none());
    }
}
