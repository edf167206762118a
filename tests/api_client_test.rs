// Copyright 2025 Home Team.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#[cfg(test)]
mod tests {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use homecli::domain::api::{DiagsQueryOptions, EventQueryOptions};
    use homecli::infrastructure::api::{ApiClient, RequestOptions};
    use homecli::HomeError;
    use serde_json::{json, Value};
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{header, method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cluster_page(names: &[&str], page: usize, page_size: usize) -> Value {
        let data: Vec<Value> = names
            .iter()
            .map(|name| {
                json!({
                    "id": format!("id-{}", name),
                    "type": "cluster",
                    "attributes": {"name": name, "version": "4.2.0"}
                })
            })
            .collect();
        json!({"data": data, "meta": {"page": page, "page_size": page_size}})
    }

    async fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(&server.uri(), "secret").unwrap()
    }

    #[tokio::test]
    async fn test_single_page_sends_token_and_page_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/clusters"))
            .and(header("authorization", "Token secret"))
            .and(query_param("page", "1"))
            .and(query_param("page_size", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(cluster_page(&["a"], 1, 50)))
            .expect(1)
            .mount(&server)
            .await;

        let mut query = client(&server)
            .await
            .query_clusters(RequestOptions::new())
            .await
            .unwrap();
        let cluster = query.next_cluster().await.unwrap().unwrap();
        assert_eq!(cluster.id, "id-a");
        assert_eq!(cluster.name, "a");
        assert!(query.next_cluster().await.unwrap().is_none());
        assert!(query.next_cluster().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cursor_follows_full_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/clusters"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(cluster_page(&["a", "b"], 1, 2)),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v3/clusters"))
            .and(query_param("page", "2"))
            .and(query_param("page_size", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(cluster_page(&["c"], 2, 2)))
            .expect(1)
            .mount(&server)
            .await;

        let mut query = client(&server)
            .await
            .query_clusters(RequestOptions::new().with_page_size(2))
            .await
            .unwrap();
        let mut names = Vec::new();
        while let Some(cluster) = query.next_cluster().await.unwrap() {
            names.push(cluster.name);
        }
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(query.page(), 2);
        assert!(!query.has_more_pages());
    }

    #[tokio::test]
    async fn test_empty_first_page_ends_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/clusters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(cluster_page(&[], 1, 50)))
            .expect(1)
            .mount(&server)
            .await;

        let mut query = client(&server)
            .await
            .query_clusters(RequestOptions::new())
            .await
            .unwrap();
        assert!(!query.has_more_pages());
        assert!(query.next_cluster().await.unwrap().is_none());
        assert!(query.next_cluster().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_full_last_page_then_empty_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/clusters"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(cluster_page(&["a", "b"], 1, 2)),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v3/clusters"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(cluster_page(&[], 2, 2)))
            .expect(1)
            .mount(&server)
            .await;

        let mut query = client(&server)
            .await
            .query_clusters(RequestOptions::new().with_page_size(2))
            .await
            .unwrap();
        let mut names = Vec::new();
        while let Some(cluster) = query.next_cluster().await.unwrap() {
            names.push(cluster.name);
        }
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(query.page(), 2);
        assert!(!query.has_more_pages());
        // exhausted cursor sends no third request
        assert!(query.next_cluster().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_auto_fetch_stops_after_first_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/customers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"id": "c1", "type": "customer", "attributes": {"name": "acme"}},
                    {"id": "c2", "type": "customer", "attributes": {"name": "initech"}}
                ],
                "meta": {"page": 1, "page_size": 2}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut query = client(&server).await.query_customers().await.unwrap();
        let mut count = 0;
        while query.next_customer().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
        assert!(query.has_more_pages());
    }

    #[tokio::test]
    async fn test_page_size_is_clamped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/clusters"))
            .and(query_param("page_size", "1000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(cluster_page(&[], 1, 1000)))
            .expect(1)
            .mount(&server)
            .await;

        let mut query = client(&server)
            .await
            .query_clusters(RequestOptions::new().with_page_size(5000))
            .await
            .unwrap();
        assert_eq!(query.page_size(), 1000);
        assert!(query.next_cluster().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_raw_event_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/c1/events/list"))
            .and(query_param("intr", "t"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "e1", "type": "NodeDown", "severity": "MAJOR",
                 "timestamp": "2024-03-01T10:00:00Z", "cloud_digested_ts": "2024-03-01T10:00:02Z"},
                {"id": "e2", "type": "NodeUp", "severity": "INFO"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let options = EventQueryOptions {
            with_internal_events: true,
            ..Default::default()
        };
        let mut query = client(&server)
            .await
            .query_events("c1", &options)
            .await
            .unwrap();
        let first = query.next_event().await.unwrap().unwrap();
        assert_eq!(first.event_type, "NodeDown");
        assert_eq!(first.processing_time(), Some(2.0));
        assert_eq!(query.next_event().await.unwrap().unwrap().id, "e2");
        assert!(query.next_event().await.unwrap().is_none());
        assert!(query.meta().is_none());
    }

    #[tokio::test]
    async fn test_error_status_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/clusters/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .get_cluster("missing")
            .await
            .unwrap_err();
        match err {
            HomeError::Transport { method, code, .. } => {
                assert_eq!(method, "GET");
                assert_eq!(code, 404);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_server_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/status"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"active": true, "version": "3.1.0"})),
            )
            .mount(&server)
            .await;

        let status = client(&server).await.get_server_status().await.unwrap();
        assert!(status.active);
        assert_eq!(status.version, "3.1.0");
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/status"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client(&server).await.get_server_status().await.unwrap_err();
        assert!(matches!(err, HomeError::Decode { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_cancelled_client() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let client = client(&server).await.with_cancellation(cancel.clone());
        cancel.cancel();
        let err = client.get_server_status().await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_gzip_download_is_decoded() {
        let server = MockServer::start().await;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"diag contents").unwrap();
        Mock::given(method("GET"))
            .and(path("/api/v3/clusters/c1/support/files/host1.tgz/content"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-encoding", "gzip")
                    .set_body_bytes(encoder.finish().unwrap()),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        client(&server)
            .await
            .download_diag("c1", "host1.tgz", dir.path())
            .await
            .unwrap();
        assert_eq!(
            std::fs::read(dir.path().join("host1.tgz")).unwrap(),
            b"diag contents"
        );
    }

    #[tokio::test]
    async fn test_bulk_download_collects_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/clusters/c1/support/files/bad/content"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let names: Vec<String> = ["a", "bad", "b"].iter().map(|s| s.to_string()).collect();
        let err = client(&server)
            .await
            .download_diags("c1", &names, dir.path())
            .await
            .unwrap_err();
        match err {
            HomeError::Downloads {
                failed,
                total,
                details,
            } => {
                assert_eq!((failed, total), (1, 3));
                assert!(details.contains("bad"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(std::fs::read(dir.path().join("a")).unwrap(), b"ok");
        assert_eq!(std::fs::read(dir.path().join("b")).unwrap(), b"ok");
    }

    fn diag_page(file_names: &[&str]) -> Value {
        let data: Vec<Value> = file_names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                json!({
                    "id": i + 1,
                    "type": "support_file",
                    "attributes": {"filename": name, "topic_id": "t-42", "completed": true}
                })
            })
            .collect();
        json!({"data": data, "meta": {"page": 1, "page_size": 50}})
    }

    #[tokio::test]
    async fn test_download_diags_matching_topic() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/clusters/c1/support/files"))
            .and(query_param("topic_id", "t-42"))
            .and(query_param("topic", "weka"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(diag_page(&["one.tgz", "two 2.tgz"])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v3/clusters/c1/support/files/one.tgz/content"))
            .respond_with(ResponseTemplate::new(200).set_body_string("first"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v3/clusters/c1/support/files/two%202.tgz/content"))
            .respond_with(ResponseTemplate::new(200).set_body_string("second"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let options = DiagsQueryOptions {
            topic: Some("weka".to_string()),
            topic_id: Some("t-42".to_string()),
            ..Default::default()
        };
        let count = client(&server)
            .await
            .download_diags_matching("c1", &options, dir.path())
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(std::fs::read(dir.path().join("one.tgz")).unwrap(), b"first");
        assert_eq!(std::fs::read(dir.path().join("two 2.tgz")).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_download_diags_matching_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/clusters/c1/support/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(diag_page(&[])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex("/content$"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let options = DiagsQueryOptions {
            topic_id: Some("t-none".to_string()),
            ..Default::default()
        };
        let count = client(&server)
            .await
            .download_diags_matching("c1", &options, dir.path())
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_diag_name_is_encoded_and_kept_in_dir() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/clusters/c1/support/files/a%3Fb%23c.tgz/content"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = client(&server).await;
        client
            .download_diag("c1", "a?b#c.tgz", dir.path())
            .await
            .unwrap();
        assert_eq!(std::fs::read(dir.path().join("a?b#c.tgz")).unwrap(), b"ok");

        let names = vec!["../escape".to_string()];
        let err = client
            .download_diags("c1", &names, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, HomeError::Downloads { failed: 1, total: 1, .. }));
    }

    #[tokio::test]
    async fn test_download_template_needs_one_placeholder() {
        let client = ApiClient::new("http://127.0.0.1:9", "k").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = client
            .download_many("files/content", &RequestOptions::new(), &[], dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, HomeError::Validation(_)));
    }

    /// Serves every request slowly and records the peak number of requests
    /// in flight.
    async fn slow_server(in_flight: Arc<AtomicUsize>, peak: Arc<AtomicUsize>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    let _ = socket
                        .write_all(
                            b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
                        )
                        .await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_bulk_download_limits_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let url = slow_server(in_flight.clone(), peak.clone()).await;

        let client = ApiClient::new(&url, "k").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let names: Vec<String> = (0..64).map(|i| format!("file-{i}")).collect();
        client
            .download_many("files/%s", &RequestOptions::new(), &names, dir.path())
            .await
            .unwrap();

        for name in &names {
            assert_eq!(std::fs::read(dir.path().join(name)).unwrap(), b"ok");
        }
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 16, "peak concurrency {peak}");
        assert!(peak > 1, "downloads did not overlap");
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }
}
