use super::*;
use crate::types::Cursor;

#[tokio::test(start_paused = true)]
async fn test_fetch_page_parses_items_and_cursor() {
    let transport = Arc::new(MockTransport::pages(vec![page_body(
        &[("1", 1), ("2", 2)],
        Some("next"),
    )]));
    let h = harvester(transport.clone());
    let creds = Credentials::new("bearer", "csrf");

    let page = h
        .fetch_page(&subject(), Some(&Cursor::new("prev")), &creds)
        .await
        .unwrap();

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.cursor, Some(Cursor::new("next")));
    assert_eq!(transport.cursors(), [Some("prev".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_page_reports_hard_status_without_retry() {
    let transport = Arc::new(MockTransport::with_responses(vec![Ok(RawResponse::new(
        403,
        "Forbidden",
    ))]));
    let h = harvester(transport.clone());

    let err = h
        .fetch_page(&subject(), None, &Credentials::new("b", "c"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Transport(TransportError::Status { status: 403, .. })
    ));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_page_gives_up_after_rate_limit_ceiling() {
    let responses = (0..10).map(|_| Ok(RawResponse::new(429, ""))).collect();
    let transport = Arc::new(MockTransport::with_responses(responses));
    let h = harvester(transport.clone());

    let err = h
        .fetch_page(&subject(), None, &Credentials::new("b", "c"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RateLimited));
    assert_eq!(transport.calls(), 6, "one attempt plus five retries");
}

#[tokio::test(start_paused = true)]
async fn test_network_failure_recovers_on_retry() {
    let transport = Arc::new(MockTransport::with_responses(vec![
        Err(TransportError::Connect("connection reset".into())),
        Err(TransportError::Timeout),
        Ok(RawResponse::new(200, page_body(&[("ok", 1)], None))),
    ]));
    let h = harvester(transport.clone());
    let mut events = h.subscribe();

    let page = h
        .fetch_page(&subject(), None, &Credentials::new("b", "c"))
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);

    let attempts: Vec<u32> = drain_events(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            Event::RetryScheduled {
                class: crate::retry::FailureClass::NetworkError,
                attempt,
                ..
            } => Some(attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, [0, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_sleeps_are_observed() {
    let transport = Arc::new(MockTransport::with_responses(vec![
        Ok(RawResponse::new(429, "")),
        Ok(RawResponse::new(429, "")),
        Ok(RawResponse::new(200, page_body(&[], None))),
    ]));
    let h = harvester(transport);

    let start = tokio::time::Instant::now();
    h.fetch_page(&subject(), None, &Credentials::new("b", "c"))
        .await
        .unwrap();

    assert_eq!(start.elapsed(), Duration::from_millis(2000 + 4000));
}

#[tokio::test(start_paused = true)]
async fn test_parse_failure_surfaces_from_fetch_page() {
    let transport = Arc::new(MockTransport::pages(vec![
        r#"{"errors": [{"message": "Could not authenticate you"}]}"#.to_string(),
    ]));
    let h = harvester(transport);

    let err = h
        .fetch_page(&subject(), None, &Credentials::new("b", "c"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "api_errors");
}

#[test]
fn test_new_rejects_invalid_config() {
    let mut config = test_config();
    config.pagination.page_size = 0;
    let transport = Arc::new(MockTransport::pages(vec![]));

    let err = Harvester::new(config, transport, Arc::new(session())).unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
}
