//! Batch pipeline integration tests
//!
//! Full request processing against the in-memory store.

#[cfg(test)]
mod tests {
    use crate::common::{
        BatchBuilder, ChangesetBuilder, DispatcherEvent, ParsedPart, RecordingDispatcher,
        SERVICE_ROOT, parse_response,
    };
    use crate::{assert_err, assert_ok};
    use odata_batch::core::batch::{
        BatchError, BatchProcessor, BatchResponse, ErrorContext, ErrorHook, ErrorStage, Limits,
        ProcessorSettings,
    };
    use odata_batch::core::traits::OperationResponse;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use url::Url;

    /// Hook that keeps every reported error
    #[derive(Default)]
    struct CollectingHook {
        reports: Mutex<Vec<(ErrorContext, String)>>,
    }

    impl ErrorHook for CollectingHook {
        fn on_error(&self, context: &ErrorContext, error: &BatchError) {
            self.reports
                .lock()
                .push((context.clone(), error.code().to_string()));
        }
    }

    fn settings() -> ProcessorSettings {
        ProcessorSettings::new(Url::parse(SERVICE_ROOT).unwrap())
    }

    fn processor(dispatcher: &Arc<RecordingDispatcher>, settings: ProcessorSettings) -> BatchProcessor {
        BatchProcessor::new(dispatcher.clone(), settings)
    }

    async fn run(processor: &BatchProcessor, batch: &BatchBuilder) -> BatchResponse {
        assert_ok!(processor.process(&batch.content_type(), &batch.build()).await)
    }

    fn statuses(parts: &[ParsedPart]) -> Vec<u16> {
        parts.iter().map(|part| part.status).collect()
    }

    #[tokio::test]
    async fn test_get_and_changeset_with_content_id_reference() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let processor = processor(&dispatcher, settings());

        let batch = BatchBuilder::new("batch_36522ad7")
            .get("Customers")
            .changeset(
                ChangesetBuilder::new("changeset_77162fcd")
                    .post("Customers", r#"{"Name":"Contoso"}"#, Some("1"))
                    .post("$1/Orders", r#"{"Total":42}"#, Some("2")),
            );

        let response = run(&processor, &batch).await;
        assert_eq!(response.status, 202);
        assert!(response.boundary.starts_with("batchresponse_"));
        assert_eq!(
            response.content_type(),
            format!("multipart/mixed; boundary={}", response.boundary)
        );

        let parts = parse_response(&response);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].status, 200);
        assert_eq!(parts[0].json(), json!({ "value": [] }));

        let changeset = parts[1].changeset.as_ref().unwrap();
        assert_eq!(statuses(changeset), vec![201, 201]);
        assert_eq!(changeset[0].content_id.as_deref(), Some("1"));
        assert_eq!(changeset[1].content_id.as_deref(), Some("2"));
        assert_eq!(
            changeset[1].header("Location"),
            Some("http://localhost:8000/odata/Orders(1)")
        );
        assert_eq!(
            changeset[1].header("Content-Length"),
            Some(changeset[1].body.len().to_string().as_str())
        );

        assert_eq!(dispatcher.store.count("Customers"), 1);
        assert_eq!(
            dispatcher.store.entity("Orders", 1),
            Some(json!({ "Id": 1, "Total": 42, "CustomersId": 1 }))
        );
        assert!(
            dispatcher
                .dispatched_urls()
                .contains(&"http://localhost:8000/odata/Customers(1)/Orders".to_string())
        );
        assert_eq!(dispatcher.store.open_transactions(), 0);
    }

    #[tokio::test]
    async fn test_failed_changeset_rolls_back_and_collapses() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let processor = processor(&dispatcher, settings());

        let batch = BatchBuilder::new("batch_1")
            .changeset(
                ChangesetBuilder::new("cs_1")
                    .post("Customers", r#"{"Name":"Contoso"}"#, Some("1"))
                    .post("Customers", "not json", Some("2"))
                    .post("Customers", r#"{"Name":"Never"}"#, None),
            )
            .get("Customers");

        let response = run(&processor, &batch).await;
        let parts = parse_response(&response);
        assert_eq!(parts.len(), 2);

        // One application/http part instead of a changeset response
        assert!(!parts[0].is_changeset());
        assert_eq!(parts[0].status, 400);
        assert_eq!(parts[0].content_id, None);
        assert_eq!(
            parts[0].json()["error"]["message"],
            "Request body must be a JSON object"
        );

        // The later GET sees none of the rolled back writes
        assert_eq!(parts[1].json(), json!({ "value": [] }));
        assert_eq!(dispatcher.store.count("Customers"), 0);
        assert_eq!(dispatcher.count(&DispatcherEvent::Rollback), 1);
        assert_eq!(dispatcher.count(&DispatcherEvent::Commit), 0);
        assert_eq!(dispatcher.dispatched_urls().len(), 3);
    }

    #[tokio::test]
    async fn test_changeset_writes_are_visible_to_later_elements() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let processor = processor(&dispatcher, settings());

        let batch = BatchBuilder::new("batch_1")
            .changeset(ChangesetBuilder::new("cs_1").post("Products", r#"{"Sku":"A-1"}"#, None))
            .get("Products(1)")
            .changeset(
                ChangesetBuilder::new("cs_2")
                    .operation("PATCH", "Products(1)", r#"{"Price":3}"#, None)
                    .operation("DELETE", "Products(1)", "", None),
            )
            .get("Products(1)");

        let response = run(&processor, &batch).await;
        let parts = parse_response(&response);

        assert_eq!(statuses(parts[0].changeset.as_ref().unwrap()), vec![201]);
        assert_eq!(parts[1].json(), json!({ "Id": 1, "Sku": "A-1" }));
        assert_eq!(statuses(parts[2].changeset.as_ref().unwrap()), vec![204, 204]);
        assert_eq!(parts[3].status, 404);
        // 204 parts carry no body and no Content-Length
        assert!(parts[2].changeset.as_ref().unwrap()[0].body.is_empty());
        assert_eq!(parts[2].changeset.as_ref().unwrap()[0].header("Content-Length"), None);
    }

    #[tokio::test]
    async fn test_content_ids_are_scoped_to_their_changeset() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let processor = processor(&dispatcher, settings());

        let batch = BatchBuilder::new("batch_1")
            .changeset(ChangesetBuilder::new("cs_1").post("Customers", "{}", Some("1")))
            .changeset(ChangesetBuilder::new("cs_2").post("$1/Orders", "{}", None));

        let response = run(&processor, &batch).await;
        let parts = parse_response(&response);

        assert_eq!(statuses(parts[0].changeset.as_ref().unwrap()), vec![201]);
        assert!(!parts[1].is_changeset());
        assert_eq!(parts[1].status, 400);
        assert_eq!(parts[1].json()["error"]["code"], "UNRESOLVED_CONTENT_ID");
        assert_eq!(dispatcher.store.count("Orders"), 0);
    }

    #[tokio::test]
    async fn test_batch_count_limit_replaces_every_excess_element() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let settings = settings().with_limits(Limits::new(2, 100).unwrap());
        let processor = processor(&dispatcher, settings);

        let batch = BatchBuilder::new("batch_1")
            .get("Customers")
            .get("Orders")
            .get("Products")
            .changeset(ChangesetBuilder::new("cs_1").post("Customers", "{}", None));

        let response = run(&processor, &batch).await;
        let parts = parse_response(&response);

        assert_eq!(statuses(&parts), vec![200, 200, 400, 400]);
        assert_eq!(parts[2].json()["error"]["code"], "BATCH_COUNT_EXCEEDED");
        assert_eq!(parts[3].json()["error"]["code"], "BATCH_COUNT_EXCEEDED");
        assert_eq!(dispatcher.dispatched_urls().len(), 2);
        assert_eq!(dispatcher.count(&DispatcherEvent::Begin), 0);
        assert_eq!(dispatcher.store.count("Customers"), 0);
    }

    #[tokio::test]
    async fn test_zero_changeset_limit_rejects_every_changeset() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let settings = settings().with_limits(Limits::new(10, 0).unwrap());
        let processor = processor(&dispatcher, settings);

        let batch = BatchBuilder::new("batch_1")
            .changeset(ChangesetBuilder::new("cs_1").post("Customers", "{}", None))
            .get("Customers");

        let response = run(&processor, &batch).await;
        let parts = parse_response(&response);

        assert_eq!(statuses(&parts), vec![400, 200]);
        assert_eq!(parts[0].json()["error"]["code"], "CHANGESET_COUNT_EXCEEDED");
        assert_eq!(dispatcher.count(&DispatcherEvent::Begin), 0);
    }

    #[tokio::test]
    async fn test_part_count_and_order_match_request() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let processor = processor(&dispatcher, settings());

        let batch = BatchBuilder::new("batch_1")
            .get("Customers(7)")
            .changeset(
                ChangesetBuilder::new("cs_1")
                    .post("Orders", "{}", None)
                    .post("Orders", "{}", None)
                    .post("Orders", "{}", None),
            )
            .get("Unknown")
            .get("Orders");

        let response = run(&processor, &batch).await;
        let parts = parse_response(&response);

        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0].status, 404);
        assert_eq!(parts[1].changeset.as_ref().unwrap().len(), 3);
        assert_eq!(parts[2].status, 404);
        assert_eq!(parts[3].json()["value"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_elements_preserve_order() {
        let dispatcher = Arc::new(
            RecordingDispatcher::new().slow_on("/Customers", Duration::from_millis(50)),
        );
        dispatcher.store.insert("Orders", json!({ "Total": 1 }));
        let processor = processor(&dispatcher, settings().with_concurrent_elements(true));

        let batch = BatchBuilder::new("batch_1")
            .get("Customers")
            .get("Orders(1)")
            .get("Missing");

        let response = run(&processor, &batch).await;
        let parts = parse_response(&response);

        assert_eq!(statuses(&parts), vec![200, 200, 404]);
        assert_eq!(parts[0].json(), json!({ "value": [] }));
        assert_eq!(parts[1].json()["Total"], 1);
    }

    #[tokio::test]
    async fn test_dispatcher_errors_become_500_parts() {
        let dispatcher = Arc::new(RecordingDispatcher::new().failing_on("/Orders"));
        let processor = processor(&dispatcher, settings());

        let batch = BatchBuilder::new("batch_1")
            .get("Orders")
            .changeset(
                ChangesetBuilder::new("cs_1")
                    .post("Customers", "{}", Some("1"))
                    .post("$1/Orders", "{}", None),
            )
            .get("Customers");

        let response = run(&processor, &batch).await;
        let parts = parse_response(&response);

        assert_eq!(statuses(&parts), vec![500, 500, 200]);
        assert_eq!(parts[0].json()["error"]["code"], "DISPATCH_ERROR");
        assert!(!parts[1].is_changeset());
        assert_eq!(dispatcher.store.count("Customers"), 0);
        assert_eq!(dispatcher.count(&DispatcherEvent::Rollback), 1);
    }

    #[tokio::test]
    async fn test_commit_failure_collapses_changeset() {
        let dispatcher = Arc::new(RecordingDispatcher::new().failing_commit());
        let processor = processor(&dispatcher, settings());

        let batch = BatchBuilder::new("batch_1")
            .changeset(ChangesetBuilder::new("cs_1").post("Customers", "{}", Some("1")));

        let response = run(&processor, &batch).await;
        let parts = parse_response(&response);

        assert_eq!(parts.len(), 1);
        assert!(!parts[0].is_changeset());
        assert_eq!(parts[0].status, 500);
        assert_eq!(dispatcher.store.count("Customers"), 0);
    }

    #[tokio::test]
    async fn test_fatal_errors_leave_store_untouched() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let processor = processor(&dispatcher, settings());

        let duplicate = BatchBuilder::new("batch_1").changeset(
            ChangesetBuilder::new("cs_1")
                .post("Customers", "{}", Some("1"))
                .post("Customers", "{}", Some("1")),
        );
        let error = assert_err!(
            processor
                .process(&duplicate.content_type(), &duplicate.build())
                .await
        );
        assert!(matches!(error, BatchError::DuplicateContentId { .. }));

        let get_in_changeset = BatchBuilder::new("batch_1")
            .changeset(ChangesetBuilder::new("cs_1").operation("GET", "Customers", "", None));
        let error = assert_err!(
            processor
                .process(&get_in_changeset.content_type(), &get_in_changeset.build())
                .await
        );
        assert!(matches!(error, BatchError::InvalidChangesetMethod { .. }));

        let top_level_post = BatchBuilder::new("batch_1").operation("POST", "Customers", "{}");
        let error = assert_err!(
            processor
                .process(&top_level_post.content_type(), &top_level_post.build())
                .await
        );
        assert!(matches!(error, BatchError::InvalidTopLevelMethod { index: 0, .. }));
        assert_eq!(error.status_code(), 400);

        let unterminated = b"--batch_1\r\nContent-Type: application/http\r\n\r\nGET Customers HTTP/1.1\r\n";
        let error = assert_err!(
            processor
                .process("multipart/mixed; boundary=batch_1", unterminated)
                .await
        );
        assert!(matches!(error, BatchError::MalformedBatch(_)));

        assert!(dispatcher.events().is_empty());
    }

    #[tokio::test]
    async fn test_error_hook_sees_non_fatal_errors() {
        let dispatcher = Arc::new(RecordingDispatcher::new().failing_on("/Products"));
        let hook = Arc::new(CollectingHook::default());
        let processor = BatchProcessor::new(
            dispatcher.clone(),
            settings().with_limits(Limits::new(2, 100).unwrap()),
        )
        .with_error_hook(hook.clone());

        let batch = BatchBuilder::new("batch_1")
            .get("Products")
            .changeset(ChangesetBuilder::new("cs_1").post("Customers", "nope", None))
            .get("Orders");

        run(&processor, &batch).await;

        let reports = hook.reports.lock().clone();
        let summary: Vec<(ErrorStage, usize, Option<usize>, &str)> = reports
            .iter()
            .map(|(context, code)| (context.stage, context.element, context.operation, code.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (ErrorStage::Execution, 0, None, "DISPATCH_ERROR"),
                (ErrorStage::Execution, 1, Some(0), "CHANGESET_FAILED"),
                (ErrorStage::Validation, 2, None, "BATCH_COUNT_EXCEEDED"),
            ]
        );

        // All reports from one call share the batch id
        assert!(reports.iter().all(|(context, _)| context.batch_id == reports[0].0.batch_id));
    }

    #[tokio::test]
    async fn test_unrenderable_changeset_failure_reports_twice() {
        let rejection = OperationResponse::new(409)
            .with_header("Content-Type", "application/json")
            .with_header("X-Trace", "abc\r\nInjected: 1")
            .with_body(r#"{"error":"conflict"}"#);
        let dispatcher = Arc::new(RecordingDispatcher::new().responding_on("/Customers", rejection));
        let hook = Arc::new(CollectingHook::default());
        let processor = processor(&dispatcher, settings()).with_error_hook(hook.clone());

        let batch = BatchBuilder::new("batch_1")
            .get("Orders")
            .changeset(ChangesetBuilder::new("cs_1").post("Customers", "{}", Some("1")))
            .get("Products");

        let response = run(&processor, &batch).await;
        let parts = parse_response(&response);

        assert_eq!(statuses(&parts), vec![200, 500, 200]);
        assert!(!parts[1].is_changeset());
        assert_eq!(parts[1].json()["error"]["code"], "SERIALIZATION_ERROR");
        assert!(!String::from_utf8_lossy(&response.body).contains("Injected"));
        assert_eq!(parts[2].json(), json!({ "value": [] }));
        assert_eq!(dispatcher.count(&DispatcherEvent::Rollback), 1);

        let reports = hook.reports.lock().clone();
        let summary: Vec<(ErrorStage, usize, Option<usize>, &str)> = reports
            .iter()
            .map(|(context, code)| (context.stage, context.element, context.operation, code.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (ErrorStage::Execution, 1, Some(0), "CHANGESET_FAILED"),
                (ErrorStage::Serialization, 1, None, "SERIALIZATION_ERROR"),
            ]
        );
    }

    #[tokio::test]
    async fn test_operations_framed_with_single_blank_line() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let processor = processor(&dispatcher, settings());

        let batch = BatchBuilder::new("batch_1")
            .raw_part("Content-Type: application/http\r\n\r\nGET Customers HTTP/1.1\r\nAccept: application/json\r\n")
            .raw_part(
                "Content-Type: multipart/mixed; boundary=cs_1\r\n\r\n\
--cs_1\r\n\
Content-Type: application/http\r\n\
Content-ID: 1\r\n\r\n\
POST Customers HTTP/1.1\r\n\
Content-Type: application/json\r\n\r\n\
{\"Name\":\"Ada\"}\r\n\
--cs_1\r\n\
Content-Type: application/http\r\n\r\n\
DELETE $1 HTTP/1.1\r\n\
\r\n\
--cs_1--",
            )
            .raw_part("Content-Type: application/http\r\n\r\nGET Orders HTTP/1.1\r\n");

        let response = run(&processor, &batch).await;
        let parts = parse_response(&response);

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].status, 200);
        let changeset = parts[1].changeset.as_ref().unwrap();
        assert_eq!(statuses(changeset), vec![201, 204]);
        assert_eq!(parts[2].status, 200);
        assert_eq!(dispatcher.store.count("Customers"), 0);
        let mut urls = dispatcher.dispatched_urls();
        urls.sort();
        assert_eq!(
            urls,
            vec![
                "http://localhost:8000/odata/Customers",
                "http://localhost:8000/odata/Customers",
                "http://localhost:8000/odata/Customers(1)",
                "http://localhost:8000/odata/Orders",
            ]
        );
    }
}
