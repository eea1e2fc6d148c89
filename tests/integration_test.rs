mod test_utils;

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use tower::util::ServiceExt;

    use crate::test_utils::{ScriptedModel, ScriptedReply, body_to_string, sse_events, test_app};

    async fn start(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/chat/sessions")
                    .method("POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body: Value = serde_json::from_str(&body_to_string(response.into_body()).await).unwrap();
        body["session_id"].as_str().unwrap().to_string()
    }

    async fn turn(app: &Router, id: &str, message: &str) -> Vec<Value> {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/chat")
                    .method("POST")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({ "session_id": id, "message": message }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        sse_events(&body_to_string(response.into_body()).await)
    }

    #[tokio::test]
    async fn it_serves_web_ui() {
        let app = test_app(ScriptedModel::default());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("cache-control").unwrap(), "no-cache");

        let body = body_to_string(response.into_body()).await;
        assert!(body.contains("Decision Helper"));
        assert!(body.contains("never stored"));
    }

    /// Two clarifying questions then a structured conclusion
    #[tokio::test]
    async fn it_runs_a_full_counseling_conversation() {
        let model = ScriptedModel::new(vec![
            ScriptedReply::Text(vec!["That sounds stressful. Which offers are they?"]),
            ScriptedReply::Text(vec!["Which one excites you more?"]),
            ScriptedReply::Text(vec![
                "**Current situation analysis**: Two solid offers.\n\n",
                "**Core of the concern**: Stability versus growth.\n\n",
                "**Recommended action**: Try the startup for a year.",
            ]),
        ]);
        let prompts = model.prompts.clone();
        let app = test_app(model);
        let id = start(&app).await;

        let events = turn(&app, &id, "I can't decide between two job offers").await;
        assert_eq!(
            events.last().unwrap(),
            &json!({ "type": "done", "question_count": 1, "stage": "asking_second" })
        );

        let events = turn(&app, &id, "A startup and a bank").await;
        assert_eq!(
            events.last().unwrap(),
            &json!({ "type": "done", "question_count": 2, "stage": "concluding" })
        );

        let events = turn(&app, &id, "The startup, I think").await;
        assert_eq!(
            events.last().unwrap(),
            &json!({ "type": "done", "question_count": 2, "stage": "concluding" })
        );
        let reply: String = events
            .iter()
            .filter(|e| e["type"] == "fragment")
            .map(|e| e["text"].as_str().unwrap())
            .collect();
        assert!(reply.contains("**Current situation analysis**"));
        assert!(reply.contains("**Core of the concern**"));
        assert!(reply.contains("**Recommended action**"));

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("Current question count: 0"));
        assert!(prompts[1].contains("Current question count: 1"));
        assert!(prompts[2].contains("Current question count: 2"));
        assert!(prompts[2].contains("Stage: conclusion"));
    }

    /// A reply that asks nothing leaves the counter alone
    #[tokio::test]
    async fn it_keeps_count_without_question() {
        let app = test_app(ScriptedModel::new(vec![ScriptedReply::Text(vec![
            "I see. Take your time.",
        ])]));
        let id = start(&app).await;

        let events = turn(&app, &id, "Hmm").await;
        assert_eq!(
            events.last().unwrap(),
            &json!({ "type": "done", "question_count": 0, "stage": "asking_first" })
        );
    }

    /// A failed turn can be retried and picks up where it left off
    #[tokio::test]
    async fn it_recovers_after_failure() {
        let app = test_app(ScriptedModel::new(vec![
            ScriptedReply::Fail("connection reset"),
            ScriptedReply::Text(vec!["Which options do you have?"]),
        ]));
        let id = start(&app).await;

        let events = turn(&app, &id, "Help me decide").await;
        assert_eq!(events.last().unwrap()["type"], "error");

        let events = turn(&app, &id, "Help me decide").await;
        assert_eq!(
            events.last().unwrap(),
            &json!({ "type": "done", "question_count": 1, "stage": "asking_second" })
        );
    }
}
