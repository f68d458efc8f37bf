// tests/generate_tests.rs

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    FailingSaveStore, ScriptedModel, failed_generation_body, mcq_payload, mcq_reply, spawn_app,
    spawn_app_on, spawn_app_with,
};
use serde_json::{Value, json};
use studyset::ai::ModelError;
use studyset::store::{DynStore, MemoryStore, StudyStore};

fn generate_body(quantity: Value, context: &str, user_id: &str) -> Value {
    json!({ "questionQuantity": quantity, "context": context, "userId": user_id })
}

#[tokio::test]
async fn generate_persists_a_dense_private_set() {
    let app = spawn_app().await;
    app.model.push(Ok(mcq_reply("Binary Search Trees", 3)));

    let resp = app
        .post(
            "/api/generate-questions",
            generate_body(json!(3), "binary search trees", "u1"),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["title"], "Binary Search Trees");
    assert_eq!(body["question_count"], 3);
    let set_id = body["set_id"].as_str().unwrap().to_string();

    assert_eq!(app.model.calls(), 1);
    let prompt = app.model.last_user_message().unwrap();
    assert!(prompt.contains("3"));
    assert!(prompt.contains("binary search trees"));

    let set: Value = app.get(&format!("/api/set/{}", set_id)).await.json().await.unwrap();
    assert_eq!(set["set"]["visibility"], "private");
    assert_eq!(set["set"]["userId"], "u1");

    let listing: Value = app
        .get(&format!("/api/questions/{}", set_id))
        .await
        .json()
        .await
        .unwrap();
    let questions = listing["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 3);

    for (i, q) in questions.iter().enumerate() {
        assert_eq!(q["position"], (i + 1) as i64);
        assert_eq!(q["type"], "multiple_choice");
        let choices = q["choices"].as_array().unwrap();
        assert_eq!(choices.len(), 4);
        let idx = q["answerIdx"].as_u64().unwrap() as usize;
        assert_eq!(choices[idx], q["answer"]);
    }
}

#[tokio::test]
async fn quantity_accepts_numeric_string() {
    let app = spawn_app().await;
    app.model.push(Ok(mcq_reply("Cells", 2)));

    let resp = app
        .post(
            "/api/generate-questions",
            generate_body(json!("2"), "cell biology", "u1"),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["question_count"], 2);
}

#[tokio::test]
async fn invalid_requests_never_reach_the_model() {
    let app = spawn_app().await;

    let cases = vec![
        generate_body(json!(0), "binary search trees", "u1"),
        generate_body(json!(51), "binary search trees", "u1"),
        generate_body(json!("lots"), "binary search trees", "u1"),
        generate_body(json!(3), "  ab  ", "u1"),
        generate_body(json!(3), "binary search trees", ""),
        generate_body(json!(3), "binary search trees", "   "),
        json!({ "questionQuantity": 3, "context": "binary search trees" }),
    ];

    for case in cases {
        let resp = app.post("/api/generate-questions", case.clone()).await;
        assert_eq!(resp.status().as_u16(), 400, "case {} should be rejected", case);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "validation_error");
    }

    assert_eq!(app.model.calls(), 0);
}

#[tokio::test]
async fn payload_is_salvaged_from_provider_error() {
    let app = spawn_app().await;
    let body = failed_generation_body(&mcq_payload("Photosynthesis", 2));
    app.model.push(Err(ModelError::Provider { status: 400, body }));

    let resp = app
        .post(
            "/api/generate-questions",
            generate_body(json!(2), "photosynthesis", "u2"),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["title"], "Photosynthesis");
    assert_eq!(body["question_count"], 2);

    let set_id = body["set_id"].as_str().unwrap();
    let positions: Vec<i64> = app.list(set_id).await.into_iter().map(|q| q.2).collect();
    assert_eq!(positions, vec![1, 2]);
}

#[tokio::test]
async fn unusable_reply_fails_without_creating_a_set() {
    let app = spawn_app().await;

    let mut wrong_answer = mcq_payload("Broken", 2);
    wrong_answer["questions"][1]["answer"] = json!("not one of the choices");

    let replies = vec![
        Ok(mcq_reply("Too few", 1)),
        Ok(wrong_answer.to_string()),
        Ok("I cannot help with that.".to_string()),
        Err(ModelError::Provider {
            status: 500,
            body: "upstream exploded".to_string(),
        }),
        Err(ModelError::Transport("connection reset".to_string())),
    ];

    for reply in replies {
        app.model.push(reply);
        let resp = app
            .post(
                "/api/generate-questions",
                generate_body(json!(2), "sorting algorithms", "u3"),
            )
            .await;
        assert_eq!(resp.status().as_u16(), 500);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "generation_failed");
    }

    let sets: Value = app.get("/api/sets/user/u3").await.json().await.unwrap();
    assert!(sets["sets"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn slow_model_times_out() {
    let app = spawn_app_with(
        ScriptedModel::with_delay(Duration::from_millis(500)),
        Duration::from_millis(50),
    )
    .await;
    app.model.push(Ok(mcq_reply("Late", 1)));

    let resp = app
        .post(
            "/api/generate-questions",
            generate_body(json!(1), "plate tectonics", "u4"),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "generation_failed");

    let sets: Value = app.get("/api/sets/user/u4").await.json().await.unwrap();
    assert!(sets["sets"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn save_failure_surfaces_as_generation_failure() {
    let memory: DynStore = Arc::new(MemoryStore::new());
    let failing = Arc::new(FailingSaveStore::new(memory.clone()));
    let app = spawn_app_on(failing.clone(), ScriptedModel::new(), Duration::from_secs(5)).await;
    app.model.push(Ok(mcq_reply("Doomed", 2)));

    let resp = app
        .post(
            "/api/generate-questions",
            generate_body(json!(2), "entropy", "u5"),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "generation_failed");
    assert!(!body["message"].as_str().unwrap().contains("constraint"));

    assert_eq!(failing.attempts(), 1);
    assert!(memory.list_user_sets("u5").await.unwrap().is_empty());
}
