//! Integration tests for the tool-calling conversation loop.
//!
//! These drive `ConversationService` end to end over the demo catalog with a
//! scripted chat model standing in for Claude/Gemini.

use std::sync::Arc;

use serde_json::json;
use shop_concierge_assistant::imaging::is_jpeg;
use shop_concierge_assistant::llm::{ConversationTurn, LlmError, Part};
use shop_concierge_assistant::services::{ConversationSettings, FALLBACK_REPLY};
use shop_concierge_core::{TurnRole, UserId};
use shop_concierge_integration_tests::{
    ScriptedModel, call_turn, demo_service, demo_service_with,
};

fn tool_payloads(turn: &ConversationTurn) -> Vec<serde_json::Value> {
    turn.parts
        .iter()
        .filter_map(|part| match part {
            Part::ToolResponse(response) => Some(response.payload.clone()),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Plain Replies
// =============================================================================

#[tokio::test]
async fn test_greeting_without_tools() {
    let model = ScriptedModel::new(vec![Ok(ConversationTurn::model_text(
        "您好！有什麼可以幫您的嗎？",
    ))]);
    let service = demo_service(model.clone());

    let reply = service
        .process_message("你好", &UserId::new("U-greet"))
        .await
        .expect("reply");

    assert_eq!(reply.text, "您好！有什麼可以幫您的嗎？");
    assert!(reply.image.is_none());

    let requests = model.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].tools,
        vec!["search_products", "get_order_history", "get_product_details"]
    );
}

// =============================================================================
// Tool Round Trips
// =============================================================================

#[tokio::test]
async fn test_search_returns_top_product_image() {
    let model = ScriptedModel::new(vec![
        Ok(call_turn(
            "c1",
            "search_products",
            json!({"description": "藍色襯衫", "color": "藍色"}),
        )),
        Ok(ConversationTurn::model_text("推薦淺藍色牛津襯衫")),
    ]);
    let service = demo_service(model.clone());

    let reply = service
        .process_message("有藍色襯衫嗎？", &UserId::new("U-search"))
        .await
        .expect("reply");

    assert_eq!(reply.text, "推薦淺藍色牛津襯衫");
    let image = reply.image.expect("product image");
    assert!(is_jpeg(&image));

    // Second request carries user turn, tool call and tool result
    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    let second = &requests[1].transcript;
    assert_eq!(second.len(), 3);
    assert_eq!(second[2].role, TurnRole::Tool);

    let payloads = tool_payloads(&second[2]);
    assert_eq!(payloads[0]["status"], "success");
    assert_eq!(payloads[0]["primary_product_id"], "P005");
    assert!(payloads[0]["count"].as_u64().expect("count") <= 3);
}

#[tokio::test]
async fn test_order_history_uses_sender_identity() {
    let model = ScriptedModel::new(vec![
        Ok(call_turn(
            "c1",
            "get_order_history",
            json!({"time_range": "all", "user_id": "U-someone-else"}),
        )),
        Ok(ConversationTurn::model_text("您有兩筆訂單")),
    ]);
    let service = demo_service(model.clone());

    let reply = service
        .process_message("我買過什麼？", &UserId::new("U-orders"))
        .await
        .expect("reply");

    assert_eq!(reply.text, "您有兩筆訂單");
    assert!(reply.image.is_some());

    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    let payloads = tool_payloads(&requests[1].transcript[2]);
    assert_eq!(payloads[0]["order_count"], 2);
    assert_eq!(payloads[0]["orders"][0]["product_name"], "棕色飛行員外套");
}

#[tokio::test]
async fn test_empty_order_window_has_no_image() {
    let model = ScriptedModel::new(vec![
        Ok(call_turn(
            "c1",
            "get_order_history",
            json!({"time_range": "last_month"}),
        )),
        Ok(ConversationTurn::model_text("近一個月沒有訂單")),
    ]);
    let service = demo_service(model);

    let reply = service
        .process_message("上個月買了什麼？", &UserId::new("U-window"))
        .await
        .expect("reply");

    assert_eq!(reply.text, "近一個月沒有訂單");
    assert!(reply.image.is_none());
}

#[tokio::test]
async fn test_last_image_wins_across_iterations() {
    let model = ScriptedModel::new(vec![
        Ok(call_turn(
            "c1",
            "get_product_details",
            json!({"product_id": "P001"}),
        )),
        Ok(call_turn(
            "c2",
            "get_product_details",
            json!({"product_id": "P004"}),
        )),
        Ok(ConversationTurn::model_text("兩件都很適合您")),
    ]);
    let single = ScriptedModel::new(vec![
        Ok(call_turn(
            "c1",
            "get_product_details",
            json!({"product_id": "P004"}),
        )),
        Ok(ConversationTurn::model_text("ok")),
    ]);

    let both = demo_service(model)
        .process_message("比較 P001 和 P004", &UserId::new("U-last"))
        .await
        .expect("reply");
    let only_p004 = demo_service(single)
        .process_message("P004", &UserId::new("U-last"))
        .await
        .expect("reply");

    assert_eq!(both.image, only_p004.image);
}

#[tokio::test]
async fn test_tool_errors_are_fed_back() {
    let model = ScriptedModel::new(vec![
        Ok(call_turn("c1", "delete_everything", json!({}))),
        Ok(call_turn(
            "c2",
            "get_product_details",
            json!({"product_id": "P999"}),
        )),
        Ok(ConversationTurn::model_text("找不到這個商品")),
    ]);
    let service = demo_service(model.clone());

    let reply = service
        .process_message("P999", &UserId::new("U-errors"))
        .await
        .expect("reply");

    assert_eq!(reply.text, "找不到這個商品");
    assert!(reply.image.is_none());

    let requests = model.requests();
    assert_eq!(requests.len(), 3);

    let unknown = tool_payloads(&requests[1].transcript[2]);
    assert_eq!(unknown[0]["status"], "error");
    assert!(
        unknown[0]["message"]
            .as_str()
            .expect("message")
            .contains("delete_everything")
    );

    let missing = tool_payloads(&requests[2].transcript[4]);
    assert_eq!(missing[0]["status"], "error");
    assert!(missing[0]["message"].as_str().expect("message").contains("P999"));
}

#[tokio::test]
async fn test_parallel_calls_answered_in_one_turn() {
    let mut turn = call_turn("c1", "get_product_details", json!({"product_id": "P002"}));
    turn.parts.extend(
        call_turn("c2", "get_product_details", json!({"product_id": "P003"})).parts,
    );
    let model = ScriptedModel::new(vec![Ok(turn), Ok(ConversationTurn::model_text("done"))]);
    let service = demo_service(model.clone());

    service
        .process_message("P002 P003", &UserId::new("U-parallel"))
        .await
        .expect("reply");

    let requests = model.requests();
    let tool_turn = &requests[1].transcript[2];
    let ids: Vec<&str> = tool_turn
        .parts
        .iter()
        .filter_map(|part| match part {
            Part::ToolResponse(response) => Some(response.call_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(ids, vec!["c1", "c2"]);
}

// =============================================================================
// Limits and Failures
// =============================================================================

#[tokio::test]
async fn test_iteration_cap_returns_fallback() {
    let settings = ConversationSettings {
        max_iterations: 3,
        ..ConversationSettings::default()
    };
    let turns = (0..10)
        .map(|i| {
            Ok(call_turn(
                &format!("c{i}"),
                "search_products",
                json!({"description": "外套"}),
            ))
        })
        .collect();
    let model = ScriptedModel::new(turns);
    let service = demo_service_with(model.clone(), settings);

    let reply = service
        .process_message("外套", &UserId::new("U-cap"))
        .await
        .expect("reply");

    assert_eq!(reply.text, FALLBACK_REPLY);
    assert_eq!(model.requests().len(), 3);
}

#[tokio::test]
async fn test_model_failure_keeps_previous_history() {
    let model = ScriptedModel::new(vec![
        Ok(ConversationTurn::model_text("第一則回覆")),
        Err(LlmError::Unauthorized("bad key".to_string())),
    ]);
    let service = demo_service(model.clone());
    let user = UserId::new("U-fail");

    service
        .process_message("第一則", &user)
        .await
        .expect("first reply");
    let before = service.sessions().history(&user).await;
    assert_eq!(before.len(), 2);

    service
        .process_message("第二則", &user)
        .await
        .expect_err("second message fails");
    assert_eq!(service.sessions().history(&user).await, before);
}

// =============================================================================
// History
// =============================================================================

#[tokio::test]
async fn test_history_carries_across_messages_and_stays_bounded() {
    let model = ScriptedModel::new(Vec::new());
    let service = demo_service(model.clone());
    let user = UserId::new("U-history");

    for i in 0..15 {
        service
            .process_message(&format!("訊息 {i}"), &user)
            .await
            .expect("reply");
    }

    let history = service.sessions().history(&user).await;
    assert!(history.len() <= 20);
    assert!(history.first().is_some_and(ConversationTurn::is_user_text));
    assert_eq!(history.last().map(ConversationTurn::text).as_deref(), Some("好的"));

    // Each request saw the stored history plus the new message
    let requests = model.requests();
    assert_eq!(requests[0].transcript.len(), 1);
    assert_eq!(requests[1].transcript.len(), 3);
    assert!(requests.iter().all(|r| r.transcript.len() <= 21));
}

#[tokio::test]
async fn test_users_do_not_share_history() {
    let model = ScriptedModel::new(Vec::new());
    let service = demo_service(model.clone());

    service
        .process_message("我是 A", &UserId::new("U-a"))
        .await
        .expect("reply");
    service
        .process_message("我是 B", &UserId::new("U-b"))
        .await
        .expect("reply");

    let requests = model.requests();
    assert_eq!(requests[1].transcript.len(), 1);
    assert_eq!(requests[1].transcript[0].text(), "我是 B");
}

#[tokio::test]
async fn test_same_user_messages_are_serialized() {
    let model = ScriptedModel::new(Vec::new());
    let service = Arc::new(demo_service(model.clone()));
    let user = UserId::new("U-concurrent");

    let first = {
        let service = Arc::clone(&service);
        let user = user.clone();
        tokio::spawn(async move { service.process_message("一", &user).await })
    };
    let second = {
        let service = Arc::clone(&service);
        let user = user.clone();
        tokio::spawn(async move { service.process_message("二", &user).await })
    };

    first.await.expect("join").expect("reply");
    second.await.expect("join").expect("reply");

    // Whichever ran second saw the first exchange
    let mut lengths: Vec<usize> = model
        .requests()
        .iter()
        .map(|r| r.transcript.len())
        .collect();
    lengths.sort_unstable();
    assert_eq!(lengths, vec![1, 3]);
    assert_eq!(service.sessions().history(&user).await.len(), 4);
}
