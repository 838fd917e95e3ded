use std::time::Duration;

use waitlist::configuration::EmailServiceKind;
use wiremock::matchers::body_partial_json;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::ResponseTemplate;

use crate::helpers::json_body;
use crate::helpers::spawn_app;
use crate::helpers::spawn_app_with;

const MAILCHIMP_PATH: &str = "/3.0/lists/local-audience/members";
const CONVERTKIT_PATH: &str = "/v3/forms/local-audience/subscribe";

fn member_exists() -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(serde_json::json!({
        "title": "Member Exists",
        "status": 400,
        "detail": "test@example.com is already a list member."
    }))
}

#[tokio::test]
async fn signup_ok() {
    let app = spawn_app().await;

    Mock::given(path(MAILCHIMP_PATH))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let resp = app
        .post_waitlist(r#"{"email":"test@example.com","source":"hero"}"#, "203.0.113.7")
        .await;

    assert_eq!(resp.status().as_u16(), 200);
    let body = json_body(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Successfully added to waitlist");
}

#[tokio::test]
async fn email_is_normalised_before_the_provider_sees_it() {
    let app = spawn_app().await;

    Mock::given(path(MAILCHIMP_PATH))
        .and(body_partial_json(serde_json::json!({
            "email_address": "user@example.com",
            "merge_fields": { "SIGNUP_SOURCE": "footer_cta" }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let resp = app
        .post_waitlist(
            r#"{"email":"  USER@Example.com ","source":"footer_cta"}"#,
            "203.0.113.7",
        )
        .await;
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn unrecognised_source_is_clamped() {
    let app = spawn_app().await;

    Mock::given(path(MAILCHIMP_PATH))
        .and(body_partial_json(serde_json::json!({
            "merge_fields": { "SIGNUP_SOURCE": "unknown" }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(4)
        .mount(&app.email_server)
        .await;

    for body in [
        r#"{"email":"a@example.com","source":"modal"}"#,
        r#"{"email":"b@example.com","source":"sidebar"}"#,
        r#"{"email":"c@example.com","source":42}"#,
        r#"{"email":"d@example.com"}"#,
    ] {
        let resp = app.post_waitlist(body, "203.0.113.7").await;
        assert_eq!(resp.status().as_u16(), 200, "{body}");
    }
}

#[tokio::test]
async fn second_signup_is_a_duplicate() {
    let app = spawn_app().await;

    Mock::given(path(MAILCHIMP_PATH))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .expect(1)
        .mount(&app.email_server)
        .await;
    Mock::given(path(MAILCHIMP_PATH))
        .respond_with(member_exists())
        .expect(1)
        .mount(&app.email_server)
        .await;

    let first = app.post_email("test@example.com", "203.0.113.7").await;
    assert_eq!(first.status().as_u16(), 200);

    let second = app.post_email("test@example.com", "203.0.113.7").await;
    assert_eq!(second.status().as_u16(), 409);
    let body = json_body(second).await;
    assert_eq!(body["code"], "DUPLICATE_EMAIL");
    assert_eq!(
        body["error"],
        "This email is already on our waitlist. Thank you for your interest!"
    );
}

#[tokio::test]
async fn convertkit_already_subscribed_is_a_duplicate() {
    let app = spawn_app_with(EmailServiceKind::Convertkit, 10_000).await;

    Mock::given(path(CONVERTKIT_PATH))
        .and(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "api_key": "local-us1",
            "email": "test@example.com",
            "tags": ["PataDoc_Waitlist", "Pre_Launch"]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "message": "Email already subscribed" })),
        )
        .expect(1)
        .mount(&app.email_server)
        .await;

    let resp = app.post_email("test@example.com", "203.0.113.7").await;
    assert_eq!(resp.status().as_u16(), 409);
    assert_eq!(json_body(resp).await["code"], "DUPLICATE_EMAIL");
}

#[tokio::test]
async fn invalid_requests() {
    let app = spawn_app().await;

    Mock::given(path(MAILCHIMP_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    for (i, (body, code, msg)) in [
        (r#"{"email":"not-an-email"}"#, "INVALID_EMAIL", "no @"),
        (r#"{"email":"john@foo"}"#, "INVALID_EMAIL", "no tld"),
        (r#"{"email":42}"#, "INVALID_EMAIL", "not a string"),
        (r#"{"source":"hero"}"#, "MISSING_EMAIL", "no email"),
        (r#"{"email":null}"#, "MISSING_EMAIL", "null email"),
        (r#"{"email":""}"#, "MISSING_EMAIL", "empty email"),
        (r#"{"email":"   "}"#, "INVALID_EMAIL", "blank email"),
        ("{not json", "INVALID_JSON", "broken json"),
        ("", "INVALID_JSON", "empty body"),
        (r#"["a@b.co"]"#, "INVALID_JSON", "not an object"),
    ]
    .into_iter()
    .enumerate()
    {
        // separate clients, so the rate limit stays out of the way
        let ip = format!("198.51.100.{i}");
        let resp = app.post_waitlist(body, &ip).await;
        assert_eq!(resp.status().as_u16(), 400, "{msg}");
        assert_eq!(json_body(resp).await["code"], code, "{msg}");
    }
}

#[tokio::test]
async fn sixth_request_is_rate_limited() {
    let app = spawn_app().await;

    // validation failures count towards the limit too
    for _ in 0..5 {
        let resp = app
            .post_waitlist(r#"{"email":"not-an-email"}"#, "203.0.113.7")
            .await;
        assert_eq!(resp.status().as_u16(), 400);
    }

    let resp = app
        .post_waitlist(r#"{"email":"not-an-email"}"#, "203.0.113.7")
        .await;
    assert_eq!(resp.status().as_u16(), 429);
    let body = json_body(resp).await;
    assert_eq!(body["code"], "RATE_LIMIT_EXCEEDED");
    assert_eq!(body["error"], "Too many requests. Please try again later.");

    // a different client is unaffected
    let resp = app
        .post_waitlist(r#"{"email":"not-an-email"}"#, "203.0.113.8")
        .await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn forwarded_for_takes_the_first_address() {
    let app = spawn_app().await;

    for _ in 0..5 {
        app.post_waitlist("{}", "203.0.113.7, 10.0.0.1").await;
    }
    // same first hop, different proxy chain
    let resp = app.post_waitlist("{}", "203.0.113.7, 10.0.0.2").await;
    assert_eq!(resp.status().as_u16(), 429);
}

#[tokio::test]
async fn other_methods_are_not_allowed() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/waitlist", app.addr);

    for req in [client.get(&url), client.put(&url), client.delete(&url)] {
        let resp = req.send().await.expect("execute request");
        assert_eq!(resp.status().as_u16(), 405);
        assert_eq!(resp.headers()["allow"], "POST");
        assert_eq!(json_body(resp).await["code"], "METHOD_NOT_ALLOWED");
    }
}

#[tokio::test]
async fn upstream_timeout_message_is_unavailable() {
    let app = spawn_app().await;

    Mock::given(path(MAILCHIMP_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "title": "Bad Request",
            "detail": "Upstream timeout while processing request"
        })))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let resp = app.post_email("test@example.com", "203.0.113.7").await;
    assert_eq!(resp.status().as_u16(), 503);
    let body = json_body(resp).await;
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    // provider text never reaches the client
    assert!(!body["error"].as_str().unwrap().contains("Upstream"));
}

#[tokio::test]
async fn slow_upstream_is_unavailable() {
    let app = spawn_app_with(EmailServiceKind::Mailchimp, 200).await;

    Mock::given(path(MAILCHIMP_PATH))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let resp = app.post_email("test@example.com", "203.0.113.7").await;
    assert_eq!(resp.status().as_u16(), 503);
    assert_eq!(json_body(resp).await["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn upstream_error_is_an_email_service_error() {
    let app = spawn_app().await;

    Mock::given(path(MAILCHIMP_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let resp = app.post_email("test@example.com", "203.0.113.7").await;
    assert_eq!(resp.status().as_u16(), 500);
    assert_eq!(json_body(resp).await["code"], "EMAIL_SERVICE_ERROR");
}
