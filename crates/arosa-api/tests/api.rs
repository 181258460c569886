use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use arosa_api::auth::{AppState, AppStateInner};
use arosa_api::species::SpeciesClient;
use arosa_api::storage::MediaStore;
use arosa_db::Database;

const DEFAULT_PHOTO: &str = "http://localhost:3000/media/profilepictures/default_pp.png";
const BOUNDARY: &str = "arosa-test-boundary";

struct TestApp {
    app: Router,
    state: AppState,
    dir: PathBuf,
}

async fn test_app() -> TestApp {
    let dir = std::env::temp_dir().join(format!("arosa-api-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();

    let db = Database::open(&dir.join("arosa.db"), 2).unwrap();
    let media = MediaStore::new(dir.join("media"), "http://localhost:3000")
        .await
        .unwrap();
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: "test-secret".into(),
        media,
        species: SpeciesClient::new("http://127.0.0.1:9", String::new()),
        default_photo: DEFAULT_PHOTO.into(),
    });

    TestApp {
        app: arosa_api::router(state.clone()),
        state,
        dir,
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

impl TestApp {
    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn json(&self, method: &str, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, token);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    async fn call(&self, method: &str, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, token);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Registers an account and returns `(id, uid)`.
    async fn register(&self, email: &str) -> (i64, String) {
        let (status, body) = self
            .json(
                "POST",
                "/user",
                None,
                json!({
                    "lastName": "Durand",
                    "firstName": "Alice",
                    "email": email,
                    "address": "1 rue des Lilas",
                    "phone": "0600000000",
                    "cityName": "Lyon",
                    "password": "p"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["record"]["id"].as_i64().unwrap(),
            body["record"]["uid"].as_str().unwrap().to_string(),
        )
    }

    async fn create_post(&self, token: &str, title: &str, images: &[&[u8]]) -> (StatusCode, Value) {
        let fields = [("title", title), ("cityName", "Lyon"), ("plantType", "Ficus")];
        let req = Request::builder()
            .method("POST")
            .uri("/post")
            .header(header::AUTHORIZATION, token)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(&fields, images)))
            .unwrap();
        self.send(req).await
    }
}

fn multipart_body(fields: &[(&str, &str)], images: &[&[u8]]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (index, data) in images.iter().enumerate() {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"img{index}.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

#[tokio::test]
async fn duplicate_email_is_refused_with_417() {
    let t = test_app().await;

    let (status, body) = t
        .json(
            "POST",
            "/user",
            None,
            json!({ "email": "a@x.com", "password": "p", "firstName": "Alice", "cityName": "Lyon" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["record"]["email"], "a@x.com");
    assert_eq!(body["record"]["firstName"], "Alice");
    assert_eq!(body["record"]["cityName"], "Lyon");
    assert_eq!(body["record"]["photo"], DEFAULT_PHOTO);
    assert_eq!(body["record"]["role"], "Utilisateur");
    assert!(!body["record"]["uid"].as_str().unwrap().is_empty());
    assert!(body["record"].get("password").is_none());

    let (status, body) = t
        .json("POST", "/user", None, json!({ "email": "a@x.com", "password": "p" }))
        .await;
    assert_eq!(status, StatusCode::EXPECTATION_FAILED);
    assert_eq!(body["success"], false);
    assert_eq!(body["msg"], "Email déjà existant");
}

#[tokio::test]
async fn login_and_token_resolution() {
    let t = test_app().await;
    let (id, uid) = t.register("a@x.com").await;

    let (status, _) = t
        .json("POST", "/user/login", None, json!({ "email": "a@x.com", "password": "nope" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t
        .json("POST", "/user/login", None, json!({ "email": "b@x.com", "password": "p" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = t
        .json("POST", "/user/login", None, json!({ "email": "a@x.com", "password": "p" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["uid"], uid.as_str());
    let session = body["session"].as_str().unwrap().to_string();

    // bare uid, Bearer uid and Bearer session all resolve to the same user
    for token in [uid.clone(), format!("Bearer {uid}"), format!("Bearer {session}")] {
        let (status, body) = t.call("GET", "/user/me", Some(token.as_str())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["record"]["id"], id);
    }

    let (status, body) = t.call("GET", "/user/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["msg"], "Aucun token fourni");

    let (status, body) = t.call("GET", "/user/me", Some("unknown-token")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "Utilisateur introuvable");

    // public profile never leaks the bearer token
    let (status, body) = t.call("GET", &format!("/user/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["record"].get("uid").is_none());
    assert!(body["record"].get("email").is_none());
}

#[tokio::test]
async fn users_update_and_delete_only_themselves() {
    let t = test_app().await;
    let (alice, alice_uid) = t.register("a@x.com").await;
    let (_bob, bob_uid) = t.register("b@x.com").await;

    let update = json!({
        "lastName": "Martin",
        "firstName": "Alice",
        "email": "b@x.com",
        "address": "2 rue",
        "phone": "07",
        "cityName": "Nantes"
    });
    let (status, _) = t.json("PUT", "/user", Some(alice_uid.as_str()), update.clone()).await;
    assert_eq!(status, StatusCode::EXPECTATION_FAILED);

    let mut update = update;
    update["email"] = json!("alice@x.com");
    let (status, body) = t.json("PUT", "/user", Some(alice_uid.as_str()), update).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["record"]["cityName"], "Nantes");

    let (status, _) = t.call("DELETE", &format!("/user/{alice}"), Some(bob_uid.as_str())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(t.state.db.get_user_by_id(alice).unwrap().is_some());

    let (status, _) = t.call("DELETE", &format!("/user/{alice}"), Some(alice_uid.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(t.state.db.get_user_by_id(alice).unwrap().is_none());
}

#[tokio::test]
async fn botanist_role_is_admin_only() {
    let t = test_app().await;
    let (alice, alice_uid) = t.register("a@x.com").await;
    let (admin, admin_uid) = t.register("admin@x.com").await;
    t.state.db.set_admin(admin, true).unwrap();

    let uri = format!("/user/{alice}/botanist");
    let (status, _) = t.json("PATCH", &uri, Some(alice_uid.as_str()), json!({ "isBotanist": true })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = t.json("PATCH", &uri, Some(admin_uid.as_str()), json!({ "isBotanist": true })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["record"]["role"], "Botaniste");
}

#[tokio::test]
async fn conversation_pair_is_unordered() {
    let t = test_app().await;
    let (a, a_uid) = t.register("a@x.com").await;
    let (b, b_uid) = t.register("b@x.com").await;
    let (_c, c_uid) = t.register("c@x.com").await;

    let (status, first) = t
        .json("POST", "/conversation", Some(a_uid.as_str()), json!({ "idUser1": a, "idUser2": b }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = first["id"].as_i64().unwrap();

    let (status, second) = t
        .json("POST", "/conversation", Some(b_uid.as_str()), json!({ "idUser1": b, "idUser2": a }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["success"], true);
    assert_eq!(second["id"], id);

    let (_, all) = t.call("GET", "/conversation", Some(a_uid.as_str())).await;
    assert_eq!(all["record"].as_array().unwrap().len(), 1);

    let (_, mine) = t.call("GET", "/conversation/mine", Some(a_uid.as_str())).await;
    assert_eq!(mine["record"][0]["peerId"], b);
    assert_eq!(mine["record"][0]["idUser1"], a);

    // outsiders cannot open a conversation on behalf of others
    let (status, _) = t
        .json("POST", "/conversation", Some(c_uid.as_str()), json!({ "idUser1": a, "idUser2": b }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t
        .json("POST", "/conversation", Some(a_uid.as_str()), json!({ "idUser1": a, "idUser2": a }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_a_conversation_removes_its_messages() {
    let t = test_app().await;
    let (a, a_uid) = t.register("a@x.com").await;
    let (b, b_uid) = t.register("b@x.com").await;
    let (_c, c_uid) = t.register("c@x.com").await;

    let (_, created) = t
        .json("POST", "/conversation", Some(a_uid.as_str()), json!({ "idUser1": a, "idUser2": b }))
        .await;
    let id = created["id"].as_i64().unwrap();
    let messages_uri = format!("/conversation/{id}/messages");

    let (status, _) = t.json("POST", &messages_uri, Some(a_uid.as_str()), json!({ "content": "Bonjour" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = t.json("POST", &messages_uri, Some(b_uid.as_str()), json!({ "content": "Salut" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = t.json("POST", &messages_uri, Some(c_uid.as_str()), json!({ "content": "Hé" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // b wrote last, so b re-reading the thread leaves it unseen for a
    let (status, listed) = t.call("GET", &messages_uri, Some(b_uid.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["record"][1]["content"], "Salut");
    let (_, mine) = t.call("GET", "/conversation/mine", Some(a_uid.as_str())).await;
    assert_eq!(mine["record"][0]["seen"], false);

    let (status, _) = t.call("GET", &messages_uri, Some(a_uid.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    let (_, mine) = t.call("GET", "/conversation/mine", Some(a_uid.as_str())).await;
    assert_eq!(mine["record"][0]["seen"], true);

    let (status, _) = t.call("DELETE", &format!("/conversation/{id}"), Some(c_uid.as_str())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(t.state.db.count_messages(id).unwrap(), 2);

    let (status, body) = t.call("DELETE", &format!("/conversation/{id}"), Some(a_uid.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messagesDeleted"], 2);
    assert_eq!(t.state.db.count_messages(id).unwrap(), 0);

    let (status, _) = t.call("DELETE", &format!("/conversation/{id}"), Some(a_uid.as_str())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn feed_pages_are_disjoint_and_contiguous() {
    let t = test_app().await;
    let (_, uid) = t.register("a@x.com").await;

    let mut ids = Vec::new();
    for i in 0..12 {
        let (status, body) = t.create_post(&uid, &format!("post {i}"), &[]).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["record"]["title"], format!("post {i}"));
        assert_eq!(body["record"]["cityName"], "Lyon");
        ids.push(body["record"]["id"].as_i64().unwrap());
    }

    let (_, first) = t.call("GET", "/post?amont=5&saut=0", None).await;
    let (_, second) = t.call("GET", "/post?amont=5&saut=5", None).await;
    let page_ids = |page: &Value| -> Vec<i64> {
        page["posts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_i64().unwrap())
            .collect()
    };
    let mut got = page_ids(&first);
    got.extend(page_ids(&second));
    assert_eq!(got, ids[..10]);

    // default page size
    let (_, default_page) = t.call("GET", "/post", None).await;
    assert_eq!(default_page["posts"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn only_owner_or_admin_may_mutate_a_post() {
    let t = test_app().await;
    let (_, owner_uid) = t.register("owner@x.com").await;
    let (_, other_uid) = t.register("other@x.com").await;
    let (admin, admin_uid) = t.register("admin@x.com").await;
    t.state.db.set_admin(admin, true).unwrap();

    let (_, created) = t.create_post(&owner_uid, "Monstera", &[]).await;
    let id = created["record"]["id"].as_i64().unwrap();

    let (status, body) = t.call("DELETE", &format!("/post/{id}"), Some(other_uid.as_str())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["msg"], "Droits requis");
    let (status, _) = t.call("PATCH", &format!("/post/{id}/visibility"), Some(other_uid.as_str())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(!t.state.db.get_post(id).unwrap().unwrap().state);

    let (status, body) = t.call("PATCH", &format!("/post/{id}/visibility"), Some(owner_uid.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], true);
    let (_, feed) = t.call("GET", "/post", None).await;
    assert!(feed["posts"].as_array().unwrap().is_empty());

    let (status, _) = t.call("DELETE", &format!("/post/{id}"), Some(admin_uid.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(t.state.db.get_post(id).unwrap().is_none());
}

#[tokio::test]
async fn accepting_a_post() {
    let t = test_app().await;
    let (_, owner_uid) = t.register("owner@x.com").await;
    let (taker, taker_uid) = t.register("taker@x.com").await;

    let (_, created) = t.create_post(&owner_uid, "Aloe", &[]).await;
    let uri = format!("/post/{}/accept", created["record"]["id"]);

    let (status, _) = t.call("PATCH", &uri, Some(owner_uid.as_str())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = t.call("PATCH", &uri, Some(taker_uid.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["record"]["accepted"], true);
    assert_eq!(body["record"]["acceptedBy"], taker);

    let (status, _) = t.call("PATCH", &uri, Some(taker_uid.as_str())).await;
    assert_eq!(status, StatusCode::EXPECTATION_FAILED);
}

#[tokio::test]
async fn post_images_are_stored_served_and_removed() {
    let t = test_app().await;
    let (owner, uid) = t.register("a@x.com").await;

    let (status, body) = t.create_post(&uid, "Pothos", &[b"first", b"second"]).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["record"]["id"].as_i64().unwrap();
    assert_eq!(
        body["record"]["image1"],
        format!("http://localhost:3000/media/posts/{id}_0.jpg")
    );
    assert_eq!(
        body["record"]["image2"],
        format!("http://localhost:3000/media/posts/{id}_1.jpg")
    );
    assert_eq!(body["record"]["image3"], "");
    assert_eq!(body["record"]["userId"], owner);

    let resp = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/media/posts/{id}_1.jpg"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"second");

    let (status, _) = t.call("DELETE", &format!("/post/{id}"), Some(uid.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!t.dir.join(format!("media/posts/{id}_0.jpg")).exists());
    assert!(!t.dir.join(format!("media/posts/{id}_1.jpg")).exists());
}

#[tokio::test]
async fn more_than_three_images_is_rejected_without_a_row() {
    let t = test_app().await;
    let (owner, uid) = t.register("a@x.com").await;

    let (status, body) = t.create_post(&uid, "Trop", &[b"1", b"2", b"3", b"4"]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(t.state.db.list_posts_by_user(owner).unwrap().is_empty());
}

#[tokio::test]
async fn failed_image_upload_rolls_the_post_back() {
    let t = test_app().await;
    let (owner, uid) = t.register("a@x.com").await;

    // a plain file where the posts directory belongs makes every put fail
    std::fs::write(t.dir.join("media/posts"), b"in the way").unwrap();

    let (status, body) = t.create_post(&uid, "Monstera", &[b"leaf"]).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["msg"], "Création post échouée");
    assert!(t.state.db.list_posts_by_user(owner).unwrap().is_empty());
}

#[tokio::test]
async fn malformed_requests_get_the_failure_envelope() {
    let t = test_app().await;
    let (_, uid) = t.register("a@x.com").await;

    let (status, body) = t.json("POST", "/user", None, json!({ "email": "z@x.com" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["msg"].as_str().unwrap().contains("password"), "{body}");

    let (status, body) = t.call("GET", "/user/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = t.call("GET", "/post?amont=-1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let req = Request::builder()
        .method("POST")
        .uri("/conversation")
        .header(header::AUTHORIZATION, uid.as_str())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = t.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let req = Request::builder()
        .method("POST")
        .uri("/post")
        .header(header::AUTHORIZATION, uid.as_str())
        .body(Body::empty())
        .unwrap();
    let (status, body) = t.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn species_lookup_without_key_fails_cleanly() {
    let t = test_app().await;

    let (status, body) = t.call("GET", "/species", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["msg"], "Recherche d'espèces échouée");
}
