pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
    Router,
};

use crate::generation::handlers as generation;
use crate::state::AppState;
use crate::timeline::handlers as timeline;
use crate::workspace::handlers as workspace;

const MAX_VISUAL_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let episode = "/api/v1/projects/:project_id/episodes/:episode_id";

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/sync/status", get(health::sync_status_handler))
        // Projects
        .route(
            "/api/v1/projects",
            get(workspace::handle_list_projects).post(workspace::handle_create_project),
        )
        .route(
            "/api/v1/projects/:project_id",
            get(workspace::handle_get_project)
                .patch(workspace::handle_update_project)
                .delete(workspace::handle_delete_project),
        )
        // Episodes
        .route(
            "/api/v1/projects/:project_id/episodes",
            post(workspace::handle_add_episode),
        )
        .route(
            "/api/v1/projects/:project_id/episodes/move",
            post(workspace::handle_move_episode),
        )
        .route(
            episode,
            patch(workspace::handle_update_episode).delete(workspace::handle_remove_episode),
        )
        .route(
            &format!("{episode}/text-shots"),
            put(workspace::handle_replace_text_shots),
        )
        // Entities
        .route(
            "/api/v1/projects/:project_id/entities",
            get(workspace::handle_list_entities).post(workspace::handle_create_entity),
        )
        .route(
            "/api/v1/projects/:project_id/entities/:entity_id",
            patch(workspace::handle_update_entity).delete(workspace::handle_delete_entity),
        )
        // Timeline
        .route(
            &format!("{episode}/timeline"),
            get(timeline::handle_get_timeline),
        )
        .route(
            &format!("{episode}/shots"),
            post(timeline::handle_append_shot),
        )
        .route(
            &format!("{episode}/shots/insert-after"),
            post(timeline::handle_insert_after),
        )
        .route(
            &format!("{episode}/shots/swap"),
            post(timeline::handle_swap_shots),
        )
        .route(
            &format!("{episode}/shots/reorder"),
            post(timeline::handle_reorder_shots),
        )
        .route(
            &format!("{episode}/shots/:shot_id"),
            patch(timeline::handle_update_shot).delete(timeline::handle_remove_shot),
        )
        .route(
            &format!("{episode}/shots/:shot_id/visuals"),
            post(timeline::handle_upload_visual)
                .layer(DefaultBodyLimit::max(MAX_VISUAL_UPLOAD_BYTES)),
        )
        .route(
            &format!("{episode}/shots/:shot_id/visuals/:history_id/select"),
            post(timeline::handle_select_visual),
        )
        .route(
            &format!("{episode}/segments/resize"),
            post(timeline::handle_resize_segment),
        )
        .route(
            &format!("{episode}/segments/break"),
            post(timeline::handle_insert_break),
        )
        // Generation
        .route(
            &format!("{episode}/storyboard"),
            post(generation::handle_generate_storyboard),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::models::entity::{Entity, EntityType};
    use crate::models::project::{Episode, Project, TextShot};
    use crate::models::shot::VisualType;
    use crate::sync::PROJECTS;
    use crate::testing::{test_state, CannedGenerator, MemoryAssetStore};
    use crate::timeline::registry::EntityRegistry;

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// One character, one environment and an episode with a single
    /// script breakdown row.
    async fn seeded(state: &AppState) -> (String, String) {
        let mut project = Project::new("云隐仙途");
        project.entities = EntityRegistry::from(vec![
            Entity {
                id: "c1".into(),
                entity_type: EntityType::Character,
                name: "林青羽".into(),
                avatar: "https://cdn/lin.png".into(),
                voice: None,
                description: String::new(),
            },
            Entity {
                id: "e1".into(),
                entity_type: EntityType::Environment,
                name: "云隐峰".into(),
                avatar: String::new(),
                voice: None,
                description: String::new(),
            },
        ]);
        let mut episode = Episode::new("第一集：凡人问天", "");
        episode.text_shots = vec![TextShot {
            id: "t1".into(),
            dialogue: "林青羽：我要修仙！".into(),
            ..Default::default()
        }];
        let episode_id = project.add_episode(episode).id.clone();
        let project_id = project.id.clone();
        state.workspace.lock().await.insert(project);
        (project_id, episode_id)
    }

    fn app_with(generator: CannedGenerator) -> (Router, AppState) {
        let (state, _) = test_state(MemoryAssetStore::default(), generator);
        (build_router(state.clone()), state)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app_with(CannedGenerator(None));
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_project_and_queue_write() {
        let (state, store) = test_state(MemoryAssetStore::default(), CannedGenerator(None));
        let app = build_router(state.clone());

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/projects",
            Some(json!({"title": "霓虹之夜"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_str().unwrap().to_string();

        let mut rx = state.sync.watch();
        rx.wait_for(|s| s.completed >= 1).await.unwrap();
        assert_eq!(store.get(PROJECTS, &id).unwrap()["title"], "霓虹之夜");

        let (status, body) = send(&app, Method::GET, "/api/v1/projects", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_project_title_rejected() {
        let (app, _) = app_with(CannedGenerator(None));
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/projects",
            Some(json!({"title": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_project_is_404() {
        let (app, _) = app_with(CannedGenerator(None));
        let (status, body) = send(&app, Method::GET, "/api/v1/projects/p_nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_shot_editing_flow_keeps_sequence_contiguous() {
        let (app, state) = app_with(CannedGenerator(None));
        let (project_id, episode_id) = seeded(&state).await;
        let base = format!("/api/v1/projects/{project_id}/episodes/{episode_id}");

        for env in ["e1", "e1", "e2"] {
            send(
                &app,
                Method::POST,
                &format!("{base}/shots"),
                Some(json!({"environment_id": env, "character_id": "c1"})),
            )
            .await;
        }

        let (status, view) = send(
            &app,
            Method::POST,
            &format!("{base}/shots/insert-after"),
            Some(json!({"index": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let shots = view["shots"].as_array().unwrap();
        let sequences: Vec<u64> = shots.iter().map(|s| s["sequence"].as_u64().unwrap()).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4]);
        assert_eq!(shots[1]["environment_id"], "e1");
        assert_eq!(shots[1]["character"]["name"], "林青羽");

        let doomed = shots[0]["id"].as_str().unwrap().to_string();
        let (_, view) = send(&app, Method::DELETE, &format!("{base}/shots/{doomed}"), None).await;
        let sequences: Vec<u64> = view["shots"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["sequence"].as_u64().unwrap())
            .collect();
        assert_eq!(sequences, vec![1, 2, 3]);

        let (status, _) = send(&app, Method::DELETE, &format!("{base}/shots/{doomed}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_segments_and_unknown_entity_placeholder() {
        let (app, state) = app_with(CannedGenerator(None));
        let (project_id, episode_id) = seeded(&state).await;
        let base = format!("/api/v1/projects/{project_id}/episodes/{episode_id}");
        for env in ["e1", "e1", "e9"] {
            send(
                &app,
                Method::POST,
                &format!("{base}/shots"),
                Some(json!({"environment_id": env})),
            )
            .await;
        }

        let (_, view) = send(&app, Method::GET, &format!("{base}/timeline"), None).await;
        let segments = view["segments"].as_array().unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0]["count"], 2);
        assert_eq!(segments[0]["environment"]["name"], "云隐峰");
        assert_eq!(segments[1]["environment"]["known"], false);

        let (status, view) = send(
            &app,
            Method::POST,
            &format!("{base}/segments/resize"),
            Some(json!({
                "segment": {"environment_id": "e1", "start_index": 0, "count": 2},
                "edge": "right",
                "action": "expand"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let segments = view["segments"].as_array().unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0]["count"], 3);
    }

    #[tokio::test]
    async fn test_noop_edit_does_not_touch_project() {
        let (app, state) = app_with(CannedGenerator(None));
        let (project_id, episode_id) = seeded(&state).await;
        let before = state.snapshot(&project_id).await.unwrap().last_modified;

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/v1/projects/{project_id}/episodes/{episode_id}/shots/swap"),
            Some(json!({"i": 0, "j": 5})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.snapshot(&project_id).await.unwrap().last_modified, before);
        assert!(!state.sync.has_local_writes(PROJECTS, &project_id));
    }

    #[tokio::test]
    async fn test_generate_storyboard_imports_shots() {
        let payload = json!({
            "newEntities": [
                {"type": "character", "name": "林青羽"},
                {"type": "environment", "name": "紫霄大殿", "description": "金碧辉煌"},
                {"type": "prop", "name": "飞剑"}
            ],
            "visualShots": [{
                "characterId": "林青羽",
                "environmentId": "紫霄大殿",
                "angle": "全景",
                "imagePrompt": "宏伟大殿",
                "videoPrompt": "镜头推进"
            }]
        });
        let (app, state) = app_with(CannedGenerator(Some(payload)));
        let (project_id, episode_id) = seeded(&state).await;

        let (status, report) = send(
            &app,
            Method::POST,
            &format!("/api/v1/projects/{project_id}/episodes/{episode_id}/storyboard"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["shot_count"], 1);
        assert_eq!(report["created_entities"].as_array().unwrap().len(), 1);
        assert_eq!(report["quarantined"].as_array().unwrap().len(), 1);

        let project = state.snapshot(&project_id).await.unwrap();
        let episode = project.episode(&episode_id).unwrap();
        assert!(episode.has_storyboard);
        let shot = &episode.visual_shots.shots()[0];
        assert_eq!(shot.character_id.as_deref(), Some("c1"));
        assert_eq!(shot.dialogue, "林青羽：我要修仙！");
    }

    #[tokio::test]
    async fn test_generator_failure_leaves_project_unchanged() {
        let (app, state) = app_with(CannedGenerator(None));
        let (project_id, episode_id) = seeded(&state).await;
        let before = state.snapshot(&project_id).await.unwrap().last_modified;

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/v1/projects/{project_id}/episodes/{episode_id}/storyboard"),
            Some(json!({"style": "水墨"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "GENERATION_ERROR");
        let project = state.snapshot(&project_id).await.unwrap();
        assert_eq!(project.last_modified, before);
        assert!(!project.episode(&episode_id).unwrap().has_storyboard);
    }

    async fn upload(app: &Router, uri: &str, content_type: &str) -> StatusCode {
        let body = format!(
            "--XBOUNDARY\r\nContent-Disposition: form-data; name=\"file\"; filename=\"upload\"\r\nContent-Type: {content_type}\r\n\r\nbinary-bytes\r\n--XBOUNDARY--\r\n"
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
            .body(Body::from(body))
            .unwrap();
        app.clone().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_upload_visual_then_select_previous() {
        let (app, state) = app_with(CannedGenerator(None));
        let (project_id, episode_id) = seeded(&state).await;
        let base = format!("/api/v1/projects/{project_id}/episodes/{episode_id}");
        let (_, view) = send(&app, Method::POST, &format!("{base}/shots"), None).await;
        let shot_id = view["shots"][0]["id"].as_str().unwrap().to_string();
        let visuals = format!("{base}/shots/{shot_id}/visuals");

        assert_eq!(upload(&app, &visuals, "video/mp4").await, StatusCode::OK);
        assert_eq!(upload(&app, &visuals, "image/png").await, StatusCode::OK);

        let project = state.snapshot(&project_id).await.unwrap();
        let shot = project.episode(&episode_id).unwrap().visual_shots.get(&shot_id).unwrap().clone();
        assert_eq!(shot.history.len(), 2);
        assert_eq!(shot.current_visual_type, VisualType::Image);
        assert_eq!(shot.history[0].url, shot.current_visual);
        assert!(shot.history[1]
            .url
            .starts_with(&format!("memory://projects/{project_id}/shots/{shot_id}_")));

        let earlier = shot.history[1].clone();
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("{visuals}/{}/select", earlier.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let project = state.snapshot(&project_id).await.unwrap();
        let shot = project.episode(&episode_id).unwrap().visual_shots.get(&shot_id).unwrap();
        assert_eq!(shot.current_visual, earlier.url);
        assert_eq!(shot.current_visual_type, VisualType::Video);
        assert_eq!(shot.history.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_upload_changes_nothing() {
        let assets = MemoryAssetStore {
            fail: true,
            ..Default::default()
        };
        let (state, _) = test_state(assets, CannedGenerator(None));
        let app = build_router(state.clone());
        let (project_id, episode_id) = seeded(&state).await;
        let base = format!("/api/v1/projects/{project_id}/episodes/{episode_id}");
        let (_, view) = send(&app, Method::POST, &format!("{base}/shots"), None).await;
        let shot_id = view["shots"][0]["id"].as_str().unwrap().to_string();

        let status = upload(&app, &format!("{base}/shots/{shot_id}/visuals"), "image/png").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let project = state.snapshot(&project_id).await.unwrap();
        let shot = project.episode(&episode_id).unwrap().visual_shots.get(&shot_id).unwrap();
        assert!(shot.history.is_empty());
        assert_eq!(shot.current_visual, "");
    }

    #[tokio::test]
    async fn test_deleted_entity_renders_as_unknown() {
        let (app, state) = app_with(CannedGenerator(None));
        let (project_id, episode_id) = seeded(&state).await;
        let base = format!("/api/v1/projects/{project_id}/episodes/{episode_id}");
        send(
            &app,
            Method::POST,
            &format!("{base}/shots"),
            Some(json!({"character_id": "c1"})),
        )
        .await;

        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/v1/projects/{project_id}/entities/c1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, view) = send(&app, Method::GET, &format!("{base}/timeline"), None).await;
        assert_eq!(view["shots"][0]["character_id"], "c1");
        assert_eq!(view["shots"][0]["character"]["known"], false);
    }

    #[tokio::test]
    async fn test_episode_lifecycle() {
        let (app, state) = app_with(CannedGenerator(None));
        let (project_id, first) = seeded(&state).await;
        let (status, second) = send(
            &app,
            Method::POST,
            &format!("/api/v1/projects/{project_id}/episodes"),
            Some(json!({"title": "第二集"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(second["sequence"], 2);

        let (_, project) = send(
            &app,
            Method::POST,
            &format!("/api/v1/projects/{project_id}/episodes/move"),
            Some(json!({"from": 1, "to": 0})),
        )
        .await;
        assert_eq!(project["episodes"][0]["id"], second["id"]);
        assert_eq!(project["episodes"][1]["sequence"], 2);

        let (_, project) = send(
            &app,
            Method::DELETE,
            &format!("/api/v1/projects/{project_id}/episodes/{first}"),
            None,
        )
        .await;
        assert_eq!(project["episodes"].as_array().unwrap().len(), 1);
        assert_eq!(project["episodes"][0]["sequence"], 1);
    }
}
