pub mod analytics_api;
pub mod auth_api;
pub mod folders_api;
pub mod generation_api;
pub mod pipeline_api;
pub mod scripts_api;
pub mod styles_api;
pub mod users_api;
pub mod videos_api;

use crate::AppState;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

pub fn routes(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .route("/auth/me", get(auth_api::me))
        // Scripts
        .route(
            "/scripts",
            get(scripts_api::list_scripts).post(scripts_api::create_script),
        )
        .route(
            "/scripts/:id",
            get(scripts_api::get_script)
                .put(scripts_api::update_script)
                .delete(scripts_api::delete_script),
        )
        .route("/scripts/:id/move", post(scripts_api::move_script))
        .route("/scripts/:id/video", put(videos_api::set_video_link))
        // Pipeline
        .route("/work", get(pipeline_api::work_board))
        .route("/scripts/:id/send-to-work", post(pipeline_api::send_to_work))
        .route("/scripts/:id/claim-content", post(pipeline_api::claim_content))
        .route(
            "/scripts/:id/complete-content",
            post(pipeline_api::complete_content),
        )
        .route("/scripts/:id/claim-edit", post(pipeline_api::claim_edit))
        .route("/scripts/:id/complete-edit", post(pipeline_api::complete_edit))
        .route("/scripts/:id/publish", post(pipeline_api::publish))
        // Folders
        .route(
            "/folders",
            get(folders_api::list_folders).post(folders_api::create_folder),
        )
        .route(
            "/folders/:id",
            put(folders_api::rename_folder).delete(folders_api::delete_folder),
        )
        // Styles
        .route(
            "/styles/rewrite",
            get(styles_api::list_rewrite_styles).post(styles_api::create_rewrite_style),
        )
        .route(
            "/styles/rewrite/:id",
            put(styles_api::update_rewrite_style).delete(styles_api::delete_rewrite_style),
        )
        .route(
            "/styles/keyword",
            get(styles_api::list_keyword_styles).post(styles_api::create_keyword_style),
        )
        .route(
            "/styles/keyword/:id",
            put(styles_api::update_keyword_style).delete(styles_api::delete_keyword_style),
        )
        // Profiles
        .route(
            "/users",
            get(users_api::list_users).post(users_api::create_user),
        )
        .route("/users/:id/role", put(users_api::change_role))
        .route("/profile", put(users_api::update_profile))
        .route(
            "/settings",
            get(users_api::get_settings).put(users_api::update_settings),
        )
        // Generation
        .route("/generate/details", post(generation_api::generate_details))
        .route("/generate/rewrite", post(generation_api::rewrite))
        .route("/generate/outline", post(generation_api::outline))
        .route(
            "/generate/script-from-outline",
            post(generation_api::script_from_outline),
        )
        .route("/generate/keywords", post(generation_api::split_keywords))
        .route("/generate/pacing", post(generation_api::analyze_pacing))
        // Analytics
        .route("/analytics/employees", get(analytics_api::employees))
        .route("/analytics/overview", get(analytics_api::overview))
        .route("/analytics/videos", get(analytics_api::videos))
        .route(
            "/analytics/videos/refresh",
            post(analytics_api::refresh_videos),
        )
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::auth::middleware::auth_middleware,
        ));

    Router::new()
        // Public auth endpoints
        .route("/auth/login", post(auth_api::login))
        .route("/auth/logout", post(auth_api::logout))
        .merge(protected_routes)
}
