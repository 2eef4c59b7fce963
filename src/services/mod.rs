pub mod ai;
pub mod ai_service;
pub mod analytics_service;
pub mod folder_service;
pub mod pipeline_service;
pub mod profile_service;
pub mod script_service;
pub mod script_store;
pub mod video_service;
pub mod youtube_service;
