use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{Role, Script, User, VideoMetricsChanges};
use crate::pipeline::{Actor, PipelineStatus};
use crate::services::analytics_service::PeriodFilter;
use crate::services::script_store;
use crate::services::youtube_service::{parse_video_id, YoutubeService};

const LEADS: &[Role] = &[Role::Admin, Role::Manager];

/// The actor's own YouTube key, else the first admin's.
pub fn resolve_youtube_key(conn: &mut SqliteConnection, user: &User) -> AppResult<String> {
    use crate::schema::users;

    if let Some(key) = user.youtube_api_key.as_deref().filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }

    let keys: Vec<Option<String>> = users::table
        .filter(users::role.eq(Role::Admin.as_str()))
        .order(users::id.asc())
        .select(users::youtube_api_key)
        .load(conn)?;

    keys.into_iter()
        .flatten()
        .find(|k| !k.is_empty())
        .ok_or_else(|| AppError::Validation("YouTube API key is not configured.".into()))
}

/// Links, relinks or unlinks a video. Unlinking wipes every cached metric.
/// No pooled connection is held while the statistics request is in flight.
pub async fn set_video_link(
    pool: &DbPool,
    youtube: &YoutubeService,
    user: &User,
    script_id: i32,
    link: Option<&str>,
) -> AppResult<Script> {
    Actor::from(user).require_any_role(LEADS, "link videos")?;

    let link = link.map(str::trim).filter(|l| !l.is_empty());
    let (link, video_id, api_key) = {
        let mut conn = pool.get()?;
        script_store::get_script(&mut conn, script_id)?;

        let Some(link) = link else {
            tracing::info!("User {} cleared video link on script {}", user.id, script_id);
            return script_store::update_video_metrics(
                &mut conn,
                script_id,
                &VideoMetricsChanges::default(),
            );
        };
        let video_id = parse_video_id(link)
            .ok_or_else(|| AppError::Validation(format!("Invalid YouTube URL: {}", link)))?;
        (link, video_id, resolve_youtube_key(&mut conn, user)?)
    };

    let stats = youtube
        .fetch_stats(&video_id, &api_key)
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let changes = stats.into_changes(link, Utc::now().naive_utc());
    let mut conn = pool.get()?;
    let script = script_store::update_video_metrics(&mut conn, script_id, &changes)?;
    tracing::info!("User {} linked video {} to script {}", user.id, video_id, script_id);
    Ok(script)
}

fn refresh_candidates(
    conn: &mut SqliteConnection,
    period: &PeriodFilter,
) -> AppResult<Vec<(i32, String, String)>> {
    use crate::schema::scripts;

    let rows: Vec<(i32, Option<String>, Option<NaiveDateTime>)> = scripts::table
        .filter(scripts::status.eq(PipelineStatus::Published.as_str()))
        .filter(scripts::youtube_link.is_not_null())
        .select((scripts::id, scripts::youtube_link, scripts::published_at))
        .load(conn)?;

    Ok(rows
        .into_iter()
        .filter(|(_, _, published_at)| period.contains(*published_at))
        .filter_map(|(id, link, _)| {
            let link = link?;
            let video_id = parse_video_id(&link)?;
            Some((id, link, video_id))
        })
        .collect())
}

/// Refetches stats for every published, linked script in the period. Returns
/// how many scripts were updated. The connection is released during the
/// batch fetch.
pub async fn refresh_published_stats(
    pool: &DbPool,
    youtube: &YoutubeService,
    user: &User,
    period: &PeriodFilter,
) -> AppResult<usize> {
    Actor::from(user).require_any_role(&[Role::Admin], "refresh video stats")?;

    let (candidates, api_key) = {
        let mut conn = pool.get()?;
        let candidates = refresh_candidates(&mut conn, period)?;
        if candidates.is_empty() {
            return Ok(0);
        }
        let api_key = resolve_youtube_key(&mut conn, user)?;
        (candidates, api_key)
    };

    let mut ids: Vec<String> = candidates.iter().map(|(_, _, vid)| vid.clone()).collect();
    ids.sort();
    ids.dedup();
    let stats = youtube.fetch_stats_in_batch(&ids, &api_key).await;

    let fetched_at = Utc::now().naive_utc();
    let mut conn = pool.get()?;
    let mut updated = 0;
    for (script_id, link, video_id) in candidates {
        if let Some(item) = stats.get(&video_id) {
            let changes = item.clone().into_changes(&link, fetched_at);
            script_store::update_video_metrics(&mut conn, script_id, &changes)?;
            updated += 1;
        }
    }

    tracing::info!("Refreshed video stats for {} scripts", updated);
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::YoutubeConfig;
    use crate::schema::users;
    use crate::test_support::{insert_script, insert_user, TestDb};

    fn youtube() -> YoutubeService {
        YoutubeService::new(&YoutubeConfig::default()).unwrap()
    }

    /// Serves one canned Data API response. Before answering it checks out a
    /// connection from `pool`, which only succeeds if the caller released its
    /// own while waiting on the request.
    async fn stats_server(pool: DbPool, body: &'static str) -> (String, tokio::task::JoinHandle<bool>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let pool_free = tokio::task::spawn_blocking(move || {
                pool.get_timeout(std::time::Duration::from_millis(500)).is_ok()
            })
            .await
            .unwrap();

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            pool_free
        });
        (format!("http://{}/youtube/v3/videos", addr), handle)
    }

    #[test]
    fn test_youtube_key_falls_back_to_admin() {
        let db = TestDb::new();
        let mut conn = db.conn();
        let admin = insert_user(&mut conn, "admin", Some(Role::Admin));
        let manager = insert_user(&mut conn, "manager", Some(Role::Manager));

        let err = resolve_youtube_key(&mut conn, &manager).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        diesel::update(users::table.find(admin.id))
            .set(users::youtube_api_key.eq("workspace-key"))
            .execute(&mut conn)
            .unwrap();
        assert_eq!(resolve_youtube_key(&mut conn, &manager).unwrap(), "workspace-key");
    }

    #[tokio::test]
    async fn test_clearing_link_wipes_metrics() {
        let db = TestDb::new();
        let mut conn = db.conn();
        let manager = insert_user(&mut conn, "manager", Some(Role::Manager));
        let script = insert_script(&mut conn, &manager, "Linked");
        script_store::update_video_metrics(
            &mut conn,
            script.id,
            &VideoMetricsChanges {
                youtube_link: Some("https://youtu.be/aaaaaaaaaaa".into()),
                youtube_views: Some(99),
                ..Default::default()
            },
        )
        .unwrap();

        let cleared = set_video_link(&db.pool, &youtube(), &manager, script.id, Some("  "))
            .await
            .unwrap();
        assert_eq!(cleared.youtube_link, None);
        assert_eq!(cleared.youtube_views, None);
        assert_eq!(cleared.status, script.status);
    }

    #[tokio::test]
    async fn test_set_link_rejects_bad_urls_and_roles() {
        let db = TestDb::new();
        let mut conn = db.conn();
        let manager = insert_user(&mut conn, "manager", Some(Role::Manager));
        let editor = insert_user(&mut conn, "editor", Some(Role::Editor));
        let script = insert_script(&mut conn, &manager, "Linked");

        let err = set_video_link(&db.pool, &youtube(), &manager, script.id, Some("https://vimeo.com/1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = set_video_link(&db.pool, &youtube(), &editor, script.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_refresh_with_nothing_published_is_a_no_op() {
        let db = TestDb::new();
        let mut conn = db.conn();
        let admin = insert_user(&mut conn, "admin", Some(Role::Admin));
        let manager = insert_user(&mut conn, "manager", Some(Role::Manager));
        insert_script(&mut conn, &admin, "Draft");

        let updated = refresh_published_stats(&db.pool, &youtube(), &admin, &PeriodFilter::all())
            .await
            .unwrap();
        assert_eq!(updated, 0);

        let err = refresh_published_stats(&db.pool, &youtube(), &manager, &PeriodFilter::all())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_link_fetch_does_not_hold_a_pooled_connection() {
        let db = TestDb::with_pool_size(1);
        let (manager, script) = {
            let mut conn = db.conn();
            let admin = insert_user(&mut conn, "admin", Some(Role::Admin));
            diesel::update(users::table.find(admin.id))
                .set(users::youtube_api_key.eq("workspace-key"))
                .execute(&mut conn)
                .unwrap();
            let manager = insert_user(&mut conn, "manager", Some(Role::Manager));
            let script = insert_script(&mut conn, &manager, "Linked");
            (manager, script)
        };

        let body = r#"{"items": [{
            "id": "dQw4w9WgXcQ",
            "statistics": { "viewCount": "42", "likeCount": "3", "commentCount": "1" },
            "snippet": { "title": "Clip", "thumbnails": {} }
        }]}"#;
        let (endpoint, server) = stats_server(db.pool.clone(), body).await;
        let youtube = YoutubeService::new(&YoutubeConfig {
            api_endpoint: endpoint,
            batch_size: 50,
        })
        .unwrap();

        let linked = set_video_link(
            &db.pool,
            &youtube,
            &manager,
            script.id,
            Some("https://www.youtube.com/shorts/dQw4w9WgXcQ"),
        )
        .await
        .unwrap();

        assert!(server.await.unwrap(), "connection was held across the fetch");
        assert_eq!(linked.youtube_views, Some(42));
        assert_eq!(linked.youtube_title.as_deref(), Some("Clip"));
        assert!(linked.youtube_stats_last_updated.is_some());
    }
}
