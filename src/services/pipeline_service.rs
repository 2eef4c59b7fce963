use chrono::{Datelike, Utc};
use diesel::sqlite::SqliteConnection;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::models::Script;
use crate::pipeline::{
    available_transitions, check_transition, Actor, PipelineSnapshot, PipelineStatus, Transition,
};
use crate::services::script_store::{self, CasOutcome, ScriptListFilter};

/// Validates and commits one transition. The row is read to decide the
/// outcome and then written with a conditional update that re-checks the
/// expected state, so a concurrent winner turns the loser into an
/// `IllegalTransition` instead of a silent overwrite.
pub fn apply_transition(
    conn: &mut SqliteConnection,
    script_id: i32,
    transition: Transition,
    actor: &Actor,
) -> AppResult<Script> {
    let current = script_store::get_script(conn, script_id)?;
    let snapshot = PipelineSnapshot::from(&current);

    if let Err(e) = check_transition(transition, actor, &snapshot) {
        tracing::warn!(
            "Rejected {} on script {} by user {}: {}",
            transition,
            script_id,
            actor.id,
            e
        );
        return Err(e);
    }

    let now = Utc::now().naive_utc();
    let patch = transition.patch(actor, &snapshot, now);

    match script_store::conditional_update(
        conn,
        script_id,
        &transition.expected_state(actor),
        &patch,
    )? {
        CasOutcome::Updated(script) => {
            tracing::info!(
                "Script {} moved to {} by user {} ({})",
                script_id,
                transition.target_status(),
                actor.id,
                transition
            );
            Ok(script)
        }
        CasOutcome::Conflict => {
            tracing::warn!(
                "Lost race applying {} to script {} for user {}",
                transition,
                script_id,
                actor.id
            );
            Err(AppError::IllegalTransition(format!(
                "script {} was changed by someone else and can no longer {}",
                script_id,
                transition.as_str().replace('_', " ")
            )))
        }
        CasOutcome::NotFound => Err(AppError::not_found("Script", script_id)),
    }
}

pub fn send_to_work(conn: &mut SqliteConnection, script_id: i32, actor: &Actor) -> AppResult<Script> {
    apply_transition(conn, script_id, Transition::SendToWork, actor)
}

pub fn claim_content(conn: &mut SqliteConnection, script_id: i32, actor: &Actor) -> AppResult<Script> {
    apply_transition(conn, script_id, Transition::ClaimContent, actor)
}

pub fn complete_content(
    conn: &mut SqliteConnection,
    script_id: i32,
    actor: &Actor,
) -> AppResult<Script> {
    apply_transition(conn, script_id, Transition::CompleteContent, actor)
}

pub fn claim_edit(conn: &mut SqliteConnection, script_id: i32, actor: &Actor) -> AppResult<Script> {
    apply_transition(conn, script_id, Transition::ClaimEdit, actor)
}

pub fn complete_edit(conn: &mut SqliteConnection, script_id: i32, actor: &Actor) -> AppResult<Script> {
    apply_transition(conn, script_id, Transition::CompleteEdit, actor)
}

pub fn publish(conn: &mut SqliteConnection, script_id: i32, actor: &Actor) -> AppResult<Script> {
    apply_transition(conn, script_id, Transition::Publish, actor)
}

// Work board

#[derive(Debug, Default, Clone)]
pub struct BoardFilter {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WorkCard {
    pub script: Script,
    /// What the requesting actor may do with this card right now.
    pub actions: Vec<Transition>,
}

#[derive(Debug, Serialize)]
pub struct WorkColumn {
    pub status: PipelineStatus,
    pub cards: Vec<WorkCard>,
}

#[derive(Debug, Serialize)]
pub struct WorkBoard {
    pub columns: Vec<WorkColumn>,
}

/// Groups pipeline scripts into one column per status. Scripts are filtered
/// by creation year/month.
pub fn build_board(scripts: Vec<Script>, filter: &BoardFilter, actor: &Actor) -> WorkBoard {
    let mut columns: Vec<WorkColumn> = PipelineStatus::ALL
        .into_iter()
        .map(|status| WorkColumn {
            status,
            cards: Vec::new(),
        })
        .collect();

    for script in scripts {
        let Some(status) = script.pipeline_status() else {
            continue;
        };
        if filter.year.is_some_and(|y| script.created_at.year() != y) {
            continue;
        }
        if filter.month.is_some_and(|m| script.created_at.month() != m) {
            continue;
        }
        let actions = available_transitions(actor, &PipelineSnapshot::from(&script));
        columns[status.rank() as usize]
            .cards
            .push(WorkCard { script, actions });
    }

    WorkBoard { columns }
}

pub fn work_board(
    conn: &mut SqliteConnection,
    filter: &BoardFilter,
    actor: &Actor,
) -> AppResult<WorkBoard> {
    let scripts = script_store::list_scripts(
        conn,
        &ScriptListFilter {
            in_pipeline: Some(true),
            search: filter.search.clone(),
            ..Default::default()
        },
    )?;
    Ok(build_board(scripts, filter, actor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::test_support::{insert_script, insert_user, TestDb};
    use std::sync::{Arc, Barrier};

    #[test]
    fn test_full_pipeline_scenario() {
        let db = TestDb::new();
        let mut conn = db.conn();
        let manager = insert_user(&mut conn, "manager", Some(Role::Manager));
        let creator = insert_user(&mut conn, "creator", Some(Role::ContentCreator));
        let editor = insert_user(&mut conn, "editor", Some(Role::Editor));
        let script = insert_script(&mut conn, &manager, "Launch video");

        let (m, c, e) = (Actor::from(&manager), Actor::from(&creator), Actor::from(&editor));

        let s = send_to_work(&mut conn, script.id, &m).unwrap();
        assert_eq!(s.pipeline_status(), Some(PipelineStatus::Todo));

        let s = claim_content(&mut conn, script.id, &c).unwrap();
        assert_eq!(s.pipeline_status(), Some(PipelineStatus::ContentCreation));
        assert_eq!(s.content_creator_id, Some(creator.id));
        assert!(s.content_assigned_at.is_some());

        let s = complete_content(&mut conn, script.id, &c).unwrap();
        assert_eq!(s.pipeline_status(), Some(PipelineStatus::ReadyForEdit));

        let s = claim_edit(&mut conn, script.id, &e).unwrap();
        assert_eq!(s.editor_id, Some(editor.id));

        let s = complete_edit(&mut conn, script.id, &e).unwrap();
        assert_eq!(s.pipeline_status(), Some(PipelineStatus::ReadyToPublish));

        let s = publish(&mut conn, script.id, &m).unwrap();
        assert_eq!(s.pipeline_status(), Some(PipelineStatus::Published));
        assert!(s.published_at.is_some());

        // Claimant fields survive every later step.
        assert_eq!(s.content_creator_id, Some(creator.id));
        assert_eq!(s.editor_id, Some(editor.id));

        // Timestamps are monotonic along the lifecycle.
        let content_assigned = s.content_assigned_at.unwrap();
        let content_completed = s.content_completed_at.unwrap();
        let edit_assigned = s.edit_assigned_at.unwrap();
        let edit_completed = s.edit_completed_at.unwrap();
        assert!(content_assigned <= content_completed);
        assert!(content_completed <= edit_assigned);
        assert!(edit_assigned <= edit_completed);
        assert!(edit_completed <= s.published_at.unwrap());
    }

    #[test]
    fn test_rejections_are_typed_and_leave_state_untouched() {
        let db = TestDb::new();
        let mut conn = db.conn();
        let manager = insert_user(&mut conn, "manager", Some(Role::Manager));
        let creator = insert_user(&mut conn, "creator", Some(Role::ContentCreator));
        let other = insert_user(&mut conn, "other", Some(Role::ContentCreator));
        let editor = insert_user(&mut conn, "editor", Some(Role::Editor));
        let script = insert_script(&mut conn, &manager, "Guarded");

        let err = claim_content(&mut conn, 12345, &Actor::from(&creator)).unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));

        // Not sent to work yet.
        let err = claim_content(&mut conn, script.id, &Actor::from(&creator)).unwrap_err();
        assert!(matches!(err, AppError::IllegalTransition(_)));

        // Content creators cannot send to work.
        let err = send_to_work(&mut conn, script.id, &Actor::from(&creator)).unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));

        send_to_work(&mut conn, script.id, &Actor::from(&manager)).unwrap();

        let err = claim_content(&mut conn, script.id, &Actor::from(&editor)).unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));

        claim_content(&mut conn, script.id, &Actor::from(&creator)).unwrap();

        // Someone who did not claim cannot complete, even a manager.
        let err = complete_content(&mut conn, script.id, &Actor::from(&other)).unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
        let err = complete_content(&mut conn, script.id, &Actor::from(&manager)).unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));

        let unchanged = script_store::get_script(&mut conn, script.id).unwrap();
        assert_eq!(unchanged.pipeline_status(), Some(PipelineStatus::ContentCreation));
        assert_eq!(unchanged.content_creator_id, Some(creator.id));
        assert!(unchanged.content_completed_at.is_none());
    }

    #[test]
    fn test_concurrent_claims_have_exactly_one_winner() {
        let db = TestDb::new();
        let (script_id, contenders) = {
            let mut conn = db.conn();
            let manager = insert_user(&mut conn, "manager", Some(Role::Manager));
            let script = insert_script(&mut conn, &manager, "Hot topic");
            send_to_work(&mut conn, script.id, &Actor::from(&manager)).unwrap();

            let contenders: Vec<Actor> = (0..4)
                .map(|i| Actor::from(&insert_user(&mut conn, &format!("creator{}", i), Some(Role::ContentCreator))))
                .collect();
            (script.id, contenders)
        };

        let barrier = Arc::new(Barrier::new(contenders.len()));
        let handles: Vec<_> = contenders
            .iter()
            .copied()
            .map(|actor| {
                let pool = db.pool.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let mut conn = pool.get().unwrap();
                    barrier.wait();
                    claim_content(&mut conn, script_id, &actor).map(|_| actor.id)
                })
            })
            .collect();

        let results: Vec<AppResult<i32>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<i32> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
        assert_eq!(winners.len(), 1, "{:?}", results);

        for result in &results {
            if let Err(e) = result {
                assert!(matches!(e, AppError::IllegalTransition(_)), "{:?}", e);
            }
        }

        let stored = script_store::get_script(&mut db.conn(), script_id).unwrap();
        assert_eq!(stored.content_creator_id, Some(winners[0]));
        assert_eq!(stored.pipeline_status(), Some(PipelineStatus::ContentCreation));
    }

    #[test]
    fn test_board_groups_by_status_and_lists_actions() {
        let db = TestDb::new();
        let mut conn = db.conn();
        let manager = insert_user(&mut conn, "manager", Some(Role::Manager));
        let creator = insert_user(&mut conn, "creator", Some(Role::ContentCreator));
        let m = Actor::from(&manager);

        let waiting = insert_script(&mut conn, &manager, "Waiting");
        let claimed = insert_script(&mut conn, &manager, "Claimed");
        let _draft = insert_script(&mut conn, &manager, "Draft only");
        send_to_work(&mut conn, waiting.id, &m).unwrap();
        send_to_work(&mut conn, claimed.id, &m).unwrap();
        claim_content(&mut conn, claimed.id, &Actor::from(&creator)).unwrap();

        let board = work_board(&mut conn, &BoardFilter::default(), &Actor::from(&creator)).unwrap();
        assert_eq!(board.columns.len(), 6);

        let todo = &board.columns[0];
        assert_eq!(todo.status, PipelineStatus::Todo);
        assert_eq!(todo.cards.len(), 1);
        assert_eq!(todo.cards[0].script.id, waiting.id);
        assert_eq!(todo.cards[0].actions, vec![Transition::ClaimContent]);

        let in_progress = &board.columns[1];
        assert_eq!(in_progress.cards.len(), 1);
        assert_eq!(in_progress.cards[0].actions, vec![Transition::CompleteContent]);

        let searched = work_board(
            &mut conn,
            &BoardFilter {
                search: Some("claim".into()),
                ..Default::default()
            },
            &m,
        )
        .unwrap();
        let total: usize = searched.columns.iter().map(|c| c.cards.len()).sum();
        assert_eq!(total, 1);

        let other_year = work_board(
            &mut conn,
            &BoardFilter {
                year: Some(1999),
                ..Default::default()
            },
            &m,
        )
        .unwrap();
        assert!(other_year.columns.iter().all(|c| c.cards.is_empty()));
    }
}
