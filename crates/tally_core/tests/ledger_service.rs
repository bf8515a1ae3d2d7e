//! LedgerService behaviour over the in-memory store.
//!
//! Run with: cargo test -p tally_core --test ledger_service

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use tally_core::derivation::CounterInputs;
use tally_core::memory::MemoryStores;
use tally_core::ports::{self, RecordStore};
use tally_core::stats::LeaderboardEntry;
use tally_core::service::{AccountRequest, RecordInput, ResetTarget};
use tally_core::types::{
    Counters, DerivedFields, NewRecord, Position, Record, Role, Scope, ScopeGrant,
};
use tally_core::audit::{AuditAction, AuditDraft};
use tally_core::{LedgerService, LedgerServiceImpl, Principal, TallyError};

// ── Helpers ────────────────────────────────────────────────────

async fn setup() -> (Arc<MemoryStores>, LedgerServiceImpl) {
    let stores = Arc::new(MemoryStores::new());
    let service = LedgerServiceImpl::from_stores(stores.clone());
    service.bootstrap().await.unwrap();
    (stores, service)
}

fn root() -> Principal {
    Principal::in_process("admin", Role::Admin, ScopeGrant::All)
}

fn lead() -> Principal {
    Principal::in_process("lead", Role::Admin, ScopeGrant::All)
}

fn editor(grant: ScopeGrant) -> Principal {
    Principal::in_process(format!("ed-{grant}"), Role::Editor, grant)
}

fn viewer(grant: ScopeGrant) -> Principal {
    Principal::in_process(format!("view-{grant}"), Role::Viewer, grant)
}

fn input(position: &str, name: &str, counters: &[(&str, &str)]) -> RecordInput {
    let mut c = CounterInputs::default();
    for (field, value) in counters {
        let slot = match *field {
            "traffic_count" => &mut c.traffic_count,
            "sentence_1to5" => &mut c.sentence_1to5,
            "sentence_6plus" => &mut c.sentence_6plus,
            "supervision_1to5" => &mut c.supervision_1to5,
            "supervision_6plus" => &mut c.supervision_6plus,
            "error_count" => &mut c.error_count,
            other => panic!("unknown counter {other}"),
        };
        *slot = Some(value.to_string());
    }
    RecordInput {
        position: position.into(),
        name: name.into(),
        counters: c,
    }
}

fn expected_score(c: &Counters) -> i64 {
    c.traffic_count + (c.sentence_1to5 + c.supervision_1to5) * 2
        + (c.sentence_6plus + c.supervision_6plus) * 4
        - c.error_count * 5
}

// ── Record lifecycle ───────────────────────────────────────────

#[tokio::test]
async fn create_intern_scores_traffic_and_cases() {
    let (stores, service) = setup().await;
    let record = service
        .create_record(
            &editor(ScopeGrant::UnitA),
            Scope::UnitA,
            input(
                "Intern",
                "A",
                &[("traffic_count", "10"), ("sentence_1to5", "2"), ("error_count", "1")],
            ),
        )
        .await
        .unwrap();

    assert_eq!(record.derived.score, 9);
    assert_eq!(record.derived.case_total, 2);
    assert_eq!(record.scope, Scope::UnitA);

    let logs = stores.all_logs().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action, "ADD");
    assert_eq!(logs[0].record_id, Some(record.id));
    assert_eq!(logs[0].actor, "ed-UnitA");
}

#[tokio::test]
async fn unknown_position_defaults_to_intern() {
    let (_, service) = setup().await;
    let record = service
        .create_record(
            &root(),
            Scope::UnitB,
            input("Captain", "Z", &[("supervision_1to5", "4"), ("traffic_count", "3")]),
        )
        .await
        .unwrap();
    assert_eq!(record.position, Position::Intern);
    assert_eq!(record.counters.supervision_1to5, 0);
    assert_eq!(record.counters.traffic_count, 3);
}

#[tokio::test]
async fn blank_name_is_stored_trimmed() {
    let (stores, service) = setup().await;
    let record = service
        .create_record(&root(), Scope::UnitA, input("Intern", "   ", &[("traffic_count", "2")]))
        .await
        .unwrap();
    assert_eq!(record.name, "");
    assert_eq!(record.derived.score, 2);
    assert_eq!(stores.all_logs().unwrap().len(), 1);
}

#[tokio::test]
async fn junk_counters_become_zero() {
    let (_, service) = setup().await;
    let record = service
        .create_record(
            &root(),
            Scope::UnitA,
            input(
                "Officer",
                "Q",
                &[("sentence_1to5", "abc"), ("sentence_6plus", "-3"), ("error_count", "2.9")],
            ),
        )
        .await
        .unwrap();
    assert_eq!(record.counters.sentence_1to5, 0);
    assert_eq!(record.counters.sentence_6plus, 0);
    assert_eq!(record.counters.error_count, 2);
    assert_eq!(record.derived.score, -10);
}

#[tokio::test]
async fn promotion_to_officer_drops_traffic() {
    let (stores, service) = setup().await;
    // A legacy row holding both traffic and supervision.
    let counters = Counters {
        traffic_count: 5,
        supervision_1to5: 3,
        ..Counters::default()
    };
    let legacy = stores
        .insert_record(
            &NewRecord {
                scope: Scope::UnitA,
                position: Position::Intern,
                name: "L".into(),
                counters,
                derived: DerivedFields::default(),
                created_at: Utc::now(),
            },
            AuditDraft::new(AuditAction::Add, "import", "legacy"),
        )
        .await
        .unwrap();

    let out = service
        .inline_update(&root(), Scope::UnitA, legacy.id, "position", "Officer")
        .await
        .unwrap();
    assert_eq!(out.position, Position::Officer);
    assert_eq!(out.traffic_count, 0);
    assert_eq!(out.supervision_1to5, 3);
    assert_eq!(out.supervision_total, 3);
    assert_eq!(out.case_total, 3);
    assert_eq!(out.score, 6);
    assert_eq!(out.saved_value, None);

    let stored = stores.get_record(legacy.id).await.unwrap().unwrap();
    assert_eq!(stored.derived.score, 6);
    let last = stores.all_logs().unwrap().pop().unwrap();
    assert_eq!(last.action, "INLINE_EDIT");
    assert_eq!(last.details, "position = Officer (scope=UnitA)");
}

#[tokio::test]
async fn position_gating_holds_across_edit_sequences() {
    let (stores, service) = setup().await;
    let ed = editor(ScopeGrant::UnitB);
    let record = service
        .create_record(&ed, Scope::UnitB, input("Officer", "P", &[("sentence_6plus", "1")]))
        .await
        .unwrap();

    let edits = [
        ("supervision_1to5", "4"),
        ("traffic_count", "9"),
        ("position", "Intern"),
        ("traffic_count", "7"),
        ("supervision_6plus", "2"),
        ("position", "ReserveOfficer"),
        ("supervision_6plus", "2"),
        ("error_count", "1"),
    ];
    for (field, value) in edits {
        service
            .inline_update(&ed, Scope::UnitB, record.id, field, value)
            .await
            .unwrap();
        let r = stores.get_record(record.id).await.unwrap().unwrap();
        match r.position {
            Position::Intern => {
                assert_eq!(r.counters.supervision_1to5, 0);
                assert_eq!(r.counters.supervision_6plus, 0);
                assert_eq!(r.derived.supervision_total, 0);
            }
            _ => assert_eq!(r.counters.traffic_count, 0),
        }
        let c = r.counters;
        assert_eq!(
            r.derived.case_total,
            c.sentence_1to5 + c.sentence_6plus + c.supervision_1to5 + c.supervision_6plus
        );
        assert_eq!(r.derived.score, expected_score(&c));
    }
}

#[tokio::test]
async fn counter_edit_echoes_sanitised_value() {
    let (_, service) = setup().await;
    let record = service
        .create_record(&root(), Scope::UnitA, input("Intern", "S", &[]))
        .await
        .unwrap();
    let out = service
        .inline_update(&root(), Scope::UnitA, record.id, "traffic_count", "12.6")
        .await
        .unwrap();
    assert_eq!(out.saved_value, Some(12));
    assert_eq!(out.score, 12);
}

#[tokio::test]
async fn invalid_field_and_value_write_nothing() {
    let (stores, service) = setup().await;
    let record = service
        .create_record(&root(), Scope::UnitA, input("Intern", "F", &[]))
        .await
        .unwrap();
    let before = stores.all_logs().unwrap().len();

    let err = service
        .inline_update(&root(), Scope::UnitA, record.id, "created_at", "2020-01-01")
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::InvalidField(_)));

    let err = service
        .inline_update(&root(), Scope::UnitA, record.id, "position", "Chief")
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::InvalidValue(_)));

    assert_eq!(stores.all_logs().unwrap().len(), before);
}

#[tokio::test]
async fn viewers_cannot_mutate() {
    let (stores, service) = setup().await;
    let record = service
        .create_record(&root(), Scope::UnitA, input("Intern", "V", &[("traffic_count", "3")]))
        .await
        .unwrap();
    let v = viewer(ScopeGrant::UnitA);
    let logs_before = stores.all_logs().unwrap().len();

    let err = service
        .create_record(&v, Scope::UnitA, input("Intern", "X", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::PermissionDenied(_)));
    let err = service
        .inline_update(&v, Scope::UnitA, record.id, "traffic_count", "99")
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::PermissionDenied(_)));
    let err = service
        .delete_record(&v, Scope::UnitA, record.id)
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::PermissionDenied(_)));
    let err = service.list_records(&v, Scope::UnitA).await.unwrap_err();
    assert!(matches!(err, TallyError::PermissionDenied(_)));

    let rows = stores.list_records(Scope::UnitA).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].counters.traffic_count, 3);
    assert_eq!(stores.all_logs().unwrap().len(), logs_before);
}

#[tokio::test]
async fn restricted_editor_never_touches_other_unit() {
    let (stores, service) = setup().await;
    let foreign = service
        .create_record(&root(), Scope::UnitB, input("Officer", "B1", &[("sentence_1to5", "1")]))
        .await
        .unwrap();
    let ed = editor(ScopeGrant::UnitA);

    let visible = service.list_records(&ed, Scope::UnitB).await.unwrap();
    assert!(visible.is_empty());

    let err = service
        .inline_update(&ed, Scope::UnitB, foreign.id, "sentence_1to5", "50")
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::PermissionDenied(_)));
    let err = service
        .delete_record(&ed, Scope::UnitB, foreign.id)
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::PermissionDenied(_)));

    // A create asking for UnitB lands in the editor's own unit.
    let mine = service
        .create_record(&ed, Scope::UnitB, input("Intern", "A1", &[]))
        .await
        .unwrap();
    assert_eq!(mine.scope, Scope::UnitA);

    // Resets are pinned as well.
    service.reset_all(&ed, Scope::UnitB).await.unwrap();
    assert!(stores.get_record(foreign.id).await.unwrap().is_some());
    assert!(stores.get_record(mine.id).await.unwrap().is_none());
}

#[tokio::test]
async fn admin_in_other_scope_cannot_edit() {
    let (_, service) = setup().await;
    let record = service
        .create_record(&lead(), Scope::UnitA, input("Intern", "T", &[]))
        .await
        .unwrap();
    let err = service
        .inline_update(&lead(), Scope::UnitB, record.id, "name", "renamed")
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::PermissionDenied(_)));
}

#[tokio::test]
async fn delete_logs_the_name_and_missing_is_not_found() {
    let (stores, service) = setup().await;
    let record = service
        .create_record(&root(), Scope::UnitA, input("Officer", "Gone", &[]))
        .await
        .unwrap();
    service
        .delete_record(&root(), Scope::UnitA, record.id)
        .await
        .unwrap();
    let last = stores.all_logs().unwrap().pop().unwrap();
    assert_eq!(last.action, "DELETE");
    assert_eq!(last.record_id, Some(record.id));
    assert!(last.details.contains("Gone"));

    let err = service
        .delete_record(&root(), Scope::UnitA, record.id)
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::NotFound(_)));
}

#[tokio::test]
async fn reset_scores_keeps_rows_reset_all_removes_them() {
    let (stores, service) = setup().await;
    let ed = editor(ScopeGrant::UnitA);
    let mut ids = Vec::new();
    for name in ["R1", "R2", "R3"] {
        let r = service
            .create_record(
                &ed,
                Scope::UnitA,
                input("Intern", name, &[("traffic_count", "4"), ("sentence_6plus", "1")]),
            )
            .await
            .unwrap();
        ids.push(r.id);
    }
    let other = service
        .create_record(&root(), Scope::UnitB, input("Intern", "Other", &[("traffic_count", "2")]))
        .await
        .unwrap();

    assert_eq!(service.reset_scores(&ed, Scope::UnitA).await.unwrap(), 3);
    let rows = stores.list_records(Scope::UnitA).await.unwrap();
    assert_eq!(rows.len(), 3);
    for r in &rows {
        assert_eq!(r.counters, Counters::default());
        assert_eq!(r.derived, DerivedFields::default());
        assert!(r.name.starts_with('R'));
    }
    let untouched = stores.get_record(other.id).await.unwrap().unwrap();
    assert_eq!(untouched.derived.score, 2);
    let last = stores.all_logs().unwrap().pop().unwrap();
    assert_eq!(last.action, "RESET_SCORES");
    assert!(last.details.ends_with("(affected=3)"));

    assert_eq!(service.reset_all(&ed, Scope::UnitA).await.unwrap(), 3);
    assert!(stores.list_records(Scope::UnitA).await.unwrap().is_empty());
    let logs = stores.all_logs().unwrap();
    assert!(logs
        .iter()
        .all(|l| l.record_id.map_or(true, |id| !ids.contains(&id))));
    assert!(logs.iter().any(|l| l.record_id == Some(other.id)));
    assert_eq!(logs.last().unwrap().action, "RESET_ALL");
}

#[tokio::test]
async fn viewer_cannot_reset() {
    let (_, service) = setup().await;
    let err = service
        .reset_scores(&viewer(ScopeGrant::UnitA), Scope::UnitA)
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::PermissionDenied(_)));
}

#[tokio::test]
async fn data_wipe_is_root_only() {
    let (stores, service) = setup().await;
    for scope in Scope::ALL {
        service
            .create_record(&root(), scope, input("Intern", "W", &[]))
            .await
            .unwrap();
    }
    let err = service
        .admin_reset_data(&lead(), ResetTarget::All)
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::PermissionDenied(_)));

    assert_eq!(
        service
            .admin_reset_data(&root(), ResetTarget::Scope(Scope::UnitB))
            .await
            .unwrap(),
        1
    );
    assert_eq!(stores.list_records(Scope::UnitA).await.unwrap().len(), 1);
    assert_eq!(
        service
            .admin_reset_data(&root(), ResetTarget::All)
            .await
            .unwrap(),
        1
    );
    assert!(stores.list_records(Scope::UnitA).await.unwrap().is_empty());
    let logs = stores.all_logs().unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.action == "RESET_DATA"));
}

// ── Audit log ──────────────────────────────────────────────────

#[tokio::test]
async fn audit_pages_newest_first() {
    let (_, service) = setup().await;
    for i in 0..13 {
        service
            .create_record(&root(), Scope::UnitA, input("Intern", &format!("N{i}"), &[]))
            .await
            .unwrap();
    }
    let first = service.audit_log(&root(), 0).await.unwrap();
    assert_eq!(first.page, 1);
    assert_eq!(first.page_size, 12);
    assert_eq!(first.total, 13);
    assert_eq!(first.total_pages, 2);
    assert_eq!(first.entries.len(), 12);
    assert!(first.entries[0].details.contains("N12"));

    let second = service.audit_log(&root(), 2).await.unwrap();
    assert_eq!(second.entries.len(), 1);
    assert!(second.entries[0].details.contains("N0"));

    let err = service
        .audit_log(&editor(ScopeGrant::UnitA), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::PermissionDenied(_)));
}

#[tokio::test]
async fn empty_log_has_one_page() {
    let (_, service) = setup().await;
    let page = service.audit_log(&root(), 1).await.unwrap();
    assert_eq!(page.total, 0);
    assert_eq!(page.total_pages, 1);
    assert!(page.entries.is_empty());
}

// ── Statistics ─────────────────────────────────────────────────

#[tokio::test]
async fn monthly_totals_are_scoped_per_grant() {
    let (_, service) = setup().await;
    service
        .create_record(&root(), Scope::UnitA, input("Intern", "A", &[("sentence_1to5", "2")]))
        .await
        .unwrap();
    service
        .create_record(
            &root(),
            Scope::UnitB,
            input("Officer", "B", &[("sentence_1to5", "3"), ("supervision_6plus", "2")]),
        )
        .await
        .unwrap();

    let now = Utc::now();
    let month = now.month() as usize;
    let a = service
        .monthly_totals(&viewer(ScopeGrant::UnitA), now.year(), Some(Scope::UnitB))
        .await
        .unwrap();
    let b = service
        .monthly_totals(&viewer(ScopeGrant::UnitB), now.year(), None)
        .await
        .unwrap();
    let both = service
        .monthly_totals(&root(), now.year(), None)
        .await
        .unwrap();

    assert_eq!(a.len(), month);
    assert_eq!(a[month - 1].total, 2);
    assert_eq!(b[month - 1].total, 5);
    assert_eq!(both[month - 1].total, 7);
    assert!(a[..month - 1].iter().all(|m| m.total == 0));

    let past = service
        .monthly_totals(&root(), now.year() - 1, None)
        .await
        .unwrap();
    assert_eq!(past.len(), 12);
    assert!(past.iter().all(|m| m.total == 0));
}

#[tokio::test]
async fn leaderboard_groups_by_name() {
    let (_, service) = setup().await;
    for (name, traffic) in [("Ann", "5"), ("Bo", "8"), ("Ann", "6"), ("Cy", "1"), ("Di", "2")] {
        service
            .create_record(&root(), Scope::UnitA, input("Intern", name, &[("traffic_count", traffic)]))
            .await
            .unwrap();
    }
    service
        .create_record(&root(), Scope::UnitB, input("Intern", "Zed", &[("traffic_count", "100")]))
        .await
        .unwrap();

    let top = service
        .top_scorers(&viewer(ScopeGrant::UnitA), None, None)
        .await
        .unwrap();
    let names: Vec<&str> = top.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["Ann", "Bo", "Di"]);
    assert_eq!(top[0].total_score, 11);

    let everyone = service.top_scorers(&root(), Some(1), None).await.unwrap();
    assert_eq!(everyone[0].name, "Zed");
}

// ── Accounts ───────────────────────────────────────────────────

fn account(username: &str, role: Option<&str>, scope: Option<&str>) -> AccountRequest {
    AccountRequest {
        username: username.into(),
        password: "pw".into(),
        role: role.map(String::from),
        scope: scope.map(String::from),
    }
}

#[tokio::test]
async fn authenticate_checks_exact_credentials() {
    let (_, service) = setup().await;
    let p = service.authenticate(" admin ", "admin").await.unwrap();
    assert!(p.is_root());
    assert_eq!(p.scope_grant, ScopeGrant::All);

    let err = service.authenticate("admin", "Admin").await.unwrap_err();
    assert!(matches!(err, TallyError::Unauthenticated(_)));
    let err = service.authenticate("", "x").await.unwrap_err();
    assert!(matches!(err, TallyError::InvalidValue(_)));
}

#[tokio::test]
async fn account_lifecycle() {
    let (stores, service) = setup().await;
    let created = service
        .create_account(&root(), account("ed", Some("editor"), Some("UnitB")))
        .await
        .unwrap();
    assert_eq!(created.role, Role::Editor);
    assert_eq!(created.scope_grant, ScopeGrant::UnitB);

    let p = service.authenticate("ed", "pw").await.unwrap();
    assert_eq!(p.role, Role::Editor);
    assert_eq!(p.effective_scope(Some(Scope::UnitA), None), Scope::UnitB);

    let err = service
        .create_account(&root(), account("ed", None, None))
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::Conflict(_)));

    let boss = service
        .create_account(&root(), account("boss", Some("admin"), Some("UnitA")))
        .await
        .unwrap();
    assert_eq!(boss.scope_grant, ScopeGrant::All);

    let plain = service
        .create_account(&root(), account("plain", Some("user"), Some("nowhere")))
        .await
        .unwrap();
    assert_eq!(plain.role, Role::Viewer);
    assert_eq!(plain.scope_grant, ScopeGrant::UnitA);

    let users = service.list_users(&root()).await.unwrap();
    let names: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, ["admin", "ed", "boss", "plain"]);

    let actions: Vec<String> = stores
        .all_logs()
        .unwrap()
        .into_iter()
        .map(|l| l.action)
        .collect();
    assert_eq!(actions, ["CREATE_ACCOUNT", "CREATE_ACCOUNT", "CREATE_ACCOUNT"]);
}

#[tokio::test]
async fn non_admins_cannot_hold_all() {
    let (_, service) = setup().await;
    let err = service
        .create_account(&root(), account("wide", Some("editor"), Some("All")))
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::InvalidValue(_)));

    let ed = service
        .create_account(&root(), account("ed", Some("editor"), Some("UnitA")))
        .await
        .unwrap();
    let err = service
        .update_user_scope(&root(), ed.id, "All")
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::InvalidValue(_)));
    let moved = service
        .update_user_scope(&root(), ed.id, "unitb")
        .await
        .unwrap();
    assert_eq!(moved.scope_grant, ScopeGrant::UnitB);
}

#[tokio::test]
async fn role_changes_follow_admin_rules() {
    let (_, service) = setup().await;
    let v = service
        .create_account(&lead(), account("v", Some("viewer"), Some("UnitB")))
        .await
        .unwrap();
    let e = service.update_user_role(&lead(), v.id, "editor").await.unwrap();
    assert_eq!(e.role, Role::Editor);
    assert_eq!(e.scope_grant, ScopeGrant::UnitB);

    let a = service.update_user_role(&lead(), v.id, "admin").await.unwrap();
    assert_eq!(a.scope_grant, ScopeGrant::All);

    let err = service
        .update_user_role(&lead(), v.id, "viewer")
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::InvalidValue(_)));

    let err = service
        .update_user_role(&lead(), 9_999, "viewer")
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::NotFound(_)));

    let err = service
        .update_user_role(&editor(ScopeGrant::UnitA), v.id, "viewer")
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::PermissionDenied(_)));
}

#[tokio::test]
async fn root_account_is_untouchable() {
    let (_, service) = setup().await;
    let root_id = service
        .list_users(&root())
        .await
        .unwrap()
        .into_iter()
        .find(|u| u.username == "admin")
        .unwrap()
        .id;

    for result in [
        service.update_user_role(&lead(), root_id, "viewer").await.err(),
        service.update_user_scope(&lead(), root_id, "UnitA").await.err(),
        service.delete_user(&lead(), root_id).await.err(),
    ] {
        assert!(matches!(result, Some(TallyError::PermissionDenied(_))));
    }

    service.bootstrap().await.unwrap();
    let p = service.authenticate("admin", "admin").await.unwrap();
    assert!(p.is_root());
}

#[tokio::test]
async fn deleted_user_no_longer_loads() {
    let (stores, service) = setup().await;
    let u = service
        .create_account(&root(), account("temp", Some("viewer"), Some("UnitA")))
        .await
        .unwrap();
    assert!(service.load_principal("temp").await.unwrap().is_some());
    service.delete_user(&root(), u.id).await.unwrap();
    assert!(service.load_principal("temp").await.unwrap().is_none());
    assert_eq!(stores.all_logs().unwrap().pop().unwrap().action, "DELETE_USER");
}

// ── Settings ───────────────────────────────────────────────────

#[tokio::test]
async fn labels_default_and_update() {
    let (stores, service) = setup().await;
    let v = viewer(ScopeGrant::UnitB);
    let labels = service.scope_labels(&v, Scope::UnitA).await.unwrap();
    assert_eq!(labels.scope, Scope::UnitB);
    assert_eq!(labels.monthly_title, "MONTHLY SCORE STATISTICS");
    assert_eq!(labels.stats_title, "Score statistics UnitB");
    assert_eq!(labels.stats_label, "Total cases");

    let updated = service
        .update_stats_labels(&root(), Scope::UnitB, " Unit B board ", "Cases")
        .await
        .unwrap();
    assert_eq!(updated.stats_title, "Unit B board");
    assert_eq!(updated.stats_label, "Cases");

    let updated = service
        .update_monthly_title(&root(), Scope::UnitB, "B monthly")
        .await
        .unwrap();
    assert_eq!(updated.monthly_title, "B monthly");
    let a = service.scope_labels(&root(), Scope::UnitA).await.unwrap();
    assert_eq!(a.monthly_title, "MONTHLY SCORE STATISTICS");

    let err = service
        .update_monthly_title(&root(), Scope::UnitA, "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::InvalidValue(_)));
    let err = service
        .update_monthly_title(&editor(ScopeGrant::UnitA), Scope::UnitA, "x")
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::PermissionDenied(_)));

    let logs = stores.all_logs().unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.action == "EDIT_SETTINGS"));
}

// ── Store failures ─────────────────────────────────────────────

/// Reads and most writes go to the in-memory store; `update_record` and
/// `purge_records` fail the way a dropped connection would.
struct BrokenWrites {
    inner: Arc<MemoryStores>,
}

fn store_down() -> TallyError {
    TallyError::Persistence(anyhow!("connection reset by peer"))
}

#[async_trait]
impl RecordStore for BrokenWrites {
    async fn insert_record(&self, record: &NewRecord, audit: AuditDraft) -> ports::Result<Record> {
        self.inner.insert_record(record, audit).await
    }

    async fn get_record(&self, record_id: i64) -> ports::Result<Option<Record>> {
        self.inner.get_record(record_id).await
    }

    async fn list_records(&self, scope: Scope) -> ports::Result<Vec<Record>> {
        self.inner.list_records(scope).await
    }

    async fn update_record(&self, _record: &Record, _audit: AuditDraft) -> ports::Result<()> {
        Err(store_down())
    }

    async fn delete_record(&self, record_id: i64, scope: Scope, audit: AuditDraft) -> ports::Result<()> {
        self.inner.delete_record(record_id, scope, audit).await
    }

    async fn reset_scores(&self, scope: Scope, audit: AuditDraft) -> ports::Result<u64> {
        self.inner.reset_scores(scope, audit).await
    }

    async fn purge_records(&self, _scopes: &[Scope], _audit: AuditDraft) -> ports::Result<u64> {
        Err(store_down())
    }

    async fn monthly_case_totals(&self, year: i32, scope: Option<Scope>) -> ports::Result<Vec<(u32, i64)>> {
        self.inner.monthly_case_totals(year, scope).await
    }

    async fn top_scorers(&self, scope: Option<Scope>, limit: u32) -> ports::Result<Vec<LeaderboardEntry>> {
        self.inner.top_scorers(scope, limit).await
    }
}

async fn setup_broken_writes() -> (Arc<MemoryStores>, LedgerServiceImpl) {
    let stores = Arc::new(MemoryStores::new());
    let service = LedgerServiceImpl::new(
        stores.clone(),
        Arc::new(BrokenWrites {
            inner: stores.clone(),
        }),
        stores.clone(),
        stores.clone(),
    );
    service.bootstrap().await.unwrap();
    (stores, service)
}

#[tokio::test]
async fn failed_inline_update_leaves_record_and_log_untouched() {
    let (stores, service) = setup_broken_writes().await;
    let record = service
        .create_record(
            &root(),
            Scope::UnitA,
            input("Intern", "Stable", &[("traffic_count", "5"), ("sentence_1to5", "1")]),
        )
        .await
        .unwrap();
    let logs_before = stores.all_logs().unwrap();

    let err = service
        .inline_update(&root(), Scope::UnitA, record.id, "traffic_count", "40")
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::Persistence(_)));
    assert_eq!(err.http_status(), 500);
    assert_eq!(err.public_message(), "internal error");

    let stored = stores.get_record(record.id).await.unwrap().unwrap();
    assert_eq!(stored, record);
    assert_eq!(stores.all_logs().unwrap(), logs_before);
}

#[tokio::test]
async fn failed_reset_all_keeps_every_row() {
    let (stores, service) = setup_broken_writes().await;
    let ed = editor(ScopeGrant::UnitA);
    for name in ["K1", "K2"] {
        service
            .create_record(&ed, Scope::UnitA, input("Intern", name, &[("traffic_count", "1")]))
            .await
            .unwrap();
    }
    let logs_before = stores.all_logs().unwrap();

    let err = service.reset_all(&ed, Scope::UnitA).await.unwrap_err();
    assert!(matches!(err, TallyError::Persistence(_)));

    assert_eq!(stores.list_records(Scope::UnitA).await.unwrap().len(), 2);
    assert_eq!(stores.all_logs().unwrap(), logs_before);
}
