// ==========================================
// ModuleContentApi 集成测试
// ==========================================
// 测试范围:
// 1. 权限检查先于任何写入
// 2. 审计: 成功后写入，失败不写；审计故障不影响结果
// 3. 插入 / 追加 / 删除补位
// 4. 临时模块清理 / 临时模块不对外开放
// ==========================================


use std::sync::Arc;

use elearn_backoffice::api::{
    ApiError, AuditSink, LocalAdminAuthorizer, ModuleEditAuthorizer, REORDER_FAILED_MESSAGE,
};
use elearn_backoffice::config::{OrphanPolicy, ReorderConfig};
use elearn_backoffice::domain::{
    ActionType, ClassKind, ClassRef, EditContext, MoveRequest, SlotKey,
};
use elearn_backoffice::repository::{RepositoryError, RepositoryResult};
use serde_json::Value as JsonValue;
use test_helpers::*;

/// 只允许编辑指定模块
struct OnlyModule(i64);

impl ModuleEditAuthorizer for OnlyModule {
    fn may_edit_module(&self, _ctx: &EditContext, module_id: i64) -> bool {
        module_id == self.0
    }
}

/// 总是失败的审计
struct BrokenAudit;

impl AuditSink for BrokenAudit {
    fn record_action(
        &self,
        _ctx: &EditContext,
        _kind: ActionType,
        _module_id: Option<i64>,
        _subject_ids: &[ClassRef],
        _payload: Option<JsonValue>,
    ) -> RepositoryResult<()> {
        Err(RepositoryError::InternalError("audit store offline".to_string()))
    }
}

fn titles(pairs: &[(i64, &str)]) -> Vec<(i64, String)> {
    pairs.iter().map(|(p, t)| (*p, t.to_string())).collect()
}

// ==========================================
// 重排
// ==========================================

#[test]
fn test_reorder_module_正常重排并记录审计() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let api = env.content_api();
    let (m, items) = env.seed_module("课程", &[video("A"), video("B")]);

    let report = api
        .reorder_module(
            &EditContext::new("editor"),
            m,
            &[
                MoveRequest::within(ClassKind::Video, m, 1, 2),
                MoveRequest::within(ClassKind::Video, m, 2, 1),
            ],
        )
        .expect("重排失败");

    assert_eq!(report.applied.len(), 2);
    assert_eq!(env.arrangement(m), titles(&[(1, "B"), (2, "A")]));

    let logs = env.action_log_repo.find_by_module_id(m).expect("查询审计失败");
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action_type(), Some(ActionType::ReorderModule));
    assert_eq!(logs[0].actor, "editor");
    assert!(logs[0].subject_ids.contains(&items[0].class_ref().to_string()));
}

#[test]
fn test_reorder_module_无权限不写入() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (m, _) = env.seed_module("课程", &[video("A"), video("B")]);
    let api = env.content_api_with(Arc::new(OnlyModule(m + 100)), env.action_log_repo.clone());

    let err = api
        .reorder_module(
            &EditContext::new("guest"),
            m,
            &[MoveRequest::within(ClassKind::Video, m, 1, 2)],
        )
        .unwrap_err();

    assert!(matches!(err, ApiError::Unauthorized { module_id, .. } if module_id == m));
    assert_eq!(env.arrangement(m), titles(&[(1, "A"), (2, "B")]));
    assert_eq!(env.action_log_repo.count_by_module(m).expect("查询失败"), 0);
}

#[test]
fn test_reorder_module_来源模块也需要权限() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (source, _) = env.seed_module("来源", &[video("A")]);
    let (target, _) = env.seed_module("目标", &[]);
    let api = env.content_api_with(Arc::new(OnlyModule(target)), env.action_log_repo.clone());

    let err = api
        .reorder_module(
            &EditContext::new("editor"),
            target,
            &[MoveRequest::across(
                ClassKind::Video,
                SlotKey::new(source, 1),
                SlotKey::new(target, 1),
            )],
        )
        .unwrap_err();

    assert!(matches!(err, ApiError::Unauthorized { module_id, .. } if module_id == source));
}

#[test]
fn test_reorder_module_失败时返回统一提示() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let api = env.content_api();
    let (m1, _) = env.seed_module("M1", &[video("A")]);
    let (m2, items) = env.seed_module("M2", &[video("Z")]);
    env.force_position(items[0].class_ref(), 0);

    let err = api
        .reorder_module(
            &EditContext::system(),
            m2,
            &[MoveRequest::across(ClassKind::Video, SlotKey::new(m1, 1), SlotKey::new(m2, 1))],
        )
        .unwrap_err();

    assert!(matches!(err, ApiError::ReorderFailed(_)));
    assert_eq!(err.to_string(), REORDER_FAILED_MESSAGE);
    assert_eq!(env.action_log_repo.count_by_module(m2).expect("查询失败"), 0);
}

#[test]
fn test_reorder_module_审计失败不影响结果() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let api = env.content_api_with(Arc::new(LocalAdminAuthorizer), Arc::new(BrokenAudit));
    let (m, _) = env.seed_module("课程", &[video("A"), video("B")]);

    api.reorder_module(
        &EditContext::system(),
        m,
        &[
            MoveRequest::within(ClassKind::Video, m, 2, 1),
            MoveRequest::within(ClassKind::Video, m, 1, 2),
        ],
    )
    .expect("审计失败不应中断重排");

    assert_eq!(env.arrangement(m), titles(&[(1, "B"), (2, "A")]));
}

#[test]
fn test_reorder_module_空批次为无效输入() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let api = env.content_api();
    let (m, _) = env.seed_module("课程", &[video("A")]);

    let err = api.reorder_module(&EditContext::system(), m, &[]).unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}

// ==========================================
// 单课时迁移
// ==========================================

#[test]
fn test_move_class_跨模块迁移() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let api = env.content_api();
    let (m1, a) = env.seed_module("M1", &[video("A")]);
    let (m2, _) = env.seed_module("M2", &[questionnaire("Q")]);

    let outcome = api
        .move_class(&EditContext::new("editor"), a[0].class_ref(), m2, 1)
        .expect("迁移失败");

    assert_eq!(outcome.from, SlotKey::new(m1, 1));
    assert_eq!(env.arrangement(m2), titles(&[(1, "A"), (2, "Q")]));

    let logs = env.action_log_repo.find_by_module_id(m2).expect("查询失败");
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action_type(), Some(ActionType::MoveClass));
    assert_eq!(logs[0].subject_ids.len(), 2);
}

// ==========================================
// 新增 / 删除
// ==========================================

#[test]
fn test_append_class_追加到末尾() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let api = env.content_api();
    let (m, _) = env.seed_module("课程", &[video("A"), video("B")]);
    let (empty, _) = env.seed_module("空", &[]);

    let item = api
        .append_class(&EditContext::system(), m, questionnaire("C"))
        .expect("追加失败");
    assert_eq!(item.position, 3);

    let first = api
        .append_class(&EditContext::system(), empty, video("X"))
        .expect("追加失败");
    assert_eq!(first.position, 1);
    assert_eq!(api.highest_position(empty).expect("查询失败"), 1);
}

#[test]
fn test_insert_class_at_后续课时后移() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let api = env.content_api();
    let (m, _) = env.seed_module("课程", &[video("A"), questionnaire("B"), video("C")]);

    let item = api
        .insert_class_at(&EditContext::new("editor"), m, 2, video("新"))
        .expect("插入失败");

    assert_eq!(item.module_id, m);
    assert_eq!(item.position, 2);
    assert_eq!(
        env.arrangement(m),
        titles(&[(1, "A"), (2, "新"), (3, "B"), (4, "C")])
    );
    assert_eq!(env.scratch_module_count(), 0, "暂存模块应被删除");
    assert_eq!(env.duplicate_slot_count(), 0);
}

#[test]
fn test_insert_class_at_空模块与非法位置() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let api = env.content_api();
    let (m, _) = env.seed_module("空", &[]);

    let item = api
        .insert_class_at(&EditContext::system(), m, 1, questionnaire("Q"))
        .expect("插入失败");
    assert_eq!(item.position, 1);

    let err = api
        .insert_class_at(&EditContext::system(), m, 0, video("X"))
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let err = api
        .insert_class_at(&EditContext::system(), m, 1, video(""))
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
    assert_eq!(env.arrangement(m), titles(&[(1, "Q")]));
    assert_eq!(env.scratch_module_count(), 0);
}

#[test]
fn test_remove_class_补位() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let api = env.content_api();
    let (m, items) = env.seed_module("课程", &[video("A"), video("B"), video("C"), video("D")]);

    let outcome = api
        .remove_class(&EditContext::system(), items[1].class_ref(), true)
        .expect("删除失败");

    assert_eq!(outcome.shifted, 2);
    assert_eq!(env.arrangement(m), titles(&[(1, "A"), (2, "C"), (3, "D")]));
    assert_eq!(env.slot_of(items[1].class_ref()), None);
}

#[test]
fn test_remove_class_不补位() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let api = env.content_api();
    let (m, items) = env.seed_module("课程", &[video("A"), video("B"), video("C")]);

    let outcome = api
        .remove_class(&EditContext::system(), items[0].class_ref(), false)
        .expect("删除失败");

    assert_eq!(outcome.shifted, 0);
    assert_eq!(env.arrangement(m), titles(&[(2, "B"), (3, "C")]));

    let err = api
        .remove_class(&EditContext::system(), items[0].class_ref(), false)
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[test]
fn test_insert_and_remove_in_large_module() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let api = env.content_api();
    let contents: Vec<_> = (1..=300).map(|i| video(&format!("V{}", i))).collect();
    let (m, items) = env.seed_module("大模块", &contents);

    let inserted = api
        .insert_class_at(&EditContext::system(), m, 1, video("新"))
        .expect("大模块插入失败");
    assert_eq!(inserted.position, 1);
    assert_eq!(api.highest_position(m).expect("查询失败"), 301);
    assert_eq!(env.slot_of(items[0].class_ref()), Some((m, 2)));

    let outcome = api
        .remove_class(&EditContext::system(), items[0].class_ref(), true)
        .expect("大模块删除失败");
    assert_eq!(outcome.shifted, 299);
    assert_eq!(api.highest_position(m).expect("查询失败"), 300);
    assert_eq!(env.slot_of(items[1].class_ref()), Some((m, 2)));
    assert_eq!(env.duplicate_slot_count(), 0);
    assert_eq!(env.scratch_module_count(), 0);
}

#[test]
fn test_临时模块不可作为编辑对象() {
    let config = ReorderConfig::default().with_orphan_policy(OrphanPolicy::KeepInScratch);
    let env = TestEnv::with_config(config).expect("无法创建测试环境");
    let api = env.content_api();
    let ctx = EditContext::new("editor");
    let (m, items) = env.seed_module("课程", &[video("A"), video("B")]);

    // A 被挤出后停放在保留的临时模块中
    api.reorder_module(&ctx, m, &[MoveRequest::within(ClassKind::Video, m, 2, 1)])
        .expect("重排失败");
    let scratch = env.module_repo.list_scratch().expect("查询失败")[0].module_id;
    let a = items[0].class_ref();
    let b = items[1].class_ref();
    assert_eq!(env.slot_of(a), Some((scratch, 1)));

    let attempts: Vec<Result<(), ApiError>> = vec![
        api.move_class(&ctx, a, m, 5).map(|_| ()),
        api.move_class(&ctx, b, scratch, 2).map(|_| ()),
        api.reorder_module(&ctx, scratch, &[MoveRequest::within(ClassKind::Video, scratch, 1, 2)])
            .map(|_| ()),
        api.reorder_module(
            &ctx,
            m,
            &[MoveRequest::across(ClassKind::Video, SlotKey::new(scratch, 1), SlotKey::new(m, 2))],
        )
        .map(|_| ()),
        api.append_class(&ctx, scratch, video("X")).map(|_| ()),
        api.insert_class_at(&ctx, scratch, 1, video("X")).map(|_| ()),
        api.remove_class(&ctx, a, false).map(|_| ()),
        api.list_module(&ctx, scratch).map(|_| ()),
    ];
    for result in attempts {
        assert!(matches!(result, Err(ApiError::InvalidInput(_))), "{:?}", result);
    }

    assert_eq!(env.arrangement(m), titles(&[(1, "B")]));
    assert_eq!(env.slot_of(a), Some((scratch, 1)));
}

// ==========================================
// 查询 / 维护
// ==========================================

#[test]
fn test_list_module_按位置排序() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let api = env.content_api();
    let (m, _) = env.seed_module("课程", &[video("A"), questionnaire("B")]);

    let view = api.list_module(&EditContext::system(), m).expect("查询失败");
    assert_eq!(view.module.name, "课程");
    assert_eq!(
        view.items.iter().map(|i| i.position).collect::<Vec<_>>(),
        vec![1, 2]
    );

    assert!(matches!(
        api.list_module(&EditContext::system(), 9999),
        Err(ApiError::NotFound(_))
    ));
}

#[test]
fn test_purge_scratch_modules_清理遗留() {
    let config = ReorderConfig::default().with_scratch_disposal(false);
    let env = TestEnv::with_config(config).expect("无法创建测试环境");
    let api = env.content_api();
    let (m, _) = env.seed_module("课程", &[video("A"), video("B"), video("C")]);

    api.reorder_module(
        &EditContext::system(),
        m,
        &[
            MoveRequest::within(ClassKind::Video, m, 1, 3),
            MoveRequest::within(ClassKind::Video, m, 3, 1),
        ],
    )
    .expect("重排失败");
    assert_eq!(env.scratch_module_count(), 1);

    let denied = env.content_api_with(Arc::new(OnlyModule(m)), env.action_log_repo.clone());
    assert!(matches!(
        denied.purge_scratch_modules(&EditContext::new("editor")),
        Err(ApiError::MaintenanceForbidden(_))
    ));

    assert_eq!(api.purge_scratch_modules(&EditContext::system()).expect("清理失败"), 1);
    assert_eq!(env.scratch_module_count(), 0);

    let recent = env.action_log_repo.find_recent(1).expect("查询失败");
    assert_eq!(recent[0].action_type(), Some(ActionType::PurgeScratch));
}
