// ==========================================
// 在线课程后台 - 课时领域模型
// ==========================================
// 课时 (class) 有两种: 视频 / 问卷，分别存放在两张物理表
// 红线: 同一模块内 (module_id, position) 跨两张表唯一
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 中性位置: 仅在搬移过程中短暂停放，真实内容的位置从 1 开始
pub const NEUTRAL_POSITION: i64 = 0;

/// highest_position 在模块为空时返回的哨兵值
pub const EMPTY_MODULE_POSITION: i64 = -1;

// ==========================================
// ClassKind - 课时类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassKind {
    Video,         // 视频课
    Questionnaire, // 问卷
}

impl ClassKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassKind::Video => "VIDEO",
            ClassKind::Questionnaire => "QUESTIONNAIRE",
        }
    }

    /// 对应的物理表名
    pub(crate) fn table(&self) -> &'static str {
        match self {
            ClassKind::Video => "class_video",
            ClassKind::Questionnaire => "class_questionnaire",
        }
    }

    /// 对应物理表的主键列
    pub(crate) fn id_column(&self) -> &'static str {
        match self {
            ClassKind::Video => "id_video",
            ClassKind::Questionnaire => "id_questionnaire",
        }
    }
}

impl fmt::Display for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "VIDEO" | "V" => Ok(ClassKind::Video),
            "QUESTIONNAIRE" | "Q" => Ok(ClassKind::Questionnaire),
            other => Err(format!("未知课时类型: {}", other)),
        }
    }
}

// ==========================================
// ClassRef - 课时身份 (类型 + 表内主键)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassRef {
    pub kind: ClassKind,
    pub class_id: i64,
}

impl ClassRef {
    pub fn new(kind: ClassKind, class_id: i64) -> Self {
        Self { kind, class_id }
    }

    pub fn video(class_id: i64) -> Self {
        Self::new(ClassKind::Video, class_id)
    }

    pub fn questionnaire(class_id: i64) -> Self {
        Self::new(ClassKind::Questionnaire, class_id)
    }
}

impl fmt::Display for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.class_id)
    }
}

// ==========================================
// SlotKey - 槽位 (module_id, position)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub module_id: i64,
    pub position: i64,
}

impl SlotKey {
    pub fn new(module_id: i64, position: i64) -> Self {
        Self { module_id, position }
    }

    /// 同一模块内的中性停放位
    pub fn neutral(module_id: i64) -> Self {
        Self::new(module_id, NEUTRAL_POSITION)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.module_id, self.position)
    }
}

// ==========================================
// ClassContent - 课时内容 (按类型区分字段)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassContent {
    Video {
        title: String,
        video_ref: String,          // 外部视频引用 (如 YouTube id)
        duration_minutes: i64,
        description: Option<String>,
    },
    Questionnaire {
        question: String,
        options: [String; 4],
        correct_option: u8,         // 0..=3
    },
}

impl ClassContent {
    pub fn kind(&self) -> ClassKind {
        match self {
            ClassContent::Video { .. } => ClassKind::Video,
            ClassContent::Questionnaire { .. } => ClassKind::Questionnaire,
        }
    }

    /// 用于列表展示的标题
    pub fn label(&self) -> &str {
        match self {
            ClassContent::Video { title, .. } => title,
            ClassContent::Questionnaire { question, .. } => question,
        }
    }
}

// ==========================================
// ClassItem - 课时 (已落库)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassItem {
    pub class_id: i64,
    pub module_id: i64,
    pub position: i64,
    pub content: ClassContent,
}

impl ClassItem {
    pub fn kind(&self) -> ClassKind {
        self.content.kind()
    }

    pub fn class_ref(&self) -> ClassRef {
        ClassRef::new(self.kind(), self.class_id)
    }

    pub fn slot(&self) -> SlotKey {
        SlotKey::new(self.module_id, self.position)
    }
}
