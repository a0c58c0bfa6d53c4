//! Functional classification of viewpoints and stable function ids.
//!
//! Classification is an ordered rule list: the first matching rule wins and
//! rule order is part of the public contract. Reordering `KEYWORD_RULES`
//! changes outcomes and is a breaking change.
use crate::config::CustomCategory;
use serde::Serialize;
use std::fmt;

/// Functional category a viewpoint belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionalCategory {
    Authentication,
    Input,
    Validation,
    Selection,
    Search,
    Submission,
    Navigation,
    Display,
    ErrorHandling,
    DataOperation,
    Accessibility,
    Performance,
    Security,
    General,
    Custom(String),
}

/// Fixed categories in function-id order (`A` through `N`).
pub const FIXED_CATEGORIES: &[FunctionalCategory] = &[
    FunctionalCategory::Authentication,
    FunctionalCategory::Input,
    FunctionalCategory::Validation,
    FunctionalCategory::Selection,
    FunctionalCategory::Search,
    FunctionalCategory::Submission,
    FunctionalCategory::Navigation,
    FunctionalCategory::Display,
    FunctionalCategory::ErrorHandling,
    FunctionalCategory::DataOperation,
    FunctionalCategory::Accessibility,
    FunctionalCategory::Performance,
    FunctionalCategory::Security,
    FunctionalCategory::General,
];

/// Ordered keyword rules; matching is case-insensitive substring search.
pub const KEYWORD_RULES: &[(&[&str], FunctionalCategory)] = &[
    (
        &["ログイン", "ログアウト", "認証", "パスワード", "login", "logout", "sign in", "password", "auth"],
        FunctionalCategory::Authentication,
    ),
    (
        &["バリデーション", "入力チェック", "必須", "不正な", "エラーメッセージ", "validation", "invalid", "required", "error message"],
        FunctionalCategory::Validation,
    ),
    (
        &["入力", "フォーム", "テキストボックス", "input", "form", "field"],
        FunctionalCategory::Input,
    ),
    (
        &["選択", "チェックボックス", "ラジオ", "プルダウン", "ドロップダウン", "select", "checkbox", "radio", "dropdown"],
        FunctionalCategory::Selection,
    ),
    (
        &["検索", "絞り込み", "search", "filter"],
        FunctionalCategory::Search,
    ),
    (
        &["送信", "登録", "予約", "確定", "submit", "register", "reserve", "confirm"],
        FunctionalCategory::Submission,
    ),
    (
        &["表示", "見出し", "レイアウト", "画像", "display", "visible", "layout", "shown"],
        FunctionalCategory::Display,
    ),
    (
        &["遷移", "リンク", "移動", "戻る", "navigate", "link", "redirect"],
        FunctionalCategory::Navigation,
    ),
    (
        &["エラー", "例外", "error", "exception"],
        FunctionalCategory::ErrorHandling,
    ),
    (
        &["追加", "削除", "更新", "編集", "create", "delete", "update", "edit"],
        FunctionalCategory::DataOperation,
    ),
    (
        &["アクセシビリティ", "キーボード操作", "読み上げ", "accessibility", "aria", "keyboard"],
        FunctionalCategory::Accessibility,
    ),
    (
        &["パフォーマンス", "応答時間", "読み込み時間", "performance", "response time", "load time"],
        FunctionalCategory::Performance,
    ),
    (
        &["セキュリティ", "xss", "csrf", "インジェクション", "injection", "security"],
        FunctionalCategory::Security,
    ),
];

impl FunctionalCategory {
    /// Stable snake_case identifier.
    pub fn as_str(&self) -> &str {
        match self {
            FunctionalCategory::Authentication => "authentication",
            FunctionalCategory::Input => "input",
            FunctionalCategory::Validation => "validation",
            FunctionalCategory::Selection => "selection",
            FunctionalCategory::Search => "search",
            FunctionalCategory::Submission => "submission",
            FunctionalCategory::Navigation => "navigation",
            FunctionalCategory::Display => "display",
            FunctionalCategory::ErrorHandling => "error_handling",
            FunctionalCategory::DataOperation => "data_operation",
            FunctionalCategory::Accessibility => "accessibility",
            FunctionalCategory::Performance => "performance",
            FunctionalCategory::Security => "security",
            FunctionalCategory::General => "general",
            FunctionalCategory::Custom(name) => name,
        }
    }

    /// Name shown in the `機能` report column.
    pub fn display_name(&self) -> &str {
        match self {
            FunctionalCategory::Authentication => "認証",
            FunctionalCategory::Input => "入力",
            FunctionalCategory::Validation => "入力検証",
            FunctionalCategory::Selection => "選択",
            FunctionalCategory::Search => "検索",
            FunctionalCategory::Submission => "送信・登録",
            FunctionalCategory::Navigation => "画面遷移",
            FunctionalCategory::Display => "表示",
            FunctionalCategory::ErrorHandling => "エラー処理",
            FunctionalCategory::DataOperation => "データ操作",
            FunctionalCategory::Accessibility => "アクセシビリティ",
            FunctionalCategory::Performance => "パフォーマンス",
            FunctionalCategory::Security => "セキュリティ",
            FunctionalCategory::General => "一般",
            FunctionalCategory::Custom(name) => name,
        }
    }

    /// Map an upstream structured category through the fixed lookup table.
    pub fn from_explicit(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "authentication" | "auth" | "login" => FunctionalCategory::Authentication,
            "input" | "input_validation" | "form_input" => FunctionalCategory::Input,
            "validation" | "form_validation" => FunctionalCategory::Validation,
            "selection" | "select" => FunctionalCategory::Selection,
            "search" => FunctionalCategory::Search,
            "submission" | "form_submission" | "submit" => FunctionalCategory::Submission,
            "navigation" => FunctionalCategory::Navigation,
            "display" | "ui_display" => FunctionalCategory::Display,
            "error_handling" | "error" => FunctionalCategory::ErrorHandling,
            "data_operation" | "crud" => FunctionalCategory::DataOperation,
            "accessibility" | "a11y" => FunctionalCategory::Accessibility,
            "performance" => FunctionalCategory::Performance,
            "security" => FunctionalCategory::Security,
            _ => FunctionalCategory::General,
        }
    }

    fn fixed_position(&self) -> Option<usize> {
        FIXED_CATEGORIES.iter().position(|fixed| fixed == self)
    }
}

impl fmt::Display for FunctionalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Viewpoint classifier: explicit category table, then keyword rules, then
/// configured custom rules, then `General`.
#[derive(Debug, Clone, Default)]
pub struct FunctionClassifier {
    custom_rules: Vec<(String, Vec<String>)>,
}

impl FunctionClassifier {
    pub fn new(custom: &[CustomCategory]) -> Self {
        let custom_rules = custom
            .iter()
            .map(|category| {
                let keywords = category
                    .keywords
                    .iter()
                    .map(|kw| kw.trim().to_lowercase())
                    .filter(|kw| !kw.is_empty())
                    .collect();
                (category.name.trim().to_string(), keywords)
            })
            .collect();
        Self { custom_rules }
    }

    pub fn classify(&self, text: &str, explicit: Option<&str>) -> FunctionalCategory {
        if let Some(explicit) = explicit.map(str::trim).filter(|raw| !raw.is_empty()) {
            if let Some((name, _)) = self
                .custom_rules
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(explicit))
            {
                return FunctionalCategory::Custom(name.clone());
            }
            return FunctionalCategory::from_explicit(explicit);
        }
        let lowered = text.to_lowercase();
        for (keywords, category) in KEYWORD_RULES {
            if keywords.iter().any(|kw| lowered.contains(kw)) {
                return category.clone();
            }
        }
        for (name, keywords) in &self.custom_rules {
            if keywords.iter().any(|kw| lowered.contains(kw.as_str())) {
                return FunctionalCategory::Custom(name.clone());
            }
        }
        FunctionalCategory::General
    }
}

/// Letters handed to custom categories; `X` is reserved for unmapped steps.
const CUSTOM_LETTERS: &[char] = &['O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'Y', 'Z'];

/// Assigns function ids: fixed letters for the fixed table, first-seen
/// letters for custom categories.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    custom_order: Vec<String>,
}

impl FunctionRegistry {
    /// Register a category (idempotent) and return its function id.
    pub fn register(&mut self, category: &FunctionalCategory) -> String {
        if let FunctionalCategory::Custom(name) = category {
            if !self.custom_order.iter().any(|seen| seen == name) {
                self.custom_order.push(name.clone());
            }
        }
        self.function_id(category)
    }

    /// Function id of a registered (or fixed) category.
    pub fn function_id(&self, category: &FunctionalCategory) -> String {
        if let Some(position) = category.fixed_position() {
            return char::from(b'A' + position as u8).to_string();
        }
        let position = self.custom_position(category).unwrap_or(self.custom_order.len());
        match CUSTOM_LETTERS.get(position) {
            Some(letter) => letter.to_string(),
            None => format!("Z{}", position - CUSTOM_LETTERS.len() + 2),
        }
    }

    /// Walk order: fixed categories by letter, then custom by first sight.
    pub fn order(&self, category: &FunctionalCategory) -> usize {
        match category.fixed_position() {
            Some(position) => position,
            None => {
                FIXED_CATEGORIES.len()
                    + self
                        .custom_position(category)
                        .unwrap_or(self.custom_order.len())
            }
        }
    }

    fn custom_position(&self, category: &FunctionalCategory) -> Option<usize> {
        match category {
            FunctionalCategory::Custom(name) => {
                self.custom_order.iter().position(|seen| seen == name)
            }
            _ => None,
        }
    }
}
